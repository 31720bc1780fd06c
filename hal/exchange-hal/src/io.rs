//! Adapters from `embedded-io` drivers to the byte traits
//!
//! UART drivers in the embedded ecosystem expose `embedded_io::Read` and
//! `embedded_io::Write`. These wrappers present them as a [`ByteSource`] and
//! [`ByteSink`] so the protocol engine can run on top of them unchanged.

use embedded_io::{Read, ReadReady, Write};

use crate::uart::{ByteSink, ByteSource};

/// [`ByteSink`] over an `embedded_io::Write`
///
/// The writer should be buffered (e.g. a buffered UART TX half). Bytes the
/// writer rejects are dropped and counted.
#[derive(Debug)]
pub struct IoSink<W> {
    inner: W,
    dropped: u32,
}

impl<W: Write> IoSink<W> {
    /// Wrap a writer
    pub fn new(inner: W) -> Self {
        Self { inner, dropped: 0 }
    }

    /// Number of bytes the writer failed to accept
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Flush the underlying writer
    pub fn flush(&mut self) -> Result<(), W::Error> {
        self.inner.flush()
    }

    /// Consume the adapter and return the writer
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ByteSink for IoSink<W> {
    fn write_byte(&mut self, byte: u8) {
        if self.inner.write_all(&[byte]).is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("UART write failed, dropping byte");
            self.dropped = self.dropped.saturating_add(1);
        }
    }
}

/// [`ByteSource`] over an `embedded_io::Read`
///
/// Only reads when the driver reports data ready, so a poll never blocks.
/// Read errors are counted and reported as "no byte".
#[derive(Debug)]
pub struct IoSource<R> {
    inner: R,
    errors: u32,
}

impl<R: Read + ReadReady> IoSource<R> {
    /// Wrap a reader
    pub fn new(inner: R) -> Self {
        Self { inner, errors: 0 }
    }

    /// Number of failed readiness checks or reads
    pub fn errors(&self) -> u32 {
        self.errors
    }

    /// Consume the adapter and return the reader
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + ReadReady> ByteSource for IoSource<R> {
    fn read_byte(&mut self) -> Option<u8> {
        match self.inner.read_ready() {
            Ok(true) => {}
            Ok(false) => return None,
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("UART readiness check failed");
                self.errors = self.errors.saturating_add(1);
                return None;
            }
        }

        let mut buf = [0u8; 1];
        match self.inner.read(&mut buf) {
            Ok(1) => Some(buf[0]),
            Ok(_) => None,
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("UART read error");
                self.errors = self.errors.saturating_add(1);
                None
            }
        }
    }
}
