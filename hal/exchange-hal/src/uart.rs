//! UART serial communication abstractions
//!
//! Byte-at-a-time, non-blocking traits that a protocol engine can drive from
//! a polling loop or an interrupt handler.

/// Byte output sink
///
/// Accepts one byte at a time. Implementations must not block; a sink that
/// cannot take the byte right now is expected to queue or drop it.
pub trait ByteSink {
    /// Emit a single byte
    fn write_byte(&mut self, byte: u8);

    /// Emit every byte of `data`, in order
    fn write_all(&mut self, data: &[u8]) {
        for &byte in data {
            self.write_byte(byte);
        }
    }
}

/// Byte input source
///
/// Returns the next received byte, or `None` when nothing is available.
/// Implementations must never wait for data to arrive.
pub trait ByteSource {
    /// Take the next available byte
    fn read_byte(&mut self) -> Option<u8>;
}

impl<F: FnMut(u8)> ByteSink for F {
    fn write_byte(&mut self, byte: u8) {
        self(byte)
    }
}

impl<F: FnMut() -> Option<u8>> ByteSource for F {
    fn read_byte(&mut self) -> Option<u8> {
        self()
    }
}

/// Sink that discards everything written to it
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ByteSink for NullSink {
    fn write_byte(&mut self, _byte: u8) {}
}

/// Source that never has data
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySource;

impl ByteSource for EmptySource {
    fn read_byte(&mut self) -> Option<u8> {
        None
    }
}
