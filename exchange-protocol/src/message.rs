//! Message storage
//!
//! A [`MessageBuffer`] is allocated once per link and reused for every
//! received frame. Its length only describes a complete message after the
//! decoder has verified the checksum; until then it reflects a frame in
//! progress.

use alloc::boxed::Box;
use alloc::vec;

/// Borrowed view of a completed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Message<'a> {
    /// Command byte (opaque to the protocol)
    pub command: u8,
    /// Payload bytes
    pub payload: &'a [u8],
}

impl<'a> Message<'a> {
    /// Number of payload bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns true if the message carries no payload
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Fixed-capacity receive buffer for one in-flight message
#[derive(Debug, Clone)]
pub struct MessageBuffer {
    command: u8,
    data: Box<[u8]>,
    length: usize,
}

impl MessageBuffer {
    /// Allocate a buffer able to hold `capacity` payload bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            command: 0,
            data: vec![0u8; capacity].into_boxed_slice(),
            length: 0,
        }
    }

    /// Maximum payload length
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Command byte of the current message
    pub fn command(&self) -> u8 {
        self.command
    }

    /// Declared payload length of the current message
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns true if the current message has no payload
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Payload bytes `[0, len)`
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.length]
    }

    /// View the buffer as a message
    pub fn as_message(&self) -> Message<'_> {
        Message {
            command: self.command,
            payload: self.payload(),
        }
    }

    /// Clear command and length for a new frame
    pub(crate) fn clear(&mut self) {
        self.command = 0;
        self.length = 0;
    }

    pub(crate) fn set_command(&mut self, command: u8) {
        self.command = command;
    }

    /// Set the declared length; fails if it does not fit
    pub(crate) fn set_len(&mut self, length: usize) -> bool {
        if length > self.data.len() {
            return false;
        }
        self.length = length;
        true
    }

    /// Store a payload byte at `index`; `index` must be below `len()`
    pub(crate) fn store(&mut self, index: usize, byte: u8) {
        self.data[index] = byte;
    }
}
