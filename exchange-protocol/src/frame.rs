//! Frame encoding and decoding for the exchange protocol.
//!
//! Frame format:
//! - SOH (1 byte): 0x01 start-of-frame marker
//! - CMD (1 byte): command byte, opaque to the protocol
//! - LEN (1 byte): payload length (0-255, and at most the receiver capacity)
//! - DATA (LEN bytes): payload
//! - CRC (2 bytes): CRC-16/CCITT-FALSE of DATA, low byte first
//!
//! Control bytes ACK (0x06) and NAK (0x15) travel on their own, outside of
//! any frame.

use heapless::Vec;

use exchange_hal::ByteSink;

use crate::config::ResyncPolicy;
use crate::crc::{checksum16, Crc16};
use crate::message::{Message, MessageBuffer};

/// Start-of-frame marker
pub const SOH: u8 = 0x01;

/// Positive acknowledgment
pub const ACK: u8 = 0x06;

/// Negative acknowledgment
pub const NAK: u8 = 0x15;

/// Largest payload a LEN byte can describe
pub const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize;

/// Maximum complete frame size (SOH + CMD + LEN + MAX_PAYLOAD + CRC)
pub const MAX_FRAME_SIZE: usize = 3 + MAX_PAYLOAD_SIZE + 2;

/// Errors that can occur during frame decoding or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Received CRC does not match the payload
    ChecksumMismatch,
    /// LEN byte is larger than the receive buffer
    LengthExceedsCapacity,
    /// Buffer too small for encoding
    BufferTooSmall,
}

/// Acknowledgment kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ack {
    /// Frame accepted
    Positive,
    /// Frame rejected
    Negative,
}

impl Ack {
    /// Parse an acknowledgment from its wire byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            ACK => Some(Ack::Positive),
            NAK => Some(Ack::Negative),
            _ => None,
        }
    }

    /// Convert to wire byte
    pub fn to_byte(self) -> u8 {
        match self {
            Ack::Positive => ACK,
            Ack::Negative => NAK,
        }
    }
}

/// Total encoded size of a frame carrying `payload_len` bytes
pub const fn frame_len(payload_len: usize) -> usize {
    3 + payload_len + 2
}

/// Encode a frame byte by byte into `sink`
///
/// Payloads longer than `max_length` are silently truncated to their first
/// `max_length` bytes (`max_length` itself is capped at 255 so the length
/// fits in LEN). Returns the number of bytes emitted.
pub fn encode<S>(sink: &mut S, command: u8, data: &[u8], max_length: usize) -> usize
where
    S: ByteSink + ?Sized,
{
    let length = data.len().min(max_length).min(MAX_PAYLOAD_SIZE);
    let payload = &data[..length];
    let crc = checksum16(payload);

    sink.write_byte(SOH);
    sink.write_byte(command);
    sink.write_byte(length as u8);
    sink.write_all(payload);
    sink.write_byte((crc & 0xFF) as u8);
    sink.write_byte((crc >> 8) as u8);

    frame_len(length)
}

/// Encode a frame into a byte buffer
///
/// Same truncation rule as [`encode`]. Returns the number of bytes written.
pub fn encode_into(
    buffer: &mut [u8],
    command: u8,
    data: &[u8],
    max_length: usize,
) -> Result<usize, FrameError> {
    let length = data.len().min(max_length).min(MAX_PAYLOAD_SIZE);
    if buffer.len() < frame_len(length) {
        return Err(FrameError::BufferTooSmall);
    }

    let mut pos = 0;
    let written = encode(
        &mut |byte: u8| {
            buffer[pos] = byte;
            pos += 1;
        },
        command,
        data,
        max_length,
    );
    Ok(written)
}

/// Encode a frame into a heapless Vec
pub fn encode_to_vec(
    command: u8,
    data: &[u8],
    max_length: usize,
) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
    let mut buffer = [0u8; MAX_FRAME_SIZE];
    let len = encode_into(&mut buffer, command, data, max_length)?;
    let mut vec = Vec::new();
    vec.extend_from_slice(&buffer[..len])
        .map_err(|_| FrameError::BufferTooSmall)?;
    Ok(vec)
}

/// Receive state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeState {
    /// Between frames: waiting for SOH, ACK or NAK
    Idle,
    /// Got SOH, waiting for CMD
    ReadCommand,
    /// Got CMD, waiting for LEN
    ReadLength,
    /// Reading payload bytes
    ReadData,
    /// Reading the two CRC bytes
    ReadChecksum,
}

/// Something the decoder recognized on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Decoded {
    /// A checksum-valid frame is ready in [`FrameDecoder::message`]
    Frame,
    /// An acknowledgment control byte arrived while idle
    Ack(Ack),
}

/// Byte-at-a-time frame decoder
///
/// Owns the message buffer and the per-frame counters, so independent
/// decoders share nothing.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: DecodeState,
    message: MessageBuffer,
    receive_count: usize,
    checksum_count: u8,
    received_crc: u16,
    resync: ResyncPolicy,
}

impl FrameDecoder {
    /// Create a decoder accepting payloads of up to `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self::with_policy(capacity, ResyncPolicy::default())
    }

    /// Create a decoder with an explicit resynchronization policy
    pub fn with_policy(capacity: usize, resync: ResyncPolicy) -> Self {
        Self {
            state: DecodeState::Idle,
            message: MessageBuffer::new(capacity),
            receive_count: 0,
            checksum_count: 0,
            received_crc: 0,
            resync,
        }
    }

    /// Current receive state
    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Maximum accepted payload length
    pub fn capacity(&self) -> usize {
        self.message.capacity()
    }

    /// Last completed message
    ///
    /// Only meaningful right after [`feed`](Self::feed) returned
    /// `Ok(Some(Decoded::Frame))`.
    pub fn message(&self) -> Message<'_> {
        self.message.as_message()
    }

    /// Drop any partial frame and return to idle
    pub fn reset(&mut self) {
        self.state = DecodeState::Idle;
        self.receive_count = 0;
        self.checksum_count = 0;
        self.received_crc = 0;
    }

    fn begin_frame(&mut self) {
        self.message.clear();
        self.receive_count = 0;
        self.checksum_count = 0;
        self.received_crc = 0;
        self.state = DecodeState::ReadCommand;
    }

    /// Feed a single byte to the decoder
    ///
    /// Returns `Ok(Some(_))` when a frame completes or an acknowledgment
    /// byte arrives, `Ok(None)` when more bytes are needed, or `Err` when the
    /// current frame was rejected. The decoder is idle again after any
    /// `Some` or `Err` result.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Decoded>, FrameError> {
        // LEN and CRC bytes may take any value, so only CMD and DATA positions
        // can treat SOH as a restart
        if byte == SOH
            && self.resync == ResyncPolicy::Anywhere
            && matches!(self.state, DecodeState::ReadCommand | DecodeState::ReadData)
        {
            self.begin_frame();
            return Ok(None);
        }

        match self.state {
            DecodeState::Idle => match byte {
                SOH => {
                    self.begin_frame();
                    Ok(None)
                }
                // Anything else between frames is line noise
                _ => Ok(Ack::from_byte(byte).map(Decoded::Ack)),
            },
            DecodeState::ReadCommand => {
                self.message.set_command(byte);
                self.state = DecodeState::ReadLength;
                Ok(None)
            }
            DecodeState::ReadLength => {
                if !self.message.set_len(usize::from(byte)) {
                    self.state = DecodeState::Idle;
                    return Err(FrameError::LengthExceedsCapacity);
                }
                self.state = if byte == 0 {
                    DecodeState::ReadChecksum
                } else {
                    DecodeState::ReadData
                };
                Ok(None)
            }
            DecodeState::ReadData => {
                self.message.store(self.receive_count, byte);
                self.receive_count += 1;
                if self.receive_count == self.message.len() {
                    self.state = DecodeState::ReadChecksum;
                }
                Ok(None)
            }
            DecodeState::ReadChecksum => {
                if self.checksum_count == 0 {
                    self.received_crc = u16::from(byte);
                    self.checksum_count = 1;
                    return Ok(None);
                }

                self.received_crc |= u16::from(byte) << 8;
                self.state = DecodeState::Idle;

                let mut crc = Crc16::new();
                crc.update(self.message.payload());
                if crc.finish() != self.received_crc {
                    return Err(FrameError::ChecksumMismatch);
                }
                Ok(Some(Decoded::Frame))
            }
        }
    }

    /// Feed multiple bytes to the decoder
    ///
    /// Stops at the first completed frame, acknowledgment or error and
    /// returns it together with the number of bytes consumed.
    pub fn feed_bytes(
        &mut self,
        bytes: &[u8],
    ) -> (usize, Result<Option<Decoded>, FrameError>) {
        for (i, &byte) in bytes.iter().enumerate() {
            match self.feed(byte) {
                Ok(None) => {}
                result => return (i + 1, result),
            }
        }
        (bytes.len(), Ok(None))
    }
}
