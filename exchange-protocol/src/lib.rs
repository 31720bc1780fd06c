//! Simple Exchange Serial Protocol
//!
//! This crate turns an unreliable byte stream (typically a UART) into
//! checksum-verified command/data messages, and turns outgoing command/data
//! pairs into framed byte sequences. It is built for small targets: one
//! message buffer per link, allocated once, and callback-driven I/O that never
//! blocks.
//!
//! # Protocol Overview
//!
//! Data frames carry one command byte and up to 255 payload bytes:
//! ```text
//! ┌─────┬─────┬─────┬──────────────┬────────┬────────┐
//! │ SOH │ CMD │ LEN │ DATA         │ CRC_LO │ CRC_HI │
//! │ 1B  │ 1B  │ 1B  │ LEN bytes    │ 1B     │ 1B     │
//! └─────┴─────┴─────┴──────────────┴────────┴────────┘
//! ```
//!
//! The CRC is CRC-16/CCITT-FALSE over DATA only. There is no end marker:
//! framing is driven by LEN and the checksum. A receiver answers every data
//! frame with a single `ACK` byte (valid) or `NAK` byte (corrupt or too long).
//!
//! # Usage
//!
//! ```
//! use exchange_protocol::Exchange;
//!
//! let mut wire = [0u8; 16];
//! let mut sent = 0;
//! {
//!     let mut link = Exchange::new(12).unwrap();
//!     link.set_output(|byte: u8| {
//!         wire[sent] = byte;
//!         sent += 1;
//!     });
//!     link.send(0x01, &[0xAA, 0xBB, 0xCC]);
//! }
//! assert_eq!(&wire[..3], &[exchange_protocol::SOH, 0x01, 0x03]);
//! assert_eq!(sent, 8);
//! ```

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod config;
pub mod crc;
pub mod exchange;
pub mod frame;
pub mod message;
pub mod status;

pub use config::{ConfigError, LinkConfig, ResyncPolicy, DEFAULT_CAPACITY};
pub use crc::{checksum16, Crc16};
pub use exchange::{AckHandler, Callbacks, Exchange, LinkStats, MessageHandler};
pub use frame::{
    encode, encode_into, encode_to_vec, frame_len, Ack, DecodeState, Decoded, FrameDecoder,
    FrameError, ACK, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, NAK, SOH,
};
pub use message::{Message, MessageBuffer};
pub use status::Status;

pub use exchange_hal::{ByteSink, ByteSource};
