//! Exchange Hardware Abstraction Layer
//!
//! This crate defines the byte-level collaborators the exchange protocol
//! engine talks to. The engine never touches a peripheral directly: it pushes
//! outgoing bytes into a [`ByteSink`] and polls incoming bytes from a
//! [`ByteSource`], both of which must return immediately.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  exchange-protocol (framing, CRC, ACK)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  exchange-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  closures /   │       │  embedded-io  │
//! │  ISR queues   │       │  UART drivers │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`uart::ByteSink`], [`uart::ByteSource`] - Non-blocking byte I/O
//! - [`io::IoSink`], [`io::IoSource`] - Adapters over `embedded-io` drivers

#![no_std]
#![deny(unsafe_code)]

pub mod io;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use io::{IoSink, IoSource};
pub use uart::{ByteSink, ByteSource, EmptySource, NullSink};
