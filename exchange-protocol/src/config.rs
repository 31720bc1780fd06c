//! Link configuration
//!
//! Per-link settings. Configuration can be stored as postcard-serialized
//! binary data (enable the `serde` feature).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::frame::MAX_PAYLOAD_SIZE;

/// Default payload capacity (12 bytes)
pub const DEFAULT_CAPACITY: usize = 12;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Payload capacity of zero
    ZeroCapacity,
    /// Payload capacity larger than a LEN byte can describe
    CapacityTooLarge,
    /// Serialization failed (buffer too small)
    Serialize,
    /// Deserialization failed
    Deserialize,
}

/// How the receiver treats a start marker that arrives mid-frame
///
/// The default, `BetweenFrames`, does not restart framing on a mid-frame
/// SOH. Frames carry no byte stuffing, so CMD, LEN, DATA and CRC bytes can
/// all equal SOH; restarting on them would lose valid frames (every frame
/// with a one-byte payload has LEN = SOH). A torn frame is instead dropped by
/// its checksum check and answered with NAK, or discarded by the caller via
/// `reset()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ResyncPolicy {
    /// SOH is only a marker while idle; inside a frame it is ordinary data.
    /// Commands and payloads may contain any byte value.
    #[default]
    BetweenFrames,
    /// SOH in the CMD or DATA position restarts framing, dropping the
    /// partial frame. LEN and CRC bytes are never treated as markers.
    /// Frames whose command or payload contains SOH cannot be received in
    /// this mode.
    Anywhere,
}

/// Link configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkConfig {
    /// Maximum payload length for both directions (1-255)
    pub capacity: usize,
    /// Mid-frame start marker handling
    pub resync: ResyncPolicy,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            resync: ResyncPolicy::default(),
        }
    }
}

impl LinkConfig {
    /// Configuration with the given capacity and default everything else
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// Check that the configuration describes a usable link
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.capacity > MAX_PAYLOAD_SIZE {
            return Err(ConfigError::CapacityTooLarge);
        }
        Ok(())
    }

    /// Serialize into `buf` with postcard
    #[cfg(feature = "serde")]
    pub fn to_slice<'b>(&self, buf: &'b mut [u8]) -> Result<&'b mut [u8], ConfigError> {
        postcard::to_slice(self, buf).map_err(|_| ConfigError::Serialize)
    }

    /// Deserialize from postcard bytes and validate
    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: LinkConfig =
            postcard::from_bytes(bytes).map_err(|_| ConfigError::Deserialize)?;
        config.validate()?;
        Ok(config)
    }
}
