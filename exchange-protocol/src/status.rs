//! Conventional result codes for command replies
//!
//! The protocol does not interpret payloads, but replies to commands
//! commonly start with one of these bytes.

/// Command result code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    /// Operation succeeded
    Ok,
    /// Device busy, retry later
    Busy,
    /// Operation failed
    Fail,
}

// Wire format values
const STATUS_OK: u8 = 0x11;
const STATUS_BUSY: u8 = 0x22;
const STATUS_FAIL: u8 = 0x33;

impl Status {
    /// Parse a status from its wire byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            STATUS_OK => Some(Status::Ok),
            STATUS_BUSY => Some(Status::Busy),
            STATUS_FAIL => Some(Status::Fail),
            _ => None,
        }
    }

    /// Convert to wire byte
    pub fn to_byte(self) -> u8 {
        match self {
            Status::Ok => STATUS_OK,
            Status::Busy => STATUS_BUSY,
            Status::Fail => STATUS_FAIL,
        }
    }

    /// Returns true if the operation succeeded
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }

    /// Status at the start of a reply payload
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        payload.first().copied().and_then(Self::from_byte)
    }
}
