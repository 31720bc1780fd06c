//! CRC-16/CCITT-FALSE checksum
//!
//! - Polynomial: 0x1021 (x^16 + x^12 + x^5 + 1)
//! - Initial value: 0xFFFF
//! - No input or output reflection, no final XOR
//! - Check value: 0x29B1 for ASCII "123456789"
//!
//! Table driven: one lookup per byte, indexed by the high byte of the
//! running CRC XOR the input byte.

/// Generator polynomial
pub const CRC16_POLY: u16 = 0x1021;

/// Initial register value (also the checksum of an empty slice)
pub const CRC16_INIT: u16 = 0xFFFF;

/// Precomputed lookup table, built at compile time
static CRC16_TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ CRC16_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Compute the CRC-16/CCITT-FALSE of `data`
pub fn checksum16(data: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(data);
    crc.finish()
}

/// Incremental CRC-16/CCITT-FALSE
///
/// Feeding the same bytes in any number of `update` calls gives the same
/// result as a single [`checksum16`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Crc16 {
    value: u16,
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc16 {
    /// Start a new checksum
    pub const fn new() -> Self {
        Self { value: CRC16_INIT }
    }

    /// Fold a single byte into the checksum
    #[inline]
    pub fn push(&mut self, byte: u8) {
        let index = ((self.value >> 8) ^ u16::from(byte)) as usize;
        self.value = (self.value << 8) ^ CRC16_TABLE[index];
    }

    /// Fold a slice into the checksum
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.push(byte);
        }
    }

    /// Current checksum value
    pub const fn finish(self) -> u16 {
        self.value
    }
}
