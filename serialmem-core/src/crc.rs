//! CRC16-IBM3740
//!
//! Polynomial 0x1021, seed 0xFFFF, MSB first, no final XOR (also known as
//! CRC-16/CCITT-FALSE). Secure transfers hash the significant address bits
//! and then the data, so parts whose array is not a whole number of bytes
//! wide (17-bit 48LM01) start with a partial byte.

/// Initial CRC value
pub const CRC16_SEED: u16 = 0xFFFF;

/// Generator polynomial
pub const CRC16_POLY: u16 = 0x1021;

/// CRC16 primitive used by secure transfers
///
/// Implement this over a hardware CRC unit to offload the computation;
/// [`SoftwareCrc16`] is the bitwise default.
pub trait Crc16 {
    /// Fold `data` into `crc` and return the new state
    fn update(&mut self, crc: u16, data: &[u8]) -> u16;
}

/// Software CRC16-IBM3740
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SoftwareCrc16;

impl Crc16 for SoftwareCrc16 {
    fn update(&mut self, crc: u16, data: &[u8]) -> u16 {
        update(crc, data)
    }
}

impl<F: FnMut(u16, &[u8]) -> u16> Crc16 for F {
    fn update(&mut self, crc: u16, data: &[u8]) -> u16 {
        self(crc, data)
    }
}

/// Fold bytes into `crc`
pub fn update(mut crc: u16, data: &[u8]) -> u16 {
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            let carry = crc & 0x8000 != 0;
            crc <<= 1;
            if carry {
                crc ^= CRC16_POLY;
            }
        }
    }
    crc
}

/// Fold the low `bits` bits of `value` into `crc`, most significant first
pub fn update_bits(mut crc: u16, value: u32, bits: u32) -> u16 {
    for i in (0..bits.min(32)).rev() {
        let bit = ((value >> i) & 1) as u16;
        let top = crc >> 15;
        crc <<= 1;
        if top ^ bit != 0 {
            crc ^= CRC16_POLY;
        }
    }
    crc
}

/// CRC of a complete byte stream
pub fn checksum(data: &[u8]) -> u16 {
    update(CRC16_SEED, data)
}

/// CRC state after hashing the `address_bits` low bits of `address`
///
/// Leading bits that do not fill a byte are hashed in software; whole
/// bytes go through `hasher`.
pub fn address_state<H: Crc16 + ?Sized>(hasher: &mut H, address: u32, address_bits: u32) -> u16 {
    let address_bits = address_bits.min(32);
    let leading = address_bits % 8;
    let whole = (address_bits / 8) as usize;

    let high = address.checked_shr(address_bits - leading).unwrap_or(0);
    let crc = update_bits(CRC16_SEED, high, leading);
    let bytes = address.to_be_bytes();
    hasher.update(crc, &bytes[4 - whole..])
}
