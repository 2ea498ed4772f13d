//! Address composer
//!
//! Turns a logical byte offset into the on-wire address bytes and the
//! effective I2C chip address. Small EEPROMs carry their high address
//! bits in the chip address (A0, A1A0 or A2A1A0 positions):
//!
//! ```text
//!  AT24C16A, offset 0x5A3 (11 bits)
//!
//!  offset      101 1010 0011
//!              ─┬─ ─────┬───
//!               │       └──────► address byte 0xA3
//!               └──────────────► chip address bits 3..1 -> 0xAA
//! ```

use heapless::Vec;
use serialmem_hal::i2c::ADDRESS_MASK;

use crate::geometry::MemoryGeometry;

/// Opcode plus the widest address
pub const MAX_HEADER: usize = 5;

/// On-wire form of one logical offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ComposedAddress {
    bytes: [u8; 4],
    len: u8,
    /// 8-bit chip address, write direction, with folded address bits
    pub chip_address: u8,
}

impl ComposedAddress {
    /// Address bytes, most significant first
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// SPI command header: `opcode` followed by the address bytes
    pub fn with_opcode(&self, opcode: u8) -> Vec<u8, MAX_HEADER> {
        let mut header = Vec::new();
        // Capacity covers one opcode and four address bytes
        let _ = header.push(opcode);
        let _ = header.extend_from_slice(self.as_bytes());
        header
    }
}

/// Compose the address of `offset` for a device selected by `selector`
///
/// `selector` is the 8-bit base chip address with the strap pin levels
/// already applied (0 for SPI parts). Folded bits in `selector` are
/// replaced by the offset's high bits.
pub fn compose(geometry: &MemoryGeometry, selector: u8, offset: u32) -> ComposedAddress {
    let width = geometry.address_width.clamp(1, 4) as usize;
    let mut bytes = [0u8; 4];
    for (i, byte) in bytes[..width].iter_mut().enumerate() {
        *byte = (offset >> (8 * (width - 1 - i))) as u8;
    }

    // The bit just above the address bytes lands on A0 (chip address bit 1)
    let fold = geometry.fold_mask();
    let high = (offset >> (8 * width as u32 - 1)) as u8 & fold;
    let chip_address = ((selector & !fold) | high) & ADDRESS_MASK;

    ComposedAddress {
        bytes,
        len: width as u8,
        chip_address,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{self, strap_pins, MemoryGeometry};
    use proptest::prelude::*;

    #[test]
    fn test_one_byte_no_folding() {
        let a = compose(&geometry::AT24C02, 0xA0 | strap_pins(false, true, true), 0x7F);
        assert_eq!(a.as_bytes(), &[0x7F]);
        assert_eq!(a.chip_address, 0xA6);
    }

    #[test]
    fn test_a0_folding() {
        let a = compose(&geometry::AT24C04, 0xA0, 0x1FF);
        assert_eq!(a.as_bytes(), &[0xFF]);
        assert_eq!(a.chip_address, 0xA2);

        // Strapped A2A1 stay, A0 comes from the offset
        let a = compose(&geometry::AT24C04, 0xAC, 0x0FF);
        assert_eq!(a.chip_address, 0xAC);
        let a = compose(&geometry::AT24C04, 0xAC, 0x100);
        assert_eq!(a.as_bytes(), &[0x00]);
        assert_eq!(a.chip_address, 0xAE);
    }

    #[test]
    fn test_a2a1a0_folding() {
        let a = compose(&geometry::AT24C16A, 0xA0, 0x5A3);
        assert_eq!(a.as_bytes(), &[0xA3]);
        assert_eq!(a.chip_address, 0xAA);
    }

    #[test]
    fn test_two_bytes_with_folding() {
        let a = compose(&geometry::AT24CM02, 0xA8, 0x3_FFFF);
        assert_eq!(a.as_bytes(), &[0xFF, 0xFF]);
        assert_eq!(a.chip_address, 0xAE);

        let a = compose(&geometry::AT24CM02, 0xA0, 0x1_0000);
        assert_eq!(a.as_bytes(), &[0x00, 0x00]);
        assert_eq!(a.chip_address, 0xA2);
    }

    #[test]
    fn test_wide_addresses() {
        let a = compose(&geometry::M24LC256, 0xA0, 0x1234);
        assert_eq!(a.as_bytes(), &[0x12, 0x34]);

        let a = compose(&geometry::EERAM48LM01, 0, 0x1_ABCD);
        assert_eq!(a.as_bytes(), &[0x01, 0xAB, 0xCD]);
        assert_eq!(a.chip_address, 0);

        let mut wide = geometry::SRAM23LC1024;
        wide.address_width = 4;
        let a = compose(&wide, 0, 0x1234_5678);
        assert_eq!(a.as_bytes(), &[0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn test_header() {
        let a = compose(&geometry::SRAM23LC512, 0, 0x0102);
        assert_eq!(&a.with_opcode(0x03)[..], &[0x03, 0x01, 0x02]);
    }

    fn decode(g: &MemoryGeometry, a: &ComposedAddress) -> u32 {
        let low = a
            .as_bytes()
            .iter()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32);
        let high = ((a.chip_address & g.fold_mask()) >> 1) as u32;
        low | (high << (8 * g.address_width as u32))
    }

    proptest! {
        #[test]
        fn test_compose_is_reversible(offset in 0u32..262_144, pins in 0u8..8) {
            let models = [
                &geometry::AT24C04,
                &geometry::AT24C08A,
                &geometry::AT24C16A,
                &geometry::AT24CM02,
            ];
            for g in models {
                let offset = offset % g.total_size;
                let selector = g.base_address | ((pins << 1) & g.strap_mask);
                let a = compose(g, selector, offset);
                prop_assert_eq!(decode(g, &a), offset);
                prop_assert_eq!(a.chip_address & g.strap_mask, selector & g.strap_mask);
                prop_assert_eq!(a.chip_address & 0xF0, 0xA0);
            }
        }
    }
}
