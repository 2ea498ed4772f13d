//! Memory geometry table
//!
//! One [`MemoryGeometry`] row per supported part. Rows are plain `const`
//! data shared by every device instance of that model; [`ALL`] lists them
//! so a configuration can name a chip by part number.
//!
//! # I2C chip address layout
//!
//! ```text
//!   bit:   7   6   5   4   3   2   1   0
//!        ┌───┬───┬───┬───┬───┬───┬───┬───┐
//!        │ 1 │ 0 │ 1 │ 0 │A2 │A1 │A0 │R/W│   base 0xA0
//!        └───┴───┴───┴───┴───┴───┴───┴───┘
//!                         └─ strapped pins, or high memory
//!                            address bits on small EEPROMs
//! ```

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::error::Error;

/// Base 8-bit address of I2C memory arrays
pub const I2C_MEMORY_BASE: u8 = 0xA0;

/// Strap pins A2, A1 and A0 in 8-bit chip address form
pub const STRAP_A2A1A0: u8 = 0x0E;

/// Strap pins A2 and A1
pub const STRAP_A2A1: u8 = 0x0C;

/// Strap pin A2 only
pub const STRAP_A2: u8 = 0x08;

/// No strap pin available
pub const STRAP_NONE: u8 = 0x00;

/// Chip address bits for strap pin levels
///
/// # Example
/// ```
/// use serialmem_core::geometry::strap_pins;
/// assert_eq!(strap_pins(true, false, true), 0x0A);
/// ```
pub const fn strap_pins(a2: bool, a1: bool, a0: bool) -> u8 {
    ((a2 as u8) << 3) | ((a1 as u8) << 2) | ((a0 as u8) << 1)
}

/// Memory technology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum MemoryKind {
    /// Page-written EEPROM with an internal write cycle
    Eeprom,
    /// SRAM shadowed by EEPROM (store/recall)
    Eeram,
    /// Plain SRAM
    Sram,
}

/// Bus the part is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum BusKind {
    /// I2C, selected by chip address
    I2c,
    /// SPI, selected by chip select line
    Spi,
}

/// Static description of one memory model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct MemoryGeometry {
    /// Part number
    pub name: &'static str,
    /// Memory technology
    pub kind: MemoryKind,
    /// Attached bus
    pub bus: BusKind,
    /// On-wire address bytes (1 to 4)
    pub address_width: u8,
    /// Page size in bytes (power of two)
    pub page_size: u32,
    /// Array size in bytes
    pub total_size: u32,
    /// High address bits carried in the chip address (0 to 3)
    pub chip_select_address_bits: u8,
    /// Chip address bits driven by strap pins
    pub strap_mask: u8,
    /// 8-bit base chip address (I2C only)
    pub base_address: u8,
    /// Page write time, or store time for EERAM, in ms
    pub write_time_ms: u32,
    /// Recall time for EERAM, in ms
    pub recall_time_ms: u32,
    /// Highest bus clock in Hz
    pub max_clock_hz: u32,
    /// Page size of CRC-secured transfers, 0 when not offered
    pub secure_page_size: u32,
    /// Dual I/O (SDI) available
    pub dual_io: bool,
    /// Quad I/O (SQI) available
    pub quad_io: bool,
    /// HOLD pin can be disabled through the status register
    pub hold_pin: bool,
}

impl MemoryGeometry {
    /// I2C EEPROM row
    ///
    /// Strap pins are the A2A1A0 positions not taken by address bits.
    pub const fn i2c_eeprom(
        name: &'static str,
        page_size: u32,
        total_size: u32,
        address_width: u8,
        chip_select_address_bits: u8,
        write_time_ms: u32,
        max_clock_hz: u32,
    ) -> Self {
        Self {
            name,
            kind: MemoryKind::Eeprom,
            bus: BusKind::I2c,
            address_width,
            page_size,
            total_size,
            chip_select_address_bits,
            strap_mask: STRAP_A2A1A0 & !fold_mask(chip_select_address_bits),
            base_address: I2C_MEMORY_BASE,
            write_time_ms,
            recall_time_ms: 0,
            max_clock_hz,
            secure_page_size: 0,
            dual_io: false,
            quad_io: false,
            hold_pin: false,
        }
    }

    /// SPI memory row with a 32-byte page
    pub const fn spi_sram(
        name: &'static str,
        total_size: u32,
        address_width: u8,
        max_clock_hz: u32,
    ) -> Self {
        Self {
            name,
            kind: MemoryKind::Sram,
            bus: BusKind::Spi,
            address_width,
            page_size: 32,
            total_size,
            chip_select_address_bits: 0,
            strap_mask: STRAP_NONE,
            base_address: 0,
            write_time_ms: 0,
            recall_time_ms: 0,
            max_clock_hz,
            secure_page_size: 0,
            dual_io: false,
            quad_io: false,
            hold_pin: false,
        }
    }

    /// Turn the row into an EERAM with the given store and recall times
    pub const fn eeram(mut self, store_time_ms: u32, recall_time_ms: u32) -> Self {
        self.kind = MemoryKind::Eeram;
        self.write_time_ms = store_time_ms;
        self.recall_time_ms = recall_time_ms;
        self
    }

    /// Override the strap pins
    pub const fn with_strap_mask(mut self, strap_mask: u8) -> Self {
        self.strap_mask = strap_mask;
        self
    }

    /// Override the page size
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Offer CRC-secured transfers of `page_size` bytes
    pub const fn with_secure_page(mut self, page_size: u32) -> Self {
        self.secure_page_size = page_size;
        self
    }

    /// Set the available I/O modes and hold pin
    pub const fn with_io(mut self, dual_io: bool, quad_io: bool, hold_pin: bool) -> Self {
        self.dual_io = dual_io;
        self.quad_io = quad_io;
        self.hold_pin = hold_pin;
        self
    }

    /// Look a part up by name, ignoring ASCII case
    pub fn find(name: &str) -> Option<&'static MemoryGeometry> {
        ALL.iter().find(|g| g.name.eq_ignore_ascii_case(name))
    }

    /// Fail with [`Error::OutOfRange`] unless `offset..offset+len` fits the array
    pub fn check_range(&self, offset: u32, len: usize) -> Result<(), Error> {
        let end = offset as u64 + len as u64;
        if end > self.total_size as u64 {
            return Err(Error::OutOfRange);
        }
        Ok(())
    }

    /// Position of `offset` inside its page
    #[inline]
    pub fn page_offset(&self, offset: u32) -> u32 {
        offset & (self.page_size - 1)
    }

    /// Number of significant address bits of the array
    pub fn address_bits(&self) -> u32 {
        32 - self.total_size.saturating_sub(1).leading_zeros()
    }

    /// Chip address bits that carry memory address bits
    pub fn fold_mask(&self) -> u8 {
        fold_mask(self.chip_select_address_bits)
    }

    /// True when the part offers CRC-secured transfers
    pub fn has_secure_transfers(&self) -> bool {
        self.secure_page_size != 0
    }
}

/// Chip address mask for `bits` folded address bits (A0, A1A0, A2A1A0)
pub const fn fold_mask(bits: u8) -> u8 {
    match bits {
        0 => 0x00,
        1 => 0x02,
        2 => 0x06,
        _ => 0x0E,
    }
}

// AT24Cxx(A)
pub const AT24C01A_1V8: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("AT24C01A-1V8", 8, 128, 1, 0, 5, 100_000);
pub const AT24C01A: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("AT24C01A", 8, 128, 1, 0, 5, 400_000);
pub const AT24C02_1V8: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("AT24C02-1V8", 8, 256, 1, 0, 5, 100_000);
pub const AT24C02: MemoryGeometry = MemoryGeometry::i2c_eeprom("AT24C02", 8, 256, 1, 0, 5, 400_000);
pub const AT24C04_1V8: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("AT24C04-1V8", 16, 512, 1, 1, 5, 100_000);
pub const AT24C04: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("AT24C04", 16, 512, 1, 1, 5, 400_000);
pub const AT24C08A_1V8: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("AT24C08A-1V8", 16, 1024, 1, 2, 5, 100_000);
pub const AT24C08A: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("AT24C08A", 16, 1024, 1, 2, 5, 400_000);
pub const AT24C16A_1V8: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("AT24C16A-1V8", 16, 2048, 1, 3, 5, 100_000);
pub const AT24C16A: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("AT24C16A", 16, 2048, 1, 3, 5, 400_000);

// 24xx256
pub const M24AA256_1V8: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("24AA256-1V8", 64, 32_768, 2, 0, 5, 100_000);
pub const M24AA256: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("24AA256", 64, 32_768, 2, 0, 5, 400_000);
pub const M24LC256: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("24LC256", 64, 32_768, 2, 0, 5, 400_000);
pub const M24FC256_1V8: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("24FC256-1V8", 64, 32_768, 2, 0, 5, 400_000);
pub const M24FC256: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("24FC256", 64, 32_768, 2, 0, 5, 1_000_000);

// AT24CM02
pub const AT24CM02_1V7: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("AT24CM02-1V7", 256, 262_144, 2, 2, 10, 400_000);
pub const AT24CM02: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("AT24CM02", 256, 262_144, 2, 2, 10, 1_000_000);

// AT24MACx02 EEPROM array
pub const AT24MAC402_1V7: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("AT24MAC402-1V7", 16, 256, 1, 0, 5, 400_000);
pub const AT24MAC402: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("AT24MAC402", 16, 256, 1, 0, 5, 1_000_000);
pub const AT24MAC602_1V7: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("AT24MAC602-1V7", 16, 256, 1, 0, 5, 400_000);
pub const AT24MAC602: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("AT24MAC602", 16, 256, 1, 0, 5, 1_000_000);

// 47x04 / 47x16 I2C EERAM, SRAM array
pub const EERAM47L04: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("47L04", 512, 512, 2, 0, 8, 1_000_000)
        .eeram(8, 2)
        .with_strap_mask(STRAP_A2A1);
pub const EERAM47C04: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("47C04", 512, 512, 2, 0, 8, 1_000_000)
        .eeram(8, 2)
        .with_strap_mask(STRAP_A2A1);
pub const EERAM47L16: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("47L16", 2048, 2048, 2, 0, 25, 1_000_000)
        .eeram(25, 5)
        .with_strap_mask(STRAP_A2A1);
pub const EERAM47C16: MemoryGeometry =
    MemoryGeometry::i2c_eeprom("47C16", 2048, 2048, 2, 0, 25, 1_000_000)
        .eeram(25, 5)
        .with_strap_mask(STRAP_A2A1);

// 48L512 / 48LM01 SPI EERAM
pub const EERAM48L512: MemoryGeometry =
    MemoryGeometry::spi_sram("48L512", 65_536, 2, 66_000_000)
        .eeram(10, 0)
        .with_page_size(64)
        .with_secure_page(64);
pub const EERAM48LM01: MemoryGeometry =
    MemoryGeometry::spi_sram("48LM01", 131_072, 3, 66_000_000)
        .eeram(10, 0)
        .with_page_size(128)
        .with_secure_page(128);

// 23xxxx SPI SRAM
pub const SRAM23A640: MemoryGeometry =
    MemoryGeometry::spi_sram("23A640", 8_192, 2, 20_000_000).with_io(false, false, true);
pub const SRAM23K640: MemoryGeometry =
    MemoryGeometry::spi_sram("23K640", 8_192, 2, 20_000_000).with_io(false, false, true);
pub const SRAM23A256: MemoryGeometry =
    MemoryGeometry::spi_sram("23A256", 32_768, 2, 20_000_000).with_io(false, false, true);
pub const SRAM23K256: MemoryGeometry =
    MemoryGeometry::spi_sram("23K256", 32_768, 2, 20_000_000).with_io(false, false, true);
pub const SRAM23A512: MemoryGeometry =
    MemoryGeometry::spi_sram("23A512", 65_536, 2, 20_000_000).with_io(true, true, false);
pub const SRAM23LC512: MemoryGeometry =
    MemoryGeometry::spi_sram("23LC512", 65_536, 2, 20_000_000).with_io(true, true, false);
pub const SRAM23A1024: MemoryGeometry =
    MemoryGeometry::spi_sram("23A1024", 131_072, 3, 20_000_000).with_io(true, true, false);
pub const SRAM23LC1024: MemoryGeometry =
    MemoryGeometry::spi_sram("23LC1024", 131_072, 3, 20_000_000).with_io(true, true, false);
pub const SRAM23LCV512: MemoryGeometry =
    MemoryGeometry::spi_sram("23LCV512", 65_536, 2, 20_000_000).with_io(true, false, false);
pub const SRAM23LCV1024: MemoryGeometry =
    MemoryGeometry::spi_sram("23LCV1024", 131_072, 3, 20_000_000).with_io(true, false, false);

/// Every supported part
pub static ALL: &[MemoryGeometry] = &[
    AT24C01A_1V8, AT24C01A, AT24C02_1V8, AT24C02, AT24C04_1V8, AT24C04,
    AT24C08A_1V8, AT24C08A, AT24C16A_1V8, AT24C16A,
    M24AA256_1V8, M24AA256, M24LC256, M24FC256_1V8, M24FC256,
    AT24CM02_1V7, AT24CM02,
    AT24MAC402_1V7, AT24MAC402, AT24MAC602_1V7, AT24MAC602,
    EERAM47L04, EERAM47C04, EERAM47L16, EERAM47C16,
    EERAM48L512, EERAM48LM01,
    SRAM23A640, SRAM23K640, SRAM23A256, SRAM23K256, SRAM23A512, SRAM23LC512,
    SRAM23A1024, SRAM23LC1024, SRAM23LCV512, SRAM23LCV1024,
];
