//! AT24MAC402 / AT24MAC602 EEPROM with factory identifiers
//!
//! A 2-Kbit EEPROM array at chip address 0xA0 plus a read-only extended
//! region at 0xB0 holding a 128-bit serial number and an EUI:
//!
//! ```text
//!  0xB0 region   0x80 ┌──────────────────────────┐
//!                     │ serial number (16 bytes) │
//!                0x90 ├──────────────────────────┤
//!                0x98 │ EUI-64 (602, 8 bytes)    │
//!                0x9A │ EUI-48 (402, 6 bytes)    │
//!                     └──────────────────────────┘
//! ```
//!
//! Writing one byte to chip address 0x60 permanently protects the upper
//! half of the array.

use serialmem_core::retry::Phase;
use serialmem_core::{BusyRetry, Error, MemoryGeometry};
use serialmem_hal::{Clock, I2cTransport};

use crate::eeprom::{Eeprom, EepromConfig};

/// Extended region layout
pub mod reg {
    /// Extended region chip address base
    pub const EXTENDED_BASE: u8 = 0xB0;
    /// Permanent write protection chip address base
    pub const PROTECT_BASE: u8 = 0x60;
    /// 128-bit serial number
    pub const SERIAL_NUMBER: u8 = 0x80;
    /// EUI-64 (AT24MAC602)
    pub const EUI64: u8 = 0x98;
    /// EUI-48 (AT24MAC402)
    pub const EUI48: u8 = 0x9A;
}

/// Serial number length in bytes
pub const SERIAL_NUMBER_LEN: usize = 16;

/// AT24MAC variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum At24MacModel {
    /// EUI-48, 1.7 V to 5.5 V at 1 MHz
    Mac402,
    /// EUI-48, 400 kHz below 2.5 V
    Mac402LowVoltage,
    /// EUI-64, 1.7 V to 5.5 V at 1 MHz
    Mac602,
    /// EUI-64, 400 kHz below 2.5 V
    Mac602LowVoltage,
}

impl At24MacModel {
    /// EEPROM array geometry
    pub fn geometry(self) -> &'static MemoryGeometry {
        use serialmem_core::geometry;
        match self {
            At24MacModel::Mac402 => &geometry::AT24MAC402,
            At24MacModel::Mac402LowVoltage => &geometry::AT24MAC402_1V7,
            At24MacModel::Mac602 => &geometry::AT24MAC602,
            At24MacModel::Mac602LowVoltage => &geometry::AT24MAC602_1V7,
        }
    }

    /// True for the EUI-64 parts
    pub fn has_eui64(self) -> bool {
        matches!(self, At24MacModel::Mac602 | At24MacModel::Mac602LowVoltage)
    }
}

/// AT24MACx02 driver
pub struct At24Mac<T, C> {
    eeprom: Eeprom<T, C>,
    model: At24MacModel,
}

impl<T: I2cTransport, C: Clock> At24Mac<T, C> {
    /// Create a driver for `model` on `transport`
    pub fn new(transport: T, clock: C, model: At24MacModel, config: EepromConfig) -> Self {
        Self {
            eeprom: Eeprom::new(transport, clock, model.geometry(), config),
            model,
        }
    }

    /// Part variant
    pub fn model(&self) -> At24MacModel {
        self.model
    }

    /// EEPROM array driver
    pub fn eeprom(&mut self) -> &mut Eeprom<T, C> {
        &mut self.eeprom
    }

    /// Give the transport and clock back
    pub fn release(self) -> (T, C) {
        self.eeprom.release()
    }

    /// Configure the bus and check the device answers
    pub fn init(&mut self) -> Result<(), Error> {
        self.eeprom.init()
    }

    /// Read the EEPROM array
    pub fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Error> {
        self.eeprom.read(offset, buf)
    }

    /// Write the EEPROM array
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), Error> {
        self.eeprom.write(offset, data)
    }

    fn read_extended(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Error> {
        let (mem, clock) = self.eeprom.parts();
        let chip = reg::EXTENDED_BASE | (mem.selector() & 0x0E);
        let busy = mem.geometry().write_time_ms;
        BusyRetry::new(busy).attempt(clock, || mem.read_at(chip, &[address], buf))
    }

    /// 128-bit factory serial number
    pub fn read_serial_number(&mut self) -> Result<[u8; SERIAL_NUMBER_LEN], Error> {
        let mut serial = [0u8; SERIAL_NUMBER_LEN];
        self.read_extended(reg::SERIAL_NUMBER, &mut serial)?;
        Ok(serial)
    }

    /// Factory EUI-48 (AT24MAC402)
    pub fn read_eui48(&mut self) -> Result<[u8; 6], Error> {
        if self.model.has_eui64() {
            return Err(Error::Unsupported);
        }
        let mut eui = [0u8; 6];
        self.read_extended(reg::EUI48, &mut eui)?;
        Ok(eui)
    }

    /// Factory EUI-64 (AT24MAC602)
    pub fn read_eui64(&mut self) -> Result<[u8; 8], Error> {
        if !self.model.has_eui64() {
            return Err(Error::Unsupported);
        }
        let mut eui = [0u8; 8];
        self.read_extended(reg::EUI64, &mut eui)?;
        Ok(eui)
    }

    /// EUI-64 derived from the EUI-48 (AT24MAC402)
    ///
    /// The OUI gets the locally administered bit and `FF FE` is inserted
    /// between OUI and NIC.
    pub fn generate_eui64(&mut self) -> Result<[u8; 8], Error> {
        let mac = self.read_eui48()?;
        Ok([mac[0] | 0x02, mac[1], mac[2], 0xFF, 0xFE, mac[3], mac[4], mac[5]])
    }

    /// Protect the upper half of the array for good
    ///
    /// The device refuses the command once protection is set, which
    /// surfaces as [`Error::InvalidCommand`].
    pub fn set_permanent_write_protection(&mut self) -> Result<(), Error> {
        let (mem, clock) = self.eeprom.parts();
        let chip = reg::PROTECT_BASE | (mem.selector() & 0x0E);
        let busy = mem.geometry().write_time_ms;
        BusyRetry::new(busy).attempt(clock, || {
            mem.write_at(chip, &[0x00], &[0x00], Phase::Register)
        })?;
        debug!("permanent write protection set");
        Ok(())
    }
}
