//! 47x04 / 47x16 I2C EERAM
//!
//! An SRAM array shadowed by an EEPROM of the same size. The SRAM answers
//! at chip address 0xA0 with a 2-byte address; the control registers answer
//! at 0x30 with a 1-byte register address:
//!
//! ```text
//!  0x30 ── 0x00 STATUS   AM . . BP2 BP1 BP0 ASE EVENT
//!      └── 0x55 COMMAND  0x33 store, 0xDD recall
//! ```
//!
//! Store copies the SRAM to EEPROM (8 ms on the 47x04, 25 ms on the
//! 47x16), recall copies it back. The device ignores its chip addresses
//! while either runs. With auto-store enabled the part stores by itself on
//! power loss when the array-modified (AM) flag is set.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use serialmem_core::bus::I2cMemory;
use serialmem_core::retry::Phase;
use serialmem_core::{engine, BusyRetry, DriverState, Error, MemoryGeometry, TransferStatus};
use serialmem_hal::{Clock, I2cConfig, I2cTransport};

/// Control register map
pub mod reg {
    /// Control register chip address base
    pub const CONTROL_BASE: u8 = 0x30;
    /// Status register
    pub const STATUS: u8 = 0x00;
    /// Command register
    pub const COMMAND: u8 = 0x55;
    /// Command: copy SRAM to EEPROM
    pub const STORE: u8 = 0x33;
    /// Command: copy EEPROM to SRAM
    pub const RECALL: u8 = 0xDD;
}

/// Status register bits
pub mod status {
    /// Event detected on the HS pin
    pub const EVENT: u8 = 0x01;
    /// Auto-store enable
    pub const ASE: u8 = 0x02;
    /// Block protect field
    pub const BP_MASK: u8 = 0x1C;
    pub const BP_SHIFT: u8 = 2;
    /// SRAM modified since the last store or recall (read-only)
    pub const AM: u8 = 0x80;
}

/// Write-protected part of the SRAM
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BlockProtect {
    #[default]
    None = 0,
    Upper64th = 1,
    Upper32nd = 2,
    Upper16th = 3,
    Upper8th = 4,
    UpperQuarter = 5,
    UpperHalf = 6,
    All = 7,
}

impl BlockProtect {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => BlockProtect::None,
            1 => BlockProtect::Upper64th,
            2 => BlockProtect::Upper32nd,
            3 => BlockProtect::Upper16th,
            4 => BlockProtect::Upper8th,
            5 => BlockProtect::UpperQuarter,
            6 => BlockProtect::UpperHalf,
            _ => BlockProtect::All,
        }
    }
}

/// Decoded STATUS register
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Eeram47Status {
    pub event_detected: bool,
    pub auto_store: bool,
    pub block_protect: BlockProtect,
    pub array_modified: bool,
}

impl Eeram47Status {
    /// Decode a raw register value
    pub fn from_register(value: u8) -> Self {
        Self {
            event_detected: value & status::EVENT != 0,
            auto_store: value & status::ASE != 0,
            block_protect: BlockProtect::from_bits((value & status::BP_MASK) >> status::BP_SHIFT),
            array_modified: value & status::AM != 0,
        }
    }

    /// Raw value to write back; AM is read-only and left out
    pub fn to_register(&self) -> u8 {
        let mut value = (self.block_protect as u8) << status::BP_SHIFT;
        if self.event_detected {
            value |= status::EVENT;
        }
        if self.auto_store {
            value |= status::ASE;
        }
        value
    }
}

/// EERAM variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Eeram47Model {
    /// 4 Kbit, 3.0 V to 3.6 V
    L04,
    /// 4 Kbit, 4.5 V to 5.5 V
    C04,
    /// 16 Kbit, 3.0 V to 3.6 V
    L16,
    /// 16 Kbit, 4.5 V to 5.5 V
    C16,
}

impl Eeram47Model {
    /// SRAM geometry and store/recall times
    pub fn geometry(self) -> &'static MemoryGeometry {
        use serialmem_core::geometry;
        match self {
            Eeram47Model::L04 => &geometry::EERAM47L04,
            Eeram47Model::C04 => &geometry::EERAM47C04,
            Eeram47Model::L16 => &geometry::EERAM47L16,
            Eeram47Model::C16 => &geometry::EERAM47C16,
        }
    }
}

/// I2C EERAM configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Eeram47Config {
    /// A2 and A1 pin levels in chip address bit positions
    pub pins: u8,
    /// SCL frequency in Hz
    pub clock_hz: u32,
}

impl Default for Eeram47Config {
    fn default() -> Self {
        Self {
            pins: 0,
            clock_hz: I2cConfig::FAST_PLUS.frequency,
        }
    }
}

/// 47xxx EERAM driver
pub struct Eeram47<T, C> {
    mem: I2cMemory<T>,
    clock: C,
    state: DriverState,
}

impl<T: I2cTransport, C: Clock> Eeram47<T, C> {
    pub fn new(transport: T, clock: C, model: Eeram47Model, config: Eeram47Config) -> Self {
        let bus = I2cConfig {
            frequency: config.clock_hz,
        };
        Self {
            mem: I2cMemory::new(transport, model.geometry(), config.pins, bus),
            clock,
            state: DriverState::default(),
        }
    }

    /// Model description
    pub fn geometry(&self) -> &'static MemoryGeometry {
        self.mem.geometry()
    }

    /// Give the transport and clock back
    pub fn release(self) -> (T, C) {
        (self.mem.release(), self.clock)
    }

    /// Configure the bus and check the device answers
    pub fn init(&mut self) -> Result<(), Error> {
        self.mem.init()?;
        self.state = DriverState::default();
        if !self.mem.is_ready()? {
            warn!("no ACK from {=u8:#x}", self.mem.selector());
            return Err(Error::NoDevice);
        }
        Ok(())
    }

    /// True unless a store or recall is running
    pub fn is_ready(&mut self) -> Result<bool, Error> {
        self.mem.is_ready()
    }

    fn control_chip(&self) -> u8 {
        reg::CONTROL_BASE | (self.mem.selector() & 0x0E)
    }

    /// Read the SRAM
    pub fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Error> {
        engine::read(&mut self.mem, &mut self.clock, offset, buf)
    }

    /// Write the SRAM
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), Error> {
        engine::write(&mut self.mem, &mut self.clock, offset, data)
    }

    /// Non-blocking SRAM read; call again until [`TransferStatus::Complete`]
    pub fn read_dma(&mut self, offset: u32, buf: &mut [u8]) -> Result<TransferStatus, Error> {
        self.mem.read_dma(&mut self.state, offset, buf)
    }

    /// Non-blocking SRAM write; call again until [`TransferStatus::Complete`]
    pub fn write_dma(&mut self, offset: u32, data: &[u8]) -> Result<TransferStatus, Error> {
        self.mem.write_dma(&mut self.state, offset, data)
    }

    /// Raw STATUS register
    pub fn read_register(&mut self) -> Result<u8, Error> {
        let chip = self.control_chip();
        let busy = self.mem.geometry().write_time_ms;
        let mem = &mut self.mem;
        BusyRetry::new(busy).attempt(&mut self.clock, || {
            let mut value = [0u8; 1];
            mem.read_current(chip, &mut value)?;
            Ok(value[0])
        })
    }

    /// Decoded STATUS register
    pub fn read_status(&mut self) -> Result<Eeram47Status, Error> {
        self.read_register().map(Eeram47Status::from_register)
    }

    /// Write a control register
    ///
    /// Returns [`Error::InvalidCommand`] when the device refuses the value.
    pub fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error> {
        let chip = self.control_chip();
        let busy = self.mem.geometry().write_time_ms;
        let mem = &mut self.mem;
        BusyRetry::new(busy).attempt(&mut self.clock, || {
            mem.write_at(chip, &[register], &[value], Phase::Register)
        })
    }

    /// Write the STATUS register
    pub fn write_status(&mut self, status: Eeram47Status) -> Result<(), Error> {
        self.write_register(reg::STATUS, status.to_register())
    }

    /// Copy the SRAM to EEPROM
    ///
    /// Unless `force` is set the store only happens when the array was
    /// modified. With `wait` the call returns once the device reports the
    /// array clean again.
    pub fn store(&mut self, force: bool, wait: bool) -> Result<(), Error> {
        if !force && !self.read_status()?.array_modified {
            debug!("store skipped, array clean");
            return Ok(());
        }
        self.write_register(reg::COMMAND, reg::STORE)?;
        debug!("store started");
        if wait {
            let time = self.mem.geometry().write_time_ms;
            self.wait_clean(time)?;
        }
        Ok(())
    }

    /// Copy the EEPROM to SRAM
    pub fn recall(&mut self, wait: bool) -> Result<(), Error> {
        self.write_register(reg::COMMAND, reg::RECALL)?;
        debug!("recall started");
        if wait {
            let time = self.mem.geometry().recall_time_ms;
            self.wait_clean(time)?;
        }
        Ok(())
    }

    fn wait_clean(&mut self, time_ms: u32) -> Result<(), Error> {
        let chip = self.control_chip();
        let mem = &mut self.mem;
        BusyRetry::new(time_ms).attempt(&mut self.clock, || {
            let mut value = [0u8; 1];
            mem.read_current(chip, &mut value)?;
            if value[0] & status::AM != 0 {
                return Err(Error::NotReady);
            }
            Ok(())
        })
    }

    /// Enable or disable store on power loss
    pub fn set_auto_store(&mut self, enable: bool) -> Result<(), Error> {
        let mut status = self.read_status()?;
        status.auto_store = enable;
        self.write_status(status)
    }

    /// Set the write-protected part of the SRAM
    pub fn set_block_protect(&mut self, protect: BlockProtect) -> Result<(), Error> {
        let mut status = self.read_status()?;
        status.block_protect = protect;
        self.write_status(status)
    }
}
