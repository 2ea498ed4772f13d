//! Generic I2C EEPROM
//!
//! Covers the AT24Cxx, 24xx256 and AT24CM02 families, the EEPROM array of
//! the AT24MACx02 and the SRAM array of the 47xxx EERAMs. Writes inside a
//! page are a single transaction; the part then runs its internal write
//! cycle and ignores its chip address until the cycle ends:
//!
//! ```text
//!  write page ─► NACK NACK NACK ... ACK ─► next page
//!               └──── write cycle (5 ms typ.) ────┘
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use serialmem_core::bus::I2cMemory;
use serialmem_core::{engine, Error, MemoryGeometry, PagedMemory};
use serialmem_hal::{Clock, I2cConfig, I2cTransport};

/// I2C EEPROM configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EepromConfig {
    /// Strap pin levels in chip address bit positions
    pub pins: u8,
    /// SCL frequency in Hz
    pub clock_hz: u32,
}

impl Default for EepromConfig {
    fn default() -> Self {
        Self {
            pins: 0,
            clock_hz: I2cConfig::FAST.frequency,
        }
    }
}

impl EepromConfig {
    /// Bus configuration for this device
    pub fn bus(&self) -> I2cConfig {
        I2cConfig {
            frequency: self.clock_hz,
        }
    }
}

/// I2C EEPROM driver
pub struct Eeprom<T, C> {
    mem: I2cMemory<T>,
    clock: C,
}

impl<T: I2cTransport, C: Clock> Eeprom<T, C> {
    /// Create a driver for a `geometry` part on `transport`
    pub fn new(
        transport: T,
        clock: C,
        geometry: &'static MemoryGeometry,
        config: EepromConfig,
    ) -> Self {
        Self {
            mem: I2cMemory::new(transport, geometry, config.pins, config.bus()),
            clock,
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
        if !self.mem.is_ready()? {
            warn!("no ACK from {=u8:#x}", self.mem.selector());
            return Err(Error::NoDevice);
        }
        debug!("{=str} ready", self.mem.geometry().name);
        Ok(())
    }

    /// True when the device acknowledges, false during a write cycle
    pub fn is_ready(&mut self) -> Result<bool, Error> {
        self.mem.is_ready()
    }

    /// Read `buf.len()` bytes from `offset`
    pub fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Error> {
        engine::read(&mut self.mem, &mut self.clock, offset, buf)
    }

    /// Write `data` at `offset`, one transaction per page
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), Error> {
        engine::write(&mut self.mem, &mut self.clock, offset, data)
    }

    /// Read inside the page holding `offset`
    pub fn read_page(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Error> {
        self.check_page(offset, buf.len())?;
        self.read(offset, buf)
    }

    /// Write inside the page holding `offset`
    pub fn write_page(&mut self, offset: u32, data: &[u8]) -> Result<(), Error> {
        self.check_page(offset, data.len())?;
        self.write(offset, data)
    }

    fn check_page(&self, offset: u32, len: usize) -> Result<(), Error> {
        let g = self.mem.geometry();
        if g.page_offset(offset) as usize + len > g.page_size as usize {
            return Err(Error::OutOfRange);
        }
        Ok(())
    }

    /// Poll the acknowledge until the write cycle ends
    pub fn wait_end_of_write(&mut self) -> Result<(), Error> {
        let busy = self.mem.busy_time_ms();
        self.mem.wait_ready(&mut self.clock, busy)
    }

    pub(crate) fn parts(&mut self) -> (&mut I2cMemory<T>, &mut C) {
        (&mut self.mem, &mut self.clock)
    }
}
