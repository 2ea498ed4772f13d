//! 48L512 / 48LM01 SPI EERAM
//!
//! SRAM shadowed by EEPROM with an SPI command set. Plain reads and writes
//! stream across the whole array; secure commands move one page at a time
//! with a CRC16 over address and data:
//!
//! ```text
//!  WREN ─► SWRITE page 0 + CRC ─► RDSR (SWM?) ─► WREN ─► SWRITE page 1 ...
//! ```
//!
//! Every array write, status write and user space write needs the write
//! enable latch (WEL) set by WREN; the device clears it after the command.
//! While a store or recall runs the BUSY status bit is set and the device
//! only answers status reads.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use serialmem_core::bus::SpiMemory;
use serialmem_core::{
    engine, secure, BusyRetry, Crc16, DriverState, Error, MemoryGeometry, PagedMemory,
    SoftwareCrc16, TransferStatus,
};
use serialmem_hal::{Clock, SpiConfig, SpiTransport};

/// Instruction set
pub mod opcode {
    /// Set write enable latch
    pub const WREN: u8 = 0x06;
    /// Reset write enable latch
    pub const WRDI: u8 = 0x04;
    /// Write SRAM
    pub const WRITE: u8 = 0x02;
    /// Read SRAM
    pub const READ: u8 = 0x03;
    /// Secure write with CRC
    pub const SWRITE: u8 = 0x12;
    /// Secure read with CRC
    pub const SREAD: u8 = 0x13;
    /// Write status register
    pub const WRSR: u8 = 0x01;
    /// Read status register
    pub const RDSR: u8 = 0x05;
    /// Copy SRAM to EEPROM
    pub const STORE: u8 = 0x08;
    /// Copy EEPROM to SRAM
    pub const RECALL: u8 = 0x09;
    /// Write nonvolatile user space
    pub const WRNUR: u8 = 0xC2;
    /// Read nonvolatile user space
    pub const RDNUR: u8 = 0xC3;
    /// Enter hibernate
    pub const HBRNT: u8 = 0xB9;
}

/// Status register bits
pub mod status {
    /// Store or recall running
    pub const BUSY: u8 = 0x01;
    /// Write enable latch
    pub const WEL: u8 = 0x02;
    pub const BP_MASK: u8 = 0x0C;
    pub const BP_SHIFT: u8 = 2;
    /// Last secure write failed its CRC check
    pub const SWM: u8 = 0x10;
    /// Auto-store disabled
    pub const ASE_DISABLE: u8 = 0x40;
}

/// Nonvolatile user space size in bytes
pub const USER_SPACE_LEN: usize = 16;

/// Write-protected part of the SRAM
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BlockProtect {
    #[default]
    None = 0,
    UpperQuarter = 1,
    UpperHalf = 2,
    All = 3,
}

impl BlockProtect {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => BlockProtect::None,
            1 => BlockProtect::UpperQuarter,
            2 => BlockProtect::UpperHalf,
            _ => BlockProtect::All,
        }
    }
}

/// Decoded status register
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Eeram48Status {
    pub busy: bool,
    pub write_enabled: bool,
    pub block_protect: BlockProtect,
    pub secure_write_failed: bool,
    pub auto_store: bool,
}

impl Eeram48Status {
    /// Decode a raw register value
    pub fn from_register(value: u8) -> Self {
        Self {
            busy: value & status::BUSY != 0,
            write_enabled: value & status::WEL != 0,
            block_protect: BlockProtect::from_bits((value & status::BP_MASK) >> status::BP_SHIFT),
            secure_write_failed: value & status::SWM != 0,
            auto_store: value & status::ASE_DISABLE == 0,
        }
    }

    /// Writable bits as a raw register value
    pub fn to_register(&self) -> u8 {
        let mut value = (self.block_protect as u8) << status::BP_SHIFT;
        if !self.auto_store {
            value |= status::ASE_DISABLE;
        }
        value
    }
}

/// SPI EERAM variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Eeram48Model {
    /// 512 Kbit, 64-byte secure page
    L512,
    /// 1 Mbit, 128-byte secure page
    LM01,
}

impl Eeram48Model {
    pub fn geometry(self) -> &'static MemoryGeometry {
        use serialmem_core::geometry;
        match self {
            Eeram48Model::L512 => &geometry::EERAM48L512,
            Eeram48Model::LM01 => &geometry::EERAM48LM01,
        }
    }
}

/// SPI EERAM configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Eeram48Config {
    /// Chip select index on the bus
    pub chip_select: u8,
    /// SCK frequency in Hz
    pub clock_hz: u32,
}

impl Default for Eeram48Config {
    fn default() -> Self {
        Self {
            chip_select: 0,
            clock_hz: 20_000_000,
        }
    }
}

/// One engine run over the device
///
/// Borrows the pieces of the driver the transfer needs so the clock can be
/// handed to the engine separately.
struct Session<'a, T, K: ?Sized> {
    mem: &'a mut SpiMemory<T>,
    state: &'a mut DriverState,
    crc: &'a mut K,
    /// Re-issue WREN before each secure page
    relatch: bool,
}

impl<T: SpiTransport, K: Crc16 + ?Sized> Session<'_, T, K> {
    fn read_status(&mut self) -> Result<u8, Error> {
        let mut value = [0u8; 1];
        self.mem.read_register(opcode::RDSR, &mut value)?;
        self.state.write_enable_latched = false;
        Ok(value[0])
    }

    /// NotReady while a started store or recall still runs
    fn settle(&mut self) -> Result<(), Error> {
        if !self.state.operation_pending {
            return Ok(());
        }
        if self.read_status()? & status::BUSY != 0 {
            return Err(Error::NotReady);
        }
        debug!("store/recall done");
        self.state.operation_pending = false;
        Ok(())
    }
}

impl<T: SpiTransport, K: Crc16 + ?Sized> PagedMemory for Session<'_, T, K> {
    fn geometry(&self) -> &MemoryGeometry {
        self.mem.geometry()
    }

    // Plain commands stream over the whole array
    fn slice_size(&self) -> u32 {
        self.mem.geometry().total_size
    }

    fn read_slice(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Error> {
        self.settle()?;
        self.mem.read(opcode::READ, offset, buf)?;
        self.state.write_enable_latched = false;
        Ok(())
    }

    fn write_slice(&mut self, offset: u32, data: &[u8]) -> Result<(), Error> {
        self.settle()?;
        self.mem.write(opcode::WRITE, offset, data)?;
        self.state.write_enable_latched = false;
        Ok(())
    }

    fn read_secure_slice(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Error> {
        self.settle()?;
        let result = self.mem.read_crc(self.crc, opcode::SREAD, offset, buf);
        self.state.write_enable_latched = false;
        result
    }

    fn write_secure_slice(&mut self, offset: u32, data: &[u8]) -> Result<(), Error> {
        self.settle()?;
        if self.relatch && !self.state.write_enable_latched {
            self.mem.command(opcode::WREN)?;
        }
        self.mem.write_crc(self.crc, opcode::SWRITE, offset, data)?;
        self.state.write_enable_latched = false;
        Ok(())
    }

    fn secure_write_verdict(&mut self) -> Result<(), Error> {
        if self.read_status()? & status::SWM != 0 {
            warn!("device rejected secure page CRC");
            return Err(Error::Crc);
        }
        Ok(())
    }
}

/// 48Lxxx SPI EERAM driver
///
/// `K` computes the CRC of secure transfers; plug a hardware CRC unit in
/// with [`Eeram48::with_crc`].
pub struct Eeram48<T, C, K = SoftwareCrc16> {
    mem: SpiMemory<T>,
    clock: C,
    crc: K,
    state: DriverState,
}

impl<T: SpiTransport, C: Clock> Eeram48<T, C> {
    /// Create a driver with the software CRC
    pub fn new(transport: T, clock: C, model: Eeram48Model, config: Eeram48Config) -> Self {
        Self::with_crc(transport, clock, model, config, SoftwareCrc16)
    }
}

impl<T: SpiTransport, C: Clock, K: Crc16> Eeram48<T, C, K> {
    /// Create a driver with a custom CRC16 implementation
    pub fn with_crc(
        transport: T,
        clock: C,
        model: Eeram48Model,
        config: Eeram48Config,
        crc: K,
    ) -> Self {
        Self {
            mem: SpiMemory::new(
                transport,
                model.geometry(),
                config.chip_select,
                SpiConfig::mode0(config.clock_hz),
            ),
            clock,
            crc,
            state: DriverState::default(),
        }
    }

    /// Model description
    pub fn geometry(&self) -> &'static MemoryGeometry {
        self.mem.geometry()
    }

    /// Tracked driver state
    pub fn state(&self) -> &DriverState {
        &self.state
    }

    /// Give the transport and clock back
    pub fn release(self) -> (T, C) {
        (self.mem.release(), self.clock)
    }

    /// Check the clock and configure the bus
    pub fn init(&mut self) -> Result<(), Error> {
        self.mem.init()?;
        self.state = DriverState::default();
        Ok(())
    }

    fn session(&mut self, relatch: bool) -> (Session<'_, T, K>, &mut C) {
        let session = Session {
            mem: &mut self.mem,
            state: &mut self.state,
            crc: &mut self.crc,
            relatch,
        };
        (session, &mut self.clock)
    }

    /// Wait out a store or recall started without waiting
    fn ready(&mut self) -> Result<(), Error> {
        if !self.state.operation_pending {
            return Ok(());
        }
        let busy = self.mem.geometry().write_time_ms;
        let (mut session, clock) = self.session(false);
        BusyRetry::new(busy).attempt(clock, || session.settle())
    }

    /// Read the SRAM
    pub fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Error> {
        let (mut session, clock) = self.session(false);
        engine::read(&mut session, clock, offset, buf)
    }

    /// Write the SRAM
    ///
    /// Call [`set_write_enable`](Self::set_write_enable) first; the
    /// device ignores the write otherwise.
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), Error> {
        let (mut session, clock) = self.session(false);
        engine::write(&mut session, clock, offset, data)
    }

    /// Read whole secure pages, checking each page CRC
    pub fn read_secure(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Error> {
        let (mut session, clock) = self.session(false);
        secure::read_secure(&mut session, clock, offset, buf)
    }

    /// Write whole secure pages, each checked by the device
    ///
    /// When the write enable latch is set on entry it is set again before
    /// every following page.
    pub fn write_secure(&mut self, offset: u32, data: &[u8]) -> Result<(), Error> {
        let relatch = self.state.write_enable_latched;
        let (mut session, clock) = self.session(relatch);
        secure::write_secure(&mut session, clock, offset, data)
    }

    /// Non-blocking SRAM read; call again until [`TransferStatus::Complete`]
    pub fn read_dma(&mut self, offset: u32, buf: &mut [u8]) -> Result<TransferStatus, Error> {
        if !self.state.dma_in_progress {
            self.ready()?;
            self.state.write_enable_latched = false;
        }
        self.mem.read_dma(&mut self.state, opcode::READ, offset, buf)
    }

    /// Non-blocking SRAM write; call again until [`TransferStatus::Complete`]
    pub fn write_dma(&mut self, offset: u32, data: &[u8]) -> Result<TransferStatus, Error> {
        if !self.state.dma_in_progress {
            self.ready()?;
            self.state.write_enable_latched = false;
        }
        self.mem.write_dma(&mut self.state, opcode::WRITE, offset, data)
    }

    /// Read the 16-byte nonvolatile user space
    pub fn read_nonvolatile_user_space(
        &mut self,
        buf: &mut [u8; USER_SPACE_LEN],
    ) -> Result<(), Error> {
        self.ready()?;
        self.mem.read_register(opcode::RDNUR, buf)?;
        self.state.write_enable_latched = false;
        Ok(())
    }

    /// Write the 16-byte nonvolatile user space (needs write enable)
    pub fn write_nonvolatile_user_space(
        &mut self,
        data: &[u8; USER_SPACE_LEN],
    ) -> Result<(), Error> {
        self.ready()?;
        self.mem.write_register(opcode::WRNUR, data)?;
        self.state.write_enable_latched = false;
        Ok(())
    }

    /// Set the write enable latch
    pub fn set_write_enable(&mut self) -> Result<(), Error> {
        self.ready()?;
        self.mem.command(opcode::WREN)?;
        self.state.write_enable_latched = true;
        Ok(())
    }

    /// Reset the write enable latch
    pub fn clear_write_enable(&mut self) -> Result<(), Error> {
        self.ready()?;
        self.mem.command(opcode::WRDI)?;
        self.state.write_enable_latched = false;
        Ok(())
    }

    /// Raw status register, readable at any time
    pub fn read_register(&mut self) -> Result<u8, Error> {
        let (mut session, _) = self.session(false);
        let value = session.read_status()?;
        if value & status::BUSY == 0 {
            session.state.operation_pending = false;
        }
        Ok(value)
    }

    /// Decoded status register
    pub fn read_status(&mut self) -> Result<Eeram48Status, Error> {
        self.read_register().map(Eeram48Status::from_register)
    }

    /// Write the status register (needs write enable)
    pub fn write_status(&mut self, value: u8) -> Result<(), Error> {
        self.ready()?;
        self.mem.write_register(opcode::WRSR, &[value])?;
        self.state.write_enable_latched = false;
        Ok(())
    }

    fn update_status(&mut self, f: impl FnOnce(&mut Eeram48Status)) -> Result<(), Error> {
        let mut status = self.read_status()?;
        f(&mut status);
        self.set_write_enable()?;
        self.write_status(status.to_register())
    }

    /// Enable or disable store on power loss
    pub fn set_auto_store(&mut self, enable: bool) -> Result<(), Error> {
        self.update_status(|s| s.auto_store = enable)
    }

    /// Set the write-protected part of the SRAM
    pub fn set_block_protect(&mut self, protect: BlockProtect) -> Result<(), Error> {
        self.update_status(|s| s.block_protect = protect)
    }

    fn run(&mut self, op: u8, time_ms: u32, wait: bool) -> Result<(), Error> {
        self.ready()?;
        self.mem.command(op)?;
        self.state.write_enable_latched = false;
        if !wait {
            self.state.operation_pending = true;
            return Ok(());
        }
        let (mut session, clock) = self.session(false);
        BusyRetry::new(time_ms).attempt(clock, || {
            if session.read_status()? & status::BUSY != 0 {
                return Err(Error::NotReady);
            }
            Ok(())
        })
    }

    /// Copy the SRAM to EEPROM
    ///
    /// Without `wait` the next command first waits for the store to end.
    pub fn store(&mut self, wait: bool) -> Result<(), Error> {
        debug!("store, wait={=bool}", wait);
        let time = self.mem.geometry().write_time_ms;
        self.run(opcode::STORE, time, wait)
    }

    /// Copy the EEPROM to SRAM
    pub fn recall(&mut self, wait: bool) -> Result<(), Error> {
        debug!("recall, wait={=bool}", wait);
        let time = self.mem.geometry().recall_time_ms;
        self.run(opcode::RECALL, time, wait)
    }

    /// Enter hibernate; any chip select wakes the device
    pub fn hibernate(&mut self) -> Result<(), Error> {
        self.ready()?;
        self.mem.command(opcode::HBRNT)?;
        self.state.write_enable_latched = false;
        Ok(())
    }
}
