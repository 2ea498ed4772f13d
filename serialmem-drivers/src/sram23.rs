//! 23xxxx SPI SRAM
//!
//! Plain SRAM, no busy cycle. Larger parts also talk over two (SDI) or four
//! (SQI) data lines; reads in those modes carry one dummy byte between the
//! address and the data:
//!
//! ```text
//!  SPI:      READ │ addr │ data..
//!  SDI/SQI:  READ │ addr │ dummy │ data..
//! ```
//!
//! The operation mode in the status register decides how far one command
//! may run: a single byte, one 32-byte page (wrapping inside it) or the
//! whole array.
//!
//! | Parts               | I/O modes     | HOLD pin |
//! |---------------------|---------------|----------|
//! | 23x640, 23x256      | SPI           | yes      |
//! | 23x512, 23x1024     | SPI, SDI, SQI | no       |
//! | 23LCV512, 23LCV1024 | SPI, SDI      | no       |

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use serialmem_core::bus::SpiMemory;
use serialmem_core::{
    engine, DriverState, Error, MemoryGeometry, PageSlices, PagedMemory, TransferStatus,
};
use serialmem_hal::{Lanes, SpiConfig, SpiTransport};

/// Instruction set
pub mod opcode {
    pub const READ: u8 = 0x03;
    pub const WRITE: u8 = 0x02;
    /// Enter SDI mode
    pub const EDIO: u8 = 0x3B;
    /// Enter SQI mode
    pub const EQIO: u8 = 0x38;
    /// Back to SPI mode, recognised in every mode
    pub const RSTIO: u8 = 0xFF;
    pub const RDSR: u8 = 0x05;
    pub const WRSR: u8 = 0x01;
}

/// Status register bits
pub mod status {
    /// HOLD pin disabled (parts with a HOLD pin)
    pub const HOLD_DISABLE: u8 = 0x01;
    pub const MODE_SHIFT: u8 = 6;
    pub const MODE_MASK: u8 = 0xC0;
}

/// Bus I/O mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IoMode {
    /// One data line each way
    #[default]
    Spi,
    /// Two bidirectional lines
    Sdi,
    /// Four bidirectional lines
    Sqi,
}

impl IoMode {
    /// Lane count the bus must be configured with
    pub fn lanes(self) -> Lanes {
        match self {
            IoMode::Spi => Lanes::Single,
            IoMode::Sdi => Lanes::Dual,
            IoMode::Sqi => Lanes::Quad,
        }
    }

    /// True when `geometry` offers this mode
    pub fn is_supported_by(self, geometry: &MemoryGeometry) -> bool {
        match self {
            IoMode::Spi => true,
            IoMode::Sdi => geometry.dual_io,
            IoMode::Sqi => geometry.quad_io,
        }
    }
}

/// How far one command runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OperationMode {
    /// One byte per command
    Byte = 0,
    /// Whole array, wrapping at the end
    #[default]
    Sequential = 1,
    /// One page, wrapping inside it
    Page = 2,
}

/// Decoded status register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sram23Status {
    pub operation_mode: OperationMode,
    pub hold_disabled: bool,
}

impl Sram23Status {
    /// Decode a raw register value; the reserved mode reads as sequential
    pub fn from_register(value: u8) -> Self {
        let operation_mode = match (value & status::MODE_MASK) >> status::MODE_SHIFT {
            0 => OperationMode::Byte,
            2 => OperationMode::Page,
            _ => OperationMode::Sequential,
        };
        Self {
            operation_mode,
            hold_disabled: value & status::HOLD_DISABLE != 0,
        }
    }
}

/// SPI SRAM configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sram23Config {
    /// Chip select index on the bus
    pub chip_select: u8,
    /// SCK frequency in Hz
    pub clock_hz: u32,
    /// Force the device back to SPI during init (after an MCU reset the
    /// SRAM may still be in SDI or SQI)
    pub recover_bus: bool,
    pub io_mode: IoMode,
    pub operation_mode: OperationMode,
    /// Disable the HOLD pin on parts that have one
    pub disable_hold: bool,
}

impl Default for Sram23Config {
    fn default() -> Self {
        Self {
            chip_select: 0,
            clock_hz: 20_000_000,
            recover_bus: false,
            io_mode: IoMode::Spi,
            operation_mode: OperationMode::Sequential,
            disable_hold: false,
        }
    }
}

/// Array view the engine drives; slice size follows the operation mode
struct Array<'a, T> {
    mem: &'a mut SpiMemory<T>,
    mode: OperationMode,
}

impl<T: SpiTransport> PagedMemory for Array<'_, T> {
    fn geometry(&self) -> &MemoryGeometry {
        self.mem.geometry()
    }

    fn slice_size(&self) -> u32 {
        slice_size(self.mem.geometry(), self.mode)
    }

    fn busy_time_ms(&self) -> u32 {
        0
    }

    fn read_slice(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Error> {
        self.mem.read(opcode::READ, offset, buf)
    }

    fn write_slice(&mut self, offset: u32, data: &[u8]) -> Result<(), Error> {
        self.mem.write(opcode::WRITE, offset, data)
    }
}

fn slice_size(geometry: &MemoryGeometry, mode: OperationMode) -> u32 {
    match mode {
        OperationMode::Byte => 1,
        OperationMode::Page => geometry.page_size,
        OperationMode::Sequential => geometry.total_size,
    }
}

/// 23xxxx SPI SRAM driver
pub struct Sram23<T> {
    mem: SpiMemory<T>,
    state: DriverState,
    io_mode: IoMode,
    operation_mode: OperationMode,
    config: Sram23Config,
}

impl<T: SpiTransport> Sram23<T> {
    pub fn new(transport: T, geometry: &'static MemoryGeometry, config: Sram23Config) -> Self {
        Self {
            mem: SpiMemory::new(
                transport,
                geometry,
                config.chip_select,
                SpiConfig::mode0(config.clock_hz),
            ),
            state: DriverState::default(),
            io_mode: IoMode::Spi,
            operation_mode: OperationMode::Sequential,
            config,
        }
    }

    /// Model description
    pub fn geometry(&self) -> &'static MemoryGeometry {
        self.mem.geometry()
    }

    /// Current I/O mode
    pub fn io_mode(&self) -> IoMode {
        self.io_mode
    }

    /// Current operation mode
    pub fn operation_mode(&self) -> OperationMode {
        self.operation_mode
    }

    /// Give the transport back
    pub fn release(self) -> T {
        self.mem.release()
    }

    /// Bring the device to the configured I/O and operation modes
    pub fn init(&mut self) -> Result<(), Error> {
        self.mem.init()?;
        self.state = DriverState::default();
        let g = self.mem.geometry();

        if self.config.recover_bus {
            debug!("recovering {=str} to SPI", g.name);
            if g.dual_io {
                self.mem.reconfigure(Lanes::Dual)?;
                self.mem.command(opcode::RSTIO)?;
            }
            if g.quad_io {
                self.mem.reconfigure(Lanes::Quad)?;
                self.mem.command(opcode::RSTIO)?;
            }
            self.mem.reconfigure(Lanes::Single)?;
        }
        self.io_mode = IoMode::Spi;
        self.mem.set_dummy_bytes(0);

        self.set_io_mode(self.config.io_mode)?;
        self.set_operation_mode(self.config.operation_mode, self.config.disable_hold)
    }

    /// Switch the device and the bus to `mode`
    pub fn set_io_mode(&mut self, mode: IoMode) -> Result<(), Error> {
        self.mem.check_clock()?;
        if !mode.is_supported_by(self.mem.geometry()) {
            warn!("I/O mode not offered by {=str}", self.mem.geometry().name);
            return Err(Error::Unsupported);
        }

        if self.io_mode != IoMode::Spi {
            self.mem.command(opcode::RSTIO)?;
            if mode != IoMode::Spi {
                self.mem.reconfigure(Lanes::Single)?;
            }
        }
        match mode {
            IoMode::Sdi => self.mem.command(opcode::EDIO)?,
            IoMode::Sqi => self.mem.command(opcode::EQIO)?,
            IoMode::Spi => {}
        }
        self.mem.reconfigure(mode.lanes())?;
        self.mem.set_dummy_bytes(if mode == IoMode::Spi { 0 } else { 1 });
        self.io_mode = mode;
        Ok(())
    }

    /// Write the operation mode, and the HOLD disable bit on parts with a
    /// HOLD pin
    pub fn set_operation_mode(
        &mut self,
        mode: OperationMode,
        disable_hold: bool,
    ) -> Result<(), Error> {
        let mut value = (mode as u8) << status::MODE_SHIFT;
        if disable_hold && self.mem.geometry().hold_pin {
            value |= status::HOLD_DISABLE;
        }
        self.write_status(value)?;
        self.operation_mode = mode;
        Ok(())
    }

    fn array(&mut self) -> Array<'_, T> {
        Array {
            mem: &mut self.mem,
            mode: self.operation_mode,
        }
    }

    /// Read `buf.len()` bytes from `offset`
    pub fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Error> {
        let mut idle = || 0u32;
        engine::read(&mut self.array(), &mut idle, offset, buf)
    }

    /// Write `data` at `offset`
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), Error> {
        let mut idle = || 0u32;
        engine::write(&mut self.array(), &mut idle, offset, data)
    }

    /// Fail unless the request fits one command in the current mode
    fn check_single(&self, offset: u32, len: usize) -> Result<(), Error> {
        let unit = slice_size(self.mem.geometry(), self.operation_mode);
        if PageSlices::new(unit, offset, len).count() > 1 {
            return Err(Error::OutOfRange);
        }
        Ok(())
    }

    /// Non-blocking read of one command's worth of data
    pub fn read_dma(&mut self, offset: u32, buf: &mut [u8]) -> Result<TransferStatus, Error> {
        if !self.state.dma_in_progress {
            self.check_single(offset, buf.len())?;
        }
        self.mem.read_dma(&mut self.state, opcode::READ, offset, buf)
    }

    /// Non-blocking write of one command's worth of data
    pub fn write_dma(&mut self, offset: u32, data: &[u8]) -> Result<TransferStatus, Error> {
        if !self.state.dma_in_progress {
            self.check_single(offset, data.len())?;
        }
        self.mem.write_dma(&mut self.state, opcode::WRITE, offset, data)
    }

    /// Raw status register
    pub fn read_register(&mut self) -> Result<u8, Error> {
        let mut value = [0u8; 1];
        self.mem.read_register(opcode::RDSR, &mut value)?;
        Ok(value[0])
    }

    /// Decoded status register
    pub fn read_status(&mut self) -> Result<Sram23Status, Error> {
        self.read_register().map(Sram23Status::from_register)
    }

    /// Write the raw status register
    pub fn write_status(&mut self, value: u8) -> Result<(), Error> {
        self.mem.write_register(opcode::WRSR, &[value])
    }

    /// Send a bare instruction
    ///
    /// The driver does not track mode changes made this way; use
    /// [`set_io_mode`](Self::set_io_mode) for EDIO, EQIO and RSTIO.
    pub fn write_instruction(&mut self, instruction: u8) -> Result<(), Error> {
        self.mem.command(instruction)
    }
}
