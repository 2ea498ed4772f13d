//! SPI transport abstractions
//!
//! A memory command is a sequence of packets sharing one chip-select
//! assertion: opcode and address first, then data. The chip select is
//! released after the packet flagged `terminate`.

use crate::error::BusError;

/// Data carried by one packet
#[derive(Debug)]
pub enum SpiBuffer<'a> {
    /// No data clocked (chip-select release only)
    None,
    /// Bytes to send, received bytes are discarded
    Write(&'a [u8]),
    /// Bytes to receive, the packet dummy byte is sent
    Read(&'a mut [u8]),
    /// Full duplex, the buffer is sent and overwritten
    InPlace(&'a mut [u8]),
}

impl SpiBuffer<'_> {
    /// Number of bytes clocked by the packet
    pub fn len(&self) -> usize {
        match self {
            SpiBuffer::None => 0,
            SpiBuffer::Write(data) => data.len(),
            SpiBuffer::Read(buf) | SpiBuffer::InPlace(buf) => buf.len(),
        }
    }

    /// True when no byte is clocked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One SPI packet
#[derive(Debug)]
pub struct SpiPacket<'a> {
    /// Chip select index of the device
    pub chip_select: u8,
    /// Payload
    pub buffer: SpiBuffer<'a>,
    /// Byte sent while receiving
    pub dummy_byte: u8,
    /// Release chip select after this packet
    pub terminate: bool,
    /// Ask the transport to run the packet in the background (DMA)
    pub non_blocking: bool,
    /// 6-bit transaction number, assigned by the transport for
    /// non-blocking packets and used to poll them afterwards
    pub transaction_id: u8,
}

impl<'a> SpiPacket<'a> {
    /// Packet that sends `data` and keeps chip select asserted
    pub fn write(chip_select: u8, data: &'a [u8]) -> Self {
        Self::new(chip_select, SpiBuffer::Write(data))
    }

    /// Packet that receives into `buf` and keeps chip select asserted
    pub fn read(chip_select: u8, buf: &'a mut [u8]) -> Self {
        Self::new(chip_select, SpiBuffer::Read(buf))
    }

    /// Full-duplex packet
    pub fn in_place(chip_select: u8, buf: &'a mut [u8]) -> Self {
        Self::new(chip_select, SpiBuffer::InPlace(buf))
    }

    /// Poll packet for a running non-blocking transfer
    pub fn poll(chip_select: u8, transaction_id: u8) -> Self {
        Self::new(chip_select, SpiBuffer::None)
            .non_blocking(transaction_id)
            .terminated()
    }

    fn new(chip_select: u8, buffer: SpiBuffer<'a>) -> Self {
        Self {
            chip_select,
            buffer,
            dummy_byte: 0x00,
            terminate: false,
            non_blocking: false,
            transaction_id: 0,
        }
    }

    /// Release chip select after this packet
    pub fn terminated(mut self) -> Self {
        self.terminate = true;
        self
    }

    /// Run the packet in the background, polling with `transaction_id`
    pub fn non_blocking(mut self, transaction_id: u8) -> Self {
        self.non_blocking = true;
        self.transaction_id = transaction_id & 0x3F;
        self
    }
}

/// SPI master able to drive memory commands
pub trait SpiTransport {
    /// Configure the bus for the device on `chip_select`
    fn init(&mut self, chip_select: u8, config: &SpiConfig) -> Result<(), BusError>;

    /// Issue one packet
    ///
    /// Non-blocking packets return [`BusError::Busy`] while they run.
    ///
    /// A packet that fails (other than `Busy`/`OtherBusy`) ends the command:
    /// the transport must release chip select before returning the error.
    /// Callers abandon the command and send no terminate packet after it.
    fn transfer(&mut self, packet: &mut SpiPacket<'_>) -> Result<(), BusError>;
}

impl<T: SpiTransport + ?Sized> SpiTransport for &mut T {
    fn init(&mut self, chip_select: u8, config: &SpiConfig) -> Result<(), BusError> {
        T::init(self, chip_select, config)
    }

    fn transfer(&mut self, packet: &mut SpiPacket<'_>) -> Result<(), BusError> {
        T::transfer(self, packet)
    }
}

/// SPI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
    /// Clock polarity and phase
    pub mode: Mode,
    /// Data lines used per clock
    pub lanes: Lanes,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self::mode0(1_000_000)
    }
}

impl SpiConfig {
    /// Single-lane mode 0 at `frequency`
    pub const fn mode0(frequency: u32) -> Self {
        Self {
            frequency,
            mode: Mode::Mode0,
            lanes: Lanes::Single,
        }
    }

    /// Same configuration on a different lane count
    pub const fn with_lanes(mut self, lanes: Lanes) -> Self {
        self.lanes = lanes;
        self
    }
}

/// Number of data lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Lanes {
    /// Standard SPI (MOSI/MISO)
    Single,
    /// Dual I/O (SDI)
    Dual,
    /// Quad I/O (SQI)
    Quad,
}

/// SPI clock polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Clock idles low (CPOL=0)
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

/// SPI clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Data captured on first clock transition (CPHA=0)
    CaptureOnFirstTransition,
    /// Data captured on second clock transition (CPHA=1)
    CaptureOnSecondTransition,
}

/// SPI mode (combined polarity and phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl From<Mode> for (Polarity, Phase) {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mode0 => (Polarity::IdleLow, Phase::CaptureOnFirstTransition),
            Mode::Mode1 => (Polarity::IdleLow, Phase::CaptureOnSecondTransition),
            Mode::Mode2 => (Polarity::IdleHigh, Phase::CaptureOnFirstTransition),
            Mode::Mode3 => (Polarity::IdleHigh, Phase::CaptureOnSecondTransition),
        }
    }
}

impl From<Mode> for embedded_hal::spi::Mode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mode0 => embedded_hal::spi::MODE_0,
            Mode::Mode1 => embedded_hal::spi::MODE_1,
            Mode::Mode2 => embedded_hal::spi::MODE_2,
            Mode::Mode3 => embedded_hal::spi::MODE_3,
        }
    }
}
