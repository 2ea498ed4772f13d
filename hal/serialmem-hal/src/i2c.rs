//! I2C transport abstractions
//!
//! Memory chips are driven with explicit start/stop control: the memory
//! address goes out in one packet without a stop, and the data phase
//! follows in a second packet (repeated start for reads, continued write
//! for writes). Transports that can only issue whole transactions buffer
//! the first part until the stop arrives, see [`crate::ehal::EhalI2c`].

use crate::error::BusError;

/// Read bit of the 8-bit chip address
pub const READ_BIT: u8 = 0x01;

/// Mask of the 7 address bits in the 8-bit chip address form
pub const ADDRESS_MASK: u8 = 0xFE;

/// Position of a packet inside a two-part transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferKind {
    /// Self-contained packet
    Simple,
    /// Memory address phase of a read
    WriteThenReadFirst,
    /// Data phase of a read (repeated start)
    WriteThenReadSecond,
    /// Memory address phase of a write
    WriteThenWriteFirst,
    /// Data phase of a write (no restart)
    WriteThenWriteSecond,
}

/// Data carried by one packet
#[derive(Debug)]
pub enum I2cBuffer<'a> {
    /// Address-only packet (ACK polling)
    None,
    /// Bytes to send
    Write(&'a [u8]),
    /// Bytes to receive
    Read(&'a mut [u8]),
}

impl I2cBuffer<'_> {
    /// Number of data bytes in the packet
    pub fn len(&self) -> usize {
        match self {
            I2cBuffer::None => 0,
            I2cBuffer::Write(data) => data.len(),
            I2cBuffer::Read(buf) => buf.len(),
        }
    }

    /// True when the packet carries no data bytes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One I2C packet
#[derive(Debug)]
pub struct I2cPacket<'a> {
    /// 8-bit chip address, bit 0 set for reads
    pub chip_address: u8,
    /// Emit a (repeated) start condition before the address
    pub start: bool,
    /// Emit a stop condition after the last byte
    pub stop: bool,
    /// Payload
    pub buffer: I2cBuffer<'a>,
    /// Position inside a two-part transaction
    pub kind: TransferKind,
    /// Ask the transport to run the packet in the background (DMA)
    pub non_blocking: bool,
    /// 6-bit transaction number, assigned by the transport for
    /// non-blocking packets and used to poll them afterwards
    pub transaction_id: u8,
}

impl<'a> I2cPacket<'a> {
    /// Address-only packet, used to poll the device acknowledge
    pub fn probe(chip_address: u8) -> Self {
        Self::new(chip_address & ADDRESS_MASK, I2cBuffer::None)
    }

    /// Single write packet with start and stop
    pub fn write(chip_address: u8, data: &'a [u8]) -> Self {
        Self::new(chip_address & ADDRESS_MASK, I2cBuffer::Write(data))
    }

    /// Single read packet with start and stop
    pub fn read(chip_address: u8, buf: &'a mut [u8]) -> Self {
        Self::new(chip_address | READ_BIT, I2cBuffer::Read(buf))
    }

    fn new(chip_address: u8, buffer: I2cBuffer<'a>) -> Self {
        Self {
            chip_address,
            start: true,
            stop: true,
            buffer,
            kind: TransferKind::Simple,
            non_blocking: false,
            transaction_id: 0,
        }
    }

    /// Mark the packet as part of a two-part transaction
    ///
    /// First parts keep the bus (no stop). A write data phase continues
    /// without a start condition; a read data phase uses a repeated start.
    pub fn with_kind(mut self, kind: TransferKind) -> Self {
        self.kind = kind;
        match kind {
            TransferKind::WriteThenReadFirst | TransferKind::WriteThenWriteFirst => {
                self.stop = false;
            }
            TransferKind::WriteThenWriteSecond => {
                self.start = false;
            }
            TransferKind::Simple | TransferKind::WriteThenReadSecond => {}
        }
        self
    }

    /// Run the packet in the background, polling with `transaction_id`
    pub fn non_blocking(mut self, transaction_id: u8) -> Self {
        self.non_blocking = true;
        self.transaction_id = transaction_id & 0x3F;
        self
    }

    /// True for read packets
    pub fn is_read(&self) -> bool {
        self.chip_address & READ_BIT != 0
    }

    /// 7-bit form of the chip address
    pub fn address_7bit(&self) -> u8 {
        self.chip_address >> 1
    }
}

/// I2C master able to drive memory transactions
pub trait I2cTransport {
    /// Configure the bus for the given SCL frequency
    fn init(&mut self, clock_hz: u32) -> Result<(), BusError>;

    /// Issue one packet
    ///
    /// A NACK must be reported with the byte it happened on so that the
    /// caller can distinguish a busy device from a refused address.
    /// Non-blocking packets return [`BusError::Busy`] while they run.
    fn transfer(&mut self, packet: &mut I2cPacket<'_>) -> Result<(), BusError>;
}

impl<T: I2cTransport + ?Sized> I2cTransport for &mut T {
    fn init(&mut self, clock_hz: u32) -> Result<(), BusError> {
        T::init(self, clock_hz)
    }

    fn transfer(&mut self, packet: &mut I2cPacket<'_>) -> Result<(), BusError> {
        T::transfer(self, packet)
    }
}

/// I2C configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl I2cConfig {
    /// Standard mode (100 kHz)
    pub const STANDARD: Self = Self { frequency: 100_000 };

    /// Fast mode (400 kHz)
    pub const FAST: Self = Self { frequency: 400_000 };

    /// Fast mode plus (1 MHz)
    pub const FAST_PLUS: Self = Self {
        frequency: 1_000_000,
    };
}
