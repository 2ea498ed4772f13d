//! SPI memory protocol
//!
//! A command is a run of packets under one chip select assertion:
//!
//! ```text
//!  CS  ▔▔╲____________________________________╱▔▔
//!         │ opcode │ address │ dummy │ data.. │
//!          ─────────────────   ─────   ──────
//!           header packet      option  terminate
//! ```
//!
//! The dummy byte only appears on reads in multi-lane I/O modes. Secure
//! commands append a CRC packet after the data. A packet that fails ends
//! the command; the transport has already released chip select (see
//! [`SpiTransport::transfer`]).

use serialmem_hal::{Lanes, SpiConfig, SpiPacket, SpiTransport};

use crate::address::compose;
use crate::crc::Crc16;
use crate::error::Error;
use crate::geometry::MemoryGeometry;
use crate::secure::{seal, verify};
use crate::state::{DriverState, TransferStatus};

/// An SPI memory device behind a transport
#[derive(Debug)]
pub struct SpiMemory<T> {
    transport: T,
    geometry: &'static MemoryGeometry,
    chip_select: u8,
    config: SpiConfig,
    dummy_bytes: u8,
}

impl<T: SpiTransport> SpiMemory<T> {
    /// Bind a transport to the device on `chip_select`
    pub fn new(
        transport: T,
        geometry: &'static MemoryGeometry,
        chip_select: u8,
        config: SpiConfig,
    ) -> Self {
        Self {
            transport,
            geometry,
            chip_select,
            config,
            dummy_bytes: 0,
        }
    }

    /// Model description
    pub fn geometry(&self) -> &'static MemoryGeometry {
        self.geometry
    }

    /// Current bus configuration
    pub fn config(&self) -> &SpiConfig {
        &self.config
    }

    /// Give the transport back
    pub fn release(self) -> T {
        self.transport
    }

    /// Check the clock against the model and configure the bus
    pub fn init(&mut self) -> Result<(), Error> {
        self.check_clock()?;
        self.transport.init(self.chip_select, &self.config)?;
        Ok(())
    }

    /// Fail with [`Error::ClockTooFast`] above the model maximum
    pub fn check_clock(&self) -> Result<(), Error> {
        if self.config.frequency > self.geometry.max_clock_hz {
            warn!(
                "{=u32} Hz above {=u32} Hz maximum",
                self.config.frequency,
                self.geometry.max_clock_hz
            );
            return Err(Error::ClockTooFast);
        }
        Ok(())
    }

    /// Reconfigure the bus for a different lane count
    pub fn reconfigure(&mut self, lanes: Lanes) -> Result<(), Error> {
        self.config = self.config.with_lanes(lanes);
        self.transport.init(self.chip_select, &self.config)?;
        Ok(())
    }

    /// Dummy bytes clocked between address and data on reads
    pub fn set_dummy_bytes(&mut self, count: u8) {
        self.dummy_bytes = count;
    }

    fn send(&mut self, mut packet: SpiPacket<'_>) -> Result<(), Error> {
        self.transport.transfer(&mut packet)?;
        Ok(())
    }

    /// Single-byte instruction
    pub fn command(&mut self, opcode: u8) -> Result<(), Error> {
        let cs = self.chip_select;
        self.send(SpiPacket::write(cs, &[opcode]).terminated())
    }

    /// Instruction followed by a register read
    pub fn read_register(&mut self, opcode: u8, buf: &mut [u8]) -> Result<(), Error> {
        let cs = self.chip_select;
        self.send(SpiPacket::write(cs, &[opcode]))?;
        self.send(SpiPacket::read(cs, buf).terminated())
    }

    /// Instruction followed by a register write
    pub fn write_register(&mut self, opcode: u8, data: &[u8]) -> Result<(), Error> {
        let cs = self.chip_select;
        self.send(SpiPacket::write(cs, &[opcode]))?;
        self.send(SpiPacket::write(cs, data).terminated())
    }

    fn header(&mut self, opcode: u8, offset: u32) -> Result<(), Error> {
        let cs = self.chip_select;
        let header = compose(self.geometry, 0, offset).with_opcode(opcode);
        self.send(SpiPacket::write(cs, &header))
    }

    fn dummy(&mut self) -> Result<(), Error> {
        let cs = self.chip_select;
        for _ in 0..self.dummy_bytes {
            let mut byte = [0u8; 1];
            self.send(SpiPacket::read(cs, &mut byte))?;
        }
        Ok(())
    }

    /// Addressed read
    pub fn read(&mut self, opcode: u8, offset: u32, buf: &mut [u8]) -> Result<(), Error> {
        let cs = self.chip_select;
        self.header(opcode, offset)?;
        self.dummy()?;
        self.send(SpiPacket::read(cs, buf).terminated())
    }

    /// Addressed write
    pub fn write(&mut self, opcode: u8, offset: u32, data: &[u8]) -> Result<(), Error> {
        let cs = self.chip_select;
        self.header(opcode, offset)?;
        self.send(SpiPacket::write(cs, data).terminated())
    }

    /// Addressed read followed by the device CRC, checked locally
    pub fn read_crc<H: Crc16 + ?Sized>(
        &mut self,
        hasher: &mut H,
        opcode: u8,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<(), Error> {
        let cs = self.chip_select;
        self.header(opcode, offset)?;
        self.dummy()?;
        self.send(SpiPacket::read(cs, buf))?;
        let mut received = [0u8; 2];
        self.send(SpiPacket::read(cs, &mut received).terminated())?;
        verify(hasher, offset, self.geometry.address_bits(), buf, received)
    }

    /// Addressed write followed by the CRC of address and data
    pub fn write_crc<H: Crc16 + ?Sized>(
        &mut self,
        hasher: &mut H,
        opcode: u8,
        offset: u32,
        data: &[u8],
    ) -> Result<(), Error> {
        let cs = self.chip_select;
        let crc = seal(hasher, offset, self.geometry.address_bits(), data);
        self.header(opcode, offset)?;
        self.send(SpiPacket::write(cs, data))?;
        self.send(SpiPacket::write(cs, &crc).terminated())
    }

    /// Non-blocking addressed read, polled by calling it again
    pub fn read_dma(
        &mut self,
        state: &mut DriverState,
        opcode: u8,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<TransferStatus, Error> {
        if state.dma_in_progress {
            return self.poll_dma(state);
        }
        self.geometry.check_range(offset, buf.len())?;
        self.header(opcode, offset)?;
        self.dummy()?;

        let mut packet = SpiPacket::read(self.chip_select, buf).non_blocking(0).terminated();
        let result = self.transport.transfer(&mut packet);
        let id = packet.transaction_id;
        state.start_dma(result, id)
    }

    /// Non-blocking addressed write, polled by calling it again
    pub fn write_dma(
        &mut self,
        state: &mut DriverState,
        opcode: u8,
        offset: u32,
        data: &[u8],
    ) -> Result<TransferStatus, Error> {
        if state.dma_in_progress {
            return self.poll_dma(state);
        }
        self.geometry.check_range(offset, data.len())?;
        self.header(opcode, offset)?;

        let mut packet = SpiPacket::write(self.chip_select, data).non_blocking(0).terminated();
        let result = self.transport.transfer(&mut packet);
        let id = packet.transaction_id;
        state.start_dma(result, id)
    }

    fn poll_dma(&mut self, state: &mut DriverState) -> Result<TransferStatus, Error> {
        let mut packet = SpiPacket::poll(self.chip_select, state.transaction_id);
        let result = self.transport.transfer(&mut packet);
        state.poll_dma(result)
    }
}
