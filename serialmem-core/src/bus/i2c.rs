//! I2C memory protocol
//!
//! Every memory access is a two-part transaction on one chip address:
//!
//! ```text
//!  read:  S │ chip+W │ addr.. │ Sr │ chip+R │ data.. │ P
//!  write: S │ chip+W │ addr.. │ data.. │ P
//! ```
//!
//! A device in its write cycle does not acknowledge its chip address,
//! which surfaces as [`Error::NotReady`] and is retried by the engine.

use serialmem_hal::{Clock, I2cConfig, I2cPacket, I2cTransport, TransferKind};

use crate::address::compose;
use crate::engine::PagedMemory;
use crate::error::Error;
use crate::geometry::MemoryGeometry;
use crate::retry::{classify, BusyRetry, Phase};
use crate::state::{DriverState, TransferStatus};

/// An I2C memory array behind a transport
#[derive(Debug)]
pub struct I2cMemory<T> {
    transport: T,
    geometry: &'static MemoryGeometry,
    selector: u8,
    clock_hz: u32,
}

impl<T: I2cTransport> I2cMemory<T> {
    /// Bind a transport to a device strapped with `pins`
    ///
    /// `pins` uses the chip address bit positions (see
    /// [`strap_pins`](crate::geometry::strap_pins)); positions the model
    /// uses for memory address bits are ignored.
    pub fn new(
        transport: T,
        geometry: &'static MemoryGeometry,
        pins: u8,
        config: I2cConfig,
    ) -> Self {
        Self {
            transport,
            geometry,
            selector: geometry.base_address | (pins & geometry.strap_mask),
            clock_hz: config.frequency,
        }
    }

    /// Model description
    pub fn geometry(&self) -> &'static MemoryGeometry {
        self.geometry
    }

    /// 8-bit chip address of the array, folded bits cleared
    pub fn selector(&self) -> u8 {
        self.selector
    }

    /// Configured SCL frequency
    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// Give the transport back
    pub fn release(self) -> T {
        self.transport
    }

    /// Check the clock against the model and configure the bus
    pub fn init(&mut self) -> Result<(), Error> {
        if self.clock_hz > self.geometry.max_clock_hz {
            warn!(
                "{=u32} Hz above {=u32} Hz maximum",
                self.clock_hz,
                self.geometry.max_clock_hz
            );
            return Err(Error::ClockTooFast);
        }
        self.transport.init(self.clock_hz)?;
        Ok(())
    }

    /// Address-only packet to `chip_address`
    pub fn probe(&mut self, chip_address: u8) -> Result<(), Error> {
        let mut packet = I2cPacket::probe(chip_address);
        self.transport
            .transfer(&mut packet)
            .map_err(|e| classify(e, Phase::Address))
    }

    /// True when the array acknowledges its chip address
    pub fn is_ready(&mut self) -> Result<bool, Error> {
        match self.probe(self.selector) {
            Ok(()) => Ok(true),
            Err(Error::NotReady) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Poll the acknowledge until the device is ready
    pub fn wait_ready<C: Clock + ?Sized>(
        &mut self,
        clock: &mut C,
        busy_time_ms: u32,
    ) -> Result<(), Error> {
        let selector = self.selector;
        BusyRetry::new(busy_time_ms).attempt(clock, || self.probe(selector))
    }

    /// Read `buf` from `address` of `chip_address`
    pub fn read_at(
        &mut self,
        chip_address: u8,
        address: &[u8],
        buf: &mut [u8],
    ) -> Result<(), Error> {
        let mut first =
            I2cPacket::write(chip_address, address).with_kind(TransferKind::WriteThenReadFirst);
        self.transport
            .transfer(&mut first)
            .map_err(|e| classify(e, Phase::Address))?;

        let mut second =
            I2cPacket::read(chip_address, buf).with_kind(TransferKind::WriteThenReadSecond);
        self.transport
            .transfer(&mut second)
            .map_err(|e| classify(e, Phase::Data))
    }

    /// Write `data` at `address` of `chip_address`
    ///
    /// `data_phase` selects how a NACK on the data bytes is reported.
    pub fn write_at(
        &mut self,
        chip_address: u8,
        address: &[u8],
        data: &[u8],
        data_phase: Phase,
    ) -> Result<(), Error> {
        let mut first =
            I2cPacket::write(chip_address, address).with_kind(TransferKind::WriteThenWriteFirst);
        self.transport
            .transfer(&mut first)
            .map_err(|e| classify(e, Phase::Address))?;

        let mut second =
            I2cPacket::write(chip_address, data).with_kind(TransferKind::WriteThenWriteSecond);
        self.transport
            .transfer(&mut second)
            .map_err(|e| classify(e, data_phase))
    }

    /// Plain read without a preceding address
    pub fn read_current(&mut self, chip_address: u8, buf: &mut [u8]) -> Result<(), Error> {
        let mut packet = I2cPacket::read(chip_address, buf);
        self.transport
            .transfer(&mut packet)
            .map_err(|e| classify(e, Phase::Address))
    }

    /// Non-blocking read of the array, polled by calling it again
    pub fn read_dma(
        &mut self,
        state: &mut DriverState,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<TransferStatus, Error> {
        if state.dma_in_progress {
            return self.poll_dma(state);
        }
        self.geometry.check_range(offset, buf.len())?;
        let address = compose(self.geometry, self.selector, offset);

        let mut first = I2cPacket::write(address.chip_address, address.as_bytes())
            .with_kind(TransferKind::WriteThenReadFirst);
        self.transport
            .transfer(&mut first)
            .map_err(|e| classify(e, Phase::Address))?;

        let mut second = I2cPacket::read(address.chip_address, buf)
            .with_kind(TransferKind::WriteThenReadSecond)
            .non_blocking(0);
        let result = self.transport.transfer(&mut second);
        let id = second.transaction_id;
        state.start_dma(result, id).map_err(|e| reclassify(e, Phase::Data))
    }

    /// Non-blocking write of the array, polled by calling it again
    pub fn write_dma(
        &mut self,
        state: &mut DriverState,
        offset: u32,
        data: &[u8],
    ) -> Result<TransferStatus, Error> {
        if state.dma_in_progress {
            return self.poll_dma(state);
        }
        self.geometry.check_range(offset, data.len())?;
        let address = compose(self.geometry, self.selector, offset);

        let mut first = I2cPacket::write(address.chip_address, address.as_bytes())
            .with_kind(TransferKind::WriteThenWriteFirst);
        self.transport
            .transfer(&mut first)
            .map_err(|e| classify(e, Phase::Address))?;

        let mut second = I2cPacket::write(address.chip_address, data)
            .with_kind(TransferKind::WriteThenWriteSecond)
            .non_blocking(0);
        let result = self.transport.transfer(&mut second);
        let id = second.transaction_id;
        state.start_dma(result, id).map_err(|e| reclassify(e, Phase::Data))
    }

    fn poll_dma(&mut self, state: &mut DriverState) -> Result<TransferStatus, Error> {
        let mut packet = I2cPacket::probe(self.selector).non_blocking(state.transaction_id);
        let result = self.transport.transfer(&mut packet);
        state.poll_dma(result).map_err(|e| reclassify(e, Phase::Address))
    }
}

fn reclassify(err: Error, phase: Phase) -> Error {
    match err {
        Error::Bus(bus) => classify(bus, phase),
        err => err,
    }
}

impl<T: I2cTransport> PagedMemory for I2cMemory<T> {
    fn geometry(&self) -> &MemoryGeometry {
        self.geometry
    }

    fn read_slice(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Error> {
        let address = compose(self.geometry, self.selector, offset);
        self.read_at(address.chip_address, address.as_bytes(), buf)
    }

    fn write_slice(&mut self, offset: u32, data: &[u8]) -> Result<(), Error> {
        let address = compose(self.geometry, self.selector, offset);
        self.write_at(address.chip_address, address.as_bytes(), data, Phase::Data)
    }
}
