//! `embedded-hal` 1.0 adapters
//!
//! Lets any platform HAL that implements the standard blocking traits act
//! as a memory transport.
//!
//! ```text
//!  I2C packets                       embedded-hal calls
//!  ─────────────────────────────     ─────────────────────────────
//!  addr bytes (no stop) ─┐
//!                        ├─────────► write_read / transaction
//!  data (stop) ──────────┘
//!  probe (no data)       ──────────► write(addr, &[])
//! ```
//!
//! Both adapters complete every packet before returning, so non-blocking
//! requests always finish immediately.

use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::{Error as _, I2c, Operation};
use embedded_hal::spi::{Error as _, SpiBus};
use heapless::Vec;

use crate::error::{BusError, NackSource};
use crate::i2c::{I2cBuffer, I2cPacket, I2cTransport};
use crate::spi::{Lanes, SpiBuffer, SpiConfig, SpiPacket, SpiTransport};

/// Largest address phase held back until the data phase (4 address bytes
/// plus headroom for register-style devices)
const PENDING_CAPACITY: usize = 8;

/// I2C transport over an [`embedded_hal::i2c::I2c`] bus
///
/// The bus frequency is fixed when the platform peripheral is built, so
/// `init` only resets the adapter state.
///
/// The address phase is held back and sent together with the data phase,
/// so every NACK surfaces on the data packet. Controllers that cannot tell
/// which byte was refused report `NoAcknowledge(Unknown)`; on a held
/// transaction that is passed on as an address NACK. Controllers that do
/// report the source keep it.
pub struct EhalI2c<I> {
    bus: I,
    pending: Vec<u8, PENDING_CAPACITY>,
    pending_address: Option<u8>,
}

impl<I: I2c> EhalI2c<I> {
    /// Wrap a bus
    pub fn new(bus: I) -> Self {
        Self {
            bus,
            pending: Vec::new(),
            pending_address: None,
        }
    }

    /// Give the bus back
    pub fn release(self) -> I {
        self.bus
    }
}

impl<I: I2c> I2cTransport for EhalI2c<I> {
    fn init(&mut self, _clock_hz: u32) -> Result<(), BusError> {
        self.pending.clear();
        self.pending_address = None;
        Ok(())
    }

    fn transfer(&mut self, packet: &mut I2cPacket<'_>) -> Result<(), BusError> {
        let address = packet.address_7bit();

        if !packet.stop {
            // Only a write can be held back; the data phase decides the operation
            return match &packet.buffer {
                I2cBuffer::Write(data) => {
                    self.pending.clear();
                    self.pending
                        .extend_from_slice(data)
                        .map_err(|_| BusError::Unsupported)?;
                    self.pending_address = Some(address);
                    Ok(())
                }
                _ => Err(BusError::Unsupported),
            };
        }

        let held = self.pending_address.take() == Some(address);
        let result = match &mut packet.buffer {
            I2cBuffer::None if packet.non_blocking => Ok(()),
            I2cBuffer::None if held => self.bus.write(address, &self.pending),
            I2cBuffer::None => self.bus.write(address, &[]),
            I2cBuffer::Write(data) if held => self.bus.transaction(
                address,
                &mut [Operation::Write(&self.pending), Operation::Write(*data)],
            ),
            I2cBuffer::Write(data) => self.bus.write(address, *data),
            I2cBuffer::Read(buf) if held => self.bus.write_read(address, &self.pending, buf),
            I2cBuffer::Read(buf) => self.bus.read(address, buf),
        };
        self.pending.clear();

        match result.map_err(|e| BusError::from(e.kind())) {
            // The held transaction starts with the chip address, which a
            // device in its write cycle refuses
            Err(BusError::Nack(NackSource::Unknown)) if held => {
                Err(BusError::Nack(NackSource::Address))
            }
            other => other,
        }
    }
}

/// SPI transport over an [`embedded_hal::spi::SpiBus`] and a chip-select pin
///
/// Chip select is driven low by the first packet of a command and released
/// after the packet flagged `terminate`, or on the first error.
pub struct EhalSpi<B, CS> {
    bus: B,
    cs: CS,
    selected: bool,
}

impl<B: SpiBus, CS: OutputPin> EhalSpi<B, CS> {
    /// Wrap a bus and its chip-select pin
    pub fn new(bus: B, cs: CS) -> Self {
        Self {
            bus,
            cs,
            selected: false,
        }
    }

    /// Give the bus and pin back
    pub fn release(self) -> (B, CS) {
        (self.bus, self.cs)
    }

    fn deselect(&mut self) -> Result<(), BusError> {
        self.selected = false;
        let flushed = self.bus.flush().map_err(|e| BusError::from(e.kind()));
        self.cs.set_high().map_err(|_| BusError::Other)?;
        flushed
    }
}

impl<B: SpiBus, CS: OutputPin> SpiTransport for EhalSpi<B, CS> {
    fn init(&mut self, _chip_select: u8, config: &SpiConfig) -> Result<(), BusError> {
        if config.lanes != Lanes::Single {
            return Err(BusError::Unsupported);
        }
        if self.selected {
            self.deselect()?;
        }
        self.cs.set_high().map_err(|_| BusError::Other)
    }

    fn transfer(&mut self, packet: &mut SpiPacket<'_>) -> Result<(), BusError> {
        if !self.selected {
            self.cs.set_low().map_err(|_| BusError::Other)?;
            self.selected = true;
        }

        let result = match &mut packet.buffer {
            SpiBuffer::None => Ok(()),
            SpiBuffer::Write(data) => self.bus.write(*data),
            SpiBuffer::Read(buf) => {
                buf.fill(packet.dummy_byte);
                self.bus.transfer_in_place(buf)
            }
            SpiBuffer::InPlace(buf) => self.bus.transfer_in_place(buf),
        }
        .map_err(|e| BusError::from(e.kind()));

        if packet.terminate || result.is_err() {
            let released = self.deselect();
            result?;
            return released;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::i2c::ErrorKind;

    #[derive(Debug, Default)]
    struct Transaction {
        address: u8,
        written: Vec<u8, 16>,
        read: usize,
    }

    #[derive(Default)]
    struct MockI2c {
        log: Vec<Transaction, 8>,
        fail: Option<ErrorKind>,
    }

    impl embedded_hal::i2c::ErrorType for MockI2c {
        type Error = ErrorKind;
    }

    impl I2c for MockI2c {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if let Some(kind) = self.fail {
                return Err(kind);
            }
            let mut t = Transaction {
                address,
                ..Default::default()
            };
            for op in operations {
                match op {
                    Operation::Write(data) => t.written.extend_from_slice(data).unwrap(),
                    Operation::Read(buf) => {
                        buf.fill(0x5A);
                        t.read += buf.len();
                    }
                }
            }
            self.log.push(t).unwrap();
            Ok(())
        }
    }

    #[test]
    fn test_i2c_write_then_write_is_one_transaction() {
        let mut i2c = EhalI2c::new(MockI2c::default());
        let addr = [0x01, 0x20];
        let data = [0xDE, 0xAD];

        let mut first = I2cPacket::write(0xA0, &addr)
            .with_kind(crate::i2c::TransferKind::WriteThenWriteFirst);
        i2c.transfer(&mut first).unwrap();
        let mut second = I2cPacket::write(0xA0, &data)
            .with_kind(crate::i2c::TransferKind::WriteThenWriteSecond);
        i2c.transfer(&mut second).unwrap();

        let bus = i2c.release();
        assert_eq!(bus.log.len(), 1);
        assert_eq!(bus.log[0].address, 0x50);
        assert_eq!(&bus.log[0].written[..], &[0x01, 0x20, 0xDE, 0xAD]);
    }

    #[test]
    fn test_i2c_write_then_read() {
        let mut i2c = EhalI2c::new(MockI2c::default());
        let addr = [0x10];
        let mut buf = [0u8; 3];

        let mut first = I2cPacket::write(0xA2, &addr)
            .with_kind(crate::i2c::TransferKind::WriteThenReadFirst);
        i2c.transfer(&mut first).unwrap();
        let mut second = I2cPacket::read(0xA2, &mut buf)
            .with_kind(crate::i2c::TransferKind::WriteThenReadSecond);
        i2c.transfer(&mut second).unwrap();
        assert_eq!(buf, [0x5A; 3]);

        let bus = i2c.release();
        assert_eq!(bus.log.len(), 1);
        assert_eq!(bus.log[0].address, 0x51);
        assert_eq!(&bus.log[0].written[..], &[0x10]);
        assert_eq!(bus.log[0].read, 3);
    }

    #[test]
    fn test_i2c_nack_is_reported_at_stop() {
        let mut i2c = EhalI2c::new(MockI2c {
            fail: Some(ErrorKind::NoAcknowledge(
                embedded_hal::i2c::NoAcknowledgeSource::Address,
            )),
            ..Default::default()
        });
        let mut probe = I2cPacket::probe(0xA0);
        assert_eq!(
            i2c.transfer(&mut probe),
            Err(BusError::Nack(crate::error::NackSource::Address))
        );
    }

    fn failing_i2c(source: embedded_hal::i2c::NoAcknowledgeSource) -> EhalI2c<MockI2c> {
        EhalI2c::new(MockI2c {
            fail: Some(ErrorKind::NoAcknowledge(source)),
            ..Default::default()
        })
    }

    #[test]
    fn test_i2c_unattributed_nack_on_held_write_is_busy() {
        use embedded_hal::i2c::NoAcknowledgeSource;

        let mut i2c = failing_i2c(NoAcknowledgeSource::Unknown);
        let mut first = I2cPacket::write(0xA0, &[0x00, 0x40])
            .with_kind(crate::i2c::TransferKind::WriteThenWriteFirst);
        i2c.transfer(&mut first).unwrap();
        let mut second = I2cPacket::write(0xA0, &[0x11])
            .with_kind(crate::i2c::TransferKind::WriteThenWriteSecond);
        assert_eq!(
            i2c.transfer(&mut second),
            Err(BusError::Nack(NackSource::Address))
        );

        let mut buf = [0u8; 2];
        let mut first = I2cPacket::write(0xA0, &[0x00, 0x40])
            .with_kind(crate::i2c::TransferKind::WriteThenReadFirst);
        i2c.transfer(&mut first).unwrap();
        let mut second = I2cPacket::read(0xA0, &mut buf)
            .with_kind(crate::i2c::TransferKind::WriteThenReadSecond);
        assert_eq!(
            i2c.transfer(&mut second),
            Err(BusError::Nack(NackSource::Address))
        );
    }

    #[test]
    fn test_i2c_unattributed_nack_without_held_phase_kept() {
        let mut i2c = failing_i2c(embedded_hal::i2c::NoAcknowledgeSource::Unknown);
        let mut buf = [0u8; 1];
        let mut packet = I2cPacket::read(0xA0, &mut buf);
        assert_eq!(
            i2c.transfer(&mut packet),
            Err(BusError::Nack(NackSource::Unknown))
        );
    }

    #[test]
    fn test_i2c_attributed_nack_on_held_write_kept() {
        let mut i2c = failing_i2c(embedded_hal::i2c::NoAcknowledgeSource::Data);
        let mut first = I2cPacket::write(0x60, &[0x00])
            .with_kind(crate::i2c::TransferKind::WriteThenWriteFirst);
        i2c.transfer(&mut first).unwrap();
        let mut second = I2cPacket::write(0x60, &[0x00])
            .with_kind(crate::i2c::TransferKind::WriteThenWriteSecond);
        assert_eq!(
            i2c.transfer(&mut second),
            Err(BusError::Nack(NackSource::Data))
        );
    }

    #[test]
    fn test_i2c_held_read_rejected() {
        let mut i2c = EhalI2c::new(MockI2c::default());
        let mut buf = [0u8; 1];
        let mut packet = I2cPacket::read(0xA0, &mut buf);
        packet.stop = false;
        assert_eq!(i2c.transfer(&mut packet), Err(BusError::Unsupported));
    }

    #[derive(Default)]
    struct MockSpi {
        sent: Vec<u8, 32>,
        flushes: usize,
        fail: bool,
    }

    impl embedded_hal::spi::ErrorType for MockSpi {
        type Error = embedded_hal::spi::ErrorKind;
    }

    impl SpiBus for MockSpi {
        fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
            words.fill(0xFF);
            Ok(())
        }

        fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
            if self.fail {
                return Err(embedded_hal::spi::ErrorKind::Other);
            }
            self.sent.extend_from_slice(words).unwrap();
            Ok(())
        }

        fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
            self.sent.extend_from_slice(write).unwrap();
            read.fill(0xA5);
            Ok(())
        }

        fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
            self.sent.extend_from_slice(words).unwrap();
            words.fill(0xA5);
            Ok(())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockPin {
        low: bool,
        edges: usize,
    }

    impl embedded_hal::digital::ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.low = true;
            self.edges += 1;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.low = false;
            Ok(())
        }
    }

    #[test]
    fn test_spi_chip_select_spans_packets() {
        let mut spi = EhalSpi::new(MockSpi::default(), MockPin::default());
        spi.init(0, &SpiConfig::mode0(1_000_000)).unwrap();

        let cmd = [0x03, 0x00, 0x40];
        let mut buf = [0u8; 2];
        spi.transfer(&mut SpiPacket::write(0, &cmd)).unwrap();
        spi.transfer(&mut SpiPacket::read(0, &mut buf).terminated())
            .unwrap();
        assert_eq!(buf, [0xA5, 0xA5]);

        let (bus, cs) = spi.release();
        assert_eq!(&bus.sent[..], &[0x03, 0x00, 0x40, 0x00, 0x00]);
        assert_eq!(bus.flushes, 1);
        assert_eq!(cs.edges, 1);
        assert!(!cs.low);
    }

    #[test]
    fn test_spi_chip_select_released_on_error() {
        let mut spi = EhalSpi::new(
            MockSpi {
                fail: true,
                ..Default::default()
            },
            MockPin::default(),
        );
        spi.init(0, &SpiConfig::mode0(1_000_000)).unwrap();

        // Header packet of a command that never reaches its terminate packet
        assert_eq!(
            spi.transfer(&mut SpiPacket::write(0, &[0x02, 0x00, 0x10])),
            Err(BusError::Other)
        );
        assert!(!spi.cs.low);
        assert!(!spi.selected);

        // The next command selects the device again
        spi.bus.fail = false;
        spi.transfer(&mut SpiPacket::write(0, &[0x05])).unwrap();
        assert!(spi.cs.low);
        spi.transfer(&mut SpiPacket::read(0, &mut [0u8; 1]).terminated())
            .unwrap();

        let (bus, cs) = spi.release();
        assert_eq!(&bus.sent[..], &[0x05, 0x00]);
        assert_eq!(cs.edges, 2);
        assert!(!cs.low);
    }

    #[test]
    fn test_spi_rejects_multi_lane() {
        let mut spi = EhalSpi::new(MockSpi::default(), MockPin::default());
        let config = SpiConfig::mode0(1_000_000).with_lanes(Lanes::Dual);
        assert_eq!(spi.init(0, &config), Err(BusError::Unsupported));
    }
}
