//! Transport-level errors
//!
//! Every transport reports failures through [`BusError`] so the memory
//! drivers can tell a busy device (address NACK) from a rejected request
//! (data NACK) without knowing which platform HAL is underneath.

use core::fmt;

/// Which part of an I2C frame was not acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NackSource {
    /// The chip address byte was not acknowledged
    Address,
    /// A data byte (including on-wire memory address bytes) was not acknowledged
    Data,
    /// The transport cannot tell which byte was refused
    Unknown,
}

/// Errors reported by a bus transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Device did not acknowledge
    Nack(NackSource),
    /// Lost arbitration on a multi-master bus
    ArbitrationLost,
    /// Receive overrun in the peripheral
    Overrun,
    /// A non-blocking transfer owned by this caller is still running
    Busy,
    /// The bus is held by another transaction
    OtherBusy,
    /// The requested mode or framing is not available on this transport
    Unsupported,
    /// The peripheral timed out
    Timeout,
    /// Any other peripheral failure
    Other,
}

impl BusError {
    /// True for the two "transfer still running" conditions
    pub fn is_busy(&self) -> bool {
        matches!(self, BusError::Busy | BusError::OtherBusy)
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::Nack(NackSource::Address) => f.write_str("address not acknowledged"),
            BusError::Nack(NackSource::Data) => f.write_str("data not acknowledged"),
            BusError::Nack(NackSource::Unknown) => f.write_str("not acknowledged"),
            BusError::ArbitrationLost => f.write_str("arbitration lost"),
            BusError::Overrun => f.write_str("overrun"),
            BusError::Busy => f.write_str("transfer in progress"),
            BusError::OtherBusy => f.write_str("bus busy with another transfer"),
            BusError::Unsupported => f.write_str("unsupported bus mode"),
            BusError::Timeout => f.write_str("bus timeout"),
            BusError::Other => f.write_str("bus error"),
        }
    }
}

impl From<embedded_hal::i2c::ErrorKind> for BusError {
    fn from(kind: embedded_hal::i2c::ErrorKind) -> Self {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

        match kind {
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address) => {
                BusError::Nack(NackSource::Address)
            }
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data) => BusError::Nack(NackSource::Data),
            ErrorKind::NoAcknowledge(_) => BusError::Nack(NackSource::Unknown),
            ErrorKind::ArbitrationLoss => BusError::ArbitrationLost,
            ErrorKind::Overrun => BusError::Overrun,
            _ => BusError::Other,
        }
    }
}

impl From<embedded_hal::spi::ErrorKind> for BusError {
    fn from(kind: embedded_hal::spi::ErrorKind) -> Self {
        match kind {
            embedded_hal::spi::ErrorKind::Overrun => BusError::Overrun,
            _ => BusError::Other,
        }
    }
}
