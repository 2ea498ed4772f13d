//! Driver error taxonomy

use core::fmt;

use serialmem_hal::BusError;

/// Errors returned by memory operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Invalid argument, detected before any bus activity
    Parameter,
    /// Request exceeds the array or a page
    OutOfRange,
    /// Secure transfer offset is not page aligned
    AddressAlignment,
    /// Secure transfer length is not a whole number of pages
    BadDataSize,
    /// Device busy with an internal cycle; retried internally and only
    /// surfaced by single-shot probes
    NotReady,
    /// Device stayed busy past its cycle time
    DeviceTimeout,
    /// Device refused the memory address
    InvalidAddress,
    /// Device refused a register write
    InvalidCommand,
    /// CRC mismatch, local or reported by the device
    Crc,
    /// Requested bus clock exceeds the part maximum
    ClockTooFast,
    /// Nothing acknowledged the chip address during init
    NoDevice,
    /// Mode or feature not offered by this part
    Unsupported,
    /// Transport failure passed through unchanged
    Bus(BusError),
}

impl From<BusError> for Error {
    fn from(err: BusError) -> Self {
        Error::Bus(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parameter => f.write_str("invalid parameter"),
            Error::OutOfRange => f.write_str("out of range"),
            Error::AddressAlignment => f.write_str("address not page aligned"),
            Error::BadDataSize => f.write_str("size not a multiple of the page"),
            Error::NotReady => f.write_str("device not ready"),
            Error::DeviceTimeout => f.write_str("device timeout"),
            Error::InvalidAddress => f.write_str("invalid memory address"),
            Error::InvalidCommand => f.write_str("invalid command"),
            Error::Crc => f.write_str("CRC mismatch"),
            Error::ClockTooFast => f.write_str("bus clock above device maximum"),
            Error::NoDevice => f.write_str("no device detected"),
            Error::Unsupported => f.write_str("unsupported by this device"),
            Error::Bus(err) => write!(f, "bus: {}", err),
        }
    }
}
