//! Busy-retry controller
//!
//! A memory in its internal write (or store) cycle refuses new work: I2C
//! parts stop acknowledging their chip address, SPI EERAM sets a BUSY
//! status bit. Both are mapped to [`Error::NotReady`] and the transaction
//! is re-issued until it goes through or the cycle time has elapsed.
//!
//! ```text
//!          ┌──────────────┐  Ok / fatal error
//!  start ─►│ issue op     │──────────────────► return
//!          └──────────────┘
//!             ▲       │ NotReady
//!             │       ▼
//!             │   elapsed > busy + 1 ms ? ──yes──► DeviceTimeout
//!             └───────┘ no
//! ```
//!
//! There is no backoff: the cycle length is a fixed hardware latency.

use serialmem_hal::{elapsed_ms, BusError, Clock, NackSource};

use crate::error::Error;

/// Transaction phase a bus error happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Chip address and memory address bytes
    Address,
    /// Memory data bytes
    Data,
    /// Data bytes of a control register write
    Register,
}

/// Map a transport error to a driver error
///
/// An address NACK is the busy signal. A data NACK while the memory
/// address is sent means the device refused the address; while a control
/// register is written it means the command was refused. An address NACK
/// is busy in every phase: transports that defer the address phase to the
/// stop packet report it on the data packet. Such transports must report a
/// NACK they cannot attribute as an address NACK, since an `Unknown` NACK
/// is only taken as busy while the address is sent.
pub fn classify(err: BusError, phase: Phase) -> Error {
    match (err, phase) {
        (BusError::Nack(NackSource::Address), _) => Error::NotReady,
        (BusError::Nack(NackSource::Unknown), Phase::Address) => Error::NotReady,
        (BusError::Nack(NackSource::Data), Phase::Address) => Error::InvalidAddress,
        (BusError::Nack(NackSource::Data), Phase::Register) => Error::InvalidCommand,
        (err, _) => Error::Bus(err),
    }
}

/// Bounded retry loop around one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusyRetry {
    timeout_ms: u32,
    retries: u32,
}

impl BusyRetry {
    /// Controller for a device that stays busy up to `busy_time_ms`
    ///
    /// One extra millisecond covers a clock tick that was about to elapse
    /// when the first attempt started.
    pub const fn new(busy_time_ms: u32) -> Self {
        Self {
            timeout_ms: busy_time_ms.saturating_add(1),
            retries: 0,
        }
    }

    /// Time budget in ms
    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Retries performed by the last [`attempt`](Self::attempt)
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Run `op` until it returns anything but [`Error::NotReady`]
    ///
    /// Returns [`Error::DeviceTimeout`] when the device is still busy after
    /// the time budget, measured from the first attempt.
    pub fn attempt<C, T, F>(&mut self, clock: &mut C, mut op: F) -> Result<T, Error>
    where
        C: Clock + ?Sized,
        F: FnMut() -> Result<T, Error>,
    {
        self.retries = 0;
        let start = clock.now_ms();
        loop {
            match op() {
                Err(Error::NotReady) => {
                    if elapsed_ms(start, clock.now_ms()) > self.timeout_ms {
                        warn!(
                            "device busy after {=u32} ms, {=u32} retries",
                            self.timeout_ms,
                            self.retries
                        );
                        return Err(Error::DeviceTimeout);
                    }
                    self.retries += 1;
                }
                other => return other,
            }
        }
    }
}
