//! Per-device driver state
//!
//! Bookkeeping the drivers carry between calls: a running non-blocking
//! transfer, the SPI write-enable latch and an unfinished store/recall.

use serialmem_hal::BusError;

use crate::error::Error;

/// Outcome of a non-blocking (DMA) entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferStatus {
    /// Transfer finished
    Complete,
    /// Transfer still running; call the same entry point again to poll
    InProgress,
}

/// Mutable state of one device handle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriverState {
    /// A non-blocking transfer is running
    pub dma_in_progress: bool,
    /// Transaction number of the running transfer (6 bits)
    pub transaction_id: u8,
    /// The device write-enable latch is known to be set
    pub write_enable_latched: bool,
    /// A store or recall was started without waiting for it
    pub operation_pending: bool,
}

impl DriverState {
    /// Record the result of starting a non-blocking transfer
    ///
    /// [`BusError::Busy`] means the transport accepted the transfer and
    /// runs it in the background. The bus being held by someone else is an
    /// error here: nothing was started.
    pub fn start_dma(
        &mut self,
        result: Result<(), BusError>,
        transaction_id: u8,
    ) -> Result<TransferStatus, Error> {
        match result {
            Ok(()) => {
                self.dma_in_progress = false;
                Ok(TransferStatus::Complete)
            }
            Err(BusError::Busy) => {
                self.dma_in_progress = true;
                self.transaction_id = transaction_id & 0x3F;
                debug!("transfer {=u8} running", self.transaction_id);
                Ok(TransferStatus::InProgress)
            }
            Err(err) => {
                self.dma_in_progress = false;
                Err(Error::Bus(err))
            }
        }
    }

    /// Record the result of polling a running transfer
    pub fn poll_dma(&mut self, result: Result<(), BusError>) -> Result<TransferStatus, Error> {
        match result {
            Err(err) if err.is_busy() => Ok(TransferStatus::InProgress),
            Ok(()) => {
                debug!("transfer {=u8} done", self.transaction_id);
                self.dma_in_progress = false;
                Ok(TransferStatus::Complete)
            }
            Err(err) => {
                self.dma_in_progress = false;
                Err(Error::Bus(err))
            }
        }
    }
}
