//! Hardware-independent core of the serial memory drivers
//!
//! This crate holds the logic every driver shares:
//!
//! - Memory geometry table (page size, array size, address layout)
//! - Address composer (on-wire address bytes, folded chip address bits)
//! - Paged transfer engine (page-bounded slices, in order)
//! - Busy-retry controller (NACK or BUSY polling with a time bound)
//! - CRC16 and the CRC-secured transaction wrapper
//! - I2C and SPI memory framing on top of the transport traits
//!
//! # Data flow
//!
//! ```text
//!  read()/write()
//!       │
//!       ▼
//!  ┌─────────────┐  slice   ┌─────────────┐  op   ┌──────────────────┐
//!  │   engine    │─────────►│  BusyRetry  │──────►│ PagedMemory impl │
//!  └─────────────┘          └─────────────┘       └──────────────────┘
//!                                 ▲ NotReady              │
//!                                 └───────────────────────┤
//!                                                         ▼
//!                                              compose() + transport
//! ```

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod address;
pub mod bus;
pub mod crc;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod retry;
pub mod secure;
pub mod state;

pub use address::{compose, ComposedAddress};
pub use crc::{Crc16, SoftwareCrc16};
pub use engine::{PagedMemory, PageSlice, PageSlices, TransferRequest};
pub use error::Error;
pub use geometry::MemoryGeometry;
pub use retry::{BusyRetry, Phase};
pub use state::{DriverState, TransferStatus};
