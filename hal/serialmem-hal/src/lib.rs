//! Serialmem Hardware Abstraction Layer
//!
//! This crate defines the capabilities the memory drivers consume: a bus
//! transport (I2C or SPI) and a millisecond clock. Platforms implement the
//! transport traits directly, or wrap an `embedded-hal` 1.0 bus with the
//! adapters in [`ehal`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  serialmem-drivers (EEPROM, EERAM, SRAM)│
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  serialmem-core (paged engine, retry)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  serialmem-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ embedded-hal  │       │ platform DMA  │
//! │   adapters    │       │  transports   │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`i2c::I2cTransport`] - I2C packets with explicit start/stop
//! - [`spi::SpiTransport`] - SPI packets sharing one chip select
//! - [`clock::Clock`] - Millisecond counter

#![no_std]
#![deny(unsafe_code)]

pub mod clock;
pub mod ehal;
pub mod error;
pub mod i2c;
pub mod spi;

// Re-export key traits at crate root for convenience
pub use clock::{elapsed_ms, Clock};
pub use error::{BusError, NackSource};
pub use i2c::{I2cBuffer, I2cConfig, I2cPacket, I2cTransport, TransferKind};
pub use spi::{Lanes, SpiBuffer, SpiConfig, SpiPacket, SpiTransport};
