//! Serial memory drivers
//!
//! Device drivers built on the shared logic in `serialmem-core`:
//!
//! - I2C EEPROM (AT24Cxx, 24xx256, AT24CM02)
//! - AT24MACx02 EEPROM with serial number and EUI
//! - 47x04 / 47x16 I2C EERAM
//! - 48L512 / 48LM01 SPI EERAM with CRC-secured transfers
//! - 23xxxx SPI SRAM with SDI/SQI modes
//!
//! Each driver owns its transport (and a millisecond clock where the part
//! has a busy cycle). Multi-page requests are split into page transactions
//! by the engine; busy devices are polled until their cycle time elapses.
//!
//! ```text
//!  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐
//!  │ Eeprom  │ │ At24Mac │ │ Eeram47 │ │ Eeram48 │ │ Sram23  │
//!  └────┬────┘ └────┬────┘ └────┬────┘ └────┬────┘ └────┬────┘
//!       └───────────┼───────────┘           └─────┬─────┘
//!              I2cMemory<T>                  SpiMemory<T>
//!                   │                             │
//!              I2cTransport                  SpiTransport
//! ```

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

#[macro_use]
extern crate serialmem_core;

pub mod at24mac;
pub mod eeprom;
pub mod eeram47;
pub mod eeram48;
pub mod sram23;

#[cfg(test)]
mod sim;

pub use at24mac::{At24Mac, At24MacModel};
pub use eeprom::{Eeprom, EepromConfig};
pub use eeram47::{Eeram47, Eeram47Config, Eeram47Model};
pub use eeram48::{Eeram48, Eeram48Config, Eeram48Model};
pub use sram23::{IoMode, OperationMode, Sram23, Sram23Config};
