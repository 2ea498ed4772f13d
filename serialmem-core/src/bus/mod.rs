//! Bus protocol helpers shared by the drivers
//!
//! [`I2cMemory`] and [`SpiMemory`] own the transport and know how a memory
//! command is framed on their bus. Drivers add the model-specific opcodes
//! and registers on top.

pub mod i2c;
pub mod spi;

pub use i2c::I2cMemory;
pub use spi::SpiMemory;
