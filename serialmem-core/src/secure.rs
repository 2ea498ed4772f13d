//! CRC-secured transactions
//!
//! Secure commands move whole pages and carry a CRC16 over the address
//! and the data:
//!
//! ```text
//!  SWRITE: opcode │ address │ data (one page) │ CRC hi │ CRC lo
//!  SREAD:  opcode │ address │ dummy │ data (one page) │ CRC hi │ CRC lo
//! ```
//!
//! The device checks the CRC of a secure write itself and reports a
//! mismatch through a status flag, so every page is followed by a status
//! read before the next one is sent.

use serialmem_hal::Clock;

use crate::crc::{address_state, Crc16};
use crate::engine::{self, PagedMemory, TransferRequest};
use crate::error::Error;
use crate::geometry::MemoryGeometry;

/// Check the preconditions of a secure request
///
/// Offset must sit on a secure page boundary and the length must be a
/// whole, non-zero number of pages inside the array.
pub fn check_request(geometry: &MemoryGeometry, offset: u32, len: usize) -> Result<(), Error> {
    let page = geometry.secure_page_size;
    if page == 0 {
        return Err(Error::Unsupported);
    }
    if offset % page != 0 {
        return Err(Error::AddressAlignment);
    }
    if len == 0 || len % page as usize != 0 {
        return Err(Error::BadDataSize);
    }
    geometry.check_range(offset, len)
}

/// CRC over `address` and `data`, in wire order
pub fn seal<H: Crc16 + ?Sized>(
    hasher: &mut H,
    address: u32,
    address_bits: u32,
    data: &[u8],
) -> [u8; 2] {
    let crc = address_state(hasher, address, address_bits);
    hasher.update(crc, data).to_be_bytes()
}

/// Compare a received CRC with the one computed over `address` and `data`
pub fn verify<H: Crc16 + ?Sized>(
    hasher: &mut H,
    address: u32,
    address_bits: u32,
    data: &[u8],
    received: [u8; 2],
) -> Result<(), Error> {
    let expected = seal(hasher, address, address_bits, data);
    if expected != received {
        warn!(
            "CRC mismatch at {=u32}: got {=u16:#x}, want {=u16:#x}",
            address,
            u16::from_be_bytes(received),
            u16::from_be_bytes(expected)
        );
        return Err(Error::Crc);
    }
    Ok(())
}

/// Secure read of whole pages
pub fn read_secure<M, C>(
    mem: &mut M,
    clock: &mut C,
    offset: u32,
    buf: &mut [u8],
) -> Result<(), Error>
where
    M: PagedMemory + ?Sized,
    C: Clock + ?Sized,
{
    engine::transfer(mem, clock, TransferRequest::read(offset, buf).secure())
}

/// Secure write of whole pages
pub fn write_secure<M, C>(mem: &mut M, clock: &mut C, offset: u32, data: &[u8]) -> Result<(), Error>
where
    M: PagedMemory + ?Sized,
    C: Clock + ?Sized,
{
    engine::transfer(mem, clock, TransferRequest::write(offset, data).secure())
}
