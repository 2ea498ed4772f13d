//! Paged transfer engine
//!
//! Splits a logical request into bus transactions that never cross a page
//! boundary, and runs each one through the busy-retry controller.
//!
//! ```text
//!  page size 32, write 100 bytes at offset 10
//!
//!  0        32        64        96       128
//!  ├────────┼─────────┼─────────┼─────────┤
//!     [ 22  ][   32   ][   32   ][14]
//!     10     32        64        96  110
//! ```
//!
//! Slices are issued in increasing offset order. The first fatal error
//! aborts the request; slices already issued stay written.

use core::ops::Range;

use serialmem_hal::Clock;

use crate::error::Error;
use crate::geometry::MemoryGeometry;
use crate::retry::BusyRetry;
use crate::secure;

/// One bus transaction of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PageSlice {
    /// Device offset of the first byte
    pub offset: u32,
    /// Position of the first byte in the caller buffer
    pub start: usize,
    /// Number of bytes, never past the end of the page
    pub len: usize,
    /// Final slice of the request
    pub last: bool,
}

impl PageSlice {
    /// Caller buffer range covered by the slice
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// Iterator over the page slices of a request
#[derive(Debug, Clone)]
pub struct PageSlices {
    unit: u32,
    offset: u32,
    start: usize,
    remaining: usize,
}

impl PageSlices {
    /// Slices of `len` bytes at `offset` for pages of `unit` bytes
    pub fn new(unit: u32, offset: u32, len: usize) -> Self {
        Self {
            unit: unit.max(1),
            offset,
            start: 0,
            remaining: len,
        }
    }
}

impl Iterator for PageSlices {
    type Item = PageSlice;

    fn next(&mut self) -> Option<PageSlice> {
        if self.remaining == 0 {
            return None;
        }
        let room = (self.unit - self.offset % self.unit) as usize;
        let len = room.min(self.remaining);
        let slice = PageSlice {
            offset: self.offset,
            start: self.start,
            len,
            last: len == self.remaining,
        };
        self.offset = self.offset.wrapping_add(len as u32);
        self.start += len;
        self.remaining -= len;
        Some(slice)
    }
}

/// Direction and caller buffer of a request
#[derive(Debug)]
pub enum TransferData<'a> {
    /// Fill the buffer from the device
    Read(&'a mut [u8]),
    /// Send the buffer to the device
    Write(&'a [u8]),
}

/// Logical read or write request
#[derive(Debug)]
pub struct TransferRequest<'a> {
    /// Device offset of the first byte
    pub offset: u32,
    /// Caller buffer
    pub data: TransferData<'a>,
    /// Use the CRC-secured command variant
    pub secure: bool,
}

impl<'a> TransferRequest<'a> {
    /// Plain read of `buf.len()` bytes at `offset`
    pub fn read(offset: u32, buf: &'a mut [u8]) -> Self {
        Self {
            offset,
            data: TransferData::Read(buf),
            secure: false,
        }
    }

    /// Plain write of `data` at `offset`
    pub fn write(offset: u32, data: &'a [u8]) -> Self {
        Self {
            offset,
            data: TransferData::Write(data),
            secure: false,
        }
    }

    /// Switch to the CRC-secured variant
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Request length in bytes
    pub fn len(&self) -> usize {
        match &self.data {
            TransferData::Read(buf) => buf.len(),
            TransferData::Write(data) => data.len(),
        }
    }

    /// True for an empty request
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A device the engine can drive one slice at a time
///
/// Implementations issue exactly one bus transaction per call and report
/// a busy device as [`Error::NotReady`]; the engine does the retrying.
pub trait PagedMemory {
    /// Model description
    fn geometry(&self) -> &MemoryGeometry;

    /// Largest transaction the device accepts without wrapping
    fn slice_size(&self) -> u32 {
        self.geometry().page_size
    }

    /// Longest time the device may stay busy
    fn busy_time_ms(&self) -> u32 {
        self.geometry().write_time_ms
    }

    /// Read one slice
    fn read_slice(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Error>;

    /// Write one slice
    fn write_slice(&mut self, offset: u32, data: &[u8]) -> Result<(), Error>;

    /// Read one secure page and check its CRC
    fn read_secure_slice(&mut self, _offset: u32, _buf: &mut [u8]) -> Result<(), Error> {
        Err(Error::Unsupported)
    }

    /// Write one secure page with its CRC
    fn write_secure_slice(&mut self, _offset: u32, _data: &[u8]) -> Result<(), Error> {
        Err(Error::Unsupported)
    }

    /// Device verdict on the secure page just written
    ///
    /// Called after every secure page; the device checks the CRC itself
    /// and flags a mismatch in its status register.
    fn secure_write_verdict(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// Run a request to completion
///
/// The range (and for secure requests, alignment and size) is checked
/// before the first transaction. Each slice is retried while the device
/// is busy; any other error aborts the request.
pub fn transfer<M, C>(mem: &mut M, clock: &mut C, request: TransferRequest<'_>) -> Result<(), Error>
where
    M: PagedMemory + ?Sized,
    C: Clock + ?Sized,
{
    let geometry = *mem.geometry();
    let len = request.len();
    let secure = request.secure;
    let unit = if secure {
        secure::check_request(&geometry, request.offset, len)?;
        geometry.secure_page_size
    } else {
        geometry.check_range(request.offset, len)?;
        mem.slice_size()
    };

    let mut retry = BusyRetry::new(mem.busy_time_ms());
    let slices = PageSlices::new(unit, request.offset, len);

    match request.data {
        TransferData::Read(buf) => {
            for slice in slices {
                trace!("read {=u32} +{=usize}", slice.offset, slice.len);
                retry.attempt(clock, || {
                    let chunk = &mut buf[slice.range()];
                    if secure {
                        mem.read_secure_slice(slice.offset, chunk)
                    } else {
                        mem.read_slice(slice.offset, chunk)
                    }
                })?;
            }
        }
        TransferData::Write(data) => {
            for slice in slices {
                trace!("write {=u32} +{=usize}", slice.offset, slice.len);
                let chunk = &data[slice.range()];
                if secure {
                    retry.attempt(clock, || mem.write_secure_slice(slice.offset, chunk))?;
                    mem.secure_write_verdict()?;
                } else {
                    retry.attempt(clock, || mem.write_slice(slice.offset, chunk))?;
                }
            }
        }
    }
    Ok(())
}

/// Read `buf.len()` bytes at `offset`
pub fn read<M, C>(mem: &mut M, clock: &mut C, offset: u32, buf: &mut [u8]) -> Result<(), Error>
where
    M: PagedMemory + ?Sized,
    C: Clock + ?Sized,
{
    transfer(mem, clock, TransferRequest::read(offset, buf))
}

/// Write `data` at `offset`
pub fn write<M, C>(mem: &mut M, clock: &mut C, offset: u32, data: &[u8]) -> Result<(), Error>
where
    M: PagedMemory + ?Sized,
    C: Clock + ?Sized,
{
    transfer(mem, clock, TransferRequest::write(offset, data))
}
