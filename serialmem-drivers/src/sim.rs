//! Simulated memory chips for the driver tests
//!
//! Each simulator implements a transport trait and behaves like the chip
//! on the other side of the bus: address decoding, page wrap, write and
//! store cycles, status registers and secure CRC checking.

use std::vec;
use std::vec::Vec;

use serialmem_core::crc;
use serialmem_core::geometry::{MemoryGeometry, MemoryKind};
use serialmem_hal::{
    BusError, I2cBuffer, I2cPacket, I2cTransport, Lanes, NackSource, SpiBuffer, SpiConfig,
    SpiPacket, SpiTransport, TransferKind,
};

/// Clock advancing one millisecond per read
pub fn ticking() -> impl FnMut() -> u32 {
    let mut now = 0u32;
    move || {
        now = now.wrapping_add(1);
        now
    }
}

const NACK_ADDRESS: BusError = BusError::Nack(NackSource::Address);
const NACK_DATA: BusError = BusError::Nack(NackSource::Data);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Array,
    Extended,
    Control,
    Protect,
}

/// I2C EEPROM, AT24MAC or 47xxx EERAM
pub struct SimI2c {
    pub geometry: &'static MemoryGeometry,
    pub pins: u8,
    pub cells: Vec<u8>,
    /// EEPROM image behind an EERAM array
    pub backup: Vec<u8>,
    /// AT24MAC extended region
    pub extended: [u8; 256],
    /// 47xxx STATUS register
    pub status: u8,
    pub present: bool,
    pub protected: bool,
    /// Address NACKs after each page write
    pub write_cycle: u32,
    /// Address NACKs after a store or recall
    pub store_cycle: u32,
    /// Busy replies for a non-blocking transfer
    pub dma_busy: u32,
    pub clock_hz: Option<u32>,
    pub page_writes: Vec<(u32, usize)>,
    pub stores: u32,
    pub recalls: u32,
    pub probes: u32,
    busy: u32,
    dma_polls: u32,
    pointer: Option<(Region, u32)>,
}

impl SimI2c {
    pub fn new(geometry: &'static MemoryGeometry, pins: u8) -> Self {
        let size = geometry.total_size as usize;
        Self {
            geometry,
            pins,
            cells: vec![0xFF; size],
            backup: vec![0x00; size],
            extended: [0xFF; 256],
            status: 0,
            present: true,
            protected: false,
            write_cycle: 0,
            store_cycle: 0,
            dma_busy: 0,
            clock_hz: None,
            page_writes: Vec::new(),
            stores: 0,
            recalls: 0,
            probes: 0,
            busy: 0,
            dma_polls: 0,
            pointer: None,
        }
    }

    fn is_mac(&self) -> bool {
        self.geometry.name.starts_with("AT24MAC")
    }

    fn is_eeram(&self) -> bool {
        self.geometry.kind == MemoryKind::Eeram
    }

    fn decode(&self, chip_address: u8) -> Option<Region> {
        let chip = chip_address & 0xFE;
        let strap = self.geometry.strap_mask;
        if chip & strap != self.pins & strap {
            return None;
        }
        match chip & 0xF0 {
            0xA0 => Some(Region::Array),
            0xB0 if self.is_mac() => Some(Region::Extended),
            0x60 if self.is_mac() => Some(Region::Protect),
            0x30 if self.is_eeram() => Some(Region::Control),
            _ => None,
        }
    }

    fn offset_of(&self, region: Region, chip_address: u8, address: &[u8]) -> u32 {
        let low = address.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
        match region {
            Region::Array => {
                let high = ((chip_address & self.geometry.fold_mask()) >> 1) as u32;
                (low | (high << (8 * address.len() as u32))) % self.geometry.total_size
            }
            _ => low & 0xFF,
        }
    }

    fn read_region(&mut self, region: Region, offset: u32, buf: &mut [u8]) {
        let total = self.geometry.total_size;
        for (i, b) in buf.iter_mut().enumerate() {
            let at = offset + i as u32;
            *b = match region {
                Region::Array => self.cells[(at % total) as usize],
                Region::Extended => self.extended[(at & 0xFF) as usize],
                Region::Control => self.status,
                Region::Protect => 0xFF,
            };
        }
    }

    fn write_region(&mut self, region: Region, offset: u32, data: &[u8]) -> Result<(), BusError> {
        match region {
            Region::Array if self.is_eeram() => {
                let total = self.geometry.total_size;
                for (i, &b) in data.iter().enumerate() {
                    self.cells[((offset + i as u32) % total) as usize] = b;
                }
                self.status |= 0x80;
            }
            Region::Array => {
                if self.protected && offset >= self.geometry.total_size / 2 {
                    return Err(NACK_DATA);
                }
                let page = self.geometry.page_size;
                let base = offset & !(page - 1);
                for (i, &b) in data.iter().enumerate() {
                    let at = base + (offset - base + i as u32) % page;
                    self.cells[at as usize] = b;
                }
                self.page_writes.push((offset, data.len()));
                self.busy = self.write_cycle;
            }
            Region::Extended => {
                if offset >= 0x80 {
                    return Err(NACK_DATA);
                }
                for (i, &b) in data.iter().enumerate() {
                    self.extended[((offset + i as u32) & 0x7F) as usize] = b;
                }
                self.busy = self.write_cycle;
            }
            Region::Protect => {
                if self.protected {
                    return Err(NACK_DATA);
                }
                self.protected = true;
                self.busy = self.write_cycle;
            }
            Region::Control => match (offset, data.first().copied()) {
                (0x00, Some(value)) => self.status = (self.status & 0x80) | (value & 0x1F),
                (0x55, Some(0x33)) => {
                    self.backup.copy_from_slice(&self.cells);
                    self.status &= !0x80;
                    self.stores += 1;
                    self.busy = self.store_cycle;
                }
                (0x55, Some(0xDD)) => {
                    self.cells.copy_from_slice(&self.backup);
                    self.status &= !0x80;
                    self.recalls += 1;
                    self.busy = self.store_cycle;
                }
                _ => return Err(NACK_DATA),
            },
        }
        Ok(())
    }

    fn execute(&mut self, packet: &mut I2cPacket<'_>) -> Result<(), BusError> {
        if packet.start {
            if !self.present {
                return Err(NACK_ADDRESS);
            }
            if self.busy > 0 {
                self.busy -= 1;
                return Err(NACK_ADDRESS);
            }
        }
        let region = self.decode(packet.chip_address).ok_or(NACK_ADDRESS)?;
        let chip = packet.chip_address;
        match (&mut packet.buffer, packet.kind) {
            (I2cBuffer::None, _) => {
                self.probes += 1;
                Ok(())
            }
            (I2cBuffer::Write(address), TransferKind::WriteThenReadFirst)
            | (I2cBuffer::Write(address), TransferKind::WriteThenWriteFirst) => {
                let offset = self.offset_of(region, chip, address);
                self.pointer = Some((region, offset));
                Ok(())
            }
            (I2cBuffer::Write(data), TransferKind::WriteThenWriteSecond) => {
                let (region, offset) = self.pointer.take().ok_or(BusError::Other)?;
                self.write_region(region, offset, data)
            }
            (I2cBuffer::Read(buf), TransferKind::WriteThenReadSecond) => {
                let (region, offset) = self.pointer.take().ok_or(BusError::Other)?;
                self.read_region(region, offset, buf);
                Ok(())
            }
            (I2cBuffer::Read(buf), _) => {
                self.read_region(region, 0, buf);
                Ok(())
            }
            (I2cBuffer::Write(_), _) => Err(BusError::Unsupported),
        }
    }
}

impl I2cTransport for SimI2c {
    fn init(&mut self, clock_hz: u32) -> Result<(), BusError> {
        self.clock_hz = Some(clock_hz);
        Ok(())
    }

    fn transfer(&mut self, packet: &mut I2cPacket<'_>) -> Result<(), BusError> {
        if packet.non_blocking && packet.buffer.is_empty() {
            if self.dma_polls > 0 {
                self.dma_polls -= 1;
                return Err(BusError::Busy);
            }
            return Ok(());
        }
        self.execute(packet)?;
        if packet.non_blocking && self.dma_busy > 0 {
            self.dma_polls = self.dma_busy;
            packet.transaction_id = 9;
            return Err(BusError::Busy);
        }
        Ok(())
    }
}

/// SPI command collector shared by the SPI simulators
#[derive(Default)]
struct Frame {
    bytes: Vec<u8>,
    read_pos: usize,
}

impl Frame {
    fn opcode(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    fn address(&self, width: usize) -> u32 {
        self.bytes
            .iter()
            .skip(1)
            .take(width)
            .fold(0u32, |acc, &b| (acc << 8) | b as u32)
    }

    fn payload(&self, width: usize) -> &[u8] {
        self.bytes.get(1 + width..).unwrap_or(&[])
    }

    fn clear(&mut self) {
        self.bytes.clear();
        self.read_pos = 0;
    }
}

/// 48L512 / 48LM01 SPI EERAM
pub struct SimSpiEeram {
    pub geometry: &'static MemoryGeometry,
    pub cells: Vec<u8>,
    pub backup: Vec<u8>,
    pub user_space: [u8; 16],
    /// Status bits without BUSY
    pub status: u8,
    /// Status reads reporting BUSY after a store or recall
    pub store_cycle: u32,
    pub dma_busy: u32,
    /// Flip a data bit on the wire during the next secure read
    pub corrupt_next_read: bool,
    /// Flip a data bit of the next secure write before the device checks it
    pub corrupt_next_write: bool,
    pub hibernating: bool,
    pub config: Option<SpiConfig>,
    pub commands: Vec<u8>,
    /// Commands refused for a missing write enable
    pub refused: u32,
    /// Array accesses issued while BUSY
    pub while_busy: u32,
    pub stores: u32,
    pub recalls: u32,
    busy: u32,
    dma_polls: u32,
    frame: Frame,
}

impl SimSpiEeram {
    pub const WEL: u8 = 0x02;
    pub const SWM: u8 = 0x10;

    pub fn new(geometry: &'static MemoryGeometry) -> Self {
        let size = geometry.total_size as usize;
        Self {
            geometry,
            cells: vec![0x00; size],
            backup: vec![0x00; size],
            user_space: [0; 16],
            status: 0,
            store_cycle: 0,
            dma_busy: 0,
            corrupt_next_read: false,
            corrupt_next_write: false,
            hibernating: false,
            config: None,
            commands: Vec::new(),
            refused: 0,
            while_busy: 0,
            stores: 0,
            recalls: 0,
            busy: 0,
            dma_polls: 0,
            frame: Frame::default(),
        }
    }

    fn width(&self) -> usize {
        self.geometry.address_width as usize
    }

    fn page_crc(&self, address: u32) -> [u8; 2] {
        let page = self.geometry.secure_page_size as usize;
        let start = address as usize;
        let mut hasher = crc::SoftwareCrc16;
        let state = crc::address_state(&mut hasher, address, self.geometry.address_bits());
        crc::update(state, &self.cells[start..start + page]).to_be_bytes()
    }

    fn respond(&mut self, buf: &mut [u8]) {
        let width = self.width();
        let address = self.frame.address(width);
        let total = self.geometry.total_size;
        let page = self.geometry.secure_page_size as usize;
        let opcode = self.frame.opcode();
        if matches!(opcode, Some(0x03) | Some(0x13)) && self.busy > 0 {
            self.while_busy += 1;
        }
        for b in buf.iter_mut() {
            let pos = self.frame.read_pos;
            *b = match opcode {
                Some(0x05) => {
                    let busy = self.busy > 0;
                    if busy {
                        self.busy -= 1;
                    }
                    self.status | busy as u8
                }
                Some(0x03) => self.cells[((address + pos as u32) % total) as usize],
                Some(0x13) if pos < page => {
                    let value = self.cells[(address as usize + pos) % total as usize];
                    if pos == 0 && self.corrupt_next_read {
                        self.corrupt_next_read = false;
                        value ^ 0x01
                    } else {
                        value
                    }
                }
                Some(0x13) => self.page_crc(address)[(pos - page).min(1)],
                Some(0xC3) => self.user_space[pos % 16],
                _ => 0xFF,
            };
            self.frame.read_pos += 1;
        }
    }

    fn write_enabled(&mut self) -> bool {
        if self.status & Self::WEL == 0 {
            self.refused += 1;
            return false;
        }
        self.status &= !Self::WEL;
        true
    }

    fn finish(&mut self) {
        let width = self.width();
        let Some(opcode) = self.frame.opcode() else {
            return;
        };
        self.commands.push(opcode);
        let address = self.frame.address(width) as usize;
        match opcode {
            0x06 => self.status |= Self::WEL,
            0x04 => self.status &= !Self::WEL,
            0x02 => {
                if self.busy > 0 {
                    self.while_busy += 1;
                }
                if self.write_enabled() {
                    let data: Vec<u8> = self.frame.payload(width).to_vec();
                    let total = self.cells.len();
                    for (i, b) in data.into_iter().enumerate() {
                        self.cells[(address + i) % total] = b;
                    }
                }
            }
            0x12 => {
                if self.write_enabled() {
                    let page = self.geometry.secure_page_size as usize;
                    let mut data: Vec<u8> = self.frame.payload(width).to_vec();
                    if self.corrupt_next_write {
                        self.corrupt_next_write = false;
                        data[0] ^= 0x80;
                    }
                    let ok = data.len() == page + 2 && {
                        let mut hasher = crc::SoftwareCrc16;
                        let bits = self.geometry.address_bits();
                        let state = crc::address_state(&mut hasher, address as u32, bits);
                        let expected = crc::update(state, &data[..page]).to_be_bytes();
                        expected == data[page..]
                    };
                    if ok {
                        self.cells[address..address + page].copy_from_slice(&data[..page]);
                        self.status &= !Self::SWM;
                    } else {
                        self.status |= Self::SWM;
                    }
                }
            }
            0x01 => {
                if self.write_enabled() {
                    let value = self.frame.payload(0).first().copied().unwrap_or(0);
                    self.status = (self.status & (Self::WEL | Self::SWM)) | (value & 0x4C);
                }
            }
            0xC2 => {
                if self.write_enabled() {
                    let data = self.frame.payload(0);
                    self.user_space.copy_from_slice(&data[..16]);
                }
            }
            0x08 => {
                self.backup.copy_from_slice(&self.cells);
                self.stores += 1;
                self.busy = self.store_cycle;
            }
            0x09 => {
                self.cells.copy_from_slice(&self.backup);
                self.recalls += 1;
                self.busy = self.store_cycle;
            }
            0xB9 => self.hibernating = true,
            _ => {}
        }
    }
}

impl SpiTransport for SimSpiEeram {
    fn init(&mut self, _chip_select: u8, config: &SpiConfig) -> Result<(), BusError> {
        self.config = Some(*config);
        Ok(())
    }

    fn transfer(&mut self, packet: &mut SpiPacket<'_>) -> Result<(), BusError> {
        if packet.non_blocking && packet.buffer.is_empty() {
            if self.dma_polls > 0 {
                self.dma_polls -= 1;
                return Err(BusError::Busy);
            }
            return Ok(());
        }
        match &mut packet.buffer {
            SpiBuffer::Write(data) => self.frame.bytes.extend_from_slice(data),
            SpiBuffer::Read(buf) => self.respond(buf),
            SpiBuffer::InPlace(_) | SpiBuffer::None => {}
        }
        if packet.terminate {
            self.finish();
            self.frame.clear();
        }
        if packet.non_blocking && self.dma_busy > 0 {
            self.dma_polls = self.dma_busy;
            packet.transaction_id = 33;
            return Err(BusError::Busy);
        }
        Ok(())
    }
}

/// 23xxxx SPI SRAM
pub struct SimSpiSram {
    pub geometry: &'static MemoryGeometry,
    pub cells: Vec<u8>,
    /// MODE bits 7..6, HOLD disable bit 0
    pub status: u8,
    /// I/O mode the chip is in
    pub device_lanes: Lanes,
    /// I/O mode the bus was configured for
    pub bus_lanes: Lanes,
    pub commands: Vec<u8>,
    /// Commands clocked with the wrong lane count
    pub garbled: u32,
    /// Bytes dropped by byte mode or wrapped by page mode
    pub overflow: u32,
    pub inits: u32,
    frame: Frame,
}

impl SimSpiSram {
    pub fn new(geometry: &'static MemoryGeometry) -> Self {
        Self {
            geometry,
            cells: vec![0x00; geometry.total_size as usize],
            status: 0x40,
            device_lanes: Lanes::Single,
            bus_lanes: Lanes::Single,
            commands: Vec::new(),
            garbled: 0,
            overflow: 0,
            inits: 0,
            frame: Frame::default(),
        }
    }

    /// Chip powered up in a multi-lane mode, as after an MCU reset
    pub fn stuck_in(mut self, lanes: Lanes) -> Self {
        self.device_lanes = lanes;
        self
    }

    fn dummy(&self) -> usize {
        if self.device_lanes == Lanes::Single {
            0
        } else {
            1
        }
    }

    /// Device offset of the `pos`-th data byte in the current mode
    fn cell(&mut self, address: u32, pos: usize) -> Option<usize> {
        let total = self.geometry.total_size;
        let page = self.geometry.page_size;
        match self.status >> 6 {
            0 if pos > 0 => {
                self.overflow += 1;
                None
            }
            2 => {
                if (address % page) as usize + pos >= page as usize {
                    self.overflow += 1;
                }
                let base = address & !(page - 1);
                Some((base + (address - base + pos as u32) % page) as usize)
            }
            _ => Some(((address + pos as u32) % total) as usize),
        }
    }

    fn respond(&mut self, buf: &mut [u8]) {
        let width = self.geometry.address_width as usize;
        let address = self.frame.address(width);
        let opcode = self.frame.opcode();
        let dummy = self.dummy();
        if self.bus_lanes != self.device_lanes {
            buf.fill(0xFF);
            return;
        }
        for b in buf.iter_mut() {
            let pos = self.frame.read_pos;
            *b = match opcode {
                Some(0x05) => self.status,
                Some(0x03) if pos < dummy => 0x00,
                Some(0x03) => match self.cell(address, pos - dummy) {
                    Some(at) => self.cells[at],
                    None => 0xFF,
                },
                _ => 0xFF,
            };
            self.frame.read_pos += 1;
        }
    }

    fn finish(&mut self) {
        let Some(opcode) = self.frame.opcode() else {
            return;
        };
        self.commands.push(opcode);
        if opcode == 0xFF {
            self.device_lanes = Lanes::Single;
            return;
        }
        if self.bus_lanes != self.device_lanes {
            self.garbled += 1;
            return;
        }
        let width = self.geometry.address_width as usize;
        match opcode {
            0x3B if self.device_lanes == Lanes::Single => self.device_lanes = Lanes::Dual,
            0x38 if self.device_lanes == Lanes::Single => self.device_lanes = Lanes::Quad,
            0x01 => {
                let value = self.frame.payload(0).first().copied().unwrap_or(0);
                let hold = if self.geometry.hold_pin { 0x01 } else { 0x00 };
                self.status = value & (0xC0 | hold);
            }
            0x02 => {
                let address = self.frame.address(width);
                let data: Vec<u8> = self.frame.payload(width).to_vec();
                for (pos, b) in data.into_iter().enumerate() {
                    if let Some(at) = self.cell(address, pos) {
                        self.cells[at] = b;
                    }
                }
            }
            _ => {}
        }
    }
}

impl SpiTransport for SimSpiSram {
    fn init(&mut self, _chip_select: u8, config: &SpiConfig) -> Result<(), BusError> {
        self.bus_lanes = config.lanes;
        self.inits += 1;
        Ok(())
    }

    fn transfer(&mut self, packet: &mut SpiPacket<'_>) -> Result<(), BusError> {
        match &mut packet.buffer {
            SpiBuffer::Write(data) => self.frame.bytes.extend_from_slice(data),
            SpiBuffer::Read(buf) => self.respond(buf),
            SpiBuffer::InPlace(_) | SpiBuffer::None => {}
        }
        if packet.terminate {
            self.finish();
            self.frame.clear();
        }
        Ok(())
    }
}
