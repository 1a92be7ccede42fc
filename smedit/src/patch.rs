pub mod allocator;
pub mod compress;
pub mod decompress;
pub mod room_edits;

use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use hashbrown::HashSet;
use smedit_game::{PcAddr, SnesAddr};

pub const ROM_SIZE: usize = 0x300000;
pub const COPIER_HEADER_SIZE: usize = 0x200;

// LoROM mapping, ignoring any copier header:
pub fn snes2pc(addr: usize) -> usize {
    addr >> 1 & 0x3F8000 | addr & 0x7FFF
}

pub fn pc2snes(addr: usize) -> usize {
    addr << 1 & 0xFF0000 | addr & 0xFFFF | 0x808000
}

/// A 24-bit (bank, offset) address in the console's memory map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BankAddress(pub u32);

impl BankAddress {
    pub fn new(bank: u8, offset: u16) -> Self {
        BankAddress((bank as u32) << 16 | offset as u32)
    }

    pub fn bank(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn offset(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    // Canonical ROM addresses: fast banks, upper half of each bank.
    pub fn is_canonical(self) -> bool {
        self.bank() >= 0x80 && self.offset() >= 0x8000
    }
}

/// Converts between bank addresses and offsets into the image buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct AddressTranslator {
    pub header_size: usize,
}

impl AddressTranslator {
    pub fn to_flat_offset(&self, addr: BankAddress) -> PcAddr {
        self.header_size + snes2pc(addr.0 as usize)
    }

    pub fn to_bank_address(&self, offset: PcAddr) -> Option<BankAddress> {
        let pc = offset.checked_sub(self.header_size)?;
        Some(BankAddress(pc2snes(pc) as u32))
    }
}

#[derive(Clone)]
pub struct Rom {
    pub data: Vec<u8>,
    pub translator: AddressTranslator,
    track_touched: bool,
    touched: HashSet<usize>,
}

impl Rom {
    /// Wraps a raw buffer without checking its size or looking for a copier header.
    pub fn new(data: Vec<u8>) -> Self {
        Rom {
            data,
            translator: AddressTranslator::default(),
            track_touched: false,
            touched: HashSet::new(),
        }
    }

    /// Wraps a full cartridge image, which must be exactly the cartridge size,
    /// optionally preceded by a copier header.
    pub fn from_image(data: Vec<u8>) -> Result<Self> {
        let header_size = match data.len() {
            ROM_SIZE => 0,
            n if n == ROM_SIZE + COPIER_HEADER_SIZE => COPIER_HEADER_SIZE,
            n => bail!(
                "Unexpected image size {n:#X} (expected {ROM_SIZE:#X} or {:#X})",
                ROM_SIZE + COPIER_HEADER_SIZE
            ),
        };
        let mut rom = Rom::new(data);
        rom.translator = AddressTranslator { header_size };
        Ok(rom)
    }

    pub fn enable_tracking(&mut self) {
        self.track_touched = true;
        self.touched.clear();
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Unable to load ROM at path {}", path.display()))?;
        Rom::from_image(data)
            .with_context(|| format!("Unable to use ROM at path {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.data)
            .with_context(|| format!("Unable to save ROM at path {}", path.display()))?;
        Ok(())
    }

    pub fn snes2pc(&self, addr: SnesAddr) -> PcAddr {
        self.translator.to_flat_offset(BankAddress(addr as u32))
    }

    pub fn pc2snes(&self, addr: PcAddr) -> Option<SnesAddr> {
        self.translator
            .to_bank_address(addr)
            .map(|a| a.0 as SnesAddr)
    }

    pub fn read_u8(&self, addr: usize) -> Result<isize> {
        ensure!(addr < self.data.len(), "read_u8 address out of bounds");
        Ok(self.data[addr] as isize)
    }

    pub fn read_u16(&self, addr: usize) -> Result<isize> {
        ensure!(
            addr + 2 <= self.data.len(),
            "read_u16 address out of bounds"
        );
        let b0 = self.data[addr] as isize;
        let b1 = self.data[addr + 1] as isize;
        Ok(b0 | b1 << 8)
    }

    pub fn read_u24(&self, addr: usize) -> Result<isize> {
        ensure!(
            addr + 3 <= self.data.len(),
            "read_u24 address out of bounds"
        );
        let b0 = self.data[addr] as isize;
        let b1 = self.data[addr + 1] as isize;
        let b2 = self.data[addr + 2] as isize;
        Ok(b0 | b1 << 8 | b2 << 16)
    }

    pub fn read_n(&self, addr: usize, n: usize) -> Result<&[u8]> {
        ensure!(addr + n <= self.data.len(), "read_n address out of bounds");
        Ok(&self.data[addr..(addr + n)])
    }

    pub fn write_u8(&mut self, addr: usize, x: isize) -> Result<()> {
        ensure!(addr < self.data.len(), "write_u8 address out of bounds");
        ensure!((0..=0xFF).contains(&x), "write_u8 data does not fit");
        self.data[addr] = x as u8;
        if self.track_touched {
            self.touched.insert(addr);
        }
        Ok(())
    }

    pub fn write_u16(&mut self, addr: usize, x: isize) -> Result<()> {
        ensure!(
            addr + 2 <= self.data.len(),
            "write_u16 address out of bounds"
        );
        ensure!((0..=0xFFFF).contains(&x), "write_u16 data does not fit");
        self.write_u8(addr, x & 0xFF)?;
        self.write_u8(addr + 1, x >> 8)?;
        Ok(())
    }

    pub fn write_n(&mut self, addr: usize, x: &[u8]) -> Result<()> {
        ensure!(
            addr + x.len() <= self.data.len(),
            "write_n address out of bounds"
        );
        for (i, &b) in x.iter().enumerate() {
            self.write_u8(addr + i, b as isize)?;
        }
        Ok(())
    }

    // Returns a list of [start, end) ranges.
    #[allow(clippy::mut_range_bound)]
    pub fn get_modified_ranges(&self) -> Vec<(usize, usize)> {
        let mut addresses: Vec<usize> = self.touched.iter().copied().collect();
        addresses.sort();
        let mut ranges: Vec<(usize, usize)> = vec![];

        let mut i = 0;
        'r: while i < addresses.len() {
            for j in i..addresses.len() - 1 {
                if addresses[j + 1] != addresses[j] + 1 {
                    ranges.push((addresses[i], addresses[j] + 1));
                    i = j + 1;
                    continue 'r;
                }
            }
            ranges.push((addresses[i], addresses[addresses.len() - 1] + 1));
            break;
        }
        ranges
    }
}
