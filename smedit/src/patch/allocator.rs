use anyhow::{bail, ensure, Result};
use log::info;
use smedit_game::PcAddr;

use super::Rom;
use crate::settings::PatchOptions;

pub const BANK_SIZE: usize = 0x8000;

/// Bump allocator over one run of free space in the image. One instance is owned by a
/// single patch pass, so allocations from different rooms never overlap.
#[derive(Debug)]
pub struct Allocator {
    start_addr: PcAddr,
    end_addr: PcAddr,
    current_addr: PcAddr,
}

impl Allocator {
    pub fn new(start_addr: PcAddr, end_addr: PcAddr) -> Self {
        Allocator {
            start_addr,
            end_addr,
            current_addr: start_addr,
        }
    }

    /// Finds the run of filler bytes at the end of `bank`, scanning backward from the bank's
    /// last byte (excluding the reserved tail) until a byte in use is found.
    pub fn from_bank_free_space(rom: &Rom, bank: u8, options: &PatchOptions) -> Result<Self> {
        ensure!(bank >= 0x80, "bank {bank:02X} is not a ROM bank");
        let bank_start = rom.snes2pc((bank as usize) << 16 | 0x8000);
        let bank_end = bank_start + BANK_SIZE;
        ensure!(
            bank_end <= rom.data.len(),
            "bank {bank:02X} is outside the image"
        );
        let end = bank_end - options.reserved_tail.min(BANK_SIZE);
        let mut start = end;
        while start > bank_start && rom.data[start - 1] == options.filler_byte {
            start -= 1;
        }
        let start = if start == bank_start {
            start
        } else {
            (start + options.free_space_guard).min(end)
        };
        info!(
            "Free space in bank {bank:02X}: {:#X} bytes at {start:#X}",
            end - start
        );
        Ok(Allocator::new(start, end))
    }

    pub fn allocate(&mut self, size: usize) -> Result<PcAddr> {
        if self.remaining() < size {
            bail!(
                "Failed to allocate {size} bytes ({} of {} left)",
                self.remaining(),
                self.capacity()
            );
        }
        let addr = self.current_addr;
        self.current_addr += size;
        Ok(addr)
    }

    pub fn capacity(&self) -> usize {
        self.end_addr - self.start_addr
    }

    pub fn used(&self) -> usize {
        self.current_addr - self.start_addr
    }

    pub fn remaining(&self) -> usize {
        self.end_addr - self.current_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with_bank_usage(used: usize) -> Rom {
        // Two banks: $80 full of data, $81 used for its first `used` bytes.
        let mut data = vec![0x00; 2 * BANK_SIZE];
        data[BANK_SIZE + used..].fill(0xFF);
        Rom::new(data)
    }

    #[test]
    fn finds_trailing_free_space() {
        let rom = rom_with_bank_usage(0x100);
        let options = PatchOptions::default();
        let mut allocator = Allocator::from_bank_free_space(&rom, 0x81, &options).unwrap();
        assert_eq!(allocator.capacity(), BANK_SIZE - 0x101);
        assert_eq!(allocator.allocate(0x10).unwrap(), BANK_SIZE + 0x101);
        assert_eq!(allocator.allocate(0x10).unwrap(), BANK_SIZE + 0x111);
        assert_eq!(allocator.used(), 0x20);
        assert!(allocator.allocate(BANK_SIZE).is_err());
        // A failed request takes nothing.
        assert_eq!(allocator.remaining(), BANK_SIZE - 0x121);
        let rest = allocator.remaining();
        assert!(allocator.allocate(rest).is_ok());
        assert_eq!(allocator.remaining(), 0);

        let options = PatchOptions {
            reserved_tail: 0x1000,
            free_space_guard: 0,
            ..PatchOptions::default()
        };
        let allocator = Allocator::from_bank_free_space(&rom, 0x81, &options).unwrap();
        assert_eq!(allocator.capacity(), BANK_SIZE - 0x100 - 0x1000);
    }

    #[test]
    fn full_bank_has_no_space() {
        let rom = rom_with_bank_usage(BANK_SIZE);
        let mut allocator =
            Allocator::from_bank_free_space(&rom, 0x81, &PatchOptions::default()).unwrap();
        assert_eq!(allocator.capacity(), 0);
        assert!(allocator.allocate(1).is_err());
        assert!(Allocator::from_bank_free_space(&rom, 0x82, &PatchOptions::default()).is_err());
    }
}
