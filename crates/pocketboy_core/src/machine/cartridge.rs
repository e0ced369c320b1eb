mod mbc1;

use crate::error::{Error, Result};

use self::mbc1::Mbc1;
use super::bus::{
    AddressRange, MemoryAccessArray, MemoryBlock, MemoryBlockBanked, Region, RegionKind, RegionTag,
};

/// ROM header offset of the cartridge (mapper) type byte.
const HEADER_CARTRIDGE_TYPE: usize = 0x0147;
/// ROM header offset of the declared RAM size byte.
const HEADER_RAM_SIZE: usize = 0x0149;

const ROM_BANK_LEN: usize = 0x4000;
const RAM_BANK_LEN: usize = 0x2000;

const ROM_RANGE: AddressRange = AddressRange::new(0x0000, 0x7FFF);
const ROM_BANK0_RANGE: AddressRange = AddressRange::new(0x0000, 0x3FFF);
const ROM_BANKED_RANGE: AddressRange = AddressRange::new(0x4000, 0x7FFF);
const RAM_RANGE: AddressRange = AddressRange::new(0xA000, 0xBFFF);

enum Mbc {
    /// No mapper: flat 32 KiB ROM plus optional RAM (type 0x00).
    Flat,
    /// MBC1 bank-select state machine (types 0x01-0x03).
    Mbc1(Mbc1),
}

/// A cartridge: an access array over its ROM/RAM regions plus the mapper
/// state machine that reacts to writes into the ROM address windows.
///
/// Construction inspects the ROM header. Unsupported mapper types fail
/// with [`Error::UnsupportedCartridge`]; callers degrade to
/// [`Cartridge::inert`] so the rest of the machine keeps running.
pub struct Cartridge {
    regions: MemoryAccessArray,
    mbc: Mbc,
}

impl Cartridge {
    pub fn new(rom: &[u8]) -> Result<Self> {
        let kind = rom.get(HEADER_CARTRIDGE_TYPE).copied().unwrap_or(0);
        match kind {
            0x00 => Ok(Self::new_flat(rom)),
            0x01..=0x03 => Ok(Self::new_mbc1(rom)),
            other => Err(Error::UnsupportedCartridge(other)),
        }
    }

    /// Cartridge slot filler that reads 0xFF everywhere and ignores
    /// writes, used when the real ROM declares an unsupported mapper.
    pub fn inert() -> Self {
        let mut rom = MemoryBlock::from_bytes(ROM_RANGE, &[], true);
        rom.set_enabled(false);
        let mut ram = MemoryBlockBanked::with_blank_banks(RAM_RANGE, 1, RAM_BANK_LEN);
        ram.set_enabled(false);
        Self {
            regions: MemoryAccessArray::new(vec![
                Region::block(RegionTag::CartridgeRom, rom),
                Region::banked(RegionTag::CartridgeRam, ram),
            ]),
            mbc: Mbc::Flat,
        }
    }

    fn new_flat(rom: &[u8]) -> Self {
        Self {
            regions: MemoryAccessArray::new(vec![
                Region::block(RegionTag::CartridgeRom, MemoryBlock::from_bytes(ROM_RANGE, rom, true)),
                Region::banked(RegionTag::CartridgeRam, Self::ram_from_header(rom, true)),
            ]),
            mbc: Mbc::Flat,
        }
    }

    fn new_mbc1(rom: &[u8]) -> Self {
        let bank0_end = rom.len().min(ROM_BANK_LEN);
        let bank0 = MemoryBlock::from_bytes(ROM_BANK0_RANGE, &rom[..bank0_end], true);

        // Split everything past bank 0 into 16 KiB banks; the switchable
        // window indexes into these with 1-based hardware numbering
        // converted to 0-based here.
        let mut banks: Vec<Vec<u8>> = rom
            .chunks(ROM_BANK_LEN)
            .skip(1)
            .map(|chunk| {
                let mut bank = chunk.to_vec();
                bank.resize(ROM_BANK_LEN, 0);
                bank
            })
            .collect();
        if banks.is_empty() {
            banks.push(vec![0; ROM_BANK_LEN]);
        }
        let switchable = MemoryBlockBanked::new(ROM_BANKED_RANGE, banks, true);

        // External RAM starts disabled until the enable sequence is written.
        let mut ram = Self::ram_from_header(rom, false);
        ram.set_enabled(false);

        Self {
            regions: MemoryAccessArray::new(vec![
                Region::block(RegionTag::CartridgeRom, bank0),
                Region::banked(RegionTag::CartridgeRomBank, switchable),
                Region::banked(RegionTag::CartridgeRam, ram),
            ]),
            mbc: Mbc::Mbc1(Mbc1::default()),
        }
    }

    /// RAM banks per header byte 0x0149: 1/2/3 map to 2/8/32 KiB; anything
    /// else gets the 2 KiB default. A bank shorter than the window mirrors
    /// through the modulo rule.
    fn ram_from_header(rom: &[u8], enabled: bool) -> MemoryBlockBanked {
        let (count, len) = match rom.get(HEADER_RAM_SIZE).copied().unwrap_or(0) {
            0x02 => (1, RAM_BANK_LEN),
            0x03 => (4, RAM_BANK_LEN),
            _ => (1, 0x0800),
        };
        let mut ram = MemoryBlockBanked::with_blank_banks(RAM_RANGE, count, len);
        ram.set_enabled(enabled);
        ram
    }

    pub fn contains(&self, addr: u16) -> bool {
        self.regions.contains(addr)
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        // Every address inside the cartridge windows resolves by
        // construction; treat anything else as open bus.
        self.regions.read_byte(addr).unwrap_or(0xFF)
    }

    pub fn write_byte(&mut self, addr: u16, value: u8) {
        if ROM_RANGE.contains(addr) {
            self.control_write(addr, value);
            return;
        }
        // RAM window; enable/read-only handling lives in the block itself.
        let _ = self.regions.write_byte(addr, value);
    }

    /// Writes into the ROM address windows drive the mapper registers
    /// rather than memory.
    fn control_write(&mut self, addr: u16, value: u8) {
        let Mbc::Mbc1(ref mut mbc) = self.mbc else {
            return;
        };
        mbc.control_write(addr, value);

        let rom_bank = mbc.rom_bank_index();
        let ram_bank = mbc.ram_bank_index();
        let ram_enabled = mbc.ram_enabled();
        if let Some(region) = self.regions.get_mut(RegionTag::CartridgeRomBank) {
            if let RegionKind::Banked(banked) = &mut region.kind {
                banked.set_bank_index(rom_bank);
            }
        }
        if let Some(region) = self.regions.get_mut(RegionTag::CartridgeRam) {
            if let RegionKind::Banked(banked) = &mut region.kind {
                banked.set_enabled(ram_enabled);
                banked.set_bank_index(ram_bank);
            }
        }
    }
}
