use crate::error::{Error, Result};
use crate::machine::cartridge::Cartridge;

use super::{MemoryBlock, MemoryBlockBanked};

/// Identifies a region inside a [`MemoryAccessArray`] independently of its
/// position, so regions can be looked up after inserts and removals have
/// shifted indices (the boot overlay is removed at runtime).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegionTag {
    Boot,
    Cartridge,
    VideoTileData,
    VideoTileMaps,
    WorkRam,
    ObjectAttributes,
    WaveRam,
    HighRam,
    Fallback,
    /// Regions inside a cartridge's own access array.
    CartridgeRom,
    CartridgeRomBank,
    CartridgeRam,
}

pub enum RegionKind {
    Block(MemoryBlock),
    Banked(MemoryBlockBanked),
    Cartridge(Cartridge),
}

pub struct Region {
    pub tag: RegionTag,
    pub kind: RegionKind,
}

impl Region {
    pub fn block(tag: RegionTag, block: MemoryBlock) -> Self {
        Self {
            tag,
            kind: RegionKind::Block(block),
        }
    }

    pub fn banked(tag: RegionTag, banked: MemoryBlockBanked) -> Self {
        Self {
            tag,
            kind: RegionKind::Banked(banked),
        }
    }

    pub fn cartridge(cartridge: Cartridge) -> Self {
        Self {
            tag: RegionTag::Cartridge,
            kind: RegionKind::Cartridge(cartridge),
        }
    }

    pub fn contains(&self, addr: u16) -> bool {
        match &self.kind {
            RegionKind::Block(b) => b.contains(addr),
            RegionKind::Banked(b) => b.contains(addr),
            RegionKind::Cartridge(c) => c.contains(addr),
        }
    }

    fn read_byte(&self, addr: u16) -> u8 {
        match &self.kind {
            RegionKind::Block(b) => b.read_byte(addr),
            RegionKind::Banked(b) => b.read_byte(addr),
            RegionKind::Cartridge(c) => c.read_byte(addr),
        }
    }

    fn write_byte(&mut self, addr: u16, value: u8) {
        match &mut self.kind {
            RegionKind::Block(b) => b.write_byte(addr, value),
            RegionKind::Banked(b) => b.write_byte(addr, value),
            RegionKind::Cartridge(c) => c.write_byte(addr, value),
        }
    }
}

/// Ordered collection of memory regions.
///
/// Resolution is first-match: the earliest region whose range contains the
/// address answers the access, so insertion order doubles as priority.
/// Requests no region owns fail with [`Error::AddressOutOfRange`].
pub struct MemoryAccessArray {
    regions: Vec<Region>,
}

impl MemoryAccessArray {
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    pub fn insert(&mut self, index: usize, region: Region) {
        self.regions.insert(index, region);
    }

    /// Remove the region carrying `tag`, if present.
    pub fn remove(&mut self, tag: RegionTag) -> Option<Region> {
        let index = self.position(tag)?;
        Some(self.regions.remove(index))
    }

    pub fn position(&self, tag: RegionTag) -> Option<usize> {
        self.regions.iter().position(|r| r.tag == tag)
    }

    pub fn get(&self, tag: RegionTag) -> Option<&Region> {
        self.regions.iter().find(|r| r.tag == tag)
    }

    pub fn get_mut(&mut self, tag: RegionTag) -> Option<&mut Region> {
        self.regions.iter_mut().find(|r| r.tag == tag)
    }

    pub fn contains(&self, addr: u16) -> bool {
        self.regions.iter().any(|r| r.contains(addr))
    }

    fn resolve(&self, addr: u16) -> Result<&Region> {
        self.regions
            .iter()
            .find(|r| r.contains(addr))
            .ok_or(Error::AddressOutOfRange(addr))
    }

    fn resolve_mut(&mut self, addr: u16) -> Result<&mut Region> {
        self.regions
            .iter_mut()
            .find(|r| r.contains(addr))
            .ok_or(Error::AddressOutOfRange(addr))
    }

    pub fn read_byte(&self, addr: u16) -> Result<u8> {
        Ok(self.resolve(addr)?.read_byte(addr))
    }

    pub fn write_byte(&mut self, addr: u16, value: u8) -> Result<()> {
        self.resolve_mut(addr)?.write_byte(addr, value);
        Ok(())
    }

    /// Little-endian 16-bit read: low byte at `addr`, high byte above it.
    pub fn read_word(&self, addr: u16) -> Result<u16> {
        let low = self.read_byte(addr)?;
        let high = self.read_byte(addr.wrapping_add(1))?;
        Ok(u16::from_le_bytes([low, high]))
    }

    pub fn write_word(&mut self, addr: u16, value: u16) -> Result<()> {
        let [low, high] = value.to_le_bytes();
        self.write_byte(addr, low)?;
        self.write_byte(addr.wrapping_add(1), high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::bus::{AddressRange, MemoryBlockLayout};

    fn array() -> MemoryAccessArray {
        MemoryAccessArray::new(vec![
            Region::block(
                RegionTag::WorkRam,
                MemoryBlockLayout::builder()
                    .range(AddressRange::new(0xC000, 0xDFFF))
                    .build(),
            ),
            Region::block(
                RegionTag::HighRam,
                MemoryBlockLayout::builder()
                    .range(AddressRange::new(0xFF80, 0xFFFE))
                    .build(),
            ),
        ])
    }

    #[test]
    fn word_access_is_little_endian() {
        let mut bus = array();
        bus.write_word(0xC000, 0xBEEF).unwrap();
        assert_eq!(bus.read_byte(0xC000).unwrap(), 0xEF);
        assert_eq!(bus.read_byte(0xC001).unwrap(), 0xBE);
        assert_eq!(bus.read_word(0xC000).unwrap(), 0xBEEF);
    }

    #[test]
    fn unmapped_address_is_an_error() {
        let mut bus = array();
        assert_eq!(bus.read_byte(0x1234), Err(Error::AddressOutOfRange(0x1234)));
        assert_eq!(
            bus.write_byte(0x1234, 0),
            Err(Error::AddressOutOfRange(0x1234))
        );
    }

    #[test]
    fn earlier_regions_shadow_later_ones() {
        let mut bus = array();
        // Overlay the first 16 bytes of work RAM with a read-only block.
        let overlay = MemoryBlock::from_bytes(AddressRange::new(0xC000, 0xC00F), &[0x99; 16], true);
        bus.insert(0, Region::block(RegionTag::Boot, overlay));

        bus.write_byte(0xC005, 0x11).unwrap(); // dropped by the overlay
        assert_eq!(bus.read_byte(0xC005).unwrap(), 0x99);

        // Removing the overlay exposes the block underneath.
        bus.remove(RegionTag::Boot);
        assert_eq!(bus.read_byte(0xC005).unwrap(), 0x00);
        bus.write_byte(0xC005, 0x11).unwrap();
        assert_eq!(bus.read_byte(0xC005).unwrap(), 0x11);
    }
}
