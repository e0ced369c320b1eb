//! Scanline composition: background, window, and objects.
//!
//! Everything here is a pure function of the current register values and
//! the VRAM/OAM contents; the only retained state is a pair of caches
//! keyed on the bus version counters so unchanged sprite data is not
//! re-decoded every scanline.

use bitflags::bitflags;
use pocketboy_common::Color;

use crate::error::Result;
use crate::machine::mmu::{regs, Mmu};
use crate::SCREEN_WIDTH;

use super::{Lcdc, Ppu};

/// DMG grey shades, lightest (palette value 0) to darkest.
pub(super) const SHADES: [Color; 4] = [
    Color::new_grey(0xFF),
    Color::new_grey(0xAA),
    Color::new_grey(0x55),
    Color::new_grey(0x00),
];

/// Object entries in OAM.
const OBJECT_COUNT: u16 = 40;
/// Hardware limit of objects drawn on one scanline.
const MAX_OBJECTS_PER_LINE: usize = 10;

const OAM_BASE: u16 = 0xFE00;
const TILE_DATA_BASE: u16 = 0x8000;
/// Base of the signed tile-index addressing mode.
const TILE_DATA_SIGNED_BASE: i32 = 0x9000;
const TILE_MAP_LOW: u16 = 0x9800;
const TILE_MAP_HIGH: u16 = 0x9C00;
/// Bytes per 8x8 tile (two per row).
const TILE_LEN: u16 = 16;

bitflags! {
    /// OAM attribute byte.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub(super) struct ObjectAttributes: u8 {
        /// Nonzero background colors cover this object.
        const BG_PRIORITY = 0x80;
        const FLIP_Y      = 0x40;
        const FLIP_X      = 0x20;
        /// Selects OBP1 over OBP0.
        const PALETTE_1   = 0x10;
    }
}

/// One parsed OAM entry, with screen-space coordinates.
#[derive(Copy, Clone)]
pub(super) struct Object {
    y: i16,
    x: i16,
    tile: u8,
    attrs: ObjectAttributes,
}

/// Parsed OAM table, reused until OAM or the object height changes.
pub(super) struct ObjectCache {
    key: Option<(u64, u8)>,
    objects: Vec<Object>,
}

impl ObjectCache {
    pub(super) fn new() -> Self {
        Self {
            key: None,
            objects: Vec::new(),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
struct LineKey {
    oam_version: u64,
    vram_version: u64,
    height: u8,
    line: u8,
}

/// Objects selected for the current scanline, with their tile-row bytes
/// already resolved. The key covers every input the selection depends
/// on, so a repeat of the same line with untouched OAM/VRAM is free.
pub(super) struct LineObjects {
    key: Option<LineKey>,
    selected: Vec<(Object, [u8; 2])>,
}

impl LineObjects {
    pub(super) fn new() -> Self {
        Self {
            key: None,
            selected: Vec::new(),
        }
    }
}

impl Ppu {
    /// OAM scan: pick the first ten objects overlapping this scanline (in
    /// OAM order) and resolve their tile-row data.
    pub(super) fn select_line_objects(&mut self, mmu: &mut Mmu) -> Result<()> {
        let lcdc = Lcdc::from_bits_retain(mmu.read_byte(regs::LCDC)?);
        let height: u8 = if lcdc.contains(Lcdc::OBJECT_SIZE) {
            16
        } else {
            8
        };

        let key = LineKey {
            oam_version: mmu.object_attributes().version(),
            vram_version: mmu.video_tile_data().version(),
            height,
            line: self.ly,
        };
        if self.line_objects.key == Some(key) {
            return Ok(());
        }

        self.refresh_object_table(mmu, height);

        let line = self.ly as i16;
        let tile_data = mmu.video_tile_data();
        let selected: Vec<(Object, [u8; 2])> = self
            .objects
            .objects
            .iter()
            .filter(|object| line >= object.y && line < object.y + height as i16)
            .take(MAX_OBJECTS_PER_LINE)
            .map(|object| {
                let mut row = (line - object.y) as u8;
                if object.attrs.contains(ObjectAttributes::FLIP_Y) {
                    row = height - 1 - row;
                }
                // In 8x16 mode the tile index's low bit is replaced by
                // the half being drawn.
                let mut tile = object.tile;
                if height == 16 {
                    tile = (tile & 0xFE) | u8::from(row >= 8);
                    row &= 0x07;
                }
                let addr = TILE_DATA_BASE + tile as u16 * TILE_LEN + row as u16 * 2;
                let bytes = [tile_data.read_byte(addr), tile_data.read_byte(addr + 1)];
                (*object, bytes)
            })
            .collect();

        self.line_objects.key = Some(key);
        self.line_objects.selected = selected;
        Ok(())
    }

    /// Re-decode the 40 OAM entries if OAM changed since the last parse.
    fn refresh_object_table(&mut self, mmu: &Mmu, height: u8) {
        let oam = mmu.object_attributes();
        let key = (oam.version(), height);
        if self.objects.key == Some(key) {
            return;
        }

        self.objects.objects.clear();
        for index in 0..OBJECT_COUNT {
            let base = OAM_BASE + index * 4;
            self.objects.objects.push(Object {
                y: oam.read_byte(base) as i16 - 16,
                x: oam.read_byte(base + 1) as i16 - 8,
                tile: oam.read_byte(base + 2),
                attrs: ObjectAttributes::from_bits_truncate(oam.read_byte(base + 3)),
            });
        }
        self.objects.key = Some(key);
    }

    /// Pixel transfer: compose one scanline into the bitmap.
    pub(super) fn render_scanline(&mut self, mmu: &mut Mmu) -> Result<()> {
        let lcdc = Lcdc::from_bits_retain(mmu.read_byte(regs::LCDC)?);
        let scy = mmu.read_byte(regs::SCY)?;
        let scx = mmu.read_byte(regs::SCX)?;
        let bgp = mmu.read_byte(regs::BGP)?;
        let obp = [mmu.read_byte(regs::OBP0)?, mmu.read_byte(regs::OBP1)?];
        let wy = mmu.read_byte(regs::WY)?;
        let wx = mmu.read_byte(regs::WX)?;

        let line = self.ly;
        let window_active = lcdc.contains(Lcdc::WINDOW_ENABLE) && line >= wy && wx < 167;
        let window_x0 = wx as i16 - 7;
        let mut window_drawn = false;

        for x in 0..SCREEN_WIDTH as u8 {
            // Background, possibly replaced by the window.
            let mut color_index = 0u8;
            if lcdc.contains(Lcdc::BG_ENABLE) {
                color_index = self.background_pixel(mmu, lcdc, x.wrapping_add(scx), line.wrapping_add(scy));
            }
            if window_active && (x as i16) >= window_x0 {
                let col = (x as i16 - window_x0) as u8;
                color_index = self.window_pixel(mmu, lcdc, col, self.window_line);
                window_drawn = true;
            }

            let mut color = SHADES[palette_shade(bgp, color_index)];

            // Objects: first opaque pixel in OAM order wins; the
            // background-priority attribute lets nonzero background
            // colors cover the object.
            if lcdc.contains(Lcdc::OBJECT_ENABLE) {
                for (object, row) in &self.line_objects.selected {
                    let offset = x as i16 - object.x;
                    if !(0..8).contains(&offset) {
                        continue;
                    }
                    let bit = if object.attrs.contains(ObjectAttributes::FLIP_X) {
                        offset as u8
                    } else {
                        7 - offset as u8
                    };
                    let object_index = pixel_color_index(*row, bit);
                    if object_index == 0 {
                        continue; // transparent
                    }
                    if object.attrs.contains(ObjectAttributes::BG_PRIORITY) && color_index != 0 {
                        break;
                    }
                    let palette = obp[object.attrs.contains(ObjectAttributes::PALETTE_1) as usize];
                    color = SHADES[palette_shade(palette, object_index)];
                    break;
                }
            }

            self.bitmap.put_pixel(x as usize, line as usize, color);
        }

        if window_drawn {
            self.window_line = self.window_line.wrapping_add(1);
        }
        Ok(())
    }

    /// 2-bit background color index at a point in background space.
    fn background_pixel(&self, mmu: &Mmu, lcdc: Lcdc, bg_x: u8, bg_y: u8) -> u8 {
        let map_base = if lcdc.contains(Lcdc::BG_TILE_MAP) {
            TILE_MAP_HIGH
        } else {
            TILE_MAP_LOW
        };
        self.tile_pixel(mmu, lcdc, map_base, bg_x, bg_y)
    }

    /// 2-bit window color index at a point in window space.
    fn window_pixel(&self, mmu: &Mmu, lcdc: Lcdc, win_x: u8, win_y: u8) -> u8 {
        let map_base = if lcdc.contains(Lcdc::WINDOW_TILE_MAP) {
            TILE_MAP_HIGH
        } else {
            TILE_MAP_LOW
        };
        self.tile_pixel(mmu, lcdc, map_base, win_x, win_y)
    }

    fn tile_pixel(&self, mmu: &Mmu, lcdc: Lcdc, map_base: u16, x: u8, y: u8) -> u8 {
        let map_index = (y as u16 / 8) * 32 + x as u16 / 8;
        let tile = mmu.video_tile_maps().read_byte(map_base + map_index);

        let row = (y & 0x07) as u16;
        let addr = if lcdc.contains(Lcdc::TILE_DATA_8000) {
            TILE_DATA_BASE + tile as u16 * TILE_LEN + row * 2
        } else {
            (TILE_DATA_SIGNED_BASE + (tile as i8 as i32) * TILE_LEN as i32) as u16 + row * 2
        };
        let tile_data = mmu.video_tile_data();
        let bytes = [tile_data.read_byte(addr), tile_data.read_byte(addr + 1)];
        pixel_color_index(bytes, 7 - (x & 0x07))
    }
}

/// Combine the two tile-row bytes into the 2-bit color index at `bit`.
#[inline]
fn pixel_color_index(row: [u8; 2], bit: u8) -> u8 {
    let low = (row[0] >> bit) & 0x01;
    let high = (row[1] >> bit) & 0x01;
    (high << 1) | low
}

/// Map a 2-bit color index through a palette register to a shade 0-3.
#[inline]
fn palette_shade(palette: u8, color_index: u8) -> usize {
    ((palette >> (color_index * 2)) & 0x03) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::mmu::regs;

    const LINE_CYCLES: u32 = 228;

    /// LCD on, background + objects enabled, 0x8000 tile data, identity
    /// palettes.
    fn video_mmu() -> Mmu {
        let mut mmu = Mmu::new();
        mmu.write_byte_silent(regs::LCDC, 0x93).unwrap();
        mmu.write_byte_silent(regs::BGP, 0xE4).unwrap();
        mmu.write_byte_silent(regs::OBP0, 0xE4).unwrap();
        mmu.write_byte_silent(regs::OBP1, 0xE4).unwrap();
        mmu
    }

    /// Fill one 8-pixel tile row with a solid 2-bit color.
    fn set_tile_row(mmu: &mut Mmu, tile: u8, row: u16, color: u8) {
        let addr = 0x8000 + tile as u16 * 16 + row * 2;
        let low = if color & 1 != 0 { 0xFF } else { 0x00 };
        let high = if color & 2 != 0 { 0xFF } else { 0x00 };
        mmu.write_byte_silent(addr, low).unwrap();
        mmu.write_byte_silent(addr + 1, high).unwrap();
    }

    #[test]
    fn background_tile_colors_reach_the_bitmap() {
        let mut mmu = video_mmu();
        // Tile 0 everywhere (map already zeroed); its first row is color 1.
        set_tile_row(&mut mmu, 0, 0, 1);

        let mut ppu = Ppu::new();
        ppu.run(&mut mmu, LINE_CYCLES).unwrap();

        assert_eq!(ppu.bitmap().pixel(0, 0), SHADES[1]);
        assert_eq!(ppu.bitmap().pixel(159, 0), SHADES[1]);
        // Row 1 of the tile is still color 0.
        ppu.run(&mut mmu, LINE_CYCLES).unwrap();
        assert_eq!(ppu.bitmap().pixel(0, 1), SHADES[0]);
    }

    #[test]
    fn scroll_x_shifts_the_fetched_column() {
        let mut mmu = video_mmu();
        // Tile 1 is solid color 3; map cell (1,0) points at it.
        for row in 0..8 {
            set_tile_row(&mut mmu, 1, row, 3);
        }
        mmu.write_byte_silent(0x9801, 1).unwrap();

        let mut ppu = Ppu::new();
        ppu.run(&mut mmu, LINE_CYCLES).unwrap();
        assert_eq!(ppu.bitmap().pixel(8, 0), SHADES[3]);
        assert_eq!(ppu.bitmap().pixel(0, 0), SHADES[0]);

        // Scrolling 8 pixels right brings tile 1 to the left edge.
        let mut mmu2 = video_mmu();
        for row in 0..8 {
            set_tile_row(&mut mmu2, 1, row, 3);
        }
        mmu2.write_byte_silent(0x9801, 1).unwrap();
        mmu2.write_byte_silent(regs::SCX, 8).unwrap();
        let mut ppu2 = Ppu::new();
        ppu2.run(&mut mmu2, LINE_CYCLES).unwrap();
        assert_eq!(ppu2.bitmap().pixel(0, 0), SHADES[3]);
    }

    #[test]
    fn signed_tile_addressing_resolves_negative_indices() {
        let mut mmu = video_mmu();
        // Clear the 0x8000-indexing bit: LCDC tile data select off.
        mmu.write_byte_silent(regs::LCDC, 0x83).unwrap();
        // Map cell 0 holds index 0xFF (-1): tile row lives at 0x8FF0.
        mmu.write_byte_silent(0x9800, 0xFF).unwrap();
        mmu.write_byte_silent(0x8FF0, 0xFF).unwrap();
        mmu.write_byte_silent(0x8FF1, 0xFF).unwrap();

        let mut ppu = Ppu::new();
        ppu.run(&mut mmu, LINE_CYCLES).unwrap();
        assert_eq!(ppu.bitmap().pixel(0, 0), SHADES[3]);
    }

    #[test]
    fn object_pixels_overlay_the_background() {
        let mut mmu = video_mmu();
        // Object tile 2 solid color 3; entry 0 at screen (0,0).
        for row in 0..8 {
            set_tile_row(&mut mmu, 2, row, 3);
        }
        mmu.write_byte_silent(0xFE00, 16).unwrap(); // y
        mmu.write_byte_silent(0xFE01, 8).unwrap(); // x
        mmu.write_byte_silent(0xFE02, 2).unwrap(); // tile
        mmu.write_byte_silent(0xFE03, 0).unwrap(); // attrs

        let mut ppu = Ppu::new();
        ppu.run(&mut mmu, LINE_CYCLES).unwrap();
        assert_eq!(ppu.bitmap().pixel(0, 0), SHADES[3]);
        assert_eq!(ppu.bitmap().pixel(7, 0), SHADES[3]);
        assert_eq!(ppu.bitmap().pixel(8, 0), SHADES[0], "past the object");
    }

    #[test]
    fn transparent_object_pixels_show_background() {
        let mut mmu = video_mmu();
        set_tile_row(&mut mmu, 0, 0, 2); // background color 2
        // Object tile 2 left as color 0 (transparent).
        mmu.write_byte_silent(0xFE00, 16).unwrap();
        mmu.write_byte_silent(0xFE01, 8).unwrap();
        mmu.write_byte_silent(0xFE02, 2).unwrap();

        let mut ppu = Ppu::new();
        ppu.run(&mut mmu, LINE_CYCLES).unwrap();
        assert_eq!(ppu.bitmap().pixel(0, 0), SHADES[2]);
    }

    #[test]
    fn background_priority_attribute_hides_the_object() {
        let mut mmu = video_mmu();
        set_tile_row(&mut mmu, 0, 0, 1); // nonzero background
        for row in 0..8 {
            set_tile_row(&mut mmu, 2, row, 3);
        }
        mmu.write_byte_silent(0xFE00, 16).unwrap();
        mmu.write_byte_silent(0xFE01, 8).unwrap();
        mmu.write_byte_silent(0xFE02, 2).unwrap();
        mmu.write_byte_silent(0xFE03, 0x80).unwrap(); // behind background

        let mut ppu = Ppu::new();
        ppu.run(&mut mmu, LINE_CYCLES).unwrap();
        assert_eq!(ppu.bitmap().pixel(0, 0), SHADES[1]);
    }

    #[test]
    fn lower_oam_index_wins_between_overlapping_objects() {
        let mut mmu = video_mmu();
        for row in 0..8 {
            set_tile_row(&mut mmu, 1, row, 1);
            set_tile_row(&mut mmu, 2, row, 3);
        }
        // Entry 0 uses tile 1; entry 1 uses tile 2 at the same spot.
        for (entry, tile) in [(0u16, 1u8), (1, 2)] {
            let base = 0xFE00 + entry * 4;
            mmu.write_byte_silent(base, 16).unwrap();
            mmu.write_byte_silent(base + 1, 8).unwrap();
            mmu.write_byte_silent(base + 2, tile).unwrap();
        }

        let mut ppu = Ppu::new();
        ppu.run(&mut mmu, LINE_CYCLES).unwrap();
        assert_eq!(ppu.bitmap().pixel(0, 0), SHADES[1]);
    }

    #[test]
    fn at_most_ten_objects_render_on_one_line() {
        let mut mmu = video_mmu();
        for row in 0..8 {
            set_tile_row(&mut mmu, 1, row, 3);
        }
        // Twelve objects side by side on line 0.
        for entry in 0u16..12 {
            let base = 0xFE00 + entry * 4;
            mmu.write_byte_silent(base, 16).unwrap();
            mmu.write_byte_silent(base + 1, 8 + (entry as u8) * 8).unwrap();
            mmu.write_byte_silent(base + 2, 1).unwrap();
        }

        let mut ppu = Ppu::new();
        ppu.run(&mut mmu, LINE_CYCLES).unwrap();
        // Object 9 (columns 72-79) still renders, object 10 does not.
        assert_eq!(ppu.bitmap().pixel(72, 0), SHADES[3]);
        assert_eq!(ppu.bitmap().pixel(80, 0), SHADES[0]);
    }

    #[test]
    fn oam_writes_invalidate_the_object_cache() {
        let mut mmu = video_mmu();
        for row in 0..8 {
            set_tile_row(&mut mmu, 1, row, 3);
        }
        mmu.write_byte_silent(0xFE00, 16).unwrap();
        mmu.write_byte_silent(0xFE01, 8).unwrap();
        mmu.write_byte_silent(0xFE02, 1).unwrap();

        let frame: u32 = 228 * 154;
        let mut ppu = Ppu::new();
        ppu.run(&mut mmu, frame).unwrap();
        assert_eq!(ppu.bitmap().pixel(0, 0), SHADES[3]);

        // Move the object through the bus; the version bump must defeat
        // the cached parse on the next frame.
        mmu.write_byte(0xFE01, 16).unwrap();
        ppu.run(&mut mmu, frame).unwrap();
        assert_eq!(ppu.bitmap().pixel(0, 0), SHADES[0]);
        assert_eq!(ppu.bitmap().pixel(8, 0), SHADES[3]);
    }

    #[test]
    fn window_overlays_from_its_origin() {
        let mut mmu = video_mmu();
        // Window enabled with its own tile map at 0x9C00.
        mmu.write_byte_silent(regs::LCDC, 0xF3).unwrap();
        set_tile_row(&mut mmu, 0, 0, 1); // background shows color 1
        for row in 0..8 {
            set_tile_row(&mut mmu, 3, row, 2); // window tile
        }
        for cell in 0u16..32 {
            mmu.write_byte_silent(0x9C00 + cell, 3).unwrap();
        }
        mmu.write_byte_silent(regs::WY, 0).unwrap();
        mmu.write_byte_silent(regs::WX, 7 + 80).unwrap(); // starts at column 80

        let mut ppu = Ppu::new();
        ppu.run(&mut mmu, LINE_CYCLES).unwrap();
        assert_eq!(ppu.bitmap().pixel(79, 0), SHADES[1]);
        assert_eq!(ppu.bitmap().pixel(80, 0), SHADES[2]);
        assert_eq!(ppu.bitmap().pixel(159, 0), SHADES[2]);
    }

    #[test]
    fn window_keeps_its_own_line_counter() {
        let mut mmu = video_mmu();
        mmu.write_byte_silent(regs::LCDC, 0xF3).unwrap();
        // Window tile rows 0 and 1 use different colors.
        set_tile_row(&mut mmu, 3, 0, 2);
        set_tile_row(&mut mmu, 3, 1, 3);
        mmu.write_byte_silent(0x9C00, 3).unwrap();
        mmu.write_byte_silent(regs::WY, 0).unwrap();
        mmu.write_byte_silent(regs::WX, 7).unwrap();

        let mut ppu = Ppu::new();
        ppu.run(&mut mmu, LINE_CYCLES * 2).unwrap();
        assert_eq!(ppu.bitmap().pixel(0, 0), SHADES[2]);
        assert_eq!(ppu.bitmap().pixel(0, 1), SHADES[3]);
    }
}
