mod render;

use bitflags::bitflags;
use pocketboy_common::Bitmap;

use crate::error::Result;
use crate::{SCREEN_HEIGHT, SCREEN_WIDTH};

use self::render::{LineObjects, ObjectCache};
use super::mmu::{regs, Interrupt, Mmu};

bitflags! {
    /// LCD control register (0xFF40).
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Lcdc: u8 {
        const DISPLAY_ENABLE   = 0x80;
        const WINDOW_TILE_MAP  = 0x40;
        const WINDOW_ENABLE    = 0x20;
        const TILE_DATA_8000   = 0x10;
        const BG_TILE_MAP      = 0x08;
        const OBJECT_SIZE      = 0x04;
        const OBJECT_ENABLE    = 0x02;
        const BG_ENABLE        = 0x01;
    }
}

bitflags! {
    /// Writable interrupt-select bits of the LCD status register; the
    /// low three bits (mode, coincidence) are owned by the PPU.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct StatSelect: u8 {
        const LYC     = 0x40;
        const OAM     = 0x20;
        const VBLANK  = 0x10;
        const HBLANK  = 0x08;
    }
}

/// LCD mode, as exposed in STAT bits 0-1.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mode {
    HBlank = 0,
    VBlank = 1,
    OamScan = 2,
    PixelTransfer = 3,
}

// Mode durations in PPU cycle units (two per T-cycle pair; one scanline
// totals 228, half of the 456 T-cycle line the clock slices by).
const OAM_SCAN_CYCLES: u32 = 40;
const PIXEL_TRANSFER_CYCLES: u32 = 144;
const HBLANK_CYCLES: u32 = 44;
const VBLANK_LINE_CYCLES: u32 = 228;

/// First scanline of the vertical blanking period.
const VBLANK_START_LINE: u8 = 144;
/// Last scanline before the counter wraps to zero.
const LAST_LINE: u8 = 153;

/// Scanline-based pixel processing unit.
///
/// Each visible line runs OAM scan, pixel transfer, and h-blank in turn;
/// lines 144-153 are v-blank. All rendering state is reconstructed from
/// the current register values at each step — the PPU holds no shadow
/// copies of scroll or palette state, only its position in the frame and
/// the version-keyed caches.
pub struct Ppu {
    mode: Mode,
    credit: u32,
    ly: u8,
    /// Internal window line counter; the window resumes where it left
    /// off when it is disabled for some lines mid-frame.
    window_line: u8,
    /// Latched OR of the enabled STAT sources, for edge-triggered STAT
    /// interrupts.
    stat_line: bool,
    frames: u64,
    bitmap: Bitmap,
    objects: ObjectCache,
    line_objects: LineObjects,
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            mode: Mode::OamScan,
            credit: 0,
            ly: 0,
            window_line: 0,
            stat_line: false,
            frames: 0,
            bitmap: Bitmap::new(SCREEN_WIDTH, SCREEN_HEIGHT),
            objects: ObjectCache::new(),
            line_objects: LineObjects::new(),
        }
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    #[inline]
    pub fn line(&self) -> u8 {
        self.ly
    }

    /// Completed frame count; the clock uses this to know when a fresh
    /// bitmap is available.
    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn run(&mut self, mmu: &mut Mmu, cycles: u32) -> Result<()> {
        let lcdc = Lcdc::from_bits_retain(mmu.read_byte(regs::LCDC)?);
        if !lcdc.contains(Lcdc::DISPLAY_ENABLE) {
            // Display off: hold line 0 / mode 0 and drop the budget. The
            // bitmap is blanked to the lightest shade once.
            self.credit = 0;
            if self.ly != 0 || self.mode != Mode::HBlank {
                self.ly = 0;
                self.window_line = 0;
                self.mode = Mode::HBlank;
                self.stat_line = false;
                mmu.write_byte_silent(regs::LY, 0)?;
                self.write_mode_bits(mmu)?;
                self.bitmap.fill(render::SHADES[0]);
            }
            return Ok(());
        }

        // A LYC write since the last step moves the coincidence flag even
        // without a line change.
        self.refresh_coincidence(mmu)?;

        self.credit += cycles;
        loop {
            let needed = match self.mode {
                Mode::OamScan => OAM_SCAN_CYCLES,
                Mode::PixelTransfer => PIXEL_TRANSFER_CYCLES,
                Mode::HBlank => HBLANK_CYCLES,
                Mode::VBlank => VBLANK_LINE_CYCLES,
            };
            if self.credit < needed {
                return Ok(());
            }
            self.credit -= needed;
            self.finish_mode(mmu)?;
        }
    }

    /// Complete the current mode's work and enter the next one.
    fn finish_mode(&mut self, mmu: &mut Mmu) -> Result<()> {
        match self.mode {
            Mode::OamScan => {
                self.select_line_objects(mmu)?;
                self.enter_mode(mmu, Mode::PixelTransfer)?;
            }
            Mode::PixelTransfer => {
                self.render_scanline(mmu)?;
                self.enter_mode(mmu, Mode::HBlank)?;
            }
            Mode::HBlank => {
                self.set_line(mmu, self.ly + 1)?;
                if self.ly == VBLANK_START_LINE {
                    mmu.request_interrupt(Interrupt::VBlank);
                    self.enter_mode(mmu, Mode::VBlank)?;
                } else {
                    self.enter_mode(mmu, Mode::OamScan)?;
                }
            }
            Mode::VBlank => {
                if self.ly == LAST_LINE {
                    self.set_line(mmu, 0)?;
                    self.window_line = 0;
                    self.frames += 1;
                    self.enter_mode(mmu, Mode::OamScan)?;
                } else {
                    self.set_line(mmu, self.ly + 1)?;
                }
            }
        }
        Ok(())
    }

    fn enter_mode(&mut self, mmu: &mut Mmu, mode: Mode) -> Result<()> {
        self.mode = mode;
        self.write_mode_bits(mmu)?;
        self.update_stat_line(mmu)
    }

    fn set_line(&mut self, mmu: &mut Mmu, line: u8) -> Result<()> {
        self.ly = line;
        mmu.write_byte_silent(regs::LY, line)?;
        self.refresh_coincidence(mmu)
    }

    /// Write the mode field into STAT, preserving the writable bits.
    fn write_mode_bits(&mut self, mmu: &mut Mmu) -> Result<()> {
        let stat = mmu.read_byte(regs::STAT)?;
        let stat = 0x80 | (stat & 0x7C) | self.mode as u8;
        mmu.write_byte_silent(regs::STAT, stat)
    }

    /// Recompute the LY==LYC flag and re-evaluate the STAT line.
    fn refresh_coincidence(&mut self, mmu: &mut Mmu) -> Result<()> {
        let lyc = mmu.read_byte(regs::LYC)?;
        let stat = mmu.read_byte(regs::STAT)?;
        let stat = if self.ly == lyc {
            stat | 0x04
        } else {
            stat & !0x04
        };
        mmu.write_byte_silent(regs::STAT, 0x80 | stat)?;
        self.update_stat_line(mmu)
    }

    /// Re-derive the ORed STAT interrupt line from the enabled sources
    /// and raise the LCD-STAT request on a rising edge.
    fn update_stat_line(&mut self, mmu: &mut Mmu) -> Result<()> {
        let stat = mmu.read_byte(regs::STAT)?;
        let select = StatSelect::from_bits_truncate(stat);

        let coincidence = stat & 0x04 != 0;
        let line = (select.contains(StatSelect::LYC) && coincidence)
            || (select.contains(StatSelect::HBLANK) && self.mode == Mode::HBlank)
            || (select.contains(StatSelect::VBLANK) && self.mode == Mode::VBlank)
            || (select.contains(StatSelect::OAM) && self.mode == Mode::OamScan);

        if line && !self.stat_line {
            mmu.request_interrupt(Interrupt::LcdStat);
            log::trace!("STAT interrupt at ly={} mode={:?}", self.ly, self.mode);
        }
        self.stat_line = line;
        Ok(())
    }
}
