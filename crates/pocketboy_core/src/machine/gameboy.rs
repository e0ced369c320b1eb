use pocketboy_common::Bitmap;

use crate::cpu::Cpu;
use crate::error::{Error, Result};

use super::apu::Apu;
use super::cartridge::Cartridge;
use super::clock::Clock;
use super::mmu::{regs, Mmu};
use super::ppu::Ppu;
use super::timer::Timer;

/// The eight physical inputs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

/// The assembled machine.
///
/// Owns one of each component plus the MMU they all share; the clock
/// interleaves their execution. This is the entry point hosts use: load a
/// ROM, step frames, read the bitmap and the serial debug output.
pub struct GameBoy {
    pub cpu: Cpu,
    ppu: Ppu,
    timer: Timer,
    apu: Apu,
    clock: Clock,
    pub(crate) mmu: Mmu,
    has_boot_rom: bool,
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}

impl GameBoy {
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            ppu: Ppu::new(),
            timer: Timer::new(),
            apu: Apu::new(),
            clock: Clock::new(),
            mmu: Mmu::new(),
            has_boot_rom: false,
        }
    }

    /// Install a boot ROM image. When present, loaded cartridges start
    /// executing at 0x0000 under the overlay instead of the post-boot
    /// shortcut.
    pub fn load_boot_rom(&mut self, image: &[u8]) {
        self.mmu.load_boot_rom(image);
        self.has_boot_rom = true;
    }

    /// Insert a cartridge built from a raw ROM image and reset the
    /// machine around it.
    ///
    /// A ROM declaring an unsupported mapper is reported and replaced by
    /// an inert cartridge rather than failing the whole machine.
    pub fn load_rom(&mut self, rom: &[u8]) {
        self.reset();
        let cartridge = match Cartridge::new(rom) {
            Ok(cartridge) => cartridge,
            Err(Error::UnsupportedCartridge(kind)) => {
                log::warn!("unsupported cartridge type 0x{kind:02X}; inserting inert cartridge");
                Cartridge::inert()
            }
            Err(err) => {
                log::warn!("failed to build cartridge: {err}");
                Cartridge::inert()
            }
        };
        self.mmu.insert_cartridge(cartridge);

        if self.has_boot_rom {
            self.cpu.regs.pc = 0x0000;
        } else {
            // No boot image: jump straight to the state the boot
            // sequence would leave behind, with the overlay unmapped.
            self.cpu.apply_post_boot_state();
            self.mmu.apply_post_boot_io_state();
            if let Err(err) = self.mmu.write_byte(regs::BOOT, 0x01) {
                log::warn!("failed to disable boot overlay: {err}");
            }
        }
    }

    /// Run one frame (70224 T-cycles) of emulation.
    pub fn step_frame(&mut self) -> Result<()> {
        self.clock.step_frame(
            &mut self.cpu,
            &mut self.mmu,
            &mut self.ppu,
            &mut self.apu,
            &mut self.timer,
        )
    }

    /// Run `frames` frames; with `paced` set, sleep each one out to the
    /// 60 fps schedule.
    pub fn run_frames(&mut self, frames: u32, paced: bool) -> Result<()> {
        for _ in 0..frames {
            self.step_frame()?;
            if paced {
                self.clock.pace();
            }
        }
        Ok(())
    }

    /// The current output frame.
    pub fn bitmap(&self) -> &Bitmap {
        self.ppu.bitmap()
    }

    /// Completed frame count.
    pub fn frames(&self) -> u64 {
        self.ppu.frames()
    }

    /// Everything the running program wrote through the serial debug
    /// port so far.
    pub fn serial_output(&self) -> &[u8] {
        self.mmu.serial_output()
    }

    /// Feed a button state change into the joypad matrix.
    pub fn set_button(&mut self, button: Button, pressed: bool) {
        match button {
            Button::Right => self.mmu.set_dpad_bit(0, pressed),
            Button::Left => self.mmu.set_dpad_bit(1, pressed),
            Button::Up => self.mmu.set_dpad_bit(2, pressed),
            Button::Down => self.mmu.set_dpad_bit(3, pressed),
            Button::A => self.mmu.set_button_bit(0, pressed),
            Button::B => self.mmu.set_button_bit(1, pressed),
            Button::Select => self.mmu.set_button_bit(2, pressed),
            Button::Start => self.mmu.set_button_bit(3, pressed),
        }
    }

    /// Zero all volatile state while keeping the inserted cartridge and
    /// boot overlay in place.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.ppu.reset();
        self.timer.reset();
        self.apu.reset();
        self.clock.reset();
        self.mmu.reset();
    }
}
