use crate::error::Result;

use super::mmu::{regs, Mmu};

/// Cycles between frame-sequencer steps, in APU-step units.
///
/// The sequencer runs at 512 Hz on hardware (every 8192 T-cycles); the
/// clock hands the APU its budget pre-divided by 16, which lands the
/// period at 512 units.
const SEQUENCER_PERIOD: u32 = 512;

/// Register-driven audio unit.
///
/// Waveform synthesis is out of scope; what is modelled is the register
/// contract the CPU can observe: the NR52 power/status bits, channel
/// activation on trigger writes, and length-counter expiry driven by the
/// frame sequencer. Frontends wanting sound would tap the registers and
/// wave RAM themselves.
#[derive(Default)]
pub struct Apu {
    sequencer_acc: u32,
    sequencer_step: u8,
    /// Remaining length-timer ticks per channel; 0 means free-running.
    lengths: [u16; 4],
}

impl Apu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(&mut self, mmu: &mut Mmu, cycles: u32) -> Result<()> {
        let nr52 = mmu.read_byte(regs::NR52)?;
        if nr52 & 0x80 == 0 {
            // Powered off: status bits drop and triggers are ignored.
            mmu.take_apu_triggers();
            mmu.write_byte_silent(regs::NR52, 0x70)?;
            self.lengths = [0; 4];
            return Ok(());
        }

        let triggers = mmu.take_apu_triggers();
        if triggers != 0 {
            self.activate_channels(mmu, triggers)?;
        }

        self.sequencer_acc += cycles;
        while self.sequencer_acc >= SEQUENCER_PERIOD {
            self.sequencer_acc -= SEQUENCER_PERIOD;
            // Length counters tick on the even sequencer steps.
            if self.sequencer_step % 2 == 0 {
                self.tick_lengths(mmu)?;
            }
            self.sequencer_step = (self.sequencer_step + 1) % 8;
        }
        Ok(())
    }

    /// Mark triggered channels active in NR52 and load their length
    /// timers (64 steps, 256 for the wave channel).
    fn activate_channels(&mut self, mmu: &mut Mmu, triggers: u8) -> Result<()> {
        let mut nr52 = mmu.read_byte(regs::NR52)?;
        for channel in 0..4 {
            if triggers & (1 << channel) != 0 {
                nr52 |= 1 << channel;
                self.lengths[channel] = if channel == 2 { 256 } else { 64 };
            }
        }
        mmu.write_byte_silent(regs::NR52, nr52)
    }

    /// Count down lengths for channels whose length-enable bit is set,
    /// clearing the NR52 status bit on expiry.
    fn tick_lengths(&mut self, mmu: &mut Mmu) -> Result<()> {
        const LENGTH_ENABLE_REGS: [u16; 4] = [regs::NR14, regs::NR24, regs::NR34, regs::NR44];
        let mut nr52 = mmu.read_byte(regs::NR52)?;
        for channel in 0..4 {
            if self.lengths[channel] == 0 {
                continue;
            }
            let enable = mmu.read_byte(LENGTH_ENABLE_REGS[channel])?;
            if enable & 0x40 == 0 {
                continue;
            }
            self.lengths[channel] -= 1;
            if self.lengths[channel] == 0 {
                nr52 &= !(1 << channel);
            }
        }
        mmu.write_byte_silent(regs::NR52, nr52)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
