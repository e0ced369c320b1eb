use crate::error::Result;

use super::mmu::{regs, Interrupt, Mmu};

/// Cycles between divider increments, in timer-step units.
const DIV_PERIOD: u32 = 16;

/// Programmable timer block (DIV/TIMA/TMA/TAC).
///
/// The divider free-runs: it increments every 16 accumulated cycles no
/// matter what TAC says, and any write to it resets it to zero (the MMU
/// latches that event for us). TIMA only counts while TAC bit 2 is set,
/// at the period selected by TAC bits 0-1; on overflow it reloads from
/// TMA and requests the timer interrupt.
#[derive(Default)]
pub struct Timer {
    div_acc: u32,
    tima_acc: u32,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// TIMA period for a TAC clock-select field.
    fn period(tac: u8) -> u32 {
        match tac & 0x03 {
            0x00 => 64,
            0x01 => 1,
            0x02 => 4,
            _ => 16,
        }
    }

    pub fn run(&mut self, mmu: &mut Mmu, cycles: u32) -> Result<()> {
        if mmu.take_divider_reset() {
            // The register itself was already zeroed by the write; drop
            // the partial period so the next increment starts from a
            // clean phase.
            self.div_acc = 0;
        }

        self.div_acc += cycles;
        while self.div_acc >= DIV_PERIOD {
            self.div_acc -= DIV_PERIOD;
            let div = mmu.read_byte(regs::DIV)?.wrapping_add(1);
            mmu.write_byte_silent(regs::DIV, div)?;
        }

        let tac = mmu.read_byte(regs::TAC)?;
        if tac & 0x04 == 0 {
            self.tima_acc = 0;
            return Ok(());
        }

        let period = Self::period(tac);
        self.tima_acc += cycles;
        while self.tima_acc >= period {
            self.tima_acc -= period;
            let (tima, overflowed) = mmu.read_byte(regs::TIMA)?.overflowing_add(1);
            if overflowed {
                let reload = mmu.read_byte(regs::TMA)?;
                mmu.write_byte_silent(regs::TIMA, reload)?;
                mmu.request_interrupt(Interrupt::Timer);
            } else {
                mmu.write_byte_silent(regs::TIMA, tima)?;
            }
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.div_acc = 0;
        self.tima_acc = 0;
    }
}
