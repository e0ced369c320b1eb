use std::time::{Duration, Instant};

use crate::cpu::Cpu;
use crate::error::Result;

use super::apu::Apu;
use super::mmu::Mmu;
use super::ppu::Ppu;
use super::timer::Timer;

/// T-cycles in one full frame (154 scanlines).
pub const CYCLES_PER_FRAME: u32 = 70_224;
/// T-cycles in one scanline-equivalent slice.
pub const CYCLES_PER_SLICE: u32 = 456;
/// Target presentation rate.
pub const FRAMES_PER_SECOND: u32 = 60;

/// Fixed-step frame driver.
///
/// A frame is 154 slices of 456 T-cycles. Within a slice every subsystem
/// gets its budget scaled to its clock domain: the CPU and the DMA engine
/// run at a quarter of the T-cycle rate (machine cycles), the PPU at
/// half (its dot-clock model), the APU and timer at a sixteenth. The
/// order inside a slice is fixed — CPU, then DMA, then PPU, then APU and
/// timer — which is what gives the later subsystems read-after-write
/// visibility of the CPU's register writes without any synchronization.
pub struct Clock {
    frame_duration: Duration,
    next_deadline: Option<Instant>,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self {
            frame_duration: Duration::from_secs(1) / FRAMES_PER_SECOND,
            next_deadline: None,
        }
    }

    /// Drive every subsystem through one frame's worth of cycles.
    pub fn step_frame(
        &mut self,
        cpu: &mut Cpu,
        mmu: &mut Mmu,
        ppu: &mut Ppu,
        apu: &mut Apu,
        timer: &mut Timer,
    ) -> Result<()> {
        let mut remaining = CYCLES_PER_FRAME;
        while remaining > 0 {
            let slice = remaining.min(CYCLES_PER_SLICE);
            cpu.run(mmu, slice / 4)?;
            mmu.run(slice / 4)?;
            ppu.run(mmu, slice / 2)?;
            apu.run(mmu, slice / 16)?;
            timer.run(mmu, slice / 16)?;
            remaining -= slice;
        }
        Ok(())
    }

    /// Sleep out the rest of the current frame period.
    ///
    /// The next deadline is computed relative to the previous one rather
    /// than to "now", so scheduling jitter does not accumulate into
    /// drift. An overrun skips the sleep entirely, and a stall longer
    /// than one period snaps the schedule to the present instead of
    /// racing to repay the backlog.
    pub fn pace(&mut self) {
        let now = Instant::now();
        let deadline = self.next_deadline.unwrap_or(now);
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        let mut next = deadline + self.frame_duration;
        if next < now {
            next = now;
        }
        self.next_deadline = Some(next);
    }

    pub fn reset(&mut self) {
        self.next_deadline = None;
    }
}
