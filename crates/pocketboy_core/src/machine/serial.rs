/// Serial port modelled through the SB/SC register pair.
///
/// Only the debug-output side is implemented: starting a transfer with the
/// internal clock (SC = 0x81) latches the SB byte into `output` and clears
/// the start bit, which is the protocol the common CPU test ROMs use to
/// report pass/fail text. There is no link-cable peer.
#[derive(Default)]
pub(crate) struct Serial {
    pub(crate) data: u8,
    pub(crate) control: u8,
    output: Vec<u8>,
}

impl Serial {
    pub(super) fn write_data(&mut self, value: u8) {
        self.data = value;
    }

    pub(super) fn write_control(&mut self, value: u8) {
        self.control = value;
        // Transfer start with the internal clock selected.
        if (self.control & 0x81) == 0x81 {
            self.output.push(self.data);
            log::debug!("serial out: {:?} (0x{:02X})", self.data as char, self.data);
            self.control &= !0x80;
        }
    }

    /// Everything written out so far, in order.
    pub(crate) fn output(&self) -> &[u8] {
        &self.output
    }

    pub(super) fn reset(&mut self) {
        self.data = 0;
        self.control = 0;
        self.output.clear();
    }
}
