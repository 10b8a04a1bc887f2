//! PC Engine Mini output mode.
//!
//! IN report, 8 bytes: two action buttons plus run/select in byte 0, the
//! hat nibble in byte 1, fixed filler axes. Holding L1 or R1 cycles the
//! turbo rate applied to button I / II through off, 50 ms, 33 ms and
//! 25 ms periods; while turbo is active the reported bit toggles every
//! half period on the microsecond clock.

use joypad_core::{Buttons, Feedback, FeedbackState, HostTx, InputEvent, OutputMode, ProfileOutput};

use super::dpad_to_hat;

const BTN_I: u8 = 0x01;
const BTN_II: u8 = 0x02;
const BTN_SELECT: u8 = 0x04;
const BTN_RUN: u8 = 0x08;

/// Turbo period table, microseconds. Index 0 = turbo off.
const TURBO_PERIODS_US: [u64; 4] = [0, 50_000, 33_000, 25_000];

pub struct PcEngineMode {
    ready: bool,
    feedback: FeedbackState,
    turbo_i: u8,
    turbo_ii: u8,
    l1_was_held: bool,
    r1_was_held: bool,
    now_us: u64,
}

impl PcEngineMode {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ready: false,
            feedback: FeedbackState::new(),
            turbo_i: 0,
            turbo_ii: 0,
            l1_was_held: false,
            r1_was_held: false,
            now_us: 0,
        }
    }

    /// Advance the turbo clock. Called once per scheduler tick.
    pub fn set_clock(&mut self, now_us: u64) {
        self.now_us = now_us;
    }

    /// Current turbo level for (I, II), 0 = off.
    #[must_use]
    pub fn turbo_levels(&self) -> (u8, u8) {
        (self.turbo_i, self.turbo_ii)
    }

    fn turbo_gate(&self, level: u8) -> bool {
        let period = TURBO_PERIODS_US[usize::from(level) % TURBO_PERIODS_US.len()];
        if period == 0 {
            return true;
        }
        (self.now_us / (period / 2)) % 2 == 0
    }
}

impl Default for PcEngineMode {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputMode for PcEngineMode {
    fn name(&self) -> &'static str {
        "pce-mini"
    }

    fn init(&mut self) {
        self.ready = true;
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn send_report(
        &mut self,
        _player: usize,
        _event: &InputEvent,
        out: &ProfileOutput,
        tx: &mut dyn HostTx,
    ) -> bool {
        if !self.ready {
            return false;
        }

        // L1 / R1 press edges cycle the turbo levels.
        let l1 = out.buttons.contains(Buttons::L1);
        if l1 && !self.l1_was_held {
            self.turbo_i = (self.turbo_i + 1) % TURBO_PERIODS_US.len() as u8;
        }
        self.l1_was_held = l1;
        let r1 = out.buttons.contains(Buttons::R1);
        if r1 && !self.r1_was_held {
            self.turbo_ii = (self.turbo_ii + 1) % TURBO_PERIODS_US.len() as u8;
        }
        self.r1_was_held = r1;

        let mut byte0 = 0u8;
        if out.buttons.contains(Buttons::B1) && self.turbo_gate(self.turbo_i) {
            byte0 |= BTN_I;
        }
        if out.buttons.contains(Buttons::B2) && self.turbo_gate(self.turbo_ii) {
            byte0 |= BTN_II;
        }
        if out.buttons.contains(Buttons::S1) {
            byte0 |= BTN_SELECT;
        }
        if out.buttons.contains(Buttons::S2) {
            byte0 |= BTN_RUN;
        }

        let report = [
            byte0,
            dpad_to_hat(out.buttons),
            0x80,
            0x80,
            0x80,
            0x80,
            0x00,
            0x00,
        ];
        tx.send_report(0, &report).is_ok()
    }

    fn handle_output(&mut self, _report_id: u8, _data: &[u8]) {
        // The Mini never talks back.
    }

    fn get_feedback(&mut self, player: usize) -> Option<Feedback> {
        if player != 0 {
            return None;
        }
        self.feedback.take()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use joypad_core::{OutputError, Transport};
    use std::vec::Vec as StdVec;

    struct TxCapture {
        reports: StdVec<StdVec<u8>>,
    }
    impl HostTx for TxCapture {
        fn send_report(&mut self, _port: u8, data: &[u8]) -> Result<(), OutputError> {
            self.reports.push(data.into());
            Ok(())
        }
    }

    fn send(mode: &mut PcEngineMode, tx: &mut TxCapture, buttons: Buttons) -> u8 {
        let event = InputEvent::new(0x01, 0, Transport::Usb);
        let mut out = ProfileOutput::neutral();
        out.buttons = buttons;
        mode.send_report(0, &event, &out, tx);
        tx.reports.last().unwrap()[0]
    }

    #[test]
    fn test_plain_buttons() {
        let mut mode = PcEngineMode::new();
        mode.init();
        let mut tx = TxCapture { reports: StdVec::new() };
        let byte0 = send(&mut mode, &mut tx, Buttons::B1 | Buttons::S2);
        assert_eq!(byte0, BTN_I | BTN_RUN);
    }

    #[test]
    fn test_l1_cycles_turbo_levels() {
        let mut mode = PcEngineMode::new();
        mode.init();
        let mut tx = TxCapture { reports: StdVec::new() };

        assert_eq!(mode.turbo_levels(), (0, 0));
        send(&mut mode, &mut tx, Buttons::L1);
        assert_eq!(mode.turbo_levels(), (1, 0));
        // Held: no further cycling until released and pressed again.
        send(&mut mode, &mut tx, Buttons::L1);
        assert_eq!(mode.turbo_levels(), (1, 0));
        send(&mut mode, &mut tx, Buttons::NONE);
        send(&mut mode, &mut tx, Buttons::L1);
        assert_eq!(mode.turbo_levels(), (2, 0));
        send(&mut mode, &mut tx, Buttons::NONE);
        send(&mut mode, &mut tx, Buttons::L1);
        send(&mut mode, &mut tx, Buttons::NONE);
        send(&mut mode, &mut tx, Buttons::L1);
        // Wraps back to off.
        assert_eq!(mode.turbo_levels(), (0, 0));
    }

    #[test]
    fn test_turbo_toggles_on_clock() {
        let mut mode = PcEngineMode::new();
        mode.init();
        let mut tx = TxCapture { reports: StdVec::new() };

        // Enable 50 ms turbo on button I.
        send(&mut mode, &mut tx, Buttons::L1);
        send(&mut mode, &mut tx, Buttons::NONE);

        mode.set_clock(0);
        assert_eq!(send(&mut mode, &mut tx, Buttons::B1) & BTN_I, BTN_I);
        // Half a period later the bit gates off.
        mode.set_clock(25_000);
        assert_eq!(send(&mut mode, &mut tx, Buttons::B1) & BTN_I, 0);
        // Full period: back on.
        mode.set_clock(50_000);
        assert_eq!(send(&mut mode, &mut tx, Buttons::B1) & BTN_I, BTN_I);
    }
}
