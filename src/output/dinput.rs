//! DirectInput (generic USB HID) output mode.
//!
//! IN report, 8 bytes: buttons 1..16 little-endian, hat nibble, four
//! 8-bit axes, one vendor byte. Button order follows the DirectInput
//! convention (1 = west face, 2 = south, 3 = east, 4 = north).

use joypad_core::{Buttons, Feedback, FeedbackState, HostTx, InputEvent, OutputMode, ProfileOutput};

use super::dpad_to_hat;

/// Wire order of buttons 1..=13.
const BUTTON_ORDER: [Buttons; 13] = [
    Buttons::B3,
    Buttons::B1,
    Buttons::B2,
    Buttons::B4,
    Buttons::L1,
    Buttons::R1,
    Buttons::L2,
    Buttons::R2,
    Buttons::S1,
    Buttons::S2,
    Buttons::L3,
    Buttons::R3,
    Buttons::A1,
];

pub struct DInputMode {
    ready: bool,
    feedback: FeedbackState,
}

impl DInputMode {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ready: false,
            feedback: FeedbackState::new(),
        }
    }
}

impl Default for DInputMode {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputMode for DInputMode {
    fn name(&self) -> &'static str {
        "dinput"
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
        let mut word: u16 = 0;
        for (index, &button) in BUTTON_ORDER.iter().enumerate() {
            if out.buttons.contains(button) {
                word |= 1 << index;
            }
        }
        let report = [
            (word & 0xFF) as u8,
            (word >> 8) as u8,
            dpad_to_hat(out.buttons),
            out.lx,
            out.ly,
            out.rx,
            out.ry,
            0x00,
        ];
        tx.send_report(0, &report).is_ok()
    }

    fn handle_output(&mut self, _report_id: u8, _data: &[u8]) {
        // Plain DirectInput pads carry no output reports.
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

    #[test]
    fn test_report_layout() {
        let mut mode = DInputMode::new();
        mode.init();
        let mut tx = TxCapture { reports: StdVec::new() };

        let mut out = ProfileOutput::neutral();
        out.buttons = Buttons::B1 | Buttons::R1 | Buttons::DL;
        out.rx = 0x20;

        let event = InputEvent::new(0x01, 0, Transport::Usb);
        assert!(mode.send_report(0, &event, &out, &mut tx));

        let report = &tx.reports[0];
        assert_eq!(report.len(), 8);
        // B1 is wire button 2 (bit 1), R1 is button 6 (bit 5).
        assert_eq!(report[0], 0b0010_0010);
        assert_eq!(report[1], 0x00);
        assert_eq!(report[2], 6); // hat west
        assert_eq!(report[3], 128);
        assert_eq!(report[5], 0x20);
    }
}
