//! Switch USB output mode (Hori-style fight pad report).
//!
//! IN report, 8 bytes: buttons u16 little-endian, hat, LX LY RX RY,
//! one vendor byte.

use joypad_core::{Buttons, Feedback, FeedbackState, HostTx, InputEvent, OutputMode, ProfileOutput};

use super::dpad_to_hat;

/// Wire button order: Y B A X L R ZL ZR minus plus L3 R3 home capture.
const BUTTON_ORDER: [Buttons; 14] = [
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
    Buttons::A2,
];

pub struct SwitchMode {
    ready: bool,
    feedback: FeedbackState,
}

impl SwitchMode {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ready: false,
            feedback: FeedbackState::new(),
        }
    }
}

impl Default for SwitchMode {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputMode for SwitchMode {
    fn name(&self) -> &'static str {
        "switch"
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
        // The Hori-style class has no host-to-device traffic.
    }

    fn get_feedback(&mut self, player: usize) -> Option<Feedback> {
        if player != 0 {
            return None;
        }
        self.feedback.take()
    }
}
