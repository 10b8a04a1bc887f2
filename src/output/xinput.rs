//! XInput (XUSB) output mode.
//!
//! IN report, 20 bytes:
//!
//! ```text
//! byte 0      message type (0x00)
//! byte 1      length (0x14)
//! bytes 2..3  buttons, little-endian
//! byte 4      left trigger
//! byte 5      right trigger
//! bytes 6..13 LX LY RX RY as signed 16-bit little-endian, Y up
//! bytes 14..19 reserved
//! ```
//!
//! OUT rumble message: type 0x00, length 0x08, motors at bytes 3..4.

use joypad_core::{Buttons, Feedback, FeedbackState, HostTx, InputEvent, OutputMode, ProfileOutput};

use super::{axis_to_i16, axis_to_i16_inverted};

const MSG_LEN: u8 = 0x14;

const BTN_DU: u16 = 1 << 0;
const BTN_DD: u16 = 1 << 1;
const BTN_DL: u16 = 1 << 2;
const BTN_DR: u16 = 1 << 3;
const BTN_START: u16 = 1 << 4;
const BTN_BACK: u16 = 1 << 5;
const BTN_L3: u16 = 1 << 6;
const BTN_R3: u16 = 1 << 7;
const BTN_LB: u16 = 1 << 8;
const BTN_RB: u16 = 1 << 9;
const BTN_GUIDE: u16 = 1 << 10;
const BTN_A: u16 = 1 << 12;
const BTN_B: u16 = 1 << 13;
const BTN_X: u16 = 1 << 14;
const BTN_Y: u16 = 1 << 15;

/// Single-player XInput output.
pub struct XInputMode {
    ready: bool,
    feedback: FeedbackState,
}

impl XInputMode {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ready: false,
            feedback: FeedbackState::new(),
        }
    }

    fn pack_buttons(buttons: Buttons) -> u16 {
        let pairs: [(Buttons, u16); 15] = [
            (Buttons::DU, BTN_DU),
            (Buttons::DD, BTN_DD),
            (Buttons::DL, BTN_DL),
            (Buttons::DR, BTN_DR),
            (Buttons::S2, BTN_START),
            (Buttons::S1, BTN_BACK),
            (Buttons::L3, BTN_L3),
            (Buttons::R3, BTN_R3),
            (Buttons::L1, BTN_LB),
            (Buttons::R1, BTN_RB),
            (Buttons::A1, BTN_GUIDE),
            (Buttons::B1, BTN_A),
            (Buttons::B2, BTN_B),
            (Buttons::B3, BTN_X),
            (Buttons::B4, BTN_Y),
        ];
        let mut word = 0;
        for (canonical, wire) in pairs {
            if buttons.contains(canonical) {
                word |= wire;
            }
        }
        word
    }
}

impl Default for XInputMode {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputMode for XInputMode {
    fn name(&self) -> &'static str {
        "xinput"
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
        let mut report = [0u8; 20];
        report[1] = MSG_LEN;
        report[2..4].copy_from_slice(&Self::pack_buttons(out.buttons).to_le_bytes());
        report[4] = out.l2;
        report[5] = out.r2;
        report[6..8].copy_from_slice(&axis_to_i16(out.lx).to_le_bytes());
        report[8..10].copy_from_slice(&axis_to_i16_inverted(out.ly).to_le_bytes());
        report[10..12].copy_from_slice(&axis_to_i16(out.rx).to_le_bytes());
        report[12..14].copy_from_slice(&axis_to_i16_inverted(out.ry).to_le_bytes());
        tx.send_report(0, &report).is_ok()
    }

    fn handle_output(&mut self, _report_id: u8, data: &[u8]) {
        // Rumble message: 00 08 00 <left> <right> ...
        if data.len() >= 5 && data[0] == 0x00 && data[1] == 0x08 {
            self.feedback.set_rumble(data[3], data[4]);
        }
    }

    fn get_feedback(&mut self, player: usize) -> Option<Feedback> {
        if player != 0 {
            return None;
        }
        self.feedback.take()
    }
}
