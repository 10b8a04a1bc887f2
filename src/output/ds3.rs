//! DualShock 3 output mode.
//!
//! IN report id 0x01, 49 bytes:
//!
//! ```text
//! byte 2       select L3 R3 start DU DR DD DL      (bit 0 .. bit 7)
//! byte 3       L2 R2 L1 R1 triangle circle cross square
//! byte 4       PS button (bit 0)
//! bytes 6..9   LX LY RX RY
//! bytes 14..25 pressure: DU DR DD DL L2 R2 L1 R1 triangle circle cross square
//! byte 29/30/31 charge / power rating / connection
//! bytes 40..47 SIXAXIS accel X/Y/Z + gyro, big-endian 10-bit, center 512
//! ```
//!
//! OUT report 0x01 carries rumble (small motor on/off at byte 2, large
//! power at byte 4) and the player LED bitmap at byte 8, shifted left
//! by one.

use joypad_core::{Buttons, Feedback, FeedbackState, HostTx, InputEvent, OutputMode, ProfileOutput};

const REPORT_ID: u8 = 0x01;
const REPORT_LEN: usize = 49;

pub struct Ds3Mode {
    ready: bool,
    feedback: FeedbackState,
}

impl Ds3Mode {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ready: false,
            feedback: FeedbackState::new(),
        }
    }
}

impl Default for Ds3Mode {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalized ±32767 (≙ ±4 g) onto the 10-bit SIXAXIS scale.
fn sixaxis(value: i16) -> u16 {
    (512 + i32::from(value) / 64).clamp(0, 1023) as u16
}

impl OutputMode for Ds3Mode {
    fn name(&self) -> &'static str {
        "ds3"
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
        event: &InputEvent,
        out: &ProfileOutput,
        tx: &mut dyn HostTx,
    ) -> bool {
        if !self.ready {
            return false;
        }
        let mut report = [0u8; REPORT_LEN];
        report[0] = REPORT_ID;

        let b = out.buttons;
        let pairs2: [(Buttons, u8); 8] = [
            (Buttons::S1, 0x01),
            (Buttons::L3, 0x02),
            (Buttons::R3, 0x04),
            (Buttons::S2, 0x08),
            (Buttons::DU, 0x10),
            (Buttons::DR, 0x20),
            (Buttons::DD, 0x40),
            (Buttons::DL, 0x80),
        ];
        let pairs3: [(Buttons, u8); 8] = [
            (Buttons::L2, 0x01),
            (Buttons::R2, 0x02),
            (Buttons::L1, 0x04),
            (Buttons::R1, 0x08),
            (Buttons::B4, 0x10),
            (Buttons::B2, 0x20),
            (Buttons::B1, 0x40),
            (Buttons::B3, 0x80),
        ];
        for (canonical, bit) in pairs2 {
            if b.contains(canonical) {
                report[2] |= bit;
            }
        }
        for (canonical, bit) in pairs3 {
            if b.contains(canonical) {
                report[3] |= bit;
            }
        }
        if b.contains(Buttons::A1) {
            report[4] |= 0x01;
        }

        report[6] = out.lx;
        report[7] = out.ly;
        report[8] = out.rx;
        report[9] = out.ry;

        // The profile engine already produces the DS3 pressure order.
        report[14..26].copy_from_slice(&out.pressure);

        report[29] = 0x03; // charge
        report[30] = 0x05; // power rating
        report[31] = 0x03; // connection (USB)

        let (accel, gyro) = match event.motion {
            Some(motion) => (motion.accel, motion.gyro[2]),
            None => ([0i16; 3], 0),
        };
        report[40..42].copy_from_slice(&sixaxis(accel[0]).to_be_bytes());
        report[42..44].copy_from_slice(&sixaxis(accel[1]).to_be_bytes());
        report[44..46].copy_from_slice(&sixaxis(accel[2]).to_be_bytes());
        report[46..48].copy_from_slice(&sixaxis(gyro).to_be_bytes());

        tx.send_report(0, &report).is_ok()
    }

    fn handle_output(&mut self, report_id: u8, data: &[u8]) {
        if report_id != REPORT_ID || data.len() < 9 {
            return;
        }
        // data: [pad, small_dur, small_on, large_dur, large_power, .., leds<<1]
        let right = if data[2] != 0 { 0xFF } else { 0x00 };
        self.feedback.set_rumble(data[4], right);
        self.feedback.set_led_pattern(data[8] >> 1);
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
    use joypad_core::{MotionData, OutputError, Transport};
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
    fn test_49_byte_report_with_pressure() {
        let mut mode = Ds3Mode::new();
        mode.init();
        let mut tx = TxCapture { reports: StdVec::new() };

        let mut out = ProfileOutput::neutral();
        out.buttons = Buttons::B1 | Buttons::DU;
        out.pressure[0] = 0xFF; // DU
        out.pressure[10] = 0xFF; // cross

        let event = InputEvent::new(0x01, 0, Transport::Usb);
        assert!(mode.send_report(0, &event, &out, &mut tx));

        let report = &tx.reports[0];
        assert_eq!(report.len(), REPORT_LEN);
        assert_eq!(report[0], REPORT_ID);
        assert_eq!(report[2], 0x10); // DU
        assert_eq!(report[3], 0x40); // cross
        assert_eq!(report[14], 0xFF); // DU pressure
        assert_eq!(report[24], 0xFF); // cross pressure
    }

    #[test]
    fn test_sixaxis_big_endian_center() {
        let mut mode = Ds3Mode::new();
        mode.init();
        let mut tx = TxCapture { reports: StdVec::new() };

        let mut event = InputEvent::new(0x01, 0, Transport::Usb);
        event.motion = Some(MotionData {
            accel: [0, 32767, -32768],
            gyro: [0, 0, 0],
            accel_range_g: 4,
            gyro_range_dps: 2000,
        });
        assert!(mode.send_report(0, &event, &ProfileOutput::neutral(), &mut tx));

        let report = &tx.reports[0];
        assert_eq!(u16::from_be_bytes([report[40], report[41]]), 512);
        assert_eq!(u16::from_be_bytes([report[42], report[43]]), 1023);
        assert_eq!(u16::from_be_bytes([report[44], report[45]]), 0);
    }

    #[test]
    fn test_out_report_rumble_and_leds() {
        let mut mode = Ds3Mode::new();
        mode.init();
        // Small motor on, large power 0x60, LED 1 (bitmap 0x02).
        mode.handle_output(REPORT_ID, &[0x00, 0xFE, 0x01, 0xFE, 0x60, 0, 0, 0, 0x02]);
        let fb = mode.get_feedback(0).unwrap();
        assert_eq!(fb.rumble_left, 0x60);
        assert_eq!(fb.rumble_right, 0xFF);
        assert_eq!(fb.led_pattern, 0x01);
    }
}
