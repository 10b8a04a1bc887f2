//! 8BitDo Ultimate (Bluetooth LE) driver.
//!
//! Input report id 0x03, 11 bytes:
//!
//! ```text
//! byte 0      report id (0x03)
//! byte 1      low nibble: 4-bit hat (0 = north, clockwise, 8 = released)
//! bytes 2..5  LX LY RX RY
//! byte 6      LT analog (the device puts LT at the brake offset)
//! byte 7      RT analog (accelerator offset)
//! bytes 8..9  buttons 1..16, little-endian
//! ```
//!
//! Output report id 0x05 drives rumble: strong, weak, LT motor, RT motor,
//! each scaled 0..=100.

use joypad_core::driver::{
    DeviceDriver, DeviceIdentity, DriverCtx, DriverError, FeedbackSource,
};
use joypad_core::{Buttons, InputEvent, Layout, SourceKind, Transport};

/// 8BitDo's Bluetooth vendor id.
pub const VID_8BITDO: u16 = 0x2DC8;

const REPORT_ID_INPUT: u8 = 0x03;
const REPORT_ID_RUMBLE: u8 = 0x05;

/// Button bit -> canonical bit.
/// b0 A, b1 B, b3 X, b4 Y, b6 L1, b7 R1, b8 L2, b9 R2,
/// b10 S1, b11 S2, b12 A1, b13 L3, b14 R3.
const BUTTON_TABLE: [(u16, Buttons); 13] = [
    (1 << 0, Buttons::B1),
    (1 << 1, Buttons::B2),
    (1 << 3, Buttons::B3),
    (1 << 4, Buttons::B4),
    (1 << 6, Buttons::L1),
    (1 << 7, Buttons::R1),
    (1 << 8, Buttons::L2),
    (1 << 9, Buttons::R2),
    (1 << 10, Buttons::S1),
    (1 << 11, Buttons::S2),
    (1 << 12, Buttons::A1),
    (1 << 13, Buttons::L3),
    (1 << 14, Buttons::R3),
];

struct Conn {
    addr: u8,
    instance: u8,
}

/// Driver for the 8BitDo Ultimate family over BLE.
pub struct UltimateDriver<const N: usize = 2> {
    slots: [Option<Conn>; N],
}

impl<const N: usize> UltimateDriver<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [const { None }; N],
        }
    }

    fn slot_of(&self, addr: u8, instance: u8) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|c| c.addr == addr && c.instance == instance))
    }
}

impl<const N: usize> Default for UltimateDriver<N> {
    fn default() -> Self {
        Self::new()
    }
}

fn hat_to_dpad(hat: u8) -> Buttons {
    match hat {
        0 => Buttons::DU,
        1 => Buttons::DU | Buttons::DR,
        2 => Buttons::DR,
        3 => Buttons::DR | Buttons::DD,
        4 => Buttons::DD,
        5 => Buttons::DD | Buttons::DL,
        6 => Buttons::DL,
        7 => Buttons::DL | Buttons::DU,
        _ => Buttons::NONE,
    }
}

impl<const N: usize> DeviceDriver for UltimateDriver<N> {
    fn name(&self) -> &'static str {
        "8bitdo-ultimate"
    }

    fn matches(&self, id: &DeviceIdentity<'_>) -> bool {
        id.is_ble && (id.vid == VID_8BITDO || id.name.contains("8BitDo"))
    }

    fn init(&mut self, addr: u8, instance: u8, _ctx: &mut DriverCtx<'_>) -> Result<(), DriverError> {
        if self.slot_of(addr, instance).is_some() {
            return Ok(());
        }
        let free = self
            .slots
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or(DriverError::NoFreeSlot)?;
        *free = Some(Conn { addr, instance });
        Ok(())
    }

    fn process_report(&mut self, addr: u8, instance: u8, report: &[u8], ctx: &mut DriverCtx<'_>) {
        if self.slot_of(addr, instance).is_none() {
            return;
        }
        if report.len() < 10 || report[0] != REPORT_ID_INPUT {
            return;
        }

        let mut event = InputEvent::new(addr, instance, Transport::BtLe);
        event.kind = SourceKind::Gamepad;
        event.layout = Layout::Nintendo;
        event.button_count = 16;

        event.buttons |= hat_to_dpad(report[1] & 0x0F);
        event.axes.lx = report[2];
        event.axes.ly = report[3];
        event.axes.rx = report[4];
        event.axes.ry = report[5];
        event.axes.l2 = report[6];
        event.axes.r2 = report[7];

        let word = u16::from(report[8]) | (u16::from(report[9]) << 8);
        for (mask, button) in BUTTON_TABLE {
            if word & mask != 0 {
                event.buttons |= button;
            }
        }
        ctx.events.submit(&event);
    }

    fn task(&mut self, feedback: &mut dyn FeedbackSource, ctx: &mut DriverCtx<'_>) {
        for conn in self.slots.iter().flatten() {
            if let Some(fb) = feedback.take_feedback(conn.addr, conn.instance) {
                let report = [
                    REPORT_ID_RUMBLE,
                    scale_rumble(fb.rumble_left),
                    scale_rumble(fb.rumble_right),
                    0, // LT motor
                    0, // RT motor
                ];
                let _ = ctx.tx.send(conn.addr, conn.instance, &report);
            }
        }
    }

    fn disconnect(&mut self, addr: u8, instance: u8, _ctx: &mut DriverCtx<'_>) {
        if let Some(slot) = self.slot_of(addr, instance) {
            self.slots[slot] = None;
        }
    }
}

/// 0..=255 onto the device's 0..=100 motor range.
fn scale_rumble(v: u8) -> u8 {
    (u16::from(v) * 100 / 255) as u8
}
