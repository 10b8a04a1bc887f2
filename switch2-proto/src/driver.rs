//! Switch 2 BLE driver (Pro Controller 2 and the GameCube-style pad).
//!
//! Notifications carry a 63-byte report, optionally preceded by a 0xA1
//! HID transport header:
//!
//! ```text
//! bytes 4..7    32-bit little-endian button field
//! bytes 10..15  four 12-bit packed axes: LX LY RX RY
//! bytes 60..61  LT / RT analog (GameCube variant only)
//! ```
//!
//! The sticks have no host-visible factory calibration, so the first four
//! reports after connect are averaged into per-axis centers; everything
//! after scales against that center.

use joypad_core::driver::{
    DeviceDriver, DeviceIdentity, DriverCtx, DriverError, FeedbackSource,
};
use joypad_core::{Buttons, InputEvent, Layout, SourceKind, Transport};
use log::debug;

/// Nintendo's Bluetooth vendor id.
pub const VID_NINTENDO: u16 = 0x057E;
/// Switch 2 Pro Controller product id.
pub const PID_SWITCH2_PRO: u16 = 0x2069;
/// Switch 2 GameCube controller product id.
pub const PID_SWITCH2_GC: u16 = 0x2073;

/// Stick deviation covering full scale, per variant.
pub const RANGE_PRO: i32 = 1610;
pub const RANGE_GC_MAIN: i32 = 1225;
pub const RANGE_GC_CSTICK: i32 = 1120;

const REPORT_LEN: usize = 63;
const BLE_HEADER: u8 = 0xA1;
const CALIBRATION_REPORTS: u8 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Switch2Variant {
    Pro,
    GameCube,
}

/// Button field bit -> canonical bit (Pro variant).
/// b0 B, b1 A, b2 Y, b3 X, b4 L, b5 R, b6 ZL, b7 ZR, b8 minus, b9 plus,
/// b10 L3, b11 R3, b12 home, b13 capture, b16..b19 D-pad, b20 chat.
const BUTTON_TABLE: [(u32, Buttons); 19] = [
    (1 << 0, Buttons::B1),
    (1 << 1, Buttons::B2),
    (1 << 2, Buttons::B3),
    (1 << 3, Buttons::B4),
    (1 << 4, Buttons::L1),
    (1 << 5, Buttons::R1),
    (1 << 6, Buttons::L2),
    (1 << 7, Buttons::R2),
    (1 << 8, Buttons::S1),
    (1 << 9, Buttons::S2),
    (1 << 10, Buttons::L3),
    (1 << 11, Buttons::R3),
    (1 << 12, Buttons::A1),
    (1 << 13, Buttons::A2),
    (1 << 16, Buttons::DU),
    (1 << 17, Buttons::DD),
    (1 << 18, Buttons::DL),
    (1 << 19, Buttons::DR),
    (1 << 20, Buttons::A3),
];

struct Conn {
    addr: u8,
    instance: u8,
    variant: Switch2Variant,
    centers: [i32; 4],
    accum: [u32; 4],
    samples: u8,
}

impl Conn {
    fn calibrated(&self) -> bool {
        self.samples >= CALIBRATION_REPORTS
    }
}

/// Switch 2 BLE driver with a fixed connection pool.
pub struct Switch2Driver<const N: usize = 2> {
    slots: [Option<Conn>; N],
}

impl<const N: usize> Switch2Driver<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [const { None }; N],
        }
    }

    fn slot_of(&mut self, addr: u8, instance: u8) -> Option<&mut Conn> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|c| c.addr == addr && c.instance == instance)
    }
}

impl<const N: usize> Default for Switch2Driver<N> {
    fn default() -> Self {
        Self::new()
    }
}

fn unpack_axes(data: &[u8]) -> [u16; 4] {
    [
        u16::from(data[0]) | (u16::from(data[1] & 0x0F) << 8),
        u16::from(data[1] >> 4) | (u16::from(data[2]) << 4),
        u16::from(data[3]) | (u16::from(data[4] & 0x0F) << 8),
        u16::from(data[4] >> 4) | (u16::from(data[5]) << 4),
    ]
}

fn scale(raw: u16, center: i32, range: i32, invert: bool) -> u8 {
    let delta = ((i32::from(raw) - center) * 127 / range).clamp(-127, 127);
    let value = if invert { 128 - delta } else { 128 + delta };
    value as u8
}

impl<const N: usize> DeviceDriver for Switch2Driver<N> {
    fn name(&self) -> &'static str {
        "switch2-ble"
    }

    fn matches(&self, id: &DeviceIdentity<'_>) -> bool {
        id.is_ble
            && id.vid == VID_NINTENDO
            && matches!(id.pid, PID_SWITCH2_PRO | PID_SWITCH2_GC)
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
        // Variant is fixed at bind time via the product id the transport
        // matched on; GameCube pads re-identify through `set_variant`.
        *free = Some(Conn {
            addr,
            instance,
            variant: Switch2Variant::Pro,
            centers: [0; 4],
            accum: [0; 4],
            samples: 0,
        });
        Ok(())
    }

    fn process_report(&mut self, addr: u8, instance: u8, report: &[u8], ctx: &mut DriverCtx<'_>) {
        let Some(conn) = self.slot_of(addr, instance) else {
            return;
        };
        // Optional transport header.
        let report = match report.first() {
            Some(&BLE_HEADER) => &report[1..],
            _ => report,
        };
        if report.len() < 16 {
            return;
        }

        let raw = unpack_axes(&report[10..16]);

        if !conn.calibrated() {
            for (accum, &value) in conn.accum.iter_mut().zip(raw.iter()) {
                *accum += u32::from(value);
            }
            conn.samples += 1;
            if conn.calibrated() {
                for (center, &accum) in conn.centers.iter_mut().zip(conn.accum.iter()) {
                    *center = (accum / u32::from(CALIBRATION_REPORTS)) as i32;
                }
                debug!("switch2 {:02x} centers {:?}", conn.addr, conn.centers);
            }
            return;
        }

        let word = u32::from(report[4])
            | (u32::from(report[5]) << 8)
            | (u32::from(report[6]) << 16)
            | (u32::from(report[7]) << 24);

        let mut event = InputEvent::new(addr, instance, Transport::BtLe);
        event.kind = SourceKind::Gamepad;
        event.layout = Layout::Nintendo;
        event.button_count = 19;

        for (mask, button) in BUTTON_TABLE {
            if word & mask == 0 {
                continue;
            }
            // The GC shell swaps the shoulder pairs.
            let mapped = if conn.variant == Switch2Variant::GameCube {
                if button == Buttons::L1 {
                    Buttons::L2
                } else if button == Buttons::L2 {
                    Buttons::L1
                } else if button == Buttons::R1 {
                    Buttons::R2
                } else if button == Buttons::R2 {
                    Buttons::R1
                } else {
                    button
                }
            } else {
                button
            };
            event.buttons |= mapped;
        }

        let (main_range, c_range) = match conn.variant {
            Switch2Variant::Pro => (RANGE_PRO, RANGE_PRO),
            Switch2Variant::GameCube => (RANGE_GC_MAIN, RANGE_GC_CSTICK),
        };
        event.axes.lx = scale(raw[0], conn.centers[0], main_range, false);
        event.axes.ly = scale(raw[1], conn.centers[1], main_range, true);
        event.axes.rx = scale(raw[2], conn.centers[2], c_range, false);
        event.axes.ry = scale(raw[3], conn.centers[3], c_range, true);

        if conn.variant == Switch2Variant::GameCube && report.len() >= 62 {
            event.axes.l2 = report[60];
            event.axes.r2 = report[61];
        }

        ctx.events.submit(&event);
    }

    fn task(&mut self, _feedback: &mut dyn FeedbackSource, _ctx: &mut DriverCtx<'_>) {
        // Rumble over BLE is not wired up yet; reports are pure input.
    }

    fn disconnect(&mut self, addr: u8, instance: u8, _ctx: &mut DriverCtx<'_>) {
        for slot in self.slots.iter_mut() {
            if slot
                .as_ref()
                .is_some_and(|c| c.addr == addr && c.instance == instance)
            {
                *slot = None;
            }
        }
    }
}

impl<const N: usize> Switch2Driver<N> {
    /// Select the GameCube-shell variant for a bound connection.
    pub fn set_variant(&mut self, addr: u8, instance: u8, variant: Switch2Variant) {
        if let Some(conn) = self.slot_of(addr, instance) {
            conn.variant = variant;
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use joypad_core::driver::{DeviceTx, EventSink};
    use std::vec::Vec as StdVec;

    struct Capture {
        events: StdVec<InputEvent>,
    }
    impl EventSink for Capture {
        fn submit(&mut self, event: &InputEvent) {
            self.events.push(*event);
        }
    }

    struct NullTx;
    impl DeviceTx for NullTx {
        fn send(&mut self, _addr: u8, _instance: u8, _data: &[u8]) -> Result<(), DriverError> {
            Ok(())
        }
    }

    const ADDR: u8 = 0xA8;

    fn report_with(buttons: u32, axes: [u16; 4]) -> [u8; REPORT_LEN] {
        let mut report = [0u8; REPORT_LEN];
        report[4..8].copy_from_slice(&buttons.to_le_bytes());
        report[10] = axes[0] as u8;
        report[11] = ((axes[0] >> 8) as u8 & 0x0F) | ((axes[1] as u8 & 0x0F) << 4);
        report[12] = (axes[1] >> 4) as u8;
        report[13] = axes[2] as u8;
        report[14] = ((axes[2] >> 8) as u8 & 0x0F) | ((axes[3] as u8 & 0x0F) << 4);
        report[15] = (axes[3] >> 4) as u8;
        report
    }

    fn calibrated_driver(capture: &mut Capture, tx: &mut NullTx) -> Switch2Driver<2> {
        let mut driver: Switch2Driver<2> = Switch2Driver::new();
        let mut ctx = DriverCtx {
            events: capture,
            tx,
            now_us: 0,
        };
        driver.init(ADDR, 0, &mut ctx).unwrap();
        for _ in 0..4 {
            driver.process_report(ADDR, 0, &report_with(0, [2000; 4]), &mut ctx);
        }
        driver
    }

    #[test]
    fn test_axes_packing_round_trip() {
        let axes = [0x123, 0xABC, 0x800, 0xFFF];
        let report = report_with(0, axes);
        assert_eq!(unpack_axes(&report[10..16]), axes);
    }

    #[test]
    fn test_calibration_uses_first_four_reports() {
        let mut capture = Capture { events: StdVec::new() };
        let mut tx = NullTx;
        let mut driver = calibrated_driver(&mut capture, &mut tx);
        // Calibration reports emit nothing.
        assert!(capture.events.is_empty());

        let mut ctx = DriverCtx {
            events: &mut capture,
            tx: &mut tx,
            now_us: 0,
        };
        driver.process_report(ADDR, 0, &report_with(0, [2000; 4]), &mut ctx);
        drop(ctx);

        let event = capture.events[0];
        // Raw at the captured center lands on 128 +/- 1.
        assert!(event.axes.lx.abs_diff(128) <= 1);
        assert!(event.axes.ly.abs_diff(128) <= 1);
        assert!(event.axes.rx.abs_diff(128) <= 1);
        assert!(event.axes.ry.abs_diff(128) <= 1);
    }

    #[test]
    fn test_full_deflection_and_invert() {
        let mut capture = Capture { events: StdVec::new() };
        let mut tx = NullTx;
        let mut driver = calibrated_driver(&mut capture, &mut tx);
        let mut ctx = DriverCtx {
            events: &mut capture,
            tx: &mut tx,
            now_us: 0,
        };
        let raw = 2000 + RANGE_PRO as u16;
        driver.process_report(ADDR, 0, &report_with(0, [raw, raw, 2000, 2000]), &mut ctx);
        drop(ctx);

        let event = capture.events[0];
        assert_eq!(event.axes.lx, 255);
        // Y inverts.
        assert_eq!(event.axes.ly, 1);
    }

    #[test]
    fn test_buttons_and_ble_header() {
        let mut capture = Capture { events: StdVec::new() };
        let mut tx = NullTx;
        let mut driver = calibrated_driver(&mut capture, &mut tx);
        let mut ctx = DriverCtx {
            events: &mut capture,
            tx: &mut tx,
            now_us: 0,
        };
        let inner = report_with((1 << 1) | (1 << 16), [2000; 4]);
        let mut framed = [0u8; REPORT_LEN + 1];
        framed[0] = BLE_HEADER;
        framed[1..].copy_from_slice(&inner);
        driver.process_report(ADDR, 0, &framed, &mut ctx);
        drop(ctx);

        let event = capture.events[0];
        assert!(event.buttons.contains(Buttons::B2)); // A
        assert!(event.buttons.contains(Buttons::DU));
    }

    #[test]
    fn test_gc_variant_swaps_shoulders_and_reads_triggers() {
        let mut capture = Capture { events: StdVec::new() };
        let mut tx = NullTx;
        let mut driver = calibrated_driver(&mut capture, &mut tx);
        driver.set_variant(ADDR, 0, Switch2Variant::GameCube);
        let mut ctx = DriverCtx {
            events: &mut capture,
            tx: &mut tx,
            now_us: 0,
        };
        let mut report = report_with(1 << 4, [2000; 4]); // L
        report[60] = 0xC0;
        report[61] = 0x20;
        driver.process_report(ADDR, 0, &report, &mut ctx);
        drop(ctx);

        let event = capture.events[0];
        assert!(event.buttons.contains(Buttons::L2));
        assert!(!event.buttons.contains(Buttons::L1));
        assert_eq!(event.axes.l2, 0xC0);
        assert_eq!(event.axes.r2, 0x20);
    }

    #[test]
    fn test_match_requires_known_pid() {
        let driver: Switch2Driver<2> = Switch2Driver::new();
        let mut id = DeviceIdentity::new("Pro Controller 2", Transport::BtLe);
        id.vid = VID_NINTENDO;
        id.pid = PID_SWITCH2_PRO;
        assert!(driver.matches(&id));
        id.pid = 0x1234;
        assert!(!driver.matches(&id));
    }
}
