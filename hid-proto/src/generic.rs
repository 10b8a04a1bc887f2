//! Generic HID gamepad driver.
//!
//! Last in the registry order: claims every BLE HID device and any
//! Bluetooth Classic peripheral whose class-of-device says joystick or
//! gamepad, plus plain USB HID gamepads. Field locations come from the
//! report descriptor when the transport delivers one; Classic devices
//! without SDP fall back to a fixed 6-byte layout.

use joypad_core::driver::{
    DeviceDriver, DeviceIdentity, DriverCtx, DriverError, FeedbackSource, COD_MAJOR_PERIPHERAL,
    COD_MINOR_GAMEPAD, COD_MINOR_JOYSTICK,
};
use joypad_core::{Buttons, InputEvent, SourceKind, Transport};
use log::debug;

use crate::descriptor::{
    extract_field, parse_descriptor, ReportField, PAGE_BUTTON, PAGE_GENERIC_DESKTOP, USAGE_HAT,
    USAGE_RX, USAGE_RY, USAGE_RZ, USAGE_X, USAGE_Y, USAGE_Z,
};

/// Derived field locations for one device.
#[derive(Debug, Default)]
struct FieldMap {
    x: Option<ReportField>,
    y: Option<ReportField>,
    z: Option<ReportField>,
    rz: Option<ReportField>,
    rx: Option<ReportField>,
    ry: Option<ReportField>,
    hat: Option<ReportField>,
    buttons: [Option<ReportField>; 12],
    button_count: u8,
    has_report_ids: bool,
}

struct Conn {
    addr: u8,
    instance: u8,
    transport: Transport,
    map: Option<FieldMap>,
}

/// DirectInput-convention button table used when the device has ten or
/// more buttons: 1..=12 land on B3 B1 B2 B4 L1 R1 L2 R2 S1 S2 L3 R3.
const DINPUT_ORDER: [Buttons; 12] = [
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
];

/// Small pads map 1:1 into face and shoulders, last two become S1/S2.
const FACE_ORDER: [Buttons; 8] = [
    Buttons::B1,
    Buttons::B2,
    Buttons::B3,
    Buttons::B4,
    Buttons::L1,
    Buttons::R1,
    Buttons::L2,
    Buttons::R2,
];

/// Generic HID gamepad driver with a fixed connection pool.
pub struct GenericHidDriver<const N: usize = 4> {
    slots: [Option<Conn>; N],
}

impl<const N: usize> GenericHidDriver<N> {
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

    /// Install the report descriptor for a bound device. Called by the
    /// transport when descriptor bytes arrive (USB enumeration, BLE GATT
    /// read, Classic SDP).
    pub fn set_descriptor(&mut self, addr: u8, instance: u8, desc: &[u8]) {
        let map = match parse_descriptor(desc) {
            Ok(parsed) => build_field_map(&parsed),
            Err(e) => {
                debug!("descriptor parse failed: {:?}, keeping fallback", e);
                return;
            }
        };
        if let Some(conn) = self.slot_of(addr, instance) {
            conn.map = Some(map);
        }
    }
}

impl<const N: usize> Default for GenericHidDriver<N> {
    fn default() -> Self {
        Self::new()
    }
}

fn build_field_map(parsed: &crate::descriptor::DescriptorMap) -> FieldMap {
    let mut map = FieldMap {
        x: parsed.find(PAGE_GENERIC_DESKTOP, USAGE_X).copied(),
        y: parsed.find(PAGE_GENERIC_DESKTOP, USAGE_Y).copied(),
        z: parsed.find(PAGE_GENERIC_DESKTOP, USAGE_Z).copied(),
        rz: parsed.find(PAGE_GENERIC_DESKTOP, USAGE_RZ).copied(),
        rx: parsed.find(PAGE_GENERIC_DESKTOP, USAGE_RX).copied(),
        ry: parsed.find(PAGE_GENERIC_DESKTOP, USAGE_RY).copied(),
        hat: parsed.find(PAGE_GENERIC_DESKTOP, USAGE_HAT).copied(),
        has_report_ids: parsed.has_report_ids,
        ..FieldMap::default()
    };
    for number in 1..=12u16 {
        map.buttons[usize::from(number - 1)] = parsed.button(number).copied();
    }
    map.button_count = parsed.button_count().min(12) as u8;
    map
}

/// Scale an extracted value with the field's logical range onto 1..=255.
fn scale_axis(raw: u16, field: &ReportField) -> u8 {
    let max = if field.logical_max > 0 {
        field.logical_max as u32
    } else {
        255
    };
    let clamped = u32::from(raw).min(max);
    (clamped * 254 / max + 1) as u8
}

/// Triggers keep their zero rest position: 0..max onto 0..=255.
fn scale_trigger(raw: u16, field: &ReportField) -> u8 {
    let max = if field.logical_max > 0 {
        field.logical_max as u32
    } else {
        255
    };
    (u32::from(raw).min(max) * 255 / max) as u8
}

/// Hat nibble to D-pad bits: 0 = north, clockwise, anything past
/// north-west means released.
fn hat_to_dpad(hat: u16) -> Buttons {
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

fn map_button(index: usize, total: usize) -> Buttons {
    if total >= 10 {
        DINPUT_ORDER.get(index).copied().unwrap_or(Buttons::NONE)
    } else if index + 2 == total {
        Buttons::S1
    } else if index + 1 == total {
        Buttons::S2
    } else {
        FACE_ORDER.get(index).copied().unwrap_or(Buttons::NONE)
    }
}

impl<const N: usize> DeviceDriver for GenericHidDriver<N> {
    fn name(&self) -> &'static str {
        "hid-gamepad"
    }

    fn matches(&self, id: &DeviceIdentity<'_>) -> bool {
        match id.transport {
            Transport::BtLe => true,
            Transport::Usb => true,
            Transport::BtClassic => {
                id.major_class() == COD_MAJOR_PERIPHERAL
                    && matches!(id.minor_subtype(), COD_MINOR_JOYSTICK | COD_MINOR_GAMEPAD)
            }
            Transport::Native => false,
        }
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
        *free = Some(Conn {
            addr,
            instance,
            transport: joypad_core::addr::transport_of(addr).unwrap_or(Transport::Usb),
            map: None,
        });
        Ok(())
    }

    fn process_report(&mut self, addr: u8, instance: u8, report: &[u8], ctx: &mut DriverCtx<'_>) {
        let Some(conn) = self.slot_of(addr, instance) else {
            return;
        };
        let mut event = InputEvent::new(addr, instance, conn.transport);
        event.kind = SourceKind::Gamepad;

        match &conn.map {
            Some(map) => {
                if map.has_report_ids {
                    // All mapped fields share the device's input report id.
                    let expected = map
                        .buttons
                        .iter()
                        .flatten()
                        .next()
                        .or(map.x.as_ref())
                        .map(|f| f.report_id);
                    if expected.is_some_and(|id| report.first() != Some(&id)) {
                        return;
                    }
                }
                if let Some(f) = &map.x {
                    event.axes.lx = scale_axis(extract_field(report, f), f);
                }
                if let Some(f) = &map.y {
                    event.axes.ly = scale_axis(extract_field(report, f), f);
                }
                if let Some(f) = &map.z {
                    event.axes.rx = scale_axis(extract_field(report, f), f);
                }
                if let Some(f) = &map.rz {
                    event.axes.ry = scale_axis(extract_field(report, f), f);
                }
                if let Some(f) = &map.rx {
                    event.axes.l2 = scale_trigger(extract_field(report, f), f);
                }
                if let Some(f) = &map.ry {
                    event.axes.r2 = scale_trigger(extract_field(report, f), f);
                }
                if let Some(f) = &map.hat {
                    event.buttons |= hat_to_dpad(extract_field(report, f));
                }
                let total = usize::from(map.button_count);
                for (index, field) in map.buttons.iter().enumerate() {
                    let Some(field) = field else { continue };
                    if extract_field(report, field) != 0 {
                        event.buttons |= map_button(index, total);
                    }
                }
                event.button_count = map.button_count;
            }
            None => {
                // No descriptor (Classic without SDP): fixed 6-byte layout.
                //   byte 0: B1 B2 B3 B4 L1 R1 L2 R2
                //   byte 1: S1 S2 L3 R3 A1
                //   bytes 2..5: LX LY RX RY
                if report.len() < 6 {
                    return;
                }
                event.buttons = Buttons(
                    u32::from(report[0])
                        | (u32::from(report[1] & 0x03) << 8)
                        | ((u32::from(report[1] & 0x0C) >> 2) << 10)
                        | (u32::from(report[1] & 0x10) << 12),
                );
                event.axes.lx = report[2];
                event.axes.ly = report[3];
                event.axes.rx = report[4];
                event.axes.ry = report[5];
                event.button_count = 13;
            }
        }
        ctx.events.submit(&event);
    }

    fn task(&mut self, _feedback: &mut dyn FeedbackSource, _ctx: &mut DriverCtx<'_>) {
        // Plain HID gamepads have no init machine and no rumble output.
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

    const TEN_BUTTON_DESC: &[u8] = &[
        0x05, 0x01, 0x09, 0x05, 0xA1, 0x01, // gamepad collection
        0x05, 0x09, 0x19, 0x01, 0x29, 0x0A, // buttons 1..10
        0x15, 0x00, 0x25, 0x01, 0x95, 0x0A, 0x75, 0x01, 0x81, 0x02, //
        0x95, 0x06, 0x81, 0x03, // 6 bits padding
        0x05, 0x01, 0x09, 0x30, 0x09, 0x31, // X, Y
        0x26, 0xFF, 0x00, 0x75, 0x08, 0x95, 0x02, 0x81, 0x02, //
        0xC0,
    ];

    fn driver_with_descriptor() -> (GenericHidDriver<2>, Capture, NullTx) {
        let mut driver: GenericHidDriver<2> = GenericHidDriver::new();
        let mut capture = Capture { events: StdVec::new() };
        let mut tx = NullTx;
        {
            let mut ctx = DriverCtx {
                events: &mut capture,
                tx: &mut tx,
                now_us: 0,
            };
            driver.init(0xA2, 0, &mut ctx).unwrap();
        }
        driver.set_descriptor(0xA2, 0, TEN_BUTTON_DESC);
        (driver, capture, tx)
    }

    #[test]
    fn test_matches_ble_and_cod() {
        let driver: GenericHidDriver<2> = GenericHidDriver::new();
        let ble = DeviceIdentity::new("anything", Transport::BtLe);
        assert!(driver.matches(&ble));

        let mut classic = DeviceIdentity::new("pad", Transport::BtClassic);
        classic.cod = [COD_MINOR_GAMEPAD << 2, COD_MAJOR_PERIPHERAL, 0x00];
        assert!(driver.matches(&classic));

        classic.cod = [0x00, 0x04, 0x00]; // audio device
        assert!(!driver.matches(&classic));
    }

    #[test]
    fn test_ten_button_report_uses_dinput_table() {
        let (mut driver, mut capture, mut tx) = driver_with_descriptor();
        let mut ctx = DriverCtx {
            events: &mut capture,
            tx: &mut tx,
            now_us: 0,
        };
        // Button 3 (bit 2) pressed, sticks centered.
        driver.process_report(0xA2, 0, &[0b0000_0100, 0x00, 0x80, 0x80], &mut ctx);
        drop(ctx);
        assert_eq!(capture.events.len(), 1);
        let event = capture.events[0];
        assert_eq!(event.buttons, Buttons::B2);
        assert_eq!(event.axes.lx, 128); // 0x80 of 0..255 -> 1..255
    }

    #[test]
    fn test_fallback_six_byte_layout() {
        let mut driver: GenericHidDriver<2> = GenericHidDriver::new();
        let mut capture = Capture { events: StdVec::new() };
        let mut tx = NullTx;
        let mut ctx = DriverCtx {
            events: &mut capture,
            tx: &mut tx,
            now_us: 0,
        };
        driver.init(0xA3, 0, &mut ctx).unwrap();
        // B1 + S2 held, left stick pushed right.
        driver.process_report(0xA3, 0, &[0x01, 0x02, 0xFF, 0x80, 0x80, 0x80], &mut ctx);
        drop(ctx);
        let event = capture.events[0];
        assert!(event.buttons.contains(Buttons::B1));
        assert!(event.buttons.contains(Buttons::S2));
        assert_eq!(event.axes.lx, 0xFF);
    }

    #[test]
    fn test_pool_exhaustion_refuses_init() {
        let mut driver: GenericHidDriver<1> = GenericHidDriver::new();
        let mut capture = Capture { events: StdVec::new() };
        let mut tx = NullTx;
        let mut ctx = DriverCtx {
            events: &mut capture,
            tx: &mut tx,
            now_us: 0,
        };
        driver.init(0x01, 0, &mut ctx).unwrap();
        assert_eq!(driver.init(0x02, 0, &mut ctx), Err(DriverError::NoFreeSlot));
        // Disconnect frees the block for the next device.
        driver.disconnect(0x01, 0, &mut ctx);
        assert!(driver.init(0x02, 0, &mut ctx).is_ok());
    }
}
