//! Wiimote-family driver: init/extension state machine, data report
//! decoding, orientation handling, rumble and player LEDs.

use joypad_core::driver::{
    DeviceDriver, DeviceIdentity, DriverCtx, DriverError, FeedbackSource, PairingMethod,
};
use joypad_core::{
    Buttons, InputEvent, Layout, MotionData, OrientationMode, SourceKind, Transport,
};
use log::debug;

use crate::ext::{
    classify, decode_classic, decode_nunchuk, decode_pro, ExtDecode, ExtensionKind,
};

// Output report ids.
const OUT_RUMBLE: u8 = 0x10;
const OUT_LEDS: u8 = 0x11;
const OUT_REPORT_MODE: u8 = 0x12;
const OUT_STATUS_REQ: u8 = 0x15;
const OUT_WRITE_MEM: u8 = 0x16;
const OUT_READ_MEM: u8 = 0x17;

// Input report ids.
const IN_STATUS: u8 = 0x20;
const IN_READ_RSP: u8 = 0x21;
const IN_ACK: u8 = 0x22;

// Extension registers (control space 0x04).
const REG_EXT_INIT1: u32 = 0xA4_00F0;
const REG_EXT_INIT2: u32 = 0xA4_00FB;
const REG_EXT_TYPE: u32 = 0xA4_00FA;

const EXT_INIT1_VALUE: u8 = 0x55;
const EXT_INIT2_VALUE: u8 = 0x00;

/// Report mode with extension bytes.
const MODE_EXT: u8 = 0x35;
/// Report mode without extension.
const MODE_CORE: u8 = 0x31;

/// Status report flag: extension connected.
const STATUS_EXT_FLAG: u8 = 0x02;

const INIT_DELAY_US: u64 = 100_000;
const STEP_TIMEOUT_US: u64 = 1_000_000;
const MAX_RETRIES: u8 = 5;
const KEEPALIVE_US: u64 = 30_000_000;

/// Orientation hysteresis: enter horizontal at deviation 20, leave
/// below 12.
const HORIZ_ENTER: u8 = 20;
const HORIZ_LEAVE: u8 = 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum InitState {
    WaitInit,
    SendStatusReq,
    WaitStatus,
    SendExtInit1,
    WaitExtInit1Ack,
    SendExtInit2,
    WaitExtInit2Ack,
    ReadExtType,
    WaitExtType,
    SendReportMode,
    WaitReportAck,
    SendLed,
    WaitLedAck,
    Ready,
}

impl InitState {
    /// Where a wait state lands when its retries run out.
    fn forced_next(self) -> Self {
        match self {
            Self::WaitStatus => Self::SendReportMode,
            Self::WaitExtInit1Ack => Self::SendExtInit2,
            Self::WaitExtInit2Ack => Self::ReadExtType,
            Self::WaitExtType => Self::SendReportMode,
            Self::WaitReportAck => Self::SendLed,
            Self::WaitLedAck => Self::Ready,
            other => other,
        }
    }

    /// The send state a wait state retries through.
    fn resend(self) -> Self {
        match self {
            Self::WaitStatus => Self::SendStatusReq,
            Self::WaitExtInit1Ack => Self::SendExtInit1,
            Self::WaitExtInit2Ack => Self::SendExtInit2,
            Self::WaitExtType => Self::ReadExtType,
            Self::WaitReportAck => Self::SendReportMode,
            Self::WaitLedAck => Self::SendLed,
            other => other,
        }
    }
}

struct Conn {
    addr: u8,
    instance: u8,
    slot_index: u8,
    state: InitState,
    deadline_us: u64,
    retries: u8,
    ext_present: bool,
    extension: ExtensionKind,
    horizontal: bool,
    rumble: bool,
    led_pattern: u8,
    led_dirty: bool,
    last_status_us: u64,
}

impl Conn {
    fn new(addr: u8, instance: u8, slot_index: u8, now_us: u64) -> Self {
        Self {
            addr,
            instance,
            slot_index,
            state: InitState::WaitInit,
            deadline_us: now_us + INIT_DELAY_US,
            retries: 0,
            ext_present: false,
            extension: ExtensionKind::None,
            horizontal: false,
            rumble: false,
            // Player LED from the connection slot: bits 4..7.
            led_pattern: 0x10 << (slot_index & 0x03),
            led_dirty: false,
            last_status_us: now_us,
        }
    }
}

/// Driver for the Wiimote family (Wiimote with extensions, Wii U Pro).
pub struct WiimoteDriver<const N: usize = 4> {
    slots: [Option<Conn>; N],
    orientation_mode: OrientationMode,
    orientation_changed: Option<OrientationMode>,
}

impl<const N: usize> WiimoteDriver<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [const { None }; N],
            orientation_mode: OrientationMode::Auto,
            orientation_changed: None,
        }
    }

    /// Persisted orientation mode, applied to every connected Wiimote.
    pub fn set_orientation_mode(&mut self, mode: OrientationMode) {
        self.orientation_mode = mode;
    }

    #[must_use]
    pub fn orientation_mode(&self) -> OrientationMode {
        self.orientation_mode
    }

    /// A live-switch chord changed the mode; the embedding persists it.
    pub fn take_orientation_change(&mut self) -> Option<OrientationMode> {
        self.orientation_changed.take()
    }

    fn slot_of(&mut self, addr: u8, instance: u8) -> Option<&mut Conn> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|c| c.addr == addr && c.instance == instance)
    }
}

impl<const N: usize> Default for WiimoteDriver<N> {
    fn default() -> Self {
        Self::new()
    }
}

fn send(ctx: &mut DriverCtx<'_>, conn: &Conn, data: &[u8]) {
    let _ = ctx.tx.send(conn.addr, conn.instance, data);
}

fn write_register(ctx: &mut DriverCtx<'_>, conn: &Conn, register: u32, value: u8) {
    let mut report = [0u8; 22];
    report[0] = OUT_WRITE_MEM;
    // 0x04 selects the control-register address space; bit 0 carries
    // the rumble state like every output report.
    report[1] = 0x04 | u8::from(conn.rumble);
    report[2] = (register >> 16) as u8;
    report[3] = (register >> 8) as u8;
    report[4] = register as u8;
    report[5] = 1; // size
    report[6] = value;
    send(ctx, conn, &report);
}

fn read_register(ctx: &mut DriverCtx<'_>, conn: &Conn, register: u32, size: u16) {
    let report = [
        OUT_READ_MEM,
        0x04 | u8::from(conn.rumble),
        (register >> 16) as u8,
        (register >> 8) as u8,
        register as u8,
        (size >> 8) as u8,
        size as u8,
    ];
    send(ctx, conn, &report);
}

/// Core button bytes 1..2 of every 0x30-series report.
fn decode_core(b1: u8, b2: u8) -> Buttons {
    let mut out = Buttons::NONE;
    let pairs1: [(u8, Buttons); 5] = [
        (0x01, Buttons::DL),
        (0x02, Buttons::DR),
        (0x04, Buttons::DD),
        (0x08, Buttons::DU),
        (0x10, Buttons::S2), // plus
    ];
    let pairs2: [(u8, Buttons); 6] = [
        (0x01, Buttons::B4), // two
        (0x02, Buttons::B3), // one
        (0x04, Buttons::B2), // B
        (0x08, Buttons::B1), // A
        (0x10, Buttons::S1), // minus
        (0x80, Buttons::A1), // home
    ];
    for (mask, button) in pairs1 {
        if b1 & mask != 0 {
            out |= button;
        }
    }
    for (mask, button) in pairs2 {
        if b2 & mask != 0 {
            out |= button;
        }
    }
    out
}

/// Sideways hold: D-pad rotates a quarter turn counter-clockwise and the
/// 1/2 buttons become the primary face pair.
fn apply_horizontal(buttons: Buttons) -> Buttons {
    let mut out = buttons & !(Buttons::DPAD | Buttons::B1 | Buttons::B2 | Buttons::B3 | Buttons::B4);
    if buttons.contains(Buttons::DU) {
        out |= Buttons::DL;
    }
    if buttons.contains(Buttons::DL) {
        out |= Buttons::DD;
    }
    if buttons.contains(Buttons::DD) {
        out |= Buttons::DR;
    }
    if buttons.contains(Buttons::DR) {
        out |= Buttons::DU;
    }
    if buttons.contains(Buttons::B1) {
        out |= Buttons::B3;
    }
    if buttons.contains(Buttons::B3) {
        out |= Buttons::B1;
    }
    if buttons.contains(Buttons::B2) {
        out |= Buttons::B4;
    }
    if buttons.contains(Buttons::B4) {
        out |= Buttons::B2;
    }
    out
}

impl<const N: usize> WiimoteDriver<N> {
    fn handle_status(conn: &mut Conn, report: &[u8], ctx: &mut DriverCtx<'_>) {
        let ext = report.get(3).is_some_and(|f| f & STATUS_EXT_FLAG != 0);
        match conn.state {
            InitState::WaitStatus => {
                conn.ext_present = ext;
                conn.retries = 0;
                conn.state = if ext {
                    InitState::SendExtInit1
                } else {
                    InitState::SendReportMode
                };
            }
            InitState::Ready => {
                if ext != conn.ext_present {
                    // Hot swap: walk the extension path again.
                    debug!("wiimote {:02x} extension change, re-init", conn.addr);
                    conn.ext_present = ext;
                    conn.extension = ExtensionKind::None;
                    conn.retries = 0;
                    conn.state = if ext {
                        InitState::SendExtInit1
                    } else {
                        InitState::SendReportMode
                    };
                } else {
                    // Status delivery cancels the current report mode.
                    let mode = if ext { MODE_EXT } else { MODE_CORE };
                    send(ctx, conn, &[OUT_REPORT_MODE, u8::from(conn.rumble), mode]);
                }
            }
            _ => {}
        }
    }

    fn handle_ack(conn: &mut Conn, report: &[u8]) {
        let acked = report.get(3).copied().unwrap_or(0);
        let next = match (conn.state, acked) {
            (InitState::WaitExtInit1Ack, OUT_WRITE_MEM) => InitState::SendExtInit2,
            (InitState::WaitExtInit2Ack, OUT_WRITE_MEM) => InitState::ReadExtType,
            (InitState::WaitReportAck, OUT_REPORT_MODE) => InitState::SendLed,
            (InitState::WaitLedAck, OUT_LEDS) => InitState::Ready,
            _ => return,
        };
        conn.retries = 0;
        conn.state = next;
    }

    fn handle_read_response(conn: &mut Conn, report: &[u8]) {
        if conn.state != InitState::WaitExtType || report.len() < 12 {
            return;
        }
        conn.extension = classify(&report[6..12]);
        debug!(
            "wiimote {:02x} extension identified: {:?}",
            conn.addr, conn.extension
        );
        conn.retries = 0;
        conn.state = InitState::SendReportMode;
    }

    fn handle_data(
        conn: &mut Conn,
        orientation_mode: OrientationMode,
        orientation_changed: &mut Option<OrientationMode>,
        report: &[u8],
        ctx: &mut DriverCtx<'_>,
    ) {
        if conn.state == InitState::WaitLedAck {
            // Data before the LED ack: the device is live regardless.
            conn.retries = 0;
            conn.state = InitState::Ready;
        }
        if conn.state != InitState::Ready {
            return;
        }

        let mut event = InputEvent::new(conn.addr, conn.instance, Transport::BtClassic);
        event.kind = SourceKind::Gamepad;
        event.layout = Layout::Nintendo;

        let id = report[0];
        let ext: Option<&[u8]> = match id {
            0x3D => report.get(1..),
            0x35 => report.get(6..),
            0x34 => report.get(3..),
            _ => None,
        };
        let core = if id != 0x3D && report.len() >= 3 {
            decode_core(report[1], report[2])
        } else {
            Buttons::NONE
        };

        let decoded: ExtDecode = match conn.extension {
            ExtensionKind::WiiUPro => ext.map(decode_pro).unwrap_or_default(),
            kind if kind.is_classic_family() => ext.map(decode_classic).unwrap_or_default(),
            ExtensionKind::Nunchuk => ext.map(decode_nunchuk).unwrap_or_default(),
            _ => ExtDecode::default(),
        };

        if conn.extension == ExtensionKind::WiiUPro {
            // The Pro reports everything through the extension block.
            event.buttons = decoded.buttons;
            event.button_count = 17;
        } else {
            event.buttons = core | decoded.buttons;
            event.button_count = if conn.extension == ExtensionKind::None {
                11
            } else {
                15
            };

            // Accelerometer-based orientation, bare Wiimote only.
            if conn.extension == ExtensionKind::None {
                if let Some(&accel_x) = report.get(3).filter(|_| matches!(id, 0x31 | 0x33 | 0x35)) {
                    let deviation = accel_x.abs_diff(128);
                    if orientation_mode == OrientationMode::Auto {
                        if !conn.horizontal && deviation >= HORIZ_ENTER {
                            conn.horizontal = true;
                        } else if conn.horizontal && deviation < HORIZ_LEAVE {
                            conn.horizontal = false;
                        }
                    }
                    event.motion = Some(MotionData {
                        accel: [
                            (i16::from(accel_x) - 128) << 8,
                            (i16::from(report.get(4).copied().unwrap_or(128)) - 128) << 8,
                            (i16::from(report.get(5).copied().unwrap_or(128)) - 128) << 8,
                        ],
                        gyro: [0; 3],
                        accel_range_g: 4,
                        gyro_range_dps: 0,
                    });
                }

                // Live orientation switch: hold plus and a direction.
                if event.buttons.contains(Buttons::S2) {
                    let forced = if event.buttons.contains(Buttons::DU) {
                        Some(OrientationMode::ForceVertical)
                    } else if event.buttons.contains(Buttons::DD) {
                        Some(OrientationMode::ForceHorizontal)
                    } else if event.buttons.contains(Buttons::DL) {
                        Some(OrientationMode::Auto)
                    } else {
                        None
                    };
                    if let Some(mode) = forced {
                        *orientation_changed = Some(mode);
                    }
                }

                let horizontal = match orientation_mode {
                    OrientationMode::Auto => conn.horizontal,
                    OrientationMode::ForceHorizontal => true,
                    OrientationMode::ForceVertical => false,
                };
                if horizontal {
                    event.buttons = apply_horizontal(event.buttons);
                }
            }
        }

        event.axes.lx = decoded.lx;
        event.axes.ly = decoded.ly;
        event.axes.rx = decoded.rx;
        event.axes.ry = decoded.ry;
        event.axes.l2 = decoded.l2;
        event.axes.r2 = decoded.r2;
        event.battery = decoded.battery;

        ctx.events.submit(&event);
    }

    /// Advance until the machine blocks on a wait state or settles in
    /// Ready, so a timer expiry and its re-send land in the same tick.
    fn step_machine(conn: &mut Conn, ctx: &mut DriverCtx<'_>) {
        loop {
            let before = conn.state;
            Self::step_once(conn, ctx);
            if conn.state == before {
                return;
            }
        }
    }

    fn step_once(conn: &mut Conn, ctx: &mut DriverCtx<'_>) {
        let now = ctx.now_us;
        match conn.state {
            InitState::WaitInit => {
                if now >= conn.deadline_us {
                    conn.state = InitState::SendStatusReq;
                }
            }
            InitState::SendStatusReq => {
                send(ctx, conn, &[OUT_STATUS_REQ, u8::from(conn.rumble)]);
                conn.state = InitState::WaitStatus;
                conn.deadline_us = now + STEP_TIMEOUT_US;
            }
            InitState::SendExtInit1 => {
                write_register(ctx, conn, REG_EXT_INIT1, EXT_INIT1_VALUE);
                conn.state = InitState::WaitExtInit1Ack;
                conn.deadline_us = now + STEP_TIMEOUT_US;
            }
            InitState::SendExtInit2 => {
                write_register(ctx, conn, REG_EXT_INIT2, EXT_INIT2_VALUE);
                conn.state = InitState::WaitExtInit2Ack;
                conn.deadline_us = now + STEP_TIMEOUT_US;
            }
            InitState::ReadExtType => {
                read_register(ctx, conn, REG_EXT_TYPE, 6);
                conn.state = InitState::WaitExtType;
                conn.deadline_us = now + STEP_TIMEOUT_US;
            }
            InitState::SendReportMode => {
                let mode = if conn.ext_present { MODE_EXT } else { MODE_CORE };
                send(ctx, conn, &[OUT_REPORT_MODE, u8::from(conn.rumble), mode]);
                conn.state = InitState::WaitReportAck;
                conn.deadline_us = now + STEP_TIMEOUT_US;
            }
            InitState::SendLed => {
                send(ctx, conn, &[OUT_LEDS, conn.led_pattern | u8::from(conn.rumble)]);
                conn.led_dirty = false;
                conn.state = InitState::WaitLedAck;
                conn.deadline_us = now + STEP_TIMEOUT_US;
            }
            InitState::Ready => {
                if conn.led_dirty {
                    send(ctx, conn, &[OUT_LEDS, conn.led_pattern | u8::from(conn.rumble)]);
                    conn.led_dirty = false;
                }
                if now.saturating_sub(conn.last_status_us) >= KEEPALIVE_US {
                    send(ctx, conn, &[OUT_STATUS_REQ, u8::from(conn.rumble)]);
                    conn.last_status_us = now;
                }
            }
            // Wait states: retry on deadline, bounded.
            wait => {
                if now < conn.deadline_us {
                    return;
                }
                conn.retries += 1;
                if conn.retries >= MAX_RETRIES {
                    debug!("wiimote {:02x} init step timed out, skipping", conn.addr);
                    conn.retries = 0;
                    conn.state = wait.forced_next();
                } else {
                    conn.state = wait.resend();
                }
            }
        }
    }
}

impl<const N: usize> DeviceDriver for WiimoteDriver<N> {
    fn name(&self) -> &'static str {
        "wiimote"
    }

    fn matches(&self, id: &DeviceIdentity<'_>) -> bool {
        // Wiimote and Wii U Pro differ only by the "-UC" suffix; both
        // belong to this driver.
        !id.is_ble && id.name.contains("RVL-CNT-01")
    }

    fn init(&mut self, addr: u8, instance: u8, ctx: &mut DriverCtx<'_>) -> Result<(), DriverError> {
        if self.slot_of(addr, instance).is_some() {
            return Ok(());
        }
        let free = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(DriverError::NoFreeSlot)?;
        self.slots[free] = Some(Conn::new(addr, instance, free as u8, ctx.now_us));
        Ok(())
    }

    fn process_report(&mut self, addr: u8, instance: u8, report: &[u8], ctx: &mut DriverCtx<'_>) {
        let orientation_mode = self.orientation_mode;
        let orientation_changed = &mut self.orientation_changed;
        let Some(conn) = self
            .slots
            .iter_mut()
            .flatten()
            .find(|c| c.addr == addr && c.instance == instance)
        else {
            return;
        };
        let Some(&id) = report.first() else { return };
        match id {
            IN_STATUS => {
                conn.last_status_us = ctx.now_us;
                Self::handle_status(conn, report, ctx);
            }
            IN_ACK => Self::handle_ack(conn, report),
            IN_READ_RSP => Self::handle_read_response(conn, report),
            0x30..=0x3F => {
                Self::handle_data(conn, orientation_mode, orientation_changed, report, ctx);
            }
            _ => {}
        }
    }

    fn task(&mut self, feedback: &mut dyn FeedbackSource, ctx: &mut DriverCtx<'_>) {
        for conn in self.slots.iter_mut().flatten() {
            if let Some(fb) = feedback.take_feedback(conn.addr, conn.instance) {
                let rumble = fb.is_rumbling();
                if rumble != conn.rumble {
                    conn.rumble = rumble;
                    send(ctx, conn, &[OUT_RUMBLE, u8::from(rumble)]);
                }
                if fb.led_pattern != 0 && fb.led_pattern != conn.led_pattern {
                    conn.led_pattern = fb.led_pattern;
                    conn.led_dirty = true;
                }
            }
            Self::step_machine(conn, ctx);
        }
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

    fn pairing_method(&self) -> PairingMethod {
        PairingMethod::PinHostAddrReversed
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

    struct TxCapture {
        sent: StdVec<StdVec<u8>>,
    }
    impl DeviceTx for TxCapture {
        fn send(&mut self, _addr: u8, _instance: u8, data: &[u8]) -> Result<(), DriverError> {
            self.sent.push(data.into());
            Ok(())
        }
    }

    struct NoFeedback;
    impl FeedbackSource for NoFeedback {
        fn take_feedback(&mut self, _addr: u8, _instance: u8) -> Option<joypad_core::Feedback> {
            None
        }
    }

    const ADDR: u8 = 0xA0;

    struct Harness {
        driver: WiimoteDriver<2>,
        events: Capture,
        tx: TxCapture,
        now: u64,
    }

    impl Harness {
        fn new() -> Self {
            let mut h = Self {
                driver: WiimoteDriver::new(),
                events: Capture { events: StdVec::new() },
                tx: TxCapture { sent: StdVec::new() },
                now: 0,
            };
            let mut ctx = DriverCtx {
                events: &mut h.events,
                tx: &mut h.tx,
                now_us: 0,
            };
            h.driver.init(ADDR, 0, &mut ctx).unwrap();
            h
        }

        fn task(&mut self) {
            let mut ctx = DriverCtx {
                events: &mut self.events,
                tx: &mut self.tx,
                now_us: self.now,
            };
            self.driver.task(&mut NoFeedback, &mut ctx);
        }

        fn feed(&mut self, report: &[u8]) {
            let mut ctx = DriverCtx {
                events: &mut self.events,
                tx: &mut self.tx,
                now_us: self.now,
            };
            self.driver.process_report(ADDR, 0, report, &mut ctx);
        }

        fn last_sent(&self) -> &[u8] {
            self.tx.sent.last().unwrap()
        }
    }

    /// Walk the full Wii U Pro bring-up: the end-to-end cold start.
    #[test]
    fn test_pro_cold_start_sequence() {
        let mut h = Harness::new();

        // Nothing happens during the settle delay.
        h.task();
        assert!(h.tx.sent.is_empty());

        // After 100 ms the status request goes out.
        h.now = INIT_DELAY_US;
        h.task();
        assert_eq!(h.last_sent()[0], OUT_STATUS_REQ);

        // Status with the extension flag set.
        h.feed(&[IN_STATUS, 0x00, 0x00, STATUS_EXT_FLAG, 0x00, 0x00, 0x80]);
        h.task();
        // 0x55 -> 0xA400F0.
        let write1 = h.last_sent();
        assert_eq!(write1[0], OUT_WRITE_MEM);
        assert_eq!(&write1[2..5], &[0xA4, 0x00, 0xF0]);
        assert_eq!(write1[6], 0x55);

        h.feed(&[IN_ACK, 0x00, 0x00, OUT_WRITE_MEM, 0x00]);
        h.task();
        // 0x00 -> 0xA400FB.
        let write2 = h.last_sent();
        assert_eq!(&write2[2..5], &[0xA4, 0x00, 0xFB]);
        assert_eq!(write2[6], 0x00);

        h.feed(&[IN_ACK, 0x00, 0x00, OUT_WRITE_MEM, 0x00]);
        h.task();
        // Read 6 bytes at 0xA400FA.
        let read = h.last_sent();
        assert_eq!(read[0], OUT_READ_MEM);
        assert_eq!(&read[2..5], &[0xA4, 0x00, 0xFA]);
        assert_eq!(read[6], 6);

        // Read response: signature 00 00 A4 20 01 20 -> Wii U Pro.
        h.feed(&[
            IN_READ_RSP, 0x00, 0x00, 0x50, 0x00, 0xFA, 0x00, 0x00, 0xA4, 0x20, 0x01, 0x20,
        ]);
        h.task();
        assert_eq!(h.last_sent(), &[OUT_REPORT_MODE, 0x00, MODE_EXT]);

        h.feed(&[IN_ACK, 0x00, 0x00, OUT_REPORT_MODE, 0x00]);
        h.task();
        // Player LED for slot 0: 0x10.
        assert_eq!(h.last_sent(), &[OUT_LEDS, 0x10]);

        h.feed(&[IN_ACK, 0x00, 0x00, OUT_LEDS, 0x00]);

        // 0x3D data report, idle sticks, no buttons (active low FF FF FF).
        let mut report = [0u8; 22];
        report[0] = 0x3D;
        report[1] = 0x00;
        report[2] = 0x08; // LX = 0x800
        report[3] = 0x00;
        report[4] = 0x08; // RX
        report[5] = 0x00;
        report[6] = 0x08; // LY
        report[7] = 0x00;
        report[8] = 0x08; // RY
        report[9] = 0xFF;
        report[10] = 0xFF;
        report[11] = 0xFF;
        h.feed(&report);

        assert_eq!(h.events.events.len(), 1);
        let event = h.events.events[0];
        assert!(event.buttons.is_empty());
        assert_eq!(event.axes.lx, 128);
        assert_eq!(event.axes.ly, 128);
        assert_eq!(event.axes.rx, 128);
        assert_eq!(event.axes.ry, 128);
    }

    #[test]
    fn test_status_without_extension_skips_ext_init() {
        let mut h = Harness::new();
        h.now = INIT_DELAY_US;
        h.task();
        h.feed(&[IN_STATUS, 0x00, 0x00, 0x00, 0x00, 0x00, 0x80]);
        h.task();
        assert_eq!(h.last_sent(), &[OUT_REPORT_MODE, 0x00, MODE_CORE]);
    }

    #[test]
    fn test_wait_state_retries_then_forces() {
        let mut h = Harness::new();
        h.now = INIT_DELAY_US;
        h.task(); // status request, WaitStatus
        let baseline = h.tx.sent.len();

        // Five timeouts: four resends, then forced into report mode.
        for round in 1..=MAX_RETRIES {
            h.now += STEP_TIMEOUT_US + 1;
            h.task();
            let sent = h.last_sent()[0];
            if round < MAX_RETRIES {
                assert_eq!(sent, OUT_STATUS_REQ, "round {round}");
            } else {
                assert_eq!(sent, OUT_REPORT_MODE, "round {round}");
            }
        }
        assert!(h.tx.sent.len() > baseline);
    }

    #[test]
    fn test_first_data_report_counts_as_led_ack() {
        let mut h = Harness::new();
        h.now = INIT_DELAY_US;
        h.task();
        h.feed(&[IN_STATUS, 0x00, 0x00, 0x00, 0x00, 0x00, 0x80]);
        h.task();
        h.feed(&[IN_ACK, 0x00, 0x00, OUT_REPORT_MODE, 0x00]);
        h.task(); // LED out, WaitLedAck

        // No ack; a core data report arrives instead: A pressed.
        h.feed(&[0x30, 0x00, 0x08]);
        h.feed(&[0x30, 0x00, 0x08]);
        // Second report decodes now that the state is Ready.
        assert!(!h.events.events.is_empty());
        assert!(h.events.events.last().unwrap().buttons.contains(Buttons::B1));
    }

    fn ready_bare_wiimote() -> Harness {
        let mut h = Harness::new();
        h.now = INIT_DELAY_US;
        h.task();
        h.feed(&[IN_STATUS, 0x00, 0x00, 0x00, 0x00, 0x00, 0x80]);
        h.task();
        h.feed(&[IN_ACK, 0x00, 0x00, OUT_REPORT_MODE, 0x00]);
        h.task();
        h.feed(&[IN_ACK, 0x00, 0x00, OUT_LEDS, 0x00]);
        h
    }

    #[test]
    fn test_orientation_hysteresis() {
        let mut h = ready_bare_wiimote();

        // Deviation 19: still vertical (DU stays DU).
        h.feed(&[0x31, 0x08, 0x00, 128 + 19, 128, 128]);
        assert!(h.events.events.last().unwrap().buttons.contains(Buttons::DU));

        // Deviation 20: enters horizontal, DU rotates to DL.
        h.feed(&[0x31, 0x08, 0x00, 128 + 20, 128, 128]);
        assert!(h.events.events.last().unwrap().buttons.contains(Buttons::DL));

        // Deviation 12: still horizontal.
        h.feed(&[0x31, 0x08, 0x00, 128 + 12, 128, 128]);
        assert!(h.events.events.last().unwrap().buttons.contains(Buttons::DL));

        // Deviation 11: back to vertical.
        h.feed(&[0x31, 0x08, 0x00, 128 + 11, 128, 128]);
        assert!(h.events.events.last().unwrap().buttons.contains(Buttons::DU));
    }

    #[test]
    fn test_live_orientation_switch_chord() {
        let mut h = ready_bare_wiimote();
        // Plus + down forces horizontal.
        h.feed(&[0x30, 0x10 | 0x04, 0x00]);
        assert_eq!(
            h.driver.take_orientation_change(),
            Some(OrientationMode::ForceHorizontal)
        );
        assert_eq!(h.driver.take_orientation_change(), None);
    }

    #[test]
    fn test_keepalive_after_30s() {
        let mut h = ready_bare_wiimote();
        let before = h.tx.sent.len();
        h.now += KEEPALIVE_US;
        h.task();
        assert_eq!(h.tx.sent.len(), before + 1);
        assert_eq!(h.last_sent()[0], OUT_STATUS_REQ);
    }

    #[test]
    fn test_match_rules() {
        let driver: WiimoteDriver<2> = WiimoteDriver::new();
        let wiimote = DeviceIdentity::new("Nintendo RVL-CNT-01", Transport::BtClassic);
        let pro = DeviceIdentity::new("Nintendo RVL-CNT-01-UC", Transport::BtClassic);
        let other = DeviceIdentity::new("Pro Controller", Transport::BtClassic);
        assert!(driver.matches(&wiimote));
        assert!(driver.matches(&pro));
        assert!(!driver.matches(&other));
        assert_eq!(driver.pairing_method(), PairingMethod::PinHostAddrReversed);
    }
}
