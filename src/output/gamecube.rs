//! GameCube adapter output mode (WUP-028 compatible).
//!
//! IN report id 0x21, 37 bytes: four 9-byte port blocks of
//!
//! ```text
//! byte 0  port status (0x04 = unconnected, rumble-capable;
//!                      0x14 = controller present, rumble-capable)
//! byte 1  A B X Y DL DR DD DU      (bit 0 .. bit 7)
//! byte 2  start Z R L              (bits 0..3)
//! bytes 3..6  main stick X/Y, C stick X/Y
//! bytes 7..8  L / R analog
//! ```
//!
//! OUT report id 0x11, 6 bytes: payload bit 0 per port switches that
//! port's rumble motor.

use joypad_core::{Buttons, Feedback, FeedbackState, HostTx, InputEvent, OutputMode, ProfileOutput};

const REPORT_ID_IN: u8 = 0x21;
const REPORT_ID_RUMBLE: u8 = 0x11;
const PORTS: usize = 4;
const PORT_BLOCK: usize = 9;

const STATUS_IDLE: u8 = 0x04;
const STATUS_PRESENT: u8 = 0x14;

#[derive(Clone, Copy)]
struct Port {
    status: u8,
    block: [u8; PORT_BLOCK - 1],
}

impl Port {
    const fn idle() -> Self {
        Self {
            status: STATUS_IDLE,
            block: [0, 0, 128, 128, 128, 128, 0, 0],
        }
    }
}

/// Four-port GameCube adapter output.
pub struct GameCubeMode {
    ready: bool,
    ports: [Port; PORTS],
    feedback: [FeedbackState; PORTS],
}

impl GameCubeMode {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ready: false,
            ports: [Port::idle(); PORTS],
            feedback: [FeedbackState::new(); PORTS],
        }
    }

    /// Port status byte as the host currently sees it.
    #[must_use]
    pub fn port_status(&self, port: usize) -> u8 {
        self.ports.get(port).map_or(0, |p| p.status)
    }

    fn build_report(&self) -> [u8; 1 + PORTS * PORT_BLOCK] {
        let mut report = [0u8; 1 + PORTS * PORT_BLOCK];
        report[0] = REPORT_ID_IN;
        for (index, port) in self.ports.iter().enumerate() {
            let base = 1 + index * PORT_BLOCK;
            report[base] = port.status;
            report[base + 1..base + PORT_BLOCK].copy_from_slice(&port.block);
        }
        report
    }
}

impl Default for GameCubeMode {
    fn default() -> Self {
        Self::new()
    }
}

fn pack_block(out: &ProfileOutput) -> [u8; PORT_BLOCK - 1] {
    let b = out.buttons;
    let mut b1 = 0u8;
    let mut b2 = 0u8;
    let pairs1: [(Buttons, u8); 8] = [
        (Buttons::B1, 0x01), // A
        (Buttons::B2, 0x02), // B
        (Buttons::B3, 0x04), // X
        (Buttons::B4, 0x08), // Y
        (Buttons::DL, 0x10),
        (Buttons::DR, 0x20),
        (Buttons::DD, 0x40),
        (Buttons::DU, 0x80),
    ];
    let pairs2: [(Buttons, u8); 4] = [
        (Buttons::S2, 0x01), // start
        (Buttons::R1, 0x02), // Z
        (Buttons::R2, 0x04), // R click
        (Buttons::L2, 0x08), // L click
    ];
    for (canonical, bit) in pairs1 {
        if b.contains(canonical) {
            b1 |= bit;
        }
    }
    for (canonical, bit) in pairs2 {
        if b.contains(canonical) {
            b2 |= bit;
        }
    }
    [
        b1,
        b2,
        out.lx,
        255 - out.ly, // GC main stick Y grows upward
        out.rx,
        255 - out.ry,
        out.l2,
        out.r2,
    ]
}

impl OutputMode for GameCubeMode {
    fn name(&self) -> &'static str {
        "gamecube"
    }

    fn init(&mut self) {
        self.ports = [Port::idle(); PORTS];
        self.ready = true;
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn max_players(&self) -> usize {
        PORTS
    }

    fn send_report(
        &mut self,
        player: usize,
        _event: &InputEvent,
        out: &ProfileOutput,
        tx: &mut dyn HostTx,
    ) -> bool {
        if !self.ready || player >= PORTS {
            return false;
        }
        self.ports[player].status = STATUS_PRESENT;
        self.ports[player].block = pack_block(out);
        let report = self.build_report();
        tx.send_report(0, &report).is_ok()
    }

    fn handle_output(&mut self, report_id: u8, data: &[u8]) {
        if report_id != REPORT_ID_RUMBLE {
            return;
        }
        for (port, &on) in self.feedback.iter_mut().zip(data.iter()).take(PORTS) {
            let level = if on & 0x01 != 0 { 0xFF } else { 0x00 };
            port.set_rumble(level, level);
        }
    }

    fn get_feedback(&mut self, player: usize) -> Option<Feedback> {
        self.feedback.get_mut(player)?.take()
    }
}
