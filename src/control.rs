//! Serial control plane: frame assembly, command dispatch against live
//! bridge state, response/event emission.

use heapless::Vec;
use serde::Serialize;

use config_proto::{
    cmds, decode_request, encode_input_record, encode_response, frame, BtEntry, BtStatus,
    FrameParser, FrameType, Info, ModeList, PlayerEntry, PlayerList, ProfileDetail, ProfileEntry,
    ProfileList, SettingsInfo, Status, TextValue, Value, INPUT_RECORD_LEN,
};
use joypad_core::bt::{BtOps, Connection};
use joypad_core::settings::OrientationMode;
use joypad_core::{InputEvent, Platform, SettingsStore};

use crate::bridge::{Bridge, BOARD, FW_VERSION};

/// Serial bytes toward the configuration host.
pub trait CdcTx {
    fn write(&mut self, data: &[u8]);
}

const RESPONSE_PAYLOAD: usize = 512;
const RESPONSE_FRAME: usize = RESPONSE_PAYLOAD + frame::HEADER_LEN + frame::TRAILER_LEN;

/// Parser plus stream flags, owned by the bridge.
pub struct ControlState {
    pub(crate) parser: FrameParser,
    input_stream: bool,
    debug_stream: bool,
    tx_seq: u8,
    stream_queue: Vec<[u8; INPUT_RECORD_LEN], 16>,
}

impl ControlState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            parser: FrameParser::new(),
            input_stream: false,
            debug_stream: false,
            tx_seq: 0,
            stream_queue: Vec::new(),
        }
    }

    /// Whether the debug log should be mirrored into EVT frames.
    #[must_use]
    pub fn debug_stream_on(&self) -> bool {
        self.debug_stream
    }

    pub(crate) fn queue_stream_record(&mut self, event: &InputEvent) {
        if !self.input_stream {
            return;
        }
        let record = encode_input_record(
            event.addr,
            event.instance,
            event.buttons.raw(),
            [
                event.axes.lx,
                event.axes.ly,
                event.axes.rx,
                event.axes.ry,
                event.axes.l2,
                event.axes.r2,
            ],
        );
        // A full queue drops the oldest view of the world, not the tick.
        let _ = self.stream_queue.push(record);
    }

    fn next_seq(&mut self) -> u8 {
        let seq = self.tx_seq;
        self.tx_seq = self.tx_seq.wrapping_add(1);
        seq
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

fn send_json<T: Serialize>(cdc: &mut dyn CdcTx, seq: u8, value: &T) {
    let mut payload = [0u8; RESPONSE_PAYLOAD];
    let Ok(len) = encode_response(value, &mut payload) else {
        return;
    };
    let mut framed = [0u8; RESPONSE_FRAME];
    if let Ok(total) = frame::encode(FrameType::Rsp, seq, &payload[..len], &mut framed) {
        cdc.write(&framed[..total]);
    }
}

fn send_nak(cdc: &mut dyn CdcTx, seq: u8) {
    let mut framed = [0u8; 8];
    if let Ok(total) = frame::encode(FrameType::Nak, seq, &[], &mut framed) {
        cdc.write(&framed[..total]);
    }
}

impl<P: Platform, S: SettingsStore> Bridge<P, S> {
    /// Feed serial bytes from the configuration host.
    pub fn control_rx(
        &mut self,
        bytes: &[u8],
        cdc: &mut dyn CdcTx,
        mut bt: Option<&mut dyn BtOps>,
    ) {
        for &byte in bytes {
            // The frame borrows the parser; copy the payload out before
            // dispatching against the rest of the bridge.
            let mut pending: Option<(u8, Vec<u8, RESPONSE_PAYLOAD>)> = None;
            if let Some(frame) = self.control.parser.push(byte) {
                if frame.frame_type == FrameType::Cmd {
                    let mut payload = Vec::new();
                    if payload.extend_from_slice(frame.payload).is_ok() {
                        pending = Some((frame.seq, payload));
                    }
                }
            }
            if let Some((seq, payload)) = pending {
                self.handle_command(
                    seq,
                    &payload,
                    cdc,
                    match &mut bt {
                        Some(b) => Some(&mut **b),
                        None => None,
                    },
                );
            }
        }
    }

    /// Flush queued EVT frames (input stream). Call once per tick.
    pub fn control_task(&mut self, cdc: &mut dyn CdcTx) {
        if self.control.stream_queue.is_empty() {
            return;
        }
        let mut queue: Vec<[u8; INPUT_RECORD_LEN], 16> = Vec::new();
        core::mem::swap(&mut queue, &mut self.control.stream_queue);
        for record in &queue {
            let seq = self.control.next_seq();
            let mut framed = [0u8; INPUT_RECORD_LEN + frame::HEADER_LEN + frame::TRAILER_LEN];
            if let Ok(total) = frame::encode(FrameType::Evt, seq, record, &mut framed) {
                cdc.write(&framed[..total]);
            }
        }
    }

    fn handle_command(
        &mut self,
        seq: u8,
        payload: &[u8],
        cdc: &mut dyn CdcTx,
        bt: Option<&mut dyn BtOps>,
    ) {
        let Ok(request) = decode_request(payload) else {
            send_nak(cdc, seq);
            return;
        };
        let now = self.platform.now_us();

        match request.cmd {
            cmds::PING => send_json(cdc, seq, &Status::OK),
            cmds::INFO => {
                let info = Info {
                    fw: FW_VERSION,
                    board: BOARD,
                    uid: self.platform.unique_id(),
                    mode: self.mode_names.get(self.active_mode).copied().unwrap_or(""),
                    players: self.players.count() as u8,
                    profile: self.engine.active_index() as u8,
                    crc_errors: self.control.parser.crc_errors,
                };
                send_json(cdc, seq, &info);
            }
            cmds::REBOOT => {
                send_json(cdc, seq, &Status::OK);
                self.platform.reboot();
            }
            cmds::BOOTSEL => {
                send_json(cdc, seq, &Status::OK);
                self.platform.reboot_to_bootloader();
            }
            cmds::MODE_GET => {
                let mode = self.mode_names.get(self.active_mode).copied().unwrap_or("");
                send_json(cdc, seq, &TextValue { value: mode });
            }
            cmds::MODE_LIST => {
                let mut modes = Vec::new();
                for &name in self.mode_names {
                    let _ = modes.push(name);
                }
                let list = ModeList {
                    modes,
                    active: self.mode_names.get(self.active_mode).copied().unwrap_or(""),
                };
                send_json(cdc, seq, &list);
            }
            cmds::MODE_SET => {
                match request
                    .mode
                    .or(request.name)
                    .and_then(|name| self.mode_names.iter().position(|&m| m == name))
                {
                    Some(index) => {
                        self.active_mode = index;
                        send_json(cdc, seq, &Status::OK);
                    }
                    None => send_nak(cdc, seq),
                }
            }
            cmds::PROFILE_LIST => {
                let mut list = ProfileList {
                    profiles: Vec::new(),
                    active: self.engine.active_index() as u8,
                };
                for index in 0..self.engine.len() {
                    if let Some(profile) = self.engine.profile(index) {
                        let _ = list.profiles.push(ProfileEntry {
                            index: index as u8,
                            name: profile.name.as_str(),
                            custom: index >= self.builtin_profiles,
                        });
                    }
                }
                send_json(cdc, seq, &list);
            }
            cmds::PROFILE_GET => match self.custom_slot(request.index) {
                Some(slot) => {
                    let custom = self.settings.get().customs[slot];
                    let detail = ProfileDetail {
                        index: (self.builtin_profiles + slot) as u8,
                        name: custom.name_str(),
                        map: custom.map,
                        left_sens: custom.left_sens,
                        right_sens: custom.right_sens,
                        flags: custom.flags,
                    };
                    send_json(cdc, seq, &detail);
                }
                None => send_nak(cdc, seq),
            },
            cmds::PROFILE_SET => {
                let index = usize::from(request.index.unwrap_or(0));
                if index < self.engine.len() {
                    self.apply_active_profile(index, now);
                    send_json(cdc, seq, &Status::OK);
                } else {
                    send_nak(cdc, seq);
                }
            }
            cmds::PROFILE_SAVE => {
                let slot = usize::from(request.index.unwrap_or(0));
                if slot >= joypad_core::MAX_CUSTOM_PROFILES {
                    send_nak(cdc, seq);
                    return;
                }
                let mut copy = *self.settings.get();
                if let Some(name) = request.name {
                    copy.customs[slot].set_name(name);
                }
                if copy.custom_count <= slot as u8 {
                    copy.custom_count = slot as u8 + 1;
                }
                self.settings.save(&copy, now);
                self.rebuild_profiles();
                send_json(cdc, seq, &Status::OK);
            }
            cmds::PROFILE_DELETE => match self.custom_slot(request.index) {
                Some(slot) => {
                    let mut copy = *self.settings.get();
                    let count = usize::from(copy.custom_count);
                    for index in slot..count.saturating_sub(1) {
                        copy.customs[index] = copy.customs[index + 1];
                    }
                    copy.customs[count - 1] = joypad_core::CustomProfile::default();
                    copy.custom_count -= 1;
                    self.settings.save(&copy, now);
                    self.rebuild_profiles();
                    send_json(cdc, seq, &Status::OK);
                }
                None => send_nak(cdc, seq),
            },
            cmds::PROFILE_CLONE => match self.custom_slot(request.index) {
                Some(slot) if self.settings.get().custom_count < joypad_core::MAX_CUSTOM_PROFILES as u8 => {
                    let mut copy = *self.settings.get();
                    let free = usize::from(copy.custom_count);
                    copy.customs[free] = copy.customs[slot];
                    copy.custom_count += 1;
                    self.settings.save(&copy, now);
                    self.rebuild_profiles();
                    send_json(cdc, seq, &Status::OK);
                }
                _ => send_nak(cdc, seq),
            },
            cmds::SETTINGS_GET => {
                let settings = self.settings.get();
                let info = SettingsInfo {
                    sequence: settings.sequence,
                    active_profile: settings.active_profile,
                    custom_count: settings.custom_count,
                    orientation: settings.wiimote_orientation as u8,
                };
                send_json(cdc, seq, &info);
            }
            cmds::SETTINGS_RESET => {
                let _ = self.settings.save_now(&joypad_core::Settings::default());
                self.rebuild_profiles();
                send_json(cdc, seq, &Status::OK);
            }
            cmds::INPUT_STREAM => {
                self.control.input_stream = request.on.unwrap_or(true);
                send_json(cdc, seq, &Status::OK);
            }
            cmds::DEBUG_STREAM => {
                self.control.debug_stream = request.on.unwrap_or(true);
                send_json(cdc, seq, &Status::OK);
            }
            cmds::BT_STATUS => {
                let mut snapshots: [Connection; 8] = core::array::from_fn(|_| Connection::default());
                let count = match bt {
                    Some(ops) => ops.connections(&mut snapshots),
                    None => 0,
                };
                let mut status = BtStatus {
                    connections: Vec::new(),
                };
                for connection in snapshots.iter().take(count) {
                    let _ = status.connections.push(BtEntry {
                        addr: connection.bd_addr,
                        name: connection.name.as_str(),
                        connected: connection.is_connected(),
                        ble: connection.is_ble(),
                    });
                }
                send_json(cdc, seq, &status);
            }
            cmds::BT_BONDS_CLEAR => match bt {
                Some(ops) => {
                    ops.clear_bonds();
                    send_json(cdc, seq, &Status::OK);
                }
                None => send_nak(cdc, seq),
            },
            cmds::WIIMOTE_ORIENT_GET => {
                let value = self.settings.get().wiimote_orientation as i32;
                send_json(cdc, seq, &Value { value });
            }
            cmds::WIIMOTE_ORIENT_SET => match request.value {
                Some(value @ 0..=2) => {
                    let mut copy = *self.settings.get();
                    copy.wiimote_orientation = OrientationMode::from_u8(value as u8);
                    self.settings.save(&copy, now);
                    send_json(cdc, seq, &Status::OK);
                }
                _ => send_nak(cdc, seq),
            },
            cmds::PLAYERS_LIST => {
                let mut list = PlayerList {
                    players: Vec::new(),
                };
                for (slot, player) in self.players.iter() {
                    let _ = list.players.push(PlayerEntry {
                        slot: slot as u8,
                        addr: player.addr,
                        instance: player.instance,
                    });
                }
                send_json(cdc, seq, &list);
            }
            cmds::RUMBLE_TEST => {
                self.rumble_test = true;
                send_json(cdc, seq, &Status::OK);
            }
            cmds::RUMBLE_STOP => {
                self.rumble_test = false;
                for slot in 0..joypad_core::MAX_PLAYERS {
                    if let Some(player) = self.players.get_mut(slot) {
                        player.feedback.set_rumble(0, 0);
                    }
                }
                send_json(cdc, seq, &Status::OK);
            }
            _ => send_nak(cdc, seq),
        }
    }

    /// Map a public profile index onto a custom-profile slot.
    fn custom_slot(&self, index: Option<u8>) -> Option<usize> {
        let index = usize::from(index?);
        let slot = index.checked_sub(self.builtin_profiles)?;
        (slot < usize::from(self.settings.get().custom_count)).then_some(slot)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::bridge::tests::{FakePlatform, MemStore};
    use config_proto::{calculate_crc16, SYNC};
    use std::string::String as StdString;
    use std::vec::Vec as StdVec;

    struct CdcCapture {
        frames: StdVec<StdVec<u8>>,
    }
    impl CdcTx for CdcCapture {
        fn write(&mut self, data: &[u8]) {
            self.frames.push(data.into());
        }
    }

    fn bridge() -> Bridge<FakePlatform, MemStore> {
        Bridge::new(
            FakePlatform {
                now: 0,
                bootsel_requests: 0,
            },
            MemStore::default(),
            &["xinput", "switch"],
        )
    }

    fn cmd_frame(seq: u8, json: &str) -> StdVec<u8> {
        let mut buf = [0u8; 256];
        let n = frame::encode(FrameType::Cmd, seq, json.as_bytes(), &mut buf).unwrap();
        buf[..n].into()
    }

    fn response_payload(frame_bytes: &[u8]) -> StdString {
        // SYNC LEN_LO LEN_HI TYPE SEQ payload CRC CRC
        assert_eq!(frame_bytes[0], SYNC);
        let len = usize::from(frame_bytes[1]) | (usize::from(frame_bytes[2]) << 8);
        let payload = &frame_bytes[5..5 + len];
        let crc = calculate_crc16(&frame_bytes[3..5 + len]);
        assert_eq!(frame_bytes[5 + len], (crc & 0xFF) as u8);
        assert_eq!(frame_bytes[6 + len], (crc >> 8) as u8);
        StdString::from_utf8(payload.into()).unwrap()
    }

    #[test]
    fn test_ping_round_trip() {
        let mut bridge = bridge();
        let mut cdc = CdcCapture { frames: StdVec::new() };
        bridge.control_rx(&cmd_frame(7, r#"{"cmd":"PING"}"#), &mut cdc, None);

        assert_eq!(cdc.frames.len(), 1);
        let response = &cdc.frames[0];
        assert_eq!(response[3], FrameType::Rsp as u8);
        assert_eq!(response[4], 7);
        assert_eq!(response_payload(response), r#"{"ok":true}"#);
    }

    #[test]
    fn test_unknown_command_naks() {
        let mut bridge = bridge();
        let mut cdc = CdcCapture { frames: StdVec::new() };
        bridge.control_rx(&cmd_frame(1, r#"{"cmd":"NOPE"}"#), &mut cdc, None);
        assert_eq!(cdc.frames[0][3], FrameType::Nak as u8);
        assert_eq!(cdc.frames[0][4], 1);
    }

    #[test]
    fn test_corrupt_frame_gets_no_response() {
        let mut bridge = bridge();
        let mut cdc = CdcCapture { frames: StdVec::new() };
        let mut bytes = cmd_frame(2, r#"{"cmd":"PING"}"#);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        bridge.control_rx(&bytes, &mut cdc, None);
        assert!(cdc.frames.is_empty());
        assert_eq!(bridge.control.parser.crc_errors, 1);
    }

    #[test]
    fn test_mode_set_and_info() {
        let mut bridge = bridge();
        let mut cdc = CdcCapture { frames: StdVec::new() };
        bridge.control_rx(
            &cmd_frame(3, r#"{"cmd":"MODE.SET","mode":"switch"}"#),
            &mut cdc,
            None,
        );
        assert_eq!(response_payload(&cdc.frames[0]), r#"{"ok":true}"#);

        bridge.control_rx(&cmd_frame(4, r#"{"cmd":"INFO"}"#), &mut cdc, None);
        let info = response_payload(&cdc.frames[1]);
        assert!(info.contains(r#""mode":"switch""#));
        assert!(info.contains(r#""players":0"#));
    }

    #[test]
    fn test_profile_save_and_list() {
        let mut bridge = bridge();
        let mut cdc = CdcCapture { frames: StdVec::new() };
        bridge.control_rx(
            &cmd_frame(5, r#"{"cmd":"PROFILE.SAVE","index":0,"name":"arcade"}"#),
            &mut cdc,
            None,
        );
        assert_eq!(response_payload(&cdc.frames[0]), r#"{"ok":true}"#);
        assert_eq!(bridge.engine.len(), 2);

        bridge.control_rx(&cmd_frame(6, r#"{"cmd":"PROFILE.LIST"}"#), &mut cdc, None);
        let list = response_payload(&cdc.frames[1]);
        assert!(list.contains(r#""name":"arcade""#));
        assert!(list.contains(r#""custom":true"#));
    }

    #[test]
    fn test_orient_set_persists() {
        let mut bridge = bridge();
        let mut cdc = CdcCapture { frames: StdVec::new() };
        bridge.control_rx(
            &cmd_frame(8, r#"{"cmd":"WIIMOTE.ORIENT.SET","value":1}"#),
            &mut cdc,
            None,
        );
        assert_eq!(
            bridge.settings.get().wiimote_orientation,
            OrientationMode::ForceHorizontal
        );
        assert!(bridge.settings.has_pending_write());

        bridge.control_rx(&cmd_frame(9, r#"{"cmd":"WIIMOTE.ORIENT.GET"}"#), &mut cdc, None);
        assert_eq!(response_payload(&cdc.frames[1]), r#"{"value":1}"#);
    }

    #[test]
    fn test_input_stream_emits_evt_frames() {
        let mut bridge = bridge();
        let mut cdc = CdcCapture { frames: StdVec::new() };
        bridge.control_rx(
            &cmd_frame(10, r#"{"cmd":"INPUT.STREAM","on":true}"#),
            &mut cdc,
            None,
        );
        cdc.frames.clear();

        let mut event = InputEvent::new(0x01, 0, joypad_core::Transport::Usb);
        event.buttons = joypad_core::Buttons::B1;
        bridge.control.queue_stream_record(&event);
        bridge.control_task(&mut cdc);

        assert_eq!(cdc.frames.len(), 1);
        let frame_bytes = &cdc.frames[0];
        assert_eq!(frame_bytes[3], FrameType::Evt as u8);
        // 12-byte binary record.
        assert_eq!(frame_bytes[1], INPUT_RECORD_LEN as u8);
        assert_eq!(frame_bytes[5], 0x01); // addr
    }
}
