//! JSON command/response payloads carried in CMD/RSP frames.
//!
//! Requests deserialize zero-copy out of the frame payload; unknown or
//! missing parameters stay `None` and the dispatcher decides what is
//! required per command.

use heapless::Vec;
use serde::{Deserialize, Serialize};

/// Command name strings accepted in `Request::cmd`.
pub mod cmds {
    pub const INFO: &str = "INFO";
    pub const PING: &str = "PING";
    pub const REBOOT: &str = "REBOOT";
    pub const BOOTSEL: &str = "BOOTSEL";
    pub const MODE_GET: &str = "MODE.GET";
    pub const MODE_SET: &str = "MODE.SET";
    pub const MODE_LIST: &str = "MODE.LIST";
    pub const PROFILE_LIST: &str = "PROFILE.LIST";
    pub const PROFILE_GET: &str = "PROFILE.GET";
    pub const PROFILE_SET: &str = "PROFILE.SET";
    pub const PROFILE_SAVE: &str = "PROFILE.SAVE";
    pub const PROFILE_DELETE: &str = "PROFILE.DELETE";
    pub const PROFILE_CLONE: &str = "PROFILE.CLONE";
    pub const SETTINGS_GET: &str = "SETTINGS.GET";
    pub const SETTINGS_RESET: &str = "SETTINGS.RESET";
    pub const INPUT_STREAM: &str = "INPUT.STREAM";
    pub const BT_STATUS: &str = "BT.STATUS";
    pub const BT_BONDS_CLEAR: &str = "BT.BONDS.CLEAR";
    pub const WIIMOTE_ORIENT_GET: &str = "WIIMOTE.ORIENT.GET";
    pub const WIIMOTE_ORIENT_SET: &str = "WIIMOTE.ORIENT.SET";
    pub const PLAYERS_LIST: &str = "PLAYERS.LIST";
    pub const RUMBLE_TEST: &str = "RUMBLE.TEST";
    pub const RUMBLE_STOP: &str = "RUMBLE.STOP";
    pub const DEBUG_STREAM: &str = "DEBUG.STREAM";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Payload is not valid JSON for the expected shape.
    Json,
    BufferTooSmall,
}

/// Generic request envelope: a command plus optional parameters.
#[derive(Debug, Deserialize)]
pub struct Request<'a> {
    pub cmd: &'a str,
    #[serde(default)]
    pub index: Option<u8>,
    #[serde(default, borrow)]
    pub name: Option<&'a str>,
    #[serde(default)]
    pub value: Option<i32>,
    #[serde(default, borrow)]
    pub mode: Option<&'a str>,
    #[serde(default)]
    pub on: Option<bool>,
}

/// Parse a CMD payload.
pub fn decode_request(payload: &[u8]) -> Result<Request<'_>, CommandError> {
    serde_json_core::from_slice(payload)
        .map(|(request, _rest)| request)
        .map_err(|_| CommandError::Json)
}

/// Serialize any response body into `out`, returning the length.
pub fn encode_response<T: Serialize>(value: &T, out: &mut [u8]) -> Result<usize, CommandError> {
    serde_json_core::to_slice(value, out).map_err(|_| CommandError::BufferTooSmall)
}

#[derive(Debug, Serialize)]
pub struct Status {
    pub ok: bool,
}

impl Status {
    pub const OK: Self = Self { ok: true };
}

#[derive(Debug, Serialize)]
pub struct Info<'a> {
    pub fw: &'a str,
    pub board: &'a str,
    pub uid: u64,
    pub mode: &'a str,
    pub players: u8,
    pub profile: u8,
    pub crc_errors: u32,
}

#[derive(Debug, Serialize)]
pub struct TextValue<'a> {
    pub value: &'a str,
}

#[derive(Debug, Serialize)]
pub struct Value {
    pub value: i32,
}

#[derive(Debug, Serialize)]
pub struct ModeList<'a> {
    pub modes: Vec<&'a str, 8>,
    pub active: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ProfileEntry<'a> {
    pub index: u8,
    pub name: &'a str,
    pub custom: bool,
}

#[derive(Debug, Serialize)]
pub struct ProfileList<'a> {
    pub profiles: Vec<ProfileEntry<'a>, 12>,
    pub active: u8,
}

#[derive(Debug, Serialize)]
pub struct ProfileDetail<'a> {
    pub index: u8,
    pub name: &'a str,
    pub map: [u8; 18],
    pub left_sens: u8,
    pub right_sens: u8,
    pub flags: u8,
}

#[derive(Debug, Serialize)]
pub struct PlayerEntry {
    pub slot: u8,
    pub addr: u8,
    pub instance: u8,
}

#[derive(Debug, Serialize)]
pub struct PlayerList {
    pub players: Vec<PlayerEntry, 8>,
}

#[derive(Debug, Serialize)]
pub struct BtEntry<'a> {
    pub addr: [u8; 6],
    pub name: &'a str,
    pub connected: bool,
    pub ble: bool,
}

#[derive(Debug, Serialize)]
pub struct BtStatus<'a> {
    pub connections: Vec<BtEntry<'a>, 8>,
}

#[derive(Debug, Serialize)]
pub struct SettingsInfo {
    pub sequence: u32,
    pub active_profile: u8,
    pub custom_count: u8,
    pub orientation: u8,
}

/// Fixed binary record streamed in EVT frames while `INPUT.STREAM` is on.
pub const INPUT_RECORD_LEN: usize = 12;

/// Pack one input record: address, instance, button word, six axes.
#[must_use]
pub fn encode_input_record(
    addr: u8,
    instance: u8,
    buttons: u32,
    axes: [u8; 6],
) -> [u8; INPUT_RECORD_LEN] {
    let b = buttons.to_le_bytes();
    [
        addr, instance, b[0], b[1], b[2], b[3], axes[0], axes[1], axes[2], axes[3], axes[4],
        axes[5],
    ]
}
