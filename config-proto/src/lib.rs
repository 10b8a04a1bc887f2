//! Framed configuration protocol for the serial control plane.
//!
//! This crate provides everything needed to speak the adapter's
//! configuration protocol over a raw serial byte stream:
//!
//! - **Framing**: [`frame::encode`] builds
//!   `SYNC | LEN | TYPE | SEQ | payload | CRC16` frames;
//!   [`FrameParser`] reassembles and verifies them byte-at-a-time.
//! - **Checksums**: CRC-16 CCITT (poly 0x1021, init 0xFFFF) over
//!   TYPE + SEQ + payload.
//! - **Commands**: typed JSON request/response bodies
//!   ([`Request`], [`Status`], [`Info`], ...), allocation-free via
//!   `serde-json-core`.
//!
//! Sequence numbers wrap at 256; each CMD expects a RSP with the same SEQ
//! within the host's timeout. EVT frames are unsolicited. A malformed
//! frame is dropped without a response.
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod command;
pub mod crc;
pub mod frame;
pub mod parser;

// Re-export the main types at crate root
pub use command::{
    cmds, decode_request, encode_input_record, encode_response, BtEntry, BtStatus, CommandError,
    Info, ModeList, PlayerEntry, PlayerList, ProfileDetail, ProfileEntry, ProfileList, Request,
    SettingsInfo, Status, TextValue, Value, INPUT_RECORD_LEN,
};
pub use crc::{calculate_crc16, Crc16Digest};
pub use frame::{encode, encoded_len, FrameError, FrameType, HEADER_LEN, MAX_PAYLOAD, SYNC, TRAILER_LEN};
pub use parser::{Frame, FrameParser};
