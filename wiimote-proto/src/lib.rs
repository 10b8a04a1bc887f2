//! Wiimote-family protocol driver.
//!
//! Covers the original Wiimote (with Nunchuk / Classic Controller
//! extensions and sideways-hold orientation handling) and the Wii U Pro
//! Controller, which reuses the extension register protocol and reports
//! everything through the extension block.
//!
//! The init sequence is a plain state machine driven from `task()` on
//! absolute microsecond deadlines: status request, extension register
//! handshake (0x55 to 0xA400F0, 0x00 to 0xA400FB), identity read at
//! 0xA400FA, report mode, player LED. Every wait step retries on a 1 s
//! timeout and falls forward after five attempts instead of stalling.
//!
//! Legacy pairing uses PIN = host BD_ADDR reversed, surfaced through
//! [`joypad_core::PairingMethod`].
//!
//! # Features
//!
//! - `std`: Enable standard library support (for testing)
//! - `defmt`: Enable defmt formatting for embedded logging

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod driver;
pub mod ext;

pub use driver::WiimoteDriver;
pub use ext::{classify, decode_classic, decode_nunchuk, decode_pro, ExtDecode, ExtensionKind};
