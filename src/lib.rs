//! Controller translation core: many input protocols in, many console
//! protocols out.
//!
//! This crate ties the chip-agnostic member crates together: the
//! [`bridge::Bridge`] owns the data-plane components from `joypad-core`
//! and runs the cooperative scheduler tick, [`output`] holds the
//! per-target report builders, and [`control`] dispatches the framed
//! configuration protocol from `config-proto` against live state.
//! Transports, USB class plumbing and the HAL stay behind the traits
//! re-exported from `joypad-core`.
//!
//! # Features
//!
//! - `std`: Enable standard library support (for host testing)
//! - `defmt`: Enable defmt formatting for embedded logging

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod bridge;
pub mod control;
pub mod output;
pub mod profiles;

pub use bridge::{
    Bridge, BOARD, FW_VERSION, HOTKEY_BOOTSEL, HOTKEY_PROFILE_NEXT, HOTKEY_PROFILE_PREV,
};
pub use control::{CdcTx, ControlState};
pub use output::{
    DInputMode, Ds3Mode, GameCubeMode, GpioOutput, GpioPins, PcEngineMode, SwitchMode, XInputMode,
};
pub use profiles::custom_to_profile;
