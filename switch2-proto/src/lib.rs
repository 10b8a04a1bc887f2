//! Switch 2 BLE controller driver.
//!
//! Parses the 63-byte notification reports of the Switch 2 Pro Controller
//! and the GameCube-style pad, auto-calibrating stick centers from the
//! first four reports after connect.
//!
//! # Features
//!
//! - `std`: Enable standard library support (for testing)
//! - `defmt`: Enable defmt formatting for embedded logging

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod driver;

pub use driver::{
    Switch2Driver, Switch2Variant, PID_SWITCH2_GC, PID_SWITCH2_PRO, RANGE_GC_CSTICK,
    RANGE_GC_MAIN, RANGE_PRO, VID_NINTENDO,
};
