//! HID protocol support: descriptor parsing and the HID-based drivers.
//!
//! Two drivers live here. [`GenericHidDriver`] is the registry's last
//! resort: it derives field locations from the device's report descriptor
//! and degrades to a fixed 6-byte layout when none is available.
//! [`UltimateDriver`] speaks the 8BitDo Ultimate's vendor report layout
//! over BLE, including its rumble output report.
//!
//! # Features
//!
//! - `std`: Enable standard library support (for testing)
//! - `defmt`: Enable defmt formatting for embedded logging

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod descriptor;
pub mod generic;
pub mod ultimate;

pub use descriptor::{
    extract_field, parse_descriptor, DescriptorError, DescriptorMap, ReportField,
};
pub use generic::GenericHidDriver;
pub use ultimate::{UltimateDriver, VID_8BITDO};
