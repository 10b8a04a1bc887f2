//! Conversion between persisted custom profiles and live engine
//! profiles.
//!
//! The persisted form is a fixed 18-entry byte map over the first 18
//! canonical buttons: 0 keeps the button, 255 swallows it, 1..=18 remaps
//! it onto that logical button.

use joypad_core::settings::{custom_flags, CustomProfile, CUSTOM_MAP_LEN};
use joypad_core::{ButtonMapEntry, Buttons, Profile};

/// Expand a persisted custom profile into an engine profile.
#[must_use]
pub fn custom_to_profile(custom: &CustomProfile) -> Profile {
    let mut profile = Profile::passthrough(custom.name_str());
    profile.left_sens = custom.left_sens;
    profile.right_sens = custom.right_sens;
    profile.swap_sticks = custom.flags & custom_flags::SWAP_STICKS != 0;
    profile.invert_ly = custom.flags & custom_flags::INVERT_LY != 0;
    profile.invert_ry = custom.flags & custom_flags::INVERT_RY != 0;

    for (index, &entry) in custom.map.iter().enumerate().take(CUSTOM_MAP_LEN) {
        let input = Buttons(1 << index);
        match entry {
            0 => {}
            255 => {
                let _ = profile.map.push(ButtonMapEntry::disable(input));
            }
            n @ 1..=18 => {
                let output = Buttons(1 << (n - 1));
                let _ = profile.map.push(ButtonMapEntry::remap(input, output));
            }
            _ => {}
        }
    }
    profile
}
