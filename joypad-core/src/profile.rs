//! Profile engine: button remap, combos, stick transforms, trigger
//! behaviors and SOCD, applied per submitted event.

use heapless::{String, Vec};

use crate::event::InputEvent;
use crate::player::MAX_PLAYERS;
use crate::socd::{self, SocdMode, SocdState};
use crate::types::{Axes, Buttons, AXIS_CENTER};

pub const MAX_PROFILES: usize = 8;
pub const MAX_MAP_ENTRIES: usize = 32;
pub const MAX_COMBOS: usize = 8;

/// Analog channel a digital button can be redirected into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnalogTarget {
    Lx,
    Ly,
    Rx,
    Ry,
    LeftTrigger,
    RightTrigger,
}

/// Where a mapped input bit goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MapTarget {
    /// Emit these button bit(s) instead.
    Button(Buttons),
    /// Drive an analog channel while held.
    Analog(AnalogTarget),
    /// Swallow the input bit entirely.
    Disabled,
}

/// One button-map entry. Inputs without any entry pass through unchanged;
/// multiple entries on the same input OR their outputs; a `Disabled` entry
/// wins over every remap of the same input.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonMapEntry {
    pub input: Buttons,
    pub target: MapTarget,
    /// Value written to an analog target while the input is held.
    pub pressure: u8,
}

impl ButtonMapEntry {
    #[must_use]
    pub const fn remap(input: Buttons, output: Buttons) -> Self {
        Self {
            input,
            target: MapTarget::Button(output),
            pressure: 0xFF,
        }
    }

    #[must_use]
    pub const fn disable(input: Buttons) -> Self {
        Self {
            input,
            target: MapTarget::Disabled,
            pressure: 0,
        }
    }

    #[must_use]
    pub const fn to_analog(input: Buttons, target: AnalogTarget, pressure: u8) -> Self {
        Self {
            input,
            target: MapTarget::Analog(target),
            pressure,
        }
    }
}

/// Chord detector entry, resolved before the button map.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ComboEntry {
    pub mask: Buttons,
    pub output: Buttons,
    /// Fire only when no buttons outside the mask are held.
    pub exclusive: bool,
    /// Replace the matched keys with the output instead of ORing it in.
    pub replace: bool,
}

/// Trigger channel policy, per side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerMode {
    #[default]
    Passthrough,
    /// Keep the button, force the analog channel to 0.
    DigitalOnly,
    /// Keep the analog channel, suppress the button.
    AnalogOnly,
    /// Emit a constant analog value while the button is held.
    Fixed,
    /// Suppress button and analog.
    Disabled,
    /// Button is active iff the analog channel crosses the threshold.
    Threshold,
}

#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TriggerBehavior {
    pub mode: TriggerMode,
    pub threshold: u8,
    pub fixed: u8,
}

/// A complete remap profile.
#[derive(Clone, Debug, Default)]
pub struct Profile {
    pub name: String<16>,
    pub description: String<32>,
    pub map: Vec<ButtonMapEntry, MAX_MAP_ENTRIES>,
    pub combos: Vec<ComboEntry, MAX_COMBOS>,
    pub left_trigger: TriggerBehavior,
    pub right_trigger: TriggerBehavior,
    /// Stick sensitivity in percent; 100 is unity.
    pub left_sens: u8,
    pub right_sens: u8,
    pub swap_sticks: bool,
    pub invert_ly: bool,
    pub invert_ry: bool,
    pub socd: SocdMode,
}

impl Profile {
    /// Identity profile: every bit and axis passes through.
    #[must_use]
    pub fn passthrough(name: &str) -> Self {
        let mut p = Self {
            left_sens: 100,
            right_sens: 100,
            ..Self::default()
        };
        let _ = p.name.push_str(name);
        p
    }
}

/// Post-profile record pushed to an output mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProfileOutput {
    pub buttons: Buttons,
    pub lx: u8,
    pub ly: u8,
    pub rx: u8,
    pub ry: u8,
    pub l2: u8,
    pub r2: u8,
    /// DS3-style pressure vector:
    /// DU, DR, DD, DL, L2, R2, L1, R1, B4, B2, B1, B3.
    pub pressure: [u8; 12],
}

impl ProfileOutput {
    #[must_use]
    pub const fn neutral() -> Self {
        Self {
            buttons: Buttons::NONE,
            lx: AXIS_CENTER,
            ly: AXIS_CENTER,
            rx: AXIS_CENTER,
            ry: AXIS_CENTER,
            l2: 0,
            r2: 0,
            pressure: [0; 12],
        }
    }
}

impl Default for ProfileOutput {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Applies profiles to input events. Pure per event apart from the SOCD
/// order memory kept per player.
pub struct ProfileEngine {
    profiles: Vec<Profile, MAX_PROFILES>,
    active: usize,
    socd: [SocdState; MAX_PLAYERS],
}

impl ProfileEngine {
    /// Engine preloaded with the identity profile at index 0.
    #[must_use]
    pub fn new() -> Self {
        let mut profiles = Vec::new();
        let _ = profiles.push(Profile::passthrough("Default"));
        Self {
            profiles,
            active: 0,
            socd: [SocdState::default(); MAX_PLAYERS],
        }
    }

    pub fn add_profile(&mut self, profile: Profile) -> Result<usize, Profile> {
        self.profiles.push(profile)?;
        Ok(self.profiles.len() - 1)
    }

    #[must_use]
    pub fn profile(&self, index: usize) -> Option<&Profile> {
        self.profiles.get(index)
    }

    pub fn profile_mut(&mut self, index: usize) -> Option<&mut Profile> {
        self.profiles.get_mut(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    #[must_use]
    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn set_active(&mut self, index: usize) -> bool {
        if index < self.profiles.len() {
            self.active = index;
            true
        } else {
            false
        }
    }

    /// Apply the profile at `index` (falling back to the active profile)
    /// for the given player.
    pub fn apply_with(&mut self, index: usize, player: usize, event: &InputEvent) -> ProfileOutput {
        let index = if index < self.profiles.len() {
            index
        } else {
            self.active
        };
        // Split borrows: the profile is read-only, the SOCD cell mutates.
        let profile = &self.profiles[index];
        let socd_state = &mut self.socd[player % MAX_PLAYERS];
        transform(profile, event, socd_state)
    }

    /// Apply the active profile.
    pub fn apply(&mut self, player: usize, event: &InputEvent) -> ProfileOutput {
        self.apply_with(self.active, player, event)
    }
}

impl Default for ProfileEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn transform(profile: &Profile, event: &InputEvent, socd_state: &mut SocdState) -> ProfileOutput {
    // 1. Combos, on the raw word.
    let mut word = event.buttons;
    for combo in &profile.combos {
        let fires = if combo.exclusive {
            word == combo.mask
        } else {
            word.contains(combo.mask)
        };
        if !fires {
            continue;
        }
        if combo.replace {
            word = (word & !combo.mask) | combo.output;
        } else {
            word |= combo.output;
        }
    }

    // 2. Button map.
    let mut axes = event.axes;
    let mut buttons = Buttons::NONE;
    for index in 0..crate::types::BUTTON_COUNT {
        let bit = Buttons(1 << index);
        if !word.contains(bit) {
            continue;
        }
        let mut mapped = false;
        let mut disabled = false;
        let mut acc = Buttons::NONE;
        for entry in &profile.map {
            if !entry.input.contains(bit) {
                continue;
            }
            mapped = true;
            match entry.target {
                MapTarget::Disabled => disabled = true,
                MapTarget::Button(out) => acc |= out,
                MapTarget::Analog(target) => write_axis(&mut axes, target, entry.pressure),
            }
        }
        if disabled {
            continue;
        }
        buttons |= if mapped { acc } else { bit };
    }

    // 3. Stick transforms.
    if profile.swap_sticks {
        core::mem::swap(&mut axes.lx, &mut axes.rx);
        core::mem::swap(&mut axes.ly, &mut axes.ry);
    }
    if profile.invert_ly {
        axes.ly = invert_axis(axes.ly);
    }
    if profile.invert_ry {
        axes.ry = invert_axis(axes.ry);
    }
    axes.lx = scale_sens(axes.lx, profile.left_sens);
    axes.ly = scale_sens(axes.ly, profile.left_sens);
    axes.rx = scale_sens(axes.rx, profile.right_sens);
    axes.ry = scale_sens(axes.ry, profile.right_sens);

    // 4. Trigger behaviors.
    apply_trigger(&profile.left_trigger, &mut buttons, Buttons::L2, &mut axes.l2);
    apply_trigger(&profile.right_trigger, &mut buttons, Buttons::R2, &mut axes.r2);

    // 5. SOCD on the post-map D-pad.
    let buttons = socd::resolve(profile.socd, buttons, socd_state);

    let mut out = ProfileOutput {
        buttons,
        lx: axes.lx,
        ly: axes.ly,
        rx: axes.rx,
        ry: axes.ry,
        l2: axes.l2,
        r2: axes.r2,
        pressure: [0; 12],
    };
    fill_pressure(&mut out);
    out
}

fn write_axis(axes: &mut Axes, target: AnalogTarget, value: u8) {
    match target {
        AnalogTarget::Lx => axes.lx = value,
        AnalogTarget::Ly => axes.ly = value,
        AnalogTarget::Rx => axes.rx = value,
        AnalogTarget::Ry => axes.ry = value,
        AnalogTarget::LeftTrigger => axes.l2 = value,
        AnalogTarget::RightTrigger => axes.r2 = value,
    }
}

#[inline]
fn invert_axis(v: u8) -> u8 {
    255 - v
}

/// Scale a stick channel around center by `pct` percent, clamped to 1..=255.
fn scale_sens(v: u8, pct: u8) -> u8 {
    if pct == 100 {
        return v;
    }
    let centered = i32::from(v) - i32::from(AXIS_CENTER);
    let scaled = i32::from(AXIS_CENTER) + centered * i32::from(pct) / 100;
    scaled.clamp(1, 255) as u8
}

fn apply_trigger(behavior: &TriggerBehavior, buttons: &mut Buttons, bit: Buttons, analog: &mut u8) {
    match behavior.mode {
        TriggerMode::Passthrough => {}
        TriggerMode::DigitalOnly => *analog = 0,
        TriggerMode::AnalogOnly => buttons.set(bit, false),
        TriggerMode::Fixed => {
            *analog = if buttons.contains(bit) { behavior.fixed } else { 0 };
        }
        TriggerMode::Disabled => {
            buttons.set(bit, false);
            *analog = 0;
        }
        TriggerMode::Threshold => {
            buttons.set(bit, *analog >= behavior.threshold);
        }
    }
}

fn fill_pressure(out: &mut ProfileOutput) {
    const ORDER: [Buttons; 12] = [
        Buttons::DU,
        Buttons::DR,
        Buttons::DD,
        Buttons::DL,
        Buttons::L2,
        Buttons::R2,
        Buttons::L1,
        Buttons::R1,
        Buttons::B4,
        Buttons::B2,
        Buttons::B1,
        Buttons::B3,
    ];
    for (cell, &bit) in out.pressure.iter_mut().zip(ORDER.iter()) {
        *cell = if out.buttons.contains(bit) { 0xFF } else { 0 };
    }
    // Trigger cells carry the analog channel when it is richer than the bit.
    if out.l2 > 0 {
        out.pressure[4] = out.l2;
    }
    if out.r2 > 0 {
        out.pressure[5] = out.r2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Transport;

    fn event_with(buttons: Buttons) -> InputEvent {
        let mut e = InputEvent::new(0x01, 0, Transport::Usb);
        e.buttons = buttons;
        e
    }

    #[test]
    fn test_passthrough_is_identity() {
        let mut engine = ProfileEngine::new();
        let mut e = event_with(Buttons::B1 | Buttons::DL | Buttons::R4);
        e.axes.lx = 10;
        e.axes.r2 = 200;
        let out = engine.apply(0, &e);
        assert_eq!(out.buttons, e.buttons);
        assert_eq!(out.lx, 10);
        assert_eq!(out.ly, 128);
        assert_eq!(out.r2, 200);
    }

    #[test]
    fn test_remap_moves_bit() {
        let mut engine = ProfileEngine::new();
        let mut p = Profile::passthrough("swap-ab");
        p.map.push(ButtonMapEntry::remap(Buttons::B1, Buttons::B2)).unwrap();
        let idx = engine.add_profile(p).unwrap();
        engine.set_active(idx);

        let out = engine.apply(0, &event_with(Buttons::B1 | Buttons::L1));
        assert_eq!(out.buttons, Buttons::B2 | Buttons::L1);
    }

    #[test]
    fn test_disabled_wins_over_remap() {
        let mut engine = ProfileEngine::new();
        let mut p = Profile::passthrough("dead-b1");
        p.map.push(ButtonMapEntry::remap(Buttons::B1, Buttons::B2)).unwrap();
        p.map.push(ButtonMapEntry::disable(Buttons::B1)).unwrap();
        let idx = engine.add_profile(p).unwrap();
        engine.set_active(idx);

        let out = engine.apply(0, &event_with(Buttons::B1));
        assert!(out.buttons.is_empty());
    }

    #[test]
    fn test_multiple_entries_or_outputs() {
        let mut engine = ProfileEngine::new();
        let mut p = Profile::passthrough("fan-out");
        p.map.push(ButtonMapEntry::remap(Buttons::B1, Buttons::L1)).unwrap();
        p.map.push(ButtonMapEntry::remap(Buttons::B1, Buttons::R1)).unwrap();
        let idx = engine.add_profile(p).unwrap();
        engine.set_active(idx);

        let out = engine.apply(0, &event_with(Buttons::B1));
        assert_eq!(out.buttons, Buttons::L1 | Buttons::R1);
    }

    #[test]
    fn test_digital_to_analog_target() {
        let mut engine = ProfileEngine::new();
        let mut p = Profile::passthrough("b1-to-l2");
        p.map
            .push(ButtonMapEntry::to_analog(Buttons::B1, AnalogTarget::LeftTrigger, 0xFF))
            .unwrap();
        let idx = engine.add_profile(p).unwrap();
        engine.set_active(idx);

        let out = engine.apply(0, &event_with(Buttons::B1));
        assert!(out.buttons.is_empty());
        assert_eq!(out.l2, 0xFF);
        assert_eq!(out.pressure[4], 0xFF);
    }

    #[test]
    fn test_exclusive_combo() {
        let mut engine = ProfileEngine::new();
        let mut p = Profile::passthrough("combo");
        p.combos
            .push(ComboEntry {
                mask: Buttons::L1 | Buttons::R1,
                output: Buttons::A1,
                exclusive: true,
                replace: true,
            })
            .unwrap();
        let idx = engine.add_profile(p).unwrap();
        engine.set_active(idx);

        // Exact match fires and replaces.
        let out = engine.apply(0, &event_with(Buttons::L1 | Buttons::R1));
        assert_eq!(out.buttons, Buttons::A1);

        // Extra bit: combo must not fire, everything passes through.
        let out = engine.apply(0, &event_with(Buttons::L1 | Buttons::R1 | Buttons::B1));
        assert_eq!(out.buttons, Buttons::L1 | Buttons::R1 | Buttons::B1);
    }

    #[test]
    fn test_non_exclusive_combo_or() {
        let mut engine = ProfileEngine::new();
        let mut p = Profile::passthrough("combo-or");
        p.combos
            .push(ComboEntry {
                mask: Buttons::S1 | Buttons::S2,
                output: Buttons::A1,
                exclusive: false,
                replace: false,
            })
            .unwrap();
        let idx = engine.add_profile(p).unwrap();
        engine.set_active(idx);

        let out = engine.apply(0, &event_with(Buttons::S1 | Buttons::S2 | Buttons::B1));
        assert_eq!(out.buttons, Buttons::S1 | Buttons::S2 | Buttons::B1 | Buttons::A1);
    }

    #[test]
    fn test_swap_and_invert() {
        let mut engine = ProfileEngine::new();
        let mut p = Profile::passthrough("southpaw");
        p.swap_sticks = true;
        p.invert_ry = true;
        let idx = engine.add_profile(p).unwrap();
        engine.set_active(idx);

        let mut e = event_with(Buttons::NONE);
        e.axes.lx = 200;
        e.axes.ly = 50;
        let out = engine.apply(0, &e);
        assert_eq!(out.rx, 200);
        assert_eq!(out.ry, 255 - 50);
        assert_eq!(out.lx, 128);
    }

    #[test]
    fn test_sensitivity_clamps() {
        assert_eq!(scale_sens(128, 150), 128);
        assert_eq!(scale_sens(255, 150), 255);
        assert_eq!(scale_sens(0, 150), 1);
        assert_eq!(scale_sens(192, 50), 160);
    }

    #[test]
    fn test_trigger_threshold_mode() {
        let mut engine = ProfileEngine::new();
        let mut p = Profile::passthrough("trig");
        p.left_trigger = TriggerBehavior {
            mode: TriggerMode::Threshold,
            threshold: 0x80,
            fixed: 0,
        };
        let idx = engine.add_profile(p).unwrap();
        engine.set_active(idx);

        let mut e = event_with(Buttons::NONE);
        e.axes.l2 = 0x90;
        let out = engine.apply(0, &e);
        assert!(out.buttons.contains(Buttons::L2));

        e.axes.l2 = 0x10;
        let out = engine.apply(0, &e);
        assert!(!out.buttons.contains(Buttons::L2));
    }

    #[test]
    fn test_socd_neutral_via_profile() {
        let mut engine = ProfileEngine::new();
        let mut p = Profile::passthrough("socd");
        p.socd = SocdMode::Neutral;
        let idx = engine.add_profile(p).unwrap();
        engine.set_active(idx);

        let out = engine.apply(0, &event_with(Buttons::DL | Buttons::DR));
        assert!(!out.buttons.intersects(Buttons::DL | Buttons::DR));
    }

    #[test]
    fn test_pressure_vector_digital() {
        let mut engine = ProfileEngine::new();
        let out = engine.apply(0, &event_with(Buttons::DU | Buttons::B1));
        assert_eq!(out.pressure[0], 0xFF); // DU
        assert_eq!(out.pressure[10], 0xFF); // B1
        assert_eq!(out.pressure[1], 0); // DR
    }
}
