//! Hotkey detection: profile-independent button-mask combos with
//! tap / hold / release triggers.
//!
//! Hotkeys observe the pre-profile button word. Per-player and global
//! variants are tracked independently; the global word is the OR of every
//! player's buttons accumulated over one tick and cleared at tick end.

use heapless::Vec;

use crate::player::MAX_PLAYERS;
use crate::types::Buttons;

pub const MAX_HOTKEYS: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HotkeyTrigger {
    /// Fire once when held for at least the duration.
    OnHold,
    /// Fire when released after being held at least the duration.
    OnRelease,
    /// Fire when released before the duration elapses.
    OnTap,
}

pub type HotkeyId = u8;

#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hotkey {
    pub id: HotkeyId,
    pub mask: Buttons,
    pub trigger: HotkeyTrigger,
    pub duration_us: u64,
    /// Evaluate against the OR of all players instead of per player.
    pub global: bool,
}

/// A fired hotkey, drained by the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HotkeyEvent {
    pub id: HotkeyId,
    /// `None` for global hotkeys.
    pub player: Option<u8>,
}

#[derive(Clone, Copy, Debug, Default)]
struct TrackState {
    held_since: Option<u64>,
    fired: bool,
}

pub struct HotkeyManager {
    hotkeys: Vec<Hotkey, MAX_HOTKEYS>,
    per_player: [[TrackState; MAX_HOTKEYS]; MAX_PLAYERS],
    global: [TrackState; MAX_HOTKEYS],
    global_word: Buttons,
    fired: Vec<HotkeyEvent, MAX_HOTKEYS>,
}

impl HotkeyManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            hotkeys: Vec::new(),
            per_player: [[TrackState::default(); MAX_HOTKEYS]; MAX_PLAYERS],
            global: [TrackState::default(); MAX_HOTKEYS],
            global_word: Buttons::NONE,
            fired: Vec::new(),
        }
    }

    pub fn register(&mut self, hotkey: Hotkey) -> Result<(), Hotkey> {
        self.hotkeys.push(hotkey)
    }

    /// Feed one player's pre-profile buttons. Called from the router for
    /// every submitted event.
    pub fn observe(&mut self, player: usize, buttons: Buttons, now_us: u64) {
        let player = player % MAX_PLAYERS;
        self.global_word |= buttons;
        for (index, hotkey) in self.hotkeys.iter().enumerate() {
            if hotkey.global {
                continue;
            }
            let state = &mut self.per_player[player][index];
            if let Some(event) = step(hotkey, state, buttons, now_us, Some(player as u8)) {
                let _ = self.fired.push(event);
            }
        }
    }

    /// Evaluate global hotkeys against the accumulated word and reset it.
    /// Call once per scheduler tick, after all drivers ran.
    pub fn tick(&mut self, now_us: u64) {
        let word = self.global_word;
        self.global_word = Buttons::NONE;
        for (index, hotkey) in self.hotkeys.iter().enumerate() {
            if !hotkey.global {
                continue;
            }
            let state = &mut self.global[index];
            if let Some(event) = step(hotkey, state, word, now_us, None) {
                let _ = self.fired.push(event);
            }
        }
    }

    /// Drain one fired hotkey.
    pub fn pop_fired(&mut self) -> Option<HotkeyEvent> {
        self.fired.pop()
    }

    /// Forget all hold state for a player (on disconnect).
    pub fn reset_player(&mut self, player: usize) {
        if let Some(states) = self.per_player.get_mut(player) {
            *states = [TrackState::default(); MAX_HOTKEYS];
        }
    }
}

impl Default for HotkeyManager {
    fn default() -> Self {
        Self::new()
    }
}

fn step(
    hotkey: &Hotkey,
    state: &mut TrackState,
    buttons: Buttons,
    now_us: u64,
    player: Option<u8>,
) -> Option<HotkeyEvent> {
    let held = buttons.contains(hotkey.mask);
    match (held, state.held_since) {
        (true, None) => {
            state.held_since = Some(now_us);
            state.fired = false;
            None
        }
        (true, Some(since)) => {
            if hotkey.trigger == HotkeyTrigger::OnHold
                && !state.fired
                && now_us.saturating_sub(since) >= hotkey.duration_us
            {
                state.fired = true;
                return Some(HotkeyEvent { id: hotkey.id, player });
            }
            None
        }
        (false, Some(since)) => {
            let held_for = now_us.saturating_sub(since);
            state.held_since = None;
            let fire = match hotkey.trigger {
                HotkeyTrigger::OnRelease => held_for >= hotkey.duration_us,
                HotkeyTrigger::OnTap => held_for < hotkey.duration_us,
                HotkeyTrigger::OnHold => false,
            };
            if fire {
                return Some(HotkeyEvent { id: hotkey.id, player });
            }
            None
        }
        (false, None) => None,
    }
}
