//! Player slot management: binding physical connections to player indexes.

use log::debug;

use crate::driver::FeedbackSource;
use crate::event::InputEvent;
use crate::feedback::{Feedback, FeedbackState};

/// Maximum number of player slots.
pub const MAX_PLAYERS: usize = 8;

/// Slot assignment policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotMode {
    /// Slot index follows connection order and never shifts.
    #[default]
    Fixed,
    /// Slots compact downward on disconnect.
    Dynamic,
}

/// State carried per occupied slot.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlayerState {
    pub addr: u8,
    pub instance: u8,
    pub last_event: InputEvent,
    pub profile_index: u8,
    pub feedback: FeedbackState,
}

/// Assigns `(device address, instance)` pairs to player slots.
///
/// With `auto_assign_on_press` a freshly connected but idle controller
/// does not claim a slot; assignment happens on the first non-zero button.
pub struct PlayerManager {
    mode: SlotMode,
    auto_assign_on_press: bool,
    default_profile: u8,
    slots: [Option<PlayerState>; MAX_PLAYERS],
}

impl PlayerManager {
    #[must_use]
    pub const fn new(mode: SlotMode, auto_assign_on_press: bool) -> Self {
        Self {
            mode,
            auto_assign_on_press,
            default_profile: 0,
            slots: [None; MAX_PLAYERS],
        }
    }

    /// Profile index newly registered players start with.
    pub fn set_default_profile(&mut self, index: u8) {
        self.default_profile = index;
    }

    /// Slot currently bound to a connection, if any.
    #[must_use]
    pub fn slot_of(&self, addr: u8, instance: u8) -> Option<usize> {
        self.slots.iter().position(|s| {
            s.as_ref()
                .is_some_and(|p| p.addr == addr && p.instance == instance)
        })
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&PlayerState> {
        self.slots.get(slot).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut PlayerState> {
        self.slots.get_mut(slot).and_then(|s| s.as_mut())
    }

    /// Iterate `(slot, state)` over occupied slots.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &PlayerState)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|p| (i, p)))
    }

    /// Resolve or create the slot for an incoming event.
    ///
    /// Returns `None` when the event should not yet claim a slot (idle
    /// device under the press-to-assign policy) or when all slots are
    /// taken.
    pub fn assign(&mut self, event: &InputEvent) -> Option<usize> {
        if let Some(slot) = self.slot_of(event.addr, event.instance) {
            return Some(slot);
        }
        if self.auto_assign_on_press && event.buttons.is_empty() {
            return None;
        }
        self.register(event.addr, event.instance)
    }

    /// Explicitly bind a connection to the first free slot.
    pub fn register(&mut self, addr: u8, instance: u8) -> Option<usize> {
        if let Some(slot) = self.slot_of(addr, instance) {
            return Some(slot);
        }
        let free = self.slots.iter().position(|s| s.is_none())?;
        self.slots[free] = Some(PlayerState {
            addr,
            instance,
            last_event: InputEvent::new(addr, instance, crate::event::Transport::Usb),
            profile_index: self.default_profile,
            feedback: FeedbackState::default(),
        });
        debug!("player {} <- device {:02x}.{}", free, addr, instance);
        Some(free)
    }

    /// Release every slot owned by the connection. Idempotent; in
    /// `Dynamic` mode the remaining players compact downward.
    pub fn remove_by_address(&mut self, addr: u8, instance: u8) {
        let mut removed = false;
        for slot in self.slots.iter_mut() {
            if slot
                .as_ref()
                .is_some_and(|p| p.addr == addr && p.instance == instance)
            {
                *slot = None;
                removed = true;
            }
        }
        if removed && self.mode == SlotMode::Dynamic {
            self.compact();
        }
    }

    fn compact(&mut self) {
        let mut write = 0;
        for read in 0..MAX_PLAYERS {
            if self.slots[read].is_some() {
                if read != write {
                    self.slots[write] = self.slots[read].take();
                }
                write += 1;
            }
        }
    }
}

impl FeedbackSource for PlayerManager {
    fn take_feedback(&mut self, addr: u8, instance: u8) -> Option<Feedback> {
        let slot = self.slot_of(addr, instance)?;
        self.get_mut(slot)?.feedback.take()
    }
}
