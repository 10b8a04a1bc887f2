//! Router: input source → player slot → output target, with fan-in merge
//! and tap-exclusive push outputs.

use heapless::Vec;
use log::debug;

use crate::event::InputEvent;
use crate::hotkeys::HotkeyManager;
use crate::player::{PlayerManager, MAX_PLAYERS};
use crate::profile::{ProfileEngine, ProfileOutput};
use crate::types::AXIS_CENTER;

pub const MAX_OUTPUTS: usize = 4;
pub const MAX_ROUTES: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RoutingMode {
    /// Every input feeds output 0.
    #[default]
    Simple,
    /// Inputs feed the outputs their routes name.
    Multi,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MergeMode {
    /// Each player owns its own output port.
    #[default]
    PerPlayer,
    /// All players collapse onto port 0: buttons OR, newest non-center
    /// axis wins.
    Merge,
}

#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RouterConfig {
    pub mode: RoutingMode,
    pub merge: MergeMode,
    /// Rate at which accumulated mouse deltas are drained into events.
    pub mouse_drain_hz: u16,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            mode: RoutingMode::Simple,
            merge: MergeMode::PerPlayer,
            mouse_drain_hz: 125,
        }
    }
}

/// One routing table entry: events from `input_addr` go to `output`.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Route {
    pub input_addr: u8,
    pub output: u8,
    pub port: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RouterError {
    TableFull,
    BadOutput,
}

/// Stored result for one (output, port) pair, polled by the output mode.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputSlot {
    pub out: ProfileOutput,
    pub event: InputEvent,
    pub fresh: bool,
}

/// Push callback for tap-exclusive outputs (GPIO): invoked synchronously
/// from `submit_input`, in the submitting driver's context.
pub trait TapSink {
    fn tap(&mut self, output: u8, port: usize, out: &ProfileOutput, event: &InputEvent);
}

pub struct Router {
    config: RouterConfig,
    routes: Vec<Route, MAX_ROUTES>,
    /// Bit per output index: output takes the tap path, never polled.
    tap_mask: u8,
    max_players: [u8; MAX_OUTPUTS],
    slots: [[Option<OutputSlot>; MAX_PLAYERS]; MAX_OUTPUTS],
}

impl Router {
    #[must_use]
    pub const fn new(config: RouterConfig) -> Self {
        Self {
            config,
            routes: Vec::new(),
            tap_mask: 0,
            max_players: [MAX_PLAYERS as u8; MAX_OUTPUTS],
            slots: [[None; MAX_PLAYERS]; MAX_OUTPUTS],
        }
    }

    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: RouterConfig) {
        self.config = config;
    }

    pub fn add_route(&mut self, input_addr: u8, output: u8, port: u8) -> Result<(), RouterError> {
        if output as usize >= MAX_OUTPUTS {
            return Err(RouterError::BadOutput);
        }
        self.routes
            .push(Route {
                input_addr,
                output,
                port,
            })
            .map_err(|_| RouterError::TableFull)
    }

    /// Mark an output as tap-exclusive. Tap and poll are mutually
    /// exclusive per output to avoid double-writes.
    pub fn set_tap(&mut self, output: u8, enabled: bool) {
        if enabled {
            self.tap_mask |= 1 << output;
        } else {
            self.tap_mask &= !(1 << output);
        }
    }

    pub fn set_max_players(&mut self, output: u8, count: u8) {
        if let Some(slot) = self.max_players.get_mut(output as usize) {
            *slot = count.min(MAX_PLAYERS as u8);
        }
    }

    /// Submit one normalized event into the pipeline.
    ///
    /// Synchronously: resolve the player slot (auto-assign), feed the
    /// hotkey detector the pre-profile word, apply the player's profile,
    /// then store the result for polling or invoke the tap callback.
    ///
    /// Returns the player slot, or `None` when the event claimed none.
    pub fn submit_input(
        &mut self,
        event: &InputEvent,
        players: &mut PlayerManager,
        engine: &mut ProfileEngine,
        hotkeys: &mut HotkeyManager,
        mut tap: Option<&mut dyn TapSink>,
        now_us: u64,
    ) -> Option<usize> {
        let slot = players.assign(event)?;
        let profile_index = {
            let player = players.get_mut(slot)?;
            player.last_event = *event;
            player.profile_index
        };

        hotkeys.observe(slot, event.buttons, now_us);

        let out = engine.apply_with(profile_index as usize, slot, event);

        for output in 0..MAX_OUTPUTS as u8 {
            if !self.targets(event.addr, output) {
                continue;
            }
            let port = if self.config.merge == MergeMode::Merge {
                0
            } else {
                slot
            };
            if port >= self.max_players[output as usize] as usize {
                continue;
            }
            if self.tap_mask & (1 << output) != 0 {
                if let Some(sink) = tap.as_deref_mut() {
                    sink.tap(output, port, &out, event);
                }
            } else {
                self.store(output as usize, port, &out, event);
            }
        }
        Some(slot)
    }

    fn targets(&self, input_addr: u8, output: u8) -> bool {
        match self.config.mode {
            RoutingMode::Simple => output == 0,
            RoutingMode::Multi => self
                .routes
                .iter()
                .any(|r| r.input_addr == input_addr && r.output == output),
        }
    }

    fn store(&mut self, output: usize, port: usize, out: &ProfileOutput, event: &InputEvent) {
        let cell = &mut self.slots[output][port];
        match cell {
            Some(slot)
                if self.config.merge == MergeMode::Merge
                    && (slot.event.addr != event.addr || slot.event.instance != event.instance) =>
            {
                slot.out.buttons |= out.buttons;
                merge_axis(&mut slot.out.lx, out.lx, AXIS_CENTER);
                merge_axis(&mut slot.out.ly, out.ly, AXIS_CENTER);
                merge_axis(&mut slot.out.rx, out.rx, AXIS_CENTER);
                merge_axis(&mut slot.out.ry, out.ry, AXIS_CENTER);
                merge_axis(&mut slot.out.l2, out.l2, 0);
                merge_axis(&mut slot.out.r2, out.r2, 0);
                slot.event = *event;
                slot.fresh = true;
            }
            _ => {
                *cell = Some(OutputSlot {
                    out: *out,
                    event: *event,
                    fresh: true,
                });
            }
        }
    }

    /// Clear state owned by a disconnected device: its output slots go
    /// neutral (one final centered report), its player slot is released.
    /// Tap outputs receive the neutral state synchronously.
    pub fn device_disconnected(
        &mut self,
        addr: u8,
        instance: u8,
        players: &mut PlayerManager,
        hotkeys: &mut HotkeyManager,
        mut tap: Option<&mut dyn TapSink>,
    ) {
        if let Some(slot) = players.slot_of(addr, instance) {
            hotkeys.reset_player(slot);
            let port = if self.config.merge == MergeMode::Merge { 0 } else { slot };
            let neutral = ProfileOutput::neutral();
            let transport = crate::event::addr::transport_of(addr)
                .unwrap_or(crate::event::Transport::Usb);
            let event = InputEvent::new(addr, instance, transport);
            for output in 0..MAX_OUTPUTS as u8 {
                if self.tap_mask & (1 << output) != 0 && self.targets(addr, output) {
                    if let Some(sink) = tap.as_deref_mut() {
                        sink.tap(output, port, &neutral, &event);
                    }
                }
            }
        }
        for output in self.slots.iter_mut() {
            for cell in output.iter_mut() {
                if let Some(slot) = cell {
                    if slot.event.addr == addr && slot.event.instance == instance {
                        slot.out = ProfileOutput::neutral();
                        slot.fresh = true;
                    }
                }
            }
        }
        players.remove_by_address(addr, instance);
        debug!("router cleared device {:02x}.{}", addr, instance);
    }

    /// Number of ports with stored state on an output.
    #[must_use]
    pub fn get_player_count(&self, output: u8) -> usize {
        self.slots
            .get(output as usize)
            .map_or(0, |ports| ports.iter().filter(|p| p.is_some()).count())
    }

    /// Current state of one output port, fresh or not.
    #[must_use]
    pub fn get_output_state(&self, output: u8, port: usize) -> Option<&OutputSlot> {
        self.slots.get(output as usize)?.get(port)?.as_ref()
    }

    /// Consume the fresh flag for a port, returning its state if it
    /// changed since the last take.
    pub fn take_output(&mut self, output: u8, port: usize) -> Option<OutputSlot> {
        let cell = self.slots.get_mut(output as usize)?.get_mut(port)?;
        let slot = cell.as_mut()?;
        if !slot.fresh {
            return None;
        }
        slot.fresh = false;
        Some(*slot)
    }
}

/// Newest non-resting value wins; resting values leave the merge alone.
fn merge_axis(stored: &mut u8, incoming: u8, rest: u8) {
    if incoming != rest {
        *stored = incoming;
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::event::Transport;
    use crate::player::SlotMode;
    use crate::types::Buttons;
    use std::vec::Vec as StdVec;

    fn pipeline() -> (PlayerManager, ProfileEngine, HotkeyManager) {
        (
            PlayerManager::new(SlotMode::Fixed, false),
            ProfileEngine::new(),
            HotkeyManager::new(),
        )
    }

    fn event(addr: u8, buttons: Buttons) -> InputEvent {
        let mut e = InputEvent::new(addr, 0, Transport::Usb);
        e.buttons = buttons;
        e
    }

    #[test]
    fn test_simple_mode_stores_output_zero() {
        let mut router = Router::new(RouterConfig::default());
        let (mut players, mut engine, mut hotkeys) = pipeline();

        let slot = router
            .submit_input(&event(0x01, Buttons::B1), &mut players, &mut engine, &mut hotkeys, None, 0)
            .unwrap();
        assert_eq!(slot, 0);

        let stored = router.take_output(0, 0).unwrap();
        assert_eq!(stored.out.buttons, Buttons::B1);
        // Fresh flag consumed.
        assert!(router.take_output(0, 0).is_none());
    }

    #[test]
    fn test_multi_mode_follows_routes() {
        let mut router = Router::new(RouterConfig {
            mode: RoutingMode::Multi,
            ..RouterConfig::default()
        });
        router.add_route(0x01, 1, 0).unwrap();
        let (mut players, mut engine, mut hotkeys) = pipeline();

        router.submit_input(&event(0x01, Buttons::B1), &mut players, &mut engine, &mut hotkeys, None, 0);
        assert!(router.take_output(0, 0).is_none());
        assert!(router.take_output(1, 0).is_some());
    }

    #[test]
    fn test_merge_ors_buttons_and_keeps_axes() {
        let mut router = Router::new(RouterConfig {
            merge: MergeMode::Merge,
            ..RouterConfig::default()
        });
        let (mut players, mut engine, mut hotkeys) = pipeline();

        let mut first = event(0x01, Buttons::B1);
        first.axes.lx = 30;
        router.submit_input(&first, &mut players, &mut engine, &mut hotkeys, None, 0);

        // Second device: centered stick must not clobber the first.
        let second = event(0x02, Buttons::B2);
        router.submit_input(&second, &mut players, &mut engine, &mut hotkeys, None, 0);

        let stored = router.take_output(0, 0).unwrap();
        assert_eq!(stored.out.buttons, Buttons::B1 | Buttons::B2);
        assert_eq!(stored.out.lx, 30);
    }

    #[test]
    fn test_tap_output_bypasses_slots() {
        struct Recorder {
            calls: StdVec<(u8, usize, Buttons)>,
        }
        impl TapSink for Recorder {
            fn tap(&mut self, output: u8, port: usize, out: &ProfileOutput, _event: &InputEvent) {
                self.calls.push((output, port, out.buttons));
            }
        }

        let mut router = Router::new(RouterConfig::default());
        router.set_tap(0, true);
        let (mut players, mut engine, mut hotkeys) = pipeline();
        let mut recorder = Recorder { calls: StdVec::new() };

        router.submit_input(
            &event(0x01, Buttons::DU),
            &mut players,
            &mut engine,
            &mut hotkeys,
            Some(&mut recorder),
            0,
        );
        assert_eq!(recorder.calls, [(0, 0, Buttons::DU)]);
        assert!(router.get_output_state(0, 0).is_none());
    }

    #[test]
    fn test_disconnect_flushes_neutral() {
        let mut router = Router::new(RouterConfig::default());
        let (mut players, mut engine, mut hotkeys) = pipeline();

        router.submit_input(&event(0x01, Buttons::B1), &mut players, &mut engine, &mut hotkeys, None, 0);
        router.take_output(0, 0);

        router.device_disconnected(0x01, 0, &mut players, &mut hotkeys, None);
        assert_eq!(players.count(), 0);

        let flushed = router.take_output(0, 0).unwrap();
        assert!(flushed.out.buttons.is_empty());
        assert_eq!(flushed.out.lx, AXIS_CENTER);
    }

    #[test]
    fn test_max_players_caps_ports() {
        let mut router = Router::new(RouterConfig::default());
        router.set_max_players(0, 1);
        let (mut players, mut engine, mut hotkeys) = pipeline();

        router.submit_input(&event(0x01, Buttons::B1), &mut players, &mut engine, &mut hotkeys, None, 0);
        router.submit_input(&event(0x02, Buttons::B2), &mut players, &mut engine, &mut hotkeys, None, 0);

        assert!(router.take_output(0, 0).is_some());
        assert!(router.take_output(0, 1).is_none());
    }

    #[test]
    fn test_post_profile_bits_reach_output() {
        use crate::profile::{ButtonMapEntry, Profile};

        let mut router = Router::new(RouterConfig::default());
        let (mut players, mut engine, mut hotkeys) = pipeline();

        let mut p = Profile::passthrough("remap");
        p.map.push(ButtonMapEntry::remap(Buttons::B1, Buttons::B4)).unwrap();
        let idx = engine.add_profile(p).unwrap();
        engine.set_active(idx);

        router.submit_input(&event(0x01, Buttons::B1), &mut players, &mut engine, &mut hotkeys, None, 0);
        let stored = router.take_output(0, 0).unwrap();
        // Never the raw input bit.
        assert_eq!(stored.out.buttons, Buttons::B4);
    }
}
