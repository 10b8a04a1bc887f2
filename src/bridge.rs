//! The bridge: owns the data-plane components and runs the cooperative
//! scheduler tick.
//!
//! One tick runs, in order: device-driver tasks (feedback drain + state
//! machines), pipeline submission of any events those tasks produced,
//! the polled-output push, feedback collection, hotkey evaluation and
//! the settings debounce. Transports call [`Bridge::submit_report`]
//! directly when bytes arrive; tap outputs fire inside that call.

use heapless::Vec;

use joypad_core::driver::{DeviceDriver, DeviceIdentity, DriverCtx, DriverError, EventSink};
use joypad_core::{
    Buttons, DeviceTx, DriverRegistry, HostTx, Hotkey, HotkeyEvent, HotkeyManager, HotkeyTrigger,
    InputEvent, OutputMode, Platform, PlayerManager, ProfileEngine, Router, RouterConfig,
    SettingsManager, SettingsStore, SlotMode, TapSink, Transport,
};

use crate::control::ControlState;
use crate::profiles;

pub const FW_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const BOARD: &str = "rp2040";

/// Hotkey ids handled by the bridge itself.
pub const HOTKEY_PROFILE_NEXT: u8 = 1;
pub const HOTKEY_PROFILE_PREV: u8 = 2;
pub const HOTKEY_BOOTSEL: u8 = 3;

const BOOTSEL_HOLD_US: u64 = 3_000_000;

/// Sink that forwards submitted events through the router pipeline and
/// mirrors them into the input stream when it is on.
struct PipelineSink<'a, 'b> {
    router: &'a mut Router,
    players: &'a mut PlayerManager,
    engine: &'a mut ProfileEngine,
    hotkeys: &'a mut HotkeyManager,
    control: &'a mut ControlState,
    tap: Option<&'b mut dyn TapSink>,
    now_us: u64,
}

impl<'a, 'b> EventSink for PipelineSink<'a, 'b>
where
    'b: 'a,
{
    fn submit(&mut self, event: &InputEvent) {
        self.router.submit_input(
            event,
            self.players,
            self.engine,
            self.hotkeys,
            match &mut self.tap {
                Some(t) => Some(&mut **t),
                None => None,
            },
            self.now_us,
        );
        self.control.queue_stream_record(event);
    }
}

/// Events produced inside `task()` are parked here and run through the
/// pipeline right after, still within the same tick.
struct QueueSink {
    events: Vec<InputEvent, 16>,
}

impl EventSink for QueueSink {
    fn submit(&mut self, event: &InputEvent) {
        let _ = self.events.push(*event);
    }
}

pub struct Bridge<P: Platform, S: SettingsStore> {
    pub platform: P,
    pub registry: DriverRegistry,
    pub router: Router,
    pub players: PlayerManager,
    pub engine: ProfileEngine,
    pub hotkeys: HotkeyManager,
    pub settings: SettingsManager<S>,
    pub(crate) control: ControlState,
    pub(crate) mode_names: &'static [&'static str],
    pub(crate) active_mode: usize,
    pub(crate) builtin_profiles: usize,
    pub(crate) rumble_test: bool,
}

impl<P: Platform, S: SettingsStore> Bridge<P, S> {
    /// Build the bridge, load persisted settings and register the
    /// default hotkeys.
    pub fn new(platform: P, store: S, mode_names: &'static [&'static str]) -> Self {
        let mut bridge = Self {
            platform,
            registry: DriverRegistry::new(),
            router: Router::new(RouterConfig::default()),
            players: PlayerManager::new(SlotMode::Fixed, true),
            engine: ProfileEngine::new(),
            hotkeys: HotkeyManager::new(),
            settings: SettingsManager::new(store),
            control: ControlState::new(),
            mode_names,
            active_mode: 0,
            builtin_profiles: 0,
            rumble_test: false,
        };
        bridge.settings.load();
        bridge.rebuild_profiles();
        bridge.register_default_hotkeys();
        bridge
    }

    fn register_default_hotkeys(&mut self) {
        let chord = Buttons::S1 | Buttons::S2;
        let _ = self.hotkeys.register(Hotkey {
            id: HOTKEY_PROFILE_NEXT,
            mask: chord | Buttons::DR,
            trigger: HotkeyTrigger::OnTap,
            duration_us: 500_000,
            global: false,
        });
        let _ = self.hotkeys.register(Hotkey {
            id: HOTKEY_PROFILE_PREV,
            mask: chord | Buttons::DL,
            trigger: HotkeyTrigger::OnTap,
            duration_us: 500_000,
            global: false,
        });
        let _ = self.hotkeys.register(Hotkey {
            id: HOTKEY_BOOTSEL,
            mask: chord | Buttons::L1 | Buttons::R1,
            trigger: HotkeyTrigger::OnHold,
            duration_us: BOOTSEL_HOLD_US,
            global: true,
        });
    }

    /// Rebuild the profile engine from built-ins plus the persisted
    /// custom profiles, keeping the active index coherent.
    pub(crate) fn rebuild_profiles(&mut self) {
        let mut engine = ProfileEngine::new();
        self.builtin_profiles = engine.len();
        let settings = *self.settings.get();
        for custom in settings
            .customs
            .iter()
            .take(usize::from(settings.custom_count))
        {
            let _ = engine.add_profile(profiles::custom_to_profile(custom));
        }
        let active = usize::from(settings.active_profile).min(engine.len().saturating_sub(1));
        engine.set_active(active);
        self.players.set_default_profile(active as u8);
        self.engine = engine;
    }

    /// Switch the active profile everywhere and stage a settings save.
    pub(crate) fn apply_active_profile(&mut self, index: usize, now_us: u64) {
        if !self.engine.set_active(index) {
            return;
        }
        self.players.set_default_profile(index as u8);
        for slot in 0..joypad_core::MAX_PLAYERS {
            if let Some(player) = self.players.get_mut(slot) {
                player.profile_index = index as u8;
            }
        }
        let mut copy = *self.settings.get();
        copy.active_profile = index as u8;
        self.settings.save(&copy, now_us);
    }

    /// A freshly attached device: first-fit match against the driver
    /// list. The caller keeps the identity's transport and address
    /// ranges consistent.
    pub fn connect_device(
        &mut self,
        drivers: &mut [&mut dyn DeviceDriver],
        identity: &DeviceIdentity<'_>,
        addr: u8,
        instance: u8,
        dev_tx: &mut dyn DeviceTx,
    ) -> Result<usize, DriverError> {
        let now = self.platform.now_us();
        let mut queue = QueueSink { events: Vec::new() };
        let mut ctx = DriverCtx {
            events: &mut queue,
            tx: dev_tx,
            now_us: now,
        };
        self.registry.attach(drivers, identity, addr, instance, &mut ctx)
    }

    /// Inbound report from a transport. Tap outputs are updated before
    /// this returns.
    pub fn submit_report(
        &mut self,
        drivers: &mut [&mut dyn DeviceDriver],
        addr: u8,
        instance: u8,
        report: &[u8],
        dev_tx: &mut dyn DeviceTx,
        tap: Option<&mut dyn TapSink>,
    ) {
        let now = self.platform.now_us();
        let mut sink = PipelineSink {
            router: &mut self.router,
            players: &mut self.players,
            engine: &mut self.engine,
            hotkeys: &mut self.hotkeys,
            control: &mut self.control,
            tap,
            now_us: now,
        };
        let mut ctx = DriverCtx {
            events: &mut sink,
            tx: dev_tx,
            now_us: now,
        };
        self.registry
            .process_report(drivers, addr, instance, report, &mut ctx);
    }

    /// Device went away: run the driver's disconnect hook, flush router
    /// state and release the player slot. BT disconnects force a
    /// synchronous settings commit.
    pub fn disconnect_device(
        &mut self,
        drivers: &mut [&mut dyn DeviceDriver],
        addr: u8,
        instance: u8,
        dev_tx: &mut dyn DeviceTx,
        tap: Option<&mut dyn TapSink>,
    ) {
        let now = self.platform.now_us();
        let mut queue = QueueSink { events: Vec::new() };
        let mut ctx = DriverCtx {
            events: &mut queue,
            tx: dev_tx,
            now_us: now,
        };
        self.registry.detach(drivers, addr, instance, &mut ctx);
        self.router
            .device_disconnected(addr, instance, &mut self.players, &mut self.hotkeys, tap);

        let is_bt = matches!(
            joypad_core::addr::transport_of(addr),
            Some(Transport::BtClassic)
        );
        if is_bt && self.settings.has_pending_write() {
            let copy = *self.settings.get();
            let _ = self.settings.save_now(&copy);
        }
    }

    /// One cooperative scheduler tick.
    pub fn tick(
        &mut self,
        drivers: &mut [&mut dyn DeviceDriver],
        outputs: &mut [&mut dyn OutputMode],
        host: &mut dyn HostTx,
        dev_tx: &mut dyn DeviceTx,
        mut tap: Option<&mut dyn TapSink>,
    ) {
        let now = self.platform.now_us();

        // Driver tasks: feedback drain, init state machines, keep-alives.
        let mut queue = QueueSink { events: Vec::new() };
        {
            let mut ctx = DriverCtx {
                events: &mut queue,
                tx: dev_tx,
                now_us: now,
            };
            self.registry.task(drivers, &mut self.players, &mut ctx);
        }
        for event in &queue.events {
            let mut sink = PipelineSink {
                router: &mut self.router,
                players: &mut self.players,
                engine: &mut self.engine,
                hotkeys: &mut self.hotkeys,
                control: &mut self.control,
                tap: match &mut tap {
                    Some(t) => Some(&mut **t),
                    None => None,
                },
                now_us: now,
            };
            sink.submit(event);
        }

        // Rumble test drives every occupied slot until stopped.
        if self.rumble_test {
            for slot in 0..joypad_core::MAX_PLAYERS {
                if let Some(player) = self.players.get_mut(slot) {
                    player.feedback.set_rumble(0xFF, 0xFF);
                }
            }
        }

        // Polled outputs: push fresh state, collect feedback.
        for (index, mode) in outputs.iter_mut().enumerate() {
            for port in 0..mode.max_players() {
                if let Some(slot) = self.router.take_output(index as u8, port) {
                    mode.send_report(port, &slot.event, &slot.out, host);
                }
            }
            for port in 0..mode.max_players() {
                if let Some(fb) = mode.get_feedback(port) {
                    if let Some(player) = self.players.get_mut(port) {
                        player.feedback.set_rumble(fb.rumble_left, fb.rumble_right);
                        if fb.led_pattern != 0 {
                            player.feedback.set_led_pattern(fb.led_pattern);
                        }
                        if fb.led_rgb != [0; 3] {
                            player.feedback.set_led_rgb(fb.led_rgb);
                        }
                    }
                }
            }
        }

        // Hotkeys, then the system actions they fired.
        self.hotkeys.tick(now);
        while let Some(event) = self.hotkeys.pop_fired() {
            self.handle_hotkey(event, now);
        }

        // Debounced settings commit.
        self.settings.task(now);
    }

    fn handle_hotkey(&mut self, event: HotkeyEvent, now_us: u64) {
        match event.id {
            HOTKEY_PROFILE_NEXT => {
                let next = (self.engine.active_index() + 1) % self.engine.len();
                self.apply_active_profile(next, now_us);
            }
            HOTKEY_PROFILE_PREV => {
                let len = self.engine.len();
                let prev = (self.engine.active_index() + len - 1) % len;
                self.apply_active_profile(prev, now_us);
            }
            HOTKEY_BOOTSEL => {
                if self.settings.has_pending_write() {
                    let copy = *self.settings.get();
                    let _ = self.settings.save_now(&copy);
                }
                self.platform.reboot_to_bootloader();
            }
            _ => {}
        }
    }
}
