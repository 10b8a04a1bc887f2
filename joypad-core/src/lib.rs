//! Platform-agnostic controller translation core.
//!
//! This crate provides the data plane of the adapter without any
//! platform-specific dependencies: the canonical button/axis vocabulary,
//! the normalized input event, the device-driver registry, the router,
//! player management, the profile engine, hotkeys, feedback and the
//! persistent settings layer. It can be used both in embedded `no_std`
//! environments and on host for testing.
//!
//! # Features
//!
//! - `std`: Enable standard library support (for testing)
//! - `defmt`: Enable defmt formatting for embedded logging

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod bt;
pub mod driver;
pub mod event;
pub mod feedback;
pub mod hotkeys;
pub mod output;
pub mod platform;
pub mod player;
pub mod profile;
pub mod router;
pub mod settings;
pub mod socd;
pub mod types;

// Re-export main types at crate root
pub use driver::{
    DeviceDriver, DeviceIdentity, DeviceTx, DriverCtx, DriverError, DriverRegistry, EventSink,
    FeedbackSource, PairingMethod,
};
pub use event::{addr, BatteryStatus, InputEvent, Layout, MotionData, SourceKind, Transport};
pub use feedback::{Feedback, FeedbackState};
pub use hotkeys::{Hotkey, HotkeyEvent, HotkeyId, HotkeyManager, HotkeyTrigger};
pub use output::{HostTx, OutputError, OutputMode};
pub use platform::Platform;
pub use player::{PlayerManager, PlayerState, SlotMode, MAX_PLAYERS};
pub use profile::{
    AnalogTarget, ButtonMapEntry, ComboEntry, MapTarget, Profile, ProfileEngine, ProfileOutput,
    TriggerBehavior, TriggerMode,
};
pub use router::{
    MergeMode, OutputSlot, Route, Router, RouterConfig, RouterError, RoutingMode, TapSink,
    MAX_OUTPUTS,
};
pub use settings::{
    CustomProfile, OrientationMode, Settings, SettingsManager, SettingsStore, StoreError,
    MAX_CUSTOM_PROFILES, SAVE_DEBOUNCE_US,
};
pub use socd::{SocdMode, SocdState};
pub use types::{Axes, Buttons, AXIS_CENTER, BUTTON_COUNT};
