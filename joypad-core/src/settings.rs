//! Persistent settings: versioned blob codec, debounced commits.
//!
//! The backing store is an opaque key/value collaborator assumed atomic at
//! blob granularity. A commit always rewrites the whole image with the
//! sequence counter incremented; no partial state is ever visible.

use log::{debug, warn};

/// Blob version tag; bumping it invalidates older images.
pub const SETTINGS_MAGIC: u32 = 0x4A50_4431; // "JPD1"

pub const MAX_CUSTOM_PROFILES: usize = 4;
/// Custom profile names are at most 11 bytes plus a terminator.
pub const CUSTOM_NAME_LEN: usize = 11;
pub const CUSTOM_MAP_LEN: usize = 18;

/// Debounce window between the last `save` and the actual commit.
pub const SAVE_DEBOUNCE_US: u64 = 5_000_000;

/// Wiimote orientation handling, persisted per `spec` of the Wiimote
/// driver: automatic (accelerometer) or forced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OrientationMode {
    #[default]
    Auto = 0,
    ForceHorizontal = 1,
    ForceVertical = 2,
}

impl OrientationMode {
    #[must_use]
    pub const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::ForceHorizontal,
            2 => Self::ForceVertical,
            _ => Self::Auto,
        }
    }
}

/// Custom profile flag bits (mirrors `Profile` booleans).
pub mod custom_flags {
    pub const SWAP_STICKS: u8 = 1 << 0;
    pub const INVERT_LY: u8 = 1 << 1;
    pub const INVERT_RY: u8 = 1 << 2;
}

/// Fixed-width persisted remap. Map entries: 0 = passthrough,
/// 255 = disabled, 1..=18 = remap to that logical button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CustomProfile {
    /// NUL-padded name, at most [`CUSTOM_NAME_LEN`] meaningful bytes.
    pub name: [u8; CUSTOM_NAME_LEN + 1],
    pub map: [u8; CUSTOM_MAP_LEN],
    pub left_sens: u8,
    pub right_sens: u8,
    pub flags: u8,
}

impl CustomProfile {
    pub const WIRE_LEN: usize = CUSTOM_NAME_LEN + 1 + CUSTOM_MAP_LEN + 4;

    #[must_use]
    pub fn named(name: &str) -> Self {
        let mut p = Self::default();
        p.set_name(name);
        p
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = [0; CUSTOM_NAME_LEN + 1];
        for (dst, src) in self.name[..CUSTOM_NAME_LEN].iter_mut().zip(name.bytes()) {
            *dst = src;
        }
    }

    /// Name as UTF-8 up to the first NUL (lossy on invalid bytes).
    #[must_use]
    pub fn name_str(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        core::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    fn write(&self, buf: &mut [u8]) {
        buf[..CUSTOM_NAME_LEN + 1].copy_from_slice(&self.name);
        let map_end = CUSTOM_NAME_LEN + 1 + CUSTOM_MAP_LEN;
        buf[CUSTOM_NAME_LEN + 1..map_end].copy_from_slice(&self.map);
        buf[map_end] = self.left_sens;
        buf[map_end + 1] = self.right_sens;
        buf[map_end + 2] = self.flags;
        buf[map_end + 3] = 0; // reserved
    }

    fn read(buf: &[u8]) -> Self {
        let mut name = [0u8; CUSTOM_NAME_LEN + 1];
        name.copy_from_slice(&buf[..CUSTOM_NAME_LEN + 1]);
        let mut map = [0u8; CUSTOM_MAP_LEN];
        let map_end = CUSTOM_NAME_LEN + 1 + CUSTOM_MAP_LEN;
        map.copy_from_slice(&buf[CUSTOM_NAME_LEN + 1..map_end]);
        Self {
            name,
            map,
            left_sens: buf[map_end],
            right_sens: buf[map_end + 1],
            flags: buf[map_end + 2],
        }
    }
}

impl Default for CustomProfile {
    fn default() -> Self {
        Self {
            name: [0; CUSTOM_NAME_LEN + 1],
            map: [0; CUSTOM_MAP_LEN],
            left_sens: 100,
            right_sens: 100,
            flags: 0,
        }
    }
}

/// The whole persisted image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    /// Monotonic commit counter.
    pub sequence: u32,
    pub active_profile: u8,
    pub custom_count: u8,
    pub customs: [CustomProfile; MAX_CUSTOM_PROFILES],
    pub wiimote_orientation: OrientationMode,
}

impl Settings {
    /// magic + sequence + active + count + orientation + reserved
    /// + profile array.
    pub const BLOB_LEN: usize = 4 + 4 + 4 + MAX_CUSTOM_PROFILES * CustomProfile::WIRE_LEN;

    /// Serialize into a fixed little-endian image.
    pub fn to_bytes(&self, buf: &mut [u8; Self::BLOB_LEN]) {
        buf[0..4].copy_from_slice(&SETTINGS_MAGIC.to_le_bytes());
        buf[4..8].copy_from_slice(&self.sequence.to_le_bytes());
        buf[8] = self.active_profile;
        buf[9] = self.custom_count.min(MAX_CUSTOM_PROFILES as u8);
        buf[10] = self.wiimote_orientation as u8;
        buf[11] = 0; // reserved
        let mut offset = 12;
        for profile in &self.customs {
            profile.write(&mut buf[offset..offset + CustomProfile::WIRE_LEN]);
            offset += CustomProfile::WIRE_LEN;
        }
    }

    /// Parse an image; `None` on magic mismatch or short blob.
    #[must_use]
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::BLOB_LEN {
            return None;
        }
        let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic != SETTINGS_MAGIC {
            return None;
        }
        let mut customs = [CustomProfile::default(); MAX_CUSTOM_PROFILES];
        let mut offset = 12;
        for profile in customs.iter_mut() {
            *profile = CustomProfile::read(&buf[offset..offset + CustomProfile::WIRE_LEN]);
            offset += CustomProfile::WIRE_LEN;
        }
        Some(Self {
            sequence: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            active_profile: buf[8],
            custom_count: buf[9].min(MAX_CUSTOM_PROFILES as u8),
            customs,
            wiimote_orientation: OrientationMode::from_u8(buf[10]),
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sequence: 0,
            active_profile: 0,
            custom_count: 0,
            customs: [CustomProfile::default(); MAX_CUSTOM_PROFILES],
            wiimote_orientation: OrientationMode::Auto,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    Io,
    NotFound,
}

/// Non-volatile blob store collaborator (NVS namespace "joypad", key
/// "settings" on the reference platform).
pub trait SettingsStore {
    /// Read the blob into `buf`, returning the stored length.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StoreError>;
    /// Atomically replace the blob.
    fn write(&mut self, data: &[u8]) -> Result<(), StoreError>;
}

/// Owns the live settings copy and the commit debounce.
pub struct SettingsManager<S: SettingsStore> {
    store: S,
    current: Settings,
    /// Sequence of the last committed image. Owned here so a stale copy
    /// passed to `save` can never rewind the counter.
    committed_seq: u32,
    pending: bool,
    last_change_us: u64,
}

impl<S: SettingsStore> SettingsManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            current: Settings::default(),
            committed_seq: 0,
            pending: false,
            last_change_us: 0,
        }
    }

    /// Load from the store. On magic mismatch or read failure the manager
    /// keeps defaults and returns false; the next save writes a fresh
    /// valid blob.
    pub fn load(&mut self) -> bool {
        let mut buf = [0u8; Settings::BLOB_LEN];
        match self.store.read(&mut buf) {
            Ok(n) => match Settings::from_bytes(&buf[..n]) {
                Some(settings) => {
                    self.current = settings;
                    self.committed_seq = settings.sequence;
                    true
                }
                None => {
                    warn!("settings blob invalid, using defaults");
                    false
                }
            },
            Err(_) => {
                debug!("settings blob missing, using defaults");
                false
            }
        }
    }

    #[must_use]
    pub fn get(&self) -> &Settings {
        &self.current
    }

    /// Stage a modified copy; the commit happens after the debounce
    /// window elapses with no further changes.
    pub fn save(&mut self, copy: &Settings, now_us: u64) {
        self.current = *copy;
        self.pending = true;
        self.last_change_us = now_us;
    }

    /// Commit synchronously (used on BT disconnect and from the control
    /// plane).
    pub fn save_now(&mut self, copy: &Settings) -> Result<(), StoreError> {
        self.current = *copy;
        self.commit()
    }

    #[must_use]
    pub fn has_pending_write(&self) -> bool {
        self.pending
    }

    /// Debounce task: commit once the window has elapsed.
    pub fn task(&mut self, now_us: u64) {
        if self.pending && now_us.saturating_sub(self.last_change_us) >= SAVE_DEBOUNCE_US {
            if self.commit().is_err() {
                warn!("settings commit failed, retrying next window");
                self.last_change_us = now_us;
                return;
            }
        }
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.current.sequence = self.committed_seq.wrapping_add(1);
        let mut buf = [0u8; Settings::BLOB_LEN];
        self.current.to_bytes(&mut buf);
        self.store.write(&buf)?;
        self.committed_seq = self.current.sequence;
        self.pending = false;
        debug!("settings committed, sequence {}", self.current.sequence);
        Ok(())
    }
}
