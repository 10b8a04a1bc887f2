//! Input events: the normalized record every driver produces.

use crate::types::{Axes, Buttons};

/// What kind of device produced an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SourceKind {
    Gamepad,
    Keyboard,
    Mouse,
}

/// Physical transport a device is attached through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transport {
    Usb,
    BtClassic,
    BtLe,
    /// Original console wiring (NES/SNES/N64/GC/NEOGEO ports).
    Native,
}

/// Vendor layout hint, used by outputs that relabel face buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Layout {
    #[default]
    Generic,
    Nintendo,
    PlayStation,
    Xbox,
    Arcade,
}

/// Device address partitioning per transport.
///
/// The ranges never overlap; a bare address is enough to recover the
/// transport that owns the connection.
pub mod addr {
    use super::Transport;

    pub const USB_FIRST: u8 = 0x00;
    pub const USB_LAST: u8 = 0x7F;
    pub const BT_FIRST: u8 = 0xA0;
    pub const BT_LAST: u8 = 0xAF;
    pub const NATIVE_FIRST: u8 = 0xD0;
    pub const NATIVE_LAST: u8 = 0xFF;

    /// Recover the owning transport class from a device address.
    ///
    /// BLE and Classic share the BT range; the distinction lives in the
    /// connection record, not the address.
    #[must_use]
    pub const fn transport_of(addr: u8) -> Option<Transport> {
        match addr {
            USB_FIRST..=USB_LAST => Some(Transport::Usb),
            BT_FIRST..=BT_LAST => Some(Transport::BtClassic),
            NATIVE_FIRST..=NATIVE_LAST => Some(Transport::Native),
            _ => None,
        }
    }
}

/// Motion sample normalized to ±32767 ≙ ±4 g (accel) / ±2000 °/s (gyro).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionData {
    pub accel: [i16; 3],
    pub gyro: [i16; 3],
    /// Full-scale range the source sensor was configured for, in g.
    pub accel_range_g: u8,
    /// Full-scale gyro range in °/s.
    pub gyro_range_dps: u16,
}

/// Battery snapshot reported by a wireless device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryStatus {
    /// Charge percent, 0..=100.
    pub level: u8,
    pub charging: bool,
}

/// Immutable record produced by every input driver, consumed within the
/// same scheduler tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputEvent {
    /// Stable identity of the physical source for the connection lifetime.
    pub addr: u8,
    pub instance: u8,
    pub kind: SourceKind,
    pub transport: Transport,
    pub layout: Layout,
    pub buttons: Buttons,
    pub axes: Axes,
    /// How many buttons the source actually has (drives output mapping).
    pub button_count: u8,
    pub motion: Option<MotionData>,
    pub battery: Option<BatteryStatus>,
}

impl InputEvent {
    /// A quiescent event: no buttons, sticks centered, triggers released.
    #[must_use]
    pub fn new(addr: u8, instance: u8, transport: Transport) -> Self {
        Self {
            addr,
            instance,
            kind: SourceKind::Gamepad,
            transport,
            layout: Layout::Generic,
            buttons: Buttons::NONE,
            axes: Axes::centered(),
            button_count: 0,
            motion: None,
            battery: None,
        }
    }

    /// Whether the event carries any activity (pressed button or any
    /// off-center analog channel).
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.buttons.is_empty() || !self.axes.is_centered()
    }
}
