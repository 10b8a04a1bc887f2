//! Device driver trait and the match-by-identity registry.

use heapless::Vec;
use log::{debug, warn};

use crate::event::{InputEvent, Transport};
use crate::feedback::Feedback;

/// Identity facts a transport knows about a freshly attached device,
/// used for first-fit driver matching.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceIdentity<'a> {
    pub name: &'a str,
    /// Bluetooth class-of-device, little-endian as delivered on the wire.
    pub cod: [u8; 3],
    pub vid: u16,
    pub pid: u16,
    pub transport: Transport,
    pub is_ble: bool,
}

/// Class-of-device major class: peripheral.
pub const COD_MAJOR_PERIPHERAL: u8 = 0x05;
/// Peripheral minor subtype bits: joystick.
pub const COD_MINOR_JOYSTICK: u8 = 0x01;
/// Peripheral minor subtype bits: gamepad.
pub const COD_MINOR_GAMEPAD: u8 = 0x02;

impl<'a> DeviceIdentity<'a> {
    #[must_use]
    pub fn new(name: &'a str, transport: Transport) -> Self {
        Self {
            name,
            cod: [0; 3],
            vid: 0,
            pid: 0,
            transport,
            is_ble: matches!(transport, Transport::BtLe),
        }
    }

    /// COD major device class (byte 1, low 5 bits).
    #[must_use]
    pub const fn major_class(&self) -> u8 {
        self.cod[1] & 0x1F
    }

    /// COD peripheral subtype (byte 0, bits 2..=3).
    #[must_use]
    pub const fn minor_subtype(&self) -> u8 {
        (self.cod[0] >> 2) & 0x03
    }
}

/// How a device expects legacy Bluetooth pairing to be answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairingMethod {
    /// Secure Simple Pairing, no PIN.
    #[default]
    Ssp,
    /// PIN = host BD_ADDR bytes reversed (Wiimote family).
    PinHostAddrReversed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError {
    /// Driver connection pool exhausted; device stays unbound.
    NoFreeSlot,
    /// No driver claimed the device.
    NoMatch,
    /// Operation on a device this driver is not bound to.
    NotBound,
    /// Transport refused the outgoing bytes.
    Tx,
    /// Registry binding table full.
    RegistryFull,
}

/// Sink for normalized events. Implemented by the router pipeline.
pub trait EventSink {
    fn submit(&mut self, event: &InputEvent);
}

/// Raw bytes out to a device (transport collaborator).
pub trait DeviceTx {
    fn send(&mut self, addr: u8, instance: u8, data: &[u8]) -> Result<(), DriverError>;
}

/// Source of pending feedback for a bound device, drained from `task()`.
pub trait FeedbackSource {
    fn take_feedback(&mut self, addr: u8, instance: u8) -> Option<Feedback>;
}

/// Everything a driver callback needs from the surrounding system.
pub struct DriverCtx<'a> {
    pub events: &'a mut dyn EventSink,
    pub tx: &'a mut dyn DeviceTx,
    /// Monotonic microsecond clock, sampled once per tick.
    pub now_us: u64,
}

/// A protocol driver for one family of devices.
///
/// Implementations own a fixed pool of per-connection state blocks;
/// `init` claims one, `disconnect` releases it. All progression of init
/// state machines happens in `task()`, driven by absolute deadlines on
/// `DriverCtx::now_us`.
pub trait DeviceDriver {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether this driver claims the device. Called in registry order;
    /// the first match wins.
    fn matches(&self, id: &DeviceIdentity<'_>) -> bool;

    /// Claim a connection block and queue the init sequence.
    fn init(&mut self, addr: u8, instance: u8, ctx: &mut DriverCtx<'_>) -> Result<(), DriverError>;

    /// Parse one inbound report for a bound device.
    fn process_report(&mut self, addr: u8, instance: u8, report: &[u8], ctx: &mut DriverCtx<'_>);

    /// Advance timers, drain feedback, emit keep-alives.
    fn task(&mut self, feedback: &mut dyn FeedbackSource, ctx: &mut DriverCtx<'_>);

    /// Release the connection block. Must be idempotent.
    fn disconnect(&mut self, addr: u8, instance: u8, ctx: &mut DriverCtx<'_>);

    /// Legacy pairing rule for this device family.
    fn pairing_method(&self) -> PairingMethod {
        PairingMethod::default()
    }
}

#[derive(Clone, Copy)]
struct Binding {
    addr: u8,
    instance: u8,
    driver: u8,
}

/// Ordered driver registry: vendor drivers first, the generic HID driver
/// last. Drivers themselves are owned by the embedding and passed in as a
/// slice so the registry holds no long-lived borrows.
pub struct DriverRegistry<const MAX_DEVICES: usize = 16> {
    bindings: Vec<Binding, MAX_DEVICES>,
}

impl<const MAX_DEVICES: usize> DriverRegistry<MAX_DEVICES> {
    #[must_use]
    pub const fn new() -> Self {
        Self { bindings: Vec::new() }
    }

    fn find(&self, addr: u8, instance: u8) -> Option<usize> {
        self.bindings
            .iter()
            .position(|b| b.addr == addr && b.instance == instance)
    }

    /// Whether a device is currently bound to a driver.
    #[must_use]
    pub fn is_bound(&self, addr: u8, instance: u8) -> bool {
        self.find(addr, instance).is_some()
    }

    /// Number of bound devices.
    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.bindings.len()
    }

    /// First-fit match and init. On success the device is bound to the
    /// claiming driver until `detach`.
    ///
    /// A device that fails `init` (for example the driver pool is full)
    /// stays unbound but remains matchable on the next attempt.
    pub fn attach(
        &mut self,
        drivers: &mut [&mut dyn DeviceDriver],
        id: &DeviceIdentity<'_>,
        addr: u8,
        instance: u8,
        ctx: &mut DriverCtx<'_>,
    ) -> Result<usize, DriverError> {
        if let Some(slot) = self.find(addr, instance) {
            return Ok(self.bindings[slot].driver as usize);
        }
        if self.bindings.is_full() {
            warn!("registry full, dropping device {:02x}.{}", addr, instance);
            return Err(DriverError::RegistryFull);
        }
        for (index, driver) in drivers.iter_mut().enumerate() {
            if !driver.matches(id) {
                continue;
            }
            driver.init(addr, instance, ctx)?;
            debug!("{} claimed device {:02x}.{}", driver.name(), addr, instance);
            let binding = Binding {
                addr,
                instance,
                driver: index as u8,
            };
            // Capacity checked above.
            let _ = self.bindings.push(binding);
            return Ok(index);
        }
        Err(DriverError::NoMatch)
    }

    /// Route one inbound report to the bound driver. Unbound reports are
    /// dropped silently (transient transport noise).
    pub fn process_report(
        &mut self,
        drivers: &mut [&mut dyn DeviceDriver],
        addr: u8,
        instance: u8,
        report: &[u8],
        ctx: &mut DriverCtx<'_>,
    ) {
        if let Some(slot) = self.find(addr, instance) {
            let driver = self.bindings[slot].driver as usize;
            if let Some(d) = drivers.get_mut(driver) {
                d.process_report(addr, instance, report, ctx);
            }
        }
    }

    /// Run every driver's periodic task.
    pub fn task(
        &mut self,
        drivers: &mut [&mut dyn DeviceDriver],
        feedback: &mut dyn FeedbackSource,
        ctx: &mut DriverCtx<'_>,
    ) {
        for driver in drivers.iter_mut() {
            driver.task(feedback, ctx);
        }
    }

    /// Call the bound driver's disconnect hook and release the binding.
    /// Returns false if the device was not bound (idempotent).
    pub fn detach(
        &mut self,
        drivers: &mut [&mut dyn DeviceDriver],
        addr: u8,
        instance: u8,
        ctx: &mut DriverCtx<'_>,
    ) -> bool {
        let Some(slot) = self.find(addr, instance) else {
            return false;
        };
        let driver = self.bindings[slot].driver as usize;
        if let Some(d) = drivers.get_mut(driver) {
            d.disconnect(addr, instance, ctx);
        }
        self.bindings.swap_remove(slot);
        true
    }

    /// Pairing rule for a matched (not necessarily bound) identity.
    pub fn pairing_method(
        &self,
        drivers: &[&mut dyn DeviceDriver],
        id: &DeviceIdentity<'_>,
    ) -> PairingMethod {
        drivers
            .iter()
            .find(|d| d.matches(id))
            .map_or(PairingMethod::default(), |d| d.pairing_method())
    }
}

impl<const MAX_DEVICES: usize> Default for DriverRegistry<MAX_DEVICES> {
    fn default() -> Self {
        Self::new()
    }
}
