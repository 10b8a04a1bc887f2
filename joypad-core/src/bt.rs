//! Bluetooth connection snapshots.
//!
//! The connection table itself is owned by the radio task; the data plane
//! only ever sees copies taken inside a radio-task callback.

use heapless::String;

pub mod flags {
    pub const CONNECTED: u8 = 1 << 0;
    pub const HID_READY: u8 = 1 << 1;
    pub const IS_BLE: u8 = 1 << 2;
}

/// Snapshot of one radio connection.
#[derive(Clone, Debug, Default)]
pub struct Connection {
    pub bd_addr: [u8; 6],
    pub name: String<32>,
    pub cod: [u8; 3],
    pub vid: u16,
    pub pid: u16,
    pub flags: u8,
}

impl Connection {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.flags & flags::CONNECTED != 0
    }

    #[must_use]
    pub fn is_hid_ready(&self) -> bool {
        self.flags & flags::HID_READY != 0
    }

    #[must_use]
    pub fn is_ble(&self) -> bool {
        self.flags & flags::IS_BLE != 0
    }
}

/// Radio collaborator surface used by the control plane.
pub trait BtOps {
    /// Copy up to `out.len()` connection snapshots; returns the count.
    fn connections(&mut self, out: &mut [Connection]) -> usize;

    /// Drop all stored link keys / bonds.
    fn clear_bonds(&mut self);
}
