//! Bluetooth identifiers for Eqiva (eQ-3) radiator thermostats.
//!
//! The thermostat exposes a single vendor service with two characteristics:
//! one that accepts command frames and one that pushes notifications back.
//! Hosts that address characteristics by ATT handle can use the handle
//! constants; hosts that address them by UUID (btleplug) use the UUIDs.

use uuid::{Uuid, uuid};

// --- eQ-3 Service UUID ---

/// eQ-3 vendor service carrying the command and notification characteristics.
pub const EQ3_SERVICE: Uuid = uuid!("3e135142-654f-9090-134a-a6ff5bb77046");

// --- eQ-3 Characteristic UUIDs ---

/// Command characteristic. Every command frame is written here.
pub const COMMAND: Uuid = uuid!("3fa4585a-ce4a-3bad-db4b-b8df8179ea09");

/// Notification characteristic. Responses to commands arrive here.
pub const NOTIFY: Uuid = uuid!("d0e8434d-cd29-0996-af41-6c90f4e0eb2a");

// --- ATT handles ---

/// ATT handle of the command characteristic value.
pub const HANDLE_WRITE: u16 = 0x0411;

/// ATT handle of the notification characteristic value.
pub const HANDLE_NOTIFY: u16 = 0x0421;

// --- Advertisement ---

/// Leading address bytes assigned to eQ-3 AG.
pub const VENDOR_PREFIX: [u8; 3] = [0x00, 0x1A, 0x22];
