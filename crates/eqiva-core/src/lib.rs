//! BLE driver for Eqiva eQ-3 radiator thermostats.
//!
//! This crate speaks the thermostat's GATT protocol: one write
//! characteristic carries command frames, one notify characteristic carries
//! every answer. It builds on the wire codec and parsers from `eqiva-types`
//! and adds the connection state machine, request/response correlation and
//! discovery.
//!
//! # Features
//!
//! - **Device discovery**: Scan for nearby thermostats by vendor prefix
//! - **Status**: Target temperature, valve opening, mode flags, vacation and preset config
//! - **Control**: Mode, setpoint, presets, boost, child lock
//! - **Timers**: Read and write the weekly program one day at a time
//! - **Configuration**: Comfort/eco, open-window detection, sensor offset
//! - **Device info**: Serial number, firmware version, pairing PIN, factory reset
//!
//! # Architecture
//!
//! A [`Thermostat`] drives any [`Transport`]. [`BleTransport`] is the
//! btleplug implementation; [`MockTransport`] is a scriptable stand-in for
//! tests. Transports report link changes and notifications through a single
//! [`EventHandler`] callback.
//!
//! # Quick Start
//!
//! ```no_run
//! use eqiva_core::{BleTransport, ScanOptions, SessionConfig, Thermostat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let thermostat = Thermostat::new(BleTransport::new().await?, SessionConfig::default());
//!
//!     // Scan for devices
//!     let devices = thermostat.scan(ScanOptions::default()).await?;
//!     println!("Found {} thermostats", devices.len());
//!
//!     // Connect and read the current state
//!     thermostat.connect(devices[0].address).await?;
//!     let status = thermostat.read_status().await?;
//!     println!("Target: {}, valve {}%", status.temperature, status.valve);
//!
//!     thermostat.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod ble;
pub mod config;
pub mod connection;
pub mod correlator;
pub mod error;
pub mod guard;
pub mod mock;
pub mod scan;
pub mod session;
pub mod transport;
pub mod util;

// Re-export types submodules for convenient access
pub use eqiva_types::command;
pub use eqiva_types::parse;
pub use eqiva_types::types;

// Core exports
pub use ble::{BleConfig, BleTransport, get_adapter};
pub use config::SessionConfig;
pub use connection::ConnectionState;
pub use error::{Error, Result};
pub use scan::{DiscoveredDevice, ScanOptions};
pub use session::Thermostat;
pub use transport::{EventHandler, Transport, TransportEvent};

// Testing support
pub use guard::ScanGuard;
pub use mock::MockTransport;
pub use util::format_hex;

// Re-export from eqiva-types
pub use eqiva_types::uuid as uuids;
pub use eqiva_types::{
    Breakpoint, DeviceAddress, ExtendedConfig, Mode, ModeCommand, ModeFlags, Offset, ParseError,
    Preset, SerialInfo, StatusSnapshot, Temperature, TimeOfDay, TimerSchedule, VacationEnd,
    ValidationError, Weekday,
};
