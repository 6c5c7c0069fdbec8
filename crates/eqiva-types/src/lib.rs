//! Platform-agnostic types and wire codec for Eqiva (eQ-3) Bluetooth
//! radiator thermostats.
//!
//! This crate has no Bluetooth dependency. It turns typed requests into
//! command frames and notification payloads back into typed values, so the
//! same code serves the native driver in `eqiva-core` and any other host.
//!
//! # Modules
//!
//! - [`types`]: validated value types (temperatures, offsets, schedules,
//!   status snapshots)
//! - [`command`]: frame encoders, one per device operation
//! - [`parse`]: notification decoders
//! - [`uuid`]: service/characteristic UUIDs and ATT handles
//! - [`error`]: decoding and validation errors
//!
//! # Example
//!
//! ```
//! use eqiva_types::{command, parse};
//!
//! let frame = command::encode_manual_temp(21.5).unwrap();
//! assert_eq!(frame.as_bytes(), &[0x41, 43]);
//!
//! let status = parse::parse_status(&[0x02, 0x01, 0x09, 0x00, 0x04, 43]).unwrap();
//! assert_eq!(status.temperature.celsius(), 21.5);
//! ```

pub mod command;
pub mod error;
pub mod parse;
pub mod types;
pub mod uuid;

pub use command::Command;
pub use error::{ParseError, ParseResult, ValidationError, ValidationResult};
pub use types::{
    Breakpoint, DeviceAddress, ExtendedConfig, Mode, ModeCommand, ModeFlags, Offset, Preset,
    SerialInfo, StatusSnapshot, Temperature, TimeOfDay, TimerSchedule, VacationEnd, Weekday,
};
pub use uuid as uuids;
