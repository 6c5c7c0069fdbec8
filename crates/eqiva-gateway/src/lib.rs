//! MQTT gateway for Eqiva eQ-3 radiator thermostats.
//!
//! This crate bridges an MQTT broker and nearby thermostats:
//! - Listens for scan triggers and thermostat requests on `{device_name}/radin/...`
//! - Connects to the addressed thermostat over BLE, runs one command, disconnects
//! - Publishes decoded results (or `{"error": "..."}`) on `{device_name}/radout/...`
//!
//! # Requests
//!
//! ```json
//! {"mac": "00:1A:22:0C:3B:7F", "cmd": "status"}
//! {"mac": "00:1A:22:0C:3B:7F", "cmd": "temp", "params": 21.5}
//! {"mac": "00:1A:22:0C:3B:7F", "cmd": "lock", "params": true}
//! ```
//!
//! Commands: `status`, `mode`, `temp`, `get_timer`, `set_timer`,
//! `comfort_eco`, `window_open`, `offset`, `lock`, `reset`, `serial`.
//!
//! # Configuration
//!
//! The gateway reads configuration from `~/.config/eqiva/gateway.toml`:
//!
//! ```toml
//! [mqtt]
//! broker = "mqtts://broker.example.com:8883"
//! client_id = "eqiva-gateway"
//! username = "heating"
//! password = "secret"
//! device_name = "flat"
//!
//! [thermostat]
//! utc_offset_hours = 1
//! connect_attempts = 3
//! scan_seconds = 10
//! ```

pub mod config;
pub mod handler;
pub mod mqtt;
pub mod request;

pub use config::{Config, ConfigError, MqttConfig, ThermostatConfig, ValidationError};
pub use handler::{Gateway, error_response};
pub use mqtt::{Job, MqttError, Topics};
pub use request::{GatewayCommand, Request, RequestError};
