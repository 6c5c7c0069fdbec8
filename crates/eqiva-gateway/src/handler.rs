//! Request dispatch onto a thermostat session.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use eqiva_core::{ScanOptions, Thermostat, Transport};

use crate::request::{GatewayCommand, Request};

/// Executes gateway requests against one BLE session.
///
/// Each thermostat request opens a connection, runs one command and
/// disconnects again, so a single session serves any number of devices.
pub struct Gateway<T: Transport + 'static> {
    thermostat: Thermostat<T>,
    scan_duration: Duration,
}

impl<T: Transport + 'static> Gateway<T> {
    /// Create a gateway over `thermostat`.
    pub fn new(thermostat: Thermostat<T>, scan_duration: Duration) -> Self {
        Self {
            thermostat,
            scan_duration,
        }
    }

    /// The underlying session.
    pub fn thermostat(&self) -> &Thermostat<T> {
        &self.thermostat
    }

    /// Scan and report `{"devices": [...]}`.
    pub async fn scan(&self) -> Value {
        let options = ScanOptions::new().duration(self.scan_duration);
        match self.thermostat.scan(options).await {
            Ok(devices) => {
                let addresses: Vec<String> =
                    devices.iter().map(|d| d.address.to_string()).collect();
                json!({ "devices": addresses })
            }
            Err(e) => {
                warn!("Scan failed: {}", e);
                error_response(e)
            }
        }
    }

    /// Handle one thermostat request payload.
    ///
    /// Always produces a JSON document: the command's result, or
    /// `{"error": "..."}`.
    pub async fn handle_request(&self, payload: &[u8]) -> Value {
        let request = match Request::from_slice(payload) {
            Ok(request) => request,
            Err(e) => return error_response(e),
        };
        let (address, command) = match (request.address(), request.command()) {
            (Ok(address), Ok(command)) => (address, command),
            (Err(e), _) | (_, Err(e)) => {
                warn!(cmd = %request.cmd, "Rejected request: {}", e);
                return error_response(e);
            }
        };

        info!(%address, command = command.name(), "Handling thermostat request");
        if let Err(e) = self.thermostat.connect(address).await {
            warn!(%address, "Connection failed: {}", e);
            return error_response(e);
        }

        let response = match self.execute(&command).await {
            Ok(value) => value,
            Err(e) => {
                warn!(%address, command = command.name(), "Command failed: {}", e);
                error_response(e)
            }
        };

        if let Err(e) = self.thermostat.disconnect().await {
            warn!(%address, "Disconnect failed: {}", e);
        }
        response
    }

    /// Run `command` on the connected thermostat.
    pub async fn execute(&self, command: &GatewayCommand) -> eqiva_core::Result<Value> {
        let thermostat = &self.thermostat;
        let value = match command {
            GatewayCommand::Status => to_json(thermostat.read_status().await?),
            GatewayCommand::Mode(mode) => to_json(thermostat.set_mode(*mode).await?),
            GatewayCommand::Temperature(setpoint) => {
                to_json(thermostat.set_temperature(setpoint.celsius()).await?)
            }
            GatewayCommand::Preset(preset) => to_json(thermostat.set_preset(*preset).await?),
            GatewayCommand::GetTimer(day) => to_json(thermostat.read_timer(*day).await?),
            GatewayCommand::SetTimer(day, schedule) => {
                to_json(thermostat.write_timer(*day, schedule).await?)
            }
            GatewayCommand::ComfortEco { comfort, eco } => to_json(
                thermostat
                    .set_comfort_eco(comfort.celsius(), eco.celsius())
                    .await?,
            ),
            GatewayCommand::WindowOpen {
                temperature,
                minutes,
            } => to_json(
                thermostat
                    .set_window_open(temperature.celsius(), *minutes)
                    .await?,
            ),
            GatewayCommand::Offset(offset) => {
                to_json(thermostat.set_offset(offset.celsius()).await?)
            }
            GatewayCommand::Lock(locked) => to_json(thermostat.set_lock(*locked).await?),
            GatewayCommand::Reset => to_json(thermostat.factory_reset().await?),
            GatewayCommand::Serial => to_json(thermostat.read_serial().await?),
        };
        Ok(value)
    }
}

/// `{"error": "<reason>"}`.
pub fn error_response(error: impl std::fmt::Display) -> Value {
    json!({ "error": error.to_string() })
}

fn to_json(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or_else(error_response)
}
