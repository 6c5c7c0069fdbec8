//! Gateway request parsing.
//!
//! A request on the `radin/trv` topic is a JSON object
//! `{"mac": "...", "cmd": "...", "params": ...}`. The command name is
//! matched case-insensitively and `params` is checked against the shape
//! and value ranges that command expects, producing a typed
//! [`GatewayCommand`]. A request that fails here never reaches a device.
//!
//! ```json
//! {"mac": "00:1A:22:0C:3B:7F", "cmd": "status"}
//! {"mac": "00:1A:22:0C:3B:7F", "cmd": "mode", "params": {"temp": 20.0, "time": [19, 1, 2025, 20, 30]}}
//! {"mac": "00:1A:22:0C:3B:7F", "cmd": "temp", "params": "boost_on"}
//! {"mac": "00:1A:22:0C:3B:7F", "cmd": "set_timer", "params": {"day": "fri", "temps_times": [[17.0], [21.0, 6, 0], [17.0, 22, 0]]}}
//! ```

use serde::Deserialize;
use serde_json::Value;

use eqiva_core::command::check_window_open_minutes;
use eqiva_core::{
    Breakpoint, DeviceAddress, ModeCommand, Offset, Preset, Temperature, TimeOfDay,
    TimerSchedule, VacationEnd, ValidationError, Weekday,
};

/// A raw request as received over MQTT.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    /// Thermostat address.
    pub mac: String,
    /// Command name.
    pub cmd: String,
    /// Command parameters; their shape depends on `cmd`.
    #[serde(default)]
    pub params: Value,
}

impl Request {
    /// Decode a request from an MQTT payload.
    pub fn from_slice(payload: &[u8]) -> Result<Self, RequestError> {
        serde_json::from_slice(payload).map_err(|e| RequestError::Malformed(e.to_string()))
    }

    /// The target thermostat.
    pub fn address(&self) -> Result<DeviceAddress, RequestError> {
        Ok(self.mac.parse()?)
    }

    /// The typed command.
    pub fn command(&self) -> Result<GatewayCommand, RequestError> {
        GatewayCommand::parse(&self.cmd, &self.params)
    }
}

/// A validated gateway command.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCommand {
    /// Read the status.
    Status,
    /// Switch to auto, manual or a vacation hold.
    Mode(ModeCommand),
    /// Set the manual setpoint.
    Temperature(Temperature),
    /// Select a preset or toggle boost.
    Preset(Preset),
    /// Read a day's program.
    GetTimer(Weekday),
    /// Replace a day's program.
    SetTimer(Weekday, TimerSchedule),
    /// Configure comfort and eco setpoints.
    ComfortEco {
        comfort: Temperature,
        eco: Temperature,
    },
    /// Configure the open-window setpoint and duration.
    WindowOpen {
        temperature: Temperature,
        minutes: u16,
    },
    /// Configure the sensor offset.
    Offset(Offset),
    /// Lock or unlock the buttons.
    Lock(bool),
    /// Factory reset.
    Reset,
    /// Read serial number, firmware and PIN.
    Serial,
}

impl GatewayCommand {
    /// Parse `cmd` and its `params`.
    pub fn parse(cmd: &str, params: &Value) -> Result<Self, RequestError> {
        match cmd.trim().to_ascii_lowercase().as_str() {
            "status" => Ok(Self::Status),
            "mode" => parse_mode(params).map(Self::Mode),
            "temp" => parse_temp(params),
            "get_timer" => {
                let day = params.as_str().ok_or(RequestError::UnknownParameter)?;
                Ok(Self::GetTimer(day.parse()?))
            }
            "set_timer" => {
                let day = field(params, "day")?
                    .as_str()
                    .ok_or(RequestError::UnknownParameter)?;
                let schedule = parse_schedule(field(params, "temps_times")?)?;
                Ok(Self::SetTimer(day.parse()?, schedule))
            }
            "comfort_eco" => {
                let comfort = number(field(params, "comfort")?)?;
                let eco = number(field(params, "eco")?)?;
                Ok(Self::ComfortEco {
                    comfort: Temperature::preset_from_celsius("comfort", comfort)?,
                    eco: Temperature::preset_from_celsius("eco", eco)?,
                })
            }
            "window_open" => {
                let temperature = number(field(params, "temp")?)?;
                let minutes = small_int(field(params, "duration")?)?;
                Ok(Self::WindowOpen {
                    temperature: Temperature::preset_from_celsius("temperature", temperature)?,
                    minutes: check_window_open_minutes(minutes)?,
                })
            }
            "offset" => Ok(Self::Offset(Offset::from_celsius(number(params)?)?)),
            "lock" => params
                .as_bool()
                .map(Self::Lock)
                .ok_or(RequestError::UnknownParameter),
            "reset" => Ok(Self::Reset),
            "serial" => Ok(Self::Serial),
            _ => Err(RequestError::UnknownCommand),
        }
    }

    /// Command name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Mode(_) => "mode",
            Self::Temperature(_) | Self::Preset(_) => "temp",
            Self::GetTimer(_) => "get_timer",
            Self::SetTimer(..) => "set_timer",
            Self::ComfortEco { .. } => "comfort_eco",
            Self::WindowOpen { .. } => "window_open",
            Self::Offset(_) => "offset",
            Self::Lock(_) => "lock",
            Self::Reset => "reset",
            Self::Serial => "serial",
        }
    }
}

/// Why a request could not be turned into a command.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid request: {0}")]
    Malformed(String),
    #[error("Unknown command")]
    UnknownCommand,
    #[error("Unknown mode")]
    UnknownMode,
    #[error("Unknown parameter")]
    UnknownParameter,
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

fn field<'a>(params: &'a Value, name: &str) -> Result<&'a Value, RequestError> {
    params.get(name).ok_or(RequestError::UnknownParameter)
}

fn number(value: &Value) -> Result<f32, RequestError> {
    value
        .as_f64()
        .map(|n| n as f32)
        .ok_or(RequestError::UnknownParameter)
}

fn small_int<T: TryFrom<u64>>(value: &Value) -> Result<T, RequestError> {
    value
        .as_u64()
        .and_then(|n| T::try_from(n).ok())
        .ok_or(RequestError::UnknownParameter)
}

fn parse_mode(params: &Value) -> Result<ModeCommand, RequestError> {
    if let Some(name) = params.as_str() {
        return match name.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ModeCommand::Auto),
            "manual" => Ok(ModeCommand::Manual),
            _ => Err(RequestError::UnknownMode),
        };
    }

    let Some(time) = params.get("time").and_then(Value::as_array) else {
        return Err(RequestError::UnknownMode);
    };
    let [day, month, year, hour, minute] = time.as_slice() else {
        return Err(RequestError::UnknownMode);
    };
    let temperature = Temperature::from_celsius(number(field(params, "temp")?)?)?;
    let until = VacationEnd::new(
        small_int(day)?,
        small_int(month)?,
        small_int(year)?,
        small_int(hour)?,
        small_int(minute)?,
    )?;
    Ok(ModeCommand::Vacation { temperature, until })
}

fn parse_temp(params: &Value) -> Result<GatewayCommand, RequestError> {
    match params {
        Value::Number(_) => Ok(GatewayCommand::Temperature(Temperature::from_celsius(
            number(params)?,
        )?)),
        Value::String(name) => name
            .parse()
            .map(GatewayCommand::Preset)
            .map_err(|_| RequestError::UnknownMode),
        _ => Err(RequestError::UnknownParameter),
    }
}

/// `[[t], [t, h, m], ...]`: a midnight temperature followed by switch points.
fn parse_schedule(value: &Value) -> Result<TimerSchedule, RequestError> {
    let entries = value.as_array().ok_or(RequestError::UnknownParameter)?;
    let mut breakpoints = Vec::with_capacity(entries.len());

    for (i, entry) in entries.iter().enumerate() {
        let entry = entry.as_array().ok_or(RequestError::UnknownParameter)?;
        let breakpoint = match (i, entry.as_slice()) {
            (0, [temp]) => Breakpoint::initial(Temperature::from_celsius(number(temp)?)?),
            (1.., [temp, hour, minute]) => Breakpoint::at(
                TimeOfDay::new(small_int(hour)?, small_int(minute)?)?,
                Temperature::from_celsius(number(temp)?)?,
            ),
            _ => return Err(RequestError::UnknownParameter),
        };
        breakpoints.push(breakpoint);
    }

    Ok(TimerSchedule::new(breakpoints)?)
}
