//! Gateway configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::UtcOffset;

use eqiva_core::SessionConfig;

/// Gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// MQTT broker settings.
    pub mqtt: MqttConfig,
    /// Thermostat session settings.
    pub thermostat: ThermostatConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        // Create parent directories if needed
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return every problem found.
    ///
    /// # Example
    ///
    /// ```
    /// use eqiva_gateway::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = self.mqtt.validate();
        errors.extend(self.thermostat.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// MQTT broker configuration.
///
/// ```toml
/// [mqtt]
/// broker = "mqtts://broker.example.com:8883"
/// client_id = "eqiva-gateway"
/// username = "user"
/// password = "secret"
/// device_name = "livingroom"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker URL, `mqtt://host[:port]` or `mqtts://host[:port]` for TLS.
    pub broker: String,
    /// MQTT client identifier.
    pub client_id: String,
    /// Broker username.
    pub username: Option<String>,
    /// Broker password.
    pub password: Option<String>,
    /// Keep-alive interval in seconds.
    pub keep_alive: u64,
    /// Root of the gateway's topics: `{device_name}/radin/...`, `{device_name}/radout/...`.
    pub device_name: String,
}

/// Keep-alive used when none is configured (two hours).
pub const DEFAULT_KEEP_ALIVE: u64 = 7200;

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: "mqtt://localhost:1883".to_string(),
            client_id: "eqiva-gateway".to_string(),
            username: None,
            password: None,
            keep_alive: DEFAULT_KEEP_ALIVE,
            device_name: "eqiva".to_string(),
        }
    }
}

impl MqttConfig {
    /// Validate MQTT configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let Err(message) = parse_broker_url(&self.broker) {
            errors.push(ValidationError::new(
                "mqtt.broker",
                format!("invalid broker URL '{}': {}", self.broker, message),
            ));
        }
        if self.client_id.is_empty() {
            errors.push(ValidationError::new(
                "mqtt.client_id",
                "client id cannot be empty",
            ));
        }
        if self.username.is_some() != self.password.is_some() {
            errors.push(ValidationError::new(
                "mqtt.username",
                "username and password must be set together",
            ));
        }
        if self.keep_alive == 0 {
            errors.push(ValidationError::new(
                "mqtt.keep_alive",
                "keep-alive cannot be 0",
            ));
        }
        if self.device_name.is_empty() {
            errors.push(ValidationError::new(
                "mqtt.device_name",
                "device name cannot be empty",
            ));
        } else if self.device_name.contains(['#', '+', '/']) {
            errors.push(ValidationError::new(
                "mqtt.device_name",
                format!(
                    "device name '{}' cannot contain '#', '+' or '/'",
                    self.device_name
                ),
            ));
        }

        errors
    }
}

/// Thermostat session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermostatConfig {
    /// Offset of the thermostats' local time from UTC, in hours.
    pub utc_offset_hours: i8,
    /// Connection attempts per request.
    pub connect_attempts: u32,
    /// Scan duration in seconds.
    pub scan_seconds: u64,
    /// How long to wait for a command's answer, in milliseconds.
    pub response_settle_ms: u64,
}

/// Maximum scan duration in seconds.
pub const MAX_SCAN_SECONDS: u64 = 120;

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: 1,
            connect_attempts: 3,
            scan_seconds: 10,
            response_settle_ms: 1000,
        }
    }
}

impl ThermostatConfig {
    /// Validate thermostat configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if UtcOffset::from_hms(self.utc_offset_hours, 0, 0).is_err() {
            errors.push(ValidationError::new(
                "thermostat.utc_offset_hours",
                format!("{} is not a valid UTC offset", self.utc_offset_hours),
            ));
        }
        if self.connect_attempts == 0 {
            errors.push(ValidationError::new(
                "thermostat.connect_attempts",
                "at least one connection attempt is required",
            ));
        }
        if self.scan_seconds == 0 || self.scan_seconds > MAX_SCAN_SECONDS {
            errors.push(ValidationError::new(
                "thermostat.scan_seconds",
                format!(
                    "scan duration {} is outside 1..{} seconds",
                    self.scan_seconds, MAX_SCAN_SECONDS
                ),
            ));
        }
        if self.response_settle_ms == 0 {
            errors.push(ValidationError::new(
                "thermostat.response_settle_ms",
                "response settle time cannot be 0",
            ));
        }

        errors
    }

    /// Scan duration.
    pub fn scan_duration(&self) -> Duration {
        Duration::from_secs(self.scan_seconds)
    }

    /// Build the session timing policy.
    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let offset = UtcOffset::from_hms(self.utc_offset_hours, 0, 0).map_err(|_| {
            ConfigError::Validation(vec![ValidationError::new(
                "thermostat.utc_offset_hours",
                format!("{} is not a valid UTC offset", self.utc_offset_hours),
            )])
        })?;
        Ok(SessionConfig::default()
            .utc_offset(offset)
            .max_connect_attempts(self.connect_attempts)
            .response_settle(Duration::from_millis(self.response_settle_ms)))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `mqtt.broker`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse an MQTT broker URL into (host, port, use_tls).
pub fn parse_broker_url(url: &str) -> Result<(String, u16, bool), String> {
    let (use_tls, rest) = if let Some(stripped) = url.strip_prefix("mqtt://") {
        (false, stripped)
    } else if let Some(stripped) = url.strip_prefix("mqtts://") {
        (true, stripped)
    } else {
        return Err("URL must start with mqtt:// or mqtts://".to_string());
    };

    let default_port = if use_tls { 8883 } else { 1883 };
    let (host, port) = if let Some((h, p)) = rest.rsplit_once(':') {
        let port = p
            .parse::<u16>()
            .map_err(|_| format!("invalid port '{}'", p))?;
        (h.to_string(), port)
    } else {
        (rest.to_string(), default_port)
    };

    if host.is_empty() {
        return Err("host cannot be empty".to_string());
    }

    Ok((host, port, use_tls))
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eqiva")
        .join("gateway.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.mqtt.broker, "mqtt://localhost:1883");
        assert_eq!(config.mqtt.keep_alive, 7200);
        assert_eq!(config.mqtt.device_name, "eqiva");
        assert_eq!(config.thermostat.connect_attempts, 3);
        assert_eq!(config.thermostat.utc_offset_hours, 1);
    }

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_full_toml() {
        let toml = r#"
            [mqtt]
            broker = "mqtts://broker.example.com"
            client_id = "esp-radiators"
            username = "heating"
            password = "secret"
            device_name = "flat"

            [thermostat]
            utc_offset_hours = 2
            connect_attempts = 5
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.mqtt.client_id, "esp-radiators");
        assert_eq!(config.mqtt.username.as_deref(), Some("heating"));
        assert_eq!(config.mqtt.device_name, "flat");
        assert_eq!(config.mqtt.keep_alive, 7200);
        assert_eq!(config.thermostat.utc_offset_hours, 2);
        assert_eq!(config.thermostat.connect_attempts, 5);
        assert_eq!(config.thermostat.scan_seconds, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_config_from_thermostat_section() {
        let thermostat = ThermostatConfig {
            utc_offset_hours: -5,
            connect_attempts: 2,
            scan_seconds: 5,
            response_settle_ms: 1500,
        };
        let session = thermostat.session_config().unwrap();
        assert_eq!(session.utc_offset.whole_hours(), -5);
        assert_eq!(session.max_connect_attempts, 2);
        assert_eq!(session.response_settle, Duration::from_millis(1500));
        assert_eq!(thermostat.scan_duration(), Duration::from_secs(5));
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("gateway.toml");

        let mut config = Config::default();
        config.mqtt.device_name = "bedroom".to_string();
        config.thermostat.scan_seconds = 20;

        config.save(&config_path).unwrap();
        let loaded = Config::load(&config_path).unwrap();
        loaded.validate().unwrap();

        assert_eq!(loaded.mqtt.device_name, "bedroom");
        assert_eq!(loaded.thermostat.scan_seconds, 20);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/gateway.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_default_config_path() {
        assert!(default_config_path().ends_with("eqiva/gateway.toml"));
    }

    #[test]
    fn test_mqtt_validation_collects_all_errors() {
        let config = MqttConfig {
            broker: "http://localhost".to_string(),
            client_id: String::new(),
            username: Some("user".to_string()),
            password: None,
            keep_alive: 0,
            device_name: "a/b".to_string(),
        };
        let errors = config.validate();
        assert_eq!(errors.len(), 5);
        assert!(errors.iter().any(|e| e.field == "mqtt.broker"));
        assert!(errors.iter().any(|e| e.message.contains("together")));
        assert!(errors.iter().any(|e| e.message.contains("cannot contain")));
    }

    #[test]
    fn test_thermostat_validation() {
        let config = ThermostatConfig {
            utc_offset_hours: 30,
            connect_attempts: 0,
            scan_seconds: 0,
            response_settle_ms: 0,
        };
        let errors = config.validate();
        assert_eq!(errors.len(), 4);
        assert!(config.session_config().is_err());
    }

    #[test]
    fn test_config_validation_error_display() {
        let mut config = Config::default();
        config.mqtt.broker = "mqtt://:1883".to_string();
        config.thermostat.connect_attempts = 0;

        let display = config.validate().unwrap_err().to_string();
        assert!(display.contains("mqtt.broker"));
        assert!(display.contains("thermostat.connect_attempts"));
    }

    #[test]
    fn test_parse_broker_url() {
        assert_eq!(
            parse_broker_url("mqtt://localhost:1883").unwrap(),
            ("localhost".to_string(), 1883, false)
        );
        assert_eq!(
            parse_broker_url("mqtts://broker.example.com").unwrap(),
            ("broker.example.com".to_string(), 8883, true)
        );
        assert_eq!(
            parse_broker_url("mqtt://localhost").unwrap(),
            ("localhost".to_string(), 1883, false)
        );
        assert!(parse_broker_url("http://localhost:1883").is_err());
        assert!(parse_broker_url("localhost:1883").is_err());
        assert!(parse_broker_url("mqtt://:1883").is_err());
        assert!(parse_broker_url("mqtt://host:port").is_err());
    }
}
