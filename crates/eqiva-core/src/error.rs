//! Error types for eqiva-core.
//!
//! This module defines all error types that can occur when talking to an
//! Eqiva thermostat over Bluetooth Low Energy.
//!
//! # Error Recovery Strategies
//!
//! | Error Type | Strategy | Rationale |
//! |------------|----------|-----------|
//! | [`Error::Validation`] | Do not retry | Nothing was sent; fix the argument |
//! | [`Error::ConnectionFailed`] | Retry later | All attempts of the policy are used up |
//! | [`Error::ResponseTimeout`] | Reconnect, then retry | The device may have dropped the command |
//! | [`Error::Decode`] | Do not retry | The device answered with an unexpected payload |
//! | [`Error::NotConnected`] | Reconnect | Connection was lost or never established |
//! | [`Error::Bluetooth`] | Retry, then reconnect | May be transient |
//! | [`Error::DeviceNotFound`] | Do not retry | Device not in range or wrong address |
//! | [`Error::CharacteristicNotFound`] | Do not retry | Not an eQ-3 thermostat |
//! | [`Error::InvalidConfig`] | Do not retry | Fix configuration and restart |
//!
//! A session never retries a command on its own: a timed-out or undecodable
//! response is returned to the caller as is, and the connection state is
//! left unchanged.

use std::time::Duration;

use thiserror::Error;

use eqiva_types::{DeviceAddress, ParseError, ValidationError};

/// Errors that can occur when communicating with a thermostat.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An argument cannot be expressed on the wire. Nothing was written.
    #[error("Invalid argument: {0}")]
    Validation(#[from] ValidationError),

    /// The device answered, but the payload could not be decoded.
    #[error("Failed to decode {operation} response: {source}")]
    Decode {
        /// The operation whose response was rejected.
        operation: &'static str,
        /// The underlying decoding failure.
        #[source]
        source: ParseError,
    },

    /// Every connection attempt failed.
    #[error("Failed to connect to {address} after {attempts} attempt(s)")]
    ConnectionFailed {
        /// The device that could not be reached.
        address: DeviceAddress,
        /// Number of attempts made.
        attempts: u32,
    },

    /// No notification arrived within the settle window.
    #[error("No response to '{operation}' within {duration:?}")]
    ResponseTimeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The settle window that elapsed.
        duration: Duration,
    },

    /// Operation attempted while not connected to a device.
    #[error("Not connected to device")]
    NotConnected,

    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Device not found on the adapter.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Required BLE characteristic not found on device.
    #[error("Characteristic not found: {uuid} (searched in {service_count} services)")]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: String,
        /// Number of services that were searched.
        service_count: usize,
    },

    /// Transport-level failure not covered by a more specific variant.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a decode error for `operation`.
    pub fn decode(operation: &'static str, source: ParseError) -> Self {
        Self::Decode { operation, source }
    }

    /// Create a response timeout error.
    pub fn response_timeout(operation: &'static str, duration: Duration) -> Self {
        Self::ResponseTimeout {
            operation,
            duration,
        }
    }

    /// Create a device not found error for a specific identifier.
    pub fn device_not_found(identifier: impl Into<String>) -> Self {
        Self::DeviceNotFound(identifier.into())
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: impl Into<String>, service_count: usize) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.into(),
            service_count,
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether reconnecting and issuing the command again may succeed.
    ///
    /// Validation and decode failures are deterministic and never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ConnectionFailed { .. }
                | Error::ResponseTimeout { .. }
                | Error::NotConnected
                | Error::Bluetooth(_)
                | Error::Transport(_)
        )
    }
}

/// Result type alias using eqiva-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
