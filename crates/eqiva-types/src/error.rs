//! Error types for encoding and decoding in eqiva-types.

use thiserror::Error;

/// Errors that can occur when decoding thermostat notifications.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in eqiva-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The payload is shorter than the layout requires.
    #[error("Insufficient bytes: expected at least {expected}, got {actual}")]
    InsufficientBytes {
        /// Minimum number of bytes required.
        expected: usize,
        /// Number of bytes received.
        actual: usize,
    },

    /// The payload length does not match a fixed-size response.
    #[error("Unexpected length: expected exactly {expected} bytes, got {actual}")]
    UnexpectedLength {
        /// Exact number of bytes required.
        expected: usize,
        /// Number of bytes received.
        actual: usize,
    },

    /// A field held a value outside its legal encoding.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// A caller-supplied value that the protocol cannot express.
///
/// Validation happens before any byte of a command is produced, so a
/// `ValidationError` always means nothing was sent to the device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// The offending parameter (e.g. `temperature`, `offset`).
    pub field: &'static str,
    /// Description of the violated constraint.
    pub message: String,
}

impl ValidationError {
    /// Create a validation error for `field`.
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Result type alias using eqiva-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Result type alias for value validation.
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;
