//! Error handling for the upload bridge
//!
//! This module defines the error types used throughout the library and
//! the rejection shape handed back to callers of the bridge.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Rejection code for malformed tag or metadata payloads
pub const CODE_DECODE: &str = "DECODE_ERROR";
/// Rejection code for unusable file locators
pub const CODE_INVALID_LOCATOR: &str = "INVALID_URL";
/// Rejection code for an engine refusing to start a transfer
pub const CODE_TRANSPORT_START: &str = "TRANSPORT_START_ERROR";
/// Rejection code for failures reported by the engine after start
pub const CODE_UPLOAD: &str = "UPLOAD_ERROR";
/// Rejection code for configuration problems
pub const CODE_CONFIG: &str = "CONFIG_ERROR";

/// Error types that can occur while bridging an upload
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A tag or metadata payload could not be decoded
    #[error("Failed to decode {payload} payload: {message}")]
    Decode { payload: String, message: String },

    /// The file locator could not be resolved
    #[error("Invalid file locator '{locator}': {message}")]
    InvalidLocator { locator: String, message: String },

    /// The engine rejected the request before any notification stream existed
    #[error("Upload could not be started: {message}")]
    TransportStart {
        message: String,
        cause: Option<String>,
    },

    /// The engine reported a terminal failure
    #[error("Upload failed: {message}")]
    TransportFailure {
        message: String,
        cause: Option<String>,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    /// Create a new decode error for the named payload
    pub fn decode(payload: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::Decode {
            payload: payload.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid locator error
    pub fn invalid_locator(locator: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::InvalidLocator {
            locator: locator.into(),
            message: message.into(),
        }
    }

    /// Create a new transport start error
    pub fn transport_start(message: impl Into<String>) -> Self {
        BridgeError::TransportStart {
            message: message.into(),
            cause: None,
        }
    }

    /// Create a new transport failure
    pub fn transport_failure(message: impl Into<String>) -> Self {
        BridgeError::TransportFailure {
            message: message.into(),
            cause: None,
        }
    }

    /// Create a new configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        BridgeError::Config {
            message: message.into(),
        }
    }

    /// Attach an underlying cause to transport errors. Other variants are returned unchanged.
    pub fn with_cause(self, cause: impl std::fmt::Display) -> Self {
        match self {
            BridgeError::TransportStart { message, .. } => BridgeError::TransportStart {
                message,
                cause: Some(cause.to_string()),
            },
            BridgeError::TransportFailure { message, .. } => BridgeError::TransportFailure {
                message,
                cause: Some(cause.to_string()),
            },
            other => other,
        }
    }

    /// The rejection code reported to the caller
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Decode { .. } | BridgeError::Json(_) => CODE_DECODE,
            BridgeError::InvalidLocator { .. } => CODE_INVALID_LOCATOR,
            BridgeError::TransportStart { .. } => CODE_TRANSPORT_START,
            BridgeError::TransportFailure { .. } => CODE_UPLOAD,
            // Only configuration loading touches the filesystem
            BridgeError::Config { .. } | BridgeError::Io(_) => CODE_CONFIG,
        }
    }

    /// The underlying cause, if one was recorded
    pub fn cause(&self) -> Option<String> {
        match self {
            BridgeError::TransportStart { cause, .. }
            | BridgeError::TransportFailure { cause, .. } => cause.clone(),
            BridgeError::Io(e) => Some(e.to_string()),
            BridgeError::Json(e) => Some(e.to_string()),
            _ => None,
        }
    }

    /// Convert into the `(code, message, cause)` rejection shape
    pub fn rejection(&self) -> Rejection {
        Rejection {
            code: self.code().to_string(),
            message: self.to_string(),
            cause: self.cause(),
        }
    }
}

impl Clone for BridgeError {
    fn clone(&self) -> Self {
        match self {
            BridgeError::Decode { payload, message } => BridgeError::Decode {
                payload: payload.clone(),
                message: message.clone(),
            },
            BridgeError::InvalidLocator { locator, message } => BridgeError::InvalidLocator {
                locator: locator.clone(),
                message: message.clone(),
            },
            BridgeError::TransportStart { message, cause } => BridgeError::TransportStart {
                message: message.clone(),
                cause: cause.clone(),
            },
            BridgeError::TransportFailure { message, cause } => BridgeError::TransportFailure {
                message: message.clone(),
                cause: cause.clone(),
            },
            BridgeError::Config { message } => BridgeError::Config {
                message: message.clone(),
            },
            BridgeError::Io(e) => BridgeError::Io(std::io::Error::new(e.kind(), e.to_string())),
            BridgeError::Json(e) => {
                BridgeError::Json(<serde_json::Error as serde::de::Error>::custom(e))
            }
        }
    }
}

/// The structured rejection handed to the caller when an upload call fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}
