//! Error types and handling for Heliotrope
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Heliotrope operations
pub type Result<T> = std::result::Result<T, HeliotropeError>;

/// Main error type for Heliotrope
#[derive(Debug, Error)]
pub enum HeliotropeError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Power meter communication errors
    #[error("Meter error: {message}")]
    Meter { message: String },

    /// Vehicle command transport errors
    #[error("Vehicle error: {message}")]
    Vehicle { message: String },

    /// MQTT event channel errors
    #[error("MQTT error: {message}")]
    Mqtt { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Network-related errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl HeliotropeError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        HeliotropeError::Config {
            message: message.into(),
        }
    }

    /// Create a new meter error
    pub fn meter<S: Into<String>>(message: S) -> Self {
        HeliotropeError::Meter {
            message: message.into(),
        }
    }

    /// Create a new vehicle error
    pub fn vehicle<S: Into<String>>(message: S) -> Self {
        HeliotropeError::Vehicle {
            message: message.into(),
        }
    }

    /// Create a new MQTT error
    pub fn mqtt<S: Into<String>>(message: S) -> Self {
        HeliotropeError::Mqtt {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        HeliotropeError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        HeliotropeError::Io {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        HeliotropeError::Network {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        HeliotropeError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        HeliotropeError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for HeliotropeError {
    fn from(err: std::io::Error) -> Self {
        HeliotropeError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for HeliotropeError {
    fn from(err: serde_yaml::Error) -> Self {
        HeliotropeError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for HeliotropeError {
    fn from(err: serde_json::Error) -> Self {
        HeliotropeError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for HeliotropeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HeliotropeError::timeout(err.to_string())
        } else {
            HeliotropeError::network(err.to_string())
        }
    }
}

impl From<chrono::ParseError> for HeliotropeError {
    fn from(err: chrono::ParseError) -> Self {
        HeliotropeError::Validation {
            field: "datetime".to_string(),
            message: err.to_string(),
        }
    }
}
