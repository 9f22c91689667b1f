//! Error types for the simulation core.
//!
//! Numeric edge cases and stale model loads are recovered where they happen
//! and never show up here. What remains is configuration input that has to be
//! rejected at the controller boundary, plus the I/O around the config file.

use std::fmt;

/// A rejected configuration value or user event.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Preset name that is neither planetary/earth nor reduced/space
    UnknownPreset(String),
    /// Release height must be finite and not below the ground
    InvalidHeight(f32),
    /// Mass must be finite and positive
    InvalidMass(f32),
    /// Any other out-of-range field
    InvalidValue { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownPreset(name) => write!(f, "unknown gravity preset '{}'", name),
            ConfigError::InvalidHeight(h) => {
                write!(f, "release height must be finite and >= 0, got {}", h)
            }
            ConfigError::InvalidMass(m) => write!(f, "mass must be finite and > 0, got {}", m),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors surfaced by the simulation core.
#[derive(Debug)]
pub enum SimError {
    /// Invalid configuration or event payload
    Config(ConfigError),
    /// Config file could not be read
    Io(std::io::Error),
    /// Config file is not valid JSON for [`crate::SimConfig`]
    Json(serde_json::Error),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Config(e) => write!(f, "Configuration error: {}", e),
            SimError::Io(e) => write!(f, "IO error: {}", e),
            SimError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::Config(e) => Some(e),
            SimError::Io(e) => Some(e),
            SimError::Json(e) => Some(e),
        }
    }
}

impl From<ConfigError> for SimError {
    fn from(e: ConfigError) -> Self {
        SimError::Config(e)
    }
}

impl From<std::io::Error> for SimError {
    fn from(e: std::io::Error) -> Self {
        SimError::Io(e)
    }
}

impl From<serde_json::Error> for SimError {
    fn from(e: serde_json::Error) -> Self {
        SimError::Json(e)
    }
}

/// Result type for simulation core operations.
pub type SimResult<T> = Result<T, SimError>;
