// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the depth probe application

use crate::backends::camera::BackendError;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Depth capture errors (device missing, stream fault)
    Capture(BackendError),
    /// Configuration errors (unreadable or invalid config)
    Config(String),
    /// Terminal / display surface errors
    Display(String),
    /// Storage/filesystem errors (snapshots)
    Storage(String),
    /// Generic error with message
    Other(String),
}

impl AppError {
    /// Whether this error happened before any capture was attempted
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            AppError::Capture(
                BackendError::NotAvailable(_)
                    | BackendError::DeviceNotFound(_)
                    | BackendError::FormatNotSupported(_)
            ) | AppError::Config(_)
        )
    }

    /// Hint printed once at startup for precondition failures
    ///
    /// Faults during streaming get no hint.
    pub fn hint(&self) -> Option<&'static str> {
        if !self.is_precondition() {
            return None;
        }
        match self {
            AppError::Capture(BackendError::NotAvailable(_))
            | AppError::Capture(BackendError::DeviceNotFound(_)) => Some(
                "Connect a depth camera exposing a Z16/Y16 V4L2 node, pass --device /dev/videoN, \
                 or run with --synthetic",
            ),
            AppError::Capture(BackendError::FormatNotSupported(_)) => {
                Some("Run `depth-probe list` to see the depth modes your device supports")
            }
            AppError::Config(_) => Some("Fix or remove the config file, or pass --config <path>"),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Display(msg) => write!(f, "Display error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Capture(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

// Terminal setup and drawing go through io::Error, so that is the default bucket
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Display(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<ctrlc::Error> for AppError {
    fn from(err: ctrlc::Error) -> Self {
        AppError::Other(format!("Failed to install Ctrl+C handler: {}", err))
    }
}
