//! Application error types with rich context

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Session Lifecycle Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to connect to {device}: {reason}")]
    ConnectionFailed { device: String, reason: String },

    #[error("Device was detached")]
    DeviceDetached,

    #[error("Failed to release {resource}: {reason}")]
    CleanupFailure { resource: String, reason: String },

    #[error("Device selection was cancelled")]
    SelectionCancelled,

    #[error("No authorized device available")]
    NoDevice,

    // ─────────────────────────────────────────────────────────────
    // Transport Errors
    // ─────────────────────────────────────────────────────────────
    #[error("USB error: {message}")]
    Usb { message: String },

    #[error("ADB error: {message}")]
    Adb { message: String },

    #[error("Device {serial} has not authorized this host")]
    Unauthorized { serial: String },

    #[error("Device protocol error: {message}")]
    Protocol { message: String },

    #[error("Timed out after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────
    // Channel/Communication Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Controller is no longer running")]
    ChannelClosed,
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn connection_failed(device: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConnectionFailed {
            device: device.into(),
            reason: reason.to_string(),
        }
    }

    pub fn cleanup_failure(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::CleanupFailure {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    pub fn usb(message: impl Into<String>) -> Self {
        Self::Usb {
            message: message.into(),
        }
    }

    pub fn adb(message: impl Into<String>) -> Self {
        Self::Adb {
            message: message.into(),
        }
    }

    pub fn unauthorized(serial: impl Into<String>) -> Self {
        Self::Unauthorized {
            serial: serial.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Check if the error is an expected user-facing outcome rather than a fault
    pub fn is_benign(&self) -> bool {
        matches!(self, Error::SelectionCancelled | Error::DeviceDetached)
    }

    /// Classification used in published snapshots
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            Error::DeviceDetached => ErrorKind::DeviceDetached,
            Error::CleanupFailure { .. } => ErrorKind::CleanupFailure,
            Error::SelectionCancelled => ErrorKind::SelectionCancelled,
            _ => ErrorKind::Other,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Published Error Payload
// ─────────────────────────────────────────────────────────────────

/// Error category exposed to UI collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConnectionFailed,
    DeviceDetached,
    CleanupFailure,
    SelectionCancelled,
    Other,
}

/// Cloneable, serializable error summary carried in snapshots and connect outcomes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// User declined a prompt or unplugged the device; nothing to alarm about
    pub fn is_benign(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::SelectionCancelled | ErrorKind::DeviceDetached
        )
    }
}

impl From<&Error> for ErrorInfo {
    fn from(err: &Error) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<Error> for ErrorInfo {
    fn from(err: Error) -> Self {
        Self::from(&err)
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
