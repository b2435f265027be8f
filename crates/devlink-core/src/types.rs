//! Domain types shared by the device layer and the controller

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ErrorInfo;

// ─────────────────────────────────────────────────────────────────
// Device Identity
// ─────────────────────────────────────────────────────────────────

/// A physical device as seen by the host platform.
///
/// Two identifiers are equal when they name the same serial number; the USB
/// ids and product string are descriptive only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceId {
    /// USB serial number, also used as the ADB serial
    pub serial: String,

    /// USB vendor id
    #[serde(default)]
    pub vendor_id: u16,

    /// USB product id
    #[serde(default)]
    pub product_id: u16,

    /// Product string reported by the device, if any
    #[serde(default)]
    pub name: Option<String>,
}

impl DeviceId {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            vendor_id: 0,
            product_id: 0,
            name: None,
        }
    }

    pub fn with_usb_ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.vendor_id = vendor_id;
        self.product_id = product_id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Get a display string for the device
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({})", name, self.serial),
            None => self.serial.clone(),
        }
    }
}

impl PartialEq for DeviceId {
    fn eq(&self, other: &Self) -> bool {
        self.serial == other.serial
    }
}

impl Eq for DeviceId {}

impl Hash for DeviceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.serial.hash(state);
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serial)
    }
}

// ─────────────────────────────────────────────────────────────────
// Session Status
// ─────────────────────────────────────────────────────────────────

/// Lifecycle status of the single device session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Authenticating,
    Probing,
    Ready,
    Failed,
}

impl SessionStatus {
    /// Position along the forward path; `Failed` sits outside it
    fn rank(self) -> Option<u8> {
        match self {
            SessionStatus::Disconnected => Some(0),
            SessionStatus::Connecting => Some(1),
            SessionStatus::Authenticating => Some(2),
            SessionStatus::Probing => Some(3),
            SessionStatus::Ready => Some(4),
            SessionStatus::Failed => None,
        }
    }

    /// Whether moving from `self` to `next` respects the lifecycle ordering.
    ///
    /// Forward moves advance exactly one step. Any status may reset to
    /// `Disconnected`, any status but `Failed` may jump to `Failed`, and a
    /// failed session may start over with `Connecting`.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (_, Disconnected) => true,
            (Failed, Failed) => false,
            (_, Failed) => true,
            (Failed, Connecting) => true,
            (from, to) => match (from.rank(), to.rank()) {
                (Some(a), Some(b)) => b == a + 1,
                _ => false,
            },
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Authenticating => "authenticating",
            SessionStatus::Probing => "probing",
            SessionStatus::Ready => "ready",
            SessionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ─────────────────────────────────────────────────────────────────
// Product Metadata
// ─────────────────────────────────────────────────────────────────

/// Product metadata fetched once the device is responsive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    /// Device codename (`ro.product.device`)
    pub device: Option<String>,
    /// Marketing model name (`ro.product.model`)
    pub model: Option<String>,
    /// Manufacturer (`ro.product.manufacturer`)
    pub manufacturer: Option<String>,
    /// OS release (`ro.build.version.release`)
    pub release: Option<String>,
}

impl ProductInfo {
    /// Human-friendly name, preferring the model over the codename
    pub fn nice_name(&self) -> Option<String> {
        match (&self.manufacturer, &self.model, &self.device) {
            (Some(vendor), Some(model), _) => Some(format!("{} {}", vendor, model)),
            (None, Some(model), _) => Some(model.clone()),
            (_, None, Some(device)) => Some(device.clone()),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Published Snapshot
// ─────────────────────────────────────────────────────────────────

/// Read-only view of the session published on every transition and probe tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub device: Option<DeviceId>,
    pub product_info: Option<ProductInfo>,
    pub last_reading: Option<f64>,
    pub reverse_socket_opened: bool,
    /// Presence of each required binary on the device, once checked
    pub binaries: BTreeMap<String, bool>,
    pub error: Option<ErrorInfo>,
    pub updated_at: DateTime<Local>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            status: SessionStatus::Disconnected,
            device: None,
            product_info: None,
            last_reading: None,
            reverse_socket_opened: false,
            binaries: BTreeMap::new(),
            error: None,
            updated_at: Local::now(),
        }
    }
}

impl SessionSnapshot {
    pub fn is_ready(&self) -> bool {
        self.status == SessionStatus::Ready
    }

    /// Whether every required binary was found on the device
    pub fn has_all_binaries(&self) -> bool {
        !self.binaries.is_empty() && self.binaries.values().all(|present| *present)
    }
}
