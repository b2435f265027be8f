//! Configuration types for devlink

use std::path::PathBuf;
use std::time::Duration;

use devlink_device::{AdbServer, CredentialStore};
use serde::{Deserialize, Serialize};

/// Shortest probe interval we accept; smaller values would hammer the device
const MIN_PROBE_INTERVAL_MS: u64 = 100;

/// Application settings (`config.toml`)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub probe: ProbeSettings,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub adb: AdbSettings,

    #[serde(default)]
    pub devices: DeviceSettings,
}

/// Readiness probe settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeSettings {
    /// Poll interval in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Shell command whose numeric output signals liveness
    #[serde(default = "default_liveness_command")]
    pub liveness_command: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            liveness_command: default_liveness_command(),
        }
    }
}

impl ProbeSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(MIN_PROBE_INTERVAL_MS))
    }
}

/// Session behavior settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSettings {
    /// Connect to an authorized device on startup and on attach
    #[serde(default = "default_true")]
    pub auto_connect: bool,

    /// Port forwarded from the device back to the host once ready
    #[serde(default = "default_reverse_port")]
    pub reverse_port: u16,

    /// Binaries whose presence is checked after the device is ready
    #[serde(default = "default_required_binaries")]
    pub required_binaries: Vec<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            auto_connect: true,
            reverse_port: default_reverse_port(),
            required_binaries: default_required_binaries(),
        }
    }
}

/// ADB server connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdbSettings {
    #[serde(default = "default_adb_host")]
    pub host: String,

    #[serde(default = "default_adb_port")]
    pub port: u16,

    /// Timeout for a single server round trip
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Host key location, defaults to `~/.android/adbkey`
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

impl Default for AdbSettings {
    fn default() -> Self {
        Self {
            host: default_adb_host(),
            port: default_adb_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            key_path: None,
        }
    }
}

impl AdbSettings {
    pub fn server(&self) -> AdbServer {
        AdbServer::new(
            self.host.clone(),
            self.port,
            Duration::from_millis(self.connect_timeout_ms),
        )
    }

    pub fn credentials(&self) -> CredentialStore {
        match &self.key_path {
            Some(path) => CredentialStore::new(path),
            None => CredentialStore::default_location(),
        }
    }
}

/// Device access settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeviceSettings {
    /// Serials auto-connect may use without prompting
    #[serde(default)]
    pub authorized_serials: Vec<String>,

    /// Treat every attached ADB device as authorized
    #[serde(default)]
    pub trust_all: bool,
}

fn default_interval_ms() -> u64 {
    3000
}

fn default_liveness_command() -> String {
    "cat /sys/class/thermal/thermal_zone0/temp".to_string()
}

fn default_reverse_port() -> u16 {
    8000
}

fn default_required_binaries() -> Vec<String> {
    vec!["busybox".to_string(), "opkg".to_string()]
}

fn default_adb_host() -> String {
    devlink_device::adb::client::DEFAULT_HOST.to_string()
}

fn default_adb_port() -> u16 {
    devlink_device::adb::client::DEFAULT_PORT
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}
