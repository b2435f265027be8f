//! Settings loader for `config.toml`

use std::path::{Path, PathBuf};

use devlink_core::prelude::*;

use super::types::Settings;

const CONFIG_DIR: &str = "devlink";
const CONFIG_FILENAME: &str = "config.toml";

const DEFAULT_CONFIG: &str = r#"# devlink configuration

[probe]
# Poll interval while waiting for and watching the device
interval_ms = 3000
# Command whose numeric output (> 0) marks the device as ready
liveness_command = "cat /sys/class/thermal/thermal_zone0/temp"

[session]
auto_connect = true
reverse_port = 8000
required_binaries = ["busybox", "opkg"]

[adb]
host = "127.0.0.1"
port = 5037
connect_timeout_ms = 5000

[devices]
# Serials that may be connected without prompting
authorized_serials = []
trust_all = false
"#;

/// `<config_dir>/devlink/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILENAME))
}

/// Load settings from `path`, falling back to defaults when the file is
/// missing or invalid
pub fn load_settings(path: &Path) -> Settings {
    if !path.exists() {
        debug!("No config file at {:?}, using defaults", path);
        return Settings::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", path, e);
            Settings::default()
        }
    }
}

/// Load from the default location, or defaults if there is none
pub fn load_default_settings() -> Settings {
    match default_config_path() {
        Some(path) => load_settings(&path),
        None => Settings::default(),
    }
}

/// Write a commented default config to `path` unless one already exists
pub fn init_config_file(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::config(format!("Failed to create {:?}: {}", parent, e)))?;
    }
    std::fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| Error::config(format!("Failed to write {:?}: {}", path, e)))?;
    info!("Created default config at {:?}", path);
    Ok(true)
}
