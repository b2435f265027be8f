//! Logging configuration using tracing

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Environment variable controlling the log filter
pub const LOG_ENV_VAR: &str = "DEVLINK_LOG";

const DEFAULT_FILTER: &str = "devlink=info,devlink_app=info,devlink_device=info,warn";

/// Initialize the logging subsystem
///
/// Logs are written to `~/.local/share/devlink/logs/`.
/// Log level is controlled by the `DEVLINK_LOG` environment variable.
///
/// # Examples
/// ```bash
/// DEVLINK_LOG=debug devlink
/// DEVLINK_LOG=devlink_app=trace devlink
/// ```
pub fn init() -> Result<()> {
    let log_dir = get_log_directory()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "devlink.log");

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("devlink starting");
    tracing::info!("Log directory: {}", log_dir.display());
    tracing::info!("═══════════════════════════════════════════════════════");

    Ok(())
}

/// Build the filter from `DEVLINK_LOG`, falling back to info for our crates
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Get the log directory path
fn get_log_directory() -> Result<PathBuf> {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    Ok(base.join("devlink").join("logs"))
}

/// Get the log file path for the current day
pub fn get_current_log_file() -> Result<PathBuf> {
    let dir = get_log_directory()?;
    Ok(dir.join("devlink.log"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_filter_uses_env_var() {
        std::env::set_var(LOG_ENV_VAR, "devlink_app=trace");
        let filter = env_filter();
        std::env::remove_var(LOG_ENV_VAR);

        assert_eq!(filter.to_string(), "devlink_app=trace");
    }

    #[test]
    #[serial]
    fn test_env_filter_default() {
        std::env::remove_var(LOG_ENV_VAR);
        let filter = env_filter();
        assert!(filter.to_string().contains("devlink_app=info"));
    }

    #[test]
    fn test_log_file_name() {
        let path = get_current_log_file().unwrap();
        assert!(path.ends_with("devlink/logs/devlink.log"));
    }
}
