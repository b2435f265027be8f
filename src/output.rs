//! Session output for the terminal runner
//!
//! Human mode prints one line per visible change. JSON mode prints NDJSON
//! events, one object per line, tagged by an "event" field:
//!
//! ```json
//! {"event":"snapshot","status":"ready","device":{"serial":"0123"},"last_reading":42.0,...}
//! {"event":"connect_result","device":{"serial":"0123"},"error":null,"timestamp":1704700002000}
//! ```

use std::io::{self, Write};

use chrono::Utc;
use devlink_app::ConnectOutcome;
use devlink_core::prelude::*;
use devlink_core::{DeviceId, ErrorInfo, SessionSnapshot};
use serde::Serialize;

/// Events emitted in JSON mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Published controller state
    Snapshot(SessionSnapshot),

    /// Devices offered by a selection prompt
    DeviceChoices {
        devices: Vec<DeviceId>,
        timestamp: i64,
    },

    /// Result of a connect or select request
    ConnectResult {
        device: Option<DeviceId>,
        error: Option<ErrorInfo>,
        timestamp: i64,
    },

    /// Runner-level message
    Notice { message: String, timestamp: i64 },
}

impl SessionEvent {
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    pub fn device_choices(devices: &[DeviceId]) -> Self {
        Self::DeviceChoices {
            devices: devices.to_vec(),
            timestamp: Self::now(),
        }
    }

    pub fn connect_result(outcome: &ConnectOutcome) -> Self {
        let (device, error) = match outcome {
            Ok(device) => (Some(device.clone()), None),
            Err(error) => (None, Some(error.clone())),
        };
        Self::ConnectResult {
            device,
            error,
            timestamp: Self::now(),
        }
    }

    pub fn notice(message: impl Into<String>) -> Self {
        Self::Notice {
            message: message.into(),
            timestamp: Self::now(),
        }
    }

    /// Emit this event to stdout as one JSON line
    pub fn emit(&self) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize session event: {}", e);
                return;
            }
        };
        write_line(&json);
    }
}

fn write_line(line: &str) {
    let mut stdout = io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{}", line).and_then(|_| stdout.flush()) {
        error!("Failed to write to stdout: {}", e);
    }
}

/// One-line human summary of a snapshot
pub fn format_snapshot(snapshot: &SessionSnapshot) -> String {
    let mut line = format!("[{}]", snapshot.status);

    if let Some(device) = &snapshot.device {
        line.push_str(&format!(" {}", device.display_name()));
    }
    if let Some(name) = snapshot.product_info.as_ref().and_then(|p| p.nice_name()) {
        line.push_str(&format!(" - {}", name));
    }
    if let Some(reading) = snapshot.last_reading {
        line.push_str(&format!(" reading={}", reading));
    }
    if snapshot.reverse_socket_opened {
        line.push_str(" reverse-socket");
    }

    let missing: Vec<&str> = snapshot
        .binaries
        .iter()
        .filter(|(_, present)| !**present)
        .map(|(name, _)| name.as_str())
        .collect();
    if !missing.is_empty() {
        line.push_str(&format!(" missing: {}", missing.join(", ")));
    }

    if let Some(error) = &snapshot.error {
        line.push_str(&format!(" ({})", error));
    }
    line
}

/// Whether anything other than the reading or timestamp differs
fn visible_change(prev: &SessionSnapshot, next: &SessionSnapshot) -> bool {
    prev.status != next.status
        || prev.device != next.device
        || prev.product_info != next.product_info
        || prev.reverse_socket_opened != next.reverse_socket_opened
        || prev.binaries != next.binaries
        || prev.error != next.error
}

/// Writes snapshots, prompts and results in the selected format
#[derive(Debug)]
pub struct Printer {
    json: bool,
    readings: bool,
    last: Option<SessionSnapshot>,
}

impl Printer {
    /// With `readings`, every probe tick is printed, not only state changes
    pub fn new(json: bool, readings: bool) -> Self {
        Self {
            json,
            readings,
            last: None,
        }
    }

    pub fn should_print(&self, snapshot: &SessionSnapshot) -> bool {
        match &self.last {
            None => true,
            Some(prev) => {
                visible_change(prev, snapshot)
                    || (self.readings && prev.updated_at != snapshot.updated_at)
            }
        }
    }

    /// Print a snapshot if it differs from the last printed one
    pub fn snapshot(&mut self, snapshot: &SessionSnapshot) {
        if self.should_print(snapshot) {
            self.status(snapshot);
        }
    }

    /// Print a snapshot unconditionally
    pub fn status(&mut self, snapshot: &SessionSnapshot) {
        self.last = Some(snapshot.clone());
        if self.json {
            SessionEvent::Snapshot(snapshot.clone()).emit();
        } else {
            write_line(&format_snapshot(snapshot));
        }
    }

    pub fn choices(&self, devices: &[DeviceId]) {
        if self.json {
            SessionEvent::device_choices(devices).emit();
            return;
        }
        write_line("Select a device (number, or 'cancel'):");
        for (i, device) in devices.iter().enumerate() {
            write_line(&format!("  {}) {}", i + 1, device.display_name()));
        }
    }

    pub fn outcome(&self, outcome: &ConnectOutcome) {
        if self.json {
            SessionEvent::connect_result(outcome).emit();
            return;
        }
        match outcome {
            Ok(device) => write_line(&format!("Connected to {}", device.display_name())),
            Err(error) if error.is_benign() => write_line(&error.message),
            Err(error) => write_line(&format!("Connect failed: {}", error)),
        }
    }

    pub fn notice(&self, message: &str) {
        if self.json {
            SessionEvent::notice(message).emit();
        } else {
            write_line(message);
        }
    }
}
