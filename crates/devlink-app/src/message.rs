//! Message types for the controller (TEA pattern)
//!
//! Every event source (user commands, hot-plug callback, attempt and probe
//! tasks) talks to the controller only by sending one of these.

use std::collections::BTreeMap;

use devlink_core::{DeviceId, ErrorInfo, ProductInfo, SessionStatus};
use devlink_device::SessionHandle;
use tokio::sync::oneshot;

/// Identifies one connection attempt
pub type AttemptId = u64;

/// Identifies one committed session; probe and setup results carry it
pub type SessionToken = u64;

/// Identifies one enumeration or selection prompt; results of a request
/// that was withdrawn in the meantime are dropped
pub type RequestId = u64;

/// Outcome delivered to a caller waiting on `connect`
pub type ConnectOutcome = std::result::Result<DeviceId, ErrorInfo>;

/// Reply slot for a caller waiting on `connect`
pub type ConnectReply = oneshot::Sender<ConnectOutcome>;

/// All messages handled by the controller
#[derive(Debug)]
pub enum Message {
    /// Controller started: subscribe the watcher and auto-connect once
    Start,

    /// Connect to a specific device
    Connect {
        device: DeviceId,
        replies: Vec<ConnectReply>,
    },

    /// Connect to the first authorized device, if idle
    AutoConnect,

    /// Result of enumerating authorized devices for auto-connect
    DevicesEnumerated {
        request: RequestId,
        devices: Vec<DeviceId>,
    },

    /// Prompt the user for a device, then connect
    SelectDevice { reply: Option<ConnectReply> },

    /// The selection prompt closed
    SelectionResolved {
        request: RequestId,
        result: ConnectOutcome,
    },

    // ─────────────────────────────────────────────────────────
    // Connection Attempt
    // ─────────────────────────────────────────────────────────
    /// Transport opened; the attempt is now authenticating
    AttemptProgress {
        attempt: AttemptId,
        status: SessionStatus,
    },

    AttemptSucceeded {
        attempt: AttemptId,
        handle: SessionHandle,
    },

    AttemptFailed {
        attempt: AttemptId,
        device: DeviceId,
        error: ErrorInfo,
        /// Whether the transport was opened before the failure
        transport_opened: bool,
    },

    // ─────────────────────────────────────────────────────────
    // Readiness Probe
    // ─────────────────────────────────────────────────────────
    /// One probe tick; `None` when the device gave no numeric answer
    ProbeReading {
        token: SessionToken,
        reading: Option<f64>,
    },

    /// Reverse socket and product metadata setup finished
    PostReadyCompleted {
        token: SessionToken,
        reverse_socket_opened: bool,
        product_info: Option<ProductInfo>,
    },

    BinariesChecked {
        token: SessionToken,
        binaries: BTreeMap<String, bool>,
    },

    // ─────────────────────────────────────────────────────────
    // Teardown
    // ─────────────────────────────────────────────────────────
    /// Hot-plug notification: attached device, or `None` on detach
    Hotplug(Option<DeviceId>),

    /// End the session at the user's request
    Disconnect { done: Option<oneshot::Sender<()>> },

    /// Release everything and stop the controller
    Shutdown { done: Option<oneshot::Sender<()>> },
}
