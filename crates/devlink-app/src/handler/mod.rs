//! Handler module - TEA update function and event handlers
//!
//! Organized into submodules:
//! - `update`: Main update() function and message dispatch
//! - `attempt`: Connect, auto-connect, selection and attempt results
//! - `probe`: Probe readings, promotion and post-ready results
//! - `teardown`: Detach, disconnect and shutdown

pub(crate) mod attempt;
pub(crate) mod probe;
pub(crate) mod teardown;
pub(crate) mod update;


use devlink_core::DeviceId;
use devlink_device::SessionHandle;
use tokio::sync::oneshot;

use crate::message::{AttemptId, Message, RequestId, SessionToken};

pub use update::update;

/// What the cleanup coordinator should release.
///
/// Every step runs only if the resource is actually held.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownPlan {
    /// Close the transport of this device
    pub release: Option<DeviceId>,
    /// Cancel the probe timer
    pub stop_probe: bool,
    /// Dispose the hot-plug subscription (shutdown only)
    pub dispose_watcher: bool,
}

impl TeardownPlan {
    /// End the current session
    pub fn session(device: Option<DeviceId>) -> Self {
        Self {
            release: device,
            stop_probe: true,
            dispose_watcher: false,
        }
    }

    /// Release a transport nobody owns any more
    pub fn orphan(device: DeviceId) -> Self {
        Self {
            release: Some(device),
            stop_probe: false,
            dispose_watcher: false,
        }
    }

    /// Release everything, including the watcher
    pub fn shutdown(device: Option<DeviceId>) -> Self {
        Self {
            release: device,
            stop_probe: true,
            dispose_watcher: true,
        }
    }
}

/// Actions that the engine performs after update, in order
#[derive(Debug)]
pub enum UpdateAction {
    /// Subscribe the device watcher
    SubscribeWatcher,

    /// Enumerate authorized devices for auto-connect
    EnumerateDevices { request: RequestId },

    /// Open the user selection prompt
    RequestSelection { request: RequestId },

    /// Spawn a connection attempt
    StartAttempt { attempt: AttemptId, device: DeviceId },

    /// Start the readiness probe for a committed session
    StartProbe {
        token: SessionToken,
        handle: SessionHandle,
    },

    /// Open the reverse socket and fetch product metadata
    PostReadySetup {
        token: SessionToken,
        handle: SessionHandle,
    },

    /// Check required binaries on the device
    CheckBinaries {
        token: SessionToken,
        handle: SessionHandle,
        names: Vec<String>,
    },

    /// Release resources through the cleanup coordinator
    Teardown(TeardownPlan),

    /// Pass a raw reading to reading observers
    NotifyReading(Option<f64>),

    /// Run post-ready callbacks
    RunReadyHooks,

    /// Reset dependent subsystems after teardown
    ResetDependents,

    /// Signal a waiting caller once preceding actions have run
    Acknowledge(oneshot::Sender<()>),
}

/// Result of processing a message
#[derive(Debug, Default)]
pub struct UpdateResult {
    /// Optional follow-up message
    pub message: Option<Message>,
    /// Actions to perform, in order
    pub actions: Vec<UpdateAction>,
}

impl UpdateResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn message(msg: Message) -> Self {
        Self {
            message: Some(msg),
            actions: Vec::new(),
        }
    }

    pub fn action(action: UpdateAction) -> Self {
        Self {
            message: None,
            actions: vec![action],
        }
    }

    pub fn actions(actions: Vec<UpdateAction>) -> Self {
        Self {
            message: None,
            actions,
        }
    }

    pub fn with_message(mut self, msg: Message) -> Self {
        self.message = Some(msg);
        self
    }
}
