//! Deterministic teardown of everything a session acquired

use std::sync::Arc;

use devlink_core::prelude::*;
use devlink_device::DeviceTransport;

use crate::actions::ProbeTimer;
use crate::handler::TeardownPlan;
use crate::watcher::DeviceWatcher;

/// What a teardown actually released
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub probe_cleared: bool,
    pub transport_closed: bool,
    pub watcher_disposed: bool,
}

impl TeardownReport {
    pub fn released_anything(&self) -> bool {
        self.probe_cleared || self.transport_closed || self.watcher_disposed
    }
}

/// Holds the controller's releasable resources: the watcher subscription,
/// the probe timer, and access to the device transport.
///
/// Every teardown step is guarded by "only if held", so repeating a
/// teardown releases nothing twice.
pub struct CleanupCoordinator<T> {
    transport: Arc<T>,
    probe: Option<ProbeTimer>,
    watcher: DeviceWatcher,
}

impl<T> CleanupCoordinator<T>
where
    T: DeviceTransport + Send + Sync + 'static,
{
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            probe: None,
            watcher: DeviceWatcher::new(),
        }
    }

    pub fn watcher_mut(&mut self) -> &mut DeviceWatcher {
        &mut self.watcher
    }

    /// Install a probe timer, cancelling any previous one
    pub fn install_probe(&mut self, timer: ProbeTimer) {
        if let Some(old) = self.probe.replace(timer) {
            warn!("Replacing probe for session {}", old.token());
            old.cancel();
        }
    }

    pub async fn teardown(&mut self, plan: &TeardownPlan) -> TeardownReport {
        let mut report = TeardownReport::default();

        if plan.dispose_watcher {
            report.watcher_disposed = self.watcher.dispose();
        }

        if plan.stop_probe {
            if let Some(probe) = self.probe.take() {
                debug!("Clearing probe for session {}", probe.token());
                probe.cancel();
                report.probe_cleared = true;
            }
        }

        if let Some(device) = &plan.release {
            match self.transport.close_transport(device).await {
                Ok(()) => {
                    debug!("Transport to {} closed", device);
                    report.transport_closed = true;
                }
                Err(e) => {
                    let failure = Error::cleanup_failure(format!("transport to {}", device), e);
                    warn!("{}", failure);
                }
            }
        }

        if report.released_anything() {
            info!("Teardown released {:?}", report);
        }
        report
    }
}
