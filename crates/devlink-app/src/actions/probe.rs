//! Readiness probe polling for a committed session.
//!
//! The probe ticks on a fixed interval, first tick immediate, and reports
//! every reading to the controller as a `ProbeReading` message. Deciding on
//! promotion is left to the controller. The loop never stops on its own; it
//! runs until:
//! - the timer is cancelled (shutdown channel or abort), or
//! - the controller is gone.
//!
//! Failed liveness queries (device still booting, adb hiccup) are reported
//! as a `None` reading and retried on the next tick.

use std::time::Duration;

use devlink_core::prelude::*;
use devlink_device::{DeviceCapabilities, DeviceTransport};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::message::{Message, SessionToken};

use super::{send, MessageSender};

/// A running probe loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct ProbeTimer {
    token: SessionToken,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ProbeTimer {
    pub fn spawn<T>(
        token: SessionToken,
        capabilities: DeviceCapabilities<T>,
        command: String,
        interval: Duration,
        tx: MessageSender,
    ) -> Self
    where
        T: DeviceTransport + Send + Sync + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        debug!("Probe for session {} stopped", token);
                        break;
                    }
                    _ = ticker.tick() => {
                        let reading = match capabilities.liveness(&command).await {
                            Ok(reading) => reading,
                            Err(e) => {
                                debug!("Liveness query failed (session {}): {}", token, e);
                                None
                            }
                        };

                        if send(&tx, Message::ProbeReading { token, reading }).is_err() {
                            debug!("Controller gone, probe for session {} exiting", token);
                            break;
                        }
                    }
                }
            }
        });

        Self {
            token,
            shutdown_tx,
            task,
        }
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    /// Stop the loop; an in-flight query is abandoned
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for ProbeTimer {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        self.task.abort();
    }
}
