//! Handle used by UI collaborators to drive the controller

use devlink_core::prelude::*;
use devlink_core::{DeviceId, ErrorInfo, SessionSnapshot};
use tokio::sync::{mpsc, oneshot, watch};

use crate::message::{ConnectOutcome, Message};

fn closed() -> ErrorInfo {
    ErrorInfo::from(Error::ChannelClosed)
}

/// Cloneable handle to a running [`SessionController`](crate::SessionController).
///
/// Collaborators issue lifecycle commands and read published snapshots; they
/// never mutate the session directly. The controller shuts down once every
/// handle is dropped.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<Message>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
}

impl ControllerHandle {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<Message>,
        snapshot_rx: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        Self { tx, snapshot_rx }
    }

    fn send(&self, msg: Message) -> Result<()> {
        self.tx.send(msg).map_err(|_| Error::ChannelClosed)
    }

    /// Connect to `device`.
    ///
    /// While another attempt is in flight this resolves with that attempt's
    /// outcome instead of starting a new one.
    pub async fn connect(&self, device: DeviceId) -> ConnectOutcome {
        let (reply, rx) = oneshot::channel();
        self.send(Message::Connect {
            device,
            replies: vec![reply],
        })
        .map_err(|_| closed())?;
        rx.await.unwrap_or_else(|_| Err(closed()))
    }

    /// Prompt the user for a device, then connect to it
    pub async fn select_and_connect(&self) -> ConnectOutcome {
        let (reply, rx) = oneshot::channel();
        self.send(Message::SelectDevice { reply: Some(reply) })
            .map_err(|_| closed())?;
        rx.await.unwrap_or_else(|_| Err(closed()))
    }

    /// Connect to the first authorized device if nothing is in progress
    pub fn auto_connect(&self) -> Result<()> {
        self.send(Message::AutoConnect)
    }

    /// End the session; resolves once teardown has run
    pub async fn disconnect(&self) -> Result<()> {
        let (done, rx) = oneshot::channel();
        self.send(Message::Disconnect { done: Some(done) })?;
        rx.await.map_err(|_| Error::ChannelClosed)
    }

    /// Release everything and stop the controller. Stopping an already
    /// stopped controller is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        let (done, rx) = oneshot::channel();
        if self.send(Message::Shutdown { done: Some(done) }).is_err() {
            return Ok(());
        }
        let _ = rx.await;
        Ok(())
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver notified on every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}
