//! Session controller event loop
//!
//! Single owner of the session slot. Every event source sends a [`Message`];
//! the loop runs it through `handler::update`, publishes a snapshot when the
//! visible state changed, then performs the returned actions in order.
//! Teardown is awaited inline so no later message observes a half-released
//! session.

use std::sync::Arc;

use devlink_core::prelude::*;
use devlink_core::SessionSnapshot;
use devlink_device::{
    CredentialStore, DeviceCapabilities, DevicePlatform, DeviceTransport, SessionHandle,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::actions::{discovery, setup, ConnectionAttempt, MessageSender, ProbeTimer};
use crate::cleanup::CleanupCoordinator;
use crate::config::Settings;
use crate::controller::ControllerHandle;
use crate::handler::{self, UpdateAction};
use crate::hooks::SessionHooks;
use crate::message::Message;
use crate::state::ControllerState;

pub struct SessionController<P, T> {
    platform: Arc<P>,
    transport: Arc<T>,
    settings: Settings,
    credentials: CredentialStore,
    hooks: SessionHooks,
    state: ControllerState,
    cleanup: CleanupCoordinator<T>,
    msg_tx: MessageSender,
    msg_rx: mpsc::UnboundedReceiver<Message>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    published: u64,
}

impl<P, T> SessionController<P, T>
where
    P: DevicePlatform + Send + Sync + 'static,
    T: DeviceTransport + Send + Sync + 'static,
{
    pub fn new(
        platform: Arc<P>,
        transport: Arc<T>,
        settings: Settings,
        hooks: SessionHooks,
    ) -> (Self, ControllerHandle) {
        let (tx, msg_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let controller = Self {
            platform,
            cleanup: CleanupCoordinator::new(Arc::clone(&transport)),
            transport,
            credentials: settings.adb.credentials(),
            state: ControllerState::new(settings.session.clone()),
            settings,
            hooks,
            msg_tx: tx.downgrade(),
            msg_rx,
            snapshot_tx,
            published: 0,
        };

        (controller, ControllerHandle::new(tx, snapshot_rx))
    }

    /// Create the controller and run it on a new task
    pub fn spawn(
        platform: Arc<P>,
        transport: Arc<T>,
        settings: Settings,
        hooks: SessionHooks,
    ) -> (ControllerHandle, JoinHandle<()>) {
        let (controller, handle) = Self::new(platform, transport, settings, hooks);
        let task = tokio::spawn(controller.run());
        (handle, task)
    }

    /// Run until shutdown, or until every handle is dropped
    pub async fn run(mut self) {
        info!("Session controller started");
        self.process(Message::Start).await;

        while !self.state.quitting {
            match self.msg_rx.recv().await {
                Some(msg) => self.process(msg).await,
                None => {
                    debug!("All controller handles dropped");
                    self.process(Message::Shutdown { done: None }).await;
                }
            }
        }

        info!("Session controller stopped");
    }

    async fn process(&mut self, message: Message) {
        let mut msg = Some(message);
        while let Some(m) = msg {
            let result = handler::update(&mut self.state, m);
            self.publish();

            for action in result.actions {
                self.handle_action(action).await;
            }

            msg = result.message;
        }
    }

    fn publish(&mut self) {
        if self.state.revision() == self.published {
            return;
        }
        self.published = self.state.revision();
        self.snapshot_tx.send_replace(self.state.snapshot());
    }

    fn capabilities(&self, handle: SessionHandle) -> DeviceCapabilities<T> {
        DeviceCapabilities::new(Arc::clone(&self.transport), handle)
    }

    async fn handle_action(&mut self, action: UpdateAction) {
        match action {
            UpdateAction::SubscribeWatcher => {
                let tx = self.msg_tx.clone();
                if let Err(e) = self.cleanup.watcher_mut().start(self.platform.as_ref(), tx) {
                    warn!("Hot-plug notifications unavailable: {}", e);
                }
            }

            UpdateAction::EnumerateDevices { request } => {
                discovery::spawn_enumerate(
                    request,
                    Arc::clone(&self.platform),
                    self.msg_tx.clone(),
                );
            }

            UpdateAction::RequestSelection { request } => {
                discovery::spawn_selection(
                    request,
                    Arc::clone(&self.platform),
                    self.msg_tx.clone(),
                );
            }

            UpdateAction::StartAttempt { attempt, device } => {
                ConnectionAttempt::new(
                    attempt,
                    device,
                    Arc::clone(&self.transport),
                    self.credentials.clone(),
                )
                .spawn(self.msg_tx.clone());
            }

            UpdateAction::StartProbe { token, handle } => {
                let timer = ProbeTimer::spawn(
                    token,
                    self.capabilities(handle),
                    self.settings.probe.liveness_command.clone(),
                    self.settings.probe.interval(),
                    self.msg_tx.clone(),
                );
                self.cleanup.install_probe(timer);
            }

            UpdateAction::PostReadySetup { token, handle } => {
                setup::spawn_post_ready(
                    token,
                    self.capabilities(handle),
                    self.settings.session.reverse_port,
                    self.msg_tx.clone(),
                );
            }

            UpdateAction::CheckBinaries {
                token,
                handle,
                names,
            } => {
                setup::spawn_binary_check(
                    token,
                    self.capabilities(handle),
                    names,
                    self.msg_tx.clone(),
                );
            }

            UpdateAction::Teardown(plan) => {
                self.cleanup.teardown(&plan).await;
            }

            UpdateAction::NotifyReading(reading) => self.hooks.notify_reading(reading),

            UpdateAction::RunReadyHooks => self.hooks.notify_ready(&self.state.snapshot()),

            UpdateAction::ResetDependents => self.hooks.notify_reset(),

            UpdateAction::Acknowledge(done) => {
                let _ = done.send(());
            }
        }
    }
}
