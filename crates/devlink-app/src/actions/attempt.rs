//! One-shot connection attempt: open transport, authenticate, wrap

use std::sync::Arc;

use devlink_core::prelude::*;
use devlink_core::{DeviceId, ErrorInfo, SessionStatus};
use devlink_device::{CredentialStore, DeviceCapabilities, DeviceTransport};
use tokio::task::JoinHandle;

use crate::message::{AttemptId, Message};

use super::{send, MessageSender};

/// Why an attempt failed, and whether it left a transport open
#[derive(Debug)]
pub struct AttemptFailure {
    pub error: Error,
    pub transport_opened: bool,
}

pub struct ConnectionAttempt<T> {
    id: AttemptId,
    device: DeviceId,
    transport: Arc<T>,
    credentials: CredentialStore,
}

impl<T> ConnectionAttempt<T>
where
    T: DeviceTransport + Send + Sync + 'static,
{
    pub fn new(
        id: AttemptId,
        device: DeviceId,
        transport: Arc<T>,
        credentials: CredentialStore,
    ) -> Self {
        Self {
            id,
            device,
            transport,
            credentials,
        }
    }

    /// Run the attempt.
    ///
    /// `on_authenticating` fires once the transport is open. Failures never
    /// yield a partial session; the caller decides how to release an opened
    /// transport.
    pub async fn execute(
        &self,
        on_authenticating: impl FnOnce(),
    ) -> std::result::Result<DeviceCapabilities<T>, AttemptFailure> {
        let stream = self
            .transport
            .open_transport(&self.device)
            .await
            .map_err(|e| AttemptFailure {
                error: Error::connection_failed(self.device.serial.clone(), e),
                transport_opened: false,
            })?;

        on_authenticating();

        let handle = self
            .transport
            .authenticate(stream, &self.credentials)
            .await
            .map_err(|e| AttemptFailure {
                error: Error::connection_failed(self.device.serial.clone(), e),
                transport_opened: true,
            })?;

        Ok(DeviceCapabilities::new(Arc::clone(&self.transport), handle))
    }

    /// Spawn the attempt and report its outcome to the controller
    pub fn spawn(self, tx: MessageSender) -> JoinHandle<()> {
        tokio::spawn(async move {
            let attempt = self.id;
            let progress_tx = tx.clone();
            let result = self
                .execute(|| {
                    let _ = send(
                        &progress_tx,
                        Message::AttemptProgress {
                            attempt,
                            status: SessionStatus::Authenticating,
                        },
                    );
                })
                .await;

            let (msg, opened) = match result {
                Ok(capabilities) => (
                    Message::AttemptSucceeded {
                        attempt,
                        handle: capabilities.handle().clone(),
                    },
                    true,
                ),
                Err(failure) => (
                    Message::AttemptFailed {
                        attempt,
                        device: self.device.clone(),
                        error: ErrorInfo::from(&failure.error),
                        transport_opened: failure.transport_opened,
                    },
                    failure.transport_opened,
                ),
            };

            if send(&tx, msg).is_err() && opened {
                debug!(
                    "Controller gone before attempt {} resolved, closing {}",
                    attempt, self.device
                );
                if let Err(e) = self.transport.close_transport(&self.device).await {
                    warn!("Failed to close orphaned transport: {}", e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devlink_device::test_utils::{test_device, FakeTransport};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::mpsc;

    fn attempt(transport: Arc<FakeTransport>) -> ConnectionAttempt<FakeTransport> {
        ConnectionAttempt::new(1, test_device("0123"), transport, CredentialStore::default())
    }

    #[tokio::test]
    async fn test_execute_success() {
        let transport = Arc::new(FakeTransport::new());
        let authenticating = AtomicBool::new(false);

        let caps = attempt(transport.clone())
            .execute(|| authenticating.store(true, Ordering::SeqCst))
            .await
            .unwrap();

        assert!(authenticating.load(Ordering::SeqCst));
        assert_eq!(caps.device(), &test_device("0123"));
        assert_eq!(transport.handshake_count(), 1);
    }

    #[tokio::test]
    async fn test_open_failure_is_connection_failed() {
        let transport = Arc::new(FakeTransport::new());
        transport.fail_open(true);

        let failure = attempt(transport.clone()).execute(|| {}).await.unwrap_err();

        assert!(matches!(failure.error, Error::ConnectionFailed { .. }));
        assert!(!failure.transport_opened);
        assert_eq!(transport.handshake_count(), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_reports_open_transport() {
        let transport = Arc::new(FakeTransport::new());
        transport.fail_auth(true);

        let failure = attempt(transport).execute(|| {}).await.unwrap_err();

        assert!(matches!(failure.error, Error::ConnectionFailed { .. }));
        assert!(failure.transport_opened);
    }

    #[tokio::test]
    async fn test_spawn_reports_progress_then_success() {
        let transport = Arc::new(FakeTransport::new());
        let (tx, mut rx) = mpsc::unbounded_channel();

        attempt(transport).spawn(tx.downgrade()).await.unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(Message::AttemptProgress {
                attempt: 1,
                status: SessionStatus::Authenticating
            })
        ));
        assert!(matches!(
            rx.recv().await,
            Some(Message::AttemptSucceeded { attempt: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_spawn_closes_transport_when_controller_gone() {
        let transport = Arc::new(FakeTransport::new());
        let (tx, rx) = mpsc::unbounded_channel::<Message>();
        let weak = tx.downgrade();
        drop(tx);
        drop(rx);

        attempt(transport.clone()).spawn(weak).await.unwrap();

        assert_eq!(transport.close_count(), 1);
        assert!(!transport.is_open(&test_device("0123")));
    }
}
