//! Hot-plug watcher feeding attach/detach events into the controller

use std::sync::Arc;

use devlink_core::prelude::*;
use devlink_device::{DevicePlatform, HotplugSubscription};

use crate::actions::{send, MessageSender};
use crate::message::Message;

/// Owns the platform hot-plug subscription.
///
/// The callback only forwards events as [`Message::Hotplug`]; it never
/// touches session state directly.
#[derive(Debug, Default)]
pub struct DeviceWatcher {
    subscription: Option<HotplugSubscription>,
}

impl DeviceWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe once; a second call while subscribed is a no-op
    pub fn start<P: DevicePlatform>(&mut self, platform: &P, tx: MessageSender) -> Result<()> {
        if self.is_running() {
            debug!("Device watcher already running");
            return Ok(());
        }

        let subscription = platform.subscribe_hotplug(Arc::new(move |event| {
            if send(&tx, Message::Hotplug(event)).is_err() {
                trace!("Hot-plug event dropped, controller gone");
            }
        }))?;

        info!("Device watcher started");
        self.subscription = Some(subscription);
        Ok(())
    }

    /// Unsubscribe. Returns whether a subscription was released.
    pub fn dispose(&mut self) -> bool {
        match self.subscription.take() {
            Some(mut subscription) => {
                subscription.dispose();
                info!("Device watcher stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(HotplugSubscription::is_active)
    }
}

impl Drop for DeviceWatcher {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devlink_device::test_utils::{test_device, FakePlatform};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_watcher_forwards_events() {
        let platform = FakePlatform::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = DeviceWatcher::new();

        watcher.start(&platform, tx.downgrade()).unwrap();
        platform.attach(test_device("0123"));
        platform.detach(&test_device("0123"));

        assert!(matches!(rx.recv().await, Some(Message::Hotplug(Some(_)))));
        assert!(matches!(rx.recv().await, Some(Message::Hotplug(None))));
    }

    #[test]
    fn test_start_subscribes_once() {
        let platform = FakePlatform::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut watcher = DeviceWatcher::new();

        watcher.start(&platform, tx.downgrade()).unwrap();
        watcher.start(&platform, tx.downgrade()).unwrap();

        assert_eq!(platform.subscribe_count(), 1);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let platform = FakePlatform::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut watcher = DeviceWatcher::new();
        watcher.start(&platform, tx.downgrade()).unwrap();

        assert!(watcher.dispose());
        assert!(!watcher.dispose());
        drop(watcher);

        assert_eq!(platform.dispose_count(), 1);
        assert!(!platform.is_subscribed());
    }

    #[test]
    fn test_dispose_without_start() {
        let mut watcher = DeviceWatcher::new();
        assert!(!watcher.dispose());
    }
}
