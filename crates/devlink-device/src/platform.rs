//! Platform and transport boundaries
//!
//! The controller only talks to devices through these traits:
//! - [`DevicePlatform`] - host-side discovery, user selection and hot-plug
//! - [`DeviceTransport`] - opening, authenticating and querying one device
//! - [`DeviceSelector`] - the user-facing prompt behind device selection

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use devlink_core::prelude::*;
use devlink_core::DeviceId;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

fn next_handle_id() -> u64 {
    NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed)
}

// ─────────────────────────────────────────────────────────────────
// Transport Values
// ─────────────────────────────────────────────────────────────────

/// An opened but not yet authenticated transport
#[derive(Debug)]
pub struct TransportStream {
    id: u64,
    device: DeviceId,
}

impl TransportStream {
    pub fn new(device: DeviceId) -> Self {
        Self {
            id: next_handle_id(),
            device,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }
}

/// An authenticated session handle produced by the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    id: u64,
    device: DeviceId,
}

impl SessionHandle {
    /// Consume an authenticated stream into a handle
    pub fn from_stream(stream: TransportStream) -> Self {
        Self {
            id: stream.id,
            device: stream.device,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }
}

/// Location of the host key used by the authentication exchange
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    key_path: Option<PathBuf>,
}

impl CredentialStore {
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: Some(key_path.into()),
        }
    }

    /// The standard `~/.android/adbkey` location
    pub fn default_location() -> Self {
        Self {
            key_path: dirs::home_dir().map(|home| home.join(".android").join("adbkey")),
        }
    }

    pub fn key_path(&self) -> Option<&PathBuf> {
        self.key_path.as_ref()
    }

    pub fn is_present(&self) -> bool {
        self.key_path.as_ref().is_some_and(|p| p.exists())
    }
}

// ─────────────────────────────────────────────────────────────────
// Hot-plug Subscription
// ─────────────────────────────────────────────────────────────────

/// Callback invoked with the attached device, or `None` on detach
pub type HotplugCallback = Arc<dyn Fn(Option<DeviceId>) + Send + Sync>;

/// A live hot-plug subscription. Released exactly once, on `dispose` or drop.
pub struct HotplugSubscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl HotplugSubscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Unsubscribe. Returns `true` only for the call that actually released it.
    pub fn dispose(&mut self) -> bool {
        match self.release.take() {
            Some(release) => {
                release();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }
}

impl std::fmt::Debug for HotplugSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotplugSubscription")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for HotplugSubscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ─────────────────────────────────────────────────────────────────
// Boundary Traits
// ─────────────────────────────────────────────────────────────────

/// Host platform operations
#[trait_variant::make(DevicePlatform: Send)]
pub trait LocalDevicePlatform {
    /// Devices the user already granted access to
    async fn enumerate_authorized_devices(&self) -> Result<Vec<DeviceId>>;

    /// Ask the user to pick a device. Fails with [`Error::SelectionCancelled`]
    /// when the user declines.
    async fn request_device_selection(&self) -> Result<DeviceId>;

    /// Subscribe to attach/detach notifications
    fn subscribe_hotplug(&self, callback: HotplugCallback) -> Result<HotplugSubscription>;
}

/// Device transport operations
#[trait_variant::make(DeviceTransport: Send)]
pub trait LocalDeviceTransport {
    /// Open the raw transport to a device
    async fn open_transport(&self, device: &DeviceId) -> Result<TransportStream>;

    /// Run the authentication exchange over an opened stream
    async fn authenticate(
        &self,
        stream: TransportStream,
        credentials: &CredentialStore,
    ) -> Result<SessionHandle>;

    /// Run a command on the device and return its output
    async fn query(&self, handle: &SessionHandle, command: &str) -> Result<String>;

    /// Open the reverse communication socket on `port`
    async fn open_reverse_socket(&self, handle: &SessionHandle, port: u16) -> Result<()>;

    /// Release the device transport
    async fn close_transport(&self, device: &DeviceId) -> Result<()>;
}

/// User-facing device chooser
#[trait_variant::make(DeviceSelector: Send)]
pub trait LocalDeviceSelector {
    /// Pick one of `candidates`, or `None` when the user cancels
    async fn select(&self, candidates: Vec<DeviceId>) -> Option<DeviceId>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_subscription_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let mut sub = HotplugSubscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(sub.is_active());
        assert!(sub.dispose());
        assert!(!sub.dispose());
        drop(sub);

        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_released_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        {
            let _sub = HotplugSubscription::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handle_keeps_stream_identity() {
        let stream = TransportStream::new(DeviceId::new("0123"));
        let id = stream.id();
        let handle = SessionHandle::from_stream(stream);
        assert_eq!(handle.id(), id);
        assert_eq!(handle.device().serial, "0123");
    }

    #[test]
    fn test_handles_are_unique() {
        let a = TransportStream::new(DeviceId::new("0123"));
        let b = TransportStream::new(DeviceId::new("0123"));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_missing_credentials() {
        let store = CredentialStore::new("/nonexistent/adbkey");
        assert!(!store.is_present());
        assert!(CredentialStore::default().key_path().is_none());
    }
}
