//! Test utilities for the device layer
//!
//! Provides in-memory [`FakePlatform`] and [`FakeTransport`] implementations
//! of the boundary traits, with call counters and scripted failures.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use devlink_core::prelude::*;
use devlink_core::DeviceId;

use crate::platform::{
    CredentialStore, DevicePlatform, DeviceTransport, HotplugCallback, HotplugSubscription,
    SessionHandle, TransportStream,
};

/// Canned `getprop` output served by [`FakeTransport`]
pub const FAKE_GETPROP: &str = "\
[ro.build.version.release]: [4.4.2]
[ro.product.device]: [wm150]
[ro.product.manufacturer]: [DJI]
[ro.product.model]: [FPV Goggles]
";

/// Creates a test device with a serial and fixed USB ids.
pub fn test_device(serial: &str) -> DeviceId {
    DeviceId::new(serial)
        .with_usb_ids(0x2ca3, 0x001f)
        .with_name("Test Goggles")
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ─────────────────────────────────────────────────────────────────
// Fake Platform
// ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct PlatformInner {
    devices: Mutex<Vec<DeviceId>>,
    selection: Mutex<Option<DeviceId>>,
    selection_delay: Mutex<Option<Duration>>,
    callback: Mutex<Option<HotplugCallback>>,
    fail_subscribe: AtomicBool,
    enumerate_count: AtomicUsize,
    selection_count: AtomicUsize,
    subscribe_count: AtomicUsize,
    dispose_count: AtomicUsize,
}

/// In-memory host platform
#[derive(Clone, Default)]
pub struct FakePlatform {
    inner: Arc<PlatformInner>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform with `devices` already authorized
    pub fn with_devices(devices: impl IntoIterator<Item = DeviceId>) -> Self {
        let platform = Self::new();
        *lock(&platform.inner.devices) = devices.into_iter().collect();
        platform
    }

    /// Device the selection prompt returns; `None` simulates a cancel
    pub fn set_selection(&self, device: Option<DeviceId>) {
        *lock(&self.inner.selection) = device;
    }

    /// Keep the selection prompt open for `delay`
    pub fn set_selection_delay(&self, delay: Duration) {
        *lock(&self.inner.selection_delay) = Some(delay);
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.inner.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Plug in a device and notify the subscriber
    pub fn attach(&self, device: DeviceId) {
        {
            let mut devices = lock(&self.inner.devices);
            if !devices.contains(&device) {
                devices.push(device.clone());
            }
        }
        self.notify(Some(device));
    }

    /// Unplug a device and notify the subscriber
    pub fn detach(&self, device: &DeviceId) {
        lock(&self.inner.devices).retain(|d| d != device);
        self.notify(None);
    }

    fn notify(&self, event: Option<DeviceId>) {
        let callback = lock(&self.inner.callback).clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }

    pub fn is_subscribed(&self) -> bool {
        lock(&self.inner.callback).is_some()
    }

    pub fn enumerate_count(&self) -> usize {
        self.inner.enumerate_count.load(Ordering::SeqCst)
    }

    pub fn selection_count(&self) -> usize {
        self.inner.selection_count.load(Ordering::SeqCst)
    }

    pub fn subscribe_count(&self) -> usize {
        self.inner.subscribe_count.load(Ordering::SeqCst)
    }

    pub fn dispose_count(&self) -> usize {
        self.inner.dispose_count.load(Ordering::SeqCst)
    }
}

impl DevicePlatform for FakePlatform {
    async fn enumerate_authorized_devices(&self) -> Result<Vec<DeviceId>> {
        self.inner.enumerate_count.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.inner.devices).clone())
    }

    async fn request_device_selection(&self) -> Result<DeviceId> {
        self.inner.selection_count.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.inner.selection_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let selection = lock(&self.inner.selection).clone();
        selection.ok_or(Error::SelectionCancelled)
    }

    fn subscribe_hotplug(&self, callback: HotplugCallback) -> Result<HotplugSubscription> {
        if self.inner.fail_subscribe.load(Ordering::SeqCst) {
            return Err(Error::usb("hot-plug unsupported"));
        }
        self.inner.subscribe_count.fetch_add(1, Ordering::SeqCst);
        *lock(&self.inner.callback) = Some(callback);

        let inner = Arc::clone(&self.inner);
        Ok(HotplugSubscription::new(move || {
            inner.dispose_count.fetch_add(1, Ordering::SeqCst);
            *lock(&inner.callback) = None;
        }))
    }
}

// ─────────────────────────────────────────────────────────────────
// Fake Transport
// ─────────────────────────────────────────────────────────────────

/// In-memory device transport.
///
/// Liveness queries pop from a scripted reading queue; the last reading
/// repeats once the queue is drained. `getprop` and `command -v` queries are
/// answered from canned data.
#[derive(Default)]
pub struct FakeTransport {
    readings: Mutex<VecDeque<f64>>,
    binaries: Mutex<BTreeSet<String>>,
    open: Mutex<HashSet<String>>,
    auth_delay: Mutex<Option<Duration>>,
    fail_open: AtomicBool,
    fail_auth: AtomicBool,
    fail_close: AtomicBool,
    fail_reverse: AtomicBool,
    open_count: AtomicUsize,
    handshake_count: AtomicUsize,
    query_count: AtomicUsize,
    reverse_count: AtomicUsize,
    close_count: AtomicUsize,
    closed: Mutex<Vec<DeviceId>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_readings(readings: impl IntoIterator<Item = f64>) -> Self {
        let transport = Self::new();
        transport.push_readings(readings);
        transport
    }

    pub fn with_binaries<S: Into<String>>(self, names: impl IntoIterator<Item = S>) -> Self {
        lock(&self.binaries).extend(names.into_iter().map(Into::into));
        self
    }

    pub fn push_readings(&self, readings: impl IntoIterator<Item = f64>) {
        lock(&self.readings).extend(readings);
    }

    /// Hold every handshake for `delay`
    pub fn set_auth_delay(&self, delay: Duration) {
        *lock(&self.auth_delay) = Some(delay);
    }

    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn fail_auth(&self, fail: bool) {
        self.fail_auth.store(fail, Ordering::SeqCst);
    }

    pub fn fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reverse(&self, fail: bool) {
        self.fail_reverse.store(fail, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    pub fn handshake_count(&self) -> usize {
        self.handshake_count.load(Ordering::SeqCst)
    }

    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }

    pub fn reverse_socket_count(&self) -> usize {
        self.reverse_count.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    /// Devices passed to `close_transport`, in call order
    pub fn closed_devices(&self) -> Vec<DeviceId> {
        lock(&self.closed).clone()
    }

    pub fn is_open(&self, device: &DeviceId) -> bool {
        lock(&self.open).contains(&device.serial)
    }

    fn next_reading(&self) -> String {
        let mut readings = lock(&self.readings);
        let value = if readings.len() > 1 {
            readings.pop_front()
        } else {
            readings.front().copied()
        };
        value.map(|v| v.to_string()).unwrap_or_else(|| "0".to_string())
    }
}

impl DeviceTransport for FakeTransport {
    async fn open_transport(&self, device: &DeviceId) -> Result<TransportStream> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(Error::usb("device busy"));
        }
        lock(&self.open).insert(device.serial.clone());
        Ok(TransportStream::new(device.clone()))
    }

    async fn authenticate(
        &self,
        stream: TransportStream,
        _credentials: &CredentialStore,
    ) -> Result<SessionHandle> {
        self.handshake_count.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.auth_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(Error::unauthorized(stream.device().serial.clone()));
        }
        Ok(SessionHandle::from_stream(stream))
    }

    async fn query(&self, handle: &SessionHandle, command: &str) -> Result<String> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        if !self.is_open(handle.device()) {
            return Err(Error::adb(format!("device '{}' not found", handle.device())));
        }

        if command == "getprop" {
            return Ok(FAKE_GETPROP.to_string());
        }
        if let Some(rest) = command.strip_prefix("command -v ") {
            let name = rest.split_whitespace().next().unwrap_or_default();
            let found = lock(&self.binaries).contains(name);
            return Ok(if found { "yes\n" } else { "no\n" }.to_string());
        }
        Ok(self.next_reading())
    }

    async fn open_reverse_socket(&self, handle: &SessionHandle, _port: u16) -> Result<()> {
        self.reverse_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_reverse.load(Ordering::SeqCst) {
            return Err(Error::adb("cannot bind listener"));
        }
        if !self.is_open(handle.device()) {
            return Err(Error::adb(format!("device '{}' not found", handle.device())));
        }
        Ok(())
    }

    async fn close_transport(&self, device: &DeviceId) -> Result<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.closed).push(device.clone());
        lock(&self.open).remove(&device.serial);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(Error::adb("close failed"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_basic() {
        let device = test_device("0123");
        assert_eq!(device.serial, "0123");
        assert_eq!(device.vendor_id, 0x2ca3);
    }

    #[test]
    fn test_attach_notifies_subscriber() {
        let platform = FakePlatform::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut sub = platform
            .subscribe_hotplug(Arc::new(move |event| lock(&sink).push(event)))
            .unwrap();

        platform.attach(test_device("0123"));
        platform.detach(&test_device("0123"));
        sub.dispose();
        platform.attach(test_device("4567"));

        let seen = lock(&seen);
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], Some(test_device("0123")));
        assert_eq!(seen[1], None);
        assert_eq!(platform.dispose_count(), 1);
    }

    #[tokio::test]
    async fn test_readings_repeat_last() {
        let transport = FakeTransport::with_readings([0.0, 5.0]);
        let device = test_device("0123");
        let stream = transport.open_transport(&device).await.unwrap();
        let handle = transport
            .authenticate(stream, &CredentialStore::default())
            .await
            .unwrap();

        assert_eq!(transport.query(&handle, "temp").await.unwrap(), "0");
        assert_eq!(transport.query(&handle, "temp").await.unwrap(), "5");
        assert_eq!(transport.query(&handle, "temp").await.unwrap(), "5");
    }

    #[tokio::test]
    async fn test_query_after_close_fails() {
        let transport = FakeTransport::new();
        let device = test_device("0123");
        let stream = transport.open_transport(&device).await.unwrap();
        let handle = SessionHandle::from_stream(stream);

        transport.close_transport(&device).await.unwrap();
        assert!(transport.query(&handle, "temp").await.is_err());
        assert_eq!(transport.closed_devices(), vec![device]);
    }
}
