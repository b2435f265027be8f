//! End-to-end controller scenarios against the in-memory device fakes
//!
//! Every test runs on a paused clock, so probe intervals elapse instantly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use devlink_app::{ControllerHandle, SessionController, SessionHooks, Settings};
use devlink_core::{ErrorKind, SessionSnapshot, SessionStatus};
use devlink_device::test_utils::{test_device, FakePlatform, FakeTransport};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const PROBE_MS: u64 = 1000;

fn settings(auto_connect: bool) -> Settings {
    let mut settings = Settings::default();
    settings.probe.interval_ms = PROBE_MS;
    settings.session.auto_connect = auto_connect;
    settings
}

fn start(
    platform: &FakePlatform,
    transport: &Arc<FakeTransport>,
    settings: Settings,
    hooks: SessionHooks,
) -> (ControllerHandle, JoinHandle<()>) {
    SessionController::spawn(
        Arc::new(platform.clone()),
        Arc::clone(transport),
        settings,
        hooks,
    )
}

async fn wait_for(
    rx: &mut watch::Receiver<SessionSnapshot>,
    predicate: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    tokio::time::timeout(Duration::from_secs(60), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for snapshot")
        .expect("controller stopped")
        .clone()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

/// Ready, with post-ready setup and the binary check finished
fn fully_ready(s: &SessionSnapshot) -> bool {
    s.is_ready() && s.reverse_socket_opened && !s.binaries.is_empty()
}

// ─────────────────────────────────────────────────────────
// Scenarios
// ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_attach_connects_and_becomes_ready() {
    let device = test_device("0123");
    let platform = FakePlatform::new();
    let transport = Arc::new(FakeTransport::with_readings([42.0]).with_binaries(["busybox"]));
    let (handle, _task) = start(&platform, &transport, settings(true), SessionHooks::new());
    let mut rx = handle.subscribe();

    wait_until(|| platform.is_subscribed()).await;
    platform.attach(device.clone());

    let snapshot = wait_for(&mut rx, fully_ready).await;
    assert_eq!(snapshot.device, Some(device));
    assert_eq!(snapshot.last_reading, Some(42.0));
    let info = snapshot.product_info.expect("product info");
    assert_eq!(info.model.as_deref(), Some("FPV Goggles"));
    assert_eq!(snapshot.binaries.get("busybox"), Some(&true));
    assert_eq!(snapshot.binaries.get("opkg"), Some(&false));
    assert!(snapshot.error.is_none());
    assert_eq!(transport.reverse_socket_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_handshake_failure_marks_failed() {
    let device = test_device("0123");
    let platform = FakePlatform::new();
    let transport = Arc::new(FakeTransport::with_readings([42.0]));
    transport.fail_auth(true);
    let (handle, _task) = start(&platform, &transport, settings(false), SessionHooks::new());
    let mut rx = handle.subscribe();

    let outcome = handle.connect(device.clone()).await;
    assert_eq!(outcome.unwrap_err().kind, ErrorKind::ConnectionFailed);

    let snapshot = wait_for(&mut rx, |s| s.status == SessionStatus::Failed).await;
    assert_eq!(
        snapshot.error.map(|e| e.kind),
        Some(ErrorKind::ConnectionFailed)
    );

    tokio::time::sleep(Duration::from_millis(PROBE_MS * 5)).await;
    assert_eq!(transport.query_count(), 0);
    assert_eq!(transport.closed_devices(), vec![device.clone()]);
    assert!(!transport.is_open(&device));
}

#[tokio::test(start_paused = true)]
async fn test_detach_while_ready_releases_everything() {
    let device = test_device("0123");
    let platform = FakePlatform::with_devices([device.clone()]);
    let transport = Arc::new(FakeTransport::with_readings([42.0]));
    let (handle, _task) = start(&platform, &transport, settings(true), SessionHooks::new());
    let mut rx = handle.subscribe();

    wait_for(&mut rx, fully_ready).await;
    platform.detach(&device);

    let snapshot = wait_for(&mut rx, |s| s.status == SessionStatus::Disconnected).await;
    assert!(snapshot.device.is_none());
    assert!(snapshot.error.is_none());
    assert!(!snapshot.reverse_socket_opened);
    assert_eq!(transport.closed_devices(), vec![device.clone()]);

    let queries = transport.query_count();
    tokio::time::sleep(Duration::from_millis(PROBE_MS * 5)).await;
    assert_eq!(transport.query_count(), queries);

    platform.detach(&device);
    tokio::time::sleep(Duration::from_millis(PROBE_MS)).await;
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_double_connect_runs_one_handshake() {
    let device = test_device("0123");
    let platform = FakePlatform::new();
    let transport = Arc::new(FakeTransport::with_readings([42.0]));
    transport.set_auth_delay(Duration::from_millis(500));
    let (handle, _task) = start(&platform, &transport, settings(false), SessionHooks::new());

    let (first, second) = tokio::join!(handle.connect(device.clone()), handle.connect(device.clone()));

    assert_eq!(first, Ok(device.clone()));
    assert_eq!(second, Ok(device));
    assert_eq!(transport.open_count(), 1);
    assert_eq!(transport.handshake_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ready_only_after_positive_reading() {
    let device = test_device("0123");
    let platform = FakePlatform::new();
    let transport = Arc::new(FakeTransport::with_readings([0.0, 5.0]));
    let (handle, _task) = start(&platform, &transport, settings(false), SessionHooks::new());
    let mut rx = handle.subscribe();

    handle.connect(device).await.unwrap();

    let first = wait_for(&mut rx, |s| s.last_reading.is_some()).await;
    assert_eq!(first.last_reading, Some(0.0));
    assert_eq!(first.status, SessionStatus::Probing);

    let ready = wait_for(&mut rx, |s| s.is_ready()).await;
    assert_eq!(ready.last_reading, Some(5.0));
}

// ─────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_hotplug_and_connect_storm_keeps_one_session() {
    let device = test_device("0123");
    let platform = FakePlatform::with_devices([device.clone()]);
    let transport = Arc::new(FakeTransport::with_readings([42.0]));
    transport.set_auth_delay(Duration::from_millis(50));
    let (handle, _task) = start(&platform, &transport, settings(true), SessionHooks::new());
    let mut rx = handle.subscribe();

    wait_until(|| platform.is_subscribed()).await;
    for _ in 0..3 {
        platform.attach(device.clone());
        let h = handle.clone();
        let d = device.clone();
        tokio::spawn(async move { h.connect(d).await });
        platform.detach(&device);
        platform.attach(device.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    wait_for(&mut rx, fully_ready).await;
    let queries = transport.query_count();
    tokio::time::sleep(Duration::from_millis(PROBE_MS * 10)).await;
    let ticks = transport.query_count() - queries;

    assert!((10..=11).contains(&ticks), "probe ticked {} times", ticks);
    assert!(transport.is_open(&device));
    assert_eq!(handle.snapshot().status, SessionStatus::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_promotion_and_reverse_socket_once() {
    let device = test_device("0123");
    let platform = FakePlatform::new();
    let transport = Arc::new(FakeTransport::with_readings([42.0, 43.0, 44.0]));
    let ready_count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ready_count);
    let hooks = SessionHooks::new().on_ready(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let (handle, _task) = start(&platform, &transport, settings(false), hooks);
    let mut rx = handle.subscribe();

    handle.connect(device).await.unwrap();
    wait_for(&mut rx, fully_ready).await;
    wait_for(&mut rx, |s| s.last_reading == Some(44.0)).await;
    tokio::time::sleep(Duration::from_millis(PROBE_MS * 3)).await;

    assert_eq!(transport.reverse_socket_count(), 1);
    assert_eq!(ready_count.load(Ordering::SeqCst), 1);
    assert!(handle.snapshot().reverse_socket_opened);
}

#[tokio::test(start_paused = true)]
async fn test_reverse_socket_failure_keeps_session_ready() {
    let device = test_device("0123");
    let platform = FakePlatform::new();
    let transport = Arc::new(FakeTransport::with_readings([42.0]));
    transport.fail_reverse(true);
    let (handle, _task) = start(&platform, &transport, settings(false), SessionHooks::new());
    let mut rx = handle.subscribe();

    handle.connect(device).await.unwrap();
    let snapshot = wait_for(&mut rx, |s| s.is_ready() && s.product_info.is_some()).await;

    assert!(!snapshot.reverse_socket_opened);
    assert!(snapshot.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_with_nothing_held() {
    let platform = FakePlatform::new();
    let transport = Arc::new(FakeTransport::new());
    let (handle, task) = start(&platform, &transport, settings(false), SessionHooks::new());

    wait_until(|| platform.is_subscribed()).await;
    handle.shutdown().await.unwrap();
    task.await.unwrap();

    assert_eq!(transport.close_count(), 0);
    assert_eq!(platform.dispose_count(), 1);
    assert!(!handle.is_running());
    assert!(handle.shutdown().await.is_ok());
    assert!(handle.connect(test_device("0123")).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_session() {
    let device = test_device("0123");
    let platform = FakePlatform::new();
    let transport = Arc::new(FakeTransport::with_readings([42.0]));
    let (handle, task) = start(&platform, &transport, settings(false), SessionHooks::new());
    let mut rx = handle.subscribe();

    handle.connect(device.clone()).await.unwrap();
    wait_for(&mut rx, |s| s.is_ready()).await;
    handle.shutdown().await.unwrap();
    task.await.unwrap();

    assert_eq!(transport.closed_devices(), vec![device]);
    assert_eq!(handle.snapshot().status, SessionStatus::Disconnected);
    assert!(!platform.is_subscribed());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handles_stops_controller() {
    let device = test_device("0123");
    let platform = FakePlatform::new();
    let transport = Arc::new(FakeTransport::with_readings([42.0]));
    let (handle, task) = start(&platform, &transport, settings(false), SessionHooks::new());
    let mut rx = handle.subscribe();

    handle.connect(device.clone()).await.unwrap();
    wait_for(&mut rx, |s| s.is_ready()).await;
    drop(handle);

    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("controller did not stop")
        .unwrap();
    assert_eq!(transport.closed_devices(), vec![device]);
}

// ─────────────────────────────────────────────────────────
// User Selection
// ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_selection_cancelled_is_benign_failure() {
    let platform = FakePlatform::new();
    platform.set_selection(None);
    let transport = Arc::new(FakeTransport::new());
    let (handle, _task) = start(&platform, &transport, settings(false), SessionHooks::new());
    let mut rx = handle.subscribe();

    let outcome = handle.select_and_connect().await;
    assert_eq!(outcome.unwrap_err().kind, ErrorKind::SelectionCancelled);

    let snapshot = wait_for(&mut rx, |s| s.status == SessionStatus::Failed).await;
    assert!(snapshot.error.is_some_and(|e| e.is_benign()));
    assert_eq!(transport.open_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_selection_suppresses_auto_connect() {
    let device = test_device("0123");
    let other = test_device("4567");
    let platform = FakePlatform::new();
    platform.set_selection(Some(device.clone()));
    platform.set_selection_delay(Duration::from_millis(500));
    let transport = Arc::new(FakeTransport::with_readings([42.0]));
    let (handle, _task) = start(&platform, &transport, settings(true), SessionHooks::new());
    let mut rx = handle.subscribe();
    wait_until(|| platform.is_subscribed()).await;

    let selecting = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.select_and_connect().await })
    };
    wait_until(|| platform.selection_count() == 1).await;
    platform.attach(other.clone());

    assert_eq!(selecting.await.unwrap(), Ok(device.clone()));
    let snapshot = wait_for(&mut rx, |s| s.is_ready()).await;
    assert_eq!(snapshot.device, Some(device));
    assert!(!transport.is_open(&other));
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_selecting() {
    let device = test_device("0123");
    let platform = FakePlatform::new();
    platform.set_selection(Some(device.clone()));
    platform.set_selection_delay(Duration::from_millis(500));
    let transport = Arc::new(FakeTransport::with_readings([42.0]));
    let (handle, _task) = start(&platform, &transport, settings(false), SessionHooks::new());
    let mut rx = handle.subscribe();

    let selecting = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.select_and_connect().await })
    };
    wait_until(|| platform.selection_count() == 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.disconnect().await.unwrap();

    assert_eq!(handle.snapshot().status, SessionStatus::Disconnected);
    let outcome = selecting.await.unwrap();
    assert_eq!(outcome.unwrap_err().kind, ErrorKind::SelectionCancelled);

    // The prompt answers after the disconnect; nothing connects
    tokio::time::sleep(Duration::from_secs(5)).await;
    let snapshot = wait_for(&mut rx, |_| true).await;
    assert_eq!(snapshot.status, SessionStatus::Disconnected);
    assert!(snapshot.device.is_none());
    assert_eq!(transport.open_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_then_reconnect() {
    let device = test_device("0123");
    let platform = FakePlatform::new();
    let transport = Arc::new(FakeTransport::with_readings([42.0]));
    let resets = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&resets);
    let hooks = SessionHooks::new().on_reset(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let (handle, _task) = start(&platform, &transport, settings(false), hooks);
    let mut rx = handle.subscribe();

    handle.connect(device.clone()).await.unwrap();
    wait_for(&mut rx, fully_ready).await;
    handle.disconnect().await.unwrap();
    assert_eq!(handle.snapshot().status, SessionStatus::Disconnected);
    assert_eq!(transport.close_count(), 1);
    assert_eq!(resets.load(Ordering::SeqCst), 2);

    handle.connect(device.clone()).await.unwrap();
    wait_for(&mut rx, |s| s.is_ready()).await;
    assert_eq!(transport.handshake_count(), 2);
}
