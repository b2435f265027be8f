//! # devlink-device - Device Platform and Transport
//!
//! Everything that touches the physical device lives here, behind the
//! boundary traits the controller is written against.
//!
//! ## Public API
//!
//! ### Boundaries (`platform`)
//! - [`DevicePlatform`] - enumerate, select and watch devices
//! - [`DeviceTransport`] - open, authenticate, query and close a device
//! - [`DeviceSelector`] - user prompt used by the USB platform
//! - [`HotplugSubscription`] - release-once hot-plug registration
//!
//! ### Implementations
//! - [`UsbPlatform`] - `nusb` based discovery and hot-plug
//! - [`AdbServerTransport`] - transport through a local ADB server
//! - [`DeviceCapabilities`] - liveness, reverse socket and metadata queries
//!
//! ### Testing (`test-helpers` feature)
//! - `test_utils::FakePlatform`, `test_utils::FakeTransport`

pub mod adb;
pub mod capabilities;
pub mod platform;
pub mod props;
pub mod usb;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

pub use adb::{AdbServer, AdbServerTransport};
pub use capabilities::DeviceCapabilities;
pub use platform::{
    CredentialStore, DevicePlatform, DeviceSelector, DeviceTransport, HotplugCallback,
    HotplugSubscription, LocalDevicePlatform, LocalDeviceSelector, LocalDeviceTransport,
    SessionHandle, TransportStream,
};
pub use usb::UsbPlatform;
