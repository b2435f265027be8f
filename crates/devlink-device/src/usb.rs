//! USB host platform backed by `nusb`
//!
//! Enumerates devices exposing an ADB interface, remembers which serials the
//! user granted, and forwards hot-plug events for ADB-capable devices.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use devlink_core::prelude::*;
use devlink_core::DeviceId;
use futures_util::StreamExt;
use nusb::hotplug::HotplugEvent;

use crate::platform::{
    DevicePlatform, DeviceSelector, HotplugCallback, HotplugSubscription,
};

/// Vendor-specific interface class used by ADB
const ADB_CLASS: u8 = 0xff;
const ADB_SUBCLASS: u8 = 0x42;
const ADB_PROTOCOL: u8 = 0x01;

/// Whether the device exposes an ADB interface
fn is_adb_device(info: &nusb::DeviceInfo) -> bool {
    info.interfaces().any(|iface| {
        iface.class() == ADB_CLASS
            && iface.subclass() == ADB_SUBCLASS
            && iface.protocol() == ADB_PROTOCOL
    })
}

/// Convert a USB device into a device identifier; devices without a serial
/// cannot be addressed through ADB.
fn device_id(info: &nusb::DeviceInfo) -> Option<DeviceId> {
    let serial = info.serial_number().filter(|s| !s.is_empty())?;
    let mut id = DeviceId::new(serial).with_usb_ids(info.vendor_id(), info.product_id());
    if let Some(product) = info.product_string() {
        id = id.with_name(product);
    }
    Some(id)
}

/// All currently attached ADB devices
pub fn list_adb_devices() -> Result<Vec<DeviceId>> {
    let devices = nusb::list_devices().map_err(|e| Error::usb(e.to_string()))?;
    Ok(devices
        .filter(is_adb_device)
        .filter_map(|info| device_id(&info))
        .collect())
}

pub struct UsbPlatform<S> {
    selector: S,
    authorized: Mutex<HashSet<String>>,
    trust_all: bool,
}

impl<S> UsbPlatform<S> {
    /// `authorized` seeds the serials auto-connect may use; with `trust_all`
    /// every attached ADB device counts as authorized.
    pub fn new(selector: S, authorized: impl IntoIterator<Item = String>, trust_all: bool) -> Self {
        Self {
            selector,
            authorized: Mutex::new(authorized.into_iter().collect()),
            trust_all,
        }
    }

    fn authorized(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.authorized
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_authorized(&self, device: &DeviceId) -> bool {
        self.trust_all || self.authorized().contains(&device.serial)
    }

    fn grant(&self, device: &DeviceId) {
        if self.authorized().insert(device.serial.clone()) {
            info!("Granted access to {}", device.display_name());
        }
    }
}

impl<S: DeviceSelector + Sync> DevicePlatform for UsbPlatform<S> {
    async fn enumerate_authorized_devices(&self) -> Result<Vec<DeviceId>> {
        let devices = list_adb_devices()?;
        Ok(devices
            .into_iter()
            .filter(|device| self.is_authorized(device))
            .collect())
    }

    async fn request_device_selection(&self) -> Result<DeviceId> {
        let candidates = list_adb_devices()?;
        if candidates.is_empty() {
            return Err(Error::NoDevice);
        }

        let device = self
            .selector
            .select(candidates)
            .await
            .ok_or(Error::SelectionCancelled)?;
        self.grant(&device);
        Ok(device)
    }

    fn subscribe_hotplug(&self, callback: HotplugCallback) -> Result<HotplugSubscription> {
        let watch = nusb::watch_devices().map_err(|e| Error::usb(e.to_string()))?;

        // Disconnect events only carry the bus id, so track what we announced
        let mut known: HashMap<nusb::DeviceId, DeviceId> = nusb::list_devices()
            .map(|devices| {
                devices
                    .filter(is_adb_device)
                    .filter_map(|info| device_id(&info).map(|id| (info.id(), id)))
                    .collect()
            })
            .unwrap_or_default();

        let task = tokio::spawn(async move {
            let mut watch = Box::pin(watch);
            while let Some(event) = watch.next().await {
                match event {
                    HotplugEvent::Connected(info) => {
                        if !is_adb_device(&info) {
                            continue;
                        }
                        if let Some(id) = device_id(&info) {
                            debug!("USB attach: {}", id.display_name());
                            known.insert(info.id(), id.clone());
                            callback(Some(id));
                        }
                    }
                    HotplugEvent::Disconnected(bus_id) => {
                        if let Some(id) = known.remove(&bus_id) {
                            debug!("USB detach: {}", id.display_name());
                            callback(None);
                        }
                    }
                }
            }
            debug!("USB hot-plug stream ended");
        });

        Ok(HotplugSubscription::new(move || task.abort()))
    }
}
