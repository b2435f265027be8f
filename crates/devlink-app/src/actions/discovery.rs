//! Device enumeration and user selection tasks

use std::sync::Arc;

use devlink_core::prelude::*;
use devlink_core::ErrorInfo;
use devlink_device::DevicePlatform;

use crate::message::{Message, RequestId};

use super::{send, MessageSender};

/// Enumerate authorized devices for auto-connect.
///
/// Enumeration errors are logged and reported as an empty list so the
/// controller clears its in-flight request.
pub fn spawn_enumerate<P>(request: RequestId, platform: Arc<P>, tx: MessageSender)
where
    P: DevicePlatform + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let devices = match platform.enumerate_authorized_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Failed to enumerate devices: {}", e);
                Vec::new()
            }
        };
        let _ = send(&tx, Message::DevicesEnumerated { request, devices });
    });
}

/// Prompt the user for a device
pub fn spawn_selection<P>(request: RequestId, platform: Arc<P>, tx: MessageSender)
where
    P: DevicePlatform + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let result = platform
            .request_device_selection()
            .await
            .map_err(|e| ErrorInfo::from(&e));
        let _ = send(&tx, Message::SelectionResolved { request, result });
    });
}
