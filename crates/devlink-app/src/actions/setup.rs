//! Post-ready setup: reverse socket, product metadata and binary check

use devlink_core::prelude::*;
use devlink_core::ProductInfo;
use devlink_device::{DeviceCapabilities, DeviceTransport};

use crate::message::{Message, SessionToken};

use super::{send, MessageSender};

/// Open the reverse socket, then fetch product metadata.
///
/// Failures are logged and leave the session Ready.
pub async fn post_ready_setup<T>(
    capabilities: &DeviceCapabilities<T>,
    reverse_port: u16,
) -> (bool, Option<ProductInfo>)
where
    T: DeviceTransport + Sync,
{
    let reverse_socket_opened = match capabilities.open_reverse_socket(reverse_port).await {
        Ok(()) => {
            info!("Reverse socket open on tcp:{}", reverse_port);
            true
        }
        Err(e) => {
            warn!("Failed to open reverse socket on tcp:{}: {}", reverse_port, e);
            false
        }
    };

    let product_info = match capabilities.product_info().await {
        Ok(info) => {
            info!(
                "Product: {}",
                info.nice_name().unwrap_or_else(|| "unknown".to_string())
            );
            Some(info)
        }
        Err(e) => {
            warn!("Failed to fetch product info: {}", e);
            None
        }
    };

    (reverse_socket_opened, product_info)
}

pub fn spawn_post_ready<T>(
    token: SessionToken,
    capabilities: DeviceCapabilities<T>,
    reverse_port: u16,
    tx: MessageSender,
) where
    T: DeviceTransport + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let (reverse_socket_opened, product_info) =
            post_ready_setup(&capabilities, reverse_port).await;
        let _ = send(
            &tx,
            Message::PostReadyCompleted {
                token,
                reverse_socket_opened,
                product_info,
            },
        );
    });
}

pub fn spawn_binary_check<T>(
    token: SessionToken,
    capabilities: DeviceCapabilities<T>,
    names: Vec<String>,
    tx: MessageSender,
) where
    T: DeviceTransport + Send + Sync + 'static,
{
    tokio::spawn(async move {
        match capabilities.check_binaries(&names).await {
            Ok(binaries) => {
                let _ = send(&tx, Message::BinariesChecked { token, binaries });
            }
            Err(e) => warn!("Binary check failed: {}", e),
        }
    });
}
