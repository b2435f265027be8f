//! Capability wrapper around an authenticated session handle

use std::collections::BTreeMap;
use std::sync::Arc;

use devlink_core::prelude::*;
use devlink_core::{DeviceId, ProductInfo};

use crate::platform::{DeviceTransport, SessionHandle};
use crate::props;

/// Shell command dumping all system properties
const GETPROP_COMMAND: &str = "getprop";

/// Operations available on an authenticated device
pub struct DeviceCapabilities<T> {
    transport: Arc<T>,
    handle: SessionHandle,
}

impl<T> Clone for DeviceCapabilities<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            handle: self.handle.clone(),
        }
    }
}

impl<T> std::fmt::Debug for DeviceCapabilities<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCapabilities")
            .field("handle", &self.handle)
            .finish()
    }
}

impl<T: DeviceTransport + Sync> DeviceCapabilities<T> {
    pub fn new(transport: Arc<T>, handle: SessionHandle) -> Self {
        Self { transport, handle }
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn device(&self) -> &DeviceId {
        self.handle.device()
    }

    /// Run the liveness command and parse its output.
    ///
    /// Output that isn't a number yields `Ok(None)`; only transport failures
    /// are errors.
    pub async fn liveness(&self, command: &str) -> Result<Option<f64>> {
        let output = self.transport.query(&self.handle, command).await?;
        let reading = props::parse_reading(&output);
        if reading.is_none() {
            trace!("Unparseable liveness output: {:?}", output.trim());
        }
        Ok(reading)
    }

    pub async fn open_reverse_socket(&self, port: u16) -> Result<()> {
        self.transport.open_reverse_socket(&self.handle, port).await
    }

    pub async fn product_info(&self) -> Result<ProductInfo> {
        let output = self.transport.query(&self.handle, GETPROP_COMMAND).await?;
        Ok(props::parse_product_info(&output))
    }

    /// Check whether `name` resolves on the device's PATH
    pub async fn has_binary(&self, name: &str) -> Result<bool> {
        if !props::is_valid_binary_name(name) {
            return Err(Error::protocol(format!("invalid binary name: {:?}", name)));
        }
        let output = self
            .transport
            .query(&self.handle, &props::binary_check_command(name))
            .await?;
        Ok(output.trim() == "yes")
    }

    /// Check every name in `names`, keyed by name.
    ///
    /// A name that cannot be checked safely is recorded as absent; transport
    /// failures abort the whole check.
    pub async fn check_binaries(&self, names: &[String]) -> Result<BTreeMap<String, bool>> {
        let mut found = BTreeMap::new();
        for name in names {
            let present = if props::is_valid_binary_name(name) {
                self.has_binary(name).await?
            } else {
                warn!("Skipping binary check for invalid name {:?}", name);
                false
            };
            found.insert(name.clone(), present);
        }
        Ok(found)
    }
}
