//! [`DeviceTransport`] implementation on top of a running ADB server
//!
//! The ADB server owns the USB interface and performs the RSA handshake with
//! the device; authentication here means waiting for the server to report the
//! device as `device` rather than `unauthorized`.

use std::collections::HashSet;
use std::sync::Mutex;

use devlink_core::prelude::*;
use devlink_core::DeviceId;

use super::client::AdbServer;
use crate::platform::{
    CredentialStore, DeviceTransport, SessionHandle, TransportStream,
};

const STATE_DEVICE: &str = "device";
const STATE_UNAUTHORIZED: &str = "unauthorized";

pub struct AdbServerTransport {
    server: AdbServer,
    /// Serials with an authenticated session
    open: Mutex<HashSet<String>>,
}

impl AdbServerTransport {
    pub fn new(server: AdbServer) -> Self {
        Self {
            server,
            open: Mutex::new(HashSet::new()),
        }
    }

    pub fn server(&self) -> &AdbServer {
        &self.server
    }

    fn open_serials(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.open.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_open(&self, handle: &SessionHandle) -> Result<()> {
        if self.open_serials().contains(&handle.device().serial) {
            Ok(())
        } else {
            Err(Error::adb(format!(
                "transport for {} is closed",
                handle.device()
            )))
        }
    }
}

impl DeviceTransport for AdbServerTransport {
    async fn open_transport(&self, device: &DeviceId) -> Result<TransportStream> {
        debug!("Opening transport to {} via {}", device, self.server.address());
        // Probe that the server can route to the device; the stream itself
        // is single-use so it is dropped right away.
        drop(self.server.transport(&device.serial).await?);
        Ok(TransportStream::new(device.clone()))
    }

    async fn authenticate(
        &self,
        stream: TransportStream,
        credentials: &CredentialStore,
    ) -> Result<SessionHandle> {
        if !credentials.is_present() {
            warn!(
                "No host key at {:?}; the adb server will generate one",
                credentials.key_path()
            );
        }

        let serial = stream.device().serial.clone();
        let state = self.server.get_state(&serial).await?;
        match state.trim() {
            STATE_DEVICE => {
                self.open_serials().insert(serial);
                Ok(SessionHandle::from_stream(stream))
            }
            STATE_UNAUTHORIZED => Err(Error::unauthorized(serial)),
            other => Err(Error::adb(format!("device {} is {}", serial, other))),
        }
    }

    async fn query(&self, handle: &SessionHandle, command: &str) -> Result<String> {
        self.ensure_open(handle)?;
        self.server.shell(&handle.device().serial, command).await
    }

    async fn open_reverse_socket(&self, handle: &SessionHandle, port: u16) -> Result<()> {
        self.ensure_open(handle)?;
        self.server
            .reverse_forward(&handle.device().serial, port, port)
            .await
    }

    async fn close_transport(&self, device: &DeviceId) -> Result<()> {
        let was_open = self.open_serials().remove(&device.serial);
        if !was_open {
            return Ok(());
        }
        self.server
            .kill_reverse_all(&device.serial)
            .await
            .map_err(|e| Error::cleanup_failure(format!("reverse forwards on {}", device), e))
    }
}
