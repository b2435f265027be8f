//! Minimal client for the ADB server's smart-socket protocol
//!
//! Every request is a 4-digit hex length followed by the payload. The server
//! answers `OKAY`, or `FAIL` followed by a length-prefixed message.

use std::time::Duration;

use devlink_core::prelude::*;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5037;

/// Longest payload the length prefix can describe
const MAX_PAYLOAD: usize = 0xffff;

/// Address and timeout of a running ADB server
#[derive(Debug, Clone)]
pub struct AdbServer {
    host: String,
    port: u16,
    timeout: Duration,
}

impl Default for AdbServer {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT, Duration::from_secs(5))
    }
}

impl AdbServer {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Device state as reported by the server: `device`, `unauthorized`, `offline`...
    pub async fn get_state(&self, serial: &str) -> Result<String> {
        self.timed("get-state", async {
            let mut stream = self.connect().await?;
            request(&mut stream, &format!("host-serial:{}:get-state", serial)).await?;
            read_length_prefixed(&mut stream).await
        })
        .await
    }

    /// Open a stream switched to the device's transport
    pub async fn transport(&self, serial: &str) -> Result<TcpStream> {
        self.timed("transport", self.transport_stream(serial)).await
    }

    /// Run a shell command and collect its output
    pub async fn shell(&self, serial: &str, command: &str) -> Result<String> {
        self.timed("shell", async {
            let mut stream = self.transport_stream(serial).await?;
            request(&mut stream, &format!("shell:{}", command)).await?;
            let mut output = Vec::new();
            stream.read_to_end(&mut output).await?;
            Ok(String::from_utf8_lossy(&output).into_owned())
        })
        .await
    }

    /// Route device-side `tcp:remote` connections to host-side `tcp:local`
    pub async fn reverse_forward(&self, serial: &str, remote: u16, local: u16) -> Result<()> {
        self.timed("reverse", async {
            let mut stream = self.transport_stream(serial).await?;
            request(
                &mut stream,
                &format!("reverse:forward:tcp:{};tcp:{}", remote, local),
            )
            .await?;
            // Second status arrives once the listener is bound; older servers
            // close the stream instead.
            match read_status(&mut stream).await {
                Ok(()) => Ok(()),
                Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(()),
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// Remove every reverse forward registered on the device
    pub async fn kill_reverse_all(&self, serial: &str) -> Result<()> {
        self.timed("reverse-kill", async {
            let mut stream = self.transport_stream(serial).await?;
            request(&mut stream, "reverse:killforward-all").await
        })
        .await
    }

    async fn connect(&self) -> Result<TcpStream> {
        TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| Error::adb(format!("cannot reach adb server at {}: {}", self.address(), e)))
    }

    async fn transport_stream(&self, serial: &str) -> Result<TcpStream> {
        let mut stream = self.connect().await?;
        request(&mut stream, &format!("host:transport:{}", serial)).await?;
        Ok(stream)
    }

    async fn timed<T>(
        &self,
        operation: &str,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(
                format!("adb {}", operation),
                self.timeout.as_millis() as u64,
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Wire Format
// ─────────────────────────────────────────────────────────────────

/// Frame a request payload with its hex length prefix
pub fn encode_request(payload: &str) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD {
        return Err(Error::protocol(format!(
            "request too long ({} bytes)",
            payload.len()
        )));
    }
    Ok(format!("{:04x}{}", payload.len(), payload).into_bytes())
}

async fn request(stream: &mut TcpStream, payload: &str) -> Result<()> {
    trace!("adb request: {}", payload);
    stream.write_all(&encode_request(payload)?).await?;
    read_status(stream).await
}

/// Read an `OKAY`/`FAIL` status word
pub async fn read_status<R: AsyncRead + Unpin>(reader: &mut R) -> Result<()> {
    let mut status = [0u8; 4];
    reader.read_exact(&mut status).await?;
    match &status {
        b"OKAY" => Ok(()),
        b"FAIL" => {
            let message = read_length_prefixed(reader).await?;
            Err(Error::adb(message))
        }
        other => Err(Error::protocol(format!(
            "unexpected status {:?}",
            String::from_utf8_lossy(other)
        ))),
    }
}

/// Read a 4-digit hex length followed by that many bytes
pub async fn read_length_prefixed<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix).await?;
    let prefix = std::str::from_utf8(&prefix)
        .map_err(|_| Error::protocol("non-ascii length prefix"))?;
    let len = usize::from_str_radix(prefix, 16)
        .map_err(|_| Error::protocol(format!("bad length prefix {:?}", prefix)))?;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(String::from_utf8_lossy(&body).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_encode_request() {
        assert_eq!(
            encode_request("host:version").unwrap(),
            b"000chost:version".to_vec()
        );
        assert!(encode_request(&"x".repeat(MAX_PAYLOAD + 1)).is_err());
    }

    #[tokio::test]
    async fn test_read_status_okay() {
        let mut reader: &[u8] = b"OKAY";
        assert!(read_status(&mut reader).await.is_ok());
    }

    #[tokio::test]
    async fn test_read_status_fail_carries_message() {
        let mut reader: &[u8] = b"FAIL0010device not found";
        let err = read_status(&mut reader).await.unwrap_err();
        assert_eq!(err.to_string(), "ADB error: device not found");
    }

    #[tokio::test]
    async fn test_read_status_garbage() {
        let mut reader: &[u8] = b"WHAT";
        let err = read_status(&mut reader).await.unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_read_length_prefixed() {
        let mut reader: &[u8] = b"0006devicetrailing";
        assert_eq!(read_length_prefixed(&mut reader).await.unwrap(), "device");
    }

    #[tokio::test]
    async fn test_read_length_prefixed_truncated() {
        let mut reader: &[u8] = b"0010dev";
        assert!(read_length_prefixed(&mut reader).await.is_err());
    }

    #[tokio::test]
    async fn test_get_state_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut prefix = [0u8; 4];
            socket.read_exact(&mut prefix).await.unwrap();
            let len = usize::from_str_radix(std::str::from_utf8(&prefix).unwrap(), 16).unwrap();
            let mut payload = vec![0u8; len];
            socket.read_exact(&mut payload).await.unwrap();
            socket.write_all(b"OKAY000cunauthorized").await.unwrap();
            String::from_utf8(payload).unwrap()
        });

        let adb = AdbServer::new("127.0.0.1", port, Duration::from_secs(2));
        assert_eq!(adb.get_state("0123").await.unwrap(), "unauthorized");
        assert_eq!(server.await.unwrap(), "host-serial:0123:get-state");
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let adb = AdbServer::new("127.0.0.1", port, Duration::from_secs(2));
        let err = adb.get_state("0123").await.unwrap_err();
        assert!(matches!(err, Error::Adb { .. }));
    }
}
