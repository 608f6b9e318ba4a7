//! TCP client for the device's status port.

use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use super::command::{Ack, CommandRequest};
use super::error::DeviceError;
use super::parser::{self, ParsedStatus};
use crate::config::DeviceEndpoint;
use crate::tracing::prelude::*;

/// Bound on a whole exchange: connect, write, and read to close.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Request whose reply carries every field the parser knows.
pub const DEFAULT_STATUS_COMMAND: &str = "estats";

/// The operations the monitor needs from a device.
///
/// [`Client`] is the real implementation; tests substitute scripted
/// devices.
#[async_trait]
pub trait Device: Send + Sync {
    fn endpoint(&self) -> &DeviceEndpoint;

    /// Request and parse the current status.
    async fn fetch_status(&self) -> Result<ParsedStatus, DeviceError>;

    /// Send one control command. Never retried here.
    async fn send_command(&self, command: CommandRequest) -> Result<Ack, DeviceError>;
}

/// Whether an exchange fails if the reply doesn't arrive in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Required,
    /// Commands take effect once written; the reply is only an
    /// acknowledgement.
    Optional,
}

/// Client for one device endpoint.
///
/// Each operation opens its own connection and closes it before
/// returning. Operations issued through one client are serialized: the
/// device handles one request at a time and interleaved exchanges garble
/// each other.
#[derive(Debug)]
pub struct Client {
    endpoint: DeviceEndpoint,
    timeout: Duration,
    status_command: String,
    gate: Mutex<()>,
}

impl Client {
    pub fn new(endpoint: DeviceEndpoint) -> Self {
        Self {
            endpoint,
            timeout: DEFAULT_TIMEOUT,
            status_command: DEFAULT_STATUS_COMMAND.to_string(),
            gate: Mutex::new(()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_status_command(mut self, command: impl Into<String>) -> Self {
        self.status_command = command.into();
        self
    }

    /// Raw `summary` reply, for diagnostics.
    pub async fn summary(&self) -> Result<String, DeviceError> {
        self.request("summary").await
    }

    /// Raw `estats` reply, for diagnostics.
    pub async fn estats(&self) -> Result<String, DeviceError> {
        self.request("estats").await
    }

    /// Send an arbitrary command and return the decoded reply.
    pub async fn request(&self, command: &str) -> Result<String, DeviceError> {
        let bytes = self.exchange(command, Reply::Required).await?;
        Ok(decode(&bytes))
    }

    async fn exchange(&self, command: &str, reply: Reply) -> Result<Vec<u8>, DeviceError> {
        let _guard = self.gate.lock().await;
        let address = self.endpoint.address();

        debug!(endpoint = %address, command, "Sending command");

        let started = tokio::time::Instant::now();
        let remaining = |timeout: Duration| timeout.saturating_sub(started.elapsed());

        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| self.timeout_error())?
            .map_err(|e| self.connection_error(e))?;

        tokio::time::timeout(remaining(self.timeout), async {
            stream.write_all(command.as_bytes()).await?;
            // Half-close tells the device the request is complete.
            stream.shutdown().await
        })
        .await
        .map_err(|_| self.timeout_error())?
        .map_err(|e| self.connection_error(e))?;

        let mut buf = Vec::with_capacity(4096);
        match tokio::time::timeout(remaining(self.timeout), stream.read_to_end(&mut buf)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(self.connection_error(e)),
            Err(_) if reply == Reply::Optional => {
                debug!(endpoint = %address, received = buf.len(), "No acknowledgement before timeout");
            }
            Err(_) => return Err(self.timeout_error()),
        }

        trace!(endpoint = %address, bytes = buf.len(), "Received reply");
        Ok(buf)
    }

    fn connection_error(&self, source: std::io::Error) -> DeviceError {
        DeviceError::Connection {
            endpoint: self.endpoint.address(),
            source,
        }
    }

    fn timeout_error(&self) -> DeviceError {
        DeviceError::Timeout {
            endpoint: self.endpoint.address(),
            timeout: self.timeout,
        }
    }
}

#[async_trait]
impl Device for Client {
    fn endpoint(&self) -> &DeviceEndpoint {
        &self.endpoint
    }

    async fn fetch_status(&self) -> Result<ParsedStatus, DeviceError> {
        let text = self.request(&self.status_command).await?;
        let status = parser::parse(&text)?;

        let missing = status.missing_fields();
        if !missing.is_empty() {
            debug!(endpoint = %self.endpoint, ?missing, "Partial status");
        }
        Ok(status)
    }

    async fn send_command(&self, command: CommandRequest) -> Result<Ack, DeviceError> {
        let wire = command.encode(OffsetDateTime::now_utc().unix_timestamp());
        let bytes = self.exchange(&wire, Reply::Optional).await?;

        let ack = Ack::parse(&decode(&bytes));

        info!(
            endpoint = %self.endpoint,
            %command,
            status = %ack.status,
            message = %ack.message,
            "Command sent"
        );
        Ok(ack)
    }
}

/// Decode a reply as text. cgminer terminates replies with a NUL.
///
/// Bytes that aren't UTF-8 (a Latin-1 SSID, line noise) become U+FFFD and
/// cost only the field they sit in; a reply that is all noise fails in the
/// parser for lack of any recognized field.
fn decode(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |last| last + 1);

    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
