use std::time::Duration;

use thiserror::Error;

/// Errors from talking to the device.
///
/// Every variant is a failed operation from the caller's point of view.
/// None of them are retried here; retry policy belongs to whoever drives
/// the polling schedule.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Host refused, unreachable, or the connection dropped mid-exchange.
    #[error("connection to {endpoint} failed: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// No complete response within the configured window.
    #[error("no complete response from {endpoint} within {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    /// The response could not be decoded or contained nothing we recognize.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl DeviceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DeviceError::Timeout { .. })
    }
}
