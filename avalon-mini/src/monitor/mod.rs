//! Per-device polling and command relay.
//!
//! One [`Monitor`] task owns everything mutable about a device: the
//! client, the power debouncer, and the entity store. Polls and commands
//! go through that single task, so they never hold two connections to the
//! device at once. Readers get state from a `watch` channel.

mod task;
#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

use crate::api_client::types::DeviceState;
use crate::protocol::{Ack, CommandRequest, DeviceError};

pub use task::Monitor;

/// Commands from API handlers to the monitor.
///
/// Each carries a oneshot reply channel so the handler can await the
/// result.
pub enum MonitorCommand {
    /// Send a control command to the device.
    Send {
        command: CommandRequest,
        reply: oneshot::Sender<Result<Ack, DeviceError>>,
    },

    /// Poll now rather than at the next tick.
    Refresh {
        reply: oneshot::Sender<Result<(), DeviceError>>,
    },
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("device rejected {command}: {message}")]
    Rejected { command: String, message: String },

    #[error("monitor is not running")]
    Stopped,
}

/// Cloneable handle to a running [`Monitor`].
#[derive(Clone, Debug)]
pub struct MonitorHandle {
    cmd_tx: mpsc::Sender<MonitorCommand>,
    state_rx: watch::Receiver<DeviceState>,
}

impl MonitorHandle {
    /// Latest published state.
    pub fn state(&self) -> DeviceState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.state_rx.clone()
    }

    /// Send a command and wait for the device's acknowledgement.
    ///
    /// A reply with an error status becomes [`MonitorError::Rejected`].
    pub async fn send(&self, command: CommandRequest) -> Result<Ack, MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(MonitorCommand::Send { command, reply })
            .await
            .map_err(|_| MonitorError::Stopped)?;

        let ack = rx.await.map_err(|_| MonitorError::Stopped)??;
        if ack.is_accepted() {
            Ok(ack)
        } else {
            Err(MonitorError::Rejected {
                command: command.to_string(),
                message: ack.message,
            })
        }
    }

    /// Poll immediately and wait for the result.
    pub async fn refresh(&self) -> Result<(), MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(MonitorCommand::Refresh { reply })
            .await
            .map_err(|_| MonitorError::Stopped)?;
        rx.await.map_err(|_| MonitorError::Stopped)??;
        Ok(())
    }
}
