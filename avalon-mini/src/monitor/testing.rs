//! Scripted device for tests that drive a monitor.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::DeviceEndpoint;
use crate::protocol::{Ack, AckStatus, CommandRequest, Device, DeviceError, ParsedStatus};
use crate::types::{HashRate, SystemStatus, WorkLevel, WorkMode};

/// Replays a script of poll results and records commands. Once the
/// script runs out, every poll is refused.
pub struct ScriptedDevice {
    endpoint: DeviceEndpoint,
    polls: Mutex<VecDeque<Result<ParsedStatus, DeviceError>>>,
    pub commands: Arc<Mutex<Vec<CommandRequest>>>,
    pub ack: Ack,
}

impl ScriptedDevice {
    pub fn new(polls: Vec<Result<ParsedStatus, DeviceError>>) -> Self {
        Self {
            endpoint: DeviceEndpoint::new("10.0.0.2", 4028, "Den").unwrap(),
            polls: Mutex::new(polls.into()),
            commands: Arc::new(Mutex::new(Vec::new())),
            ack: Ack {
                status: AckStatus::Success,
                message: "ASC 0 set OK".into(),
            },
        }
    }
}

#[async_trait]
impl Device for ScriptedDevice {
    fn endpoint(&self) -> &DeviceEndpoint {
        &self.endpoint
    }

    async fn fetch_status(&self) -> Result<ParsedStatus, DeviceError> {
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(refused()))
    }

    async fn send_command(&self, command: CommandRequest) -> Result<Ack, DeviceError> {
        self.commands.lock().unwrap().push(command);
        Ok(self.ack.clone())
    }
}

pub fn refused() -> DeviceError {
    DeviceError::Connection {
        endpoint: "10.0.0.2:4028".into(),
        source: std::io::ErrorKind::ConnectionRefused.into(),
    }
}

/// A heating-mode device hashing at 0.45 TH/s.
pub fn working() -> ParsedStatus {
    ParsedStatus {
        hashrate: Some(HashRate::from_mhs(450_000.0)),
        inlet_temp_c: Some(23.5),
        target_temp_c: Some(30.0),
        power_draw_w: Some(850.0),
        system_status: Some(SystemStatus::InWork),
        mode: Some(WorkMode::Heating),
        level: Some(WorkLevel::Eco),
        soft_off: Some(false),
        display_on: Some(true),
    }
}
