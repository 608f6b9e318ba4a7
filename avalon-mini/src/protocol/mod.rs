//! The Avalon Mini's cgminer-style text protocol.
//!
//! The device listens on TCP port 4028. Every exchange is a fresh
//! connection: write a short ASCII command, half-close, read the reply
//! until the device closes. There is no session state, and the device
//! serves one request at a time.

mod client;
mod command;
mod error;
mod parser;

pub use client::{Client, DEFAULT_STATUS_COMMAND, DEFAULT_TIMEOUT, Device};
pub use command::{Ack, AckStatus, CommandKind, CommandRequest};
pub use error::DeviceError;
pub use parser::{POWER_DRAW_ORDINAL, ParsedStatus, parse};
