//! Control commands and their acknowledgements.

use std::fmt;

use strum::Display;

use crate::types::{WorkLevel, WorkMode};

/// What a [`CommandRequest`] asks the device to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CommandKind {
    PowerOn,
    PowerOff,
    SetMode,
    SetLevel,
    SetDisplay,
}

/// A single control command, consumed once by the client.
///
/// The parameter of each kind is carried in the variant so a request can't
/// be built with a missing or mistyped argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRequest {
    /// Soft start.
    PowerOn,
    /// Soft stop to standby. Not an electrical cutoff.
    PowerOff,
    SetMode(WorkMode),
    SetLevel(WorkLevel),
    /// Front display on or off.
    SetDisplay(bool),
}

impl CommandRequest {
    pub fn power(on: bool) -> Self {
        if on {
            CommandRequest::PowerOn
        } else {
            CommandRequest::PowerOff
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            CommandRequest::PowerOn => CommandKind::PowerOn,
            CommandRequest::PowerOff => CommandKind::PowerOff,
            CommandRequest::SetMode(_) => CommandKind::SetMode,
            CommandRequest::SetLevel(_) => CommandKind::SetLevel,
            CommandRequest::SetDisplay(_) => CommandKind::SetDisplay,
        }
    }

    /// The command's argument in human-readable form, if it has one.
    pub fn parameter(&self) -> Option<String> {
        match self {
            CommandRequest::PowerOn | CommandRequest::PowerOff => None,
            CommandRequest::SetMode(mode) => Some(mode.to_string()),
            CommandRequest::SetLevel(level) => Some(level.to_string()),
            CommandRequest::SetDisplay(on) => Some(if *on { "on" } else { "off" }.to_string()),
        }
    }

    /// Encode for the wire.
    ///
    /// Soft power commands carry a UNIX timestamp (seconds); the firmware
    /// uses it to order power requests.
    pub fn encode(&self, unix_secs: i64) -> String {
        match self {
            CommandRequest::PowerOn => format!("ascset|0,softon,1:{unix_secs}"),
            CommandRequest::PowerOff => format!("ascset|0,softoff,1:{unix_secs}"),
            CommandRequest::SetMode(mode) => format!("ascset|0,workmode,set,{}", mode.index()),
            CommandRequest::SetLevel(level) => {
                format!("ascset|0,worklevel,set,{}", level.index())
            }
            CommandRequest::SetDisplay(on) => format!("ascset|0,display,set,{}", u8::from(*on)),
        }
    }
}

impl fmt::Display for CommandRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parameter() {
            Some(param) => write!(f, "{}({})", self.kind(), param),
            None => write!(f, "{}", self.kind()),
        }
    }
}

/// Status letter of a cgminer reply (`STATUS=S,...`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AckStatus {
    Success,
    Info,
    Warning,
    Error,
    Fatal,
    /// The device closed without a reply, or the reply had no status.
    NoReply,
}

impl AckStatus {
    fn from_letter(letter: &str) -> Self {
        match letter.trim() {
            "S" => AckStatus::Success,
            "I" => AckStatus::Info,
            "W" => AckStatus::Warning,
            "E" => AckStatus::Error,
            "F" => AckStatus::Fatal,
            _ => AckStatus::NoReply,
        }
    }
}

/// The device's reply to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub status: AckStatus,
    /// `Msg=` field, or the raw reply if it had none.
    pub message: String,
}

impl Ack {
    /// No reply arrived before the device closed or the ack window passed.
    pub fn none() -> Self {
        Self {
            status: AckStatus::NoReply,
            message: String::new(),
        }
    }

    /// Parse the first section of a cgminer reply.
    ///
    /// ```text
    /// STATUS=S,When=1700000000,Code=118,Msg=ASC 0 set OK,Description=cgminer 4.11.1|
    /// ```
    pub fn parse(reply: &str) -> Self {
        let first = reply.split('|').next().unwrap_or_default().trim();
        if first.is_empty() {
            return Self::none();
        }

        let mut status = AckStatus::NoReply;
        let mut message = None;
        for item in first.split(',') {
            match item.split_once('=') {
                Some(("STATUS", value)) => status = AckStatus::from_letter(value),
                Some(("Msg", value)) => message = Some(value.trim().to_string()),
                _ => {}
            }
        }

        Self {
            status,
            message: message.unwrap_or_else(|| first.to_string()),
        }
    }

    /// The device did not report a failure.
    ///
    /// A missing reply counts as accepted; the next poll shows whether the
    /// command took effect.
    pub fn is_accepted(&self) -> bool {
        !matches!(self.status, AckStatus::Error | AckStatus::Fatal)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(CommandRequest::PowerOn, "ascset|0,softon,1:1700000000")]
    #[test_case(CommandRequest::PowerOff, "ascset|0,softoff,1:1700000000")]
    #[test_case(CommandRequest::SetMode(WorkMode::Heating), "ascset|0,workmode,set,0")]
    #[test_case(CommandRequest::SetMode(WorkMode::Night), "ascset|0,workmode,set,2")]
    #[test_case(CommandRequest::SetLevel(WorkLevel::Eco), "ascset|0,worklevel,set,-1")]
    #[test_case(CommandRequest::SetLevel(WorkLevel::Super), "ascset|0,worklevel,set,0")]
    #[test_case(CommandRequest::SetDisplay(false), "ascset|0,display,set,0")]
    fn encodes_wire_command(request: CommandRequest, wire: &str) {
        assert_eq!(request.encode(1_700_000_000), wire);
    }

    #[test]
    fn kind_and_parameter_describe_request() {
        let request = CommandRequest::SetLevel(WorkLevel::Super);
        assert_eq!(request.kind(), CommandKind::SetLevel);
        assert_eq!(request.parameter().as_deref(), Some("super"));
        assert_eq!(CommandRequest::power(false).parameter(), None);
        assert_eq!(request.to_string(), "SetLevel(super)");
    }

    #[test]
    fn parses_success_reply() {
        let ack = Ack::parse(
            "STATUS=S,When=1700000000,Code=118,Msg=ASC 0 set OK,Description=cgminer 4.11.1|\0",
        );
        assert_eq!(ack.status, AckStatus::Success);
        assert_eq!(ack.message, "ASC 0 set OK");
        assert!(ack.is_accepted());
    }

    #[test]
    fn parses_error_reply() {
        let ack = Ack::parse("STATUS=E,When=1,Code=14,Msg=Invalid command,Description=x|");
        assert_eq!(ack.status, AckStatus::Error);
        assert!(!ack.is_accepted());
    }

    #[test]
    fn empty_reply_is_none_and_accepted() {
        let ack = Ack::parse("");
        assert_eq!(ack, Ack::none());
        assert!(ack.is_accepted());
    }

    #[test]
    fn reply_without_msg_keeps_raw_text() {
        let ack = Ack::parse("OK");
        assert_eq!(ack.status, AckStatus::NoReply);
        assert_eq!(ack.message, "OK");
    }
}
