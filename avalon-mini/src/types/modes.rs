//! Closed enumerations for the device's operating state.
//!
//! Firmware reports these as small integers or fixed phrases. Values that
//! don't map are rejected (`None`) rather than coerced, so a firmware
//! variant with new values shows up as "not reported" instead of a wrong
//! option.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Operating profile (`WORKMODE[...]`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum WorkMode {
    Heating,
    Mining,
    Night,
}

impl WorkMode {
    /// Device index used by `WORKMODE[...]` and `ascset|0,workmode,set,N`.
    pub const fn index(self) -> i32 {
        match self {
            WorkMode::Heating => 0,
            WorkMode::Mining => 1,
            WorkMode::Night => 2,
        }
    }

    pub const fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(WorkMode::Heating),
            1 => Some(WorkMode::Mining),
            2 => Some(WorkMode::Night),
            _ => None,
        }
    }
}

/// Performance level within a mode (`WORKLEVEL[...]`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum WorkLevel {
    Eco,
    Super,
}

impl WorkLevel {
    /// Device index used by `WORKLEVEL[...]` and `ascset|0,worklevel,set,N`.
    pub const fn index(self) -> i32 {
        match self {
            WorkLevel::Eco => -1,
            WorkLevel::Super => 0,
        }
    }

    pub const fn from_index(index: i32) -> Option<Self> {
        match index {
            -1 => Some(WorkLevel::Eco),
            0 => Some(WorkLevel::Super),
            _ => None,
        }
    }
}

/// Work state from `SYSTEMSTATU[...]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SystemStatus {
    InWork,
    InInit,
    InIdle,
    Unknown,
}

impl SystemStatus {
    /// Map a status phrase (`"In Work"`, `"In Init"`, `"In Idle"`).
    pub fn from_phrase(phrase: &str) -> Self {
        match phrase.trim() {
            s if s.eq_ignore_ascii_case("In Work") => SystemStatus::InWork,
            s if s.eq_ignore_ascii_case("In Init") => SystemStatus::InInit,
            s if s.eq_ignore_ascii_case("In Idle") => SystemStatus::InIdle,
            _ => SystemStatus::Unknown,
        }
    }

    /// Raw power signal: hashing or starting up counts as on, idle as off.
    /// `Unknown` carries no information.
    pub const fn raw_power(self) -> Option<bool> {
        match self {
            SystemStatus::InWork | SystemStatus::InInit => Some(true),
            SystemStatus::InIdle => Some(false),
            SystemStatus::Unknown => None,
        }
    }
}
