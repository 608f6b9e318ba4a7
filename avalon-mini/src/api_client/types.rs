//! API data transfer objects.
//!
//! These types define the API contract shared between the server and
//! clients.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{WorkLevel, WorkMode};

/// Full device state snapshot.
///
/// Sensor and select values are the last ones the device reported; a
/// failed poll marks the device unavailable but keeps them.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct DeviceState {
    pub name: String,
    /// `host:port` of the device.
    pub address: String,
    /// The most recent poll succeeded.
    pub available: bool,
    pub last_error: Option<String>,
    /// UNIX seconds of the last successful poll.
    pub last_update: Option<i64>,
    /// Debounced power state.
    pub power_on: Option<bool>,
    pub mode: Option<WorkMode>,
    pub level: Option<WorkLevel>,
    pub display_on: Option<bool>,
    /// Soft standby as the device reports it (`SoftOFF`). Unlike
    /// `power_on` this is not debounced.
    pub soft_off: Option<bool>,
    /// TH/s.
    pub hashrate_ths: Option<f64>,
    /// °C.
    pub inlet_temp_c: Option<f64>,
    /// °C.
    pub target_temp_c: Option<f64>,
    /// W.
    pub power_draw_w: Option<f64>,
}

/// How an entity is presented to the host platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// On/off control.
    Switch,
    /// Enumerated choice; see `options`.
    Select,
    /// Read-only number.
    Sensor,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(untagged)]
pub enum EntityValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// One entity, keyed by the device's friendly name.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct EntityState {
    /// Stable identifier, e.g. `den_mini_power`.
    pub id: String,
    /// Display name, e.g. `Den Mini Power`.
    pub name: String,
    pub kind: EntityKind,
    pub icon: String,
    pub unit: Option<String>,
    /// Valid choices for selects; empty otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub value: Option<EntityValue>,
    pub available: bool,
}

/// Partial update to the device. Each present field becomes one command,
/// sent in the order power, mode, level, display.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct DevicePatchRequest {
    pub power: Option<bool>,
    pub mode: Option<WorkMode>,
    pub level: Option<WorkLevel>,
    pub display: Option<bool>,
}
