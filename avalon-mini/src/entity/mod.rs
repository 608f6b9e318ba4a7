//! Entity state: last-known values for every entity of one device.
//!
//! Polls merge in whatever fields they reported. A field missing from a
//! poll keeps its previous value, and a failed poll changes nothing but
//! availability, so transient network trouble doesn't make entities
//! flap.

use strum::IntoEnumIterator;
use time::OffsetDateTime;

use crate::api_client::types::{DeviceState, EntityKind, EntityState, EntityValue};
use crate::config::DeviceEndpoint;
use crate::normalize::EntityValues;
use crate::protocol::{CommandRequest, DeviceError};
use crate::types::{WorkLevel, WorkMode};

/// Last-known state of one device's entities.
#[derive(Debug, Clone)]
pub struct EntityStore {
    name: String,
    address: String,
    values: EntityValues,
    power_on: Option<bool>,
    available: bool,
    last_error: Option<String>,
    last_update: Option<i64>,
}

impl EntityStore {
    pub fn new(endpoint: &DeviceEndpoint) -> Self {
        Self {
            name: endpoint.name().to_string(),
            address: endpoint.address(),
            values: EntityValues::default(),
            power_on: None,
            available: false,
            last_error: None,
            last_update: None,
        }
    }

    /// Merge a successful poll.
    pub fn apply(&mut self, values: &EntityValues, power_on: Option<bool>) {
        merge(&mut self.values.hashrate_ths, values.hashrate_ths);
        merge(&mut self.values.inlet_temp_c, values.inlet_temp_c);
        merge(&mut self.values.target_temp_c, values.target_temp_c);
        merge(&mut self.values.power_draw_w, values.power_draw_w);
        merge(&mut self.values.mode, values.mode);
        merge(&mut self.values.level, values.level);
        merge(&mut self.values.display_on, values.display_on);
        merge(&mut self.values.soft_off, values.soft_off);
        merge(&mut self.power_on, power_on);

        self.available = true;
        self.last_error = None;
        self.last_update = Some(OffsetDateTime::now_utc().unix_timestamp());
    }

    /// Record a failed poll. Values are left alone.
    pub fn mark_failed(&mut self, error: &DeviceError) {
        self.available = false;
        self.last_error = Some(error.to_string());
    }

    /// Show the result of an accepted command before the next poll
    /// confirms it. Power goes through the debouncer instead.
    pub fn apply_command(&mut self, command: CommandRequest) {
        match command {
            CommandRequest::SetMode(mode) => self.values.mode = Some(mode),
            CommandRequest::SetLevel(level) => self.values.level = Some(level),
            CommandRequest::SetDisplay(on) => self.values.display_on = Some(on),
            CommandRequest::PowerOn | CommandRequest::PowerOff => {}
        }
    }

    pub fn set_power(&mut self, on: Option<bool>) {
        merge(&mut self.power_on, on);
    }

    pub fn snapshot(&self) -> DeviceState {
        DeviceState {
            name: self.name.clone(),
            address: self.address.clone(),
            available: self.available,
            last_error: self.last_error.clone(),
            last_update: self.last_update,
            power_on: self.power_on,
            mode: self.values.mode,
            level: self.values.level,
            display_on: self.values.display_on,
            soft_off: self.values.soft_off,
            hashrate_ths: self.values.hashrate_ths,
            inlet_temp_c: self.values.inlet_temp_c,
            target_temp_c: self.values.target_temp_c,
            power_draw_w: self.values.power_draw_w,
        }
    }

    pub fn entities(&self) -> Vec<EntityState> {
        entities_for(&self.name, &self.snapshot())
    }
}

/// Build the entity list from a snapshot.
pub fn entities_for(name: &str, state: &DeviceState) -> Vec<EntityState> {
    let slug = slugify(name);
    let entity = |suffix: &str, label: &str, kind, icon: &str, unit: Option<&str>| EntityState {
        id: format!("{slug}_{suffix}"),
        name: format!("{name} {label}"),
        kind,
        icon: icon.to_string(),
        unit: unit.map(str::to_string),
        options: Vec::new(),
        value: None,
        available: state.available,
    };

    vec![
        EntityState {
            value: state.power_on.map(EntityValue::Bool),
            ..entity("power", "Power", EntityKind::Switch, "mdi:power", None)
        },
        EntityState {
            options: WorkMode::iter().map(|m| m.to_string()).collect(),
            value: state.mode.map(|m| EntityValue::Text(m.to_string())),
            ..entity("mode", "Mode", EntityKind::Select, "mdi:fire", None)
        },
        EntityState {
            options: WorkLevel::iter().map(|l| l.to_string()).collect(),
            value: state.level.map(|l| EntityValue::Text(l.to_string())),
            ..entity("level", "Level", EntityKind::Select, "mdi:speedometer", None)
        },
        EntityState {
            value: state.display_on.map(EntityValue::Bool),
            ..entity("display", "Display", EntityKind::Switch, "mdi:monitor", None)
        },
        EntityState {
            value: state.hashrate_ths.map(EntityValue::Number),
            ..entity(
                "hashrate",
                "Hashrate",
                EntityKind::Sensor,
                "mdi:pickaxe",
                Some("TH/s"),
            )
        },
        EntityState {
            value: state.inlet_temp_c.map(EntityValue::Number),
            ..entity(
                "room_temperature",
                "Room Temperature",
                EntityKind::Sensor,
                "mdi:thermometer",
                Some("°C"),
            )
        },
        EntityState {
            value: state.target_temp_c.map(EntityValue::Number),
            ..entity(
                "target_temperature",
                "Target Temperature",
                EntityKind::Sensor,
                "mdi:thermometer-check",
                Some("°C"),
            )
        },
        EntityState {
            value: state.power_draw_w.map(EntityValue::Number),
            ..entity(
                "power_draw",
                "Power Draw",
                EntityKind::Sensor,
                "mdi:flash",
                Some("W"),
            )
        },
    ]
}

/// `"Den Mini 3"` → `"den_mini_3"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let trimmed = slug.trim_end_matches('_');
    if trimmed.is_empty() {
        "avalon".to_string()
    } else {
        trimmed.to_string()
    }
}

fn merge<T>(slot: &mut Option<T>, update: Option<T>) {
    if update.is_some() {
        *slot = update;
    }
}
