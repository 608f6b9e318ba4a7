use crate::protocol::ParsedStatus;
use crate::types::{WorkLevel, WorkMode};

/// Entity-ready values from one poll, units already converted.
///
/// `None` means this poll did not report the field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityValues {
    /// TH/s.
    pub hashrate_ths: Option<f64>,
    /// °C.
    pub inlet_temp_c: Option<f64>,
    /// °C.
    pub target_temp_c: Option<f64>,
    /// W.
    pub power_draw_w: Option<f64>,
    pub mode: Option<WorkMode>,
    pub level: Option<WorkLevel>,
    pub display_on: Option<bool>,
    /// `SoftOFF[1]`: soft standby.
    pub soft_off: Option<bool>,
}

/// Passthrough mapping; no smoothing.
pub fn normalize_other(parsed: &ParsedStatus) -> EntityValues {
    EntityValues {
        hashrate_ths: parsed.hashrate.map(|h| h.as_ths()),
        inlet_temp_c: parsed.inlet_temp_c,
        target_temp_c: parsed.target_temp_c,
        power_draw_w: parsed.power_draw_w,
        mode: parsed.mode,
        level: parsed.level,
        display_on: parsed.display_on,
        soft_off: parsed.soft_off,
    }
}
