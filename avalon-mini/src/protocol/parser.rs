//! Status text parser.
//!
//! `estats` replies are a flat run of `Key[value]` fields, e.g.
//!
//! ```text
//! STATUS=S,...|STATS=0,ID=AVA100,...,MM ID0=Ver[Mini3-...] SYSTEMSTATU[Work: In Work, Hash Board: 1]
//! ITemp[23] TarT[30] WORKMODE[0] WORKLEVEL[-1] SoftOFF[0] LcdOnoff[1] PS[0 1207 850 136] ...
//! ```
//!
//! and `summary` replies are cgminer key-values (`MHS 5s=36807196.51,`).
//! The parser accepts both in one blob. Fields it can't find or can't
//! read are left as `None`; only a message with no recognized field at
//! all is an error.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::error::DeviceError;
use crate::tracing::prelude::*;
use crate::types::{HashRate, SystemStatus, WorkLevel, WorkMode};

/// Zero-based position of the power draw (W) within `PS[...]`.
pub const POWER_DRAW_ORDINAL: usize = 2;

/// Hashrate keys in order of preference. The 5 second average tracks the
/// device most closely; the longer averages lag after mode changes.
const HASHRATE_KEYS: [&str; 5] = ["MHS 5s", "MHS av", "MHS 1m", "MHS 5m", "MHS 15m"];

static BRACKET_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(SYSTEMSTATU|ITemp|TarT|PS|WORKMODE|WORKLEVEL|SoftOFF|LcdOnoff|GHSavg)\[([^\]]*)\]",
    )
    .expect("bracket field pattern is valid")
});

static HASHRATE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(MHS (?:5s|av|1m|5m|15m))\s*=\s*([^,|\s]+)")
        .expect("hashrate field pattern is valid")
});

/// Fields extracted from one status reply.
///
/// `None` means "not reported" (or reported in a form we reject), which
/// is distinct from a reported zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedStatus {
    pub hashrate: Option<HashRate>,
    /// Inlet (room) temperature, °C.
    pub inlet_temp_c: Option<f64>,
    /// Target room temperature, °C.
    pub target_temp_c: Option<f64>,
    /// Power draw, W.
    pub power_draw_w: Option<f64>,
    pub system_status: Option<SystemStatus>,
    pub mode: Option<WorkMode>,
    pub level: Option<WorkLevel>,
    /// `SoftOFF[1]`: the device is in soft standby.
    pub soft_off: Option<bool>,
    pub display_on: Option<bool>,
}

impl ParsedStatus {
    /// Names of the fields this reply did not provide.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let checks = [
            ("hashrate", self.hashrate.is_none()),
            ("inlet_temp_c", self.inlet_temp_c.is_none()),
            ("target_temp_c", self.target_temp_c.is_none()),
            ("power_draw_w", self.power_draw_w.is_none()),
            ("system_status", self.system_status.is_none()),
            ("mode", self.mode.is_none()),
            ("level", self.level.is_none()),
            ("soft_off", self.soft_off.is_none()),
            ("display_on", self.display_on.is_none()),
        ];
        checks
            .into_iter()
            .filter_map(|(name, missing)| missing.then_some(name))
            .collect()
    }
}

/// Parse a status reply.
///
/// When a field appears more than once, the first occurrence wins.
pub fn parse(raw: &str) -> Result<ParsedStatus, DeviceError> {
    let mut brackets: HashMap<&str, &str> = HashMap::new();
    for caps in BRACKET_FIELD.captures_iter(raw) {
        if let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) {
            brackets.entry(key.as_str()).or_insert(value.as_str());
        }
    }

    let mut hashrates: HashMap<&str, &str> = HashMap::new();
    for caps in HASHRATE_FIELD.captures_iter(raw) {
        if let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) {
            hashrates.entry(key.as_str()).or_insert(value.as_str());
        }
    }

    if brackets.is_empty() && hashrates.is_empty() {
        return Err(DeviceError::Protocol(format!(
            "no recognized field in {} byte response",
            raw.len()
        )));
    }

    let field = |key: &str| brackets.get(key).copied();

    let status = ParsedStatus {
        hashrate: parse_hashrate(&hashrates, field("GHSavg")),
        inlet_temp_c: field("ITemp").and_then(|v| non_negative("ITemp", v)),
        target_temp_c: field("TarT").and_then(|v| non_negative("TarT", v)),
        power_draw_w: field("PS").and_then(parse_power_draw),
        system_status: field("SYSTEMSTATU").map(parse_system_status),
        mode: field("WORKMODE")
            .and_then(|v| integer("WORKMODE", v))
            .and_then(|index| {
                let mode = WorkMode::from_index(index);
                if mode.is_none() {
                    warn!(index, "Unrecognized work mode index");
                }
                mode
            }),
        level: field("WORKLEVEL")
            .and_then(|v| integer("WORKLEVEL", v))
            .and_then(|index| {
                let level = WorkLevel::from_index(index);
                if level.is_none() {
                    warn!(index, "Unrecognized work level index");
                }
                level
            }),
        soft_off: field("SoftOFF").and_then(|v| flag("SoftOFF", v)),
        display_on: field("LcdOnoff").and_then(|v| flag("LcdOnoff", v)),
    };

    Ok(status)
}

fn parse_hashrate(keys: &HashMap<&str, &str>, ghs_avg: Option<&str>) -> Option<HashRate> {
    let preferred = HASHRATE_KEYS
        .iter()
        .find_map(|key| keys.get(key).map(|value| (*key, *value)));

    match preferred {
        Some((key, value)) => non_negative(key, value).map(HashRate::from_mhs),
        None => ghs_avg
            .and_then(|v| non_negative("GHSavg", v))
            .map(HashRate::from_ghs),
    }
}

/// `PS[...]` holds ordered numeric sub-fields separated by commas or
/// spaces. A short segment loses only the power draw.
fn parse_power_draw(segment: &str) -> Option<f64> {
    let sub_fields: Vec<&str> = segment
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();

    match sub_fields.get(POWER_DRAW_ORDINAL) {
        Some(value) => non_negative("PS", value),
        None => {
            debug!(
                sub_fields = sub_fields.len(),
                "PS segment too short for power draw"
            );
            None
        }
    }
}

/// Accepts `In Work` as well as `Work: In Work, Hash Board: 1`.
fn parse_system_status(content: &str) -> SystemStatus {
    let phrase = content
        .split(',')
        .find_map(|part| {
            part.split_once(':')
                .filter(|(key, _)| key.trim().eq_ignore_ascii_case("Work"))
                .map(|(_, value)| value)
        })
        .unwrap_or(content);

    let status = SystemStatus::from_phrase(phrase);
    if status == SystemStatus::Unknown {
        debug!(phrase = phrase.trim(), "Unrecognized system status");
    }
    status
}

fn non_negative(key: &str, value: &str) -> Option<f64> {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Some(v),
        _ => {
            debug!(key, value, "Discarding unreadable numeric field");
            None
        }
    }
}

fn integer(key: &str, value: &str) -> Option<i32> {
    let parsed = value.trim().parse::<i32>().ok();
    if parsed.is_none() {
        debug!(key, value, "Discarding unreadable integer field");
    }
    parsed
}

fn flag(key: &str, value: &str) -> Option<bool> {
    match integer(key, value)? {
        0 => Some(false),
        1 => Some(true),
        other => {
            debug!(key, value = other, "Discarding out-of-range flag");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    /// Trimmed `estats` reply captured from a Mini 3 on firmware 25021401.
    const ESTATS: &str = "STATUS=S,When=1731412345,Code=70,Msg=CGMiner stats,Description=cgminer 4.11.1|\
        STATS=0,ID=AVA100,Elapsed=558,Calls=0,Wait=0.000000,Max=0.000000,Min=99999999.000000,\
        MM ID0=Ver[Mini3-25021401_56abae7] LVer[25021401_56abae7] BVer[25021401_56abae7] \
        HVer[MM4v2_X3] FW[Release] DNA[0201000031fc2f51] STATE[2] MEMFREE[1321584.1275264] \
        NETFAIL[0 0 0 0 0 0 0 0] SSID[] RSSI[0] NetDevType[0] SYSTEMSTATU[Work: In Work, Hash Board: 1] \
        Elapsed[558] BOOTBY[0x04.00000000] LW[1245872] MH[0] DHW[0] HW[0] DH[0.000%] ITemp[23] \
        HBITemp[45] HBOTemp[52] TMax[71] TAvg[64] TarT[30] Fan1[1520] FanR[38%] \
        PS[0 1207 850 136 1724 1268 1287] WORKMODE[0] WORKLEVEL[-1] SoftOFF[0] LcdOnoff[1] \
        GHSspd[37210.55] GHSmm[37500.12] GHSavg[36890]|\0";

    #[test]
    fn parses_scenario_message() {
        let raw = "SYSTEMSTATU[In Work] ITemp[23.5] TarT[30.0] PS[12,4.5,850,...] MHS 5s=450000";
        let status = parse(raw).unwrap();

        assert_eq!(status.system_status, Some(SystemStatus::InWork));
        assert_eq!(status.inlet_temp_c, Some(23.5));
        assert_eq!(status.target_temp_c, Some(30.0));
        assert_eq!(status.power_draw_w, Some(850.0));
        assert_eq!(status.hashrate.map(HashRate::as_ths), Some(0.45));
    }

    #[test]
    fn parses_real_estats_reply() {
        let status = parse(ESTATS).unwrap();

        assert_eq!(status.system_status, Some(SystemStatus::InWork));
        assert_eq!(status.inlet_temp_c, Some(23.0));
        assert_eq!(status.target_temp_c, Some(30.0));
        assert_eq!(status.power_draw_w, Some(850.0));
        assert_eq!(status.mode, Some(WorkMode::Heating));
        assert_eq!(status.level, Some(WorkLevel::Eco));
        assert_eq!(status.soft_off, Some(false));
        assert_eq!(status.display_on, Some(true));
        // No MHS keys in estats; falls back to GHSavg.
        assert_eq!(status.hashrate.map(HashRate::as_mhs), Some(36_890_000.0));
        assert!(status.missing_fields().is_empty());
    }

    #[test_case("PS[12,4.5,850]", Some(850.0) ; "comma separated")]
    #[test_case("PS[0 1207 1724 136]", Some(1724.0) ; "space separated")]
    #[test_case("PS[ 1 , 2 , 3.5 , 4 ]", Some(3.5) ; "padded")]
    #[test_case("PS[0.0,0.0,0]", Some(0.0) ; "reported zero")]
    fn power_draw_comes_from_fixed_ordinal(raw: &str, watts: Option<f64>) {
        assert_eq!(parse(raw).unwrap().power_draw_w, watts);
    }

    #[test]
    fn short_ps_segment_loses_only_power_draw() {
        let status = parse("SYSTEMSTATU[In Idle] ITemp[19] PS[12,4.5]").unwrap();
        assert_eq!(status.power_draw_w, None);
        assert_eq!(status.system_status, Some(SystemStatus::InIdle));
        assert_eq!(status.inlet_temp_c, Some(19.0));
    }

    #[test]
    fn missing_target_temperature_is_partial_success() {
        let raw = "SYSTEMSTATU[In Work] ITemp[23.5] PS[12,4.5,850] WORKMODE[1] WORKLEVEL[0] \
                   SoftOFF[0] LcdOnoff[0] MHS av=32581844.99";
        let status = parse(raw).unwrap();

        assert_eq!(status.target_temp_c, None);
        assert_eq!(status.missing_fields(), vec!["target_temp_c"]);
        assert_eq!(status.inlet_temp_c, Some(23.5));
        assert_eq!(status.power_draw_w, Some(850.0));
        assert_eq!(status.mode, Some(WorkMode::Mining));
        assert_eq!(status.level, Some(WorkLevel::Super));
        assert_eq!(status.display_on, Some(false));
        assert_eq!(status.hashrate.map(HashRate::as_mhs), Some(32_581_844.99));
    }

    #[test]
    fn first_occurrence_wins() {
        let status = parse("ITemp[21] TarT[28] ITemp[99] TarT[10]").unwrap();
        assert_eq!(status.inlet_temp_c, Some(21.0));
        assert_eq!(status.target_temp_c, Some(28.0));
    }

    #[test]
    fn prefers_five_second_hashrate() {
        let raw = "SUMMARY,Elapsed=558,MHS av=32581844.99,MHS 5s=36807196.51,MHS 1m=1.0|";
        let status = parse(raw).unwrap();
        assert_eq!(status.hashrate.map(HashRate::as_mhs), Some(36_807_196.51));
    }

    #[test]
    fn mhs_takes_precedence_over_ghs() {
        let status = parse("GHSavg[100] MHS 5s=450000").unwrap();
        assert_eq!(status.hashrate.map(HashRate::as_mhs), Some(450_000.0));
    }

    #[test]
    fn keyed_and_bare_status_forms() {
        let keyed = parse("SYSTEMSTATU[Work: In Init, Hash Board: 1]").unwrap();
        assert_eq!(keyed.system_status, Some(SystemStatus::InInit));

        let bare = parse("SYSTEMSTATU[In Idle]").unwrap();
        assert_eq!(bare.system_status, Some(SystemStatus::InIdle));

        let odd = parse("SYSTEMSTATU[Work: Upgrading]").unwrap();
        assert_eq!(odd.system_status, Some(SystemStatus::Unknown));
    }

    #[test]
    fn unknown_indices_are_absent_not_defaulted() {
        let status = parse("WORKMODE[7] WORKLEVEL[3] SoftOFF[2]").unwrap();
        assert_eq!(status.mode, None);
        assert_eq!(status.level, None);
        assert_eq!(status.soft_off, None);
    }

    #[test]
    fn negative_and_garbled_numbers_are_absent() {
        let status = parse("ITemp[-5] TarT[abc] PS[1,2,-30] MHS 5s=nan").unwrap();
        assert_eq!(status.inlet_temp_c, None);
        assert_eq!(status.target_temp_c, None);
        assert_eq!(status.power_draw_w, None);
        assert_eq!(status.hashrate, None);
    }

    #[test]
    fn prefix_must_start_a_word() {
        // MPS[...] is not PS[...]; nothing else is recognized.
        assert!(parse("MPS[1,2,3]").is_err());
    }

    #[test_case("" ; "empty")]
    #[test_case("   \n" ; "whitespace")]
    #[test_case("\u{1}\u{7f}garbage\u{3}" ; "binary garbage")]
    #[test_case("STATUS=S,When=1,Code=70,Msg=CGMiner stats|" ; "status only")]
    fn unrecognizable_message_is_protocol_error(raw: &str) {
        assert!(matches!(parse(raw), Err(DeviceError::Protocol(_))));
    }
}
