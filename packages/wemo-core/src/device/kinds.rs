//! Device kinds and the kind-specific decoding that goes with them.
//!
//! There is one [`Device`](super::Device) type. What differs between a
//! switch, an Insight plug or a motion sensor is expressed as free functions
//! keyed by [`DeviceKind`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol_constants::BINARY_STATE_PROPERTY;

/// Closed set of WeMo device families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Switch,
    LightSwitch,
    Insight,
    Motion,
    Bridge,
    Maker,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 6] = [
        Self::Switch,
        Self::LightSwitch,
        Self::Insight,
        Self::Motion,
        Self::Bridge,
        Self::Maker,
    ];

    /// Maps a USN type tag (`Socket`, `Lightswitch`, ...) to a kind.
    #[must_use]
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        match tag {
            "Socket" => Some(Self::Switch),
            "Lightswitch" => Some(Self::LightSwitch),
            "Insight" => Some(Self::Insight),
            "Sensor" => Some(Self::Motion),
            "Bridge" => Some(Self::Bridge),
            "Maker" => Some(Self::Maker),
            _ => None,
        }
    }

    /// Classifies a device identifier such as `Socket-1_0-221234K1`.
    #[must_use]
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        identifier.split('-').next().and_then(Self::from_type_tag)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::LightSwitch => "light_switch",
            Self::Insight => "insight",
            Self::Motion => "motion",
            Self::Bridge => "bridge",
            Self::Maker => "maker",
        }
    }

    /// Bridges front a mesh of bulbs and have no meaningful binary state to
    /// query, so they are never pinged.
    #[must_use]
    pub fn supports_ping(self) -> bool {
        !matches!(self, Self::Bridge)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached on/off state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryState {
    Off,
    On,
    Unknown,
}

impl BinaryState {
    #[must_use]
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for BinaryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            Self::On => f.write_str("on"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Parses a `BinaryState` value.
///
/// `0` is off; any other integer is on (Insight reports `8` for "on, load
/// idle"). Anything else is unknown.
#[must_use]
pub fn parse_binary_state(value: &str) -> BinaryState {
    match value.trim().parse::<u32>() {
        Ok(0) => BinaryState::Off,
        Ok(_) => BinaryState::On,
        Err(_) => BinaryState::Unknown,
    }
}

/// Normalizes an event property value for `kind`.
///
/// Insight devices send their whole telemetry string as `BinaryState`;
/// only the first pipe-delimited field is the state.
#[must_use]
pub fn normalize_event_value(kind: DeviceKind, property: &str, value: &str) -> String {
    if kind == DeviceKind::Insight && property == BINARY_STATE_PROPERTY {
        return value.split('|').next().unwrap_or(value).to_string();
    }
    value.to_string()
}

/// Decoded `GetInsightParams` telemetry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightParams {
    pub state: BinaryState,
    /// Unix time of the last state change.
    pub last_change: u64,
    /// Seconds the load has been on in the current session.
    pub on_for_secs: u64,
    pub on_today_secs: u64,
    pub on_total_secs: u64,
    /// Averaging window in seconds.
    pub time_period_secs: u64,
    /// Instantaneous power in milliwatts.
    pub current_power_mw: u64,
    /// Energy today in milliwatt-minutes.
    pub today_mw: u64,
    /// Energy since reset in milliwatt-minutes.
    pub total_mw: u64,
    /// Power threshold in milliwatts for the "on" vs "standby" decision.
    pub power_threshold_mw: u64,
}

impl InsightParams {
    /// Parses the 11-field pipe-delimited string. The seventh field has no
    /// documented meaning and is skipped.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let fields: Vec<&str> = raw.trim().split('|').collect();
        if fields.len() < 11 {
            return None;
        }
        let int = |i: usize| fields[i].trim().parse::<u64>().ok();
        let float = |i: usize| {
            fields[i]
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v as u64)
        };

        Some(Self {
            state: parse_binary_state(fields[0]),
            last_change: int(1)?,
            on_for_secs: int(2)?,
            on_today_secs: int(3)?,
            on_total_secs: int(4)?,
            time_period_secs: int(5)?,
            current_power_mw: float(7)?,
            today_mw: float(8)?,
            total_mw: float(9)?,
            power_threshold_mw: float(10)?,
        })
    }

    /// Energy used today in kWh.
    #[must_use]
    pub fn today_kwh(&self) -> f64 {
        self.today_mw as f64 * 1.666_666_7e-8
    }
}
