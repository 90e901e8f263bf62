//! Settings registry
//!
//! The fixed table of device-tunable parameters. Every setting is addressed
//! by its `$<index>` on the wire and by a stable kebab-case name; both work as
//! keys everywhere.

use std::fmt;

use serde::Serialize;

use super::value::{SettingType, SettingValue};
use crate::error::{GrblError, Result};

/// Factory default used for integer settings without a specific default
pub const DEFAULT_INT: i64 = 255;

/// Factory default used for float settings without a specific default
pub const DEFAULT_FLOAT: f64 = 2147483.648;

/// One device setting
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Setting {
    /// Number used on the wire (`$<index>`)
    pub index: u16,
    /// Unique kebab-case name
    pub name: &'static str,
    /// Type values are decoded to
    pub value_type: SettingType,
    /// Unit of measure, if any
    pub unit: Option<&'static str>,
    /// Factory default
    pub default: SettingValue,
}

const fn integer(index: u16, name: &'static str, unit: &'static str) -> Setting {
    Setting {
        index,
        name,
        value_type: SettingType::Integer,
        unit: Some(unit),
        default: SettingValue::Integer(DEFAULT_INT),
    }
}

const fn float(index: u16, name: &'static str, unit: &'static str) -> Setting {
    Setting {
        index,
        name,
        value_type: SettingType::Float,
        unit: Some(unit),
        default: SettingValue::Float(DEFAULT_FLOAT),
    }
}

const fn boolean(index: u16, name: &'static str, default: bool) -> Setting {
    Setting {
        index,
        name,
        value_type: SettingType::Boolean,
        unit: None,
        default: SettingValue::Boolean(default),
    }
}

/// Every setting the device reports in a `$$` dump, ordered by index
pub static SETTINGS: &[Setting] = &[
    integer(0, "step-pulse-time", "milliseconds"),
    integer(1, "step-idle-delay", "milliseconds"),
    integer(2, "step-pulse-invert", "mask"),
    integer(3, "step-direction-invert", "mask"),
    boolean(4, "step-invert", true),
    boolean(5, "invert-step-enable-pin", true),
    boolean(6, "invert-limit-pins", true),
    integer(10, "status-report-options", "mask"),
    float(11, "junction-deviation", "millimeters"),
    float(12, "arc-tolerance", "millimeters"),
    boolean(13, "report-in-inches", true),
    boolean(20, "soft-limits-enable", false),
    boolean(21, "hard-limits-enable", false),
    boolean(22, "homing-cycle-enable", false),
    integer(23, "homing-direction-invert", "mask"),
    float(24, "homing-locate-feed-rate", "millimeters-per-minute"),
    float(25, "homing-search-seek-rate", "millimeters-per-minute"),
    integer(26, "homing-switch-debounce-delay", "milliseconds"),
    float(27, "homing-switch-pull-off-distance", "millimeters"),
    float(30, "maximum-spindle-speed", "revolutions-per-minute"),
    float(31, "minimum-spindle-speed", "revolutions-per-minute"),
    boolean(32, "laser-mode-enable", true),
    float(100, "x-axis-steps-per-millimeter", "steps-per-millimeter"),
    float(101, "y-axis-steps-per-millimeter", "steps-per-millimeter"),
    float(102, "z-axis-steps-per-millimeter", "steps-per-millimeter"),
    float(110, "x-axis-maximum-rate", "millimeters-per-minute"),
    float(111, "y-axis-maximum-rate", "millimeters-per-minute"),
    float(112, "z-axis-maximum-rate", "millimeters-per-minute"),
    float(120, "x-axis-maximum-acceleration", "millimeters-per-second-per-second"),
    float(121, "y-axis-maximum-acceleration", "millimeters-per-second-per-second"),
    float(122, "z-axis-maximum-acceleration", "millimeters-per-second-per-second"),
    float(130, "x-axis-maximum-travel", "millimeters"),
    float(131, "y-axis-maximum-travel", "millimeters"),
    float(132, "z-axis-maximum-travel", "millimeters"),
];

/// Index of `soft-limits-enable`
pub const SOFT_LIMITS_ENABLE: u16 = 20;

/// Index of `homing-cycle-enable`
pub const HOMING_CYCLE_ENABLE: u16 = 22;

/// Number of settings in a complete dump
pub fn count() -> usize {
    SETTINGS.len()
}

/// Setting with wire number `index`
pub fn by_index(index: u16) -> Option<&'static Setting> {
    SETTINGS
        .binary_search_by_key(&index, |s| s.index)
        .ok()
        .map(|i| &SETTINGS[i])
}

/// Setting called `name`
pub fn by_name(name: &str) -> Option<&'static Setting> {
    SETTINGS.iter().find(|s| s.name == name)
}

/// Resolve a key to its setting, failing with [`GrblError::UnknownSetting`]
pub fn lookup(key: &SettingKey) -> Result<&'static Setting> {
    match key {
        SettingKey::Index(index) => by_index(*index),
        SettingKey::Name(name) => by_name(name),
    }
    .ok_or_else(|| GrblError::UnknownSetting(key.to_string()))
}

/// A setting addressed either by index or by name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// Wire number
    Index(u16),
    /// Kebab-case name
    Name(String),
}

impl From<u16> for SettingKey {
    fn from(index: u16) -> Self {
        SettingKey::Index(index)
    }
}

impl From<&str> for SettingKey {
    /// Decimal strings are taken as an index, anything else as a name
    fn from(key: &str) -> Self {
        match key.trim().parse::<u16>() {
            Ok(index) => SettingKey::Index(index),
            Err(_) => SettingKey::Name(key.to_string()),
        }
    }
}

impl From<String> for SettingKey {
    fn from(key: String) -> Self {
        SettingKey::from(key.as_str())
    }
}

impl From<&String> for SettingKey {
    fn from(key: &String) -> Self {
        SettingKey::from(key.as_str())
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingKey::Index(index) => write!(f, "${}", index),
            SettingKey::Name(name) => f.write_str(name),
        }
    }
}
