//! Device settings
//!
//! Static registry of Grbl `$` settings plus the string codec used on the wire.

pub mod registry;
pub mod value;

pub use registry::{
    by_index, by_name, count, lookup, Setting, SettingKey, DEFAULT_FLOAT, DEFAULT_INT,
    HOMING_CYCLE_ENABLE, SETTINGS, SOFT_LIMITS_ENABLE,
};
pub use value::{decode, encode, SettingType, SettingValue};
