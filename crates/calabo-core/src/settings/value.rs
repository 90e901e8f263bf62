//! Typed setting values and their wire codec

use std::fmt;

use serde::{Deserialize, Serialize};

use super::registry::{self, Setting};
use crate::error::{GrblError, Result};

/// Storage type of a setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    /// Sent as `0` or `1`
    Boolean,
    /// Whole number, including bit masks
    Integer,
    /// Decimal number
    Float,
}

/// A typed setting value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Value of a boolean setting
    Boolean(bool),
    /// Value of an integer setting
    Integer(i64),
    /// Value of a float setting
    Float(f64),
}

impl SettingValue {
    /// The flag, if this is a boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Boolean(v) => write!(f, "{}", u8::from(*v)),
            SettingValue::Integer(v) => write!(f, "{}", v),
            // Shortest representation that parses back to the same f64
            SettingValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Boolean(v)
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        SettingValue::Integer(v)
    }
}

impl From<f64> for SettingValue {
    fn from(v: f64) -> Self {
        SettingValue::Float(v)
    }
}

impl Setting {
    /// Parse the device's string form of this setting
    pub fn decode(&self, raw: &str) -> Result<SettingValue> {
        let raw = raw.trim();
        let invalid = || GrblError::InvalidValue {
            name: self.name.to_string(),
            value: raw.to_string(),
        };
        match self.value_type {
            SettingType::Boolean => raw
                .parse::<i64>()
                .map(|v| SettingValue::Boolean(v != 0))
                .map_err(|_| invalid()),
            SettingType::Integer => raw
                .parse::<i64>()
                .map(SettingValue::Integer)
                .map_err(|_| invalid()),
            SettingType::Float => raw
                .parse::<f64>()
                .map(SettingValue::Float)
                .map_err(|_| invalid()),
        }
    }

    /// Render `value` the way the device expects it
    pub fn encode(&self, value: SettingValue) -> Result<String> {
        Ok(self.coerce(value)?.to_string())
    }

    /// Convert `value` to this setting's type where that is lossless
    pub fn coerce(&self, value: SettingValue) -> Result<SettingValue> {
        let coerced = match (self.value_type, value) {
            (SettingType::Boolean, SettingValue::Boolean(v)) => Some(SettingValue::Boolean(v)),
            (SettingType::Boolean, SettingValue::Integer(v @ (0 | 1))) => {
                Some(SettingValue::Boolean(v == 1))
            }
            (SettingType::Integer, SettingValue::Integer(v)) => Some(SettingValue::Integer(v)),
            (SettingType::Integer, SettingValue::Float(v))
                if v.fract() == 0.0 && v >= i64::MIN as f64 && v <= i64::MAX as f64 =>
            {
                Some(SettingValue::Integer(v as i64))
            }
            (SettingType::Float, SettingValue::Float(v)) if v.is_finite() => {
                Some(SettingValue::Float(v))
            }
            (SettingType::Float, SettingValue::Integer(v)) => Some(SettingValue::Float(v as f64)),
            _ => None,
        };
        coerced.ok_or_else(|| GrblError::InvalidValue {
            name: self.name.to_string(),
            value: value.to_string(),
        })
    }
}

/// Decode the device's string form of setting `index`
pub fn decode(index: u16, raw: &str) -> Result<SettingValue> {
    registry::by_index(index)
        .ok_or_else(|| GrblError::UnknownSetting(index.to_string()))?
        .decode(raw)
}

/// Encode `value` for setting `index`
pub fn encode(index: u16, value: SettingValue) -> Result<String> {
    registry::by_index(index)
        .ok_or_else(|| GrblError::UnknownSetting(index.to_string()))?
        .encode(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::registry::SETTINGS;

    fn samples(value_type: SettingType) -> Vec<SettingValue> {
        match value_type {
            SettingType::Boolean => vec![true.into(), false.into()],
            SettingType::Integer => {
                vec![0.into(), 1.into(), 255.into(), (-1).into(), i64::MAX.into()]
            }
            SettingType::Float => vec![
                0.0.into(),
                1000.0.into(),
                0.01.into(),
                2147483.648.into(),
                (-12.5).into(),
                250.123456789.into(),
            ],
        }
    }

    #[test]
    fn test_roundtrip_every_setting() {
        for setting in SETTINGS {
            for value in samples(setting.value_type) {
                let encoded = encode(setting.index, value).expect("encode");
                let decoded = decode(setting.index, &encoded).expect("decode");
                assert_eq!(decoded, value, "setting {} via {:?}", setting.name, encoded);
            }
        }
    }

    #[test]
    fn test_boolean_wire_form() {
        assert_eq!(encode(22, true.into()).unwrap(), "1");
        assert_eq!(encode(22, false.into()).unwrap(), "0");
        assert_eq!(decode(22, "1").unwrap(), SettingValue::Boolean(true));
        assert_eq!(decode(22, "0").unwrap(), SettingValue::Boolean(false));
    }

    #[test]
    fn test_device_float_form_preserved() {
        let value = decode(11, "0.010").unwrap();
        assert_eq!(value, SettingValue::Float(0.01));
        assert_eq!(encode(11, value).unwrap(), "0.01");
        assert_eq!(decode(100, "250.000").unwrap(), SettingValue::Float(250.0));
    }

    #[test]
    fn test_coercion() {
        // Integer 1 written to a boolean setting
        assert_eq!(encode(20, 1.into()).unwrap(), "1");
        // Integer written to a float setting
        assert_eq!(encode(110, 500.into()).unwrap(), "500");
        // Whole float written to an integer setting
        assert_eq!(encode(0, 10.0.into()).unwrap(), "10");
        assert!(matches!(
            encode(0, 10.5.into()),
            Err(GrblError::InvalidValue { .. })
        ));
        assert!(matches!(
            encode(22, 2.into()),
            Err(GrblError::InvalidValue { .. })
        ));
        assert!(matches!(
            encode(110, true.into()),
            Err(GrblError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_as_bool() {
        assert_eq!(SettingValue::Boolean(true).as_bool(), Some(true));
        assert_eq!(SettingValue::Integer(1).as_bool(), None);
        assert_eq!(SettingValue::Float(0.0).as_bool(), None);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(decode(0, "abc"), Err(GrblError::InvalidValue { .. })));
        assert!(matches!(decode(11, ""), Err(GrblError::InvalidValue { .. })));
    }

    #[test]
    fn test_unknown_index() {
        assert!(matches!(decode(7, "1"), Err(GrblError::UnknownSetting(_))));
        assert!(matches!(
            encode(999, 1.into()),
            Err(GrblError::UnknownSetting(_))
        ));
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_string(&vec![
            SettingValue::Boolean(true),
            SettingValue::Integer(255),
            SettingValue::Float(2147483.648),
        ])
        .unwrap();
        assert_eq!(json, "[true,255,2147483.648]");

        let parsed: Vec<SettingValue> = serde_json::from_str("[false, 3, 0.5]").unwrap();
        assert_eq!(
            parsed,
            vec![
                SettingValue::Boolean(false),
                SettingValue::Integer(3),
                SettingValue::Float(0.5)
            ]
        );
    }
}
