//! Device error codes
//!
//! Maps the numeric code of an `error:<code>` response to a semantic error.
//! The table covers Grbl 1.1; a code outside it means the firmware is not
//! the one we think we are talking to.

use std::fmt;

/// Errors reported by the device in answer to a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum DeviceError {
    /// `error:1`
    ExpectedCommandLetter = 1,
    /// `error:2`
    BadNumberFormat = 2,
    /// `error:3`
    InvalidStatement = 3,
    /// `error:4`
    NegativeValue = 4,
    /// `error:5`
    HomingDisabled = 5,
    /// `error:6`
    StepPulseTooShort = 6,
    /// `error:7`
    EepromReadFail = 7,
    /// `error:8`
    NotIdle = 8,
    /// `error:9`
    AlarmJogLock = 9,
    /// `error:10`
    SoftLimits = 10,
    /// `error:11`
    LineOverflow = 11,
    /// `error:12`
    StepRateExceeded = 12,
    /// `error:13`
    CheckDoor = 13,
    /// `error:14`
    LineLengthExceeded = 14,
    /// `error:15`
    TravelExceeded = 15,
    /// `error:16`
    InvalidJogCommand = 16,
    /// `error:17`
    LaserModeDisabled = 17,
    /// `error:20`
    UnsupportedCommand = 20,
    /// `error:21`
    ModalGroupViolation = 21,
    /// `error:22`
    FeedRate = 22,
    /// `error:23`
    InvalidGcodeId = 23,
    /// `error:24`
    AxisCommandConflict = 24,
    /// `error:25`
    WordRepeated = 25,
    /// `error:26`
    NoAxisWords = 26,
    /// `error:27`
    InvalidLineNumber = 27,
    /// `error:28`
    ValueWordMissing = 28,
    /// `error:29`
    UnsupportedCoordinateSystem = 29,
    /// `error:30`
    G53InvalidMotionMode = 30,
    /// `error:31`
    AxisWordsExist = 31,
    /// `error:32`
    NoAxisWordsInPlane = 32,
    /// `error:33`
    InvalidTarget = 33,
    /// `error:34`
    ArcRadiusError = 34,
    /// `error:35`
    NoOffsetsInPlane = 35,
    /// `error:36`
    UnusedWords = 36,
    /// `error:37`
    G43DynamicAxisError = 37,
    /// `error:38`
    MaxValueExceeded = 38,
}

impl DeviceError {
    /// Every known code, in numeric order
    pub const ALL: &'static [DeviceError] = &[
        DeviceError::ExpectedCommandLetter,
        DeviceError::BadNumberFormat,
        DeviceError::InvalidStatement,
        DeviceError::NegativeValue,
        DeviceError::HomingDisabled,
        DeviceError::StepPulseTooShort,
        DeviceError::EepromReadFail,
        DeviceError::NotIdle,
        DeviceError::AlarmJogLock,
        DeviceError::SoftLimits,
        DeviceError::LineOverflow,
        DeviceError::StepRateExceeded,
        DeviceError::CheckDoor,
        DeviceError::LineLengthExceeded,
        DeviceError::TravelExceeded,
        DeviceError::InvalidJogCommand,
        DeviceError::LaserModeDisabled,
        DeviceError::UnsupportedCommand,
        DeviceError::ModalGroupViolation,
        DeviceError::FeedRate,
        DeviceError::InvalidGcodeId,
        DeviceError::AxisCommandConflict,
        DeviceError::WordRepeated,
        DeviceError::NoAxisWords,
        DeviceError::InvalidLineNumber,
        DeviceError::ValueWordMissing,
        DeviceError::UnsupportedCoordinateSystem,
        DeviceError::G53InvalidMotionMode,
        DeviceError::AxisWordsExist,
        DeviceError::NoAxisWordsInPlane,
        DeviceError::InvalidTarget,
        DeviceError::ArcRadiusError,
        DeviceError::NoOffsetsInPlane,
        DeviceError::UnusedWords,
        DeviceError::G43DynamicAxisError,
        DeviceError::MaxValueExceeded,
    ];

    /// Look up a device error code
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.code() == code)
    }

    /// Numeric code as sent by the device
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Short semantic name
    pub fn name(&self) -> &'static str {
        match self {
            DeviceError::ExpectedCommandLetter => "ExpectedCommandLetter",
            DeviceError::BadNumberFormat => "BadNumberFormat",
            DeviceError::InvalidStatement => "InvalidStatement",
            DeviceError::NegativeValue => "NegativeValue",
            DeviceError::HomingDisabled => "HomingDisabled",
            DeviceError::StepPulseTooShort => "StepPulseTooShort",
            DeviceError::EepromReadFail => "EepromReadFail",
            DeviceError::NotIdle => "NotIdle",
            DeviceError::AlarmJogLock => "AlarmJogLock",
            DeviceError::SoftLimits => "SoftLimits",
            DeviceError::LineOverflow => "LineOverflow",
            DeviceError::StepRateExceeded => "StepRateExceeded",
            DeviceError::CheckDoor => "CheckDoor",
            DeviceError::LineLengthExceeded => "LineLengthExceeded",
            DeviceError::TravelExceeded => "TravelExceeded",
            DeviceError::InvalidJogCommand => "InvalidJogCommand",
            DeviceError::LaserModeDisabled => "LaserModeDisabled",
            DeviceError::UnsupportedCommand => "UnsupportedCommand",
            DeviceError::ModalGroupViolation => "ModalGroupViolation",
            DeviceError::FeedRate => "FeedRate",
            DeviceError::InvalidGcodeId => "InvalidGcodeId",
            DeviceError::AxisCommandConflict => "AxisCommandConflict",
            DeviceError::WordRepeated => "WordRepeated",
            DeviceError::NoAxisWords => "NoAxisWords",
            DeviceError::InvalidLineNumber => "InvalidLineNumber",
            DeviceError::ValueWordMissing => "ValueWordMissing",
            DeviceError::UnsupportedCoordinateSystem => "UnsupportedCoordinateSystem",
            DeviceError::G53InvalidMotionMode => "G53InvalidMotionMode",
            DeviceError::AxisWordsExist => "AxisWordsExist",
            DeviceError::NoAxisWordsInPlane => "NoAxisWordsInPlane",
            DeviceError::InvalidTarget => "InvalidTarget",
            DeviceError::ArcRadiusError => "ArcRadiusError",
            DeviceError::NoOffsetsInPlane => "NoOffsetsInPlane",
            DeviceError::UnusedWords => "UnusedWords",
            DeviceError::G43DynamicAxisError => "G43DynamicAxisError",
            DeviceError::MaxValueExceeded => "MaxValueExceeded",
        }
    }

    /// Human readable description
    pub fn text(&self) -> &'static str {
        match self {
            DeviceError::ExpectedCommandLetter => {
                "G-code words consist of a letter and a value. Letter was not found"
            }
            DeviceError::BadNumberFormat => {
                "Missing the expected G-code word value or numeric value format is not valid"
            }
            DeviceError::InvalidStatement => {
                "Grbl '$' system command was not recognized or supported"
            }
            DeviceError::NegativeValue => "Negative value received for an expected positive value",
            DeviceError::HomingDisabled => {
                "Homing cycle failure. Homing is not enabled via settings"
            }
            DeviceError::StepPulseTooShort => "Minimum step pulse time must be greater than 3usec",
            DeviceError::EepromReadFail => {
                "An EEPROM read failed. Auto-restoring affected EEPROM to default values"
            }
            DeviceError::NotIdle => "Grbl '$' command cannot be used unless Grbl is IDLE",
            DeviceError::AlarmJogLock => "G-code locked out during alarm or jog state",
            DeviceError::SoftLimits => "Soft limits cannot be enabled without homing also enabled",
            DeviceError::LineOverflow => {
                "Max characters per line exceeded. Received command line was not executed"
            }
            DeviceError::StepRateExceeded => {
                "Grbl '$' setting value cause the step rate to exceed the maximum supported"
            }
            DeviceError::CheckDoor => "Safety door detected as opened and door state initiated",
            DeviceError::LineLengthExceeded => {
                "Build info or startup line exceeded EEPROM line length limit"
            }
            DeviceError::TravelExceeded => "Jog target exceeds machine travel",
            DeviceError::InvalidJogCommand => {
                "Jog command has no '=' or contains prohibited g-code"
            }
            DeviceError::LaserModeDisabled => "Laser mode requires PWM output",
            DeviceError::UnsupportedCommand => {
                "Unsupported or invalid g-code command found in block"
            }
            DeviceError::ModalGroupViolation => {
                "More than one g-code command from same modal group found in block"
            }
            DeviceError::FeedRate => "Feed rate has not yet been set or is undefined",
            DeviceError::InvalidGcodeId => "G-code command in block requires an integer value",
            DeviceError::AxisCommandConflict => {
                "More than one g-code command that requires axis words found in block"
            }
            DeviceError::WordRepeated => "Repeated g-code word found in block",
            DeviceError::NoAxisWords => {
                "No axis words found in block for g-code command or current modal state which requires them"
            }
            DeviceError::InvalidLineNumber => "Line number value is invalid",
            DeviceError::ValueWordMissing => "G-code command is missing a required value word",
            DeviceError::UnsupportedCoordinateSystem => {
                "G59.x work coordinate systems are not supported"
            }
            DeviceError::G53InvalidMotionMode => "G53 only allowed with G0 and G1 motion modes",
            DeviceError::AxisWordsExist => {
                "Axis words found in block when no command or current modal state uses them"
            }
            DeviceError::NoAxisWordsInPlane => {
                "G2 and G3 arcs require at least one in-plane axis word"
            }
            DeviceError::InvalidTarget => "Motion command target is invalid",
            DeviceError::ArcRadiusError => "Arc radius value is invalid",
            DeviceError::NoOffsetsInPlane => {
                "G2 and G3 arcs require at least one in-plane offset word"
            }
            DeviceError::UnusedWords => "Unused value words found in block",
            DeviceError::G43DynamicAxisError => {
                "G43.1 dynamic tool length offset is not assigned to configured tool length axis"
            }
            DeviceError::MaxValueExceeded => "Tool number greater than max supported value",
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grbl error {} ({}): {}", self.code(), self.name(), self.text())
    }
}

impl std::error::Error for DeviceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_codes() {
        let lock = DeviceError::from_code(9).expect("code 9");
        assert_eq!(lock, DeviceError::AlarmJogLock);
        assert_eq!(lock.name(), "AlarmJogLock");
        assert_eq!(lock.text(), "G-code locked out during alarm or jog state");

        let soft = DeviceError::from_code(10).expect("code 10");
        assert_eq!(soft, DeviceError::SoftLimits);
        assert_eq!(
            soft.text(),
            "Soft limits cannot be enabled without homing also enabled"
        );

        let feed = DeviceError::from_code(22).expect("code 22");
        assert_eq!(feed, DeviceError::FeedRate);
        assert_eq!(feed.text(), "Feed rate has not yet been set or is undefined");
    }

    #[test]
    fn test_unlisted_codes() {
        assert_eq!(DeviceError::from_code(0), None);
        assert_eq!(DeviceError::from_code(18), None);
        assert_eq!(DeviceError::from_code(99), None);
    }

    #[test]
    fn test_table_is_consistent() {
        for (i, err) in DeviceError::ALL.iter().enumerate() {
            assert_eq!(DeviceError::from_code(err.code()), Some(*err));
            if i > 0 {
                assert!(DeviceError::ALL[i - 1].code() < err.code());
            }
            assert!(!err.name().is_empty());
            assert!(!err.text().is_empty());
        }
    }

    #[test]
    fn test_display_carries_code_and_name() {
        assert_eq!(
            DeviceError::FeedRate.to_string(),
            "Grbl error 22 (FeedRate): Feed rate has not yet been set or is undefined"
        );
        assert_eq!(
            DeviceError::AlarmJogLock.to_string(),
            "Grbl error 9 (AlarmJogLock): G-code locked out during alarm or jog state"
        );
    }
}
