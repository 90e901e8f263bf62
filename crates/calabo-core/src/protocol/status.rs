//! Status reports
//!
//! Parses the framed answer to a `?` query:
//! `<STATE[:substate]|FIELD:values|...>`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ProtocolError;

/// Machine state named at the start of a status report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum RunState {
    Idle,
    Run,
    Hold,
    Jog,
    Alarm,
    Door,
    Check,
    Home,
    Sleep,
}

impl RunState {
    /// Name as the device spells it
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "Idle",
            RunState::Run => "Run",
            RunState::Hold => "Hold",
            RunState::Jog => "Jog",
            RunState::Alarm => "Alarm",
            RunState::Door => "Door",
            RunState::Check => "Check",
            RunState::Home => "Home",
            RunState::Sleep => "Sleep",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunState {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Idle" => RunState::Idle,
            "Run" => RunState::Run,
            "Hold" => RunState::Hold,
            "Jog" => RunState::Jog,
            "Alarm" => RunState::Alarm,
            "Door" => RunState::Door,
            "Check" => RunState::Check,
            "Home" => RunState::Home,
            "Sleep" => RunState::Sleep,
            _ => return Err(ProtocolError::MalformedStatus(s.to_string())),
        })
    }
}

/// A three-axis position in millimeters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    /// Position from its three axes
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// True when every axis is exactly zero
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    fn parse(values: &str) -> Option<Self> {
        let mut axes = values.split(',').map(|v| v.trim().parse::<f64>());
        let x = axes.next()?.ok()?;
        let y = axes.next()?.ok()?;
        let z = axes.next()?.ok()?;
        Some(Self { x, y, z })
    }
}

/// Work coordinate offset as last reported by the device.
///
/// The device reports a cleared offset as all zeros; that is normalized to
/// [`WorkOffset::None`] so it cannot be confused with an offset of zero that
/// was never reported at all (which the controller keeps as `Option::None`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WorkOffset {
    /// No offset is active
    None,
    /// The active offset
    Offset(Position),
}

impl From<Position> for WorkOffset {
    fn from(position: Position) -> Self {
        if position.is_zero() {
            WorkOffset::None
        } else {
            WorkOffset::Offset(position)
        }
    }
}

/// A parsed status report
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    /// Machine state
    pub state: RunState,
    /// Substate code after the colon, e.g. `Hold:1`
    pub substate: Option<u8>,
    /// `MPos` field
    pub machine_position: Option<Position>,
    /// `WPos` field
    pub work_position: Option<Position>,
    /// Present only on reports that carry a `WCO` field
    pub work_offset: Option<WorkOffset>,
    /// Fields not interpreted above, in report order
    pub fields: Vec<(String, String)>,
}

impl StatusReport {
    /// Parse a framed report. Text before the opening `<` is ignored.
    pub fn parse(frame: &str) -> Result<Self, ProtocolError> {
        let malformed = || ProtocolError::MalformedStatus(frame.to_string());

        let start = frame.find('<').ok_or_else(malformed)?;
        let body = frame[start + 1..]
            .trim_end()
            .strip_suffix('>')
            .ok_or_else(malformed)?;

        let mut parts = body.split('|');
        let head = parts.next().ok_or_else(malformed)?;
        let (state, substate) = match head.split_once(':') {
            Some((state, sub)) => (state, Some(sub.parse::<u8>().map_err(|_| malformed())?)),
            None => (head, None),
        };
        let state: RunState = state.parse().map_err(|_| malformed())?;

        let mut report = StatusReport {
            state,
            substate,
            machine_position: None,
            work_position: None,
            work_offset: None,
            fields: Vec::new(),
        };

        for part in parts {
            let (name, values) = part.split_once(':').ok_or_else(malformed)?;
            match name {
                "MPos" => {
                    report.machine_position =
                        Some(Position::parse(values).ok_or_else(malformed)?)
                }
                "WPos" => {
                    report.work_position = Some(Position::parse(values).ok_or_else(malformed)?)
                }
                "WCO" => {
                    let offset = Position::parse(values).ok_or_else(malformed)?;
                    report.work_offset = Some(WorkOffset::from(offset));
                }
                _ => report.fields.push((name.to_string(), values.to_string())),
            }
        }

        Ok(report)
    }
}
