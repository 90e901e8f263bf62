//! Protocol commands
//!
//! Defines the requests the host sends to a Grbl device.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The realtime status query character. Sent without line ending.
pub const STATUS_QUERY: u8 = b'?';

/// Commands understood by the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Dump all settings (`$$`)
    ReadSettings,

    /// Write one setting (`$<index>=<value>`)
    WriteSetting {
        /// Setting number
        index: u16,
        /// Encoded value
        value: String,
    },

    /// Clear the alarm lock (`$X`)
    Unlock,

    /// Rapid move along X (`G0 X<x>`)
    RapidMove {
        /// Target X
        x: f64,
    },

    /// Feed move along X (`G1 X<x>`)
    FeedMove {
        /// Target X
        x: f64,
    },

    /// Probe towards Z (`G38.2 Z<z>`)
    Probe {
        /// Lowest Z to probe to
        z: f64,
    },

    /// Set the modal feed rate (`F<rate>`)
    FeedRate {
        /// Units per minute
        rate: f64,
    },

    /// Realtime status query (`?`)
    StatusQuery,
}

impl Command {
    /// Whether this is a single realtime character rather than a line
    pub fn is_realtime(&self) -> bool {
        matches!(self, Command::StatusQuery)
    }

    /// Text written to the wire, without end-of-line
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::ReadSettings => write!(f, "$$"),
            Command::WriteSetting { index, value } => write!(f, "${}={}", index, value),
            Command::Unlock => write!(f, "$X"),
            Command::RapidMove { x } => write!(f, "G0 X{}", x),
            Command::FeedMove { x } => write!(f, "G1 X{}", x),
            Command::Probe { z } => write!(f, "G38.2 Z{}", z),
            Command::FeedRate { rate } => write!(f, "F{}", rate),
            Command::StatusQuery => write!(f, "{}", STATUS_QUERY as char),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_lines() {
        assert_eq!(Command::ReadSettings.to_line(), "$$");
        assert_eq!(
            Command::WriteSetting {
                index: 22,
                value: "1".into()
            }
            .to_line(),
            "$22=1"
        );
        assert_eq!(Command::Unlock.to_line(), "$X");
        assert_eq!(Command::RapidMove { x: 10.0 }.to_line(), "G0 X10");
        assert_eq!(Command::FeedMove { x: -2.5 }.to_line(), "G1 X-2.5");
        assert_eq!(Command::Probe { z: -5.0 }.to_line(), "G38.2 Z-5");
        assert_eq!(Command::FeedRate { rate: 500.0 }.to_line(), "F500");
    }

    #[test]
    fn test_only_status_query_is_realtime() {
        assert!(Command::StatusQuery.is_realtime());
        assert!(!Command::Unlock.is_realtime());
        assert_eq!(Command::StatusQuery.to_line(), "?");
    }
}
