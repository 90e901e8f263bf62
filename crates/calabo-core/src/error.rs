//! Crate-level errors

use thiserror::Error;

use crate::config::ConfigError;
use crate::protocol::{DeviceError, ProtocolError};

/// Result alias used throughout the crate
pub type Result<T, E = GrblError> = std::result::Result<T, E>;

/// Everything a controller operation can fail with.
///
/// Nothing in the crate retries on any of these; whether to retry, reset
/// or give up is the caller's decision.
#[derive(Error, Debug)]
pub enum GrblError {
    /// Transport failure or protocol desynchronization
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The device answered `error:<code>`
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// No setting has this index or name
    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    /// The cache has not been filled from the device yet
    #[error("Setting {0} requested before settings were read from device")]
    SettingsNotYetRead(u16),

    /// A value that cannot be converted to the setting's type
    #[error("Invalid value {value:?} for setting '{name}'")]
    InvalidValue {
        /// Setting name
        name: String,
        /// The rejected value as text
        value: String,
    },

    /// Refused to write a setting because the machine is in alarm
    #[error("Machine is locked in alarm state; unlock it first")]
    AlarmLocked,

    /// The machine stayed busy for every status poll before a write
    #[error("Machine did not become idle after {polls} status polls")]
    GuardTimeout {
        /// Number of polls made
        polls: u32,
    },

    /// Configuration file error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GrblError {
    /// The device error behind this failure, if any
    pub fn device_error(&self) -> Option<DeviceError> {
        match self {
            GrblError::Device(e) => Some(*e),
            _ => None,
        }
    }

    /// No data arrived in time. The command is still in flight: wait for it
    /// with [`Controller::await_response`](crate::controller::Controller::await_response)
    /// or start over with `reset`.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GrblError::Protocol(ProtocolError::Timeout))
    }

    /// The session cannot continue without a reset or reconnect
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GrblError::Protocol(
                ProtocolError::ConnectionClosed
                    | ProtocolError::NotConnected
                    | ProtocolError::NoSalutation
                    | ProtocolError::UnexpectedResponse { .. }
                    | ProtocolError::MalformedStatus(_)
                    | ProtocolError::UnmappedErrorCode(_)
                    | ProtocolError::NotReady(_)
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_display() {
        let err = GrblError::from(DeviceError::SoftLimits);
        assert_eq!(
            err.to_string(),
            "Grbl error 10 (SoftLimits): Soft limits cannot be enabled without homing also enabled"
        );
        assert_eq!(err.device_error(), Some(DeviceError::SoftLimits));
    }

    #[test]
    fn test_timeout_is_not_fatal() {
        let timeout = GrblError::from(ProtocolError::Timeout);
        assert!(timeout.is_timeout());
        assert!(!timeout.is_fatal());

        let closed = GrblError::from(ProtocolError::ConnectionClosed);
        assert!(!closed.is_timeout());
        assert!(closed.is_fatal());
    }
}
