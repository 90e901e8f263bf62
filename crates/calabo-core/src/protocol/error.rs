//! Protocol errors

use thiserror::Error;

use crate::controller::ProtocolPhase;

/// Errors that can occur on the serial link or while following the Grbl
/// response protocol
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The serial driver reported an error
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// No data arrived before the read deadline. The caller may retry.
    #[error("Timed out waiting for a response")]
    Timeout,

    /// The link went away underneath us. Fatal to the session.
    #[error("Connection closed")]
    ConnectionClosed,

    /// No transport has been opened
    #[error("Not connected to device")]
    NotConnected,

    /// The boot banner never arrived
    #[error("No salutation received from device")]
    NoSalutation,

    /// A line that makes no sense in the current phase
    #[error("Unexpected response in phase {phase}: {line:?}")]
    UnexpectedResponse {
        /// Phase the line arrived in
        phase: ProtocolPhase,
        /// The offending line
        line: String,
    },

    /// A status report that could not be parsed or ran too long
    #[error("Malformed status report: {0:?}")]
    MalformedStatus(String),

    /// An `error:<code>` line with a code outside the known table
    #[error("Device reported unknown error code {0}")]
    UnmappedErrorCode(u16),

    /// A previous exchange was left unfinished. After a timeout the caller
    /// may keep waiting for it; after a violation the session must be reset.
    #[error("Controller is not ready for a new command (phase {0})")]
    NotReady(ProtocolPhase),

    /// Other I/O failure on the link
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
