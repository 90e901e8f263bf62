//! Serial Protocol Communication
//!
//! Implements the Grbl line protocol: byte transport, line framing,
//! request rendering, status report parsing and device error codes.

pub mod codes;
pub mod commands;
mod error;
pub mod line;
pub mod serial;
pub mod status;
mod transport;

pub use codes::DeviceError;
pub use commands::{Command, STATUS_QUERY};
pub use error::ProtocolError;
pub use line::{LineBuffer, LineTransport, Received};
pub use serial::SerialTransport;
pub use status::{Position, RunState, StatusReport, WorkOffset};
pub use transport::{Transport, DTR_RESET_PULSE};

/// Default baud rate for Grbl
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Line ending written after each command. Production firmware takes `\n`.
pub const DEFAULT_EOL: &str = "\n";

/// Default time to wait for data before a read gives up, in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Default interval between polls of the port, in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1;

/// Longest status report accepted before the frame is declared malformed
pub const MAX_STATUS_LEN: usize = 256;
