//! # Calabo Core Library
//!
//! Host-side control of Grbl CNC firmware over a serial line.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Line framing over a serial port (CR, LF and CRLF terminated)
//! - The Grbl settings registry and its string codec
//! - A controller that sequences commands and responses
//! - A thread-safe session facade for reading and writing settings
//! - A simulated Grbl device for running without hardware
//!
//! ## Example
//!
//! ```rust,ignore
//! use calabo_core::prelude::*;
//!
//! let config = ControllerConfig::for_port("/dev/ttyUSB0");
//! let port = SerialTransport::new(&config.port_name, Some(config.baud_rate));
//! let session = Session::open(port, config)?;
//!
//! let settings = session.get_all_settings(true, false)?;
//! println!("homing: {}", settings["homing-cycle-enable"]);
//! ```

pub mod config;
pub mod controller;
pub mod demo;
pub mod error;
pub mod protocol;
pub mod session;
pub mod settings;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::ControllerConfig;
    pub use crate::controller::{Controller, LockState, ProbeResult, ProtocolPhase};
    pub use crate::demo::DemoGrbl;
    pub use crate::error::{GrblError, Result};
    pub use crate::protocol::{
        DeviceError, Position, ProtocolError, RunState, SerialTransport, StatusReport, Transport,
        WorkOffset,
    };
    pub use crate::session::Session;
    pub use crate::settings::{Setting, SettingKey, SettingType, SettingValue};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
