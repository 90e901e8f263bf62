//! Session state
//!
//! Everything the controller knows about the device for the lifetime of one
//! connection. Only the controller's response handlers mutate it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GrblError, Result};
use crate::protocol::{DeviceError, Position, ProtocolError, RunState, StatusReport, WorkOffset};
use crate::settings::{self, SettingValue};

/// What kind of response the controller is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProtocolPhase {
    /// Waiting for the boot banner
    #[default]
    Booting,
    /// Idle, no command in flight
    Ready,
    /// A command was sent, `ok` or `error:N` expected
    ExpectOk,
    /// `$$` was sent, setting lines expected
    ReadingSettings,
    /// A probe was sent, probe result expected
    ExpectProbe,
}

impl fmt::Display for ProtocolPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolPhase::Booting => "booting",
            ProtocolPhase::Ready => "ready",
            ProtocolPhase::ExpectOk => "expect_ok",
            ProtocolPhase::ReadingSettings => "reading_settings",
            ProtocolPhase::ExpectProbe => "expect_probe",
        };
        f.write_str(name)
    }
}

/// Whether the device has told us it is locked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LockState {
    /// Nothing said since boot
    #[default]
    Unknown,
    /// Booted into alarm with `'$H'|'$X' to unlock`
    Locked,
    /// Unlocked by `$X`
    Unlocked,
}

/// Outcome of a probe cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Machine position where the probe stopped
    pub position: Position,
    /// Whether contact was made
    pub success: bool,
}

/// What the controller knows about the device, reset on every boot
#[derive(Debug, Default)]
pub struct SessionState {
    pub(crate) phase: ProtocolPhase,
    pub(crate) run_state: Option<RunState>,
    pub(crate) lock: LockState,
    /// `None` until a report carrying `WCO` has been seen
    pub(crate) work_offset: Option<WorkOffset>,
    pub(crate) settings: BTreeMap<u16, SettingValue>,
    pub(crate) firmware_version: Option<String>,
    pub(crate) last_probe: Option<ProbeResult>,
    pub(crate) last_response: Option<String>,
}

impl SessionState {
    pub(crate) fn set_phase(&mut self, phase: ProtocolPhase) {
        if self.phase != phase {
            tracing::debug!("set phase {} -> {}", self.phase, phase);
        }
        self.phase = phase;
    }

    fn unexpected(&self) -> GrblError {
        ProtocolError::UnexpectedResponse {
            phase: self.phase,
            line: self.last_response.clone().unwrap_or_default(),
        }
        .into()
    }

    pub(crate) fn on_banner(&mut self, version: &str) -> Result<()> {
        tracing::info!("device salutation, Grbl {}", version);
        self.firmware_version = Some(version.to_string());
        self.lock = LockState::Unknown;
        self.set_phase(ProtocolPhase::Ready);
        Ok(())
    }

    pub(crate) fn on_message(&mut self, text: &str) -> Result<()> {
        if text.contains("to unlock") {
            self.lock = LockState::Locked;
            tracing::info!("device is locked: {}", text);
        } else if text.contains("Caution: Unlocked") {
            self.lock = LockState::Unlocked;
            tracing::info!("device unlocked");
        } else {
            tracing::debug!("device message: {}", text);
        }
        Ok(())
    }

    pub(crate) fn on_status(&mut self, report: &StatusReport) {
        self.run_state = Some(report.state);
        if let Some(offset) = report.work_offset {
            self.work_offset = Some(offset);
        }
    }

    pub(crate) fn on_ok(&mut self) -> Result<()> {
        if self.phase != ProtocolPhase::ExpectOk {
            return Err(self.unexpected());
        }
        self.set_phase(ProtocolPhase::Ready);
        Ok(())
    }

    /// `error:N` ends the exchange: the phase returns to ready before the
    /// mapped error is raised.
    pub(crate) fn on_error(&mut self, code: u16) -> Result<()> {
        if !matches!(
            self.phase,
            ProtocolPhase::ExpectOk | ProtocolPhase::ExpectProbe
        ) {
            return Err(self.unexpected());
        }
        let err = DeviceError::from_code(code).ok_or(ProtocolError::UnmappedErrorCode(code))?;
        self.set_phase(ProtocolPhase::Ready);
        tracing::warn!("device error {}: {}", code, err);
        Err(err.into())
    }

    pub(crate) fn on_setting(&mut self, index: u16, raw: &str) -> Result<()> {
        if self.phase != ProtocolPhase::ReadingSettings {
            return Err(self.unexpected());
        }
        let setting = settings::by_index(index)
            .ok_or_else(|| GrblError::UnknownSetting(format!("${}={}", index, raw)))?;
        let value = setting.decode(raw)?;
        self.settings.insert(index, value);

        let total = settings::SETTINGS.len();
        tracing::debug!(
            "setting received from device {} ({}/{}) {} {}",
            index,
            self.settings.len(),
            total,
            setting.name,
            value
        );
        // No end marker: a complete dump is the signal
        if self.settings.len() == total {
            self.set_phase(ProtocolPhase::ExpectOk);
        }
        Ok(())
    }

    pub(crate) fn on_probe(&mut self, position: Position, success: bool) -> Result<()> {
        if self.phase != ProtocolPhase::ExpectProbe {
            return Err(self.unexpected());
        }
        tracing::debug!("probe result {:?} success={}", position, success);
        self.last_probe = Some(ProbeResult { position, success });
        self.set_phase(ProtocolPhase::ExpectOk);
        Ok(())
    }
}
