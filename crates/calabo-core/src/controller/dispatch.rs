//! Response dispatch
//!
//! Every line from the device is matched against a fixed, ordered list of
//! patterns; the first match's handler updates the session state. A line that
//! matches nothing is a protocol violation.

use regex::{Captures, Regex};

use super::state::SessionState;
use crate::error::{GrblError, Result};
use crate::protocol::{Position, ProtocolError, StatusReport};

type Handler = fn(&mut SessionState, &Captures<'_>) -> Result<()>;

/// Ordered `(pattern, handler)` table
pub struct Dispatcher {
    handlers: Vec<(Regex, Handler)>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Compile the response patterns in priority order
    pub fn new() -> Self {
        let table: [(&str, Handler); 7] = [
            (r"^Grbl (\S+) \[.*for help\]$", handle_banner),
            (r"^\[MSG:(.*)\]$", handle_message),
            (r"^<.*>$", handle_status),
            (r"^ok$", handle_ok),
            (r"^error:(\d+)$", handle_error),
            (r"^\$(\d+)=(.+)$", handle_setting),
            (r"^\[PRB:([^,]+),([^,]+),([^:]+):([01])\]$", handle_probe),
        ];
        let handlers = table
            .into_iter()
            .map(|(pattern, handler)| (Regex::new(pattern).unwrap(), handler))
            .collect();
        Self { handlers }
    }

    /// Route one line to its handler
    pub(crate) fn dispatch(&self, state: &mut SessionState, line: &str) -> Result<()> {
        state.last_response = Some(line.to_string());

        for (regex, handler) in &self.handlers {
            if let Some(caps) = regex.captures(line) {
                return handler(state, &caps);
            }
        }

        tracing::warn!("unexpected response in phase {}: {:?}", state.phase, line);
        Err(ProtocolError::UnexpectedResponse {
            phase: state.phase,
            line: line.to_string(),
        }
        .into())
    }
}

fn handle_banner(state: &mut SessionState, caps: &Captures<'_>) -> Result<()> {
    state.on_banner(&caps[1])
}

fn handle_message(state: &mut SessionState, caps: &Captures<'_>) -> Result<()> {
    state.on_message(&caps[1])
}

fn handle_status(state: &mut SessionState, caps: &Captures<'_>) -> Result<()> {
    let report = StatusReport::parse(&caps[0])?;
    state.on_status(&report);
    Ok(())
}

fn handle_ok(state: &mut SessionState, _caps: &Captures<'_>) -> Result<()> {
    state.on_ok()
}

fn handle_error(state: &mut SessionState, caps: &Captures<'_>) -> Result<()> {
    let code = caps[1]
        .parse::<u16>()
        .map_err(|_| ProtocolError::UnmappedErrorCode(u16::MAX))?;
    state.on_error(code)
}

fn handle_setting(state: &mut SessionState, caps: &Captures<'_>) -> Result<()> {
    let index = caps[1]
        .parse::<u16>()
        .map_err(|_| GrblError::UnknownSetting(caps[0].to_string()))?;
    state.on_setting(index, &caps[2])
}

fn handle_probe(state: &mut SessionState, caps: &Captures<'_>) -> Result<()> {
    let axis = |i: usize| {
        caps[i]
            .trim()
            .parse::<f64>()
            .map_err(|_| ProtocolError::UnexpectedResponse {
                phase: state.phase,
                line: caps[0].to_string(),
            })
    };
    let position = Position::new(axis(1)?, axis(2)?, axis(3)?);
    state.on_probe(position, &caps[4] == "1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::state::{LockState, ProtocolPhase};
    use crate::protocol::{DeviceError, RunState, WorkOffset};
    use crate::settings::{SettingValue, SETTINGS};

    fn state_in(phase: ProtocolPhase) -> SessionState {
        SessionState {
            phase,
            ..SessionState::default()
        }
    }

    #[test]
    fn test_banner_makes_ready() {
        let dispatcher = Dispatcher::new();
        let mut state = SessionState::default();
        dispatcher
            .dispatch(&mut state, "Grbl 1.1f ['$' for help]")
            .unwrap();
        assert_eq!(state.phase, ProtocolPhase::Ready);
        assert_eq!(state.firmware_version.as_deref(), Some("1.1f"));
    }

    #[test]
    fn test_lock_messages() {
        let dispatcher = Dispatcher::new();
        let mut state = state_in(ProtocolPhase::Ready);
        dispatcher
            .dispatch(&mut state, "[MSG:'$H'|'$X' to unlock]")
            .unwrap();
        assert_eq!(state.lock, LockState::Locked);
        dispatcher
            .dispatch(&mut state, "[MSG:Caution: Unlocked]")
            .unwrap();
        assert_eq!(state.lock, LockState::Unlocked);
        dispatcher.dispatch(&mut state, "[MSG:Pgm End]").unwrap();
        assert_eq!(state.lock, LockState::Unlocked);
    }

    #[test]
    fn test_ok_only_when_expected() {
        let dispatcher = Dispatcher::new();
        let mut state = state_in(ProtocolPhase::ExpectOk);
        dispatcher.dispatch(&mut state, "ok").unwrap();
        assert_eq!(state.phase, ProtocolPhase::Ready);

        let err = dispatcher.dispatch(&mut state, "ok").unwrap_err();
        assert!(matches!(
            err,
            GrblError::Protocol(ProtocolError::UnexpectedResponse {
                phase: ProtocolPhase::Ready,
                ..
            })
        ));
        assert_eq!(state.phase, ProtocolPhase::Ready);
    }

    #[test]
    fn test_error_maps_and_ends_exchange() {
        let dispatcher = Dispatcher::new();
        let mut state = state_in(ProtocolPhase::ExpectOk);
        let err = dispatcher.dispatch(&mut state, "error:10").unwrap_err();
        assert_eq!(err.device_error(), Some(DeviceError::SoftLimits));
        assert_eq!(state.phase, ProtocolPhase::Ready);
    }

    #[test]
    fn test_unmapped_error_code() {
        let dispatcher = Dispatcher::new();
        let mut state = state_in(ProtocolPhase::ExpectOk);
        let err = dispatcher.dispatch(&mut state, "error:99").unwrap_err();
        assert!(matches!(
            err,
            GrblError::Protocol(ProtocolError::UnmappedErrorCode(99))
        ));
        assert_eq!(state.phase, ProtocolPhase::ExpectOk);
    }

    #[test]
    fn test_unknown_line_does_not_advance_phase() {
        let dispatcher = Dispatcher::new();
        for phase in [
            ProtocolPhase::Booting,
            ProtocolPhase::Ready,
            ProtocolPhase::ExpectOk,
            ProtocolPhase::ReadingSettings,
            ProtocolPhase::ExpectProbe,
        ] {
            let mut state = state_in(phase);
            let err = dispatcher.dispatch(&mut state, "\u{1}garbage%%").unwrap_err();
            assert!(matches!(
                err,
                GrblError::Protocol(ProtocolError::UnexpectedResponse { .. })
            ));
            assert_eq!(state.phase, phase);
            assert_eq!(state.last_response.as_deref(), Some("\u{1}garbage%%"));
        }
    }

    #[test]
    fn test_settings_dump_completes_on_count() {
        let dispatcher = Dispatcher::new();
        let mut state = state_in(ProtocolPhase::ReadingSettings);
        for (i, setting) in SETTINGS.iter().enumerate() {
            assert_eq!(state.phase, ProtocolPhase::ReadingSettings, "before {}", i);
            let line = format!("${}={}", setting.index, setting.default);
            dispatcher.dispatch(&mut state, &line).unwrap();
        }
        assert_eq!(state.phase, ProtocolPhase::ExpectOk);
        assert_eq!(state.settings.len(), SETTINGS.len());
        assert_eq!(state.settings[&22], SettingValue::Boolean(false));
        dispatcher.dispatch(&mut state, "ok").unwrap();
        assert_eq!(state.phase, ProtocolPhase::Ready);
    }

    #[test]
    fn test_setting_outside_dump_rejected() {
        let dispatcher = Dispatcher::new();
        let mut state = state_in(ProtocolPhase::ExpectOk);
        assert!(dispatcher.dispatch(&mut state, "$22=1").is_err());
        assert!(state.settings.is_empty());
    }

    #[test]
    fn test_unknown_setting_index() {
        let dispatcher = Dispatcher::new();
        let mut state = state_in(ProtocolPhase::ReadingSettings);
        let err = dispatcher.dispatch(&mut state, "$7=1").unwrap_err();
        assert!(matches!(err, GrblError::UnknownSetting(_)));
    }

    #[test]
    fn test_status_line_updates_state() {
        let dispatcher = Dispatcher::new();
        let mut state = state_in(ProtocolPhase::Ready);
        dispatcher
            .dispatch(&mut state, "<Alarm|MPos:0.000,0.000,0.000|WCO:0.000,0.000,0.000>")
            .unwrap();
        assert_eq!(state.run_state, Some(RunState::Alarm));
        assert_eq!(state.work_offset, Some(WorkOffset::None));
    }

    #[test]
    fn test_probe_then_ok() {
        let dispatcher = Dispatcher::new();
        let mut state = state_in(ProtocolPhase::ExpectProbe);
        dispatcher
            .dispatch(&mut state, "[PRB:0.000,0.000,-1.500:1]")
            .unwrap();
        assert_eq!(state.phase, ProtocolPhase::ExpectOk);
        let probe = state.last_probe.unwrap();
        assert!(probe.success);
        assert_eq!(probe.position, Position::new(0.0, 0.0, -1.5));
        dispatcher.dispatch(&mut state, "ok").unwrap();
        assert_eq!(state.phase, ProtocolPhase::Ready);
    }

    #[test]
    fn test_ok_without_probe_result() {
        let dispatcher = Dispatcher::new();
        let mut state = state_in(ProtocolPhase::ExpectProbe);
        assert!(dispatcher.dispatch(&mut state, "ok").is_err());
        assert_eq!(state.phase, ProtocolPhase::ExpectProbe);
    }
}
