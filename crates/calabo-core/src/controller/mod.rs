//! Grbl controller
//!
//! Turns the half-duplex line protocol into blocking request/response calls.
//! Every operation writes one command and then reads until the device has
//! fully answered (or an error is raised). Nothing here retries: a device
//! error or a desynchronized stream goes straight back to the caller.

mod dispatch;
mod state;

pub use dispatch::Dispatcher;
pub use state::{LockState, ProbeResult, ProtocolPhase, SessionState};

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::ControllerConfig;
use crate::error::{GrblError, Result};
use crate::protocol::{
    Command, LineTransport, ProtocolError, Received, RunState, StatusReport, Transport,
    WorkOffset,
};
use crate::settings::{self, SettingKey, SettingValue};

/// Host-side controller for one device connection
pub struct Controller<T: Transport> {
    link: LineTransport<T>,
    config: ControllerConfig,
    dispatcher: Dispatcher,
    state: SessionState,
}

impl<T: Transport> Controller<T> {
    /// Create a controller (not yet connected)
    pub fn new(transport: T, config: ControllerConfig) -> Self {
        let link = LineTransport::new(transport, config.write_eol.clone());
        Self {
            link,
            config,
            dispatcher: Dispatcher::new(),
            state: SessionState::default(),
        }
    }

    /// Open the transport and run [`initialize`](Self::initialize)
    pub fn open(&mut self) -> Result<()> {
        self.link.transport_mut().open()?;
        self.initialize()
    }

    /// Close the transport and discard all session state
    pub fn close(&mut self) {
        self.link.transport_mut().close();
        self.link.clear();
        self.state = SessionState::default();
    }

    /// Read the boot banner, sync all settings and query status twice.
    ///
    /// The second status query guarantees the work offset has been reported.
    pub fn initialize(&mut self) -> Result<()> {
        self.state = SessionState::default();

        self.await_salutation()?;
        self.drain_unsolicited()?;
        self.read_settings()?;
        self.read_state()?;
        self.read_state()?;

        tracing::info!(
            "initialized {} (Grbl {}), state {:?}, lock {:?}",
            self.link.transport().name(),
            self.state.firmware_version.as_deref().unwrap_or("?"),
            self.state.run_state,
            self.state.lock
        );
        Ok(())
    }

    /// Power-cycle the device through the transport and initialize again
    pub fn reset(&mut self) -> Result<()> {
        tracing::info!("resetting {}", self.link.transport().name());
        self.link.clear();
        self.link.transport_mut().reset()?;
        self.initialize()
    }

    /// Re-read every setting from the device (`$$`)
    pub fn read_settings(&mut self) -> Result<()> {
        self.ensure_ready()?;
        self.state.settings.clear();
        self.send(Command::ReadSettings, ProtocolPhase::ReadingSettings)
    }

    /// Cached value of a setting
    pub fn setting(&self, key: impl Into<SettingKey>) -> Result<SettingValue> {
        let setting = settings::lookup(&key.into())?;
        self.state
            .settings
            .get(&setting.index)
            .copied()
            .ok_or(GrblError::SettingsNotYetRead(setting.index))
    }

    /// Write a setting once the machine accepts settings, then update the
    /// cache. On a device error the cache is left unchanged.
    pub fn set_setting(&mut self, key: impl Into<SettingKey>, value: SettingValue) -> Result<()> {
        let setting = settings::lookup(&key.into())?;
        let value = setting.coerce(value)?;

        self.ensure_ready()?;
        self.wait_until_writable()?;
        self.send(
            Command::WriteSetting {
                index: setting.index,
                value: value.to_string(),
            },
            ProtocolPhase::ExpectOk,
        )?;

        self.state.settings.insert(setting.index, value);
        tracing::debug!("set setting {} {} {}", setting.index, setting.name, value);
        Ok(())
    }

    /// All cached settings by index
    pub fn settings(&self) -> &BTreeMap<u16, SettingValue> {
        &self.state.settings
    }

    /// Clear the alarm lock (`$X`) and refresh the machine state
    pub fn unlock(&mut self) -> Result<()> {
        self.send(Command::Unlock, ProtocolPhase::ExpectOk)?;
        self.state.lock = LockState::Unlocked;
        self.read_state()?;
        Ok(())
    }

    /// Rapid move along X (`G0`)
    pub fn move_to(&mut self, x: f64) -> Result<()> {
        self.send(Command::RapidMove { x }, ProtocolPhase::ExpectOk)
    }

    /// Feed move along X (`G1`) at the modal feed rate
    pub fn mill(&mut self, x: f64) -> Result<()> {
        self.send(Command::FeedMove { x }, ProtocolPhase::ExpectOk)
    }

    /// Set the modal feed rate used by [`mill`](Self::mill) and
    /// [`probe`](Self::probe)
    pub fn feed_rate(&mut self, rate: f64) -> Result<()> {
        self.send(Command::FeedRate { rate }, ProtocolPhase::ExpectOk)
    }

    /// Probe towards `z` (`G38.2`) and return where contact was made
    pub fn probe(&mut self, z: f64) -> Result<ProbeResult> {
        self.state.last_probe = None;
        self.send(Command::Probe { z }, ProtocolPhase::ExpectProbe)?;
        self.state.last_probe.ok_or_else(|| {
            ProtocolError::UnexpectedResponse {
                phase: self.state.phase,
                line: self.state.last_response.clone().unwrap_or_default(),
            }
            .into()
        })
    }

    /// Query machine state with the realtime `?` command.
    ///
    /// Reads raw characters up to the closing `>`, bypassing line framing.
    pub fn read_state(&mut self) -> Result<StatusReport> {
        self.ensure_ready()?;
        self.link.send(&Command::StatusQuery)?;

        let frame = self
            .link
            .read_until(
                b'>',
                self.config.status_max_len,
                self.config.read_timeout(),
                self.config.poll_interval(),
            )?
            .ok_or(ProtocolError::Timeout)?;

        let report = StatusReport::parse(&frame)?;
        self.state.on_status(&report);
        tracing::debug!("status {} wco {:?}", report.state, self.state.work_offset);
        Ok(report)
    }

    /// Keep waiting for the answer to a command whose read timed out.
    ///
    /// A timeout leaves the command in flight: the phase stays where it was
    /// and new commands fail with `NotReady`. Calling this consumes the late
    /// answer (including the rest of a settings dump or a probe result) and
    /// returns to ready. It may time out again. Does nothing when no command
    /// is in flight.
    pub fn await_response(&mut self) -> Result<()> {
        match self.state.phase {
            ProtocolPhase::Ready => Ok(()),
            ProtocolPhase::Booting => Err(ProtocolError::NotReady(ProtocolPhase::Booting).into()),
            phase => {
                tracing::debug!("resuming in phase {}", phase);
                self.step()
            }
        }
    }

    /// What the controller is currently waiting for
    pub fn phase(&self) -> ProtocolPhase {
        self.state.phase
    }

    /// Machine state from the most recent status query
    pub fn run_state(&self) -> Option<RunState> {
        self.state.run_state
    }

    /// Lock state announced by the device since boot
    pub fn lock_state(&self) -> LockState {
        self.state.lock
    }

    /// True once `$X` has been acknowledged this session
    pub fn unlocked(&self) -> bool {
        self.state.lock == LockState::Unlocked
    }

    /// `None` until a status report has carried a work offset
    pub fn work_offset(&self) -> Option<WorkOffset> {
        self.state.work_offset
    }

    /// Version from the boot banner, e.g. `1.1f`
    pub fn firmware_version(&self) -> Option<&str> {
        self.state.firmware_version.as_deref()
    }

    /// Result of the most recent successful probe
    pub fn last_probe(&self) -> Option<ProbeResult> {
        self.state.last_probe
    }

    /// Most recent raw line, for diagnostics
    pub fn last_response(&self) -> Option<&str> {
        self.state.last_response.as_deref()
    }

    /// Configuration this controller was created with
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        self.link.transport()
    }

    /// The underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        self.link.transport_mut()
    }

    /// Give the transport back, dropping session state
    pub fn into_transport(self) -> T {
        self.link.into_inner()
    }

    fn ensure_ready(&self) -> Result<()> {
        if !self.link.transport().is_open() {
            return Err(ProtocolError::ConnectionClosed.into());
        }
        match self.state.phase {
            ProtocolPhase::Ready => Ok(()),
            phase => Err(ProtocolError::NotReady(phase).into()),
        }
    }

    /// Write `command`, enter `phase` and read until ready again
    fn send(&mut self, command: Command, phase: ProtocolPhase) -> Result<()> {
        self.ensure_ready()?;
        self.link.send(&command)?;
        self.state.set_phase(phase);
        self.step()
    }

    /// Consume lines until the phase returns to ready. Multi-line answers
    /// such as a settings dump are drained completely.
    fn step(&mut self) -> Result<()> {
        while self.state.phase != ProtocolPhase::Ready {
            if !self.next_line(self.config.read_timeout())? {
                tracing::warn!("timeout in phase {}", self.state.phase);
                return Err(ProtocolError::Timeout.into());
            }
        }
        Ok(())
    }

    /// Read and dispatch one non-empty line. `Ok(false)` on timeout.
    fn next_line(&mut self, timeout: Duration) -> Result<bool> {
        loop {
            match self.link.read_line(timeout, self.config.poll_interval())? {
                None => return Ok(false),
                Some(Received::Line(line)) if line.is_empty() => continue,
                Some(Received::Line(line)) => {
                    self.dispatcher.dispatch(&mut self.state, &line)?;
                    return Ok(true);
                }
                Some(Received::Realtime(c)) => {
                    tracing::trace!("ignoring realtime character {:?}", c);
                }
            }
        }
    }

    fn await_salutation(&mut self) -> Result<()> {
        while self.state.phase == ProtocolPhase::Booting {
            if !self.next_line(self.config.read_timeout())? {
                return Err(ProtocolError::NoSalutation.into());
            }
        }
        Ok(())
    }

    /// Pick up messages the device sends on its own after booting, such as
    /// the homing lock notice
    fn drain_unsolicited(&mut self) -> Result<()> {
        while self.next_line(self.config.boot_settle())? {}
        Ok(())
    }

    /// Poll status until a settings write is allowed.
    ///
    /// `Idle` and `Jog` accept writes. A machine that booted into alarm
    /// because homing is enabled (locked, never unlocked) also accepts them;
    /// any other alarm does not. Other states are polled until
    /// `guard_max_polls` is exhausted.
    fn wait_until_writable(&mut self) -> Result<()> {
        let polls = self.config.guard_max_polls.max(1);
        for poll in 0..polls {
            let report = self.read_state()?;
            match (report.state, self.state.lock) {
                (RunState::Idle | RunState::Jog, _) => return Ok(()),
                (RunState::Alarm, LockState::Locked) => return Ok(()),
                (RunState::Alarm, _) => return Err(GrblError::AlarmLocked),
                (other, _) => {
                    tracing::debug!(
                        "waiting to write settings, state {} (poll {})",
                        other,
                        poll + 1
                    );
                    std::thread::sleep(self.config.guard_poll_interval());
                }
            }
        }
        Err(GrblError::GuardTimeout { polls })
    }
}

impl<T: Transport> std::fmt::Debug for Controller<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("transport", &self.link.transport().name())
            .field("state", &self.state)
            .finish()
    }
}
