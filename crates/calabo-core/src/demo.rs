//! Demo Mode - Simulated Grbl device
//!
//! Speaks the Grbl line protocol from the device side, entirely in memory.
//! Used for testing without hardware and as a stand-in device when no
//! controller is attached. Responses are produced synchronously while the
//! host writes, so nothing here sleeps.

use std::collections::{BTreeMap, VecDeque};

use crate::error::{GrblError, Result};
use crate::protocol::{
    DeviceError, LineBuffer, Position, ProtocolError, Received, RunState, Transport,
    STATUS_QUERY,
};
use crate::settings::{self, SettingKey, SettingValue, HOMING_CYCLE_ENABLE, SOFT_LIMITS_ENABLE};

/// Banner printed on every boot
pub const DEMO_BANNER: &str = "Grbl 1.1f ['$' for help]";

/// A status report includes `WCO` once every this many reports
const WCO_REPORT_INTERVAL: u32 = 10;

/// Simulated Grbl 1.1 device
#[derive(Debug)]
pub struct DemoGrbl {
    name: String,
    open: bool,
    dtr: bool,
    framer: LineBuffer,
    outbox: VecDeque<u8>,
    /// Persists across resets, like EEPROM
    settings: BTreeMap<u16, SettingValue>,
    state: RunState,
    position: Position,
    work_offset: Position,
    feed_rate: Option<f64>,
    reports_since_boot: u32,
    received: Vec<String>,
    /// Output is buffered but not readable while set
    held: bool,
}

impl Default for DemoGrbl {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoGrbl {
    /// A device with factory default settings
    pub fn new() -> Self {
        let settings = settings::SETTINGS
            .iter()
            .map(|s| (s.index, s.default))
            .collect();
        Self {
            name: "demo".to_string(),
            open: false,
            dtr: true,
            framer: LineBuffer::with_realtime_hooks(&[STATUS_QUERY]),
            outbox: VecDeque::new(),
            settings,
            state: RunState::Idle,
            position: Position::default(),
            work_offset: Position::default(),
            feed_rate: None,
            reports_since_boot: 0,
            received: Vec::new(),
            held: false,
        }
    }

    /// Override a stored setting before the device boots
    pub fn with_setting(
        mut self,
        key: impl Into<SettingKey>,
        value: impl Into<SettingValue>,
    ) -> Result<Self> {
        let setting = settings::lookup(&key.into())?;
        self.settings.insert(setting.index, setting.coerce(value.into())?);
        Ok(self)
    }

    /// Set the work coordinate offset reported in `WCO`
    pub fn with_work_offset(mut self, offset: Position) -> Self {
        self.work_offset = offset;
        self
    }

    /// Setting value as stored on the device
    pub fn device_setting(&self, index: u16) -> Option<SettingValue> {
        self.settings.get(&index).copied()
    }

    /// Current machine state
    pub fn run_state(&self) -> RunState {
        self.state
    }

    /// Force the machine state, e.g. to simulate a feed hold or a limit alarm
    pub fn set_run_state(&mut self, state: RunState) {
        self.state = state;
    }

    /// Current machine position
    pub fn position(&self) -> Position {
        self.position
    }

    /// Every line the host has sent, in order
    pub fn received(&self) -> &[String] {
        &self.received
    }

    /// Stop (or resume) delivering output, like a stalled link. Responses
    /// are still produced and become readable once released.
    pub fn hold_output(&mut self, hold: bool) {
        self.held = hold;
    }

    /// Queue raw device output, as if the firmware had sent it
    pub fn inject(&mut self, bytes: &[u8]) {
        self.outbox.extend(bytes);
    }

    fn flag(&self, index: u16) -> bool {
        self.settings
            .get(&index)
            .and_then(SettingValue::as_bool)
            .unwrap_or(false)
    }

    fn write_line(&mut self, line: &str) {
        self.outbox.extend(line.as_bytes());
        self.outbox.extend(b"\r\n");
    }

    fn write_error(&mut self, err: DeviceError) {
        self.write_line(&format!("error:{}", err.code()));
    }

    fn boot(&mut self) {
        self.framer.clear();
        self.position = Position::default();
        self.feed_rate = None;
        self.reports_since_boot = 0;

        let homing = self.flag(HOMING_CYCLE_ENABLE);
        self.state = if homing { RunState::Alarm } else { RunState::Idle };

        self.write_line("");
        self.write_line(DEMO_BANNER);
        if homing {
            self.write_line("[MSG:'$H'|'$X' to unlock]");
        }
        tracing::debug!(target: "calabo::demo", "booted in state {}", self.state);
    }

    fn status_report(&mut self) {
        let p = self.position;
        let mut report = format!(
            "<{}|MPos:{:.3},{:.3},{:.3}|FS:{},0",
            self.state,
            p.x,
            p.y,
            p.z,
            self.feed_rate.unwrap_or(0.0).round() as i64
        );
        if self.reports_since_boot % WCO_REPORT_INTERVAL == 0 {
            let o = self.work_offset;
            report.push_str(&format!("|WCO:{:.3},{:.3},{:.3}", o.x, o.y, o.z));
        }
        report.push('>');
        self.reports_since_boot += 1;
        self.write_line(&report);
    }

    fn process_line(&mut self, line: &str) {
        tracing::trace!(target: "calabo::demo", "request {:?}", line);
        self.received.push(line.to_string());
        let line = line.trim();

        if line == "$$" {
            let dump: Vec<String> = self
                .settings
                .iter()
                .map(|(index, value)| format!("${}={}", index, value))
                .collect();
            for entry in dump {
                self.write_line(&entry);
            }
            self.write_line("ok");
        } else if line == "$X" {
            if self.state == RunState::Alarm {
                self.write_line("[MSG:Caution: Unlocked]");
                self.state = RunState::Idle;
            }
            self.write_line("ok");
        } else if let Some((index, value)) = line
            .strip_prefix('$')
            .and_then(|assignment| assignment.split_once('='))
        {
            self.write_setting(index, value);
        } else if !self.process_gcode(line) {
            self.write_line(&format!("{{DemoGrbl unexpected request:{:?}}}", line));
        }
    }

    fn write_setting(&mut self, index: &str, raw: &str) {
        let Some(setting) = index.parse::<u16>().ok().and_then(settings::by_index) else {
            self.write_error(DeviceError::InvalidStatement);
            return;
        };
        let Ok(value) = setting.decode(raw) else {
            self.write_error(DeviceError::BadNumberFormat);
            return;
        };

        // Soft limits need homing
        if setting.index == SOFT_LIMITS_ENABLE
            && value == SettingValue::Boolean(true)
            && !self.flag(HOMING_CYCLE_ENABLE)
        {
            self.write_error(DeviceError::SoftLimits);
            return;
        }
        // Disabling homing takes soft limits with it
        if setting.index == HOMING_CYCLE_ENABLE
            && value == SettingValue::Boolean(false)
            && self.flag(SOFT_LIMITS_ENABLE)
        {
            self.settings
                .insert(SOFT_LIMITS_ENABLE, SettingValue::Boolean(false));
        }

        self.settings.insert(setting.index, value);
        self.write_line("ok");
    }

    /// Handle a G-code block. Returns false if the block is not understood.
    fn process_gcode(&mut self, line: &str) -> bool {
        let mut words = BTreeMap::new();
        for word in line.split_whitespace() {
            let mut chars = word.chars();
            let Some(letter) = chars.next() else {
                continue;
            };
            let Ok(value) = chars.as_str().parse::<f64>() else {
                return false;
            };
            words.insert(letter.to_ascii_uppercase(), (chars.as_str().to_string(), value));
        }

        if let Some((_, feed)) = words.get(&'F') {
            self.feed_rate = Some(*feed);
        }
        let axis = |letter: char| words.get(&letter).map(|(_, v)| *v);

        match words.get(&'G').map(|(raw, _)| raw.as_str()) {
            None if words.contains_key(&'F') && words.len() == 1 => {
                self.write_line("ok");
            }
            Some("0") | Some("1") => {
                let feed_move = words.get(&'G').map(|(raw, _)| raw == "1").unwrap_or(false);
                if self.state == RunState::Alarm {
                    self.write_error(DeviceError::AlarmJogLock);
                } else if feed_move && self.feed_rate.is_none() {
                    self.write_error(DeviceError::FeedRate);
                } else {
                    self.position.x = axis('X').unwrap_or(self.position.x);
                    self.position.y = axis('Y').unwrap_or(self.position.y);
                    self.position.z = axis('Z').unwrap_or(self.position.z);
                    self.write_line("ok");
                }
            }
            Some("38.2") => {
                if self.state == RunState::Alarm {
                    self.write_error(DeviceError::AlarmJogLock);
                } else if self.feed_rate.is_none() {
                    self.write_error(DeviceError::FeedRate);
                } else {
                    self.position.z = axis('Z').unwrap_or(self.position.z);
                    let p = self.position;
                    self.write_line(&format!("[PRB:{:.3},{:.3},{:.3}:1]", p.x, p.y, p.z));
                    self.write_line("ok");
                }
            }
            _ => return false,
        }
        true
    }

    fn ensure_open(&self) -> std::result::Result<(), ProtocolError> {
        if self.open {
            Ok(())
        } else {
            Err(ProtocolError::ConnectionClosed)
        }
    }
}

impl Transport for DemoGrbl {
    fn open(&mut self) -> std::result::Result<(), ProtocolError> {
        if !self.open {
            self.open = true;
            self.boot();
        }
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.outbox.clear();
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn bytes_to_read(&mut self) -> std::result::Result<usize, ProtocolError> {
        self.ensure_open()?;
        if self.held {
            return Ok(0);
        }
        Ok(self.outbox.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> std::result::Result<usize, ProtocolError> {
        self.ensure_open()?;
        if self.held {
            return Ok(0);
        }
        let n = buf.len().min(self.outbox.len());
        for (slot, byte) in buf.iter_mut().zip(self.outbox.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> std::result::Result<(), ProtocolError> {
        self.ensure_open()?;
        for received in self.framer.push_all(data) {
            match received {
                Received::Realtime(_) => self.status_report(),
                Received::Line(line) if line.is_empty() => {}
                Received::Line(line) => self.process_line(&line),
            }
        }
        Ok(())
    }

    /// A rising edge after a low DTR reboots the board
    fn set_dtr(&mut self, level: bool) -> std::result::Result<(), ProtocolError> {
        self.ensure_open()?;
        if !self.dtr && level {
            self.outbox.clear();
            self.boot();
        }
        self.dtr = level;
        Ok(())
    }

    fn reset(&mut self) -> std::result::Result<(), ProtocolError> {
        self.set_dtr(false)?;
        self.set_dtr(true)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A demo device with homing enabled, so it boots locked in alarm
pub fn homing_enabled() -> std::result::Result<DemoGrbl, GrblError> {
    DemoGrbl::new().with_setting(HOMING_CYCLE_ENABLE, true)
}
