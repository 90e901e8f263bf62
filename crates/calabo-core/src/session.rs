//! Session facade
//!
//! A shareable handle around one [`Controller`]. All access goes through a
//! single lock, so at most one command is ever in flight on the wire.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::config::ControllerConfig;
use crate::controller::Controller;
use crate::error::Result;
use crate::protocol::Transport;
use crate::settings::{self, SettingKey, SettingValue};

/// Thread-safe session over one device
pub struct Session<T: Transport> {
    controller: Mutex<Controller<T>>,
}

impl<T: Transport> Session<T> {
    /// Open `transport` and initialize the device
    pub fn open(transport: T, config: ControllerConfig) -> Result<Self> {
        let mut controller = Controller::new(transport, config);
        controller.open()?;
        Ok(Self::from_controller(controller))
    }

    /// Wrap a controller that is already initialized
    pub fn from_controller(controller: Controller<T>) -> Self {
        Self {
            controller: Mutex::new(controller),
        }
    }

    /// All settings, keyed by name or by decimal index.
    ///
    /// With `refresh_from_device` the settings are read again (`$$`) first;
    /// otherwise the cache from the last read is returned.
    pub fn get_all_settings(
        &self,
        by_name: bool,
        refresh_from_device: bool,
    ) -> Result<BTreeMap<String, SettingValue>> {
        let mut controller = self.controller.lock();
        if refresh_from_device {
            controller.read_settings()?;
        }

        let all = controller
            .settings()
            .iter()
            .filter_map(|(&index, &value)| {
                let setting = settings::by_index(index)?;
                let key = if by_name {
                    setting.name.to_string()
                } else {
                    index.to_string()
                };
                Some((key, value))
            })
            .collect();
        Ok(all)
    }

    /// Write several settings in key order, stopping at the first failure.
    ///
    /// Keys may be names or decimal indices. Settings written before the
    /// failure stay written.
    pub fn set_settings(&self, values: &BTreeMap<String, SettingValue>) -> Result<()> {
        let mut controller = self.controller.lock();
        for (key, value) in values {
            tracing::debug!("setting {} = {}", key, value);
            controller.set_setting(key, *value)?;
        }
        Ok(())
    }

    /// Cached value of one setting
    pub fn setting(&self, key: impl Into<SettingKey>) -> Result<SettingValue> {
        self.controller.lock().setting(key)
    }

    /// Run `f` with exclusive access to the controller
    pub fn with_controller<R>(&self, f: impl FnOnce(&mut Controller<T>) -> R) -> R {
        f(&mut self.controller.lock())
    }

    /// Close the transport and give it back
    pub fn close(self) -> T {
        let mut controller = self.controller.into_inner();
        controller.close();
        controller.into_transport()
    }
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.controller.try_lock() {
            Some(controller) => f.debug_tuple("Session").field(&*controller).finish(),
            None => f.write_str("Session(<busy>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::DemoGrbl;
    use crate::error::GrblError;

    fn quick_config() -> ControllerConfig {
        ControllerConfig {
            read_timeout_ms: 200,
            boot_settle_ms: 5,
            guard_poll_interval_ms: 1,
            ..ControllerConfig::default()
        }
    }

    #[test]
    fn test_settings_by_index_and_name() {
        let session = Session::open(DemoGrbl::new(), quick_config()).unwrap();

        let by_index = session.get_all_settings(false, false).unwrap();
        assert_eq!(by_index.len(), settings::count());
        assert_eq!(by_index["22"], SettingValue::Boolean(false));

        let by_name = session.get_all_settings(true, false).unwrap();
        assert_eq!(by_name["homing-cycle-enable"], SettingValue::Boolean(false));
        assert!(!by_name.contains_key("22"));
    }

    #[test]
    fn test_set_settings_stops_at_first_failure() {
        let session = Session::open(DemoGrbl::new(), quick_config()).unwrap();

        let mut values = BTreeMap::new();
        values.insert("junction-deviation".to_string(), SettingValue::Float(0.02));
        values.insert("soft-limits-enable".to_string(), SettingValue::Boolean(true));
        let err = session.set_settings(&values).unwrap_err();
        assert!(matches!(err, GrblError::Device(_)));

        assert_eq!(
            session.setting("junction-deviation").unwrap(),
            SettingValue::Float(0.02)
        );
        assert_eq!(
            session.setting("soft-limits-enable").unwrap(),
            SettingValue::Boolean(false)
        );
    }

    #[test]
    fn test_with_controller() {
        let session = Session::open(DemoGrbl::new(), quick_config()).unwrap();
        let version = session.with_controller(|c| c.firmware_version().map(str::to_string));
        assert_eq!(version.as_deref(), Some("1.1f"));
    }
}
