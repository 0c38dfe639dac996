// ── Device registry ──
//
// Named collection of device handles in registration order. The
// registry owns the handles; callers get `Arc` clones.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::config::DeviceConfig;
use crate::device::DeviceHandle;
use crate::driver::PowerDriver;
use crate::error::CoreError;
use crate::model::{ConnectionStatus, DeviceSummary};

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: IndexMap<String, Arc<DeviceHandle>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device. Fails with `DuplicateName` if the name is taken, in
    /// which case the registry is left unchanged.
    pub fn register(
        &mut self,
        config: DeviceConfig,
        driver: Box<dyn PowerDriver>,
    ) -> Result<Arc<DeviceHandle>, CoreError> {
        if self.devices.contains_key(&config.name) {
            return Err(CoreError::DuplicateName { name: config.name });
        }
        let name = config.name.clone();
        let handle = Arc::new(DeviceHandle::new(config, driver));
        self.devices.insert(name, Arc::clone(&handle));
        Ok(handle)
    }

    /// Remove a device that holds no connection.
    pub fn remove(&mut self, name: &str) -> Result<Arc<DeviceHandle>, CoreError> {
        let handle = self.lookup(name)?;
        match handle.status() {
            ConnectionStatus::Disconnected | ConnectionStatus::Failed => {}
            status => {
                return Err(CoreError::DeviceInUse {
                    name: name.to_owned(),
                    status,
                });
            }
        }
        self.devices
            .shift_remove(name)
            .ok_or_else(|| CoreError::NotFound {
                name: name.to_owned(),
            })
    }

    pub fn get(&self, name: &str) -> Option<Arc<DeviceHandle>> {
        self.devices.get(name).cloned()
    }

    /// Like [`get`](Self::get), but a missing name is an error.
    pub fn lookup(&self, name: &str) -> Result<Arc<DeviceHandle>, CoreError> {
        self.get(name).ok_or_else(|| CoreError::NotFound {
            name: name.to_owned(),
        })
    }

    /// Every handle, in registration order.
    pub fn handles(&self) -> Vec<Arc<DeviceHandle>> {
        self.devices.values().cloned().collect()
    }

    pub fn list(&self) -> Vec<DeviceSummary> {
        self.devices
            .values()
            .map(|h| DeviceSummary {
                name: h.name().to_owned(),
                host: h.config().host.clone(),
                port: h.config().port,
                status: h.status(),
            })
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::driver::mock::MockDriver;

    fn registry(names: &[&str]) -> DeviceRegistry {
        let mut reg = DeviceRegistry::new();
        for name in names {
            reg.register(DeviceConfig::new(*name, "10.0.0.1"), MockDriver::new(8).boxed())
                .unwrap();
        }
        reg
    }

    #[test]
    fn list_preserves_registration_order() {
        let reg = registry(&["zeta", "alpha", "mid"]);
        let names: Vec<&str> = reg.names().collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert!(
            reg.list()
                .iter()
                .all(|d| d.status == ConnectionStatus::Disconnected)
        );
    }

    #[test]
    fn duplicate_name_is_rejected_and_registry_unchanged() {
        let mut reg = registry(&["nps1"]);
        let err = reg
            .register(DeviceConfig::new("nps1", "10.0.0.2"), MockDriver::new(8).boxed())
            .unwrap_err();

        assert!(matches!(err, CoreError::DuplicateName { ref name } if name == "nps1"));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("nps1").unwrap().config().host, "10.0.0.1");
    }

    #[test]
    fn remove_unknown_is_not_found() {
        let mut reg = registry(&[]);
        assert!(matches!(reg.remove("ghost"), Err(CoreError::NotFound { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn remove_connected_device_is_refused() {
        let mut reg = registry(&["nps1", "nps2"]);
        let handle = reg.get("nps1").unwrap();
        handle.connect(Duration::from_secs(1)).await.unwrap();

        let err = reg.remove("nps1").unwrap_err();
        assert!(matches!(
            err,
            CoreError::DeviceInUse {
                status: ConnectionStatus::Connected,
                ..
            }
        ));
        assert_eq!(reg.len(), 2);
        assert_eq!(handle.status(), ConnectionStatus::Connected);

        handle.disconnect(Duration::from_secs(1)).await;
        reg.remove("nps1").unwrap();
        let names: Vec<&str> = reg.names().collect();
        assert_eq!(names, vec!["nps2"]);
    }
}
