//! Device registry: identity, credentials and per-device alarm state
//!
//! Each device record sits behind its own mutex so readings for one device
//! serialize while unrelated devices proceed in parallel. The registry is
//! the only place alarm state is written.

mod device;

pub use device::Device;

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::alerts::{evaluate, Transition};

/// Registry errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Device not found")]
    NotFound,
    #[error("Invalid api key")]
    Unauthorized,
}

/// All registered devices, keyed by device id.
pub struct DeviceRegistry {
    devices: DashMap<String, Arc<Mutex<Device>>>,
    default_threshold: f64,
}

impl DeviceRegistry {
    pub fn new(default_threshold: f64) -> Self {
        Self {
            devices: DashMap::new(),
            default_threshold,
        }
    }

    /// Create a device with freshly generated credentials.
    pub fn register(&self, name: Option<String>) -> Device {
        loop {
            let id = random_token(12);
            if self.devices.contains_key(&id) {
                continue;
            }
            let device = Device::new(id.clone(), random_token(32), name.clone());
            self.devices
                .insert(id.clone(), Arc::new(Mutex::new(device.clone())));
            tracing::info!(device_id = %id, "Device registered");
            return device;
        }
    }

    /// Insert a pre-built device record (tests and seeding).
    pub fn insert(&self, device: Device) {
        self.devices
            .insert(device.id.clone(), Arc::new(Mutex::new(device)));
    }

    /// Snapshot of a device record.
    pub fn lookup(&self, id: &str) -> Option<Device> {
        self.devices.get(id).map(|cell| cell.lock().clone())
    }

    /// Check a presented api key. Unknown device and wrong key both fail;
    /// the distinction exists only in logs so callers can't probe for
    /// device existence.
    pub fn authenticate(&self, id: &str, api_key: &str) -> bool {
        match self.devices.get(id) {
            Some(cell) => {
                let ok = cell.lock().api_key == api_key;
                if !ok {
                    tracing::debug!(device_id = %id, "Authentication failed: key mismatch");
                }
                ok
            }
            None => {
                tracing::debug!(device_id = %id, "Authentication failed: unknown device");
                false
            }
        }
    }

    /// Persist an external notification channel on the device, authorized
    /// by api-key match.
    pub fn link_channel(
        &self,
        id: &str,
        api_key: &str,
        channel_id: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let cell = self.devices.get(id).ok_or(RegistryError::NotFound)?;
        let mut device = cell.lock();
        if device.api_key != api_key {
            return Err(RegistryError::Unauthorized);
        }
        device.channel_id = Some(channel_id.into());
        tracing::info!(device_id = %id, "Notification channel linked");
        Ok(())
    }

    /// Set or clear the per-device threshold override.
    pub fn set_threshold(
        &self,
        id: &str,
        api_key: &str,
        threshold: Option<f64>,
    ) -> Result<(), RegistryError> {
        let cell = self.devices.get(id).ok_or(RegistryError::NotFound)?;
        let mut device = cell.lock();
        if device.api_key != api_key {
            return Err(RegistryError::Unauthorized);
        }
        device.alert_threshold = threshold;
        Ok(())
    }

    /// Apply an accepted reading to the device record: resolve the
    /// effective threshold, evaluate the alarm edge, and update
    /// `last_value` and `alarm_state` in one atomic step.
    ///
    /// `after` runs inside the per-device critical section with the updated
    /// record, so concurrent readings for one device both decide and
    /// initiate their fan-out in a strict sequence. It must not block.
    pub fn apply_reading<R>(
        &self,
        id: &str,
        value: f64,
        after: impl FnOnce(Transition, &Device) -> R,
    ) -> Option<R> {
        let cell = Arc::clone(self.devices.get(id)?.value());
        let mut device = cell.lock();

        let threshold = device.effective_threshold(self.default_threshold);
        let (state, transition) = evaluate(device.alarm_state, value, threshold);
        device.alarm_state = state;
        device.last_value = value;

        Some(after(transition, &device))
    }

    pub fn default_threshold(&self) -> f64 {
        self.default_threshold
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
