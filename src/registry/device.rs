use chrono::{DateTime, Utc};

use crate::alerts::AlarmState;

/// A registered sensor device.
///
/// `alarm_state` and `last_value` are derived exclusively from the most
/// recent accepted reading; only [`DeviceRegistry::apply_reading`] mutates
/// them, under the per-device lock.
///
/// [`DeviceRegistry::apply_reading`]: super::DeviceRegistry::apply_reading
#[derive(Debug, Clone)]
pub struct Device {
    /// Opaque unique identity.
    pub id: String,
    /// Opaque secret presented by the device on every ingest.
    pub api_key: String,
    /// Optional display name, used in notification text.
    pub name: Option<String>,
    /// Per-device threshold override; falls back to the process default.
    pub alert_threshold: Option<f64>,
    /// External notification channel (e.g. a Telegram chat id).
    pub channel_id: Option<String>,
    pub alarm_state: AlarmState,
    pub last_value: f64,
    pub created_at: DateTime<Utc>,
}

impl Device {
    pub fn new(id: impl Into<String>, api_key: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            api_key: api_key.into(),
            name,
            alert_threshold: None,
            channel_id: None,
            alarm_state: AlarmState::Normal,
            last_value: 0.0,
            created_at: Utc::now(),
        }
    }

    /// Name used in notifications; falls back to the device id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Device override if set, else the process-wide default.
    pub fn effective_threshold(&self, default: f64) -> f64 {
        self.alert_threshold.unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_device_defaults() {
        let device = Device::new("dev-1", "secret", None);
        assert_eq!(device.alarm_state, AlarmState::Normal);
        assert_eq!(device.last_value, 0.0);
        assert!(device.channel_id.is_none());
        assert_eq!(device.display_name(), "dev-1");
    }

    #[test]
    fn test_effective_threshold_fallback() {
        let mut device = Device::new("dev-1", "secret", Some("Garage".to_string()));
        assert_eq!(device.effective_threshold(400.0), 400.0);

        device.alert_threshold = Some(250.0);
        assert_eq!(device.effective_threshold(400.0), 250.0);
        assert_eq!(device.display_name(), "Garage");
    }
}
