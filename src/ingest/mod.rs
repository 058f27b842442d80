//! Ingestion pipeline: authenticate, persist, evaluate, fan out, notify
//!
//! One call per inbound reading. Readings for different devices proceed in
//! parallel; readings for the same device serialize on the registry's
//! per-device lock, inside which the fan-out and notification are also
//! initiated so rapid transitions are never reordered downstream.

use std::sync::Arc;

use crate::alerts::{Notifier, Transition};
use crate::hub::{FanoutHub, ReadingEvent};
use crate::registry::{Device, DeviceRegistry};
use crate::store::{Reading, ReadingsStore, StoreError};

/// Ingestion failures surfaced to the caller. Notification and
/// per-subscriber broadcast failures are absorbed downstream and never
/// appear here.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Invalid value: {0}")]
    InvalidInput(String),
    /// Unknown device and wrong api key are deliberately indistinguishable.
    #[error("Unknown device or invalid api key")]
    Unauthorized,
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Result of an accepted reading.
#[derive(Debug, Clone)]
pub struct Accepted {
    pub transition: Transition,
    pub device: Device,
    pub reading: Reading,
}

/// Orchestrates the per-reading flow across registry, store, hub and
/// notifier. Cheap to share; all collaborators are injected.
pub struct Pipeline {
    registry: Arc<DeviceRegistry>,
    store: Arc<dyn ReadingsStore>,
    hub: Arc<FanoutHub>,
    notifier: Arc<Notifier>,
}

impl Pipeline {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        store: Arc<dyn ReadingsStore>,
        hub: Arc<FanoutHub>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            registry,
            store,
            hub,
            notifier,
        }
    }

    /// Process one inbound reading.
    ///
    /// On success the reading has been durably appended and the device's
    /// alarm state updated; fan-out and notification have been initiated
    /// but may still be in flight.
    pub fn ingest(&self, device_id: &str, api_key: &str, value: f64) -> Result<Accepted, IngestError> {
        if !value.is_finite() {
            return Err(IngestError::InvalidInput(format!(
                "value must be a finite number, got {}",
                value
            )));
        }

        if !self.registry.authenticate(device_id, api_key) {
            return Err(IngestError::Unauthorized);
        }

        // Persist before touching alarm state: a reading that was not
        // durably recorded must not change the live view.
        let reading = Reading::now(device_id, value);
        self.store.append(&reading)?;

        let accepted = self
            .registry
            .apply_reading(device_id, value, |transition, device| {
                // Inside the per-device critical section: both calls are
                // non-blocking enqueues, preserving decision order.
                self.hub.broadcast(
                    device_id,
                    ReadingEvent {
                        device_id: device_id.to_string(),
                        value,
                        timestamp: reading.timestamp,
                    },
                );
                if transition.is_edge() {
                    self.notifier
                        .dispatch(device.clone(), transition, reading.clone());
                }
                Accepted {
                    transition,
                    device: device.clone(),
                    reading: reading.clone(),
                }
            })
            // Devices are never deleted, but the registry stays authoritative.
            .ok_or(IngestError::Unauthorized)?;

        tracing::debug!(
            device_id = %device_id,
            value,
            transition = ?accepted.transition,
            "Reading accepted"
        );
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlarmState;
    use crate::store::MemoryStore;
    use tokio::sync::mpsc;

    struct FailingStore;

    impl ReadingsStore for FailingStore {
        fn append(&self, _reading: &Reading) -> Result<(), StoreError> {
            Err(StoreError::Append("disk full".to_string()))
        }

        fn recent(&self, _device_id: &str, _limit: usize) -> Vec<Reading> {
            Vec::new()
        }
    }

    fn pipeline_with_store(store: Arc<dyn ReadingsStore>) -> (Pipeline, Arc<DeviceRegistry>, Arc<FanoutHub>, Arc<Notifier>) {
        let registry = Arc::new(DeviceRegistry::new(400.0));
        let hub = Arc::new(FanoutHub::new());
        let notifier = Arc::new(Notifier::disabled());
        let pipeline = Pipeline::new(
            Arc::clone(&registry),
            store,
            Arc::clone(&hub),
            Arc::clone(&notifier),
        );
        (pipeline, registry, hub, notifier)
    }

    fn pipeline() -> (Pipeline, Arc<DeviceRegistry>, Arc<FanoutHub>, Arc<Notifier>) {
        pipeline_with_store(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_rejects_non_finite_values() {
        let (pipeline, registry, _, _) = pipeline();
        let device = registry.register(None);

        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let result = pipeline.ingest(&device.id, &device.api_key, bad);
            assert!(matches!(result, Err(IngestError::InvalidInput(_))));
        }
        // No state change.
        assert_eq!(registry.lookup(&device.id).unwrap().last_value, 0.0);
    }

    #[tokio::test]
    async fn test_rejects_unknown_device_and_bad_key() {
        let (pipeline, registry, _, _) = pipeline();
        let device = registry.register(None);

        assert!(matches!(
            pipeline.ingest("ghost", "whatever", 10.0),
            Err(IngestError::Unauthorized)
        ));
        assert!(matches!(
            pipeline.ingest(&device.id, "wrong", 10.0),
            Err(IngestError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_storage_error_leaves_state_untouched() {
        let (pipeline, registry, hub, notifier) = pipeline_with_store(Arc::new(FailingStore));
        let device = registry.register(None);
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.join("c1", &device.id, tx);

        let result = pipeline.ingest(&device.id, &device.api_key, 500.0);
        assert!(matches!(result, Err(IngestError::Storage(_))));

        let after = registry.lookup(&device.id).unwrap();
        assert_eq!(after.alarm_state, AlarmState::Normal);
        assert_eq!(after.last_value, 0.0);
        assert!(rx.try_recv().is_err());
        assert_eq!(notifier.stats().dispatched, 0);
    }

    #[tokio::test]
    async fn test_accept_persists_broadcasts_and_notifies() {
        let (pipeline, registry, hub, notifier) = pipeline();
        let device = registry.register(None);
        registry
            .link_channel(&device.id, &device.api_key, "chat-1")
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.join("c1", &device.id, tx);

        let accepted = pipeline.ingest(&device.id, &device.api_key, 500.0).unwrap();
        assert_eq!(accepted.transition, Transition::Triggered);
        assert_eq!(accepted.device.alarm_state, AlarmState::Active);
        assert_eq!(accepted.device.last_value, 500.0);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.device_id, device.id);
        assert_eq!(event.value, 500.0);
        assert_eq!(notifier.stats().dispatched, 1);
    }

    #[tokio::test]
    async fn test_steady_state_broadcasts_without_notifying() {
        let (pipeline, registry, hub, notifier) = pipeline();
        let device = registry.register(None);
        registry
            .link_channel(&device.id, &device.api_key, "chat-1")
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.join("c1", &device.id, tx);

        pipeline.ingest(&device.id, &device.api_key, 450.0).unwrap();
        let accepted = pipeline.ingest(&device.id, &device.api_key, 460.0).unwrap();
        assert_eq!(accepted.transition, Transition::None);

        // Both readings broadcast, one notification.
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
        assert_eq!(notifier.stats().dispatched, 1);
    }

    #[tokio::test]
    async fn test_trigger_then_resolve_notifies_twice() {
        let (pipeline, registry, _, notifier) = pipeline();
        let device = registry.register(None);
        registry
            .link_channel(&device.id, &device.api_key, "chat-1")
            .unwrap();

        let a = pipeline.ingest(&device.id, &device.api_key, 500.0).unwrap();
        let b = pipeline.ingest(&device.id, &device.api_key, 100.0).unwrap();
        assert_eq!(a.transition, Transition::Triggered);
        assert_eq!(b.transition, Transition::Resolved);
        assert_eq!(notifier.stats().dispatched, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_over_threshold_triggers_once() {
        let (pipeline, registry, _, notifier) = pipeline();
        let pipeline = Arc::new(pipeline);
        let device = registry.register(None);
        registry
            .link_channel(&device.id, &device.api_key, "chat-1")
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let pipeline = Arc::clone(&pipeline);
                let id = device.id.clone();
                let key = device.api_key.clone();
                tokio::spawn(async move { pipeline.ingest(&id, &key, 500.0).unwrap().transition })
            })
            .collect();

        let mut triggered = 0;
        for handle in handles {
            if handle.await.unwrap() == Transition::Triggered {
                triggered += 1;
            }
        }
        assert_eq!(triggered, 1);
        assert_eq!(notifier.stats().dispatched, 1);
    }

    #[tokio::test]
    async fn test_readings_queryable_after_ingest() {
        let store = Arc::new(MemoryStore::new());
        let (pipeline, registry, _, _) = pipeline_with_store(store.clone() as Arc<dyn ReadingsStore>);
        let device = registry.register(None);

        pipeline.ingest(&device.id, &device.api_key, 1.0).unwrap();
        pipeline.ingest(&device.id, &device.api_key, 2.0).unwrap();

        let recent = store.recent(&device.id, 10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].value, 2.0);
    }
}
