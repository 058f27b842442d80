//! Plume: Real-Time Gas-Sensor Telemetry Hub
//!
//! Ingests periodic numeric readings from distributed sensor devices,
//! maintains per-device alarm state against a configurable threshold, fans
//! every accepted reading out to live WebSocket subscribers, and pushes one
//! best-effort notification per alarm transition to an external channel.
//!
//! # Features
//!
//! - **Edge-Triggered Alarms**: one notification per normal/active flip,
//!   never one per qualifying reading
//! - **Per-Device Serialization**: concurrent readings for one device are
//!   applied as a strict sequence; unrelated devices run in parallel
//! - **Live Fan-out**: per-device subscriber groups with non-blocking,
//!   isolated delivery
//! - **Threshold Overrides**: per-device threshold with a process default
//! - **Best-Effort Notification**: bounded timeout, absorbed failures, no
//!   retries
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use plume::alerts::Notifier;
//! use plume::hub::FanoutHub;
//! use plume::ingest::Pipeline;
//! use plume::registry::DeviceRegistry;
//! use plume::store::{MemoryStore, ReadingsStore};
//!
//! let registry = Arc::new(DeviceRegistry::new(400.0));
//! let store: Arc<dyn ReadingsStore> = Arc::new(MemoryStore::new());
//! let hub = Arc::new(FanoutHub::new());
//! let notifier = Arc::new(Notifier::disabled());
//!
//! let pipeline = Pipeline::new(registry.clone(), store, hub, notifier);
//!
//! let device = registry.register(Some("Kitchen".to_string()));
//! let accepted = pipeline.ingest(&device.id, &device.api_key, 500.0).unwrap();
//! println!("Transition: {:?}", accepted.transition);
//! ```

pub mod alerts;
pub mod api;
pub mod hub;
pub mod ingest;
pub mod registry;
pub mod store;

// Re-export commonly used types
pub use alerts::{evaluate, AlarmState, Notifier, NotifyTarget, Transition};
pub use hub::{FanoutHub, ReadingEvent};
pub use ingest::{Accepted, IngestError, Pipeline};
pub use registry::{Device, DeviceRegistry, RegistryError};
pub use store::{MemoryStore, Reading, ReadingsStore, StoreError};
