//! Readings store: durable append of accepted readings
//!
//! The store is an external collaborator behind a trait; the in-memory
//! implementation backs the server and tests. Readings are immutable and
//! append-only; ordering is by acceptance time, never a client clock.

mod memory;

pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of readings a query may return.
pub const MAX_QUERY_LIMIT: usize = 200;

/// A single accepted reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// Reading stamped with the current acceptance time.
    pub fn now(device_id: impl Into<String>, value: f64) -> Self {
        Self {
            device_id: device_id.into(),
            value,
            timestamp: Utc::now(),
        }
    }
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Append failed: {0}")]
    Append(String),
}

/// Append-only log of accepted readings.
pub trait ReadingsStore: Send + Sync {
    /// Durably record one accepted reading.
    fn append(&self, reading: &Reading) -> Result<(), StoreError>;

    /// Most recent readings for a device, newest first. `limit` is clamped
    /// to [`MAX_QUERY_LIMIT`].
    fn recent(&self, device_id: &str, limit: usize) -> Vec<Reading>;
}
