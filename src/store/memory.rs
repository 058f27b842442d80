use std::collections::VecDeque;

use dashmap::DashMap;

use super::{Reading, ReadingsStore, StoreError, MAX_QUERY_LIMIT};

/// Readings retained per device before the oldest are dropped.
const RETAIN_PER_DEVICE: usize = 10_000;

/// In-memory readings log, one bounded deque per device.
#[derive(Default)]
pub struct MemoryStore {
    readings: DashMap<String, VecDeque<Reading>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total readings currently held across all devices.
    pub fn len(&self) -> usize {
        self.readings.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReadingsStore for MemoryStore {
    fn append(&self, reading: &Reading) -> Result<(), StoreError> {
        let mut log = self.readings.entry(reading.device_id.clone()).or_default();
        if log.len() >= RETAIN_PER_DEVICE {
            log.pop_front();
        }
        log.push_back(reading.clone());
        Ok(())
    }

    fn recent(&self, device_id: &str, limit: usize) -> Vec<Reading> {
        let limit = limit.min(MAX_QUERY_LIMIT);
        match self.readings.get(device_id) {
            Some(log) => log.iter().rev().take(limit).cloned().collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_recent_order() {
        let store = MemoryStore::new();
        for v in [1.0, 2.0, 3.0] {
            store.append(&Reading::now("dev-1", v)).unwrap();
        }

        let recent = store.recent("dev-1", 10);
        assert_eq!(recent.len(), 3);
        // Newest first.
        assert_eq!(recent[0].value, 3.0);
        assert_eq!(recent[2].value, 1.0);
    }

    #[test]
    fn test_recent_respects_limit_and_cap() {
        let store = MemoryStore::new();
        for v in 0..10 {
            store.append(&Reading::now("dev-1", v as f64)).unwrap();
        }

        assert_eq!(store.recent("dev-1", 4).len(), 4);
        assert_eq!(store.recent("dev-1", 1000).len(), 10);
    }

    #[test]
    fn test_devices_are_isolated() {
        let store = MemoryStore::new();
        store.append(&Reading::now("dev-a", 1.0)).unwrap();
        store.append(&Reading::now("dev-b", 2.0)).unwrap();

        let a = store.recent("dev-a", 10);
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].device_id, "dev-a");
        assert!(store.recent("dev-c", 10).is_empty());
    }
}
