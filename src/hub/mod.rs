//! Live fan-out hub: per-device subscriber groups
//!
//! Subscribers (WebSocket connections) join one or more device groups and
//! receive every accepted reading for those devices. Delivery is a
//! non-blocking enqueue onto each subscriber's channel, so a slow or dead
//! subscriber never stalls ingestion.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;

/// Event pushed to live subscribers for every accepted reading.
#[derive(Debug, Clone, Serialize)]
pub struct ReadingEvent {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Outbound channel half for one subscriber connection.
pub type EventSender = mpsc::UnboundedSender<ReadingEvent>;

/// Subscriber groups keyed by device id.
///
/// Membership changes take effect for subsequent broadcasts only. A group
/// holds at most one sender per connection, so no connection is delivered
/// to twice for one broadcast.
pub struct FanoutHub {
    /// device id -> (connection id -> sender)
    groups: DashMap<String, HashMap<String, EventSender>>,
    /// connection id -> device ids it has joined
    memberships: DashMap<String, HashSet<String>>,
    next_conn: AtomicU64,
}

impl FanoutHub {
    pub fn new() -> Self {
        Self {
            groups: DashMap::new(),
            memberships: DashMap::new(),
            next_conn: AtomicU64::new(1),
        }
    }

    /// Allocate an id for a new connection.
    pub fn next_conn_id(&self) -> String {
        format!("conn-{}", self.next_conn.fetch_add(1, Ordering::Relaxed))
    }

    /// Add a connection to a device's group. Joining a second group does
    /// not leave the first; re-joining the same group replaces the sender.
    pub fn join(&self, conn_id: &str, device_id: &str, sender: EventSender) {
        self.memberships
            .entry(conn_id.to_string())
            .or_default()
            .insert(device_id.to_string());
        self.groups
            .entry(device_id.to_string())
            .or_default()
            .insert(conn_id.to_string(), sender);
        tracing::debug!(conn_id = %conn_id, device_id = %device_id, "Subscriber joined");
    }

    /// Remove a connection from one device's group.
    pub fn leave(&self, conn_id: &str, device_id: &str) {
        if let Some(mut members) = self.memberships.get_mut(conn_id) {
            members.remove(device_id);
        }
        if let Some(mut group) = self.groups.get_mut(device_id) {
            group.remove(conn_id);
        }
        self.groups.remove_if(device_id, |_, group| group.is_empty());
        tracing::debug!(conn_id = %conn_id, device_id = %device_id, "Subscriber left");
    }

    /// Remove a connection from every group it belongs to.
    pub fn on_disconnect(&self, conn_id: &str) {
        let Some((_, device_ids)) = self.memberships.remove(conn_id) else {
            return;
        };
        for device_id in device_ids {
            if let Some(mut group) = self.groups.get_mut(&device_id) {
                group.remove(conn_id);
            }
            self.groups.remove_if(&device_id, |_, group| group.is_empty());
        }
        tracing::debug!(conn_id = %conn_id, "Subscriber disconnected");
    }

    /// Deliver an event to every current member of the device's group.
    ///
    /// Per-subscriber failure (closed channel) is logged and isolated;
    /// nothing is ever surfaced to the caller.
    pub fn broadcast(&self, device_id: &str, event: ReadingEvent) {
        let Some(group) = self.groups.get(device_id) else {
            return;
        };
        for (conn_id, sender) in group.iter() {
            if sender.send(event.clone()).is_err() {
                tracing::debug!(
                    conn_id = %conn_id,
                    device_id = %device_id,
                    "Dropping event for closed subscriber"
                );
            }
        }
    }

    /// Connections currently holding at least one membership.
    pub fn connection_count(&self) -> usize {
        self.memberships.len()
    }

    pub fn subscriber_count(&self, device_id: &str) -> usize {
        self.groups.get(device_id).map(|g| g.len()).unwrap_or(0)
    }
}

impl Default for FanoutHub {
    fn default() -> Self {
        Self::new()
    }
}
