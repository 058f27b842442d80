//! Threshold alarms: edge-triggered evaluation and notification dispatch
//!
//! The evaluator decides, per accepted reading, whether a device's alarm
//! state flips; the notifier pushes a best-effort message to the external
//! channel for each flip.

pub mod evaluator;
pub mod notifier;

pub use evaluator::{evaluate, AlarmState, Transition};
pub use notifier::{Notifier, NotifierError, NotifierStats, NotifyTarget};
