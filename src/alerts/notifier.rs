//! Best-effort notification dispatch for alarm transitions

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::evaluator::Transition;
use crate::registry::Device;
use crate::store::Reading;

/// Where transition notifications are delivered.
#[derive(Debug, Clone)]
pub enum NotifyTarget {
    /// Log via tracing only (no external gateway configured).
    Log,
    /// Telegram bot API; the device's linked channel id is the chat id.
    Telegram { bot_token: String, api_base: String },
}

/// Dispatches one best-effort message per alarm transition.
///
/// Sends are fire-and-forget: failures are counted and logged, never
/// retried and never surfaced to the ingestion path. The transition has
/// already been applied to device state by the time a send runs, so a lost
/// message stays lost until the state genuinely flips again.
pub struct Notifier {
    client: reqwest::Client,
    target: NotifyTarget,
    dispatched: AtomicU64,
    failed: Arc<AtomicU64>,
}

/// Send counters for the stats endpoint.
#[derive(Debug, Clone, Copy)]
pub struct NotifierStats {
    pub dispatched: u64,
    pub failed: u64,
}

impl Notifier {
    pub fn new(target: NotifyTarget) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("Failed to create HTTP client"),
            target,
            dispatched: AtomicU64::new(0),
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Notifier that only logs, for servers without a configured gateway.
    pub fn disabled() -> Self {
        Self::new(NotifyTarget::Log)
    }

    /// Dispatch a notification for an alarm transition.
    ///
    /// Silently no-ops when the device has no linked channel. Only called
    /// for edge transitions; the pipeline enforces this.
    pub fn dispatch(&self, device: Device, transition: Transition, reading: Reading) {
        let Some(chat_id) = device.channel_id.clone() else {
            tracing::debug!(device_id = %device.id, "No channel linked, skipping notification");
            return;
        };

        let text = message_text(&device, transition, &reading);
        self.dispatched.fetch_add(1, Ordering::Relaxed);

        match &self.target {
            NotifyTarget::Log => {
                tracing::info!(
                    device_id = %device.id,
                    transition = ?transition,
                    value = reading.value,
                    "Notification (log target): {}",
                    text
                );
            }
            NotifyTarget::Telegram { bot_token, api_base } => {
                let url = format!("{}/bot{}/sendMessage", api_base, bot_token);
                let client = self.client.clone();
                let failed = Arc::clone(&self.failed);
                let device_id = device.id.clone();
                tokio::spawn(async move {
                    if let Err(e) = send_telegram(&client, &url, &chat_id, &text).await {
                        failed.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(
                            device_id = %device_id,
                            error = %e,
                            "Failed to send notification"
                        );
                    }
                });
            }
        }
    }

    pub fn stats(&self) -> NotifierStats {
        NotifierStats {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

async fn send_telegram(
    client: &reqwest::Client,
    url: &str,
    chat_id: &str,
    text: &str,
) -> Result<(), NotifierError> {
    let payload = serde_json::json!({
        "chat_id": chat_id,
        "text": text,
        "parse_mode": "Markdown",
    });

    let response = client
        .post(url)
        .json(&payload)
        .send()
        .await
        .map_err(|e| NotifierError::Send(e.to_string()))?;

    if !response.status().is_success() {
        return Err(NotifierError::Send(format!(
            "gateway returned status {}",
            response.status()
        )));
    }

    tracing::debug!(chat_id = %chat_id, "Notification sent");
    Ok(())
}

fn message_text(device: &Device, transition: Transition, reading: &Reading) -> String {
    let name = device.display_name();
    match transition {
        Transition::Triggered => format!(
            "🚨 *Gas Alert*\nDevice: {}\nValue: {}\nTime: {}",
            name,
            reading.value,
            reading.timestamp.to_rfc3339()
        ),
        Transition::Resolved => format!(
            "✅ *Gas Normal*\nDevice: {}\nValue: {}\nTime: {}",
            name,
            reading.value,
            reading.timestamp.to_rfc3339()
        ),
        Transition::None => String::new(),
    }
}

/// Notifier errors; absorbed internally, never propagated to callers.
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Send error: {0}")]
    Send(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlarmState;

    fn device_with_channel(channel: Option<&str>) -> Device {
        Device {
            id: "dev-1".to_string(),
            api_key: "key".to_string(),
            name: Some("Kitchen".to_string()),
            alert_threshold: None,
            channel_id: channel.map(String::from),
            alarm_state: AlarmState::Active,
            last_value: 500.0,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_dispatch_without_channel_is_noop() {
        let notifier = Arc::new(Notifier::disabled());
        let reading = Reading::now("dev-1", 500.0);

        notifier.dispatch(device_with_channel(None), Transition::Triggered, reading);

        assert_eq!(notifier.stats().dispatched, 0);
        assert_eq!(notifier.stats().failed, 0);
    }

    #[tokio::test]
    async fn test_dispatch_log_target_counts() {
        let notifier = Arc::new(Notifier::disabled());
        let reading = Reading::now("dev-1", 500.0);

        notifier.dispatch(
            device_with_channel(Some("chat-42")),
            Transition::Triggered,
            reading,
        );

        assert_eq!(notifier.stats().dispatched, 1);
        assert_eq!(notifier.stats().failed, 0);
    }

    #[test]
    fn test_message_text_by_transition() {
        let device = device_with_channel(Some("chat-42"));
        let reading = Reading::now("dev-1", 500.0);

        let triggered = message_text(&device, Transition::Triggered, &reading);
        assert!(triggered.contains("Gas Alert"));
        assert!(triggered.contains("Kitchen"));
        assert!(triggered.contains("500"));

        let resolved = message_text(&device, Transition::Resolved, &reading);
        assert!(resolved.contains("Gas Normal"));
    }
}
