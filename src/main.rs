//! Plume Server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - PLUME_HOST: Bind address (default: 0.0.0.0)
//! - PLUME_PORT: Port number (default: 3000)
//! - PLUME_ALERT_THRESHOLD: Process-wide alarm threshold (default: 400)
//! - PLUME_TELEGRAM_BOT_TOKEN: Bot token for transition notifications
//!   (unset: notifications are logged only)
//! - PLUME_TELEGRAM_API_BASE: Gateway base URL (default: https://api.telegram.org)
//! - RUST_LOG: Log level (default: info)

use plume::alerts::NotifyTarget;
use plume::api::{run_server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plume=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse configuration from environment
    let host = std::env::var("PLUME_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PLUME_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let default_threshold: f64 = std::env::var("PLUME_ALERT_THRESHOLD")
        .ok()
        .and_then(|t| t.parse().ok())
        .unwrap_or(400.0);

    let notify_target = match std::env::var("PLUME_TELEGRAM_BOT_TOKEN") {
        Ok(bot_token) if !bot_token.is_empty() => NotifyTarget::Telegram {
            bot_token,
            api_base: std::env::var("PLUME_TELEGRAM_API_BASE")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
        },
        _ => NotifyTarget::Log,
    };

    let config = ServerConfig {
        host,
        port,
        default_threshold,
        notify_target,
    };

    tracing::info!("Plume configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    tracing::info!("  Default alert threshold: {}", config.default_threshold);
    match &config.notify_target {
        NotifyTarget::Telegram { api_base, .. } => {
            tracing::info!("  Notifications: Telegram via {}", api_base);
        }
        NotifyTarget::Log => {
            tracing::info!("  Notifications: log only (no bot token configured)");
        }
    }

    println!(
        r#"
  _____  _
 |  __ \| |
 | |__) | |_   _ _ __ ___   ___
 |  ___/| | | | | '_ ` _ \ / _ \
 | |    | | |_| | | | | | |  __/
 |_|    |_|\__,_|_| |_| |_|\___|

 Real-Time Gas-Sensor Telemetry Hub
 Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );

    run_server(config).await
}
