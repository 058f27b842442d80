use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::alerts::{AlarmState, Notifier, Transition};
use crate::hub::FanoutHub;
use crate::ingest::{IngestError, Pipeline};
use crate::registry::{DeviceRegistry, RegistryError};
use crate::store::{Reading, ReadingsStore};

/// Application state shared across handlers
pub struct AppState {
    pub registry: Arc<DeviceRegistry>,
    pub store: Arc<dyn ReadingsStore>,
    pub hub: Arc<FanoutHub>,
    pub notifier: Arc<Notifier>,
    pub pipeline: Pipeline,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Device Registration
// ============================================================================

#[derive(Deserialize, Default)]
pub struct RegisterRequest {
    #[serde(rename = "deviceName", default)]
    pub device_name: Option<String>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

pub async fn register_device(
    State(state): State<Arc<AppState>>,
    request: Option<Json<RegisterRequest>>,
) -> (StatusCode, Json<RegisterResponse>) {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let device = state.registry.register(request.device_name);

    (
        StatusCode::CREATED,
        Json(RegisterResponse {
            device_id: device.id,
            api_key: device.api_key,
        }),
    )
}

// ============================================================================
// Ingest
// ============================================================================

#[derive(Deserialize)]
pub struct IngestRequest {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    /// Accepted as raw JSON so a non-numeric value maps to `InvalidInput`
    /// rather than a body-rejection.
    pub value: serde_json::Value,
    #[serde(rename = "apiKey", default)]
    pub api_key: Option<String>,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub accepted: bool,
    pub transition: Transition,
    #[serde(rename = "alarmState")]
    pub alarm_state: AlarmState,
}

pub async fn ingest_reading(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<IngestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Api key from the body, or the x-api-key header as devices prefer.
    let api_key = request
        .api_key
        .or_else(|| {
            headers
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        })
        .unwrap_or_default();

    let value = request
        .value
        .as_f64()
        .ok_or_else(|| ApiError::BadRequest("value must be a number".to_string()))?;

    let accepted = state.pipeline.ingest(&request.device_id, &api_key, value)?;

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            accepted: true,
            transition: accepted.transition,
            alarm_state: accepted.device.alarm_state,
        }),
    ))
}

// ============================================================================
// Readings Query
// ============================================================================

#[derive(Deserialize)]
pub struct ReadingsQuery {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Recent readings, newest first. Possession of the device id is the only
/// authorization here; a deliberate design choice inherited from the
/// dashboard this serves.
pub async fn recent_readings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReadingsQuery>,
) -> Json<Vec<Reading>> {
    let limit = query.limit.unwrap_or(50);
    Json(state.store.recent(&query.device_id, limit))
}

// ============================================================================
// Channel Linking
// ============================================================================

#[derive(Deserialize)]
pub struct LinkRequest {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "channelId")]
    pub channel_id: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

pub async fn link_channel(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LinkRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .registry
        .link_channel(&request.device_id, &request.api_key, request.channel_id)?;

    Ok(Json(serde_json::json!({ "linked": true })))
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Serialize)]
pub struct StatsResponse {
    pub devices: usize,
    pub subscribers: usize,
    pub notifications: NotificationStats,
}

#[derive(Serialize)]
pub struct NotificationStats {
    pub dispatched: u64,
    pub failed: u64,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let notifier = state.notifier.stats();
    Json(StatsResponse {
        devices: state.registry.device_count(),
        subscribers: state.hub.connection_count(),
        notifications: NotificationStats {
            dispatched: notifier.dispatched,
            failed: notifier.failed,
        },
    })
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Internal(String),
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::InvalidInput(msg) => ApiError::BadRequest(msg),
            IngestError::Unauthorized => ApiError::Unauthorized(err.to_string()),
            IngestError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound => ApiError::NotFound(err.to_string()),
            RegistryError::Unauthorized => ApiError::Unauthorized(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
