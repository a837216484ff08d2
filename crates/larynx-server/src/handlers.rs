use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use larynx_core::{GenerationError, GenerationRequest, ServiceHealthState, MODEL_STRATEGY_NAME};
use larynx_engine::GenerationResponse;
use larynx_telemetry::MetricsSnapshot;

use crate::server::AppState;

/// Body of `GET /`.
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: String,
    pub status: &'static str,
    pub model_loaded: bool,
    pub backend: Option<String>,
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub model_loaded: bool,
    pub backend: Option<String>,
    pub detail: &'static str,
    /// Why the model is not serving when a fallback strategy is.
    pub fallback_cause: Option<&'static str>,
    pub engine_available: bool,
}

/// Error envelope. Carries the short error kind and a one-line message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: &'static str,
    pub detail: String,
}

/// Adapter turning a [`GenerationError`] into an HTTP response.
pub struct ApiError(pub GenerationError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            success: false,
            error: self.0.error_kind(),
            detail: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// True only when the local model itself is serving.
fn model_loaded(health: &ServiceHealthState) -> bool {
    health.backend_name() == Some(MODEL_STRATEGY_NAME)
}

pub async fn root(State(state): State<AppState>) -> Json<ServiceInfo> {
    let health = state.endpoint.health();
    Json(ServiceInfo {
        service: state.service_name.clone(),
        status: "running",
        model_loaded: model_loaded(health),
        backend: health.backend_name().map(str::to_string),
    })
}

/// Always 200: a degraded service must stay alive for liveness probes.
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let health = state.endpoint.health();
    let snapshot = health.snapshot();
    Json(HealthReport {
        status: if snapshot.ready { "healthy" } else { "unhealthy" },
        model_loaded: model_loaded(health),
        backend: health.backend_name().map(str::to_string),
        detail: snapshot.detail.as_str(),
        fallback_cause: snapshot.fallback_cause.map(|cause| cause.as_str()),
        engine_available: state.engine_available,
    })
}

/// `POST /generate` and `POST /chat`.
///
/// The body is taken as a possibly-rejected extractor so readiness can be
/// checked before any parse error is reported.
pub async fn generate(
    State(state): State<AppState>,
    body: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let parsed = body
        .map(|Json(request)| request)
        .map_err(|rejection| rejection.body_text());
    let result = state.endpoint.handle(parsed).await.map_err(ApiError)?;
    Ok(Json(result.into()))
}

pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.endpoint.metrics().snapshot())
}
