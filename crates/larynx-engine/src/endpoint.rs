//! Per-request generation pipeline.
//!
//! `RECEIVED → health check → {REJECTED_UNREADY | PROMPT_BUILT} →
//! STRATEGY_INVOKED → {RESPONDED | FAILED}`

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use larynx_core::prompt;
use larynx_core::{
    GenerationError, GenerationOptions, GenerationRequest, GenerationResult, InputKind, RequestId,
    ServiceHealthState,
};
use larynx_telemetry::MetricsRecorder;

const REQUESTS_TOTAL: &str = "generate.requests.total";
const DURATION_MS: &str = "generate.duration_ms";
const TOKENS_TOTAL: &str = "generate.tokens.total";
const IN_FLIGHT: &str = "generate.in_flight";

/// Success envelope returned to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GenerationResponse {
    pub content: String,
    pub model_identifier: String,
    pub tokens_used: u32,
    pub success: bool,
}

impl From<GenerationResult> for GenerationResponse {
    fn from(result: GenerationResult) -> Self {
        Self {
            content: result.content,
            model_identifier: result.model_identifier,
            tokens_used: result.tokens_used,
            success: true,
        }
    }
}

/// Boundary checks applied before any strategy runs.
pub fn validate(request: &GenerationRequest) -> Result<(), GenerationError> {
    if request.message.trim().is_empty() {
        return Err(GenerationError::InvalidRequest("message must not be empty".into()));
    }
    if request.max_tokens == 0 {
        return Err(GenerationError::InvalidRequest("max_tokens must be positive".into()));
    }
    if !request.temperature.is_finite() || !(0.0..=2.0).contains(&request.temperature) {
        return Err(GenerationError::InvalidRequest(
            "temperature must be between 0 and 2".into(),
        ));
    }
    Ok(())
}

/// Tracks one in-flight strategy call. Dropping it before [`finish`]
/// counts the request as cancelled.
///
/// [`finish`]: InFlight::finish
struct InFlight<'a> {
    metrics: &'a MetricsRecorder,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn start(metrics: &'a MetricsRecorder) -> Self {
        metrics.gauge_inc(IN_FLIGHT, &[], 1.0);
        Self {
            metrics,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.metrics.gauge_inc(IN_FLIGHT, &[], -1.0);
        if !self.finished {
            self.metrics
                .counter_inc(REQUESTS_TOTAL, &[("outcome", "cancelled")], 1);
            warn!("generation cancelled before completion");
        }
    }
}

/// Orchestrates health check, prompt assembly and strategy invocation.
pub struct GenerationEndpoint {
    health: Arc<ServiceHealthState>,
    metrics: Arc<MetricsRecorder>,
}

impl GenerationEndpoint {
    pub fn new(health: Arc<ServiceHealthState>, metrics: Arc<MetricsRecorder>) -> Self {
        Self { health, metrics }
    }

    pub fn health(&self) -> &ServiceHealthState {
        &self.health
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    /// Serve an already-parsed request.
    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        self.handle(Ok(request)).await
    }

    /// Serve a request whose body may have failed to parse.
    ///
    /// Readiness is checked before the body is looked at, so an unready
    /// service answers `BackendUnavailable` for any input.
    pub async fn handle(
        &self,
        parsed: Result<GenerationRequest, String>,
    ) -> Result<GenerationResult, GenerationError> {
        let Some(strategy) = self.health.strategy() else {
            let detail = self.health.detail();
            self.metrics
                .counter_inc(REQUESTS_TOTAL, &[("outcome", "unavailable")], 1);
            warn!(%detail, "rejecting generation, backend not ready");
            return Err(GenerationError::BackendUnavailable(detail));
        };

        let request = parsed
            .map_err(GenerationError::InvalidRequest)
            .and_then(|request| validate(&request).map(|()| request));
        let request = match request {
            Ok(request) => request,
            Err(e) => {
                self.metrics
                    .counter_inc(REQUESTS_TOTAL, &[("outcome", "invalid")], 1);
                return Err(e);
            }
        };

        let request_id = RequestId::new();
        let span = info_span!("generate", request_id = %request_id, strategy = strategy.name());

        async move {
            let input = match strategy.input_kind() {
                InputKind::Prompt => prompt::assemble(&request.message, &request.context),
                InputKind::RawMessage => request.message.clone(),
            };
            let options = GenerationOptions {
                max_tokens: request.max_tokens,
                temperature: request.temperature,
                ..Default::default()
            };

            let strategy_label = [("strategy", strategy.name())];
            let in_flight = InFlight::start(&self.metrics);
            let start = Instant::now();
            let outcome = strategy.generate(&input, &options).await;
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
            in_flight.finish();
            self.metrics
                .histogram_observe(DURATION_MS, &strategy_label, elapsed_ms);

            match outcome {
                Ok(generation) => {
                    self.metrics
                        .counter_inc(REQUESTS_TOTAL, &[("outcome", "success")], 1);
                    self.metrics.counter_inc(
                        TOKENS_TOTAL,
                        &strategy_label,
                        u64::from(generation.tokens_used),
                    );
                    info!(
                        tokens = generation.tokens_used,
                        duration_ms = elapsed_ms as u64,
                        context_turns = request.context.len(),
                        "generation completed"
                    );
                    Ok(GenerationResult {
                        content: generation.content,
                        model_identifier: strategy.model_identifier().to_string(),
                        tokens_used: generation.tokens_used,
                    })
                }
                Err(e) => {
                    self.metrics
                        .counter_inc(REQUESTS_TOTAL, &[("outcome", "failure")], 1);
                    warn!(error = %e, kind = e.error_kind(), "generation failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }
}
