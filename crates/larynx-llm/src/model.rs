use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use larynx_core::{
    Generation, GenerationError, GenerationOptions, InputKind, ResponseStrategy, MODEL_STRATEGY_NAME,
};

use crate::engine::{truncate_at_stop, InferenceEngine};

/// Strategy backed by a loaded local model.
pub struct ModelBackend {
    engine: Arc<dyn InferenceEngine>,
    model_identifier: String,
}

impl ModelBackend {
    pub fn new(engine: Arc<dyn InferenceEngine>, model_identifier: impl Into<String>) -> Self {
        Self {
            engine,
            model_identifier: model_identifier.into(),
        }
    }
}

#[async_trait]
impl ResponseStrategy for ModelBackend {
    fn name(&self) -> &str {
        MODEL_STRATEGY_NAME
    }

    fn model_identifier(&self) -> &str {
        &self.model_identifier
    }

    fn input_kind(&self) -> InputKind {
        InputKind::Prompt
    }

    async fn generate(
        &self,
        input: &str,
        options: &GenerationOptions,
    ) -> Result<Generation, GenerationError> {
        let engine = Arc::clone(&self.engine);
        let prompt = input.to_owned();
        let worker_options = options.clone();

        // The only suspension point: inference runs on the blocking pool.
        let completion = tokio::task::spawn_blocking(move || engine.complete(&prompt, &worker_options))
            .await
            .map_err(|e| GenerationError::GenerationFailure(format!("inference worker failed: {e}")))?
            .map_err(GenerationError::GenerationFailure)?;

        let content = truncate_at_stop(&completion.text, &options.stop_sequences)
            .trim()
            .to_string();
        debug!(
            tokens = completion.completion_tokens,
            chars = content.len(),
            "model completion finished"
        );

        Ok(Generation {
            content,
            tokens_used: completion.completion_tokens,
        })
    }
}
