use async_trait::async_trait;

use crate::errors::GenerationError;
use crate::messages::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};

/// Stop sequences that keep a model from writing the next dialogue turn itself.
/// Strategy name reported by the local model backend.
pub const MODEL_STRATEGY_NAME: &str = "model";

pub const DIALOGUE_STOP_SEQUENCES: [&str; 3] = ["</s>", "Human:", "Assistant:"];

/// Options controlling generation behavior.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub temperature: f64,
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            stop_sequences: DIALOGUE_STOP_SEQUENCES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Text returned by a strategy before the endpoint wraps it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Generation {
    pub content: String,
    pub tokens_used: u32,
}

/// What a strategy expects as its textual input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    /// The `Human:`/`Assistant:` framed prompt built from message and context.
    Prompt,
    /// The caller's raw message, unframed.
    RawMessage,
}

/// Trait implemented by each generation backend (local model, rule table).
#[async_trait]
pub trait ResponseStrategy: Send + Sync {
    /// Short backend name, e.g. "model" or "rules".
    fn name(&self) -> &str;
    /// Identifier reported in the response envelope.
    fn model_identifier(&self) -> &str;
    fn input_kind(&self) -> InputKind;

    async fn generate(
        &self,
        input: &str,
        options: &GenerationOptions,
    ) -> Result<Generation, GenerationError>;
}
