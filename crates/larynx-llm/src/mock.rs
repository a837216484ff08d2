use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use larynx_core::{Generation, GenerationError, GenerationOptions, InputKind, ResponseStrategy};

/// Pre-programmed outcomes for deterministic testing without a model.
#[derive(Clone, Debug)]
pub enum ScriptedReply {
    Text { content: String, tokens_used: u32 },
    Error(String),
    /// Wait a duration, then produce the inner reply.
    Delay(Duration, Box<ScriptedReply>),
}

impl ScriptedReply {
    pub fn text(content: &str) -> Self {
        Self::Text {
            content: content.to_string(),
            tokens_used: content.split_whitespace().count() as u32,
        }
    }

    pub fn error(message: &str) -> Self {
        Self::Error(message.to_string())
    }

    pub fn delayed(delay: Duration, inner: ScriptedReply) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Strategy that plays back scripted replies in order and records its inputs.
pub struct ScriptedStrategy {
    replies: Vec<ScriptedReply>,
    input_kind: InputKind,
    call_count: AtomicUsize,
    inputs: Mutex<Vec<String>>,
}

impl ScriptedStrategy {
    /// Expects framed prompts, like a model backend.
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self::with_input_kind(replies, InputKind::Prompt)
    }

    pub fn with_input_kind(replies: Vec<ScriptedReply>, input_kind: InputKind) -> Self {
        Self {
            replies,
            input_kind,
            call_count: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Inputs received so far, in call order.
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().clone()
    }
}

#[async_trait]
impl ResponseStrategy for ScriptedStrategy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model_identifier(&self) -> &str {
        "scripted-model"
    }

    fn input_kind(&self) -> InputKind {
        self.input_kind
    }

    async fn generate(
        &self,
        input: &str,
        _options: &GenerationOptions,
    ) -> Result<Generation, GenerationError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.inputs.lock().push(input.to_string());

        let Some(reply) = self.replies.get(idx) else {
            return Err(GenerationError::GenerationFailure(format!(
                "ScriptedStrategy: no reply configured for call {idx}"
            )));
        };

        // Nested delays are unrolled iteratively.
        let mut current = reply;
        loop {
            match current {
                ScriptedReply::Text {
                    content,
                    tokens_used,
                } => {
                    return Ok(Generation {
                        content: content.clone(),
                        tokens_used: *tokens_used,
                    })
                }
                ScriptedReply::Error(message) => {
                    return Err(GenerationError::GenerationFailure(message.clone()))
                }
                ScriptedReply::Delay(duration, inner) => {
                    tokio::time::sleep(*duration).await;
                    current = inner.as_ref();
                }
            }
        }
    }
}
