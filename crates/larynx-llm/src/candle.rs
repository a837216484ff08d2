//! GGUF inference on CPU through candle's quantized llama implementation.

use std::path::{Path, PathBuf};

use candle_core::quantized::gguf_file;
use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama::ModelWeights;
use parking_lot::Mutex;
use tokenizers::Tokenizer;
use tracing::info;

use larynx_core::{GenerationOptions, LoadError};

use crate::engine::{stop_index, Completion, InferenceEngine};

/// Used when the GGUF metadata carries no EOS id (llama convention).
const FALLBACK_EOS_TOKEN: u32 = 2;

/// Configuration for the candle engine.
#[derive(Debug, Clone)]
pub struct CandleConfig {
    /// Path to the GGUF model file
    pub model_path: PathBuf,
    /// Maximum prompt + completion tokens
    pub context_window: usize,
}

impl CandleConfig {
    /// Tokenizer is expected as `tokenizer.json` next to the weights.
    pub fn tokenizer_path(&self) -> PathBuf {
        self.model_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("tokenizer.json")
    }
}

/// Loaded quantized llama weights plus tokenizer.
pub struct CandleEngine {
    // Weights keep a per-layer KV cache, so forward passes are serialized.
    model: Mutex<ModelWeights>,
    tokenizer: Tokenizer,
    device: Device,
    eos_token_id: u32,
    context_window: usize,
}

impl CandleEngine {
    /// Read weights and tokenizer. Blocking; call from a blocking worker.
    pub fn load(config: &CandleConfig) -> Result<Self, LoadError> {
        if !config.model_path.exists() {
            return Err(LoadError::WeightsMissing(config.model_path.clone()));
        }
        let tokenizer_path = config.tokenizer_path();
        if !tokenizer_path.exists() {
            return Err(LoadError::TokenizerMissing(tokenizer_path));
        }

        let device = Device::Cpu;
        info!(path = %config.model_path.display(), ?device, "loading GGUF weights");

        let mut file = std::fs::File::open(&config.model_path)
            .map_err(|e| LoadError::LoadFailed(format!("open {}: {e}", config.model_path.display())))?;
        let content = gguf_file::Content::read(&mut file)
            .map_err(|e| LoadError::LoadFailed(format!("read GGUF header: {e}")))?;

        let eos_token_id = content
            .metadata
            .get("tokenizer.ggml.eos_token_id")
            .and_then(|v| v.to_u32().ok())
            .unwrap_or(FALLBACK_EOS_TOKEN);

        let model = ModelWeights::from_gguf(content, &mut file, &device)
            .map_err(|e| LoadError::LoadFailed(format!("build model: {e}")))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| LoadError::LoadFailed(format!("tokenizer {}: {e}", tokenizer_path.display())))?;

        info!(eos_token_id, context_window = config.context_window, "model loaded");

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            device,
            eos_token_id,
            context_window: config.context_window,
        })
    }

    fn run(&self, prompt: &str, options: &GenerationOptions) -> Result<Completion, String> {
        let encoding = self.tokenizer.encode(prompt, true).map_err(|e| e.to_string())?;
        let prompt_tokens = encoding.get_ids();
        if prompt_tokens.len() >= self.context_window {
            return Err(format!(
                "prompt is {} tokens, context window is {}",
                prompt_tokens.len(),
                self.context_window
            ));
        }
        let budget = (options.max_tokens as usize).min(self.context_window - prompt_tokens.len());

        let temperature = (options.temperature > 0.0).then_some(options.temperature);
        let mut sampler = LogitsProcessor::new(rand::random::<u64>(), temperature, None);

        let mut model = self.model.lock();
        let mut generated: Vec<u32> = Vec::new();
        let mut text = String::new();
        let mut input = Tensor::new(prompt_tokens, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| e.to_string())?;
        let mut position = 0;

        for _ in 0..budget {
            let logits = model
                .forward(&input, position)
                .and_then(|l| l.squeeze(0))
                .and_then(|l| l.to_dtype(DType::F32))
                .map_err(|e| e.to_string())?;
            position += input.dim(1).map_err(|e| e.to_string())?;

            let next = sampler.sample(&logits).map_err(|e| e.to_string())?;
            if next == self.eos_token_id {
                break;
            }
            generated.push(next);

            text = self.tokenizer.decode(&generated, true).map_err(|e| e.to_string())?;
            if let Some(cut) = stop_index(&text, &options.stop_sequences) {
                text.truncate(cut);
                break;
            }

            input = Tensor::new(&[next], &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(|e| e.to_string())?;
        }

        Ok(Completion {
            text,
            completion_tokens: generated.len() as u32,
        })
    }
}

impl InferenceEngine for CandleEngine {
    fn complete(&self, prompt: &str, options: &GenerationOptions) -> Result<Completion, String> {
        self.run(prompt, options)
            .map_err(|e| format!("Model generation failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_sits_next_to_weights() {
        let config = CandleConfig {
            model_path: PathBuf::from("/app/models/deepseek.gguf"),
            context_window: 2048,
        };
        assert_eq!(config.tokenizer_path(), PathBuf::from("/app/models/tokenizer.json"));
    }

    #[test]
    fn missing_weights_is_weights_missing() {
        let config = CandleConfig {
            model_path: std::env::temp_dir().join("larynx-no-such-model.gguf"),
            context_window: 2048,
        };
        match CandleEngine::load(&config) {
            Err(LoadError::WeightsMissing(path)) => assert_eq!(path, config.model_path),
            Err(other) => panic!("expected WeightsMissing, got {other}"),
            Ok(_) => panic!("expected load failure"),
        }
    }

    #[test]
    fn garbage_weights_is_load_failed() {
        let dir = std::env::temp_dir().join(format!("larynx-candle-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let model_path = dir.join("broken.gguf");
        std::fs::write(&model_path, b"not a gguf file").unwrap();
        std::fs::write(dir.join("tokenizer.json"), b"{}").unwrap();

        let config = CandleConfig {
            model_path,
            context_window: 2048,
        };
        let err = CandleEngine::load(&config).err().expect("load should fail");
        assert!(matches!(err, LoadError::LoadFailed(_)), "got {err}");
        std::fs::remove_dir_all(&dir).ok();
    }
}
