//! Startup-time strategy selection.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{error, info, warn};

use larynx_core::{LoadError, Readiness, ResponseStrategy};

use crate::model::ModelBackend;
use crate::rules::RuleBasedBackend;

/// Whether this build carries a local inference engine.
pub const ENGINE_AVAILABLE: bool = cfg!(feature = "candle");

/// Which strategy the operator asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendChoice {
    /// Local model only; unready if it cannot load.
    Model,
    /// Rule-based replies only; always ready.
    Rules,
    /// Local model, falling back to rules when it cannot load.
    Auto,
}

impl FromStr for BackendChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "model" => Ok(Self::Model),
            "rules" | "rule-based" => Ok(Self::Rules),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown backend '{other}' (expected model, rules or auto)")),
        }
    }
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Model => "model",
            Self::Rules => "rules",
            Self::Auto => "auto",
        })
    }
}

/// Everything needed to bring a backend up.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub choice: BackendChoice,
    pub model_dir: PathBuf,
    pub model_file: String,
    /// Identifier reported in responses when the model serves.
    pub model_name: String,
    pub context_window: usize,
    /// Fixed seed for rule-based reply selection.
    pub rules_seed: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            choice: BackendChoice::Auto,
            model_dir: PathBuf::from("/app/models"),
            model_file: "deepseek-coder-1.3b-instruct.Q4_K_M.gguf".into(),
            model_name: "deepseek-coder-1.3b-instruct".into(),
            context_window: 2048,
            rules_seed: None,
        }
    }
}

impl BackendConfig {
    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_file)
    }
}

fn rules_backend(config: &BackendConfig) -> Arc<dyn ResponseStrategy> {
    match config.rules_seed {
        Some(seed) => Arc::new(RuleBasedBackend::seeded(seed)),
        None => Arc::new(RuleBasedBackend::new()),
    }
}

/// Resolve the configured strategy once. Never fails: a backend that cannot
/// load yields `Readiness::Unready`, or `Readiness::Fallback` to rules under
/// `Auto`.
pub async fn resolve(config: &BackendConfig) -> Readiness {
    match config.choice {
        BackendChoice::Rules => {
            info!("serving rule-based replies");
            Readiness::Ready(rules_backend(config))
        }
        BackendChoice::Model => match load_model(config).await {
            Ok(backend) => Readiness::Ready(Arc::new(backend)),
            Err(e) => {
                error!(error = %e, detail = %e.detail(), "model backend unavailable, service stays unready");
                Readiness::Unready(e.detail())
            }
        },
        BackendChoice::Auto => match load_model(config).await {
            Ok(backend) => Readiness::Ready(Arc::new(backend)),
            Err(e) => {
                warn!(error = %e, detail = %e.detail(), "model backend unavailable, falling back to rule-based replies");
                Readiness::Fallback {
                    strategy: rules_backend(config),
                    cause: e.detail(),
                }
            }
        },
    }
}

/// Load the local model on a blocking worker.
#[cfg(feature = "candle")]
pub async fn load_model(config: &BackendConfig) -> Result<ModelBackend, LoadError> {
    use crate::candle::{CandleConfig, CandleEngine};

    if let Err(e) = std::fs::create_dir_all(&config.model_dir) {
        warn!(dir = %config.model_dir.display(), error = %e, "could not create model directory");
    }

    let model_path = config.model_path();
    if !model_path.exists() {
        return Err(LoadError::WeightsMissing(model_path));
    }

    info!(path = %model_path.display(), "loading model");
    let candle_config = CandleConfig {
        model_path,
        context_window: config.context_window,
    };
    let engine = tokio::task::spawn_blocking(move || CandleEngine::load(&candle_config))
        .await
        .map_err(|e| LoadError::LoadFailed(format!("loader task failed: {e}")))??;

    info!(model = %config.model_name, "model loaded successfully");
    Ok(ModelBackend::new(Arc::new(engine), config.model_name.clone()))
}

#[cfg(not(feature = "candle"))]
pub async fn load_model(_config: &BackendConfig) -> Result<ModelBackend, LoadError> {
    Err(LoadError::BackendMissing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use larynx_core::HealthDetail;

    fn missing_model_config(choice: BackendChoice) -> BackendConfig {
        BackendConfig {
            choice,
            model_dir: std::env::temp_dir().join(format!("larynx-select-{}", std::process::id())),
            model_file: "absent.gguf".into(),
            rules_seed: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn backend_choice_parsing() {
        assert_eq!("model".parse::<BackendChoice>().unwrap(), BackendChoice::Model);
        assert_eq!("RULES".parse::<BackendChoice>().unwrap(), BackendChoice::Rules);
        assert_eq!("auto".parse::<BackendChoice>().unwrap(), BackendChoice::Auto);
        assert!("gpt".parse::<BackendChoice>().is_err());
        assert_eq!(BackendChoice::Rules.to_string(), "rules");
    }

    #[test]
    fn default_model_path() {
        let config = BackendConfig::default();
        assert_eq!(
            config.model_path(),
            PathBuf::from("/app/models/deepseek-coder-1.3b-instruct.Q4_K_M.gguf")
        );
    }

    #[tokio::test]
    async fn rules_choice_is_ready() {
        match resolve(&missing_model_config(BackendChoice::Rules)).await {
            Readiness::Ready(strategy) => assert_eq!(strategy.name(), "rules"),
            other => panic!("expected ready, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn model_choice_without_weights_is_unready() {
        let expected = if ENGINE_AVAILABLE {
            HealthDetail::WeightsMissing
        } else {
            HealthDetail::BackendMissing
        };
        match resolve(&missing_model_config(BackendChoice::Model)).await {
            Readiness::Unready(detail) => assert_eq!(detail, expected),
            other => panic!("expected unready, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn auto_choice_falls_back_to_rules() {
        let expected = if ENGINE_AVAILABLE {
            HealthDetail::WeightsMissing
        } else {
            HealthDetail::BackendMissing
        };
        match resolve(&missing_model_config(BackendChoice::Auto)).await {
            Readiness::Fallback { strategy, cause } => {
                assert_eq!(strategy.name(), "rules");
                assert_eq!(cause, expected);
            }
            other => panic!("expected fallback, got {other:?}"),
        }
    }
}
