pub mod engine;
pub mod mock;
pub mod model;
pub mod rules;
pub mod select;

#[cfg(feature = "candle")]
pub mod candle;

pub use engine::{Completion, InferenceEngine};
pub use mock::{ScriptedReply, ScriptedStrategy};
pub use model::ModelBackend;
pub use rules::RuleBasedBackend;
pub use select::{resolve, BackendChoice, BackendConfig, ENGINE_AVAILABLE};
