pub mod errors;
pub mod health;
pub mod ids;
pub mod messages;
pub mod prompt;
pub mod provider;

pub use errors::{GenerationError, LoadError};
pub use health::{HealthDetail, HealthSnapshot, Readiness, ServiceHealthState};
pub use ids::RequestId;
pub use messages::{ConversationTurn, GenerationRequest, GenerationResult, Role};
pub use provider::{Generation, GenerationOptions, InputKind, ResponseStrategy, MODEL_STRATEGY_NAME};
