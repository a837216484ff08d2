pub mod endpoint;

pub use endpoint::{validate, GenerationEndpoint, GenerationResponse};
