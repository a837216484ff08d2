use serde::{Deserialize, Deserializer, Serialize};

/// Default completion budget when the request omits `max_tokens`.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
/// Default sampling temperature when the request omits `temperature`.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Speaker of a prior conversational turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Assistant,
}

impl Role {
    /// Lenient parse: anything other than `assistant` is a user turn.
    pub fn parse_lenient(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("assistant") {
            Self::Assistant
        } else {
            Self::User
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Role::parse_lenient).unwrap_or_default())
    }
}

/// One prior turn of the dialogue, oldest first in a request's context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `POST /generate`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub message: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub context: Vec<ConversationTurn>,
    #[serde(default = "default_max_tokens", deserialize_with = "null_as_default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature", deserialize_with = "null_as_default_temperature")]
    pub temperature: f64,
}

impl GenerationRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_context(mut self, context: Vec<ConversationTurn>) -> Self {
        self.context = context;
        self
    }
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ConversationTurn>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ConversationTurn>>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default_max_tokens<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or(DEFAULT_MAX_TOKENS))
}

fn null_as_default_temperature<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(DEFAULT_TEMPERATURE))
}

/// What a request produced, fresh per request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub content: String,
    pub model_identifier: String,
    pub tokens_used: u32,
}
