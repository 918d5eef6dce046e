//! Widget configuration
//!
//! Connection settings for the chat API plus the conversation options the
//! host page can supply (pre-existing session, initial message, quick
//! questions).

use std::time::Duration;
use thiserror::Error;

/// Base URL used when neither the host nor the environment supplies one.
pub const DEFAULT_API_BASE_URL: &str = "https://api.ordify.ai";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Agent ID is required. Provide an agent id or set CHAT_WIDGET_AGENT_ID.")]
    MissingAgentId,
    #[error("API key is required. Provide an api key or set CHAT_WIDGET_API_KEY.")]
    MissingApiKey,
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Settings the transport needs on every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_key: String,
    pub api_base_url: String,
    pub agent_id: String,
    /// Whole-request timeout. `None` means requests may hang indefinitely.
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(
        api_key: impl Into<String>,
        api_base_url: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_base_url: normalize_base_url(&api_base_url.into()),
            agent_id: agent_id.into(),
            request_timeout: None,
        }
    }
}

/// Full widget configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    pub agent_id: String,
    pub api_key: String,
    pub api_base_url: String,
    /// Session to resume instead of creating a new one on first send
    pub session_id: Option<String>,
    pub initial_message: Option<String>,
    pub initial_context: Option<String>,
    /// Preset prompts; when non-empty the initial message is never auto-sent
    pub quick_questions: Vec<String>,
    pub request_timeout: Option<Duration>,
}

impl WidgetConfig {
    pub fn new(agent_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            api_key: api_key.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            session_id: None,
            initial_message: None,
            initial_context: None,
            quick_questions: Vec::new(),
            request_timeout: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = normalize_base_url(&url.into());
        self
    }

    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = non_blank(session_id.into());
        self
    }

    #[must_use]
    pub fn with_initial_message(mut self, message: impl Into<String>) -> Self {
        self.initial_message = non_blank(message.into());
        self
    }

    #[must_use]
    pub fn with_initial_context(mut self, context: impl Into<String>) -> Self {
        self.initial_context = non_blank(context.into());
        self
    }

    #[must_use]
    pub fn with_quick_questions(mut self, questions: Vec<String>) -> Self {
        self.quick_questions = questions;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Load configuration from `CHAT_WIDGET_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).and_then(non_blank);

        let agent_id = get("CHAT_WIDGET_AGENT_ID").ok_or(ConfigError::MissingAgentId)?;
        let api_key = get("CHAT_WIDGET_API_KEY").ok_or(ConfigError::MissingApiKey)?;

        let mut config = Self::new(agent_id, api_key);
        if let Some(url) = get("CHAT_WIDGET_API_BASE_URL") {
            config = config.with_base_url(url);
        }
        config.session_id = get("CHAT_WIDGET_SESSION_ID");
        config.initial_message = get("CHAT_WIDGET_INITIAL_MESSAGE");
        config.initial_context = get("CHAT_WIDGET_INITIAL_CONTEXT");
        if let Some(raw) = get("CHAT_WIDGET_QUICK_QUESTIONS") {
            config.quick_questions = parse_quick_questions(&raw);
        }
        if let Some(raw) = get("CHAT_WIDGET_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "CHAT_WIDGET_TIMEOUT_SECS",
                value: raw.clone(),
            })?;
            config.request_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Settings needed by the transport client
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            api_key: self.api_key.clone(),
            api_base_url: self.api_base_url.clone(),
            agent_id: self.agent_id.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

/// Parse a quick-question list: a JSON array of strings, or failing that a
/// comma-separated list.
pub fn parse_quick_questions(raw: &str) -> Vec<String> {
    if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
        return list;
    }
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
