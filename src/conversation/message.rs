//! Chat messages

use crate::transport::WireMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A message in the conversation. Only `content` ever changes, and only
/// by growing while an assistant reply streams in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            id: generate_id(),
            content: content.into(),
            role,
            timestamp: Utc::now(),
            session_id,
        }
    }

    pub fn user(content: impl Into<String>, session_id: Option<String>) -> Self {
        Self::new(Role::User, content, session_id)
    }

    /// Empty reply that tokens are appended to
    pub fn assistant_placeholder(session_id: Option<String>) -> Self {
        Self::new(Role::Assistant, String::new(), session_id)
    }

    /// Convert a history entry. Gaps get a fresh id, empty content, the
    /// user role and the current time.
    pub fn from_wire(wire: WireMessage, session_id: &str) -> Self {
        let role = match wire.role.as_deref() {
            Some("assistant") => Role::Assistant,
            _ => Role::User,
        };
        let timestamp = wire
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);

        Self {
            id: wire.id.filter(|id| !id.is_empty()).unwrap_or_else(generate_id),
            content: wire.content.unwrap_or_default(),
            role,
            timestamp,
            session_id: Some(session_id.to_string()),
        }
    }

    /// Identity used to spot the same message under two different ids
    pub fn content_key(&self) -> (Role, &str) {
        (self.role, self.content.trim())
    }
}

/// Fresh unique message id
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS[.fff]` which the server emits
/// for UTC times without an offset.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
