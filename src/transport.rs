//! Transport to the remote chat API
//!
//! Three operations: create a session, open a streaming chat request, and
//! fetch a session together with its history.

mod client;
mod error;
mod types;

#[cfg(test)]
pub mod testing;

pub use client::ApiClient;
pub use error::{ApiError, ApiErrorKind};
pub use types::{Agent, AgentConfig, Session, SessionWithMessages, WireMessage};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Instant;

/// Raw response body of a streaming chat request
pub type ByteStream = BoxStream<'static, Result<Bytes, ApiError>>;

/// Operations the conversation manager needs from the server
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Create a new conversation thread
    async fn create_session(&self) -> Result<Session, ApiError>;

    /// Post a user message and return the streamed reply body
    async fn send_message(
        &self,
        content: &str,
        session_id: Option<&str>,
        context: Option<&str>,
    ) -> Result<ByteStream, ApiError>;

    /// Fetch a session and its message history
    async fn get_session_with_messages(
        &self,
        session_id: &str,
    ) -> Result<SessionWithMessages, ApiError>;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn create_session(&self) -> Result<Session, ApiError> {
        (**self).create_session().await
    }

    async fn send_message(
        &self,
        content: &str,
        session_id: Option<&str>,
        context: Option<&str>,
    ) -> Result<ByteStream, ApiError> {
        (**self).send_message(content, session_id, context).await
    }

    async fn get_session_with_messages(
        &self,
        session_id: &str,
    ) -> Result<SessionWithMessages, ApiError> {
        (**self).get_session_with_messages(session_id).await
    }
}

/// Logging wrapper for transports
pub struct LoggingTransport<T> {
    inner: T,
}

impl<T: ChatTransport> LoggingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

fn log_outcome<V>(operation: &str, start: Instant, result: &Result<V, ApiError>) {
    let duration_ms = start.elapsed().as_millis();
    match result {
        Ok(_) => {
            tracing::debug!(operation, duration_ms = %duration_ms, "Chat API request completed");
        }
        Err(e) => {
            tracing::warn!(
                operation,
                duration_ms = %duration_ms,
                error = %e.message,
                status = ?e.status,
                kind = ?e.kind,
                "Chat API request failed"
            );
        }
    }
}

#[async_trait]
impl<T: ChatTransport> ChatTransport for LoggingTransport<T> {
    async fn create_session(&self) -> Result<Session, ApiError> {
        let start = Instant::now();
        let result = self.inner.create_session().await;
        log_outcome("create_session", start, &result);
        if let Ok(session) = &result {
            tracing::info!(session_id = %session.id, "Created chat session");
        }
        result
    }

    async fn send_message(
        &self,
        content: &str,
        session_id: Option<&str>,
        context: Option<&str>,
    ) -> Result<ByteStream, ApiError> {
        let start = Instant::now();
        let result = self.inner.send_message(content, session_id, context).await;
        // Only covers time to first byte; the body is consumed by the caller
        log_outcome("send_message", start, &result);
        result
    }

    async fn get_session_with_messages(
        &self,
        session_id: &str,
    ) -> Result<SessionWithMessages, ApiError> {
        let start = Instant::now();
        let result = self.inner.get_session_with_messages(session_id).await;
        log_outcome("get_session_with_messages", start, &result);
        if let Ok(history) = &result {
            tracing::debug!(
                session_id,
                messages = history.messages.len(),
                "Fetched session history"
            );
        }
        result
    }
}
