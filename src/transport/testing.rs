//! Mock transport for testing
//!
//! Replies are queued per operation and every call is recorded.

use super::{ApiError, ByteStream, ChatTransport, Session, SessionWithMessages, WireMessage};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::ReceiverStream;

/// What a queued `send_message` call does
enum StreamReply {
    Chunks(Vec<Bytes>),
    Channel(mpsc::Receiver<Result<Bytes, ApiError>>),
    Error(ApiError),
    /// Never resolves
    Hang,
}

/// A recorded `send_message` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendCall {
    pub content: String,
    pub session_id: Option<String>,
    pub context: Option<String>,
}

#[allow(dead_code)]
pub struct MockTransport {
    sessions: Mutex<VecDeque<Result<Session, ApiError>>>,
    streams: Mutex<VecDeque<StreamReply>>,
    histories: Mutex<VecDeque<Result<SessionWithMessages, ApiError>>>,
    create_session_calls: Mutex<usize>,
    send_calls: Mutex<Vec<SendCall>>,
    history_calls: Mutex<Vec<String>>,
    /// Notified (with a stored permit) whenever `send_message` is entered
    pub send_started: Arc<Notify>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(VecDeque::new()),
            streams: Mutex::new(VecDeque::new()),
            histories: Mutex::new(VecDeque::new()),
            create_session_calls: Mutex::new(0),
            send_calls: Mutex::new(Vec::new()),
            history_calls: Mutex::new(Vec::new()),
            send_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_session(&self, result: Result<Session, ApiError>) {
        self.sessions.lock().unwrap().push_back(result);
    }

    /// Queue a reply body delivered as the given raw chunks
    pub fn queue_chunks(&self, chunks: &[&str]) {
        let chunks = chunks.iter().map(|c| Bytes::from(c.to_string())).collect();
        self.streams
            .lock()
            .unwrap()
            .push_back(StreamReply::Chunks(chunks));
    }

    /// Queue a reply whose frames are `data: {"text": ...}` lines followed by `[DONE]`
    pub fn queue_text_reply(&self, tokens: &[&str]) {
        let mut frames: Vec<String> = tokens.iter().map(|t| text_frame(t)).collect();
        frames.push("data: [DONE]\n".to_string());
        let refs: Vec<&str> = frames.iter().map(String::as_str).collect();
        self.queue_chunks(&refs);
    }

    /// Queue a reply fed by the returned sender; the stream ends when it drops
    pub fn queue_channel(&self) -> mpsc::Sender<Result<Bytes, ApiError>> {
        let (tx, rx) = mpsc::channel(16);
        self.streams
            .lock()
            .unwrap()
            .push_back(StreamReply::Channel(rx));
        tx
    }

    pub fn queue_send_error(&self, error: ApiError) {
        self.streams
            .lock()
            .unwrap()
            .push_back(StreamReply::Error(error));
    }

    /// Queue a send that never answers
    pub fn queue_hang(&self) {
        self.streams.lock().unwrap().push_back(StreamReply::Hang);
    }

    pub fn queue_history(&self, result: Result<SessionWithMessages, ApiError>) {
        self.histories.lock().unwrap().push_back(result);
    }

    pub fn queue_history_messages(&self, session_id: &str, messages: Vec<WireMessage>) {
        self.queue_history(Ok(SessionWithMessages {
            session: Session::with_id(session_id),
            messages,
        }));
    }

    pub fn create_session_calls(&self) -> usize {
        *self.create_session_calls.lock().unwrap()
    }

    pub fn send_calls(&self) -> Vec<SendCall> {
        self.send_calls.lock().unwrap().clone()
    }

    pub fn history_calls(&self) -> Vec<String> {
        self.history_calls.lock().unwrap().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// A single `stream` frame line
pub fn text_frame(text: &str) -> String {
    format!(
        "data: {}\n",
        serde_json::json!({ "text": text, "sessionId": "mock", "type": "stream" })
    )
}

/// Wire history entry
pub fn wire_message(id: &str, role: &str, content: &str, timestamp: &str) -> WireMessage {
    WireMessage {
        id: Some(id.to_string()),
        content: Some(content.to_string()),
        role: Some(role.to_string()),
        timestamp: Some(timestamp.to_string()),
        session_id: None,
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn create_session(&self) -> Result<Session, ApiError> {
        *self.create_session_calls.lock().unwrap() += 1;
        self.sessions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::network("No mock session queued")))
    }

    async fn send_message(
        &self,
        content: &str,
        session_id: Option<&str>,
        context: Option<&str>,
    ) -> Result<ByteStream, ApiError> {
        self.send_calls.lock().unwrap().push(SendCall {
            content: content.to_string(),
            session_id: session_id.map(ToString::to_string),
            context: context.map(ToString::to_string),
        });
        self.send_started.notify_one();

        let reply = self.streams.lock().unwrap().pop_front();
        match reply {
            Some(StreamReply::Chunks(chunks)) => {
                Ok(futures::stream::iter(chunks.into_iter().map(Ok)).boxed())
            }
            Some(StreamReply::Channel(rx)) => Ok(ReceiverStream::new(rx).boxed()),
            Some(StreamReply::Error(e)) => Err(e),
            Some(StreamReply::Hang) => futures::future::pending().await,
            None => Err(ApiError::network("No mock stream queued")),
        }
    }

    async fn get_session_with_messages(
        &self,
        session_id: &str,
    ) -> Result<SessionWithMessages, ApiError> {
        self.history_calls
            .lock()
            .unwrap()
            .push(session_id.to_string());
        self.histories
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(SessionWithMessages {
                    session: Session::with_id(session_id),
                    messages: Vec::new(),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_replays_queue() {
        let mock = MockTransport::new();
        mock.queue_text_reply(&["a", "b"]);

        let stream = mock.send_message("hi", None, None).await.unwrap();
        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(chunks.len(), 3);

        // Nothing queued: errors, and history defaults to empty
        assert!(mock.send_message("again", None, None).await.is_err());
        assert!(mock.create_session().await.is_err());
        let history = mock.get_session_with_messages("s").await.unwrap();
        assert!(history.messages.is_empty());

        assert_eq!(mock.send_calls().len(), 2);
        assert_eq!(mock.create_session_calls(), 1);
        assert_eq!(mock.history_calls(), vec!["s".to_string()]);
    }
}
