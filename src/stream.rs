//! Streaming reply parsing
//!
//! The chat endpoint answers with newline-delimited `data:` frames:
//!
//! ```text
//! data: {"text":"Hel","sessionId":"s-1","type":"stream"}
//! data: {"text":"lo","sessionId":"s-1","type":"stream"}
//! data: [DONE]
//! ```
//!
//! [`LineDecoder`] reassembles lines from arbitrary byte chunks and
//! [`parse_stream_line`] turns one line into a [`StreamEvent`].

use serde::Deserialize;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// One decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Token fragment to append to the assistant reply
    Text {
        text: String,
        session_id: Option<String>,
    },
    /// End of the reply
    Done { session_id: Option<String> },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Frame {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    done: Option<serde_json::Value>,
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}

/// Parse one line of the reply body.
///
/// Returns `None` for lines that are not data frames, for frames typed as
/// something other than `stream` or `done`, and for frames that fail to
/// parse. A corrupt frame is logged and skipped so the rest of the
/// reply still applies.
pub fn parse_stream_line(line: &str) -> Option<StreamEvent> {
    let payload = line.trim_start().strip_prefix(DATA_PREFIX)?.trim();

    if payload.is_empty() || payload == DONE_SENTINEL {
        return Some(StreamEvent::Done { session_id: None });
    }

    let frame: Frame = match serde_json::from_str(payload) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, payload, "Failed to parse streaming frame");
            return None;
        }
    };

    if frame.done.as_ref().is_some_and(is_truthy) || frame.kind.as_deref() == Some("done") {
        return Some(StreamEvent::Done {
            session_id: frame.session_id.filter(|s| !s.is_empty()),
        });
    }

    // Untyped frames count as tokens; other typed frames (errors, status,
    // metadata) never reach the reply
    if let Some(kind) = frame.kind.as_deref().filter(|k| *k != "stream") {
        tracing::debug!(kind, "Ignoring non-stream frame");
        return None;
    }

    Some(StreamEvent::Text {
        text: frame.text.unwrap_or_default(),
        session_id: frame.session_id.filter(|s| !s.is_empty()),
    })
}

/// Splits a byte stream into lines.
///
/// Keeps the unterminated tail (including a UTF-8 sequence cut in half)
/// until the next chunk arrives.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning the non-blank lines it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };
        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        split_lines(&complete)
    }

    /// Flush whatever is left once the stream has ended
    pub fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.pending);
        split_lines(&rest)
    }
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(ToString::to_string)
        .collect()
}
