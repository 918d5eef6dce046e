//! Initial-message auto-send policy

use super::state::{ConversationState, Latches};

/// Sent when only an initial context is configured
pub const DEFAULT_GREETING: &str = "Hi";

/// Host-supplied options that drive the automatic first message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitialSend {
    pub message: Option<String>,
    pub context: Option<String>,
    /// A non-empty list waits for the user to pick a question instead
    pub quick_questions: Vec<String>,
}

impl InitialSend {
    /// Message and context to send, if either is configured.
    ///
    /// A message alone is sent verbatim without context; a context alone is
    /// sent with [`DEFAULT_GREETING`].
    pub fn payload(&self) -> Option<(String, Option<String>)> {
        match (present(self.message.as_deref()), present(self.context.as_deref())) {
            (Some(message), context) => {
                Some((message.to_string(), context.map(ToString::to_string)))
            }
            (None, Some(context)) => Some((DEFAULT_GREETING.to_string(), Some(context.to_string()))),
            (None, None) => None,
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Decide whether the initial message should go out now.
///
/// Fires only after history has settled, when the session has no server
/// history, nothing is in flight, no quick-question menu is configured, and
/// it has not fired before.
pub(crate) fn plan_initial_send(
    initial: &InitialSend,
    state: &ConversationState,
    latches: &Latches,
    session_id: Option<&str>,
) -> Option<(String, Option<String>)> {
    let no_history = session_id.is_none() || !state.has_existing_messages;
    let ready = latches.history_loaded
        && !latches.loading_history
        && !latches.initial_message_sent
        && !state.is_loading;

    if !ready || !no_history || !initial.quick_questions.is_empty() {
        return None;
    }
    initial.payload()
}
