//! Conversation state and the manager's internal latches

use super::message::Message;
use serde::Serialize;
use std::collections::HashSet;

/// Observable state of one conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    /// Chronological, append-mostly
    pub messages: Vec<Message>,
    /// A send is in flight; further sends are ignored
    pub is_loading: bool,
    pub error: Option<String>,
    pub session_id: Option<String>,
    /// The server returned history for the current session
    pub has_existing_messages: bool,
    /// At least one message has been shown
    pub has_session_started: bool,
    pub is_open: bool,
}

impl ConversationState {
    /// Write the streamed content of `reply` into the list, re-appending it
    /// if a history merge displaced it.
    pub(crate) fn apply_reply(&mut self, reply: &Message) {
        match self.messages.iter_mut().find(|m| m.id == reply.id) {
            Some(existing) => existing.content.clone_from(&reply.content),
            None => self.messages.push(reply.clone()),
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Per-manager markers. Never shared between managers.
#[derive(Debug, Default)]
pub(crate) struct Latches {
    /// Sessions this manager created itself
    pub internally_created: HashSet<String>,
    /// Last session a history load was attempted for
    pub last_attempted_session: Option<String>,
    /// Set once the first reconciliation settled (or found no session)
    pub history_loaded: bool,
    pub loading_history: bool,
    /// A history load was skipped as busy; rerun it once the send settles
    pub history_deferred: bool,
    /// Reply body is being read
    pub streaming: bool,
    pub initial_message_sent: bool,
}
