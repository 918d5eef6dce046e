//! History reconciliation
//!
//! Deciding whether to fetch a session's history, and merging what the
//! server returns with messages already shown locally. Both are pure; the
//! manager performs the fetch.

use super::message::{Message, Role};
use super::state::{ConversationState, Latches};
use std::collections::HashSet;

/// What to do about history for the current session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryPlan {
    /// A send or stream is in flight; fetching now could stomp on tokens
    Busy,
    /// Nothing to load
    NoSession,
    /// This session was already tried
    AlreadyAttempted,
    /// Created by us moments ago; the server has nothing we don't
    FreshSession(String),
    Fetch(String),
}

pub(crate) fn plan_history_load(
    state: &ConversationState,
    latches: &Latches,
    session_id: Option<&str>,
) -> HistoryPlan {
    if state.is_loading || latches.streaming {
        return HistoryPlan::Busy;
    }
    let Some(session_id) = session_id else {
        return HistoryPlan::NoSession;
    };
    if latches.last_attempted_session.as_deref() == Some(session_id) {
        return HistoryPlan::AlreadyAttempted;
    }
    if latches.internally_created.contains(session_id)
        && !state.messages.is_empty()
        && !latches.history_loaded
    {
        return HistoryPlan::FreshSession(session_id.to_string());
    }
    HistoryPlan::Fetch(session_id.to_string())
}

/// Merge fetched history into the local list.
///
/// Fetched messages are kept (first copy of each id). A local message is
/// dropped when the server already has its id, or has a message with the
/// same role and trimmed content under another id. The latter catches a
/// message sent locally and echoed back with a server-assigned id; it also
/// collapses a legitimately repeated identical message, which is the accepted
/// cost of the heuristic. The result is sorted by timestamp, oldest first,
/// keeping relative order for equal timestamps.
pub fn merge_history(local: &[Message], fetched: Vec<Message>) -> Vec<Message> {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut merged: Vec<Message> = Vec::with_capacity(fetched.len() + local.len());

    for message in fetched {
        if seen_ids.insert(message.id.clone()) {
            merged.push(message);
        }
    }

    let fetched_keys: HashSet<(Role, String)> = merged
        .iter()
        .map(|m| (m.role, m.content.trim().to_string()))
        .collect();

    for message in local {
        let (role, content) = message.content_key();
        if seen_ids.contains(&message.id) || fetched_keys.contains(&(role, content.to_string())) {
            continue;
        }
        seen_ids.insert(message.id.clone());
        merged.push(message.clone());
    }

    merged.sort_by_key(|m| m.timestamp);
    merged
}
