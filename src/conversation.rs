//! Client-side conversation state
//!
//! The [`ConversationManager`] owns the message list and the session id. It
//! appends user messages optimistically, creates a session on first use,
//! assembles streamed replies, and reconciles local messages with the
//! server's history. Decisions that do not need I/O (history plan, merge,
//! initial-send policy) are pure functions beside it.

mod history;
mod manager;
mod message;
mod policy;
mod state;

#[cfg(test)]
mod proptests;

pub use history::{merge_history, HistoryPlan};
pub use manager::{Callbacks, ConversationManager, SendOutcome};
pub use message::{generate_id, Message, Role};
pub use policy::{InitialSend, DEFAULT_GREETING};
pub use state::ConversationState;
