//! Chat widget conversation core
//!
//! Drives a conversation against a remote streaming chat API: optimistic
//! message appends, lazy session creation, streamed reply assembly and
//! reconciliation with server-side history. Rendering is left to the host;
//! it reads [`ConversationState`] snapshots and calls into the
//! [`ConversationManager`].

pub mod config;
pub mod conversation;
pub mod stream;
pub mod transport;

pub use config::{ClientConfig, ConfigError, WidgetConfig};
pub use conversation::{
    Callbacks, ConversationManager, ConversationState, InitialSend, Message, Role, SendOutcome,
};
pub use transport::{ApiClient, ApiError, ApiErrorKind, ChatTransport, LoggingTransport};
