//! Conversation manager

use super::history::{merge_history, plan_history_load, HistoryPlan};
use super::message::Message;
use super::policy::{plan_initial_send, InitialSend};
use super::state::{ConversationState, Latches};
use crate::config::WidgetConfig;
use crate::stream::{parse_stream_line, LineDecoder, StreamEvent};
use crate::transport::{ApiError, ChatTransport};
use futures::StreamExt;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

type SessionCreatedFn = dyn Fn(&str) + Send + Sync;
type MessageFn = dyn Fn(&Message) + Send + Sync;
type ErrorFn = dyn Fn(&ApiError) + Send + Sync;

/// Host hooks, invoked outside the state lock
#[derive(Clone, Default)]
pub struct Callbacks {
    on_session_created: Option<Arc<SessionCreatedFn>>,
    on_message: Option<Arc<MessageFn>>,
    on_error: Option<Arc<ErrorFn>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the id of each session this manager creates
    #[must_use]
    pub fn on_session_created(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_session_created = Some(Arc::new(f));
        self
    }

    /// Called with each completed assistant reply
    #[must_use]
    pub fn on_message(mut self, f: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }

    /// Called when a send fails
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&ApiError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_session_created", &self.on_session_created.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Result of a `send_message` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank content, or another send was in flight
    Ignored,
    /// Final assistant reply
    Completed(Message),
    /// The error is also stored in the state and passed to `on_error`
    Failed(ApiError),
}

struct Inner {
    state: ConversationState,
    latches: Latches,
    /// Session id supplied by the host, consulted when the manager has none
    external_session_id: Option<String>,
    initial: InitialSend,
}

impl Inner {
    fn effective_session_id(&self) -> Option<String> {
        self.state
            .session_id
            .clone()
            .or_else(|| self.external_session_id.clone())
    }
}

struct Reply {
    message: Message,
    session_id: String,
}

/// Owns one conversation: messages, session identity, loading and error
/// flags. At most one send is in flight at a time.
pub struct ConversationManager<T: ChatTransport> {
    transport: T,
    callbacks: Callbacks,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ConversationState>,
}

impl<T: ChatTransport> ConversationManager<T> {
    pub fn new(transport: T, config: &WidgetConfig, callbacks: Callbacks) -> Self {
        let initial = InitialSend {
            message: config.initial_message.clone(),
            context: config.initial_context.clone(),
            quick_questions: config.quick_questions.clone(),
        };
        let state = ConversationState {
            session_id: config.session_id.clone(),
            ..ConversationState::default()
        };
        let (state_tx, _) = watch::channel(state.clone());

        Self {
            transport,
            callbacks,
            inner: Mutex::new(Inner {
                state,
                latches: Latches::default(),
                external_session_id: config.session_id.clone(),
                initial,
            }),
            state_tx,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ------------------------------------------------------------------
    // State access
    // ------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate under the lock and republish. The lock never spans an await.
    fn update<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.lock();
        let result = f(&mut inner);
        self.state_tx.send_replace(inner.state.clone());
        result
    }

    /// Receive a fresh snapshot after every mutation
    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> ConversationState {
        self.lock().state.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().state.messages.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().state.is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.lock().state.error.clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.lock().state.session_id.clone()
    }

    pub fn is_open(&self) -> bool {
        self.lock().state.is_open
    }

    pub fn has_session_started(&self) -> bool {
        self.lock().state.has_session_started
    }

    pub fn has_existing_messages(&self) -> bool {
        self.lock().state.has_existing_messages
    }

    pub fn clear_error(&self) {
        self.update(|inner| inner.state.error = None);
    }

    pub fn set_open(&self, open: bool) {
        self.update(|inner| inner.state.is_open = open);
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Mount: load history for a pre-supplied session, then auto-send the
    /// initial message if the policy allows.
    pub async fn start(&self) -> SendOutcome {
        self.reconcile_history().await;
        self.send_initial_if_due().await
    }

    /// The host changed its session id.
    ///
    /// A different id that this manager did not create itself replaces the
    /// conversation: messages and history markers are reset before the new
    /// session's history loads. An id we created is adopted as-is.
    pub async fn set_external_session_id(&self, session_id: Option<String>) -> SendOutcome {
        self.update(|inner| {
            let Some(id) = session_id.filter(|id| !id.is_empty()) else {
                inner.external_session_id = None;
                return;
            };
            inner.external_session_id = Some(id.clone());
            if inner.state.session_id.as_deref() == Some(id.as_str()) {
                return;
            }
            if inner.latches.internally_created.contains(&id) {
                tracing::debug!(session_id = %id, "Adopting internally created session");
            } else {
                tracing::info!(session_id = %id, "Switching to externally supplied session");
                inner.state.messages.clear();
                inner.state.has_existing_messages = false;
                inner.latches.history_loaded = false;
                inner.latches.last_attempted_session = None;
            }
            inner.state.session_id = Some(id);
        });

        self.reconcile_history().await;
        self.send_initial_if_due().await
    }

    /// Replace the initial-send options. Re-running this with the same values
    /// any number of times sends at most one initial message per manager.
    pub async fn reconfigure(&self, initial: InitialSend) -> SendOutcome {
        self.update(|inner| inner.initial = initial);
        self.send_initial_if_due().await
    }

    /// Send the configured initial message if it is due. Latched: fires at
    /// most once per manager.
    pub async fn send_initial_if_due(&self) -> SendOutcome {
        // Decide, latch and claim the send slot under one lock
        let due = self.update(|inner| {
            let session_id = inner.effective_session_id();
            let (message, context) = plan_initial_send(
                &inner.initial,
                &inner.state,
                &inner.latches,
                session_id.as_deref(),
            )?;
            let message = message.trim().to_string();
            let known_session = begin_send(inner, &message)?;
            inner.latches.initial_message_sent = true;
            Some((message, context, known_session))
        });

        match due {
            Some((message, context, known_session)) => {
                tracing::debug!(has_context = context.is_some(), "Sending initial message");
                self.drive_send(&message, context.as_deref(), known_session)
                    .await
            }
            None => SendOutcome::Ignored,
        }
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Load the current session's history and merge it into the local list.
    ///
    /// Safe to call at any time: it skips for a session already attempted
    /// and for a session we just created. While a send is in flight it is
    /// deferred and rerun when the send finishes.
    pub async fn reconcile_history(&self) -> HistoryPlan {
        let plan = self.update(|inner| {
            let session_id = inner.effective_session_id();
            let plan = plan_history_load(&inner.state, &inner.latches, session_id.as_deref());
            match &plan {
                HistoryPlan::NoSession => {
                    inner.latches.history_loaded = true;
                    inner.latches.last_attempted_session = None;
                    inner.state.has_existing_messages = false;
                }
                HistoryPlan::FreshSession(id) => {
                    inner.latches.last_attempted_session = Some(id.clone());
                    inner.latches.history_loaded = true;
                }
                HistoryPlan::Fetch(id) => {
                    inner.latches.last_attempted_session = Some(id.clone());
                    inner.latches.loading_history = true;
                }
                HistoryPlan::Busy => inner.latches.history_deferred = true,
                HistoryPlan::AlreadyAttempted => {}
            }
            plan
        });

        let HistoryPlan::Fetch(session_id) = &plan else {
            tracing::debug!(?plan, "Skipping history load");
            return plan;
        };

        let result = self.transport.get_session_with_messages(session_id).await;

        self.update(|inner| {
            inner.latches.loading_history = false;
            inner.latches.history_loaded = true;

            if inner.effective_session_id().as_deref() != Some(session_id.as_str()) {
                tracing::debug!(session_id = %session_id, "Session changed during history load; discarding");
                return;
            }

            match result {
                Ok(history) if !history.messages.is_empty() => {
                    let fetched: Vec<Message> = history
                        .messages
                        .into_iter()
                        .map(|wire| Message::from_wire(wire, session_id))
                        .collect();
                    let count = fetched.len();
                    inner.state.messages = merge_history(&inner.state.messages, fetched);
                    inner.state.has_existing_messages = true;
                    inner.state.has_session_started = true;
                    tracing::debug!(session_id = %session_id, fetched = count, total = inner.state.messages.len(), "Merged session history");
                }
                Ok(_) => {
                    // Keep whatever was appended optimistically
                    inner.state.has_existing_messages = false;
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!(session_id = %session_id, "Session not found; a new one will be created on next send");
                    inner.state.session_id = None;
                    inner.external_session_id = None;
                    inner.latches.last_attempted_session = None;
                    inner.state.has_existing_messages = false;
                }
                Err(e) => {
                    tracing::warn!(session_id = %session_id, error = %e, "Failed to load session history");
                    inner.state.has_existing_messages = false;
                }
            }
        });

        plan
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    /// Send a user message and stream the reply into the message list.
    ///
    /// Ignored when `content` is blank or a send is already in flight. The
    /// user message is appended before any network call and stays visible
    /// if the send fails. There is no timeout of its own: a transport that
    /// never answers keeps `is_loading` set.
    pub async fn send_message(&self, content: &str, context: Option<&str>) -> SendOutcome {
        let content = content.trim();
        if content.is_empty() {
            return SendOutcome::Ignored;
        }

        let Some(known_session) = self.update(|inner| begin_send(inner, content)) else {
            tracing::debug!("Send ignored: another send is in flight");
            return SendOutcome::Ignored;
        };
        self.drive_send(content, context, known_session).await
    }

    /// Everything after the send has been claimed by `begin_send`
    async fn drive_send(
        &self,
        content: &str,
        context: Option<&str>,
        known_session: Option<String>,
    ) -> SendOutcome {
        let mut created_session = None;
        let result = self
            .run_send(content, context, known_session, &mut created_session)
            .await;

        // Only a session this call created is committed, and only if the
        // host has not switched to another one in the meantime
        let session_changed = self.update(|inner| match created_session {
            Some(id) if inner.state.session_id.is_none() => {
                inner.state.session_id = Some(id);
                true
            }
            Some(id) => {
                tracing::debug!(session_id = %id, "Session switched during send; not committing");
                false
            }
            None => false,
        });

        let outcome = match result {
            Ok(reply) => {
                tracing::info!(
                    session_id = %reply.session_id,
                    reply_len = reply.message.content.len(),
                    "Reply completed"
                );
                if let Some(on_message) = &self.callbacks.on_message {
                    on_message(&reply.message);
                }
                SendOutcome::Completed(reply.message)
            }
            Err(e) => {
                tracing::error!(error = %e, kind = ?e.kind, "Send failed");
                self.update(|inner| inner.state.error = Some(e.message.clone()));
                if let Some(on_error) = &self.callbacks.on_error {
                    on_error(&e);
                }
                SendOutcome::Failed(e)
            }
        };

        let deferred = self.update(|inner| {
            inner.latches.streaming = false;
            inner.state.is_loading = false;
            std::mem::take(&mut inner.latches.history_deferred)
        });

        if session_changed || deferred {
            self.reconcile_history().await;
        }

        outcome
    }

    async fn run_send(
        &self,
        content: &str,
        context: Option<&str>,
        known_session: Option<String>,
        created_session: &mut Option<String>,
    ) -> Result<Reply, ApiError> {
        let session_id = if let Some(id) = known_session {
            self.update(|inner| {
                if inner.state.session_id.as_deref() != Some(id.as_str()) {
                    inner.state.session_id = Some(id.clone());
                }
            });
            id
        } else {
            let session = self.transport.create_session().await?;
            let id = session.id;
            self.update(|inner| inner.latches.internally_created.insert(id.clone()));
            *created_session = Some(id.clone());
            if let Some(on_session_created) = &self.callbacks.on_session_created {
                on_session_created(&id);
            }
            id
        };

        self.update(|inner| inner.latches.streaming = true);
        let mut body = self
            .transport
            .send_message(content, Some(&session_id), context)
            .await?;

        let mut reply = Message::assistant_placeholder(Some(session_id.clone()));
        self.update(|inner| {
            if shows_session(&inner.state, &session_id) {
                inner.state.messages.push(reply.clone());
            }
        });

        let mut decoder = LineDecoder::new();
        let mut finished = false;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for line in decoder.push(&chunk) {
                self.apply_frame(&line, &mut reply, &mut finished);
            }
        }
        for line in decoder.finish() {
            self.apply_frame(&line, &mut reply, &mut finished);
        }

        Ok(Reply {
            message: reply,
            session_id,
        })
    }

    /// Apply one line of the reply body. After `done`, the rest of the body
    /// is drained but ignored.
    fn apply_frame(&self, line: &str, reply: &mut Message, finished: &mut bool) {
        if *finished {
            return;
        }
        match parse_stream_line(line) {
            Some(StreamEvent::Text { text, .. }) if !text.is_empty() => {
                reply.content.push_str(&text);
                self.update(|inner| {
                    let shown = match reply.session_id.as_deref() {
                        Some(id) => shows_session(&inner.state, id),
                        None => true,
                    };
                    if shown {
                        inner.state.apply_reply(reply);
                    }
                });
            }
            Some(StreamEvent::Done { .. }) => *finished = true,
            Some(StreamEvent::Text { .. }) | None => {}
        }
    }
}

/// Claim the send slot and append the user message. Returns the session
/// known at this point (possibly none), or `None` if a send is in flight.
fn begin_send(inner: &mut Inner, content: &str) -> Option<Option<String>> {
    if inner.state.is_loading {
        return None;
    }
    inner.state.is_loading = true;
    inner.state.error = None;
    let user = Message::user(content, inner.state.session_id.clone());
    inner.state.messages.push(user);
    inner.state.has_session_started = true;
    Some(inner.effective_session_id())
}

/// Replies only land in the list while their session is the one shown. A
/// session still being created shows as none.
fn shows_session(state: &ConversationState, session_id: &str) -> bool {
    match state.session_id.as_deref() {
        None => true,
        Some(current) => current == session_id,
    }
}
