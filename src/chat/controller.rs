use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::chat::event::{ChatEvent, Completion};
use crate::chat::lifecycle::RequestTracker;
use crate::core::backend::{AnswerBackend, REQUEST_FAILED_NOTICE};
use crate::core::error::{ChatError, RequestError};
use crate::core::message::Message;
use crate::core::session::ChatId;
use crate::storage::SessionStore;

/// Owns every piece of mutable chat state: the persisted sessions, the
/// per-session request table, transient notices and the active session.
///
/// All methods run on the UI task. Requests run on spawned tasks that only
/// report back through the `ChatEvent` channel.
pub struct ChatController {
    store: SessionStore,
    requests: RequestTracker,
    notices: HashMap<ChatId, Vec<String>>,
    active: Option<ChatId>,
    backend: Arc<dyn AnswerBackend>,
    events: mpsc::Sender<ChatEvent>,
}

impl ChatController {
    pub fn new(
        store: SessionStore,
        backend: Arc<dyn AnswerBackend>,
    ) -> (Self, mpsc::Receiver<ChatEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let controller = Self {
            store,
            requests: RequestTracker::new(),
            notices: HashMap::new(),
            active: None,
            backend,
            events: tx,
        };
        (controller, rx)
    }

    /// Startup: show the most recent session, or start a fresh one.
    pub async fn init(&mut self) {
        match self.store.order().first() {
            Some(first) => self.active = Some(first.clone()),
            None => {
                self.new_chat().await;
            }
        }
    }

    /// Start a new, empty session and make it active. An active session
    /// that is still empty is reused.
    pub async fn new_chat(&mut self) -> ChatId {
        if let Some(id) = self.active.clone() {
            if self.store.contains(&id) && self.store.is_empty_session(&id) {
                self.store.bump_to_top(&id).await;
                return id;
            }
        }
        let id = self.store.create().await;
        self.active = Some(id.clone());
        id
    }

    /// Send a question from the active session, creating one if needed.
    /// Blank input is ignored.
    pub async fn submit(&mut self, input: &str) -> Option<ChatId> {
        let question = input.trim();
        if question.is_empty() {
            return None;
        }

        let id = match self.active.clone() {
            Some(id) if self.store.contains(&id) => id,
            _ => self.new_chat().await,
        };

        self.store.append(&id, Message::user(question)).await;
        self.store.bump_to_top(&id).await;
        self.store.set_default_title(&id, question).await;
        self.notices.remove(&id);

        let (ticket, cancel) = self.requests.begin(&id);
        tracing::debug!(chat = %id, "question submitted");

        let backend = Arc::clone(&self.backend);
        let tx = self.events.clone();
        let chat_id = id.clone();
        let question = question.to_string();
        tokio::spawn(async move {
            let outcome = ask_with(backend.as_ref(), &question, &cancel).await;
            let _ = tx
                .send(ChatEvent::Answered {
                    chat_id,
                    ticket,
                    outcome,
                })
                .await;
        });

        Some(id)
    }

    /// Cancel the session's outstanding request and return it to Idle.
    pub fn cancel(&mut self, id: &ChatId) -> bool {
        self.requests.cancel(id)
    }

    /// Apply a finished request to its session.
    pub async fn apply(&mut self, event: ChatEvent) -> Completion {
        let ChatEvent::Answered {
            chat_id,
            ticket,
            outcome,
        } = event;

        // Cancelling, superseding and deleting all retire the ticket, so a
        // completion that is still current was never cancelled by the user.
        if !self.requests.finish(&chat_id, ticket) {
            tracing::debug!(chat = %chat_id, "dropping stale response");
            return Completion::Stale;
        }

        match outcome {
            Ok(answer) => {
                self.store.append(&chat_id, Message::bot(answer.clone())).await;
                Completion::Answered(answer)
            }
            Err(RequestError::Cancelled) => Completion::Cancelled,
            Err(e) => {
                tracing::error!(chat = %chat_id, error = %e, "error fetching bot response");
                self.notices
                    .entry(chat_id)
                    .or_default()
                    .push(REQUEST_FAILED_NOTICE.to_string());
                Completion::Failed(e)
            }
        }
    }

    /// Point the view at another session. Request state is untouched.
    pub fn switch_to(&mut self, id: &ChatId) -> Result<(), ChatError> {
        if !self.store.contains(id) {
            return Err(ChatError::SessionNotFound(id.to_string()));
        }
        self.active = Some(id.clone());
        Ok(())
    }

    pub async fn rename(&mut self, id: &ChatId, title: &str) -> bool {
        self.store.rename(id, title).await
    }

    /// Delete a session, cancelling its request. Deleting the active
    /// session leaves no session active.
    pub async fn delete(&mut self, id: &ChatId) -> bool {
        self.requests.cancel(id);
        self.notices.remove(id);
        let existed = self.store.delete(id).await;
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
        existed
    }

    pub fn active(&self) -> Option<&ChatId> {
        self.active.as_ref()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn is_awaiting(&self, id: &ChatId) -> bool {
        self.requests.is_awaiting(id)
    }

    /// Whether the session on screen has a request outstanding.
    pub fn active_is_awaiting(&self) -> bool {
        self.active.as_ref().is_some_and(|id| self.is_awaiting(id))
    }

    pub fn requests(&self) -> &RequestTracker {
        &self.requests
    }

    pub fn notices(&self, id: &ChatId) -> &[String] {
        self.notices.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn backend_name(&self) -> &str {
        self.backend.describe()
    }
}

/// Checks the token before touching the network, then defers to the backend.
async fn ask_with(
    backend: &dyn AnswerBackend,
    question: &str,
    cancel: &CancellationToken,
) -> Result<String, RequestError> {
    if cancel.is_cancelled() {
        return Err(RequestError::Cancelled);
    }
    backend.ask(question, cancel).await
}
