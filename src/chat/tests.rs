use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::core::backend::{AnswerBackend, REQUEST_FAILED_NOTICE};
use crate::core::error::{ChatError, RequestError};
use crate::core::message::Message;
use crate::core::session::ChatId;
use crate::storage::memory::MemoryStore;
use crate::storage::SessionStore;

/// Always returns the same outcome.
struct FixedBackend {
    outcome: Result<String, RequestError>,
    calls: AtomicUsize,
}

impl FixedBackend {
    fn answering(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(answer.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(err: RequestError) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(err),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl AnswerBackend for FixedBackend {
    async fn ask(&self, _question: &str, _cancel: &CancellationToken) -> Result<String, RequestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }

    fn describe(&self) -> &str {
        "fixed"
    }
}

/// Holds every request until a permit is released, and ignores
/// cancellation, so responses can arrive after the user cancelled.
struct GatedBackend {
    gate: Arc<Semaphore>,
}

impl GatedBackend {
    fn new() -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (Arc::new(Self { gate: gate.clone() }), gate)
    }
}

#[async_trait]
impl AnswerBackend for GatedBackend {
    async fn ask(&self, question: &str, _cancel: &CancellationToken) -> Result<String, RequestError> {
        self.gate.acquire().await.unwrap().forget();
        Ok(format!("answer to {question}"))
    }

    fn describe(&self) -> &str {
        "gated"
    }
}

async fn controller(backend: Arc<dyn AnswerBackend>) -> (ChatController, mpsc::Receiver<ChatEvent>) {
    let store = SessionStore::load(Arc::new(MemoryStore::new()), 40).await;
    ChatController::new(store, backend)
}

async fn next_event(rx: &mut mpsc::Receiver<ChatEvent>) -> ChatEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for response")
        .expect("channel closed")
}

#[tokio::test]
async fn test_init_creates_session_when_empty() {
    let (mut chat, _rx) = controller(FixedBackend::answering("a")).await;
    chat.init().await;

    let active = chat.active().cloned().unwrap();
    assert_eq!(chat.store().order(), &[active.clone()]);
    assert!(chat.store().messages(&active).is_empty());
    assert!(chat.store().sidebar().is_empty());
}

#[tokio::test]
async fn test_init_selects_most_recent_session() {
    let kv = Arc::new(MemoryStore::new());
    let (first, second) = {
        let mut store = SessionStore::load(kv.clone(), 40).await;
        let first = store.create().await;
        let second = store.create().await;
        store.append(&first, Message::user("old")).await;
        store.append(&second, Message::user("new")).await;
        (first, second)
    };

    let store = SessionStore::load(kv, 40).await;
    let (mut chat, _rx) = ChatController::new(store, FixedBackend::answering("a"));
    chat.init().await;

    assert_eq!(chat.active(), Some(&second));
    assert_eq!(chat.store().order().len(), 2);
    assert!(chat.store().contains(&first));
}

#[tokio::test]
async fn test_submit_without_active_session_creates_one() {
    let (mut chat, mut rx) = controller(FixedBackend::answering("Paris")).await;
    assert!(chat.active().is_none());

    let id = chat.submit("Capital of France?").await.unwrap();

    assert_eq!(chat.active(), Some(&id));
    assert_eq!(chat.store().order().first(), Some(&id));
    assert!(chat.is_awaiting(&id));
    assert_eq!(chat.store().title(&id), Some("Capital of France?"));

    let completion = chat.apply(next_event(&mut rx).await).await;
    assert_eq!(completion, Completion::Answered("Paris".into()));
    assert!(!chat.is_awaiting(&id));
    assert_eq!(
        chat.store().messages(&id),
        &[Message::user("Capital of France?"), Message::bot("Paris")]
    );
}

#[tokio::test]
async fn test_blank_submit_is_ignored() {
    let backend = FixedBackend::answering("x");
    let (mut chat, _rx) = controller(backend.clone()).await;

    assert!(chat.submit("   \n\t").await.is_none());
    assert!(chat.active().is_none());
    assert!(chat.store().order().is_empty());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_submit_trims_and_bumps_session_to_top() {
    let (mut chat, mut rx) = controller(FixedBackend::answering("ok")).await;
    let older = chat.submit("first chat").await.unwrap();
    chat.apply(next_event(&mut rx).await).await;

    let newer = chat.new_chat().await;
    chat.submit("second chat").await;
    chat.apply(next_event(&mut rx).await).await;
    assert_eq!(chat.store().order(), &[newer.clone(), older.clone()]);

    chat.switch_to(&older).unwrap();
    chat.submit("  back to the first  ").await;
    assert_eq!(chat.store().order(), &[older.clone(), newer]);
    assert_eq!(
        chat.store().messages(&older).last(),
        Some(&Message::user("back to the first"))
    );
    // Title stays the first question
    assert_eq!(chat.store().title(&older), Some("first chat"));
}

#[tokio::test]
async fn test_cancel_suppresses_late_response() {
    let (backend, gate) = GatedBackend::new();
    let (mut chat, mut rx) = controller(backend).await;

    let id = chat.submit("slow question").await.unwrap();
    assert!(chat.is_awaiting(&id));

    assert!(chat.cancel(&id));
    assert!(!chat.is_awaiting(&id));

    // The server answers anyway
    gate.add_permits(1);
    let completion = chat.apply(next_event(&mut rx).await).await;

    assert_eq!(completion, Completion::Stale);
    assert_eq!(chat.store().messages(&id), &[Message::user("slow question")]);
    assert!(chat.notices(&id).is_empty());
}

#[tokio::test]
async fn test_failure_adds_notice_not_message() {
    let (mut chat, mut rx) = controller(FixedBackend::failing(RequestError::Status {
        status: 500,
        message: "boom".into(),
    }))
    .await;

    let id = chat.submit("q").await.unwrap();
    let completion = chat.apply(next_event(&mut rx).await).await;

    assert!(matches!(completion, Completion::Failed(RequestError::Status { status: 500, .. })));
    assert_eq!(chat.store().messages(&id), &[Message::user("q")]);
    assert_eq!(chat.notices(&id), &[REQUEST_FAILED_NOTICE.to_string()]);
    assert!(!chat.is_awaiting(&id));
}

#[tokio::test]
async fn test_notices_clear_on_next_question() {
    let (mut chat, mut rx) =
        controller(FixedBackend::failing(RequestError::Transport("refused".into()))).await;

    let id = chat.submit("q1").await.unwrap();
    chat.apply(next_event(&mut rx).await).await;
    assert_eq!(chat.notices(&id).len(), 1);

    chat.submit("q2").await;
    assert!(chat.notices(&id).is_empty());
}

#[tokio::test]
async fn test_backend_cancellation_adds_nothing() {
    let (mut chat, mut rx) = controller(FixedBackend::failing(RequestError::Cancelled)).await;

    let id = chat.submit("q").await.unwrap();
    let completion = chat.apply(next_event(&mut rx).await).await;

    assert_eq!(completion, Completion::Cancelled);
    assert!(chat.notices(&id).is_empty());
    assert_eq!(chat.store().messages(&id).len(), 1);
    assert!(!chat.is_awaiting(&id));
}

#[tokio::test]
async fn test_new_request_supersedes_outstanding_one() {
    let (backend, gate) = GatedBackend::new();
    let (mut chat, mut rx) = controller(backend).await;

    let id = chat.submit("first").await.unwrap();
    let first_token = chat.requests().token(&id).cloned().unwrap();
    chat.submit("second").await;
    assert!(first_token.is_cancelled());
    assert!(chat.is_awaiting(&id));

    gate.add_permits(2);
    let a = chat.apply(next_event(&mut rx).await).await;
    let b = chat.apply(next_event(&mut rx).await).await;

    let mut completions = vec![a, b];
    completions.sort_by_key(|c| matches!(c, Completion::Answered(_)));
    assert_eq!(
        completions,
        vec![Completion::Stale, Completion::Answered("answer to second".into())]
    );
    assert_eq!(
        chat.store().messages(&id),
        &[
            Message::user("first"),
            Message::user("second"),
            Message::bot("answer to second")
        ]
    );
    assert!(!chat.is_awaiting(&id));
}

#[tokio::test]
async fn test_switching_preserves_awaiting_state() {
    let (backend, gate) = GatedBackend::new();
    let (mut chat, mut rx) = controller(backend).await;

    let a = chat.submit("question in a").await.unwrap();
    let token_a = chat.requests().token(&a).cloned().unwrap();

    let b = chat.new_chat().await;
    assert_eq!(chat.active(), Some(&b));
    assert!(!chat.active_is_awaiting());
    assert!(chat.is_awaiting(&a));

    chat.switch_to(&a).unwrap();
    assert!(chat.active_is_awaiting());
    assert!(!token_a.is_cancelled());

    gate.add_permits(1);
    let completion = chat.apply(next_event(&mut rx).await).await;
    assert_eq!(completion, Completion::Answered("answer to question in a".into()));
    assert!(!chat.active_is_awaiting());
}

#[tokio::test]
async fn test_response_lands_in_origin_session_after_switch() {
    let (backend, gate) = GatedBackend::new();
    let (mut chat, mut rx) = controller(backend).await;

    let a = chat.submit("from a").await.unwrap();
    let b = chat.new_chat().await;

    gate.add_permits(1);
    chat.apply(next_event(&mut rx).await).await;

    assert_eq!(chat.active(), Some(&b));
    assert!(chat.store().messages(&b).is_empty());
    assert_eq!(chat.store().messages(&a).len(), 2);
}

#[tokio::test]
async fn test_rename_keeps_messages_and_order() {
    let (mut chat, mut rx) = controller(FixedBackend::answering("a")).await;
    let id = chat.submit("q").await.unwrap();
    chat.apply(next_event(&mut rx).await).await;
    let other = chat.new_chat().await;
    chat.submit("q2").await;
    chat.apply(next_event(&mut rx).await).await;

    let order = chat.store().order().to_vec();
    let messages = chat.store().messages(&id).to_vec();

    assert!(chat.rename(&id, "Renamed").await);
    assert_eq!(chat.store().title(&id), Some("Renamed"));
    assert_eq!(chat.store().messages(&id), messages.as_slice());
    assert_eq!(chat.store().order(), order.as_slice());
    assert_eq!(chat.active(), Some(&other));
}

#[tokio::test]
async fn test_delete_active_session_clears_pointer() {
    let (mut chat, mut rx) = controller(FixedBackend::answering("a")).await;
    let id = chat.submit("q").await.unwrap();
    chat.apply(next_event(&mut rx).await).await;

    assert!(chat.delete(&id).await);
    assert!(chat.active().is_none());
    assert!(!chat.store().contains(&id));
    assert!(chat.store().sidebar().is_empty());
}

#[tokio::test]
async fn test_delete_cancels_outstanding_request() {
    let (backend, gate) = GatedBackend::new();
    let (mut chat, mut rx) = controller(backend).await;

    let id = chat.submit("q").await.unwrap();
    let token = chat.requests().token(&id).cloned().unwrap();
    chat.delete(&id).await;
    assert!(token.is_cancelled());

    gate.add_permits(1);
    assert_eq!(chat.apply(next_event(&mut rx).await).await, Completion::Stale);
    assert!(!chat.store().contains(&id));
}

#[tokio::test]
async fn test_delete_inactive_session_keeps_pointer() {
    let (mut chat, _rx) = controller(FixedBackend::answering("a")).await;
    let a = chat.submit("q").await.unwrap();
    let b = chat.new_chat().await;

    chat.delete(&a).await;
    assert_eq!(chat.active(), Some(&b));
}

#[tokio::test]
async fn test_new_chat_reuses_empty_active_session() {
    let (mut chat, _rx) = controller(FixedBackend::answering("a")).await;
    let first = chat.new_chat().await;
    let again = chat.new_chat().await;

    assert_eq!(first, again);
    assert_eq!(chat.store().order().len(), 1);
}

#[tokio::test]
async fn test_switch_to_unknown_session() {
    let (mut chat, _rx) = controller(FixedBackend::answering("a")).await;
    let err = chat.switch_to(&ChatId::from("missing")).unwrap_err();
    assert!(matches!(err, ChatError::SessionNotFound(id) if id == "missing"));
    assert!(chat.active().is_none());
}
