use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::KeyValueStore;
use crate::core::error::StorageError;
use crate::core::message::Message;
use crate::core::session::{default_title, is_unset_title, ChatId, UNTITLED};

pub const HISTORY_KEY: &str = "chatHistory";
pub const ORDER_KEY: &str = "chatOrder";
pub const TITLES_KEY: &str = "chatTitles";

/// All chat sessions, their display order and titles.
///
/// Every mutation writes the whole store back to the key-value backend
/// before returning. Write failures are logged and otherwise ignored.
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    history: BTreeMap<ChatId, Vec<Message>>,
    order: Vec<ChatId>,
    titles: BTreeMap<ChatId, String>,
    title_max_chars: usize,
}

impl SessionStore {
    /// Load the three persisted entries, falling back to empty state for
    /// anything missing or unreadable.
    pub async fn load(kv: Arc<dyn KeyValueStore>, title_max_chars: usize) -> Self {
        let history: BTreeMap<ChatId, Vec<Message>> = load_entry(kv.as_ref(), HISTORY_KEY).await;
        let order: Vec<ChatId> = load_entry(kv.as_ref(), ORDER_KEY).await;
        let titles: BTreeMap<ChatId, String> = load_entry(kv.as_ref(), TITLES_KEY).await;

        let mut store = Self {
            kv,
            history,
            order,
            titles,
            title_max_chars,
        };
        store.repair();
        tracing::debug!(
            sessions = store.history.len(),
            "loaded session store"
        );
        store
    }

    /// Drop order ids with no history, de-duplicate the order, and append
    /// sessions that were missing from it.
    fn repair(&mut self) {
        let mut seen = std::collections::HashSet::new();
        let before = self.order.len();
        self.order
            .retain(|id| self.history.contains_key(id) && seen.insert(id.clone()));
        if self.order.len() != before {
            tracing::warn!(
                dropped = before - self.order.len(),
                "dropped dangling or duplicate ids from chat order"
            );
        }
        for id in self.history.keys() {
            if !seen.contains(id) {
                self.order.push(id.clone());
            }
        }
    }

    /// Create an empty session at the top of the order list.
    pub async fn create(&mut self) -> ChatId {
        let mut id = ChatId::now();
        while self.history.contains_key(&id) {
            id = id.next();
        }
        self.history.insert(id.clone(), Vec::new());
        self.order.retain(|o| o != &id);
        self.order.insert(0, id.clone());
        self.persist().await;
        tracing::debug!(chat = %id, "created session");
        id
    }

    /// Append a message; returns `false` if the session does not exist.
    pub async fn append(&mut self, id: &ChatId, message: Message) -> bool {
        let Some(messages) = self.history.get_mut(id) else {
            tracing::debug!(chat = %id, "append to unknown session ignored");
            return false;
        };
        messages.push(message);
        self.persist().await;
        true
    }

    /// Set a new title. Blank titles are ignored.
    pub async fn rename(&mut self, id: &ChatId, title: &str) -> bool {
        let title = title.trim();
        if title.is_empty() || !self.history.contains_key(id) {
            return false;
        }
        self.titles.insert(id.clone(), title.to_string());
        self.persist().await;
        true
    }

    /// Remove a session with its title and order entry.
    pub async fn delete(&mut self, id: &ChatId) -> bool {
        let existed = self.history.remove(id).is_some();
        self.titles.remove(id);
        self.order.retain(|o| o != id);
        self.persist().await;
        if existed {
            tracing::debug!(chat = %id, "deleted session");
        }
        existed
    }

    /// Move a session to the front of the display order.
    pub async fn bump_to_top(&mut self, id: &ChatId) {
        if !self.history.contains_key(id) {
            return;
        }
        self.order.retain(|o| o != id);
        self.order.insert(0, id.clone());
        self.persist().await;
    }

    /// Title the session after its first question unless it already has one.
    pub async fn set_default_title(&mut self, id: &ChatId, question: &str) -> bool {
        if !self.history.contains_key(id) || !is_unset_title(self.title(id)) {
            return false;
        }
        self.titles
            .insert(id.clone(), default_title(question, self.title_max_chars));
        self.persist().await;
        true
    }

    pub fn contains(&self, id: &ChatId) -> bool {
        self.history.contains_key(id)
    }

    pub fn messages(&self, id: &ChatId) -> &[Message] {
        self.history.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty_session(&self, id: &ChatId) -> bool {
        self.messages(id).is_empty()
    }

    pub fn title(&self, id: &ChatId) -> Option<&str> {
        self.titles.get(id).map(String::as_str)
    }

    pub fn display_title(&self, id: &ChatId) -> &str {
        self.title(id).filter(|t| !t.is_empty()).unwrap_or(UNTITLED)
    }

    pub fn order(&self) -> &[ChatId] {
        &self.order
    }

    /// Ids shown in the sidebar: display order without empty sessions.
    pub fn sidebar(&self) -> Vec<&ChatId> {
        self.order
            .iter()
            .filter(|id| !self.is_empty_session(id))
            .collect()
    }

    async fn persist(&self) {
        if let Err(e) = self.try_persist().await {
            tracing::warn!(error = %e, "failed to persist chat sessions");
        }
    }

    async fn try_persist(&self) -> Result<(), StorageError> {
        self.kv.set(HISTORY_KEY, &to_json(&self.history)?).await?;
        self.kv.set(ORDER_KEY, &to_json(&self.order)?).await?;
        self.kv.set(TITLES_KEY, &to_json(&self.titles)?).await?;
        Ok(())
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

async fn load_entry<T: DeserializeOwned + Default>(kv: &dyn KeyValueStore, key: &str) -> T {
    let raw = match kv.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to read stored entry");
            return T::default();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(key, error = %e, "ignoring unreadable stored entry");
        T::default()
    })
}
