//! Manages the persisted conversation history.
use crate::error::{ChatError, Result};
use crate::store::{Store, HISTORY_KEY};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub const MAX_HISTORY_MESSAGES: usize = 20;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

/// A single chat message. Content is always plain text.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Parses the persisted envelope: a JSON array of user/assistant messages.
fn parse_persisted(raw: &str) -> Result<Vec<Message>> {
    let messages: Vec<Message> = serde_json::from_str(raw)?;
    if messages.iter().any(|m| m.role == Role::System) {
        return Err(ChatError::MalformedHistory(serde::de::Error::custom(
            "system message found in stored history",
        )));
    }
    Ok(messages)
}

/// Reads the stored history. Absent, corrupt, or wrongly shaped data yields
/// an empty sequence; more than `max_messages` entries keeps only the newest.
pub fn read_persisted(store: &dyn Store, max_messages: usize) -> Vec<Message> {
    let Some(raw) = store.get(HISTORY_KEY) else {
        return Vec::new();
    };
    match parse_persisted(&raw) {
        Ok(mut messages) => {
            truncate_front(&mut messages, max_messages.max(1));
            messages
        }
        Err(e) => {
            warn!(error = %e, "Discarding unreadable chat history");
            Vec::new()
        }
    }
}

fn truncate_front(messages: &mut Vec<Message>, max_messages: usize) {
    if messages.len() > max_messages {
        let excess = messages.len() - max_messages;
        messages.drain(..excess);
    }
}

/// Bounded, chronological log of user and assistant messages.
///
/// Every mutation rewrites the whole persisted snapshot. The in-memory
/// sequence is guarded by a mutex so each append is one atomic
/// mutate-and-persist step, even with overlapping submissions.
pub struct ConversationHistory {
    store: Arc<dyn Store>,
    max_messages: usize,
    messages: Mutex<Vec<Message>>,
}

impl ConversationHistory {
    pub fn load(store: Arc<dyn Store>, max_messages: usize) -> Self {
        let max_messages = max_messages.max(1);
        let messages = read_persisted(store.as_ref(), max_messages);
        info!(count = messages.len(), max_messages, "Loaded chat history");
        Self {
            store,
            max_messages,
            messages: Mutex::new(messages),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Vec<Message>> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn messages(&self) -> Vec<Message> {
        self.entries().clone()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Appends, evicts the oldest entries beyond the bound, persists, and
    /// returns the resulting sequence. System messages are never stored.
    pub fn append(&self, message: Message) -> Vec<Message> {
        let mut messages = self.entries();
        if message.role == Role::System {
            warn!("Refusing to store a system message in chat history");
            return messages.clone();
        }
        messages.push(message);
        truncate_front(&mut messages, self.max_messages);
        self.persist(&messages);
        messages.clone()
    }

    pub fn clear(&self) {
        let mut messages = self.entries();
        messages.clear();
        if let Err(e) = self.store.remove(HISTORY_KEY) {
            warn!(error = %e, "Failed to remove stored chat history");
        }
    }

    fn persist(&self, messages: &[Message]) {
        let result = serde_json::to_string(messages)
            .map_err(ChatError::from)
            .and_then(|json| self.store.set(HISTORY_KEY, &json));
        match result {
            Ok(()) => debug!(count = messages.len(), "Saved chat history"),
            Err(e) => warn!(error = %e, "Failed to save chat history, keeping it in memory only"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn history_with(store: &Arc<MemoryStore>, max: usize) -> ConversationHistory {
        ConversationHistory::load(store.clone(), max)
    }

    struct FailingStore;

    impl Store for FailingStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }
        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "quota exceeded").into())
        }
        fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn append_then_reload_keeps_last_message() {
        let store = Arc::new(MemoryStore::new());
        let history = history_with(&store, MAX_HISTORY_MESSAGES);
        history.append(Message::user("first"));
        history.append(Message::assistant("second"));

        let reloaded = read_persisted(store.as_ref(), MAX_HISTORY_MESSAGES);
        assert_eq!(reloaded.last(), Some(&Message::assistant("second")));
        assert_eq!(reloaded, history.messages());
    }

    #[test]
    fn reload_of_saved_history_is_identical() {
        let store = Arc::new(MemoryStore::new());
        let history = history_with(&store, MAX_HISTORY_MESSAGES);
        history.append(Message::user("What's good for oily skin?"));
        history.append(Message::assistant("Try a clay mask."));

        let first = read_persisted(store.as_ref(), MAX_HISTORY_MESSAGES);
        store
            .set(HISTORY_KEY, &serde_json::to_string(&first).unwrap())
            .unwrap();
        let second = read_persisted(store.as_ref(), MAX_HISTORY_MESSAGES);
        assert_eq!(first, second);
    }

    #[test]
    fn bound_keeps_the_most_recent_messages() {
        let store = Arc::new(MemoryStore::new());
        let history = history_with(&store, 5);
        let sent: Vec<Message> = (0..12).map(|i| Message::user(format!("m{i}"))).collect();
        let mut last = Vec::new();
        for m in &sent {
            last = history.append(m.clone());
        }
        assert_eq!(last.len(), 5);
        assert_eq!(last, sent[7..].to_vec());
        assert_eq!(read_persisted(store.as_ref(), 5), sent[7..].to_vec());
    }

    #[test]
    fn full_history_drops_oldest_on_append() {
        let store = Arc::new(MemoryStore::new());
        let history = history_with(&store, MAX_HISTORY_MESSAGES);
        for i in 0..MAX_HISTORY_MESSAGES {
            history.append(Message::assistant(format!("old{i}")));
        }
        let result = history.append(Message::user("newest"));
        assert_eq!(result.len(), MAX_HISTORY_MESSAGES);
        assert_eq!(result[0], Message::assistant("old1"));
        assert_eq!(result.last(), Some(&Message::user("newest")));
    }

    #[test]
    fn corrupt_or_wrong_shape_loads_empty() {
        let store = Arc::new(MemoryStore::new());
        for raw in [
            "not json",
            r#"{"role":"user","content":"x"}"#,
            "42",
            r#"[{"role":"user"}]"#,
            r#"[{"role":"wizard","content":"x"}]"#,
            r#"[{"role":"system","content":"x"}]"#,
        ] {
            store.set(HISTORY_KEY, raw).unwrap();
            assert!(history_with(&store, 20).is_empty(), "accepted {raw}");
        }
    }

    #[test]
    fn oversized_persisted_history_is_truncated_on_load() {
        let store = Arc::new(MemoryStore::new());
        let stored: Vec<Message> = (0..8).map(|i| Message::user(format!("m{i}"))).collect();
        store
            .set(HISTORY_KEY, &serde_json::to_string(&stored).unwrap())
            .unwrap();
        let history = history_with(&store, 3);
        assert_eq!(history.messages(), stored[5..].to_vec());
    }

    #[test]
    fn system_messages_are_not_stored() {
        let store = Arc::new(MemoryStore::new());
        let history = history_with(&store, 20);
        let result = history.append(Message::system("rules"));
        assert!(result.is_empty());
        assert_eq!(store.get(HISTORY_KEY), None);
    }

    #[test]
    fn failed_persist_keeps_in_memory_state() {
        let history = ConversationHistory::load(Arc::new(FailingStore), 20);
        let result = history.append(Message::user("hello"));
        assert_eq!(result, vec![Message::user("hello")]);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn clear_removes_stored_history() {
        let store = Arc::new(MemoryStore::new());
        let history = history_with(&store, 20);
        history.append(Message::user("hello"));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(store.get(HISTORY_KEY), None);
    }
}
