//! Conversation persistence between invocations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::ToolstreamError;
use crate::types::Turn;

/// Stores conversation turns keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stored turns for `session_id`, oldest first. Unknown ids yield an
    /// empty history.
    async fn load(&self, session_id: &str) -> Result<Vec<Turn>, ToolstreamError>;

    /// Append turns to the end of a session.
    async fn append(&self, session_id: &str, turns: Vec<Turn>) -> Result<(), ToolstreamError>;
}

/// Process-local session store.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Vec<Turn>>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn clear(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Vec<Turn>, ToolstreamError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append(&self, session_id: &str, turns: Vec<Turn>) -> Result<(), ToolstreamError> {
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .extend(turns);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_then_load_preserves_order() {
        let store = InMemorySessionStore::new();
        assert!(store.load("s").await.unwrap().is_empty());

        store.append("s", vec![Turn::user("one")]).await.unwrap();
        store
            .append("s", vec![Turn::model_text("two"), Turn::user("three")])
            .await
            .unwrap();

        let turns = store.load("s").await.unwrap();
        assert_eq!(turns.len(), 3);
        assert!(matches!(&turns[2], Turn::User { text, .. } if text == "three"));
        assert_eq!(store.session_count().await, 1);

        store.clear("s").await;
        assert!(store.load("s").await.unwrap().is_empty());
    }
}
