//! Hot cache of a user's most recent messages.

use chrono::{DateTime, Utc};
use jaidee_core::config::SessionConfig;
use jaidee_core::error::Result;
use jaidee_core::traits::KeyValueStore;
use jaidee_core::types::ChatMessage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Stored form of a session. Overwritten wholesale on every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDocument {
    pub user_id: String,
    pub messages: Vec<ChatMessage>,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    ttl: Duration,
    max_entries: usize,
}

fn session_key(user_id: &str) -> String {
    format!("chat_session:{user_id}")
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, config: &SessionConfig) -> Self {
        Self {
            kv,
            ttl: config.ttl(),
            max_entries: config.max_entries.max(1),
        }
    }

    /// The stored document, if any. A document that no longer decodes is
    /// treated as absent.
    pub async fn load_document(&self, user_id: &str) -> Result<Option<SessionDocument>> {
        let Some(raw) = self.kv.get(&session_key(user_id)).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<SessionDocument>(&raw) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                tracing::warn!("⚠️ Dropping undecodable session for {user_id}: {e}");
                Ok(None)
            }
        }
    }

    /// Cached messages, oldest first. Empty when there is no session.
    pub async fn load(&self, user_id: &str) -> Result<Vec<ChatMessage>> {
        Ok(self
            .load_document(user_id)
            .await?
            .map(|doc| doc.messages)
            .unwrap_or_default())
    }

    /// Replace the session with the last `max_entries` of `messages` and
    /// restart its TTL.
    pub async fn save(
        &self,
        user_id: &str,
        messages: &[ChatMessage],
        now: DateTime<Utc>,
    ) -> Result<SessionDocument> {
        let start = messages.len().saturating_sub(self.max_entries);
        let expires_at = now + chrono::Duration::seconds(self.ttl.as_secs() as i64);
        let doc = SessionDocument {
            user_id: user_id.to_string(),
            messages: messages[start..].to_vec(),
            expires_at,
        };
        let encoded = serde_json::to_string(&doc)?;
        self.kv.set(&session_key(user_id), &encoded, Some(self.ttl)).await?;
        tracing::debug!("💾 Session saved for {user_id} ({} messages)", doc.messages.len());
        Ok(doc)
    }

    pub async fn evict(&self, user_id: &str) -> Result<bool> {
        let removed = self.kv.delete(&session_key(user_id)).await?;
        if removed {
            tracing::info!("🗑️ Session evicted for {user_id}");
        }
        Ok(removed)
    }

    pub async fn exists(&self, user_id: &str) -> Result<bool> {
        self.kv.exists(&session_key(user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use jaidee_memory::MemoryKv;

    fn store() -> (Arc<MemoryKv>, SessionStore) {
        let kv = Arc::new(MemoryKv::new());
        let store = SessionStore::new(kv.clone(), &SessionConfig::default());
        (kv, store)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_missing_session_is_empty() {
        let (_, store) = store();
        assert!(store.load("nobody").await.unwrap().is_empty());
        assert!(!store.exists("nobody").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_keeps_last_entries() {
        let (_, store) = store();
        let messages: Vec<ChatMessage> =
            (0..14).map(|i| ChatMessage::user(&format!("m{i}"))).collect();
        let doc = store.save("u1", &messages, now()).await.unwrap();
        assert_eq!(doc.messages.len(), 10);
        assert_eq!(doc.expires_at, now() + chrono::Duration::hours(24));

        let loaded = store.load("u1").await.unwrap();
        assert_eq!(loaded.len(), 10);
        assert_eq!(loaded[0].content, "m4");
        assert_eq!(loaded[9].content, "m13");
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let (_, store) = store();
        store.save("u1", &[ChatMessage::user("old")], now()).await.unwrap();
        store.save("u1", &[ChatMessage::user("new")], now()).await.unwrap();
        assert_eq!(store.load("u1").await.unwrap(), vec![ChatMessage::user("new")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_and_evict() {
        let (_, store) = store();
        store.save("u1", &[ChatMessage::user("hi")], now()).await.unwrap();
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(store.exists("u1").await.unwrap());
        assert!(store.evict("u1").await.unwrap());
        assert!(!store.evict("u1").await.unwrap());

        store.save("u1", &[ChatMessage::user("hi")], now()).await.unwrap();
        tokio::time::advance(Duration::from_secs(24 * 3600)).await;
        assert!(!store.exists("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_document_reads_as_empty() {
        let (kv, store) = store();
        kv.set("chat_session:u1", "{not json", None).await.unwrap();
        assert!(store.load("u1").await.unwrap().is_empty());
    }
}
