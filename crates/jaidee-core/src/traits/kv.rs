//! Shared key-value collaborator with per-key TTL and a sorted set.
//!
//! Values are plain `String`s: adapters normalize whatever their wire format
//! returns (bytes vs text) before handing values to the core.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    fn name(&self) -> &str;

    /// Write `value`, replacing any previous value and TTL.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Write only when the key is absent (or expired). Returns whether the
    /// write happened. Must be atomic with respect to other callers.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Returns whether a live key was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Push to the head of a list and drop everything past `capacity`.
    async fn push_front_capped(&self, key: &str, value: &str, capacity: usize) -> Result<()>;

    /// Whole list, head first.
    async fn list_all(&self, key: &str) -> Result<Vec<String>>;

    /// Insert or move `member` to `score` in sorted set `set`.
    async fn upsert(&self, set: &str, member: &str, score: i64) -> Result<()>;

    /// Members with score ≤ `max`, ascending by score.
    async fn range_by_score(&self, set: &str, max: i64) -> Result<Vec<(String, i64)>>;

    /// Returns whether the member was present.
    async fn remove(&self, set: &str, member: &str) -> Result<bool>;

    async fn score(&self, set: &str, member: &str) -> Result<Option<i64>>;
}
