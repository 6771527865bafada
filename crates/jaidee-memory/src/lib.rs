//! # Jaidee Memory
//!
//! Storage backends behind the core collaborator traits:
//! - [`MemoryKv`]: in-process key-value store with per-key TTL, capped
//!   lists and a sorted set. Single-instance deployments and tests.
//! - [`SqliteConversationStore`]: durable append-only turn log.

pub mod kv;
pub mod sqlite;

pub use kv::MemoryKv;
pub use sqlite::SqliteConversationStore;
