//! Per-user message lock.
//!
//! One key per user; existence means held. The TTL only bounds staleness
//! after a crash, callers release explicitly on every exit path. A second
//! short-lived key rate-limits the "still working" notice sent to users who
//! write again while their previous message is in flight.

use chrono::Utc;
use jaidee_core::config::LockConfig;
use jaidee_core::error::Result;
use jaidee_core::traits::KeyValueStore;
use std::sync::Arc;
use std::time::Duration;

pub struct UserLock {
    kv: Arc<dyn KeyValueStore>,
    ttl: Duration,
    notice_window: Duration,
}

fn lock_key(user_id: &str) -> String {
    format!("message_lock:{user_id}")
}

fn notice_key(user_id: &str) -> String {
    format!("wait_notice:{user_id}")
}

impl UserLock {
    pub fn new(kv: Arc<dyn KeyValueStore>, config: &LockConfig) -> Self {
        Self {
            kv,
            ttl: Duration::from_secs(config.ttl_secs),
            notice_window: Duration::from_secs(config.busy_notice_secs),
        }
    }

    /// Take the lock. `false` means another message for this user is being
    /// processed; the caller drops the message.
    pub async fn try_acquire(&self, user_id: &str) -> Result<bool> {
        let held_until = Utc::now().timestamp() + self.ttl.as_secs() as i64;
        let acquired = self
            .kv
            .set_if_absent(&lock_key(user_id), &held_until.to_string(), Some(self.ttl))
            .await?;
        if acquired {
            tracing::debug!("🔒 Lock acquired for {user_id}");
        } else {
            tracing::debug!("⏳ {user_id} is busy, dropping message");
        }
        Ok(acquired)
    }

    pub async fn release(&self, user_id: &str) -> Result<()> {
        self.kv.delete(&lock_key(user_id)).await?;
        tracing::debug!("🔓 Lock released for {user_id}");
        Ok(())
    }

    pub async fn is_locked(&self, user_id: &str) -> Result<bool> {
        self.kv.exists(&lock_key(user_id)).await
    }

    /// Claim the right to send one busy notice. Returns `false` when a
    /// notice already went out inside the current window.
    pub async fn claim_busy_notice(&self, user_id: &str) -> Result<bool> {
        self.kv
            .set_if_absent(&notice_key(user_id), "1", Some(self.notice_window))
            .await
    }

    pub async fn clear_busy_notice(&self, user_id: &str) -> Result<()> {
        self.kv.delete(&notice_key(user_id)).await?;
        Ok(())
    }
}
