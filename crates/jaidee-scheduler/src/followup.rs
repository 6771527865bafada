//! Follow-up queue.
//!
//! Each user has at most one pending entry: the soonest milestone that is
//! still in the future when the entry is written. Later milestones are not
//! queued separately; the next interaction (or nothing) decides what comes
//! after.

use chrono::{DateTime, Duration, Utc};
use jaidee_core::config::FollowUpConfig;
use jaidee_core::error::Result;
use jaidee_core::traits::KeyValueStore;
use std::sync::Arc;

/// Sorted set holding `user_id → due_at` (unix seconds).
pub const FOLLOW_UP_QUEUE: &str = "follow_up_queue";

/// An entry taken off the queue by [`FollowUpScheduler::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueFollowUp {
    pub user_id: String,
    pub due_at: DateTime<Utc>,
}

pub struct FollowUpScheduler {
    kv: Arc<dyn KeyValueStore>,
    offsets: Vec<Duration>,
}

impl FollowUpScheduler {
    pub fn new(kv: Arc<dyn KeyValueStore>, config: &FollowUpConfig) -> Self {
        Self::with_offsets(kv, &config.offsets_days)
    }

    /// `offsets_days` must be ascending; config validation enforces that.
    pub fn with_offsets(kv: Arc<dyn KeyValueStore>, offsets_days: &[u32]) -> Self {
        Self {
            kv,
            offsets: offsets_days.iter().map(|d| Duration::days(i64::from(*d))).collect(),
        }
    }

    /// First `base_time + offset` strictly after `now`.
    pub fn next_due(&self, base_time: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.offsets
            .iter()
            .map(|offset| base_time + *offset)
            .find(|due| *due > now)
    }

    /// Queue the next milestone for `user_id`, replacing any pending entry.
    /// Returns the due time, or `None` when every milestone is already in
    /// the past (the queue is left untouched then).
    pub async fn schedule(
        &self,
        user_id: &str,
        base_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let Some(due) = self.next_due(base_time, now) else {
            tracing::debug!("📅 No future follow-up milestone for {user_id}");
            return Ok(None);
        };
        self.kv.upsert(FOLLOW_UP_QUEUE, user_id, due.timestamp()).await?;
        tracing::info!("📅 Follow-up for {user_id} at {}", due.to_rfc3339());
        Ok(Some(due))
    }

    /// Take every entry due at or before `now`, ascending by due time.
    ///
    /// Each entry is removed before it is returned. An entry another poller
    /// removed first is skipped, so concurrent pollers never both deliver it.
    pub async fn poll(&self, now: DateTime<Utc>) -> Result<Vec<DueFollowUp>> {
        let due = self.kv.range_by_score(FOLLOW_UP_QUEUE, now.timestamp()).await?;
        let mut taken = Vec::with_capacity(due.len());
        for (user_id, score) in due {
            if !self.kv.remove(FOLLOW_UP_QUEUE, &user_id).await? {
                continue;
            }
            let Some(due_at) = DateTime::from_timestamp(score, 0) else {
                tracing::warn!("⚠️ Dropping follow-up for {user_id} with bad score {score}");
                continue;
            };
            taken.push(DueFollowUp { user_id, due_at });
        }
        if !taken.is_empty() {
            tracing::info!("🔔 {} follow-up(s) due", taken.len());
        }
        Ok(taken)
    }

    pub async fn cancel(&self, user_id: &str) -> Result<bool> {
        self.kv.remove(FOLLOW_UP_QUEUE, user_id).await
    }

    pub async fn pending(&self, user_id: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .kv
            .score(FOLLOW_UP_QUEUE, user_id)
            .await?
            .and_then(|score| DateTime::from_timestamp(score, 0)))
    }
}
