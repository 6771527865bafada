//! Last-activity tracking and the one-shot timeout warning.
//!
//! ```text
//!   (absent) ──touch──▶ Active ──touch inside warning window──▶ WarningSent
//!      ▲                  │                                        │
//!      └──── TTL / reset ─┴────────────── TTL / reset ─────────────┘
//! ```
//!
//! The activity key carries the session timeout as TTL, so a silent user's
//! record disappears on its own. [`ActivityTracker::is_expired`] is the
//! synchronous check made when a message arrives, letting the caller say
//! "session expired" instead of silently starting over.

use chrono::{DateTime, Utc};
use jaidee_core::config::SessionConfig;
use jaidee_core::error::Result;
use jaidee_core::traits::{KeyValueStore, PushChannel};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_WARNING_TEXT: &str = "We haven't heard from you in a while. Your session will \
     close in about a day; send any message to keep talking with Jaidee.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityState {
    /// No record existed; one was just created.
    Fresh,
    Active,
    WarningSent,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub user_id: String,
    pub last_activity_at: DateTime<Utc>,
    pub warning_sent: bool,
}

pub struct ActivityTracker {
    kv: Arc<dyn KeyValueStore>,
    push: Arc<dyn PushChannel>,
    timeout: Duration,
    warning_window: Duration,
    warning_text: String,
}

fn activity_key(user_id: &str) -> String {
    format!("last_activity:{user_id}")
}

fn warning_key(user_id: &str) -> String {
    format!("timeout_warning:{user_id}")
}

/// Accepts integer or fractional unix seconds.
fn parse_unix(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }
    let secs = raw.parse::<f64>().ok()?;
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp(secs.trunc() as i64, (secs.fract().abs() * 1e9) as u32)
}

fn secs(d: Duration) -> chrono::Duration {
    chrono::Duration::seconds(d.as_secs() as i64)
}

impl ActivityTracker {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        push: Arc<dyn PushChannel>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            kv,
            push,
            timeout: config.timeout(),
            warning_window: config.warning_window(),
            warning_text: DEFAULT_WARNING_TEXT.to_string(),
        }
    }

    pub fn with_warning_text(mut self, text: &str) -> Self {
        self.warning_text = text.to_string();
        self
    }

    async fn last_activity(&self, user_id: &str) -> Result<Option<DateTime<Utc>>> {
        let raw = self.kv.get(&activity_key(user_id)).await?;
        Ok(raw.as_deref().and_then(|r| {
            let parsed = parse_unix(r);
            if parsed.is_none() {
                tracing::warn!("⚠️ Unreadable activity timestamp for {user_id}: {r}");
            }
            parsed
        }))
    }

    /// Record activity at `now`.
    ///
    /// When the previous activity is older than `timeout - warning_window`
    /// and no warning went out yet, the warning is pushed exactly once. The
    /// timestamp and its TTL are refreshed in every case.
    pub async fn touch(&self, user_id: &str, now: DateTime<Utc>) -> Result<ActivityState> {
        let state = match self.last_activity(user_id).await? {
            None => ActivityState::Fresh,
            Some(last) => {
                let idle = now - last;
                let threshold = secs(self.timeout) - secs(self.warning_window);
                if idle > threshold && self.claim_warning(user_id).await? {
                    if let Err(e) = self.push.send(user_id, &self.warning_text).await {
                        tracing::warn!("⚠️ Timeout warning to {user_id} failed: {e}");
                    } else {
                        tracing::info!("⏰ Timeout warning sent to {user_id}");
                    }
                    ActivityState::WarningSent
                } else {
                    ActivityState::Active
                }
            }
        };

        self.kv
            .set(&activity_key(user_id), &now.timestamp().to_string(), Some(self.timeout))
            .await?;
        Ok(state)
    }

    /// Set the warning flag; `false` when it was already set.
    async fn claim_warning(&self, user_id: &str) -> Result<bool> {
        self.kv
            .set_if_absent(&warning_key(user_id), "1", Some(self.warning_window))
            .await
    }

    /// Whether the user has been idle longer than the session timeout.
    /// A user with no record is not expired.
    pub async fn is_expired(&self, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
        Ok(self
            .last_activity(user_id)
            .await?
            .is_some_and(|last| now - last > secs(self.timeout)))
    }

    pub async fn record(&self, user_id: &str) -> Result<Option<ActivityRecord>> {
        let Some(last) = self.last_activity(user_id).await? else {
            return Ok(None);
        };
        Ok(Some(ActivityRecord {
            user_id: user_id.to_string(),
            last_activity_at: last,
            warning_sent: self.kv.exists(&warning_key(user_id)).await?,
        }))
    }

    pub async fn state(&self, user_id: &str, now: DateTime<Utc>) -> Result<ActivityState> {
        let Some(record) = self.record(user_id).await? else {
            return Ok(ActivityState::Expired);
        };
        if now - record.last_activity_at > secs(self.timeout) {
            Ok(ActivityState::Expired)
        } else if record.warning_sent {
            Ok(ActivityState::WarningSent)
        } else {
            Ok(ActivityState::Active)
        }
    }

    /// Forget the user's activity and warning flag.
    pub async fn reset(&self, user_id: &str) -> Result<()> {
        self.kv.delete(&activity_key(user_id)).await?;
        self.kv.delete(&warning_key(user_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use jaidee_core::error::JaideeError;
    use jaidee_memory::MemoryKv;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPush {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl PushChannel for RecordingPush {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, user_id: &str, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push((user_id.to_string(), text.to_string()));
            if self.fail {
                return Err(JaideeError::Push("unreachable".into()));
            }
            Ok(())
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn days(n: i64) -> chrono::Duration {
        chrono::Duration::days(n)
    }

    fn tracker(push: Arc<RecordingPush>) -> (Arc<MemoryKv>, ActivityTracker) {
        let kv = Arc::new(MemoryKv::new());
        let tracker = ActivityTracker::new(kv.clone(), push, &SessionConfig::default());
        (kv, tracker)
    }

    #[tokio::test]
    async fn test_first_touch_creates_record() {
        let push = Arc::new(RecordingPush::default());
        let (_, tracker) = tracker(push.clone());
        assert_eq!(tracker.touch("u1", t0()).await.unwrap(), ActivityState::Fresh);
        assert_eq!(tracker.touch("u1", t0() + days(1)).await.unwrap(), ActivityState::Active);

        let record = tracker.record("u1").await.unwrap().unwrap();
        assert_eq!(record.last_activity_at, t0() + days(1));
        assert!(!record.warning_sent);
        assert!(push.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_warning_sent_once() {
        let push = Arc::new(RecordingPush::default());
        let (_, tracker) = tracker(push.clone());
        tracker.touch("u1", t0()).await.unwrap();

        // 6.5 days idle is past timeout - warning window (6 days)
        let late = t0() + days(6) + chrono::Duration::hours(12);
        assert_eq!(tracker.touch("u1", late).await.unwrap(), ActivityState::WarningSent);
        assert_eq!(push.sent.lock().unwrap().len(), 1);
        assert_eq!(tracker.state("u1", late).await.unwrap(), ActivityState::WarningSent);

        // touch refreshed the timestamp, so a second late touch stays quiet
        let later = late + days(6) + chrono::Duration::hours(1);
        assert_eq!(tracker.touch("u1", later).await.unwrap(), ActivityState::Active);
        assert_eq!(push.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_two_touches_in_window_warn_once() {
        let push = Arc::new(RecordingPush::default());
        let (kv, tracker) = tracker(push.clone());
        // both calls observe the same stale timestamp
        kv.set("last_activity:u1", &t0().timestamp().to_string(), None).await.unwrap();
        let late = t0() + days(6) + chrono::Duration::hours(2);
        let (a, b) = tokio::join!(tracker.touch("u1", late), tracker.touch("u1", late));
        let states = [a.unwrap(), b.unwrap()];
        assert_eq!(states.iter().filter(|s| **s == ActivityState::WarningSent).count(), 1);
        assert_eq!(push.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_push_failure_still_refreshes() {
        let push = Arc::new(RecordingPush { fail: true, ..Default::default() });
        let (_, tracker) = tracker(push.clone());
        tracker.touch("u1", t0()).await.unwrap();
        let late = t0() + days(6) + chrono::Duration::hours(1);
        assert_eq!(tracker.touch("u1", late).await.unwrap(), ActivityState::WarningSent);
        let record = tracker.record("u1").await.unwrap().unwrap();
        assert_eq!(record.last_activity_at, late);
        assert!(record.warning_sent);
    }

    #[tokio::test]
    async fn test_is_expired() {
        let push = Arc::new(RecordingPush::default());
        let (_, tracker) = tracker(push);
        assert!(!tracker.is_expired("u1", t0()).await.unwrap());

        tracker.touch("u1", t0()).await.unwrap();
        assert!(!tracker.is_expired("u1", t0() + days(7)).await.unwrap());
        let past = t0() + days(7) + chrono::Duration::seconds(1);
        assert!(tracker.is_expired("u1", past).await.unwrap());
        assert_eq!(
            tracker.state("u1", t0() + days(8)).await.unwrap(),
            ActivityState::Expired
        );

        tracker.reset("u1").await.unwrap();
        assert!(tracker.record("u1").await.unwrap().is_none());
        assert!(!tracker.is_expired("u1", t0() + days(8)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_expires_with_ttl() {
        let push = Arc::new(RecordingPush::default());
        let (_, tracker) = tracker(push);
        tracker.touch("u1", t0()).await.unwrap();
        tokio::time::advance(Duration::from_secs(7 * 24 * 3600)).await;
        assert!(tracker.record("u1").await.unwrap().is_none());
    }

    #[test]
    fn test_parse_unix_variants() {
        assert_eq!(parse_unix("1704067200"), Some(t0()));
        assert_eq!(parse_unix("1704067200.0"), Some(t0()));
        assert_eq!(parse_unix("garbage"), None);
    }
}
