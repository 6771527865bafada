//! Recurring follow-up poll.
//! Uses tokio::interval, so the task sleeps between checks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Outcome of one follow-up delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryAttempt {
    pub user_id: String,
    pub due_at: DateTime<Utc>,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryAttempt {
    pub fn delivered(user_id: &str, due_at: DateTime<Utc>) -> Self {
        Self { user_id: user_id.to_string(), due_at, delivered: true, error: None }
    }

    pub fn failed(user_id: &str, due_at: DateTime<Utc>, error: impl ToString) -> Self {
        Self {
            user_id: user_id.to_string(),
            due_at,
            delivered: false,
            error: Some(error.to_string()),
        }
    }
}

/// Drive `poll` every `interval_secs` forever.
///
/// `poll` receives the wall-clock time of the tick and reports what it
/// attempted. It must not take any per-user lock; the loop only summarizes
/// the outcome.
pub async fn run_follow_up_loop<F, Fut>(poll: F, interval_secs: u64)
where
    F: Fn(DateTime<Utc>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Vec<DeliveryAttempt>> + Send,
{
    tracing::info!("⏰ Follow-up poll started (check every {interval_secs}s)");

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let attempts = poll(Utc::now()).await;
        if attempts.is_empty() {
            continue;
        }
        let failed = attempts.iter().filter(|a| !a.delivered).count();
        if failed > 0 {
            tracing::warn!(
                "⚠️ Follow-up poll: {} delivered, {failed} failed",
                attempts.len() - failed
            );
        } else {
            tracing::info!("✅ Follow-up poll: {} delivered", attempts.len());
        }
    }
}

/// Spawn [`run_follow_up_loop`] as a background tokio task.
pub fn spawn_follow_up_loop<F, Fut>(poll: F, interval_secs: u64) -> JoinHandle<()>
where
    F: Fn(DateTime<Utc>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Vec<DeliveryAttempt>> + Send + 'static,
{
    tokio::spawn(run_follow_up_loop(poll, interval_secs))
}
