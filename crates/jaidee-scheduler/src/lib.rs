//! # Jaidee Scheduler
//!
//! Delayed check-in messages without a job-queue framework: a single sorted
//! set in the shared key-value store, scored by due time, and a tokio
//! interval that drains whatever has come due.
//!
//! ## Architecture
//! ```text
//! reply sent ──▶ FollowUpScheduler::schedule (next milestone of 1/3/7/14/30 days)
//!                   └── follow_up_queue  { user_id → due_at }
//!
//! run_follow_up_loop (tokio interval)
//!   └── poll(now) ── remove each due entry ──▶ PushChannel
//!                                               ├── WebhookPush (HTTP POST)
//!                                               └── LogPush (no endpoint configured)
//! ```
//!
//! Entries leave the queue before delivery is attempted, so a failed push
//! is logged and never retried.

pub mod dispatch;
pub mod engine;
pub mod followup;

pub use dispatch::{LogPush, WebhookPush, push_from_config};
pub use engine::{DeliveryAttempt, run_follow_up_loop, spawn_follow_up_loop};
pub use followup::{DueFollowUp, FollowUpScheduler};
