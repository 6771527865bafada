//! # Jaidee Session
//!
//! Per-user state that lives in the shared key-value store, plus the token
//! budgeting used when assembling context.
//!
//! - [`TokenEstimator`]: heuristic token cost of text (Thai/Latin aware)
//! - [`packer`]: two-pass importance-then-recency history selection
//! - [`UserLock`]: TTL-backed per-user mutual exclusion
//! - [`SessionStore`]: last few messages, 24h TTL
//! - [`ActivityTracker`]: last activity + one-shot timeout warning
//! - [`RiskTracker`]: ring of recent risk assessments

pub mod activity;
pub mod lock;
pub mod packer;
pub mod risk;
pub mod session;
pub mod tokens;

pub use activity::{ActivityRecord, ActivityState, ActivityTracker};
pub use lock::UserLock;
pub use risk::{RiskReport, RiskTracker};
pub use session::{SessionDocument, SessionStore};
pub use tokens::TokenEstimator;
