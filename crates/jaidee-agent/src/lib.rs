//! # Jaidee Agent
//!
//! The per-message pipeline. [`ConversationEngine`] owns one handle to every
//! component and collaborator and exposes the two entry points the outside
//! world calls:
//! - [`ConversationEngine::handle_inbound_message`] for each user message
//! - [`ConversationEngine::run_scheduled_follow_up_poll`] from the poll loop
//!
//! ## Message flow
//! ```text
//! inbound ─▶ UserLock ──busy──▶ one "please wait" push per window, dropped
//!              │
//!              ▼ (released on every exit)
//!           expired? ──yes──▶ evict session, "starting fresh"
//!              │
//!           touch activity ─▶ '/' command?
//!              │
//!           session + packed history (+ summary of older turns)
//!              │
//!           risk classify ─▶ RiskTracker, emergency push on high
//!              │
//!           TextCompletion ──error──▶ apology
//!              │
//!           save session, append turn, schedule follow-up
//! ```

pub mod classifier;
pub mod commands;
pub mod engine;
pub mod messages;

pub use classifier::{KeywordRiskClassifier, RiskClassifier};
pub use commands::Command;
pub use engine::{ConversationEngine, InboundReply};
