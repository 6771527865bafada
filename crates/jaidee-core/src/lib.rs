//! # Jaidee Core
//!
//! Shared vocabulary for every Jaidee crate: configuration, the error
//! taxonomy, domain records and the traits behind which the external
//! collaborators live (AI completion, durable conversation log, push
//! transport, shared key-value store).
//!
//! ## Architecture
//! ```text
//! inbound message
//!   └── ConversationEngine (jaidee-agent)
//!         ├── UserLock / SessionStore / ActivityTracker / RiskTracker (jaidee-session)
//!         ├── FollowUpScheduler (jaidee-scheduler)
//!         └── collaborators (this crate's traits)
//!               ├── KeyValueStore   - TTL keys + sorted set
//!               ├── ConversationStore - append-only turn log
//!               ├── TextCompletion  - opaque AI call
//!               └── PushChannel     - best-effort user notification
//! ```

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::JaideeConfig;
pub use error::{JaideeError, Result};
pub use traits::{ConversationStore, KeyValueStore, PushChannel, TextCompletion};
pub use types::{ChatMessage, ConversationTurn, RiskAssessment, RiskEvent, RiskLevel, Role};
