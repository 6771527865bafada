//! Domain records shared by the session, scheduler and agent crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Role of a message inside a session document or completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single `{role, content}` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self { role: Role::System, content: content.to_string() }
    }

    pub fn user(content: &str) -> Self {
        Self { role: Role::User, content: content.to_string() }
    }

    pub fn assistant(content: &str) -> Self {
        Self { role: Role::Assistant, content: content.to_string() }
    }
}

/// Terms that mark a turn as worth keeping under a tight token budget:
/// assessment results, hotline/hospital details, self-harm signals and
/// treatment or appointment talk.
pub const IMPORTANT_KEYWORDS: &[&str] = &[
    // assessment
    "ผลการประเมิน",
    "คะแนนการประเมิน",
    "assessment result",
    "assessment score",
    // contact details
    "หมายเลขโทรศัพท์",
    "สายด่วน",
    "โรงพยาบาล",
    "hotline",
    "hospital",
    // crisis
    "ฆ่าตัวตาย",
    "ทำร้ายตัวเอง",
    "อยากตาย",
    "suicide",
    "self-harm",
    "want to die",
    // treatment
    "การรักษา",
    "จิตแพทย์",
    "นัดหมาย",
    "treatment",
    "psychiatrist",
    "appointment",
];

/// True when either side of the exchange mentions an important keyword.
pub fn is_important_exchange(user_text: &str, bot_text: &str) -> bool {
    let user_lower = user_text.to_lowercase();
    let bot_lower = bot_text.to_lowercase();
    IMPORTANT_KEYWORDS
        .iter()
        .any(|k| user_lower.contains(k) || bot_lower.contains(k))
}

/// One persisted user/bot exchange.
///
/// `important` is derived from the text and cannot be set by callers; it is
/// recomputed whenever a turn is built, including when loaded from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TurnRecord")]
pub struct ConversationTurn {
    pub id: i64,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_text: String,
    pub bot_text: String,
    pub token_count: usize,
    important: bool,
}

impl ConversationTurn {
    /// Build a not-yet-persisted turn (id 0; the store assigns the real one).
    pub fn new(
        user_id: &str,
        timestamp: DateTime<Utc>,
        user_text: &str,
        bot_text: &str,
        token_count: usize,
    ) -> Self {
        Self::with_id(0, user_id, timestamp, user_text, bot_text, token_count)
    }

    pub fn with_id(
        id: i64,
        user_id: &str,
        timestamp: DateTime<Utc>,
        user_text: &str,
        bot_text: &str,
        token_count: usize,
    ) -> Self {
        Self {
            id,
            user_id: user_id.to_string(),
            timestamp,
            user_text: user_text.to_string(),
            bot_text: bot_text.to_string(),
            token_count,
            important: is_important_exchange(user_text, bot_text),
        }
    }

    pub fn is_important(&self) -> bool {
        self.important
    }
}

/// Wire shape of a turn. Any `important` field in the input is ignored.
#[derive(Deserialize)]
struct TurnRecord {
    id: i64,
    user_id: String,
    timestamp: DateTime<Utc>,
    user_text: String,
    bot_text: String,
    token_count: usize,
}

impl From<TurnRecord> for ConversationTurn {
    fn from(r: TurnRecord) -> Self {
        Self::with_id(r.id, &r.user_id, r.timestamp, &r.user_text, &r.bot_text, r.token_count)
    }
}

/// Risk bucket produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// Classifier output for one inbound text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub keywords: BTreeSet<String>,
}

impl RiskAssessment {
    pub fn low() -> Self {
        Self { level: RiskLevel::Low, keywords: BTreeSet::new() }
    }
}

/// One entry in a user's risk ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskEvent {
    pub timestamp: DateTime<Utc>,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
}
