//! Jaidee configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{JaideeError, Result};
use crate::traits::CompletionOptions;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JaideeConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub follow_up: FollowUpConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl JaideeConfig {
    /// Load config from the default path (~/.jaidee/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default().with_env_overrides())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| JaideeError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML text and apply env overrides.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| JaideeError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config.with_env_overrides())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Jaidee home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".jaidee")
    }

    /// Secrets are never expected in the file; env wins when set.
    fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("JAIDEE_LLM_API_KEY") {
            self.llm.api_key = key;
        }
        if let Ok(token) = std::env::var("JAIDEE_PUSH_TOKEN") {
            self.push.token = token;
        }
        self
    }

    /// Reject configurations the engine cannot honour. Called once at
    /// startup; a failure here is fatal.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(JaideeError::Validation(msg.to_string()));

        if self.session.ttl_secs == 0 {
            return invalid("session.ttl_secs must be > 0");
        }
        if self.session.max_entries == 0 {
            return invalid("session.max_entries must be > 0");
        }
        if self.session.warning_window_secs >= self.session.timeout_secs {
            return invalid("session.warning_window_secs must be shorter than session.timeout_secs");
        }
        if self.lock.ttl_secs == 0 {
            return invalid("lock.ttl_secs must be > 0");
        }
        if self.follow_up.offsets_days.is_empty() {
            return invalid("follow_up.offsets_days must not be empty");
        }
        if self.follow_up.offsets_days.contains(&0) {
            return invalid("follow_up.offsets_days must be positive");
        }
        if !self.follow_up.offsets_days.windows(2).all(|w| w[0] < w[1]) {
            return invalid("follow_up.offsets_days must be strictly ascending");
        }
        if self.follow_up.poll_interval_secs == 0 {
            return invalid("follow_up.poll_interval_secs must be > 0");
        }
        if self.risk.ring_capacity == 0 {
            return invalid("risk.ring_capacity must be > 0");
        }
        if !self.tokens.adjustment_factor.is_finite() || self.tokens.adjustment_factor < 0.0 {
            return invalid("tokens.adjustment_factor must be a finite value >= 0");
        }
        if self.tokens.cache_capacity == 0 {
            return invalid("tokens.cache_capacity must be > 0");
        }
        Ok(())
    }
}

/// Session document, activity and timeout-warning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// TTL of the cached session document.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
    /// Most recent entries kept in the session document.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Inactivity after which a session is considered expired.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// How long before expiry the one-time warning goes out.
    #[serde(default = "default_warning_window")]
    pub warning_window_secs: u64,
}

fn default_session_ttl() -> u64 { 24 * 3600 }
fn default_max_entries() -> usize { 10 }
fn default_timeout() -> u64 { 7 * 24 * 3600 }
fn default_warning_window() -> u64 { 24 * 3600 }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            max_entries: default_max_entries(),
            timeout_secs: default_timeout(),
            warning_window_secs: default_warning_window(),
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn warning_window(&self) -> Duration {
        Duration::from_secs(self.warning_window_secs)
    }
}

/// Per-user message lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_ttl")]
    pub ttl_secs: u64,
    /// Window during which at most one "please wait" notice is pushed.
    #[serde(default = "default_busy_notice")]
    pub busy_notice_secs: u64,
}

fn default_lock_ttl() -> u64 { 30 }
fn default_busy_notice() -> u64 { 10 }

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_lock_ttl(),
            busy_notice_secs: default_busy_notice(),
        }
    }
}

/// Persistent-history packing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_budget")]
    pub budget_tokens: usize,
    /// Packed histories longer than this get their older part summarized.
    #[serde(default = "default_summary_threshold")]
    pub summary_threshold: usize,
}

fn default_budget() -> usize { 10_000 }
fn default_summary_threshold() -> usize { 5 }

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            budget_tokens: default_budget(),
            summary_threshold: default_summary_threshold(),
        }
    }
}

/// Follow-up milestones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpConfig {
    #[serde(default = "default_offsets")]
    pub offsets_days: Vec<u32>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_offsets() -> Vec<u32> { vec![1, 3, 7, 14, 30] }
fn default_poll_interval() -> u64 { 30 * 60 }

impl Default for FollowUpConfig {
    fn default() -> Self {
        Self {
            offsets_days: default_offsets(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// Risk classifier keywords and ring size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,
    #[serde(default = "default_high_keywords")]
    pub high_keywords: Vec<String>,
    #[serde(default = "default_medium_keywords")]
    pub medium_keywords: Vec<String>,
}

fn default_ring_capacity() -> usize { 100 }

fn default_high_keywords() -> Vec<String> {
    [
        "ฆ่าตัวตาย", "ทำร้ายตัวเอง", "อยากตาย", "เกินขนาด", "เลือดออก", "ชัก", "หมดสติ",
        "overdose", "suicide", "kill myself", "self-harm", "seizure", "unconscious",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_medium_keywords() -> Vec<String> {
    [
        "นอนไม่หลับ", "เครียด", "กังวล", "ซึมเศร้า", "เหงา", "ท้อแท้",
        "insomnia", "stressed", "anxious", "depressed", "lonely", "hopeless",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            ring_capacity: default_ring_capacity(),
            high_keywords: default_high_keywords(),
            medium_keywords: default_medium_keywords(),
        }
    }
}

/// Token estimator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_adjustment")]
    pub adjustment_factor: f64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_adjustment() -> f64 { 1.3 }
fn default_cache_capacity() -> usize { 1000 }

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            adjustment_factor: default_adjustment(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// OpenAI-compatible completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Usually supplied through `JAIDEE_LLM_API_KEY`.
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_summary_temperature")]
    pub summary_temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub summary_max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_endpoint() -> String { "https://api.deepseek.com".into() }
fn default_model() -> String { "deepseek-chat".into() }
fn default_temperature() -> f32 { 1.0 }
fn default_max_tokens() -> u32 { 500 }
fn default_top_p() -> f32 { 0.9 }
fn default_summary_temperature() -> f32 { 0.3 }
fn default_timeout_secs() -> u64 { 60 }
fn default_system_prompt() -> String {
    "You are Jaidee, a warm and non-judgemental counsellor for people affected by \
     substance use. Keep the conversation safe and open, offer practical and \
     compassionate guidance, ask one question at a time, and suggest professional \
     help when it is needed."
        .into()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            summary_temperature: default_summary_temperature(),
            summary_max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl LlmConfig {
    /// Options for the main reply.
    pub fn reply_options(&self) -> CompletionOptions {
        CompletionOptions {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: Some(self.top_p),
        }
    }

    /// Options for history summaries.
    pub fn summary_options(&self) -> CompletionOptions {
        CompletionOptions {
            model: self.model.clone(),
            temperature: self.summary_temperature,
            max_tokens: self.summary_max_tokens,
            top_p: None,
        }
    }
}

/// Push webhook target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushConfig {
    /// Empty means pushes are only logged.
    #[serde(default)]
    pub endpoint: String,
    /// Usually supplied through `JAIDEE_PUSH_TOKEN`.
    #[serde(default, skip_serializing)]
    pub token: String,
}

/// Durable storage location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String { "~/.jaidee/conversations.db".into() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self { db_path: default_db_path() }
    }
}
