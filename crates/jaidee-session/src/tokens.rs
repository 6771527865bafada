//! Heuristic token estimation.
//!
//! Every run of Thai characters, run of Latin letters, run of digits and
//! each standalone symbol counts as one unit; the unit count is scaled by an
//! adjustment factor. Close enough for budgeting, not exact tokenization.

use jaidee_core::config::TokenConfig;
use jaidee_core::error::{JaideeError, Result};
use jaidee_core::types::ChatMessage;
use regex::Regex;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{LazyLock, Mutex, MutexGuard};

static UNIT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\p{Thai}+|\p{Latin}+|\d+|[^\p{Thai}\p{Latin}\d\s]")
        .expect("token unit pattern compiles")
});

/// Characters of the text that take part in the cache key.
const CACHE_PREFIX_CHARS: usize = 100;
/// Fixed per-conversation overhead of a completion request.
const CONVERSATION_OVERHEAD: usize = 2;
/// Role/framing overhead of each message.
const PER_MESSAGE_OVERHEAD: usize = 4;

struct EstimatorState {
    adjustment_factor: f64,
    cache: HashMap<u64, usize>,
}

pub struct TokenEstimator {
    state: Mutex<EstimatorState>,
    cache_capacity: usize,
}

impl TokenEstimator {
    pub fn new(config: &TokenConfig) -> Result<Self> {
        validate_factor(config.adjustment_factor)?;
        Ok(Self {
            state: Mutex::new(EstimatorState {
                adjustment_factor: config.adjustment_factor,
                cache: HashMap::new(),
            }),
            cache_capacity: config.cache_capacity.max(1),
        })
    }

    fn state(&self) -> MutexGuard<'_, EstimatorState> {
        // the state stays consistent even if a holder panicked
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Estimated token cost of `text`. `0` only for the empty string.
    pub fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let key = cache_key(text);
        let mut state = self.state();
        if let Some(hit) = state.cache.get(&key) {
            return *hit;
        }

        let units = UNIT_PATTERN.find_iter(text.trim()).count();
        let estimated = ((units as f64) * state.adjustment_factor).floor() as usize;
        let estimated = estimated.max(1);

        // wholesale eviction, not LRU
        if state.cache.len() > self.cache_capacity {
            tracing::debug!("🧮 Token cache full ({} entries), clearing", state.cache.len());
            state.cache.clear();
        }
        state.cache.insert(key, estimated);
        estimated
    }

    /// Cost of a full completion request.
    pub fn estimate_messages(&self, messages: &[ChatMessage]) -> usize {
        if messages.is_empty() {
            return 0;
        }
        CONVERSATION_OVERHEAD
            + messages
                .iter()
                .map(|m| self.estimate(&m.content) + PER_MESSAGE_OVERHEAD)
                .sum::<usize>()
    }

    pub fn adjustment_factor(&self) -> f64 {
        self.state().adjustment_factor
    }

    /// Change the multiplier. Cached values were computed with the old one,
    /// so the cache is dropped.
    pub fn set_adjustment_factor(&self, factor: f64) -> Result<()> {
        validate_factor(factor)?;
        let mut state = self.state();
        state.adjustment_factor = factor;
        state.cache.clear();
        Ok(())
    }

    pub fn clear_cache(&self) {
        self.state().cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.state().cache.len()
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        let config = TokenConfig::default();
        Self {
            state: Mutex::new(EstimatorState {
                adjustment_factor: config.adjustment_factor,
                cache: HashMap::new(),
            }),
            cache_capacity: config.cache_capacity,
        }
    }
}

fn validate_factor(factor: f64) -> Result<()> {
    if !factor.is_finite() || factor < 0.0 {
        return Err(JaideeError::Validation(format!(
            "adjustment factor must be a finite value >= 0, got {factor}"
        )));
    }
    Ok(())
}

/// Hash of the leading characters plus the total length.
fn cache_key(text: &str) -> u64 {
    let prefix: String = text.chars().take(CACHE_PREFIX_CHARS).collect();
    let mut hasher = DefaultHasher::new();
    prefix.hash(&mut hasher);
    text.len().hash(&mut hasher);
    hasher.finish()
}
