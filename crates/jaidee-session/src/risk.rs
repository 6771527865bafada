//! Per-user ring of recent risk assessments.

use chrono::{DateTime, Utc};
use jaidee_core::config::RiskConfig;
use jaidee_core::error::Result;
use jaidee_core::traits::KeyValueStore;
use jaidee_core::types::{RiskEvent, RiskLevel};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Counts over whatever is currently in the ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskReport {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
}

impl RiskReport {
    pub fn render(&self) -> String {
        format!(
            "Risk events: {} (high {}, medium {}, low {})\nFirst: {}\nLast: {}",
            self.total,
            self.high,
            self.medium,
            self.low,
            self.earliest.format("%Y-%m-%d %H:%M"),
            self.latest.format("%Y-%m-%d %H:%M"),
        )
    }
}

pub struct RiskTracker {
    kv: Arc<dyn KeyValueStore>,
    capacity: usize,
}

fn ring_key(user_id: &str) -> String {
    format!("progress:{user_id}")
}

impl RiskTracker {
    pub fn new(kv: Arc<dyn KeyValueStore>, config: &RiskConfig) -> Self {
        Self {
            kv,
            capacity: config.ring_capacity.max(1),
        }
    }

    /// Push an event to the head of the ring; the oldest falls off past
    /// capacity.
    pub async fn record(
        &self,
        user_id: &str,
        level: RiskLevel,
        keywords: &BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let event = RiskEvent {
            timestamp: now,
            risk_level: level,
            keywords: keywords.clone(),
        };
        let encoded = serde_json::to_string(&event)?;
        self.kv
            .push_front_capped(&ring_key(user_id), &encoded, self.capacity)
            .await?;
        if level == RiskLevel::High {
            tracing::warn!("🚨 High risk recorded for {user_id}: {keywords:?}");
        }
        Ok(())
    }

    /// Events newest first. Entries that fail to decode are skipped.
    pub async fn events(&self, user_id: &str) -> Result<Vec<RiskEvent>> {
        let raw = self.kv.list_all(&ring_key(user_id)).await?;
        Ok(raw
            .iter()
            .filter_map(|r| match serde_json::from_str::<RiskEvent>(r) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!("⚠️ Skipping undecodable risk event for {user_id}: {e}");
                    None
                }
            })
            .collect())
    }

    /// `None` when the ring is empty.
    pub async fn report(&self, user_id: &str) -> Result<Option<RiskReport>> {
        let events = self.events(user_id).await?;
        let (Some(earliest), Some(latest)) = (
            events.iter().map(|e| e.timestamp).min(),
            events.iter().map(|e| e.timestamp).max(),
        ) else {
            return Ok(None);
        };
        let count = |level: RiskLevel| events.iter().filter(|e| e.risk_level == level).count();
        Ok(Some(RiskReport {
            total: events.len(),
            high: count(RiskLevel::High),
            medium: count(RiskLevel::Medium),
            low: count(RiskLevel::Low),
            earliest,
            latest,
        }))
    }
}
