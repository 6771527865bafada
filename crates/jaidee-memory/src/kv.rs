//! In-process key-value store with per-key TTL.
//!
//! Expiry is lazy: a key past its deadline is dropped the next time anything
//! touches it (or on [`MemoryKv::purge_expired`]). Deadlines use tokio's clock
//! so tests can drive them with a paused runtime.

use async_trait::async_trait;
use jaidee_core::error::{JaideeError, Result};
use jaidee_core::traits::KeyValueStore;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

enum SlotValue {
    Text(String),
    List(VecDeque<String>),
}

struct Slot {
    value: SlotValue,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Default)]
struct SortedSet {
    by_member: HashMap<String, i64>,
    ordered: BTreeSet<(i64, String)>,
}

impl SortedSet {
    fn upsert(&mut self, member: &str, score: i64) {
        if let Some(old) = self.by_member.insert(member.to_string(), score) {
            self.ordered.remove(&(old, member.to_string()));
        }
        self.ordered.insert((score, member.to_string()));
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.by_member.remove(member) {
            Some(score) => {
                self.ordered.remove(&(score, member.to_string()));
                true
            }
            None => false,
        }
    }

    fn range_to(&self, max: i64) -> Vec<(String, i64)> {
        self.ordered
            .iter()
            .take_while(|(score, _)| *score <= max)
            .map(|(score, member)| (member.clone(), *score))
            .collect()
    }
}

#[derive(Default)]
struct KvState {
    slots: HashMap<String, Slot>,
    sorted: HashMap<String, SortedSet>,
}

impl KvState {
    /// Live slot for `key`, dropping it first when expired.
    fn live(&mut self, key: &str, now: Instant) -> Option<&mut Slot> {
        if self.slots.get(key).is_some_and(|s| s.is_expired(now)) {
            self.slots.remove(key);
            return None;
        }
        self.slots.get_mut(key)
    }
}

/// Shared in-process store. Cheap to wrap in an `Arc` and hand to every
/// component.
#[derive(Default)]
pub struct MemoryKv {
    state: Mutex<KvState>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, KvState>> {
        self.state.lock().map_err(|e| JaideeError::Kv(e.to_string()))
    }

    /// Drop every expired key now. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = Instant::now();
        let mut state = self.state()?;
        let before = state.slots.len();
        state.slots.retain(|_, slot| !slot.is_expired(now));
        let removed = before - state.slots.len();
        if removed > 0 {
            tracing::debug!("🧹 Purged {removed} expired keys");
        }
        Ok(removed)
    }
}

fn deadline(now: Instant, ttl: Option<Duration>) -> Option<Instant> {
    ttl.map(|d| now + d)
}

fn wrong_type(key: &str) -> JaideeError {
    JaideeError::Kv(format!("WRONGTYPE operation against key '{key}'"))
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    fn name(&self) -> &str {
        "memory"
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let now = Instant::now();
        let mut state = self.state()?;
        state.slots.insert(
            key.to_string(),
            Slot {
                value: SlotValue::Text(value.to_string()),
                expires_at: deadline(now, ttl),
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        let now = Instant::now();
        let mut state = self.state()?;
        if state.live(key, now).is_some() {
            return Ok(false);
        }
        state.slots.insert(
            key.to_string(),
            Slot {
                value: SlotValue::Text(value.to_string()),
                expires_at: deadline(now, ttl),
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let mut state = self.state()?;
        match state.live(key, now) {
            Some(Slot { value: SlotValue::Text(v), .. }) => Ok(Some(v.clone())),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let mut state = self.state()?;
        let live = state.live(key, now).is_some();
        state.slots.remove(key);
        Ok(live)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let mut state = self.state()?;
        Ok(state.live(key, now).is_some())
    }

    async fn push_front_capped(&self, key: &str, value: &str, capacity: usize) -> Result<()> {
        let now = Instant::now();
        let mut state = self.state()?;
        if state.live(key, now).is_none() {
            state.slots.insert(
                key.to_string(),
                Slot { value: SlotValue::List(VecDeque::new()), expires_at: None },
            );
        }
        match state.slots.get_mut(key) {
            Some(Slot { value: SlotValue::List(list), .. }) => {
                list.push_front(value.to_string());
                list.truncate(capacity);
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn list_all(&self, key: &str) -> Result<Vec<String>> {
        let now = Instant::now();
        let mut state = self.state()?;
        match state.live(key, now) {
            Some(Slot { value: SlotValue::List(list), .. }) => Ok(list.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn upsert(&self, set: &str, member: &str, score: i64) -> Result<()> {
        let mut state = self.state()?;
        state.sorted.entry(set.to_string()).or_default().upsert(member, score);
        Ok(())
    }

    async fn range_by_score(&self, set: &str, max: i64) -> Result<Vec<(String, i64)>> {
        let state = self.state()?;
        Ok(state.sorted.get(set).map(|s| s.range_to(max)).unwrap_or_default())
    }

    async fn remove(&self, set: &str, member: &str) -> Result<bool> {
        let mut state = self.state()?;
        Ok(state.sorted.get_mut(set).is_some_and(|s| s.remove(member)))
    }

    async fn score(&self, set: &str, member: &str) -> Result<Option<i64>> {
        let state = self.state()?;
        Ok(state.sorted.get(set).and_then(|s| s.by_member.get(member).copied()))
    }
}
