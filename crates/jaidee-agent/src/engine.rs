//! Conversation engine.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use jaidee_core::config::JaideeConfig;
use jaidee_core::error::Result;
use jaidee_core::traits::{
    CompletionOptions, ConversationStore, KeyValueStore, PushChannel, TextCompletion,
};
use jaidee_core::types::{ChatMessage, ConversationTurn, RiskLevel};
use jaidee_scheduler::{DeliveryAttempt, FollowUpScheduler};
use jaidee_session::packer;
use jaidee_session::{ActivityTracker, RiskTracker, SessionStore, TokenEstimator, UserLock};
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::classifier::{KeywordRiskClassifier, RiskClassifier};
use crate::commands::Command;
use crate::messages;

/// What the caller should send back for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundReply {
    pub reply_text: Option<String>,
    pub risk_level: Option<RiskLevel>,
    /// The message was dropped because another one for the same user is
    /// still being processed.
    pub locked: bool,
}

impl InboundReply {
    fn text(text: &str) -> Self {
        Self { reply_text: Some(text.to_string()), risk_level: None, locked: false }
    }

    fn locked() -> Self {
        Self { reply_text: None, risk_level: None, locked: true }
    }
}

/// Log a degraded step and carry on with `fallback`.
pub(crate) fn degrade<T>(result: Result<T>, fallback: T, step: &str, user_id: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("⚠️ {step} failed for {user_id}, continuing: {e}");
            fallback
        }
    }
}

pub struct ConversationEngine {
    pub(crate) lock: UserLock,
    pub(crate) sessions: SessionStore,
    pub(crate) activity: ActivityTracker,
    pub(crate) risk: RiskTracker,
    pub(crate) follow_ups: FollowUpScheduler,
    pub(crate) tokens: TokenEstimator,
    pub(crate) classifier: Arc<dyn RiskClassifier>,
    pub(crate) store: Arc<dyn ConversationStore>,
    pub(crate) completion: Arc<dyn TextCompletion>,
    pub(crate) push: Arc<dyn PushChannel>,
    system_prompt: String,
    reply_options: CompletionOptions,
    summary_options: CompletionOptions,
    history_budget: usize,
    summary_threshold: usize,
}

impl ConversationEngine {
    /// Wire every component onto the shared collaborators. `config` is
    /// expected to have passed `validate()`.
    pub fn new(
        config: &JaideeConfig,
        kv: Arc<dyn KeyValueStore>,
        store: Arc<dyn ConversationStore>,
        completion: Arc<dyn TextCompletion>,
        push: Arc<dyn PushChannel>,
    ) -> Result<Self> {
        Ok(Self {
            lock: UserLock::new(kv.clone(), &config.lock),
            sessions: SessionStore::new(kv.clone(), &config.session),
            activity: ActivityTracker::new(kv.clone(), push.clone(), &config.session),
            risk: RiskTracker::new(kv.clone(), &config.risk),
            follow_ups: FollowUpScheduler::new(kv, &config.follow_up),
            tokens: TokenEstimator::new(&config.tokens)?,
            classifier: Arc::new(KeywordRiskClassifier::new(&config.risk)),
            store,
            completion,
            push,
            system_prompt: config.llm.system_prompt.clone(),
            reply_options: config.llm.reply_options(),
            summary_options: config.llm.summary_options(),
            history_budget: config.history.budget_tokens,
            summary_threshold: config.history.summary_threshold,
        })
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn RiskClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Process one inbound message end to end.
    ///
    /// Never fails: every error degrades to a generic reply, and the user's
    /// lock is released on every exit, panics included.
    pub async fn handle_inbound_message(
        &self,
        user_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> InboundReply {
        match self.lock.try_acquire(user_id).await {
            Ok(true) => {}
            Ok(false) => {
                self.send_busy_notice(user_id).await;
                return InboundReply::locked();
            }
            Err(e) => {
                tracing::error!("❌ Lock store unavailable for {user_id}: {e}");
                return InboundReply::text(messages::APOLOGY);
            }
        }

        let outcome = AssertUnwindSafe(self.process(user_id, text, now))
            .catch_unwind()
            .await;

        if let Err(e) = self.lock.release(user_id).await {
            tracing::error!("❌ Failed to release lock for {user_id}: {e}");
        }

        match outcome {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::error!("❌ Message handling failed for {user_id}: {e}");
                InboundReply::text(messages::APOLOGY)
            }
            Err(_) => {
                tracing::error!("❌ Message handling panicked for {user_id}");
                InboundReply::text(messages::APOLOGY)
            }
        }
    }

    async fn send_busy_notice(&self, user_id: &str) {
        let claimed = self.lock.claim_busy_notice(user_id).await;
        if !degrade(claimed, false, "busy notice", user_id) {
            return;
        }
        if let Err(e) = self.push.send(user_id, messages::BUSY_NOTICE).await {
            tracing::warn!("⚠️ Busy notice to {user_id} failed: {e}");
        }
    }

    async fn process(&self, user_id: &str, text: &str, now: DateTime<Utc>) -> Result<InboundReply> {
        degrade(self.lock.clear_busy_notice(user_id).await, (), "clearing busy notice", user_id);

        if degrade(self.activity.is_expired(user_id, now).await, false, "expiry check", user_id) {
            tracing::info!("⌛ Session expired for {user_id}");
            let evicted = self.sessions.evict(user_id).await.map(|_| ());
            degrade(evicted, (), "session eviction", user_id);
            degrade(self.activity.reset(user_id).await, (), "activity reset", user_id);
            return Ok(InboundReply::text(messages::SESSION_EXPIRED));
        }

        degrade(self.activity.touch(user_id, now).await.map(|_| ()), (), "activity touch", user_id);

        if let Some(command) = Command::parse(text) {
            let reply = self.run_command(user_id, &command).await?;
            return Ok(InboundReply::text(&reply));
        }

        let session = self.sessions.load(user_id).await;
        let session = degrade(session, Vec::new(), "session load", user_id);
        let history = self.history_context(user_id, session.is_empty()).await;

        let assessment = self.classifier.assess(text);
        degrade(
            self.risk.record(user_id, assessment.level, &assessment.keywords, now).await,
            (),
            "risk record",
            user_id,
        );
        if assessment.level == RiskLevel::High {
            if let Err(e) = self.push.send(user_id, messages::EMERGENCY_NOTICE).await {
                tracing::error!("❌ Emergency notice to {user_id} failed: {e}");
            }
        }

        let mut request = Vec::with_capacity(history.len() + session.len() + 2);
        request.push(ChatMessage::system(&self.system_prompt));
        request.extend(history);
        request.extend(session.iter().cloned());
        request.push(ChatMessage::user(text));

        let bot_text = match self.completion.complete(&request, &self.reply_options).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("❌ Completion failed for {user_id}: {e}");
                return Ok(InboundReply {
                    reply_text: Some(messages::APOLOGY.to_string()),
                    risk_level: Some(assessment.level),
                    locked: false,
                });
            }
        };

        let mut updated = session;
        updated.push(ChatMessage::user(text));
        updated.push(ChatMessage::assistant(&bot_text));
        let saved = self.sessions.save(user_id, &updated, now).await.map(|_| ());
        degrade(saved, (), "session save", user_id);

        let token_count = self.tokens.estimate(&format!("{text}{bot_text}"));
        let turn = ConversationTurn::new(user_id, now, text, &bot_text, token_count);
        degrade(self.store.append_turn(&turn).await.map(|_| ()), (), "turn append", user_id);

        degrade(
            self.follow_ups.schedule(user_id, now, now).await.map(|_| ()),
            (),
            "follow-up schedule",
            user_id,
        );

        Ok(InboundReply {
            reply_text: Some(bot_text),
            risk_level: Some(assessment.level),
            locked: false,
        })
    }

    /// Context drawn from the persistent log.
    ///
    /// The packed history is put in time order. When it holds more than
    /// `summary_threshold` turns, everything but the newest ones is folded
    /// into a single summary message. The newest turns are replayed only
    /// when the session cache is empty, since the session already holds
    /// them otherwise.
    async fn history_context(&self, user_id: &str, replay_recent: bool) -> Vec<ChatMessage> {
        let turns = self.store.query_turns(user_id).await;
        let turns = degrade(turns, Vec::new(), "history query", user_id);
        let mut packed = packer::pack(&turns, self.history_budget);
        packer::sort_chronological(&mut packed);

        let split = packed.len().saturating_sub(self.summary_threshold);
        let (older, recent) = packed.split_at(split);

        let mut context = Vec::new();
        if packed.len() > self.summary_threshold {
            if let Some(summary) = self.summarize(user_id, older).await {
                let text = format!("{}{summary}", messages::SUMMARY_PREFIX);
                context.push(ChatMessage::assistant(&text));
            }
        }
        if replay_recent {
            for turn in recent {
                context.push(ChatMessage::user(&turn.user_text));
                context.push(ChatMessage::assistant(&turn.bot_text));
            }
        }
        context
    }

    async fn summarize(&self, user_id: &str, turns: &[&ConversationTurn]) -> Option<String> {
        if turns.is_empty() {
            return None;
        }
        let mut prompt = String::from(messages::SUMMARY_INSTRUCTION);
        for turn in turns {
            prompt.push_str(&format!("\nUser: {}\nJaidee: {}\n", turn.user_text, turn.bot_text));
        }
        let request = [ChatMessage::system(&self.system_prompt), ChatMessage::user(&prompt)];
        match self.completion.complete(&request, &self.summary_options).await {
            Ok(summary) if !summary.trim().is_empty() => {
                tracing::debug!("📝 Summarized {} older turns for {user_id}", turns.len());
                Some(summary)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("⚠️ History summary failed for {user_id}: {e}");
                None
            }
        }
    }

    /// Drain due follow-ups and push the check-in text to each user.
    ///
    /// Entries are already off the queue when delivery is attempted; a
    /// failed push is reported and logged, never retried. No user lock is
    /// taken here.
    pub async fn run_scheduled_follow_up_poll(&self, now: DateTime<Utc>) -> Vec<DeliveryAttempt> {
        let due = match self.follow_ups.poll(now).await {
            Ok(due) => due,
            Err(e) => {
                tracing::error!("❌ Follow-up poll failed: {e}");
                return Vec::new();
            }
        };

        let mut attempts = Vec::with_capacity(due.len());
        for entry in due {
            match self.push.send(&entry.user_id, messages::FOLLOW_UP).await {
                Ok(()) => {
                    tracing::info!("📨 Follow-up sent to {}", entry.user_id);
                    attempts.push(DeliveryAttempt::delivered(&entry.user_id, entry.due_at));
                }
                Err(e) => {
                    tracing::error!("❌ Follow-up to {} failed: {e}", entry.user_id);
                    attempts.push(DeliveryAttempt::failed(&entry.user_id, entry.due_at, e));
                }
            }
        }
        attempts
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use jaidee_core::error::JaideeError;
    use jaidee_memory::{MemoryKv, SqliteConversationStore};
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;

    /// Replies from a script, then falls back to a fixed text.
    #[derive(Default)]
    pub(crate) struct ScriptedCompletion {
        pub script: Mutex<VecDeque<Result<String>>>,
        pub calls: Mutex<Vec<Vec<ChatMessage>>>,
        pub panic: bool,
    }

    impl ScriptedCompletion {
        pub fn replying(replies: &[&str]) -> Self {
            let script = replies.iter().map(|r| Ok(r.to_string())).collect();
            Self { script: Mutex::new(script), ..Default::default() }
        }

        pub fn failing() -> Self {
            let script = (0..8).map(|_| Err(JaideeError::Remote("503".into()))).collect();
            Self { script: Mutex::new(script), ..Default::default() }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextCompletion for ScriptedCompletion {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            messages: &[ChatMessage],
            _options: &CompletionOptions,
        ) -> Result<String> {
            self.calls.lock().unwrap().push(messages.to_vec());
            if self.panic {
                panic!("completion backend blew up");
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("I'm here for you.".to_string()))
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingPush {
        pub sent: Mutex<Vec<(String, String)>>,
        pub unreachable: HashSet<String>,
    }

    impl RecordingPush {
        pub fn texts_to(&self, user_id: &str) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(u, _)| u == user_id)
                .map(|(_, t)| t.clone())
                .collect()
        }
    }

    #[async_trait]
    impl PushChannel for RecordingPush {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, user_id: &str, text: &str) -> Result<()> {
            if self.unreachable.contains(user_id) {
                return Err(JaideeError::Push(format!("{user_id} unreachable")));
            }
            self.sent.lock().unwrap().push((user_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    pub(crate) struct DownStore;

    #[async_trait]
    impl ConversationStore for DownStore {
        fn name(&self) -> &str {
            "down"
        }

        async fn append_turn(&self, _turn: &ConversationTurn) -> Result<i64> {
            Err(JaideeError::Store("connection refused".into()))
        }

        async fn query_turns(&self, _user_id: &str) -> Result<Vec<ConversationTurn>> {
            Err(JaideeError::Store("connection refused".into()))
        }

        async fn delete_all_turns(&self, _user_id: &str) -> Result<usize> {
            Err(JaideeError::Store("connection refused".into()))
        }
    }

    pub(crate) struct Harness {
        pub kv: Arc<MemoryKv>,
        pub store: Arc<dyn ConversationStore>,
        pub completion: Arc<ScriptedCompletion>,
        pub push: Arc<RecordingPush>,
        pub engine: ConversationEngine,
    }

    impl Harness {
        pub fn with(
            store: Arc<dyn ConversationStore>,
            completion: ScriptedCompletion,
            push: RecordingPush,
        ) -> Self {
            let kv = Arc::new(MemoryKv::new());
            let completion = Arc::new(completion);
            let push = Arc::new(push);
            let engine = ConversationEngine::new(
                &JaideeConfig::default(),
                kv.clone(),
                store.clone(),
                completion.clone(),
                push.clone(),
            )
            .unwrap();
            Self { kv, store, completion, push, engine }
        }

        pub fn new(completion: ScriptedCompletion) -> Self {
            let store = Arc::new(SqliteConversationStore::in_memory().unwrap());
            Self::with(store, completion, RecordingPush::default())
        }
    }

    pub(crate) fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_happy_path_persists_and_schedules() {
        let h = Harness::new(ScriptedCompletion::replying(&["Tell me more."]));
        let reply = h.engine.handle_inbound_message("u1", "hello there", t0()).await;

        assert_eq!(reply.reply_text.as_deref(), Some("Tell me more."));
        assert_eq!(reply.risk_level, Some(RiskLevel::Low));
        assert!(!reply.locked);
        assert!(!h.engine.lock.is_locked("u1").await.unwrap());

        let turns = h.store.query_turns("u1").await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].token_count, h.engine.tokens.estimate("hello thereTell me more."));

        let session = h.engine.sessions.load("u1").await.unwrap();
        assert_eq!(
            session,
            vec![ChatMessage::user("hello there"), ChatMessage::assistant("Tell me more.")]
        );

        let due = t0() + chrono::Duration::days(1);
        assert_eq!(h.engine.follow_ups.pending("u1").await.unwrap(), Some(due));

        // system prompt first, user text last
        let calls = h.completion.calls.lock().unwrap();
        assert_eq!(calls[0].first().map(|m| m.role), Some(jaidee_core::types::Role::System));
        assert_eq!(calls[0].last(), Some(&ChatMessage::user("hello there")));
    }

    #[tokio::test]
    async fn test_session_carries_into_next_request() {
        let h = Harness::new(ScriptedCompletion::replying(&["first", "second"]));
        h.engine.handle_inbound_message("u1", "one", t0()).await;
        h.engine.handle_inbound_message("u1", "two", t0()).await;

        let calls = h.completion.calls.lock().unwrap();
        let second = &calls[1];
        assert!(second.contains(&ChatMessage::user("one")));
        assert!(second.contains(&ChatMessage::assistant("first")));
        // the session already holds the exchange, so it is not replayed twice
        assert_eq!(second.iter().filter(|m| m.content == "one").count(), 1);
    }

    #[tokio::test]
    async fn test_locked_user_gets_one_notice() {
        let h = Harness::new(ScriptedCompletion::default());
        assert!(h.engine.lock.try_acquire("u1").await.unwrap());

        let first = h.engine.handle_inbound_message("u1", "hello?", t0()).await;
        let second = h.engine.handle_inbound_message("u1", "hello??", t0()).await;
        assert_eq!(first, InboundReply { reply_text: None, risk_level: None, locked: true });
        assert!(second.locked);
        assert_eq!(h.push.texts_to("u1"), vec![messages::BUSY_NOTICE.to_string()]);
        assert_eq!(h.completion.call_count(), 0);

        // the holder finishes; the next message goes through and re-arms the notice
        h.engine.lock.release("u1").await.unwrap();
        let third = h.engine.handle_inbound_message("u1", "now?", t0()).await;
        assert!(!third.locked);
        assert!(h.engine.lock.claim_busy_notice("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_other_users_unaffected_by_lock() {
        let h = Harness::new(ScriptedCompletion::default());
        assert!(h.engine.lock.try_acquire("u1").await.unwrap());
        let reply = h.engine.handle_inbound_message("u2", "hi", t0()).await;
        assert!(!reply.locked);
        assert!(reply.reply_text.is_some());
    }

    #[tokio::test]
    async fn test_remote_failure_apologizes_and_persists_nothing() {
        let h = Harness::new(ScriptedCompletion::failing());
        let reply = h.engine.handle_inbound_message("u1", "hello", t0()).await;

        assert_eq!(reply.reply_text.as_deref(), Some(messages::APOLOGY));
        assert!(h.store.query_turns("u1").await.unwrap().is_empty());
        assert!(h.engine.sessions.load("u1").await.unwrap().is_empty());
        assert_eq!(h.engine.follow_ups.pending("u1").await.unwrap(), None);
        assert!(!h.engine.lock.is_locked("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_down_still_replies() {
        let h = Harness::with(
            Arc::new(DownStore),
            ScriptedCompletion::replying(&["still here"]),
            RecordingPush::default(),
        );
        let reply = h.engine.handle_inbound_message("u1", "hello", t0()).await;
        assert_eq!(reply.reply_text.as_deref(), Some("still here"));
        assert!(h.engine.follow_ups.pending("u1").await.unwrap().is_some());
        assert!(!h.engine.lock.is_locked("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_panic_releases_lock() {
        let completion = ScriptedCompletion { panic: true, ..Default::default() };
        let h = Harness::new(completion);
        let reply = h.engine.handle_inbound_message("u1", "hello", t0()).await;
        assert_eq!(reply.reply_text.as_deref(), Some(messages::APOLOGY));
        assert!(!h.engine.lock.is_locked("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_high_risk_pushes_emergency_notice() {
        let h = Harness::new(ScriptedCompletion::replying(&["I'm worried about you."]));
        let reply = h
            .engine
            .handle_inbound_message("u1", "I took an overdose last night", t0())
            .await;

        assert_eq!(reply.risk_level, Some(RiskLevel::High));
        assert_eq!(reply.reply_text.as_deref(), Some("I'm worried about you."));
        assert_eq!(h.push.texts_to("u1"), vec![messages::EMERGENCY_NOTICE.to_string()]);

        let events = h.engine.risk.events("u1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].keywords.contains("overdose"));
    }

    #[tokio::test]
    async fn test_risk_recorded_even_when_completion_fails() {
        let h = Harness::new(ScriptedCompletion::failing());
        let reply = h.engine.handle_inbound_message("u1", "so stressed", t0()).await;
        assert_eq!(reply.risk_level, Some(RiskLevel::Medium));
        assert_eq!(h.engine.risk.events("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_session_starts_fresh() {
        let h = Harness::new(ScriptedCompletion::replying(&["welcome back"]));
        let stale = t0() - chrono::Duration::days(8);
        h.kv.set("last_activity:u1", &stale.timestamp().to_string(), None).await.unwrap();
        h.engine.sessions.save("u1", &[ChatMessage::user("old")], stale).await.unwrap();

        let reply = h.engine.handle_inbound_message("u1", "hi again", t0()).await;
        assert_eq!(reply.reply_text.as_deref(), Some(messages::SESSION_EXPIRED));
        assert!(!h.engine.sessions.exists("u1").await.unwrap());
        assert_eq!(h.completion.call_count(), 0);
        assert!(!h.engine.lock.is_locked("u1").await.unwrap());

        // the next message is handled normally
        let reply = h.engine.handle_inbound_message("u1", "hi again", t0()).await;
        assert_eq!(reply.reply_text.as_deref(), Some("welcome back"));
    }

    #[tokio::test]
    async fn test_long_history_is_summarized() {
        let h = Harness::new(ScriptedCompletion::replying(&["SUMMARY", "reply"]));
        for i in 0..8 {
            let at = t0() - chrono::Duration::hours(10 - i);
            let turn = ConversationTurn::new("u1", at, &format!("question {i}"), "answer", 5);
            h.store.append_turn(&turn).await.unwrap();
        }

        let reply = h.engine.handle_inbound_message("u1", "latest", t0()).await;
        assert_eq!(reply.reply_text.as_deref(), Some("reply"));

        let calls = h.completion.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        let summary_prompt = &calls[0][1].content;
        assert!(summary_prompt.contains("question 0"));
        assert!(summary_prompt.contains("question 2"));
        assert!(!summary_prompt.contains("question 3"));

        let request = &calls[1];
        let summary = format!("{}SUMMARY", messages::SUMMARY_PREFIX);
        assert_eq!(request[1], ChatMessage::assistant(&summary));
        // empty session, so the newest five turns are replayed in order
        assert_eq!(request[2], ChatMessage::user("question 3"));
        assert_eq!(request[request.len() - 2], ChatMessage::assistant("answer"));
        assert_eq!(request.last(), Some(&ChatMessage::user("latest")));
    }

    #[tokio::test]
    async fn test_summary_failure_is_skipped() {
        let completion = ScriptedCompletion::replying(&[]);
        completion
            .script
            .lock()
            .unwrap()
            .extend([Err(JaideeError::Remote("timeout".into())), Ok("reply".to_string())]);
        let h = Harness::new(completion);
        for i in 0..7 {
            let at = t0() - chrono::Duration::hours(10 - i);
            let turn = ConversationTurn::new("u1", at, "q", "a", 5);
            h.store.append_turn(&turn).await.unwrap();
        }
        let reply = h.engine.handle_inbound_message("u1", "latest", t0()).await;
        assert_eq!(reply.reply_text.as_deref(), Some("reply"));
        let calls = h.completion.calls.lock().unwrap();
        assert!(!calls[1].iter().any(|m| m.content.starts_with(messages::SUMMARY_PREFIX)));
    }

    #[tokio::test]
    async fn test_follow_up_poll_delivers_and_drains() {
        let push = RecordingPush {
            unreachable: ["u2".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let store = Arc::new(SqliteConversationStore::in_memory().unwrap());
        let h = Harness::with(store, ScriptedCompletion::default(), push);
        h.engine.follow_ups.schedule("u1", t0(), t0()).await.unwrap();
        h.engine.follow_ups.schedule("u2", t0(), t0()).await.unwrap();
        h.engine.follow_ups.schedule("u3", t0() + chrono::Duration::days(5), t0()).await.unwrap();

        let due = t0() + chrono::Duration::days(1);
        let attempts = h.engine.run_scheduled_follow_up_poll(due).await;
        assert_eq!(attempts.len(), 2);
        let delivered: Vec<&str> = attempts
            .iter()
            .filter(|a| a.delivered)
            .map(|a| a.user_id.as_str())
            .collect();
        assert_eq!(delivered, vec!["u1"]);
        assert!(attempts.iter().any(|a| a.user_id == "u2" && a.error.is_some()));
        assert_eq!(h.push.texts_to("u1"), vec![messages::FOLLOW_UP.to_string()]);

        // failed delivery is not re-queued
        assert!(h.engine.run_scheduled_follow_up_poll(due).await.is_empty());
        assert!(h.engine.follow_ups.pending("u3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_poll_ignores_user_locks() {
        let h = Harness::new(ScriptedCompletion::default());
        h.engine.follow_ups.schedule("u1", t0(), t0()).await.unwrap();
        assert!(h.engine.lock.try_acquire("u1").await.unwrap());
        let later = t0() + chrono::Duration::days(2);
        let attempts = h.engine.run_scheduled_follow_up_poll(later).await;
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].delivered);
        assert!(h.engine.lock.is_locked("u1").await.unwrap());
    }
}
