//! Slash commands.

use jaidee_core::error::Result;
use jaidee_core::types::Role;

use crate::engine::{ConversationEngine, degrade};
use crate::messages;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Reset,
    Help,
    Status,
    Emergency,
    Progress,
    Feedback,
    Unknown(String),
}

impl Command {
    /// `None` unless the text starts with `/`. Only the first word counts.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if !text.starts_with('/') {
            return None;
        }
        let word = text.split_whitespace().next().unwrap_or(text).to_lowercase();
        Some(match word.as_str() {
            "/reset" => Self::Reset,
            "/help" => Self::Help,
            "/status" => Self::Status,
            "/emergency" => Self::Emergency,
            "/progress" => Self::Progress,
            "/feedback" => Self::Feedback,
            _ => Self::Unknown(word),
        })
    }
}

impl ConversationEngine {
    pub(crate) async fn run_command(&self, user_id: &str, command: &Command) -> Result<String> {
        tracing::info!("⌨️ {user_id} ran {command:?}");
        let reply = match command {
            Command::Reset => {
                let removed = self.store.delete_all_turns(user_id).await?;
                self.sessions.evict(user_id).await?;
                tracing::info!("🗑️ Reset {user_id}: {removed} turns removed");
                messages::RESET_DONE.to_string()
            }
            Command::Help => messages::HELP.to_string(),
            Command::Status => self.status_text(user_id).await,
            Command::Emergency => messages::EMERGENCY.to_string(),
            Command::Progress => match self.risk.report(user_id).await? {
                Some(report) => format!("📊 Progress report\n\n{}", report.render()),
                None => messages::NO_PROGRESS.to_string(),
            },
            Command::Feedback => messages::FEEDBACK.to_string(),
            Command::Unknown(_) => messages::UNKNOWN_COMMAND.to_string(),
        };
        Ok(reply)
    }

    async fn status_text(&self, user_id: &str) -> String {
        let turns = self.store.query_turns(user_id).await;
        let turns = degrade(turns, Vec::new(), "status history", user_id);
        let important = turns.iter().filter(|t| t.is_important()).count();
        let total_tokens: usize = turns.iter().map(|t| t.token_count).sum();
        let last_interaction = turns
            .first()
            .map(|t| t.timestamp.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        let session = self.sessions.load(user_id).await;
        let session = degrade(session, Vec::new(), "status session", user_id);
        let session_text: String = session
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| m.content.as_str())
            .collect();
        let session_tokens = self.tokens.estimate(&session_text);
        let session_state = if session.is_empty() { "🔴 closed" } else { "🟢 active" };

        format!(
            "📈 Usage statistics\n\
             ▫️ Saved conversations: {}\n\
             ▫️ Important messages: {important}\n\
             ▫️ Last interaction: {last_interaction}\n\
             ▫️ Current session: {session_state}\n\
             🔢 Total tokens used: {total_tokens}\n\
             🔄 Tokens in this session: {session_tokens}",
            turns.len(),
        )
    }
}
