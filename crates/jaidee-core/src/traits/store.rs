//! Durable conversation log collaborator.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ConversationTurn;

/// Append-only turn log keyed by user. Assumed durable and immediately
/// consistent per user.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    fn name(&self) -> &str;

    /// Persist a turn and return the id the store assigned to it.
    async fn append_turn(&self, turn: &ConversationTurn) -> Result<i64>;

    /// All turns of a user, newest first.
    async fn query_turns(&self, user_id: &str) -> Result<Vec<ConversationTurn>>;

    /// Remove every turn of a user. Returns how many were removed.
    async fn delete_all_turns(&self, user_id: &str) -> Result<usize>;
}
