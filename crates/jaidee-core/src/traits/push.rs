//! Push-notification collaborator.

use async_trait::async_trait;

use crate::error::Result;

/// Best-effort delivery of a text to a user endpoint.
///
/// Callers log failures and never retry.
#[async_trait]
pub trait PushChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, user_id: &str, text: &str) -> Result<()>;
}
