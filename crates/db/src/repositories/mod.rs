use async_trait::async_trait;
use thiserror::Error;

use outreach_core::domain::conversation::{ConversationId, ProfileUpdate, Turn, UserProfile};

pub mod conversation;
pub mod memory;

pub use conversation::SqlConversationStore;
pub use memory::InMemoryConversationStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("unknown conversation: {0}")]
    UnknownConversation(String),
}

/// Persistence consumed by the reply pipeline. Each call is an independent statement
/// except [`ConversationStore::save_interaction`], which writes both turns atomically.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Creates the conversation row with an empty profile if it does not exist yet.
    async fn ensure_user(&self, id: &ConversationId) -> Result<(), RepositoryError>;

    /// Unknown identities yield an empty profile.
    async fn get_profile(&self, id: &ConversationId) -> Result<UserProfile, RepositoryError>;

    /// Coalescing update: `None` fields keep their stored value.
    async fn update_profile(
        &self,
        id: &ConversationId,
        update: &ProfileUpdate,
    ) -> Result<(), RepositoryError>;

    async fn has_any_history(&self, id: &ConversationId) -> Result<bool, RepositoryError>;

    /// True when any assistant turn for `id` contains `link_domain`.
    async fn has_link_been_sent(
        &self,
        id: &ConversationId,
        link_domain: &str,
    ) -> Result<bool, RepositoryError>;

    /// The most recent `limit` turns, oldest first.
    async fn get_recent_history(
        &self,
        id: &ConversationId,
        limit: u32,
    ) -> Result<Vec<Turn>, RepositoryError>;

    async fn save_interaction(
        &self,
        id: &ConversationId,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<(), RepositoryError>;
}
