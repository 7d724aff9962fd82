use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use outreach_core::domain::conversation::{ConversationId, ProfileUpdate, Role, Turn, UserProfile};

use super::{ConversationStore, RepositoryError};

#[derive(Default)]
struct ConversationRecord {
    profile: UserProfile,
    turns: Vec<Turn>,
}

#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<String, ConversationRecord>>,
}

#[async_trait::async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn ensure_user(&self, id: &ConversationId) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        conversations.entry(id.0.clone()).or_default();
        Ok(())
    }

    async fn get_profile(&self, id: &ConversationId) -> Result<UserProfile, RepositoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(&id.0).map(|record| record.profile.clone()).unwrap_or_default())
    }

    async fn update_profile(
        &self,
        id: &ConversationId,
        update: &ProfileUpdate,
    ) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        if let Some(record) = conversations.get_mut(&id.0) {
            if let Some(name) = &update.name {
                record.profile.name = Some(name.clone());
            }
            if let Some(municipality) = &update.municipality {
                record.profile.municipality = Some(municipality.clone());
            }
        }
        Ok(())
    }

    async fn has_any_history(&self, id: &ConversationId) -> Result<bool, RepositoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(&id.0).is_some_and(|record| !record.turns.is_empty()))
    }

    async fn has_link_been_sent(
        &self,
        id: &ConversationId,
        link_domain: &str,
    ) -> Result<bool, RepositoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(&id.0).is_some_and(|record| {
            record
                .turns
                .iter()
                .any(|turn| turn.role == Role::Assistant && turn.text.contains(link_domain))
        }))
    }

    async fn get_recent_history(
        &self,
        id: &ConversationId,
        limit: u32,
    ) -> Result<Vec<Turn>, RepositoryError> {
        let conversations = self.conversations.read().await;
        let Some(record) = conversations.get(&id.0) else {
            return Ok(Vec::new());
        };
        let skip = record.turns.len().saturating_sub(limit as usize);
        Ok(record.turns[skip..].to_vec())
    }

    async fn save_interaction(
        &self,
        id: &ConversationId,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        let record = conversations
            .get_mut(&id.0)
            .ok_or_else(|| RepositoryError::UnknownConversation(id.redacted()))?;

        let created_at = Utc::now();
        record.turns.push(Turn { role: Role::User, text: user_text.to_string(), created_at });
        record.turns.push(Turn {
            role: Role::Assistant,
            text: assistant_text.to_string(),
            created_at,
        });
        Ok(())
    }
}
