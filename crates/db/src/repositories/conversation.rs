use chrono::{DateTime, Utc};
use sqlx::Row;

use outreach_core::domain::conversation::{ConversationId, ProfileUpdate, Role, Turn, UserProfile};

use super::{ConversationStore, RepositoryError};
use crate::DbPool;

pub struct SqlConversationStore {
    pool: DbPool,
}

impl SqlConversationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn conversation_count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM conversations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait::async_trait]
impl ConversationStore for SqlConversationStore {
    async fn ensure_user(&self, id: &ConversationId) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO conversations (identity, created_at) VALUES (?, ?) \
             ON CONFLICT (identity) DO NOTHING",
        )
        .bind(id.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_profile(&self, id: &ConversationId) -> Result<UserProfile, RepositoryError> {
        let row = sqlx::query("SELECT name, municipality FROM conversations WHERE identity = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(UserProfile::default());
        };

        Ok(UserProfile {
            name: row.try_get::<Option<String>, _>("name")?,
            municipality: row.try_get::<Option<String>, _>("municipality")?,
        })
    }

    async fn update_profile(
        &self,
        id: &ConversationId,
        update: &ProfileUpdate,
    ) -> Result<(), RepositoryError> {
        if update.is_empty() {
            return Ok(());
        }

        sqlx::query(
            "UPDATE conversations SET name = COALESCE(?, name), \
             municipality = COALESCE(?, municipality) WHERE identity = ?",
        )
        .bind(update.name.as_deref())
        .bind(update.municipality.as_deref())
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn has_any_history(&self, id: &ConversationId) -> Result<bool, RepositoryError> {
        let found = sqlx::query("SELECT 1 FROM conversation_turns WHERE identity = ? LIMIT 1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn has_link_been_sent(
        &self,
        id: &ConversationId,
        link_domain: &str,
    ) -> Result<bool, RepositoryError> {
        // instr() rather than LIKE so `_` and `%` in the domain match literally.
        let found = sqlx::query(
            "SELECT 1 FROM conversation_turns \
             WHERE identity = ? AND role = 'assistant' AND instr(message, ?) > 0 LIMIT 1",
        )
        .bind(id.as_str())
        .bind(link_domain)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    async fn get_recent_history(
        &self,
        id: &ConversationId,
        limit: u32,
    ) -> Result<Vec<Turn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT role, message, created_at FROM conversation_turns \
             WHERE identity = ? ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut turns = rows
            .into_iter()
            .map(|row| {
                let role_label = row.try_get::<String, _>("role")?;
                let role = Role::parse(&role_label).ok_or_else(|| {
                    RepositoryError::Decode(format!("unknown turn role `{role_label}`"))
                })?;
                Ok(Turn {
                    role,
                    text: row.try_get::<String, _>("message")?,
                    created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;
        turns.reverse();
        Ok(turns)
    }

    async fn save_interaction(
        &self,
        id: &ConversationId,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<(), RepositoryError> {
        let created_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        for (role, text) in [(Role::User, user_text), (Role::Assistant, assistant_text)] {
            sqlx::query(
                "INSERT INTO conversation_turns (identity, role, message, created_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(id.as_str())
            .bind(role.as_str())
            .bind(text)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
