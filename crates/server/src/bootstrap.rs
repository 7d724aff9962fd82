use std::sync::Arc;

use outreach_agent::{AgentRuntime, GeminiClient, ProviderError};
use outreach_core::config::AppConfig;
use outreach_db::{connect_with_config, migrations, DbPool, SqlConversationStore};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub agent_runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("generation provider setup failed: {0}")]
    Provider(#[source] ProviderError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let provider = GeminiClient::from_config(&config.llm).map_err(BootstrapError::Provider)?;
    let store = SqlConversationStore::new(db_pool.clone());
    let agent_runtime =
        Arc::new(AgentRuntime::from_config(&config, Arc::new(store), Arc::new(provider)));
    info!(
        event_name = "system.bootstrap.agent_ready",
        correlation_id = "bootstrap",
        models = ?config.llm.models,
        "reply pipeline initialized"
    );

    Ok(Application { config, db_pool, agent_runtime })
}
