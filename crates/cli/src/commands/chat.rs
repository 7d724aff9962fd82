use std::sync::Arc;

use crate::commands::{block_on, load_config, CommandResult};
use outreach_agent::{AgentRuntime, GeminiClient};
use outreach_core::ConversationId;
use outreach_db::{connect_with_config, migrations, SqlConversationStore};

/// Runs a single message through the full pipeline against the configured store and provider.
/// Provider outages still produce a reply; only setup failures are reported as errors.
pub fn run(identity: &str, message: &str) -> CommandResult {
    let config = match load_config("chat") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let identity = match ConversationId::parse(identity) {
        Ok(identity) => identity,
        Err(error) => return CommandResult::failure("chat", "invalid_input", error.to_string(), 2),
    };

    let outcome = block_on("chat", async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        if let Err(error) = migrations::run_pending(&pool).await {
            pool.close().await;
            return Err(("migration", error.to_string(), 5u8));
        }
        let provider = match GeminiClient::from_config(&config.llm) {
            Ok(provider) => provider,
            Err(error) => {
                pool.close().await;
                return Err(("provider_config", error.to_string(), 6u8));
            }
        };

        let store = Arc::new(SqlConversationStore::new(pool.clone()));
        let runtime = AgentRuntime::from_config(&config, store, Arc::new(provider));
        let reply = runtime.handle_message(&identity, message).await;
        pool.close().await;
        Ok(reply)
    });

    match outcome {
        Ok(Ok(reply)) => CommandResult::success("chat", reply),
        Ok(Err((error_class, message, exit_code))) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
        Err(result) => result,
    }
}
