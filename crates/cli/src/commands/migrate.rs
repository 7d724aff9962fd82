use crate::commands::{block_on, load_config, CommandResult};
use outreach_db::{connect_with_config, migrations};

pub fn run() -> CommandResult {
    let config = match load_config("migrate") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let outcome = block_on("migrate", async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let applied = migrations::run_pending(&pool).await;
        pool.close().await;
        applied.map_err(|error| ("migration", error.to_string(), 5u8))
    });

    match outcome {
        Ok(Ok(())) => CommandResult::success(
            "migrate",
            format!("applied pending migrations to `{}`", config.database.url),
        ),
        Ok(Err((error_class, message, exit_code))) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
        Err(result) => result,
    }
}
