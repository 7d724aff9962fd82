use std::path::Path;

use axum::Router;
use tower_http::services::ServeDir;

use crate::bootstrap::Application;
use crate::chat::{self, ChatState};
use crate::health::{self, HealthState};

pub fn router(health_state: HealthState, chat_state: ChatState, static_dir: Option<&Path>) -> Router {
    let api = Router::new().merge(health::router(health_state)).merge(chat::router(chat_state));
    match static_dir {
        Some(directory) => api.fallback_service(ServeDir::new(directory)),
        None => api,
    }
}

pub fn application_router(app: &Application) -> Router {
    router(
        HealthState::new(app.db_pool.clone(), app.config.llm.models.clone()),
        ChatState::new(app.agent_runtime.clone()),
        app.config.server.static_dir.as_deref(),
    )
}
