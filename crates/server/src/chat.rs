//! JSON endpoint that runs one inbound message through the reply pipeline.
//!
//! - `POST /api/chat` with `{ "identity": "...", "message": "..." }`

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use outreach_agent::AgentRuntime;
use outreach_core::{ConversationId, InterfaceError};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<AgentRuntime>,
}

impl ChatState {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub identity: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub correlation_id: String,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ChatError {
    pub error: String,
    pub correlation_id: String,
}

pub fn router(state: ChatState) -> Router {
    Router::new().route("/api/chat", post(chat)).with_state(state)
}

pub async fn chat(
    State(state): State<ChatState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ChatError>)> {
    let correlation_id = Uuid::new_v4().to_string();

    let identity = ConversationId::parse(&body.identity).map_err(|error| {
        let rejected = InterfaceError::rejected(&error, correlation_id.as_str());
        warn!(event_name = "server.chat.rejected", correlation_id = %correlation_id, error = %rejected.detail(), "invalid chat request");
        bad_request(&rejected)
    })?;

    let reply = state
        .runtime
        .handle_message_with_correlation(&identity, &body.message, &correlation_id)
        .await;

    Ok(Json(ChatResponse { reply, correlation_id }))
}

fn bad_request(error: &InterfaceError) -> (StatusCode, Json<ChatError>) {
    let body = ChatError {
        error: error.user_message().to_string(),
        correlation_id: error.correlation_id().to_string(),
    };
    (StatusCode::BAD_REQUEST, Json(body))
}
