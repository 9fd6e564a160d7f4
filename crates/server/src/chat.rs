//! POST /chat, the conversational entry point.

use axum::extract::State;
use axum::{Extension, Json};
use kopi_agent::ChatOutcome;
use kopi_core::TurnRole;
use serde::Deserialize;

use crate::error::ApiError;
use crate::request_id::RequestId;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub conversation_id: Option<String>,
    pub role: Option<String>,
    #[serde(alias = "content")]
    pub message: String,
}

pub async fn handle(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatOutcome>, ApiError> {
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("message must not be empty", &request_id));
    }

    let role = match payload.role.as_deref() {
        None => TurnRole::User,
        Some(raw) => TurnRole::parse(raw).ok_or_else(|| {
            ApiError::bad_request(format!("unknown role: {raw}"), &request_id)
        })?,
    };

    let conversation_id = payload
        .conversation_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("conversation_id must not be empty", &request_id))?
        .to_string();

    let outcome = state
        .orchestrator
        .handle_turn(&conversation_id, role, message)
        .await
        .map_err(|err| ApiError::from_application(err, &request_id))?;

    tracing::info!(
        event_name = "interface.chat.completed",
        correlation_id = %request_id,
        conversation_id = %outcome.conversation_id,
        action = outcome.action.as_str(),
        tool_success = outcome.tool_success,
        "chat turn handled",
    );

    Ok(Json(outcome))
}
