//! Conversation inspection and reset endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::request_id::RequestId;
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> Result<Json<Value>, ApiError> {
    let conversations = state.store.list_conversations().await.map_err(|err| {
        ApiError::from_application(
            kopi_core::ApplicationError::Persistence(err.to_string()),
            &request_id,
        )
    })?;
    Ok(Json(json!({ "conversations": conversations })))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(conversation_id): Path<String>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let snapshot = state
        .store
        .load_snapshot(&conversation_id)
        .await
        .map_err(|err| {
            ApiError::from_application(
                kopi_core::ApplicationError::Persistence(err.to_string()),
                &request_id,
            )
        })?;

    if snapshot.turns.is_empty() && snapshot.slots.is_empty() {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "conversation not found" })),
        ));
    }

    let turns: Vec<Value> = snapshot
        .turns
        .iter()
        .map(|turn| {
            json!({
                "role": turn.role.as_str(),
                "content": turn.content,
                "created_at": turn.created_at.to_rfc3339(),
                "metadata": turn.metadata,
            })
        })
        .collect();
    let slots: Value = snapshot
        .slots
        .iter()
        .map(|(slot, value)| (slot.to_string(), json!(value)))
        .collect::<serde_json::Map<_, _>>()
        .into();

    Ok((
        StatusCode::OK,
        Json(json!({
            "conversation_id": snapshot.conversation_id,
            "turns": turns,
            "slots": slots,
        })),
    ))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(conversation_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.reset(&conversation_id).await.map_err(|err| {
        ApiError::from_application(
            kopi_core::ApplicationError::Persistence(err.to_string()),
            &request_id,
        )
    })?;
    Ok(StatusCode::NO_CONTENT)
}
