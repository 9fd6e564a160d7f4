//! Direct tool endpoints, useful for debugging and for thin clients
//! that do not want the full conversational loop.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use kopi_agent::calculator;
use kopi_agent::ToolResponse;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::request_id::RequestId;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CalculatorRequest {
    pub expression: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

pub async fn calculate(
    Extension(RequestId(request_id)): Extension<RequestId>,
    Json(payload): Json<CalculatorRequest>,
) -> Result<Json<Value>, ApiError> {
    match calculator::compute(&payload.expression) {
        Ok((expression, value)) => Ok(Json(json!({
            "expression": expression,
            "result": calculator::json_number(value),
            "message": calculator::format_result(value),
        }))),
        Err(err) => Err(ApiError::bad_request(err.to_string(), &request_id)),
    }
}

pub async fn products(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(params): Query<SearchParams>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let query = required_query(params, &request_id)?;
    let response = state.products.lookup(&query).await;
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    Ok((status, Json(search_payload(response))))
}

pub async fn outlets(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(params): Query<SearchParams>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let query = required_query(params, &request_id)?;
    let response = state.outlets.lookup(&query).await.map_err(|err| {
        ApiError::from_application(
            kopi_core::ApplicationError::Persistence(err.to_string()),
            &request_id,
        )
    })?;
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    Ok((status, Json(search_payload(response))))
}

fn search_payload(response: ToolResponse) -> Value {
    let results = response
        .data
        .get("results")
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));
    json!({
        "message": response.content,
        "results": results,
    })
}

fn required_query(params: SearchParams, request_id: &str) -> Result<String, ApiError> {
    params
        .query
        .map(|query| query.trim().to_string())
        .filter(|query| !query.is_empty())
        .ok_or_else(|| ApiError::bad_request("query parameter is required", request_id))
}
