use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::history::TurnStore;
use crate::state::AppState;

pub async fn all_turns(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let turns = state.history.all_turns().await?;
    Ok(Json(json!({ "turns": turns })))
}

pub async fn usernames(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let users = state.history.usernames().await?;
    Ok(Json(json!({ "usernames": users })))
}

pub async fn latest_turn(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let turn = state
        .history
        .latest_turn(&username)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no history for {username}")))?;
    Ok(Json(json!({ "turn": turn })))
}

pub async fn delete_history(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.pipeline.delete_history(&username).await?;
    tracing::info!(username = %username, deleted, "History deleted");
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}
