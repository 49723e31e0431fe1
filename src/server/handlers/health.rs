use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let model_reachable = state.llm.health_check().await;
    let indexed_chunks = match state.index.count().await {
        Ok(count) => Some(count),
        Err(err) => {
            tracing::warn!("Failed to count indexed chunks: {}", err);
            None
        }
    };

    Json(json!({
        "status": "ok",
        "provider": state.llm.provider_name(),
        "chat_model": state.llm.settings().chat_model,
        "model_reachable": model_reachable,
        "indexed_chunks": indexed_chunks,
    }))
}
