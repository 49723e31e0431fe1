use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream;
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::pipeline::{Orchestrator, TurnStream};
use crate::rag::MetadataFilter;
use crate::state::AppState;

const FALLBACK_LINE: &str = "\n[错误] 本轮回答未能完成，请稍后重试。\n";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub filter: Option<MetadataFilter>,
}

/// Streams one turn as plain text. The turn is saved only after every
/// fragment has been forwarded; a failed turn ends with a fallback line.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    Json(payload): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let query = payload.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }
    let username = username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::BadRequest("username must not be empty".to_string()));
    }

    let orchestrator = state.pipeline.get(&username).await;
    let turn = orchestrator.run_with_filter(query, payload.filter);
    let body = Body::from_stream(stream::unfold(
        Forwarding::Streaming(turn, orchestrator),
        forward,
    ));

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response())
}

enum Forwarding {
    Streaming(TurnStream, Arc<Orchestrator>),
    Done,
}

// Dropping the response body drops the TurnStream, which cancels the turn.
async fn forward(
    state: Forwarding,
) -> Option<(Result<String, Infallible>, Forwarding)> {
    let Forwarding::Streaming(mut turn, orchestrator) = state else {
        return None;
    };

    if let Some(event) = turn.next().await {
        return Some((
            Ok(event.render()),
            Forwarding::Streaming(turn, orchestrator),
        ));
    }

    match turn.finish().await {
        Ok(record) => {
            if let Err(err) = orchestrator.save_history(&record).await {
                tracing::error!(username = %record.username, "Failed to save turn: {}", err);
            }
            None
        }
        Err(err) => {
            tracing::warn!(username = orchestrator.username(), "Turn not saved: {}", err);
            Some((Ok(FALLBACK_LINE.to_string()), Forwarding::Done))
        }
    }
}
