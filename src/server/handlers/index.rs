use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::rag::ingest::{self, RawDocument};
use crate::rag::{MergePolicy, MetadataFilter};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoadRequest {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub keyword: String,
    #[serde(default)]
    pub filter: Option<MetadataFilter>,
}

pub async fn insert_chunks(
    State(state): State<Arc<AppState>>,
    Json(documents): Json<Vec<RawDocument>>,
) -> Result<impl IntoResponse, ApiError> {
    let chunks = documents
        .into_iter()
        .filter(|doc| !doc.page_content.trim().is_empty())
        .map(RawDocument::into_chunk)
        .collect::<Vec<_>>();
    let report = state.index.insert(chunks).await?;
    Ok(Json(json!({ "report": report })))
}

pub async fn load_documents(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let path = state.paths.resolve_data_path(payload.path.trim());
    if !path.exists() {
        return Err(ApiError::NotFound(format!("{} does not exist", path.display())));
    }

    let mut summary = load_blocking(path).await?;
    let report = state.index.insert(std::mem::take(&mut summary.chunks)).await?;
    tracing::info!(
        files = summary.processed_files,
        failed = summary.failed_files,
        inserted = report.inserted,
        skipped = report.skipped,
        "Law documents loaded"
    );
    Ok(Json(json!({ "load": summary, "report": report })))
}

async fn load_blocking(path: PathBuf) -> Result<ingest::LoadSummary, ApiError> {
    tokio::task::spawn_blocking(move || ingest::load_path(&path))
        .await
        .map_err(ApiError::internal)?
}

pub async fn delete_chunks(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DeleteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.ids.is_empty() {
        return Err(ApiError::BadRequest("ids must not be empty".to_string()));
    }
    let deleted = state.index.delete(&payload.ids).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

/// Runs the keyword retrieval alone and shows both the buckets and the
/// context the answering agent would receive.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .retrieval
        .search(&payload.keyword, payload.filter.as_ref())
        .await?;
    let merged = MergePolicy::from_settings(&state.retrieval.settings()).apply(&result);

    Ok(Json(json!({
        "keyword": payload.keyword.trim(),
        "title_matches": result.title_matches,
        "body_matches": result.body_matches,
        "merged": merged,
    })))
}
