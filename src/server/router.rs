use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{chat, health, history, index};
use crate::state::AppState;

/// Creates the application router.
///
/// Routes:
/// - `/health`
/// - `/api/chat/:username` (streaming turn)
/// - `/api/history/...` (stored turns)
/// - `/api/index/...` (law chunk ingestion and search)
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.server.cors_allowed_origins);
    Router::new()
        .route("/health", get(health::health))
        .route("/api/chat/:username", post(chat::chat))
        .route("/api/history", get(history::all_turns))
        .route("/api/history/users", get(history::usernames))
        .route("/api/history/:username/latest", get(history::latest_turn))
        .route(
            "/api/history/:username",
            axum::routing::delete(history::delete_history),
        )
        .route(
            "/api/index/chunks",
            post(index::insert_chunks).delete(index::delete_chunks),
        )
        .route("/api/index/load", post(index::load_documents))
        .route("/api/index/search", post(index::search))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(configured: &[String]) -> CorsLayer {
    let origins = if configured.is_empty() {
        default_local_origins()
    } else {
        configured.to_vec()
    };
    let allowed = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}

fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
        "http://127.0.0.1:8000".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_include_frontend_origin() {
        assert!(default_local_origins()
            .iter()
            .any(|origin| origin == "http://localhost:5173"));
    }
}
