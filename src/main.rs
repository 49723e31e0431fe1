use std::env;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use lawqa_backend::core::config::AppPaths;
use lawqa_backend::core::logging;
use lawqa_backend::server;
use lawqa_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(&AppPaths::new());

    let state: Arc<AppState> = AppState::initialize()
        .await
        .context("Failed to initialize application state")?;

    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(state.server.port);
    let bind_addr = format!("{}:{}", state.server.host, port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    if !state.llm.health_check().await {
        tracing::warn!(
            provider = state.llm.provider_name(),
            "Language model is not reachable yet; turns will fail until it is"
        );
    }

    let app: Router = server::router(state);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
