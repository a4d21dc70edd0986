use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::services::reporting::AlertReporter;

pub struct AppState {
    pub reporter: AlertReporter,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(get_stats))
        .with_state(state)
}

pub async fn run_server(addr: &str, state: Arc<AppState>) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🩺 Health endpoint listening on {}", addr);
    axum::serve(listener, router(state)).await
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.reporter.summary())
}
