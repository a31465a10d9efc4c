use crate::http::{GithubClient, RateLimitState};
use crate::metrics::{Publisher, SnapshotSummary, TEXT_FORMAT};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<Publisher>,
    pub client: Arc<GithubClient>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/healthz", get(|| async { "ok" }))
        .route("/debug/snapshot", get(debug_snapshot))
        .route("/debug/ratelimit", get(debug_ratelimit))
        .with_state(state)
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.publisher.render() {
        Ok(body) => ([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("encoding metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn debug_snapshot(State(state): State<AppState>) -> Json<SnapshotSummary> {
    Json(state.publisher.summary())
}

async fn debug_ratelimit(State(state): State<AppState>) -> Json<RateLimitState> {
    Json(state.client.rate_limit())
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("serving metrics on http://{}/metrics", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
