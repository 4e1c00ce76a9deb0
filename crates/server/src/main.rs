use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use server_api::{config::load_settings, ApiContext, SessionRegistry};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::GameSnapshot,
};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app_state;
mod gateway;

use app_state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = load_settings();
    let words = settings
        .word_supplier()
        .context("failed to build word generator client")?;
    info!(
        external_words = words.has_generator(),
        max_turn_secs = settings.max_turn_secs,
        "game settings loaded"
    );
    let api = ApiContext::new(words, settings.game_limits());
    let reaper = spawn_reaper(
        api.registry.clone(),
        settings.session_idle(),
        settings.reap_interval(),
    );

    let app = build_router(Arc::new(AppState { api }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    reaper.abort();
    info!("server stopped");
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/sessions/:code", get(http_session_state))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn http_session_state(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<GameSnapshot>, (StatusCode, Json<ApiError>)> {
    let snapshot = server_api::snapshot(&state.api, &code)
        .await
        .map_err(|e| (status_for(e.code), Json(e)))?;
    Ok(Json(snapshot))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| gateway::ws_connection(state, socket))
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::InvalidAction => StatusCode::CONFLICT,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Periodically drops sessions nobody has touched for `max_idle`.
fn spawn_reaper(registry: SessionRegistry, max_idle: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let reaped = registry.reap_idle(max_idle).await;
            if !reaped.is_empty() {
                info!(count = reaped.len(), "idle sessions reaped");
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
