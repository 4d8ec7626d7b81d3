//! Gateway HTTP server: batch ingest and conversation inspection.

use crate::bus::{BusError, LocalBus};
use crate::config::{self, Config};
use crate::gateway::wire::{BatchAccepted, ConversationInfo, WireBatch};
use crate::handler::ChannelManager;
use crate::matching::matcher_for_mode;
use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
struct GatewayState {
    config: Arc<Config>,
    bus: Arc<LocalBus>,
    manager: Arc<ChannelManager>,
    handler_name: String,
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "handler": state.manager.handler_name().await,
        "port": state.config.gateway.port,
    }))
}

/// POST /batches: decode a wire batch, hand it to the registered handler, and
/// wait for the handler to acknowledge it.
async fn post_batch(
    State(state): State<GatewayState>,
    Json(wire): Json<WireBatch>,
) -> Result<Json<BatchAccepted>, StatusCode> {
    let channels = wire.channels.len();
    let (batch, done) = wire.into_batch();
    match state.bus.dispatch(&state.handler_name, batch).await {
        Ok(()) => {}
        Err(BusError::NoSuchHandler(name)) => {
            log::warn!("batch dropped: no handler registered under {}", name);
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }
        Err(e) => {
            log::warn!("batch dispatch failed: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
    // The handler finishes every batch it receives; a closed channel here
    // would mean the context was dropped unfinished.
    if done.await.is_err() {
        log::warn!("batch context dropped without completion");
    }
    Ok(Json(BatchAccepted { channels }))
}

/// GET /conversations lists live conversations in insertion order.
async fn list_conversations(State(state): State<GatewayState>) -> Json<Vec<ConversationInfo>> {
    let conversations = state.manager.conversations().await;
    Json(
        conversations
            .iter()
            .map(|c| ConversationInfo::from(c.as_ref()))
            .collect(),
    )
}

/// DELETE /conversations/:id closes a conversation (the external-owner path).
async fn delete_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    match state.manager.conversation(id).await {
        Some(conversation) => {
            conversation.close();
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Registers the text-channel handler under the configured name before
/// serving. Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    let handler_name = config::resolve_handler_name(&config);
    let manager = ChannelManager::new(matcher_for_mode(config.matching.mode));
    let bus = Arc::new(LocalBus::new());
    let registered = manager
        .set_handler_name(&handler_name, bus.as_ref())
        .await
        .context("registering text-channel handler")?;
    if !registered {
        anyhow::bail!("handler name must not be empty (set handler.name or PARLEY_HANDLER_NAME)");
    }

    let state = GatewayState {
        config: Arc::new(config.clone()),
        bus,
        manager,
        handler_name,
    };

    let app = Router::new()
        .route("/", get(health_http))
        .route("/batches", post(post_batch))
        .route("/conversations", get(list_conversations))
        .route("/conversations/:id", delete(delete_conversation))
        .with_state(state);

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;

    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("shutdown signal received");
}
