use {
    axum::{
        Json, Router,
        response::IntoResponse,
        routing::{delete, get, post},
    },
    tower_http::cors::{Any, CorsLayer},
    tracing::info,
};

use crate::{agents, channels, conversations, state::AppState, webhooks};

/// Build the gateway router. All state flows through [`AppState`].
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/channels", get(channels::list).post(channels::create))
        .route("/api/channels/{id}", delete(channels::remove))
        .route("/api/channels/{id}/status", get(channels::status))
        .route("/api/channels/{id}/agent", post(channels::assign_agent))
        .route("/api/channels/{id}/auto-reply", post(channels::set_auto_reply))
        .route("/api/channels/{id}/pairing-token", get(channels::pairing_token))
        .route(
            "/api/channels/{id}/pairing/confirm",
            post(channels::confirm_pairing),
        )
        .route("/api/conversations", get(conversations::list))
        .route(
            "/api/conversations/{id}/messages",
            get(conversations::messages).post(conversations::send),
        )
        .route(
            "/api/conversations/{id}/messages/{message_id}/delivery",
            post(conversations::update_delivery),
        )
        .route("/api/conversations/{id}/read", post(conversations::mark_read))
        .route("/api/conversations/{id}/ai/enable", post(conversations::enable_ai))
        .route("/api/agents", get(agents::list).post(agents::create))
        .route("/api/agents/{id}", delete(agents::remove))
        .route(
            "/api/webhooks/{channel_type}/{channel_id}",
            post(webhooks::receive),
        )
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

/// Bind and serve until ctrl-c, then tear every live connection down.
pub async fn start_gateway(bind: &str, port: u16, state: AppState) -> anyhow::Result<()> {
    let registry = std::sync::Arc::clone(&state.registry);
    let app = build_app(state);
    let addr = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    registry.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
