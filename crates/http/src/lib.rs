//! HTTP surface for AILVI: the platform health check and, in webhook mode,
//! the endpoint Telegram posts updates to.

#![allow(missing_docs, reason = "Internal crate with self-explanatory API")]
#![allow(clippy::missing_errors_doc, reason = "Errors are self-explanatory from Result types")]
#![allow(missing_debug_implementations, reason = "Internal types")]

pub mod api_error;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use ailvi_core::persona::HEALTH_OK;
use ailvi_telegram::{Dispatcher, Update};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api_error::ApiError;

/// Header Telegram sets to the `secret_token` given to `setWebhook`.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

pub struct WebhookState {
    pub dispatcher: Arc<Dispatcher>,
    pub secret: String,
}

/// `GET /` and `GET /health`, both answering `OK`.
pub fn health_router() -> Router {
    Router::new().route("/", get(health)).route("/health", get(health))
}

/// Health routes plus `POST /bot{secret}`, which queues each verified update
/// on the dispatcher and acknowledges immediately.
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    let path = webhook_path(&state.secret);
    let webhook = Router::new().route(&path, post(receive_update)).with_state(state);
    health_router().merge(webhook).layer(TraceLayer::new_for_http())
}

#[must_use]
pub fn webhook_path(secret: &str) -> String {
    format!("/bot{secret}")
}

/// Binds `addr` and serves `router` until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting HTTP server on {}", addr);
    axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;
    Ok(())
}

async fn health() -> &'static str {
    HEALTH_OK
}

async fn receive_update(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let token = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if token != Some(state.secret.as_str()) {
        tracing::warn!("webhook call with missing or wrong secret token");
        return Err(ApiError::Forbidden("invalid secret token".to_owned()));
    }

    let update: Update = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "unparseable webhook body");
        ApiError::BadRequest(format!("invalid update: {e}"))
    })?;
    state.dispatcher.dispatch_update(update);
    Ok(StatusCode::OK)
}
