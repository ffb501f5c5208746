//! Webhook HTTP server
//!
//! `POST /webhook` verifies the platform signature, parses the payload and
//! hands every text message to the [`Bridge`]. The response is sent as soon as
//! the messages are dispatched; agent work continues in the background.
//! `GET /health` answers `ok`.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use tokio::net::TcpListener;

use crate::backend::AgentBackend;
use crate::channel::webhook::SIGNATURE_HEADER;
use crate::channel::{ChatOutbound, ReplyContext, WebhookPayload, verify_signature};
use crate::error::Result;
use crate::router::Bridge;

/// Shared state of the webhook handlers
pub struct AppState<B, O> {
    bridge: Bridge<B, O>,
    channel_secret: Arc<str>,
}

impl<B, O> Clone for AppState<B, O> {
    fn clone(&self) -> Self {
        Self {
            bridge: self.bridge.clone(),
            channel_secret: Arc::clone(&self.channel_secret),
        }
    }
}

impl<B, O> AppState<B, O> {
    /// State verifying signatures with `channel_secret`
    pub fn new(bridge: Bridge<B, O>, channel_secret: impl Into<String>) -> Self {
        Self {
            bridge,
            channel_secret: Arc::from(channel_secret.into()),
        }
    }
}

/// Build the HTTP router
pub fn router<B, O>(state: AppState<B, O>) -> Router
where
    B: AgentBackend + 'static,
    O: ChatOutbound + 'static,
{
    Router::new()
        .route("/webhook", post(webhook::<B, O>))
        .route("/health", get(health))
        .with_state(state)
}

/// Serve `app` on `addr` until `shutdown` resolves
///
/// # Errors
/// Returns error if the address cannot be bound or the server fails
pub async fn serve(
    addr: SocketAddr,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    log::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn webhook<B, O>(
    State(state): State<AppState<B, O>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode
where
    B: AgentBackend + 'static,
    O: ChatOutbound + 'static,
{
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        log::warn!("Webhook request without signature");
        return StatusCode::UNAUTHORIZED;
    };

    if !verify_signature(&body, signature, &state.channel_secret) {
        log::warn!("Webhook signature mismatch");
        return StatusCode::UNAUTHORIZED;
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("Malformed webhook payload: {e}");
            return StatusCode::BAD_REQUEST;
        }
    };

    for event in &payload.events {
        match event.as_text() {
            Some(inbound) => {
                log::debug!("Text message from {}", inbound.user_id);
                // Detached: the handle only reports completion.
                drop(state.bridge.on_text_message(
                    &inbound.user_id,
                    &inbound.text,
                    ReplyContext::new(inbound.reply_token),
                ));
            }
            None => log::debug!("Skipping {} event", event.event_type),
        }
    }

    StatusCode::OK
}
