//! Inbound webhook payloads and signature verification

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the request signature
pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Verify a webhook body against its `X-Line-Signature` header
///
/// The signature is the base64 encoded HMAC-SHA256 of the raw body keyed with
/// the channel secret.
#[must_use]
pub fn verify_signature(body: &[u8], signature: &str, channel_secret: &str) -> bool {
    let Ok(expected) = STANDARD.decode(signature.trim()) else {
        log::warn!("Webhook signature is not valid base64");
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        log::warn!("Failed to create HMAC");
        return false;
    };

    mac.update(body);
    // verify_slice compares in constant time.
    mac.verify_slice(&expected).is_ok()
}

/// Compute the signature the platform would send for `body`
#[must_use]
pub fn sign(body: &[u8], channel_secret: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(channel_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Top-level webhook request body
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    /// Bot user id the events are addressed to
    #[serde(default)]
    pub destination: Option<String>,
    /// Delivered events
    pub events: Vec<WebhookEvent>,
}

/// One webhook event
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    /// Event type (`message`, `follow`, ...)
    #[serde(rename = "type")]
    pub event_type: String,
    /// Token for an immediate reply
    #[serde(default)]
    pub reply_token: Option<String>,
    /// Event origin
    #[serde(default)]
    pub source: Option<EventSource>,
    /// Message content for `message` events
    #[serde(default)]
    pub message: Option<EventMessage>,
}

/// Origin of an event
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    /// Source type (`user`, `group`, `room`)
    #[serde(rename = "type")]
    pub source_type: String,
    /// Sending user, when the platform discloses it
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Message carried by a `message` event
#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    /// Message type (`text`, `image`, ...)
    #[serde(rename = "type")]
    pub message_type: String,
    /// Text for `text` messages
    #[serde(default)]
    pub text: Option<String>,
}

/// A text message the bridge can act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundText {
    /// Sending user
    pub user_id: String,
    /// Message text
    pub text: String,
    /// Token for the immediate reply
    pub reply_token: String,
}

impl WebhookEvent {
    /// Extract a text message with sender and reply token, if this is one
    #[must_use]
    pub fn as_text(&self) -> Option<InboundText> {
        if self.event_type != "message" {
            return None;
        }
        let message = self.message.as_ref()?;
        if message.message_type != "text" {
            return None;
        }
        Some(InboundText {
            user_id: self.source.as_ref()?.user_id.clone()?,
            text: message.text.clone()?,
            reply_token: self.reply_token.clone()?,
        })
    }
}
