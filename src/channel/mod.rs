//! Chat platform surface
//!
//! - [`webhook`] - inbound webhook payloads and signature verification
//! - [`line`] - LINE Messaging API client implementing [`ChatOutbound`]

pub mod line;
pub mod webhook;

use std::future::Future;

use crate::error::Result;

pub use line::LineClient;
pub use webhook::{WebhookPayload, verify_signature};

/// Where the immediate reply to an inbound message goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyContext {
    /// Single-use token issued with the inbound event
    pub reply_token: String,
}

impl ReplyContext {
    /// Create a reply context for `reply_token`
    pub fn new(reply_token: impl Into<String>) -> Self {
        Self {
            reply_token: reply_token.into(),
        }
    }
}

/// Outbound side of the chat platform
pub trait ChatOutbound: Send + Sync {
    /// Answer an inbound event directly
    ///
    /// # Errors
    /// Returns error if the platform rejects the reply (e.g. expired token)
    fn reply(
        &self,
        reply: &ReplyContext,
        messages: &[String],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Send a message to a user outside of a reply
    ///
    /// # Errors
    /// Returns error if delivery fails
    fn push(&self, user_id: &str, text: &str) -> impl Future<Output = Result<()>> + Send;
}
