//! LINE Messaging API client

use reqwest::Client;
use serde::Serialize;

use crate::channel::{ChatOutbound, ReplyContext};
use crate::error::{BridgeError, Result, truncate_for_display};

/// Default API origin
pub const DEFAULT_API_BASE: &str = "https://api.line.me";

/// The reply endpoint accepts at most this many messages per call
pub const MAX_REPLY_MESSAGES: usize = 5;

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

impl<'a> TextMessage<'a> {
    fn new(text: &'a str) -> Self {
        Self { kind: "text", text }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<TextMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: Vec<TextMessage<'a>>,
}

/// Reply/push client for the LINE Messaging API
#[derive(Clone)]
pub struct LineClient {
    client: Client,
    api_base: String,
    access_token: String,
}

impl LineClient {
    /// Create a client authenticated with a channel access token
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(api_base: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("kodegen-chat-bridge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<()> {
        let response = self
            .client
            .post(format!("{}{path}", self.api_base))
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(BridgeError::outbound(format!(
            "{path}: HTTP {status}: {}",
            truncate_for_display(body.trim(), 300)
        )))
    }
}

impl ChatOutbound for LineClient {
    async fn reply(&self, reply: &ReplyContext, messages: &[String]) -> Result<()> {
        if messages.len() > MAX_REPLY_MESSAGES {
            log::warn!(
                "Reply has {} messages; only the first {MAX_REPLY_MESSAGES} are sent",
                messages.len()
            );
        }
        let request = ReplyRequest {
            reply_token: &reply.reply_token,
            messages: messages
                .iter()
                .take(MAX_REPLY_MESSAGES)
                .map(|text| TextMessage::new(text))
                .collect(),
        };
        self.post("/v2/bot/message/reply", &request).await
    }

    async fn push(&self, user_id: &str, text: &str) -> Result<()> {
        let request = PushRequest {
            to: user_id,
            messages: vec![TextMessage::new(text)],
        };
        self.post("/v2/bot/message/push", &request).await
    }
}
