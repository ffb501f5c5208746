//! Remote session API backend
//!
//! Talks to an HTTP service that hosts agent conversations:
//!
//! | Operation | Request                           | Response                                   |
//! |-----------|-----------------------------------|--------------------------------------------|
//! | create    | `POST /sessions`                  | `{"id"}`                                   |
//! | send      | `POST /sessions/{id}/prompt`      | `{"result","cost_usd","is_error","session_id"?}` |
//! | abort     | `POST /sessions/{id}/abort`       | any                                        |
//! | inspect   | `GET /sessions/{id}`              | `{"status","turns"?}`                      |
//! | destroy   | `DELETE /sessions/{id}`           | any                                        |
//!
//! A 404 or 410 on a session route means the conversation is gone.

use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::backend::AgentBackend;
use crate::error::{BridgeError, Result, truncate_for_display};
use crate::types::identifiers::SessionId;
use crate::types::session::{BackendStatus, PromptReply};

/// Longest slice of an error response body kept in error messages
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    id: SessionId,
}

#[derive(Debug, Serialize)]
struct PromptRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct PromptResponse {
    #[serde(default)]
    result: String,
    #[serde(default)]
    cost_usd: f64,
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    session_id: Option<SessionId>,
}

/// Backend that drives conversations hosted by a remote session API
pub struct RemoteBackend {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl RemoteBackend {
    /// Create a backend for the API at `base_url`
    ///
    /// # Errors
    /// Returns error if the URL is empty or invalid, or the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let raw = base_url.into();
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(BridgeError::invalid_config("remote backend URL is empty"));
        }
        let base_url = Url::parse(raw).map_err(|e| {
            BridgeError::invalid_config(format!("invalid remote backend URL {raw}: {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(BridgeError::invalid_config(format!(
                "remote backend URL cannot carry a path: {raw}"
            )));
        }

        let client = Client::builder()
            .user_agent(concat!("kodegen-chat-bridge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Append `segments` to the base path, percent-encoding each one
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BridgeError::invalid_config("remote backend URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn session_url(&self, session: &SessionId, action: Option<&str>) -> Result<Url> {
        match action {
            Some(action) => self.url(&["sessions", session.as_str(), action]),
            None => self.url(&["sessions", session.as_str()]),
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.api_key {
            Some(ref key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Send `request`, mapping failure statuses to bridge errors
    async fn execute(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| BridgeError::connection(format!("{what}: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let body = truncate_for_display(body.trim(), MAX_ERROR_BODY_CHARS);

        if matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE) {
            return Err(BridgeError::session_expired(format!("{what}: HTTP {status}")));
        }
        Err(BridgeError::backend(format!("{what}: HTTP {status}: {body}")))
    }
}

impl AgentBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn create(&self) -> Result<Option<SessionId>> {
        let request = self.client.post(self.url(&["sessions"])?);
        let created: CreateSessionResponse = self
            .execute(request, "create session")
            .await
            // A 404 here is a wrong URL, not an expired conversation.
            .map_err(|e| match e {
                BridgeError::SessionExpired(msg) => {
                    BridgeError::connection(format!("session endpoint unavailable ({msg})"))
                }
                other => other,
            })?
            .json()
            .await?;
        log::debug!("Remote backend created session {}", created.id);
        Ok(Some(created.id))
    }

    async fn send(&self, session: Option<&SessionId>, prompt: &str) -> Result<PromptReply> {
        let session = match session {
            Some(session) => session.clone(),
            None => self
                .create()
                .await?
                .ok_or_else(|| BridgeError::backend("remote backend returned no session id"))?,
        };

        let request = self
            .client
            .post(self.session_url(&session, Some("prompt"))?)
            .json(&PromptRequest { text: prompt });
        let response: PromptResponse = self.execute(request, "send prompt").await?.json().await?;

        Ok(PromptReply {
            text: response.result,
            cost_usd: response.cost_usd,
            is_error: response.is_error,
            session_id: Some(response.session_id.unwrap_or(session)),
        })
    }

    async fn abort(&self, session: &SessionId) -> Result<()> {
        let request = self.client.post(self.session_url(session, Some("abort"))?);
        self.execute(request, "abort").await?;
        Ok(())
    }

    async fn inspect(&self, session: &SessionId) -> Result<Option<BackendStatus>> {
        let request = self.client.get(self.session_url(session, None)?);
        let status: BackendStatus = self.execute(request, "inspect").await?.json().await?;
        Ok(Some(status))
    }

    async fn destroy(&self, session: &SessionId) -> Result<()> {
        let request = self.client.delete(self.session_url(session, None)?);
        self.execute(request, "destroy").await?;
        Ok(())
    }
}
