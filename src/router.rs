//! Command routing
//!
//! [`Bridge`] is the entry point for inbound chat text. Control commands are
//! answered right away, even while a prompt is running, so `/abort` never
//! waits behind the prompt it cancels. Everything else is queued per user and
//! forwarded to the agent; the response is segmented and pushed back.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::backend::AgentBackend;
use crate::channel::{ChatOutbound, ReplyContext};
use crate::error::BridgeError;
use crate::queue::UserQueue;
use crate::segment::segment;
use crate::session::AgentGateway;
use crate::types::identifiers::RequestId;
use crate::types::session::SessionInfo;

/// Text pushed when the agent returns an empty result
const EMPTY_RESPONSE: &str = "(The agent returned an empty response.)";

/// Marker prepended to results the backend flagged as errors
const ERROR_RESULT_PREFIX: &str = "⚠️ ";

const HELP_TEXT: &str = "Send any message to talk to the agent.\n\
/reset - start a new conversation\n\
/abort - cancel the running request\n\
/session - show the current session\n\
/cost - show the accumulated cost\n\
/help - show this help";

/// Parsed inbound text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Discard the session (`/reset`, `/new`)
    Reset,
    /// Cancel the running prompt (`/abort`, `/cancel`, `/stop`)
    Abort,
    /// Show session details (`/session`, `/status`)
    Session,
    /// Show accumulated cost (`/cost`)
    Cost,
    /// Show the command list (`/help`)
    Help,
    /// Forward the text to the agent
    Prompt(String),
}

impl Command {
    /// Classify inbound text; `None` for blank input
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        let command = match trimmed.to_lowercase().as_str() {
            "/reset" | "/new" => Self::Reset,
            "/abort" | "/cancel" | "/stop" => Self::Abort,
            "/session" | "/status" => Self::Session,
            "/cost" => Self::Cost,
            "/help" => Self::Help,
            _ => Self::Prompt(trimmed.to_string()),
        };
        Some(command)
    }
}

struct BridgeInner<B, O> {
    gateway: AgentGateway<B>,
    queue: UserQueue,
    outbound: O,
    chunk_limit: usize,
}

/// Routes inbound text to control commands or the per-user prompt queue
pub struct Bridge<B, O> {
    inner: Arc<BridgeInner<B, O>>,
}

impl<B, O> Clone for Bridge<B, O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B, O> Bridge<B, O>
where
    B: AgentBackend + 'static,
    O: ChatOutbound + 'static,
{
    /// Create a bridge delivering responses in chunks of `chunk_limit` characters
    pub fn new(gateway: AgentGateway<B>, outbound: O, chunk_limit: usize) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                gateway,
                queue: UserQueue::new(),
                outbound,
                chunk_limit,
            }),
        }
    }

    /// The agent gateway
    pub fn gateway(&self) -> &AgentGateway<B> {
        &self.inner.gateway
    }

    /// The outbound client
    pub fn outbound(&self) -> &O {
        &self.inner.outbound
    }

    /// The per-user queue
    pub fn queue(&self) -> &UserQueue {
        &self.inner.queue
    }

    /// Handle one inbound text message without waiting for it
    ///
    /// Control commands are handled right away; prompts take their place in the
    /// user's queue before this returns. The returned handle completes once the
    /// message has been fully handled.
    pub fn on_text_message(
        &self,
        user_id: &str,
        text: &str,
        reply: ReplyContext,
    ) -> JoinHandle<()> {
        let Some(command) = Command::parse(text) else {
            log::debug!("Ignoring blank message from {user_id}");
            return tokio::spawn(async {});
        };

        match command {
            Command::Prompt(prompt) => {
                let bridge = self.clone();
                let user = user_id.to_string();
                let queued = self.inner.queue.enqueue(user_id, move || async move {
                    bridge.run_prompt(&user, &prompt, &reply).await;
                });
                tokio::spawn(queued)
            }
            control => {
                let bridge = self.clone();
                let user = user_id.to_string();
                tokio::spawn(async move {
                    bridge.run_control(&user, control, &reply).await;
                })
            }
        }
    }

    async fn run_control(&self, user_id: &str, command: Command, reply: &ReplyContext) {
        let gateway = &self.inner.gateway;

        let text = match command {
            Command::Reset => {
                if gateway.reset(user_id) {
                    "Session reset. Your next message starts a new conversation.".to_string()
                } else {
                    "No active session. Your next message starts a new conversation.".to_string()
                }
            }
            Command::Abort => {
                if gateway.abort(user_id).await {
                    "Cancelled the running request.".to_string()
                } else {
                    "Nothing to cancel.".to_string()
                }
            }
            Command::Session => match gateway.describe(user_id).await {
                Some(info) => format_session_info(&info),
                None => "No active session.".to_string(),
            },
            Command::Cost => match gateway.total_cost(user_id) {
                Some(cost) => format!("Total cost: {}", format_cost(cost)),
                None => "No active session.".to_string(),
            },
            Command::Help => HELP_TEXT.to_string(),
            Command::Prompt(_) => return,
        };

        self.reply_or_push(user_id, reply, text).await;
    }

    async fn run_prompt(&self, user_id: &str, prompt: &str, reply: &ReplyContext) {
        let request_id = RequestId::generate();
        log::info!(
            "[{request_id}] Prompt from {user_id} ({} chars)",
            prompt.chars().count()
        );

        match self.inner.gateway.send_prompt(user_id, prompt).await {
            Ok(result) => {
                log::info!(
                    "[{request_id}] Agent answered: {} chars, ${:.4}, error={}",
                    result.text.chars().count(),
                    result.cost_usd,
                    result.is_error
                );
                let text = if result.text.trim().is_empty() {
                    EMPTY_RESPONSE.to_string()
                } else if result.is_error {
                    format!("{ERROR_RESULT_PREFIX}{}", result.text)
                } else {
                    result.text
                };
                self.deliver(&request_id, user_id, &text).await;
            }
            Err(BridgeError::Aborted) => {
                log::info!("[{request_id}] Prompt from {user_id} was aborted");
            }
            Err(e) => {
                log::error!("[{request_id}] Prompt from {user_id} failed: {e}");
                self.reply_or_push(user_id, reply, e.user_message()).await;
            }
        }
    }

    /// Push every chunk of `text`, skipping chunks that fail
    async fn deliver(&self, request_id: &RequestId, user_id: &str, text: &str) {
        let chunks = segment(text, self.inner.chunk_limit);
        let total = chunks.len();

        for (index, chunk) in chunks.iter().enumerate() {
            if let Err(e) = self.inner.outbound.push(user_id, chunk).await {
                log::warn!(
                    "[{request_id}] Push of chunk {}/{total} to {user_id} failed: {e}",
                    index + 1
                );
            }
        }
    }

    /// Reply on the event's token, falling back to a push when the token is rejected
    async fn reply_or_push(&self, user_id: &str, reply: &ReplyContext, text: String) {
        let outbound = &self.inner.outbound;
        let messages = [text];

        if let Err(e) = outbound.reply(reply, &messages).await {
            log::warn!("Reply to {user_id} failed ({e}); pushing instead");
            if let Err(e) = outbound.push(user_id, &messages[0]).await {
                log::error!("Push to {user_id} failed: {e}");
            }
        }
    }
}

fn format_cost(cost: f64) -> String {
    format!("${cost:.4}")
}

fn format_session_info(info: &SessionInfo) -> String {
    let mut lines = vec![
        format!(
            "Session: {}",
            info.session_id
                .as_ref()
                .map_or("(not assigned yet)", |id| id.as_str())
        ),
        format!("Prompts: {}", info.prompt_count),
        format!("Cost: {}", format_cost(info.total_cost)),
        format!("State: {}", if info.busy { "working" } else { "idle" }),
    ];

    if let Some(ref status) = info.backend_status {
        match status.turns {
            Some(turns) => lines.push(format!("Backend: {} ({turns} turns)", status.status)),
            None => lines.push(format!("Backend: {}", status.status)),
        }
    }

    lines.push(format!(
        "Last active: {}",
        info.last_active.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_tokens_are_case_insensitive() {
        assert_eq!(Command::parse("/RESET"), Some(Command::Reset));
        assert_eq!(Command::parse("  /Abort "), Some(Command::Abort));
        assert_eq!(Command::parse("/cancel"), Some(Command::Abort));
        assert_eq!(Command::parse("/Status"), Some(Command::Session));
        assert_eq!(Command::parse("/cost"), Some(Command::Cost));
        assert_eq!(Command::parse("/help"), Some(Command::Help));
    }

    #[test]
    fn other_text_is_a_prompt() {
        assert_eq!(
            Command::parse(" explain /reset please "),
            Some(Command::Prompt("explain /reset please".into()))
        );
        assert_eq!(Command::parse("   \n"), None);
    }

    #[test]
    fn cost_has_four_decimals() {
        assert_eq!(format_cost(0.03), "$0.0300");
    }
}
