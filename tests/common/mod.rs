//! Scripted test doubles shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use kodegen_chat_bridge::error::Result;
use kodegen_chat_bridge::{
    AgentBackend, BackendStatus, BridgeError, ChatOutbound, PromptReply, ReplyContext, SessionId,
};
use parking_lot::Mutex;

/// What the mock backend does for one `send`
#[derive(Debug, Clone)]
pub enum Step {
    /// Answer with text and cost
    Reply(&'static str, f64),
    /// Answer after a delay
    Delayed(Duration, &'static str),
    /// Report the conversation gone
    Expired,
    /// Fail with a backend error
    Fail(&'static str),
    /// Never answer
    Hang,
}

/// One recorded `send` call
#[derive(Debug, Clone, PartialEq)]
pub struct SentPrompt {
    pub session: Option<SessionId>,
    pub prompt: String,
}

#[derive(Default)]
struct MockState {
    script: VecDeque<Step>,
    sent: Vec<SentPrompt>,
    creates: usize,
    aborts: Vec<SessionId>,
    destroyed: Vec<SessionId>,
}

/// In-memory backend following a script of [`Step`]s; unscripted prompts echo
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(steps: impl IntoIterator<Item = Step>) -> Self {
        let backend = Self::new();
        backend.state.lock().script.extend(steps);
        backend
    }

    pub fn sent(&self) -> Vec<SentPrompt> {
        self.state.lock().sent.clone()
    }

    pub fn creates(&self) -> usize {
        self.state.lock().creates
    }

    pub fn aborts(&self) -> Vec<SessionId> {
        self.state.lock().aborts.clone()
    }

    pub fn destroyed(&self) -> Vec<SessionId> {
        self.state.lock().destroyed.clone()
    }
}

impl AgentBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create(&self) -> Result<Option<SessionId>> {
        let mut state = self.state.lock();
        state.creates += 1;
        Ok(Some(SessionId::new(format!("s{}", state.creates))))
    }

    async fn send(&self, session: Option<&SessionId>, prompt: &str) -> Result<PromptReply> {
        let step = {
            let mut state = self.state.lock();
            state.sent.push(SentPrompt {
                session: session.cloned(),
                prompt: prompt.to_string(),
            });
            state.script.pop_front()
        };

        let reply = |text: String, cost_usd: f64| PromptReply {
            text,
            cost_usd,
            is_error: false,
            session_id: session.cloned(),
        };

        match step {
            None => Ok(reply(format!("echo: {prompt}"), 0.0)),
            Some(Step::Reply(text, cost)) => Ok(reply(text.to_string(), cost)),
            Some(Step::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(reply(text.to_string(), 0.0))
            }
            Some(Step::Expired) => Err(BridgeError::session_expired("conversation is gone")),
            Some(Step::Fail(message)) => Err(BridgeError::backend(message)),
            Some(Step::Hang) => std::future::pending().await,
        }
    }

    async fn abort(&self, session: &SessionId) -> Result<()> {
        self.state.lock().aborts.push(session.clone());
        Ok(())
    }

    async fn inspect(&self, _session: &SessionId) -> Result<Option<BackendStatus>> {
        let turns = self.state.lock().sent.len() as u32;
        Ok(Some(BackendStatus {
            status: "idle".to_string(),
            turns: Some(turns),
        }))
    }

    async fn destroy(&self, session: &SessionId) -> Result<()> {
        self.state.lock().destroyed.push(session.clone());
        Ok(())
    }
}

/// Message the bridge sent to the chat platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Reply { token: String, messages: Vec<String> },
    Push { user_id: String, text: String },
}

#[derive(Default)]
struct OutboundState {
    sent: Vec<Outgoing>,
    reject_replies: bool,
    reject_push_containing: Option<String>,
}

/// Outbound client that records everything it is asked to send
#[derive(Clone, Default)]
pub struct RecordingOutbound {
    state: Arc<Mutex<OutboundState>>,
}

impl RecordingOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every reply, as an expired reply token would
    pub fn rejecting_replies(self) -> Self {
        self.state.lock().reject_replies = true;
        self
    }

    /// Fail pushes whose text contains `needle`
    pub fn rejecting_push_containing(self, needle: &str) -> Self {
        self.state.lock().reject_push_containing = Some(needle.to_string());
        self
    }

    pub fn sent(&self) -> Vec<Outgoing> {
        self.state.lock().sent.clone()
    }

    pub fn pushes(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|out| match out {
                Outgoing::Push { text, .. } => Some(text),
                Outgoing::Reply { .. } => None,
            })
            .collect()
    }

    pub fn replies(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|out| match out {
                Outgoing::Reply { messages, .. } => Some(messages.join("\n")),
                Outgoing::Push { .. } => None,
            })
            .collect()
    }
}

impl ChatOutbound for RecordingOutbound {
    async fn reply(&self, reply: &ReplyContext, messages: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        if state.reject_replies {
            return Err(BridgeError::outbound("Invalid reply token"));
        }
        state.sent.push(Outgoing::Reply {
            token: reply.reply_token.clone(),
            messages: messages.to_vec(),
        });
        Ok(())
    }

    async fn push(&self, user_id: &str, text: &str) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(ref needle) = state.reject_push_containing
            && text.contains(needle.as_str())
        {
            return Err(BridgeError::outbound("push rejected"));
        }
        state.sent.push(Outgoing::Push {
            user_id: user_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Poll `condition` until it holds or a second passes
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
