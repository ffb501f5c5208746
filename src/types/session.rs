//! Prompt results and session snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identifiers::SessionId;

/// What the backend returned for one prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptReply {
    /// Final response text
    pub text: String,
    /// Cost of this prompt in USD
    pub cost_usd: f64,
    /// Whether the backend flagged the result as an error
    pub is_error: bool,
    /// Conversation handle to use for the next prompt, if the backend reported one
    pub session_id: Option<SessionId>,
}

/// Live status reported by a backend for one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendStatus {
    /// Backend-defined state label (e.g. `idle`, `running`)
    pub status: String,
    /// Number of turns the backend has recorded, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turns: Option<u32>,
}

/// Snapshot of a user's session for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    /// Current conversation handle, absent until the backend assigns one
    pub session_id: Option<SessionId>,
    /// Accumulated spend in USD
    pub total_cost: f64,
    /// Number of completed prompts
    pub prompt_count: u32,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When the last prompt completed
    pub last_active: DateTime<Utc>,
    /// Whether a prompt is currently running
    pub busy: bool,
    /// Live backend status, when the backend supports inspection
    pub backend_status: Option<BackendStatus>,
}
