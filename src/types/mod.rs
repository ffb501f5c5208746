//! Type definitions shared across the bridge
//!
//! - [`identifiers`] - Type-safe ID wrappers (`SessionId`, `RequestId`)
//! - [`messages`] - Claude Code CLI stream-json message types
//! - [`options`] - Agent options passed to the CLI backend
//! - [`session`] - Prompt results and session snapshots

pub mod identifiers;
pub mod messages;
pub mod options;
pub mod session;

pub use identifiers::{RequestId, SessionId};
pub use messages::{ContentBlock, Message};
pub use options::{AgentOptions, AgentOptionsBuilder, PermissionMode};
pub use session::{BackendStatus, PromptReply, SessionInfo};
