//! # Chat Agent Bridge
//!
//! Connects a chat platform webhook to a conversational agent backend. Every
//! chat user gets one persistent agent conversation; their messages run one
//! at a time in arrival order, while different users are served concurrently.
//!
//! ## Quick Start
//!
//! ```no_run
//! use kodegen_chat_bridge::{AgentGateway, Bridge, LineClient, SubprocessBackend};
//! use kodegen_chat_bridge::types::AgentOptions;
//! use kodegen_chat_bridge::server::{AppState, router, serve};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = SubprocessBackend::new(None, AgentOptions::default())?;
//!     let outbound = LineClient::new("https://api.line.me", "channel-access-token")?;
//!     let bridge = Bridge::new(AgentGateway::new(backend), outbound, 5000);
//!
//!     let app = router(AppState::new(bridge, "channel-secret"));
//!     serve("0.0.0.0:3000".parse()?, app, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Components
//!
//! ### 1. Per-user ordering with [`UserQueue`]
//!
//! Operations for one user form a strict FIFO chain. A failing or dropped
//! operation settles its place in the chain, so later messages still run.
//!
//! ### 2. Sessions with [`AgentGateway`]
//!
//! The gateway keeps each user's conversation handle and accumulated cost,
//! bounds every backend call with a timeout, cancels a running prompt on
//! request, and retries once on a fresh conversation when the backend reports
//! the old one gone.
//!
//! ### 3. Segmentation with [`segment()`](segment::segment)
//!
//! Long responses are split into platform-sized chunks at newlines or spaces,
//! closing and reopening code fences across chunk boundaries.
//!
//! ### 4. Commands with [`Bridge`]
//!
//! `/reset`, `/abort`, `/session`, `/cost` and `/help` are answered
//! immediately; any other text is queued as a prompt.
//!
//! ## Backends
//!
//! - [`SubprocessBackend`] runs the Claude Code CLI once per prompt and resumes
//!   conversations with `--resume`
//! - [`RemoteBackend`] drives conversations hosted by a remote session API
//!
//! [`Backend`] selects one of them from configuration.
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, BridgeError>`](Result):
//!
//! ```no_run
//! # use kodegen_chat_bridge::{AgentGateway, BridgeError, SubprocessBackend};
//! # use kodegen_chat_bridge::types::AgentOptions;
//! # async fn example() {
//! # let backend = SubprocessBackend::new(None, AgentOptions::default()).unwrap();
//! # let gateway = AgentGateway::new(backend);
//! match gateway.send_prompt("user-1", "hello").await {
//!     Ok(reply) => println!("{}", reply.text),
//!     Err(BridgeError::Aborted) => println!("cancelled"),
//!     Err(e) => eprintln!("{}", e.user_message()),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod channel;
pub mod config;
pub mod error;
pub mod queue;
pub mod router;
pub mod segment;
pub mod server;
pub mod session;
pub mod types;

// Re-export commonly used types for external API
pub use backend::{AgentBackend, Backend, RemoteBackend, SubprocessBackend};
pub use channel::{ChatOutbound, LineClient, ReplyContext};
pub use config::{BackendKind, BridgeConfig};
pub use error::{BridgeError, MAX_ERROR_DISPLAY_CHARS, Result};
pub use queue::UserQueue;
pub use router::{Bridge, Command};
pub use session::{AgentGateway, SessionStore, UserSession};
pub use types::identifiers::{RequestId, SessionId};
pub use types::session::{BackendStatus, PromptReply, SessionInfo};

/// Version of the bridge
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
