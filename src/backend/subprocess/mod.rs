//! Subprocess backend using the Claude Code CLI
//!
//! Spawns `claude --print --output-format stream-json` for each prompt and
//! reads the final `result` message from its stdout.

mod backend;
mod command;
mod config;
mod reader;

pub use backend::SubprocessBackend;
pub use command::CommandBuilder;
pub use config::{DANGEROUS_ENV_VARS, DEFAULT_MAX_BUFFER_SIZE};
