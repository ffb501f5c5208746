//! Runtime configuration
//!
//! Every setting can be given as a command-line flag or an environment
//! variable. The binary loads `.env` before parsing.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::backend::{Backend, RemoteBackend, SubprocessBackend};
use crate::channel::LineClient;
use crate::channel::line::DEFAULT_API_BASE;
use crate::error::{BridgeError, Result};
use crate::segment::{LINE_MAX_MESSAGE_CHARS, MIN_FENCE_REPAIR_LIMIT};
use crate::types::options::{AgentOptions, MAX_ALLOWED_TURNS, PermissionMode};

/// Which agent backend to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Local Claude Code CLI, one process per prompt
    Subprocess,
    /// Remote session API over HTTP
    Remote,
}

/// Bridge settings
#[derive(Debug, Clone, Parser)]
#[command(
    name = "chat-agent-bridge",
    version,
    about = "Bridges a chat webhook to a conversational agent, one conversation per user"
)]
pub struct BridgeConfig {
    /// Address the webhook server listens on
    #[arg(long = "bind", env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind_addr: SocketAddr,

    /// Channel secret used to verify webhook signatures
    #[arg(long, env = "LINE_CHANNEL_SECRET", hide_env_values = true)]
    pub line_channel_secret: String,

    /// Channel access token for the messaging API
    #[arg(long, env = "LINE_CHANNEL_ACCESS_TOKEN", hide_env_values = true)]
    pub line_channel_access_token: String,

    /// Messaging API origin
    #[arg(long, env = "LINE_API_BASE", default_value = DEFAULT_API_BASE)]
    pub line_api_base: String,

    /// Agent backend
    #[arg(long, env = "AGENT_BACKEND", value_enum, default_value_t = BackendKind::Subprocess)]
    pub backend: BackendKind,

    /// Path to the Claude Code CLI (searched on PATH when unset)
    #[arg(long, env = "CLAUDE_CLI_PATH")]
    pub cli_path: Option<PathBuf>,

    /// Working directory for the agent
    #[arg(long, env = "AGENT_CWD")]
    pub cwd: Option<PathBuf>,

    /// Model override
    #[arg(long, env = "AGENT_MODEL")]
    pub model: Option<String>,

    /// Maximum agent turns per prompt
    #[arg(long, env = "AGENT_MAX_TURNS")]
    pub max_turns: Option<u32>,

    /// Tools the agent may use without asking (comma separated)
    #[arg(long, env = "AGENT_ALLOWED_TOOLS", value_delimiter = ',')]
    pub allowed_tools: Vec<String>,

    /// Tools the agent may never use (comma separated)
    #[arg(long, env = "AGENT_DISALLOWED_TOOLS", value_delimiter = ',')]
    pub disallowed_tools: Vec<String>,

    /// Extra directories the agent may read (comma separated)
    #[arg(long = "add-dir", env = "AGENT_ADD_DIRS", value_delimiter = ',')]
    pub add_dirs: Vec<PathBuf>,

    /// Environment for the agent process as KEY=VALUE pairs (comma separated)
    #[arg(
        long = "agent-env",
        env = "AGENT_ENV",
        value_delimiter = ',',
        value_parser = parse_env_pair,
        hide_env_values = true
    )]
    pub agent_env: Vec<(String, String)>,

    /// Tool permission mode (default, acceptEdits, plan, bypassPermissions)
    #[arg(long, env = "AGENT_PERMISSION_MODE")]
    pub permission_mode: Option<String>,

    /// Text appended to the agent's system prompt
    #[arg(long, env = "AGENT_SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,

    /// Base URL of the remote session API
    #[arg(long, env = "AGENT_REMOTE_URL")]
    pub remote_url: Option<String>,

    /// Bearer key for the remote session API
    #[arg(long, env = "AGENT_REMOTE_API_KEY", hide_env_values = true)]
    pub remote_api_key: Option<String>,

    /// Bound on a single backend call, in seconds
    #[arg(long, env = "AGENT_TIMEOUT_SECS", default_value_t = 300)]
    pub timeout_secs: u64,

    /// Maximum characters per outbound message
    #[arg(long, env = "MESSAGE_CHUNK_LIMIT", default_value_t = LINE_MAX_MESSAGE_CHARS)]
    pub chunk_limit: usize,
}

impl BridgeConfig {
    /// Reject settings that cannot work together
    ///
    /// # Errors
    /// Returns [`BridgeError::InvalidConfig`] describing the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.line_channel_secret.trim().is_empty() {
            return Err(BridgeError::invalid_config("LINE_CHANNEL_SECRET is empty"));
        }
        if self.line_channel_access_token.trim().is_empty() {
            return Err(BridgeError::invalid_config(
                "LINE_CHANNEL_ACCESS_TOKEN is empty",
            ));
        }
        if self.timeout_secs == 0 {
            return Err(BridgeError::invalid_config(
                "AGENT_TIMEOUT_SECS must be greater than zero",
            ));
        }
        if self.chunk_limit == 0 {
            return Err(BridgeError::invalid_config(
                "MESSAGE_CHUNK_LIMIT must be greater than zero",
            ));
        }
        if self.chunk_limit > LINE_MAX_MESSAGE_CHARS {
            return Err(BridgeError::invalid_config(format!(
                "MESSAGE_CHUNK_LIMIT may not exceed {LINE_MAX_MESSAGE_CHARS}"
            )));
        }
        if self.chunk_limit < MIN_FENCE_REPAIR_LIMIT {
            log::warn!(
                "MESSAGE_CHUNK_LIMIT {} is below {MIN_FENCE_REPAIR_LIMIT}; code blocks split across messages will not be re-fenced",
                self.chunk_limit
            );
        }
        if let Some(turns) = self.max_turns
            && !(1..=MAX_ALLOWED_TURNS).contains(&turns)
        {
            return Err(BridgeError::invalid_config(format!(
                "AGENT_MAX_TURNS must be between 1 and {MAX_ALLOWED_TURNS}"
            )));
        }
        if self.backend == BackendKind::Remote
            && self
                .remote_url
                .as_deref()
                .is_none_or(|url| url.trim().is_empty())
        {
            return Err(BridgeError::invalid_config(
                "AGENT_REMOTE_URL is required for the remote backend",
            ));
        }
        self.parsed_permission_mode()?;
        Ok(())
    }

    /// Backend call timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Options for the CLI backend
    ///
    /// # Errors
    /// Returns error if the permission mode is not recognised
    pub fn agent_options(&self) -> Result<AgentOptions> {
        let mut builder = AgentOptions::builder()
            .allowed_tools(tool_list(&self.allowed_tools))
            .disallowed_tools(tool_list(&self.disallowed_tools));

        if let Some(ref model) = self.model {
            builder = builder.model(model);
        }
        if let Some(turns) = self.max_turns {
            builder = builder.max_turns(turns);
        }
        if let Some(mode) = self.parsed_permission_mode()? {
            builder = builder.permission_mode(mode);
        }
        if let Some(ref prompt) = self.system_prompt {
            builder = builder.append_system_prompt(prompt);
        }
        if let Some(ref cwd) = self.cwd {
            builder = builder.cwd(cwd);
        }
        for dir in &self.add_dirs {
            builder = builder.add_dir(dir);
        }
        for (key, value) in &self.agent_env {
            builder = builder.env(key, value);
        }

        Ok(builder.build())
    }

    /// Build the configured backend
    ///
    /// # Errors
    /// Returns error if the CLI cannot be found or the remote URL is missing
    pub fn build_backend(&self) -> Result<Backend> {
        match self.backend {
            BackendKind::Subprocess => Ok(Backend::Subprocess(SubprocessBackend::new(
                self.cli_path.clone(),
                self.agent_options()?,
            )?)),
            BackendKind::Remote => {
                let url = self.remote_url.clone().ok_or_else(|| {
                    BridgeError::invalid_config("AGENT_REMOTE_URL is required for the remote backend")
                })?;
                Ok(Backend::Remote(RemoteBackend::new(
                    url,
                    self.remote_api_key.clone(),
                )?))
            }
        }
    }

    /// Build the messaging API client
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn build_outbound(&self) -> Result<LineClient> {
        LineClient::new(&self.line_api_base, &self.line_channel_access_token)
    }

    fn parsed_permission_mode(&self) -> Result<Option<PermissionMode>> {
        self.permission_mode
            .as_deref()
            .map(str::trim)
            .filter(|mode| !mode.is_empty())
            .map(str::parse)
            .transpose()
    }
}

fn tool_list(tools: &[String]) -> Vec<&str> {
    tools
        .iter()
        .map(|tool| tool.trim())
        .filter(|tool| !tool.is_empty())
        .collect()
}

fn parse_env_pair(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
