//! Agent options for the Claude Code CLI backend
//!
//! This module contains the options every CLI invocation is started with,
//! including a builder pattern for easy configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Upper bound accepted for `max_turns`
pub const MAX_ALLOWED_TURNS: u32 = 1000;

/// Permission mode for tool execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Default mode - CLI prompts for dangerous tools
    Default,
    /// Auto-accept file edits
    AcceptEdits,
    /// Plan mode
    Plan,
    /// Allow all tools (use with caution)
    BypassPermissions,
}

impl PermissionMode {
    /// Value of the CLI's `--permission-mode` flag
    #[must_use]
    pub const fn as_cli_arg(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::Plan => "plan",
            Self::BypassPermissions => "bypassPermissions",
        }
    }
}

impl FromStr for PermissionMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "default" => Ok(Self::Default),
            "acceptedits" => Ok(Self::AcceptEdits),
            "plan" => Ok(Self::Plan),
            "bypasspermissions" => Ok(Self::BypassPermissions),
            other => Err(BridgeError::invalid_config(format!(
                "unknown permission mode: {other}"
            ))),
        }
    }
}

// ============================================================================
// Agent Options
// ============================================================================

/// Options applied to every CLI invocation
#[derive(Debug, Clone, Default)]
pub struct AgentOptions {
    /// List of tools that Claude is allowed to use
    pub allowed_tools: Vec<String>,
    /// List of tools that Claude is not allowed to use
    pub disallowed_tools: Vec<String>,
    /// Text appended to the default system prompt
    pub append_system_prompt: Option<String>,
    /// Permission mode for tool execution
    pub permission_mode: Option<PermissionMode>,
    /// Maximum number of turns per prompt
    pub max_turns: Option<u32>,
    /// AI model to use
    pub model: Option<String>,
    /// Working directory for the CLI process
    pub cwd: Option<PathBuf>,
    /// Additional directories to add to the context
    pub add_dirs: Vec<PathBuf>,
    /// Environment variables for the CLI process
    pub env: HashMap<String, String>,
}

impl AgentOptions {
    /// Create a new builder for `AgentOptions`
    #[must_use]
    pub fn builder() -> AgentOptionsBuilder {
        AgentOptionsBuilder::default()
    }
}

// ============================================================================
// Builder for AgentOptions
// ============================================================================

/// Builder for `AgentOptions`
#[derive(Debug, Default)]
pub struct AgentOptionsBuilder {
    options: AgentOptions,
}

impl AgentOptionsBuilder {
    /// Set allowed tools
    #[must_use]
    pub fn allowed_tools(mut self, tools: Vec<impl Into<String>>) -> Self {
        self.options.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Set disallowed tools
    #[must_use]
    pub fn disallowed_tools(mut self, tools: Vec<impl Into<String>>) -> Self {
        self.options.disallowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Append text to the default system prompt
    #[must_use]
    pub fn append_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.options.append_system_prompt = Some(prompt.into());
        self
    }

    /// Set permission mode
    #[must_use]
    pub const fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.options.permission_mode = Some(mode);
        self
    }

    /// Set max turns, clamped to [`MAX_ALLOWED_TURNS`]
    #[must_use]
    pub fn max_turns(mut self, turns: u32) -> Self {
        self.options.max_turns = Some(turns.min(MAX_ALLOWED_TURNS));
        self
    }

    /// Set model
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.options.model = Some(model.into());
        self
    }

    /// Set working directory
    #[must_use]
    pub fn cwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.cwd = Some(path.into());
        self
    }

    /// Add a directory the agent may read besides `cwd`
    #[must_use]
    pub fn add_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.add_dirs.push(path.into());
        self
    }

    /// Add an environment variable for the CLI process
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.env.insert(key.into(), value.into());
        self
    }

    /// Build the options
    #[must_use]
    pub fn build(self) -> AgentOptions {
        self.options
    }
}
