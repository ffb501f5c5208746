//! Claude Code CLI backend
//!
//! Every prompt runs one `claude --print` process. The conversation handle is
//! the CLI's own session id, passed back through `--resume`.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::Stdio;

use futures::StreamExt;
use tokio::io::BufReader;

use crate::VERSION;
use crate::backend::AgentBackend;
use crate::error::{BridgeError, Result};
use crate::types::identifiers::SessionId;
use crate::types::messages::{Message, parse_message};
use crate::types::options::AgentOptions;
use crate::types::session::{BackendStatus, PromptReply};

use super::command::CommandBuilder;
use super::config::{DANGEROUS_ENV_VARS, DEFAULT_MAX_BUFFER_SIZE};
use super::reader::{capture_stderr, read_json_lines};

/// Backend that runs the Claude Code CLI as a subprocess
pub struct SubprocessBackend {
    cli_path: PathBuf,
    options: AgentOptions,
}

impl SubprocessBackend {
    /// Create a new subprocess backend
    ///
    /// # Arguments
    /// * `cli_path` - Optional path to Claude Code CLI (will search if None)
    /// * `options` - Options applied to every invocation
    ///
    /// # Errors
    /// Returns error if CLI cannot be found
    pub fn new(cli_path: Option<PathBuf>, options: AgentOptions) -> Result<Self> {
        let cli_path = match cli_path {
            Some(path) => path,
            None => Self::find_cli()?,
        };
        log::info!("Using Claude Code CLI at {}", cli_path.display());
        Ok(Self { cli_path, options })
    }

    /// Find Claude Code CLI binary
    ///
    /// # Errors
    /// Returns error if CLI cannot be found in PATH or common locations
    pub fn find_cli() -> Result<PathBuf> {
        if let Ok(path) = which::which("claude") {
            return Ok(path);
        }

        let home = env::var("HOME").unwrap_or_else(|_| String::from("/root"));
        let locations = [
            PathBuf::from(&home).join(".npm-global/bin/claude"),
            PathBuf::from("/usr/local/bin/claude"),
            PathBuf::from(&home).join(".local/bin/claude"),
            PathBuf::from(&home).join(".claude/local/claude"),
            PathBuf::from(&home).join("node_modules/.bin/claude"),
        ];

        locations
            .into_iter()
            .find(|path| path.is_file())
            .ok_or_else(BridgeError::cli_not_found)
    }

    /// Environment for the child, with dangerous user overrides dropped
    fn process_env(&self) -> HashMap<String, String> {
        let mut process_env = env::vars().collect::<HashMap<_, _>>();

        for (key, value) in &self.options.env {
            if DANGEROUS_ENV_VARS.contains(&key.as_str()) {
                log::warn!("Refusing to override {key} for the Claude Code process");
                continue;
            }
            process_env.insert(key.clone(), value.clone());
        }

        process_env.insert("CLAUDE_CODE_ENTRYPOINT".to_string(), "sdk-rust".to_string());
        process_env.insert("KODEGEN_CHAT_BRIDGE_VERSION".to_string(), VERSION.to_string());

        if let Some(ref cwd) = self.options.cwd {
            process_env.insert("PWD".to_string(), cwd.to_string_lossy().to_string());
        }

        process_env
    }
}

impl AgentBackend for SubprocessBackend {
    fn name(&self) -> &'static str {
        "subprocess"
    }

    async fn create(&self) -> Result<Option<SessionId>> {
        // The CLI assigns the session id with the first result.
        Ok(None)
    }

    async fn send(&self, session: Option<&SessionId>, prompt: &str) -> Result<PromptReply> {
        let mut cmd = CommandBuilder::new(&self.cli_path, prompt, session, &self.options).build();
        cmd.envs(self.process_env());
        if let Some(ref cwd) = self.options.cwd {
            cmd.current_dir(cwd);
        }

        // Dropping the send future (abort, timeout) kills the process.
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if let Some(ref cwd) = self.options.cwd
                && !cwd.exists()
            {
                return BridgeError::connection(format!(
                    "Working directory does not exist: {}",
                    cwd.display()
                ));
            }
            BridgeError::connection(format!("Failed to start Claude Code: {e}"))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::connection("Failed to get stdout handle"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BridgeError::connection("Failed to get stderr handle"))?;
        let stderr_task = tokio::spawn(capture_stderr(stderr));

        let mut lines = Box::pin(read_json_lines(
            BufReader::new(stdout),
            DEFAULT_MAX_BUFFER_SIZE,
        ));

        let mut reply: Option<PromptReply> = None;
        let mut last_assistant_text = String::new();

        while let Some(line) = lines.next().await {
            match parse_message(line?) {
                Ok(Message::Result {
                    subtype,
                    is_error,
                    session_id,
                    total_cost_usd,
                    result,
                    num_turns,
                    duration_ms,
                }) => {
                    log::debug!(
                        "CLI result: subtype={subtype} turns={num_turns} duration={duration_ms}ms"
                    );
                    let text = result.unwrap_or_else(|| {
                        if is_error {
                            subtype
                        } else {
                            std::mem::take(&mut last_assistant_text)
                        }
                    });
                    reply = Some(PromptReply {
                        text,
                        cost_usd: total_cost_usd.unwrap_or(0.0),
                        is_error,
                        session_id: Some(session_id),
                    });
                }
                Ok(Message::Assistant { message, .. }) => {
                    let text = message.text();
                    if !text.is_empty() {
                        last_assistant_text = text;
                    }
                }
                Ok(Message::System { subtype, .. }) => {
                    log::debug!("CLI system message: {subtype}");
                }
                Ok(Message::User { .. }) => {}
                Err(e) => log::debug!("Skipping unrecognised CLI output: {e}"),
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();

        match reply {
            Some(reply) => {
                if !status.success() {
                    log::warn!("Claude Code exited with {status} after reporting a result");
                }
                Ok(reply)
            }
            None => Err(BridgeError::process(
                "Claude Code exited without a result",
                status.code().unwrap_or(-1),
                (!stderr.is_empty()).then_some(stderr),
            )),
        }
    }

    async fn abort(&self, _session: &SessionId) -> Result<()> {
        // Cancellation drops the running send future, which kills the child.
        Ok(())
    }

    async fn inspect(&self, _session: &SessionId) -> Result<Option<BackendStatus>> {
        Ok(None)
    }

    async fn destroy(&self, session: &SessionId) -> Result<()> {
        log::debug!("Forgetting CLI session {session}; transcript stays on disk");
        Ok(())
    }
}
