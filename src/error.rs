//! Error types for the chat bridge

use thiserror::Error;

/// Maximum number of characters of an error shown to a chat user
pub const MAX_ERROR_DISPLAY_CHARS: usize = 200;

/// Lower-cased fragments of backend error text that mean the conversation is gone
const SESSION_EXPIRED_MARKERS: &[&str] = &[
    "no conversation found",
    "conversation not found",
    "session not found",
    "session expired",
];

/// Main error type for the chat bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Claude Code CLI not found or not installed
    #[error("Claude Code CLI not found: {0}")]
    CliNotFound(String),

    /// Connection error when talking to the agent backend
    #[error("Connection error: {0}")]
    Connection(String),

    /// Process execution error with exit code and stderr
    #[error("Process error (exit code {exit_code}): {message}")]
    Process {
        /// Error message
        message: String,
        /// Process exit code
        exit_code: i32,
        /// Standard error output
        stderr: Option<String>,
    },

    /// JSON decode error when parsing CLI or API output
    #[error("JSON decode error: {0}")]
    JsonDecode(#[from] serde_json::Error),

    /// Message parse error with optional raw data
    #[error("Message parse error: {message}")]
    MessageParse {
        /// Error message
        message: String,
        /// Raw message data that failed to parse
        data: Option<serde_json::Value>,
    },

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend reported a failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// The backend no longer knows the conversation
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The in-flight operation was cancelled by the user
    #[error("Operation aborted")]
    Aborted,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Delivery to the chat platform failed
    #[error("Outbound delivery failed: {0}")]
    Outbound(String),

    /// Webhook signature did not match
    #[error("Invalid webhook signature")]
    InvalidSignature,
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    /// Create a CLI not found error
    #[must_use]
    pub fn cli_not_found() -> Self {
        Self::CliNotFound(
            "Claude Code not found. Install with:\n\
             npm install -g @anthropic-ai/claude-code\n\
             \n\
             Or set CLAUDE_CLI_PATH to the binary location"
                .to_string(),
        )
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a process error
    pub fn process(msg: impl Into<String>, exit_code: i32, stderr: Option<String>) -> Self {
        Self::Process {
            message: msg.into(),
            exit_code,
            stderr,
        }
    }

    /// Create a message parse error
    pub fn message_parse(msg: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self::MessageParse {
            message: msg.into(),
            data,
        }
    }

    /// Create a JSON decode error for output exceeding the line buffer
    #[must_use]
    pub fn json_overflow(max_buffer_size: usize) -> Self {
        Self::JsonDecode(serde_json::Error::io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("JSON message exceeded maximum buffer size of {max_buffer_size} bytes"),
        )))
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a session expired error
    pub fn session_expired(msg: impl Into<String>) -> Self {
        Self::SessionExpired(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an outbound delivery error
    pub fn outbound(msg: impl Into<String>) -> Self {
        Self::Outbound(msg.into())
    }

    /// Whether this error means the backend conversation no longer exists
    ///
    /// Backends that can tell return [`BridgeError::SessionExpired`]. The CLI only
    /// reports the condition in its error text, so process and backend errors are
    /// matched against known markers as a fallback.
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        match self {
            Self::SessionExpired(_) => true,
            Self::Backend(message) => mentions_missing_session(message),
            Self::Process {
                message, stderr, ..
            } => {
                mentions_missing_session(message)
                    || stderr.as_deref().is_some_and(mentions_missing_session)
            }
            _ => false,
        }
    }

    /// Render the error for a chat user, bounded to [`MAX_ERROR_DISPLAY_CHARS`]
    #[must_use]
    pub fn user_message(&self) -> String {
        let detail = match self {
            Self::Process {
                message,
                stderr: Some(stderr),
                ..
            } if !stderr.trim().is_empty() => format!("{message}: {}", stderr.trim()),
            other => other.to_string(),
        };
        truncate_for_display(&format!("Error: {detail}"), MAX_ERROR_DISPLAY_CHARS)
    }
}

fn mentions_missing_session(text: &str) -> bool {
    let lowered = text.to_lowercase();
    SESSION_EXPIRED_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Truncate `text` to at most `max_chars` characters, marking the cut with `...`
#[must_use]
pub fn truncate_for_display(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str("...");
    truncated
}
