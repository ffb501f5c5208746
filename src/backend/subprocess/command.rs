//! CLI command building logic for the subprocess backend

use std::path::Path;
use tokio::process::Command;

use crate::types::identifiers::SessionId;
use crate::types::options::AgentOptions;

/// Command builder for one Claude CLI prompt invocation
pub struct CommandBuilder<'a> {
    cli_path: &'a Path,
    prompt: &'a str,
    resume: Option<&'a SessionId>,
    options: &'a AgentOptions,
}

impl<'a> CommandBuilder<'a> {
    /// Create a new command builder
    pub fn new(
        cli_path: &'a Path,
        prompt: &'a str,
        resume: Option<&'a SessionId>,
        options: &'a AgentOptions,
    ) -> Self {
        Self {
            cli_path,
            prompt,
            resume,
            options,
        }
    }

    /// Build the complete CLI command with all arguments
    pub fn build(&self) -> Command {
        let mut cmd = Command::new(self.cli_path);
        cmd.args(self.args());
        cmd
    }

    /// Arguments passed to the CLI, prompt last
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--print".into(),
            "--output-format".into(),
            "stream-json".into(),
            "--verbose".into(),
        ];

        if let Some(session_id) = self.resume {
            args.push("--resume".into());
            args.push(session_id.as_str().to_string());
        }

        if let Some(ref append) = self.options.append_system_prompt {
            args.push("--append-system-prompt".into());
            args.push(append.clone());
        }

        self.add_tool_args(&mut args);
        self.add_configuration_args(&mut args);

        args.push("--".into());
        args.push(self.prompt.to_string());
        args
    }

    /// Add tool-related arguments
    fn add_tool_args(&self, args: &mut Vec<String>) {
        if !self.options.allowed_tools.is_empty() {
            args.push("--allowedTools".into());
            args.push(self.options.allowed_tools.join(","));
        }

        if !self.options.disallowed_tools.is_empty() {
            args.push("--disallowedTools".into());
            args.push(self.options.disallowed_tools.join(","));
        }
    }

    /// Add configuration arguments (model, max turns, permissions, directories)
    fn add_configuration_args(&self, args: &mut Vec<String>) {
        if let Some(max_turns) = self.options.max_turns {
            args.push("--max-turns".into());
            args.push(max_turns.to_string());
        }

        if let Some(ref model) = self.options.model {
            args.push("--model".into());
            args.push(model.clone());
        }

        if let Some(mode) = self.options.permission_mode {
            args.push("--permission-mode".into());
            args.push(mode.as_cli_arg().into());
        }

        for dir in &self.options.add_dirs {
            args.push("--add-dir".into());
            args.push(dir.to_string_lossy().into_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::options::PermissionMode;

    #[test]
    fn fresh_conversation_has_no_resume() {
        let options = AgentOptions::default();
        let builder = CommandBuilder::new(Path::new("claude"), "hi", None, &options);
        let args = builder.args();
        assert!(!args.iter().any(|a| a == "--resume"));
        assert_eq!(&args[args.len() - 2..], ["--", "hi"]);
    }

    #[test]
    fn resume_and_options_are_forwarded() {
        let options = AgentOptions::builder()
            .model("sonnet")
            .max_turns(4)
            .permission_mode(PermissionMode::AcceptEdits)
            .allowed_tools(vec!["Read", "Grep"])
            .disallowed_tools(vec!["Bash"])
            .add_dir("/srv/docs")
            .build();

        let session = SessionId::new("abc");
        let builder = CommandBuilder::new(Path::new("claude"), "--help", Some(&session), &options);
        let args = builder.args().join(" ");

        assert!(args.contains("--resume abc"));
        assert!(args.contains("--model sonnet"));
        assert!(args.contains("--max-turns 4"));
        assert!(args.contains("--permission-mode acceptEdits"));
        assert!(args.contains("--allowedTools Read,Grep"));
        assert!(args.contains("--disallowedTools Bash"));
        assert!(args.contains("--add-dir /srv/docs"));
        assert!(args.ends_with("-- --help"));
    }
}
