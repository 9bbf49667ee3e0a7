//! Collaborator abstraction for agent invocation.
//!
//! The [`Collaborator`] trait decouples phase execution from the text
//! generation backend. Tests use scripted collaborators that return
//! predetermined transcripts without spawning processes.

use anyhow::{Context, Result, bail};
use tracing::{debug, info, instrument};

use crate::core::types::{Transcript, Turn};
use crate::error::ConfigError;
use crate::io::config::CollaboratorConfig;
use crate::io::process::{command_from_argv, run_command_with_timeout};

/// Parameters for one collaborator invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeRequest {
    pub agent: String,
    /// Rendered prompt text.
    pub prompt: String,
    /// Upper bound on conversation turns the backend may produce.
    pub max_turns: u32,
}

/// Abstraction over text-generation backends.
pub trait Collaborator {
    /// Drive `request.agent` with the prompt and return the resulting turns.
    fn invoke(&self, request: &InvokeRequest) -> Result<Transcript>;
}

/// Collaborator that spawns a configured backend command.
///
/// The command receives `--agent <name> --max-turns <n>` after its configured
/// arguments and the prompt on stdin. Stdout is either a JSON array of
/// `{speaker, content}` turns or plain text taken as one turn by the agent.
#[derive(Debug, Clone)]
pub struct CommandCollaborator {
    config: CollaboratorConfig,
}

impl CommandCollaborator {
    pub fn new(config: CollaboratorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Collaborator for CommandCollaborator {
    #[instrument(skip_all, fields(agent = %request.agent, max_turns = request.max_turns))]
    fn invoke(&self, request: &InvokeRequest) -> Result<Transcript> {
        info!("invoking collaborator");
        let max_turns = request.max_turns.to_string();
        let cmd = command_from_argv(
            &self.config.command,
            &["--agent", &request.agent, "--max-turns", &max_turns],
        )
        .context("collaborator command")?;
        let output = run_command_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            self.config.timeout(),
            self.config.output_limit_bytes,
        )
        .context("run collaborator")?;

        if output.timed_out {
            bail!(
                "collaborator timed out after {}s",
                self.config.timeout_secs
            );
        }
        if !output.success() {
            bail!(
                "collaborator exited with code {:?}: {}",
                output.code(),
                output.stderr_lossy().trim()
            );
        }
        let transcript = parse_transcript(&output.stdout_lossy(), &request.agent);
        debug!(turns = transcript.len(), "collaborator finished");
        Ok(transcript)
    }
}

/// Parse backend stdout into turns.
///
/// A JSON array of turns is used as-is; any other non-empty text becomes a
/// single turn authored by `agent`.
pub fn parse_transcript(stdout: &str, agent: &str) -> Transcript {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.starts_with('[') {
        if let Ok(turns) = serde_json::from_str::<Transcript>(trimmed) {
            return turns;
        }
    }
    vec![Turn::new(agent, trimmed)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_turns_are_parsed() {
        let turns = parse_transcript(
            r#"[{"speaker":"User_Proxy","content":"go"},{"name":"Critic","content":"Score: 8"}]"#,
            "Critic",
        );
        assert_eq!(
            turns,
            vec![Turn::new("User_Proxy", "go"), Turn::new("Critic", "Score: 8")]
        );
    }

    #[test]
    fn plain_text_is_single_agent_turn() {
        assert_eq!(
            parse_transcript("Score: 8\n", "Critic"),
            vec![Turn::new("Critic", "Score: 8")]
        );
        assert_eq!(
            parse_transcript("[not json", "Critic"),
            vec![Turn::new("Critic", "[not json")]
        );
        assert!(parse_transcript("  \n", "Critic").is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn command_collaborator_passes_agent_and_prompt() {
        let collaborator = CommandCollaborator::new(CollaboratorConfig {
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                r#"read prompt; echo "$2 $4 $prompt""#.to_string(),
                "collaborator".to_string(),
            ],
            timeout_secs: 5,
            output_limit_bytes: 1000,
        })
        .expect("collaborator");
        let transcript = collaborator
            .invoke(&InvokeRequest {
                agent: "Critic".to_string(),
                prompt: "review this\n".to_string(),
                max_turns: 2,
            })
            .expect("invoke");
        assert_eq!(transcript, vec![Turn::new("Critic", "Critic 2 review this")]);
    }

    #[cfg(unix)]
    #[test]
    fn failing_backend_is_an_error() {
        let collaborator = CommandCollaborator::new(CollaboratorConfig {
            command: vec!["sh".to_string(), "-c".to_string(), "exit 7".to_string()],
            timeout_secs: 5,
            output_limit_bytes: 1000,
        })
        .expect("collaborator");
        let err = collaborator
            .invoke(&InvokeRequest {
                agent: "Critic".to_string(),
                prompt: String::new(),
                max_turns: 1,
            })
            .unwrap_err();
        assert!(err.to_string().contains("code Some(7)"));
    }
}
