//! Pipeline configuration stored as TOML (default `transpipe.toml`).
//!
//! Phase and retry definitions are static configuration shared across runs.
//! Missing fields default to the five-phase translation pipeline.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::extract::Extraction;
use crate::core::language::Language;
use crate::core::retry::RetryCondition;
use crate::error::ConfigError;

/// Workspace key holding the source program given to `run`.
pub const ORIGINAL_CODE_KEY: &str = "original_code";
/// Workspace key holding the optional program identifier given to `run`.
pub const PROGRAM_KEY: &str = "program_key";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Agent that initiates every phase; sees the whole workspace by default.
    pub coordinator: String,
    pub phases: Vec<PhaseConfig>,
    /// Per-agent workspace allow-lists used when a phase names no context keys.
    pub access: BTreeMap<String, Vec<String>>,
    pub retry: RetryConfig,
    pub harness: HarnessConfig,
    pub collaborator: CollaboratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseConfig {
    pub name: String,
    /// Assigned agents; only the first is driven.
    pub agents: Vec<String>,
    #[serde(default)]
    pub context_keys: Vec<String>,
    pub output_key: String,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default)]
    pub extraction: Extraction,
    /// minijinja template rendered with the resolved context.
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub enabled: bool,
    /// Restarts allowed after the first pass through the phases.
    pub max_retries: u32,
    /// Workspace key receiving the concatenated retry messages.
    pub feedback_key: String,
    pub conditions: Vec<RetryCondition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Wall-clock limit for every compile, run, and syntax check.
    pub timeout_secs: u64,
    /// Bytes of stdout/stderr kept per process.
    pub output_limit_bytes: usize,
    /// Compiler argv; the harness appends `<source> -o <binary>`.
    pub cpp_compiler: Vec<String>,
    /// Interpreter argv; the harness appends `<source>`.
    pub python: Vec<String>,
    /// Language of implementation A (the legacy side).
    pub side_a: Language,
    /// Language of implementation B (the translated side).
    pub side_b: Language,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CollaboratorConfig {
    /// Backend argv; receives `--agent <name> --max-turns <n>` and the prompt on stdin.
    pub command: Vec<String>,
    pub timeout_secs: u64,
    pub output_limit_bytes: usize,
}

fn default_max_turns() -> u32 {
    1
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            feedback_key: "retry_feedback".to_string(),
            conditions: vec![
                RetryCondition::CleanPhrases {
                    workspace_key: "validation_results".to_string(),
                    phrases: vec![
                        "syntax errors: none".to_string(),
                        "compilation issues: none".to_string(),
                        "structural problems: none".to_string(),
                    ],
                    message: "validation errors detected".to_string(),
                },
                RetryCondition::ScoreThreshold {
                    workspace_key: "critic_review".to_string(),
                    min_score: 7,
                    message: "low critic score".to_string(),
                },
            ],
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            output_limit_bytes: 100_000,
            cpp_compiler: vec!["g++".to_string(), "-std=c++17".to_string()],
            python: vec!["python3".to_string()],
            side_a: Language::Cpp,
            side_b: Language::Python,
        }
    }
}

impl HarnessConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroLimit("harness.timeout_secs"));
        }
        if self.output_limit_bytes == 0 {
            return Err(ConfigError::ZeroLimit("harness.output_limit_bytes"));
        }
        if is_blank_command(&self.cpp_compiler) {
            return Err(ConfigError::EmptyCommand("harness.cpp_compiler"));
        }
        if is_blank_command(&self.python) {
            return Err(ConfigError::EmptyCommand("harness.python"));
        }
        Ok(())
    }
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: 10 * 60,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl CollaboratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Checked only when the command-backed collaborator is actually used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if is_blank_command(&self.command) {
            return Err(ConfigError::EmptyCommand("collaborator.command"));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroLimit("collaborator.timeout_secs"));
        }
        if self.output_limit_bytes == 0 {
            return Err(ConfigError::ZeroLimit("collaborator.output_limit_bytes"));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let keys = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();
        let phase = |name: &str, agent: &str, context: &[&str], output: &str, turns: u32| {
            PhaseConfig {
                name: name.to_string(),
                agents: vec![agent.to_string()],
                context_keys: keys(context),
                output_key: output.to_string(),
                max_turns: turns,
                extraction: Extraction::LastTurn,
                prompt: String::new(),
            }
        };

        let mut requirements = phase(
            "REQUIREMENTS",
            "Requirement_Engineer",
            &[ORIGINAL_CODE_KEY],
            "requirements",
            1,
        );
        requirements.prompt = "List the requirements of this program.\n\n{{ original_code }}".to_string();

        let mut translation = phase(
            "TRANSLATION",
            "Code_Translator",
            &["requirements", ORIGINAL_CODE_KEY, "retry_feedback"],
            "translated_code",
            1,
        );
        translation.extraction = Extraction::Capture {
            pattern: r"(?s)```(?:python|py)?[ \t]*\n(.*?)```".to_string(),
        };
        translation.prompt = concat!(
            "Requirements:\n{{ requirements }}\n\n",
            "Translate this C++ program to Python.\n\n{{ original_code }}",
            "{% if retry_feedback %}\n\nPrevious attempt feedback: {{ retry_feedback }}{% endif %}"
        )
        .to_string();

        let mut validation = phase(
            "VALIDATION",
            "Code_Validator",
            &["translated_code"],
            "validation_results",
            2,
        );
        validation.prompt = "Validate this Python code.\n\n{{ translated_code }}".to_string();

        let mut testing = phase(
            "TESTING",
            "Code_Tester",
            &[ORIGINAL_CODE_KEY, "translated_code"],
            "test_results",
            2,
        );
        testing.prompt = concat!(
            "Write matching tests and compare both programs.\n\n",
            "C++:\n{{ original_code }}\n\nPython:\n{{ translated_code }}"
        )
        .to_string();

        let mut review = phase(
            "REVIEW",
            "Critic",
            &["translated_code", "test_results"],
            "critic_review",
            1,
        );
        review.prompt = concat!(
            "Review the translation and give a Score out of 10.\n\n",
            "{{ translated_code }}\n\nTest results:\n{{ test_results }}"
        )
        .to_string();

        let mut access = BTreeMap::new();
        access.insert("Requirement_Engineer".to_string(), keys(&[ORIGINAL_CODE_KEY]));
        access.insert(
            "Code_Translator".to_string(),
            keys(&["requirements", ORIGINAL_CODE_KEY, "retry_feedback"]),
        );
        access.insert("Code_Validator".to_string(), keys(&["translated_code"]));
        access.insert(
            "Code_Tester".to_string(),
            keys(&[ORIGINAL_CODE_KEY, "translated_code", "requirements"]),
        );
        access.insert(
            "Critic".to_string(),
            keys(&["translated_code", "test_results", "validation_results"]),
        );

        Self {
            coordinator: "User_Proxy".to_string(),
            phases: vec![requirements, translation, validation, testing, review],
            access,
            retry: RetryConfig::default(),
            harness: HarnessConfig::default(),
            collaborator: CollaboratorConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Keys that some writer declares: seeds, retry feedback, and phase outputs.
    pub fn declared_keys(&self) -> BTreeSet<&str> {
        let mut keys: BTreeSet<&str> = [ORIGINAL_CODE_KEY, PROGRAM_KEY].into_iter().collect();
        keys.insert(self.retry.feedback_key.as_str());
        keys.extend(self.phases.iter().map(|p| p.output_key.as_str()));
        keys
    }

    /// Output keys of every phase, in phase order.
    pub fn output_keys(&self) -> Vec<&str> {
        self.phases.iter().map(|p| p.output_key.as_str()).collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.phases.is_empty() {
            return Err(ConfigError::EmptyPhaseOrder);
        }
        if self.retry.feedback_key.trim().is_empty() {
            return Err(ConfigError::MissingOutputKey("retry.feedback_key".to_string()));
        }
        for phase in &self.phases {
            if phase.agents.is_empty() || phase.agents.iter().any(|a| a.trim().is_empty()) {
                return Err(ConfigError::MissingAgent(phase.name.clone()));
            }
            if phase.output_key.trim().is_empty() {
                return Err(ConfigError::MissingOutputKey(phase.name.clone()));
            }
            if phase.max_turns == 0 {
                return Err(ConfigError::ZeroTurns(phase.name.clone()));
            }
            phase.extraction.compile(&phase.name)?;
            check_template(phase)?;
        }

        let declared = self.declared_keys();
        let check = |owner: String, key: &str| {
            if declared.contains(key) {
                Ok(())
            } else {
                Err(ConfigError::UndeclaredKey {
                    owner,
                    key: key.to_string(),
                })
            }
        };
        for phase in &self.phases {
            for key in &phase.context_keys {
                check(format!("phase '{}'", phase.name), key)?;
            }
        }
        for (agent, keys) in &self.access {
            for key in keys {
                check(format!("access list of '{agent}'"), key)?;
            }
        }
        for condition in &self.retry.conditions {
            if let Some(key) = condition.workspace_key() {
                check("retry condition".to_string(), key)?;
            }
        }

        self.harness.validate()
    }
}

fn check_template(phase: &PhaseConfig) -> Result<(), ConfigError> {
    let env = minijinja::Environment::new();
    env.template_from_str(&phase.prompt)
        .map(|_| ())
        .map_err(|err| ConfigError::InvalidTemplate {
            phase: phase.name.clone(),
            reason: err.to_string(),
        })
}

fn is_blank_command(command: &[String]) -> bool {
    command.first().is_none_or(|program| program.trim().is_empty())
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PipelineConfig::default()`.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        let cfg = PipelineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PipelineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PipelineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = PipelineConfig::default();
        cfg.validate().expect("valid");
        assert_eq!(
            cfg.output_keys(),
            vec![
                "requirements",
                "translated_code",
                "validation_results",
                "test_results",
                "critic_review"
            ]
        );
    }

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, PipelineConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("transpipe.toml");
        let cfg = PipelineConfig::default();
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn parses_tagged_conditions_and_extraction() {
        let raw = r#"
coordinator = "User_Proxy"

[access]
Code_Tester = ["test_results"]

[retry]
max_retries = 1

[[retry.conditions]]
type = "failure_phrases"
workspace_key = "test_results"
phrases = ["fail"]
message = "tests failed"

[[phases]]
name = "TESTING"
agents = ["Code_Tester"]
output_key = "test_results"
extraction = { mode = "capture", pattern = "Summary: (.*)" }
"#;
        let cfg: PipelineConfig = toml::from_str(raw).expect("parse");
        cfg.validate().expect("valid");
        assert_eq!(cfg.retry.max_retries, 1);
        assert_eq!(cfg.retry.feedback_key, "retry_feedback");
        assert_eq!(cfg.phases[0].max_turns, 1);
        assert!(matches!(
            cfg.retry.conditions[0],
            RetryCondition::FailurePhrases { .. }
        ));
        assert!(matches!(cfg.phases[0].extraction, Extraction::Capture { .. }));
    }

    #[test]
    fn undeclared_context_key_is_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.phases[2].context_keys.push("typo_code".to_string());
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::UndeclaredKey { key, .. } if key == "typo_code"));
    }

    #[test]
    fn undeclared_retry_key_is_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.retry.conditions.push(RetryCondition::ScoreThreshold {
            workspace_key: "nowhere".to_string(),
            min_score: 1,
            message: "m".to_string(),
        });
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::UndeclaredKey { .. })
        ));
    }

    #[test]
    fn phase_without_agent_is_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.phases[0].agents.clear();
        assert_eq!(
            cfg.validate().unwrap_err(),
            ConfigError::MissingAgent("REQUIREMENTS".to_string())
        );
    }

    #[test]
    fn broken_prompt_template_is_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.phases[4].prompt = "{% if %}".to_string();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidTemplate { phase, .. }) if phase == "REVIEW"
        ));
    }

    #[test]
    fn collaborator_requires_command() {
        let cfg = CollaboratorConfig::default();
        assert_eq!(
            cfg.validate().unwrap_err(),
            ConfigError::EmptyCommand("collaborator.command")
        );
    }
}
