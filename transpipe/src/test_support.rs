//! Test-only helpers: a scripted collaborator and small pipeline configs.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::process::{Command, Stdio};

use anyhow::{Result, anyhow, bail};

use crate::core::extract::Extraction;
use crate::core::retry::RetryCondition;
use crate::core::types::{Transcript, Turn};
use crate::io::collaborator::{Collaborator, InvokeRequest};
use crate::io::config::{PhaseConfig, PipelineConfig, RetryConfig};

/// Validation text that satisfies [`two_phase_config`]'s clean-phrase check.
pub const CLEAN_VALIDATION: &str = "Syntax errors: none\nCompilation issues: none";

/// Collaborator returning queued transcripts in order and recording every request.
pub struct ScriptedCollaborator {
    replies: RefCell<VecDeque<Transcript>>,
    fail_all: bool,
    invocations: RefCell<Vec<InvokeRequest>>,
}

impl ScriptedCollaborator {
    pub fn new(replies: Vec<Transcript>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            fail_all: false,
            invocations: RefCell::new(Vec::new()),
        }
    }

    /// Every invocation returns an error.
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn invocations(&self) -> Vec<InvokeRequest> {
        self.invocations.borrow().clone()
    }
}

impl Collaborator for ScriptedCollaborator {
    fn invoke(&self, request: &InvokeRequest) -> Result<Transcript> {
        self.invocations.borrow_mut().push(request.clone());
        if self.fail_all {
            bail!("scripted failure for {}", request.agent);
        }
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted reply left for {}", request.agent))
    }
}

/// Transcripts for one pass of [`two_phase_config`] with the given validation text.
pub fn attempt_with_validation(validation: &str) -> Vec<Transcript> {
    vec![
        vec![Turn::new("Code_Translator", "```python\nprint(5)\n```")],
        vec![Turn::new("Code_Validator", validation)],
    ]
}

/// One pass of [`two_phase_config`] that satisfies every retry condition.
pub fn clean_attempt() -> Vec<Transcript> {
    attempt_with_validation(CLEAN_VALIDATION)
}

/// TRANSLATION then VALIDATION, retried on unclean validation results.
pub fn two_phase_config(max_retries: u32) -> PipelineConfig {
    PipelineConfig {
        coordinator: "User_Proxy".to_string(),
        phases: vec![
            PhaseConfig {
                name: "TRANSLATION".to_string(),
                agents: vec!["Code_Translator".to_string()],
                context_keys: vec!["original_code".to_string(), "retry_feedback".to_string()],
                output_key: "translated_code".to_string(),
                max_turns: 1,
                extraction: Extraction::Capture {
                    pattern: r"(?s)```python\n(.*?)```".to_string(),
                },
                prompt: "Translate:\n{{ original_code }}\n{{ retry_feedback }}".to_string(),
            },
            PhaseConfig {
                name: "VALIDATION".to_string(),
                agents: vec!["Code_Validator".to_string()],
                context_keys: vec!["translated_code".to_string()],
                output_key: "validation_results".to_string(),
                max_turns: 2,
                extraction: Extraction::LastTurn,
                prompt: "Validate:\n{{ translated_code }}".to_string(),
            },
        ],
        access: BTreeMap::new(),
        retry: RetryConfig {
            enabled: true,
            max_retries,
            feedback_key: "retry_feedback".to_string(),
            conditions: vec![RetryCondition::CleanPhrases {
                workspace_key: "validation_results".to_string(),
                phrases: vec![
                    "syntax errors: none".to_string(),
                    "compilation issues: none".to_string(),
                ],
                message: "validation errors detected".to_string(),
            }],
        },
        ..PipelineConfig::default()
    }
}

/// True when `program --version` runs successfully.
pub fn toolchain_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}
