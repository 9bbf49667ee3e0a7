//! Shared data types passed between core logic and I/O adapters.

use serde::{Deserialize, Serialize};

/// One speaker/content record in a collaborator transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Agent (or coordinator) that authored the turn.
    #[serde(alias = "name")]
    pub speaker: String,
    pub content: String,
}

impl Turn {
    pub fn new(speaker: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            content: content.into(),
        }
    }
}

/// Ordered list of turns produced by one or more collaborator invocations.
pub type Transcript = Vec<Turn>;

/// Outcome of one sandboxed subprocess unit (optional build step + run).
///
/// Failures never raise: spawn errors, compile failures, and timeouts are all
/// encoded here with `success == false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// Exit code of the last process run; `None` when killed or never spawned.
    pub return_code: Option<i32>,
    pub success: bool,
    /// The wall-clock timeout expired and the process group was killed.
    pub timed_out: bool,
    /// Human-readable record of the steps performed.
    pub log: String,
}

impl ExecutionResult {
    /// A failed result that never reached a running process.
    pub fn failed(stderr: impl Into<String>, log: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into(),
            log: log.into(),
            ..Self::default()
        }
    }
}

/// Result of a syntax-only check (`validate_code` tool contract).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub message: String,
    /// Line of the first reported error, when the toolchain provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl ValidationReport {
    pub fn valid(message: impl Into<String>) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            message: message.into(),
            line: None,
        }
    }

    pub fn invalid(error: impl Into<String>, message: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            valid: false,
            errors: vec![error.into()],
            message: message.into(),
            line,
        }
    }
}
