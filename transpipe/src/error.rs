//! Configuration errors: the only failures allowed to escape a pipeline run.
//!
//! Subprocess, compile, parse, and timeout failures are folded into result
//! records instead.

/// Invalid pipeline, phase, or retry configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("phase order must contain at least one phase")]
    EmptyPhaseOrder,

    #[error("duplicate phase '{0}'")]
    DuplicatePhase(String),

    #[error("'{0}' is reserved for the terminal phase")]
    ReservedPhase(String),

    #[error("unknown phase '{0}'")]
    UnknownPhase(String),

    #[error("phase '{0}' has no assigned agent")]
    MissingAgent(String),

    #[error("phase '{0}' must declare a non-empty output key")]
    MissingOutputKey(String),

    #[error("phase '{0}': max_turns must be > 0")]
    ZeroTurns(String),

    #[error("{owner} references undeclared workspace key '{key}'")]
    UndeclaredKey { owner: String, key: String },

    #[error("phase '{phase}': invalid capture pattern: {reason}")]
    InvalidPattern { phase: String, reason: String },

    #[error("phase '{phase}': invalid prompt template: {reason}")]
    InvalidTemplate { phase: String, reason: String },

    #[error("{0} must be a non-empty command array")]
    EmptyCommand(&'static str),

    #[error("{0} must be > 0")]
    ZeroLimit(&'static str),
}
