//! Phase-sequencing translation pipeline with a cross-language differential test harness.
//!
//! A run drives an external collaborator through a fixed phase order
//! (requirements, translation, validation, testing, review), stores every phase
//! output in a run-scoped [`core::workspace::SharedWorkspace`], and restarts the
//! whole sequence when a retry condition fires and budget remains.
//!
//! - **[`core`]**: Pure, deterministic logic (workspace, phase sequencing, retry
//!   evaluation, output extraction, test-name matching, verdict aggregation).
//! - **[`io`]**: Side-effecting operations (child processes, toolchains, the
//!   collaborator backend, configuration files, prompt rendering).
//!
//! [`run`] coordinates core logic with I/O to execute a full pipeline run.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
