//! Differential test harness: one sandboxed process per test per side.
//!
//! Every unit gets a private temporary directory, is built there when its
//! language needs a build step, and runs with the test input on stdin under a
//! hard timeout. Failures of any kind are recorded in the [`ExecutionResult`].

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::compare::{ComparisonRecord, ComparisonSummary};
use crate::core::language::{Language, common_test_names};
use crate::core::types::ExecutionResult;
use crate::io::config::HarnessConfig;
use crate::io::process::{
    CommandOutput, command_from_argv, is_program_missing, run_command_with_timeout,
};

const BINARY_NAME: &str = "unit";

/// Build (if needed) and run one self-contained unit with `stdin` piped in.
#[instrument(skip_all, fields(language = %language))]
pub fn execute_unit(
    language: Language,
    source: &str,
    stdin: &str,
    config: &HarnessConfig,
) -> ExecutionResult {
    let mut log = String::new();
    match try_execute_unit(language, source, stdin, config, &mut log) {
        Ok(result) => result,
        Err(err) => {
            let stderr = if is_program_missing(&err) {
                format!("ToolchainMissing: {err:#}")
            } else {
                format!("{err:#}")
            };
            warn!(err = %stderr, "unit did not run");
            let _ = writeln!(log, "aborted: {stderr}");
            ExecutionResult::failed(stderr, log)
        }
    }
}

fn try_execute_unit(
    language: Language,
    source: &str,
    stdin: &str,
    config: &HarnessConfig,
    log: &mut String,
) -> Result<ExecutionResult> {
    let dir = tempfile::Builder::new()
        .prefix("transpipe-unit-")
        .tempdir()
        .context("create unit directory")?;
    let source_path = dir.path().join(language.source_file());
    fs::write(&source_path, source)
        .with_context(|| format!("write {}", source_path.display()))?;
    let _ = writeln!(log, "wrote {} ({} bytes)", source_path.display(), source.len());

    let mut cmd = match language {
        Language::Cpp => {
            let compiled = compile_unit(language, dir.path(), config, log)?;
            if let Some(failure) = compiled {
                return Ok(failure);
            }
            Command::new(dir.path().join(BINARY_NAME))
        }
        Language::Python => {
            command_from_argv(&config.python, &[language.source_file()])
                .context("python command")?
        }
    };
    cmd.current_dir(dir.path());
    let _ = writeln!(log, "run: {}", describe(&cmd));

    let output = run_command_with_timeout(
        cmd,
        Some(stdin.as_bytes()),
        config.timeout(),
        config.output_limit_bytes,
    )
    .context("run unit")?;
    Ok(finish_run(output, config, log))
}

/// Compile the unit in `dir`; `Some` carries the failed result to report.
fn compile_unit(
    language: Language,
    dir: &Path,
    config: &HarnessConfig,
    log: &mut String,
) -> Result<Option<ExecutionResult>> {
    let mut cmd = command_from_argv(
        &config.cpp_compiler,
        &[language.source_file(), "-o", BINARY_NAME],
    )
    .context("compiler command")?;
    cmd.current_dir(dir);
    let _ = writeln!(log, "compile: {}", describe(&cmd));

    let output = run_command_with_timeout(cmd, None, config.timeout(), config.output_limit_bytes)
        .context("run compiler")?;
    if output.success() {
        let _ = writeln!(log, "compile succeeded");
        return Ok(None);
    }

    let stderr = if output.timed_out {
        format!(
            "TimeoutExpired: compilation exceeded {}s\n{}",
            config.timeout_secs,
            output.stderr_lossy()
        )
    } else {
        format!("Compilation failed.\n{}", output.stderr_lossy())
    };
    let _ = writeln!(
        log,
        "compile failed (exit code {:?}, timed out {})",
        output.code(),
        output.timed_out
    );
    debug!(exit_code = ?output.code(), timed_out = output.timed_out, "compile failed");
    Ok(Some(ExecutionResult {
        stdout: output.stdout_lossy(),
        stderr,
        return_code: output.code(),
        success: false,
        timed_out: output.timed_out,
        log: log.clone(),
    }))
}

fn finish_run(output: CommandOutput, config: &HarnessConfig, log: &mut String) -> ExecutionResult {
    let mut stderr = output.stderr_lossy();
    if output.timed_out {
        stderr = format!(
            "TimeoutExpired: execution exceeded {}s\n{stderr}",
            config.timeout_secs
        );
    }
    let _ = writeln!(
        log,
        "exit code {:?}, timed out {}",
        output.code(),
        output.timed_out
    );
    ExecutionResult {
        stdout: output.stdout_lossy(),
        stderr,
        return_code: output.code(),
        success: output.success(),
        timed_out: output.timed_out,
        log: log.clone(),
    }
}

fn note_displaced_entry_point(result: &mut ExecutionResult) {
    result
        .log
        .insert_str(0, "existing entry point displaced by the unit driver\n");
}

fn describe(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Judges behavioral equivalence of two implementations test by test.
#[derive(Debug, Clone)]
pub struct DifferentialHarness {
    config: HarnessConfig,
}

impl DifferentialHarness {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run every test name present in both test sources against both sides.
    ///
    /// `input` is piped to every unit's stdin.
    #[instrument(skip_all, fields(side_a = %self.config.side_a, side_b = %self.config.side_b))]
    pub fn compare(
        &self,
        impl_a: &str,
        impl_b: &str,
        tests_a: &str,
        tests_b: &str,
        input: &str,
    ) -> ComparisonSummary {
        let side_a = self.config.side_a;
        let side_b = self.config.side_b;
        let names_a = side_a.test_names(tests_a);
        let names_b = side_b.test_names(tests_b);
        let common = common_test_names(&names_a, &names_b);
        info!(
            tests_a = names_a.len(),
            tests_b = names_b.len(),
            common = common.len(),
            "matched test names"
        );

        let displaced_a = side_a.has_entry_point(impl_a) || side_a.has_entry_point(tests_a);
        let displaced_b = side_b.has_entry_point(impl_b) || side_b.has_entry_point(tests_b);
        if displaced_a || displaced_b {
            warn!(displaced_a, displaced_b, "sources define their own entry point");
        }

        let records = common
            .iter()
            .map(|test| {
                let mut a = execute_unit(
                    side_a,
                    &side_a.build_unit(impl_a, tests_a, test),
                    input,
                    &self.config,
                );
                let mut b = execute_unit(
                    side_b,
                    &side_b.build_unit(impl_b, tests_b, test),
                    input,
                    &self.config,
                );
                if displaced_a {
                    note_displaced_entry_point(&mut a);
                }
                if displaced_b {
                    note_displaced_entry_point(&mut b);
                }
                let record = ComparisonRecord::judge(test, &a, &b);
                debug!(
                    test = %test,
                    ok_a = record.ok_a,
                    ok_b = record.ok_b,
                    passed = record.passed,
                    "judged test"
                );
                record
            })
            .collect();

        let summary = ComparisonSummary::from_records(records);
        info!(
            total = summary.total,
            passed = summary.passed,
            matched = summary.matched,
            "comparison finished"
        );
        summary
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell_config() -> HarnessConfig {
        HarnessConfig {
            python: vec!["sh".to_string()],
            timeout_secs: 1,
            ..HarnessConfig::default()
        }
    }

    #[test]
    fn interpreted_unit_receives_stdin_in_private_dir() {
        let result = execute_unit(
            Language::Python,
            "read a b; echo $((a + b)); ls",
            "2 3\n",
            &shell_config(),
        );
        assert!(result.success, "{result:?}");
        assert_eq!(result.return_code, Some(0));
        assert_eq!(result.stdout, "5\nunit.py\n");
        assert!(result.log.contains("run: sh unit.py"));
    }

    #[test]
    fn nonzero_exit_is_failure_with_code() {
        let result = execute_unit(Language::Python, "echo bad >&2; exit 4", "", &shell_config());
        assert!(!result.success);
        assert!(!result.timed_out);
        assert_eq!(result.return_code, Some(4));
        assert_eq!(result.stderr, "bad\n");
    }

    #[test]
    fn timeout_is_distinct_and_keeps_partial_output() {
        let result = execute_unit(
            Language::Python,
            "echo started; sleep 30",
            "",
            &shell_config(),
        );
        assert!(!result.success);
        assert!(result.timed_out);
        assert_eq!(result.return_code, None);
        assert_eq!(result.stdout, "started\n");
        assert!(result.stderr.starts_with("TimeoutExpired"));
    }

    #[test]
    fn background_process_does_not_outlive_the_unit() {
        let started = std::time::Instant::now();
        let result = execute_unit(
            Language::Python,
            "sleep 8 & echo done",
            "",
            &shell_config(),
        );
        assert!(
            started.elapsed() < std::time::Duration::from_secs(5),
            "unit blocked for {:?}",
            started.elapsed()
        );
        assert!(result.success);
        assert_eq!(result.stdout, "done\n");
    }

    #[test]
    fn missing_interpreter_is_reported_not_raised() {
        let config = HarnessConfig {
            python: vec!["transpipe-missing-python".to_string()],
            ..HarnessConfig::default()
        };
        let result = execute_unit(Language::Python, "print(1)", "", &config);
        assert!(!result.success);
        assert!(result.stderr.starts_with("ToolchainMissing"), "{}", result.stderr);
        assert!(result.log.contains("aborted"));
    }

    #[test]
    fn missing_compiler_fails_every_unit_without_aborting() {
        let config = HarnessConfig {
            cpp_compiler: vec!["transpipe-missing-cxx".to_string()],
            ..shell_config()
        };
        let harness = DifferentialHarness::new(config);
        let summary = harness.compare(
            "",
            "echo 5",
            "void test_a() {}\nvoid test_b() {}\n",
            "def test_a():\ndef test_b():\n",
            "",
        );
        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed, 0);
        assert!(summary.records.iter().all(|r| !r.ok_a));
    }

    #[test]
    fn names_unique_to_one_side_are_ignored() {
        let harness = DifferentialHarness::new(shell_config());
        let summary = harness.compare("", "", "void test_only_a() {}\n", "def test_only_b():\n", "");
        assert_eq!(summary.total, 0);
        assert!(summary.records.is_empty());
        assert_eq!(summary.success_rate, 0.0);
    }
}
