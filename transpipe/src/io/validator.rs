//! Syntax-only validation with the harness toolchains.
//!
//! Nothing is executed: the interpreted side is parsed, the compiled side is
//! run through the compiler with `-fsyntax-only`.

use std::fs;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::core::language::Language;
use crate::core::types::ValidationReport;
use crate::io::config::HarnessConfig;
use crate::io::process::{command_from_argv, is_program_missing, run_command_with_timeout};

/// Parses stdin and prints the first syntax error as JSON.
const PYTHON_PARSE_CHECK: &str = r#"import ast, json, sys
try:
    ast.parse(sys.stdin.read())
except SyntaxError as err:
    print(json.dumps({"msg": err.msg, "lineno": err.lineno}))
    sys.exit(1)
"#;

static CPP_ERROR_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[^:\n]*:(\d+):(?:\d+:)?\s*(?:fatal )?error")
        .expect("compiler error pattern is valid")
});

#[derive(Debug, Deserialize)]
struct SyntaxIssue {
    msg: String,
    lineno: Option<u32>,
}

/// Check `source` for syntax errors without running it.
#[instrument(skip_all, fields(language = %language))]
pub fn validate_code(language: Language, source: &str, config: &HarnessConfig) -> ValidationReport {
    let checked = match language {
        Language::Python => check_python(source, config),
        Language::Cpp => check_cpp(source, config),
    };
    match checked {
        Ok(report) => {
            debug!(valid = report.valid, line = ?report.line, "validation finished");
            report
        }
        Err(err) if is_program_missing(&err) => {
            warn!(err = %err, "toolchain missing");
            ValidationReport::invalid(
                format!("ToolchainMissing: {err:#}"),
                format!("{language} toolchain is not installed"),
                None,
            )
        }
        Err(err) => {
            warn!(err = %err, "validation did not run");
            ValidationReport::invalid(format!("{err:#}"), "validation could not run", None)
        }
    }
}

fn check_python(source: &str, config: &HarnessConfig) -> Result<ValidationReport> {
    let cmd = command_from_argv(&config.python, &["-c", PYTHON_PARSE_CHECK])
        .context("python command")?;
    let output = run_command_with_timeout(
        cmd,
        Some(source.as_bytes()),
        config.timeout(),
        config.output_limit_bytes,
    )
    .context("run python parse check")?;

    if output.timed_out {
        return Ok(timeout_report(config));
    }
    if output.success() {
        return Ok(ValidationReport::valid("Python code is syntactically valid"));
    }

    let stdout = output.stdout_lossy();
    Ok(match serde_json::from_str::<SyntaxIssue>(stdout.trim()) {
        Ok(issue) => {
            let error = match issue.lineno {
                Some(line) => format!("SyntaxError: {} at line {line}", issue.msg),
                None => format!("SyntaxError: {}", issue.msg),
            };
            ValidationReport::invalid(
                error,
                format!("Python syntax error: {}", issue.msg),
                issue.lineno,
            )
        }
        Err(_) => ValidationReport::invalid(
            output.stderr_lossy().trim().to_string(),
            "Python parse check failed",
            None,
        ),
    })
}

fn check_cpp(source: &str, config: &HarnessConfig) -> Result<ValidationReport> {
    let dir = tempfile::Builder::new()
        .prefix("transpipe-check-")
        .tempdir()
        .context("create check directory")?;
    let file = Language::Cpp.source_file();
    let path = dir.path().join(file);
    fs::write(&path, source).with_context(|| format!("write {}", path.display()))?;

    let mut cmd = command_from_argv(&config.cpp_compiler, &["-fsyntax-only", file])
        .context("compiler command")?;
    cmd.current_dir(dir.path());
    let output = run_command_with_timeout(cmd, None, config.timeout(), config.output_limit_bytes)
        .context("run compiler syntax check")?;

    if output.timed_out {
        return Ok(timeout_report(config));
    }
    if output.success() {
        return Ok(ValidationReport::valid("C++ code compiles cleanly"));
    }

    let stderr = output.stderr_lossy();
    let line = CPP_ERROR_LINE_RE
        .captures(&stderr)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok());
    Ok(ValidationReport::invalid(
        stderr.trim().to_string(),
        "C++ compilation check failed",
        line,
    ))
}

fn timeout_report(config: &HarnessConfig) -> ValidationReport {
    ValidationReport::invalid(
        format!("TimeoutExpired: check exceeded {}s", config.timeout_secs),
        "validation timed out",
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiler_line_is_read_from_first_error() {
        let stderr = "unit.cpp: In function 'int main()':\nunit.cpp:4:5: error: expected ';' before '}' token\n";
        let line = CPP_ERROR_LINE_RE
            .captures(stderr)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());
        assert_eq!(line.as_deref(), Some("4"));
    }

    #[test]
    fn missing_toolchain_is_invalid_not_raised() {
        let config = HarnessConfig {
            python: vec!["transpipe-missing-python".to_string()],
            cpp_compiler: vec!["transpipe-missing-cxx".to_string()],
            ..HarnessConfig::default()
        };
        for language in [Language::Python, Language::Cpp] {
            let report = validate_code(language, "x = 1\n", &config);
            assert!(!report.valid);
            assert!(report.errors[0].starts_with("ToolchainMissing"));
            assert!(report.message.contains("not installed"));
        }
    }
}
