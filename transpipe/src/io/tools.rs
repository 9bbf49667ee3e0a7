//! JSON tool contracts exposed to a collaborator runtime.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::core::language::Language;
use crate::io::config::HarnessConfig;
use crate::io::harness::DifferentialHarness;
use crate::io::validator::validate_code;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ToolName {
    /// `{source, language?}` -> `{valid, errors, message}`.
    #[value(name = "validate_code")]
    ValidateCode,
    /// `{impl_a, impl_b, tests_a, tests_b, input?}` -> aggregate comparison.
    #[value(name = "compare_implementations")]
    CompareImplementations,
}

#[derive(Debug, Deserialize)]
struct ValidateCodeArgs {
    source: String,
    /// Defaults to the translated side's language.
    #[serde(default)]
    language: Option<Language>,
}

#[derive(Debug, Deserialize)]
struct CompareArgs {
    impl_a: String,
    impl_b: String,
    tests_a: String,
    tests_b: String,
    #[serde(default)]
    input: String,
}

/// Dispatches tool calls against one harness configuration.
#[derive(Debug, Clone)]
pub struct Toolbox {
    harness: DifferentialHarness,
}

impl Toolbox {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            harness: DifferentialHarness::new(config),
        }
    }

    /// Run `tool` with JSON `args`. Only malformed arguments are errors.
    pub fn call(&self, tool: ToolName, args: Value) -> Result<Value> {
        info!(tool = ?tool, "tool call");
        match tool {
            ToolName::ValidateCode => {
                let args: ValidateCodeArgs =
                    serde_json::from_value(args).context("parse validate_code arguments")?;
                let config = self.harness.config();
                let language = args.language.unwrap_or(config.side_b);
                let report = validate_code(language, &args.source, config);
                serde_json::to_value(report).context("serialize validation report")
            }
            ToolName::CompareImplementations => {
                let args: CompareArgs = serde_json::from_value(args)
                    .context("parse compare_implementations arguments")?;
                let summary = self.harness.compare(
                    &args.impl_a,
                    &args.impl_b,
                    &args.tests_a,
                    &args.tests_b,
                    &args.input,
                );
                serde_json::to_value(summary).context("serialize comparison")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_arguments_are_errors() {
        let toolbox = Toolbox::new(HarnessConfig::default());
        let err = toolbox
            .call(ToolName::ValidateCode, json!({ "code": "x" }))
            .unwrap_err();
        assert!(format!("{err:#}").contains("validate_code arguments"));
    }

    #[test]
    fn compare_without_common_tests_reports_empty_match() {
        let toolbox = Toolbox::new(HarnessConfig::default());
        let result = toolbox
            .call(
                ToolName::CompareImplementations,
                json!({
                    "impl_a": "",
                    "impl_b": "",
                    "tests_a": "void test_a() {}",
                    "tests_b": "def test_b():\n    pass\n",
                }),
            )
            .expect("call");
        assert_eq!(result["total"], 0);
        assert_eq!(result["match"], true);
        assert_eq!(result["success_rate"], 0.0);
    }

    #[test]
    fn validate_uses_requested_language() {
        let config = HarnessConfig {
            cpp_compiler: vec!["transpipe-missing-cxx".to_string()],
            ..HarnessConfig::default()
        };
        let result = Toolbox::new(config)
            .call(
                ToolName::ValidateCode,
                json!({ "source": "int main() {}", "language": "cpp" }),
            )
            .expect("call");
        assert_eq!(result["valid"], false);
        assert!(result.get("line").is_none());
    }
}
