//! Phase prompt rendering with minijinja.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use minijinja::{Environment, Value};
use tracing::debug;

/// Template used when a phase configures no prompt of its own.
const FALLBACK_TEMPLATE: &str = "Phase {{ phase }}: {{ agent }}, complete your part of the translation.\n\
{% for key, value in context | items %}\n## {{ key }}\n{{ value }}\n{% endfor %}\
{% if retry_feedback %}\nFeedback from the previous attempt: {{ retry_feedback }}\n{% endif %}";

/// Values available to a phase template.
#[derive(Debug, Clone)]
pub struct PromptInputs<'a> {
    pub phase: &'a str,
    pub agent: &'a str,
    /// 1-indexed attempt number.
    pub attempt: u32,
    /// Workspace values visible to the agent.
    pub context: &'a BTreeMap<String, String>,
    pub retry_feedback: Option<&'a str>,
}

pub trait PromptRenderer {
    fn render(&self, template: &str, inputs: &PromptInputs<'_>) -> Result<String>;
}

/// minijinja renderer; undefined variables render as empty text.
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
        }
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer for TemplateRenderer {
    fn render(&self, template: &str, inputs: &PromptInputs<'_>) -> Result<String> {
        let template = if template.trim().is_empty() {
            FALLBACK_TEMPLATE
        } else {
            template
        };

        // Context keys are top-level variables; the fixed names win on collision.
        let mut vars: BTreeMap<String, Value> = inputs
            .context
            .iter()
            .map(|(key, value)| (key.clone(), Value::from(value.as_str())))
            .collect();
        vars.insert("context".to_string(), Value::from_serialize(inputs.context));
        vars.insert("phase".to_string(), Value::from(inputs.phase));
        vars.insert("agent".to_string(), Value::from(inputs.agent));
        vars.insert("attempt".to_string(), Value::from(inputs.attempt));
        if let Some(feedback) = inputs.retry_feedback {
            vars.insert("retry_feedback".to_string(), Value::from(feedback));
        }

        let rendered = self
            .env
            .render_str(template, vars)
            .with_context(|| format!("render prompt for phase {}", inputs.phase))?;
        debug!(phase = inputs.phase, bytes = rendered.len(), "rendered prompt");
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> BTreeMap<String, String> {
        let mut ctx = BTreeMap::new();
        ctx.insert("original_code".to_string(), "int main() {}".to_string());
        ctx
    }

    #[test]
    fn renders_context_and_missing_keys_as_empty() {
        let ctx = context();
        let inputs = PromptInputs {
            phase: "TRANSLATION",
            agent: "Code_Translator",
            attempt: 2,
            context: &ctx,
            retry_feedback: Some("low critic score"),
        };
        let out = TemplateRenderer::new()
            .render(
                "[{{ attempt }}] {{ original_code }}|{{ requirements }}|{{ retry_feedback }}",
                &inputs,
            )
            .expect("render");
        assert_eq!(out, "[2] int main() {}||low critic score");
    }

    #[test]
    fn empty_template_lists_context() {
        let ctx = context();
        let inputs = PromptInputs {
            phase: "REQUIREMENTS",
            agent: "Requirement_Engineer",
            attempt: 1,
            context: &ctx,
            retry_feedback: None,
        };
        let out = TemplateRenderer::new().render("  ", &inputs).expect("render");
        assert!(out.starts_with("Phase REQUIREMENTS: Requirement_Engineer"));
        assert!(out.contains("## original_code\nint main() {}"));
        assert!(!out.contains("Feedback"));
    }

    #[test]
    fn syntax_error_is_reported() {
        let ctx = BTreeMap::new();
        let inputs = PromptInputs {
            phase: "REVIEW",
            agent: "Critic",
            attempt: 1,
            context: &ctx,
            retry_feedback: None,
        };
        let err = TemplateRenderer::new()
            .render("{% if %}", &inputs)
            .unwrap_err();
        assert!(format!("{err:#}").contains("render prompt for phase REVIEW"));
    }
}
