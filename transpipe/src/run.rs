//! Orchestration for a full pipeline run.
//!
//! Each attempt drives the collaborator through every phase in order, writing
//! phase outputs to a run-scoped workspace. After the last phase the retry
//! conditions are evaluated; when any fires and budget remains the whole phase
//! sequence restarts with the combined feedback in the workspace.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::budget::RetryBudget;
use crate::core::extract::Extractor;
use crate::core::retry::{RetryCondition, evaluate};
use crate::core::types::{Transcript, Turn};
use crate::core::workflow::WorkflowController;
use crate::core::workspace::{AccessPolicy, SYSTEM_WRITER, SharedWorkspace, WriteRecord};
use crate::error::ConfigError;
use crate::io::collaborator::{Collaborator, InvokeRequest};
use crate::io::config::{ORIGINAL_CODE_KEY, PROGRAM_KEY, PhaseConfig, PipelineConfig};
use crate::io::prompt::{PromptInputs, PromptRenderer};

/// Result of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// Every turn of every phase across all attempts, in order.
    pub transcript: Transcript,
    /// Final workspace values.
    pub outputs: BTreeMap<String, String>,
    /// Attempts performed (1 + retries taken).
    pub attempts: u32,
    /// A retry condition still fired when the budget ran out.
    pub retries_exhausted: bool,
    /// Workspace audit trail.
    pub writes: Vec<WriteRecord>,
}

impl RunOutcome {
    /// True when every key in `keys` holds a non-empty value.
    pub fn expected_outputs_present(&self, keys: &[&str]) -> bool {
        keys.iter().all(|key| {
            self.outputs
                .get(*key)
                .is_some_and(|value| !value.trim().is_empty())
        })
    }
}

/// Compiled form of one configured phase.
struct PhasePlan {
    config: PhaseConfig,
    extractor: Extractor,
}

pub struct Pipeline<'a, C: Collaborator, R: PromptRenderer> {
    config: PipelineConfig,
    phases: BTreeMap<String, PhasePlan>,
    conditions: Vec<RetryCondition>,
    collaborator: &'a C,
    renderer: &'a R,
}

impl<'a, C: Collaborator, R: PromptRenderer> Pipeline<'a, C, R> {
    /// Validate `config` and prepare its phases. Configuration errors surface here.
    pub fn new(
        config: PipelineConfig,
        collaborator: &'a C,
        renderer: &'a R,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        // Builds the controller once so duplicate and reserved names are rejected up front.
        build_controller(&config)?;

        let mut phases = BTreeMap::new();
        for phase in &config.phases {
            let extractor = phase.extraction.compile(&phase.name)?;
            phases.insert(
                phase.name.clone(),
                PhasePlan {
                    config: phase.clone(),
                    extractor,
                },
            );
        }
        let conditions = config.retry.conditions.clone();
        Ok(Self {
            config,
            phases,
            conditions,
            collaborator,
            renderer,
        })
    }

    /// Add a retry condition evaluated after the configured ones.
    pub fn with_condition(mut self, condition: RetryCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the phase sequence over `input`, restarting on retry triggers.
    ///
    /// Collaborator failures yield empty phase outputs. Only prompt rendering
    /// failures are returned as errors.
    #[instrument(skip_all, fields(program_key = program_key.unwrap_or("")))]
    pub fn run(&self, input: &str, program_key: Option<&str>) -> Result<RunOutcome> {
        let mut controller = build_controller(&self.config)?;
        let workspace_id = format!("run-{}", Utc::now().format("%Y%m%dT%H%M%S%.3fZ"));
        let mut workspace = SharedWorkspace::new(
            workspace_id,
            AccessPolicy::new(self.config.access.clone()),
        );
        workspace.write(ORIGINAL_CODE_KEY, input, SYSTEM_WRITER);
        if let Some(key) = program_key {
            workspace.write(PROGRAM_KEY, key, SYSTEM_WRITER);
        }

        let mut budget = RetryBudget::new(self.config.retry.max_retries);
        let mut transcript = Transcript::new();
        let mut retries_exhausted = false;

        loop {
            let attempt = budget.attempt();
            info!(attempt, workspace = %workspace.id(), "starting attempt");
            controller.reset();
            while !controller.is_complete() {
                let phase = controller.current_phase().to_string();
                match controller.get_speakers_for_phase(&phase).first() {
                    Some(agent) => {
                        let agent = agent.clone();
                        let turns = self.execute_phase(&phase, &agent, attempt, &mut workspace)?;
                        transcript.extend(turns);
                    }
                    None => warn!(phase = %phase, "phase has no speaker, skipping"),
                }
                controller.advance();
            }

            if !self.config.retry.enabled {
                break;
            }
            let decision = evaluate(&self.conditions, &workspace);
            if !decision.should_retry() {
                info!(attempt, "retry conditions satisfied");
                break;
            }
            if !budget.try_take() {
                warn!(
                    attempt,
                    feedback = %decision.feedback(),
                    "retry budget exhausted, accepting outputs"
                );
                retries_exhausted = true;
                break;
            }
            info!(attempt, feedback = %decision.feedback(), "retry triggered, restarting phases");
            workspace.write(
                &self.config.retry.feedback_key,
                decision.feedback(),
                SYSTEM_WRITER,
            );
        }

        Ok(RunOutcome {
            transcript,
            outputs: workspace.get_all_outputs(),
            attempts: budget.attempt(),
            retries_exhausted,
            writes: workspace.history().to_vec(),
        })
    }

    /// Render, invoke, extract, and store the output of one phase.
    #[instrument(skip_all, fields(phase = %phase, agent = %agent, attempt))]
    fn execute_phase(
        &self,
        phase: &str,
        agent: &str,
        attempt: u32,
        workspace: &mut SharedWorkspace,
    ) -> Result<Transcript> {
        let plan = self
            .phases
            .get(phase)
            .with_context(|| format!("no plan for phase {phase}"))?;
        let explicit = &plan.config.context_keys;
        let context = workspace
            .get_context_for_agent(agent, (!explicit.is_empty()).then_some(explicit.as_slice()));
        let feedback_key = self.config.retry.feedback_key.as_str();
        let prompt = self.renderer.render(
            &plan.config.prompt,
            &PromptInputs {
                phase,
                agent,
                attempt,
                context: &context,
                retry_feedback: workspace.read(feedback_key),
            },
        )?;

        let request = InvokeRequest {
            agent: agent.to_string(),
            prompt: prompt.clone(),
            max_turns: plan.config.max_turns,
        };
        let replies = match self.collaborator.invoke(&request) {
            Ok(turns) => turns,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "collaborator failed, recording empty output");
                Vec::new()
            }
        };

        // Only replies are extracted from, so a coordinator phase never yields its own prompt.
        let output = plan.extractor.extract(&replies, agent);
        let mut turns = Vec::with_capacity(replies.len() + 1);
        turns.push(Turn::new(self.config.coordinator.clone(), prompt));
        turns.extend(replies);

        if output.is_empty() {
            warn!(output_key = %plan.config.output_key, "no output extracted");
        }
        debug!(output_key = %plan.config.output_key, bytes = output.len(), "phase finished");
        workspace.write(&plan.config.output_key, output, agent);
        Ok(turns)
    }
}

fn build_controller(config: &PipelineConfig) -> Result<WorkflowController, ConfigError> {
    let order = config.phases.iter().map(|p| p.name.clone()).collect();
    let speakers = config
        .phases
        .iter()
        .map(|p| (p.name.clone(), p.agents.clone()))
        .collect();
    WorkflowController::new(order, speakers)
}
