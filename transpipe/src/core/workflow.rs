//! Linear phase sequencer.
//!
//! The phase order is total and always ends at the terminal [`COMPLETE`] phase,
//! which has no assigned agent. Both the order and the phase-to-agent mapping
//! can be rebound between attempts.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::error::ConfigError;

/// Terminal phase reached once the last configured phase is passed.
pub const COMPLETE: &str = "COMPLETE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowController {
    phase_order: Vec<String>,
    speakers: BTreeMap<String, Vec<String>>,
    /// Index into `phase_order`; equal to its length at `COMPLETE`.
    position: usize,
    history: Vec<String>,
}

impl WorkflowController {
    pub fn new(
        phase_order: Vec<String>,
        speakers: BTreeMap<String, Vec<String>>,
    ) -> Result<Self, ConfigError> {
        validate_order(&phase_order)?;
        for phase in speakers.keys() {
            if !phase_order.contains(phase) {
                return Err(ConfigError::UnknownPhase(phase.clone()));
            }
        }
        Ok(Self {
            phase_order,
            speakers,
            position: 0,
            history: Vec::new(),
        })
    }

    pub fn phase_order(&self) -> &[String] {
        &self.phase_order
    }

    pub fn current_phase(&self) -> &str {
        self.phase_order
            .get(self.position)
            .map(String::as_str)
            .unwrap_or(COMPLETE)
    }

    pub fn is_complete(&self) -> bool {
        self.position >= self.phase_order.len()
    }

    /// Agents assigned to `phase`. More than one means a fan-out phase.
    pub fn get_speakers_for_phase(&self, phase: &str) -> &[String] {
        self.speakers.get(phase).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Move to the next phase, or to `COMPLETE` after the last one.
    ///
    /// Calling this at `COMPLETE` leaves the controller at `COMPLETE`.
    pub fn advance(&mut self) -> &str {
        if !self.is_complete() {
            self.history.push(self.phase_order[self.position].clone());
            self.position += 1;
        }
        debug!(phase = self.current_phase(), "advanced workflow");
        self.current_phase()
    }

    /// Return to the first phase for a new attempt.
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Phases left via [`advance`](Self::advance), oldest first.
    pub fn phase_history(&self) -> &[String] {
        &self.history
    }

    pub fn set_phase_speakers(
        &mut self,
        phase: &str,
        agents: Vec<String>,
    ) -> Result<(), ConfigError> {
        if !self.phase_order.iter().any(|p| p == phase) {
            return Err(ConfigError::UnknownPhase(phase.to_string()));
        }
        self.speakers.insert(phase.to_string(), agents);
        Ok(())
    }

    /// Replace the phase order and restart at its first phase.
    ///
    /// Speaker bindings for phases no longer in the order are dropped.
    pub fn set_phase_order(&mut self, phase_order: Vec<String>) -> Result<(), ConfigError> {
        validate_order(&phase_order)?;
        self.speakers.retain(|phase, _| phase_order.contains(phase));
        self.phase_order = phase_order;
        self.position = 0;
        Ok(())
    }
}

fn validate_order(phase_order: &[String]) -> Result<(), ConfigError> {
    if phase_order.is_empty() {
        return Err(ConfigError::EmptyPhaseOrder);
    }
    let mut seen = HashSet::new();
    for phase in phase_order {
        if phase == COMPLETE {
            return Err(ConfigError::ReservedPhase(phase.clone()));
        }
        if !seen.insert(phase.as_str()) {
            return Err(ConfigError::DuplicatePhase(phase.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn controller() -> WorkflowController {
        let mut speakers = BTreeMap::new();
        speakers.insert("TRANSLATION".to_string(), vec!["Code_Translator".to_string()]);
        speakers.insert(
            "TESTING".to_string(),
            vec!["Code_Tester".to_string(), "Critic".to_string()],
        );
        WorkflowController::new(order(&["REQUIREMENTS", "TRANSLATION", "TESTING"]), speakers)
            .expect("controller")
    }

    #[test]
    fn advance_reaches_last_phase_then_complete() {
        let mut ctl = controller();
        let n = ctl.phase_order().len();
        for _ in 0..n - 1 {
            ctl.advance();
        }
        assert_eq!(ctl.current_phase(), "TESTING");
        assert_eq!(ctl.advance(), COMPLETE);
        assert_eq!(ctl.advance(), COMPLETE);
        assert_eq!(ctl.advance(), COMPLETE);
        assert!(ctl.is_complete());
        assert_eq!(ctl.phase_history(), ["REQUIREMENTS", "TRANSLATION", "TESTING"]);
    }

    #[test]
    fn speakers_cover_zero_one_and_many() {
        let ctl = controller();
        assert!(ctl.get_speakers_for_phase("REQUIREMENTS").is_empty());
        assert_eq!(ctl.get_speakers_for_phase("TRANSLATION"), ["Code_Translator"]);
        assert_eq!(ctl.get_speakers_for_phase("TESTING").len(), 2);
        assert!(ctl.get_speakers_for_phase(COMPLETE).is_empty());
    }

    #[test]
    fn rebinding_unknown_phase_is_rejected() {
        let mut ctl = controller();
        let err = ctl
            .set_phase_speakers("DEPLOY", vec!["Ops".to_string()])
            .unwrap_err();
        assert_eq!(err, ConfigError::UnknownPhase("DEPLOY".to_string()));

        ctl.set_phase_speakers("REQUIREMENTS", vec!["Analyst".to_string()])
            .expect("rebind");
        assert_eq!(ctl.get_speakers_for_phase("REQUIREMENTS"), ["Analyst"]);
    }

    #[test]
    fn invalid_orders_are_rejected() {
        assert_eq!(
            WorkflowController::new(Vec::new(), BTreeMap::new()).unwrap_err(),
            ConfigError::EmptyPhaseOrder
        );
        assert!(matches!(
            WorkflowController::new(order(&["A", "A"]), BTreeMap::new()),
            Err(ConfigError::DuplicatePhase(_))
        ));
        assert!(matches!(
            WorkflowController::new(order(&["A", COMPLETE]), BTreeMap::new()),
            Err(ConfigError::ReservedPhase(_))
        ));
    }

    #[test]
    fn reset_and_reorder_restart_at_first_phase() {
        let mut ctl = controller();
        ctl.advance();
        ctl.reset();
        assert_eq!(ctl.current_phase(), "REQUIREMENTS");

        ctl.set_phase_order(order(&["TESTING", "TRANSLATION"]))
            .expect("reorder");
        assert_eq!(ctl.current_phase(), "TESTING");
        assert_eq!(ctl.get_speakers_for_phase("TRANSLATION"), ["Code_Translator"]);
    }
}
