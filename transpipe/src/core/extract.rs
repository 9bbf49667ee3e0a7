//! Phase output extraction from collaborator transcripts.
//!
//! Only turns authored by the phase's assigned agent are considered, newest
//! first, and empty turns are skipped. No match yields an empty string.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::types::Turn;
use crate::error::ConfigError;

/// How a phase's output is taken from its transcript (configuration form).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Extraction {
    /// Last non-empty turn by the agent.
    #[default]
    LastTurn,
    /// Most recent match of `pattern` in the agent's turns. The first capture
    /// group is the output when present, otherwise the whole match.
    Capture { pattern: String },
    /// Last turn by the agent containing every phrase.
    RequiredPhrases { phrases: Vec<String> },
}

impl Extraction {
    pub fn compile(&self, phase: &str) -> Result<Extractor, ConfigError> {
        Ok(match self {
            Self::LastTurn => Extractor::LastTurn,
            Self::Capture { pattern } => {
                let re = Regex::new(pattern).map_err(|err| ConfigError::InvalidPattern {
                    phase: phase.to_string(),
                    reason: err.to_string(),
                })?;
                Extractor::Capture(re)
            }
            Self::RequiredPhrases { phrases } => Extractor::RequiredPhrases(phrases.clone()),
        })
    }
}

/// Compiled, ready-to-apply form of [`Extraction`].
#[derive(Debug, Clone)]
pub enum Extractor {
    LastTurn,
    Capture(Regex),
    RequiredPhrases(Vec<String>),
}

impl Extractor {
    pub fn extract(&self, transcript: &[Turn], agent: &str) -> String {
        let mut turns = transcript
            .iter()
            .rev()
            .filter(|turn| turn.speaker == agent && !turn.content.trim().is_empty());

        let found = match self {
            Self::LastTurn => turns.next().map(|turn| turn.content.clone()),
            Self::Capture(re) => turns.find_map(|turn| last_capture(re, &turn.content)),
            Self::RequiredPhrases(phrases) => turns
                .find(|turn| phrases.iter().all(|p| turn.content.contains(p.as_str())))
                .map(|turn| turn.content.clone()),
        };
        found.unwrap_or_default()
    }
}

fn last_capture(re: &Regex, content: &str) -> Option<String> {
    re.captures_iter(content).last().map(|caps| {
        caps.get(1)
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    })
}
