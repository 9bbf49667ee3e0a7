//! Run-scoped, attributed key/value store shared by all phases.
//!
//! A fresh workspace is created for every run and passed explicitly through the
//! call chain. Keys are never removed; a write replaces the current value and
//! appends an audit record. The audit history is for tracing only and is never
//! used to roll values back.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Writer identity used for seed values and retry feedback.
pub const SYSTEM_WRITER: &str = "System";

/// Current value of a key together with its attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceEntry {
    pub value: String,
    pub writer: String,
    pub written_at: DateTime<Utc>,
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteRecord {
    /// Position in the write history (0-indexed).
    pub seq: usize,
    pub key: String,
    pub writer: String,
    pub written_at: DateTime<Utc>,
}

/// Which workspace keys each agent may see when a phase does not name its keys.
///
/// Agents with an allow-list see exactly those keys. Any other agent,
/// the coordinator included, sees every key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    allow: BTreeMap<String, Vec<String>>,
}

impl AccessPolicy {
    pub fn new(allow: BTreeMap<String, Vec<String>>) -> Self {
        Self { allow }
    }

    /// Allow-list of `agent`, if it has one.
    pub fn allowed_keys(&self, agent: &str) -> Option<&[String]> {
        self.allow.get(agent).map(Vec::as_slice)
    }
}

#[derive(Debug, Clone)]
pub struct SharedWorkspace {
    id: String,
    entries: BTreeMap<String, WorkspaceEntry>,
    history: Vec<WriteRecord>,
    policy: AccessPolicy,
}

impl SharedWorkspace {
    pub fn new(id: impl Into<String>, policy: AccessPolicy) -> Self {
        Self {
            id: id.into(),
            entries: BTreeMap::new(),
            history: Vec::new(),
            policy,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replace the value under `key` and record the write.
    pub fn write(&mut self, key: &str, value: impl Into<String>, writer: &str) {
        let written_at = Utc::now();
        let value = value.into();
        debug!(workspace = %self.id, key, writer, bytes = value.len(), "workspace write");
        self.entries.insert(
            key.to_string(),
            WorkspaceEntry {
                value,
                writer: writer.to_string(),
                written_at,
            },
        );
        self.history.push(WriteRecord {
            seq: self.history.len(),
            key: key.to_string(),
            writer: writer.to_string(),
            written_at,
        });
    }

    /// Most recent value written under `key`.
    pub fn read(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|entry| entry.value.as_str())
    }

    pub fn entry(&self, key: &str) -> Option<&WorkspaceEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn history(&self) -> &[WriteRecord] {
        &self.history
    }

    /// Resolve the context visible to `agent`.
    ///
    /// A non-empty `explicit_keys` wins over the access policy. Keys that were
    /// never written are omitted.
    pub fn get_context_for_agent(
        &self,
        agent: &str,
        explicit_keys: Option<&[String]>,
    ) -> BTreeMap<String, String> {
        if let Some(keys) = explicit_keys.filter(|keys| !keys.is_empty()) {
            return self.select(keys.iter().map(String::as_str));
        }
        match self.policy.allowed_keys(agent) {
            Some(keys) => self.select(keys.iter().map(String::as_str)),
            None => self.get_all_outputs(),
        }
    }

    /// Snapshot of every current value.
    pub fn get_all_outputs(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    fn select<'a>(&self, keys: impl Iterator<Item = &'a str>) -> BTreeMap<String, String> {
        keys.filter_map(|key| {
            self.entries
                .get(key)
                .map(|entry| (key.to_string(), entry.value.clone()))
        })
        .collect()
    }
}
