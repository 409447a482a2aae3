use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Lifecycle of a generation request that is waiting for an aspect ratio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeferredState {
    Idle,
    AwaitingRatio { prompt: String },
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingGeneration {
    pub message_id: String,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// The id was awaiting a ratio; carries the stored prompt.
    Tracked(String),
    /// Unknown id. The caller's prompt is authoritative.
    Untracked,
    AlreadyResolved,
}

/// Deferred generations of one session, keyed by message id.
#[derive(Debug, Clone, Default)]
pub struct DeferredGenerations {
    entries: BTreeMap<String, DeferredState>,
}

impl DeferredGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, message_id: &str) -> DeferredState {
        self.entries
            .get(message_id)
            .cloned()
            .unwrap_or(DeferredState::Idle)
    }

    pub fn defer(&mut self, message_id: &str, prompt: &str) -> PendingGeneration {
        self.entries.insert(
            message_id.to_string(),
            DeferredState::AwaitingRatio {
                prompt: prompt.to_string(),
            },
        );
        PendingGeneration {
            message_id: message_id.to_string(),
            prompt: prompt.to_string(),
        }
    }

    pub fn begin_resume(&self, message_id: &str) -> ResumeOutcome {
        match self.entries.get(message_id) {
            Some(DeferredState::AwaitingRatio { prompt }) => ResumeOutcome::Tracked(prompt.clone()),
            Some(DeferredState::Resolved) => ResumeOutcome::AlreadyResolved,
            Some(DeferredState::Idle) | None => ResumeOutcome::Untracked,
        }
    }

    /// Marks the id resolved. Applies to success and failure alike.
    pub fn resolve(&mut self, message_id: &str) {
        self.entries
            .insert(message_id.to_string(), DeferredState::Resolved);
    }

    /// Drops an awaiting entry back to idle. Returns whether one was pending.
    pub fn abandon(&mut self, message_id: &str) -> bool {
        match self.entries.get(message_id) {
            Some(DeferredState::AwaitingRatio { .. }) => {
                self.entries.remove(message_id);
                true
            }
            _ => false,
        }
    }

    pub fn pending(&self) -> Vec<PendingGeneration> {
        self.entries
            .iter()
            .filter_map(|(message_id, state)| match state {
                DeferredState::AwaitingRatio { prompt } => Some(PendingGeneration {
                    message_id: message_id.clone(),
                    prompt: prompt.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}
