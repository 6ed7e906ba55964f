// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named preconditions gating probe execution
//!
//! Guards are registered independently of channels. A channel lists the
//! guard names that must pass before each probe; any failing or unknown
//! guard skips that tick without touching the channel's state. A guard
//! failure is not a probe failure and never counts toward the streak.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("guard evaluation failed: {0}")]
    Evaluation(String),
    #[error("guard evaluation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Result of evaluating one guard
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuardOutcome {
    Pass,
    Fail,
    /// Evaluation itself errored; skips the tick like Fail but is
    /// distinguishable in diagnostics
    Unknown,
}

impl GuardOutcome {
    /// True when this outcome blocks the probe from running
    pub fn blocks(&self) -> bool {
        !matches!(self, GuardOutcome::Pass)
    }
}

impl std::fmt::Display for GuardOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardOutcome::Pass => write!(f, "pass"),
            GuardOutcome::Fail => write!(f, "fail"),
            GuardOutcome::Unknown => write!(f, "unknown"),
        }
    }
}

/// A single precondition predicate. Implementations may do I/O and must
/// enforce their own timeouts.
#[async_trait]
pub trait Guard: Send + Sync {
    async fn check(&self) -> Result<bool, GuardError>;
}

/// Registry of named guards, shared by all channels
#[derive(Clone, Default)]
pub struct GuardRegistry {
    guards: HashMap<String, Arc<dyn Guard>>,
}

impl GuardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, guard: Arc<dyn Guard>) {
        self.guards.insert(name.into(), guard);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.guards.contains_key(name)
    }

    /// Evaluate the named guards. Each guard is evaluated on its own; an
    /// error in one never affects another. Unregistered names come back
    /// as Unknown.
    pub async fn evaluate(&self, names: &[String]) -> HashMap<String, GuardOutcome> {
        let mut outcomes = HashMap::with_capacity(names.len());
        for name in names {
            let outcome = match self.guards.get(name) {
                Some(guard) => match guard.check().await {
                    Ok(true) => GuardOutcome::Pass,
                    Ok(false) => GuardOutcome::Fail,
                    Err(err) => {
                        tracing::warn!(guard = %name, error = %err, "guard evaluation errored");
                        GuardOutcome::Unknown
                    }
                },
                None => {
                    tracing::warn!(guard = %name, "guard not registered");
                    GuardOutcome::Unknown
                }
            };
            outcomes.insert(name.clone(), outcome);
        }
        outcomes
    }
}

/// Find the first guard outcome that blocks the probe, if any
pub fn blocking_guard(outcomes: &HashMap<String, GuardOutcome>) -> Option<(&str, GuardOutcome)> {
    outcomes
        .iter()
        .find(|(_, outcome)| outcome.blocks())
        .map(|(name, outcome)| (name.as_str(), *outcome))
}
