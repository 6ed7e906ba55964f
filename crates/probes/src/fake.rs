// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake probe executor for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::executor::{ProbeExecutor, ProbeOutcome};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use vigil_core::channel::{ChannelDefinition, ChannelId};

/// Scripted probe executor. Per-channel outcomes are served from a queue
/// first, then from a sticky outcome, then from an always-up fallback.
#[derive(Clone, Default)]
pub struct FakeProbe {
    queued: Arc<Mutex<HashMap<ChannelId, VecDeque<ProbeOutcome>>>>,
    sticky: Arc<Mutex<HashMap<ChannelId, ProbeOutcome>>>,
    calls: Arc<Mutex<Vec<ChannelId>>>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a one-shot outcome for a channel
    pub fn queue(&self, channel: impl Into<ChannelId>, outcome: ProbeOutcome) {
        self.queued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(channel.into())
            .or_default()
            .push_back(outcome);
    }

    /// Set the outcome a channel keeps returning once its queue is drained
    pub fn set(&self, channel: impl Into<ChannelId>, outcome: ProbeOutcome) {
        self.sticky
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(channel.into(), outcome);
    }

    /// All probe invocations in order
    pub fn calls(&self) -> Vec<ChannelId> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of probes executed for one channel
    pub fn call_count(&self, channel: &ChannelId) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|c| *c == channel)
            .count()
    }
}

#[async_trait]
impl ProbeExecutor for FakeProbe {
    async fn execute(&self, definition: &ChannelDefinition) -> ProbeOutcome {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(definition.id.clone());

        if let Some(outcome) = self
            .queued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(&definition.id)
            .and_then(|q| q.pop_front())
        {
            return outcome;
        }

        self.sticky
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&definition.id)
            .cloned()
            .unwrap_or_else(|| ProbeOutcome::up(1))
    }
}
