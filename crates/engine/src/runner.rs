// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-channel run orchestration
//!
//! One run: evaluate guards, execute the probe, feed the sample through
//! the pure health transition, persist, publish events. The in-memory
//! state map stays authoritative; persistence failures are surfaced but
//! never stop scheduling.

use crate::error::EngineError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use vigil_core::backoff::BackoffContext;
use vigil_core::channel::{ChannelDefinition, ChannelId, ChannelState};
use vigil_core::clock::Clock;
use vigil_core::event::{Effect, MonitorEvent};
use vigil_core::events::EventBus;
use vigil_core::guard::{blocking_guard, GuardOutcome, GuardRegistry};
use vigil_probes::ProbeExecutor;
use vigil_storage::StateStore;

/// What happened on one scheduled tick
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// A guard blocked the probe; state was left untouched
    Skipped { guard: String, outcome: GuardOutcome },
    /// The probe ran and the sample was applied
    Completed { success: bool },
}

/// Runs probes for all channels and owns their health state
#[derive(Clone)]
pub struct ChannelRunner<C: Clock> {
    states: Arc<Mutex<HashMap<ChannelId, ChannelState>>>,
    /// Wall-clock time of each channel's last offline-to-online transition
    recoveries: Arc<Mutex<HashMap<ChannelId, u64>>>,
    guards: GuardRegistry,
    probe: Arc<dyn ProbeExecutor>,
    store: StateStore,
    bus: EventBus,
    clock: C,
}

impl<C: Clock> ChannelRunner<C> {
    pub fn new(
        guards: GuardRegistry,
        probe: Arc<dyn ProbeExecutor>,
        store: StateStore,
        bus: EventBus,
        clock: C,
    ) -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            recoveries: Arc::new(Mutex::new(HashMap::new())),
            guards,
            probe,
            store,
            bus,
            clock,
        }
    }

    /// Load the persisted state for a channel, or start fresh. A corrupt
    /// or unreadable record is replaced rather than fatal.
    pub fn prepare(&self, definition: &ChannelDefinition) {
        let state = match self.store.channel_state(&definition.id) {
            Ok(Some(state)) => state,
            Ok(None) => ChannelState::new(definition.id.clone()),
            Err(err) => {
                tracing::warn!(
                    channel = %definition.id,
                    error = %err,
                    "could not load persisted state, starting fresh"
                );
                ChannelState::new(definition.id.clone())
            }
        };
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(definition.id.clone(), state);
    }

    /// Drop a removed channel from the in-memory map
    pub fn forget(&self, id: &ChannelId) {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
        self.recoveries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
    }

    pub fn state(&self, id: &ChannelId) -> Option<ChannelState> {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    /// Build the backoff inputs from the channel's current health
    pub fn backoff_context(
        &self,
        definition: &ChannelDefinition,
        watch_active: bool,
    ) -> BackoffContext {
        let state = self
            .state(&definition.id)
            .unwrap_or_else(|| ChannelState::new(definition.id.clone()));
        let recovered_at_ms = self
            .recoveries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&definition.id)
            .copied();

        BackoffContext {
            status: state.status,
            consecutive_failures: state.consecutive_failures,
            base_interval: definition.base_interval,
            priority: definition.priority,
            watch_active,
            recovered_at_ms,
            now_ms: self.clock.epoch_ms(),
        }
    }

    /// Execute one tick for a channel
    pub async fn run(&self, definition: &ChannelDefinition) -> RunOutcome {
        // Guards first: any failing or unknown guard skips the tick
        // without recording anything.
        if !definition.guards.is_empty() {
            let outcomes = self.guards.evaluate(&definition.guards).await;
            if let Some((guard, outcome)) = blocking_guard(&outcomes) {
                tracing::debug!(
                    channel = %definition.id,
                    guard,
                    %outcome,
                    "guard blocked probe, skipping tick"
                );
                return RunOutcome::Skipped {
                    guard: guard.to_string(),
                    outcome,
                };
            }
        }

        let probe_outcome = self.probe.execute(definition).await;
        let sample = probe_outcome.into_sample(self.clock.epoch_ms());
        let success = sample.success;

        let effects = {
            let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
            let current = states
                .entry(definition.id.clone())
                .or_insert_with(|| ChannelState::new(definition.id.clone()));
            let (next, effects) = current.observe(&sample, definition.failure_threshold);
            *current = next;
            effects
        };

        self.bus.publish(MonitorEvent::SampleRecorded {
            channel: definition.id.clone(),
            sample: sample.clone(),
        });

        // Persist sample and state; the in-memory copy stays authoritative
        // on failure.
        if let Err(err) = self.persist(definition) {
            self.surface_persistence_failure(&definition.id, &err);
        }
        if let Err(err) = self.store.append_sample(&definition.id, &sample) {
            self.surface_persistence_failure(&definition.id, &EngineError::Storage(err));
        }

        for effect in effects {
            self.apply_effect(&definition.id, effect);
        }

        RunOutcome::Completed { success }
    }

    fn persist(&self, definition: &ChannelDefinition) -> Result<(), EngineError> {
        if let Some(state) = self.state(&definition.id) {
            self.store.set_channel_state(&state)?;
        }
        Ok(())
    }

    fn apply_effect(&self, channel: &ChannelId, effect: Effect) {
        match effect {
            Effect::Emit(event) => {
                if let MonitorEvent::OutageEnded { channel, .. } = &event {
                    self.recoveries
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(channel.clone(), self.clock.epoch_ms());
                }
                self.bus.publish(event);
            }
            Effect::OpenOutage(outage) => {
                if let Err(err) = self.store.open_outage(&outage) {
                    self.surface_persistence_failure(channel, &EngineError::Storage(err));
                }
            }
            Effect::CloseOutage { channel: id, end_ms } => {
                match self.store.close_outage(&id, end_ms) {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::warn!(channel = %id, "no open outage to close");
                    }
                    Err(err) => {
                        self.surface_persistence_failure(&id, &EngineError::Storage(err));
                    }
                }
            }
        }
    }

    fn surface_persistence_failure(&self, channel: &ChannelId, err: &EngineError) {
        tracing::error!(channel = %channel, error = %err, "persistence failed");
        self.bus.publish(MonitorEvent::PersistenceFailed {
            channel: channel.clone(),
            detail: err.to_string(),
        });
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
