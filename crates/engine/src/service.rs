// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The probing service loop
//!
//! One task owns the scheduler and the channel definitions. Timer fires,
//! commands, and run completions all arrive through the same select loop,
//! so scheduling decisions never race. Each probe runs in its own task;
//! its completion message carries the interval that re-arms the timer.

use crate::runner::{ChannelRunner, RunOutcome};
use crate::scheduler::ProbeScheduler;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vigil_core::backoff::compute_interval;
use vigil_core::channel::{ChannelDefinition, ChannelId};
use vigil_core::clock::Clock;
use vigil_core::event::MonitorEvent;
use vigil_core::events::EventBus;

/// Poll cadence while no timers are armed
const IDLE_WAIT: Duration = Duration::from_millis(500);
/// Jitter applied to every re-arm, as a fraction of the interval
const JITTER_FRACTION: f64 = 0.1;

/// Which channels an active watch session pins to the fast cadence
#[derive(Clone, Debug)]
pub enum WatchScope {
    All,
    Channels(HashSet<ChannelId>),
}

impl WatchScope {
    pub fn covers(&self, channel: &ChannelId) -> bool {
        match self {
            WatchScope::All => true,
            WatchScope::Channels(set) => set.contains(channel),
        }
    }
}

#[derive(Debug)]
enum Command {
    Pause(ChannelId),
    Resume(ChannelId),
    RunNow(ChannelId),
    Refresh(Vec<ChannelDefinition>),
    SetWatch(Option<WatchScope>),
    Shutdown,
}

/// Cheap cloneable handle for steering a running service
#[derive(Clone)]
pub struct ServiceHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl ServiceHandle {
    /// Suppress future probes for a channel. An in-flight run finishes
    /// normally; only re-arming is stopped.
    pub fn pause(&self, channel: ChannelId) {
        let _ = self.tx.send(Command::Pause(channel));
    }

    pub fn resume(&self, channel: ChannelId) {
        let _ = self.tx.send(Command::Resume(channel));
    }

    /// Probe a channel immediately, outside its timer
    pub fn run_now(&self, channel: ChannelId) {
        let _ = self.tx.send(Command::RunNow(channel));
    }

    /// Swap in a new channel set: added channels start probing, removed
    /// ones stop, survivors keep their timers.
    pub fn refresh(&self, definitions: Vec<ChannelDefinition>) {
        let _ = self.tx.send(Command::Refresh(definitions));
    }

    /// Pin covered channels to the watch cadence, or clear with None
    pub fn set_watch(&self, scope: Option<WatchScope>) {
        let _ = self.tx.send(Command::SetWatch(scope));
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }
}

struct Finished {
    channel: ChannelId,
    /// Interval decided when the run was fired
    next_interval: Duration,
    outcome: RunOutcome,
}

/// Owns the timers and definitions for all channels and drives their probes
pub struct ProbeService<C: Clock> {
    runner: ChannelRunner<C>,
    scheduler: ProbeScheduler,
    definitions: HashMap<ChannelId, ChannelDefinition>,
    watch: Option<WatchScope>,
    bus: EventBus,
    commands: mpsc::UnboundedReceiver<Command>,
    finished_tx: mpsc::UnboundedSender<Finished>,
    finished_rx: mpsc::UnboundedReceiver<Finished>,
}

impl<C: Clock> ProbeService<C> {
    /// Spawn the service with an initial channel set. Every channel gets
    /// probed right away; steady-state cadence takes over from there.
    pub fn start(
        runner: ChannelRunner<C>,
        definitions: Vec<ChannelDefinition>,
        bus: EventBus,
    ) -> (ServiceHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();

        let mut service = Self {
            runner,
            scheduler: ProbeScheduler::new(),
            definitions: HashMap::new(),
            watch: None,
            bus,
            commands: command_rx,
            finished_tx,
            finished_rx,
        };

        let now = tokio_now();
        for definition in definitions {
            service.add_channel(definition, now);
        }

        let join = tokio::spawn(service.run());
        (ServiceHandle { tx: command_tx }, join)
    }

    async fn run(mut self) {
        loop {
            let wake_at = self
                .scheduler
                .next_fire_time()
                .map(tokio::time::Instant::from_std)
                .unwrap_or_else(|| tokio::time::Instant::now() + IDLE_WAIT);

            tokio::select! {
                _ = tokio::time::sleep_until(wake_at) => {
                    for channel in self.scheduler.poll(tokio_now()) {
                        self.fire(channel);
                    }
                }
                Some(finished) = self.finished_rx.recv() => {
                    self.on_finished(finished);
                }
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
            }
        }
        tracing::debug!("probe service loop stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Pause(channel) => {
                if self.definitions.contains_key(&channel) && !self.scheduler.is_paused(&channel)
                {
                    self.scheduler.pause(&channel);
                    self.bus.publish(MonitorEvent::ChannelPaused {
                        channel: channel.clone(),
                    });
                    tracing::info!(channel = %channel, "channel paused");
                }
            }
            Command::Resume(channel) => {
                if self.scheduler.resume(&channel) {
                    self.bus.publish(MonitorEvent::ChannelResumed {
                        channel: channel.clone(),
                    });
                    tracing::info!(channel = %channel, "channel resumed");
                    self.arm(&channel);
                }
            }
            Command::RunNow(channel) => {
                if !self.definitions.contains_key(&channel) {
                    tracing::warn!(channel = %channel, "run-now for unknown channel ignored");
                    return;
                }
                if self.scheduler.is_in_flight(&channel) {
                    tracing::debug!(channel = %channel, "run-now ignored, probe already running");
                    return;
                }
                // Supersede the pending timer with an immediate fire. A
                // paused channel keeps its pause and will not re-arm.
                if !self.scheduler.is_paused(&channel) {
                    self.scheduler.cancel(&channel);
                }
                self.fire(channel);
            }
            Command::Refresh(definitions) => self.refresh(definitions),
            Command::SetWatch(scope) => {
                self.watch = scope;
                match &self.watch {
                    Some(_) => tracing::info!("watch session active"),
                    None => tracing::info!("watch session cleared"),
                }
                // Re-pin idle timers to the new cadence right away;
                // in-flight channels pick it up when they complete.
                let channels: Vec<ChannelId> = self.definitions.keys().cloned().collect();
                for channel in channels {
                    if self.scheduler.is_paused(&channel) || self.scheduler.is_in_flight(&channel)
                    {
                        continue;
                    }
                    self.arm(&channel);
                }
            }
            Command::Shutdown => {}
        }
    }

    /// Apply a new channel set without disturbing unchanged channels
    fn refresh(&mut self, definitions: Vec<ChannelDefinition>) {
        let incoming: HashMap<ChannelId, ChannelDefinition> = definitions
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();

        let removed: Vec<ChannelId> = self
            .definitions
            .keys()
            .filter(|id| !incoming.contains_key(*id))
            .cloned()
            .collect();
        for id in removed {
            tracing::info!(channel = %id, "channel removed");
            self.scheduler.cancel(&id);
            self.runner.forget(&id);
            self.definitions.remove(&id);
        }

        let now = tokio_now();
        for (id, definition) in incoming {
            if self.definitions.contains_key(&id) {
                // Updated settings apply from the next fire; the timer
                // keeps running.
                self.definitions.insert(id, definition);
            } else {
                tracing::info!(channel = %id, "channel added");
                self.add_channel(definition, now);
            }
        }
    }

    fn add_channel(&mut self, definition: ChannelDefinition, fire_at: Instant) {
        self.runner.prepare(&definition);
        self.scheduler.schedule(definition.id.clone(), fire_at);
        self.definitions.insert(definition.id.clone(), definition);
    }

    /// Kick off one probe run. The interval for the next arm is decided
    /// now, from the state as it is at fire time.
    fn fire(&mut self, channel: ChannelId) {
        let Some(definition) = self.definitions.get(&channel) else {
            return;
        };
        let watch_active = self
            .watch
            .as_ref()
            .map(|scope| scope.covers(&channel))
            .unwrap_or(false);
        let decision = compute_interval(&self.runner.backoff_context(definition, watch_active));
        tracing::debug!(
            channel = %channel,
            strategy = %decision.strategy,
            interval = ?decision.interval,
            reason = %decision.reason,
            "probing"
        );

        self.scheduler.mark_in_flight(&channel);
        let runner = self.runner.clone();
        let definition = definition.clone();
        let finished_tx = self.finished_tx.clone();
        tokio::spawn(async move {
            let outcome = runner.run(&definition).await;
            let _ = finished_tx.send(Finished {
                channel: definition.id,
                next_interval: decision.interval,
                outcome,
            });
        });
    }

    fn on_finished(&mut self, finished: Finished) {
        self.scheduler.clear_in_flight(&finished.channel);

        if let RunOutcome::Skipped { guard, outcome } = &finished.outcome {
            tracing::debug!(
                channel = %finished.channel,
                guard = %guard,
                outcome = %outcome,
                "tick skipped by guard"
            );
        }

        // A channel removed or paused mid-run does not re-arm
        if !self.definitions.contains_key(&finished.channel)
            || self.scheduler.is_paused(&finished.channel)
        {
            return;
        }

        // A watch that started mid-run beats the interval decided at fire
        // time; otherwise the fire-time decision stands.
        let watch_active = self
            .watch
            .as_ref()
            .map(|scope| scope.covers(&finished.channel))
            .unwrap_or(false);
        if watch_active {
            self.arm(&finished.channel);
        } else {
            self.arm_with(&finished.channel, finished.next_interval);
        }
    }

    /// Re-arm from a freshly computed decision (resume path)
    fn arm(&mut self, channel: &ChannelId) {
        let Some(definition) = self.definitions.get(channel) else {
            return;
        };
        let watch_active = self
            .watch
            .as_ref()
            .map(|scope| scope.covers(channel))
            .unwrap_or(false);
        let decision = compute_interval(&self.runner.backoff_context(definition, watch_active));
        self.arm_with(channel, decision.interval);
    }

    fn arm_with(&mut self, channel: &ChannelId, interval: Duration) {
        let jittered = apply_jitter(interval);
        self.scheduler
            .schedule(channel.clone(), tokio_now() + jittered);
    }
}

/// Current instant on the runtime clock, so paused-time tests line up
/// with timer arithmetic.
fn tokio_now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Spread fires by up to ±10% so channels sharing an interval drift apart
fn apply_jitter(interval: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(1.0 - JITTER_FRACTION..=1.0 + JITTER_FRACTION);
    interval.mul_f64(factor)
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
