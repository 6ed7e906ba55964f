// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease-based leader election
//!
//! Instances sharing one lease store elect the single prober. The holder
//! heartbeats at a third of the lease timeout, so one missed renewal never
//! costs the lease; followers poll at a quarter of the timeout and take
//! over once the heartbeat goes stale. Exclusivity is eventual, not
//! instantaneous: a freshly promoted leader may briefly overlap a crashed
//! one, which wastes a few probes but corrupts nothing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use vigil_core::clock::Clock;
use vigil_core::event::MonitorEvent;
use vigil_core::events::EventBus;
use vigil_core::lease::{CoordinationConfig, InstanceId, LeaseRecord, Role};
use vigil_storage::{LeaseError, LeaseStore};

use crate::service::ServiceHandle;

/// First wait after a coordination store error
const ERROR_BACKOFF_MIN: Duration = Duration::from_secs(1);
/// Ceiling for the doubling error backoff
const ERROR_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Whatever the instance runs while it is the leader; stopped on demotion
/// or shutdown.
#[async_trait]
pub trait LeaderSession: Send {
    async fn stop(self: Box<Self>);
}

/// Builds a fresh leader session each time this instance wins the lease
pub trait SessionFactory: Send + Sync {
    fn start_session(&self) -> Box<dyn LeaderSession>;
}

impl<F> SessionFactory for F
where
    F: Fn() -> Box<dyn LeaderSession> + Send + Sync,
{
    fn start_session(&self) -> Box<dyn LeaderSession> {
        self()
    }
}

/// Leader session wrapping a running probe service
pub struct SchedulerSession {
    handle: ServiceHandle,
    join: JoinHandle<()>,
}

impl SchedulerSession {
    pub fn new(handle: ServiceHandle, join: JoinHandle<()>) -> Self {
        Self { handle, join }
    }
}

#[async_trait]
impl LeaderSession for SchedulerSession {
    async fn stop(self: Box<Self>) {
        self.handle.shutdown();
        if let Err(err) = self.join.await {
            tracing::warn!(error = %err, "probe service task ended abnormally");
        }
    }
}

/// What one election round decided
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElectionOutcome {
    BecameLeader,
    Standby,
}

/// Runs the election loop for one instance
pub struct Coordinator<C: Clock> {
    instance: InstanceId,
    config: CoordinationConfig,
    store: Arc<dyn LeaseStore>,
    bus: EventBus,
    clock: C,
}

impl<C: Clock> Coordinator<C> {
    pub fn new(
        instance: InstanceId,
        config: CoordinationConfig,
        store: Arc<dyn LeaseStore>,
        bus: EventBus,
        clock: C,
    ) -> Self {
        Self {
            instance,
            config,
            store,
            bus,
            clock,
        }
    }

    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    /// One election round: claim an absent lease, take over a stale one,
    /// re-adopt our own, otherwise stand by.
    pub fn attempt_election(&self) -> Result<ElectionOutcome, LeaseError> {
        let now_ms = self.clock.epoch_ms();
        match self.store.read()? {
            None => {
                let record = LeaseRecord::new(self.instance.clone(), now_ms);
                if self.store.try_create(&record)? {
                    tracing::info!(instance = %self.instance, "lease acquired");
                    return Ok(ElectionOutcome::BecameLeader);
                }
                Ok(ElectionOutcome::Standby)
            }
            Some(current) if current.is_owned_by(&self.instance) => {
                // Left over from a previous run of this same instance
                if self.store.renew(&self.instance, now_ms)? {
                    tracing::info!(instance = %self.instance, "own lease re-adopted");
                    return Ok(ElectionOutcome::BecameLeader);
                }
                Ok(ElectionOutcome::Standby)
            }
            Some(current) if current.is_stale(now_ms, self.config.lease_timeout) => {
                let takeover = current.taken_over_by(self.instance.clone(), now_ms);
                if self.store.try_take_over(&current, &takeover)? {
                    tracing::info!(
                        instance = %self.instance,
                        previous = %current.owner,
                        "stale lease taken over"
                    );
                    return Ok(ElectionOutcome::BecameLeader);
                }
                // Someone else won the race to the stale lease
                Ok(ElectionOutcome::Standby)
            }
            Some(_) => Ok(ElectionOutcome::Standby),
        }
    }

    /// Drive the election until shutdown. Won elections start a session
    /// from the factory; demotions and shutdown stop it. Store errors
    /// demote to follower and retry with a doubling backoff.
    pub async fn run(self, factory: impl SessionFactory, mut shutdown: watch::Receiver<bool>) {
        let mut announced: Option<Role> = None;
        let mut error_backoff = ERROR_BACKOFF_MIN;

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.attempt_election() {
                Ok(ElectionOutcome::BecameLeader) => {
                    error_backoff = ERROR_BACKOFF_MIN;
                    self.announce(&mut announced, Role::Leader);
                    let demoted = self.lead(&factory, &mut shutdown).await;
                    if !demoted {
                        break;
                    }
                    self.announce(&mut announced, Role::Follower);
                }
                Ok(ElectionOutcome::Standby) => {
                    error_backoff = ERROR_BACKOFF_MIN;
                    self.announce(&mut announced, Role::Follower);
                    if wait_or_shutdown(self.config.follower_poll_interval(), &mut shutdown).await
                    {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        retry_in = ?error_backoff,
                        "coordination store unavailable, standing by"
                    );
                    self.announce(&mut announced, Role::Follower);
                    if wait_or_shutdown(error_backoff, &mut shutdown).await {
                        break;
                    }
                    error_backoff = (error_backoff * 2).min(ERROR_BACKOFF_MAX);
                }
            }
        }
        tracing::debug!(instance = %self.instance, "coordinator stopped");
    }

    /// Leadership phase: run the session and keep the lease warm. Returns
    /// true on demotion, false on shutdown.
    async fn lead(&self, factory: &impl SessionFactory, shutdown: &mut watch::Receiver<bool>) -> bool {
        let session = factory.start_session();
        let timeout_ms = self.config.lease_timeout.as_millis() as u64;
        let mut last_renewed_ms = self.clock.epoch_ms();

        loop {
            if wait_or_shutdown(self.config.heartbeat_interval(), shutdown).await {
                session.stop().await;
                if let Err(err) = self.store.release(&self.instance) {
                    tracing::warn!(error = %err, "lease release failed on shutdown");
                } else {
                    tracing::info!(instance = %self.instance, "lease released");
                }
                return false;
            }

            let now_ms = self.clock.epoch_ms();
            match self.store.renew(&self.instance, now_ms) {
                Ok(true) => last_renewed_ms = now_ms,
                Ok(false) => {
                    tracing::warn!(instance = %self.instance, "lease lost, demoting");
                    session.stop().await;
                    return true;
                }
                Err(err) => {
                    // A single failed renewal is survivable; give up only
                    // once the lease itself would have gone stale.
                    tracing::warn!(error = %err, "lease renewal failed");
                    if now_ms.saturating_sub(last_renewed_ms) > timeout_ms {
                        tracing::warn!(
                            instance = %self.instance,
                            "renewals failing past the lease timeout, demoting"
                        );
                        session.stop().await;
                        return true;
                    }
                }
            }
        }
    }

    fn announce(&self, announced: &mut Option<Role>, role: Role) {
        if *announced == Some(role) {
            return;
        }
        *announced = Some(role);
        tracing::info!(instance = %self.instance, %role, "coordination role changed");
        self.bus.publish(MonitorEvent::CoordinationChanged { role });
    }
}

/// Sleep for `duration` unless shutdown is signalled first. Returns true
/// when the coordinator should stop.
async fn wait_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
