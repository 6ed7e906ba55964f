// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Channel definitions and the per-channel health state machine
//!
//! A channel is one monitored target. Its health is a three-state machine
//! (unknown/online/offline) driven purely by the sequence of probe samples:
//! `threshold` consecutive failures confirm an outage, a single success
//! recovers immediately.

use crate::event::{Effect, MonitorEvent};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unique identifier for a monitored channel
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Scheduling priority of a channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    #[default]
    Normal,
}

/// The protocol-specific probe a channel runs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeKind {
    /// HTTP GET, up on any 2xx status
    Http { url: String },
    /// TCP connect, up when the connection is accepted
    Tcp { host: String, port: u16 },
    /// DNS resolution, up when the name resolves to at least one address
    Dns { hostname: String },
    /// External script, up on exit status 0
    Script { command: String },
}

/// One monitored target with its own schedule and state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelDefinition {
    pub id: ChannelId,
    #[serde(flatten)]
    pub probe: ProbeKind,
    /// Interval between probes while the channel is healthy
    #[serde(with = "humantime_serde", default = "default_interval")]
    pub base_interval: Duration,
    /// Per-attempt timeout enforced by the probe executor
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
    /// Consecutive failures required to confirm an outage
    #[serde(default = "default_threshold")]
    pub failure_threshold: u32,
    #[serde(default)]
    pub priority: Priority,
    /// Names of guards that must pass before each probe
    #[serde(default)]
    pub guards: Vec<String>,
}

fn default_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_threshold() -> u32 {
    3
}

/// One completed probe attempt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Wall-clock timestamp, milliseconds since the Unix epoch
    pub taken_at_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Sample {
    pub fn ok(taken_at_ms: u64, latency_ms: u64) -> Self {
        Self {
            taken_at_ms,
            success: true,
            latency_ms: Some(latency_ms),
            error: None,
            details: None,
        }
    }

    pub fn failed(taken_at_ms: u64, error: impl Into<String>) -> Self {
        Self {
            taken_at_ms,
            success: false,
            latency_ms: None,
            error: Some(error.into()),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Health status of a channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl std::fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelStatus::Unknown => write!(f, "unknown"),
            ChannelStatus::Online => write!(f, "online"),
            ChannelStatus::Offline => write!(f, "offline"),
        }
    }
}

/// A recorded interval during which a channel was confirmed offline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outage {
    pub channel_id: ChannelId,
    /// Timestamp of the first failure in the confirming streak
    pub first_failure_ms: u64,
    /// When the failure count crossed the threshold
    pub confirmed_at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<u64>,
    pub reason: String,
}

impl Outage {
    pub fn is_open(&self) -> bool {
        self.end_ms.is_none()
    }
}

/// Persisted health state of a channel, mutated only through `observe`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    pub id: ChannelId,
    pub status: ChannelStatus,
    pub consecutive_failures: u32,
    /// When `status` last changed
    pub last_change_ms: u64,
    /// Timestamp of the first failure in the current streak, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_failure_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sample: Option<Sample>,
}

impl ChannelState {
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            status: ChannelStatus::Unknown,
            consecutive_failures: 0,
            last_change_ms: 0,
            first_failure_ms: None,
            last_sample: None,
        }
    }

    /// Pure transition function: apply one sample and return the new state
    /// plus the effects the transition requests.
    ///
    /// Success resets the failure streak and recovers an offline channel
    /// immediately. A failure that brings the streak to `threshold`
    /// confirms an outage; below the threshold the status is untouched.
    pub fn observe(&self, sample: &Sample, threshold: u32) -> (ChannelState, Vec<Effect>) {
        let mut next = self.clone();
        next.last_sample = Some(sample.clone());

        if sample.success {
            next.consecutive_failures = 0;
            let streak_started = self.first_failure_ms;
            next.first_failure_ms = None;

            match self.status {
                ChannelStatus::Offline => {
                    next.status = ChannelStatus::Online;
                    next.last_change_ms = sample.taken_at_ms;
                    let outage_began = streak_started.unwrap_or(self.last_change_ms);
                    let effects = vec![
                        Effect::CloseOutage {
                            channel: self.id.clone(),
                            end_ms: sample.taken_at_ms,
                        },
                        Effect::Emit(MonitorEvent::StateChanged {
                            channel: self.id.clone(),
                            old: ChannelStatus::Offline,
                            new: ChannelStatus::Online,
                        }),
                        Effect::Emit(MonitorEvent::OutageEnded {
                            channel: self.id.clone(),
                            duration_ms: sample.taken_at_ms.saturating_sub(outage_began),
                        }),
                    ];
                    (next, effects)
                }
                ChannelStatus::Unknown => {
                    next.status = ChannelStatus::Online;
                    next.last_change_ms = sample.taken_at_ms;
                    let effects = vec![Effect::Emit(MonitorEvent::StateChanged {
                        channel: self.id.clone(),
                        old: ChannelStatus::Unknown,
                        new: ChannelStatus::Online,
                    })];
                    (next, effects)
                }
                ChannelStatus::Online => (next, Vec::new()),
            }
        } else {
            next.consecutive_failures = self.consecutive_failures.saturating_add(1);
            let first_failure = self.first_failure_ms.unwrap_or(sample.taken_at_ms);
            next.first_failure_ms = Some(first_failure);

            let confirmed = self.status != ChannelStatus::Offline
                && next.consecutive_failures >= threshold.max(1);
            if confirmed {
                let old = self.status;
                next.status = ChannelStatus::Offline;
                next.last_change_ms = sample.taken_at_ms;
                let reason = sample
                    .error
                    .clone()
                    .unwrap_or_else(|| "probe failed".to_string());
                let effects = vec![
                    Effect::OpenOutage(Outage {
                        channel_id: self.id.clone(),
                        first_failure_ms: first_failure,
                        confirmed_at_ms: sample.taken_at_ms,
                        end_ms: None,
                        reason: reason.clone(),
                    }),
                    Effect::Emit(MonitorEvent::StateChanged {
                        channel: self.id.clone(),
                        old,
                        new: ChannelStatus::Offline,
                    }),
                    Effect::Emit(MonitorEvent::OutageStarted {
                        channel: self.id.clone(),
                        reason,
                        first_failure_ms: first_failure,
                    }),
                ];
                (next, effects)
            } else {
                (next, Vec::new())
            }
        }
    }

    /// True once the failure streak has reached the confirmation threshold
    pub fn is_confirmed_offline(&self) -> bool {
        self.status == ChannelStatus::Offline
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
