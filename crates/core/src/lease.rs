// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease records for single-prober election
//!
//! Cooperating instances share one lease per monitor name. The holder is
//! the leader and runs the probes; everyone else polls the record and
//! takes over once the holder's heartbeat goes stale.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for a cooperating instance
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identity for this process
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role an instance currently plays in the election
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Holds the lease and runs the probe schedule
    Leader,
    /// Watches the lease and stands by to take over
    Follower,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Leader => write!(f, "leader"),
            Role::Follower => write!(f, "follower"),
        }
    }
}

/// Coordination settings for the lease election
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Name of the shared lease; instances with the same name compete
    pub lease_name: String,
    /// How long without a heartbeat before the holder is considered dead
    #[serde(with = "humantime_serde", default = "default_lease_timeout")]
    pub lease_timeout: Duration,
}

fn default_lease_timeout() -> Duration {
    Duration::from_secs(30)
}

impl CoordinationConfig {
    pub fn new(lease_name: impl Into<String>) -> Self {
        Self {
            lease_name: lease_name.into(),
            lease_timeout: default_lease_timeout(),
        }
    }

    pub fn with_lease_timeout(mut self, timeout: Duration) -> Self {
        self.lease_timeout = timeout;
        self
    }

    /// How often a leader refreshes its heartbeat
    pub fn heartbeat_interval(&self) -> Duration {
        self.lease_timeout / 3
    }

    /// How often a follower re-reads the lease
    pub fn follower_poll_interval(&self) -> Duration {
        self.lease_timeout / 4
    }
}

/// The persisted lease record shared between instances
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub owner: InstanceId,
    /// When the current owner first took the lease
    pub acquired_at_ms: u64,
    /// Last heartbeat written by the owner
    pub last_heartbeat_ms: u64,
}

impl LeaseRecord {
    pub fn new(owner: InstanceId, now_ms: u64) -> Self {
        Self {
            owner,
            acquired_at_ms: now_ms,
            last_heartbeat_ms: now_ms,
        }
    }

    /// True once the owner has missed heartbeats past the timeout
    pub fn is_stale(&self, now_ms: u64, timeout: Duration) -> bool {
        now_ms.saturating_sub(self.last_heartbeat_ms) > timeout.as_millis() as u64
    }

    pub fn is_owned_by(&self, instance: &InstanceId) -> bool {
        &self.owner == instance
    }

    /// Refresh the heartbeat, keeping the acquisition timestamp
    pub fn heartbeat(&self, now_ms: u64) -> Self {
        Self {
            last_heartbeat_ms: now_ms,
            ..self.clone()
        }
    }

    /// Hand the lease to a new owner
    pub fn taken_over_by(&self, new_owner: InstanceId, now_ms: u64) -> Self {
        Self::new(new_owner, now_ms)
    }
}
