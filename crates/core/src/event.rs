// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects and events emitted by the monitoring state machines

use crate::channel::{ChannelId, ChannelStatus, Outage, Sample};
use crate::lease::Role;

/// Effects are side effects that state machine transitions request
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Emit an event for other components to observe
    Emit(MonitorEvent),
    /// Open a new outage record
    OpenOutage(Outage),
    /// Close the open outage for a channel
    CloseOutage { channel: ChannelId, end_ms: u64 },
}

/// Events emitted by the monitoring core
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum MonitorEvent {
    /// A probe completed and produced a sample
    SampleRecorded {
        channel: ChannelId,
        sample: Sample,
    },
    /// A channel's health status actually changed
    StateChanged {
        channel: ChannelId,
        old: ChannelStatus,
        new: ChannelStatus,
    },
    /// Consecutive failures crossed the threshold
    OutageStarted {
        channel: ChannelId,
        reason: String,
        first_failure_ms: u64,
    },
    /// A confirmed outage ended on the first subsequent success
    OutageEnded {
        channel: ChannelId,
        duration_ms: u64,
    },
    /// This instance's coordination role changed
    CoordinationChanged { role: Role },
    /// A write to the state store failed (state in memory stays authoritative)
    PersistenceFailed {
        channel: ChannelId,
        detail: String,
    },
    ChannelPaused { channel: ChannelId },
    ChannelResumed { channel: ChannelId },
}

impl MonitorEvent {
    /// Get the event name for pattern matching
    /// Format: "category:action"
    pub fn name(&self) -> String {
        match self {
            MonitorEvent::SampleRecorded { .. } => "sample:recorded".to_string(),
            MonitorEvent::StateChanged { .. } => "state:changed".to_string(),
            MonitorEvent::OutageStarted { .. } => "outage:started".to_string(),
            MonitorEvent::OutageEnded { .. } => "outage:ended".to_string(),
            MonitorEvent::CoordinationChanged { .. } => "coordination:changed".to_string(),
            MonitorEvent::PersistenceFailed { .. } => "persistence:failed".to_string(),
            MonitorEvent::ChannelPaused { .. } => "channel:paused".to_string(),
            MonitorEvent::ChannelResumed { .. } => "channel:resumed".to_string(),
        }
    }
}
