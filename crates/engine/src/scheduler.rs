// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-channel timer bookkeeping
//!
//! A binary heap of one-shot fire times with an authoritative map of what
//! is actually armed; heap entries that no longer match the map are stale
//! and dropped lazily. One live timer per channel. Pausing drops the
//! pending fire without touching channel state; a fire for a channel with
//! a run still in flight is deferred rather than overlapped. Re-arming
//! after a completed run is the service's job.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::{Duration, Instant};
use vigil_core::channel::ChannelId;

/// How long a fire is pushed back when the previous run is still going
const DEFER_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct ScheduledProbe {
    channel: ChannelId,
    fire_at: Instant,
}

impl PartialEq for ScheduledProbe {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.channel == other.channel
    }
}

impl Eq for ScheduledProbe {}

impl PartialOrd for ScheduledProbe {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledProbe {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap: earliest first
        Reverse(self.fire_at).cmp(&Reverse(other.fire_at))
    }
}

/// Owns the probe timers for all channels
#[derive(Default)]
pub struct ProbeScheduler {
    items: BinaryHeap<ScheduledProbe>,
    /// The one live fire time per channel; heap entries not in here are stale
    armed: HashMap<ChannelId, Instant>,
    paused: HashSet<ChannelId>,
    in_flight: HashSet<ChannelId>,
}

impl ProbeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer for a channel. Any previous pending fire
    /// is superseded.
    pub fn schedule(&mut self, channel: ChannelId, fire_at: Instant) {
        self.armed.insert(channel.clone(), fire_at);
        self.items.push(ScheduledProbe { channel, fire_at });
    }

    /// Drop the channel entirely; its pending fire never happens
    pub fn cancel(&mut self, channel: &ChannelId) {
        self.armed.remove(channel);
        self.paused.remove(channel);
    }

    /// Stop future fires without touching channel state. An in-flight run
    /// is unaffected; only the next scheduling is suppressed.
    pub fn pause(&mut self, channel: &ChannelId) {
        self.paused.insert(channel.clone());
    }

    /// Lift a pause. The caller re-arms the timer.
    pub fn resume(&mut self, channel: &ChannelId) -> bool {
        self.paused.remove(channel)
    }

    pub fn is_paused(&self, channel: &ChannelId) -> bool {
        self.paused.contains(channel)
    }

    pub fn mark_in_flight(&mut self, channel: &ChannelId) {
        self.in_flight.insert(channel.clone());
    }

    pub fn clear_in_flight(&mut self, channel: &ChannelId) {
        self.in_flight.remove(channel);
    }

    pub fn is_in_flight(&self, channel: &ChannelId) -> bool {
        self.in_flight.contains(channel)
    }

    /// Channels whose timers are due. Stale and cancelled entries are
    /// dropped, paused entries are swallowed, and a due channel that is
    /// still in flight gets pushed back instead of firing twice.
    pub fn poll(&mut self, now: Instant) -> Vec<ChannelId> {
        let mut due = Vec::new();

        while let Some(item) = self.items.peek() {
            if item.fire_at > now {
                break;
            }
            let Some(item) = self.items.pop() else {
                break;
            };

            if self.armed.get(&item.channel) != Some(&item.fire_at) {
                continue;
            }
            if self.paused.contains(&item.channel) {
                self.armed.remove(&item.channel);
                continue;
            }
            if self.in_flight.contains(&item.channel) {
                let deferred = now + DEFER_INTERVAL;
                self.armed.insert(item.channel.clone(), deferred);
                self.items.push(ScheduledProbe {
                    channel: item.channel,
                    fire_at: deferred,
                });
                continue;
            }

            self.armed.remove(&item.channel);
            due.push(item.channel);
        }

        due
    }

    /// Earliest pending fire time. May point at a stale heap entry, which
    /// only means one early wakeup; `poll` discards it.
    pub fn next_fire_time(&self) -> Option<Instant> {
        self.items.peek().map(|item| item.fire_at)
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
