// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adaptive probe interval strategy
//!
//! Pure decision logic: given a channel's current health context, pick the
//! next probe interval. During a confirmed outage the channel is probed
//! FASTER, not slower, so short outages and recoveries are caught quickly.
//! Every branch is clamped to the safety band last.

use crate::channel::{ChannelStatus, Priority};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard floor for any computed interval
pub const MIN_INTERVAL: Duration = Duration::from_secs(10);
/// Hard ceiling for any computed interval
pub const MAX_INTERVAL: Duration = Duration::from_secs(600);
/// Gentle interval used shortly after a recovery
pub const RECOVERY_INTERVAL: Duration = Duration::from_secs(45);
/// How long after a recovery the gentler cadence applies
pub const RECOVERY_WINDOW: Duration = Duration::from_secs(600);
/// Watch-mode interval for critical channels
pub const WATCH_CRITICAL_INTERVAL: Duration = Duration::from_secs(10);
/// Watch-mode interval for everything else
pub const WATCH_NORMAL_INTERVAL: Duration = Duration::from_secs(15);

/// Which branch of the strategy produced a decision
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Healthy channel at its configured base interval
    Stable,
    /// Confirmed offline, probing accelerated
    Crisis,
    /// Recently recovered or flapping, gently slowed
    Recovery,
    /// An active watch session pins the interval
    WatchOverride,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Stable => write!(f, "stable"),
            Strategy::Crisis => write!(f, "crisis"),
            Strategy::Recovery => write!(f, "recovery"),
            Strategy::WatchOverride => write!(f, "watch_override"),
        }
    }
}

/// The outcome of one interval computation. Transient, recomputed every run.
#[derive(Clone, Debug, PartialEq)]
pub struct BackoffDecision {
    pub interval: Duration,
    pub strategy: Strategy,
    pub reason: String,
    /// Acceleration factor applied to the base interval (1 outside crisis)
    pub multiplier: u32,
}

/// Inputs to one interval computation
#[derive(Clone, Debug)]
pub struct BackoffContext {
    pub status: ChannelStatus,
    pub consecutive_failures: u32,
    pub base_interval: Duration,
    pub priority: Priority,
    /// True when an active watch session covers this channel
    pub watch_active: bool,
    /// Wall-clock time of the last offline-to-online transition, if any
    pub recovered_at_ms: Option<u64>,
    pub now_ms: u64,
}

impl BackoffContext {
    fn within_recovery_window(&self) -> bool {
        self.recovered_at_ms.is_some_and(|recovered| {
            self.now_ms.saturating_sub(recovered) <= RECOVERY_WINDOW.as_millis() as u64
        })
    }
}

/// Compute the next probe interval for a channel.
///
/// Branch order is significant: watch beats crisis beats recovery beats
/// stable, and the `[MIN_INTERVAL, MAX_INTERVAL]` clamp is applied after
/// whichever branch ran.
pub fn compute_interval(ctx: &BackoffContext) -> BackoffDecision {
    let decision = if ctx.watch_active {
        let interval = match ctx.priority {
            Priority::Critical => WATCH_CRITICAL_INTERVAL,
            Priority::Normal => WATCH_NORMAL_INTERVAL,
        };
        BackoffDecision {
            interval,
            strategy: Strategy::WatchOverride,
            reason: format!("watch session active, {} priority", priority_label(ctx.priority)),
            multiplier: 1,
        }
    } else if ctx.status == ChannelStatus::Offline {
        // Zero failures while offline cannot happen through the state
        // machine; fall back to the smallest acceleration.
        let multiplier = match ctx.consecutive_failures {
            0..=5 => 2,
            6..=8 => 3,
            _ => 4,
        };
        BackoffDecision {
            interval: ctx.base_interval / multiplier,
            strategy: Strategy::Crisis,
            reason: format!(
                "offline with {} consecutive failures, probing {}x faster",
                ctx.consecutive_failures, multiplier
            ),
            multiplier,
        }
    } else if ctx.status == ChannelStatus::Online
        && (ctx.consecutive_failures > 0 || ctx.within_recovery_window())
    {
        let reason = if ctx.consecutive_failures > 0 {
            format!(
                "{} recent failures below threshold",
                ctx.consecutive_failures
            )
        } else {
            "recently recovered".to_string()
        };
        BackoffDecision {
            interval: RECOVERY_INTERVAL,
            strategy: Strategy::Recovery,
            reason,
            multiplier: 1,
        }
    } else {
        BackoffDecision {
            interval: ctx.base_interval,
            strategy: Strategy::Stable,
            reason: "healthy at base interval".to_string(),
            multiplier: 1,
        }
    };

    BackoffDecision {
        interval: decision.interval.clamp(MIN_INTERVAL, MAX_INTERVAL),
        ..decision
    }
}

fn priority_label(priority: Priority) -> &'static str {
    match priority {
        Priority::Critical => "critical",
        Priority::Normal => "normal",
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
