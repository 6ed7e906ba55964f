// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vigil-core: Core library for the vigil service monitor
//!
//! This crate provides:
//! - The per-channel health state machine and outage bookkeeping
//! - The adaptive backoff strategy deciding when to probe next
//! - Guard preconditions gating probe execution
//! - Lease records for single-prober election
//! - Typed domain events and the event bus
//! - Configuration loading and validation

pub mod clock;

pub mod backoff;
pub mod channel;
pub mod config;
pub mod event;
pub mod events;
pub mod guard;
pub mod lease;

// Re-exports
pub use backoff::{compute_interval, BackoffContext, BackoffDecision, Strategy};
pub use channel::{
    ChannelDefinition, ChannelId, ChannelState, ChannelStatus, Outage, Priority, ProbeKind,
    Sample,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, GuardSpec, MonitorConfig, MonitorSettings};
pub use event::{Effect, MonitorEvent};
pub use events::{EventBus, EventReceiver, EventSender, SubscriberId};
pub use guard::{blocking_guard, Guard, GuardError, GuardOutcome, GuardRegistry};
pub use lease::{CoordinationConfig, InstanceId, LeaseRecord, Role};
