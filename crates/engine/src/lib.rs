// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vigil-engine: scheduling and coordination for the vigil monitor
//!
//! This crate wires the core state machines to real probes and storage:
//! - The per-channel runner executing guards, probes, and persistence
//! - The scheduler owning one adaptive timer per channel
//! - The probe service loop with pause/resume/run-now/refresh control
//! - Lease-based leader election across cooperating instances

pub mod coordinator;
pub mod error;
pub mod runner;
pub mod scheduler;
pub mod service;

pub use coordinator::{
    Coordinator, ElectionOutcome, LeaderSession, SchedulerSession, SessionFactory,
};
pub use error::EngineError;
pub use runner::{ChannelRunner, RunOutcome};
pub use scheduler::ProbeScheduler;
pub use service::{ProbeService, ServiceHandle, WatchScope};
