// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Probe implementations for each supported protocol
//!
//! Every probe enforces the channel timeout itself and reduces to a
//! uniform `ProbeOutcome`; nothing here returns an error to the caller.

pub mod dns;
pub mod executor;
pub mod guards;
pub mod http;
pub mod script;
pub mod tcp;

pub use executor::{ProbeExecutor, ProbeOutcome, StandardExecutor};
pub use guards::{build_registry, DnsGuard, ScriptGuard};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeProbe;
