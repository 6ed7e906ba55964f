// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vigil-storage: persistence for channel state and coordination leases
//!
//! Channel state, sample history, and outages live in per-channel JSON
//! files. The coordination lease is a single JSON record with atomic
//! create and rename-based replacement so racing instances never observe
//! a partial write.

pub mod lease;
pub mod state;

pub use lease::{FileLeaseStore, LeaseError, LeaseStore, MemoryLeaseStore};
pub use state::{StateStore, StorageError};
