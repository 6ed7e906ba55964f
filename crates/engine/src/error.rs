// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] vigil_storage::StorageError),
    #[error("lease error: {0}")]
    Lease(#[from] vigil_storage::LeaseError),
}
