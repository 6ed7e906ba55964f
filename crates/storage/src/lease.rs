// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease record persistence for leader election
//!
//! The coordination algorithm only needs four primitives: read, atomic
//! create-if-absent, replace-if-unchanged, and delete-if-owned. The file
//! backend gets create-if-absent from `create_new` and replacement from a
//! write-to-temp plus rename after verifying the expected current content.
//! The verify-then-rename pair is not a true compare-and-swap; the brief
//! race window is an accepted trade-off because duplicate probing for a
//! few seconds wastes resources without corrupting state.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use vigil_core::lease::{InstanceId, LeaseRecord};

#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("lease store unavailable: {0}")]
    Unavailable(String),
}

/// Storage backend for the coordination lease
pub trait LeaseStore: Send + Sync {
    /// Read the current lease record, if one exists
    fn read(&self) -> Result<Option<LeaseRecord>, LeaseError>;

    /// Atomically create the record if absent. Returns false when a
    /// record already exists.
    fn try_create(&self, record: &LeaseRecord) -> Result<bool, LeaseError>;

    /// Replace the record only if it still matches `expected`. Returns
    /// false when the stored record differs.
    fn try_take_over(
        &self,
        expected: &LeaseRecord,
        new: &LeaseRecord,
    ) -> Result<bool, LeaseError>;

    /// Refresh the heartbeat if `owner` still holds the lease. Returns
    /// false when the lease is gone or owned by someone else.
    fn renew(&self, owner: &InstanceId, now_ms: u64) -> Result<bool, LeaseError>;

    /// Delete the record if `owner` holds it; a no-op otherwise
    fn release(&self, owner: &InstanceId) -> Result<(), LeaseError>;
}

/// Lease store backed by a single JSON file on a shared filesystem
#[derive(Clone)]
pub struct FileLeaseStore {
    path: PathBuf,
}

impl FileLeaseStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, LeaseError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    fn write_replacing(&self, record: &LeaseRecord) -> Result<(), LeaseError> {
        // Unique temp name so racing writers never clobber each other's temp
        let temp = self
            .path
            .with_extension(format!("tmp.{}", uuid::Uuid::new_v4()));
        let json = serde_json::to_string_pretty(record)?;
        {
            let mut file = fs::File::create(&temp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

impl LeaseStore for FileLeaseStore {
    fn read(&self) -> Result<Option<LeaseRecord>, LeaseError> {
        match fs::read_to_string(&self.path) {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn try_create(&self, record: &LeaseRecord) -> Result<bool, LeaseError> {
        let json = serde_json::to_string_pretty(record)?;
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                file.write_all(json.as_bytes())?;
                file.sync_all()?;
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn try_take_over(
        &self,
        expected: &LeaseRecord,
        new: &LeaseRecord,
    ) -> Result<bool, LeaseError> {
        match self.read()? {
            Some(current) if current == *expected => {
                self.write_replacing(new)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn renew(&self, owner: &InstanceId, now_ms: u64) -> Result<bool, LeaseError> {
        match self.read()? {
            Some(current) if current.is_owned_by(owner) => {
                self.write_replacing(&current.heartbeat(now_ms))?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn release(&self, owner: &InstanceId) -> Result<(), LeaseError> {
        match self.read()? {
            Some(current) if current.is_owned_by(owner) => {
                match fs::remove_file(&self.path) {
                    Ok(()) => Ok(()),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(err) => Err(err.into()),
                }
            }
            _ => Ok(()),
        }
    }
}

/// In-memory lease store with true compare-and-swap, for cluster
/// simulations in tests
#[derive(Clone, Default)]
pub struct MemoryLeaseStore {
    record: Arc<Mutex<Option<LeaseRecord>>>,
    fail: Arc<Mutex<bool>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail, to exercise coordination error paths
    pub fn set_failing(&self, failing: bool) {
        *self.fail.lock().unwrap_or_else(|e| e.into_inner()) = failing;
    }

    fn check_available(&self) -> Result<(), LeaseError> {
        if *self.fail.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(LeaseError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

impl LeaseStore for MemoryLeaseStore {
    fn read(&self) -> Result<Option<LeaseRecord>, LeaseError> {
        self.check_available()?;
        Ok(self.record.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn try_create(&self, record: &LeaseRecord) -> Result<bool, LeaseError> {
        self.check_available()?;
        let mut slot = self.record.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return Ok(false);
        }
        *slot = Some(record.clone());
        Ok(true)
    }

    fn try_take_over(
        &self,
        expected: &LeaseRecord,
        new: &LeaseRecord,
    ) -> Result<bool, LeaseError> {
        self.check_available()?;
        let mut slot = self.record.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some(current) if current == expected => {
                *slot = Some(new.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn renew(&self, owner: &InstanceId, now_ms: u64) -> Result<bool, LeaseError> {
        self.check_available()?;
        let mut slot = self.record.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some(current) if current.is_owned_by(owner) => {
                *slot = Some(current.heartbeat(now_ms));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn release(&self, owner: &InstanceId) -> Result<(), LeaseError> {
        self.check_available()?;
        let mut slot = self.record.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|r| r.is_owned_by(owner)) {
            *slot = None;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "lease_tests.rs"]
mod tests;
