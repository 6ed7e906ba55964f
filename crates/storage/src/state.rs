// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON file store for channel state, sample history, and outages
//!
//! Layout: `<base>/<kind>/<channel-id>.json` with kinds `state`, `samples`
//! and `outages`. Sample history is bounded; the oldest entries fall off
//! once the cap is reached. Only the current leader writes here, so no
//! cross-process locking is needed.

use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use vigil_core::channel::{ChannelId, ChannelState, Outage, Sample};

const DEFAULT_HISTORY_CAP: usize = 500;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON file-based store for per-channel monitoring records
#[derive(Clone)]
pub struct StateStore {
    base_path: PathBuf,
    history_cap: usize,
}

impl StateStore {
    /// Open a store at the given path
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            history_cap: DEFAULT_HISTORY_CAP,
        })
    }

    /// Open a temporary store for testing
    pub fn open_temp() -> Result<Self, StorageError> {
        let temp_dir = std::env::temp_dir().join(format!("vigil-test-{}", uuid::Uuid::new_v4()));
        Self::open(temp_dir)
    }

    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.history_cap = cap.max(1);
        self
    }

    // === Channel state ===

    pub fn channel_state(&self, id: &ChannelId) -> Result<Option<ChannelState>, StorageError> {
        self.load("state", id)
    }

    pub fn set_channel_state(&self, state: &ChannelState) -> Result<(), StorageError> {
        self.save("state", &state.id, state)
    }

    /// All channel ids with persisted state, for follower display reads
    pub fn channel_ids(&self) -> Result<Vec<ChannelId>, StorageError> {
        let dir = self.base_path.join("state");
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(stem) = path.file_stem() {
                    ids.push(ChannelId::new(stem.to_string_lossy().to_string()));
                }
            }
        }
        Ok(ids)
    }

    // === Samples ===

    /// Append a sample, dropping the oldest entries past the history cap
    pub fn append_sample(&self, id: &ChannelId, sample: &Sample) -> Result<(), StorageError> {
        let mut history: Vec<Sample> = self.load("samples", id)?.unwrap_or_default();
        history.push(sample.clone());
        if history.len() > self.history_cap {
            let excess = history.len() - self.history_cap;
            history.drain(..excess);
        }
        self.save("samples", id, &history)
    }

    pub fn samples(&self, id: &ChannelId) -> Result<Vec<Sample>, StorageError> {
        Ok(self.load("samples", id)?.unwrap_or_default())
    }

    // === Outages ===

    /// Record a newly confirmed outage
    pub fn open_outage(&self, outage: &Outage) -> Result<(), StorageError> {
        let mut outages: Vec<Outage> =
            self.load("outages", &outage.channel_id)?.unwrap_or_default();
        outages.push(outage.clone());
        self.save("outages", &outage.channel_id, &outages)
    }

    /// Close the open outage for a channel. Returns false when none was open.
    pub fn close_outage(&self, id: &ChannelId, end_ms: u64) -> Result<bool, StorageError> {
        let mut outages: Vec<Outage> = self.load("outages", id)?.unwrap_or_default();
        let Some(open) = outages.iter_mut().rev().find(|o| o.is_open()) else {
            return Ok(false);
        };
        open.end_ms = Some(end_ms);
        self.save("outages", id, &outages)?;
        Ok(true)
    }

    pub fn outages(&self, id: &ChannelId) -> Result<Vec<Outage>, StorageError> {
        Ok(self.load("outages", id)?.unwrap_or_default())
    }

    /// Open outages across all channels
    pub fn open_outages(&self) -> Result<Vec<Outage>, StorageError> {
        let mut open = Vec::new();
        for id in self.channel_ids()? {
            let outages: Vec<Outage> = self.load("outages", &id)?.unwrap_or_default();
            open.extend(outages.into_iter().filter(Outage::is_open));
        }
        Ok(open)
    }

    // === Plumbing ===

    fn save<T: Serialize>(&self, kind: &str, id: &ChannelId, data: &T) -> Result<(), StorageError> {
        let path = self.path_for(kind, id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(data)?;
        fs::write(&path, json)?;
        Ok(())
    }

    fn load<T: DeserializeOwned>(
        &self,
        kind: &str,
        id: &ChannelId,
    ) -> Result<Option<T>, StorageError> {
        let path = self.path_for(kind, id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn path_for(&self, kind: &str, id: &ChannelId) -> PathBuf {
        self.base_path.join(kind).join(format!("{}.json", id.0))
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
