// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: paths, startup, reconciliation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};
use vigil_core::{
    ChannelId, ConfigError, EventBus, GuardRegistry, InstanceId, MonitorConfig, SystemClock,
};
use vigil_engine::{ChannelRunner, Coordinator};
use vigil_probes::{build_registry, StandardExecutor};
use vigil_storage::{FileLeaseStore, LeaseError, StateStore, StorageError};

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the monitor TOML file
    pub config_path: PathBuf,
    /// Per-monitor state directory, derived from the config path
    pub state_dir: PathBuf,
    /// Channel state, samples, and outages live here
    pub store_path: PathBuf,
    /// The shared coordination lease file
    pub lease_path: PathBuf,
    /// Daemon log file
    pub log_path: PathBuf,
}

impl Config {
    /// Derive the daemon paths for a monitor config file. Instances
    /// pointed at the same file share state and compete for one lease.
    pub fn for_monitor(config_path: &Path) -> Result<Self, LifecycleError> {
        let canonical = config_path
            .canonicalize()
            .map_err(|e| LifecycleError::ConfigNotFound(config_path.to_path_buf(), e))?;

        let hash = monitor_hash(&canonical);
        let state_dir = state_root()?.join("monitors").join(&hash);

        Ok(Self {
            config_path: canonical,
            store_path: state_dir.join("store"),
            lease_path: state_dir.join("lease.json"),
            log_path: state_dir.join("daemon.log"),
            state_dir,
        })
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("config file not found at {0}: {1}")]
    ConfigNotFound(PathBuf, std::io::Error),

    #[error("could not determine state directory")]
    NoStateDir,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("lease error: {0}")]
    Lease(#[from] LeaseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything main needs to run one monitor instance
pub struct Daemon {
    pub monitor: MonitorConfig,
    pub runner: ChannelRunner<SystemClock>,
    pub coordinator: Coordinator<SystemClock>,
    pub bus: EventBus,
    pub instance: InstanceId,
}

/// Build the daemon: load and validate the monitor config, open the
/// stores, wire guards and probes, and prepare the coordinator.
pub fn startup(config: &Config) -> Result<Daemon, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    let monitor = MonitorConfig::load(&config.config_path)?;
    info!(
        monitor = %monitor.monitor.name,
        channels = monitor.channels.len(),
        guards = monitor.guards.len(),
        "monitor config loaded"
    );

    let store = StateStore::open(&config.store_path)?.with_history_cap(monitor.monitor.history_cap);
    reconcile_state(&store, &monitor);

    let guards: GuardRegistry = build_registry(&monitor.guards);
    let bus = EventBus::new();
    let runner = ChannelRunner::new(
        guards,
        Arc::new(StandardExecutor::new()),
        store,
        bus.clone(),
        SystemClock,
    );

    let lease_store = FileLeaseStore::new(&config.lease_path)?;
    let instance = InstanceId::generate();
    let coordinator = Coordinator::new(
        instance.clone(),
        monitor.coordination(),
        Arc::new(lease_store),
        bus.clone(),
        SystemClock,
    );

    Ok(Daemon {
        monitor,
        runner,
        coordinator,
        bus,
        instance,
    })
}

/// Compare persisted state against the configured channel list and flag
/// anything that needs attention after a restart.
fn reconcile_state(store: &StateStore, monitor: &MonitorConfig) {
    let configured: HashSet<&ChannelId> = monitor.channels.iter().map(|c| &c.id).collect();

    match store.open_outages() {
        Ok(open) => {
            for outage in open {
                if configured.contains(&outage.channel_id) {
                    info!(
                        channel = %outage.channel_id,
                        since_ms = outage.first_failure_ms,
                        "resuming with an open outage"
                    );
                } else {
                    warn!(
                        channel = %outage.channel_id,
                        "open outage for a channel no longer configured; it will stay open"
                    );
                }
            }
        }
        Err(err) => warn!(error = %err, "could not read outages during reconciliation"),
    }

    match store.channel_ids() {
        Ok(ids) => {
            for id in ids.iter().filter(|id| !configured.contains(id)) {
                warn!(channel = %id, "persisted state for a channel no longer configured");
            }
        }
        Err(err) => warn!(error = %err, "could not list persisted channels"),
    }
}

/// State root: VIGIL_STATE_DIR override, then XDG, then ~/.local/state
fn state_root() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("VIGIL_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("vigil"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/vigil"))
}

/// Compute the monitor hash for a unique state directory
fn monitor_hash(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    // First 16 hex chars are plenty to avoid collisions between paths
    hex_encode(&result[..8])
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
