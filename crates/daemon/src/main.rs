// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Vigil daemon (vigild)
//!
//! Background process that monitors the configured channels. Instances
//! pointed at the same config file elect one leader; the leader runs the
//! probe schedule, the others stand by and take over when it goes silent.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod lifecycle;

use std::path::PathBuf;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use vigil_core::{EventBus, MonitorEvent};
use vigil_engine::{LeaderSession, ProbeService, SchedulerSession};

use crate::lifecycle::{Config, LifecycleError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let config_path = if args.len() > 1 {
        PathBuf::from(&args[1])
    } else {
        PathBuf::from("vigil.toml")
    };

    let config = Config::for_monitor(&config_path)?;
    std::fs::create_dir_all(&config.state_dir)?;
    let log_guard = setup_logging(&config)?;

    info!(
        config = %config.config_path.display(),
        state = %config.state_dir.display(),
        "starting vigild"
    );

    let daemon = match lifecycle::startup(&config) {
        Ok(daemon) => daemon,
        Err(e) => {
            error!("failed to start daemon: {e}");
            drop(log_guard);
            return Err(e.into());
        }
    };
    info!(instance = %daemon.instance, "daemon ready");

    // Signal ready for a parent process waiting on startup
    println!("READY");

    let logger = spawn_event_logger(&daemon.bus);

    // The coordinator starts a probe service whenever this instance wins
    // the lease and stops it on demotion or shutdown.
    let runner = daemon.runner.clone();
    let definitions = daemon.monitor.channels.clone();
    let bus = daemon.bus.clone();
    let factory = move || {
        let (handle, join) = ProbeService::start(runner.clone(), definitions.clone(), bus.clone());
        Box::new(SchedulerSession::new(handle, join)) as Box<dyn LeaderSession>
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let coordinator = tokio::spawn(daemon.coordinator.run(factory, shutdown_rx));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    // The coordinator stops its session and releases the lease on its way out
    let _ = shutdown_tx.send(true);
    coordinator.await?;
    logger.abort();

    info!("daemon stopped");
    Ok(())
}

/// Mirror the monitoring event stream into the log
fn spawn_event_logger(bus: &EventBus) -> tokio::task::JoinHandle<()> {
    let (_, mut events) = bus.subscribe("daemon-log");
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    })
}

fn log_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::SampleRecorded { channel, sample } => {
            debug!(
                channel = %channel,
                success = sample.success,
                latency_ms = sample.latency_ms,
                "sample recorded"
            );
        }
        MonitorEvent::StateChanged { channel, old, new } => {
            info!(channel = %channel, %old, %new, "channel state changed");
        }
        MonitorEvent::OutageStarted {
            channel,
            reason,
            first_failure_ms,
        } => {
            warn!(
                channel = %channel,
                reason = %reason,
                since_ms = first_failure_ms,
                "outage confirmed"
            );
        }
        MonitorEvent::OutageEnded {
            channel,
            duration_ms,
        } => {
            info!(channel = %channel, duration_ms, "outage ended");
        }
        MonitorEvent::CoordinationChanged { role } => {
            info!(%role, "coordination role changed");
        }
        MonitorEvent::PersistenceFailed { channel, detail } => {
            error!(channel = %channel, detail = %detail, "persistence failed");
        }
        MonitorEvent::ChannelPaused { channel } => {
            info!(channel = %channel, "channel paused");
        }
        MonitorEvent::ChannelResumed { channel } => {
            info!(channel = %channel, "channel resumed");
        }
    }
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let dir = config
        .log_path
        .parent()
        .ok_or(LifecycleError::NoStateDir)?;
    let file = config
        .log_path
        .file_name()
        .ok_or(LifecycleError::NoStateDir)?;
    let file_appender = tracing_appender::rolling::never(dir, file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
