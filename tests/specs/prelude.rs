// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for the workspace specs
//!
//! An `Instance` is one complete monitor process in miniature: its own
//! coordinator, runner, and event stream, probing through a scripted
//! `FakeProbe`. Instances share a lease store and a state store the way
//! real processes share a filesystem.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use vigil_core::{
    ChannelDefinition, ChannelId, ChannelStatus, EventBus, EventReceiver, FakeClock,
    GuardRegistry, InstanceId, MonitorEvent, Priority, ProbeKind, Role,
};
pub use vigil_engine::{
    ChannelRunner, Coordinator, LeaderSession, ProbeService, SchedulerSession,
};
pub use vigil_probes::{FakeProbe, ProbeOutcome};
pub use vigil_storage::{FileLeaseStore, LeaseStore, MemoryLeaseStore, StateStore};

use vigil_core::CoordinationConfig;

pub const LEASE_TIMEOUT: Duration = Duration::from_secs(30);

pub fn channel(id: &str, base_secs: u64, threshold: u32) -> ChannelDefinition {
    ChannelDefinition {
        id: ChannelId::new(id),
        probe: ProbeKind::Http {
            url: format!("http://{id}.example.test/health"),
        },
        base_interval: Duration::from_secs(base_secs),
        timeout: Duration::from_secs(5),
        failure_threshold: threshold,
        priority: Priority::Normal,
        guards: Vec::new(),
    }
}

/// One monitor instance with its coordinator running in the background
pub struct Instance {
    pub probe: FakeProbe,
    pub events: EventReceiver,
    pub shutdown: watch::Sender<bool>,
    pub task: JoinHandle<()>,
}

impl Instance {
    pub fn spawn(
        name: &str,
        lease_store: Arc<dyn LeaseStore>,
        state_store: StateStore,
        clock: FakeClock,
        definitions: Vec<ChannelDefinition>,
    ) -> Self {
        let probe = FakeProbe::new();
        let bus = EventBus::new();
        let (_, events) = bus.subscribe(name);

        let runner = ChannelRunner::new(
            GuardRegistry::new(),
            Arc::new(probe.clone()),
            state_store,
            bus.clone(),
            clock.clone(),
        );

        let coordinator = Coordinator::new(
            InstanceId::new(name),
            CoordinationConfig::new("specs").with_lease_timeout(LEASE_TIMEOUT),
            lease_store,
            bus.clone(),
            clock,
        );

        let session_runner = runner.clone();
        let session_bus = bus.clone();
        let factory = move || {
            let (handle, join) = ProbeService::start(
                session_runner.clone(),
                definitions.clone(),
                session_bus.clone(),
            );
            Box::new(SchedulerSession::new(handle, join)) as Box<dyn LeaderSession>
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(coordinator.run(factory, shutdown_rx));

        Self {
            probe,
            events,
            shutdown,
            task,
        }
    }

    pub fn probe_count(&self, id: &str) -> usize {
        self.probe.call_count(&ChannelId::new(id))
    }
}

pub async fn wait_for_role(events: &mut EventReceiver, want: Role) {
    tokio::time::timeout(Duration::from_secs(3600), async {
        loop {
            match events.recv().await {
                Some(MonitorEvent::CoordinationChanged { role }) if role == want => return,
                Some(_) => continue,
                None => panic!("event bus closed while waiting for role {want}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for role {want}"))
}

pub async fn wait_for_event(events: &mut EventReceiver, name: &str) -> MonitorEvent {
    tokio::time::timeout(Duration::from_secs(3600), async {
        loop {
            match events.recv().await {
                Some(event) if event.name() == name => return event,
                Some(_) => continue,
                None => panic!("event bus closed while waiting for {name}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {name}"))
}
