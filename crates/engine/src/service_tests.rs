// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;
use vigil_core::channel::{Priority, ProbeKind};
use vigil_core::clock::SystemClock;
use vigil_core::events::EventReceiver;
use vigil_core::guard::GuardRegistry;
use vigil_probes::{FakeProbe, ProbeOutcome};
use vigil_storage::StateStore;

fn definition(id: &str, base_secs: u64) -> ChannelDefinition {
    ChannelDefinition {
        id: ChannelId::new(id),
        probe: ProbeKind::Http {
            url: "http://example.test".to_string(),
        },
        base_interval: Duration::from_secs(base_secs),
        timeout: Duration::from_secs(5),
        failure_threshold: 3,
        priority: Priority::Normal,
        guards: Vec::new(),
    }
}

struct Harness {
    probe: FakeProbe,
    handle: ServiceHandle,
    events: EventReceiver,
    join: JoinHandle<()>,
}

fn start(definitions: Vec<ChannelDefinition>) -> Harness {
    let probe = FakeProbe::new();
    let bus = EventBus::new();
    let (_, events) = bus.subscribe("test");
    let store = StateStore::open_temp().unwrap();
    let runner = ChannelRunner::new(
        GuardRegistry::new(),
        Arc::new(probe.clone()),
        store,
        bus.clone(),
        SystemClock,
    );
    let (handle, join) = ProbeService::start(runner, definitions, bus);
    Harness {
        probe,
        handle,
        events,
        join,
    }
}

/// Wait for the next event with the given name, letting paused time
/// auto-advance through pending timers.
async fn wait_for(events: &mut EventReceiver, name: &str) -> MonitorEvent {
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

#[test]
fn watch_scope_covers_the_right_channels() {
    assert!(WatchScope::All.covers(&ChannelId::new("anything")));

    let scope = WatchScope::Channels([ChannelId::new("web")].into_iter().collect());
    assert!(scope.covers(&ChannelId::new("web")));
    assert!(!scope.covers(&ChannelId::new("db")));
}

#[tokio::test(start_paused = true)]
async fn channels_are_probed_immediately_on_start() {
    let mut h = start(vec![definition("web", 600)]);

    wait_for(&mut h.events, "sample:recorded").await;
    assert_eq!(h.probe.call_count(&ChannelId::new("web")), 1);

    h.handle.shutdown();
    h.join.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn healthy_channel_rearms_near_its_base_interval() {
    let mut h = start(vec![definition("web", 60)]);

    wait_for(&mut h.events, "sample:recorded").await;
    let first = tokio::time::Instant::now();

    wait_for(&mut h.events, "sample:recorded").await;
    let gap = first.elapsed();

    // 60s base with up to 10% jitter either way
    assert!(gap >= Duration::from_secs(53), "gap was {gap:?}");
    assert!(gap <= Duration::from_secs(67), "gap was {gap:?}");
}

#[tokio::test(start_paused = true)]
async fn failures_confirm_an_outage_and_accelerate_probing() {
    let mut h = start(vec![definition("web", 60)]);
    h.probe.set("web", ProbeOutcome::down("connection refused"));

    // Threshold is 3: immediate fire plus two re-arms at ~60s each
    wait_for(&mut h.events, "outage:started").await;
    assert_eq!(h.probe.call_count(&ChannelId::new("web")), 3);

    // The interval is decided at fire time, so the first fire that sees
    // the offline state is the one whose re-arm runs at crisis cadence
    wait_for(&mut h.events, "sample:recorded").await;
    let offline_fire = tokio::time::Instant::now();

    // Crisis cadence probes at base/2 = 30s while offline
    wait_for(&mut h.events, "sample:recorded").await;
    let gap = offline_fire.elapsed();
    assert!(gap >= Duration::from_secs(26), "gap was {gap:?}");
    assert!(gap <= Duration::from_secs(34), "gap was {gap:?}");
}

#[tokio::test(start_paused = true)]
async fn recovery_emits_outage_ended_and_gentle_cadence() {
    let mut h = start(vec![definition("web", 60)]);
    h.probe.queue("web", ProbeOutcome::down("refused"));
    h.probe.queue("web", ProbeOutcome::down("refused"));
    h.probe.queue("web", ProbeOutcome::down("refused"));

    wait_for(&mut h.events, "outage:started").await;

    // Next probe succeeds and recovers the channel
    wait_for(&mut h.events, "outage:ended").await;

    // The recovering run itself was armed at crisis cadence; the first
    // fire that sees the online state re-arms at the gentle 45s cadence
    wait_for(&mut h.events, "sample:recorded").await;
    let online_fire = tokio::time::Instant::now();

    wait_for(&mut h.events, "sample:recorded").await;
    let gap = online_fire.elapsed();
    assert!(gap >= Duration::from_secs(40), "gap was {gap:?}");
    assert!(gap <= Duration::from_secs(50), "gap was {gap:?}");
}

#[tokio::test(start_paused = true)]
async fn paused_channel_stops_firing_until_resumed() {
    let mut h = start(vec![definition("web", 60)]);
    let id = ChannelId::new("web");

    wait_for(&mut h.events, "sample:recorded").await;

    h.handle.pause(id.clone());
    wait_for(&mut h.events, "channel:paused").await;

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(h.probe.call_count(&id), 1);

    h.handle.resume(id.clone());
    wait_for(&mut h.events, "channel:resumed").await;
    wait_for(&mut h.events, "sample:recorded").await;
    assert_eq!(h.probe.call_count(&id), 2);
}

#[tokio::test(start_paused = true)]
async fn pausing_again_is_a_no_op_and_resume_without_pause_does_nothing() {
    let mut h = start(vec![definition("web", 60)]);
    let id = ChannelId::new("web");

    wait_for(&mut h.events, "sample:recorded").await;

    // Resume without a pause is ignored
    h.handle.resume(id.clone());
    h.handle.pause(id.clone());
    h.handle.pause(id.clone());

    wait_for(&mut h.events, "channel:paused").await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    // Only one paused event came through
    let mut extra = 0;
    while let Ok(event) = h.events.try_recv() {
        if event.name() == "channel:paused" {
            extra += 1;
        }
    }
    assert_eq!(extra, 0);
}

#[tokio::test(start_paused = true)]
async fn run_now_probes_outside_the_timer() {
    let mut h = start(vec![definition("web", 600)]);
    let id = ChannelId::new("web");

    wait_for(&mut h.events, "sample:recorded").await;
    // Let the completion land so the run is no longer in flight
    tokio::time::sleep(Duration::from_millis(10)).await;

    let before = tokio::time::Instant::now();
    h.handle.run_now(id.clone());
    wait_for(&mut h.events, "sample:recorded").await;

    assert!(before.elapsed() < Duration::from_secs(10));
    assert_eq!(h.probe.call_count(&id), 2);
}

#[tokio::test(start_paused = true)]
async fn refresh_starts_added_channels_and_stops_removed_ones() {
    let mut h = start(vec![definition("old", 600)]);

    wait_for(&mut h.events, "sample:recorded").await;
    assert_eq!(h.probe.call_count(&ChannelId::new("old")), 1);

    h.handle.refresh(vec![definition("new", 600)]);
    wait_for(&mut h.events, "sample:recorded").await;
    assert_eq!(h.probe.call_count(&ChannelId::new("new")), 1);

    // The removed channel never fires again
    tokio::time::sleep(Duration::from_secs(1200)).await;
    assert_eq!(h.probe.call_count(&ChannelId::new("old")), 1);
}

#[tokio::test(start_paused = true)]
async fn watch_session_pins_the_fast_cadence() {
    let mut critical = definition("web", 600);
    critical.priority = Priority::Critical;
    let mut h = start(vec![critical]);

    wait_for(&mut h.events, "sample:recorded").await;

    h.handle.set_watch(Some(WatchScope::All));
    let pinned_at = tokio::time::Instant::now();

    // Critical channels probe every ~10s under a watch
    wait_for(&mut h.events, "sample:recorded").await;
    let gap = pinned_at.elapsed();
    assert!(gap <= Duration::from_secs(12), "gap was {gap:?}");

    // Clearing the watch goes back to the slow base interval
    h.handle.set_watch(None);
    wait_for(&mut h.events, "sample:recorded").await;
    let settled = tokio::time::Instant::now();
    wait_for(&mut h.events, "sample:recorded").await;
    assert!(settled.elapsed() >= Duration::from_secs(500));
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_loop() {
    let h = start(vec![definition("web", 60)]);
    h.handle.shutdown();
    h.join.await.unwrap();
}
