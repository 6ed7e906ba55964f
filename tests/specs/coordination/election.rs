// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Leader election specs
//!
//! Two instances racing for one lease: exactly one becomes the leader and
//! probes; the other stands idle.

use crate::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn two_instances_racing_an_empty_store_elect_exactly_one_leader() {
    let clock = FakeClock::new();
    let lease_store = MemoryLeaseStore::new();
    let state_store = StateStore::open_temp().unwrap();
    let definitions = vec![channel("web", 60, 3)];

    let mut a = Instance::spawn(
        "a",
        Arc::new(lease_store.clone()),
        state_store.clone(),
        clock.clone(),
        definitions.clone(),
    );
    let mut b = Instance::spawn(
        "b",
        Arc::new(lease_store.clone()),
        state_store,
        clock,
        definitions,
    );

    // Both instances settle into a role
    let mut leaders = 0;
    for instance in [&mut a, &mut b] {
        match wait_for_event(&mut instance.events, "coordination:changed").await {
            MonitorEvent::CoordinationChanged { role: Role::Leader } => leaders += 1,
            MonitorEvent::CoordinationChanged { .. } => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(leaders, 1);

    // Only the leader probes: over two base intervals, one instance does
    // all the work and the other does none
    tokio::time::sleep(Duration::from_secs(140)).await;
    let (a_count, b_count) = (a.probe_count("web"), b.probe_count("web"));
    assert!(
        (a_count == 0) != (b_count == 0),
        "expected exactly one prober, got a={a_count} b={b_count}"
    );
    assert!(a_count + b_count >= 3, "leader never settled into probing");
}

#[tokio::test(start_paused = true)]
async fn file_backed_lease_is_exclusive_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let lease_path = dir.path().join("lease.json");
    let state_store = StateStore::open_temp().unwrap();
    let clock = FakeClock::new();
    let definitions = vec![channel("web", 60, 3)];

    // Each instance opens the file on its own, as separate processes would
    let store_a = FileLeaseStore::new(&lease_path).unwrap();
    let store_b = FileLeaseStore::new(&lease_path).unwrap();

    let mut a = Instance::spawn(
        "a",
        Arc::new(store_a),
        state_store.clone(),
        clock.clone(),
        definitions.clone(),
    );
    let mut b = Instance::spawn("b", Arc::new(store_b), state_store, clock, definitions);

    let mut leaders = 0;
    for instance in [&mut a, &mut b] {
        match wait_for_event(&mut instance.events, "coordination:changed").await {
            MonitorEvent::CoordinationChanged { role: Role::Leader } => leaders += 1,
            MonitorEvent::CoordinationChanged { .. } => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(leaders, 1);
}

#[tokio::test(start_paused = true)]
async fn graceful_shutdown_hands_the_lease_to_the_standby() {
    let clock = FakeClock::new();
    let lease_store = MemoryLeaseStore::new();
    let state_store = StateStore::open_temp().unwrap();
    let definitions = vec![channel("web", 60, 3)];

    let mut a = Instance::spawn(
        "a",
        Arc::new(lease_store.clone()),
        state_store.clone(),
        clock.clone(),
        definitions.clone(),
    );
    wait_for_role(&mut a.events, Role::Leader).await;

    let mut b = Instance::spawn(
        "b",
        Arc::new(lease_store.clone()),
        state_store,
        clock,
        definitions,
    );
    wait_for_role(&mut b.events, Role::Follower).await;

    // The leader leaves cleanly, releasing the lease; no staleness wait
    // is needed for the standby to win it
    a.shutdown.send(true).unwrap();
    a.task.await.unwrap();

    // The lease is free (or already claimed by the standby), never still a's
    if let Some(record) = lease_store.read().unwrap() {
        assert!(record.is_owned_by(&InstanceId::new("b")));
    }

    wait_for_role(&mut b.events, Role::Leader).await;
    wait_for_event(&mut b.events, "sample:recorded").await;
    assert!(b.probe_count("web") >= 1);
}
