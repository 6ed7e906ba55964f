// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failover specs
//!
//! A leader that stops heartbeating loses the lease once it goes stale,
//! and the standby picks up probing against the same shared state.

use crate::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn standby_takes_over_when_the_leader_crashes() {
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
    wait_for_event(&mut a.events, "sample:recorded").await;

    let mut b = Instance::spawn(
        "b",
        Arc::new(lease_store.clone()),
        state_store.clone(),
        clock.clone(),
        definitions,
    );
    wait_for_role(&mut b.events, Role::Follower).await;
    assert_eq!(b.probe_count("web"), 0);

    // The leader dies without releasing; heartbeats stop cold
    a.task.abort();
    clock.advance(LEASE_TIMEOUT + Duration::from_secs(1));

    wait_for_role(&mut b.events, Role::Leader).await;
    let record = lease_store.read().unwrap().unwrap();
    assert!(record.is_owned_by(&InstanceId::new("b")));

    // The new leader probes the same channels
    wait_for_event(&mut b.events, "sample:recorded").await;
    assert!(b.probe_count("web") >= 1);
}

#[tokio::test(start_paused = true)]
async fn new_leader_resumes_from_the_persisted_channel_state() {
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
    // The first leader confirms an outage, then crashes
    a.probe.set("web", ProbeOutcome::down("connection refused"));
    wait_for_role(&mut a.events, Role::Leader).await;
    wait_for_event(&mut a.events, "outage:started").await;
    a.task.abort();

    let persisted = state_store
        .channel_state(&ChannelId::new("web"))
        .unwrap()
        .unwrap();
    assert_eq!(persisted.status, ChannelStatus::Offline);

    clock.advance(LEASE_TIMEOUT + Duration::from_secs(1));

    let mut b = Instance::spawn(
        "b",
        Arc::new(lease_store.clone()),
        state_store.clone(),
        clock,
        definitions,
    );
    wait_for_role(&mut b.events, Role::Leader).await;

    // The takeover leader sees the channel recover and closes the outage
    // the old leader opened
    wait_for_event(&mut b.events, "outage:ended").await;
    let outages = state_store.outages(&ChannelId::new("web")).unwrap();
    assert_eq!(outages.len(), 1);
    assert!(!outages[0].is_open());
}
