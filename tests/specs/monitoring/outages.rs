// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outage lifecycle specs
//!
//! A full instance drives a channel through failure confirmation and
//! recovery, with every transition persisted and announced.

use crate::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn an_outage_is_confirmed_persisted_and_closed_on_recovery() {
    let clock = FakeClock::new();
    let lease_store = MemoryLeaseStore::new();
    let state_store = StateStore::open_temp().unwrap();
    let id = ChannelId::new("web");

    let mut instance = Instance::spawn(
        "solo",
        Arc::new(lease_store),
        state_store.clone(),
        clock,
        vec![channel("web", 60, 2)],
    );
    instance.probe.queue("web", ProbeOutcome::down("timeout"));
    instance.probe.queue("web", ProbeOutcome::down("timeout"));

    wait_for_role(&mut instance.events, Role::Leader).await;

    // One failure is below the threshold: no outage yet
    wait_for_event(&mut instance.events, "sample:recorded").await;
    assert!(state_store.outages(&id).unwrap().is_empty());

    // The second consecutive failure confirms it
    let event = wait_for_event(&mut instance.events, "outage:started").await;
    match event {
        MonitorEvent::OutageStarted { reason, .. } => assert_eq!(reason, "timeout"),
        other => panic!("unexpected event {other:?}"),
    }
    let outages = state_store.outages(&id).unwrap();
    assert_eq!(outages.len(), 1);
    assert!(outages[0].is_open());
    assert_eq!(
        state_store.channel_state(&id).unwrap().unwrap().status,
        ChannelStatus::Offline
    );

    // The queue is drained; the next probe succeeds and recovers
    wait_for_event(&mut instance.events, "outage:ended").await;
    let outages = state_store.outages(&id).unwrap();
    assert_eq!(outages.len(), 1);
    assert!(!outages[0].is_open());
    assert_eq!(
        state_store.channel_state(&id).unwrap().unwrap().status,
        ChannelStatus::Online
    );
}

#[tokio::test(start_paused = true)]
async fn sample_history_is_recorded_for_every_probe() {
    let clock = FakeClock::new();
    let state_store = StateStore::open_temp().unwrap();
    let id = ChannelId::new("web");

    let mut instance = Instance::spawn(
        "solo",
        Arc::new(MemoryLeaseStore::new()),
        state_store.clone(),
        clock,
        vec![channel("web", 60, 3)],
    );

    wait_for_role(&mut instance.events, Role::Leader).await;
    for _ in 0..3 {
        wait_for_event(&mut instance.events, "sample:recorded").await;
    }

    // Persistence is synchronous with the run that produced the sample
    tokio::time::sleep(Duration::from_millis(10)).await;
    let samples = state_store.samples(&id).unwrap();
    assert!(samples.len() >= 3, "got {} samples", samples.len());
    assert!(samples.iter().all(|s| s.success));
}
