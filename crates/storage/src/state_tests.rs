// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use vigil_core::channel::ChannelStatus;

fn sample(t: u64, success: bool) -> Sample {
    if success {
        Sample::ok(t, 10)
    } else {
        Sample::failed(t, "down")
    }
}

fn outage(channel: &str, first: u64) -> Outage {
    Outage {
        channel_id: ChannelId::new(channel),
        first_failure_ms: first,
        confirmed_at_ms: first + 2_000,
        end_ms: None,
        reason: "down".to_string(),
    }
}

#[test]
fn channel_state_roundtrips() {
    let store = StateStore::open_temp().unwrap();
    let id = ChannelId::new("web");

    assert!(store.channel_state(&id).unwrap().is_none());

    let state = ChannelState::new(id.clone());
    store.set_channel_state(&state).unwrap();

    let loaded = store.channel_state(&id).unwrap().unwrap();
    assert_eq!(loaded.status, ChannelStatus::Unknown);
    assert_eq!(loaded.id, id);
}

#[test]
fn channel_ids_lists_persisted_channels() {
    let store = StateStore::open_temp().unwrap();
    store
        .set_channel_state(&ChannelState::new(ChannelId::new("a")))
        .unwrap();
    store
        .set_channel_state(&ChannelState::new(ChannelId::new("b")))
        .unwrap();

    let mut ids: Vec<String> = store.channel_ids().unwrap().into_iter().map(|i| i.0).collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn sample_history_is_bounded() {
    let store = StateStore::open_temp().unwrap().with_history_cap(3);
    let id = ChannelId::new("web");

    for t in 1..=5u64 {
        store.append_sample(&id, &sample(t * 1_000, true)).unwrap();
    }

    let history = store.samples(&id).unwrap();
    assert_eq!(history.len(), 3);
    // Oldest entries were dropped
    assert_eq!(history[0].taken_at_ms, 3_000);
    assert_eq!(history[2].taken_at_ms, 5_000);
}

#[test]
fn outage_opens_and_closes() {
    let store = StateStore::open_temp().unwrap();
    let id = ChannelId::new("web");
    store
        .set_channel_state(&ChannelState::new(id.clone()))
        .unwrap();

    store.open_outage(&outage("web", 1_000)).unwrap();
    assert_eq!(store.open_outages().unwrap().len(), 1);

    assert!(store.close_outage(&id, 9_000).unwrap());
    assert!(store.open_outages().unwrap().is_empty());

    let outages = store.outages(&id).unwrap();
    assert_eq!(outages.len(), 1);
    assert_eq!(outages[0].end_ms, Some(9_000));
}

#[test]
fn closing_without_open_outage_is_a_noop() {
    let store = StateStore::open_temp().unwrap();
    assert!(!store.close_outage(&ChannelId::new("web"), 9_000).unwrap());
}

#[test]
fn close_targets_the_latest_open_outage() {
    let store = StateStore::open_temp().unwrap();
    let id = ChannelId::new("web");

    let mut first = outage("web", 1_000);
    first.end_ms = Some(5_000);
    store.open_outage(&first).unwrap();
    store.open_outage(&outage("web", 10_000)).unwrap();

    assert!(store.close_outage(&id, 20_000).unwrap());

    let outages = store.outages(&id).unwrap();
    assert_eq!(outages[0].end_ms, Some(5_000));
    assert_eq!(outages[1].end_ms, Some(20_000));
}
