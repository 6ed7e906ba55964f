// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DNS resolution probe: up when the name resolves to at least one address

use crate::executor::{with_deadline, ProbeOutcome};
use std::time::{Duration, Instant};
use tokio::net::lookup_host;

pub async fn probe(hostname: &str, timeout: Duration) -> ProbeOutcome {
    let started = Instant::now();
    // lookup_host wants a port; it plays no role in resolution
    match with_deadline(timeout, "resolution", lookup_host((hostname, 0u16))).await {
        Ok(Ok(addrs)) => {
            let count = addrs.count();
            let latency_ms = started.elapsed().as_millis() as u64;
            if count > 0 {
                ProbeOutcome::up(latency_ms).with_details(format!("{count} address(es)"))
            } else {
                ProbeOutcome::down(format!("{hostname} resolved to no addresses"))
            }
        }
        Ok(Err(err)) => ProbeOutcome::down(err.to_string()),
        Err(timed_out) => timed_out,
    }
}
