// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP GET probe: up on any 2xx status
//!
//! ureq is blocking, so the request runs on the blocking thread pool with
//! the channel timeout applied to the whole exchange.

use crate::executor::ProbeOutcome;
use std::time::{Duration, Instant};
use ureq::Agent;

pub async fn probe(url: &str, timeout: Duration) -> ProbeOutcome {
    let url = url.to_string();
    let result = tokio::task::spawn_blocking(move || {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        let started = Instant::now();
        match agent.get(&url).call() {
            Ok(response) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                ProbeOutcome::up(latency_ms).with_details(format!("HTTP {}", response.status()))
            }
            Err(ureq::Error::StatusCode(code)) => ProbeOutcome::down(format!("HTTP {code}")),
            Err(err) => ProbeOutcome::down(err.to_string()),
        }
    })
    .await;

    result.unwrap_or_else(|join_err| ProbeOutcome::down(format!("probe task failed: {join_err}")))
}
