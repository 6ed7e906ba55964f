// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP connect probe: up when the connection is accepted

use crate::executor::{with_deadline, ProbeOutcome};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

pub async fn probe(host: &str, port: u16, timeout: Duration) -> ProbeOutcome {
    let started = Instant::now();
    match with_deadline(timeout, "connect", TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => {
            let latency_ms = started.elapsed().as_millis() as u64;
            ProbeOutcome::up(latency_ms).with_details(format!("connected to {host}:{port}"))
        }
        Ok(Err(err)) => ProbeOutcome::down(err.to_string()),
        Err(timed_out) => timed_out,
    }
}
