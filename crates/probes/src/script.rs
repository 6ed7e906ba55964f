// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External script probe: up on exit status 0

use crate::executor::{with_deadline, ProbeOutcome};
use std::time::{Duration, Instant};
use tokio::process::Command;

pub async fn probe(command: &str, timeout: Duration) -> ProbeOutcome {
    let started = Instant::now();
    let output = Command::new("sh").arg("-c").arg(command).output();

    match with_deadline(timeout, "script", output).await {
        Ok(Ok(output)) => {
            let latency_ms = started.elapsed().as_millis() as u64;
            if output.status.success() {
                ProbeOutcome::up(latency_ms)
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let code = output
                    .status
                    .code()
                    .map_or("signal".to_string(), |c| c.to_string());
                ProbeOutcome::down(format!("exit {code}"))
                    .with_details(stderr.trim().to_string())
            }
        }
        Ok(Err(err)) => ProbeOutcome::down(format!("failed to run script: {err}")),
        Err(timed_out) => timed_out,
    }
}
