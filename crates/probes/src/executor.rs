// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The probe execution seam
//!
//! Every protocol reduces to a uniform `ProbeOutcome`; transport errors,
//! timeouts, and bad statuses are all just failed outcomes. The executor
//! never returns an error and enforces the channel's timeout itself.

use async_trait::async_trait;
use std::time::Duration;
use vigil_core::channel::{ChannelDefinition, ProbeKind, Sample};

/// The normalized result of one probe attempt
#[derive(Clone, Debug, PartialEq)]
pub struct ProbeOutcome {
    pub success: bool,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
    pub details: Option<String>,
}

impl ProbeOutcome {
    pub fn up(latency_ms: u64) -> Self {
        Self {
            success: true,
            latency_ms: Some(latency_ms),
            error: None,
            details: None,
        }
    }

    pub fn down(error: impl Into<String>) -> Self {
        Self {
            success: false,
            latency_ms: None,
            error: Some(error.into()),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Stamp the outcome into a persistable sample
    pub fn into_sample(self, taken_at_ms: u64) -> Sample {
        Sample {
            taken_at_ms,
            success: self.success,
            latency_ms: self.latency_ms,
            error: self.error,
            details: self.details,
        }
    }
}

/// Executes one probe attempt for a channel
#[async_trait]
pub trait ProbeExecutor: Send + Sync {
    async fn execute(&self, definition: &ChannelDefinition) -> ProbeOutcome;
}

/// Dispatches to the protocol implementations by probe kind
#[derive(Clone, Default)]
pub struct StandardExecutor;

impl StandardExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProbeExecutor for StandardExecutor {
    async fn execute(&self, definition: &ChannelDefinition) -> ProbeOutcome {
        let timeout = definition.timeout;
        let outcome = match &definition.probe {
            ProbeKind::Http { url } => crate::http::probe(url, timeout).await,
            ProbeKind::Tcp { host, port } => crate::tcp::probe(host, *port, timeout).await,
            ProbeKind::Dns { hostname } => crate::dns::probe(hostname, timeout).await,
            ProbeKind::Script { command } => crate::script::probe(command, timeout).await,
        };
        if !outcome.success {
            tracing::debug!(
                channel = %definition.id,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "probe failed"
            );
        }
        outcome
    }
}

/// Bounded wait helper shared by the async protocol probes
pub(crate) async fn with_deadline<F>(
    timeout: Duration,
    what: &str,
    fut: F,
) -> Result<F::Output, ProbeOutcome>
where
    F: std::future::Future,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| ProbeOutcome::down(format!("{what} timed out after {timeout:?}")))
}
