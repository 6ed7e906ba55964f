// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in guard implementations
//!
//! Guards share the probe transports but answer a different question: not
//! "is the target healthy" but "does probing make sense right now".

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::lookup_host;
use tokio::process::Command;
use vigil_core::config::GuardSpec;
use vigil_core::guard::{Guard, GuardError, GuardRegistry};

const GUARD_TIMEOUT: Duration = Duration::from_secs(5);

/// Passes when the configured command exits 0
pub struct ScriptGuard {
    command: String,
}

impl ScriptGuard {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Guard for ScriptGuard {
    async fn check(&self) -> Result<bool, GuardError> {
        let output = Command::new("sh").arg("-c").arg(&self.command).output();
        let output = tokio::time::timeout(GUARD_TIMEOUT, output)
            .await
            .map_err(|_| GuardError::Timeout(GUARD_TIMEOUT))?
            .map_err(|e| GuardError::Evaluation(e.to_string()))?;
        Ok(output.status.success())
    }
}

/// Passes when the hostname resolves to at least one address
pub struct DnsGuard {
    hostname: String,
}

impl DnsGuard {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }
}

#[async_trait]
impl Guard for DnsGuard {
    async fn check(&self) -> Result<bool, GuardError> {
        let lookup = lookup_host((self.hostname.as_str(), 0u16));
        match tokio::time::timeout(GUARD_TIMEOUT, lookup).await {
            Ok(Ok(mut addrs)) => Ok(addrs.next().is_some()),
            // Resolution failure is a negative answer, not an evaluation error
            Ok(Err(_)) => Ok(false),
            Err(_) => Err(GuardError::Timeout(GUARD_TIMEOUT)),
        }
    }
}

/// Build a registry from the `[guards]` section of the config
pub fn build_registry(specs: &HashMap<String, GuardSpec>) -> GuardRegistry {
    let mut registry = GuardRegistry::new();
    for (name, spec) in specs {
        let guard: Arc<dyn Guard> = match spec {
            GuardSpec::Script { command } => Arc::new(ScriptGuard::new(command.clone())),
            GuardSpec::DnsResolves { hostname } => Arc::new(DnsGuard::new(hostname.clone())),
        };
        registry.register(name.clone(), guard);
    }
    registry
}
