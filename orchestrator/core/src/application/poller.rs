// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Poll-Reconciler
//!
//! Bounded polling of eventually-consistent module listings.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Confirms a lifecycle transition by re-querying a listing until it reflects the change

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::config::{DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use crate::domain::errors::DeployError;
use crate::domain::module::{MatchPolicy, ModuleIdentity, ModuleSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_POLL_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// How a poll ended and how many listing queries it consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub satisfied: bool,
    pub attempts: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Poller {
    policy: PollPolicy,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy, cancel: CancellationToken::new() }
    }

    /// Abort suspended polls with [`DeployError::Cancelled`] once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Poll until `module` shows up in the listing returned by `query`.
    pub async fn wait_until_present<F, Fut>(
        &self,
        module: &ModuleIdentity,
        policy: MatchPolicy,
        query: F,
    ) -> Result<PollOutcome, DeployError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ModuleSet, DeployError>>,
    {
        self.poll(module, policy, true, query).await
    }

    /// Poll until `module` is gone from the listing returned by `query`.
    pub async fn wait_until_absent<F, Fut>(
        &self,
        module: &ModuleIdentity,
        policy: MatchPolicy,
        query: F,
    ) -> Result<PollOutcome, DeployError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ModuleSet, DeployError>>,
    {
        self.poll(module, policy, false, query).await
    }

    async fn poll<F, Fut>(
        &self,
        module: &ModuleIdentity,
        policy: MatchPolicy,
        want_present: bool,
        mut query: F,
    ) -> Result<PollOutcome, DeployError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ModuleSet, DeployError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let listed = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(DeployError::Cancelled),
                listed = query() => listed?,
            };

            if listed.contains(module, policy) == want_present {
                debug!(module = %module, attempt, want_present, "Listing confirmed transition");
                return Ok(PollOutcome { satisfied: true, attempts: attempt });
            }

            if attempt < max_attempts {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(DeployError::Cancelled),
                    _ = tokio::time::sleep(self.policy.interval) => {}
                }
            }
        }

        debug!(module = %module, attempts = max_attempts, want_present, "Listing poll exhausted");
        Ok(PollOutcome { satisfied: false, attempts: max_attempts })
    }
}
