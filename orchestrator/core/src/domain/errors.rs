// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::domain::management::ConnectionError;
use crate::domain::module::ModuleIdentity;

/// One native transition issued against a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStep {
    Distribute,
    Start,
    Stop,
    Remove,
}

impl fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleStep::Distribute => "distribute",
            LifecycleStep::Start => "start",
            LifecycleStep::Stop => "stop",
            LifecycleStep::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// Which listing a poll consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Listing {
    Available,
    Running,
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Listing::Available => f.write_str("available"),
            Listing::Running => f.write_str("running"),
        }
    }
}

/// Why a lifecycle step did not reach its target state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureCause {
    /// The backend explicitly reported failure
    #[error("backend reported failure: {0}")]
    Reported(String),
    /// No terminal progress event arrived within the bound
    #[error("no terminal progress event within {}ms", .waited.as_millis())]
    TimedOut { waited: Duration },
    /// The step completed but the listing never reflected it within the poll bound.
    /// Like `TimedOut`, this means the outcome is unknown rather than failed.
    #[error("{listing} listing did not confirm the transition after {attempts} attempt(s)")]
    NotConfirmed { listing: Listing, attempts: u32 },
    #[error("module is not present on the backend")]
    NotPresent,
    /// Issuing the native call itself failed
    #[error("backend call failed: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ProxyInvocationError {
    #[error("Interface {interface} of {object} has no method '{method}'")]
    UnknownMethod { object: String, interface: String, method: String },
    #[error("Method '{method}' declares {expected} parameter(s) but was called with {actual}")]
    Arity { method: String, expected: usize, actual: usize },
    #[error("Remote call '{method}' on {object} failed: {source}")]
    Remote {
        object: String,
        method: String,
        #[source]
        source: ConnectionError,
    },
    #[error("Result of '{method}' does not match its declared type: {reason}")]
    Coercion { method: String, reason: String },
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Connection failed: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Module {0} is already present; undeploy it before distributing again")]
    DuplicateModule(ModuleIdentity),

    #[error("Deployment of {module} failed at {step}: {cause}")]
    DeploymentFailed { module: ModuleIdentity, step: LifecycleStep, cause: FailureCause },

    #[error("Undeploy of {module} failed at {step}: {cause}")]
    UndeployFailed { module: ModuleIdentity, step: LifecycleStep, cause: FailureCause },

    #[error("Start of {module} failed: {cause}")]
    StartFailed { module: ModuleIdentity, step: LifecycleStep, cause: FailureCause },

    #[error("Stop of {module} failed: {cause}")]
    StopFailed { module: ModuleIdentity, step: LifecycleStep, cause: FailureCause },

    #[error(transparent)]
    Proxy(#[from] ProxyInvocationError),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error("Operation cancelled")]
    Cancelled,
}

impl DeployError {
    /// The failing step, for lifecycle failures
    pub fn step(&self) -> Option<LifecycleStep> {
        match self {
            DeployError::DeploymentFailed { step, .. }
            | DeployError::UndeployFailed { step, .. }
            | DeployError::StartFailed { step, .. }
            | DeployError::StopFailed { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub fn cause(&self) -> Option<&FailureCause> {
        match self {
            DeployError::DeploymentFailed { cause, .. }
            | DeployError::UndeployFailed { cause, .. }
            | DeployError::StartFailed { cause, .. }
            | DeployError::StopFailed { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// True when a bounded wait ran out without success or an explicit
    /// failure: either no terminal progress event or no listing confirmation.
    pub fn is_timed_out(&self) -> bool {
        matches!(
            self.cause(),
            Some(FailureCause::TimedOut { .. } | FailureCause::NotConfirmed { .. })
        )
    }
}
