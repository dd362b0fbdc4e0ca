// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::DeployError;
use crate::domain::management::Endpoint;
use crate::domain::module::{ArtifactLocation, MatchPolicy, ModuleIdentity, ModuleSet, TargetSet};
use crate::domain::progress::ProgressHandle;
use crate::domain::session::Session;

/// Completion model of a backend family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Mutations are blocking calls; truth comes from polling listings
    Listing,
    /// Mutations complete through asynchronous progress notifications
    Notifying,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Listing => f.write_str("listing"),
            BackendKind::Notifying => f.write_str("notifying"),
        }
    }
}

/// Listing queries against a backend. Results are never cached.
#[async_trait]
pub trait ModuleLister: Send + Sync {
    async fn list_available(&self, session: &Session) -> Result<ModuleSet, DeployError>;

    async fn list_running(&self, session: &Session) -> Result<ModuleSet, DeployError>;

    /// Modules the backend reports as failed. Backends without such a listing report none.
    async fn list_failed(&self, _session: &Session) -> Result<ModuleSet, DeployError> {
        Ok(ModuleSet::new())
    }
}

/// Native lifecycle primitives of one backend family.
///
/// Implementations translate calls into the backend's API and carry no
/// lifecycle logic of their own; sequencing, waiting and confirmation belong
/// to the orchestrator.
#[async_trait]
pub trait BackendAdapter: ModuleLister {
    fn kind(&self) -> BackendKind;

    fn match_policy(&self) -> MatchPolicy {
        MatchPolicy::Exact
    }

    /// Open a session and resolve its target set
    async fn connect(&self, endpoint: &Endpoint, telemetry: Option<&Endpoint>) -> Result<Session, DeployError>;

    async fn distribute(
        &self,
        session: &Session,
        artifact: &ArtifactLocation,
        targets: &TargetSet,
    ) -> Result<ProgressHandle, DeployError>;

    async fn start(&self, session: &Session, module: &ModuleIdentity) -> Result<ProgressHandle, DeployError>;

    async fn stop(&self, session: &Session, module: &ModuleIdentity) -> Result<ProgressHandle, DeployError>;

    async fn undeploy(&self, session: &Session, module: &ModuleIdentity) -> Result<ProgressHandle, DeployError>;

    async fn is_running(&self, session: &Session, module: &ModuleIdentity) -> Result<bool, DeployError> {
        Ok(self.list_running(session).await?.contains(module, self.match_policy()))
    }
}
