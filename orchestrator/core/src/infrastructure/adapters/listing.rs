// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::backend::{BackendAdapter, BackendKind, ModuleLister};
use crate::domain::errors::DeployError;
use crate::domain::management::{ConnectionProvider, Endpoint, ManagementConnection, ObjectName};
use crate::domain::module::{ArtifactLocation, MatchPolicy, ModuleIdentity, ModuleSet, TargetSet};
use crate::domain::progress::ProgressHandle;
use crate::domain::session::Session;
use crate::infrastructure::adapters::{open_session, DeployerLister};
use crate::infrastructure::deployer::DeployerClient;

/// Adapter for backends whose deployer operations block until done.
///
/// Completion is synthesized once the call returns; whether the transition
/// actually took effect is established by polling the listings.
pub struct ListingAdapter {
    provider: Arc<dyn ConnectionProvider>,
    lister: DeployerLister,
    match_policy: MatchPolicy,
}

impl ListingAdapter {
    pub fn new(provider: Arc<dyn ConnectionProvider>, deployer: ObjectName) -> Self {
        Self { provider, lister: DeployerLister::new(deployer), match_policy: MatchPolicy::Exact }
    }

    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }

    fn client(&self, connection: &Arc<dyn ManagementConnection>) -> DeployerClient {
        self.lister.client(connection)
    }
}

#[async_trait]
impl ModuleLister for ListingAdapter {
    async fn list_available(&self, session: &Session) -> Result<ModuleSet, DeployError> {
        self.lister.available(session).await
    }

    async fn list_running(&self, session: &Session) -> Result<ModuleSet, DeployError> {
        self.lister.running(session).await
    }

    async fn list_failed(&self, session: &Session) -> Result<ModuleSet, DeployError> {
        self.lister.failed(session).await
    }
}

#[async_trait]
impl BackendAdapter for ListingAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Listing
    }

    fn match_policy(&self) -> MatchPolicy {
        self.match_policy
    }

    async fn connect(&self, endpoint: &Endpoint, telemetry: Option<&Endpoint>) -> Result<Session, DeployError> {
        open_session(self.provider.as_ref(), self.lister.deployer(), endpoint, telemetry).await
    }

    async fn distribute(
        &self,
        session: &Session,
        artifact: &ArtifactLocation,
        targets: &TargetSet,
    ) -> Result<ProgressHandle, DeployError> {
        self.client(session.management()).distribute(artifact, targets).await?;
        Ok(ProgressHandle::completed(Some(artifact.module.clone()), "distribute returned"))
    }

    async fn start(&self, session: &Session, module: &ModuleIdentity) -> Result<ProgressHandle, DeployError> {
        self.client(session.management()).start(module).await?;
        Ok(ProgressHandle::completed(Some(module.clone()), "start returned"))
    }

    async fn stop(&self, session: &Session, module: &ModuleIdentity) -> Result<ProgressHandle, DeployError> {
        self.client(session.management()).stop(module).await?;
        Ok(ProgressHandle::completed(Some(module.clone()), "stop returned"))
    }

    async fn undeploy(&self, session: &Session, module: &ModuleIdentity) -> Result<ProgressHandle, DeployError> {
        self.client(session.management()).undeploy(module).await?;
        Ok(ProgressHandle::completed(Some(module.clone()), "undeploy returned"))
    }
}
