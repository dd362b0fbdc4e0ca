// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde_json::{json, Value};
use std::sync::Arc;

use crate::domain::errors::ProxyInvocationError;
use crate::domain::management::{ManagementConnection, ObjectName};
use crate::domain::module::{ArtifactLocation, ModuleIdentity, ModuleSet, TargetSet};
use crate::infrastructure::proxy::{CapabilityInterface, ManagedObjectProxy};

const STRING: &str = "java.lang.String";
const STRING_ARRAY: &str = "[Ljava.lang.String;";

/// Capability interface every supported deployer object exposes.
pub fn deployer_interface() -> CapabilityInterface {
    CapabilityInterface::new("Deployer")
        .method("getAvailableModules", &[])
        .method("getRunningModules", &[])
        .method("getFailedModules", &[])
        .method("getTargets", &[])
        .method("distribute", &[STRING, STRING_ARRAY])
        .method("start", &[STRING])
        .method("stop", &[STRING])
        .method("undeploy", &[STRING])
}

/// Typed calls against a backend's deployer object.
pub struct DeployerClient {
    proxy: ManagedObjectProxy,
}

impl DeployerClient {
    pub fn new(connection: Arc<dyn ManagementConnection>, deployer: ObjectName) -> Self {
        Self {
            proxy: ManagedObjectProxy::new(connection, deployer, &deployer_interface()),
        }
    }

    pub async fn available_modules(&self) -> Result<ModuleSet, ProxyInvocationError> {
        self.proxy.call_as::<Vec<String>>("getAvailableModules", vec![]).await.map(ModuleSet::from_iter)
    }

    pub async fn running_modules(&self) -> Result<ModuleSet, ProxyInvocationError> {
        self.proxy.call_as::<Vec<String>>("getRunningModules", vec![]).await.map(ModuleSet::from_iter)
    }

    pub async fn failed_modules(&self) -> Result<ModuleSet, ProxyInvocationError> {
        self.proxy.call_as::<Vec<String>>("getFailedModules", vec![]).await.map(ModuleSet::from_iter)
    }

    pub async fn targets(&self) -> Result<TargetSet, ProxyInvocationError> {
        self.proxy.call_as::<Vec<String>>("getTargets", vec![]).await.map(TargetSet::new)
    }

    pub async fn distribute(
        &self,
        artifact: &ArtifactLocation,
        targets: &TargetSet,
    ) -> Result<Value, ProxyInvocationError> {
        self.proxy
            .call("distribute", vec![json!(artifact.uri), json!(targets.as_slice())])
            .await
    }

    pub async fn start(&self, module: &ModuleIdentity) -> Result<Value, ProxyInvocationError> {
        self.proxy.call("start", vec![json!(module.as_str())]).await
    }

    pub async fn stop(&self, module: &ModuleIdentity) -> Result<Value, ProxyInvocationError> {
        self.proxy.call("stop", vec![json!(module.as_str())]).await
    }

    pub async fn undeploy(&self, module: &ModuleIdentity) -> Result<Value, ProxyInvocationError> {
        self.proxy.call("undeploy", vec![json!(module.as_str())]).await
    }
}
