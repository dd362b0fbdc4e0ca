// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Backend Factory - Application Layer
//!
//! Creates concrete backend adapters and artifact resolvers from configuration.
//! Backend selection is an explicit match on [`BackendKind`], keeping the
//! domain layer free of infrastructure types.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Wires a [`DeployerConfigManifest`] into a connected [`DeploymentOrchestrator`]

use anyhow::Context;
use std::sync::Arc;

use crate::application::orchestrator::{DeploymentOrchestrator, OrchestratorSettings};
use crate::application::poller::PollPolicy;
use crate::domain::artifact::{ArtifactResolver, IdentityScheme};
use crate::domain::backend::{BackendAdapter, BackendKind};
use crate::domain::config::{BackendConfig, DeployerConfigManifest, TimeoutConfig};
use crate::domain::management::{ConnectionProvider, ObjectName};
use crate::infrastructure::adapters::{ListingAdapter, NotifyingAdapter};
use crate::infrastructure::artifact::{FileNameResolver, FileUrlResolver};
use crate::infrastructure::localizer::TemplateLocalizer;

/// Creates a BackendAdapter implementation based on the configured backend family
pub fn create_backend(config: &BackendConfig, provider: Arc<dyn ConnectionProvider>) -> Arc<dyn BackendAdapter> {
    let deployer = ObjectName::new(config.deployer.clone());
    match config.backend_type {
        BackendKind::Listing => {
            Arc::new(ListingAdapter::new(provider, deployer).with_match_policy(config.match_policy))
        }
        BackendKind::Notifying => {
            Arc::new(NotifyingAdapter::new(provider, deployer).with_match_policy(config.match_policy))
        }
    }
}

/// Creates an ArtifactResolver implementation based on the configured identity scheme
pub fn create_resolver(scheme: IdentityScheme) -> Arc<dyn ArtifactResolver> {
    match scheme {
        IdentityScheme::FileName => Arc::new(FileNameResolver),
        IdentityScheme::FileUrl => Arc::new(FileUrlResolver),
    }
}

pub fn settings_from(timeouts: &TimeoutConfig) -> OrchestratorSettings {
    OrchestratorSettings {
        progress_timeout: timeouts.progress,
        poll: PollPolicy {
            max_attempts: timeouts.poll_attempts,
            interval: timeouts.poll_interval,
        },
    }
}

/// Validate `config`, open a session against its endpoint and return the orchestrator owning it
pub async fn connect_from_config(
    config: &DeployerConfigManifest,
    provider: Arc<dyn ConnectionProvider>,
) -> anyhow::Result<DeploymentOrchestrator> {
    config.validate()?;

    let spec = &config.spec;
    let endpoint = spec.endpoint.resolve().context("Failed to resolve management endpoint")?;
    let telemetry = spec
        .telemetry
        .as_ref()
        .map(|telemetry| telemetry.resolve())
        .transpose()
        .context("Failed to resolve telemetry endpoint")?;

    let orchestrator = DeploymentOrchestrator::connect(
        create_backend(&spec.backend, provider),
        create_resolver(spec.identity),
        &endpoint,
        telemetry.as_ref(),
        settings_from(&spec.timeouts),
    )
    .await
    .with_context(|| format!("Failed to connect to deployment target '{}'", config.metadata.name))?;

    let localizer = TemplateLocalizer::new().with_catalog(spec.messages.clone());
    Ok(orchestrator.with_localizer(Arc::new(localizer)))
}
