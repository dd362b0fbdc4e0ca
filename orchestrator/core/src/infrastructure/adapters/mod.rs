// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Backend Adapters
//!
//! Concrete [`BackendAdapter`](crate::domain::backend::BackendAdapter) implementations, one per completion model.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Translate lifecycle primitives into deployer-object calls
//!
//! Adapters hold no lifecycle logic. Waiting, confirmation and sequencing
//! all happen in the orchestrator.

pub mod listing;
pub mod notifying;

pub use listing::ListingAdapter;
pub use notifying::NotifyingAdapter;

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::errors::{DeployError, ProxyInvocationError};
use crate::domain::management::{ConnectionError, ConnectionProvider, Endpoint, ManagementConnection, ObjectName};
use crate::domain::module::ModuleSet;
use crate::domain::session::Session;
use crate::infrastructure::deployer::DeployerClient;

/// Listing reads shared by every adapter; all go over the session's listing connection.
pub(crate) struct DeployerLister {
    deployer: ObjectName,
}

impl DeployerLister {
    pub(crate) fn new(deployer: ObjectName) -> Self {
        Self { deployer }
    }

    pub(crate) fn deployer(&self) -> &ObjectName {
        &self.deployer
    }

    pub(crate) fn client(&self, connection: &Arc<dyn ManagementConnection>) -> DeployerClient {
        DeployerClient::new(connection.clone(), self.deployer.clone())
    }

    pub(crate) async fn available(&self, session: &Session) -> Result<ModuleSet, DeployError> {
        Ok(self.client(session.listing_connection()).available_modules().await?)
    }

    pub(crate) async fn running(&self, session: &Session) -> Result<ModuleSet, DeployError> {
        Ok(self.client(session.listing_connection()).running_modules().await?)
    }

    /// Backends without a failed-module listing report an empty set. Any other error propagates.
    pub(crate) async fn failed(&self, session: &Session) -> Result<ModuleSet, DeployError> {
        match self.client(session.listing_connection()).failed_modules().await {
            Ok(failed) => Ok(failed),
            Err(ProxyInvocationError::Remote {
                source: source @ (ConnectionError::NotFound(_) | ConnectionError::Unsupported(_)),
                ..
            }) => {
                debug!(deployer = %self.deployer, error = %source, "No failed-module listing");
                Ok(ModuleSet::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Open the management (and optional telemetry) connection and resolve the target set.
///
/// Any connection already opened is closed again if a later step fails.
pub(crate) async fn open_session(
    provider: &dyn ConnectionProvider,
    deployer: &ObjectName,
    endpoint: &Endpoint,
    telemetry: Option<&Endpoint>,
) -> Result<Session, DeployError> {
    let management = provider.connect(endpoint).await?;

    let telemetry = match telemetry {
        Some(telemetry_endpoint) => match provider.connect(telemetry_endpoint).await {
            Ok(connection) => Some(connection),
            Err(e) => {
                release(&management).await;
                return Err(e.into());
            }
        },
        None => None,
    };

    let listing = telemetry.clone().unwrap_or_else(|| management.clone());
    let targets = match DeployerClient::new(listing, deployer.clone()).targets().await {
        Ok(targets) => targets,
        Err(e) => {
            if let Some(connection) = &telemetry {
                release(connection).await;
            }
            release(&management).await;
            return Err(DeployError::Connection(ConnectionError::Remote(format!(
                "failed to resolve deployment targets of {}: {}",
                deployer, e
            ))));
        }
    };

    let session = Session::new(management, telemetry, targets);
    info!(
        session_id = %session.id(),
        endpoint = %endpoint.url,
        targets = session.targets().len(),
        "Session opened"
    );
    Ok(session)
}

async fn release(connection: &Arc<dyn ManagementConnection>) {
    if let Err(e) = connection.close().await {
        warn!(error = %e, "Failed to close connection after aborted connect");
    }
}
