// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::errors::DeployError;
use crate::domain::module::{ArtifactLocation, ModuleIdentity};

/// How module identities are derived from artifact paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityScheme {
    /// The artifact's file name, e.g. `app1.ear`
    #[default]
    FileName,
    /// The artifact's absolute `file:` URL
    FileUrl,
}

/// Turns an artifact path into the identity a backend lists it under.
///
/// The derivation is backend specific, so the orchestrator takes it as a
/// pluggable collaborator.
pub trait ArtifactResolver: Send + Sync {
    fn scheme(&self) -> IdentityScheme;

    /// Identity only; the artifact does not need to exist
    fn identity(&self, path: &Path) -> Result<ModuleIdentity, DeployError>;

    /// Identity plus a readable location; fails if the artifact cannot be read
    fn locate(&self, path: &Path) -> Result<ArtifactLocation, DeployError>;
}
