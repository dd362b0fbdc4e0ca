// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::path::{Path, PathBuf};
use url::Url;

use crate::domain::artifact::{ArtifactResolver, IdentityScheme};
use crate::domain::errors::DeployError;
use crate::domain::module::{ArtifactLocation, ModuleIdentity};

fn absolute(path: &Path) -> Result<PathBuf, DeployError> {
    std::path::absolute(path)
        .map_err(|e| DeployError::Artifact(format!("cannot resolve {}: {}", path.display(), e)))
}

fn file_url(path: &Path) -> Result<String, DeployError> {
    let absolute = absolute(path)?;
    Url::from_file_path(&absolute)
        .map(String::from)
        .map_err(|_| DeployError::Artifact(format!("{} cannot be expressed as a file URL", absolute.display())))
}

fn ensure_readable(path: &Path) -> Result<(), DeployError> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Ok(()),
        Ok(_) => Err(DeployError::Artifact(format!("{} is not a file", path.display()))),
        Err(e) => Err(DeployError::Artifact(format!("cannot read {}: {}", path.display(), e))),
    }
}

/// Identifies modules by their archive file name, e.g. `app1.ear`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileNameResolver;

impl ArtifactResolver for FileNameResolver {
    fn scheme(&self) -> IdentityScheme {
        IdentityScheme::FileName
    }

    fn identity(&self, path: &Path) -> Result<ModuleIdentity, DeployError> {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(ModuleIdentity::new)
            .ok_or_else(|| DeployError::Artifact(format!("{} has no usable file name", path.display())))
    }

    fn locate(&self, path: &Path) -> Result<ArtifactLocation, DeployError> {
        ensure_readable(path)?;
        Ok(ArtifactLocation {
            module: self.identity(path)?,
            path: absolute(path)?,
            uri: file_url(path)?,
        })
    }
}

/// Identifies modules by the artifact's absolute `file:` URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileUrlResolver;

impl ArtifactResolver for FileUrlResolver {
    fn scheme(&self) -> IdentityScheme {
        IdentityScheme::FileUrl
    }

    fn identity(&self, path: &Path) -> Result<ModuleIdentity, DeployError> {
        file_url(path).map(ModuleIdentity::new)
    }

    fn locate(&self, path: &Path) -> Result<ArtifactLocation, DeployError> {
        ensure_readable(path)?;
        let uri = file_url(path)?;
        Ok(ArtifactLocation {
            module: ModuleIdentity::new(uri.clone()),
            path: absolute(path)?,
            uri,
        })
    }
}
