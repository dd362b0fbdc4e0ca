// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Module
//!
//! Identity, listing and status types for deployed artifacts.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Names a deployed artifact and derives its lifecycle state from backend listings

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Key of one deployed artifact within a backend's target set.
///
/// Derived from the artifact path by an [`ArtifactResolver`](crate::domain::artifact::ArtifactResolver);
/// stable for as long as the artifact stays deployed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleIdentity(String);

impl ModuleIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// How a listed name is compared against a [`ModuleIdentity`].
///
/// `Exact` is the default. `Substring` exists for backends whose listing
/// renders names differently from the identity we derive (for example a
/// full URL listed for a file-name identity) and must be enabled per backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    #[default]
    Exact,
    Substring,
}

impl MatchPolicy {
    pub fn matches(self, listed: &str, module: &ModuleIdentity) -> bool {
        match self {
            MatchPolicy::Exact => listed == module.as_str(),
            MatchPolicy::Substring => listed.contains(module.as_str()),
        }
    }
}

/// Result of one listing query against a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSet(BTreeSet<String>);

impl ModuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    pub fn contains(&self, module: &ModuleIdentity, policy: MatchPolicy) -> bool {
        match policy {
            MatchPolicy::Exact => self.0.contains(module.as_str()),
            MatchPolicy::Substring => self.0.iter().any(|listed| policy.matches(listed, module)),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for ModuleSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for ModuleSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

/// Ordered deployment targets (server instances or clusters) of one session.
///
/// Resolved once when the session is opened and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetSet(Vec<String>);

impl TargetSet {
    pub fn new(targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(targets.into_iter().map(Into::into).collect())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Where an artifact lives and how the backend should be told about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    pub module: ModuleIdentity,
    pub path: PathBuf,
    /// `file:` URL handed to the backend on distribution
    pub uri: String,
}

/// Lifecycle state of a module as seen by a fresh listing query.
///
/// Never cached: every call recomputes it, since listings may be eventually
/// consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    NotPresent,
    Available,
    Running,
    Transitioning,
    Failed,
}

impl DeploymentStatus {
    /// Derive the status from one round of listings.
    ///
    /// An in-flight mutating operation wins over anything the listings say.
    pub fn derive(
        module: &ModuleIdentity,
        policy: MatchPolicy,
        available: &ModuleSet,
        running: &ModuleSet,
        failed: &ModuleSet,
        transitioning: bool,
    ) -> Self {
        if transitioning {
            DeploymentStatus::Transitioning
        } else if failed.contains(module, policy) {
            DeploymentStatus::Failed
        } else if running.contains(module, policy) {
            DeploymentStatus::Running
        } else if available.contains(module, policy) {
            DeploymentStatus::Available
        } else {
            DeploymentStatus::NotPresent
        }
    }

    pub fn is_present(self) -> bool {
        !matches!(self, DeploymentStatus::NotPresent)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentStatus::NotPresent => "NOT_PRESENT",
            DeploymentStatus::Available => "AVAILABLE",
            DeploymentStatus::Running => "RUNNING",
            DeploymentStatus::Transitioning => "TRANSITIONING",
            DeploymentStatus::Failed => "FAILED",
        };
        f.write_str(name)
    }
}
