// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Management
//!
//! Domain interface for reaching a backend's management layer.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption boundary between lifecycle logic and remote management protocols
//!
//! Every backend exposes named managed objects that have readable attributes,
//! invocable operations and (sometimes) a notification stream. Wire protocols
//! live behind [`ManagementConnection`] implementations in the infrastructure layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

/// Name of a remote managed object, e.g. `jboss.system:service=MainDeployer`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectName(String);

impl ObjectName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolved connection descriptor for one management endpoint.
#[derive(Clone)]
pub struct Endpoint {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub connect_timeout: Duration,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// A notification emitted by a managed object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub source: ObjectName,
    /// Notification type, e.g. `deployment.completed`
    pub kind: String,
    pub sequence: u64,
    pub message: String,
    #[serde(default)]
    pub user_data: serde_json::Value,
}

pub type NotificationStream = broadcast::Receiver<Notification>;

#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    #[error("Failed to reach management endpoint {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },
    #[error("Authentication rejected by {0}")]
    Authentication(String),
    #[error("Remote call failed: {0}")]
    Remote(String),
    #[error("Managed object or attribute not found: {0}")]
    NotFound(String),
    #[error("Not supported by this connection: {0}")]
    Unsupported(String),
    #[error("Connection is closed")]
    Closed,
}

/// An open connection to one backend's management layer.
#[async_trait]
pub trait ManagementConnection: Send + Sync {
    async fn get_attribute(
        &self,
        object: &ObjectName,
        attribute: &str,
    ) -> Result<serde_json::Value, ConnectionError>;

    /// Invoke `operation` with `arguments`; `signature` lists the declared parameter type names in order
    async fn invoke(
        &self,
        object: &ObjectName,
        operation: &str,
        arguments: Vec<serde_json::Value>,
        signature: Vec<String>,
    ) -> Result<serde_json::Value, ConnectionError>;

    /// Subscribe to notifications emitted by `object`
    async fn subscribe(&self, object: &ObjectName) -> Result<NotificationStream, ConnectionError>;

    /// Release the connection. Closing twice is not an error.
    async fn close(&self) -> Result<(), ConnectionError>;
}

/// Opens management connections for a backend-specific endpoint.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn ManagementConnection>, ConnectionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_debug_redacts_password() {
        let endpoint = Endpoint::new("http://localhost:8778/jolokia").with_credentials("admin", "s3cret");
        let rendered = format!("{:?}", endpoint);
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("s3cret"));
    }
}
