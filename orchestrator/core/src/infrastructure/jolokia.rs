// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Jolokia Management Connection
//!
//! JSON-over-HTTP bridge to a backend's managed objects.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Concrete [`ManagementConnection`] for backends fronted by a Jolokia agent
//! - **Integration:** Deployer proxy → HTTP POST → Jolokia agent → managed object
//!
//! Jolokia is request/response only, so notification subscriptions are
//! reported as unsupported; pair it with the listing adapter.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::domain::management::{
    ConnectionError, ConnectionProvider, Endpoint, ManagementConnection, NotificationStream, ObjectName,
};

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum JolokiaRequest<'a> {
    Read {
        mbean: &'a str,
        attribute: &'a str,
    },
    Exec {
        mbean: &'a str,
        operation: String,
        arguments: Vec<Value>,
    },
    Version,
}

#[derive(Debug, Deserialize)]
struct JolokiaResponse {
    #[serde(default)]
    value: Value,
    status: u16,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_type: Option<String>,
}

pub struct JolokiaConnection {
    url: String,
    username: Option<String>,
    password: Option<String>,
    client: Client,
    closed: AtomicBool,
}

impl JolokiaConnection {
    pub fn new(endpoint: &Endpoint) -> Result<Self, ConnectionError> {
        let client = Client::builder()
            .connect_timeout(endpoint.connect_timeout)
            .build()
            .map_err(|e| ConnectionError::Unreachable {
                endpoint: endpoint.url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            url: endpoint.url.clone(),
            username: endpoint.username.clone(),
            password: endpoint.password.clone(),
            client,
            closed: AtomicBool::new(false),
        })
    }

    /// Agent version, used as a liveness probe on connect
    pub async fn version(&self) -> Result<Value, ConnectionError> {
        self.execute(&JolokiaRequest::Version).await
    }

    async fn execute(&self, request: &JolokiaRequest<'_>) -> Result<Value, ConnectionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConnectionError::Closed);
        }

        let mut builder = self.client.post(&self.url).json(request);
        if let Some(username) = &self.username {
            builder = builder.basic_auth(username, self.password.as_deref());
        }

        let response = builder.send().await.map_err(|e| ConnectionError::Unreachable {
            endpoint: self.url.clone(),
            reason: e.to_string(),
        })?;

        if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(ConnectionError::Authentication(self.url.clone()));
        }

        let body: JolokiaResponse = response
            .json()
            .await
            .map_err(|e| ConnectionError::Remote(format!("malformed Jolokia response: {}", e)))?;

        let describe = |body: &JolokiaResponse| match (&body.error_type, &body.error) {
            (Some(kind), Some(error)) => format!("{}: {}", kind, error),
            (_, Some(error)) => error.clone(),
            _ => format!("status {}", body.status),
        };

        match body.status {
            200 => Ok(body.value),
            404 => Err(ConnectionError::NotFound(describe(&body))),
            401 | 403 => Err(ConnectionError::Authentication(self.url.clone())),
            _ => Err(ConnectionError::Remote(describe(&body))),
        }
    }
}

#[async_trait]
impl ManagementConnection for JolokiaConnection {
    async fn get_attribute(&self, object: &ObjectName, attribute: &str) -> Result<Value, ConnectionError> {
        self.execute(&JolokiaRequest::Read { mbean: object.as_str(), attribute })
            .await
    }

    async fn invoke(
        &self,
        object: &ObjectName,
        operation: &str,
        arguments: Vec<Value>,
        signature: Vec<String>,
    ) -> Result<Value, ConnectionError> {
        // The signature disambiguates overloaded operations
        let operation = format!("{}({})", operation, signature.join(","));
        debug!(object = %object, operation = %operation, "Jolokia exec");
        self.execute(&JolokiaRequest::Exec { mbean: object.as_str(), operation, arguments })
            .await
    }

    async fn subscribe(&self, object: &ObjectName) -> Result<NotificationStream, ConnectionError> {
        Err(ConnectionError::Unsupported(format!(
            "notifications from {} over Jolokia",
            object
        )))
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(url = %self.url, "Jolokia connection closed");
        }
        Ok(())
    }
}

/// Opens [`JolokiaConnection`]s and probes the agent before handing them out.
#[derive(Debug, Default, Clone)]
pub struct JolokiaConnectionProvider;

impl JolokiaConnectionProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConnectionProvider for JolokiaConnectionProvider {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn ManagementConnection>, ConnectionError> {
        let connection = JolokiaConnection::new(endpoint)?;
        let version = connection.version().await?;
        debug!(url = %endpoint.url, agent = ?version.get("agent"), "Connected to Jolokia agent");
        Ok(Arc::new(connection))
    }
}
