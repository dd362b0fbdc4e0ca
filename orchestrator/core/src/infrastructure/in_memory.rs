// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-Memory Management Server
//!
//! A simulated backend that speaks [`ManagementConnection`] without any network.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Test double and dry-run backend for both completion models
//!
//! The server exposes one deployer object with the attributes
//! `AvailableModules`, `RunningModules`, `FailedModules` and `Targets`, and
//! the operations `distribute`, `start`, `stop` and `undeploy`. It can
//! complete operations synchronously or through delayed notifications, lag
//! its listings behind mutations, and fail or swallow chosen operations.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::management::{
    ConnectionError, ConnectionProvider, Endpoint, ManagementConnection, Notification, NotificationStream,
    ObjectName,
};
use crate::infrastructure::adapters::notifying::{NOTIFICATION_COMPLETED, NOTIFICATION_FAILED};

const NOTIFICATION_PROGRESS: &str = "deployment.progress";

/// How the server reports completion of a mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionModel {
    /// The invoke applies the change and returns when done
    Synchronous,
    /// The invoke returns an operation id; the change lands after `delay` and is announced by notification
    Notifications { delay: Duration },
}

/// How distributed artifacts show up in the listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingNaming {
    /// Last path segment of the distributed URI, e.g. `app1.ear`
    FileName,
    /// The distributed URI itself, e.g. `file:/opt/apps/app1.ear`
    Url,
}

impl ListingNaming {
    fn render(self, uri: &str) -> String {
        match self {
            ListingNaming::FileName => uri.rsplit('/').next().unwrap_or(uri).to_string(),
            ListingNaming::Url => uri.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub operation: String,
    pub arguments: Vec<Value>,
}

#[derive(Default)]
struct ServerState {
    available: BTreeSet<String>,
    running: BTreeSet<String>,
    failed: BTreeSet<String>,
    stale_available: BTreeSet<String>,
    stale_running: BTreeSet<String>,
    stale_reads: u32,
    calls: Vec<RecordedCall>,
    failing: HashMap<String, String>,
    silent: HashSet<String>,
    next_operation: u64,
    sequence: u64,
}

impl ServerState {
    /// Listed entry that `name` refers to: the entry itself or one ending in `/<name>`
    fn resolve(&self, name: &str) -> Option<String> {
        let suffix = format!("/{}", name);
        self.available
            .iter()
            .chain(self.running.iter())
            .find(|listed| listed.as_str() == name || listed.ends_with(&suffix))
            .cloned()
    }

    fn apply(&mut self, naming: ListingNaming, lag: u32, operation: &str, arguments: &[Value]) -> Result<(), String> {
        let subject = arguments.first().and_then(Value::as_str).unwrap_or_default().to_string();

        if self.stale_reads == 0 {
            self.stale_available = self.available.clone();
            self.stale_running = self.running.clone();
        }

        match operation {
            "distribute" => {
                let name = naming.render(&subject);
                if self.available.contains(&name) {
                    return Err(format!("module {} is already deployed", name));
                }
                self.failed.remove(&name);
                self.available.insert(name);
            }
            "start" => {
                let name = self.resolve(&subject).ok_or_else(|| format!("no such module: {}", subject))?;
                self.running.insert(name);
            }
            "stop" => {
                let name = self.resolve(&subject).ok_or_else(|| format!("no such module: {}", subject))?;
                if !self.running.remove(&name) {
                    return Err(format!("module {} is not running", name));
                }
            }
            "undeploy" => {
                let name = self.resolve(&subject).ok_or_else(|| format!("no such module: {}", subject))?;
                if self.running.contains(&name) {
                    return Err(format!("module {} is running; stop it first", name));
                }
                self.available.remove(&name);
                self.failed.remove(&name);
            }
            other => return Err(format!("unknown operation: {}", other)),
        }

        self.stale_reads = lag;
        Ok(())
    }

    fn listing(&mut self, attribute: &str) -> Option<Value> {
        let stale = self.stale_reads > 0;
        let listed = match attribute {
            "AvailableModules" if stale => &self.stale_available,
            "AvailableModules" => &self.available,
            "RunningModules" if stale => &self.stale_running,
            "RunningModules" => &self.running,
            _ => return None,
        };
        let value = json!(listed.iter().collect::<Vec<_>>());
        if stale {
            self.stale_reads -= 1;
        }
        Some(value)
    }
}

/// Simulated management backend with a single deployer object.
pub struct InMemoryManagementServer {
    deployer: ObjectName,
    targets: Vec<String>,
    completion: CompletionModel,
    naming: ListingNaming,
    listing_lag: u32,
    expose_failed: bool,
    state: Arc<Mutex<ServerState>>,
    notifications: broadcast::Sender<Notification>,
    closes: AtomicUsize,
}

impl InMemoryManagementServer {
    pub fn new(deployer: ObjectName) -> Self {
        let (notifications, _) = broadcast::channel(256);
        Self {
            deployer,
            targets: vec!["server-one".to_string()],
            completion: CompletionModel::Synchronous,
            naming: ListingNaming::FileName,
            listing_lag: 0,
            expose_failed: true,
            state: Arc::new(Mutex::new(ServerState::default())),
            notifications,
            closes: AtomicUsize::new(0),
        }
    }

    pub fn with_completion(mut self, completion: CompletionModel) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_naming(mut self, naming: ListingNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_targets(mut self, targets: &[&str]) -> Self {
        self.targets = targets.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Serve pre-mutation listings for `reads` listing reads after every mutation
    pub fn with_listing_lag(mut self, reads: u32) -> Self {
        self.listing_lag = reads;
        self
    }

    /// Drop the `FailedModules` attribute, like backends that have no such listing
    pub fn without_failed_listing(mut self) -> Self {
        self.expose_failed = false;
        self
    }

    pub fn with_available(self, name: &str) -> Self {
        self.state.lock().available.insert(name.to_string());
        self
    }

    pub fn with_running(self, name: &str) -> Self {
        {
            let mut state = self.state.lock();
            state.available.insert(name.to_string());
            state.running.insert(name.to_string());
        }
        self
    }

    pub fn mark_failed(&self, name: &str) {
        self.state.lock().failed.insert(name.to_string());
    }

    /// Make every later call of `operation` fail with `message`
    pub fn fail_operation(&self, operation: &str, message: &str) {
        self.state.lock().failing.insert(operation.to_string(), message.to_string());
    }

    /// Accept `operation` but never carry it out or report on it
    pub fn silence_operation(&self, operation: &str) {
        self.state.lock().silent.insert(operation.to_string());
    }

    pub fn deployer(&self) -> &ObjectName {
        &self.deployer
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.iter().map(|c| c.operation.clone()).collect()
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| c.operation == operation).count()
    }

    pub fn available(&self) -> BTreeSet<String> {
        self.state.lock().available.clone()
    }

    pub fn running(&self) -> BTreeSet<String> {
        self.state.lock().running.clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn check_object(&self, object: &ObjectName) -> Result<(), ConnectionError> {
        if object == &self.deployer {
            Ok(())
        } else {
            Err(ConnectionError::NotFound(object.to_string()))
        }
    }

    fn get_attribute(&self, object: &ObjectName, attribute: &str) -> Result<Value, ConnectionError> {
        self.check_object(object)?;
        let mut state = self.state.lock();
        match attribute {
            "Targets" => Ok(json!(self.targets)),
            "FailedModules" if self.expose_failed => Ok(json!(state.failed.iter().collect::<Vec<_>>())),
            _ => state
                .listing(attribute)
                .ok_or_else(|| ConnectionError::NotFound(format!("{}/{}", object, attribute))),
        }
    }

    fn invoke(&self, object: &ObjectName, operation: &str, arguments: Vec<Value>) -> Result<Value, ConnectionError> {
        self.check_object(object)?;

        let mut state = self.state.lock();
        state.calls.push(RecordedCall { operation: operation.to_string(), arguments: arguments.clone() });
        let failure = state.failing.get(operation).cloned();
        let silent = state.silent.contains(operation);

        match self.completion {
            CompletionModel::Synchronous => {
                if let Some(message) = failure {
                    return Err(ConnectionError::Remote(message));
                }
                if silent {
                    debug!(operation, "Swallowing operation");
                    return Ok(Value::Null);
                }
                state
                    .apply(self.naming, self.listing_lag, operation, &arguments)
                    .map(|_| Value::Null)
                    .map_err(ConnectionError::Remote)
            }
            CompletionModel::Notifications { delay } => {
                state.next_operation += 1;
                let id = format!("op-{}", state.next_operation);
                if silent {
                    debug!(operation, id = %id, "Swallowing operation");
                    return Ok(json!(id));
                }

                let transition = Transition {
                    id: id.clone(),
                    operation: operation.to_string(),
                    arguments,
                    failure,
                    delay,
                    naming: self.naming,
                    lag: self.listing_lag,
                    source: self.deployer.clone(),
                    state: self.state.clone(),
                    notifications: self.notifications.clone(),
                };
                tokio::spawn(transition.run());
                Ok(json!(id))
            }
        }
    }
}

/// A mutation carried out in the background and announced by notifications
struct Transition {
    id: String,
    operation: String,
    arguments: Vec<Value>,
    failure: Option<String>,
    delay: Duration,
    naming: ListingNaming,
    lag: u32,
    source: ObjectName,
    state: Arc<Mutex<ServerState>>,
    notifications: broadcast::Sender<Notification>,
}

impl Transition {
    async fn run(self) {
        self.announce(NOTIFICATION_PROGRESS, format!("{} in progress", self.operation));
        tokio::time::sleep(self.delay).await;

        let outcome = match &self.failure {
            Some(message) => Err(message.clone()),
            None => self.state.lock().apply(self.naming, self.lag, &self.operation, &self.arguments),
        };

        match outcome {
            Ok(()) => self.announce(NOTIFICATION_COMPLETED, format!("{} completed", self.operation)),
            Err(message) => self.announce(NOTIFICATION_FAILED, message),
        }
    }

    fn announce(&self, kind: &str, message: String) {
        let sequence = {
            let mut state = self.state.lock();
            state.sequence += 1;
            state.sequence
        };
        // No subscribers is fine
        let _ = self.notifications.send(Notification {
            source: self.source.clone(),
            kind: kind.to_string(),
            sequence,
            message,
            user_data: json!({ "operation": self.id }),
        });
    }
}

/// One client connection to an [`InMemoryManagementServer`].
pub struct InMemoryConnection {
    server: Arc<InMemoryManagementServer>,
    closed: AtomicBool,
}

impl InMemoryConnection {
    fn ensure_open(&self) -> Result<(), ConnectionError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(ConnectionError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ManagementConnection for InMemoryConnection {
    async fn get_attribute(&self, object: &ObjectName, attribute: &str) -> Result<Value, ConnectionError> {
        self.ensure_open()?;
        self.server.get_attribute(object, attribute)
    }

    async fn invoke(
        &self,
        object: &ObjectName,
        operation: &str,
        arguments: Vec<Value>,
        _signature: Vec<String>,
    ) -> Result<Value, ConnectionError> {
        self.ensure_open()?;
        self.server.invoke(object, operation, arguments)
    }

    async fn subscribe(&self, object: &ObjectName) -> Result<NotificationStream, ConnectionError> {
        self.ensure_open()?;
        self.server.check_object(object)?;
        match self.server.completion {
            CompletionModel::Notifications { .. } => Ok(self.server.notifications.subscribe()),
            CompletionModel::Synchronous => Err(ConnectionError::Unsupported(
                "synchronous server emits no notifications".to_string(),
            )),
        }
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.server.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Hands out connections to one shared [`InMemoryManagementServer`].
pub struct InMemoryConnectionProvider {
    server: Arc<InMemoryManagementServer>,
    credentials: Option<(String, String)>,
    connects: AtomicUsize,
}

impl InMemoryConnectionProvider {
    pub fn new(server: Arc<InMemoryManagementServer>) -> Self {
        Self { server, credentials: None, connects: AtomicUsize::new(0) }
    }

    /// Reject endpoints that do not carry exactly these credentials
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some((username.to_string(), password.to_string()));
        self
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionProvider for InMemoryConnectionProvider {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn ManagementConnection>, ConnectionError> {
        if let Some((username, password)) = &self.credentials {
            let accepted = endpoint.username.as_deref() == Some(username.as_str())
                && endpoint.password.as_deref() == Some(password.as_str());
            if !accepted {
                return Err(ConnectionError::Authentication(endpoint.url.clone()));
            }
        }

        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(InMemoryConnection {
            server: self.server.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployer() -> ObjectName {
        ObjectName::new("jboss.system:service=MainDeployer")
    }

    async fn connection(server: Arc<InMemoryManagementServer>) -> Arc<dyn ManagementConnection> {
        InMemoryConnectionProvider::new(server)
            .connect(&Endpoint::new("mem://local"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_synchronous_distribute_and_duplicate() {
        let server = Arc::new(InMemoryManagementServer::new(deployer()));
        let conn = connection(server.clone()).await;
        let args = vec![json!("file:/opt/apps/app1.ear"), json!(["server-one"])];

        conn.invoke(&deployer(), "distribute", args.clone(), vec![]).await.unwrap();
        assert!(server.available().contains("app1.ear"));

        let err = conn.invoke(&deployer(), "distribute", args, vec![]).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Remote(_)));
        assert_eq!(server.call_count("distribute"), 2);
    }

    #[tokio::test]
    async fn test_listing_lag_serves_stale_reads() {
        let server = Arc::new(InMemoryManagementServer::new(deployer()).with_listing_lag(2));
        let conn = connection(server.clone()).await;

        conn.invoke(&deployer(), "distribute", vec![json!("file:/a/app1.ear"), json!([])], vec![])
            .await
            .unwrap();

        let object = deployer();
        let read = || conn.get_attribute(&object, "AvailableModules");
        assert_eq!(read().await.unwrap(), json!([]));
        assert_eq!(read().await.unwrap(), json!([]));
        assert_eq!(read().await.unwrap(), json!(["app1.ear"]));
    }

    #[tokio::test]
    async fn test_undeploy_of_running_module_is_rejected() {
        let server = Arc::new(InMemoryManagementServer::new(deployer()).with_running("app1.ear"));
        let conn = connection(server.clone()).await;

        let err = conn.invoke(&deployer(), "undeploy", vec![json!("app1.ear")], vec![]).await.unwrap_err();
        assert!(err.to_string().contains("stop it first"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_notifications_announce_completion() {
        let server = Arc::new(
            InMemoryManagementServer::new(deployer())
                .with_completion(CompletionModel::Notifications { delay: Duration::from_millis(200) }),
        );
        let conn = connection(server.clone()).await;
        let mut stream = conn.subscribe(&deployer()).await.unwrap();

        let id = conn
            .invoke(&deployer(), "distribute", vec![json!("file:/a/app1.ear"), json!([])], vec![])
            .await
            .unwrap();
        assert_eq!(id, json!("op-1"));
        assert!(server.available().is_empty());

        let progress = stream.recv().await.unwrap();
        assert_eq!(progress.kind, NOTIFICATION_PROGRESS);
        let done = stream.recv().await.unwrap();
        assert_eq!(done.kind, NOTIFICATION_COMPLETED);
        assert_eq!(done.user_data, json!({ "operation": "op-1" }));
        assert!(server.available().contains("app1.ear"));
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_calls_and_counts_once() {
        let server = Arc::new(InMemoryManagementServer::new(deployer()));
        let conn = connection(server.clone()).await;

        conn.close().await.unwrap();
        conn.close().await.unwrap();

        assert_eq!(server.close_count(), 1);
        assert!(matches!(
            conn.get_attribute(&deployer(), "Targets").await,
            Err(ConnectionError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_provider_checks_credentials() {
        let server = Arc::new(InMemoryManagementServer::new(deployer()));
        let provider = InMemoryConnectionProvider::new(server).with_credentials("admin", "secret");

        let rejected = provider.connect(&Endpoint::new("mem://local")).await;
        assert!(matches!(rejected, Err(ConnectionError::Authentication(_))));

        let accepted = provider
            .connect(&Endpoint::new("mem://local").with_credentials("admin", "secret"))
            .await;
        assert!(accepted.is_ok());
        assert_eq!(provider.connect_count(), 1);
    }
}
