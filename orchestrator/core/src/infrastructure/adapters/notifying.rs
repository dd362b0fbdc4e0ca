// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::domain::backend::{BackendAdapter, BackendKind, ModuleLister};
use crate::domain::errors::{DeployError, ProxyInvocationError};
use crate::domain::management::{
    ConnectionProvider, Endpoint, ManagementConnection, Notification, NotificationStream, ObjectName,
};
use crate::domain::module::{ArtifactLocation, MatchPolicy, ModuleIdentity, ModuleSet, TargetSet};
use crate::domain::progress::{ProgressEvent, ProgressHandle, ProgressSender};
use crate::domain::session::Session;
use crate::infrastructure::adapters::{open_session, DeployerLister};
use crate::infrastructure::deployer::DeployerClient;

pub const NOTIFICATION_COMPLETED: &str = "deployment.completed";
pub const NOTIFICATION_FAILED: &str = "deployment.failed";

const PROGRESS_BUFFER: usize = 16;

/// Adapter for backends that accept an operation and report its outcome
/// through notifications tagged with an operation id.
pub struct NotifyingAdapter {
    provider: Arc<dyn ConnectionProvider>,
    lister: DeployerLister,
    match_policy: MatchPolicy,
}

impl NotifyingAdapter {
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

    /// Subscribe before invoking so no notification for the operation can be missed
    async fn subscribe(&self, session: &Session) -> Result<NotificationStream, DeployError> {
        Ok(session.management().subscribe(self.lister.deployer()).await?)
    }

    /// Start forwarding notifications for the operation named in `reply`
    fn track(
        &self,
        method: &str,
        reply: Value,
        notifications: NotificationStream,
        module: &ModuleIdentity,
    ) -> Result<ProgressHandle, DeployError> {
        let operation = operation_id(method, &reply)?;
        debug!(module = %module, operation = %operation, method, "Tracking backend operation");

        let (progress, handle) = ProgressHandle::channel(PROGRESS_BUFFER);
        tokio::spawn(forward(notifications, operation, module.clone(), progress));
        Ok(handle)
    }
}

/// Operation id from an invoke reply: either a bare string or `{"operation": "<id>"}`
fn operation_id(method: &str, reply: &Value) -> Result<String, DeployError> {
    let id = match reply {
        Value::String(id) => Some(id.clone()),
        Value::Object(fields) => fields.get("operation").and_then(Value::as_str).map(str::to_string),
        _ => None,
    };

    id.ok_or_else(|| {
        DeployError::Proxy(ProxyInvocationError::Coercion {
            method: method.to_string(),
            reason: format!("expected an operation id, got {}", reply),
        })
    })
}

fn translate(notification: &Notification, module: &ModuleIdentity) -> ProgressEvent {
    let module = Some(module.clone());
    match notification.kind.as_str() {
        NOTIFICATION_COMPLETED => ProgressEvent::completed(module, notification.message.clone()),
        NOTIFICATION_FAILED => ProgressEvent::failed(module, notification.message.clone()),
        _ => ProgressEvent::running(module, notification.message.clone()),
    }
}

async fn forward(
    mut notifications: NotificationStream,
    operation: String,
    module: ModuleIdentity,
    progress: ProgressSender,
) {
    loop {
        tokio::select! {
            _ = progress.closed() => return,
            received = notifications.recv() => match received {
                Ok(notification) => {
                    let tagged = notification.user_data.get("operation").and_then(Value::as_str);
                    if tagged != Some(operation.as_str()) {
                        continue;
                    }

                    let event = translate(&notification, &module);
                    let terminal = event.is_terminal();
                    if progress.send(event).await.is_err() || terminal {
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(module = %module, operation = %operation, skipped, "Notification stream lagged");
                }
                Err(RecvError::Closed) => {
                    let _ = progress
                        .send(ProgressEvent::failed(Some(module.clone()), "notification stream closed"))
                        .await;
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl ModuleLister for NotifyingAdapter {
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
impl BackendAdapter for NotifyingAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Notifying
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
        let notifications = self.subscribe(session).await?;
        let reply = self.client(session.management()).distribute(artifact, targets).await?;
        self.track("distribute", reply, notifications, &artifact.module)
    }

    async fn start(&self, session: &Session, module: &ModuleIdentity) -> Result<ProgressHandle, DeployError> {
        let notifications = self.subscribe(session).await?;
        let reply = self.client(session.management()).start(module).await?;
        self.track("start", reply, notifications, module)
    }

    async fn stop(&self, session: &Session, module: &ModuleIdentity) -> Result<ProgressHandle, DeployError> {
        let notifications = self.subscribe(session).await?;
        let reply = self.client(session.management()).stop(module).await?;
        self.track("stop", reply, notifications, module)
    }

    async fn undeploy(&self, session: &Session, module: &ModuleIdentity) -> Result<ProgressHandle, DeployError> {
        let notifications = self.subscribe(session).await?;
        let reply = self.client(session.management()).undeploy(module).await?;
        self.track("undeploy", reply, notifications, module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn notification(kind: &str, operation: &str, message: &str) -> Notification {
        Notification {
            source: ObjectName::new("amx:type=deployer"),
            kind: kind.to_string(),
            sequence: 1,
            message: message.to_string(),
            user_data: json!({ "operation": operation }),
        }
    }

    #[test]
    fn test_operation_id_forms() {
        assert_eq!(operation_id("start", &json!("op-1")).unwrap(), "op-1");
        assert_eq!(operation_id("start", &json!({ "operation": "op-2" })).unwrap(), "op-2");
        assert!(matches!(
            operation_id("start", &Value::Null),
            Err(DeployError::Proxy(ProxyInvocationError::Coercion { .. }))
        ));
    }

    #[test]
    fn test_translate_notification_kinds() {
        let module = ModuleIdentity::new("app1.ear");

        assert!(translate(&notification(NOTIFICATION_COMPLETED, "op", "ok"), &module).completed);
        assert!(translate(&notification(NOTIFICATION_FAILED, "op", "boom"), &module).failed);
        assert!(!translate(&notification("deployment.progress", "op", "50%"), &module).is_terminal());
    }

    #[tokio::test]
    async fn test_forward_ignores_other_operations() {
        let (tx, rx) = tokio::sync::broadcast::channel(16);
        let (progress, handle) = ProgressHandle::channel(16);
        let ProgressHandle::Streaming(mut events) = handle else {
            panic!("expected a streaming handle");
        };

        let task = tokio::spawn(forward(rx, "op-7".to_string(), ModuleIdentity::new("app1.ear"), progress));

        tx.send(notification(NOTIFICATION_FAILED, "op-6", "someone else")).unwrap();
        tx.send(notification("deployment.progress", "op-7", "copying")).unwrap();
        tx.send(notification(NOTIFICATION_COMPLETED, "op-7", "done")).unwrap();

        let first = events.recv().await.unwrap();
        assert_eq!(first.message, "copying");
        let second = events.recv().await.unwrap();
        assert!(second.completed);

        task.await.unwrap();
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_forward_reports_closed_stream_as_failure() {
        let (tx, rx) = tokio::sync::broadcast::channel::<Notification>(4);
        let (progress, handle) = ProgressHandle::channel(4);
        let ProgressHandle::Streaming(mut events) = handle else {
            panic!("expected a streaming handle");
        };

        tokio::spawn(forward(rx, "op-1".to_string(), ModuleIdentity::new("app1.ear"), progress));
        drop(tx);

        let event = events.recv().await.unwrap();
        assert!(event.failed);
    }
}
