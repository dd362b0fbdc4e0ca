// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Deployment Lifecycle Orchestrator
//!
//! One lifecycle state machine over every backend family.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Sequences native steps, waits on progress, confirms through listings
//!
//! Every mutating step runs the same way: issue the native call through the
//! [`BackendAdapter`], attach a [`ProgressLatch`] to the returned handle and
//! wait for it within the progress timeout, then poll the relevant listing
//! until it reflects the transition. Only then does the step count as done.
//!
//! ```text
//! NOT_PRESENT --distribute--> AVAILABLE --start--> RUNNING
//! RUNNING --stop--> AVAILABLE --remove--> NOT_PRESENT
//! ```

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::latch::ProgressLatch;
use crate::application::poller::{PollPolicy, Poller};
use crate::domain::artifact::ArtifactResolver;
use crate::domain::backend::BackendAdapter;
use crate::domain::config::DEFAULT_PROGRESS_TIMEOUT;
use crate::domain::errors::{DeployError, FailureCause, LifecycleStep, Listing, ProxyInvocationError};
use crate::domain::localization::Localizer;
use crate::domain::management::Endpoint;
use crate::domain::module::{ArtifactLocation, DeploymentStatus, ModuleIdentity, TargetSet};
use crate::domain::session::Session;
use crate::infrastructure::localizer::TemplateLocalizer;

/// Bounds on the two suspension points of a lifecycle step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// How long to wait for a terminal progress event
    #[serde(with = "humantime_serde")]
    pub progress_timeout: Duration,
    /// How to poll listings while confirming a transition
    pub poll: PollPolicy,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            progress_timeout: DEFAULT_PROGRESS_TIMEOUT,
            poll: PollPolicy::default(),
        }
    }
}

/// Public operation a step belongs to; decides which error a failed step becomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Deploy,
    Undeploy,
    Start,
    Stop,
}

impl Operation {
    fn failure(self, module: &ModuleIdentity, step: LifecycleStep, cause: FailureCause) -> DeployError {
        let module = module.clone();
        match self {
            Operation::Deploy => DeployError::DeploymentFailed { module, step, cause },
            Operation::Undeploy => DeployError::UndeployFailed { module, step, cause },
            Operation::Start => DeployError::StartFailed { module, step, cause },
            Operation::Stop => DeployError::StopFailed { module, step, cause },
        }
    }
}

/// Native call issued by one step
enum Command<'a> {
    Distribute(&'a ArtifactLocation),
    Start,
    Stop,
    Remove,
}

impl Command<'_> {
    fn step(&self) -> LifecycleStep {
        match self {
            Command::Distribute(_) => LifecycleStep::Distribute,
            Command::Start => LifecycleStep::Start,
            Command::Stop => LifecycleStep::Stop,
            Command::Remove => LifecycleStep::Remove,
        }
    }
}

pub struct DeploymentOrchestrator {
    adapter: Arc<dyn BackendAdapter>,
    resolver: Arc<dyn ArtifactResolver>,
    session: RwLock<Option<Arc<Session>>>,
    module_locks: DashMap<ModuleIdentity, Arc<Mutex<()>>>,
    settings: OrchestratorSettings,
    poller: Poller,
    cancel: CancellationToken,
    localizer: Arc<dyn Localizer>,
}

impl DeploymentOrchestrator {
    /// Open a session through `adapter` and build an orchestrator that owns it.
    pub async fn connect(
        adapter: Arc<dyn BackendAdapter>,
        resolver: Arc<dyn ArtifactResolver>,
        endpoint: &Endpoint,
        telemetry: Option<&Endpoint>,
        settings: OrchestratorSettings,
    ) -> Result<Self, DeployError> {
        info!(kind = %adapter.kind(), endpoint = %endpoint.url, "Connecting to deployment backend");
        let session = adapter.connect(endpoint, telemetry).await?;
        Ok(Self::with_session(adapter, resolver, session, settings))
    }

    pub fn with_session(
        adapter: Arc<dyn BackendAdapter>,
        resolver: Arc<dyn ArtifactResolver>,
        session: Session,
        settings: OrchestratorSettings,
    ) -> Self {
        let cancel = CancellationToken::new();
        Self {
            adapter,
            resolver,
            session: RwLock::new(Some(Arc::new(session))),
            module_locks: DashMap::new(),
            settings,
            poller: Poller::new(settings.poll).with_cancellation(cancel.clone()),
            cancel,
            localizer: Arc::new(TemplateLocalizer::new()),
        }
    }

    /// Abort suspended waits with [`DeployError::Cancelled`] once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.poller = Poller::new(self.settings.poll).with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    pub fn with_localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = localizer;
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Deploy the artifact at `path` and leave it running.
    ///
    /// A module that is already present is fully undeployed first, so this
    /// never fails with [`DeployError::DuplicateModule`].
    pub async fn deploy_module(&self, path: &Path) -> Result<ModuleIdentity, DeployError> {
        let started = Instant::now();
        let session = self.session().await?;
        let location = self.resolver.locate(path)?;
        let module = location.module.clone();
        let _guard = self.lock_module(&module).await;

        info!(module = %module, kind = %self.adapter.kind(), targets = session.targets().len(), "Deploying module");

        if self.undeploy_locked(&session, &module).await? {
            debug!(module = %module, "Removed previous deployment");
        }

        self.distribute_and_start(&session, &location).await?;
        self.report("deploy.completed", "Deployed {{module}} in {{elapsed_ms}}ms", &module, started);
        Ok(module)
    }

    pub async fn redeploy_module(&self, path: &Path) -> Result<ModuleIdentity, DeployError> {
        self.deploy_module(path).await
    }

    /// Distribute and start without removing an existing deployment first.
    pub async fn install(&self, path: &Path) -> Result<ModuleIdentity, DeployError> {
        let started = Instant::now();
        let session = self.session().await?;
        let location = self.resolver.locate(path)?;
        let module = location.module.clone();
        let _guard = self.lock_module(&module).await;

        if self.is_present(&session, &module).await? {
            return Err(DeployError::DuplicateModule(module));
        }

        info!(module = %module, "Installing module");
        self.distribute_and_start(&session, &location).await?;
        self.report("install.completed", "Installed {{module}} in {{elapsed_ms}}ms", &module, started);
        Ok(module)
    }

    /// Stop `module` if it runs, then remove it. Absent modules are left alone.
    pub async fn undeploy(&self, module: &ModuleIdentity) -> Result<(), DeployError> {
        let started = Instant::now();
        let session = self.session().await?;
        let _guard = self.lock_module(module).await;

        if self.undeploy_locked(&session, module).await? {
            self.report("undeploy.completed", "Undeployed {{module}} in {{elapsed_ms}}ms", module, started);
        } else {
            self.report("undeploy.not-present", "{{module}} is not deployed; nothing to undeploy", module, started);
        }
        Ok(())
    }

    pub async fn start(&self, module: &ModuleIdentity) -> Result<(), DeployError> {
        let started = Instant::now();
        let session = self.session().await?;
        let _guard = self.lock_module(module).await;

        if self.adapter.is_running(&session, module).await? {
            self.report("start.already-running", "{{module}} is already running", module, started);
            return Ok(());
        }

        let available = self.adapter.list_available(&session).await?;
        if !available.contains(module, self.adapter.match_policy()) {
            return Err(Operation::Start.failure(module, LifecycleStep::Start, FailureCause::NotPresent));
        }

        self.execute(&session, module, Operation::Start, Command::Start).await?;
        self.report("start.completed", "Started {{module}} in {{elapsed_ms}}ms", module, started);
        Ok(())
    }

    pub async fn stop(&self, module: &ModuleIdentity) -> Result<(), DeployError> {
        let started = Instant::now();
        let session = self.session().await?;
        let _guard = self.lock_module(module).await;

        if !self.adapter.is_running(&session, module).await? {
            self.report("stop.not-running", "{{module}} is not running", module, started);
            return Ok(());
        }

        self.execute(&session, module, Operation::Stop, Command::Stop).await?;
        self.report("stop.completed", "Stopped {{module}} in {{elapsed_ms}}ms", module, started);
        Ok(())
    }

    /// Whether the artifact at `path` is in the available listing right now.
    ///
    /// Takes no lock; may observe a transition in flight.
    pub async fn is_deployed(&self, path: &Path) -> Result<bool, DeployError> {
        let session = self.session().await?;
        let module = self.resolver.identity(path)?;
        let available = self.adapter.list_available(&session).await?;
        Ok(available.contains(&module, self.adapter.match_policy()))
    }

    /// Current status of `module`, derived from fresh listings.
    pub async fn status(&self, module: &ModuleIdentity) -> Result<DeploymentStatus, DeployError> {
        let session = self.session().await?;
        let transitioning = self
            .module_locks
            .get(module)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false);

        let available = self.adapter.list_available(&session).await?;
        let running = self.adapter.list_running(&session).await?;
        let failed = self.adapter.list_failed(&session).await?;

        Ok(DeploymentStatus::derive(
            module,
            self.adapter.match_policy(),
            &available,
            &running,
            &failed,
            transitioning,
        ))
    }

    /// Identity the configured resolver derives for `path`
    pub fn identity(&self, path: &Path) -> Result<ModuleIdentity, DeployError> {
        self.resolver.identity(path)
    }

    pub async fn targets(&self) -> Result<TargetSet, DeployError> {
        Ok(self.session().await?.targets().clone())
    }

    pub async fn is_closed(&self) -> bool {
        self.session.read().await.is_none()
    }

    /// Release the session's connections. Safe to call more than once.
    pub async fn close(&self) {
        let session = self.session.write().await.take();
        match session {
            Some(session) => {
                session.close().await;
                info!(session_id = %session.id(), "Deployment session closed");
            }
            None => debug!("Deployment session already closed"),
        }
    }

    async fn session(&self) -> Result<Arc<Session>, DeployError> {
        self.session.read().await.clone().ok_or(DeployError::SessionClosed)
    }

    async fn lock_module(&self, module: &ModuleIdentity) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(&self.module_locks.entry(module.clone()).or_default());
        lock.lock_owned().await
    }

    async fn is_present(&self, session: &Session, module: &ModuleIdentity) -> Result<bool, DeployError> {
        let policy = self.adapter.match_policy();
        if self.adapter.list_available(session).await?.contains(module, policy) {
            return Ok(true);
        }
        Ok(self.adapter.list_running(session).await?.contains(module, policy))
    }

    async fn distribute_and_start(&self, session: &Session, location: &ArtifactLocation) -> Result<(), DeployError> {
        let module = &location.module;
        self.execute(session, module, Operation::Deploy, Command::Distribute(location)).await?;
        self.execute(session, module, Operation::Deploy, Command::Start).await
    }

    /// Undeploy with the module lock already held. Returns false if there was nothing to remove.
    async fn undeploy_locked(&self, session: &Session, module: &ModuleIdentity) -> Result<bool, DeployError> {
        let running = self.adapter.is_running(session, module).await?;
        let present = running
            || self
                .adapter
                .list_available(session)
                .await?
                .contains(module, self.adapter.match_policy());

        if !present {
            return Ok(false);
        }

        if running {
            self.execute(session, module, Operation::Undeploy, Command::Stop).await?;
        }
        self.execute(session, module, Operation::Undeploy, Command::Remove).await?;
        Ok(true)
    }

    /// Issue one native step, wait for its terminal progress event, then confirm it through the listings.
    async fn execute(
        &self,
        session: &Session,
        module: &ModuleIdentity,
        operation: Operation,
        command: Command<'_>,
    ) -> Result<(), DeployError> {
        let step = command.step();
        let started = Instant::now();
        debug!(module = %module, step = %step, "Issuing lifecycle step");

        let issued = match &command {
            Command::Distribute(location) => self.adapter.distribute(session, location, session.targets()).await,
            Command::Start => self.adapter.start(session, module).await,
            Command::Stop => self.adapter.stop(session, module).await,
            Command::Remove => self.adapter.undeploy(session, module).await,
        };

        let handle = match issued {
            Ok(handle) => handle,
            Err(DeployError::Proxy(ProxyInvocationError::Remote { source, .. })) => {
                return Err(self.fail(operation, module, step, FailureCause::Backend(source.to_string())));
            }
            Err(DeployError::Connection(e)) => {
                return Err(self.fail(operation, module, step, FailureCause::Backend(e.to_string())));
            }
            Err(e) => return Err(e),
        };

        let latch = ProgressLatch::new();
        let forwarder = latch.attach(handle);
        let waited = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            outcome = latch.wait(self.settings.progress_timeout) => Some(outcome),
        };
        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }

        let event = match waited {
            None => return Err(DeployError::Cancelled),
            Some(Ok(event)) => event,
            Some(Err(timed_out)) => {
                return Err(self.fail(operation, module, step, FailureCause::TimedOut { waited: timed_out.timeout }));
            }
        };
        if event.failed {
            return Err(self.fail(operation, module, step, FailureCause::Reported(event.message)));
        }

        let policy = self.adapter.match_policy();
        let adapter = self.adapter.as_ref();
        let (listing, outcome) = match command {
            Command::Distribute(_) => (
                Listing::Available,
                self.poller.wait_until_present(module, policy, || adapter.list_available(session)).await?,
            ),
            Command::Start => (
                Listing::Running,
                self.poller.wait_until_present(module, policy, || adapter.list_running(session)).await?,
            ),
            Command::Stop => (
                Listing::Running,
                self.poller.wait_until_absent(module, policy, || adapter.list_running(session)).await?,
            ),
            Command::Remove => (
                Listing::Available,
                self.poller.wait_until_absent(module, policy, || adapter.list_available(session)).await?,
            ),
        };

        if !outcome.satisfied {
            let cause = FailureCause::NotConfirmed { listing, attempts: outcome.attempts };
            return Err(self.fail(operation, module, step, cause));
        }

        let message = self.localizer.localize(
            "step.confirmed",
            "{{step}} of {{module}} confirmed after {{attempts}} listing poll(s)",
            &json!({ "module": module.as_str(), "step": step.to_string(), "attempts": outcome.attempts }),
        );
        info!(
            module = %module,
            step = %step,
            attempts = outcome.attempts,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "{}",
            message
        );
        Ok(())
    }

    fn fail(&self, operation: Operation, module: &ModuleIdentity, step: LifecycleStep, cause: FailureCause) -> DeployError {
        let message = self.localizer.localize(
            "step.failed",
            "{{step}} of {{module}} failed: {{cause}}",
            &json!({ "module": module.as_str(), "step": step.to_string(), "cause": cause.to_string() }),
        );
        warn!(module = %module, step = %step, "{}", message);
        operation.failure(module, step, cause)
    }

    fn report(&self, code: &str, template: &str, module: &ModuleIdentity, started: Instant) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let message = self.localizer.localize(code, template, &json!({ "module": module.as_str(), "elapsed_ms": elapsed_ms }));
        info!(module = %module, elapsed_ms, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::management::ObjectName;
    use crate::infrastructure::adapters::ListingAdapter;
    use crate::infrastructure::artifact::FileNameResolver;
    use crate::infrastructure::in_memory::{InMemoryConnectionProvider, InMemoryManagementServer};

    fn deployer() -> ObjectName {
        ObjectName::new("jboss.system:service=MainDeployer")
    }

    async fn orchestrator(server: InMemoryManagementServer) -> (Arc<InMemoryManagementServer>, DeploymentOrchestrator) {
        let server = Arc::new(server);
        let provider = Arc::new(InMemoryConnectionProvider::new(server.clone()));
        let adapter = Arc::new(ListingAdapter::new(provider, deployer()));
        let settings = OrchestratorSettings {
            progress_timeout: Duration::from_secs(5),
            poll: PollPolicy { max_attempts: 3, interval: Duration::from_millis(10) },
        };
        let orchestrator = DeploymentOrchestrator::connect(
            adapter,
            Arc::new(FileNameResolver),
            &Endpoint::new("mem://local"),
            None,
            settings,
        )
        .await
        .unwrap();
        (server, orchestrator)
    }

    #[test]
    fn test_operation_selects_error_variant() {
        let module = ModuleIdentity::new("app1.ear");
        let cause = || FailureCause::NotPresent;

        assert!(matches!(
            Operation::Deploy.failure(&module, LifecycleStep::Start, cause()),
            DeployError::DeploymentFailed { step: LifecycleStep::Start, .. }
        ));
        assert!(matches!(
            Operation::Undeploy.failure(&module, LifecycleStep::Stop, cause()),
            DeployError::UndeployFailed { step: LifecycleStep::Stop, .. }
        ));
        assert!(matches!(
            Operation::Start.failure(&module, LifecycleStep::Start, cause()),
            DeployError::StartFailed { .. }
        ));
        assert!(matches!(
            Operation::Stop.failure(&module, LifecycleStep::Stop, cause()),
            DeployError::StopFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_start_of_absent_module_reports_not_present() {
        let (server, orchestrator) = orchestrator(InMemoryManagementServer::new(deployer())).await;

        let err = orchestrator.start(&ModuleIdentity::new("ghost.ear")).await.unwrap_err();

        assert!(matches!(err, DeployError::StartFailed { cause: FailureCause::NotPresent, .. }));
        assert_eq!(server.call_count("start"), 0);
    }

    #[tokio::test]
    async fn test_backend_rejection_becomes_step_failure() {
        let server = InMemoryManagementServer::new(deployer()).with_available("app1.ear");
        server.fail_operation("start", "java.lang.ClassNotFoundException: com.acme.Boot");
        let (_server, orchestrator) = orchestrator(server).await;

        let err = orchestrator.start(&ModuleIdentity::new("app1.ear")).await.unwrap_err();

        assert_eq!(err.step(), Some(LifecycleStep::Start));
        assert!(matches!(err.cause(), Some(FailureCause::Backend(msg)) if msg.contains("ClassNotFoundException")));
    }

    #[tokio::test]
    async fn test_status_reports_failed_listing() {
        let server = InMemoryManagementServer::new(deployer()).with_available("app1.ear");
        server.mark_failed("app1.ear");
        let (_server, orchestrator) = orchestrator(server).await;

        let status = orchestrator.status(&ModuleIdentity::new("app1.ear")).await.unwrap();
        assert_eq!(status, DeploymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_status_is_transitioning_while_module_lock_is_held() {
        let server = InMemoryManagementServer::new(deployer()).with_running("app1.ear");
        let (_server, orchestrator) = orchestrator(server).await;
        let module = ModuleIdentity::new("app1.ear");

        let guard = orchestrator.lock_module(&module).await;
        assert_eq!(orchestrator.status(&module).await.unwrap(), DeploymentStatus::Transitioning);
        drop(guard);
        assert_eq!(orchestrator.status(&module).await.unwrap(), DeploymentStatus::Running);
    }

    #[tokio::test]
    async fn test_cancelled_orchestrator_aborts_confirmation() {
        let server = InMemoryManagementServer::new(deployer()).with_available("app1.ear");
        server.silence_operation("start");
        let cancel = CancellationToken::new();
        let (_server, orchestrator) = orchestrator(server).await;
        let orchestrator = orchestrator.with_cancellation(cancel.clone());

        cancel.cancel();
        let err = orchestrator.start(&ModuleIdentity::new("app1.ear")).await.unwrap_err();
        assert!(matches!(err, DeployError::Cancelled));
    }
}
