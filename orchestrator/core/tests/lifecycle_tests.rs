// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end lifecycle tests against the in-memory management server.
//!
//! Each test drives a [`DeploymentOrchestrator`] through a real adapter
//! (listing or notifying) over [`InMemoryConnectionProvider`] connections and
//! checks both the outcome and the exact native calls the backend received.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use stevedore_core::application::backend_factory::{create_backend, create_resolver};
use stevedore_core::application::{DeploymentOrchestrator, OrchestratorSettings, PollPolicy};
use stevedore_core::domain::artifact::IdentityScheme;
use stevedore_core::domain::backend::BackendKind;
use stevedore_core::domain::config::BackendConfig;
use stevedore_core::domain::errors::{DeployError, FailureCause, LifecycleStep, Listing};
use stevedore_core::domain::management::{ConnectionError, Endpoint, ObjectName};
use stevedore_core::domain::module::{DeploymentStatus, MatchPolicy, ModuleIdentity};
use stevedore_core::infrastructure::in_memory::{
    CompletionModel, InMemoryConnectionProvider, InMemoryManagementServer, ListingNaming,
};
use tempfile::TempDir;

const DEPLOYER: &str = "jboss.system:service=MainDeployer";

fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        progress_timeout: Duration::from_secs(300),
        poll: PollPolicy { max_attempts: 30, interval: Duration::from_secs(1) },
    }
}

fn server() -> InMemoryManagementServer {
    InMemoryManagementServer::new(ObjectName::new(DEPLOYER))
}

fn notifying_server() -> InMemoryManagementServer {
    server().with_completion(CompletionModel::Notifications { delay: Duration::from_millis(250) })
}

fn artifact(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, b"PK\x03\x04").unwrap();
    path
}

struct Harness {
    server: Arc<InMemoryManagementServer>,
    orchestrator: DeploymentOrchestrator,
    dir: TempDir,
}

impl Harness {
    async fn new(server: InMemoryManagementServer, kind: BackendKind) -> Self {
        Self::with(server, kind, MatchPolicy::Exact, settings()).await
    }

    async fn with(
        server: InMemoryManagementServer,
        kind: BackendKind,
        match_policy: MatchPolicy,
        settings: OrchestratorSettings,
    ) -> Self {
        let server = Arc::new(server);
        let provider = Arc::new(InMemoryConnectionProvider::new(server.clone()));
        let backend = BackendConfig {
            backend_type: kind,
            deployer: DEPLOYER.to_string(),
            match_policy,
        };

        let orchestrator = DeploymentOrchestrator::connect(
            create_backend(&backend, provider),
            create_resolver(IdentityScheme::FileName),
            &Endpoint::new("mem://management"),
            None,
            settings,
        )
        .await
        .unwrap();

        Self { server, orchestrator, dir: tempfile::tempdir().unwrap() }
    }

    fn artifact(&self, name: &str) -> PathBuf {
        artifact(&self.dir, name)
    }
}

async fn deploy_then_undeploy(kind: BackendKind, server: InMemoryManagementServer) {
    let h = Harness::new(server, kind).await;
    let app = h.artifact("app1.ear");

    let module = h.orchestrator.deploy_module(&app).await.unwrap();

    assert_eq!(module, ModuleIdentity::new("app1.ear"));
    assert_eq!(h.server.call_count("distribute"), 1);
    assert_eq!(h.server.call_count("start"), 1);
    assert!(h.orchestrator.is_deployed(&app).await.unwrap());
    assert!(h.server.running().contains("app1.ear"));
    assert_eq!(h.orchestrator.status(&module).await.unwrap(), DeploymentStatus::Running);

    h.orchestrator.undeploy(&module).await.unwrap();

    assert_eq!(h.server.call_count("stop"), 1);
    assert_eq!(h.server.call_count("undeploy"), 1);
    assert!(!h.orchestrator.is_deployed(&app).await.unwrap());
    assert_eq!(h.orchestrator.status(&module).await.unwrap(), DeploymentStatus::NotPresent);
}

#[tokio::test(start_paused = true)]
async fn test_deploy_and_undeploy_on_listing_backend() {
    deploy_then_undeploy(BackendKind::Listing, server()).await;
}

#[tokio::test(start_paused = true)]
async fn test_deploy_and_undeploy_on_notifying_backend() {
    deploy_then_undeploy(BackendKind::Notifying, notifying_server()).await;
}

#[tokio::test(start_paused = true)]
async fn test_deploy_over_running_module_undeploys_first() {
    let h = Harness::new(server().with_running("app1.ear"), BackendKind::Listing).await;
    let app = h.artifact("app1.ear");

    h.orchestrator.deploy_module(&app).await.unwrap();

    assert_eq!(h.server.calls(), vec!["stop", "undeploy", "distribute", "start"]);
    assert!(h.server.running().contains("app1.ear"));
}

#[tokio::test(start_paused = true)]
async fn test_redeploy_twice_leaves_module_running() {
    for (kind, server) in [(BackendKind::Listing, server()), (BackendKind::Notifying, notifying_server())] {
        let h = Harness::new(server, kind).await;
        let app = h.artifact("app1.ear");

        let first = h.orchestrator.redeploy_module(&app).await.unwrap();
        assert_eq!(h.orchestrator.status(&first).await.unwrap(), DeploymentStatus::Running);

        let second = h.orchestrator.redeploy_module(&app).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(h.orchestrator.status(&second).await.unwrap(), DeploymentStatus::Running);
        assert_eq!(h.server.call_count("distribute"), 2);
    }
}

#[tokio::test(start_paused = true)]
async fn test_install_over_present_module_is_a_duplicate() {
    let h = Harness::new(server().with_available("app1.ear"), BackendKind::Listing).await;
    let app = h.artifact("app1.ear");

    let err = h.orchestrator.install(&app).await.unwrap_err();

    assert!(matches!(err, DeployError::DuplicateModule(ref m) if m.as_str() == "app1.ear"));
    assert!(h.server.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_install_absent_module() {
    let h = Harness::new(server(), BackendKind::Listing).await;
    let app = h.artifact("app2.war");

    let module = h.orchestrator.install(&app).await.unwrap();

    assert_eq!(h.server.calls(), vec!["distribute", "start"]);
    assert_eq!(h.orchestrator.status(&module).await.unwrap(), DeploymentStatus::Running);
}

#[tokio::test(start_paused = true)]
async fn test_lagging_listings_are_polled_until_consistent() {
    let h = Harness::new(server().with_listing_lag(3), BackendKind::Listing).await;
    let app = h.artifact("app1.ear");
    let started = tokio::time::Instant::now();

    h.orchestrator.deploy_module(&app).await.unwrap();

    // Three stale reads per step, one second apart
    assert!(started.elapsed() >= Duration::from_secs(6));
    assert_eq!(h.server.call_count("distribute"), 1);
    assert_eq!(h.server.call_count("start"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reported_failure_aborts_deploy_at_distribute() {
    let server = notifying_server();
    server.fail_operation("distribute", "insufficient disk space on server-one");
    let h = Harness::new(server, BackendKind::Notifying).await;
    let app = h.artifact("app1.ear");

    let err = h.orchestrator.deploy_module(&app).await.unwrap_err();

    match err {
        DeployError::DeploymentFailed { module, step, cause } => {
            assert_eq!(module.as_str(), "app1.ear");
            assert_eq!(step, LifecycleStep::Distribute);
            assert_eq!(cause, FailureCause::Reported("insufficient disk space on server-one".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.server.call_count("start"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_silent_backend_times_out_after_progress_bound() {
    let server = notifying_server();
    server.silence_operation("start");
    let h = Harness::new(server, BackendKind::Notifying).await;
    let app = h.artifact("app1.ear");
    let started = tokio::time::Instant::now();

    let err = h.orchestrator.deploy_module(&app).await.unwrap_err();

    assert!(err.is_timed_out());
    assert_eq!(err.step(), Some(LifecycleStep::Start));
    assert!(started.elapsed() >= Duration::from_secs(300));
    assert_eq!(
        err.cause(),
        Some(&FailureCause::TimedOut { waited: Duration::from_secs(300) })
    );
}

#[tokio::test(start_paused = true)]
async fn test_listing_that_never_catches_up_times_out() {
    let h = Harness::new(server().with_listing_lag(100), BackendKind::Listing).await;
    let app = h.artifact("app1.ear");
    let started = tokio::time::Instant::now();

    let err = h.orchestrator.deploy_module(&app).await.unwrap_err();

    // Thirty reads, one second apart, with no sleep after the last
    assert!(started.elapsed() >= Duration::from_secs(29));
    assert!(err.is_timed_out());
    assert_eq!(err.step(), Some(LifecycleStep::Distribute));
    assert_eq!(
        err.cause(),
        Some(&FailureCause::NotConfirmed { listing: Listing::Available, attempts: 30 })
    );
    assert_eq!(h.server.call_count("start"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_start_and_stop_are_idempotent() {
    let h = Harness::new(server(), BackendKind::Listing).await;
    let app = h.artifact("app1.ear");
    let module = h.orchestrator.deploy_module(&app).await.unwrap();

    h.orchestrator.stop(&module).await.unwrap();
    h.orchestrator.stop(&module).await.unwrap();
    assert_eq!(h.server.call_count("stop"), 1);
    assert_eq!(h.orchestrator.status(&module).await.unwrap(), DeploymentStatus::Available);
    assert!(h.orchestrator.is_deployed(&app).await.unwrap());

    h.orchestrator.start(&module).await.unwrap();
    h.orchestrator.start(&module).await.unwrap();
    assert_eq!(h.server.call_count("start"), 2);
    assert_eq!(h.orchestrator.status(&module).await.unwrap(), DeploymentStatus::Running);
}

#[tokio::test(start_paused = true)]
async fn test_undeploy_of_absent_module_is_a_no_op() {
    let h = Harness::new(server(), BackendKind::Listing).await;

    h.orchestrator.undeploy(&ModuleIdentity::new("ghost.ear")).await.unwrap();

    assert!(h.server.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_undeploy_failure_names_the_step() {
    let server = server().with_running("app1.ear");
    server.fail_operation("stop", "module is wedged");
    let h = Harness::new(server, BackendKind::Listing).await;

    let err = h.orchestrator.undeploy(&ModuleIdentity::new("app1.ear")).await.unwrap_err();

    assert!(matches!(err, DeployError::UndeployFailed { step: LifecycleStep::Stop, .. }));
    assert_eq!(h.server.call_count("undeploy"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_deploys_of_one_module_are_serialized() {
    let h = Harness::new(notifying_server(), BackendKind::Notifying).await;
    let app = h.artifact("app1.ear");

    let (first, second) = tokio::join!(h.orchestrator.deploy_module(&app), h.orchestrator.deploy_module(&app));

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(h.server.calls(), vec!["distribute", "start", "stop", "undeploy", "distribute", "start"]);
}

#[tokio::test(start_paused = true)]
async fn test_substring_matching_is_opt_in() {
    let exact = Harness::with(
        server().with_naming(ListingNaming::Url),
        BackendKind::Listing,
        MatchPolicy::Exact,
        OrchestratorSettings {
            progress_timeout: Duration::from_secs(300),
            poll: PollPolicy { max_attempts: 2, interval: Duration::from_secs(1) },
        },
    )
    .await;
    let err = exact.orchestrator.deploy_module(&exact.artifact("app1.ear")).await.unwrap_err();
    assert!(matches!(err.cause(), Some(FailureCause::NotConfirmed { .. })));

    let substring = Harness::with(
        server().with_naming(ListingNaming::Url),
        BackendKind::Listing,
        MatchPolicy::Substring,
        settings(),
    )
    .await;
    let app = substring.artifact("app1.ear");
    let module = substring.orchestrator.deploy_module(&app).await.unwrap();

    assert_eq!(module.as_str(), "app1.ear");
    assert!(substring.orchestrator.is_deployed(&app).await.unwrap());
    assert!(substring.server.running().iter().any(|listed| listed.starts_with("file:")));
}

#[tokio::test(start_paused = true)]
async fn test_close_is_idempotent_and_ends_the_session() {
    let h = Harness::new(server(), BackendKind::Listing).await;
    let app = h.artifact("app1.ear");

    h.orchestrator.close().await;
    h.orchestrator.close().await;

    assert_eq!(h.server.close_count(), 1);
    assert!(h.orchestrator.is_closed().await);
    assert!(matches!(h.orchestrator.deploy_module(&app).await, Err(DeployError::SessionClosed)));
    assert!(matches!(h.orchestrator.is_deployed(&app).await, Err(DeployError::SessionClosed)));
}

#[tokio::test]
async fn test_close_releases_telemetry_connection() {
    let server = Arc::new(server().with_targets(&["cluster-a", "cluster-b"]));
    let provider = Arc::new(InMemoryConnectionProvider::new(server.clone()));
    let backend = BackendConfig {
        backend_type: BackendKind::Listing,
        deployer: DEPLOYER.to_string(),
        match_policy: MatchPolicy::Exact,
    };

    let orchestrator = DeploymentOrchestrator::connect(
        create_backend(&backend, provider.clone()),
        create_resolver(IdentityScheme::FileName),
        &Endpoint::new("mem://management"),
        Some(&Endpoint::new("mem://telemetry")),
        settings(),
    )
    .await
    .unwrap();

    assert_eq!(provider.connect_count(), 2);
    let targets = orchestrator.targets().await.unwrap();
    assert_eq!(targets.as_slice(), ["cluster-a".to_string(), "cluster-b".to_string()]);

    orchestrator.close().await;
    assert_eq!(server.close_count(), 2);
}

#[tokio::test]
async fn test_rejected_credentials_fail_to_connect() {
    let server = Arc::new(server());
    let provider = Arc::new(InMemoryConnectionProvider::new(server).with_credentials("admin", "secret"));
    let backend = BackendConfig {
        backend_type: BackendKind::Listing,
        deployer: DEPLOYER.to_string(),
        match_policy: MatchPolicy::Exact,
    };

    let result = DeploymentOrchestrator::connect(
        create_backend(&backend, provider),
        create_resolver(IdentityScheme::FileName),
        &Endpoint::new("mem://management").with_credentials("admin", "wrong"),
        None,
        settings(),
    )
    .await;

    assert!(matches!(result, Err(DeployError::Connection(ConnectionError::Authentication(_)))));
}

#[tokio::test(start_paused = true)]
async fn test_missing_artifact_is_rejected_before_any_call() {
    let h = Harness::new(server(), BackendKind::Listing).await;
    let missing = h.dir.path().join("missing.ear");

    let err = h.orchestrator.deploy_module(&missing).await.unwrap_err();

    assert!(matches!(err, DeployError::Artifact(_)));
    assert!(h.server.calls().is_empty());
}
