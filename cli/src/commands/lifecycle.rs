// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Deployment lifecycle commands
//!
//! Commands: deploy, redeploy, install, undeploy, start, stop, status
//!
//! Every command opens one session against the configured target, runs,
//! and closes the session again whether or not the command succeeded.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use stevedore_core::application::backend_factory::connect_from_config;
use stevedore_core::application::DeploymentOrchestrator;
use stevedore_core::domain::config::DeployerConfigManifest;
use stevedore_core::domain::module::{DeploymentStatus, ModuleIdentity};
use stevedore_core::infrastructure::jolokia::JolokiaConnectionProvider;

#[derive(Subcommand)]
pub enum LifecycleCommand {
    /// Deploy an archive and start it, replacing any existing deployment
    Deploy {
        #[arg(value_name = "ARTIFACT")]
        artifact: PathBuf,
    },

    /// Same as deploy
    Redeploy {
        #[arg(value_name = "ARTIFACT")]
        artifact: PathBuf,
    },

    /// Distribute and start an archive; fails if it is already deployed
    Install {
        #[arg(value_name = "ARTIFACT")]
        artifact: PathBuf,
    },

    /// Stop and remove a module
    Undeploy {
        /// Module name, or the archive it was deployed from
        #[arg(value_name = "MODULE")]
        module: String,
    },

    /// Start a deployed module
    Start {
        #[arg(value_name = "MODULE")]
        module: String,
    },

    /// Stop a running module
    Stop {
        #[arg(value_name = "MODULE")]
        module: String,
    },

    /// Show deployment status of an archive
    Status {
        #[arg(value_name = "ARTIFACT")]
        artifact: PathBuf,
    },
}

pub async fn handle_command(command: LifecycleCommand, config_override: Option<PathBuf>) -> Result<()> {
    let config = DeployerConfigManifest::load(config_override).context("Failed to load configuration")?;
    let orchestrator = connect_from_config(&config, Arc::new(JolokiaConnectionProvider::new())).await?;

    let result = run(&orchestrator, command).await;
    orchestrator.close().await;
    result
}

/// Run one lifecycle command against an already connected orchestrator
pub async fn run(orchestrator: &DeploymentOrchestrator, command: LifecycleCommand) -> Result<()> {
    match command {
        LifecycleCommand::Deploy { artifact } => {
            let module = orchestrator
                .deploy_module(&artifact)
                .await
                .with_context(|| format!("Failed to deploy {}", artifact.display()))?;
            println!("{}", format!("✓ Deployed {}", module).green());
        }
        LifecycleCommand::Redeploy { artifact } => {
            let module = orchestrator
                .redeploy_module(&artifact)
                .await
                .with_context(|| format!("Failed to redeploy {}", artifact.display()))?;
            println!("{}", format!("✓ Redeployed {}", module).green());
        }
        LifecycleCommand::Install { artifact } => {
            let module = orchestrator
                .install(&artifact)
                .await
                .with_context(|| format!("Failed to install {}", artifact.display()))?;
            println!("{}", format!("✓ Installed {}", module).green());
        }
        LifecycleCommand::Undeploy { module } => {
            let module = module_argument(orchestrator, &module)?;
            orchestrator
                .undeploy(&module)
                .await
                .with_context(|| format!("Failed to undeploy {}", module))?;
            println!("{}", format!("✓ Undeployed {}", module).green());
        }
        LifecycleCommand::Start { module } => {
            let module = module_argument(orchestrator, &module)?;
            orchestrator
                .start(&module)
                .await
                .with_context(|| format!("Failed to start {}", module))?;
            println!("{}", format!("✓ {} is running", module).green());
        }
        LifecycleCommand::Stop { module } => {
            let module = module_argument(orchestrator, &module)?;
            orchestrator
                .stop(&module)
                .await
                .with_context(|| format!("Failed to stop {}", module))?;
            println!("{}", format!("✓ {} is stopped", module).green());
        }
        LifecycleCommand::Status { artifact } => {
            let module = orchestrator.identity(&artifact)?;
            let status = orchestrator.status(&module).await?;
            let deployed = orchestrator.is_deployed(&artifact).await?;
            let targets = orchestrator.targets().await?;

            println!("{}", "Deployment status:".bold());
            println!("  Module: {}", module);
            println!("  Status: {}", colorize(status));
            println!("  Deployed: {}", deployed);
            println!("  Targets: {}", targets.iter().collect::<Vec<_>>().join(", "));
        }
    }

    Ok(())
}

/// A module argument may name an archive on disk; otherwise it is taken as the module name itself
fn module_argument(orchestrator: &DeploymentOrchestrator, raw: &str) -> Result<ModuleIdentity> {
    let path = Path::new(raw);
    if path.is_file() {
        let module = orchestrator.identity(path)?;
        debug!(argument = raw, module = %module, "Resolved module from archive path");
        Ok(module)
    } else {
        Ok(ModuleIdentity::new(raw))
    }
}

fn colorize(status: DeploymentStatus) -> colored::ColoredString {
    let label = status.to_string();
    match status {
        DeploymentStatus::Running => label.green(),
        DeploymentStatus::Available => label.cyan(),
        DeploymentStatus::Transitioning => label.yellow(),
        DeploymentStatus::Failed => label.red(),
        DeploymentStatus::NotPresent => label.dimmed(),
    }
}
