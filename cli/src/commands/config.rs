// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use stevedore_core::domain::backend::BackendKind;
use stevedore_core::domain::config::DeployerConfigManifest;

pub const SAMPLE_CONFIG: &str = include_str!("../../templates/stevedore.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./stevedore.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output } => generate(output).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. STEVEDORE_CONFIG_PATH: {}",
            std::env::var("STEVEDORE_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./stevedore.yaml");
        println!("  4. ~/.stevedore/config.yaml");
        println!("  5. /etc/stevedore/config.yaml");
        println!();
    }

    let config = DeployerConfigManifest::load(config_override).context("Failed to load configuration")?;
    let spec = &config.spec;

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Target:".bold());
    println!("  Name: {}", config.metadata.name);
    if let Some(labels) = &config.metadata.labels {
        for (key, value) in labels {
            println!("  {}: {}", key, value);
        }
    }
    println!();

    println!("{}", "Backend:".bold());
    println!("  Type: {}", spec.backend.backend_type);
    println!("  Deployer: {}", spec.backend.deployer);
    println!("  Match: {:?}", spec.backend.match_policy);
    println!("  Identity: {:?}", spec.identity);
    println!();

    println!("{}", "Endpoints:".bold());
    println!("  Management: {}", spec.endpoint.url);
    if let Some(user) = &spec.endpoint.username {
        println!("    User: {}", user);
    }
    match &spec.telemetry {
        Some(telemetry) => println!("  Telemetry: {}", telemetry.url),
        None => println!("  Telemetry: {}", "(management connection)".dimmed()),
    }
    println!();

    println!("{}", "Timeouts:".bold());
    println!("  Progress: {:?}", spec.timeouts.progress);
    println!(
        "  Listing poll: {} x {:?}",
        spec.timeouts.poll_attempts, spec.timeouts.poll_interval
    );
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = DeployerConfigManifest::load(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    if config.spec.backend.backend_type == BackendKind::Notifying {
        println!(
            "{}",
            "! Notifying backends need a connection that supports notifications; the Jolokia bridge does not"
                .yellow()
        );
    }

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf) -> Result<()> {
    std::fs::write(&output, SAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config_is_valid() {
        let config = DeployerConfigManifest::from_yaml_str(SAMPLE_CONFIG).unwrap();
        config.validate().unwrap();
        assert_eq!(config.spec.backend.backend_type, BackendKind::Listing);
        assert_eq!(config.spec.endpoint.password.as_deref(), Some("env:STEVEDORE_PASSWORD"));
    }

    #[tokio::test]
    async fn test_generate_writes_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("stevedore.yaml");

        generate(output.clone()).await.unwrap();

        let loaded = DeployerConfigManifest::from_yaml_file(&output).unwrap();
        assert_eq!(loaded.metadata.name, "local");
    }
}
