// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Deployer Configuration Types
//
// Defines the configuration manifest for one deployment target:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Backend family selection and deployer object name
// - Management endpoint plus optional telemetry endpoint
// - Module identity scheme
// - Progress and listing-poll bounds

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::artifact::IdentityScheme;
use crate::domain::backend::BackendKind;
use crate::domain::management::Endpoint;
use crate::domain::module::MatchPolicy;

pub const API_VERSION: &str = "stevedore/v1";
pub const KIND: &str = "DeployerConfig";

/// Bound on waiting for a terminal progress event
pub const DEFAULT_PROGRESS_TIMEOUT: Duration = Duration::from_secs(300);
/// Listing queries issued before a transition counts as unconfirmed
pub const DEFAULT_POLL_ATTEMPTS: u32 = 30;
/// Pause between listing queries
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Top-level Kubernetes-style deployer configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployerConfigManifest {
    /// API version (must be "stevedore/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "DeployerConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: DeployerConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable name of the deployment target
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployerConfigSpec {
    pub backend: BackendConfig,

    /// Management endpoint used for every mutating call
    pub endpoint: EndpointConfig,

    /// Separate endpoint for listing queries (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<EndpointConfig>,

    #[serde(default)]
    pub identity: IdentityScheme,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Message template overrides keyed by message code
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub messages: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend family: "listing" or "notifying"
    #[serde(rename = "type")]
    pub backend_type: BackendKind,

    /// Object name of the backend's deployer, e.g. "jboss.system:service=MainDeployer"
    pub deployer: String,

    /// How listed names are matched against module identities
    #[serde(default, rename = "match")]
    pub match_policy: MatchPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl EndpointConfig {
    /// Resolve secrets and produce a connectable endpoint
    pub fn resolve(&self) -> anyhow::Result<Endpoint> {
        Ok(Endpoint {
            url: self.url.clone(),
            username: self.username.clone(),
            password: resolve_secret(&self.password)?,
            connect_timeout: self.connect_timeout,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Bound on waiting for a terminal progress event
    #[serde(default = "default_progress_timeout", with = "humantime_serde")]
    pub progress: Duration,

    /// Listing queries issued while confirming a transition
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    /// Pause between listing queries
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            progress: default_progress_timeout(),
            poll_attempts: default_poll_attempts(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_progress_timeout() -> Duration {
    DEFAULT_PROGRESS_TIMEOUT
}

fn default_poll_attempts() -> u32 {
    DEFAULT_POLL_ATTEMPTS
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

/// Resolve a secret from config (supports "env:VAR_NAME" syntax)
fn resolve_secret(value: &Option<String>) -> anyhow::Result<Option<String>> {
    match value {
        Some(v) => match v.strip_prefix("env:") {
            Some(var_name) => std::env::var(var_name)
                .map(Some)
                .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
            None => Ok(Some(v.clone())),
        },
        None => Ok(None),
    }
}

impl Default for DeployerConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "local".to_string(),
                labels: None,
            },
            spec: DeployerConfigSpec {
                backend: BackendConfig {
                    backend_type: BackendKind::Listing,
                    deployer: "jboss.system:service=MainDeployer".to_string(),
                    match_policy: MatchPolicy::Exact,
                },
                endpoint: EndpointConfig {
                    url: "http://localhost:8778/jolokia".to_string(),
                    username: None,
                    password: None,
                    connect_timeout: default_connect_timeout(),
                },
                telemetry: None,
                identity: IdentityScheme::FileName,
                timeouts: TimeoutConfig::default(),
                messages: HashMap::new(),
            },
        }
    }
}

impl DeployerConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. STEVEDORE_CONFIG_PATH environment variable
    /// 2. ./stevedore.yaml (working directory)
    /// 3. ~/.stevedore/config.yaml (user home)
    /// 4. /etc/stevedore/config.yaml (system, Unix) or C:\ProgramData\Stevedore\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("STEVEDORE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./stevedore.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".stevedore").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/stevedore/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Stevedore\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration from an explicit path or by discovery.
    ///
    /// Unlike most tools there is no usable default: a deployer without an
    /// endpoint cannot do anything, so a missing file is an error.
    pub fn load(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let path = match cli_path {
            Some(path) => {
                tracing::info!("Loading configuration from explicit path: {:?}", path);
                path
            }
            None => {
                let path = Self::discover_config().ok_or_else(|| {
                    anyhow::anyhow!(
                        "No configuration file found. Pass --config, set STEVEDORE_CONFIG_PATH, \
                         or run `stevedore config generate`."
                    )
                })?;
                tracing::info!("Loading configuration from discovered path: {:?}", path);
                path
            }
        };

        let mut config = Self::from_yaml_file(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the timeout settings
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("STEVEDORE_PROGRESS_TIMEOUT") {
            match humantime_serde::re::humantime::parse_duration(&val) {
                Ok(timeout) => {
                    tracing::info!("Environment override: STEVEDORE_PROGRESS_TIMEOUT={}", val);
                    self.spec.timeouts.progress = timeout;
                }
                Err(e) => tracing::warn!(
                    "Invalid value for STEVEDORE_PROGRESS_TIMEOUT: '{}' ({}). Ignoring.",
                    val,
                    e
                ),
            }
        }

        if let Ok(val) = std::env::var("STEVEDORE_POLL_ATTEMPTS") {
            match val.parse::<u32>() {
                Ok(attempts) => {
                    tracing::info!("Environment override: STEVEDORE_POLL_ATTEMPTS={}", attempts);
                    self.spec.timeouts.poll_attempts = attempts;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for STEVEDORE_POLL_ATTEMPTS: '{}'. Expected a positive integer. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("STEVEDORE_POLL_INTERVAL") {
            match humantime_serde::re::humantime::parse_duration(&val) {
                Ok(interval) => {
                    tracing::info!("Environment override: STEVEDORE_POLL_INTERVAL={}", val);
                    self.spec.timeouts.poll_interval = interval;
                }
                Err(e) => tracing::warn!(
                    "Invalid value for STEVEDORE_POLL_INTERVAL: '{}' ({}). Ignoring.",
                    val,
                    e
                ),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!("Invalid apiVersion: '{}'. Must be '{}'", self.api_version, API_VERSION);
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.backend.deployer.trim().is_empty() {
            anyhow::bail!("spec.backend.deployer cannot be empty");
        }

        if self.spec.endpoint.url.trim().is_empty() {
            anyhow::bail!("spec.endpoint.url cannot be empty");
        }

        if let Some(telemetry) = &self.spec.telemetry {
            if telemetry.url.trim().is_empty() {
                anyhow::bail!("spec.telemetry.url cannot be empty when telemetry is configured");
            }
        }

        if self.spec.timeouts.poll_attempts == 0 {
            anyhow::bail!("spec.timeouts.poll_attempts must be at least 1");
        }

        if self.spec.timeouts.progress.is_zero() {
            anyhow::bail!("spec.timeouts.progress must be greater than zero");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
apiVersion: stevedore/v1
kind: DeployerConfig
metadata:
  name: staging
spec:
  backend:
    type: notifying
    deployer: "amx:type=deployment-manager"
    match: substring
  endpoint:
    url: http://localhost:8778/jolokia
    username: admin
    password: plain
  telemetry:
    url: http://localhost:8779/jolokia
  identity: file-url
  timeouts:
    progress: 2m
    poll_attempts: 10
    poll_interval: 500ms
"#;

    #[test]
    fn test_default_manifest() {
        let manifest = DeployerConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert_eq!(manifest.spec.timeouts.progress, Duration::from_secs(300));
        assert_eq!(manifest.spec.timeouts.poll_attempts, 30);
        assert_eq!(manifest.spec.timeouts.poll_interval, Duration::from_secs(1));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_parse_sample() {
        let manifest = DeployerConfigManifest::from_yaml_str(SAMPLE).unwrap();

        assert_eq!(manifest.metadata.name, "staging");
        assert_eq!(manifest.spec.backend.backend_type, BackendKind::Notifying);
        assert_eq!(manifest.spec.backend.match_policy, MatchPolicy::Substring);
        assert_eq!(manifest.spec.identity, IdentityScheme::FileUrl);
        assert_eq!(manifest.spec.timeouts.progress, Duration::from_secs(120));
        assert_eq!(manifest.spec.timeouts.poll_attempts, 10);
        assert_eq!(manifest.spec.timeouts.poll_interval, Duration::from_millis(500));
        assert_eq!(
            manifest.spec.telemetry.as_ref().map(|t| t.url.as_str()),
            Some("http://localhost:8779/jolokia")
        );
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_timeouts_default_when_omitted() {
        let yaml = r#"
apiVersion: stevedore/v1
kind: DeployerConfig
metadata:
  name: minimal
spec:
  backend:
    type: listing
    deployer: "jboss.system:service=MainDeployer"
  endpoint:
    url: http://localhost:8778/jolokia
"#;
        let manifest = DeployerConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.spec.backend.match_policy, MatchPolicy::Exact);
        assert_eq!(manifest.spec.identity, IdentityScheme::FileName);
        assert_eq!(manifest.spec.timeouts.poll_attempts, DEFAULT_POLL_ATTEMPTS);
        assert!(manifest.spec.telemetry.is_none());
    }

    #[test]
    fn test_validation() {
        let mut manifest = DeployerConfigManifest::default();
        assert!(manifest.validate().is_ok());

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.spec.endpoint.url = "".to_string();
        assert!(manifest.validate().is_err());
        manifest.spec.endpoint.url = "http://localhost:8778/jolokia".to_string();

        manifest.spec.timeouts.poll_attempts = 0;
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_password_env_indirection() {
        std::env::set_var("STEVEDORE_TEST_CONFIG_PASSWORD", "from-env");
        let endpoint = EndpointConfig {
            url: "http://localhost:8778/jolokia".to_string(),
            username: Some("admin".to_string()),
            password: Some("env:STEVEDORE_TEST_CONFIG_PASSWORD".to_string()),
            connect_timeout: Duration::from_secs(5),
        };

        let resolved = endpoint.resolve().unwrap();
        assert_eq!(resolved.password.as_deref(), Some("from-env"));

        let missing = EndpointConfig {
            password: Some("env:STEVEDORE_TEST_CONFIG_UNSET_VARIABLE".to_string()),
            ..endpoint
        };
        assert!(missing.resolve().is_err());
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stevedore.yaml");
        let manifest = DeployerConfigManifest::default();
        std::fs::write(&path, manifest.to_yaml_string().unwrap()).unwrap();

        let loaded = DeployerConfigManifest::load(Some(path)).unwrap();
        assert_eq!(loaded.metadata.name, manifest.metadata.name);
        assert_eq!(loaded.spec.backend.deployer, manifest.spec.backend.deployer);
    }
}
