//! Agent configuration.
//!
//! The configuration is a YAML file describing the repository to follow, where
//! bundles are deployed and how often to poll:
//!
//! ```yaml
//! environment: PROD
//! sync_interval: 60
//! encryption_key_file: /etc/gear/age.key
//! repository:
//!   url: git@github.com:acme/deployments.git
//!   branch: main
//!   ssh_key_file: /etc/gear/id_ed25519
//!   override_identifier: edge-01
//! deployment:
//!   directory: /var/lib/gear
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::bundle::Repository;
use crate::consts::STATE_FILENAME;

/// Environment name that switches logging to JSON output.
pub const PRODUCTION_ENVIRONMENT: &str = "PROD";

/// Errors that can occur while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The configuration file could not be read.
  #[error("failed to read config '{0}': {1}")]
  Read(PathBuf, #[source] io::Error),

  /// The configuration file is not valid YAML for the expected schema.
  #[error("failed to parse config '{0}': {1}")]
  Parse(PathBuf, #[source] serde_yaml::Error),

  /// A required value is missing or out of range.
  #[error("invalid config: {0}")]
  Invalid(&'static str),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
  pub url: String,
  pub branch: String,
  #[serde(default)]
  pub ssh_key_file: Option<PathBuf>,
  /// Identifier of this deployment target, used to select `customise/` overrides.
  #[serde(default)]
  pub override_identifier: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentConfig {
  pub directory: PathBuf,
  #[serde(default)]
  pub state_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComposeConfig {
  #[serde(default = "default_compose_program")]
  pub program: String,
}

impl Default for ComposeConfig {
  fn default() -> Self {
    Self {
      program: default_compose_program(),
    }
  }
}

fn default_compose_program() -> String {
  "docker".to_string()
}

fn default_environment() -> String {
  PRODUCTION_ENVIRONMENT.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default = "default_environment")]
  pub environment: String,
  /// Poll interval in seconds.
  pub sync_interval: Option<u64>,
  #[serde(default)]
  pub encryption_key_file: Option<PathBuf>,
  pub repository: RepositoryConfig,
  pub deployment: DeploymentConfig,
  #[serde(default)]
  pub compose: ComposeConfig,
}

impl Config {
  /// Read, parse and validate the configuration at `path`.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    Self::from_yaml(&content).map_err(|e| match e {
      ConfigError::Parse(_, source) => ConfigError::Parse(path.to_path_buf(), source),
      other => other,
    })
  }

  /// Parse and validate configuration from a YAML string.
  pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
    let mut config: Config = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&mut self) -> Result<(), ConfigError> {
    if self.deployment.directory.as_os_str().is_empty() {
      return Err(ConfigError::Invalid("invalid deployment directory"));
    }
    if self.repository.branch.trim().is_empty() {
      return Err(ConfigError::Invalid("invalid branch"));
    }
    if self.repository.url.trim().is_empty() {
      return Err(ConfigError::Invalid("invalid repository url"));
    }
    if self.repository.ssh_key_file.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
      return Err(ConfigError::Invalid("invalid ssh key file"));
    }
    match self.sync_interval {
      None | Some(0) => return Err(ConfigError::Invalid("invalid sync interval")),
      Some(_) => {}
    }
    if self.environment.trim().is_empty() {
      self.environment = default_environment();
    }
    if self.repository.override_identifier.is_empty() {
      warn!(
        repo = %self.repository.url,
        "no override_identifier configured, every file under customise/ will be treated as an override"
      );
    }
    Ok(())
  }

  pub fn sync_interval(&self) -> Duration {
    Duration::from_secs(self.sync_interval.unwrap_or(1))
  }

  pub fn is_production(&self) -> bool {
    self.environment.eq_ignore_ascii_case(PRODUCTION_ENVIRONMENT)
  }

  /// Path of the deployment state file.
  pub fn state_file(&self) -> PathBuf {
    self
      .deployment
      .state_file
      .clone()
      .unwrap_or_else(|| self.deployment.directory.join(STATE_FILENAME))
  }

  pub fn repository(&self) -> Repository {
    Repository {
      url: self.repository.url.clone(),
      branch: self.repository.branch.clone(),
      ssh_key_file: self.repository.ssh_key_file.clone(),
    }
  }
}
