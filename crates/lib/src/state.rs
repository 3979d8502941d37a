//! Deployment state persistence.
//!
//! The deployment state records which commit was last activated and which
//! service projects it started. It is the single source of truth for "what is
//! currently running" and is only rewritten after a fully successful
//! activation.
//!
//! # Example State File
//!
//! ```yaml
//! currentHash: 3f1c2a9e...
//! deployedServices:
//!   - web
//!   - worker
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// What is currently deployed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentState {
  /// Commit hash of the last fully activated bundle. Empty if nothing was deployed.
  #[serde(default)]
  pub current_hash: String,

  /// Service projects started by that activation, in start order.
  #[serde(default)]
  pub deployed_services: Vec<String>,
}

impl DeploymentState {
  /// Returns true if nothing has been deployed yet.
  pub fn is_empty(&self) -> bool {
    self.current_hash.is_empty()
  }
}

/// Errors that can occur when saving deployment state.
#[derive(Debug, Error)]
pub enum StateError {
  /// Failed to create the directory holding the state file.
  #[error("failed to create state directory '{0}': {1}")]
  CreateDir(PathBuf, #[source] io::Error),

  /// Failed to serialize the state.
  #[error("failed to serialize deployment state: {0}")]
  Serialize(#[source] serde_yaml::Error),

  /// Failed to write the state file.
  #[error("failed to write deployment state '{0}': {1}")]
  Write(PathBuf, #[source] io::Error),
}

/// Loads and saves the deployment state file.
#[derive(Debug, Clone)]
pub struct StateStore {
  path: PathBuf,
}

impl StateStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Load the persisted state.
  ///
  /// Never fails: a missing file means nothing is deployed yet, and an
  /// unreadable or corrupt file is logged and treated the same way.
  pub fn load(&self) -> DeploymentState {
    let content = match fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        warn!(path = %self.path.display(), "no deployment state found, starting fresh");
        return DeploymentState::default();
      }
      Err(e) => {
        warn!(path = %self.path.display(), error = %e, "unable to read deployment state, starting fresh");
        return DeploymentState::default();
      }
    };

    match serde_yaml::from_str::<Option<DeploymentState>>(&content) {
      Ok(state) => {
        let state = state.unwrap_or_default();
        info!(
          path = %self.path.display(),
          commit_hash = %state.current_hash,
          services = state.deployed_services.len(),
          "loaded deployment state"
        );
        state
      }
      Err(e) => {
        warn!(path = %self.path.display(), error = %e, "invalid deployment state found, starting fresh");
        DeploymentState::default()
      }
    }
  }

  /// Persist a new state, replacing the previous one.
  ///
  /// Uses atomic write (write to temp, then rename) so a crash never leaves a
  /// partially written file behind.
  pub fn save(&self, current_hash: &str, deployed_services: Vec<String>) -> Result<DeploymentState, StateError> {
    let state = DeploymentState {
      current_hash: current_hash.to_string(),
      deployed_services,
    };

    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent).map_err(|e| StateError::CreateDir(parent.to_path_buf(), e))?;
    }

    let content = serde_yaml::to_string(&state).map_err(StateError::Serialize)?;

    let mut temp_name = self.path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    fs::write(&temp_path, &content).map_err(|e| StateError::Write(temp_path.clone(), e))?;
    fs::rename(&temp_path, &self.path).map_err(|e| StateError::Write(self.path.clone(), e))?;

    info!(
      path = %self.path.display(),
      commit_hash = %state.current_hash,
      services = ?state.deployed_services,
      "deployment state saved"
    );
    Ok(state)
  }
}
