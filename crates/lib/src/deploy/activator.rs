//! Bundle activation.
//!
//! Activation moves the running services from the previous bundle to a new
//! one:
//!
//! 1. Persist the bundle files to `<deployment_dir>/<hash>/`
//! 2. Stop and remove every project of the current deployment state
//! 3. Start every service of the new bundle, with its override if any
//! 4. Save the new deployment state
//!
//! Every step is fail-fast. There is no rollback: a failure in step 2 or 3
//! can leave services stopped, and the error names the stage so an operator
//! can see where reconciliation stopped. The deployment state only advances
//! when every service started.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info, warn};

use super::compose::{ComposeError, ComposeProject, Orchestrator};
use super::overrides::OverrideIndex;
use crate::bundle::Bundle;
use crate::consts::SERVICE_EXTENSION;
use crate::state::{DeploymentState, StateError, StateStore};
use crate::sync::BundleActivator;

/// Step of the activation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationStage {
  Persist,
  Stop,
  Start,
  StateSave,
}

impl fmt::Display for ActivationStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ActivationStage::Persist => "persist",
      ActivationStage::Stop => "stop",
      ActivationStage::Start => "start",
      ActivationStage::StateSave => "state-save",
    };
    f.write_str(name)
  }
}

/// Errors that abort an activation.
#[derive(Debug, Error)]
pub enum ActivateError {
  /// Writing the bundle to disk failed. Nothing else was touched.
  #[error("[persist] failed to write '{path}': {source}")]
  Persist {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Stopping a previously deployed project failed.
  #[error("[stop] failed to stop project '{project}': {source}")]
  Stop {
    project: String,
    #[source]
    source: ComposeError,
  },

  /// Starting a project of the new bundle failed.
  #[error("[start] failed to start project '{project}': {source}")]
  Start {
    project: String,
    #[source]
    source: ComposeError,
  },

  /// Every project started but the new state could not be saved.
  #[error("[state-save] failed to save deployment state: {0}")]
  StateSave(#[source] StateError),
}

impl ActivateError {
  pub fn stage(&self) -> ActivationStage {
    match self {
      ActivateError::Persist { .. } => ActivationStage::Persist,
      ActivateError::Stop { .. } => ActivationStage::Stop,
      ActivateError::Start { .. } => ActivationStage::Start,
      ActivateError::StateSave(_) => ActivationStage::StateSave,
    }
  }
}

/// Reconciles running services with bundles.
///
/// Owns the deployment state. `activate` takes `&mut self`, so activations
/// are serialized by construction.
pub struct RuntimeActivator<O> {
  deployment_dir: PathBuf,
  store: StateStore,
  state: DeploymentState,
  orchestrator: O,
}

impl<O: Orchestrator> RuntimeActivator<O> {
  /// Create an activator, loading the persisted deployment state.
  pub fn new(deployment_dir: impl Into<PathBuf>, store: StateStore, orchestrator: O) -> Self {
    let state = store.load();
    Self {
      deployment_dir: deployment_dir.into(),
      store,
      state,
      orchestrator,
    }
  }

  pub fn state(&self) -> &DeploymentState {
    &self.state
  }

  pub fn orchestrator(&self) -> &O {
    &self.orchestrator
  }

  /// Directory holding the files of the bundle with the given hash.
  pub fn bundle_dir(&self, hash: &str) -> PathBuf {
    self.deployment_dir.join(hash)
  }

  /// Make `bundle` the running deployment.
  pub async fn activate(&mut self, bundle: &Bundle) -> Result<(), ActivateError> {
    if !self.state.is_empty() && self.state.current_hash == bundle.hash {
      info!(commit_hash = %bundle.hash, "bundle already active, nothing to do");
      return Ok(());
    }

    info!(
      commit_hash = %bundle.hash,
      previous_hash = %self.state.current_hash,
      "activating bundle"
    );

    let directory = self.persist(bundle).await?;
    self.stop_current().await?;
    let started = self.start_bundle(bundle, &directory).await?;

    let state = self.store.save(&bundle.hash, started).map_err(|e| {
      error!(commit_hash = %bundle.hash, error = %e, "unable to update deployment state");
      ActivateError::StateSave(e)
    })?;
    self.state = state;

    info!(commit_hash = %bundle.hash, services = ?self.state.deployed_services, "bundle activated");
    Ok(())
  }

  async fn persist(&self, bundle: &Bundle) -> Result<PathBuf, ActivateError> {
    let directory = self.bundle_dir(&bundle.hash);
    tokio::fs::create_dir_all(&directory)
      .await
      .map_err(|source| ActivateError::Persist {
        path: directory.clone(),
        source,
      })?;

    info!(commit_hash = %bundle.hash, directory = %directory.display(), "persisting bundle");

    for file in &bundle.files {
      let path = directory.join(&file.file_name);
      tokio::fs::write(&path, &file.data)
        .await
        .map_err(|source| ActivateError::Persist {
          path: path.clone(),
          source,
        })?;
      info!(file_name = %path.display(), "persisted bundle file");
    }

    Ok(directory)
  }

  async fn stop_current(&self) -> Result<(), ActivateError> {
    let old_directory = self.bundle_dir(&self.state.current_hash);

    for name in &self.state.deployed_services {
      info!(project = %name, commit_hash = %self.state.current_hash, "stopping runtime");

      let project = ComposeProject::resolve(name, &old_directory, vec![service_file(name)])
        .map_err(|source| stop_error(name, source))?;
      self
        .orchestrator
        .down(&project)
        .await
        .map_err(|source| stop_error(name, source))?;
    }

    Ok(())
  }

  async fn start_bundle(&self, bundle: &Bundle, directory: &Path) -> Result<Vec<String>, ActivateError> {
    let overrides = OverrideIndex::build(bundle);
    let mut started = Vec::new();

    for service in bundle.services() {
      let Some(name) = service.project_name() else {
        continue;
      };
      info!(project = %name, "starting runtime");

      let mut files = vec![service.file_name.clone()];
      if let Some(custom) = overrides.get(name) {
        info!(project = %name, override_file = %custom.file_name, "found override for runtime");
        files.push(custom.file_name.clone());
      }

      let project = ComposeProject::resolve(name, directory, files).map_err(|source| start_error(name, source))?;
      self
        .orchestrator
        .up(&project)
        .await
        .map_err(|source| start_error(name, source))?;

      info!(project = %name, "runtime deployed");
      started.push(name.to_string());
    }

    Ok(started)
  }
}

fn service_file(name: &str) -> String {
  format!("{name}.{SERVICE_EXTENSION}")
}

fn stop_error(project: &str, source: ComposeError) -> ActivateError {
  warn!(project, error = %source, "failed to stop runtime, services may be partially stopped");
  ActivateError::Stop {
    project: project.to_string(),
    source,
  }
}

fn start_error(project: &str, source: ComposeError) -> ActivateError {
  warn!(project, error = %source, "failed to start runtime");
  ActivateError::Start {
    project: project.to_string(),
    source,
  }
}

#[async_trait]
impl<O: Orchestrator> BundleActivator for RuntimeActivator<O> {
  fn current_hash(&self) -> &str {
    &self.state.current_hash
  }

  async fn activate(&mut self, bundle: &Bundle) -> Result<(), ActivateError> {
    RuntimeActivator::activate(self, bundle).await
  }
}
