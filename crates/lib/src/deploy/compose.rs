//! Container orchestration driver.
//!
//! The activator only needs a handful of lifecycle operations on a compose
//! project, captured by the [`Orchestrator`] trait. [`DockerCompose`] is the
//! implementation used in production: it shells out to `docker compose`
//! (or any CLI with the same interface, such as `podman`).

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::consts::RUNTIME_LOG_FILENAME;

/// How long `up` may take before the stack is considered failed.
pub const UP_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Errors returned by orchestration operations.
#[derive(Debug, Error)]
pub enum ComposeError {
  /// A definition file of the project does not exist.
  #[error("compose file not found: {0}")]
  MissingFile(PathBuf),

  /// The runtime log could not be opened.
  #[error("failed to open runtime log '{0}': {1}")]
  LogSink(PathBuf, #[source] io::Error),

  /// The orchestrator process could not be started.
  #[error("failed to run '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  /// The orchestrator exited unsuccessfully.
  #[error("compose {verb} failed for project '{project}' with exit code {code:?}")]
  Failed {
    verb: &'static str,
    project: String,
    code: Option<i32>,
  },

  /// The operation did not finish in time.
  #[error("compose {verb} timed out for project '{project}' after {}s", .timeout.as_secs())]
  Timeout {
    verb: &'static str,
    project: String,
    timeout: Duration,
  },
}

/// Sanitize arbitrary input into a compose project name.
///
/// Lowercases and drops everything outside `[a-z0-9_-]`.
pub fn sanitize_project_name(name: &str) -> String {
  name
    .to_lowercase()
    .chars()
    .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
    .collect()
}

/// A named compose project: a working directory and its definition files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeProject {
  /// Sanitized project name.
  pub name: String,
  pub working_dir: PathBuf,
  /// Definition files relative to `working_dir`, base first then overrides.
  pub files: Vec<String>,
}

impl ComposeProject {
  pub fn new(name: &str, working_dir: impl Into<PathBuf>, files: Vec<String>) -> Self {
    Self {
      name: sanitize_project_name(name),
      working_dir: working_dir.into(),
      files,
    }
  }

  /// Create a project and check that every definition file exists.
  pub fn resolve(name: &str, working_dir: &Path, files: Vec<String>) -> Result<Self, ComposeError> {
    let project = Self::new(name, working_dir, files);
    for file in &project.files {
      let path = project.working_dir.join(file);
      if !path.is_file() {
        return Err(ComposeError::MissingFile(path));
      }
    }
    Ok(project)
  }

  /// Where orchestrator output for this project is written.
  pub fn log_path(&self) -> PathBuf {
    self.working_dir.join(RUNTIME_LOG_FILENAME)
  }
}

/// Lifecycle operations on a compose project.
#[async_trait]
pub trait Orchestrator: Send + Sync {
  /// Create and start the project's containers, waiting until they are running.
  async fn up(&self, project: &ComposeProject) -> Result<(), ComposeError>;
  /// Stop and remove the project's containers.
  async fn down(&self, project: &ComposeProject) -> Result<(), ComposeError>;
  async fn start(&self, project: &ComposeProject) -> Result<(), ComposeError>;
  async fn stop(&self, project: &ComposeProject) -> Result<(), ComposeError>;
  async fn build(&self, project: &ComposeProject) -> Result<(), ComposeError>;
  async fn pull(&self, project: &ComposeProject) -> Result<(), ComposeError>;
}

/// [`Orchestrator`] that drives the `compose` subcommand of a container CLI.
#[derive(Debug, Clone)]
pub struct DockerCompose {
  program: String,
  up_timeout: Duration,
}

impl Default for DockerCompose {
  fn default() -> Self {
    Self::new("docker")
  }
}

impl DockerCompose {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      up_timeout: UP_TIMEOUT,
    }
  }

  pub fn with_up_timeout(mut self, timeout: Duration) -> Self {
    self.up_timeout = timeout;
    self
  }

  fn command(&self, project: &ComposeProject, verb: &'static str, args: &[&str]) -> Vec<String> {
    let mut argv = vec![
      "compose".to_string(),
      "--project-name".to_string(),
      project.name.clone(),
      "--project-directory".to_string(),
      project.working_dir.display().to_string(),
    ];
    for file in &project.files {
      argv.push("--file".to_string());
      argv.push(project.working_dir.join(file).display().to_string());
    }
    argv.push(verb.to_string());
    argv.extend(args.iter().map(|a| a.to_string()));
    argv
  }

  async fn run(
    &self,
    project: &ComposeProject,
    verb: &'static str,
    args: &[&str],
    timeout: Option<Duration>,
  ) -> Result<(), ComposeError> {
    let argv = self.command(project, verb, args);
    let log_path = project.log_path();

    let mut log = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&log_path)
      .await
      .map_err(|e| ComposeError::LogSink(log_path.clone(), e))?;
    let header = format!("$ {} {}\n", self.program, argv.join(" "));
    log
      .write_all(header.as_bytes())
      .await
      .map_err(|e| ComposeError::LogSink(log_path.clone(), e))?;
    let log = log.into_std().await;
    let stderr = log.try_clone().map_err(|e| ComposeError::LogSink(log_path.clone(), e))?;

    info!(project = %project.name, verb, "running compose");
    debug!(program = %self.program, args = ?argv, log = %log_path.display(), "spawning compose");

    let mut child = Command::new(&self.program)
      .args(&argv)
      .current_dir(&project.working_dir)
      .stdin(Stdio::null())
      .stdout(Stdio::from(log))
      .stderr(Stdio::from(stderr))
      .kill_on_drop(true)
      .spawn()
      .map_err(|source| ComposeError::Spawn {
        program: self.program.clone(),
        source,
      })?;

    let status = match timeout {
      Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
          // Dropping the child kills it.
          return Err(ComposeError::Timeout {
            verb,
            project: project.name.clone(),
            timeout: limit,
          });
        }
      },
      None => child.wait().await,
    }
    .map_err(|source| ComposeError::Spawn {
      program: self.program.clone(),
      source,
    })?;

    if !status.success() {
      return Err(ComposeError::Failed {
        verb,
        project: project.name.clone(),
        code: status.code(),
      });
    }

    debug!(project = %project.name, verb, "compose finished");
    Ok(())
  }
}

#[async_trait]
impl Orchestrator for DockerCompose {
  async fn up(&self, project: &ComposeProject) -> Result<(), ComposeError> {
    self
      .run(project, "up", &["--detach", "--wait", "--remove-orphans"], Some(self.up_timeout))
      .await
  }

  async fn down(&self, project: &ComposeProject) -> Result<(), ComposeError> {
    self.run(project, "down", &["--remove-orphans"], None).await
  }

  async fn start(&self, project: &ComposeProject) -> Result<(), ComposeError> {
    self.run(project, "start", &[], None).await
  }

  async fn stop(&self, project: &ComposeProject) -> Result<(), ComposeError> {
    self.run(project, "stop", &[], None).await
  }

  async fn build(&self, project: &ComposeProject) -> Result<(), ComposeError> {
    self.run(project, "build", &[], None).await
  }

  async fn pull(&self, project: &ComposeProject) -> Result<(), ComposeError> {
    self.run(project, "pull", &[], None).await
  }
}
