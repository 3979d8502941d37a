//! Implementation of the `gear run` command.
//!
//! Starts the sync loop and keeps it running until SIGINT or SIGTERM. A signal
//! lets the current tick finish before the process exits.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;

use gear_lib::deploy::{DockerCompose, RuntimeActivator};
use gear_lib::state::StateStore;
use gear_lib::sync::UpdateSyncLoop;

use super::{bundle_source, load_config, runtime};
use crate::logging;

pub fn cmd_run(config_path: &Path, verbose: bool) -> Result<()> {
  let config = load_config(config_path)?;
  logging::init(verbose, config.is_production());

  let source = bundle_source(&config)?;
  let store = StateStore::new(config.state_file());
  let orchestrator = DockerCompose::new(config.compose.program.clone());
  let mut activator = RuntimeActivator::new(config.deployment.directory.clone(), store, orchestrator);
  let sync = UpdateSyncLoop::new(source, config.sync_interval());

  info!(
    config = %config_path.display(),
    environment = %config.environment,
    deployment_dir = %config.deployment.directory.display(),
    "gear agent starting"
  );

  runtime()?.block_on(async move {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let agent = tokio::spawn(async move {
      sync.run(&mut activator, shutdown_rx).await;
    });

    shutdown_signal().await?;
    info!("shutdown requested, waiting for the current tick to finish");
    // The loop may already be gone; nothing to signal then.
    let _ = shutdown_tx.send(true);

    agent.await.context("Sync loop task failed")?;
    info!("gear agent stopped");
    Ok::<(), anyhow::Error>(())
  })
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
  use tokio::signal::unix::{SignalKind, signal};

  let mut terminate = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
  tokio::select! {
    res = tokio::signal::ctrl_c() => res.context("Failed to listen for SIGINT")?,
    _ = terminate.recv() => {}
  }
  Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
  tokio::signal::ctrl_c().await.context("Failed to listen for ctrl-c")
}
