//! Update sync loop.
//!
//! Polls the remote on a fixed interval. When the branch head differs from the
//! hash of the active deployment, a bundle is built and handed to the
//! activator. Ticks never overlap: a slow activation delays the next tick.
//!
//! The loop keeps no hash of its own; it always asks the activator, which owns
//! the deployment state. A failed build or activation therefore leaves the
//! hash untouched and the same update is retried on the next tick.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::bundle::{Bundle, BundleError};
use crate::deploy::ActivateError;

/// Where bundles come from.
#[async_trait]
pub trait BundleSource: Send + Sync {
  /// Human readable location, used in logs.
  fn location(&self) -> &str;

  /// Resolve the commit hash at the head of the tracked branch.
  async fn remote_head(&self) -> Result<String, BundleError>;

  /// Build a bundle from the head of the tracked branch.
  async fn build(&self) -> Result<Bundle, BundleError>;
}

/// Where bundles go.
#[async_trait]
pub trait BundleActivator: Send {
  /// Hash of the currently active bundle, empty if none.
  fn current_hash(&self) -> &str;

  /// Activate `bundle`. On success `current_hash` must return its hash.
  async fn activate(&mut self, bundle: &Bundle) -> Result<(), ActivateError>;
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
  /// Remote head matches the active deployment.
  UpToDate,
  /// A new bundle was activated.
  Activated { hash: String },
  /// The remote head could not be resolved.
  RemoteFailed,
  /// A newer commit exists but its bundle could not be built.
  BuildFailed { hash: String },
  /// The bundle was built but activation failed.
  ActivationFailed { hash: String },
}

pub struct UpdateSyncLoop<S> {
  source: S,
  poll_interval: Duration,
}

impl<S: BundleSource> UpdateSyncLoop<S> {
  pub fn new(source: S, poll_interval: Duration) -> Self {
    Self { source, poll_interval }
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  /// Run until `shutdown` turns true or its sender is dropped.
  ///
  /// The first check happens immediately. Shutdown is only observed between
  /// ticks; an in-flight activation always runs to completion.
  pub async fn run<A: BundleActivator>(&self, activator: &mut A, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(self.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
      repo = self.source.location(),
      interval_secs = self.poll_interval.as_secs(),
      "starting update sync loop"
    );

    loop {
      if *shutdown.borrow() {
        break;
      }

      tokio::select! {
        biased;
        changed = shutdown.changed() => {
          if changed.is_err() || *shutdown.borrow() {
            break;
          }
          continue;
        }
        _ = ticker.tick() => {}
      }

      self.tick(activator).await;
    }

    info!(repo = self.source.location(), "update sync loop stopped");
  }

  /// Check the remote once and activate a new bundle if there is one.
  pub async fn tick<A: BundleActivator>(&self, activator: &mut A) -> TickOutcome {
    let repo = self.source.location();

    let head = match self.source.remote_head().await {
      Ok(head) => head,
      Err(e) => {
        error!(repo, error = %e, "failed to check for project updates");
        return TickOutcome::RemoteFailed;
      }
    };

    let current = activator.current_hash();
    debug!(
      repo,
      update_available = head != current,
      new_hash = %head,
      old_hash = %current,
      "checked for project updates"
    );

    if head == current {
      return TickOutcome::UpToDate;
    }

    let bundle = match self.source.build().await {
      Ok(bundle) => bundle,
      Err(e) => {
        error!(repo, commit_hash = %head, error = %e, "failed to create bundle");
        return TickOutcome::BuildFailed { hash: head };
      }
    };

    info!(repo, commit_hash = %bundle.hash, "new version available");

    if let Err(e) = activator.activate(&bundle).await {
      error!(
        repo,
        commit_hash = %bundle.hash,
        stage = %e.stage(),
        error = %e,
        "failed to activate bundle"
      );
      return TickOutcome::ActivationFailed { hash: bundle.hash };
    }

    TickOutcome::Activated { hash: bundle.hash }
  }
}
