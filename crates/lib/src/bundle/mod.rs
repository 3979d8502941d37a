//! Bundle construction.
//!
//! A bundle is the filtered, decrypted set of service definition files at one
//! commit of the deployment repository.
//!
//! # Modules
//!
//! - [`git`] - Remote head lookup and shallow clones
//! - [`walk`] - Tree walk, file classification and decryption
//! - [`source`] - [`GitBundleSource`], the sync loop's view of the remote
//! - [`types`] - Core bundle types

#[cfg(test)]
mod fixtures;
pub mod git;
pub mod source;
mod types;
pub mod walk;

use std::path::PathBuf;

use thiserror::Error;

use crate::secrets::DecryptError;

pub use source::{GitBundleSource, build_bundle};
pub use types::*;

/// Errors that can occur while resolving the remote or building a bundle.
#[derive(Debug, Error)]
pub enum BundleError {
  /// Failed to create the scratch directory for the clone.
  #[error("failed to create scratch directory: {0}")]
  ScratchDir(#[source] std::io::Error),

  /// Failed to list the remote's references.
  #[error("failed to list remote '{url}': {source}")]
  RemoteList {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// The configured branch does not exist on the remote.
  #[error("branch '{branch}' not found on remote '{url}'")]
  BranchNotFound { url: String, branch: String },

  /// Failed to clone the repository.
  #[error("failed to clone repository '{url}': {source}")]
  Clone {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// Failed to resolve HEAD of the fresh clone.
  #[error("failed to resolve HEAD: {0}")]
  ResolveHead(String),

  /// Failed to walk the checked out tree.
  #[error("failed to walk repository tree: {0}")]
  Walk(#[from] walkdir::Error),

  /// Failed to read a file from the checked out tree.
  #[error("failed to read '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// An encrypted file could not be decrypted; the whole build is aborted.
  #[error("failed to decrypt secret: {0}")]
  Decrypt(#[from] DecryptError),

  /// The blocking git task panicked or was cancelled.
  #[error("git task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}
