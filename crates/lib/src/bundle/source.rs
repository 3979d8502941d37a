use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::info;

use super::{Bundle, BundleError, Repository, git, walk};
use crate::sync::BundleSource;

/// Build a bundle from the tip of the configured branch.
///
/// The clone lives in a scratch directory that is removed once the files have
/// been read into memory.
pub fn build_bundle(
  repository: &Repository,
  customisation_selector: &str,
  decryption_key: Option<&[u8]>,
) -> Result<Bundle, BundleError> {
  let scratch = TempDir::new().map_err(BundleError::ScratchDir)?;

  let hash = git::shallow_clone(repository, scratch.path())?;

  let mut bundle = Bundle::new(hash);
  for file in walk::collect_files(scratch.path(), customisation_selector, decryption_key)? {
    bundle.push(file);
  }

  info!(
    repo = %repository.url,
    commit_hash = %bundle.hash,
    files = bundle.files.len(),
    "bundle created"
  );
  Ok(bundle)
}

/// [`BundleSource`] backed by a git remote.
///
/// Git operations block, so they run on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct GitBundleSource {
  repository: Repository,
  customisation_selector: String,
  decryption_key: Option<Arc<[u8]>>,
}

impl GitBundleSource {
  pub fn new(repository: Repository, customisation_selector: impl Into<String>, decryption_key: Option<Vec<u8>>) -> Self {
    Self {
      repository,
      customisation_selector: customisation_selector.into(),
      decryption_key: decryption_key.map(Arc::from),
    }
  }

  pub fn repository(&self) -> &Repository {
    &self.repository
  }
}

#[async_trait]
impl BundleSource for GitBundleSource {
  fn location(&self) -> &str {
    &self.repository.url
  }

  async fn remote_head(&self) -> Result<String, BundleError> {
    let repository = self.repository.clone();
    tokio::task::spawn_blocking(move || git::remote_head(&repository)).await?
  }

  async fn build(&self) -> Result<Bundle, BundleError> {
    let repository = self.repository.clone();
    let selector = self.customisation_selector.clone();
    let key = self.decryption_key.clone();
    tokio::task::spawn_blocking(move || build_bundle(&repository, &selector, key.as_deref())).await?
  }
}
