mod check;
mod run;
mod status;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use gear_lib::bundle::GitBundleSource;
use gear_lib::config::Config;

pub use check::cmd_check;
pub use run::cmd_run;
pub use status::cmd_status;

fn load_config(path: &Path) -> Result<Config> {
  Config::load(path).with_context(|| format!("Failed to load config '{}'", path.display()))
}

/// Read the key files named in the config and build the bundle source.
///
/// A missing or unreadable key is fatal.
fn bundle_source(config: &Config) -> Result<GitBundleSource> {
  if let Some(path) = &config.repository.ssh_key_file {
    fs::metadata(path).with_context(|| format!("Failed to read ssh key '{}'", path.display()))?;
  }

  let decryption_key = match &config.encryption_key_file {
    Some(path) => Some(fs::read(path).with_context(|| format!("Failed to read encryption key '{}'", path.display()))?),
    None => None,
  };

  Ok(GitBundleSource::new(
    config.repository(),
    config.repository.override_identifier.clone(),
    decryption_key,
  ))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}
