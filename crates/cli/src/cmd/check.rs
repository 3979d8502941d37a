//! Implementation of the `gear check` command.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use gear_lib::state::StateStore;
use gear_lib::sync::BundleSource;

use super::{bundle_source, load_config, runtime};
use crate::logging;
use crate::output::{format_duration, print_info, print_stat, print_success, print_warning, truncate_hash};

/// Validate the config, read the key files and resolve the remote head once.
///
/// Nothing is deployed.
pub fn cmd_check(config_path: &Path, verbose: bool) -> Result<()> {
  let config = load_config(config_path)?;
  logging::init(verbose, config.is_production());

  let source = bundle_source(&config)?;
  print_success(&format!("Config OK: {}", config_path.display()));

  let start = Instant::now();
  let head = runtime()?
    .block_on(source.remote_head())
    .with_context(|| format!("Failed to query '{}'", source.location()))?;

  print_success(&format!(
    "Resolved {} in {}",
    config.repository.branch,
    format_duration(start.elapsed())
  ));
  print_stat("Repository", source.location());
  print_stat("Remote head", &head);

  let state = StateStore::new(config.state_file()).load();
  if state.current_hash.is_empty() {
    print_info("Nothing deployed yet");
  } else if state.current_hash == head {
    print_info(&format!("Deployment is up to date ({})", truncate_hash(&head)));
  } else {
    print_warning(&format!(
      "Update available: {} -> {}",
      truncate_hash(&state.current_hash),
      truncate_hash(&head)
    ));
  }

  Ok(())
}
