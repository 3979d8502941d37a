//! Status command implementation.
//!
//! Displays the persisted deployment state: active commit and services.

use std::path::Path;

use anyhow::Result;

use gear_lib::state::StateStore;

use super::load_config;
use crate::output::{print_info, print_json, print_stat, print_success, symbols, truncate_hash};

pub fn cmd_status(config_path: &Path, verbose: bool, json: bool) -> Result<()> {
  let config = load_config(config_path)?;
  let store = StateStore::new(config.state_file());
  let state = store.load();

  if json {
    let json_output = serde_json::json!({
      "state_file": store.path().display().to_string(),
      "current_hash": state.current_hash,
      "deployed_services": state.deployed_services,
    });
    return print_json(&json_output);
  }

  if state.current_hash.is_empty() {
    print_info("No deployment recorded. Run 'gear run' to deploy.");
    return Ok(());
  }

  print_success(&format!("Current deployment: {}", truncate_hash(&state.current_hash)));
  if verbose {
    print_stat("Commit", &state.current_hash);
  }
  print_stat("State file", &store.path().display().to_string());
  print_stat("Services", &state.deployed_services.len().to_string());

  if !state.deployed_services.is_empty() {
    println!();
    for service in &state.deployed_services {
      println!("  {} {}", symbols::INFO, service);
    }
  }

  Ok(())
}
