//! gear-lib: Core types and logic for gear
//!
//! This crate provides the reconciliation pipeline behind the `gear` agent:
//! - `Bundle`: the filtered, decrypted set of service definitions at one commit
//! - `DeploymentState`: what is currently running, persisted between restarts
//! - `RuntimeActivator`: stops the previous stacks and starts the new ones
//! - `UpdateSyncLoop`: polls the remote and drives activation on change

pub mod bundle;
pub mod config;
pub mod consts;
pub mod deploy;
pub mod secrets;
pub mod state;
pub mod sync;
