//! Deployment of bundles onto the container runtime.
//!
//! # Modules
//!
//! - [`activator`] - The stop-old/start-new activation sequence
//! - [`compose`] - Orchestrator capability trait and the compose CLI driver
//! - [`overrides`] - Association of `customise/` overrides with base services

pub mod activator;
pub mod compose;
pub mod overrides;

pub use activator::{ActivateError, ActivationStage, RuntimeActivator};
pub use compose::{ComposeError, ComposeProject, DockerCompose, Orchestrator, sanitize_project_name};
pub use overrides::OverrideIndex;
