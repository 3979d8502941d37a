/// Application name used for display and default paths.
pub const APP_NAME: &str = "gear";

/// Default name of the deployment state file within the deployment directory.
pub const STATE_FILENAME: &str = ".deployment-state.yaml";

/// Repository directory holding per-target override files.
pub const CUSTOMISE_DIR: &str = "customise/";

/// Per-activation orchestration log written next to the bundle files.
pub const RUNTIME_LOG_FILENAME: &str = "runtime.log";

/// Extension marking an encrypted bundle file.
pub const ENCRYPTED_EXTENSION: &str = "enc";

/// File extensions retained when walking the repository tree.
pub const BUNDLE_EXTENSIONS: &[&str] = &["yaml", "json", "env", ENCRYPTED_EXTENSION];

/// Extension of a service definition file.
pub const SERVICE_EXTENSION: &str = "yaml";
