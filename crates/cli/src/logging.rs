use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` is honoured unless `verbose` forces debug output. Production
/// deployments log JSON lines.
pub fn init(verbose: bool, json: bool) {
  let filter = if verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
  };

  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr);

  if json {
    builder.json().init();
  } else {
    builder.init();
  }
}
