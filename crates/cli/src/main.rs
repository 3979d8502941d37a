mod cmd;
mod logging;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use cmd::{cmd_check, cmd_run, cmd_status};
use output::print_error;

const DEFAULT_CONFIG: &str = "config.yaml";

/// gear - Git-driven container deployment agent
#[derive(Parser)]
#[command(name = "gear")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Follow the configured branch and deploy every new commit
  Run {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
  },

  /// Validate the configuration and query the remote once
  Check {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
  },

  /// Show the recorded deployment state
  Status {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let result = match cli.command {
    Commands::Run { config } => cmd_run(&config, cli.verbose),
    Commands::Check { config } => cmd_check(&config, cli.verbose),
    Commands::Status { config, json } => cmd_status(&config, cli.verbose, json),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
