//! mb: coordinate environment locks and bootstrap hosts.
//!
//! This is the main entry point for the `mb` CLI. It parses arguments, sets
//! up logging, dispatches to the command handler, and maps errors to exit
//! codes. Ctrl-C stops active jobs and releases the locks this process holds.

use mb::cli::{Cli, Command};
use mb::commands;
use mb::config::Config;
use mb::context::AppContext;
use mb::error::{MbError, Result};
use mb::exit_codes;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter that overrides the config.
const LOG_ENV_VAR: &str = "MB_LOG";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match run(cli).await {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Command::Version = cli.command {
        commands::cmd_version();
        return Ok(());
    }

    let config = commands::load_config(cli.config.as_deref())?;
    init_logging(&config, cli.verbose);

    let ctx = AppContext::from_config(config);

    tokio::select! {
        result = commands::dispatch(&ctx, cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, releasing locks");
            let released = ctx.shutdown().await?;
            info!(locks = released, "Released locks");
            Err(MbError::UserError("interrupted".to_string()))
        }
    }
}

/// Log to stderr. `MB_LOG` wins over `-v`, which wins over `log.level`.
fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose { "debug" } else { config.log.level.as_str() };
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
