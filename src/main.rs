//! wiki-infra - declarative infrastructure for the wiki
//!
//! This is the main entry point for the wiki-infra CLI.

mod cli;

use anyhow::Result;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wiki_infra::config::Config;
use wiki_infra::error::Error;

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    if cli.verbosity() >= 2 {
        eprintln!("wiki-infra v{}", VERSION);
    }

    let exit_code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            let code = e.downcast_ref::<Error>().map_or(1, Error::exit_code);
            if cli.is_json() {
                eprintln!(
                    "{}",
                    serde_json::json!({ "type": "error", "message": format!("{:#}", e) })
                );
            } else {
                eprintln!("Error: {:#}", e);
            }
            code
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> Result<i32> {
    let config = Config::load(cli.config.as_ref())?;

    // Create command context
    let mut ctx = CommandContext::new(cli, config);

    // Execute the appropriate command
    let exit_code = match &cli.command {
        Commands::Synth(args) => args.execute(&mut ctx)?,
        Commands::List(args) => args.execute(&mut ctx)?,
        Commands::Validate(args) => args.execute(&mut ctx)?,
        Commands::Diff(args) => args.execute(&mut ctx)?,
    };
    ctx.output.flush();
    Ok(exit_code)
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(verbosity >= 3))
        .with(env_filter)
        .init();
}
