//! Command-line interface: argument parsing and subcommands.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// wiki-infra - declarative infrastructure for the wiki
///
/// Renders the network+database and compute stacks as CloudFormation
/// templates, validates them and diffs them against a previous run.
#[derive(Parser, Debug, Clone)]
#[command(name = "wiki-infra")]
#[command(author = "wiki-infra Contributors")]
#[command(version)]
#[command(about = "Synthesize the wiki's CloudFormation stacks", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "WIKI_INFRA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Render the stacks and write the cloud assembly
    Synth(commands::synth::SynthArgs),

    /// List stacks in deployment order
    List(commands::list::ListArgs),

    /// Render in memory and run structural checks
    Validate(commands::validate::ValidateArgs),

    /// Diff rendered templates against the output directory
    Diff(commands::diff::DiffArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["wiki-infra", "synth"]).unwrap();
        assert!(matches!(cli.command, Commands::Synth(_)));
        assert!(!cli.is_json());
    }

    #[test]
    fn test_verbosity_is_capped() {
        let cli = Cli::try_parse_from(["wiki-infra", "-vvvvv", "list"]).unwrap();
        assert_eq!(cli.verbosity(), 3);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "wiki-infra",
            "validate",
            "--output",
            "json",
            "-c",
            "infra.toml",
            "--no-color",
        ])
        .unwrap();
        assert!(cli.is_json());
        assert!(cli.no_color);
        assert_eq!(cli.config, Some(PathBuf::from("infra.toml")));
    }

    #[test]
    fn test_unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["wiki-infra", "deploy"]).is_err());
    }
}
