//! Subcommand implementations.

pub mod diff;
pub mod list;
pub mod synth;
pub mod validate;

use crate::cli::output::OutputFormatter;
use anyhow::Result;
use wiki_infra::config::Config;
use wiki_infra::construct::CloudAssembly;
use wiki_infra::stacks::build_app;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        let output = OutputFormatter::new(!cli.no_color, cli.is_json(), cli.verbosity());

        Self { config, output }
    }

    /// Declares both stacks from the configuration and synthesizes them.
    pub fn synthesize(&self) -> Result<CloudAssembly> {
        let app = build_app(&self.config)?;
        let assembly = app.synth()?;
        self.output.debug(&format!(
            "synthesized {} stack(s)",
            assembly.stacks().len()
        ));
        Ok(assembly)
    }
}
