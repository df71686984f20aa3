//! `validate`: structural checks over the rendered stacks.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use wiki_infra::construct::CloudAssembly;
use wiki_infra::validate::Validator;

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Check an assembly already written to this directory instead
    #[arg(long)]
    pub assembly: Option<PathBuf>,
}

impl ValidateArgs {
    /// Execute the validate command
    pub fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        ctx.output.banner("VALIDATE");
        let assembly = match &self.assembly {
            Some(dir) => {
                ctx.output.info(&format!("reading {}", dir.display()));
                CloudAssembly::read(dir)?
            }
            None => ctx.synthesize()?,
        };

        let validator = Validator::new()
            .with_server_ports(ctx.config.compute.ingress.iter().map(|i| i.port));
        let report = validator.check(&assembly);

        if ctx.output.is_json() {
            ctx.output.json(&json!({
                "valid": !report.has_errors(),
                "report": report,
            }));
            return Ok(report.exit_code());
        }

        for finding in &report.findings {
            ctx.output.finding(finding);
        }
        ctx.output.plain(&format!("\n{}\n", report.summary()));
        if report.has_errors() {
            ctx.output.error("validation failed");
        } else {
            ctx.output.done("Assembly is valid");
        }
        Ok(report.exit_code())
    }
}
