//! `diff`: compare freshly rendered templates with the output directory.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use wiki_infra::construct::CloudAssembly;
use wiki_infra::diff::{diff_assemblies, DiffStats};

/// Arguments for the diff command
#[derive(Parser, Debug, Clone, Default)]
pub struct DiffArgs {
    /// Directory holding the previous assembly (defaults to app.out_dir)
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,

    /// Only diff this stack
    #[arg(long, short = 's')]
    pub stack: Option<String>,

    /// Exit with 1 when anything changed
    #[arg(long)]
    pub fail_on_change: bool,
}

impl DiffArgs {
    /// Execute the diff command
    pub fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let out_dir = self.out.clone().unwrap_or_else(|| ctx.config.app.out_dir.clone());
        let format = ctx.config.app.format;

        let previous = if out_dir.join(wiki_infra::construct::MANIFEST_FILE).exists() {
            Some(CloudAssembly::read(&out_dir)?)
        } else {
            ctx.output.warning(&format!(
                "no assembly in {}, diffing against nothing",
                out_dir.display()
            ));
            None
        };
        let assembly = ctx.synthesize()?;
        let diffs = diff_assemblies(previous.as_ref(), &assembly, format, self.stack.as_deref())?;

        let mut total = DiffStats::default();
        for diff in &diffs {
            total.merge(&diff.stats);
        }

        if ctx.output.is_json() {
            let stacks: Vec<_> = diffs
                .iter()
                .map(|d| {
                    json!({
                        "stack": d.stack,
                        "change": d.change.to_string(),
                        "insertions": d.stats.insertions,
                        "deletions": d.stats.deletions,
                        "diff": d.unified,
                    })
                })
                .collect();
            ctx.output.json(&json!({ "stacks": stacks }));
        } else {
            for diff in &diffs {
                ctx.output.section(&diff.stack);
                ctx.output
                    .field("change", &ctx.output.change_label(diff.change));
                ctx.output.plain(&diff.render(ctx.output.use_color()));
            }
            ctx.output
                .plain(&format!("\n{}\n", total.short_summary(ctx.output.use_color())));
        }

        Ok(i32::from(self.fail_on_change && total.has_changes()))
    }
}
