//! `synth`: render the stacks and write the cloud assembly.

use super::CommandContext;
use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use wiki_infra::construct::TemplateFormat;

/// Arguments for the synth command
#[derive(Parser, Debug, Clone)]
pub struct SynthArgs {
    /// Output directory (defaults to app.out_dir)
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,

    /// Template format (defaults to app.format)
    #[arg(long, short = 'f')]
    pub format: Option<TemplateFormat>,

    /// Only report this stack
    #[arg(long, short = 's')]
    pub stack: Option<String>,

    /// Print templates to stdout as well
    #[arg(long)]
    pub print: bool,
}

impl SynthArgs {
    /// Execute the synth command
    pub fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let out_dir = self.out.clone().unwrap_or_else(|| ctx.config.app.out_dir.clone());
        let format = self.format.unwrap_or(ctx.config.app.format);

        ctx.output.banner("SYNTH");
        let assembly = ctx.synthesize()?;

        if let Some(id) = &self.stack {
            if assembly.stack(id).is_none() {
                ctx.output.error(&format!("Stack '{}' not found", id));
                ctx.output.hint("run `wiki-infra list` to see stack ids");
                return Ok(1);
            }
        }

        let written = assembly
            .write(&out_dir, format)
            .with_context(|| format!("Failed to write assembly to {}", out_dir.display()))?;

        let selected = assembly
            .stacks()
            .iter()
            .filter(|s| self.stack.as_deref().map_or(true, |id| id == s.id));

        if ctx.output.is_json() {
            let stacks: Vec<_> = selected
                .map(|s| {
                    json!({
                        "id": s.id,
                        "stackName": s.stack_name,
                        "templateFile": out_dir.join(s.template_file(format)),
                        "resources": s.resources().count(),
                        "exports": s.exports().map(|(name, _)| name).collect::<Vec<_>>(),
                    })
                })
                .collect();
            ctx.output.json(&json!({ "outDir": out_dir, "stacks": stacks }));
            return Ok(0);
        }

        for stack in selected {
            ctx.output.section(&stack.id);
            ctx.output.field("stack name", &stack.stack_name);
            ctx.output.field("template", &stack.template_file(format));
            ctx.output
                .field("resources", &stack.resources().count().to_string());
            if !stack.dependencies.is_empty() {
                ctx.output.field("depends on", &stack.dependencies.join(", "));
            }
            if self.print {
                println!();
                ctx.output.plain(&stack.render(format)?);
            }
        }
        for path in &written {
            ctx.output.info(&format!("wrote {}", path.display()));
        }
        ctx.output
            .done(&format!("Synthesized to {}", out_dir.display()));
        Ok(0)
    }
}
