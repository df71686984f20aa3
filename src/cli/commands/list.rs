//! `list`: stacks in deployment order.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use serde_json::json;

/// Arguments for the list command
#[derive(Parser, Debug, Clone, Default)]
pub struct ListArgs {
    /// Also list each stack's exports
    #[arg(long)]
    pub exports: bool,
}

impl ListArgs {
    /// Execute the list command
    pub fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let assembly = ctx.synthesize()?;

        if ctx.output.is_json() {
            let stacks: Vec<_> = assembly
                .stacks()
                .iter()
                .map(|s| {
                    json!({
                        "id": s.id,
                        "stackName": s.stack_name,
                        "dependencies": s.dependencies,
                        "tags": s.tags,
                        "exports": s.exports().map(|(name, _)| name).collect::<Vec<_>>(),
                    })
                })
                .collect();
            ctx.output.json(&json!({ "stacks": stacks }));
            return Ok(0);
        }

        let rows: Vec<Vec<String>> = assembly
            .stacks()
            .iter()
            .map(|s| {
                vec![
                    s.id.clone(),
                    s.stack_name.clone(),
                    s.resources().count().to_string(),
                    if s.dependencies.is_empty() {
                        "-".to_string()
                    } else {
                        s.dependencies.join(", ")
                    },
                ]
            })
            .collect();
        ctx.output
            .table(&["STACK", "NAME", "RESOURCES", "DEPENDS ON"], &rows);

        if self.exports {
            for stack in assembly.stacks() {
                let names: Vec<String> = stack.exports().map(|(n, _)| n.to_string()).collect();
                if !names.is_empty() {
                    ctx.output.list(&format!("{} exports", stack.id), &names);
                }
            }
        }
        Ok(0)
    }
}
