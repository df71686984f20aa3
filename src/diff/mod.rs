//! Template diffs between a freshly synthesized assembly and the one
//! already written to the output directory.
//!
//! Old templates are re-rendered before comparing, so formatting never
//! shows up as a change.
//!
//! # Example
//!
//! ```rust,ignore
//! use wiki_infra::diff::diff_assemblies;
//!
//! let previous = CloudAssembly::read(out_dir).ok();
//! for stack in diff_assemblies(previous.as_ref(), &assembly, format, None)? {
//!     print!("{}", stack.render(true));
//! }
//! ```

use std::fmt::Write;

use colored::Colorize;
use similar::{ChangeTag, TextDiff};

use crate::construct::{CloudAssembly, TemplateFormat};
use crate::error::{Error, Result};

/// Lines of context around each hunk.
pub const CONTEXT_LINES: usize = 3;

/// Line counts for one or more diffs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    /// Stacks whose template changed
    pub stacks_changed: usize,
    /// Lines inserted
    pub insertions: usize,
    /// Lines deleted
    pub deletions: usize,
}

impl DiffStats {
    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.insertions > 0 || self.deletions > 0
    }

    /// Adds another diff's counts
    pub fn merge(&mut self, other: &DiffStats) {
        self.stacks_changed += other.stacks_changed;
        self.insertions += other.insertions;
        self.deletions += other.deletions;
    }

    /// `N stack(s), +I -D`
    pub fn short_summary(&self, use_color: bool) -> String {
        if use_color {
            format!(
                "{} stack(s), {} {}",
                self.stacks_changed.to_string().bright_white(),
                format!("+{}", self.insertions).green(),
                format!("-{}", self.deletions).red()
            )
        } else {
            format!(
                "{} stack(s), +{} -{}",
                self.stacks_changed, self.insertions, self.deletions
            )
        }
    }
}

/// What happened to a stack between two assemblies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackChange {
    /// Only in the new assembly
    Added,
    /// Only in the old assembly
    Removed,
    /// In both, with a different template
    Modified,
    /// In both, identical
    Unchanged,
}

impl std::fmt::Display for StackChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackChange::Added => write!(f, "added"),
            StackChange::Removed => write!(f, "removed"),
            StackChange::Modified => write!(f, "modified"),
            StackChange::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Diff of one stack's template
#[derive(Debug, Clone)]
pub struct StackDiff {
    /// Stack id
    pub stack: String,
    /// Kind of change
    pub change: StackChange,
    /// Plain unified diff, empty when unchanged
    pub unified: String,
    /// Line counts
    pub stats: DiffStats,
}

impl StackDiff {
    /// The unified diff, colored by line kind when `use_color` is set.
    pub fn render(&self, use_color: bool) -> String {
        if !use_color {
            return self.unified.clone();
        }
        let mut output = String::new();
        for line in self.unified.split_inclusive('\n') {
            let colored = if line.starts_with("---") || line.starts_with("+++") {
                line.bold().to_string()
            } else if line.starts_with("@@") {
                line.cyan().to_string()
            } else if line.starts_with('+') {
                line.green().to_string()
            } else if line.starts_with('-') {
                line.red().to_string()
            } else {
                line.dimmed().to_string()
            };
            output.push_str(&colored);
        }
        output
    }
}

/// Unified diff of two texts with its line counts.
pub fn diff_text(old: &str, new: &str, old_label: &str, new_label: &str) -> (String, DiffStats) {
    let diff = TextDiff::from_lines(old, new);
    let mut stats = DiffStats::default();
    let mut output = String::new();

    for hunk in diff.unified_diff().context_radius(CONTEXT_LINES).iter_hunks() {
        if output.is_empty() {
            let _ = writeln!(output, "--- {}", old_label);
            let _ = writeln!(output, "+++ {}", new_label);
        }
        let _ = writeln!(output, "{}", hunk.header());
        for change in hunk.iter_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => {
                    stats.deletions += 1;
                    '-'
                }
                ChangeTag::Insert => {
                    stats.insertions += 1;
                    '+'
                }
                ChangeTag::Equal => ' ',
            };
            output.push(sign);
            output.push_str(change.value());
            if change.missing_newline() {
                output.push_str("\n\\ No newline at end of file\n");
            }
        }
    }
    if stats.has_changes() {
        stats.stacks_changed = 1;
    }
    (output, stats)
}

/// Diffs every stack of `new` against `old` (missing means empty), or only
/// `only` when given. Stacks that disappeared are reported as removed.
pub fn diff_assemblies(
    old: Option<&CloudAssembly>,
    new: &CloudAssembly,
    format: TemplateFormat,
    only: Option<&str>,
) -> Result<Vec<StackDiff>> {
    if let Some(id) = only {
        if new.stack(id).is_none() {
            return Err(Error::StackNotFound(id.to_string()));
        }
    }
    let selected = |id: &str| only.map_or(true, |o| o == id);

    let mut diffs = Vec::new();
    for stack in new.stacks().iter().filter(|s| selected(&s.id)) {
        let file = stack.template_file(format);
        let rendered = stack.render(format)?;
        let previous = match old.and_then(|o| o.stack(&stack.id)) {
            Some(prev) => Some(prev.render(format)?),
            None => None,
        };
        let (unified, stats) = diff_text(
            previous.as_deref().unwrap_or(""),
            &rendered,
            &format!("a/{}", file),
            &format!("b/{}", file),
        );
        let change = match previous {
            None => StackChange::Added,
            Some(_) if stats.has_changes() => StackChange::Modified,
            Some(_) => StackChange::Unchanged,
        };
        diffs.push(StackDiff {
            stack: stack.id.clone(),
            change,
            unified,
            stats,
        });
    }

    for stack in old.into_iter().flat_map(|o| o.stacks()) {
        if !selected(&stack.id) || new.stack(&stack.id).is_some() {
            continue;
        }
        let file = stack.template_file(format);
        let (unified, stats) = diff_text(
            &stack.render(format)?,
            "",
            &format!("a/{}", file),
            &format!("b/{}", file),
        );
        diffs.push(StackDiff {
            stack: stack.id.clone(),
            change: StackChange::Removed,
            unified,
            stats,
        });
    }
    Ok(diffs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::StackArtifact;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn assembly(stacks: &[(&str, serde_json::Value)]) -> CloudAssembly {
        CloudAssembly::new(
            stacks
                .iter()
                .map(|(id, template)| StackArtifact {
                    id: id.to_string(),
                    stack_name: id.to_lowercase(),
                    tags: Default::default(),
                    dependencies: Vec::new(),
                    template: template.clone(),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_diff_text() {
        let (unified, stats) = diff_text("a\nb\nc\n", "a\nB\nc\n", "old", "new");
        assert_eq!(
            unified,
            "--- old\n+++ new\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n"
        );
        assert_eq!(stats.insertions, 1);
        assert_eq!(stats.deletions, 1);
        assert_eq!(stats.stacks_changed, 1);
    }

    #[test]
    fn test_identical_text_has_no_diff() {
        let (unified, stats) = diff_text("same\n", "same\n", "old", "new");
        assert!(unified.is_empty());
        assert!(!stats.has_changes());
    }

    #[test]
    fn test_diff_assemblies_classifies_stacks() {
        let old = assembly(&[
            ("Kept", json!({ "Resources": { "A": { "Type": "X" } } })),
            ("Changed", json!({ "Resources": { "A": { "Type": "X" } } })),
            ("Gone", json!({ "Resources": {} })),
        ]);
        let new = assembly(&[
            ("Kept", json!({ "Resources": { "A": { "Type": "X" } } })),
            ("Changed", json!({ "Resources": { "A": { "Type": "Y" } } })),
            ("Fresh", json!({ "Resources": {} })),
        ]);
        let diffs = diff_assemblies(Some(&old), &new, TemplateFormat::Json, None).unwrap();
        let changes: Vec<(&str, StackChange)> =
            diffs.iter().map(|d| (d.stack.as_str(), d.change)).collect();
        assert_eq!(
            changes,
            vec![
                ("Kept", StackChange::Unchanged),
                ("Changed", StackChange::Modified),
                ("Fresh", StackChange::Added),
                ("Gone", StackChange::Removed),
            ]
        );
    }

    #[test]
    fn test_unknown_stack_filter() {
        let new = assembly(&[("Only", json!({}))]);
        assert!(matches!(
            diff_assemblies(None, &new, TemplateFormat::Json, Some("Other")),
            Err(Error::StackNotFound(_))
        ));
    }

    #[test]
    fn test_render_without_color_is_plain() {
        let (unified, stats) = diff_text("a\n", "b\n", "old", "new");
        let diff = StackDiff {
            stack: "S".to_string(),
            change: StackChange::Modified,
            unified: unified.clone(),
            stats,
        };
        assert_eq!(diff.render(false), unified);
    }
}
