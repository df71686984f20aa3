//! Terminal output for the CLI: colored human text or JSON lines.

use colored::Colorize;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use wiki_infra::diff::StackChange;
use wiki_infra::validate::{Finding, Severity};

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// JSON output mode
    json_mode: bool,
    /// Verbosity level
    verbosity: u8,
    /// Start time for duration calculations
    start_time: Instant,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();
        if !use_color {
            colored::control::set_override(false);
        }

        Self {
            use_color,
            json_mode,
            verbosity,
            start_time: Instant::now(),
        }
    }

    /// Whether output is colored
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Whether output is JSON
    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    /// Print a banner/header
    pub fn banner(&self, title: &str) {
        if self.json_mode {
            return;
        }

        let line = "=".repeat(title.len() + 4);
        if self.use_color {
            println!("\n{}", line.bright_blue());
            println!("{}", format!("  {}  ", title).bright_blue().bold());
            println!("{}\n", line.bright_blue());
        } else {
            println!("\n{}", line);
            println!("  {}  ", title);
            println!("{}\n", line);
        }
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.json_mode {
            return;
        }

        if self.use_color {
            println!("\n{}", title.cyan().bold());
            println!("{}", "-".repeat(title.len()).cyan());
        } else {
            println!("\n{}", title);
            println!("{}", "-".repeat(title.len()));
        }
    }

    /// Print one JSON document on stdout
    pub fn json(&self, value: &serde_json::Value) {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("ERROR: {}", e),
        }
    }

    fn event(&self, kind: &str, message: &str) -> String {
        serde_json::json!({ "type": kind, "message": message }).to_string()
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.json_mode {
            eprintln!("{}", self.event("error", message));
        } else if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.json_mode {
            eprintln!("{}", self.event("warning", message));
        } else if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print a hint message
    pub fn hint(&self, message: &str) {
        if self.json_mode {
            eprintln!("{}", self.event("hint", message));
        } else if self.use_color {
            eprintln!("{} {}", "HINT:".cyan().bold(), message);
        } else {
            eprintln!("HINT: {}", message);
        }
    }

    /// Print an info message (respects verbosity)
    pub fn info(&self, message: &str) {
        if self.verbosity < 1 || self.json_mode {
            return;
        }

        if self.use_color {
            println!("{} {}", "INFO:".blue(), message);
        } else {
            println!("INFO: {}", message);
        }
    }

    /// Print a debug message (requires higher verbosity)
    pub fn debug(&self, message: &str) {
        if self.verbosity < 2 || self.json_mode {
            return;
        }

        if self.use_color {
            println!("{} {}", "DEBUG:".magenta(), message);
        } else {
            println!("DEBUG: {}", message);
        }
    }

    /// Print text as is
    pub fn plain(&self, message: &str) {
        if !self.json_mode {
            print!("{}", message);
        }
    }

    /// Print a `key: value` line
    pub fn field(&self, key: &str, value: &str) {
        if self.json_mode {
            return;
        }
        if self.use_color {
            println!("  {}: {}", key.bright_black(), value);
        } else {
            println!("  {}: {}", key, value);
        }
    }

    /// Print a list of items
    pub fn list(&self, title: &str, items: &[String]) {
        if self.json_mode {
            return;
        }

        if self.use_color {
            println!("\n{}:", title.bright_white().bold());
        } else {
            println!("\n{}:", title);
        }

        for item in items {
            if self.use_color {
                println!("  {} {}", "-".bright_black(), item);
            } else {
                println!("  - {}", item);
            }
        }
    }

    /// Print a table
    pub fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        if self.json_mode {
            return;
        }

        // Calculate column widths
        let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.len());
                }
            }
        }

        let line = |cells: Vec<&str>| {
            cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:width$}", c, width = *w))
                .collect::<Vec<_>>()
                .join(" | ")
        };

        let header_line = line(headers.to_vec());
        if self.use_color {
            println!("{}", header_line.bright_white().bold());
        } else {
            println!("{}", header_line);
        }

        let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        if self.use_color {
            println!("{}", sep.join("-+-").bright_black());
        } else {
            println!("{}", sep.join("-+-"));
        }

        for row in rows {
            println!("{}", line(row.iter().map(String::as_str).collect()));
        }
    }

    /// Print a validation finding
    pub fn finding(&self, finding: &Finding) {
        if self.json_mode {
            return;
        }
        let label = match finding.severity {
            Severity::Error if self.use_color => "error".red().bold().to_string(),
            Severity::Warning if self.use_color => "warning".yellow().to_string(),
            severity => severity.to_string(),
        };
        println!(
            "{} [{}] {}: {}",
            label, finding.rule_id, finding.location, finding.message
        );
        if let Some(suggestion) = &finding.suggestion {
            if self.use_color {
                println!("    {} {}", "suggestion:".bright_black(), suggestion);
            } else {
                println!("    suggestion: {}", suggestion);
            }
        }
    }

    /// Label for a stack change
    pub fn change_label(&self, change: StackChange) -> String {
        let label = change.to_string();
        if !self.use_color {
            return label;
        }
        match change {
            StackChange::Added => label.green().to_string(),
            StackChange::Removed => label.red().to_string(),
            StackChange::Modified => label.yellow().to_string(),
            StackChange::Unchanged => label.dimmed().to_string(),
        }
    }

    /// Print the closing line with the elapsed time
    pub fn done(&self, message: &str) {
        if self.json_mode {
            return;
        }
        let elapsed = format_duration(self.start_time.elapsed());
        if self.use_color {
            println!("\n{} {}", message.green().bold(), format!("({})", elapsed).bright_black());
        } else {
            println!("\n{} ({})", message, elapsed);
        }
    }

    /// Flush stdout
    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

/// Format a duration as a human-readable string
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(5)), "5.000s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
    }

    #[test]
    fn test_change_label_without_color() {
        let output = OutputFormatter::new(false, false, 0);
        assert_eq!(output.change_label(StackChange::Added), "added");
        assert_eq!(output.change_label(StackChange::Unchanged), "unchanged");
    }
}
