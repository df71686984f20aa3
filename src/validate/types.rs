//! Finding types shared by the assembly checks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Severity level for findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Worth a look, still deployable.
    Warning,
    /// The assembly breaks a structural guarantee.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Area a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    /// Where resources are placed in the network.
    Placement,
    /// Security group rules.
    Network,
    /// Credential handling.
    Secrets,
    /// Cross-stack exports and imports.
    References,
    /// Compute resources.
    Compute,
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleCategory::Placement => write!(f, "placement"),
            RuleCategory::Network => write!(f, "network"),
            RuleCategory::Secrets => write!(f, "secrets"),
            RuleCategory::References => write!(f, "references"),
            RuleCategory::Compute => write!(f, "compute"),
        }
    }
}

/// Where a finding was raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Stack id.
    pub stack: String,
    /// Logical id, when the finding is about one resource or output.
    pub logical_id: Option<String>,
}

impl Location {
    /// A whole stack.
    pub fn stack(stack: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            logical_id: None,
        }
    }

    /// One element of a stack.
    pub fn element(stack: impl Into<String>, logical_id: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            logical_id: Some(logical_id.into()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.logical_id {
            Some(id) => write!(f, "{}/{}", self.stack, id),
            None => write!(f, "{}", self.stack),
        }
    }
}

/// A single problem found in an assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Rule identifier (e.g. "P001").
    pub rule_id: String,
    /// Human-readable rule name.
    pub rule_name: String,
    /// Severity level.
    pub severity: Severity,
    /// Category of the rule.
    pub category: RuleCategory,
    /// What is wrong.
    pub message: String,
    /// Where it is wrong.
    pub location: Location,
    /// How to fix it.
    pub suggestion: Option<String>,
}

impl Finding {
    /// Create a new finding.
    pub fn new(
        rule_id: impl Into<String>,
        rule_name: impl Into<String>,
        severity: Severity,
        category: RuleCategory,
        message: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            rule_name: rule_name.into(),
            severity,
            category,
            message: message.into(),
            location,
            suggestion: None,
        }
    }

    /// Add a suggestion for fixing the problem.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Whether this finding fails validation.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: [{}] {} - {}",
            self.location, self.rule_id, self.severity, self.message
        )?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, "\n  Suggestion: {}", suggestion)?;
        }
        Ok(())
    }
}

/// Outcome of checking an assembly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Findings, in check order.
    pub findings: Vec<Finding>,
    /// Stacks examined.
    pub stacks_checked: usize,
    /// Resources examined.
    pub resources_checked: usize,
}

impl Report {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finding.
    pub fn add(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// Findings raised by one rule.
    pub fn by_rule(&self, rule_id: &str) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.rule_id == rule_id).collect()
    }

    /// Check if any finding is an error.
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(Finding::is_error)
    }

    /// Count of findings by severity.
    pub fn count_by_severity(&self) -> HashMap<Severity, usize> {
        let mut counts = HashMap::new();
        for finding in &self.findings {
            *counts.entry(finding.severity).or_insert(0) += 1;
        }
        counts
    }

    /// Process exit code: 1 when any error was found.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_errors())
    }

    /// One-line summary.
    pub fn summary(&self) -> String {
        let counts = self.count_by_severity();
        format!(
            "Checked {} stack(s), {} resource(s): {} error(s), {} warning(s)",
            self.stacks_checked,
            self.resources_checked,
            counts.get(&Severity::Error).copied().unwrap_or(0),
            counts.get(&Severity::Warning).copied().unwrap_or(0)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity) -> Finding {
        Finding::new(
            "T001",
            "test-rule",
            severity,
            RuleCategory::Network,
            "something is off",
            Location::element("Stack", "Thing"),
        )
    }

    #[test]
    fn test_display() {
        let f = finding(Severity::Error).with_suggestion("fix it");
        assert_eq!(
            f.to_string(),
            "Stack/Thing: [T001] error - something is off\n  Suggestion: fix it"
        );
        assert_eq!(Location::stack("Only").to_string(), "Only");
    }

    #[test]
    fn test_report_exit_code() {
        let mut report = Report::new();
        assert_eq!(report.exit_code(), 0);
        report.add(finding(Severity::Warning));
        assert_eq!(report.exit_code(), 0);
        assert!(!report.has_errors());
        report.add(finding(Severity::Error));
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.by_rule("T001").len(), 2);
    }

    #[test]
    fn test_summary() {
        let mut report = Report::new();
        report.stacks_checked = 2;
        report.resources_checked = 30;
        report.add(finding(Severity::Warning));
        assert_eq!(
            report.summary(),
            "Checked 2 stack(s), 30 resource(s): 0 error(s), 1 warning(s)"
        );
    }
}
