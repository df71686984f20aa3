//! Structural validation of a synthesized assembly.
//!
//! The checks mirror the guarantees the stacks are built to keep:
//!
//! - P001/P002: database in isolated subnets, server in a public one
//! - N001/N002: one rule from the server to the database port
//! - C001: a single server open on the expected ports
//! - S001: one generated secret, owned by the database stack
//! - R001/R002: imports resolve and export names are unique
//!
//! # Example
//!
//! ```rust,ignore
//! use wiki_infra::validate::Validator;
//!
//! let report = Validator::new().check(&assembly);
//! for finding in &report.findings {
//!     println!("{}", finding);
//! }
//! ```

mod checks;
mod types;

pub use types::{Finding, Location, Report, RuleCategory, Severity};

use tracing::debug;

use crate::construct::CloudAssembly;

/// Ports the wiki server must accept from anywhere unless configured.
pub const DEFAULT_SERVER_PORTS: [u16; 3] = [22, 80, 443];

/// Runs every check against an assembly.
#[derive(Debug, Clone)]
pub struct Validator {
    server_ports: Vec<u16>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// Validator expecting the default server ports.
    pub fn new() -> Self {
        Self {
            server_ports: DEFAULT_SERVER_PORTS.to_vec(),
        }
    }

    /// Expect these ports open on the server instead.
    pub fn with_server_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.server_ports = ports.into_iter().collect();
        self
    }

    /// Checks `assembly` and collects every finding.
    pub fn check(&self, assembly: &CloudAssembly) -> Report {
        let mut report = Report::new();
        report.stacks_checked = assembly.stacks().len();
        report.resources_checked = assembly.stacks().iter().map(|s| s.resources().count()).sum();

        checks::database_placement(assembly, &mut report);
        checks::server_placement(assembly, &mut report);
        checks::database_ingress(assembly, &mut report);
        checks::single_server(assembly, &self.server_ports, &mut report);
        checks::secrets(assembly, &mut report);
        checks::imports(assembly, &mut report);
        checks::unique_exports(assembly, &mut report);

        debug!(findings = report.findings.len(), "validated assembly");
        report
    }
}
