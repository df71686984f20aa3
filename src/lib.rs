//! # wiki-infra - declarative infrastructure for the wiki
//!
//! wiki-infra describes the wiki's cloud footprint as two CloudFormation
//! stacks and renders them into a cloud assembly:
//!
//! - **Network+Database** (`WikiRdsStack`): a VPC with public and isolated
//!   subnets, generated database credentials and a PostgreSQL instance in the
//!   isolated subnets. The credential secret ARN is published as an export.
//! - **Compute** (`WikiCdkStack`): the wiki server in a public subnet, its
//!   IAM role, an SSM parameter carrying the secret ARN and the single rule
//!   that lets the server reach the database port.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        CLI Interface                          │
//! │             (synth, list, validate, diff via clap)            │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                stacks: NetworkDatabase + Wiki                 │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │   resources: ec2 (vpc, security groups, instance), rds,       │
//! │              iam, secretsmanager, ssm                          │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  construct: App / Stack -> synth -> CloudAssembly (+ exports) │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use wiki_infra::prelude::*;
//!
//! let config = Config::load(None)?;
//! let assembly = build_app(&config)?.synth()?;
//! assembly.write(&config.app.out_dir, config.app.format)?;
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::config::{Config, CredentialSourceKind};
    pub use crate::construct::{App, CloudAssembly, Stack, StackProps, TemplateFormat};
    pub use crate::error::{Error, Result};
    pub use crate::stacks::{build_app, NetworkDatabaseStack, WikiStack};
    pub use crate::template::{OutputDecl, ResourceDecl, ResourceRef, Value};
    pub use crate::validate::{Report, Validator};
}

/// Error types and result aliases.
pub mod error;

/// IPv4 CIDR arithmetic and subnet allocation.
pub mod cidr;

/// Layered configuration: defaults, files and environment.
pub mod config;

/// CloudFormation template model and logical ids.
pub mod template;

/// Stacks, the app that holds them and the synthesized assembly.
pub mod construct;

/// Typed resource constructs.
pub mod resources;

/// The wiki's two stacks.
pub mod stacks;

/// Structural checks over an assembly.
pub mod validate;

/// Template diffs against a previous synthesis.
pub mod diff;

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
