//! Shared fixtures for the integration tests.
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::path::PathBuf;

use wiki_infra::config::{Config, CredentialSourceKind};
use wiki_infra::construct::{CloudAssembly, StackArtifact};
use wiki_infra::stacks::build_app;

/// Bootstrap script shipped with the crate.
pub fn user_data_asset() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("assets")
        .join("user-data.sh")
}

/// Default configuration pointing at the shipped user data.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.compute.user_data = user_data_asset();
    config
}

/// Test configuration with the given credential source.
pub fn config_with_source(source: CredentialSourceKind) -> Config {
    let mut config = test_config();
    config.compute.credential_source = source;
    config
}

/// Builds and synthesizes both stacks.
pub fn synth(config: &Config) -> CloudAssembly {
    build_app(config)
        .expect("stacks should build")
        .synth()
        .expect("assembly should synthesize")
}

/// The network+database stack of an assembly.
pub fn database_stack(assembly: &CloudAssembly) -> &StackArtifact {
    assembly.stack("WikiRdsStack").expect("database stack")
}

/// The compute stack of an assembly.
pub fn compute_stack(assembly: &CloudAssembly) -> &StackArtifact {
    assembly.stack("WikiCdkStack").expect("compute stack")
}

/// Resources of `kind` across the whole assembly.
pub fn count_of_type(assembly: &CloudAssembly, kind: &str) -> usize {
    assembly
        .stacks()
        .iter()
        .map(|s| s.resources_of_type(kind).count())
        .sum()
}
