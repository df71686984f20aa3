//! The two wiki stacks and the app that wires them together.

pub mod database;
pub mod wiki;

pub use database::NetworkDatabaseStack;
pub use wiki::{CredentialSource, WikiStack, WikiStackProps};

use tracing::info;

use crate::config::{Config, CredentialSourceKind};
use crate::construct::App;
use crate::error::Result;

/// Validates `config` and declares both stacks into a fresh [`App`].
pub fn build_app(config: &Config) -> Result<App> {
    config.validate()?;

    let mut app = App::new();
    let database_stack = &config.app.database_stack;
    let compute_stack = &config.app.compute_stack;

    let db = NetworkDatabaseStack::build(
        app.add_stack(&database_stack.id, database_stack.props())?,
        config,
    )?;

    let credentials = match config.compute.credential_source {
        CredentialSourceKind::Reference => CredentialSource::Reference(&db.secret),
        CredentialSourceKind::Export => {
            CredentialSource::Export(config.credentials.export_name.clone())
        }
    };
    WikiStack::build(
        app.add_stack(&compute_stack.id, compute_stack.props())?,
        config,
        WikiStackProps {
            vpc: &db.vpc,
            database: &db.database,
            credentials,
        },
    )?;

    info!(
        database = %database_stack.id,
        compute = %compute_stack.id,
        source = ?config.compute.credential_source,
        "declared stacks"
    );
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_with_user_data(script: &str) -> (Config, NamedTempFile) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(script.as_bytes()).unwrap();
        let mut config = Config::default();
        config.compute.user_data = file.path().to_path_buf();
        (config, file)
    }

    #[test]
    fn test_build_app_declares_both_stacks() {
        let (config, _file) = config_with_user_data("#!/bin/bash\n");
        let app = build_app(&config).unwrap();
        let ids: Vec<&str> = app.stacks().map(|s| s.id()).collect();
        assert_eq!(ids, vec!["WikiRdsStack", "WikiCdkStack"]);
    }

    #[test]
    fn test_missing_user_data_fails() {
        let mut config = Config::default();
        config.compute.user_data = "/nonexistent/user-data.sh".into();
        assert!(matches!(
            build_app(&config),
            Err(Error::UserDataNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_config_fails_before_declaring() {
        let (mut config, _file) = config_with_user_data("#!/bin/bash\n");
        config.network.max_azs = 0;
        assert!(matches!(
            build_app(&config),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_export_mode_depends_on_database_stack() {
        let (mut config, _file) = config_with_user_data("#!/bin/bash\n");
        config.compute.credential_source = CredentialSourceKind::Export;
        let app = build_app(&config).unwrap();
        let compute = app.stack("WikiCdkStack").unwrap();
        assert!(compute.dependencies().contains("WikiRdsStack"));
    }
}
