//! Network+database stack: the VPC, the generated credentials and the
//! PostgreSQL instance in the isolated subnets.

use tracing::info;

use crate::config::Config;
use crate::construct::Stack;
use crate::error::Result;
use crate::resources::ec2::{SubnetType, Vpc, VpcProps};
use crate::resources::rds::{DatabaseEngine, DatabaseInstance, DatabaseInstanceProps};
use crate::resources::secretsmanager::{GenerateSecretString, Secret, SecretHandle, SecretProps};
use crate::template::OutputDecl;

/// Construct id of the VPC.
pub const VPC_ID: &str = "wiki-vpc";
/// Construct id of the credential secret.
pub const SECRET_ID: &str = "wikiDbCredentialsSecret";
/// Construct id of the database instance.
pub const DATABASE_ID: &str = "db-instance";

/// Output carrying the secret name.
pub const SECRET_NAME_OUTPUT: &str = "SecretName";
/// Output carrying the secret ARN.
pub const SECRET_ARN_OUTPUT: &str = "SecretARN";
/// Output carrying the full secret ARN, exported.
pub const SECRET_FULL_ARN_OUTPUT: &str = "SecretFullARN";
/// Output carrying the database hostname.
pub const DB_ENDPOINT_OUTPUT: &str = "dbEndpoint";

/// Handles published by the network+database stack.
#[derive(Debug, Clone)]
pub struct NetworkDatabaseStack {
    /// The network
    pub vpc: Vpc,
    /// Database master credentials
    pub secret: Secret,
    /// The database instance
    pub database: DatabaseInstance,
}

impl NetworkDatabaseStack {
    /// Declares the stack's resources and outputs into `stack`.
    pub fn build(stack: &mut Stack, config: &Config) -> Result<Self> {
        let vpc = Vpc::new(
            stack,
            VPC_ID,
            VpcProps {
                cidr: config.network.cidr,
                max_azs: config.network.max_azs,
                nat_gateways: config.network.nat_gateways,
                subnet_configuration: config.network.subnets.clone(),
            },
        )?;

        let credentials = &config.credentials;
        let mut generate = GenerateSecretString::username_password(&credentials.username);
        generate.password_length = credentials.password_length;
        generate.exclude_punctuation = credentials.exclude_punctuation;
        generate.include_space = credentials.include_space;
        let secret = Secret::new(
            stack,
            SECRET_ID,
            SecretProps {
                secret_name: credentials.secret_name.clone(),
                description: None,
                generate,
                removal_policy: credentials.removal_policy,
            },
        )?;

        let db = &config.database;
        let database = DatabaseInstance::new(
            stack,
            DATABASE_ID,
            DatabaseInstanceProps {
                vpc: &vpc,
                subnet_type: SubnetType::Isolated,
                engine: DatabaseEngine {
                    kind: db.engine,
                    version: db.engine_version.clone(),
                },
                instance_type: db.instance_type.clone(),
                credentials: &secret,
                database_name: db.database_name.clone(),
                port: db.port,
                multi_az: db.multi_az,
                allocated_storage: db.allocated_storage,
                max_allocated_storage: db.max_allocated_storage,
                allow_major_version_upgrade: db.allow_major_version_upgrade,
                auto_minor_version_upgrade: db.auto_minor_version_upgrade,
                backup_retention_days: db.backup_retention_days,
                delete_automated_backups: db.delete_automated_backups,
                deletion_protection: db.deletion_protection,
                publicly_accessible: db.publicly_accessible,
                removal_policy: db.removal_policy,
            },
        )?;

        stack.add_output(SECRET_NAME_OUTPUT, OutputDecl::new(secret.secret_name_value()))?;
        stack.add_output(SECRET_ARN_OUTPUT, OutputDecl::new(secret.secret_arn()))?;
        stack.add_output(
            SECRET_FULL_ARN_OUTPUT,
            OutputDecl::new(secret.secret_arn()).exported_as(credentials.export_name.as_str()),
        )?;
        stack.add_output(DB_ENDPOINT_OUTPUT, OutputDecl::new(database.endpoint_address()))?;

        info!(
            stack = stack.id(),
            subnets = vpc.subnets().len(),
            export = %credentials.export_name,
            "built network and database"
        );
        Ok(Self {
            vpc,
            secret,
            database,
        })
    }
}
