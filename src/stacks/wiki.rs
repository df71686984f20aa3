//! Compute stack: the wiki server, its identity and its path to the
//! database.

use tracing::{debug, info};

use crate::config::Config;
use crate::construct::Stack;
use crate::error::Result;
use crate::resources::ec2::{
    Instance, InstanceProps, Peer, Port, SecurityGroup, SecurityGroupRef, SubnetType, UserData,
    Vpc,
};
use crate::resources::iam::{Principal, Role, RoleBuilder};
use crate::resources::rds::DatabaseInstance;
use crate::resources::secretsmanager::{ImportedSecret, Secret, SecretHandle};
use crate::resources::ssm::StringParameter;
use crate::template::{ResourceRef, Value};

/// Construct id of the parameter holding the secret ARN.
pub const PARAMETER_ID: &str = "DBCredentialsArn";
/// Construct id of the instance role.
pub const ROLE_ID: &str = "Role";
/// Construct id of the server's security group.
pub const SECURITY_GROUP_ID: &str = "ec2-instance-sg";
/// Construct id of the server.
pub const INSTANCE_ID: &str = "WikiVM";

const DB_RULE_DESCRIPTION: &str = "allow psql connections from wiki vm";

/// Where the compute stack gets the credential secret from.
#[derive(Debug, Clone)]
pub enum CredentialSource<'a> {
    /// The secret handle itself; references become automatic exports.
    Reference(&'a Secret),
    /// The name of an export carrying the full secret ARN.
    Export(String),
}

impl CredentialSource<'_> {
    fn resolve(&self) -> ImportedSecret {
        match self {
            Self::Reference(secret) => ImportedSecret::from_complete_arn(secret.secret_arn()),
            Self::Export(name) => {
                ImportedSecret::from_complete_arn(Value::ImportValue(name.clone()))
            }
        }
    }
}

/// Handles from the network+database stack.
#[derive(Debug, Clone)]
pub struct WikiStackProps<'a> {
    /// Network to launch in
    pub vpc: &'a Vpc,
    /// Database the server talks to
    pub database: &'a DatabaseInstance,
    /// Credential secret
    pub credentials: CredentialSource<'a>,
}

/// Handles published by the compute stack.
#[derive(Debug, Clone)]
pub struct WikiStack {
    /// Parameter holding the secret ARN
    pub parameter: StringParameter,
    /// Role assumed by the server
    pub role: Role,
    /// The server's security group
    pub security_group: SecurityGroupRef,
    /// The server
    pub instance: Instance,
    /// Rules letting the server reach the database
    pub database_rules: Vec<ResourceRef>,
}

impl WikiStack {
    /// Declares the compute resources into `stack`.
    pub fn build(stack: &mut Stack, config: &Config, props: WikiStackProps<'_>) -> Result<Self> {
        let compute = &config.compute;
        let secret = props.credentials.resolve();

        let parameter = StringParameter::new(
            stack,
            PARAMETER_ID,
            &compute.parameter_name,
            secret.secret_arn(),
            None,
        )?;

        let mut role = RoleBuilder::new(ROLE_ID, Principal::service("ec2.amazonaws.com"))
            .statement(parameter.grant_read())
            .statement(secret.grant_read());
        if compute.grant_secret_write {
            role = role.statement(secret.grant_write());
        }
        let role = role.build(stack)?;

        let mut group = SecurityGroup::builder(&[SECURITY_GROUP_ID]).allow_all_outbound(true);
        for rule in &compute.ingress {
            group = group.ingress(Peer::any_ipv4(), Port::tcp(rule.port), &rule.description);
        }
        let security_group = group.build(stack, props.vpc)?;

        let user_data = UserData::from_file(&compute.user_data)?;
        debug!(bytes = user_data.content().len(), "loaded user data");

        let instance = Instance::new(
            stack,
            INSTANCE_ID,
            InstanceProps {
                vpc: props.vpc,
                subnet_type: SubnetType::Public,
                machine_image: &compute.machine_image,
                instance_type: compute.instance_type.clone(),
                security_group: &security_group,
                user_data,
                key_name: compute.key_name.clone(),
                role: &role,
            },
        )?;

        let database_rules = instance.connections().allow_to(
            stack,
            props.database.connections(),
            Port::tcp(props.database.port()),
            DB_RULE_DESCRIPTION,
        )?;

        if let CredentialSource::Export(name) = &props.credentials {
            // A named import carries no reference for synthesis to follow.
            stack.add_dependency(props.vpc.stack_id());
            debug!(export = %name, "importing credential secret");
        }

        info!(
            stack = stack.id(),
            ingress = compute.ingress.len(),
            "built wiki server"
        );
        Ok(Self {
            parameter,
            role,
            security_group,
            instance,
            database_rules,
        })
    }
}
