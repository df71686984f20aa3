//! RDS database instances.
//!
//! A [`DatabaseInstance`] brings its own subnet group and security group,
//! takes its master credentials from a generated [`Secret`] through dynamic
//! references, and attaches the secret to itself so that the stored
//! document also carries the connection details.

use serde::{Deserialize, Serialize};

use super::ec2::{Connections, InstanceType, Port, SecurityGroup, SecurityGroupRef, SubnetType, Vpc};
use super::secretsmanager::Secret;
use crate::construct::Stack;
use crate::error::{Error, Result};
use crate::template::{RemovalPolicy, ResourceDecl, ResourceRef, Value};

/// Longest retention the service allows, in days.
pub const MAX_BACKUP_RETENTION_DAYS: u32 = 35;

/// Database engine family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// PostgreSQL
    Postgres,
    /// MySQL
    Mysql,
    /// MariaDB
    Mariadb,
}

impl EngineKind {
    /// `Engine` property value.
    pub fn engine_name(&self) -> &'static str {
        match self {
            EngineKind::Postgres => "postgres",
            EngineKind::Mysql => "mysql",
            EngineKind::Mariadb => "mariadb",
        }
    }

    /// Port the engine listens on unless told otherwise.
    pub fn default_port(&self) -> u16 {
        match self {
            EngineKind::Postgres => 5432,
            EngineKind::Mysql | EngineKind::Mariadb => 3306,
        }
    }
}

/// Engine family and version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseEngine {
    /// Family
    pub kind: EngineKind,
    /// Full version, e.g. `13.7`
    pub version: String,
}

impl DatabaseEngine {
    /// PostgreSQL at `version`.
    pub fn postgres(version: impl Into<String>) -> Self {
        Self {
            kind: EngineKind::Postgres,
            version: version.into(),
        }
    }
}

/// Database instance settings.
#[derive(Debug, Clone)]
pub struct DatabaseInstanceProps<'a> {
    /// Network
    pub vpc: &'a Vpc,
    /// Subnets the instance may be placed in
    pub subnet_type: SubnetType,
    /// Engine
    pub engine: DatabaseEngine,
    /// Hardware; `t3.micro` and `db.t3.micro` are equivalent
    pub instance_type: InstanceType,
    /// Master credentials; must carry `username` and `password`
    pub credentials: &'a Secret,
    /// Initial database
    pub database_name: Option<String>,
    /// Listening port; engine default when unset
    pub port: Option<u16>,
    /// Standby in a second AZ
    pub multi_az: bool,
    /// Initial storage, GiB
    pub allocated_storage: u32,
    /// Storage autoscaling ceiling, GiB
    pub max_allocated_storage: Option<u32>,
    /// Allow major version upgrades
    pub allow_major_version_upgrade: bool,
    /// Apply minor version upgrades automatically
    pub auto_minor_version_upgrade: bool,
    /// Automated backup retention, days
    pub backup_retention_days: u32,
    /// Delete automated backups with the instance
    pub delete_automated_backups: bool,
    /// Block deletion of the instance
    pub deletion_protection: bool,
    /// Give the instance a public address
    pub publicly_accessible: bool,
    /// What happens to the instance when it leaves the template
    pub removal_policy: RemovalPolicy,
}

/// A declared database instance.
#[derive(Debug, Clone)]
pub struct DatabaseInstance {
    id: String,
    resource: ResourceRef,
    subnet_group: ResourceRef,
    attachment: ResourceRef,
    port: u16,
    connections: Connections,
}

impl DatabaseInstance {
    /// Declares the instance and everything it brings along.
    pub fn new(stack: &mut Stack, id: &str, props: DatabaseInstanceProps<'_>) -> Result<Self> {
        validate(id, &props)?;
        let subnets = props.vpc.select_subnets(props.subnet_type);
        let port = props.port.unwrap_or_else(|| props.engine.kind.default_port());

        let subnet_group = stack.add_resource(
            &[id, "SubnetGroup", "Default"],
            ResourceDecl::new("AWS::RDS::DBSubnetGroup")
                .prop(
                    "DBSubnetGroupDescription",
                    format!("Subnet group for {} database", id),
                )
                .prop(
                    "SubnetIds",
                    Value::List(subnets.iter().map(|s| s.subnet_id()).collect()),
                ),
        )?;

        let security_group: SecurityGroupRef = SecurityGroup::builder(&[id, "SecurityGroup"])
            .description("Security group for database")
            .build(stack, props.vpc)?;

        let credentials = props.credentials;
        let decl = ResourceDecl::new("AWS::RDS::DBInstance")
            .prop("DBInstanceClass", props.instance_type.db_class())
            .prop("AllocatedStorage", props.allocated_storage.to_string())
            .prop("AllowMajorVersionUpgrade", props.allow_major_version_upgrade)
            .prop("AutoMinorVersionUpgrade", props.auto_minor_version_upgrade)
            .prop("BackupRetentionPeriod", props.backup_retention_days)
            .prop("CopyTagsToSnapshot", true)
            .prop_opt("DBName", props.database_name.clone())
            .prop("DBSubnetGroupName", subnet_group.reference())
            .prop("DeleteAutomatedBackups", props.delete_automated_backups)
            .prop("DeletionProtection", props.deletion_protection)
            .prop("Engine", props.engine.kind.engine_name())
            .prop("EngineVersion", props.engine.version.as_str())
            .prop("MasterUsername", credentials.json_field("username"))
            .prop("MasterUserPassword", credentials.json_field("password"))
            .prop_opt("MaxAllocatedStorage", props.max_allocated_storage)
            .prop("MultiAZ", props.multi_az)
            .prop("Port", port.to_string())
            .prop("PubliclyAccessible", props.publicly_accessible)
            .prop("StorageType", "gp2")
            .prop("VPCSecurityGroups", vec![security_group.group_id()])
            .removal_policy(props.removal_policy);
        let resource = stack.add_resource(&[id, "Resource"], decl)?;

        let attachment = credentials.attach(stack, &resource, "AWS::RDS::DBInstance")?;

        Ok(Self {
            id: id.to_string(),
            resource,
            subnet_group,
            attachment,
            port,
            connections: Connections::new(vec![security_group], Some(Port::tcp(port))),
        })
    }

    /// Construct id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Instance resource.
    pub fn resource(&self) -> &ResourceRef {
        &self.resource
    }

    /// Subnet group resource.
    pub fn subnet_group(&self) -> &ResourceRef {
        &self.subnet_group
    }

    /// Secret attachment resource.
    pub fn secret_attachment(&self) -> &ResourceRef {
        &self.attachment
    }

    /// Listening port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Hostname clients connect to.
    pub fn endpoint_address(&self) -> Value {
        self.resource.attr("Endpoint.Address")
    }

    /// Port as reported by the service.
    pub fn endpoint_port(&self) -> Value {
        self.resource.attr("Endpoint.Port")
    }

    /// Security group and port of the instance.
    pub fn connections(&self) -> &Connections {
        &self.connections
    }
}

fn validate(id: &str, props: &DatabaseInstanceProps<'_>) -> Result<()> {
    if props.subnet_type == SubnetType::Public {
        return Err(Error::invalid_placement(
            id,
            "database instances must not be placed in public subnets",
        ));
    }
    if props.publicly_accessible {
        return Err(Error::invalid_placement(
            id,
            "a database in non-public subnets cannot be publicly accessible",
        ));
    }
    let subnets = props.vpc.select_subnets(props.subnet_type);
    let zones: std::collections::BTreeSet<usize> = subnets.iter().map(|s| s.az_index).collect();
    if zones.len() < 2 {
        return Err(Error::invalid_placement(
            id,
            format!(
                "a subnet group needs {} subnets in at least two availability zones",
                props.subnet_type
            ),
        ));
    }
    for key in ["username", "password"] {
        if !props.credentials.has_field(key) {
            return Err(Error::invalid_property(
                id,
                "credentials",
                format!("secret '{}' has no '{}' field", props.credentials.id(), key),
            ));
        }
    }
    if props.engine.version.trim().is_empty() {
        return Err(Error::invalid_property(id, "engine_version", "must not be empty"));
    }
    if props.allocated_storage == 0 {
        return Err(Error::invalid_property(id, "allocated_storage", "must be positive"));
    }
    if let Some(max) = props.max_allocated_storage {
        if max < props.allocated_storage {
            return Err(Error::invalid_property(
                id,
                "max_allocated_storage",
                format!(
                    "{} GiB is below the allocated {} GiB",
                    max, props.allocated_storage
                ),
            ));
        }
    }
    if props.backup_retention_days > MAX_BACKUP_RETENTION_DAYS {
        return Err(Error::invalid_property(
            id,
            "backup_retention_days",
            format!("must be at most {}", MAX_BACKUP_RETENTION_DAYS),
        ));
    }
    if props.credentials.resource().stack != props.vpc.stack_id() {
        return Err(Error::invalid_placement(
            id,
            "credentials secret must be declared in the database's stack",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::{App, StackProps};
    use crate::resources::ec2::{SubnetConfiguration, VpcProps};
    use crate::resources::secretsmanager::{GenerateSecretString, SecretProps};

    fn fixture(stack: &mut Stack) -> (Vpc, Secret) {
        let vpc = Vpc::new(
            stack,
            "vpc",
            VpcProps {
                cidr: "10.0.0.0/16".parse().unwrap(),
                max_azs: 2,
                nat_gateways: 0,
                subnet_configuration: vec![
                    SubnetConfiguration {
                        name: "public".into(),
                        subnet_type: SubnetType::Public,
                        cidr_mask: 24,
                    },
                    SubnetConfiguration {
                        name: "isolated".into(),
                        subnet_type: SubnetType::Isolated,
                        cidr_mask: 28,
                    },
                ],
            },
        )
        .unwrap();
        let secret = Secret::new(
            stack,
            "creds",
            SecretProps {
                secret_name: None,
                description: None,
                generate: GenerateSecretString::username_password("postgres"),
                removal_policy: RemovalPolicy::Destroy,
            },
        )
        .unwrap();
        (vpc, secret)
    }

    fn props<'a>(vpc: &'a Vpc, secret: &'a Secret) -> DatabaseInstanceProps<'a> {
        DatabaseInstanceProps {
            vpc,
            subnet_type: SubnetType::Isolated,
            engine: DatabaseEngine::postgres("13.7"),
            instance_type: InstanceType::new("t3.micro").unwrap(),
            credentials: secret,
            database_name: Some("wikidb".into()),
            port: None,
            multi_az: false,
            allocated_storage: 20,
            max_allocated_storage: Some(100),
            allow_major_version_upgrade: false,
            auto_minor_version_upgrade: true,
            backup_retention_days: 7,
            delete_automated_backups: true,
            deletion_protection: false,
            publicly_accessible: false,
            removal_policy: RemovalPolicy::Destroy,
        }
    }

    #[test]
    fn test_database_declaration() {
        let mut app = App::new();
        let stack = app.add_stack("Db", StackProps::default()).unwrap();
        let (vpc, secret) = fixture(stack);
        let db = DatabaseInstance::new(stack, "db", props(&vpc, &secret)).unwrap();
        assert_eq!(db.port(), 5432);
        assert_eq!(db.connections().default_port(), Some(Port::tcp(5432)));

        let decl = stack.resource(&db.resource().logical_id).unwrap();
        assert_eq!(decl.property("DBInstanceClass"), Some(&Value::from("db.t3.micro")));
        assert_eq!(decl.property("PubliclyAccessible"), Some(&Value::Bool(false)));
        assert_eq!(decl.property("MasterUsername"), Some(&secret.json_field("username")));
        assert_eq!(decl.removal_policy, Some(RemovalPolicy::Destroy));

        let group = stack.resource(&db.subnet_group().logical_id).unwrap();
        let isolated: Vec<Value> = vpc
            .select_subnets(SubnetType::Isolated)
            .iter()
            .map(|s| s.subnet_id())
            .collect();
        assert_eq!(group.property("SubnetIds"), Some(&Value::List(isolated)));

        let attachment = stack.resource(&db.secret_attachment().logical_id).unwrap();
        assert_eq!(
            attachment.property("TargetId"),
            Some(&db.resource().reference())
        );
    }

    #[test]
    fn test_public_placement_is_rejected() {
        let mut app = App::new();
        let stack = app.add_stack("Db", StackProps::default()).unwrap();
        let (vpc, secret) = fixture(stack);

        let mut public = props(&vpc, &secret);
        public.subnet_type = SubnetType::Public;
        assert!(matches!(
            DatabaseInstance::new(stack, "a", public),
            Err(Error::InvalidPlacement { .. })
        ));

        let mut exposed = props(&vpc, &secret);
        exposed.publicly_accessible = true;
        assert!(matches!(
            DatabaseInstance::new(stack, "b", exposed),
            Err(Error::InvalidPlacement { .. })
        ));
    }

    #[test]
    fn test_storage_and_retention_limits() {
        let mut app = App::new();
        let stack = app.add_stack("Db", StackProps::default()).unwrap();
        let (vpc, secret) = fixture(stack);

        let mut shrinking = props(&vpc, &secret);
        shrinking.max_allocated_storage = Some(10);
        assert!(DatabaseInstance::new(stack, "a", shrinking).is_err());

        let mut long = props(&vpc, &secret);
        long.backup_retention_days = 36;
        assert!(DatabaseInstance::new(stack, "b", long).is_err());
    }

    #[test]
    fn test_custom_port_and_engine() {
        let mut app = App::new();
        let stack = app.add_stack("Db", StackProps::default()).unwrap();
        let (vpc, secret) = fixture(stack);
        let mut p = props(&vpc, &secret);
        p.engine = DatabaseEngine {
            kind: EngineKind::Mysql,
            version: "8.0.35".into(),
        };
        let db = DatabaseInstance::new(stack, "db", p).unwrap();
        assert_eq!(db.port(), 3306);
    }
}
