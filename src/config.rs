//! Configuration module for wiki-infra
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values (the wiki deployment as originally laid out)
//! - User configuration (`<config dir>/wiki-infra/config.toml`)
//! - Project configuration (`./wiki-infra.toml` or `./.wiki-infra.toml`)
//! - Environment variables
//! - Command-line arguments
//!
//! Files are merged key by key, later sources winning, so a project file only
//! needs to carry the values it changes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cidr::Ipv4Cidr;
use crate::construct::{StackProps, TemplateFormat};
use crate::error::{Error, ErrorContext, Result};
use crate::resources::ec2::{
    InstanceType, MachineImage, SubnetConfiguration, SubnetType, MAX_PREFIX, MIN_PREFIX,
};
use crate::resources::rds::{EngineKind, MAX_BACKUP_RETENTION_DAYS};
use crate::resources::ssm::validate_parameter_name;
use crate::template::RemovalPolicy;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "WIKI_INFRA_CONFIG";

/// Project configuration file names, checked in order.
pub const PROJECT_CONFIG_FILES: [&str; 2] = ["wiki-infra.toml", ".wiki-infra.toml"];

/// Image the wiki server boots from unless configured otherwise.
pub const DEFAULT_IMAGE_PARAMETER: &str =
    "/aws/service/canonical/ubuntu/server/focal/stable/current/amd64/hvm/ebs-gp2/ami-id";

static EXPORT_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9:-]{1,255}$").expect("Invalid export name regex"));

static STACK_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,127}$").expect("Invalid stack name regex"));

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Assembly output and stack identities
    pub app: AppConfig,

    /// Network layout
    pub network: NetworkConfig,

    /// Generated database credentials
    pub credentials: CredentialsConfig,

    /// Database instance
    pub database: DatabaseConfig,

    /// Wiki server
    pub compute: ComputeConfig,
}

/// Assembly settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory the assembly is written to
    pub out_dir: PathBuf,

    /// Template file format
    pub format: TemplateFormat,

    /// Network+database stack
    pub database_stack: StackConfig,

    /// Compute stack
    pub compute_stack: StackConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("infra.out"),
            format: TemplateFormat::Json,
            database_stack: StackConfig {
                id: "WikiRdsStack".to_string(),
                stack_name: "wiki-rds".to_string(),
                description: None,
                tags: tags("dev"),
            },
            compute_stack: StackConfig {
                id: "WikiCdkStack".to_string(),
                stack_name: "wiki".to_string(),
                description: None,
                tags: tags("prod"),
            },
        }
    }
}

fn tags(environment: &str) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    tags.insert("environment".to_string(), environment.to_string());
    tags.insert("project".to_string(), "wiki".to_string());
    tags
}

/// Identity of one stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackConfig {
    /// Construct id, also the template file stem
    pub id: String,

    /// Deployed stack name
    pub stack_name: String,

    /// Template description
    #[serde(default)]
    pub description: Option<String>,

    /// Tags applied to every taggable resource
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl StackConfig {
    /// Stack properties for this stack.
    pub fn props(&self) -> StackProps {
        StackProps {
            stack_name: Some(self.stack_name.clone()),
            description: self.description.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Network settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// VPC address block
    pub cidr: Ipv4Cidr,

    /// Availability zones to spread subnets over
    pub max_azs: usize,

    /// NAT gateways (must be 0)
    pub nat_gateways: usize,

    /// Subnet groups, allocated in order
    pub subnets: Vec<SubnetConfiguration>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cidr: Ipv4Cidr::from_aligned(std::net::Ipv4Addr::new(10, 0, 0, 0), 16),
            max_azs: 2,
            nat_gateways: 0,
            subnets: vec![
                SubnetConfiguration {
                    name: "public-subnet-1".to_string(),
                    subnet_type: SubnetType::Public,
                    cidr_mask: 24,
                },
                SubnetConfiguration {
                    name: "isolated-subnet-1".to_string(),
                    subnet_type: SubnetType::Isolated,
                    cidr_mask: 28,
                },
            ],
        }
    }
}

/// Credential secret settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Physical secret name; generated by the service when unset or empty
    pub secret_name: Option<String>,

    /// Database master username
    pub username: String,

    /// Generated password length; service default when unset
    pub password_length: Option<u32>,

    /// Leave punctuation out of the password
    pub exclude_punctuation: bool,

    /// Allow spaces in the password
    pub include_space: bool,

    /// Export name of the secret's full ARN
    pub export_name: String,

    /// What happens to the secret when it leaves the template
    pub removal_policy: RemovalPolicy,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            secret_name: Some("wikiDbCredentialsSecret".to_string()),
            username: "postgres".to_string(),
            password_length: None,
            exclude_punctuation: true,
            include_space: false,
            export_name: "wikiDbCredentialsSecretFullArn".to_string(),
            removal_policy: RemovalPolicy::Destroy,
        }
    }
}

/// Database instance settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Engine family
    pub engine: EngineKind,

    /// Engine version
    pub engine_version: String,

    /// Instance hardware
    pub instance_type: InstanceType,

    /// Initial database name
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

    /// Apply minor upgrades automatically
    pub auto_minor_version_upgrade: bool,

    /// Automated backup retention, days
    pub backup_retention_days: u32,

    /// Delete automated backups with the instance
    pub delete_automated_backups: bool,

    /// Block deletion
    pub deletion_protection: bool,

    /// Give the instance a public address (rejected by validation)
    pub publicly_accessible: bool,

    /// What happens to the instance when it leaves the template
    pub removal_policy: RemovalPolicy,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Postgres,
            engine_version: "13.7".to_string(),
            instance_type: InstanceType::from_static("t3.micro"),
            database_name: Some("wikidb".to_string()),
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
}

impl DatabaseConfig {
    /// Port the database listens on.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.engine.default_port())
    }
}

/// How the compute stack reaches the credential secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSourceKind {
    /// Direct reference to the secret; both stacks synthesize together
    #[default]
    Reference,
    /// Import of the secret's published export by name
    Export,
}

impl std::str::FromStr for CredentialSourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reference" => Ok(Self::Reference),
            "export" => Ok(Self::Export),
            other => Err(format!(
                "unknown credential source '{}' (expected reference or export)",
                other
            )),
        }
    }
}

/// One inbound rule on the wiki server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressConfig {
    /// TCP port
    pub port: u16,

    /// Rule description
    pub description: String,
}

/// Wiki server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    /// How the credential secret is resolved
    pub credential_source: CredentialSourceKind,

    /// SSM parameter receiving the secret ARN
    pub parameter_name: String,

    /// Also grant write access on the secret
    pub grant_secret_write: bool,

    /// Instance hardware
    pub instance_type: InstanceType,

    /// Image source
    pub machine_image: MachineImage,

    /// First-boot script, read at synthesis time
    pub user_data: PathBuf,

    /// SSH key pair name
    pub key_name: Option<String>,

    /// Inbound rules, open to any IPv4 address
    pub ingress: Vec<IngressConfig>,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            credential_source: CredentialSourceKind::Reference,
            parameter_name: "/wiki/wiki-rds-credentials-secret-arn".to_string(),
            grant_secret_write: true,
            instance_type: InstanceType::from_static("t3.small"),
            machine_image: MachineImage::from_ssm_parameter(DEFAULT_IMAGE_PARAMETER),
            user_data: PathBuf::from("assets/user-data.sh"),
            key_name: None,
            ingress: vec![
                IngressConfig {
                    port: 22,
                    description: "allow SSH connections from anywhere".to_string(),
                },
                IngressConfig {
                    port: 80,
                    description: "allow HTTP connections from anywhere".to_string(),
                },
                IngressConfig {
                    port: 443,
                    description: "allow HTTPS connections from anywhere".to_string(),
                },
            ],
        }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let paths = Self::get_config_paths(config_path)?;

        let mut merged = serde_json::to_value(Config::default())?;
        for path in &paths {
            debug!(path = %path.display(), "merging configuration file");
            merge_values(&mut merged, Self::read_file(path)?);
        }
        let mut config: Config = serde_json::from_value(merged)
            .map_err(|e| Error::Config(format!("invalid configuration: {}", e)))?;

        config.normalize();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Get the list of configuration files to merge, lowest priority first
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Result<Vec<PathBuf>> {
        // An explicit path replaces the lookup and must exist.
        let explicit = explicit_path
            .cloned()
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(Error::FileNotFound(path));
            }
            return Ok(vec![path]);
        }

        let mut paths = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            let user = dir.join("wiki-infra").join("config.toml");
            if user.is_file() {
                paths.push(user);
            }
        }
        if let Some(project) = PROJECT_CONFIG_FILES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
        {
            paths.push(project);
        }
        Ok(paths)
    }

    /// Parse one file into a JSON tree, by extension
    fn read_file(path: &Path) -> Result<serde_json::Value> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let value: serde_json::Value = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            "toml" => toml::from_str(&content)?,
            _ => {
                // Try TOML first, then YAML
                match toml::from_str(&content) {
                    Ok(value) => value,
                    Err(_) => serde_yaml::from_str(&content).with_context(|| {
                        format!("Failed to parse config file: {}", path.display())
                    })?,
                }
            }
        };
        Ok(value)
    }

    /// Load from a specific file on top of the defaults, without
    /// environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut merged = serde_json::to_value(Config::default())?;
        merge_values(&mut merged, Self::read_file(path.as_ref())?);
        let mut config: Config = serde_json::from_value(merged)
            .map_err(|e| Error::Config(format!("invalid configuration: {}", e)))?;
        config.normalize();
        Ok(config)
    }

    /// Empty optional strings mean "unset", since TOML has no null.
    fn normalize(&mut self) {
        if self.credentials.secret_name.as_deref() == Some("") {
            self.credentials.secret_name = None;
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // WIKI_INFRA_OUT_DIR
        if let Ok(dir) = std::env::var("WIKI_INFRA_OUT_DIR") {
            self.app.out_dir = PathBuf::from(dir);
        }

        // WIKI_INFRA_FORMAT
        if let Ok(format) = std::env::var("WIKI_INFRA_FORMAT") {
            match format.parse() {
                Ok(format) => self.app.format = format,
                Err(e) => warn!("ignoring WIKI_INFRA_FORMAT: {}", e),
            }
        }

        // WIKI_INFRA_KEY_NAME (empty clears the key pair)
        if let Ok(key) = std::env::var("WIKI_INFRA_KEY_NAME") {
            self.compute.key_name = if key.is_empty() { None } else { Some(key) };
        }

        // WIKI_INFRA_INSTANCE_TYPE
        if let Ok(value) = std::env::var("WIKI_INFRA_INSTANCE_TYPE") {
            match InstanceType::new(&value) {
                Ok(instance_type) => self.compute.instance_type = instance_type,
                Err(e) => warn!("ignoring WIKI_INFRA_INSTANCE_TYPE: {}", e),
            }
        }

        // WIKI_INFRA_USER_DATA
        if let Ok(path) = std::env::var("WIKI_INFRA_USER_DATA") {
            self.compute.user_data = PathBuf::from(path);
        }

        // WIKI_INFRA_CREDENTIAL_SOURCE
        if let Ok(source) = std::env::var("WIKI_INFRA_CREDENTIAL_SOURCE") {
            match source.parse() {
                Ok(source) => self.compute.credential_source = source,
                Err(e) => warn!("ignoring WIKI_INFRA_CREDENTIAL_SOURCE: {}", e),
            }
        }
    }

    /// Rejects values that cannot produce a deployable assembly
    pub fn validate(&self) -> Result<()> {
        self.validate_app()?;
        self.validate_network()?;
        self.validate_credentials()?;
        self.validate_database()?;
        self.validate_compute()
    }

    fn validate_app(&self) -> Result<()> {
        let stacks = [
            ("app.database_stack", &self.app.database_stack),
            ("app.compute_stack", &self.app.compute_stack),
        ];
        for (key, stack) in stacks {
            if stack.id.is_empty() {
                return Err(Error::invalid_config(format!("{}.id", key), "must not be empty"));
            }
            if !STACK_NAME_REGEX.is_match(&stack.stack_name) {
                return Err(Error::invalid_config(
                    format!("{}.stack_name", key),
                    format!(
                        "'{}' must start with a letter and contain only letters, digits and hyphens",
                        stack.stack_name
                    ),
                ));
            }
        }
        if self.app.database_stack.id == self.app.compute_stack.id {
            return Err(Error::invalid_config(
                "app.compute_stack.id",
                "stack ids must differ",
            ));
        }
        if self.app.database_stack.stack_name == self.app.compute_stack.stack_name {
            return Err(Error::invalid_config(
                "app.compute_stack.stack_name",
                "stack names must differ",
            ));
        }
        Ok(())
    }

    fn validate_network(&self) -> Result<()> {
        let network = &self.network;
        if !(MIN_PREFIX..=MAX_PREFIX).contains(&network.cidr.prefix()) {
            return Err(Error::invalid_config(
                "network.cidr",
                format!("prefix must be between /{} and /{}", MIN_PREFIX, MAX_PREFIX),
            ));
        }
        if !(1..=6).contains(&network.max_azs) {
            return Err(Error::invalid_config("network.max_azs", "must be between 1 and 6"));
        }
        if network.max_azs < 2 {
            return Err(Error::invalid_config(
                "network.max_azs",
                "the database subnet group needs at least 2 availability zones",
            ));
        }
        if network.nat_gateways != 0 {
            return Err(Error::invalid_config(
                "network.nat_gateways",
                "NAT gateways are not supported",
            ));
        }
        for required in [SubnetType::Public, SubnetType::Isolated] {
            if !network.subnets.iter().any(|s| s.subnet_type == required) {
                return Err(Error::invalid_config(
                    "network.subnets",
                    format!("at least one {} subnet group is required", required),
                ));
            }
        }
        let mut names = BTreeSet::new();
        for subnet in &network.subnets {
            if !names.insert(subnet.name.as_str()) {
                return Err(Error::invalid_config(
                    "network.subnets",
                    format!("subnet group '{}' is declared twice", subnet.name),
                ));
            }
            if subnet.cidr_mask < network.cidr.prefix() || subnet.cidr_mask > MAX_PREFIX {
                return Err(Error::invalid_config(
                    "network.subnets",
                    format!(
                        "mask /{} of '{}' must be between /{} and /{}",
                        subnet.cidr_mask,
                        subnet.name,
                        network.cidr.prefix(),
                        MAX_PREFIX
                    ),
                ));
            }
        }
        Ok(())
    }

    fn validate_credentials(&self) -> Result<()> {
        let credentials = &self.credentials;
        if credentials.username.is_empty() {
            return Err(Error::invalid_config("credentials.username", "must not be empty"));
        }
        if !EXPORT_NAME_REGEX.is_match(&credentials.export_name) {
            return Err(Error::invalid_config(
                "credentials.export_name",
                format!(
                    "'{}' may only contain letters, digits, colons and hyphens",
                    credentials.export_name
                ),
            ));
        }
        if let Some(length) = credentials.password_length {
            if !(8..=4096).contains(&length) {
                return Err(Error::invalid_config(
                    "credentials.password_length",
                    "must be between 8 and 4096",
                ));
            }
        }
        Ok(())
    }

    fn validate_database(&self) -> Result<()> {
        let database = &self.database;
        if database.publicly_accessible {
            return Err(Error::invalid_config(
                "database.publicly_accessible",
                "the database lives in isolated subnets and cannot be public",
            ));
        }
        if database.engine_version.trim().is_empty() {
            return Err(Error::invalid_config("database.engine_version", "must not be empty"));
        }
        if database.allocated_storage == 0 {
            return Err(Error::invalid_config("database.allocated_storage", "must be positive"));
        }
        if let Some(max) = database.max_allocated_storage {
            if max < database.allocated_storage {
                return Err(Error::invalid_config(
                    "database.max_allocated_storage",
                    "must not be below allocated_storage",
                ));
            }
        }
        if database.backup_retention_days > MAX_BACKUP_RETENTION_DAYS {
            return Err(Error::invalid_config(
                "database.backup_retention_days",
                format!("must be at most {}", MAX_BACKUP_RETENTION_DAYS),
            ));
        }
        if database.port == Some(0) {
            return Err(Error::invalid_config("database.port", "must not be 0"));
        }
        Ok(())
    }

    fn validate_compute(&self) -> Result<()> {
        let compute = &self.compute;
        if compute.instance_type.as_str().starts_with("db.") {
            return Err(Error::invalid_config(
                "compute.instance_type",
                format!("'{}' is a database class", compute.instance_type.as_str()),
            ));
        }
        validate_parameter_name(&compute.parameter_name)
            .map_err(|message| Error::invalid_config("compute.parameter_name", message))?;
        compute
            .machine_image
            .validate()
            .map_err(|e| Error::invalid_config("compute.machine_image", e.to_string()))?;
        if compute.user_data.as_os_str().is_empty() {
            return Err(Error::invalid_config("compute.user_data", "must not be empty"));
        }
        if compute.ingress.is_empty() {
            return Err(Error::invalid_config(
                "compute.ingress",
                "at least one inbound port is required",
            ));
        }
        let mut ports = BTreeSet::new();
        for rule in &compute.ingress {
            if rule.port == 0 || !ports.insert(rule.port) {
                return Err(Error::invalid_config(
                    "compute.ingress",
                    format!("port {} is zero or listed twice", rule.port),
                ));
            }
        }
        if let Some(key) = &compute.key_name {
            if key.trim().is_empty() {
                return Err(Error::invalid_config("compute.key_name", "must not be blank"));
            }
        }
        Ok(())
    }
}

/// Deep-merges `overlay` into `base`: objects merge key by key, anything
/// else is replaced.
fn merge_values(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.cidr.to_string(), "10.0.0.0/16");
        assert_eq!(config.network.max_azs, 2);
        assert_eq!(config.database.effective_port(), 5432);
        assert_eq!(config.database.instance_type.db_class(), "db.t3.micro");
        assert_eq!(config.compute.instance_type.as_str(), "t3.small");
        assert_eq!(config.compute.key_name, None);
        assert_eq!(
            config.compute.ingress.iter().map(|r| r.port).collect::<Vec<_>>(),
            vec![22, 80, 443]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_values() {
        let mut base = json!({ "a": { "b": 1, "c": 2 }, "d": [1, 2] });
        merge_values(&mut base, json!({ "a": { "c": 3 }, "d": [9] }));
        assert_eq!(base, json!({ "a": { "b": 1, "c": 3 }, "d": [9] }));
    }

    #[test]
    fn test_defaults_survive_a_roundtrip() {
        let value = serde_json::to_value(Config::default()).unwrap();
        let back: Config = serde_json::from_value(value).unwrap();
        assert_eq!(back, Config::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.database.publicly_accessible = true;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig { ref key, .. }) if key == "database.publicly_accessible"
        ));

        let mut config = Config::default();
        config.network.subnets.retain(|s| s.subnet_type == SubnetType::Public);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.credentials.export_name = "has space".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.compute.ingress.push(IngressConfig {
            port: 22,
            description: "again".into(),
        });
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.app.compute_stack.stack_name = "wiki-rds".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credential_source_parse() {
        assert_eq!(
            "Export".parse::<CredentialSourceKind>().unwrap(),
            CredentialSourceKind::Export
        );
        assert!("lookup".parse::<CredentialSourceKind>().is_err());
    }
}
