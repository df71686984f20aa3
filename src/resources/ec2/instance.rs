//! EC2 instances, their images, types and boot scripts.

use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::security_group::{Connections, SecurityGroupRef};
use super::vpc::{SubnetType, Vpc};
use crate::construct::Stack;
use crate::error::{Error, Result};
use crate::resources::iam::Role;
use crate::template::{logical_id, ParameterDecl, ResourceDecl, ResourceRef, Value};

static INSTANCE_TYPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(db\.)?[a-z][a-z0-9-]*\.[a-z0-9]+$").expect("Invalid instance type regex")
});

static IMAGE_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ami-[0-9a-f]{8,17}$").expect("Invalid image id regex"));

/// Parameter type that makes the service resolve an image id from SSM.
pub const SSM_IMAGE_PARAMETER_TYPE: &str = "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>";

/// An instance class and size such as `t3.small`. Database classes may
/// carry their `db.` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceType(String);

impl InstanceType {
    /// Parses `class.size` or `db.class.size`. The error is a message for
    /// the caller to attach to its own construct or configuration key.
    pub fn new(value: &str) -> std::result::Result<Self, String> {
        if INSTANCE_TYPE_REGEX.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(format!("'{}' is not of the form [db.]class.size", value))
        }
    }

    /// A type known to be well formed.
    pub(crate) fn from_static(value: &'static str) -> Self {
        Self(value.to_string())
    }

    /// The type as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Database instance class for the same hardware (`db.t3.micro`).
    pub fn db_class(&self) -> String {
        if self.0.starts_with("db.") {
            self.0.clone()
        } else {
            format!("db.{}", self.0)
        }
    }
}

impl TryFrom<String> for InstanceType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value).map_err(|message| Error::invalid_config("instance_type", message))
    }
}

impl From<InstanceType> for String {
    fn from(value: InstanceType) -> Self {
        value.0
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the instance image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum MachineImage {
    /// Latest image id published under an SSM parameter, resolved at
    /// deploy time
    SsmParameter {
        /// Public parameter path
        path: String,
    },
    /// A fixed image id
    Pinned {
        /// `ami-...`
        image_id: String,
    },
}

impl MachineImage {
    /// Image resolved from a public SSM parameter.
    pub fn from_ssm_parameter(path: impl Into<String>) -> Self {
        MachineImage::SsmParameter { path: path.into() }
    }

    /// A fixed image id.
    pub fn pinned(image_id: impl Into<String>) -> Self {
        MachineImage::Pinned {
            image_id: image_id.into(),
        }
    }

    /// Checks the path or id.
    pub fn validate(&self) -> Result<()> {
        match self {
            MachineImage::SsmParameter { path } => {
                crate::resources::ssm::validate_parameter_name(path)
                    .map_err(|message| Error::invalid_property("machine_image", "path", message))?;
                if !path.starts_with('/') {
                    return Err(Error::invalid_property(
                        "machine_image",
                        "path",
                        format!("'{}' must be an absolute parameter path", path),
                    ));
                }
                Ok(())
            }
            MachineImage::Pinned { image_id } => {
                if IMAGE_ID_REGEX.is_match(image_id) {
                    Ok(())
                } else {
                    Err(Error::invalid_property(
                        "machine_image",
                        "image_id",
                        format!("'{}' is not an image id", image_id),
                    ))
                }
            }
        }
    }

    /// Value for `ImageId`. An SSM image becomes a template parameter,
    /// shared by every instance in the stack using the same path.
    pub fn image_id(&self, stack: &mut Stack) -> Result<Value> {
        self.validate()?;
        match self {
            MachineImage::Pinned { image_id } => Ok(Value::from(image_id)),
            MachineImage::SsmParameter { path } => {
                let id = format!("SsmParameterValue{}", path);
                let logical = logical_id(&[&id]);
                if stack.parameters().contains_key(&logical) {
                    return Ok(ResourceRef::new(stack.id(), logical).reference());
                }
                let parameter = stack.add_parameter(
                    &[&id],
                    ParameterDecl {
                        kind: SSM_IMAGE_PARAMETER_TYPE.to_string(),
                        default: Some(path.clone()),
                        description: None,
                    },
                )?;
                Ok(parameter.reference())
            }
        }
    }
}

/// Script run on first boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserData {
    content: String,
}

impl UserData {
    /// Script given inline.
    pub fn custom(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Script read from a file, passed through unchanged.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::UserDataNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), bytes = content.len(), "loaded user data");
        Ok(Self { content })
    }

    /// Script text.
    pub fn content(&self) -> &str {
        &self.content
    }

    fn to_value(&self) -> Value {
        Value::Base64(Box::new(Value::from(&self.content)))
    }
}

/// Instance settings.
#[derive(Debug, Clone)]
pub struct InstanceProps<'a> {
    /// Network to launch in
    pub vpc: &'a Vpc,
    /// Which kind of subnet to launch in; the first such subnet is used
    pub subnet_type: SubnetType,
    /// Image
    pub machine_image: &'a MachineImage,
    /// Hardware
    pub instance_type: InstanceType,
    /// Security group
    pub security_group: &'a SecurityGroupRef,
    /// First-boot script
    pub user_data: UserData,
    /// SSH key pair name
    pub key_name: Option<String>,
    /// Role assumed through the instance profile
    pub role: &'a Role,
}

/// A declared instance.
#[derive(Debug, Clone)]
pub struct Instance {
    resource: ResourceRef,
    profile: ResourceRef,
    connections: Connections,
}

impl Instance {
    /// Declares the instance with its instance profile.
    pub fn new(stack: &mut Stack, id: &str, props: InstanceProps<'_>) -> Result<Self> {
        let subnet = props
            .vpc
            .select_subnets(props.subnet_type)
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::invalid_placement(
                    id,
                    format!("VPC '{}' has no {} subnet", props.vpc.id(), props.subnet_type),
                )
            })?;

        let profile = stack.add_resource(
            &[id, "InstanceProfile"],
            ResourceDecl::new("AWS::IAM::InstanceProfile")
                .prop("Roles", vec![props.role.role_name()]),
        )?;

        let image_id = props.machine_image.image_id(stack)?;
        let mut decl = ResourceDecl::new("AWS::EC2::Instance")
            .prop("AvailabilityZone", subnet.availability_zone())
            .prop("IamInstanceProfile", profile.reference())
            .prop("ImageId", image_id)
            .prop("InstanceType", props.instance_type.as_str())
            .prop_opt("KeyName", props.key_name.clone())
            .prop("SecurityGroupIds", vec![props.security_group.group_id()])
            .prop("SubnetId", subnet.subnet_id())
            .prop("UserData", props.user_data.to_value())
            .tag("Name", stack.node_path(&[id]));

        // The instance needs its permissions in place before it boots.
        if props.role.resource().stack == stack.id() {
            if let Some(policy) = props.role.default_policy() {
                decl = decl.depends_on(policy);
            }
            decl = decl.depends_on(props.role.resource());
        }

        let resource = stack.add_resource(&[id, "Resource"], decl)?;
        Ok(Self {
            resource,
            profile,
            connections: Connections::new(vec![props.security_group.clone()], None),
        })
    }

    /// Instance resource.
    pub fn resource(&self) -> &ResourceRef {
        &self.resource
    }

    /// Instance profile resource.
    pub fn instance_profile(&self) -> &ResourceRef {
        &self.profile
    }

    /// `Ref` to the instance.
    pub fn instance_id(&self) -> Value {
        self.resource.reference()
    }

    /// Public DNS name.
    pub fn public_dns_name(&self) -> Value {
        self.resource.attr("PublicDnsName")
    }

    /// Public IP address.
    pub fn public_ip(&self) -> Value {
        self.resource.attr("PublicIp")
    }

    /// Security groups of the instance.
    pub fn connections(&self) -> &Connections {
        &self.connections
    }
}
