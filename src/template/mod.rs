//! CloudFormation template model.
//!
//! Constructs declare [`ResourceDecl`]s, [`ParameterDecl`]s and
//! [`OutputDecl`]s into a stack; the declarations are rendered to template
//! JSON once every stack in the app has been built, so that references
//! between stacks can be resolved.

mod logical_id;
mod value;

pub use logical_id::{logical_id, path_hash, remove_non_alphanumeric};
pub use value::{Resolve, ResourceRef, Value};

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::Result;

/// Template format version emitted in every template.
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// What happens to a resource when it leaves the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    /// Delete the physical resource
    Destroy,
    /// Keep the physical resource
    Retain,
    /// Snapshot, then delete
    Snapshot,
}

impl RemovalPolicy {
    /// Value used for `DeletionPolicy` and `UpdateReplacePolicy`.
    pub fn as_policy(&self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
            RemovalPolicy::Snapshot => "Snapshot",
        }
    }
}

/// How a resource type carries tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFormat {
    /// `[{ "Key": ..., "Value": ... }]`
    KeyValueList,
    /// `{ "key": "value" }`
    Map,
    /// Resource type has no tags
    Unsupported,
}

/// Tag format for a resource type.
pub fn tag_format(kind: &str) -> TagFormat {
    match kind {
        "AWS::EC2::VPC"
        | "AWS::EC2::Subnet"
        | "AWS::EC2::RouteTable"
        | "AWS::EC2::InternetGateway"
        | "AWS::EC2::SecurityGroup"
        | "AWS::EC2::Instance"
        | "AWS::RDS::DBInstance"
        | "AWS::RDS::DBSubnetGroup"
        | "AWS::SecretsManager::Secret"
        | "AWS::IAM::Role" => TagFormat::KeyValueList,
        "AWS::SSM::Parameter" => TagFormat::Map,
        _ => TagFormat::Unsupported,
    }
}

/// A resource declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDecl {
    /// Resource type, e.g. `AWS::EC2::VPC`
    pub kind: String,
    /// Properties in declaration order
    pub properties: IndexMap<String, Value>,
    /// Logical ids (same stack) this resource must be created after
    pub depends_on: Vec<String>,
    /// Deletion and replacement policy
    pub removal_policy: Option<RemovalPolicy>,
    /// Resource-level tags; stack tags are merged in at render time
    pub tags: BTreeMap<String, String>,
}

impl ResourceDecl {
    /// Starts a declaration of the given type.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            properties: IndexMap::new(),
            depends_on: Vec::new(),
            removal_policy: None,
            tags: BTreeMap::new(),
        }
    }

    /// Sets a property.
    pub fn prop(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Sets a property when `value` is present.
    pub fn prop_opt<V: Into<Value>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.prop(name, v),
            None => self,
        }
    }

    /// Adds a `DependsOn` entry.
    pub fn depends_on(mut self, target: &ResourceRef) -> Self {
        if !self.depends_on.contains(&target.logical_id) {
            self.depends_on.push(target.logical_id.clone());
        }
        self
    }

    /// Sets the removal policy.
    pub fn removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = Some(policy);
        self
    }

    /// Adds a resource-level tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Property by name.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Renders the resource. Stack tags are applied first so that
    /// resource-level tags (such as `Name`) win on conflicts.
    pub fn render(
        &self,
        stack_tags: &BTreeMap<String, String>,
        resolver: &mut dyn Resolve,
    ) -> Result<serde_json::Value> {
        let mut properties = serde_json::Map::new();
        for (name, value) in &self.properties {
            properties.insert(name.clone(), value.render(resolver)?);
        }

        let mut tags = stack_tags.clone();
        tags.extend(self.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        if !tags.is_empty() {
            match tag_format(&self.kind) {
                TagFormat::KeyValueList => {
                    let list: Vec<serde_json::Value> = tags
                        .iter()
                        .map(|(k, v)| json!({ "Key": k, "Value": v }))
                        .collect();
                    properties.insert("Tags".to_string(), serde_json::Value::Array(list));
                }
                TagFormat::Map => {
                    properties.insert("Tags".to_string(), json!(tags));
                }
                TagFormat::Unsupported => {}
            }
        }

        let mut resource = serde_json::Map::new();
        resource.insert("Type".to_string(), json!(self.kind));
        if !properties.is_empty() {
            resource.insert("Properties".to_string(), serde_json::Value::Object(properties));
        }
        if !self.depends_on.is_empty() {
            resource.insert("DependsOn".to_string(), json!(self.depends_on));
        }
        if let Some(policy) = self.removal_policy {
            resource.insert("UpdateReplacePolicy".to_string(), json!(policy.as_policy()));
            resource.insert("DeletionPolicy".to_string(), json!(policy.as_policy()));
        }
        Ok(serde_json::Value::Object(resource))
    }
}

/// A template parameter declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDecl {
    /// Parameter type
    pub kind: String,
    /// Default value
    pub default: Option<String>,
    /// Description
    pub description: Option<String>,
}

impl ParameterDecl {
    /// Renders the parameter.
    pub fn render(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("Type".to_string(), json!(self.kind));
        if let Some(default) = &self.default {
            obj.insert("Default".to_string(), json!(default));
        }
        if let Some(description) = &self.description {
            obj.insert("Description".to_string(), json!(description));
        }
        serde_json::Value::Object(obj)
    }
}

/// A template output declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDecl {
    /// Output value
    pub value: Value,
    /// Export name, when the value is published for other stacks
    pub export_name: Option<String>,
    /// Description
    pub description: Option<String>,
}

impl OutputDecl {
    /// Output without export.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            export_name: None,
            description: None,
        }
    }

    /// Publishes the output under `name`.
    pub fn exported_as(mut self, name: impl Into<String>) -> Self {
        self.export_name = Some(name.into());
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Renders the output.
    pub fn render(&self, resolver: &mut dyn Resolve) -> Result<serde_json::Value> {
        let mut obj = serde_json::Map::new();
        if let Some(description) = &self.description {
            obj.insert("Description".to_string(), json!(description));
        }
        obj.insert("Value".to_string(), self.value.render(resolver)?);
        if let Some(name) = &self.export_name {
            obj.insert("Export".to_string(), json!({ "Name": name }));
        }
        Ok(serde_json::Value::Object(obj))
    }
}
