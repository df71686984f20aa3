//! SSM string parameters.

use once_cell::sync::Lazy;
use regex::Regex;

use super::iam::PolicyStatement;
use crate::construct::Stack;
use crate::error::{Error, Result};
use crate::template::{ResourceDecl, ResourceRef, Value};

static PARAMETER_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-/]{1,1011}$").expect("Invalid parameter name regex"));

/// Checks an SSM parameter name: allowed characters only, and a leading
/// slash whenever the name is hierarchical.
pub fn validate_parameter_name(name: &str) -> std::result::Result<(), String> {
    if !PARAMETER_NAME_REGEX.is_match(name) {
        return Err(format!(
            "'{}' may only contain letters, digits and . - _ /",
            name
        ));
    }
    if name.contains('/') && !name.starts_with('/') {
        return Err(format!("hierarchical name '{}' must start with '/'", name));
    }
    if name.contains("//") || name.ends_with('/') {
        return Err(format!("'{}' has an empty path segment", name));
    }
    Ok(())
}

/// A `String` parameter in Parameter Store.
#[derive(Debug, Clone)]
pub struct StringParameter {
    resource: ResourceRef,
    name: String,
}

impl StringParameter {
    /// Declares the parameter `name` holding `value`.
    pub fn new(
        stack: &mut Stack,
        id: &str,
        name: &str,
        value: impl Into<Value>,
        description: Option<&str>,
    ) -> Result<Self> {
        validate_parameter_name(name)
            .map_err(|message| Error::invalid_property(id, "parameter_name", message))?;

        let resource = stack.add_resource(
            &[id, "Resource"],
            ResourceDecl::new("AWS::SSM::Parameter")
                .prop("Type", "String")
                .prop("Value", value)
                .prop("Name", name)
                .prop_opt("Description", description),
        )?;
        Ok(Self {
            resource,
            name: name.to_string(),
        })
    }

    /// Parameter resource.
    pub fn resource(&self) -> &ResourceRef {
        &self.resource
    }

    /// Parameter name.
    pub fn parameter_name(&self) -> &str {
        &self.name
    }

    /// ARN pattern matching this parameter in any region and account.
    pub fn arn_pattern(&self) -> String {
        parameter_arn_pattern(&self.name)
    }

    /// `ssm:GetParameter` on this parameter.
    pub fn grant_read(&self) -> PolicyStatement {
        PolicyStatement::allow()
            .actions(["ssm:GetParameter"])
            .resource(self.arn_pattern())
    }
}

/// `arn:aws:ssm:*:*:parameter/<name>` for a parameter name with or
/// without its leading slash.
pub fn parameter_arn_pattern(name: &str) -> String {
    format!("arn:aws:ssm:*:*:parameter/{}", name.trim_start_matches('/'))
}
