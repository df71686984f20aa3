//! IAM roles and policy statements.

use crate::construct::Stack;
use crate::error::{Error, Result};
use crate::template::{logical_id, ResourceDecl, ResourceRef, Value};

const POLICY_VERSION: &str = "2012-10-17";

/// Statement effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Allow the actions
    Allow,
    /// Deny the actions
    Deny,
}

impl Effect {
    fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "Allow",
            Effect::Deny => "Deny",
        }
    }
}

/// A single policy statement.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    /// Effect
    pub effect: Effect,
    /// API actions, e.g. `ssm:GetParameter`
    pub actions: Vec<String>,
    /// Resource ARNs
    pub resources: Vec<Value>,
}

impl PolicyStatement {
    /// An allow statement with no actions or resources yet.
    pub fn allow() -> Self {
        Self {
            effect: Effect::Allow,
            actions: Vec::new(),
            resources: Vec::new(),
        }
    }

    /// Adds actions.
    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions.extend(actions.into_iter().map(Into::into));
        self
    }

    /// Adds a resource.
    pub fn resource(mut self, resource: impl Into<Value>) -> Self {
        self.resources.push(resource.into());
        self
    }

    fn to_value(&self) -> Value {
        Value::map([
            ("Action", one_or_many(self.actions.iter().map(Value::from).collect())),
            ("Effect", Value::from(self.effect.as_str())),
            ("Resource", one_or_many(self.resources.clone())),
        ])
    }
}

fn one_or_many(mut items: Vec<Value>) -> Value {
    if items.len() == 1 {
        items.remove(0)
    } else {
        Value::List(items)
    }
}

/// Who may assume a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// An AWS service, e.g. `ec2.amazonaws.com`
    Service(String),
}

impl Principal {
    /// Service principal helper.
    pub fn service(name: impl Into<String>) -> Self {
        Principal::Service(name.into())
    }

    fn to_value(&self) -> Value {
        match self {
            Principal::Service(s) => Value::map([("Service", Value::from(s))]),
        }
    }
}

/// Builds a role together with its default policy.
#[derive(Debug, Clone)]
pub struct RoleBuilder {
    id: String,
    principal: Principal,
    description: Option<String>,
    statements: Vec<PolicyStatement>,
}

impl RoleBuilder {
    /// Starts a role assumed by `principal`.
    pub fn new(id: impl Into<String>, principal: Principal) -> Self {
        Self {
            id: id.into(),
            principal,
            description: None,
            statements: Vec::new(),
        }
    }

    /// Sets the role description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a statement to the default policy. Identical statements are
    /// kept once.
    pub fn statement(mut self, statement: PolicyStatement) -> Self {
        if !self.statements.contains(&statement) {
            self.statements.push(statement);
        }
        self
    }

    /// Declares the role, and its default policy when it has statements.
    pub fn build(self, stack: &mut Stack) -> Result<Role> {
        if let Some(empty) = self.statements.iter().find(|s| s.actions.is_empty()) {
            return Err(Error::invalid_property(
                &self.id,
                "statements",
                format!("statement on {:?} has no actions", empty.resources),
            ));
        }

        let assume = Value::map([
            (
                "Statement",
                Value::List(vec![Value::map([
                    ("Action", Value::from("sts:AssumeRole")),
                    ("Effect", Value::from("Allow")),
                    ("Principal", self.principal.to_value()),
                ])]),
            ),
            ("Version", Value::from(POLICY_VERSION)),
        ]);
        let role = stack.add_resource(
            &[&self.id, "Resource"],
            ResourceDecl::new("AWS::IAM::Role")
                .prop("AssumeRolePolicyDocument", assume)
                .prop_opt("Description", self.description),
        )?;

        let policy = if self.statements.is_empty() {
            None
        } else {
            let document = Value::map([
                (
                    "Statement",
                    Value::List(self.statements.iter().map(PolicyStatement::to_value).collect()),
                ),
                ("Version", Value::from(POLICY_VERSION)),
            ]);
            Some(stack.add_resource(
                &[&self.id, "DefaultPolicy", "Resource"],
                ResourceDecl::new("AWS::IAM::Policy")
                    .prop("PolicyDocument", document)
                    .prop("PolicyName", logical_id(&[&self.id, "DefaultPolicy"]))
                    .prop("Roles", vec![role.reference()]),
            )?)
        };

        Ok(Role {
            id: self.id,
            resource: role,
            policy,
        })
    }
}

/// A declared role.
#[derive(Debug, Clone)]
pub struct Role {
    id: String,
    resource: ResourceRef,
    policy: Option<ResourceRef>,
}

impl Role {
    /// Construct id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Role resource.
    pub fn resource(&self) -> &ResourceRef {
        &self.resource
    }

    /// Default policy resource, when any statement was added.
    pub fn default_policy(&self) -> Option<&ResourceRef> {
        self.policy.as_ref()
    }

    /// `Ref` to the role (its name).
    pub fn role_name(&self) -> Value {
        self.resource.reference()
    }

    /// Role ARN.
    pub fn role_arn(&self) -> Value {
        self.resource.attr("Arn")
    }
}
