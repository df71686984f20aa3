//! Secrets Manager secrets.
//!
//! A [`Secret`] is generated by the service from a JSON template: the
//! template carries the fixed fields (the username), and the generated
//! string is stored under `generate_string_key` (the password). Consumers
//! either hold the [`Secret`] itself or an [`ImportedSecret`] built from a
//! published ARN; both hand out grants through [`SecretHandle`].

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use super::iam::PolicyStatement;
use crate::construct::Stack;
use crate::error::{Error, Result};
use crate::template::{RemovalPolicy, ResourceDecl, ResourceRef, Value};

static SECRET_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9/_+=.@-]{1,512}$").expect("Invalid secret name regex"));

const READ_ACTIONS: [&str; 2] = [
    "secretsmanager:GetSecretValue",
    "secretsmanager:DescribeSecret",
];

const WRITE_ACTIONS: [&str; 3] = [
    "secretsmanager:PutSecretValue",
    "secretsmanager:UpdateSecret",
    "secretsmanager:UpdateSecretVersionStage",
];

/// How the secret string is generated.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateSecretString {
    /// Fixed fields of the JSON document
    pub template: IndexMap<String, String>,
    /// Field receiving the generated string
    pub generate_string_key: String,
    /// Generated string length; service default when unset
    pub password_length: Option<u32>,
    /// Leave punctuation out of the generated string
    pub exclude_punctuation: bool,
    /// Allow spaces in the generated string
    pub include_space: bool,
    /// Characters never to generate
    pub exclude_characters: Option<String>,
}

impl GenerateSecretString {
    /// Username/password pair with the username fixed.
    pub fn username_password(username: &str) -> Self {
        let mut template = IndexMap::new();
        template.insert("username".to_string(), username.to_string());
        Self {
            template,
            generate_string_key: "password".to_string(),
            password_length: None,
            exclude_punctuation: true,
            include_space: false,
            exclude_characters: None,
        }
    }

    fn to_value(&self) -> Result<Value> {
        let template = serde_json::to_string(&self.template)?;
        let mut entries = vec![
            ("SecretStringTemplate", Value::from(template)),
            ("GenerateStringKey", Value::from(&self.generate_string_key)),
            ("ExcludePunctuation", Value::from(self.exclude_punctuation)),
            ("IncludeSpace", Value::from(self.include_space)),
        ];
        if let Some(length) = self.password_length {
            entries.push(("PasswordLength", Value::from(length)));
        }
        if let Some(chars) = &self.exclude_characters {
            entries.push(("ExcludeCharacters", Value::from(chars)));
        }
        Ok(Value::map(entries))
    }
}

/// Secret settings.
#[derive(Debug, Clone)]
pub struct SecretProps {
    /// Physical secret name; generated by the service when unset
    pub secret_name: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Generation settings
    pub generate: GenerateSecretString,
    /// What happens to the secret when it leaves the template
    pub removal_policy: RemovalPolicy,
}

/// Access to a secret, owned or imported.
pub trait SecretHandle {
    /// Value resolving to the secret ARN.
    fn secret_arn(&self) -> Value;

    /// Read access: fetch and describe the secret value.
    fn grant_read(&self) -> PolicyStatement {
        PolicyStatement::allow()
            .actions(READ_ACTIONS)
            .resource(self.secret_arn())
    }

    /// Write access: store new secret values.
    fn grant_write(&self) -> PolicyStatement {
        PolicyStatement::allow()
            .actions(WRITE_ACTIONS)
            .resource(self.secret_arn())
    }
}

/// A secret declared in a stack.
#[derive(Debug, Clone)]
pub struct Secret {
    id: String,
    resource: ResourceRef,
    secret_name: Option<String>,
    generate: GenerateSecretString,
}

impl Secret {
    /// Declares the secret.
    pub fn new(stack: &mut Stack, id: &str, props: SecretProps) -> Result<Self> {
        if let Some(name) = &props.secret_name {
            if !SECRET_NAME_REGEX.is_match(name) {
                return Err(Error::invalid_property(
                    id,
                    "secret_name",
                    format!("'{}' is not a valid secret name", name),
                ));
            }
        }
        let generate = props.generate;
        if generate.generate_string_key.is_empty() {
            return Err(Error::invalid_property(
                id,
                "generate_string_key",
                "must not be empty",
            ));
        }
        if generate.template.contains_key(&generate.generate_string_key) {
            return Err(Error::invalid_property(
                id,
                "generate_string_key",
                format!(
                    "'{}' is already a fixed field of the template",
                    generate.generate_string_key
                ),
            ));
        }

        let resource = stack.add_resource(
            &[id, "Resource"],
            ResourceDecl::new("AWS::SecretsManager::Secret")
                .prop_opt("Name", props.secret_name.clone())
                .prop_opt("Description", props.description)
                .prop("GenerateSecretString", generate.to_value()?)
                .removal_policy(props.removal_policy),
        )?;

        Ok(Self {
            id: id.to_string(),
            resource,
            secret_name: props.secret_name,
            generate,
        })
    }

    /// Construct id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Secret resource.
    pub fn resource(&self) -> &ResourceRef {
        &self.resource
    }

    /// Configured physical name.
    pub fn secret_name(&self) -> Option<&str> {
        self.secret_name.as_deref()
    }

    /// Value resolving to the physical name. Without a configured name
    /// this is the name segment of the ARN, random suffix included.
    pub fn secret_name_value(&self) -> Value {
        match &self.secret_name {
            Some(name) => Value::from(name),
            None => Value::Select(
                6,
                Box::new(Value::Split(":".to_string(), Box::new(self.secret_arn()))),
            ),
        }
    }

    /// Whether the secret document carries `key`.
    pub fn has_field(&self, key: &str) -> bool {
        self.generate.template.contains_key(key) || self.generate.generate_string_key == key
    }

    /// Dynamic reference to one field of the secret document.
    pub fn json_field(&self, key: &str) -> Value {
        Value::Join(
            String::new(),
            vec![
                Value::from("{{resolve:secretsmanager:"),
                self.secret_arn(),
                Value::from(format!(":SecretString:{}::}}}}", key)),
            ],
        )
    }

    /// Binds the secret to a database instance so that the stored document
    /// gains the connection fields (host, port, engine).
    pub fn attach(
        &self,
        stack: &mut Stack,
        target: &ResourceRef,
        target_type: &str,
    ) -> Result<ResourceRef> {
        if stack.id() != self.resource.stack {
            return Err(Error::invalid_placement(
                &self.id,
                format!(
                    "attachment must live in stack '{}', not '{}'",
                    self.resource.stack,
                    stack.id()
                ),
            ));
        }
        stack.add_resource(
            &[&self.id, "Attachment", "Resource"],
            ResourceDecl::new("AWS::SecretsManager::SecretTargetAttachment")
                .prop("SecretId", self.secret_arn())
                .prop("TargetId", target.reference())
                .prop("TargetType", target_type),
        )
    }
}

impl SecretHandle for Secret {
    fn secret_arn(&self) -> Value {
        self.resource.reference()
    }
}

/// A secret known only by its ARN.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedSecret {
    arn: Value,
}

impl ImportedSecret {
    /// From a complete ARN (including the random suffix), such as one
    /// imported from another stack's export.
    pub fn from_complete_arn(arn: impl Into<Value>) -> Self {
        Self { arn: arn.into() }
    }
}

impl SecretHandle for ImportedSecret {
    fn secret_arn(&self) -> Value {
        self.arn.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::{App, StackProps};
    use serde_json::json;

    fn props() -> SecretProps {
        SecretProps {
            secret_name: None,
            description: None,
            generate: GenerateSecretString::username_password("postgres"),
            removal_policy: RemovalPolicy::Destroy,
        }
    }

    #[test]
    fn test_generated_secret_template() {
        let mut app = App::new();
        let stack = app.add_stack("Db", StackProps::default()).unwrap();
        let secret = Secret::new(stack, "creds", props()).unwrap();
        assert!(secret.has_field("username"));
        assert!(secret.has_field("password"));
        assert!(!secret.has_field("host"));

        let assembly = app.synth().unwrap();
        let rendered = assembly
            .stack("Db")
            .unwrap()
            .resource(&secret.resource().logical_id)
            .unwrap()
            .clone();
        assert_eq!(
            rendered["Properties"]["GenerateSecretString"],
            json!({
                "SecretStringTemplate": "{\"username\":\"postgres\"}",
                "GenerateStringKey": "password",
                "ExcludePunctuation": true,
                "IncludeSpace": false
            })
        );
        assert_eq!(rendered["DeletionPolicy"], "Delete");
    }

    #[test]
    fn test_json_field_is_a_dynamic_reference() {
        let mut app = App::new();
        let stack = app.add_stack("Db", StackProps::default()).unwrap();
        let secret = Secret::new(stack, "creds", props()).unwrap();
        assert_eq!(
            secret.json_field("username"),
            Value::Join(
                String::new(),
                vec![
                    Value::from("{{resolve:secretsmanager:"),
                    secret.resource().reference(),
                    Value::from(":SecretString:username::}}"),
                ]
            )
        );
    }

    #[test]
    fn test_invalid_name_and_key() {
        let mut app = App::new();
        let stack = app.add_stack("Db", StackProps::default()).unwrap();
        let mut bad_name = props();
        bad_name.secret_name = Some("has space".into());
        assert!(Secret::new(stack, "a", bad_name).is_err());

        let mut clash = props();
        clash.generate.generate_string_key = "username".into();
        assert!(matches!(
            Secret::new(stack, "b", clash),
            Err(Error::InvalidProperty { .. })
        ));
    }

    #[test]
    fn test_grants_target_the_arn() {
        let imported = ImportedSecret::from_complete_arn(Value::ImportValue("fullArn".into()));
        let read = imported.grant_read();
        assert_eq!(read.resources, vec![Value::ImportValue("fullArn".into())]);
        assert!(read.actions.contains(&"secretsmanager:GetSecretValue".to_string()));
        let write = imported.grant_write();
        assert!(write.actions.contains(&"secretsmanager:PutSecretValue".to_string()));
    }

    #[test]
    fn test_attachment_must_stay_with_the_secret() {
        let mut app = App::new();
        let db = app.add_stack("Db", StackProps::default()).unwrap();
        let secret = Secret::new(db, "creds", props()).unwrap();
        let other = app.add_stack("Other", StackProps::default()).unwrap();
        let target = ResourceRef::new("Other", "db");
        assert!(secret.attach(other, &target, "AWS::RDS::DBInstance").is_err());
    }
}
