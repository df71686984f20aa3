//! Property values and intrinsic functions.
//!
//! A [`Value`] is either a literal or a token that the control plane resolves
//! at deploy time (`Ref`, `Fn::GetAtt`, `Fn::ImportValue`, ...). References
//! remember which stack owns their target so that the assembly can turn a
//! reference that crosses stacks into an export/import pair.

use indexmap::IndexMap;
use serde_json::json;

use crate::error::Result;

/// Points at a resource or parameter declared in a stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceRef {
    /// Id of the owning stack
    pub stack: String,
    /// Logical id inside the owning stack
    pub logical_id: String,
}

impl ResourceRef {
    /// Creates a reference.
    pub fn new(stack: impl Into<String>, logical_id: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            logical_id: logical_id.into(),
        }
    }

    /// `{ "Ref": ... }` to this resource.
    pub fn reference(&self) -> Value {
        Value::Ref(self.clone())
    }

    /// `{ "Fn::GetAtt": [..., attribute] }` on this resource.
    pub fn attr(&self, attribute: &str) -> Value {
        Value::GetAtt(self.clone(), attribute.to_string())
    }
}

/// A template property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Literal string
    String(String),
    /// Literal integer
    Number(i64),
    /// Literal boolean
    Bool(bool),
    /// List of values
    List(Vec<Value>),
    /// Object with declaration-ordered keys
    Map(IndexMap<String, Value>),
    /// `Ref`
    Ref(ResourceRef),
    /// `Fn::GetAtt`
    GetAtt(ResourceRef, String),
    /// `Fn::ImportValue` of a named export
    ImportValue(String),
    /// `Fn::Join`
    Join(String, Vec<Value>),
    /// `Fn::Select`
    Select(usize, Box<Value>),
    /// `Fn::Split`
    Split(String, Box<Value>),
    /// `Fn::GetAZs` for the deployment region
    GetAzs,
    /// `Fn::Base64`
    Base64(Box<Value>),
}

/// Renders references on behalf of the stack being synthesized.
pub trait Resolve {
    /// Id of the stack whose template is being rendered.
    fn stack(&self) -> &str;

    /// Returns the export name through which `value`, owned by another
    /// stack, can be imported.
    fn import(&mut self, value: &Value) -> Result<String>;
}

impl Value {
    /// Literal string helper.
    pub fn str(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Builds a map from `(key, value)` pairs, keeping their order.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// `Fn::Select [index, Fn::GetAZs ""]`
    pub fn availability_zone(index: usize) -> Self {
        Value::Select(index, Box::new(Value::GetAzs))
    }

    /// Returns the literal string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Stack owning the referenced target, for `Ref` and `Fn::GetAtt`.
    pub fn owner(&self) -> Option<&str> {
        match self {
            Value::Ref(r) | Value::GetAtt(r, _) => Some(&r.stack),
            _ => None,
        }
    }

    /// Renders the value into template JSON.
    pub fn render(&self, resolver: &mut dyn Resolve) -> Result<serde_json::Value> {
        Ok(match self {
            Value::String(s) => json!(s),
            Value::Number(n) => json!(n),
            Value::Bool(b) => json!(b),
            Value::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|v| v.render(resolver))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Map(entries) => {
                let mut obj = serde_json::Map::new();
                for (k, v) in entries {
                    obj.insert(k.clone(), v.render(resolver)?);
                }
                serde_json::Value::Object(obj)
            }
            Value::Ref(r) => {
                if r.stack == resolver.stack() {
                    json!({ "Ref": r.logical_id })
                } else {
                    json!({ "Fn::ImportValue": resolver.import(self)? })
                }
            }
            Value::GetAtt(r, attr) => {
                if r.stack == resolver.stack() {
                    json!({ "Fn::GetAtt": [r.logical_id, attr] })
                } else {
                    json!({ "Fn::ImportValue": resolver.import(self)? })
                }
            }
            Value::ImportValue(name) => json!({ "Fn::ImportValue": name }),
            Value::Join(sep, parts) => {
                let parts = parts
                    .iter()
                    .map(|v| v.render(resolver))
                    .collect::<Result<Vec<_>>>()?;
                json!({ "Fn::Join": [sep, parts] })
            }
            Value::Select(index, list) => json!({ "Fn::Select": [index, list.render(resolver)?] }),
            Value::Split(sep, source) => json!({ "Fn::Split": [sep, source.render(resolver)?] }),
            Value::GetAzs => json!({ "Fn::GetAZs": "" }),
            Value::Base64(inner) => json!({ "Fn::Base64": inner.render(resolver)? }),
        })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(i64::from(n))
    }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self {
        Value::Number(i64::from(n))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        stack: &'static str,
        imported: Vec<Value>,
    }

    impl Resolve for Fixed {
        fn stack(&self) -> &str {
            self.stack
        }

        fn import(&mut self, value: &Value) -> Result<String> {
            self.imported.push(value.clone());
            Ok(format!("export-{}", self.imported.len()))
        }
    }

    fn local() -> Fixed {
        Fixed {
            stack: "A",
            imported: Vec::new(),
        }
    }

    #[test]
    fn test_literals() {
        let mut r = local();
        assert_eq!(Value::from("x").render(&mut r).unwrap(), json!("x"));
        assert_eq!(Value::from(5432u16).render(&mut r).unwrap(), json!(5432));
        assert_eq!(Value::from(false).render(&mut r).unwrap(), json!(false));
    }

    #[test]
    fn test_local_refs() {
        let mut r = local();
        let res = ResourceRef::new("A", "Vpc1234");
        assert_eq!(res.reference().render(&mut r).unwrap(), json!({ "Ref": "Vpc1234" }));
        assert_eq!(
            res.attr("CidrBlock").render(&mut r).unwrap(),
            json!({ "Fn::GetAtt": ["Vpc1234", "CidrBlock"] })
        );
        assert!(r.imported.is_empty());
    }

    #[test]
    fn test_foreign_refs_become_imports() {
        let mut r = local();
        let foreign = ResourceRef::new("B", "DbSg").attr("GroupId");
        let rendered = foreign.render(&mut r).unwrap();
        assert_eq!(rendered, json!({ "Fn::ImportValue": "export-1" }));
        assert_eq!(r.imported, vec![foreign]);
    }

    #[test]
    fn test_nested_intrinsics() {
        let mut r = local();
        let v = Value::map([
            ("AvailabilityZone", Value::availability_zone(1)),
            ("UserData", Value::Base64(Box::new("#!/bin/bash".into()))),
            (
                "Arn",
                Value::Join(":".into(), vec!["arn".into(), ResourceRef::new("A", "X").reference()]),
            ),
        ]);
        assert_eq!(
            v.render(&mut r).unwrap(),
            json!({
                "AvailabilityZone": { "Fn::Select": [1, { "Fn::GetAZs": "" }] },
                "UserData": { "Fn::Base64": "#!/bin/bash" },
                "Arn": { "Fn::Join": [":", ["arn", { "Ref": "X" }]] }
            })
        );
    }
}
