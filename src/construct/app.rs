//! The app: a set of stacks synthesized together.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde_json::json;
use tracing::{debug, info};

use super::assembly::{CloudAssembly, StackArtifact};
use super::{Stack, StackProps};
use crate::error::{Error, Result};
use crate::template::{
    path_hash, remove_non_alphanumeric, OutputDecl, Resolve, Value, TEMPLATE_FORMAT_VERSION,
};

/// Root of the construct tree.
#[derive(Debug, Clone, Default)]
pub struct App {
    stacks: IndexMap<String, Stack>,
}

impl App {
    /// Creates an empty app.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stack. Stack ids and deployed stack names must be unique.
    pub fn add_stack(&mut self, id: &str, props: StackProps) -> Result<&mut Stack> {
        let stack = Stack::new(id, props);
        if self.stacks.contains_key(id)
            || self
                .stacks
                .values()
                .any(|s| s.stack_name() == stack.stack_name())
        {
            return Err(Error::DuplicateStack(id.to_string()));
        }
        debug!(stack = id, name = stack.stack_name(), "added stack");
        Ok(self.stacks.entry(id.to_string()).or_insert(stack))
    }

    /// Stack by id.
    pub fn stack(&self, id: &str) -> Option<&Stack> {
        self.stacks.get(id)
    }

    /// Mutable stack by id.
    pub fn stack_mut(&mut self, id: &str) -> Result<&mut Stack> {
        self.stacks
            .get_mut(id)
            .ok_or_else(|| Error::StackNotFound(id.to_string()))
    }

    /// Stacks in declaration order.
    pub fn stacks(&self) -> impl Iterator<Item = &Stack> {
        self.stacks.values()
    }

    /// Renders every stack into a cloud assembly.
    ///
    /// A reference from one stack to a resource in another becomes an
    /// output with an export in the producing stack and an
    /// `Fn::ImportValue` in the consuming one, and records a dependency
    /// between them. When the producer already exports that exact value
    /// under an explicit name, the existing export is reused.
    pub fn synth(&self) -> Result<CloudAssembly> {
        let mut wiring = Wiring::new(self);

        // Resources and parameters first: they are where most cross-stack
        // references come from. Auto-exports are collected along the way.
        let mut sections: IndexMap<&str, (serde_json::Map<_, _>, serde_json::Map<_, _>)> =
            IndexMap::new();
        for stack in self.stacks.values() {
            let mut resolver = wiring.resolver(stack.id());
            let mut parameters = serde_json::Map::new();
            for (id, decl) in stack.parameters() {
                parameters.insert(id.clone(), decl.render());
            }
            let mut resources = serde_json::Map::new();
            for (id, decl) in stack.resources() {
                resources.insert(id.clone(), decl.render(stack.tags(), &mut resolver)?);
            }
            sections.insert(stack.id(), (parameters, resources));
        }

        let mut outputs: IndexMap<&str, serde_json::Map<String, serde_json::Value>> =
            IndexMap::new();
        for stack in self.stacks.values() {
            let mut resolver = wiring.resolver(stack.id());
            let mut rendered = serde_json::Map::new();
            for (id, decl) in stack.outputs() {
                rendered.insert(id.clone(), decl.render(&mut resolver)?);
            }
            outputs.insert(stack.id(), rendered);
        }

        // Auto-exports only ever reference their own stack.
        for stack in self.stacks.values() {
            let Some(exports) = wiring.exports.get(stack.id()) else {
                continue;
            };
            let mut resolver = LocalOnly(stack.id());
            let rendered = outputs.entry(stack.id()).or_default();
            for (id, decl) in exports {
                rendered.insert(id.clone(), decl.render(&mut resolver)?);
            }
        }

        let mut export_names = BTreeSet::new();
        for decl in self
            .stacks
            .values()
            .flat_map(|s| s.outputs().values())
            .chain(wiring.exports.values().flat_map(|e| e.values()))
        {
            if let Some(name) = &decl.export_name {
                if !export_names.insert(name.clone()) {
                    return Err(Error::DuplicateExport(name.clone()));
                }
            }
        }

        let mut artifacts = Vec::with_capacity(self.stacks.len());
        for stack in self.stacks.values() {
            let (parameters, resources) = sections.shift_remove(stack.id()).unwrap_or_default();
            let outputs = outputs.shift_remove(stack.id()).unwrap_or_default();

            let mut template = serde_json::Map::new();
            template.insert(
                "AWSTemplateFormatVersion".to_string(),
                json!(TEMPLATE_FORMAT_VERSION),
            );
            if let Some(description) = stack.description() {
                template.insert("Description".to_string(), json!(description));
            }
            if !parameters.is_empty() {
                template.insert("Parameters".to_string(), parameters.into());
            }
            template.insert("Resources".to_string(), resources.into());
            if !outputs.is_empty() {
                template.insert("Outputs".to_string(), outputs.into());
            }

            let dependencies: Vec<String> = stack
                .dependencies()
                .iter()
                .chain(wiring.dependencies.get(stack.id()).into_iter().flatten())
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            info!(
                stack = stack.id(),
                resources = stack.resources().len(),
                dependencies = ?dependencies,
                "synthesized stack"
            );
            artifacts.push(StackArtifact {
                id: stack.id().to_string(),
                stack_name: stack.stack_name().to_string(),
                tags: stack.tags().clone(),
                dependencies,
                template: serde_json::Value::Object(template),
            });
        }

        // Orders the stacks; cycles and unknown stacks fail here.
        CloudAssembly::new(artifacts)
    }
}

/// Cross-stack bookkeeping for one synthesis.
struct Wiring<'a> {
    app: &'a App,
    /// producer stack id -> output id -> export
    exports: BTreeMap<String, IndexMap<String, OutputDecl>>,
    /// consumer stack id -> producer stack ids
    dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl<'a> Wiring<'a> {
    fn new(app: &'a App) -> Self {
        Self {
            app,
            exports: BTreeMap::new(),
            dependencies: BTreeMap::new(),
        }
    }

    fn resolver<'w>(&'w mut self, stack: &'w str) -> CrossStack<'w, 'a> {
        CrossStack {
            wiring: self,
            stack,
        }
    }

    fn import(&mut self, consumer: &str, value: &Value) -> Result<String> {
        let (target, human) = match value {
            Value::Ref(r) => (r, format!("Ref{}", r.logical_id)),
            Value::GetAtt(r, attr) => (
                r,
                format!("FnGetAtt{}{}", r.logical_id, remove_non_alphanumeric(attr)),
            ),
            other => {
                return Err(Error::Internal(format!(
                    "value {:?} cannot be exported",
                    other
                )))
            }
        };

        let producer = self
            .app
            .stack(&target.stack)
            .filter(|s| s.resource(&target.logical_id).is_some())
            .ok_or_else(|| Error::UnresolvedReference {
                stack: target.stack.clone(),
                logical_id: target.logical_id.clone(),
            })?;

        self.dependencies
            .entry(consumer.to_string())
            .or_default()
            .insert(producer.id().to_string());

        if let Some(name) = producer.export_for(value) {
            debug!(consumer, producer = producer.id(), export = name, "reusing export");
            return Ok(name.to_string());
        }

        let hash = match value {
            Value::GetAtt(r, attr) => path_hash(&[&r.logical_id, attr]),
            _ => path_hash(&[&target.logical_id]),
        };
        let output_id = format!("ExportsOutput{}{}", human, hash);
        let export_name = format!("{}:{}", producer.stack_name(), output_id);

        let exports = self.exports.entry(producer.id().to_string()).or_default();
        if !exports.contains_key(&output_id) {
            debug!(consumer, producer = producer.id(), export = %export_name, "auto export");
            exports.insert(
                output_id,
                OutputDecl::new(value.clone()).exported_as(export_name.clone()),
            );
        }
        Ok(export_name)
    }
}

struct CrossStack<'w, 'a> {
    wiring: &'w mut Wiring<'a>,
    stack: &'w str,
}

impl Resolve for CrossStack<'_, '_> {
    fn stack(&self) -> &str {
        self.stack
    }

    fn import(&mut self, value: &Value) -> Result<String> {
        self.wiring.import(self.stack, value)
    }
}

/// Resolver for auto-exports, which never reach outside their stack.
struct LocalOnly<'s>(&'s str);

impl Resolve for LocalOnly<'_> {
    fn stack(&self) -> &str {
        self.0
    }

    fn import(&mut self, value: &Value) -> Result<String> {
        Err(Error::Internal(format!(
            "stack '{}' cannot import {:?} while rendering its exports",
            self.0, value
        )))
    }
}
