//! Stacks and the app that holds them.
//!
//! A [`Stack`] is a deployable unit: it owns the declarations made by the
//! constructs built inside it, keyed by logical ids derived from construct
//! paths. An [`App`] owns the stacks and synthesizes them together into a
//! [`CloudAssembly`], wiring references between stacks as it goes.

mod app;
mod assembly;

pub use app::App;
pub use assembly::{CloudAssembly, StackArtifact, TemplateFormat, MANIFEST_FILE};

use std::collections::{BTreeMap, BTreeSet, HashMap};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::template::{logical_id, OutputDecl, ParameterDecl, ResourceDecl, ResourceRef};

/// Stack-level settings.
#[derive(Debug, Clone, Default)]
pub struct StackProps {
    /// Deployed stack name; defaults to the stack id
    pub stack_name: Option<String>,
    /// Template description
    pub description: Option<String>,
    /// Tags applied to every taggable resource in the stack
    pub tags: BTreeMap<String, String>,
}

/// A deployable collection of declarations.
#[derive(Debug, Clone)]
pub struct Stack {
    id: String,
    stack_name: String,
    description: Option<String>,
    tags: BTreeMap<String, String>,
    parameters: IndexMap<String, ParameterDecl>,
    resources: IndexMap<String, ResourceDecl>,
    outputs: IndexMap<String, OutputDecl>,
    /// logical id -> construct path, for collision reporting
    paths: HashMap<String, String>,
    dependencies: BTreeSet<String>,
}

impl Stack {
    /// Creates an empty stack.
    pub fn new(id: impl Into<String>, props: StackProps) -> Self {
        let id = id.into();
        Self {
            stack_name: props.stack_name.unwrap_or_else(|| id.clone()),
            id,
            description: props.description,
            tags: props.tags,
            parameters: IndexMap::new(),
            resources: IndexMap::new(),
            outputs: IndexMap::new(),
            paths: HashMap::new(),
            dependencies: BTreeSet::new(),
        }
    }

    /// Construct id of the stack.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Deployed stack name.
    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    /// Template description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Stack-level tags.
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Declared resources.
    pub fn resources(&self) -> &IndexMap<String, ResourceDecl> {
        &self.resources
    }

    /// Declared parameters.
    pub fn parameters(&self) -> &IndexMap<String, ParameterDecl> {
        &self.parameters
    }

    /// Declared outputs.
    pub fn outputs(&self) -> &IndexMap<String, OutputDecl> {
        &self.outputs
    }

    /// Stacks this stack was explicitly declared to depend on.
    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    /// Resource by logical id.
    pub fn resource(&self, logical_id: &str) -> Option<&ResourceDecl> {
        self.resources.get(logical_id)
    }

    /// Full construct path (`StackId/a/b`), used for `Name` tags and
    /// descriptions.
    pub fn node_path(&self, path: &[&str]) -> String {
        std::iter::once(self.id.as_str())
            .chain(path.iter().copied())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn claim(&mut self, path: &[&str]) -> Result<String> {
        let id = logical_id(path);
        let node_path = self.node_path(path);
        if self.paths.contains_key(&id) {
            return Err(Error::DuplicateConstruct {
                stack: self.id.clone(),
                path: node_path,
                logical_id: id,
            });
        }
        self.paths.insert(id.clone(), node_path);
        Ok(id)
    }

    /// Declares a resource at `path` and returns a reference to it.
    pub fn add_resource(&mut self, path: &[&str], decl: ResourceDecl) -> Result<ResourceRef> {
        let id = self.claim(path)?;
        debug!(stack = %self.id, logical_id = %id, kind = %decl.kind, "declared resource");
        self.resources.insert(id.clone(), decl);
        Ok(ResourceRef::new(self.id.clone(), id))
    }

    /// Declares a template parameter at `path`.
    pub fn add_parameter(&mut self, path: &[&str], decl: ParameterDecl) -> Result<ResourceRef> {
        let id = self.claim(path)?;
        debug!(stack = %self.id, logical_id = %id, kind = %decl.kind, "declared parameter");
        self.parameters.insert(id.clone(), decl);
        Ok(ResourceRef::new(self.id.clone(), id))
    }

    /// Declares an output. Output ids live in their own namespace.
    pub fn add_output(&mut self, id: &str, decl: OutputDecl) -> Result<()> {
        let logical = logical_id(&[id]);
        if self.outputs.contains_key(&logical) {
            return Err(Error::DuplicateConstruct {
                stack: self.id.clone(),
                path: self.node_path(&[id]),
                logical_id: logical,
            });
        }
        self.outputs.insert(logical, decl);
        Ok(())
    }

    /// Orders this stack after `stack_id` even without a reference between
    /// them, e.g. when consuming a named export.
    pub fn add_dependency(&mut self, stack_id: impl Into<String>) {
        self.dependencies.insert(stack_id.into());
    }

    /// Looks up an explicitly exported output carrying exactly `value`.
    pub(crate) fn export_for(&self, value: &crate::template::Value) -> Option<&str> {
        self.outputs.values().find_map(|o| match &o.export_name {
            Some(name) if &o.value == value => Some(name.as_str()),
            _ => None,
        })
    }
}
