//! Cloud assembly: the synthesized templates plus a manifest.
//!
//! The assembly is what leaves this crate. It can be written to a directory
//! and read back, which is how `diff` and `validate` inspect a previous
//! synthesis.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::error::{Error, ErrorContext, Result};

/// Name of the manifest file inside an assembly directory.
pub const MANIFEST_FILE: &str = "manifest.json";

const MANIFEST_VERSION: &str = "1.0.0";
const STACK_ARTIFACT_TYPE: &str = "aws:cloudformation:stack";

/// Serialization format for templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TemplateFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// YAML
    Yaml,
}

impl TemplateFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            TemplateFormat::Json => "json",
            TemplateFormat::Yaml => "yaml",
        }
    }

    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => TemplateFormat::Yaml,
            _ => TemplateFormat::Json,
        }
    }
}

impl std::str::FromStr for TemplateFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(TemplateFormat::Json),
            "yaml" | "yml" => Ok(TemplateFormat::Yaml),
            other => Err(Error::invalid_config(
                "format",
                format!("unknown template format '{}' (expected json or yaml)", other),
            )),
        }
    }
}

/// One synthesized stack.
#[derive(Debug, Clone, PartialEq)]
pub struct StackArtifact {
    /// Construct id
    pub id: String,
    /// Deployed stack name
    pub stack_name: String,
    /// Stack-level tags
    pub tags: BTreeMap<String, String>,
    /// Ids of stacks that must be deployed first
    pub dependencies: Vec<String>,
    /// Rendered template
    pub template: serde_json::Value,
}

impl StackArtifact {
    /// Template file name for `format`.
    pub fn template_file(&self, format: TemplateFormat) -> String {
        format!("{}.template.{}", self.id, format.extension())
    }

    /// Serializes the template.
    pub fn render(&self, format: TemplateFormat) -> Result<String> {
        Ok(match format {
            TemplateFormat::Json => {
                let mut s = serde_json::to_string_pretty(&self.template)?;
                s.push('\n');
                s
            }
            TemplateFormat::Yaml => serde_yaml::to_string(&self.template)?,
        })
    }

    /// `Resources` section entries.
    pub fn resources(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        section(&self.template, "Resources")
    }

    /// Resources of the given type.
    pub fn resources_of_type<'a>(
        &'a self,
        kind: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a serde_json::Value)> + 'a {
        self.resources()
            .filter(move |(_, r)| r.get("Type").and_then(|t| t.as_str()) == Some(kind))
    }

    /// Resource by logical id.
    pub fn resource(&self, logical_id: &str) -> Option<&serde_json::Value> {
        self.template.get("Resources")?.get(logical_id)
    }

    /// `Outputs` section entries.
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        section(&self.template, "Outputs")
    }

    /// `Parameters` section entries.
    pub fn parameters(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        section(&self.template, "Parameters")
    }

    /// Export names declared by this stack, with their values.
    pub fn exports(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.outputs().filter_map(|(_, o)| {
            let name = o.get("Export")?.get("Name")?.as_str()?;
            Some((name, o.get("Value")?))
        })
    }
}

fn section<'a>(
    template: &'a serde_json::Value,
    name: &str,
) -> impl Iterator<Item = (&'a str, &'a serde_json::Value)> {
    template
        .get(name)
        .and_then(|s| s.as_object())
        .into_iter()
        .flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), v)))
}

/// All synthesized stacks, in deployment order.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudAssembly {
    stacks: Vec<StackArtifact>,
}

impl CloudAssembly {
    /// Builds an assembly, ordering stacks so that dependencies come first.
    pub fn new(stacks: Vec<StackArtifact>) -> Result<Self> {
        let deps: Vec<(String, Vec<String>)> = stacks
            .iter()
            .map(|s| (s.id.clone(), s.dependencies.clone()))
            .collect();
        let order = deployment_order(&deps)?;
        let mut by_id: HashMap<String, StackArtifact> =
            stacks.into_iter().map(|s| (s.id.clone(), s)).collect();
        let stacks = order
            .into_iter()
            .filter_map(|id| by_id.remove(&id))
            .collect();
        Ok(Self { stacks })
    }

    /// Stacks in deployment order.
    pub fn stacks(&self) -> &[StackArtifact] {
        &self.stacks
    }

    /// Stack by id.
    pub fn stack(&self, id: &str) -> Option<&StackArtifact> {
        self.stacks.iter().find(|s| s.id == id)
    }

    /// Every export in the assembly: name -> (stack id, value).
    pub fn exports(&self) -> BTreeMap<String, (String, serde_json::Value)> {
        self.stacks
            .iter()
            .flat_map(|s| {
                s.exports()
                    .map(move |(name, value)| (name.to_string(), (s.id.clone(), value.clone())))
            })
            .collect()
    }

    /// Manifest describing the assembly.
    pub fn manifest(&self, format: TemplateFormat) -> serde_json::Value {
        let mut artifacts = serde_json::Map::new();
        for stack in &self.stacks {
            let mut artifact = json!({
                "type": STACK_ARTIFACT_TYPE,
                "properties": {
                    "templateFile": stack.template_file(format),
                    "stackName": stack.stack_name,
                },
            });
            if !stack.tags.is_empty() {
                artifact["properties"]["tags"] = json!(stack.tags);
            }
            if !stack.dependencies.is_empty() {
                artifact["dependencies"] = json!(stack.dependencies);
            }
            artifacts.insert(stack.id.clone(), artifact);
        }
        json!({
            "version": MANIFEST_VERSION,
            "artifacts": artifacts,
        })
    }

    /// Writes templates and manifest to `dir`, returning the written paths.
    pub fn write(&self, dir: &Path, format: TemplateFormat) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        let mut written = Vec::with_capacity(self.stacks.len() + 1);
        for stack in &self.stacks {
            let path = dir.join(stack.template_file(format));
            fs::write(&path, stack.render(format)?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            debug!(path = %path.display(), "wrote template");
            written.push(path);
        }

        let manifest_path = dir.join(MANIFEST_FILE);
        let mut manifest = serde_json::to_string_pretty(&self.manifest(format))?;
        manifest.push('\n');
        fs::write(&manifest_path, manifest)
            .with_context(|| format!("Failed to write {}", manifest_path.display()))?;
        written.push(manifest_path);

        info!(dir = %dir.display(), stacks = self.stacks.len(), "wrote cloud assembly");
        Ok(written)
    }

    /// Reads an assembly previously written with [`CloudAssembly::write`].
    pub fn read(dir: &Path) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(Error::FileNotFound(manifest_path));
        }
        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&manifest_path)?)?;
        let artifacts = manifest
            .get("artifacts")
            .and_then(|a| a.as_object())
            .ok_or_else(|| Error::Config(format!("{} has no artifacts", manifest_path.display())))?;

        let mut stacks = Vec::new();
        for (id, artifact) in artifacts {
            if artifact.get("type").and_then(|t| t.as_str()) != Some(STACK_ARTIFACT_TYPE) {
                continue;
            }
            let props = &artifact["properties"];
            let template_file = props
                .get("templateFile")
                .and_then(|t| t.as_str())
                .ok_or_else(|| Error::Config(format!("artifact '{}' has no templateFile", id)))?;
            let path = dir.join(template_file);
            if !path.exists() {
                return Err(Error::FileNotFound(path));
            }
            let content = fs::read_to_string(&path)?;
            let template: serde_json::Value = match TemplateFormat::from_path(&path) {
                TemplateFormat::Json => serde_json::from_str(&content)?,
                TemplateFormat::Yaml => serde_yaml::from_str(&content)?,
            };
            stacks.push(StackArtifact {
                id: id.clone(),
                stack_name: props
                    .get("stackName")
                    .and_then(|n| n.as_str())
                    .unwrap_or(id.as_str())
                    .to_string(),
                tags: props
                    .get("tags")
                    .map(|t| serde_json::from_value(t.clone()))
                    .transpose()?
                    .unwrap_or_default(),
                dependencies: artifact
                    .get("dependencies")
                    .map(|d| serde_json::from_value(d.clone()))
                    .transpose()?
                    .unwrap_or_default(),
                template,
            });
        }
        Self::new(stacks)
    }
}

/// Topologically orders stacks so every stack follows its dependencies.
///
/// Ties keep input order. Unknown dependencies and cycles are errors.
pub(crate) fn deployment_order(stacks: &[(String, Vec<String>)]) -> Result<Vec<String>> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
    for (id, _) in stacks {
        if nodes.contains_key(id.as_str()) {
            return Err(Error::DuplicateStack(id.clone()));
        }
        nodes.insert(id.as_str(), graph.add_node(id.as_str()));
    }

    let mut seen = BTreeSet::new();
    for (id, deps) in stacks {
        for dep in deps {
            let from = *nodes
                .get(dep.as_str())
                .ok_or_else(|| Error::StackNotFound(dep.clone()))?;
            if seen.insert((dep.as_str(), id.as_str())) {
                graph.add_edge(from, nodes[id.as_str()], ());
            }
        }
    }

    if toposort(&graph, None).is_err() {
        let cycle = tarjan_scc(&graph)
            .into_iter()
            .find(|scc| scc.len() > 1)
            .map(|scc| {
                let mut names: Vec<&str> = scc.iter().map(|n| graph[*n]).collect();
                names.sort_unstable();
                names.join(" <-> ")
            })
            .unwrap_or_else(|| "self-dependency".to_string());
        return Err(Error::DependencyCycle(cycle));
    }

    // Acyclic: repeatedly take the earliest stack whose dependencies are
    // already placed, so independent stacks keep their declaration order.
    let mut placed: BTreeSet<&str> = BTreeSet::new();
    let mut result = Vec::with_capacity(stacks.len());
    while result.len() < stacks.len() {
        let next = stacks
            .iter()
            .filter(|(id, _)| !placed.contains(id.as_str()))
            .find(|(_, deps)| deps.iter().all(|d| placed.contains(d.as_str())))
            .map(|(id, _)| id.as_str())
            .ok_or_else(|| Error::Internal("dependency ordering stalled".into()))?;
        placed.insert(next);
        result.push(next.to_string());
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(list: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
        list.iter()
            .map(|(id, d)| (id.to_string(), d.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    fn artifact(id: &str, dependencies: &[&str]) -> StackArtifact {
        StackArtifact {
            id: id.to_string(),
            stack_name: id.to_lowercase(),
            tags: BTreeMap::new(),
            dependencies: dependencies.iter().map(|s| s.to_string()).collect(),
            template: json!({
                "AWSTemplateFormatVersion": "2010-09-09",
                "Resources": { "Thing": { "Type": "AWS::SSM::Parameter" } },
                "Outputs": {
                    "Out": { "Value": "v", "Export": { "Name": format!("{}-export", id) } }
                }
            }),
        }
    }

    #[test]
    fn test_order_puts_dependencies_first() {
        let order = deployment_order(&deps(&[("Compute", &["Db"]), ("Db", &[])])).unwrap();
        assert_eq!(order, vec!["Db", "Compute"]);
    }

    #[test]
    fn test_order_keeps_input_order_for_independent_stacks() {
        let order = deployment_order(&deps(&[("B", &[]), ("A", &[])])).unwrap();
        assert_eq!(order, vec!["B", "A"]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let err = deployment_order(&deps(&[("A", &["B"]), ("B", &["A"])])).unwrap_err();
        match err {
            Error::DependencyCycle(msg) => assert_eq!(msg, "A <-> B"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_dependency_is_reported() {
        let err = deployment_order(&deps(&[("A", &["Ghost"])])).unwrap_err();
        assert!(matches!(err, Error::StackNotFound(ref s) if s == "Ghost"));
    }

    #[test]
    fn test_exports_and_resources_lookup() {
        let assembly = CloudAssembly::new(vec![artifact("B", &["A"]), artifact("A", &[])]).unwrap();
        assert_eq!(assembly.stacks()[0].id, "A");
        let exports = assembly.exports();
        assert_eq!(exports["A-export"].0, "A");
        let b = assembly.stack("B").unwrap();
        assert_eq!(b.resources_of_type("AWS::SSM::Parameter").count(), 1);
        assert!(b.resource("Thing").is_some());
    }

    #[test]
    fn test_write_and_read_roundtrip_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let assembly = CloudAssembly::new(vec![artifact("A", &[]), artifact("B", &["A"])]).unwrap();
        let written = assembly.write(dir.path(), TemplateFormat::Yaml).unwrap();
        assert_eq!(written.len(), 3);
        assert!(dir.path().join("A.template.yaml").exists());

        let back = CloudAssembly::read(dir.path()).unwrap();
        assert_eq!(back, assembly);
    }

    #[test]
    fn test_read_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            CloudAssembly::read(dir.path()),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("YAML".parse::<TemplateFormat>().unwrap(), TemplateFormat::Yaml);
        assert_eq!("json".parse::<TemplateFormat>().unwrap(), TemplateFormat::Json);
        assert!("xml".parse::<TemplateFormat>().is_err());
    }
}
