//! Structural checks over rendered templates.
//!
//! Every check reads only the synthesized JSON, so the same rules apply
//! to an assembly read back from disk.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value as Json;

use super::types::{Finding, Location, Report, RuleCategory, Severity};
use crate::construct::{CloudAssembly, StackArtifact};
use crate::resources::ec2::SUBNET_TYPE_TAG;

const DB_INSTANCE: &str = "AWS::RDS::DBInstance";
const DB_SUBNET_GROUP: &str = "AWS::RDS::DBSubnetGroup";
const INSTANCE: &str = "AWS::EC2::Instance";
const SECURITY_GROUP: &str = "AWS::EC2::SecurityGroup";
const INGRESS: &str = "AWS::EC2::SecurityGroupIngress";
const SECRET: &str = "AWS::SecretsManager::Secret";

type Exports = BTreeMap<String, (String, Json)>;

/// `(stack id, logical id)` of a resource anywhere in the assembly.
type ResourceKey = (String, String);

/// Follows an `Fn::ImportValue` to the exported value and its stack.
fn resolve<'a>(stack: &'a str, value: &'a Json, exports: &'a Exports) -> (&'a str, &'a Json) {
    match value.get("Fn::ImportValue").and_then(Json::as_str) {
        Some(name) => match exports.get(name) {
            Some((producer, exported)) => (producer.as_str(), exported),
            None => (stack, value),
        },
        None => (stack, value),
    }
}

/// Resource targeted by a `Ref` or `Fn::GetAtt`, imports followed.
fn target(stack: &str, value: &Json, exports: &Exports) -> Option<ResourceKey> {
    let (stack, value) = resolve(stack, value, exports);
    let logical_id = match value.get("Fn::GetAtt") {
        Some(att) => att.get(0)?.as_str()?,
        None => value.get("Ref")?.as_str()?,
    };
    Some((stack.to_string(), logical_id.to_string()))
}

fn lookup<'a>(assembly: &'a CloudAssembly, key: &ResourceKey) -> Option<&'a Json> {
    assembly.stack(&key.0)?.resource(&key.1)
}

fn properties(resource: &Json) -> Option<&Json> {
    resource.get("Properties")
}

fn port_number(value: &Json) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Whether an ingress entry admits TCP traffic on `port`.
fn admits_tcp(rule: &Json, port: i64) -> bool {
    match rule.get("IpProtocol").and_then(Json::as_str) {
        Some("-1") => true,
        Some("tcp") | Some("6") => {
            let from = rule.get("FromPort").and_then(port_number);
            let to = rule.get("ToPort").and_then(port_number);
            matches!((from, to), (Some(from), Some(to)) if from <= port && port <= to)
        }
        _ => false,
    }
}

fn subnet_type(resource: &Json) -> Option<&str> {
    properties(resource)?
        .get("Tags")?
        .as_array()?
        .iter()
        .find(|t| t.get("Key").and_then(Json::as_str) == Some(SUBNET_TYPE_TAG))?
        .get("Value")?
        .as_str()
}

fn collect_imports<'a>(value: &'a Json, out: &mut Vec<&'a str>) {
    match value {
        Json::Object(map) => {
            if let Some(name) = map.get("Fn::ImportValue").and_then(Json::as_str) {
                out.push(name);
            }
            for v in map.values() {
                collect_imports(v, out);
            }
        }
        Json::Array(items) => {
            for v in items {
                collect_imports(v, out);
            }
        }
        _ => {}
    }
}

fn collect_refs<'a>(value: &'a Json, out: &mut Vec<&'a str>) {
    match value {
        Json::Object(map) => {
            if let Some(id) = map.get("Ref").and_then(Json::as_str) {
                out.push(id);
            }
            for v in map.values() {
                collect_refs(v, out);
            }
        }
        Json::Array(items) => {
            for v in items {
                collect_refs(v, out);
            }
        }
        _ => {}
    }
}

fn db_instances(assembly: &CloudAssembly) -> Vec<(&StackArtifact, &str, &Json)> {
    assembly
        .stacks()
        .iter()
        .flat_map(|s| s.resources_of_type(DB_INSTANCE).map(move |(id, r)| (s, id, r)))
        .collect()
}

/// P001: databases sit in isolated subnets and are not publicly reachable.
pub(super) fn database_placement(assembly: &CloudAssembly, report: &mut Report) {
    let exports = assembly.exports();
    for (stack, id, db) in db_instances(assembly) {
        let location = || Location::element(&stack.id, id);
        let finding = |message: String| {
            Finding::new(
                "P001",
                "database-isolated-placement",
                Severity::Error,
                RuleCategory::Placement,
                message,
                location(),
            )
        };
        let Some(props) = properties(db) else {
            report.add(finding("database has no properties".to_string()));
            continue;
        };
        if props.get("PubliclyAccessible").and_then(Json::as_bool) == Some(true) {
            report.add(
                finding("database is publicly accessible".to_string())
                    .with_suggestion("set database.publicly_accessible = false"),
            );
        }

        let group = props
            .get("DBSubnetGroupName")
            .and_then(|v| target(&stack.id, v, &exports))
            .and_then(|key| lookup(assembly, &key))
            .filter(|r| r.get("Type").and_then(Json::as_str) == Some(DB_SUBNET_GROUP));
        let Some(subnet_ids) = group
            .and_then(properties)
            .and_then(|p| p.get("SubnetIds"))
            .and_then(Json::as_array)
        else {
            report.add(finding("subnet group cannot be resolved".to_string()));
            continue;
        };
        for subnet in subnet_ids {
            let key = target(&stack.id, subnet, &exports);
            let kind = key
                .as_ref()
                .and_then(|k| lookup(assembly, k))
                .and_then(subnet_type);
            match (key, kind) {
                (_, Some("Isolated")) => {}
                (Some((_, subnet_id)), Some(kind)) => report.add(
                    finding(format!("subnet {} is {}, not Isolated", subnet_id, kind))
                        .with_suggestion("place the database in isolated subnets only"),
                ),
                _ => report.add(finding(format!("subnet {} cannot be resolved", subnet))),
            }
        }
    }
}

/// P002: wiki servers launch in public subnets.
pub(super) fn server_placement(assembly: &CloudAssembly, report: &mut Report) {
    let exports = assembly.exports();
    for stack in assembly.stacks() {
        for (id, instance) in stack.resources_of_type(INSTANCE) {
            let kind = properties(instance)
                .and_then(|p| p.get("SubnetId"))
                .and_then(|v| target(&stack.id, v, &exports))
                .and_then(|key| lookup(assembly, &key))
                .and_then(subnet_type);
            if kind != Some("Public") {
                report.add(Finding::new(
                    "P002",
                    "server-public-placement",
                    Severity::Error,
                    RuleCategory::Placement,
                    format!(
                        "instance subnet is {}, not Public",
                        kind.unwrap_or("unresolved")
                    ),
                    Location::element(&stack.id, id),
                ));
            }
        }
    }
}

/// Security groups attached to any instance.
fn instance_groups(assembly: &CloudAssembly, exports: &Exports) -> BTreeSet<ResourceKey> {
    assembly
        .stacks()
        .iter()
        .flat_map(|s| {
            s.resources_of_type(INSTANCE)
                .filter_map(|(_, r)| properties(r)?.get("SecurityGroupIds")?.as_array())
                .flatten()
                .filter_map(move |g| target(&s.id, g, exports))
        })
        .collect()
}

/// N001: exactly one rule lets the wiki server reach each database port.
pub(super) fn database_ingress(assembly: &CloudAssembly, report: &mut Report) {
    let exports = assembly.exports();
    let servers = instance_groups(assembly, &exports);

    for (stack, id, db) in db_instances(assembly) {
        let location = Location::element(&stack.id, id);
        let Some(props) = properties(db) else { continue };
        let Some(port) = props.get("Port").and_then(port_number) else {
            report.add(Finding::new(
                "N001",
                "database-ingress",
                Severity::Error,
                RuleCategory::Network,
                "database has no port",
                location,
            ));
            continue;
        };
        let db_groups: BTreeSet<ResourceKey> = props
            .get("VPCSecurityGroups")
            .and_then(Json::as_array)
            .into_iter()
            .flatten()
            .filter_map(|g| target(&stack.id, g, &exports))
            .collect();

        let mut from_server = Vec::new();
        let mut classify = |rule: &Json, rule_stack: &str, rule_location: Location| {
            if !admits_tcp(rule, port) {
                return;
            }
            if let Some(source) = rule
                .get("SourceSecurityGroupId")
                .and_then(|v| target(rule_stack, v, &exports))
            {
                if servers.contains(&source) {
                    from_server.push(rule_location);
                }
            } else if let Some(cidr) = rule.get("CidrIp").and_then(Json::as_str) {
                report.add(Finding::new(
                    "N002",
                    "database-open-to-cidr",
                    Severity::Warning,
                    RuleCategory::Network,
                    format!("database port {} is open to {}", port, cidr),
                    rule_location,
                ));
            }
        };

        for rule_stack in assembly.stacks() {
            for (rule_id, rule) in rule_stack.resources_of_type(INGRESS) {
                let Some(rule) = properties(rule) else { continue };
                let on_db = rule
                    .get("GroupId")
                    .and_then(|v| target(&rule_stack.id, v, &exports))
                    .is_some_and(|g| db_groups.contains(&g));
                if on_db {
                    classify(rule, &rule_stack.id, Location::element(&rule_stack.id, rule_id));
                }
            }
        }
        for group in &db_groups {
            let inline = lookup(assembly, group)
                .filter(|r| r.get("Type").and_then(Json::as_str) == Some(SECURITY_GROUP))
                .and_then(properties)
                .and_then(|p| p.get("SecurityGroupIngress"))
                .and_then(Json::as_array);
            for rule in inline.into_iter().flatten() {
                classify(rule, &group.0, Location::element(&group.0, &group.1));
            }
        }

        match from_server.len() {
            1 => {}
            0 => report.add(
                Finding::new(
                    "N001",
                    "database-ingress",
                    Severity::Error,
                    RuleCategory::Network,
                    format!("no rule lets the wiki server reach port {}", port),
                    location,
                )
                .with_suggestion("declare the rule from the compute side with allow_to"),
            ),
            n => report.add(Finding::new(
                "N001",
                "database-ingress",
                Severity::Error,
                RuleCategory::Network,
                format!(
                    "{} rules let the wiki server reach port {} ({})",
                    n,
                    port,
                    from_server
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                location,
            )),
        }
    }
}

/// C001: exactly one wiki server, reachable on the expected ports.
pub(super) fn single_server(assembly: &CloudAssembly, ports: &[u16], report: &mut Report) {
    let exports = assembly.exports();
    let instances: Vec<(&StackArtifact, &str, &Json)> = assembly
        .stacks()
        .iter()
        .flat_map(|s| s.resources_of_type(INSTANCE).map(move |(id, r)| (s, id, r)))
        .collect();

    let [(stack, id, instance)] = instances.as_slice() else {
        let location = instances
            .first()
            .map(|(s, _, _)| Location::stack(&s.id))
            .unwrap_or_else(|| Location::stack("*"));
        report.add(Finding::new(
            "C001",
            "single-server",
            Severity::Error,
            RuleCategory::Compute,
            format!("expected exactly one instance, found {}", instances.len()),
            location,
        ));
        return;
    };

    let rules: Vec<&Json> = properties(instance)
        .and_then(|p| p.get("SecurityGroupIds"))
        .and_then(Json::as_array)
        .into_iter()
        .flatten()
        .filter_map(|g| target(&stack.id, g, &exports))
        .filter_map(|key| lookup(assembly, &key))
        .filter_map(|group| properties(group)?.get("SecurityGroupIngress")?.as_array())
        .flatten()
        .filter(|r| r.get("CidrIp").and_then(Json::as_str) == Some("0.0.0.0/0"))
        .collect();
    for port in ports {
        if !rules.iter().any(|r| admits_tcp(r, i64::from(*port))) {
            report.add(Finding::new(
                "C001",
                "single-server",
                Severity::Error,
                RuleCategory::Compute,
                format!("port {} is not open to anywhere", port),
                Location::element(&stack.id, *id),
            ));
        }
    }
}

/// S001: one generated credential secret, owned by the database stack.
pub(super) fn secrets(assembly: &CloudAssembly, report: &mut Report) {
    let mut names: BTreeMap<&str, Vec<Location>> = BTreeMap::new();
    for stack in assembly.stacks() {
        let holds_database = stack.resources_of_type(DB_INSTANCE).next().is_some();
        for (id, secret) in stack.resources_of_type(SECRET) {
            if !holds_database {
                report.add(Finding::new(
                    "S001",
                    "single-secret",
                    Severity::Error,
                    RuleCategory::Secrets,
                    "secret declared outside the database stack",
                    Location::element(&stack.id, id),
                ));
            }
            if let Some(name) = properties(secret)
                .and_then(|p| p.get("Name"))
                .and_then(Json::as_str)
            {
                names
                    .entry(name)
                    .or_default()
                    .push(Location::element(&stack.id, id));
            }
        }
    }
    for (name, locations) in names {
        if locations.len() > 1 {
            report.add(Finding::new(
                "S001",
                "single-secret",
                Severity::Error,
                RuleCategory::Secrets,
                format!("secret name '{}' is declared {} times", name, locations.len()),
                locations[1].clone(),
            ));
        }
    }

    for (stack, id, db) in db_instances(assembly) {
        let mut refs = Vec::new();
        if let Some(password) = properties(db).and_then(|p| p.get("MasterUserPassword")) {
            collect_refs(password, &mut refs);
        }
        let generated = refs.iter().any(|r| {
            stack.resource(r).is_some_and(|s| {
                s.get("Type").and_then(Json::as_str) == Some(SECRET)
                    && properties(s).is_some_and(|p| p.get("GenerateSecretString").is_some())
            })
        });
        if !generated {
            report.add(
                Finding::new(
                    "S001",
                    "single-secret",
                    Severity::Error,
                    RuleCategory::Secrets,
                    "database password does not come from a generated secret",
                    Location::element(&stack.id, id),
                )
                .with_suggestion("resolve the master password from the stack's secret"),
            );
        }
    }
}

/// R001: imports resolve to exports of stacks the importer depends on.
pub(super) fn imports(assembly: &CloudAssembly, report: &mut Report) {
    let exports = assembly.exports();
    for stack in assembly.stacks() {
        let mut names = Vec::new();
        collect_imports(&stack.template, &mut names);
        let names: BTreeSet<&str> = names.into_iter().collect();
        for name in names {
            let message = match exports.get(name) {
                None => format!("import '{}' has no matching export", name),
                Some((producer, _)) if producer == &stack.id => {
                    format!("stack imports its own export '{}'", name)
                }
                Some((producer, _)) if !stack.dependencies.contains(producer) => format!(
                    "import '{}' comes from '{}', which is not a dependency",
                    name, producer
                ),
                Some(_) => continue,
            };
            report.add(Finding::new(
                "R001",
                "import-resolves",
                Severity::Error,
                RuleCategory::References,
                message,
                Location::stack(&stack.id),
            ));
        }
    }
}

/// R002: export names are unique across the assembly.
pub(super) fn unique_exports(assembly: &CloudAssembly, report: &mut Report) {
    let mut owners: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for stack in assembly.stacks() {
        for (name, _) in stack.exports() {
            owners.entry(name).or_default().push(&stack.id);
        }
    }
    for (name, stacks) in owners {
        if stacks.len() > 1 {
            report.add(Finding::new(
                "R002",
                "unique-exports",
                Severity::Error,
                RuleCategory::References,
                format!("export '{}' is declared by {}", name, stacks.join(", ")),
                Location::stack(stacks[1]),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_admits_tcp() {
        let rule = json!({ "IpProtocol": "tcp", "FromPort": 5432, "ToPort": 5432 });
        assert!(admits_tcp(&rule, 5432));
        assert!(!admits_tcp(&rule, 22));
        assert!(admits_tcp(&json!({ "IpProtocol": "-1" }), 22));
        assert!(!admits_tcp(&json!({ "IpProtocol": "udp", "FromPort": 53, "ToPort": 53 }), 53));
        let range = json!({ "IpProtocol": "tcp", "FromPort": "8000", "ToPort": "8080" });
        assert!(admits_tcp(&range, 8001));
    }

    #[test]
    fn test_resolve_follows_imports() {
        let mut exports = Exports::new();
        exports.insert(
            "Db:ExportsOutputRefSg".to_string(),
            ("Db".to_string(), json!({ "Ref": "Sg" })),
        );
        let import = json!({ "Fn::ImportValue": "Db:ExportsOutputRefSg" });
        assert_eq!(
            target("App", &import, &exports),
            Some(("Db".to_string(), "Sg".to_string()))
        );
        let att = json!({ "Fn::GetAtt": ["Group", "GroupId"] });
        assert_eq!(
            target("App", &att, &exports),
            Some(("App".to_string(), "Group".to_string()))
        );
        assert_eq!(target("App", &json!("literal"), &exports), None);
    }

    #[test]
    fn test_collect_imports() {
        let template = json!({
            "Resources": {
                "A": { "Properties": { "X": { "Fn::ImportValue": "one" } } },
                "B": { "Properties": { "Y": [{ "Fn::ImportValue": "two" }] } }
            }
        });
        let mut names = Vec::new();
        collect_imports(&template, &mut names);
        names.sort_unstable();
        assert_eq!(names, vec!["one", "two"]);
    }
}
