//! Validation rule tests
//!
//! Each test starts from a correctly synthesized assembly, breaks one
//! property of the rendered templates and checks that the matching rule
//! reports it.

mod common;

use common::*;
use serde_json::{json, Value as Json};

use wiki_infra::construct::{CloudAssembly, StackArtifact};
use wiki_infra::resources::ec2::SUBNET_TYPE_TAG;
use wiki_infra::validate::{Report, Severity, Validator};

/// Synthesizes the default assembly, lets `edit` change the database and
/// compute stacks, and validates the result.
fn check_tampered(edit: impl FnOnce(&mut StackArtifact, &mut StackArtifact)) -> Report {
    let assembly = synth(&test_config());
    let mut stacks = assembly.stacks().to_vec();
    let (db, compute) = stacks.split_at_mut(1);
    edit(&mut db[0], &mut compute[0]);
    let tampered = CloudAssembly::new(stacks).unwrap();
    Validator::new().check(&tampered)
}

fn first_of(stack: &StackArtifact, kind: &str) -> String {
    stack
        .resources_of_type(kind)
        .next()
        .map(|(id, _)| id.to_string())
        .unwrap_or_else(|| panic!("no {} in {}", kind, stack.id))
}

fn props<'a>(stack: &'a mut StackArtifact, id: &str) -> &'a mut Json {
    &mut stack.template["Resources"][id]["Properties"]
}

fn rules(report: &Report) -> Vec<&str> {
    report.findings.iter().map(|f| f.rule_id.as_str()).collect()
}

#[test]
fn test_untouched_assembly_is_clean() {
    let report = check_tampered(|_, _| {});
    assert!(report.findings.is_empty(), "{:?}", report.findings);
    assert_eq!(report.exit_code(), 0);
    assert!(report.resources_checked > 10);
}

// ============================================================================
// Placement
// ============================================================================

#[test]
fn test_public_database_is_reported() {
    let report = check_tampered(|db, _| {
        let id = first_of(db, "AWS::RDS::DBInstance");
        props(db, &id)["PubliclyAccessible"] = json!(true);
    });
    assert_eq!(rules(&report), vec!["P001"]);
    assert!(report.findings[0].suggestion.is_some());
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn test_database_in_public_subnet_is_reported() {
    let report = check_tampered(|db, _| {
        let public = db
            .resources_of_type("AWS::EC2::Subnet")
            .find(|(_, r)| {
                r["Properties"]["Tags"]
                    .as_array()
                    .unwrap()
                    .contains(&json!({ "Key": SUBNET_TYPE_TAG, "Value": "Public" }))
            })
            .map(|(id, _)| id.to_string())
            .unwrap();
        let group = first_of(db, "AWS::RDS::DBSubnetGroup");
        props(db, &group)["SubnetIds"][0] = json!({ "Ref": public });
    });
    let placement = report.by_rule("P001");
    assert_eq!(placement.len(), 1);
    assert!(placement[0].message.contains("is Public, not Isolated"));
}

#[test]
fn test_server_in_isolated_subnet_is_reported() {
    let assembly = synth(&test_config());
    let compute = compute_stack(&assembly);
    let instance = first_of(compute, "AWS::EC2::Instance");
    let import = compute.resource(&instance).unwrap()["Properties"]["SubnetId"]
        ["Fn::ImportValue"]
        .as_str()
        .unwrap()
        .to_string();
    let subnet = assembly.exports()[&import].1["Ref"]
        .as_str()
        .unwrap()
        .to_string();

    let report = check_tampered(|db, _| {
        let tags = props(db, &subnet)["Tags"].as_array_mut().unwrap();
        for tag in tags.iter_mut() {
            if tag["Key"] == SUBNET_TYPE_TAG {
                tag["Value"] = json!("Isolated");
            }
        }
    });
    assert_eq!(rules(&report), vec!["P002"]);
    assert!(report.findings[0].message.contains("Isolated"));
}

// ============================================================================
// Network
// ============================================================================

#[test]
fn test_duplicate_database_rule_is_reported() {
    let report = check_tampered(|_, compute| {
        let rule = first_of(compute, "AWS::EC2::SecurityGroupIngress");
        let copy = compute.template["Resources"][&rule].clone();
        compute.template["Resources"]["ExtraRule"] = copy;
    });
    let ingress = report.by_rule("N001");
    assert_eq!(ingress.len(), 1);
    assert!(ingress[0].message.starts_with("2 rules"));
    assert!(ingress[0].message.contains("WikiCdkStack/ExtraRule"));
}

#[test]
fn test_missing_database_rule_is_reported() {
    let report = check_tampered(|_, compute| {
        let rule = first_of(compute, "AWS::EC2::SecurityGroupIngress");
        compute.template["Resources"]
            .as_object_mut()
            .unwrap()
            .remove(&rule);
    });
    let ingress = report.by_rule("N001");
    assert_eq!(ingress.len(), 1);
    assert!(ingress[0].message.contains("no rule"));
}

#[test]
fn test_rule_on_another_port_does_not_count() {
    let report = check_tampered(|_, compute| {
        let rule = first_of(compute, "AWS::EC2::SecurityGroupIngress");
        props(compute, &rule)["FromPort"] = json!(3306);
        props(compute, &rule)["ToPort"] = json!(3306);
    });
    assert_eq!(rules(&report), vec!["N001"]);
}

#[test]
fn test_cidr_open_database_is_a_warning() {
    let report = check_tampered(|db, _| {
        let instance = first_of(db, "AWS::RDS::DBInstance");
        let group = props(db, &instance)["VPCSecurityGroups"][0]["Fn::GetAtt"][0]
            .as_str()
            .unwrap()
            .to_string();
        props(db, &group)["SecurityGroupIngress"] = json!([{
            "CidrIp": "10.0.0.0/16",
            "IpProtocol": "tcp",
            "FromPort": 5432,
            "ToPort": 5432
        }]);
    });
    let open = report.by_rule("N002");
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].severity, Severity::Warning);
    assert!(open[0].message.contains("10.0.0.0/16"));
    assert!(!report.has_errors());
    assert_eq!(report.exit_code(), 0);
}

// ============================================================================
// Compute
// ============================================================================

#[test]
fn test_second_instance_is_reported() {
    let report = check_tampered(|_, compute| {
        let instance = first_of(compute, "AWS::EC2::Instance");
        let copy = compute.template["Resources"][&instance].clone();
        compute.template["Resources"]["SecondServer"] = copy;
    });
    let servers = report.by_rule("C001");
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0].message, "expected exactly one instance, found 2");
}

#[test]
fn test_closed_web_port_is_reported() {
    let report = check_tampered(|_, compute| {
        let instance = first_of(compute, "AWS::EC2::Instance");
        let group = props(compute, &instance)["SecurityGroupIds"][0]["Fn::GetAtt"][0]
            .as_str()
            .unwrap()
            .to_string();
        props(compute, &group)["SecurityGroupIngress"]
            .as_array_mut()
            .unwrap()
            .retain(|r| r["FromPort"] != 80);
    });
    assert_eq!(rules(&report), vec!["C001"]);
    assert_eq!(report.findings[0].message, "port 80 is not open to anywhere");
}

#[test]
fn test_custom_server_ports() {
    let assembly = synth(&test_config());
    let report = Validator::new()
        .with_server_ports([22, 8080])
        .check(&assembly);
    assert_eq!(rules(&report), vec!["C001"]);
    assert!(report.findings[0].message.contains("8080"));
}

// ============================================================================
// Secrets
// ============================================================================

#[test]
fn test_secret_in_compute_stack_is_reported() {
    let report = check_tampered(|db, compute| {
        let secret = first_of(db, "AWS::SecretsManager::Secret");
        let copy = db.template["Resources"][&secret].clone();
        compute.template["Resources"]["StraySecret"] = copy;
    });
    let secrets = report.by_rule("S001");
    assert_eq!(secrets.len(), 2);
    assert!(secrets
        .iter()
        .any(|f| f.message == "secret declared outside the database stack"));
    assert!(secrets.iter().any(|f| f.message.contains("declared 2 times")));
}

#[test]
fn test_literal_password_is_reported() {
    let report = check_tampered(|db, _| {
        let instance = first_of(db, "AWS::RDS::DBInstance");
        props(db, &instance)["MasterUserPassword"] = json!("hunter2hunter2");
    });
    assert_eq!(rules(&report), vec!["S001"]);
}

// ============================================================================
// References
// ============================================================================

#[test]
fn test_dangling_import_is_reported() {
    let report = check_tampered(|_, compute| {
        let parameter = first_of(compute, "AWS::SSM::Parameter");
        props(compute, &parameter)["Value"] = json!({ "Fn::ImportValue": "nothing-exports-this" });
    });
    assert_eq!(rules(&report), vec!["R001"]);
    assert!(report.findings[0].message.contains("nothing-exports-this"));
}

#[test]
fn test_import_without_dependency_is_reported() {
    let report = check_tampered(|_, compute| compute.dependencies.clear());
    let imports = report.by_rule("R001");
    assert!(!imports.is_empty());
    assert!(imports
        .iter()
        .all(|f| f.message.contains("which is not a dependency")));
    assert!(imports.iter().all(|f| f.location.stack == "WikiCdkStack"));
}

#[test]
fn test_duplicate_export_is_reported() {
    let report = check_tampered(|db, compute| {
        let output = db.template["Outputs"]["SecretFullARN"].clone();
        compute.template["Outputs"] = json!({ "Again": output });
    });
    let exports = report.by_rule("R002");
    assert_eq!(exports.len(), 1);
    assert!(exports[0].message.contains("wikiDbCredentialsSecretFullArn"));
}
