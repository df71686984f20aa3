//! Security groups and the rules between them.

use std::fmt;

use crate::cidr::Ipv4Cidr;
use crate::construct::Stack;
use crate::error::{Error, Result};
use crate::template::{logical_id, ResourceDecl, ResourceRef, Value};

use super::vpc::Vpc;

/// IP protocol of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// TCP
    Tcp,
    /// UDP
    Udp,
    /// Every protocol
    All,
}

impl Protocol {
    /// Value for `IpProtocol`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::All => "-1",
        }
    }
}

/// A port or port range on a protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Port {
    protocol: Protocol,
    from: u16,
    to: u16,
}

impl Port {
    /// A single TCP port.
    pub fn tcp(port: u16) -> Self {
        Self::tcp_range(port, port)
    }

    /// A TCP port range, inclusive.
    pub fn tcp_range(from: u16, to: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            from,
            to,
        }
    }

    /// A single UDP port.
    pub fn udp(port: u16) -> Self {
        Self {
            protocol: Protocol::Udp,
            from: port,
            to: port,
        }
    }

    /// Every port on every protocol.
    pub fn all_traffic() -> Self {
        Self {
            protocol: Protocol::All,
            from: 0,
            to: 0,
        }
    }

    /// Protocol of the port.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// First port of the range.
    pub fn from_port(&self) -> u16 {
        self.from
    }

    /// Last port of the range.
    pub fn to_port(&self) -> u16 {
        self.to
    }

    /// Returns true if `port` on TCP is covered.
    pub fn covers_tcp(&self, port: u16) -> bool {
        match self.protocol {
            Protocol::All => true,
            Protocol::Tcp => (self.from..=self.to).contains(&port),
            Protocol::Udp => false,
        }
    }

    fn entries(&self) -> Vec<(&'static str, Value)> {
        let mut entries = vec![("IpProtocol", Value::from(self.protocol.as_str()))];
        if self.protocol != Protocol::All {
            entries.push(("FromPort", Value::from(self.from)));
            entries.push(("ToPort", Value::from(self.to)));
        }
        entries
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.protocol {
            Protocol::All => write!(f, "ALL TRAFFIC"),
            Protocol::Tcp if self.from == self.to => write!(f, "{}", self.from),
            Protocol::Tcp => write!(f, "{}-{}", self.from, self.to),
            Protocol::Udp => write!(f, "UDP {}", self.from),
        }
    }
}

/// Source of inbound traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum Peer {
    /// `0.0.0.0/0`
    AnyIpv4,
    /// A specific IPv4 block
    Ipv4(Ipv4Cidr),
    /// Members of another security group
    SecurityGroup(SecurityGroupRef),
}

impl Peer {
    /// Every IPv4 address.
    pub fn any_ipv4() -> Self {
        Peer::AnyIpv4
    }

    fn entries(&self) -> Vec<(&'static str, Value)> {
        match self {
            Peer::AnyIpv4 => vec![("CidrIp", Value::from("0.0.0.0/0"))],
            Peer::Ipv4(cidr) => vec![("CidrIp", Value::from(cidr.to_string()))],
            Peer::SecurityGroup(group) => vec![("SourceSecurityGroupId", group.group_id())],
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::AnyIpv4 => write!(f, "0.0.0.0/0"),
            Peer::Ipv4(cidr) => write!(f, "{}", cidr),
            Peer::SecurityGroup(group) => write!(f, "{}", group.unique_id()),
        }
    }
}

/// An inline inbound rule.
#[derive(Debug, Clone, PartialEq)]
pub struct IngressRule {
    /// Traffic source
    pub peer: Peer,
    /// Port or range
    pub port: Port,
    /// Rule description
    pub description: String,
}

impl IngressRule {
    fn to_value(&self) -> Value {
        let mut entries = self.peer.entries();
        entries.push(("Description", Value::from(&self.description)));
        entries.extend(self.port.entries());
        Value::map(entries)
    }
}

/// Builds a security group with inline rules.
#[derive(Debug, Clone)]
pub struct SecurityGroupBuilder {
    path: Vec<String>,
    description: Option<String>,
    allow_all_outbound: bool,
    ingress: Vec<IngressRule>,
}

/// Security group construct entry point.
pub struct SecurityGroup;

impl SecurityGroup {
    /// Starts a group at construct path `path`.
    pub fn builder(path: &[&str]) -> SecurityGroupBuilder {
        SecurityGroupBuilder {
            path: path.iter().map(|s| s.to_string()).collect(),
            description: None,
            allow_all_outbound: true,
            ingress: Vec::new(),
        }
    }
}

impl SecurityGroupBuilder {
    /// Sets the group description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether all outbound traffic is allowed (the default).
    pub fn allow_all_outbound(mut self, allow: bool) -> Self {
        self.allow_all_outbound = allow;
        self
    }

    /// Adds an inbound rule. A rule identical to one already present is
    /// ignored.
    pub fn ingress(mut self, peer: Peer, port: Port, description: impl Into<String>) -> Self {
        let rule = IngressRule {
            peer,
            port,
            description: description.into(),
        };
        if !self
            .ingress
            .iter()
            .any(|r| r.peer == rule.peer && r.port == rule.port)
        {
            self.ingress.push(rule);
        }
        self
    }

    /// Declares the group in `stack`, inside `vpc`.
    pub fn build(self, stack: &mut Stack, vpc: &Vpc) -> Result<SecurityGroupRef> {
        let path: Vec<&str> = self.path.iter().map(String::as_str).collect();
        let node_path = stack.node_path(&path);
        let description = self.description.unwrap_or_else(|| node_path.clone());

        let egress = if self.allow_all_outbound {
            Value::map([
                ("CidrIp", Value::from("0.0.0.0/0")),
                ("Description", Value::from("Allow all outbound traffic by default")),
                ("IpProtocol", Value::from("-1")),
            ])
        } else {
            // A rule that matches nothing replaces the implicit allow-all.
            Value::map([
                ("CidrIp", Value::from("255.255.255.255/32")),
                ("Description", Value::from("Disallow all traffic")),
                ("FromPort", Value::from(252u16)),
                ("IpProtocol", Value::from("icmp")),
                ("ToPort", Value::from(86u16)),
            ])
        };

        let mut resource_path = path.clone();
        resource_path.push("Resource");
        let mut decl = ResourceDecl::new("AWS::EC2::SecurityGroup")
            .prop("GroupDescription", description)
            .prop("SecurityGroupEgress", vec![egress]);
        if !self.ingress.is_empty() {
            decl = decl.prop(
                "SecurityGroupIngress",
                Value::List(self.ingress.iter().map(IngressRule::to_value).collect()),
            );
        }
        let resource = stack.add_resource(
            &resource_path,
            decl.prop("VpcId", vpc.vpc_id()),
        )?;

        let mut unique = vec![stack.id()];
        unique.extend(path.iter().copied());
        Ok(SecurityGroupRef {
            unique_id: logical_id(&unique),
            path: self.path,
            resource,
            allow_all_outbound: self.allow_all_outbound,
        })
    }
}

/// A declared security group.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityGroupRef {
    resource: ResourceRef,
    path: Vec<String>,
    unique_id: String,
    allow_all_outbound: bool,
}

impl SecurityGroupRef {
    /// Group resource.
    pub fn resource(&self) -> &ResourceRef {
        &self.resource
    }

    /// `GroupId` attribute.
    pub fn group_id(&self) -> Value {
        self.resource.attr("GroupId")
    }

    /// App-wide unique id, used to name rules that mention the group.
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Whether the group allows all outbound traffic.
    pub fn allows_all_outbound(&self) -> bool {
        self.allow_all_outbound
    }
}

/// The security groups of a construct plus the port it serves on.
#[derive(Debug, Clone, PartialEq)]
pub struct Connections {
    security_groups: Vec<SecurityGroupRef>,
    default_port: Option<Port>,
}

impl Connections {
    /// Connections over `security_groups`.
    pub fn new(security_groups: Vec<SecurityGroupRef>, default_port: Option<Port>) -> Self {
        Self {
            security_groups,
            default_port,
        }
    }

    /// Member groups.
    pub fn security_groups(&self) -> &[SecurityGroupRef] {
        &self.security_groups
    }

    /// Port the construct serves on, if any.
    pub fn default_port(&self) -> Option<Port> {
        self.default_port
    }

    /// Lets this side reach `other` on `port`.
    ///
    /// The rules are standalone resources declared in `stack`, which must
    /// own this side's groups: the ingress lands on `other`'s group, with
    /// this side's group as the source, and an egress rule is added when
    /// this side restricts outbound traffic.
    pub fn allow_to(
        &self,
        stack: &mut Stack,
        other: &Connections,
        port: Port,
        description: &str,
    ) -> Result<Vec<ResourceRef>> {
        let mut declared = Vec::new();
        for source in &self.security_groups {
            if source.resource.stack != stack.id() {
                return Err(Error::invalid_placement(
                    source.unique_id(),
                    format!(
                        "rules for this group belong in stack '{}', not '{}'",
                        source.resource.stack,
                        stack.id()
                    ),
                ));
            }
            let base: Vec<&str> = source.path.iter().map(String::as_str).collect();
            for target in &other.security_groups {
                let rule_id = format!("to {}:{}", target.unique_id(), port);

                let mut ingress_path = base.clone();
                ingress_path.push(&rule_id);
                let mut ingress = ResourceDecl::new("AWS::EC2::SecurityGroupIngress");
                for (key, value) in port.entries() {
                    ingress = ingress.prop(key, value);
                }
                declared.push(stack.add_resource(
                    &ingress_path,
                    ingress
                        .prop("Description", description)
                        .prop("GroupId", target.group_id())
                        .prop("SourceSecurityGroupId", source.group_id()),
                )?);

                if !source.allow_all_outbound {
                    let egress_id = format!("{} egress", rule_id);
                    let mut egress_path = base.clone();
                    egress_path.push(&egress_id);
                    let mut egress = ResourceDecl::new("AWS::EC2::SecurityGroupEgress");
                    for (key, value) in port.entries() {
                        egress = egress.prop(key, value);
                    }
                    declared.push(stack.add_resource(
                        &egress_path,
                        egress
                            .prop("Description", description)
                            .prop("GroupId", source.group_id())
                            .prop("DestinationSecurityGroupId", target.group_id()),
                    )?);
                }
            }
        }
        Ok(declared)
    }

    /// [`Connections::allow_to`] on `other`'s default port.
    pub fn allow_to_default_port(
        &self,
        stack: &mut Stack,
        other: &Connections,
        description: &str,
    ) -> Result<Vec<ResourceRef>> {
        let port = other.default_port.ok_or_else(|| {
            Error::invalid_property(
                other
                    .security_groups
                    .first()
                    .map(|g| g.unique_id().to_string())
                    .unwrap_or_default(),
                "default_port",
                "target has no default port",
            )
        })?;
        self.allow_to(stack, other, port, description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::{App, StackProps};
    use crate::resources::ec2::vpc::{SubnetConfiguration, SubnetType, VpcProps};
    use serde_json::json;

    fn vpc(stack: &mut Stack) -> Vpc {
        Vpc::new(
            stack,
            "vpc",
            VpcProps {
                cidr: "10.0.0.0/16".parse().unwrap(),
                max_azs: 1,
                nat_gateways: 0,
                subnet_configuration: vec![SubnetConfiguration {
                    name: "public".into(),
                    subnet_type: SubnetType::Public,
                    cidr_mask: 24,
                }],
            },
        )
        .unwrap()
    }

    #[test]
    fn test_port_display() {
        assert_eq!(Port::tcp(5432).to_string(), "5432");
        assert_eq!(Port::tcp_range(8000, 8080).to_string(), "8000-8080");
        assert_eq!(Port::all_traffic().to_string(), "ALL TRAFFIC");
        assert!(Port::all_traffic().covers_tcp(22));
        assert!(!Port::udp(53).covers_tcp(53));
    }

    #[test]
    fn test_inline_rules_are_deduplicated() {
        let mut app = App::new();
        let stack = app.add_stack("Web", StackProps::default()).unwrap();
        let vpc = vpc(stack);
        let sg = SecurityGroup::builder(&["sg"])
            .ingress(Peer::any_ipv4(), Port::tcp(22), "ssh")
            .ingress(Peer::any_ipv4(), Port::tcp(22), "ssh again")
            .ingress(Peer::any_ipv4(), Port::tcp(80), "http")
            .build(stack, &vpc)
            .unwrap();
        let assembly = app.synth().unwrap();
        let props = &assembly
            .stack("Web")
            .unwrap()
            .resource(&sg.resource().logical_id)
            .unwrap()["Properties"];
        assert_eq!(props["GroupDescription"], "Web/sg");
        assert_eq!(
            props["SecurityGroupIngress"],
            json!([
                { "CidrIp": "0.0.0.0/0", "Description": "ssh", "IpProtocol": "tcp", "FromPort": 22, "ToPort": 22 },
                { "CidrIp": "0.0.0.0/0", "Description": "http", "IpProtocol": "tcp", "FromPort": 80, "ToPort": 80 }
            ])
        );
        assert_eq!(props["SecurityGroupEgress"][0]["IpProtocol"], "-1");
    }

    #[test]
    fn test_allow_to_declares_ingress_on_the_target() {
        let mut app = App::new();
        let stack = app.add_stack("Web", StackProps::default()).unwrap();
        let vpc = vpc(stack);
        let web = SecurityGroup::builder(&["web"]).build(stack, &vpc).unwrap();
        let db = SecurityGroup::builder(&["db"])
            .allow_all_outbound(false)
            .build(stack, &vpc)
            .unwrap();

        let web_conn = Connections::new(vec![web.clone()], None);
        let db_conn = Connections::new(vec![db.clone()], Some(Port::tcp(5432)));
        let rules = web_conn
            .allow_to_default_port(stack, &db_conn, "db access")
            .unwrap();
        // Web allows all outbound, so only the ingress is needed.
        assert_eq!(rules.len(), 1);

        let rule = stack.resource(&rules[0].logical_id).unwrap();
        assert_eq!(rule.kind, "AWS::EC2::SecurityGroupIngress");
        assert_eq!(rule.property("GroupId"), Some(&db.group_id()));
        assert_eq!(rule.property("SourceSecurityGroupId"), Some(&web.group_id()));
        assert_eq!(rule.property("FromPort"), Some(&Value::from(5432u16)));

        // Restricted outbound on the source adds the egress half.
        let db_to_web = db_conn.allow_to(stack, &web_conn, Port::tcp(443), "back").unwrap();
        assert_eq!(db_to_web.len(), 2);
        assert_eq!(
            stack.resource(&db_to_web[1].logical_id).unwrap().kind,
            "AWS::EC2::SecurityGroupEgress"
        );
    }

    #[test]
    fn test_rules_must_live_with_the_source() {
        let mut app = App::new();
        let web_stack = app.add_stack("Web", StackProps::default()).unwrap();
        let vpc = vpc(web_stack);
        let web = SecurityGroup::builder(&["web"]).build(web_stack, &vpc).unwrap();
        let db = SecurityGroup::builder(&["db"]).build(web_stack, &vpc).unwrap();
        let other = app.add_stack("Other", StackProps::default()).unwrap();
        let err = Connections::new(vec![web], None)
            .allow_to(other, &Connections::new(vec![db], None), Port::tcp(5432), "x")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPlacement { .. }));
    }
}
