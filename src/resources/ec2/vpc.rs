//! VPC with per-AZ subnets.
//!
//! Each subnet configuration is spread over the first `max_azs`
//! availability zones of the deployment region. Addresses are carved out of
//! the VPC block in configuration order, one block per AZ, so the layout is
//! stable for a given configuration.

use serde::{Deserialize, Serialize};

use crate::cidr::{CidrAllocator, Ipv4Cidr};
use crate::construct::Stack;
use crate::error::{Error, Result};
use crate::template::{ResourceDecl, ResourceRef, Value};

/// Tag carrying the subnet configuration name.
pub const SUBNET_NAME_TAG: &str = "wiki-infra:subnet-name";
/// Tag carrying the subnet type.
pub const SUBNET_TYPE_TAG: &str = "wiki-infra:subnet-type";

/// Smallest VPC and subnet block the service accepts.
pub const MIN_PREFIX: u8 = 16;
/// Largest prefix (smallest block) the service accepts.
pub const MAX_PREFIX: u8 = 28;

/// Reachability of a subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetType {
    /// Routed to an internet gateway
    Public,
    /// No route outside the VPC
    Isolated,
}

impl SubnetType {
    /// Value of the subnet type tag.
    pub fn label(&self) -> &'static str {
        match self {
            SubnetType::Public => "Public",
            SubnetType::Isolated => "Isolated",
        }
    }
}

impl std::fmt::Display for SubnetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One group of subnets, replicated per AZ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetConfiguration {
    /// Group name, e.g. `public-subnet-1`
    pub name: String,
    /// Reachability
    #[serde(rename = "type")]
    pub subnet_type: SubnetType,
    /// Prefix length of each subnet in the group
    pub cidr_mask: u8,
}

/// VPC settings.
#[derive(Debug, Clone)]
pub struct VpcProps {
    /// Address block of the VPC
    pub cidr: Ipv4Cidr,
    /// Number of availability zones to spread over
    pub max_azs: usize,
    /// NAT gateways; only zero is supported
    pub nat_gateways: usize,
    /// Subnet groups, allocated in order
    pub subnet_configuration: Vec<SubnetConfiguration>,
}

/// A declared subnet.
#[derive(Debug, Clone)]
pub struct Subnet {
    /// Group name
    pub name: String,
    /// Reachability
    pub subnet_type: SubnetType,
    /// Allocated block
    pub cidr: Ipv4Cidr,
    /// Index into the region's AZ list
    pub az_index: usize,
    resource: ResourceRef,
    route_table: ResourceRef,
}

impl Subnet {
    /// Subnet resource.
    pub fn resource(&self) -> &ResourceRef {
        &self.resource
    }

    /// `Ref` to the subnet.
    pub fn subnet_id(&self) -> Value {
        self.resource.reference()
    }

    /// Availability zone the subnet lives in.
    pub fn availability_zone(&self) -> Value {
        self.resource.attr("AvailabilityZone")
    }

    /// `Ref` to the subnet's route table.
    pub fn route_table_id(&self) -> Value {
        self.route_table.reference()
    }
}

/// A declared VPC.
#[derive(Debug, Clone)]
pub struct Vpc {
    id: String,
    resource: ResourceRef,
    cidr: Ipv4Cidr,
    subnets: Vec<Subnet>,
    internet_gateway: Option<ResourceRef>,
}

impl Vpc {
    /// Declares the VPC, its subnets and their routing.
    pub fn new(stack: &mut Stack, id: &str, props: VpcProps) -> Result<Self> {
        validate(id, &props)?;
        let name = stack.node_path(&[id]);

        let vpc = stack.add_resource(
            &[id, "Resource"],
            ResourceDecl::new("AWS::EC2::VPC")
                .prop("CidrBlock", props.cidr.to_string())
                .prop("EnableDnsHostnames", true)
                .prop("EnableDnsSupport", true)
                .prop("InstanceTenancy", "default")
                .tag("Name", name.as_str()),
        )?;

        let needs_gateway = props
            .subnet_configuration
            .iter()
            .any(|c| c.subnet_type == SubnetType::Public);
        let (internet_gateway, attachment) = if needs_gateway {
            let igw = stack.add_resource(
                &[id, "IGW"],
                ResourceDecl::new("AWS::EC2::InternetGateway")
                    .tag("Name", name.as_str()),
            )?;
            let attachment = stack.add_resource(
                &[id, "VPCGW"],
                ResourceDecl::new("AWS::EC2::VPCGatewayAttachment")
                    .prop("VpcId", vpc.reference())
                    .prop("InternetGatewayId", igw.reference()),
            )?;
            (Some(igw), Some(attachment))
        } else {
            (None, None)
        };

        let mut allocator = CidrAllocator::new(props.cidr);
        let mut subnets = Vec::new();
        for config in &props.subnet_configuration {
            for az in 0..props.max_azs {
                let cidr = allocator.allocate(&config.name, config.cidr_mask)?;
                let group = format!("{}Subnet{}", config.name, az + 1);
                let node_path = stack.node_path(&[id, &group]);

                let subnet = stack.add_resource(
                    &[id, &group, "Subnet"],
                    ResourceDecl::new("AWS::EC2::Subnet")
                        .prop("VpcId", vpc.reference())
                        .prop("AvailabilityZone", Value::availability_zone(az))
                        .prop("CidrBlock", cidr.to_string())
                        .prop(
                            "MapPublicIpOnLaunch",
                            config.subnet_type == SubnetType::Public,
                        )
                        .tag(SUBNET_NAME_TAG, config.name.as_str())
                        .tag(SUBNET_TYPE_TAG, config.subnet_type.label())
                        .tag("Name", node_path.as_str()),
                )?;
                let route_table = stack.add_resource(
                    &[id, &group, "RouteTable"],
                    ResourceDecl::new("AWS::EC2::RouteTable")
                        .prop("VpcId", vpc.reference())
                        .tag("Name", node_path.as_str()),
                )?;
                stack.add_resource(
                    &[id, &group, "RouteTableAssociation"],
                    ResourceDecl::new("AWS::EC2::SubnetRouteTableAssociation")
                        .prop("RouteTableId", route_table.reference())
                        .prop("SubnetId", subnet.reference()),
                )?;

                if config.subnet_type == SubnetType::Public {
                    if let (Some(igw), Some(attachment)) = (&internet_gateway, &attachment) {
                        stack.add_resource(
                            &[id, &group, "DefaultRoute"],
                            ResourceDecl::new("AWS::EC2::Route")
                                .prop("RouteTableId", route_table.reference())
                                .prop("DestinationCidrBlock", "0.0.0.0/0")
                                .prop("GatewayId", igw.reference())
                                .depends_on(attachment),
                        )?;
                    }
                }

                subnets.push(Subnet {
                    name: config.name.clone(),
                    subnet_type: config.subnet_type,
                    cidr,
                    az_index: az,
                    resource: subnet,
                    route_table,
                });
            }
        }

        Ok(Self {
            id: id.to_string(),
            resource: vpc,
            cidr: props.cidr,
            subnets,
            internet_gateway,
        })
    }

    /// Construct id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Id of the stack declaring the VPC.
    pub fn stack_id(&self) -> &str {
        &self.resource.stack
    }

    /// `Ref` to the VPC.
    pub fn vpc_id(&self) -> Value {
        self.resource.reference()
    }

    /// VPC address block.
    pub fn cidr(&self) -> Ipv4Cidr {
        self.cidr
    }

    /// Every subnet, in allocation order.
    pub fn subnets(&self) -> &[Subnet] {
        &self.subnets
    }

    /// Subnets of one type, in allocation order.
    pub fn select_subnets(&self, subnet_type: SubnetType) -> Vec<&Subnet> {
        self.subnets
            .iter()
            .filter(|s| s.subnet_type == subnet_type)
            .collect()
    }

    /// Internet gateway, present when any subnet is public.
    pub fn internet_gateway(&self) -> Option<&ResourceRef> {
        self.internet_gateway.as_ref()
    }
}

fn validate(id: &str, props: &VpcProps) -> Result<()> {
    if !(MIN_PREFIX..=MAX_PREFIX).contains(&props.cidr.prefix()) {
        return Err(Error::invalid_cidr(
            props.cidr.to_string(),
            format!("VPC prefix must be between /{} and /{}", MIN_PREFIX, MAX_PREFIX),
        ));
    }
    if props.max_azs == 0 {
        return Err(Error::invalid_property(id, "max_azs", "must be at least 1"));
    }
    if props.nat_gateways > 0 {
        return Err(Error::invalid_property(
            id,
            "nat_gateways",
            "NAT gateways are not supported; use public or isolated subnets",
        ));
    }
    if props.subnet_configuration.is_empty() {
        return Err(Error::invalid_property(
            id,
            "subnet_configuration",
            "at least one subnet group is required",
        ));
    }
    let mut seen = std::collections::HashSet::new();
    for config in &props.subnet_configuration {
        if config.name.is_empty() || !seen.insert(config.name.as_str()) {
            return Err(Error::invalid_property(
                id,
                "subnet_configuration",
                format!("subnet group name '{}' is empty or repeated", config.name),
            ));
        }
        if !(props.cidr.prefix()..=MAX_PREFIX).contains(&config.cidr_mask)
            || config.cidr_mask < MIN_PREFIX
        {
            return Err(Error::invalid_property(
                id,
                "cidr_mask",
                format!(
                    "/{} for '{}' must be between /{} and /{}",
                    config.cidr_mask,
                    config.name,
                    props.cidr.prefix().max(MIN_PREFIX),
                    MAX_PREFIX
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::{App, StackProps};
    use pretty_assertions::assert_eq;

    fn props() -> VpcProps {
        VpcProps {
            cidr: "10.0.0.0/16".parse().unwrap(),
            max_azs: 2,
            nat_gateways: 0,
            subnet_configuration: vec![
                SubnetConfiguration {
                    name: "public-subnet-1".into(),
                    subnet_type: SubnetType::Public,
                    cidr_mask: 24,
                },
                SubnetConfiguration {
                    name: "isolated-subnet-1".into(),
                    subnet_type: SubnetType::Isolated,
                    cidr_mask: 28,
                },
            ],
        }
    }

    #[test]
    fn test_subnets_per_az() {
        let mut app = App::new();
        let stack = app.add_stack("Net", StackProps::default()).unwrap();
        let vpc = Vpc::new(stack, "vpc", props()).unwrap();

        let cidrs: Vec<String> = vpc.subnets().iter().map(|s| s.cidr.to_string()).collect();
        assert_eq!(
            cidrs,
            vec!["10.0.0.0/24", "10.0.1.0/24", "10.0.2.0/28", "10.0.2.16/28"]
        );
        assert_eq!(vpc.select_subnets(SubnetType::Isolated).len(), 2);
        let azs: Vec<usize> = vpc
            .select_subnets(SubnetType::Public)
            .iter()
            .map(|s| s.az_index)
            .collect();
        assert_eq!(azs, vec![0, 1]);
        assert!(vpc.internet_gateway().is_some());
    }

    #[test]
    fn test_public_routes_go_through_the_gateway() {
        let mut app = App::new();
        let stack = app.add_stack("Net", StackProps::default()).unwrap();
        Vpc::new(stack, "vpc", props()).unwrap();
        let routes: Vec<&ResourceDecl> = stack
            .resources()
            .values()
            .filter(|r| r.kind == "AWS::EC2::Route")
            .collect();
        assert_eq!(routes.len(), 2);
        for route in routes {
            assert_eq!(route.property("DestinationCidrBlock"), Some(&Value::from("0.0.0.0/0")));
            assert_eq!(route.depends_on.len(), 1);
        }
        let isolated_public_ip = stack
            .resources()
            .values()
            .filter(|r| r.kind == "AWS::EC2::Subnet")
            .filter(|r| r.tags.get(SUBNET_TYPE_TAG).map(String::as_str) == Some("Isolated"))
            .all(|r| r.property("MapPublicIpOnLaunch") == Some(&Value::Bool(false)));
        assert!(isolated_public_ip);
    }

    #[test]
    fn test_isolated_only_vpc_has_no_gateway() {
        let mut app = App::new();
        let stack = app.add_stack("Net", StackProps::default()).unwrap();
        let mut p = props();
        p.subnet_configuration.remove(0);
        let vpc = Vpc::new(stack, "vpc", p).unwrap();
        assert!(vpc.internet_gateway().is_none());
        assert!(stack
            .resources()
            .values()
            .all(|r| r.kind != "AWS::EC2::InternetGateway" && r.kind != "AWS::EC2::Route"));
    }

    #[test]
    fn test_rejects_bad_props() {
        let mut app = App::new();
        let stack = app.add_stack("Net", StackProps::default()).unwrap();

        let mut nat = props();
        nat.nat_gateways = 1;
        assert!(Vpc::new(stack, "a", nat).is_err());

        let mut wide = props();
        wide.subnet_configuration[0].cidr_mask = 12;
        assert!(Vpc::new(stack, "b", wide).is_err());

        let mut tiny = props();
        tiny.subnet_configuration[1].cidr_mask = 29;
        assert!(Vpc::new(stack, "c", tiny).is_err());

        let mut repeated = props();
        repeated.subnet_configuration[1].name = "public-subnet-1".into();
        assert!(Vpc::new(stack, "d", repeated).is_err());

        let mut none = props();
        none.subnet_configuration.clear();
        assert!(Vpc::new(stack, "e", none).is_err());

        // A failed validation declares nothing.
        assert!(stack.resources().is_empty());
    }

    #[test]
    fn test_exhausted_range() {
        let mut app = App::new();
        let stack = app.add_stack("Net", StackProps::default()).unwrap();
        let mut p = props();
        p.cidr = "10.0.0.0/24".parse().unwrap();
        p.subnet_configuration[0].cidr_mask = 24;
        assert!(matches!(
            Vpc::new(stack, "vpc", p),
            Err(Error::SubnetAllocation { .. })
        ));
    }
}
