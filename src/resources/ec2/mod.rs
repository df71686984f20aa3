//! EC2 networking and compute.

mod instance;
mod security_group;
mod vpc;

pub use instance::{
    Instance, InstanceProps, InstanceType, MachineImage, UserData, SSM_IMAGE_PARAMETER_TYPE,
};
pub use security_group::{
    Connections, IngressRule, Peer, Port, Protocol, SecurityGroup, SecurityGroupBuilder,
    SecurityGroupRef,
};
pub use vpc::{
    Subnet, SubnetConfiguration, SubnetType, Vpc, VpcProps, MAX_PREFIX, MIN_PREFIX,
    SUBNET_NAME_TAG, SUBNET_TYPE_TAG,
};
