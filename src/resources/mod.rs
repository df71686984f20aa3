//! Typed constructs over the raw template model.
//!
//! Each construct validates its inputs, declares one or more resources into
//! a [`Stack`](crate::construct::Stack) and hands back a handle exposing the
//! values other constructs need (ids, ARNs, endpoints, security groups).

pub mod ec2;
pub mod iam;
pub mod rds;
pub mod secretsmanager;
pub mod ssm;
