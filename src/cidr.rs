//! IPv4 CIDR blocks and sequential subnet allocation.
//!
//! Subnets are carved out of the VPC range in declaration order, each block
//! aligned to its own size. Allocation never hands out overlapping blocks and
//! never goes past the end of the parent range.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An IPv4 network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    /// Creates a block, rejecting prefixes over 32 and set host bits.
    pub fn new(network: Ipv4Addr, prefix: u8) -> Result<Self> {
        let text = format!("{}/{}", network, prefix);
        if prefix > 32 {
            return Err(Error::invalid_cidr(text, "prefix length must be at most 32"));
        }
        if u32::from(network) & !mask_bits(prefix) != 0 {
            return Err(Error::invalid_cidr(
                text,
                "host bits are set; the address is not a network address",
            ));
        }
        Ok(Self { network, prefix })
    }

    /// Block from a network address known to be aligned.
    pub(crate) const fn from_aligned(network: Ipv4Addr, prefix: u8) -> Self {
        Self { network, prefix }
    }

    /// Network address.
    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// Prefix length.
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of addresses in the block.
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    fn first(&self) -> u64 {
        u64::from(u32::from(self.network))
    }

    fn last(&self) -> u64 {
        self.first() + self.size() - 1
    }

    /// Returns true if `other` lies entirely inside this block.
    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.first() >= self.first() && other.last() <= self.last()
    }

    /// Returns true if the two blocks share at least one address.
    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.first() <= other.last() && other.first() <= self.last()
    }
}

fn mask_bits(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

impl FromStr for Ipv4Cidr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| Error::invalid_cidr(s, "expected <address>/<prefix>"))?;
        let network: Ipv4Addr = addr
            .parse()
            .map_err(|_| Error::invalid_cidr(s, format!("'{}' is not an IPv4 address", addr)))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| Error::invalid_cidr(s, format!("'{}' is not a prefix length", prefix)))?;
        Self::new(network, prefix)
    }
}

impl TryFrom<String> for Ipv4Cidr {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Ipv4Cidr> for String {
    fn from(value: Ipv4Cidr) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// Hands out aligned, non-overlapping blocks from a parent range.
#[derive(Debug, Clone)]
pub struct CidrAllocator {
    parent: Ipv4Cidr,
    /// Offset of the first unallocated address, relative to the parent.
    next: u64,
}

impl CidrAllocator {
    /// Creates an allocator over `parent`.
    pub fn new(parent: Ipv4Cidr) -> Self {
        Self { parent, next: 0 }
    }

    /// The range being allocated from.
    pub fn parent(&self) -> Ipv4Cidr {
        self.parent
    }

    /// Allocates the next `/mask` block for the subnet named `subnet`.
    pub fn allocate(&mut self, subnet: &str, mask: u8) -> Result<Ipv4Cidr> {
        let exhausted = || Error::SubnetAllocation {
            subnet: subnet.to_string(),
            mask,
            parent: self.parent.to_string(),
        };

        if mask < self.parent.prefix() || mask > 32 {
            return Err(exhausted());
        }

        let block = 1u64 << (32 - u32::from(mask));
        let start = self.parent.first() + self.next;
        let aligned = start.div_ceil(block) * block;
        let end = aligned + block;
        if end > self.parent.last() + 1 {
            return Err(exhausted());
        }

        // `aligned` fits in u32: it is bounded by the parent's last address.
        let network = Ipv4Addr::from(u32::try_from(aligned).map_err(|_| exhausted())?);
        let cidr = Ipv4Cidr::new(network, mask)?;
        self.next = end - self.parent.first();
        Ok(cidr)
    }
}
