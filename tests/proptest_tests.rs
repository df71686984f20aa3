//! Property-based tests for wiki-infra using proptest.
//!
//! Subnet allocation and logical id generation are exercised with random
//! inputs to check the guarantees the stacks rely on.

use proptest::collection::vec;
use proptest::prelude::*;
use std::net::Ipv4Addr;

use wiki_infra::cidr::{CidrAllocator, Ipv4Cidr};
use wiki_infra::template::logical_id;

// ============================================================================
// Strategies
// ============================================================================

/// Aligned parent ranges between /8 and /24.
fn parent_cidr() -> impl Strategy<Value = Ipv4Cidr> {
    (any::<u32>(), 8u8..=24).prop_map(|(addr, prefix)| {
        let mask = u32::MAX << (32 - u32::from(prefix));
        Ipv4Cidr::new(Ipv4Addr::from(addr & mask), prefix).unwrap()
    })
}

/// Construct path components, including the hidden ones.
fn path_component() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z][a-zA-Z0-9 _-]{0,20}",
        Just("Default".to_string()),
        Just("Resource".to_string()),
    ]
}

fn aligned(cidr: &Ipv4Cidr) -> bool {
    u64::from(u32::from(cidr.network())) % cidr.size() == 0
}

// ============================================================================
// CIDR allocation
// ============================================================================

proptest! {
    #[test]
    fn allocations_stay_inside_parent_and_never_overlap(
        parent in parent_cidr(),
        extra in vec(0u8..=8, 1..20),
    ) {
        let mut allocator = CidrAllocator::new(parent);
        let mut allocated: Vec<Ipv4Cidr> = Vec::new();
        for (i, delta) in extra.iter().enumerate() {
            let mask = (parent.prefix() + delta).min(32);
            if let Ok(block) = allocator.allocate(&format!("subnet-{}", i), mask) {
                prop_assert_eq!(block.prefix(), mask);
                prop_assert!(parent.contains(&block));
                prop_assert!(aligned(&block));
                for earlier in &allocated {
                    prop_assert!(!earlier.overlaps(&block), "{} overlaps {}", earlier, block);
                }
                allocated.push(block);
            }
        }
    }

    #[test]
    fn allocations_are_deterministic(
        parent in parent_cidr(),
        extra in vec(0u8..=8, 1..10),
    ) {
        let run = || {
            let mut allocator = CidrAllocator::new(parent);
            extra
                .iter()
                .map(|d| allocator.allocate("s", (parent.prefix() + d).min(32)).ok())
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(run(), run());
    }

    #[test]
    fn masks_wider_than_parent_are_rejected(parent in parent_cidr(), narrower in 1u8..8) {
        let mut allocator = CidrAllocator::new(parent);
        prop_assert!(allocator.allocate("s", parent.prefix() - narrower).is_err());
    }

    #[test]
    fn cidr_display_parses_back(parent in parent_cidr()) {
        let text = parent.to_string();
        let parsed: Ipv4Cidr = text.parse().unwrap();
        prop_assert_eq!(parsed, parent);
    }
}

// ============================================================================
// Logical ids
// ============================================================================

proptest! {
    #[test]
    fn logical_ids_are_alphanumeric_and_stable(path in vec(path_component(), 1..6)) {
        let components: Vec<&str> = path.iter().map(String::as_str).collect();
        let id = logical_id(&components);
        prop_assert!(id.chars().all(|c| c.is_ascii_alphanumeric()), "{}", id);
        prop_assert!(id.len() <= 255);
        prop_assert_eq!(id, logical_id(&components));
    }

    #[test]
    fn multi_component_ids_end_with_hash(
        first in "[a-zA-Z][a-zA-Z0-9]{0,10}",
        second in "[a-zA-Z][a-zA-Z0-9]{0,10}",
    ) {
        prop_assume!(first != "Default" && second != "Default");
        let id = logical_id(&[first.as_str(), second.as_str()]);
        let hash = &id[id.len() - 8..];
        prop_assert!(hash.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn default_components_do_not_change_ids(
        first in "[a-zA-Z][a-zA-Z0-9]{0,10}",
        second in "[a-zA-Z][a-zA-Z0-9]{0,10}",
    ) {
        prop_assume!(first != "Default" && second != "Default");
        prop_assert_eq!(
            logical_id(&[first.as_str(), "Default", second.as_str()]),
            logical_id(&[first.as_str(), second.as_str()])
        );
    }
}
