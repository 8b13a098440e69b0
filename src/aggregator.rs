//! CIDR collapse and /24 grouping.

use ipnet::Ipv4Net;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use tracing::debug;

use crate::normalize::{normalize, parse_ipv4};

/// Default tolerance for missing /24 blocks between groups.
pub const DEFAULT_MAX_MISSING: u32 = 1;

/// Collapse a list of addresses into the minimal set of CIDR blocks.
///
/// Every address starts as a /32. Two sibling /n blocks merge into their
/// /(n-1) parent only when both are present, so the result covers exactly
/// the valid input addresses: `["1.1.1.1", "1.1.1.2"]` stays two /32s while
/// `["1.1.1.0", "1.1.1.1"]` becomes `1.1.1.0/31`.
///
/// Invalid entries are skipped. Output is sorted by network address.
pub fn collapse<S: AsRef<str>>(raw: &[S]) -> Vec<Ipv4Net> {
    let hosts: Vec<Ipv4Net> = normalize(raw).into_iter().map(Ipv4Net::from).collect();
    if hosts.is_empty() {
        return Vec::new();
    }

    // ipnet merges adjacent ranges and re-splits them on prefix boundaries,
    // which for /32 inputs is the same result as a bottom-up trie collapse.
    let mut collapsed = Ipv4Net::aggregate(&hosts);
    collapsed.sort();
    collapsed
}

/// Enumerate every address covered by a list of blocks.
pub fn expand(nets: &[Ipv4Net]) -> Vec<Ipv4Addr> {
    nets.iter()
        .flat_map(|net| (u32::from(net.network())..=u32::from(net.broadcast())).map(Ipv4Addr::from))
        .collect()
}

/// Total number of individual addresses covered by a list of blocks.
pub fn count_ips(nets: &[Ipv4Net]) -> u64 {
    nets.iter()
        .map(|net| 1u64 << (32 - u32::from(net.prefix_len())))
        .sum()
}

/// The /24 network an address belongs to.
pub fn block_of(ip: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) & 0xFFFF_FF00)
}

/// Partitions a provider's addresses by /24 before collapsing.
///
/// Each /24 is collapsed on its own, so no output block spans two /24s.
#[derive(Debug, Clone, Copy)]
pub struct BlockGrouper {
    max_missing: u32,
}

impl Default for BlockGrouper {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MISSING)
    }
}

impl BlockGrouper {
    pub fn new(max_missing: u32) -> Self {
        Self { max_missing }
    }

    pub fn max_missing(&self) -> u32 {
        self.max_missing
    }

    /// Group raw addresses by their /24 network address.
    ///
    /// Non-IPv4 entries are dropped. Raw strings are kept as given so the
    /// collapse step sees the original input.
    // TODO: honour max_missing by joining neighbouring /24 groups separated
    // by at most that many empty /24s; grouping is exact /24 membership.
    pub fn group<S: AsRef<str>>(&self, raw: &[S]) -> BTreeMap<Ipv4Addr, Vec<String>> {
        let mut groups: BTreeMap<Ipv4Addr, Vec<String>> = BTreeMap::new();
        for entry in raw {
            let entry = entry.as_ref();
            match parse_ipv4(entry) {
                Ok(ip) => groups
                    .entry(block_of(ip))
                    .or_default()
                    .push(entry.trim().to_string()),
                Err(e) => debug!("Not grouping entry: {}", e),
            }
        }
        groups
    }
}
