//! Per-key aggregation: group by /24, collapse, union, sort.

use ipnet::Ipv4Net;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::aggregator::{collapse, count_ips, BlockGrouper};
use crate::frequency::{filter_by_frequency, Observations};

/// Final CIDR blocks per provider or CNAME key.
///
/// Serializes as `{key: ["a.b.c.d/n", ...]}` with keys in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProviderAggregate(BTreeMap<String, Vec<Ipv4Net>>);

impl ProviderAggregate {
    pub fn get(&self, key: &str) -> Option<&[Ipv4Net]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Ipv4Net>)> {
        self.0.iter()
    }

    /// Number of CIDR blocks across all keys.
    pub fn block_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// Number of addresses covered across all keys.
    pub fn address_count(&self) -> u64 {
        self.0.values().map(|nets| count_ips(nets)).sum()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AggregationPipeline {
    grouper: BlockGrouper,
}

impl AggregationPipeline {
    pub fn new(grouper: BlockGrouper) -> Self {
        Self { grouper }
    }

    /// Aggregate one key's addresses into sorted, deduplicated blocks.
    pub fn aggregate_key<S: AsRef<str>>(&self, raw: &[S]) -> Vec<Ipv4Net> {
        let blocks: BTreeSet<Ipv4Net> = self
            .grouper
            .group(raw)
            .values()
            .flat_map(|members| collapse(members.as_slice()))
            .collect();
        // Ipv4Net orders by network address, then prefix length
        blocks.into_iter().collect()
    }

    /// Aggregate every key. Keys with no valid address are omitted.
    pub fn run(&self, observations: &Observations) -> ProviderAggregate {
        let aggregate = observations
            .iter()
            .filter_map(|(key, addresses)| {
                let blocks = self.aggregate_key(addresses.as_slice());
                if blocks.is_empty() {
                    debug!("No valid addresses left for '{}'", key);
                    None
                } else {
                    Some((key.clone(), blocks))
                }
            })
            .collect();
        ProviderAggregate(aggregate)
    }

    /// Frequency filter followed by [`run`](Self::run).
    pub fn run_filtered(&self, observations: &Observations, threshold: usize) -> ProviderAggregate {
        let filtered = filter_by_frequency(observations, threshold);
        debug!(
            "Frequency filter (>= {}) kept {}/{} keys",
            threshold,
            filtered.len(),
            observations.len()
        );
        self.run(&filtered)
    }
}
