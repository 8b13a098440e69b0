//! Frequency-based noise filtering of per-key observations.
//!
//! A CDN edge address shows up behind many hostnames; an address seen only
//! once or twice for a provider is more likely a misclassified origin.

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;

use tracing::debug;

use crate::normalize::parse_ipv4;

/// Default minimum number of observations an address needs to be kept.
pub const DEFAULT_THRESHOLD: usize = 3;

/// Addresses observed per provider/CNAME key, duplicates preserved.
pub type Observations = BTreeMap<String, Vec<String>>;

/// One observation of an address under a provider or CNAME key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub key: String,
    pub address: String,
}

impl AddressRecord {
    pub fn new(key: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            address: address.into(),
        }
    }
}

/// Fold address records into per-key observation lists.
pub fn collect_observations<I>(records: I) -> Observations
where
    I: IntoIterator<Item = AddressRecord>,
{
    records
        .into_iter()
        .fold(Observations::new(), |mut acc, record| {
            acc.entry(record.key).or_default().push(record.address);
            acc
        })
}

/// Keep, per key, the addresses seen at least `threshold` times.
///
/// Sightings are counted per parsed address, so `" 1.1.1.1"` and `"1.1.1.1"`
/// count together and entries that do not parse are skipped. `127.0.0.1` is
/// dropped whatever its count. Retained addresses are rendered in dotted
/// form and keep first-seen order; keys left with nothing are removed.
pub fn filter_by_frequency(observations: &Observations, threshold: usize) -> Observations {
    observations
        .iter()
        .filter_map(|(key, addresses)| {
            let retained = frequent_addresses(addresses, threshold);
            (!retained.is_empty()).then(|| (key.clone(), retained))
        })
        .collect()
}

fn frequent_addresses(addresses: &[String], threshold: usize) -> Vec<String> {
    let mut counts: HashMap<Ipv4Addr, usize> = HashMap::new();
    let mut order: Vec<Ipv4Addr> = Vec::new();
    for address in addresses {
        let ip = match parse_ipv4(address) {
            Ok(ip) => ip,
            Err(e) => {
                debug!("Not counting entry: {}", e);
                continue;
            }
        };
        let count = counts.entry(ip).or_insert(0);
        if *count == 0 {
            order.push(ip);
        }
        *count += 1;
    }

    order
        .into_iter()
        .filter(|ip| *ip != Ipv4Addr::LOCALHOST)
        .filter(|ip| counts[ip] >= threshold)
        .map(|ip| ip.to_string())
        .collect()
}
