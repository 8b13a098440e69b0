//! Address parsing and cell splitting.
//!
//! Upstream tooling writes list-valued cells (`A`, `CNAME`) as
//! `"[a b c]"` or `"a b c"`. Everything here is lenient: a bad token is
//! logged and skipped, it never fails the batch.

use std::collections::{BTreeSet, HashSet};
use std::net::Ipv4Addr;

use tracing::debug;

use crate::error::SieveError;

/// Parse a single IPv4 address, tolerating surrounding whitespace and
/// bracket artifacts.
///
/// # Examples
/// ```
/// use cdnsieve::normalize::parse_ipv4;
/// assert!(parse_ipv4(" 1.1.1.1 ").is_ok());
/// assert!(parse_ipv4("[1.1.1.1]").is_ok());
/// assert!(parse_ipv4("1.1.1").is_err());
/// ```
pub fn parse_ipv4(raw: &str) -> Result<Ipv4Addr, SieveError> {
    let trimmed = raw.trim().trim_matches(|c| c == '[' || c == ']').trim();
    trimmed
        .parse::<Ipv4Addr>()
        .map_err(|_| SieveError::InvalidIp(raw.to_string()))
}

/// Parse a sequence of raw strings into a set of unique, valid addresses.
///
/// The returned set iterates in ascending numeric order.
pub fn normalize<S: AsRef<str>>(raw: &[S]) -> BTreeSet<Ipv4Addr> {
    raw.iter()
        .filter_map(|s| match parse_ipv4(s.as_ref()) {
            Ok(ip) => Some(ip),
            Err(e) => {
                debug!("Skipping entry: {}", e);
                None
            }
        })
        .collect()
}

/// Split a list-valued cell into unique tokens, keeping first-seen order.
///
/// # Examples
/// ```
/// use cdnsieve::normalize::split_cell;
/// assert_eq!(split_cell("[1.1.1.1 2.2.2.2 1.1.1.1]"), vec!["1.1.1.1", "2.2.2.2"]);
/// assert!(split_cell("[]").is_empty());
/// ```
pub fn split_cell(cell: &str) -> Vec<String> {
    let cleaned = cell.trim().trim_matches(|c| c == '[' || c == ']');
    let mut seen = HashSet::new();
    cleaned
        .split_whitespace()
        .filter(|token| seen.insert(*token))
        .map(String::from)
        .collect()
}
