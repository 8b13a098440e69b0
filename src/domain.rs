//! Registrable-domain extraction for CNAME targets.
//!
//! CNAME chains point at per-customer names such as
//! `e1234.a.akamaiedge.net`; grouping needs the registrable domain
//! (`akamaiedge.net`). The Public Suffix List is embedded, and a newer copy
//! can be supplied through configuration.
//!
//! Only ICANN rules apply. Private entries such as `akamaiedge.net` or
//! `cloudfront.net` would otherwise make every edge hostname its own
//! registrable domain.

use anyhow::{Context, Result};
use publicsuffix::{IcannList, Psl};
use std::path::Path;
use std::str::FromStr;

use crate::fs_abstraction::FileSystem;

/// Embedded copy of https://publicsuffix.org/list/public_suffix_list.dat
const PUBLIC_SUFFIX_LIST: &str = include_str!("../data/public_suffix_list.dat");

#[derive(Debug)]
pub struct DomainExtractor {
    list: IcannList,
}

impl DomainExtractor {
    /// Extractor backed by the embedded Public Suffix List.
    pub fn builtin() -> Result<Self> {
        Self::from_list_text(PUBLIC_SUFFIX_LIST).context("Embedded public suffix list is invalid")
    }

    /// Extractor backed by a Public Suffix List in its text format.
    ///
    /// Rules count only inside the `BEGIN ICANN DOMAINS` section.
    pub fn from_list_text(text: &str) -> Result<Self> {
        let list = IcannList::from_str(text)
            .map_err(|e| anyhow::anyhow!("Failed to parse public suffix list: {}", e))?;
        Ok(Self { list })
    }

    /// Load a Public Suffix List file.
    pub fn from_file<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> Result<Self> {
        let bytes = fs
            .read(path)
            .with_context(|| format!("Failed to read public suffix list: {:?}", path))?;
        let text = String::from_utf8_lossy(&bytes);
        Self::from_list_text(&text)
            .with_context(|| format!("Invalid public suffix list: {:?}", path))
    }

    /// Registrable domain of `name`, or `None` when it has no label left of
    /// a known suffix.
    ///
    /// ```
    /// use cdnsieve::domain::DomainExtractor;
    /// let extractor = DomainExtractor::builtin().unwrap();
    /// assert_eq!(extractor.main_domain("a.b.example.com.cn."), Some("example.com.cn".to_string()));
    /// assert_eq!(extractor.main_domain("com"), None);
    /// ```
    pub fn main_domain(&self, name: &str) -> Option<String> {
        let name = name.trim().trim_end_matches('.').to_ascii_lowercase();
        if name.is_empty() {
            return None;
        }
        let suffix = self.list.suffix(name.as_bytes())?;
        if !suffix.is_known() {
            return None;
        }
        let domain = self.list.domain(name.as_bytes())?;
        std::str::from_utf8(domain.as_bytes()).ok().map(String::from)
    }

    /// Unique main domains for a list of names, sorted.
    pub fn main_domains<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        let mut domains: Vec<String> = names
            .iter()
            .filter_map(|name| self.main_domain(name.as_ref()))
            .collect();
        domains.sort();
        domains.dedup();
        domains
    }
}
