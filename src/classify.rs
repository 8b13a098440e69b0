//! Row selection and the two CDN analyses.
//!
//! * **Confirmed**: rows the upstream scan labelled as CDN with a provider.
//!   Addresses are bucketed per provider, noise-filtered and collapsed;
//!   CNAME main domains that look like CDN infrastructure are attributed to
//!   the single provider they were seen with.
//! * **Possible**: rows with a CNAME but no provider label that still look
//!   like CDN traffic (IP-pool size heuristic or a CDN keyword in the CNAME).
//!   Addresses are bucketed per CNAME main domain.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::domain::DomainExtractor;
use crate::frequency::{collect_observations, AddressRecord, Observations};
use crate::input::CsvRow;
use crate::normalize::split_cell;
use crate::pipeline::{AggregationPipeline, ProviderAggregate};

/// A CSV row with its list cells broken out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    pub company: Option<String>,
    /// CNAME main domains, unique and sorted.
    pub cnames: Vec<String>,
    /// A-record tokens, unique, first-seen order. Not validated yet.
    pub addresses: Vec<String>,
    pub is_cdn: bool,
    pub ip_size_is_cdn: bool,
    raw_cname: String,
}

impl HostRecord {
    pub fn from_row(row: &CsvRow, extractor: &DomainExtractor) -> Self {
        Self {
            company: row.cdn_company.clone(),
            cnames: extractor.main_domains(&split_cell(&row.cname)),
            addresses: split_cell(&row.a),
            is_cdn: row.is_cdn,
            ip_size_is_cdn: row.ip_size_is_cdn,
            raw_cname: row.cname.clone(),
        }
    }

    /// The main domain when the row resolves to exactly one.
    pub fn single_cname(&self) -> Option<&str> {
        match self.cnames.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }
}

fn has_cname(row: &CsvRow) -> bool {
    !split_cell(&row.cname).is_empty()
}

fn contains_keyword(text: &str, keywords: &[String]) -> bool {
    let text = text.to_lowercase();
    keywords.iter().any(|k| text.contains(&k.to_lowercase()))
}

/// Why a CDN-looking CNAME was left out of the provider mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    /// Seen with several providers, so no single owner can be named.
    MultipleCompanies(Vec<String>),
    /// Only seen on rows without a provider label.
    NoCompany,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CnameExclusion {
    pub cname: String,
    pub reason: ExclusionReason,
}

/// Provider -> CIDR blocks and provider -> CNAME main domains.
#[derive(Debug, Clone, Default)]
pub struct ConfirmedCdn {
    pub ip: ProviderAggregate,
    pub cname: BTreeMap<String, Vec<String>>,
    pub exclusions: Vec<CnameExclusion>,
    /// Rows left out of IP aggregation for carrying several CNAMEs.
    pub multi_cname_rows: usize,
}

/// CNAME main domain -> itself, and CNAME main domain -> CIDR blocks.
#[derive(Debug, Clone, Default)]
pub struct PossibleCdn {
    pub cname: BTreeMap<String, Vec<String>>,
    pub ip: ProviderAggregate,
    pub multi_cname_rows: usize,
}

/// Per-CNAME statistics over the confirmed rows.
#[derive(Debug, Default)]
struct CnameStats {
    /// Rows each main domain appears on.
    frequency: BTreeMap<String, usize>,
    companies: BTreeMap<String, BTreeSet<String>>,
}

impl CnameStats {
    fn from_records(records: &[HostRecord]) -> Self {
        records.iter().fold(Self::default(), |mut stats, record| {
            for cname in &record.cnames {
                *stats.frequency.entry(cname.clone()).or_insert(0) += 1;
                let companies = stats.companies.entry(cname.clone()).or_default();
                if let Some(company) = &record.company {
                    companies.insert(company.clone());
                }
            }
            stats
        })
    }
}

pub struct Classifier<'a> {
    extractor: &'a DomainExtractor,
    settings: &'a AnalysisConfig,
    pipeline: AggregationPipeline,
}

impl<'a> Classifier<'a> {
    pub fn new(extractor: &'a DomainExtractor, settings: &'a AnalysisConfig) -> Self {
        Self {
            extractor,
            settings,
            pipeline: AggregationPipeline::new(settings.grouper()),
        }
    }

    fn records<'r, I>(&self, rows: I) -> Vec<HostRecord>
    where
        I: IntoIterator<Item = &'r CsvRow>,
    {
        rows.into_iter()
            .map(|row| HostRecord::from_row(row, self.extractor))
            .collect()
    }

    /// Split off rows that resolve to exactly one CNAME main domain.
    fn single_cname_records<'r>(&self, records: &'r [HostRecord]) -> (Vec<&'r HostRecord>, usize) {
        let mut single = Vec::new();
        let mut multi = 0;
        for record in records {
            match record.cnames.len() {
                1 => single.push(record),
                0 => debug!("No registrable CNAME in '{}'", record.raw_cname),
                _ => {
                    debug!("Several CNAMEs {:?}, skipping row", record.cnames);
                    multi += 1;
                }
            }
        }
        (single, multi)
    }

    /// Analysis of rows flagged `IsCdn` with a CNAME.
    pub fn confirmed(&self, rows: &[CsvRow]) -> ConfirmedCdn {
        let records = self.records(rows.iter().filter(|r| r.is_cdn && has_cname(r)));
        let stats = CnameStats::from_records(&records);

        let (single, multi_cname_rows) = self.single_cname_records(&records);
        let observations: Observations = collect_observations(single.iter().flat_map(|record| {
            let company = record.company.clone();
            record
                .addresses
                .iter()
                .filter_map(move |address| {
                    company
                        .as_ref()
                        .map(|c| AddressRecord::new(c.clone(), address.clone()))
                })
        }));
        let ip = self
            .pipeline
            .run_filtered(&observations, self.settings.ip_frequency_threshold);

        let mut cname: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut exclusions = Vec::new();
        for (candidate, count) in &stats.frequency {
            let keyword_hit = contains_keyword(candidate, &self.settings.cdn_cname_keywords);
            if !keyword_hit && *count <= self.settings.cname_frequency_threshold {
                continue;
            }

            let companies = stats.companies.get(candidate).cloned().unwrap_or_default();
            let mut companies = companies.into_iter();
            match (companies.next(), companies.next()) {
                (Some(company), None) => cname.entry(company).or_default().push(candidate.clone()),
                (None, _) => exclusions.push(CnameExclusion {
                    cname: candidate.clone(),
                    reason: ExclusionReason::NoCompany,
                }),
                (Some(first), Some(second)) => {
                    let mut all = vec![first, second];
                    all.extend(companies);
                    warn!(
                        "CNAME '{}' seen with several providers ({}), not attributed",
                        candidate,
                        all.join(", ")
                    );
                    exclusions.push(CnameExclusion {
                        cname: candidate.clone(),
                        reason: ExclusionReason::MultipleCompanies(all),
                    });
                }
            }
        }

        info!(
            "Confirmed CDN: {} rows, {} providers with IP ranges, {} providers with CNAMEs",
            records.len(),
            ip.len(),
            cname.len()
        );
        if multi_cname_rows > 0 {
            info!("{} rows with several CNAMEs left out of IP aggregation", multi_cname_rows);
        }

        ConfirmedCdn {
            ip,
            cname,
            exclusions,
            multi_cname_rows,
        }
    }

    /// Analysis of unlabelled rows that look like CDN traffic.
    pub fn possible(&self, rows: &[CsvRow]) -> PossibleCdn {
        let keywords = &self.settings.cdn_cname_keywords;
        let records = self.records(rows.iter().filter(|r| {
            r.cdn_company.is_none()
                && has_cname(r)
                && (r.ip_size_is_cdn || contains_keyword(&r.cname, keywords))
        }));

        let cname: BTreeMap<String, Vec<String>> = records
            .iter()
            .flat_map(|record| record.cnames.iter())
            .map(|c| (c.clone(), vec![c.clone()]))
            .collect();

        let (single, multi_cname_rows) = self.single_cname_records(&records);
        let observations = collect_observations(single.iter().flat_map(|record| {
            let key = record.single_cname().unwrap_or_default().to_string();
            record
                .addresses
                .iter()
                .map(move |address| AddressRecord::new(key.clone(), address.clone()))
        }));
        let ip = match self.settings.possible_ip_frequency_threshold {
            Some(threshold) => self.pipeline.run_filtered(&observations, threshold),
            None => self.pipeline.run(&observations),
        };

        info!(
            "Possible CDN: {} rows, {} CNAMEs, {} CNAMEs with IP ranges",
            records.len(),
            cname.len(),
            ip.len()
        );

        PossibleCdn {
            cname,
            ip,
            multi_cname_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipnet::Ipv4Net;

    fn row(company: &str, is_cdn: bool, cname: &str, a: &str, ip_size: bool) -> CsvRow {
        CsvRow {
            cdn_company: (!company.is_empty()).then(|| company.to_string()),
            is_cdn,
            cname: cname.to_string(),
            a: a.to_string(),
            ip_size_is_cdn: ip_size,
        }
    }

    fn nets(list: &[&str]) -> Vec<Ipv4Net> {
        list.iter().map(|s| s.parse().unwrap()).collect()
    }

    fn run_confirmed(rows: &[CsvRow]) -> ConfirmedCdn {
        let extractor = DomainExtractor::builtin().unwrap();
        let settings = AnalysisConfig::default();
        Classifier::new(&extractor, &settings).confirmed(rows)
    }

    fn run_possible(rows: &[CsvRow]) -> PossibleCdn {
        let extractor = DomainExtractor::builtin().unwrap();
        let settings = AnalysisConfig::default();
        Classifier::new(&extractor, &settings).possible(rows)
    }

    #[test]
    fn test_host_record_from_row() {
        let extractor = DomainExtractor::builtin().unwrap();
        let record = HostRecord::from_row(
            &row("Akamai", true, "[a.akamaiedge.net b.akamaiedge.net]", "[1.1.1.1 1.1.1.1 2.2.2.2]", false),
            &extractor,
        );
        assert_eq!(record.cnames, vec!["akamaiedge.net".to_string()]);
        assert_eq!(record.single_cname(), Some("akamaiedge.net"));
        assert_eq!(record.addresses, vec!["1.1.1.1".to_string(), "2.2.2.2".to_string()]);
    }

    #[test]
    fn test_contains_keyword() {
        let keywords: Vec<String> = vec!["cdn".into(), "waf".into()];
        assert!(contains_keyword("x.AliCDN.com", &keywords));
        assert!(contains_keyword("[a.wafcloud.net]", &keywords));
        assert!(!contains_keyword("akamaiedge.net", &keywords));
    }

    #[test]
    fn test_confirmed_ip_frequency() {
        let rows = vec![
            row("Akamai", true, "e1.akamaiedge.net", "[23.1.1.0 23.1.1.1]", false),
            row("Akamai", true, "e2.akamaiedge.net", "[23.1.1.0 23.1.1.1 23.1.1.9]", false),
            row("Akamai", true, "e3.akamaiedge.net", "[23.1.1.1 23.1.1.0]", false),
            row("Akamai", false, "e4.akamaiedge.net", "[23.1.1.9 23.1.1.9]", false),
        ];
        let result = run_confirmed(&rows);
        assert_eq!(result.ip.get("Akamai").unwrap(), nets(&["23.1.1.0/31"]).as_slice());
    }

    #[test]
    fn test_confirmed_skips_rows_without_cname() {
        let rows = vec![
            row("Akamai", true, "", "[23.1.1.1]", false),
            row("Akamai", true, "[]", "[23.1.1.1]", false),
            row("Akamai", true, "[]", "[23.1.1.1]", false),
        ];
        let result = run_confirmed(&rows);
        assert!(result.ip.is_empty());
        assert!(result.cname.is_empty());
    }

    #[test]
    fn test_confirmed_multi_cname_rows_excluded_from_ips() {
        let a = "[5.5.5.5]";
        let rows = vec![
            row("X", true, "[a.cdnx.com b.other.net]", a, false),
            row("X", true, "[a.cdnx.com b.other.net]", a, false),
            row("X", true, "[a.cdnx.com b.other.net]", a, false),
        ];
        let result = run_confirmed(&rows);
        assert_eq!(result.multi_cname_rows, 3);
        assert!(result.ip.is_empty());
        // CNAME stats still count multi-CNAME rows
        assert_eq!(
            result.cname["X"],
            vec!["cdnx.com".to_string(), "other.net".to_string()]
        );
    }

    #[test]
    fn test_confirmed_country_tld_provider_kept() {
        let rows: Vec<CsvRow> = (0..3)
            .map(|i| row("Transip", true, &format!("e{}.cdn.transip.nl", i), "[5.5.5.5]", false))
            .chain((0..3).map(|i| {
                row("Aruba", true, &format!("s{}.static.aruba.it", i), "[6.6.6.6]", false)
            }))
            .collect();
        let result = run_confirmed(&rows);
        assert_eq!(result.ip.get("Transip").unwrap(), nets(&["5.5.5.5/32"]).as_slice());
        assert_eq!(result.ip.get("Aruba").unwrap(), nets(&["6.6.6.6/32"]).as_slice());
        assert_eq!(result.cname["Transip"], vec!["transip.nl".to_string()]);
        assert_eq!(result.cname["Aruba"], vec!["aruba.it".to_string()]);
    }

    #[test]
    fn test_confirmed_cname_by_keyword() {
        let rows = vec![row("Alibaba", true, "img.alikunlun.alicdn.com", "[1.1.1.1]", false)];
        let result = run_confirmed(&rows);
        assert_eq!(result.cname["Alibaba"], vec!["alicdn.com".to_string()]);
    }

    #[test]
    fn test_confirmed_cname_by_frequency() {
        let rows: Vec<CsvRow> = (0..3)
            .map(|i| row("Akamai", true, &format!("e{}.akamaiedge.net", i), "[1.1.1.1]", false))
            .collect();
        let result = run_confirmed(&rows);
        assert_eq!(result.cname["Akamai"], vec!["akamaiedge.net".to_string()]);

        // two sightings is not enough without a keyword
        let result = run_confirmed(&rows[..2]);
        assert!(result.cname.is_empty());
    }

    #[test]
    fn test_confirmed_multi_company_cname_excluded() {
        let rows = vec![
            row("Akamai", true, "a.sharedcdn.net", "[1.1.1.1]", false),
            row("Fastly", true, "b.sharedcdn.net", "[2.2.2.2]", false),
        ];
        let result = run_confirmed(&rows);
        assert!(result.cname.is_empty());
        assert_eq!(
            result.exclusions,
            vec![CnameExclusion {
                cname: "sharedcdn.net".to_string(),
                reason: ExclusionReason::MultipleCompanies(vec![
                    "Akamai".to_string(),
                    "Fastly".to_string()
                ]),
            }]
        );
    }

    #[test]
    fn test_confirmed_cname_without_company_excluded() {
        let rows = vec![row("", true, "x.mycdn.com", "[1.1.1.1]", false)];
        let result = run_confirmed(&rows);
        assert!(result.cname.is_empty());
        assert_eq!(result.exclusions[0].reason, ExclusionReason::NoCompany);
        assert!(result.ip.is_empty());
    }

    #[test]
    fn test_possible_selection() {
        let rows = vec![
            // ip size heuristic
            row("", false, "a.edge-one.net", "[8.8.8.0 8.8.8.1]", true),
            // keyword
            row("", false, "b.fastcdn.org", "[9.9.9.9]", false),
            // labelled, ignored
            row("Akamai", true, "c.akamaicdn.net", "[7.7.7.7]", true),
            // no signal, ignored
            row("", false, "d.plain.com", "[6.6.6.6]", false),
            // no cname, ignored
            row("", false, "", "[5.5.5.5]", true),
        ];
        let result = run_possible(&rows);
        assert_eq!(
            result.cname.keys().cloned().collect::<Vec<_>>(),
            vec!["edge-one.net".to_string(), "fastcdn.org".to_string()]
        );
        assert_eq!(result.cname["fastcdn.org"], vec!["fastcdn.org".to_string()]);
        assert_eq!(result.ip.get("edge-one.net").unwrap(), nets(&["8.8.8.0/31"]).as_slice());
        assert_eq!(result.ip.get("fastcdn.org").unwrap(), nets(&["9.9.9.9/32"]).as_slice());
    }

    #[test]
    fn test_possible_multi_cname_rows_only_in_cname_map() {
        let rows = vec![row("", false, "[a.one.com b.two.com]", "[1.1.1.1]", true)];
        let result = run_possible(&rows);
        assert_eq!(result.cname.len(), 2);
        assert!(result.ip.is_empty());
        assert_eq!(result.multi_cname_rows, 1);
    }

    #[test]
    fn test_possible_frequency_threshold_optional() {
        let extractor = DomainExtractor::builtin().unwrap();
        let settings = AnalysisConfig {
            possible_ip_frequency_threshold: Some(2),
            ..Default::default()
        };
        let rows = vec![
            row("", false, "a.edge.net", "[1.1.1.1 2.2.2.2]", true),
            row("", false, "b.edge.net", "[1.1.1.1]", true),
        ];
        let result = Classifier::new(&extractor, &settings).possible(&rows);
        assert_eq!(result.ip.get("edge.net").unwrap(), nets(&["1.1.1.1/32"]).as_slice());
    }

    #[test]
    fn test_empty_rows() {
        assert!(run_confirmed(&[]).ip.is_empty());
        let possible = run_possible(&[]);
        assert!(possible.ip.is_empty());
        assert!(possible.cname.is_empty());
    }
}
