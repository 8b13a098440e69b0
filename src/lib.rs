//! # cdnsieve - CDN CIDR aggregation from DNS reconnaissance exports
//!
//! Reads a CSV of resolved domains (CNAME chains, A records, CDN labels) and
//! produces the IP ranges and CNAME domains that CDN detection tooling
//! consumes.
//!
//! ## Features
//!
//! - **Exact CIDR collapse** - Sibling blocks merge only when both halves are observed
//! - **Noise filtering** - Addresses seen fewer than N times under a provider are dropped
//! - **/24 grouping** - Collapse runs per /24 so blocks never span networks
//! - **CNAME attribution** - Registrable domains via the Public Suffix List
//! - **Encoding detection** - UTF-8, GB18030 and Big5 exports, any common delimiter
//! - **Atomic output** - Both documents are built before anything is written
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        cdnsieve                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CLI (clap)                                                 │
//! │    └── Commands: analyze, collapse, init, version           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Config (serde_yaml)                                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Input (csv + encoding_rs)                                  │
//! │    └── Typed rows, delimiter sniffing                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Classifier (publicsuffix)                                  │
//! │    ├── Confirmed CDN: provider -> addresses, CNAMEs         │
//! │    └── Possible CDN: CNAME -> addresses                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pipeline                                                   │
//! │    ├── FrequencyFilter (noise threshold, loopback)          │
//! │    ├── BlockGrouper (/24)                                   │
//! │    └── Collapse (ipnet)                                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Output (serde_json, FileSystem trait)                      │
//! │    └── should_added.json, possible_cdn.json                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```
//! use cdnsieve::aggregator::collapse;
//! use cdnsieve::frequency::{collect_observations, AddressRecord};
//! use cdnsieve::pipeline::AggregationPipeline;
//!
//! let blocks = collapse(&["1.1.1.0", "1.1.1.1", "1.1.1.3"]);
//! assert_eq!(blocks.len(), 2);
//!
//! let observations = collect_observations(
//!     ["1.1.1.1", "1.1.1.1", "1.1.1.1", "2.2.2.2"]
//!         .into_iter()
//!         .map(|ip| AddressRecord::new("Akamai", ip)),
//! );
//! let aggregate = AggregationPipeline::default().run_filtered(&observations, 3);
//! assert_eq!(aggregate.get("Akamai").unwrap()[0].to_string(), "1.1.1.1/32");
//! ```
//!
//! ## Modules
//!
//! - [`aggregator`] - CIDR collapse and /24 grouping
//! - [`classify`] - Row selection for the confirmed and possible analyses
//! - [`cli`] - Command-line interface definitions
//! - [`commands`] - CLI command implementations
//! - [`config`] - Configuration parsing and validation
//! - [`domain`] - Registrable domain extraction
//! - [`error`] - Error types
//! - [`frequency`] - Sighting counts and noise filtering
//! - [`fs_abstraction`] - Mockable filesystem access
//! - [`input`] - CSV loading
//! - [`normalize`] - Address parsing and cell splitting
//! - [`output`] - JSON documents
//! - [`pipeline`] - Per-key aggregation

pub mod aggregator;
pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod frequency;
pub mod fs_abstraction;
pub mod input;
pub mod normalize;
pub mod output;
pub mod pipeline;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::SieveError;
