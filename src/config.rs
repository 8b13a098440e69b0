//! Configuration management for cdnsieve.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::aggregator::{BlockGrouper, DEFAULT_MAX_MISSING};
use crate::frequency::DEFAULT_THRESHOLD;
use crate::fs_abstraction::FileSystem;

/// CNAME keywords that mark a name as CDN/WAF/cloud infrastructure
const DEFAULT_CDN_KEYWORDS: &[&str] = &["cdn", "cloud", "waf", "dns", "yun", "dos", "dun"];

/// A CNAME seen on more rows than this is treated as CDN infrastructure
const DEFAULT_CNAME_FREQUENCY_THRESHOLD: usize = 2;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// CSV export to analyze
    pub input: PathBuf,

    /// Directory the JSON documents are written to
    pub output_dir: PathBuf,

    /// File name of the confirmed CDN document
    pub should_added_file: String,

    /// File name of the candidate CDN document
    pub possible_cdn_file: String,

    /// CSV reading options
    pub csv: CsvConfig,

    /// Thresholds and keywords for the analyses
    pub analysis: AnalysisConfig,

    /// Public Suffix List file; the embedded copy is used when unset
    pub public_suffix_list: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from("dns_results.csv"),
            output_dir: PathBuf::from("."),
            should_added_file: "should_added.json".to_string(),
            possible_cdn_file: "possible_cdn.json".to_string(),
            csv: CsvConfig::default(),
            analysis: AnalysisConfig::default(),
            public_suffix_list: None,
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> Result<Self> {
        let bytes = fs
            .read(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let content = String::from_utf8(bytes)
            .with_context(|| format!("Config file is not valid UTF-8: {:?}", path))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Load the config file if present, defaults otherwise
    pub fn load_or_default<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> Result<Self> {
        if fs.exists(path) {
            Self::load(fs, path)
        } else {
            tracing::debug!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for (field, name) in [
            ("should_added_file", &self.should_added_file),
            ("possible_cdn_file", &self.possible_cdn_file),
        ] {
            if name.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", field);
            }
            if name.contains('/') || name.contains('\\') {
                anyhow::bail!("{} must be a file name, not a path: {}", field, name);
            }
        }

        if self.should_added_file == self.possible_cdn_file {
            anyhow::bail!(
                "should_added_file and possible_cdn_file must differ (both '{}')",
                self.should_added_file
            );
        }

        if let Some(delimiter) = self.csv.delimiter {
            if !delimiter.is_ascii() || delimiter == '"' || delimiter == '\n' {
                anyhow::bail!("Invalid CSV delimiter '{}'", delimiter.escape_default());
            }
        }

        self.analysis.validate()
    }

    /// Save configuration to YAML file atomically
    ///
    /// Uses tempfile + rename pattern to prevent corruption on crash.
    pub fn save<F: FileSystem + ?Sized>(&self, fs: &F, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).with_context(|| "Failed to serialize config")?;
        fs.write_atomic(path, content.as_bytes())
            .with_context(|| format!("Failed to persist config file: {:?}", path))
    }

    /// Generate default config with comments
    pub fn generate_default_yaml() -> String {
        include_str!("../templates/config.yaml").to_string()
    }

    /// Path of the confirmed CDN document
    pub fn should_added_path(&self) -> PathBuf {
        self.output_dir.join(&self.should_added_file)
    }

    /// Path of the candidate CDN document
    pub fn possible_cdn_path(&self) -> PathBuf {
        self.output_dir.join(&self.possible_cdn_file)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    /// Field delimiter; sniffed from the header when unset
    pub delimiter: Option<char>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum sightings of an address under a provider
    pub ip_frequency_threshold: usize,

    /// CNAMEs seen on more rows than this count as CDN infrastructure
    pub cname_frequency_threshold: usize,

    /// Case-insensitive substrings marking a CNAME as CDN-like
    pub cdn_cname_keywords: Vec<String>,

    /// Accepted for /24 grouping; grouping is currently exact
    pub max_missing: u32,

    /// Frequency filter for candidate CNAME addresses; off when unset
    pub possible_ip_frequency_threshold: Option<usize>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ip_frequency_threshold: DEFAULT_THRESHOLD,
            cname_frequency_threshold: DEFAULT_CNAME_FREQUENCY_THRESHOLD,
            cdn_cname_keywords: DEFAULT_CDN_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            max_missing: DEFAULT_MAX_MISSING,
            possible_ip_frequency_threshold: None,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ip_frequency_threshold == 0 {
            anyhow::bail!("ip_frequency_threshold must be at least 1");
        }
        if self.possible_ip_frequency_threshold == Some(0) {
            anyhow::bail!("possible_ip_frequency_threshold must be at least 1 when set");
        }
        if self.cdn_cname_keywords.iter().any(|k| k.trim().is_empty()) {
            anyhow::bail!("cdn_cname_keywords cannot contain empty entries");
        }
        Ok(())
    }

    pub fn grouper(&self) -> BlockGrouper {
        BlockGrouper::new(self.max_missing)
    }
}
