//! Analyze command implementation.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::classify::{Classifier, ExclusionReason};
use crate::config::Config;
use crate::domain::DomainExtractor;
use crate::fs_abstraction::{real_fs, FileSystem};
use crate::input::load_csv;
use crate::output::{write_documents, CdnData};

/// Command-line overrides for the analyze command.
#[derive(Debug, Default)]
pub struct AnalyzeOptions {
    pub input: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub threshold: Option<usize>,
    pub dry_run: bool,
}

impl AnalyzeOptions {
    /// Layer the overrides on top of a loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(input) = &self.input {
            config.input = input.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(threshold) = self.threshold {
            config.analysis.ip_frequency_threshold = threshold;
        }
    }
}

/// What a run produced.
#[derive(Debug, Default)]
pub struct AnalysisReport {
    pub rows: usize,
    pub skipped_rows: usize,
    pub encoding: &'static str,
    pub confirmed_providers: usize,
    pub confirmed_blocks: usize,
    pub confirmed_addresses: u64,
    pub confirmed_cnames: usize,
    pub excluded_cnames: usize,
    pub possible_cnames: usize,
    pub possible_blocks: usize,
    pub written: Vec<PathBuf>,
}

/// Run the analyze command
pub fn run(options: AnalyzeOptions, config_path: &Path) -> Result<()> {
    let mut config = Config::load_or_default(real_fs(), config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    options.apply(&mut config);
    config.validate()?;

    let report = analyze(real_fs(), &config, options.dry_run)?;
    print_report(&report, options.dry_run);
    Ok(())
}

/// Load the export, run both analyses, and write the documents unless
/// `dry_run` is set.
pub fn analyze<F: FileSystem + ?Sized>(
    fs: &F,
    config: &Config,
    dry_run: bool,
) -> Result<AnalysisReport> {
    let extractor = match &config.public_suffix_list {
        Some(path) => DomainExtractor::from_file(fs, path)?,
        None => DomainExtractor::builtin()?,
    };

    info!("Analyzing {:?}", config.input);
    let input = load_csv(fs, &config.input, config.csv.delimiter)?;
    if input.rows.is_empty() {
        warn!("No usable rows in {:?}; documents will be empty", config.input);
    }

    let classifier = Classifier::new(&extractor, &config.analysis);
    let confirmed = classifier.confirmed(&input.rows);
    let possible = classifier.possible(&input.rows);

    for exclusion in &confirmed.exclusions {
        if let ExclusionReason::MultipleCompanies(companies) = &exclusion.reason {
            info!(
                "Excluded CNAME {} (shared by {})",
                exclusion.cname,
                companies.join(", ")
            );
        }
    }

    let mut report = AnalysisReport {
        rows: input.rows.len(),
        skipped_rows: input.skipped,
        encoding: input.encoding,
        confirmed_providers: confirmed.ip.len(),
        confirmed_blocks: confirmed.ip.block_count(),
        confirmed_addresses: confirmed.ip.address_count(),
        confirmed_cnames: confirmed.cname.values().map(Vec::len).sum(),
        excluded_cnames: confirmed.exclusions.len(),
        possible_cnames: possible.cname.len(),
        possible_blocks: possible.ip.block_count(),
        written: Vec::new(),
    };

    let should_added = CdnData::from(confirmed);
    let possible_cdn = CdnData::from(possible);

    if dry_run {
        info!("Dry-run: not writing documents");
        return Ok(report);
    }

    report.written = write_documents(
        fs,
        &config.output_dir,
        &[
            (config.should_added_file.as_str(), &should_added),
            (config.possible_cdn_file.as_str(), &possible_cdn),
        ],
    )?;
    Ok(report)
}

fn print_report(report: &AnalysisReport, dry_run: bool) {
    println!();
    println!(
        "Rows analyzed:     {} ({} skipped, {})",
        report.rows, report.skipped_rows, report.encoding
    );
    println!(
        "Confirmed CDN:     {} providers, {} blocks ({} addresses), {} CNAMEs",
        report.confirmed_providers,
        report.confirmed_blocks,
        report.confirmed_addresses,
        report.confirmed_cnames
    );
    if report.excluded_cnames > 0 {
        println!("Excluded CNAMEs:   {}", report.excluded_cnames);
    }
    println!(
        "Possible CDN:      {} CNAMEs, {} blocks",
        report.possible_cnames, report.possible_blocks
    );
    if dry_run {
        println!("Dry-run: no files written");
    } else {
        for path in &report.written {
            println!("Wrote {}", path.display());
        }
    }
    println!();
}
