//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cdnsieve")]
#[command(author, version, about = "CDN CIDR aggregation from DNS reconnaissance exports")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (defaults apply when it does not exist)
    #[arg(short, long, default_value = "cdnsieve.yaml", global = true)]
    pub config: PathBuf,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a CSV export and write the confirmed and candidate CDN documents
    Analyze {
        /// CSV export to read (overrides config)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Directory for the JSON documents (overrides config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Minimum sightings per address (overrides config)
        #[arg(short, long)]
        threshold: Option<usize>,

        /// Run the analysis and print the summary without writing files
        #[arg(long)]
        dry_run: bool,
    },

    /// Collapse IPv4 addresses into a minimal CIDR list
    Collapse {
        /// Addresses to collapse
        ips: Vec<String>,

        /// Read addresses from a file, one per line or whitespace separated
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Write a commented default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show version
    Version,
}
