//! cdnsieve - CDN CIDR aggregation from DNS reconnaissance exports
//!
//! Turns a CSV of resolved domains into per-provider CIDR lists for CDN
//! detection tooling.

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cdnsieve::cli::{Cli, Commands};
use cdnsieve::commands::analyze::AnalyzeOptions;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Execute command
    match cli.command {
        Commands::Analyze {
            input,
            output_dir,
            threshold,
            dry_run,
        } => {
            let options = AnalyzeOptions {
                input,
                output_dir,
                threshold,
                dry_run,
            };
            cdnsieve::commands::analyze::run(options, &cli.config)
        }
        Commands::Collapse { ips, file } => {
            cdnsieve::commands::collapse::run(&ips, file.as_deref())
        }
        Commands::Init { force } => cdnsieve::commands::init::run(force, &cli.config),
        Commands::Version => {
            println!("cdnsieve {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
