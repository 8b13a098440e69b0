//! Collapse command implementation.

use anyhow::{Context, Result};
use ipnet::Ipv4Net;
use std::path::Path;
use tracing::{info, warn};

use crate::aggregator::{collapse, count_ips};
use crate::fs_abstraction::{real_fs, FileSystem};
use crate::input::decode;
use crate::normalize::{parse_ipv4, split_cell};

/// Run the collapse command
pub fn run(ips: &[String], file: Option<&Path>) -> Result<()> {
    let blocks = collapse_sources(real_fs(), ips, file)?;
    for block in &blocks {
        println!("{}", block);
    }
    Ok(())
}

/// Gather addresses from arguments and an optional file, then collapse them.
pub(crate) fn collapse_sources<F: FileSystem + ?Sized>(
    fs: &F,
    ips: &[String],
    file: Option<&Path>,
) -> Result<Vec<Ipv4Net>> {
    let mut tokens: Vec<String> = ips.iter().flat_map(|s| split_cell(s)).collect();

    if let Some(path) = file {
        let bytes = fs
            .read(path)
            .with_context(|| format!("Failed to read address file: {:?}", path))?;
        let (text, _) = decode(&bytes);
        tokens.extend(text.lines().flat_map(split_cell));
    }

    if tokens.is_empty() {
        anyhow::bail!("No addresses given (pass them as arguments or with --file)");
    }

    let invalid = tokens.iter().filter(|t| parse_ipv4(t).is_err()).count();
    if invalid > 0 {
        warn!("Skipped {} invalid entries", invalid);
    }

    let blocks = collapse(&tokens);
    info!(
        "Collapsed {} entries -> {} blocks ({} addresses)",
        tokens.len(),
        blocks.len(),
        count_ips(&blocks)
    );
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_abstraction::MockFileSystem;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_collapse_arguments() {
        let mock = MockFileSystem::new();
        let blocks = collapse_sources(&mock, &strings(&["1.1.1.0", "1.1.1.1", "9.9.9.9"]), None)
            .unwrap();
        let rendered: Vec<String> = blocks.iter().map(|b| b.to_string()).collect();
        assert_eq!(rendered, vec!["1.1.1.0/31", "9.9.9.9/32"]);
    }

    #[test]
    fn test_collapse_bracketed_argument() {
        let mock = MockFileSystem::new();
        let blocks = collapse_sources(&mock, &strings(&["[1.1.1.2 1.1.1.3]"]), None).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].to_string(), "1.1.1.2/31");
    }

    #[test]
    fn test_collapse_file_and_arguments() {
        let mut mock = MockFileSystem::new();
        mock.expect_read()
            .withf(|p| p == Path::new("ips.txt"))
            .returning(|_| Ok(b"10.0.0.0\n10.0.0.1 10.0.0.2\nnot-an-ip\n\n10.0.0.3\n".to_vec()));

        let blocks =
            collapse_sources(&mock, &strings(&["10.0.0.4"]), Some(Path::new("ips.txt"))).unwrap();
        let rendered: Vec<String> = blocks.iter().map(|b| b.to_string()).collect();
        assert_eq!(rendered, vec!["10.0.0.0/30", "10.0.0.4/32"]);
    }

    #[test]
    fn test_collapse_no_input() {
        let mock = MockFileSystem::new();
        assert!(collapse_sources(&mock, &[], None).is_err());
    }

    #[test]
    fn test_collapse_missing_file() {
        let mut mock = MockFileSystem::new();
        mock.expect_read()
            .returning(|_| Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing")));
        let err = collapse_sources(&mock, &[], Some(Path::new("nope.txt"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read address file"));
    }
}
