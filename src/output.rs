//! JSON documents consumed by the CDN detection tooling.
//!
//! Both files share one shape, `{"cdn": {"ip": {...}, "cname": {...}},
//! "waf": {}, "cloud": {}}`. The `cdn` category always carries both maps,
//! even when empty; `waf` and `cloud` are never filled.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::classify::{ConfirmedCdn, PossibleCdn};
use crate::fs_abstraction::FileSystem;
use crate::pipeline::ProviderAggregate;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Category {
    pub ip: ProviderAggregate,
    pub cname: BTreeMap<String, Vec<String>>,
}

/// A category this tool never fills. Serializes as `{}`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Unused {}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CdnData {
    pub cdn: Category,
    pub waf: Unused,
    pub cloud: Unused,
}

impl From<ConfirmedCdn> for CdnData {
    fn from(confirmed: ConfirmedCdn) -> Self {
        Self {
            cdn: Category {
                ip: confirmed.ip,
                cname: confirmed.cname,
            },
            ..Default::default()
        }
    }
}

impl From<PossibleCdn> for CdnData {
    fn from(possible: PossibleCdn) -> Self {
        Self {
            cdn: Category {
                ip: possible.ip,
                cname: possible.cname,
            },
            ..Default::default()
        }
    }
}

impl CdnData {
    /// Pretty JSON: two-space indent, non-ASCII left unescaped.
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self).context("Failed to serialize CDN data")?;
        json.push('\n');
        Ok(json)
    }
}

/// A document and where it goes.
#[derive(Debug)]
pub struct PendingWrite {
    pub path: PathBuf,
    pub contents: String,
}

/// Serialize every document first, then write them all.
///
/// A serialization failure therefore leaves nothing on disk, and each file
/// is replaced atomically.
pub fn write_documents<F: FileSystem + ?Sized>(
    fs: &F,
    output_dir: &Path,
    documents: &[(&str, &CdnData)],
) -> Result<Vec<PathBuf>> {
    let pending = documents
        .iter()
        .map(|(name, data)| -> Result<PendingWrite> {
            Ok(PendingWrite {
                path: output_dir.join(name),
                contents: data.to_json()?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if !output_dir.as_os_str().is_empty() && !fs.exists(output_dir) {
        fs.create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;
    }

    let mut written = Vec::with_capacity(pending.len());
    for write in pending {
        fs.write_atomic(&write.path, write.contents.as_bytes())
            .with_context(|| format!("Failed to write {:?}", write.path))?;
        info!("Wrote {:?}", write.path);
        written.push(write.path);
    }
    Ok(written)
}
