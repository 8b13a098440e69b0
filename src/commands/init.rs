//! Init command implementation.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::fs_abstraction::{real_fs, FileSystem};

/// Run the init command
pub fn run(force: bool, config_path: &Path) -> Result<()> {
    write_default_config(real_fs(), config_path, force)?;
    info!("Wrote default config to {:?}", config_path);
    Ok(())
}

pub(crate) fn write_default_config<F: FileSystem + ?Sized>(
    fs: &F,
    config_path: &Path,
    force: bool,
) -> Result<()> {
    if fs.exists(config_path) && !force {
        anyhow::bail!(
            "Config file {:?} already exists (use --force to overwrite)",
            config_path
        );
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() && !fs.exists(parent) {
            fs.create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
    }

    fs.write_atomic(config_path, Config::generate_default_yaml().as_bytes())
        .with_context(|| format!("Failed to write config file: {:?}", config_path))
}
