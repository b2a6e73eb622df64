//! Clean the output directory

use anyhow::Result;
use std::fs;

use crate::cache::CACHE_DIR;
use crate::Site;

/// Remove the output directory and the build cache
pub fn run(site: &Site) -> Result<()> {
    if site.output_dir.exists() {
        fs::remove_dir_all(&site.output_dir)?;
        tracing::info!("Deleted: {:?}", site.output_dir);
    }

    let cache_dir = site.base_dir.join(CACHE_DIR);
    if cache_dir.exists() {
        fs::remove_dir_all(&cache_dir)?;
        tracing::info!("Deleted: {:?}", cache_dir);
    }

    Ok(())
}
