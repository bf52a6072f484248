use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use tracing::info;
use walkdir::WalkDir;
use crate::util::is_windows;

/// Cache entry name for one utility version: `name--version[.exe]`.
pub fn cache_key(name: &str, version: &str, os: &str) -> String {
    let key = format!("{name}--{version}");
    if is_windows(os) {
        format!("{key}.exe")
    } else {
        key
    }
}

pub fn cached_binary_path(bin_dir: &Path, name: &str, version: &str, os: &str) -> PathBuf {
    bin_dir.join(cache_key(name, version, os))
}

/// Empties the whole binary cache.
pub fn clean_cache(bin_dir: &Path) -> Result<()> {
    if bin_dir.exists() {
        std::fs::remove_dir_all(bin_dir)
            .with_context(|| format!("Could not remove cache dir {:?}", bin_dir))?;
    }
    std::fs::create_dir_all(bin_dir)
        .with_context(|| format!("Could not create cache dir {:?}", bin_dir))?;
    info!(dir = %bin_dir.display(), "binary cache cleaned");
    Ok(())
}

/// Removes every cached version of `name`. Returns how many entries went away.
pub fn remove_cached_binaries(bin_dir: &Path, name: &str) -> Result<usize> {
    if !bin_dir.exists() {
        return Ok(0);
    }
    let prefix = format!("{name}--");
    let mut removed = 0;
    for entry in WalkDir::new(bin_dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy();
        if file_name.starts_with(&prefix) {
            std::fs::remove_file(entry.path())
                .with_context(|| format!("Could not remove {:?}", entry.path()))?;
            info!(path = %entry.path().display(), "removed cached binary");
            removed += 1;
        }
    }
    Ok(removed)
}
