//! Locating manifests on the search path.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;
use crate::capabilities::Capabilities;
use crate::error::{Error, Result};
use crate::manifest::{Manifest, ManifestData, NameVer};
use crate::source::checkout_paths;

pub const MANIFEST_EXT: &str = "yaml";
/// Config key with extra manifest directories.
pub const MANIFEST_PATH_KEY: &str = "manifest.path";

#[derive(Debug, Clone)]
pub struct ManifestFinder {
    self_path: PathBuf,
    caps: Capabilities,
}

impl ManifestFinder {
    /// `self_path` is the running holen executable; its sibling `manifests`
    /// directory is searched last.
    pub fn new<P: Into<PathBuf>>(self_path: P, caps: Capabilities) -> Self {
        Self {
            self_path: self_path.into(),
            caps,
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn self_path(&self) -> &Path {
        &self.self_path
    }

    /// `$HLN_PATH`, then `manifest.path`, then fetched sources, then
    /// `$HLN_PATH_POST`, then the `manifests` directory next to holen.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        self.extend_split(&mut paths, self.caps.system.getenv("HLN_PATH"));
        self.extend_split(&mut paths, self.caps.config.get(MANIFEST_PATH_KEY));
        match checkout_paths(self.caps.system.as_ref(), self.caps.config.as_ref()) {
            Ok(checkouts) => paths.extend(checkouts),
            Err(err) => debug!(%err, "source checkouts not searched"),
        }
        self.extend_split(&mut paths, self.caps.system.getenv("HLN_PATH_POST"));
        let self_dir = self.self_path.parent().unwrap_or_else(|| Path::new("."));
        paths.push(self_dir.join("manifests"));
        debug!(?paths, "manifest search path");
        paths
    }

    fn extend_split(&self, paths: &mut Vec<PathBuf>, value: Option<String>) {
        if let Some(value) = value {
            paths.extend(std::env::split_paths(&value).filter(|p| !p.as_os_str().is_empty()));
        }
    }

    /// First `<dir>/<name>.yaml` on the search path.
    pub fn find_path(&self, name: &str) -> Result<PathBuf> {
        let file_name = format!("{name}.{MANIFEST_EXT}");
        for dir in self.paths() {
            let candidate = dir.join(&file_name);
            debug!(path = %candidate.display(), "trying manifest");
            if self.caps.system.file_exists(&candidate) {
                return Ok(candidate);
            }
        }
        Err(Error::ManifestNotFound(name.to_string()))
    }

    pub fn find(&self, utility: &NameVer) -> Result<Manifest> {
        let path = self.find_path(&utility.name)?;
        self.load(&utility.name, &path)
    }

    pub fn load(&self, name: &str, path: &Path) -> Result<Manifest> {
        let data = ManifestData::load(name, path)?;
        Ok(Manifest::new(data, self.caps.clone()))
    }

    /// Sorted, de-duplicated utility names across the search path.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        for dir in self.paths() {
            names.extend(manifest_files(&dir)?.into_iter().map(|(name, _)| name));
        }
        Ok(names.into_iter().collect())
    }
}

/// `(name, path)` of every manifest directly inside `dir`, sorted by name.
/// A missing directory has none.
pub fn manifest_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let path = entry.path();
        if !entry.file_type().is_file() && !entry.path_is_symlink() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(MANIFEST_EXT) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            found.push((stem.to_string(), path.to_path_buf()));
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestUtils;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str) {
        std::fs::write(
            dir.join(format!("{name}.yaml")),
            format!("desc: {name}\nstrategies:\n  cmdio:\n    command: {name}\n    versions:\n      - version: '1'\n"),
        )
        .unwrap();
    }

    #[test]
    fn test_paths_order() {
        let tu = TestUtils::new();
        tu.system.setenv("HLN_PATH", "/a:/b");
        tu.system.setenv("HLN_PATH_POST", "/d");
        tu.config.set(MANIFEST_PATH_KEY, "/c");
        let finder = ManifestFinder::new("/opt/holen/bin/holen", tu.capabilities());
        let paths: Vec<PathBuf> = ["/a", "/b", "/c", "/d", "/opt/holen/bin/manifests"]
            .iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(finder.paths(), paths);
    }

    #[test]
    fn test_fetched_sources_are_searched() {
        let tu = TestUtils::new();
        tu.system.setenv("HLN_PATH", "/a");
        tu.system.setenv("HLN_PATH_POST", "/d");
        tu.config.set("source.tools", "org/tools");
        let checkout = tu.data_dir().join("manifests").join("tools").join("manifests");
        std::fs::create_dir_all(&checkout).unwrap();
        write(&checkout, "hugo");

        let finder = ManifestFinder::new("/opt/holen/bin/holen", tu.capabilities());
        assert_eq!(
            finder.paths(),
            vec![
                PathBuf::from("/a"),
                checkout.clone(),
                PathBuf::from("/d"),
                PathBuf::from("/opt/holen/bin/manifests"),
            ]
        );
        assert_eq!(finder.find_path("hugo").unwrap(), checkout.join("hugo.yaml"));
    }

    #[test]
    fn test_find_prefers_earlier_path() {
        let tu = TestUtils::new();
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        write(first.path(), "jq");
        write(second.path(), "jq");
        write(second.path(), "hugo");
        tu.system.setenv("HLN_PATH", &first.path().display().to_string());
        tu.system.setenv("HLN_PATH_POST", &second.path().display().to_string());

        let finder = ManifestFinder::new("/nowhere/holen", tu.capabilities());
        assert_eq!(finder.find_path("jq").unwrap(), first.path().join("jq.yaml"));
        assert_eq!(finder.find_path("hugo").unwrap(), second.path().join("hugo.yaml"));
        assert_eq!(finder.find(&NameVer::parse("hugo--1")).unwrap().data.desc, "hugo");

        let err = finder.find_path("nope").unwrap_err();
        assert_eq!(err.to_string(), "unable to find manifest for nope");
    }

    #[test]
    fn test_list_dedupes_and_sorts() {
        let tu = TestUtils::new();
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        write(first.path(), "zed");
        write(first.path(), "jq");
        write(second.path(), "jq");
        std::fs::write(second.path().join("README.md"), "not a manifest").unwrap();
        tu.config.set(
            MANIFEST_PATH_KEY,
            &std::env::join_paths([first.path(), second.path()])
                .unwrap()
                .to_string_lossy(),
        );

        let finder = ManifestFinder::new("/nowhere/holen", tu.capabilities());
        assert_eq!(finder.list().unwrap(), vec!["jq", "zed"]);
    }
}
