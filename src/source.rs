//! Manifest sources.
//!
//! A source is a git repository of manifests, configured as
//! `source.<name> = <spec>` and checked out under `<data root>/manifests/<name>`.
//! The spec is either a GitHub `owner/repo`, a `host/owner/repo`, or a full
//! URL or local path that git understands as is.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use crate::capabilities::Capabilities;
use crate::config::{ConfigClient, ConfigGetter};
use crate::error::{Error, Result};
use crate::global::utils::get_data_root;
use crate::runner::{os_args, Runner};
use crate::system::System;

/// Config section holding the source specs.
pub const SOURCE_SECTION: &str = "source";
/// Source present even when none is configured.
pub const DEFAULT_SOURCE: &str = "main";
pub const DEFAULT_SOURCE_SPEC: &str = "justone/holen-manifests";

/// One manifest repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSource {
    pub name: String,
    pub spec: String,
}

impl GitSource {
    pub fn new(name: &str, spec: &str) -> Self {
        Self {
            name: name.to_string(),
            spec: spec.to_string(),
        }
    }

    /// Clone URL for the spec.
    pub fn url(&self) -> String {
        let spec = self.spec.as_str();
        if spec.starts_with('/') || spec.starts_with("git@") || spec.contains("://") {
            return spec.to_string();
        }
        let host_given = spec
            .split('/')
            .next()
            .is_some_and(|first| first.contains('.'));
        if host_given {
            format!("https://{spec}.git")
        } else {
            format!("https://github.com/{spec}.git")
        }
    }

    pub fn info(&self) -> String {
        format!("git source: {}", self.url())
    }

    pub fn checkout_dir(&self, base: &Path) -> PathBuf {
        base.join(&self.name)
    }

    /// Directory searched for manifests: the checkout's `manifests`
    /// subdirectory when it has one, else the checkout itself.
    pub fn manifest_dir(&self, system: &dyn System, base: &Path) -> PathBuf {
        let checkout = self.checkout_dir(base);
        let nested = checkout.join("manifests");
        if system.file_exists(&nested) {
            nested
        } else {
            checkout
        }
    }

    /// Clones the repository, or pulls it when the checkout already exists.
    pub fn update(&self, system: &dyn System, runner: &dyn Runner, base: &Path) -> Result<()> {
        let checkout = self.checkout_dir(base);
        if system.file_exists(&checkout) {
            info!("Updating source {}", self.name);
            let mut args = vec![OsString::from("-C"), checkout.into_os_string()];
            args.extend(os_args(&["pull"]));
            runner.run_command("git", &args, &[])
        } else {
            info!("Fetching source {}", self.name);
            std::fs::create_dir_all(base)?;
            let mut args = os_args(&["clone", self.url().as_str()]);
            args.push(checkout.into_os_string());
            runner.run_command("git", &args, &[])
        }
    }

    /// Removes the checkout, if there is one.
    pub fn delete(&self, base: &Path) -> Result<()> {
        let checkout = self.checkout_dir(base);
        if checkout.exists() {
            debug!(path = %checkout.display(), "removing source checkout");
            std::fs::remove_dir_all(checkout)?;
        }
        Ok(())
    }
}

/// Configured sources by name, with the default source unless it was
/// overridden.
pub fn configured_sources(config: &dyn ConfigGetter) -> BTreeMap<String, GitSource> {
    let mut sources = BTreeMap::from([(
        DEFAULT_SOURCE.to_string(),
        GitSource::new(DEFAULT_SOURCE, DEFAULT_SOURCE_SPEC),
    )]);
    for (name, spec) in config.section(SOURCE_SECTION) {
        sources.insert(name.clone(), GitSource::new(&name, &spec));
    }
    sources
}

/// `<data root>/manifests`, parent of every checkout.
pub fn sources_dir(system: &dyn System, config: &dyn ConfigGetter) -> Result<PathBuf> {
    Ok(get_data_root(system, config)?.join("manifests"))
}

/// Manifest directories of the sources that have been fetched.
pub fn checkout_paths(system: &dyn System, config: &dyn ConfigGetter) -> Result<Vec<PathBuf>> {
    let base = sources_dir(system, config)?;
    Ok(configured_sources(config)
        .values()
        .filter(|source| system.file_exists(&source.checkout_dir(&base)))
        .map(|source| source.manifest_dir(system, &base))
        .collect())
}

/// Adds, removes and fetches sources. Edits go to the user config unless
/// `system` is set.
#[derive(Debug)]
pub struct SourceManager {
    config: ConfigClient,
    caps: Capabilities,
}

impl SourceManager {
    pub fn new(config: ConfigClient, caps: Capabilities) -> Self {
        Self { config, caps }
    }

    pub fn add(&mut self, system: bool, name: &str, spec: &str) -> Result<()> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(Error::InvalidField {
                field: "source name".to_string(),
                expected: "a plain name",
            });
        }
        if self.list().contains_key(name) {
            return Err(Error::SourceExists(name.to_string()));
        }
        self.config.set(system, &source_key(name), spec)
    }

    pub fn list(&self) -> BTreeMap<String, GitSource> {
        configured_sources(&self.config)
    }

    pub fn get(&self, name: &str) -> Result<GitSource> {
        self.list()
            .remove(name)
            .ok_or_else(|| Error::SourceNotFound(name.to_string()))
    }

    /// Fetches `name`, or every source when `name` is `None`.
    pub fn update(&self, name: Option<&str>) -> Result<()> {
        let base = self.base()?;
        let selected = match name {
            Some(name) => vec![self.get(name)?],
            None => self.list().into_values().collect(),
        };
        for source in selected {
            source.update(self.caps.system.as_ref(), self.caps.runner.as_ref(), &base)?;
        }
        Ok(())
    }

    /// Removes the checkout and the config entry.
    pub fn delete(&mut self, system: bool, name: &str) -> Result<()> {
        let source = self.get(name)?;
        info!("Deleting {name}");
        source.delete(&self.base()?)?;
        self.config.unset(system, &source_key(name))
    }

    /// Manifest directory of `name`, fetched or not.
    pub fn path(&self, name: &str) -> Result<PathBuf> {
        let source = self.get(name)?;
        Ok(source.manifest_dir(self.caps.system.as_ref(), &self.base()?))
    }

    /// Manifest directories of `name`, or of every source when `name` is `None`.
    pub fn paths(&self, name: Option<&str>) -> Result<Vec<PathBuf>> {
        match name {
            Some(name) => Ok(vec![self.path(name)?]),
            None => {
                let base = self.base()?;
                Ok(self
                    .list()
                    .values()
                    .map(|source| source.manifest_dir(self.caps.system.as_ref(), &base))
                    .collect())
            }
        }
    }

    fn base(&self) -> Result<PathBuf> {
        sources_dir(self.caps.system.as_ref(), &self.config)
    }
}

fn source_key(name: &str) -> String {
    format!("{SOURCE_SECTION}.{name}")
}
