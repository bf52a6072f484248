use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::{Error, Result};
use crate::global::utils::user_config_dir;
use crate::system::System;

/// Flat dotted-key lookup used by the engine.
pub trait ConfigGetter {
    /// Returns the configured value for `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Every non-empty value under `[section]`, keyed by the rest of its key.
    fn section(&self, section: &str) -> BTreeMap<String, String>;
}

/// Contents of one config file: `[section]` tables of string values.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(transparent)]
pub struct ConfigFile {
    pub sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ConfigFile {
    /// Loads a config file, treating a missing file as empty.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(ConfigFile::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|source| Error::ConfigWrite {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        let (section, name) = split_key(key).ok()?;
        self.sections.get(section)?.get(name)
    }
}

/// Reads the system config overlaid by the user config, and edits either one.
#[derive(Debug, Clone)]
pub struct ConfigClient {
    pub system_path: PathBuf,
    pub user_path: PathBuf,
    system: ConfigFile,
    user: ConfigFile,
}

impl ConfigClient {
    /// Locates both config files the way the host expects them.
    ///
    /// The system file lives in `$HOLEN_SYSTEM_CONFIG` (default `/etc`), the user
    /// file in `$XDG_CONFIG_HOME/holen` or `~/.config/holen`.
    pub fn for_host(system: &dyn System) -> Result<Self> {
        let system_dir = system
            .getenv("HOLEN_SYSTEM_CONFIG")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "/etc".to_string());
        let system_path = PathBuf::from(system_dir).join("holenconfig.toml");
        let user_path = user_config_dir(system)?.join("config.toml");
        Self::open(system_path, user_path)
    }

    pub fn open(system_path: PathBuf, user_path: PathBuf) -> Result<Self> {
        debug!(system = %system_path.display(), user = %user_path.display(), "loading config");
        let system = ConfigFile::load_or_default(&system_path)?;
        let user = ConfigFile::load_or_default(&user_path)?;
        Ok(Self {
            system_path,
            user_path,
            system,
            user,
        })
    }

    pub fn set(&mut self, system: bool, key: &str, value: &str) -> Result<()> {
        let (section, name) = split_key(key)?;
        let (file, path) = self.target(system);
        file.sections
            .entry(section.to_string())
            .or_default()
            .insert(name.to_string(), value.to_string());
        file.save(path)
    }

    pub fn unset(&mut self, system: bool, key: &str) -> Result<()> {
        let (section, name) = split_key(key)?;
        let (file, path) = self.target(system);
        if let Some(table) = file.sections.get_mut(section) {
            table.remove(name);
            if table.is_empty() {
                file.sections.remove(section);
            }
        }
        file.save(path)
    }

    /// Every effective `section.key` value.
    pub fn get_all(&self) -> BTreeMap<String, String> {
        let mut all = BTreeMap::new();
        for file in [&self.system, &self.user] {
            for (section, table) in &file.sections {
                for (name, value) in table {
                    all.insert(format!("{section}.{name}"), value.clone());
                }
            }
        }
        all
    }

    fn target(&mut self, system: bool) -> (&mut ConfigFile, PathBuf) {
        if system {
            (&mut self.system, self.system_path.clone())
        } else {
            (&mut self.user, self.user_path.clone())
        }
    }
}

impl ConfigGetter for ConfigClient {
    fn get(&self, key: &str) -> Option<String> {
        self.user
            .get(key)
            .or_else(|| self.system.get(key))
            .filter(|v| !v.is_empty())
            .cloned()
    }

    fn section(&self, section: &str) -> BTreeMap<String, String> {
        let mut values = BTreeMap::new();
        for file in [&self.system, &self.user] {
            if let Some(table) = file.sections.get(section) {
                values.extend(table.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        values.retain(|_, v| !v.is_empty());
        values
    }
}

/// Splits `section.rest.of.key` at the first dot.
fn split_key(key: &str) -> Result<(&str, &str)> {
    match key.split_once('.') {
        Some((section, name)) if !section.is_empty() && !name.is_empty() => Ok((section, name)),
        _ => Err(Error::ConfigKey(key.to_string())),
    }
}
