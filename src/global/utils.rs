use std::path::PathBuf;
use directories::BaseDirs;
use crate::config::ConfigGetter;
use crate::error::{Error, Result};
use crate::system::System;

const APP_DIR: &str = "holen";

/// Config key overriding the data root.
pub const DATA_DIR_KEY: &str = "binary.data_dir";

/// `$XDG_DATA_HOME/holen`, else `$HOME/.local/share/holen`, else the platform's
/// local data directory.
pub fn default_data_dir(system: &dyn System) -> Result<PathBuf> {
    if let Some(xdg) = non_empty(system.getenv("XDG_DATA_HOME")) {
        return Ok(PathBuf::from(xdg).join(APP_DIR));
    }
    if let Some(home) = non_empty(system.getenv("HOME")) {
        return Ok(PathBuf::from(home).join(".local").join("share").join(APP_DIR));
    }
    BaseDirs::new()
        .map(|dirs| dirs.data_local_dir().join(APP_DIR))
        .ok_or(Error::NoDataDir)
}

/// `$XDG_CONFIG_HOME/holen`, else `$HOME/.config/holen`, else the platform's
/// config directory.
pub fn user_config_dir(system: &dyn System) -> Result<PathBuf> {
    if let Some(xdg) = non_empty(system.getenv("XDG_CONFIG_HOME")) {
        return Ok(PathBuf::from(xdg).join(APP_DIR));
    }
    if let Some(home) = non_empty(system.getenv("HOME")) {
        return Ok(PathBuf::from(home).join(".config").join(APP_DIR));
    }
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().join(APP_DIR))
        .ok_or(Error::NoConfigDir)
}

/// Root holding `bin/` and `tmp/`, honouring the `binary.data_dir` override.
pub fn get_data_root(system: &dyn System, config: &dyn ConfigGetter) -> Result<PathBuf> {
    match config.get(DATA_DIR_KEY) {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => system.data_dir(),
    }
}

pub fn get_bin_dir(system: &dyn System, config: &dyn ConfigGetter) -> Result<PathBuf> {
    Ok(get_data_root(system, config)?.join("bin"))
}

pub fn get_tmp_dir(system: &dyn System, config: &dyn ConfigGetter) -> Result<PathBuf> {
    Ok(get_data_root(system, config)?.join("tmp"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
