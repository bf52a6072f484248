use std::path::{Path, PathBuf};
use crate::archive;
use crate::error::Result;
use crate::global::utils::default_data_dir;
use crate::util::{current_arch, current_os};

/// Facts about, and side effects on, the machine holen runs on.
pub trait System {
    /// OS identifier as used in `os_arch_map` keys, e.g. `linux` or `darwin`.
    fn os(&self) -> String;
    /// Architecture identifier, e.g. `amd64` or `arm64`.
    fn arch(&self) -> String;
    fn uid(&self) -> u32;
    fn gid(&self) -> u32;
    fn file_exists(&self, path: &Path) -> bool;
    fn make_executable(&self, path: &Path) -> Result<()>;
    /// Unpacks `archive` into `dest`. For single-file compressed formats
    /// `dest` is the output file itself.
    fn unpack_archive(&self, archive: &Path, dest: &Path) -> Result<()>;
    fn getenv(&self, key: &str) -> Option<String>;
    fn current_dir(&self) -> Result<PathBuf>;
    /// Per-user data directory holding the binary cache.
    fn data_dir(&self) -> Result<PathBuf>;
}

/// The real host.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSystem;

impl System for DefaultSystem {
    fn os(&self) -> String {
        current_os().to_string()
    }

    fn arch(&self) -> String {
        current_arch().to_string()
    }

    #[cfg(unix)]
    fn uid(&self) -> u32 {
        nix::unistd::getuid().as_raw()
    }

    #[cfg(not(unix))]
    fn uid(&self) -> u32 {
        0
    }

    #[cfg(unix)]
    fn gid(&self) -> u32 {
        nix::unistd::getgid().as_raw()
    }

    #[cfg(not(unix))]
    fn gid(&self) -> u32 {
        0
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    #[cfg(unix)]
    fn make_executable(&self, path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(perms.mode() | 0o755);
        std::fs::set_permissions(path, perms)?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn make_executable(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn unpack_archive(&self, archive: &Path, dest: &Path) -> Result<()> {
        archive::unpack(archive, dest)
    }

    fn getenv(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn current_dir(&self) -> Result<PathBuf> {
        Ok(std::env::current_dir()?)
    }

    fn data_dir(&self) -> Result<PathBuf> {
        default_data_dir(self)
    }
}
