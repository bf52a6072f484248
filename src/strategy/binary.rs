use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use crate::archive::is_single_file_compressed;
use crate::capabilities::Capabilities;
use crate::error::{Error, Result};
use crate::global::cache::{cache_key, cached_binary_path};
use crate::global::utils::{get_bin_dir, get_tmp_dir};
use crate::hash::{select_checksum, verify_file};
use crate::templater::Templater;
use crate::util::{file_name_string, url_file_name};
use super::{templater, Fields, OsArchMap};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryData {
    pub name: String,
    pub desc: String,
    pub version: String,
    pub base_url: String,
    /// Path of the binary inside the downloaded archive. Empty means the
    /// download is the binary itself.
    pub unpack_path: String,
    pub os_arch_data: OsArchMap,
}

impl BinaryData {
    pub(crate) fn from_fields(name: &str, desc: &str, fields: &Fields<'_>) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            desc: desc.to_string(),
            version: fields.string("version")?,
            base_url: fields.required("base_url")?,
            unpack_path: fields.string("unpack_path")?,
            os_arch_data: fields.os_arch_map()?,
        })
    }
}

/// Downloads a platform binary into the local cache and runs it from there.
#[derive(Debug)]
pub struct BinaryStrategy {
    pub data: BinaryData,
    caps: Capabilities,
}

impl BinaryStrategy {
    pub fn new(data: BinaryData, caps: Capabilities) -> Self {
        Self { data, caps }
    }

    fn templater(&self) -> Templater {
        templater(self.caps.system.as_ref(), &self.data.version, &self.data.os_arch_data)
    }

    /// Cached location of this name and version.
    pub fn cache_path(&self) -> Result<PathBuf> {
        let bin_dir = get_bin_dir(self.caps.system.as_ref(), self.caps.config.as_ref())?;
        Ok(cached_binary_path(
            &bin_dir,
            &self.data.name,
            &self.data.version,
            &self.caps.system.os(),
        ))
    }

    pub fn run(&self, args: &[OsString]) -> Result<()> {
        let cached = self.cache_path()?;
        if self.caps.system.file_exists(&cached) {
            debug!(path = %cached.display(), "using cached binary");
        } else {
            self.install(&cached)?;
        }
        self.caps
            .runner
            .run_command(&cached.to_string_lossy(), args, &[])
    }

    pub fn inspect(&self) -> Result<String> {
        let templater = self.templater();
        let url = templater.resolve(&self.data.base_url)?;
        let unpack_path = templater.resolve(&self.data.unpack_path)?;

        let mut out = format!("binary {}\n  url: {url}\n", self.data.version);
        if !unpack_path.is_empty() {
            out.push_str(&format!("  unpack path: {unpack_path}\n"));
        }
        match select_checksum(&templater.os_arch_data) {
            Some(checksum) => out.push_str(&format!(
                "  {}: {}\n",
                checksum.algo.field(),
                checksum.expected
            )),
            None => out.push_str("  checksum: none\n"),
        }
        out.push_str(&format!("  cache: {}\n", self.cache_path()?.display()));
        Ok(out)
    }

    /// Downloads, verifies and moves the binary into `cached`. The final
    /// rename is the only step that touches the cache directory.
    fn install(&self, cached: &Path) -> Result<()> {
        let system = self.caps.system.as_ref();
        let templater = self.templater();
        let url = templater.resolve(&self.data.base_url)?;
        let unpack_path = templater.resolve(&self.data.unpack_path)?;
        let unpack_path = relative_unpack_path(&unpack_path)?;

        let tmp_root = get_tmp_dir(system, self.caps.config.as_ref())?;
        std::fs::create_dir_all(&tmp_root)?;
        let key = cache_key(&self.data.name, &self.data.version, &system.os());
        let tmp = tempfile::Builder::new().prefix(&key).tempdir_in(&tmp_root)?;

        let artifact = if unpack_path.as_os_str().is_empty() {
            let target = tmp.path().join(&key);
            self.caps.downloader.download_file(&url, &target)?;
            verify_file(&templater.os_arch_data, &target)?;
            target
        } else {
            let archive = tmp.path().join(url_file_name(&url));
            self.caps.downloader.download_file(&url, &archive)?;
            verify_file(&templater.os_arch_data, &archive)?;

            if is_single_file_compressed(&file_name_string(&archive)) {
                let target = tmp.path().join(&unpack_path);
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                system.unpack_archive(&archive, &target)?;
                target
            } else {
                let unpacked = tmp.path().join("unpacked");
                std::fs::create_dir_all(&unpacked)?;
                system.unpack_archive(&archive, &unpacked)?;
                unpacked.join(&unpack_path)
            }
        };

        if let Some(parent) = cached.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(&artifact, cached)?;
        system.make_executable(cached)?;
        debug!(path = %cached.display(), "binary cached");
        Ok(())
    }
}

/// `unpack_path` names a file inside the archive, so it must stay below the
/// unpack directory.
fn relative_unpack_path(unpack_path: &str) -> Result<PathBuf> {
    let path = PathBuf::from(unpack_path);
    let inside = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !inside {
        return Err(Error::InvalidField {
            field: "unpack_path".to_string(),
            expected: "a relative path inside the archive",
        });
    }
    Ok(path)
}
