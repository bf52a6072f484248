use std::cell::RefCell;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use crate::error::{Error, Result};
use crate::finder::{manifest_files, ManifestFinder};

/// Files larger than this are never holen forwarder scripts.
const MAX_SCRIPT_SIZE: u64 = 500;

/// How `holen link` exposes utilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LinkKind {
    /// Symlink to the holen executable, dispatched on argv[0].
    #[default]
    Symlink,
    /// Small `sh` script calling `holen run`.
    Script,
    /// Shell `alias` lines printed to stdout.
    Alias,
}

/// Creates one entry point for a utility version. An empty version links the
/// bare utility name.
pub trait Linker {
    fn link(&self, name: &str, version: &str) -> Result<()>;
}

/// `name` or `name--version`.
pub fn link_name(name: &str, version: &str) -> String {
    if version.is_empty() {
        name.to_string()
    } else {
        format!("{name}--{version}")
    }
}

/// Creates a platform-specific shim forwarding to the holen executable.
///
/// On Unix, this is a symbolic link at `bin_path/<name>[--<version>]`
/// pointing to `target`; holen recognises the link name when invoked through
/// it. On Windows, a `.bat` file is written instead that calls
/// `target run <name>[--<version>]` with all arguments.
#[derive(Debug, Clone)]
pub struct FileLinker {
    pub target: PathBuf,
    pub bin_path: PathBuf,
}

impl FileLinker {
    /// Where the shim for `name` and `version` is created on this platform.
    pub fn shim_path(&self, name: &str, version: &str) -> PathBuf {
        if cfg!(windows) {
            batch_shim_path(&self.bin_path, name, version)
        } else {
            self.bin_path.join(link_name(name, version))
        }
    }
}

/// `bin_path/<name>[--<version>].bat`. The suffix is appended, since versions
/// carry dots of their own.
pub fn batch_shim_path(bin_path: &Path, name: &str, version: &str) -> PathBuf {
    bin_path.join(format!("{}.bat", link_name(name, version)))
}

impl Linker for FileLinker {
    fn link(&self, name: &str, version: &str) -> Result<()> {
        let shim_path = self.shim_path(name, version);
        debug!(shim = %shim_path.display(), target = %self.target.display(), "linking");

        #[cfg(unix)]
        {
            remove_old_link(&shim_path)?;
            std::os::unix::fs::symlink(&self.target, &shim_path)?;
        }
        #[cfg(windows)]
        {
            remove_old_link(&shim_path)?;
            let script = format!(
                "@echo off\r\ncall \"{}\" run {} %*\r\n",
                self.target.display(),
                link_name(name, version)
            );
            std::fs::write(shim_path, script)?;
        }
        Ok(())
    }
}

/// Writes `#!/bin/sh` forwarders that `exec holen run`.
#[derive(Debug, Clone)]
pub struct ScriptLinker {
    pub bin_path: PathBuf,
}

impl ScriptLinker {
    pub fn script(name: &str, version: &str) -> String {
        format!(
            "#!/bin/sh\nexec holen run {} -- \"$@\"\n",
            link_name(name, version)
        )
    }
}

impl Linker for ScriptLinker {
    fn link(&self, name: &str, version: &str) -> Result<()> {
        let path = self.bin_path.join(link_name(name, version));
        remove_old_link(&path)?;
        std::fs::write(&path, Self::script(name, version))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        }
        debug!(script = %path.display(), "script written");
        Ok(())
    }
}

/// Prints `alias` lines instead of touching the filesystem.
#[derive(Debug)]
pub struct AliasLinker<W: Write> {
    out: RefCell<W>,
}

impl<W: Write> AliasLinker<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: RefCell::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write> Linker for AliasLinker<W> {
    fn link(&self, name: &str, version: &str) -> Result<()> {
        let link = link_name(name, version);
        writeln!(self.out.borrow_mut(), "alias {link}=\"holen run {link} -- \"")?;
        Ok(())
    }
}

/// Removes `path` if holen created it. Anything else there is a
/// [`Error::LinkConflict`].
pub fn remove_old_link(path: &Path) -> Result<()> {
    let Ok(meta) = std::fs::symlink_metadata(path) else {
        return Ok(());
    };

    if meta.file_type().is_symlink() {
        let target = std::fs::read_link(path)?;
        let target_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if matches!(target_name.as_str(), "holen" | "hln" | "holen.exe") || target_name.ends_with(".yaml") {
            std::fs::remove_file(path)?;
            return Ok(());
        }
    } else if meta.is_file() && meta.len() < MAX_SCRIPT_SIZE {
        let contents = std::fs::read_to_string(path).unwrap_or_default();
        if contents.contains("holen run") {
            std::fs::remove_file(path)?;
            return Ok(());
        }
    }
    Err(Error::LinkConflict(path.to_path_buf()))
}

/// Links every manifest in `manifest_dir`: each distinct version, then the
/// bare name. Returns the utility names linked.
pub fn link_manifests(
    finder: &ManifestFinder,
    manifest_dir: &Path,
    linker: &dyn Linker,
) -> Result<Vec<String>> {
    let mut seen = BTreeSet::new();
    link_dir(finder, manifest_dir, linker, &mut seen)?;
    Ok(seen.into_iter().collect())
}

/// [`link_manifests`] over the whole search path. Earlier paths win when a
/// name appears twice.
pub fn link_all(finder: &ManifestFinder, linker: &dyn Linker) -> Result<Vec<String>> {
    let mut seen = BTreeSet::new();
    for dir in finder.paths() {
        link_dir(finder, &dir, linker, &mut seen)?;
    }
    Ok(seen.into_iter().collect())
}

fn link_dir(
    finder: &ManifestFinder,
    manifest_dir: &Path,
    linker: &dyn Linker,
    seen: &mut BTreeSet<String>,
) -> Result<()> {
    for (name, path) in manifest_files(manifest_dir)? {
        if !seen.insert(name.clone()) {
            debug!(%name, "already linked, skipping");
            continue;
        }
        let manifest = finder.load(&name, &path)?;

        let mut versions: Vec<&str> = Vec::new();
        for raw in manifest.data.strategies.values() {
            for version in raw.version_names() {
                if !versions.contains(&version) {
                    versions.push(version);
                }
            }
        }
        for version in versions {
            linker.link(&name, version)?;
        }
        linker.link(&name, "")?;
    }
    Ok(())
}
