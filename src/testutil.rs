//! In-memory capabilities for unit tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;
use crate::archive::is_single_file_compressed;
use crate::capabilities::Capabilities;
use crate::config::ConfigGetter;
use crate::download::Downloader;
use crate::error::{Error, Result};
use crate::global::utils::default_data_dir;
use crate::runner::{display_command, Runner};
use crate::system::System;
use crate::util::file_name_string;

#[derive(Debug)]
pub struct MemSystem {
    os: RefCell<String>,
    arch: RefCell<String>,
    env: RefCell<BTreeMap<String, String>>,
    data_dir: RefCell<Option<PathBuf>>,
    archive_files: RefCell<BTreeMap<String, Vec<u8>>>,
    pub executables: RefCell<Vec<PathBuf>>,
    pub unpacked: RefCell<Vec<PathBuf>>,
}

impl Default for MemSystem {
    fn default() -> Self {
        Self {
            os: RefCell::new("linux".to_string()),
            arch: RefCell::new("amd64".to_string()),
            env: RefCell::default(),
            data_dir: RefCell::default(),
            archive_files: RefCell::default(),
            executables: RefCell::default(),
            unpacked: RefCell::default(),
        }
    }
}

impl MemSystem {
    pub fn setenv(&self, key: &str, value: &str) {
        self.env.borrow_mut().insert(key.to_string(), value.to_string());
    }

    pub fn set_platform(&self, os: &str, arch: &str) {
        *self.os.borrow_mut() = os.to_string();
        *self.arch.borrow_mut() = arch.to_string();
    }

    pub fn set_data_dir(&self, dir: &Path) {
        *self.data_dir.borrow_mut() = Some(dir.to_path_buf());
    }

    /// File created at `relative` inside the destination of every
    /// multi-file unpack.
    pub fn add_archive_file(&self, relative: &str, contents: &[u8]) {
        self.archive_files
            .borrow_mut()
            .insert(relative.to_string(), contents.to_vec());
    }
}

impl System for MemSystem {
    fn os(&self) -> String {
        self.os.borrow().clone()
    }

    fn arch(&self) -> String {
        self.arch.borrow().clone()
    }

    fn uid(&self) -> u32 {
        1000
    }

    fn gid(&self) -> u32 {
        1000
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn make_executable(&self, path: &Path) -> Result<()> {
        self.executables.borrow_mut().push(path.to_path_buf());
        Ok(())
    }

    fn unpack_archive(&self, archive: &Path, dest: &Path) -> Result<()> {
        self.unpacked.borrow_mut().push(archive.to_path_buf());
        if is_single_file_compressed(&file_name_string(archive)) {
            std::fs::copy(archive, dest)?;
            return Ok(());
        }
        for (relative, contents) in self.archive_files.borrow().iter() {
            let path = dest.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, contents)?;
        }
        Ok(())
    }

    fn getenv(&self, key: &str) -> Option<String> {
        self.env.borrow().get(key).cloned()
    }

    fn current_dir(&self) -> Result<PathBuf> {
        Ok(PathBuf::from("/work"))
    }

    fn data_dir(&self) -> Result<PathBuf> {
        match self.data_dir.borrow().as_ref() {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(self),
        }
    }
}

/// Records commands instead of running them.
#[derive(Debug, Default)]
pub struct MemRunner {
    history: RefCell<Vec<String>>,
    envs: RefCell<Vec<Vec<(String, String)>>>,
    checks: RefCell<Vec<String>>,
    failing_checks: RefCell<BTreeSet<String>>,
    failing_commands: RefCell<BTreeMap<String, i32>>,
    file_output: RefCell<String>,
}

impl MemRunner {
    /// Makes `check_command` fail for this exact command line.
    pub fn fail_check(&self, command_line: &str) {
        self.failing_checks.borrow_mut().insert(command_line.to_string());
    }

    /// Makes `run_command` exit with `code` for this exact command line.
    pub fn fail_command(&self, command_line: &str, code: i32) {
        self.failing_commands
            .borrow_mut()
            .insert(command_line.to_string(), code);
    }

    /// Contents written by `run_command_to_file`.
    pub fn set_file_output(&self, contents: &str) {
        *self.file_output.borrow_mut() = contents.to_string();
    }

    pub fn history(&self) -> Vec<String> {
        self.history.borrow().clone()
    }

    pub fn envs(&self) -> Vec<Vec<(String, String)>> {
        self.envs.borrow().clone()
    }

    pub fn checks(&self) -> Vec<String> {
        self.checks.borrow().clone()
    }
}

impl Runner for MemRunner {
    fn check_command(&self, command: &str, args: &[OsString]) -> bool {
        let line = display_command(command, args);
        self.checks.borrow_mut().push(line.clone());
        !self.failing_checks.borrow().contains(&line)
    }

    fn run_command(&self, command: &str, args: &[OsString], env: &[(String, String)]) -> Result<()> {
        let line = display_command(command, args);
        self.history.borrow_mut().push(line.clone());
        self.envs.borrow_mut().push(env.to_vec());
        match self.failing_commands.borrow().get(&line) {
            Some(code) => Err(Error::CommandFailed {
                command: line,
                code: Some(*code),
            }),
            None => Ok(()),
        }
    }

    fn run_command_to_file(&self, command: &str, args: &[OsString], dest: &Path) -> Result<()> {
        self.history.borrow_mut().push(display_command(command, args));
        self.envs.borrow_mut().push(Vec::new());
        std::fs::write(dest, self.file_output.borrow().as_bytes())?;
        Ok(())
    }
}

/// Serves canned bodies and records requests.
#[derive(Debug, Default)]
pub struct MemDownloader {
    bodies: RefCell<BTreeMap<String, Vec<u8>>>,
    downloads: RefCell<Vec<String>>,
    pulls: RefCell<Vec<String>>,
}

impl MemDownloader {
    pub fn serve(&self, url: &str, body: &[u8]) {
        self.bodies.borrow_mut().insert(url.to_string(), body.to_vec());
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.borrow().clone()
    }

    pub fn pulls(&self) -> Vec<String> {
        self.pulls.borrow().clone()
    }
}

impl Downloader for MemDownloader {
    fn download_file(&self, url: &str, dest: &Path) -> Result<()> {
        self.downloads.borrow_mut().push(url.to_string());
        let body = self
            .bodies
            .borrow()
            .get(url)
            .cloned()
            .unwrap_or_else(|| b"downloaded".to_vec());
        std::fs::write(dest, body)?;
        Ok(())
    }

    fn pull_docker_image(&self, image: &str) -> Result<()> {
        self.pulls.borrow_mut().push(image.to_string());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemConfig {
    values: RefCell<BTreeMap<String, String>>,
}

impl MemConfig {
    pub fn set(&self, key: &str, value: &str) {
        self.values.borrow_mut().insert(key.to_string(), value.to_string());
    }

    pub fn unset(&self, key: &str) {
        self.values.borrow_mut().remove(key);
    }
}

impl ConfigGetter for MemConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).filter(|v| !v.is_empty()).cloned()
    }

    fn section(&self, section: &str) -> BTreeMap<String, String> {
        let prefix = format!("{section}.");
        self.values
            .borrow()
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .filter_map(|(k, v)| Some((k.strip_prefix(&prefix)?.to_string(), v.clone())))
            .collect()
    }
}

/// A full set of fakes sharing one scratch directory as data root.
pub struct TestUtils {
    pub system: Rc<MemSystem>,
    pub runner: Rc<MemRunner>,
    pub downloader: Rc<MemDownloader>,
    pub config: Rc<MemConfig>,
    dir: TempDir,
}

impl TestUtils {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("scratch dir");
        let system = MemSystem::default();
        system.set_data_dir(&dir.path().join("data"));
        Self {
            system: Rc::new(system),
            runner: Rc::new(MemRunner::default()),
            downloader: Rc::new(MemDownloader::default()),
            config: Rc::new(MemConfig::default()),
            dir,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            system: self.system.clone(),
            runner: self.runner.clone(),
            downloader: self.downloader.clone(),
            config: self.config.clone(),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn scratch(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `contents` to a fresh file in the scratch directory.
    pub fn write_scratch(&self, contents: &str) -> PathBuf {
        let path = self.dir.path().join("scratch");
        std::fs::write(&path, contents).expect("write scratch file");
        path
    }
}
