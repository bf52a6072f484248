use std::borrow::Cow;
use std::ffi::OsString;
use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;
use crate::error::{Error, Result};

/// Launches child processes.
pub trait Runner {
    /// True when `command args` starts and exits successfully.
    fn check_command(&self, command: &str, args: &[OsString]) -> bool;

    /// Runs `command args` with inherited stdio and waits for it. `env` is
    /// added to the current environment. A non-zero exit is an error carrying
    /// the child's status code.
    fn run_command(&self, command: &str, args: &[OsString], env: &[(String, String)]) -> Result<()>;

    /// Runs `command args`, writing its stdout into `dest`.
    fn run_command_to_file(&self, command: &str, args: &[OsString], dest: &Path) -> Result<()>;
}

/// Spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRunner;

impl Runner for DefaultRunner {
    fn check_command(&self, command: &str, args: &[OsString]) -> bool {
        let status = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        debug!(%command, ?args, ?status, "checked command");
        matches!(status, Ok(s) if s.success())
    }

    fn run_command(&self, command: &str, args: &[OsString], env: &[(String, String)]) -> Result<()> {
        debug!(%command, ?args, "running command");
        let status = Command::new(command)
            .args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .status()
            .map_err(|source| Error::Spawn {
                command: command.to_string(),
                source,
            })?;
        if !status.success() {
            return Err(Error::CommandFailed {
                command: display_command(command, args),
                code: status.code(),
            });
        }
        Ok(())
    }

    fn run_command_to_file(&self, command: &str, args: &[OsString], dest: &Path) -> Result<()> {
        debug!(%command, ?args, dest = %dest.display(), "capturing command output");
        let out = File::create(dest)?;
        let status = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(out)
            .status()
            .map_err(|source| Error::Spawn {
                command: command.to_string(),
                source,
            })?;
        if !status.success() {
            return Err(Error::CommandFailed {
                command: display_command(command, args),
                code: status.code(),
            });
        }
        Ok(())
    }
}

/// `command arg1 arg2`, for messages and inspection output.
/// Arguments that are not valid UTF-8 are shown lossily.
pub fn display_command(command: &str, args: &[OsString]) -> String {
    std::iter::once(Cow::Borrowed(command))
        .chain(args.iter().map(|arg| arg.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Owned argument list from string slices.
pub fn os_args<S: AsRef<str>>(items: &[S]) -> Vec<OsString> {
    items.iter().map(|item| OsString::from(item.as_ref())).collect()
}
