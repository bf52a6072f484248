use std::io;
use std::path::PathBuf;
use thiserror::Error;
use crate::manifest::StrategyType;
use crate::templater::TemplateError;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the resolution and execution engine can produce.
///
/// Only [`Error::Skip`] is treated specially: the dispatch loop moves on to the
/// next strategy. Everything else aborts the invocation and reaches the user.
#[derive(Debug, Error)]
pub enum Error {
    /// The strategy cannot be used on this host right now; try the next one.
    #[error("{0}")]
    Skip(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("hash mismatch: expected {algo} {checksum}, got {hash}")]
    HashMismatch {
        algo: String,
        checksum: String,
        hash: String,
    },

    #[error("at least '{field}' needed for {strategy} strategy to work")]
    MissingField {
        strategy: StrategyType,
        field: &'static str,
    },

    #[error("field '{field}' must be {expected}")]
    InvalidField {
        field: String,
        expected: &'static str,
    },

    #[error("invalid manifest for {name}: {reason}")]
    InvalidManifest {
        name: String,
        reason: String,
    },

    #[error("failed to parse manifest {}", path.display())]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unable to find manifest for {0}")]
    ManifestNotFound(String),

    #[error("version {version} not found for {name}")]
    VersionNotFound {
        name: String,
        version: String,
    },

    #[error("no usable strategy found for {0}")]
    NoUsableStrategy(String),

    #[error("`{command}` exited with {}", code.map_or("a signal".to_string(), |c| format!("status {c}")))]
    CommandFailed {
        command: String,
        code: Option<i32>,
    },

    #[error("failed to start `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to download {url}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to unpack {}", path.display())]
    Unpack {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to locate the data directory: $HOME not found")]
    NoDataDir,

    #[error("unable to locate the config directory: $HOME not found")]
    NoConfigDir,

    #[error("failed to parse config {}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write config {}", path.display())]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },

    #[error("config key '{0}' must have the form section.key")]
    ConfigKey(String),

    #[error("source {0} already exists")]
    SourceExists(String),

    #[error("source {0} not found")]
    SourceNotFound(String),

    #[error("non-holen file found at {}", .0.display())]
    LinkConflict(PathBuf),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// True for the non-fatal "try the next strategy" signal.
    pub fn is_skip(&self) -> bool {
        matches!(self, Error::Skip(_))
    }

    /// Exit code of a child process that ran but failed, if that is what this is.
    pub fn child_exit_code(&self) -> Option<i32> {
        match self {
            Error::CommandFailed { code, .. } => *code,
            _ => None,
        }
    }
}
