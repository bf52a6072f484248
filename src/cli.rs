use std::ffi::OsString;
use std::path::PathBuf;
use clap::{Parser, Subcommand};
use holen::shims::LinkKind;

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    /// Show as little information as possible
    #[clap(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
    /// Show verbose debug information
    #[clap(short, long, global = true)]
    pub verbose: bool,
    /// Log in JSON format
    #[clap(short = 'j', long, global = true)]
    pub log_json: bool,
    #[command(subcommand)]
    pub(crate) command: HolenCommand,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum HolenCommand {
    /// Run a utility: `<name>` or `<name>--<version>`, followed by its arguments
    Run {
        /// Run this version of the utility
        #[clap(long = "ver")]
        version: Option<String>,
        name: String,
        #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<OsString>,
    },
    /// Show what every strategy and version of a utility would do, without running it
    Inspect {
        /// Manifest file, overrides the search path
        #[clap(short, long)]
        manifest: Option<PathBuf>,
        /// Only this version
        #[clap(long = "ver")]
        version: Option<String>,
        name: String,
    },
    /// List all utilities found on the manifest search path
    List,
    /// Create entry points for utilities in a bin directory
    Link {
        /// Link from this bin path
        #[clap(short, long)]
        bin_path: PathBuf,
        /// Link manifests in this path
        #[clap(short, long, required_unless_present = "all")]
        manifest_path: Option<PathBuf>,
        /// Link manifests in all manifest paths found
        #[clap(short, long, conflicts_with = "manifest_path")]
        all: bool,
        /// Link to this holen path (defaults to self)
        #[clap(long)]
        holen_path: Option<PathBuf>,
        #[clap(short, long, value_enum, default_value_t = LinkKind::Symlink)]
        kind: LinkKind,
    },
    /// Get, set or list configuration values
    Config {
        /// Use the system config file
        #[clap(short, long)]
        system: bool,
        /// Unset the key
        #[clap(short, long, requires = "key")]
        unset: bool,
        /// List all values
        #[clap(short, long, conflicts_with_all = ["key", "unset"])]
        list: bool,
        key: Option<String>,
        value: Option<String>,
    },
    /// Remove cached binaries. Defaults to all
    Clean {
        /// Only versions of this utility
        name: Option<String>,
    },
    /// Manage manifest sources
    Source {
        #[command(subcommand)]
        command: SourceCommand,
    },
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum SourceCommand {
    /// Add a source
    Add {
        /// Modify system level configuration
        #[clap(short, long)]
        system: bool,
        name: String,
        /// `owner/repo` on GitHub, `host/owner/repo`, or a git URL
        spec: String,
    },
    /// List sources
    #[clap(visible_alias = "ls")]
    List,
    /// Fetch sources. Defaults to all
    #[clap(visible_aliases = ["up", "fetch"])]
    Update {
        name: Option<String>,
    },
    /// Delete a source and its checkout
    #[clap(visible_alias = "rm")]
    Delete {
        /// Modify system level configuration
        #[clap(short, long)]
        system: bool,
        name: String,
    },
    /// Show source information
    Show {
        /// Show local filesystem path
        #[clap(short, long, conflicts_with = "spec")]
        path: bool,
        /// Show source specification
        #[clap(short, long)]
        spec: bool,
        name: String,
    },
}
