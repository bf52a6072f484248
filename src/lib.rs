//! # Holen Core Library
//!
//! This crate contains the resolution and execution engine of the `holen` tool – a launcher that runs
//! command-line utilities on demand without installing them first.
//!
//! Each utility is described by a YAML manifest listing one or more *strategies* for obtaining it (a
//! container image, a downloadable platform binary, or a remote command endpoint), each with a list of
//! versions. `holen` picks the strategies in a configurable priority order and runs the first one that
//! is usable on this host, forwarding arguments and the exit code.
//!
//! ## Modules Overview
//! - [`manifest`] – Manifest parsing, version selection and the strategy dispatch loop
//! - [`strategy`] – The `docker`, `binary` and `cmdio` strategies
//! - [`order`] – Strategy priority resolution from configuration
//! - [`node`] – Typed manifest tree and its deep merge
//! - [`templater`] – `{{.Version}}`-style field substitution
//! - [`finder`] – Manifest search path
//! - [`source`] – Git repositories of manifests
//! - [`shims`] – Linking utilities into a bin directory
//! - [`config`] – System and user configuration files
//! - [`system`], [`runner`], [`download`] – Host capabilities injected into strategies
//! - [`archive`], [`hash`] – Unpacking and checksum verification of downloads
//! - [`global`] – Data directories and the binary cache

pub mod archive;
pub mod capabilities;
pub mod config;
pub mod download;
pub mod error;
pub mod finder;
pub mod global;
pub mod hash;
pub mod manifest;
pub mod node;
pub mod order;
pub mod runner;
pub mod shims;
pub mod source;
pub mod strategy;
pub mod system;
pub mod templater;
pub mod util;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{Error, Result};
pub use manifest::{Manifest, ManifestData, NameVer, StrategyType};
pub use strategy::Strategy;
