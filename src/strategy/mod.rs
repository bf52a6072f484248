//! Typed strategies built from merged manifest fields.
//!
//! Each variant owns its typed data plus the injected [`Capabilities`]; nothing
//! here reaches for global state.

pub mod binary;
pub mod cmdio;
pub mod docker;

use std::collections::BTreeMap;
use std::ffi::OsString;
pub use binary::{BinaryData, BinaryStrategy};
pub use cmdio::{CmdioData, CmdioStrategy};
pub use docker::{DockerData, DockerStrategy};
use crate::capabilities::Capabilities;
use crate::error::{Error, Result};
use crate::manifest::StrategyType;
use crate::node::{Map, Node};
use crate::system::System;
use crate::templater::Templater;
use crate::util::os_arch_key;

/// Per-platform data keyed by `{os}_{arch}`.
pub type OsArchMap = BTreeMap<String, BTreeMap<String, String>>;

/// One runnable (type, version) pair.
#[derive(Debug)]
pub enum Strategy {
    Docker(DockerStrategy),
    Binary(BinaryStrategy),
    Cmdio(CmdioStrategy),
}

impl Strategy {
    /// Builds the typed strategy for `kind` from a merged field set. A missing
    /// required field fails here, before anything runs.
    pub fn build(
        kind: StrategyType,
        name: &str,
        desc: &str,
        fields: &Map,
        caps: Capabilities,
    ) -> Result<Self> {
        let fields = Fields::new(kind, fields);
        Ok(match kind {
            StrategyType::Docker => {
                Strategy::Docker(DockerStrategy::new(DockerData::from_fields(name, desc, &fields)?, caps))
            }
            StrategyType::Binary => {
                Strategy::Binary(BinaryStrategy::new(BinaryData::from_fields(name, desc, &fields)?, caps))
            }
            StrategyType::Cmdio => {
                Strategy::Cmdio(CmdioStrategy::new(CmdioData::from_fields(name, desc, &fields)?, caps))
            }
        })
    }

    pub fn kind(&self) -> StrategyType {
        match self {
            Strategy::Docker(_) => StrategyType::Docker,
            Strategy::Binary(_) => StrategyType::Binary,
            Strategy::Cmdio(_) => StrategyType::Cmdio,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            Strategy::Docker(s) => &s.data.version,
            Strategy::Binary(s) => &s.data.version,
            Strategy::Cmdio(s) => &s.data.version,
        }
    }

    pub fn run(&self, args: &[OsString]) -> Result<()> {
        match self {
            Strategy::Docker(s) => s.run(args),
            Strategy::Binary(s) => s.run(args),
            Strategy::Cmdio(s) => s.run(args),
        }
    }

    /// Human-readable summary of what `run` would do. Never checks for docker or
    /// touches the network.
    pub fn inspect(&self) -> Result<String> {
        match self {
            Strategy::Docker(s) => s.inspect(),
            Strategy::Binary(s) => s.inspect(),
            Strategy::Cmdio(s) => s.inspect(),
        }
    }
}

/// Template context for the current host.
pub(crate) fn templater(system: &dyn System, version: &str, os_arch_map: &OsArchMap) -> Templater {
    let os = system.os();
    let arch = system.arch();
    let os_arch = os_arch_key(&os, &arch);
    let os_arch_data = os_arch_map.get(&os_arch).cloned().unwrap_or_default();
    Templater {
        version: version.to_string(),
        os,
        arch,
        os_arch,
        os_arch_data,
    }
}

/// Typed reads over a merged field set.
pub(crate) struct Fields<'a> {
    kind: StrategyType,
    map: &'a Map,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(kind: StrategyType, map: &'a Map) -> Self {
        Self { kind, map }
    }

    /// Scalar field as a string; absent and null read as empty.
    pub(crate) fn string(&self, key: &str) -> Result<String> {
        match self.map.get(key) {
            None | Some(Node::Null) => Ok(String::new()),
            Some(node) => node.scalar_string().ok_or_else(|| invalid(key, "a string")),
        }
    }

    pub(crate) fn required(&self, key: &'static str) -> Result<String> {
        let value = self.string(key)?;
        if value.is_empty() {
            return Err(Error::MissingField {
                strategy: self.kind,
                field: key,
            });
        }
        Ok(value)
    }

    pub(crate) fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.map.get(key) {
            None | Some(Node::Null) => Ok(default),
            Some(Node::Bool(b)) => Ok(*b),
            Some(Node::String(s)) if s == "true" => Ok(true),
            Some(Node::String(s)) if s == "false" => Ok(false),
            Some(_) => Err(invalid(key, "a boolean")),
        }
    }

    /// Whitespace-separated string or list of scalars.
    pub(crate) fn words(&self, key: &str) -> Result<Vec<String>> {
        match self.map.get(key) {
            None | Some(Node::Null) => Ok(Vec::new()),
            Some(Node::String(s)) => Ok(s.split_whitespace().map(str::to_string).collect()),
            Some(Node::List(items)) => items
                .iter()
                .map(|item| item.scalar_string().ok_or_else(|| invalid(key, "a list of strings")))
                .collect(),
            Some(_) => Err(invalid(key, "a string or a list of strings")),
        }
    }

    /// `os_arch_map` as plain strings. A null platform entry reads as empty.
    pub(crate) fn os_arch_map(&self) -> Result<OsArchMap> {
        let table = match self.map.get("os_arch_map") {
            None | Some(Node::Null) => return Ok(OsArchMap::new()),
            Some(Node::Map(table)) => table,
            Some(_) => return Err(invalid("os_arch_map", "a map")),
        };

        let mut out = OsArchMap::new();
        for (os_arch, entry) in table {
            let values = match entry {
                Node::Null => BTreeMap::new(),
                Node::Map(values) => values
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| {
                        v.scalar_string()
                            .map(|s| (k.clone(), s))
                            .ok_or_else(|| invalid(&format!("os_arch_map.{os_arch}.{k}"), "a string"))
                    })
                    .collect::<Result<_>>()?,
                _ => return Err(invalid(&format!("os_arch_map.{os_arch}"), "a map")),
            };
            out.insert(os_arch.clone(), values);
        }
        Ok(out)
    }
}

fn invalid(field: &str, expected: &'static str) -> Error {
    Error::InvalidField {
        field: field.to_string(),
        expected,
    }
}
