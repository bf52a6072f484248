//! Utility manifests and the strategy dispatch loop.
//!
//! A manifest is a YAML document per utility:
//!
//! ```yaml
//! desc: Command-line JSON processor
//! strategies:
//!   docker:
//!     image: "stedolan/jq:{{.Version}}"
//!     mount_pwd: true
//!     versions:
//!       - version: "1.6"
//!       - version: "1.5"
//!   binary:
//!     base_url: "https://github.com/stedolan/jq/releases/download/jq-{{.Version}}/jq-{{.OSArchData.ext}}"
//!     os_arch_map:
//!       linux_amd64: { ext: linux64 }
//!     versions:
//!       - version: "1.6"
//!         os_arch_map:
//!           linux_amd64: { sha256sum: "af986793..." }
//! ```
//!
//! For each strategy type the selected version entry is deep-merged over the
//! common fields (see [`crate::node::merge`]) to give the field set the
//! strategy is built from.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use crate::capabilities::Capabilities;
use crate::error::{Error, Result};
use crate::node::{merge, Map, Node};
use crate::order::strategy_order;
use crate::strategy::Strategy;

/// Utility identity for one invocation. An empty version means the first
/// version listed in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameVer {
    pub name: String,
    pub version: String,
}

impl NameVer {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
        }
    }

    /// Splits `name--version`; without `--` the version is empty.
    pub fn parse(utility: &str) -> Self {
        match utility.split_once("--") {
            Some((name, version)) => Self::new(name, version),
            None => Self::new(utility, ""),
        }
    }
}

impl fmt::Display for NameVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}--{}", self.name, self.version)
        }
    }
}

/// Mechanism for running a utility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StrategyType {
    /// Run inside a container image.
    Docker,
    /// Download a platform binary into the local cache and run it.
    Binary,
    /// Run on the remote command endpoint over ssh.
    Cmdio,
}

impl StrategyType {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyType::Docker => "docker",
            StrategyType::Binary => "binary",
            StrategyType::Cmdio => "cmdio",
        }
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown strategy type '{0}'")]
pub struct UnknownStrategy(pub String);

impl FromStr for StrategyType {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "docker" | "container" => Ok(StrategyType::Docker),
            "binary" | "binary-cache" => Ok(StrategyType::Binary),
            "cmdio" | "remote-command" => Ok(StrategyType::Cmdio),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

/// One strategy document: common fields plus the version list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStrategy {
    /// Fields shared by every version, with `versions` removed.
    pub common: Map,
    /// Version entries in manifest order; never empty.
    pub versions: Vec<Map>,
}

impl RawStrategy {
    fn from_node(utility: &str, kind: StrategyType, node: Node) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidManifest {
            name: utility.to_string(),
            reason,
        };
        let Node::Map(mut common) = node else {
            return Err(invalid(format!("strategy {kind} must be a map")));
        };
        let versions = match common.remove("versions") {
            Some(Node::List(items)) if !items.is_empty() => items,
            _ => return Err(invalid(format!("strategy {kind} needs a non-empty 'versions' list"))),
        };

        let mut entries = Vec::with_capacity(versions.len());
        for item in versions {
            match item {
                Node::Map(entry) => {
                    match entry.get("version") {
                        Some(Node::String(_)) => {}
                        Some(Node::Number(number)) => {
                            return Err(invalid(format!(
                                "{kind} version {number} must be quoted, e.g. version: \"{number}\""
                            )));
                        }
                        _ => {
                            return Err(invalid(format!(
                                "every {kind} version entry needs a 'version' string"
                            )));
                        }
                    }
                    entries.push(entry);
                }
                _ => {
                    return Err(invalid(format!(
                        "every {kind} version entry needs a 'version' string"
                    )));
                }
            }
        }

        Ok(Self {
            common,
            versions: entries,
        })
    }

    /// The entry whose `version` equals `version`, or the first entry when
    /// `version` is empty.
    pub fn select_version(&self, version: &str) -> Option<&Map> {
        if version.is_empty() {
            return self.versions.first();
        }
        self.versions
            .iter()
            .find(|entry| entry.get("version").and_then(Node::as_str) == Some(version))
    }

    /// Common fields with `entry` merged over them.
    pub fn descriptor(&self, entry: &Map) -> Map {
        merge(&self.common, entry)
    }

    pub fn version_names(&self) -> impl Iterator<Item = &str> {
        self.versions
            .iter()
            .filter_map(|entry| entry.get("version").and_then(Node::as_str))
    }
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    strategies: BTreeMap<String, Node>,
}

/// Parsed manifest contents; read-only for the rest of the invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestData {
    pub name: String,
    pub desc: String,
    pub strategies: BTreeMap<StrategyType, RawStrategy>,
}

impl ManifestData {
    /// Parses YAML manifest text for the utility `name`.
    pub fn from_yaml(name: &str, content: &str) -> Result<Self> {
        let raw: RawManifest = serde_yaml::from_str(content).map_err(|e| Error::InvalidManifest {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_raw(name, raw)
    }

    /// Reads and parses the manifest file at `path`.
    pub fn load<P: AsRef<Path>>(name: &str, path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading manifest");
        let content = std::fs::read_to_string(path)?;
        let raw: RawManifest = serde_yaml::from_str(&content).map_err(|source| Error::ManifestParse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_raw(name, raw)
    }

    fn from_raw(name: &str, raw: RawManifest) -> Result<Self> {
        let mut strategies = BTreeMap::new();
        for (key, node) in raw.strategies {
            match key.parse::<StrategyType>() {
                Ok(kind) => {
                    strategies.insert(kind, RawStrategy::from_node(name, kind, node)?);
                }
                Err(err) => warn!(utility = %name, "{err}, ignoring"),
            }
        }
        Ok(Self {
            name: name.to_string(),
            desc: raw.desc.unwrap_or_default(),
            strategies,
        })
    }
}

/// A manifest bound to the host capabilities it will run with.
#[derive(Debug)]
pub struct Manifest {
    pub data: ManifestData,
    caps: Capabilities,
}

impl Manifest {
    pub fn new(data: ManifestData, caps: Capabilities) -> Self {
        Self { data, caps }
    }

    pub fn strategy_order(&self, utility: &NameVer) -> Vec<StrategyType> {
        strategy_order(self.caps.config.as_ref(), utility)
    }

    /// Builds one strategy per type in priority order, for the requested
    /// version. Types the manifest does not define are left out; so are types
    /// that lack the requested version.
    pub fn load_strategies(&self, utility: &NameVer) -> Result<Vec<Strategy>> {
        let mut strategies = Vec::new();
        let mut version_missing = false;

        for kind in self.strategy_order(utility) {
            let Some(raw) = self.data.strategies.get(&kind) else {
                continue;
            };
            let Some(entry) = raw.select_version(&utility.version) else {
                debug!(strategy = %kind, version = %utility.version, "strategy does not have version");
                version_missing = true;
                continue;
            };
            strategies.push(self.build(kind, raw, entry)?);
        }

        if strategies.is_empty() && version_missing {
            return Err(Error::VersionNotFound {
                name: utility.name.clone(),
                version: utility.version.clone(),
            });
        }
        debug!(count = strategies.len(), "strategies loaded");
        Ok(strategies)
    }

    /// Builds a strategy for every defined (type, version) pair, priority-ordered
    /// types first. A non-empty `utility.version` restricts to that version.
    pub fn load_all_strategies(&self, utility: &NameVer) -> Result<Vec<Strategy>> {
        let mut kinds = self.strategy_order(utility);
        for kind in self.data.strategies.keys() {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }

        let mut strategies = Vec::new();
        for kind in kinds {
            let Some(raw) = self.data.strategies.get(&kind) else {
                continue;
            };
            for entry in &raw.versions {
                let matches = utility.version.is_empty()
                    || entry.get("version").and_then(Node::as_str) == Some(utility.version.as_str());
                if matches {
                    strategies.push(self.build(kind, raw, entry)?);
                }
            }
        }
        Ok(strategies)
    }

    /// Tries each strategy in order until one succeeds. Skips move on to the
    /// next strategy; any other failure ends the attempt.
    pub fn run(&self, utility: &NameVer, args: &[OsString]) -> Result<()> {
        let strategies = self.load_strategies(utility)?;
        for strategy in &strategies {
            debug!(strategy = %strategy.kind(), version = strategy.version(), "trying strategy");
            match strategy.run(args) {
                Ok(()) => return Ok(()),
                Err(err) if err.is_skip() => {
                    debug!(strategy = %strategy.kind(), reason = %err, "skipping strategy");
                }
                Err(err) => return Err(err),
            }
        }
        Err(Error::NoUsableStrategy(utility.to_string()))
    }

    fn build(&self, kind: StrategyType, raw: &RawStrategy, entry: &Map) -> Result<Strategy> {
        let fields = raw.descriptor(entry);
        Strategy::build(kind, &self.data.name, &self.data.desc, &fields, self.caps.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::os_args;
    use crate::testutil::TestUtils;

    const JQ: &str = r#"
desc: Command-line JSON processor
strategies:
  docker:
    image: "jess/jq:{{.Version}}"
    mount_pwd: true
    versions:
      - version: "1.6"
      - version: "1.5"
  binary:
    base_url: "https://github.com/stedolan/jq/releases/download/jq-{{.Version}}/jq-{{.OSArchData.ext}}"
    os_arch_map:
      linux_amd64:
        ext: linux64
      darwin_amd64:
        ext: osx-amd64
      windows_amd64:
        ext: win64.exe
    versions:
      - version: "1.6"
        os_arch_map:
          linux_amd64:
            ext: linux-x86_64
            md5sum: cdcdcdcd
      - version: "1.5"
        os_arch_map:
          windows_amd64:
            md5sum: abababab
"#;

    fn manifest(tu: &TestUtils) -> Manifest {
        Manifest::new(ManifestData::from_yaml("jq", JQ).unwrap(), tu.capabilities())
    }

    #[test]
    fn test_parse_name() {
        assert_eq!(NameVer::parse("jq"), NameVer::new("jq", ""));
        assert_eq!(NameVer::parse("jq--1.6"), NameVer::new("jq", "1.6"));
        assert_eq!(NameVer::parse("jq--1.6").to_string(), "jq--1.6");
    }

    #[test]
    fn test_strategy_type_aliases() {
        assert_eq!("container".parse::<StrategyType>().unwrap(), StrategyType::Docker);
        assert_eq!("binary-cache".parse::<StrategyType>().unwrap(), StrategyType::Binary);
        assert_eq!("remote-command".parse::<StrategyType>().unwrap(), StrategyType::Cmdio);
        assert!("bogus".parse::<StrategyType>().is_err());
    }

    #[test]
    fn test_parse_manifest() {
        let data = ManifestData::from_yaml("jq", JQ).unwrap();
        assert_eq!(data.desc, "Command-line JSON processor");
        assert_eq!(data.strategies.len(), 2);
        let docker = &data.strategies[&StrategyType::Docker];
        assert!(!docker.common.contains_key("versions"));
        assert_eq!(docker.version_names().collect::<Vec<_>>(), vec!["1.6", "1.5"]);
    }

    #[test]
    fn test_versions_required() {
        let err = ManifestData::from_yaml("x", "strategies:\n  docker:\n    image: x\n").unwrap_err();
        assert!(matches!(err, Error::InvalidManifest { .. }));
        let err = ManifestData::from_yaml("x", "strategies:\n  docker:\n    image: x\n    versions: []\n").unwrap_err();
        assert!(matches!(err, Error::InvalidManifest { .. }));
    }

    #[test]
    fn test_unquoted_version_is_rejected() {
        for (version, shown) in [("2.0", "2"), ("1.10", "1.1"), ("3", "3")] {
            let yaml = format!("strategies:\n  docker:\n    image: x\n    versions:\n      - version: {version}\n");
            let err = ManifestData::from_yaml("x", &yaml).unwrap_err();
            assert!(matches!(err, Error::InvalidManifest { .. }));
            assert!(
                err.to_string().contains(&format!("version {shown} must be quoted")),
                "{err}"
            );
        }

        let yaml = "strategies:\n  docker:\n    image: x\n    versions:\n      - version: \"1.10\"\n      - version: '2.0'\n";
        let data = ManifestData::from_yaml("x", yaml).unwrap();
        let docker = &data.strategies[&StrategyType::Docker];
        assert_eq!(docker.version_names().collect::<Vec<_>>(), vec!["1.10", "2.0"]);
        assert!(docker.select_version("1.1").is_none());
        assert!(docker.select_version("2.0").is_some());
    }

    #[test]
    fn test_select_version() {
        let data = ManifestData::from_yaml("jq", JQ).unwrap();
        let binary = &data.strategies[&StrategyType::Binary];
        assert_eq!(binary.select_version("").unwrap()["version"], Node::from("1.6"));
        assert_eq!(binary.select_version("1.5").unwrap()["version"], Node::from("1.5"));
        assert!(binary.select_version("9.9").is_none());
    }

    #[test]
    fn test_load_strategies_follows_order() {
        let tu = TestUtils::new();
        tu.config.set("strategy.priority", "binary");
        let strategies = manifest(&tu).load_strategies(&NameVer::parse("jq")).unwrap();
        let kinds: Vec<_> = strategies.iter().map(Strategy::kind).collect();
        assert_eq!(kinds, vec![StrategyType::Binary, StrategyType::Docker]);
        assert!(strategies.iter().all(|s| s.version() == "1.6"));
    }

    #[test]
    fn test_unknown_version_is_an_error() {
        let tu = TestUtils::new();
        let err = manifest(&tu).load_strategies(&NameVer::parse("jq--9.9")).unwrap_err();
        assert!(matches!(err, Error::VersionNotFound { .. }));
        assert!(err.to_string().contains("version 9.9 not found"));
    }

    #[test]
    fn test_load_all_strategies_merges_os_arch_per_version() {
        let tu = TestUtils::new();
        let all = manifest(&tu).load_all_strategies(&NameVer::parse("jq")).unwrap();
        assert_eq!(all.len(), 4);

        let binaries: Vec<_> = all
            .iter()
            .filter_map(|s| match s {
                Strategy::Binary(b) => Some(b),
                _ => None,
            })
            .collect();
        assert_eq!(binaries.len(), 2);
        let v16 = &binaries[0].data.os_arch_data;
        let v15 = &binaries[1].data.os_arch_data;
        assert_eq!(v16["linux_amd64"]["ext"], "linux-x86_64");
        assert_eq!(v16["linux_amd64"]["md5sum"], "cdcdcdcd");
        assert_eq!(v16["darwin_amd64"]["ext"], "osx-amd64");
        assert_eq!(v15["linux_amd64"]["ext"], "linux64");
        assert!(!v15["linux_amd64"].contains_key("md5sum"));
        assert_eq!(v15["windows_amd64"]["md5sum"], "abababab");
    }

    #[test]
    fn test_no_usable_strategy() {
        let tu = TestUtils::new();
        tu.config.set("strategy.xpriority", "cmdio");
        let err = manifest(&tu).run(&NameVer::parse("jq"), &[]).unwrap_err();
        assert!(matches!(err, Error::NoUsableStrategy(_)));
    }

    #[test]
    fn test_docker_skip_falls_back_to_binary() {
        let tu = TestUtils::new();
        tu.runner.fail_check("docker version");
        tu.downloader.serve(
            "https://github.com/stedolan/jq/releases/download/jq-1.6/jq-linux-x86_64",
            b"jq binary",
        );
        let checksum = crate::hash::hash_file(crate::hash::HashAlgo::Md5, &tu.write_scratch("jq binary")).unwrap();
        let data = ManifestData::from_yaml("jq", &JQ.replace("cdcdcdcd", &format!("'{checksum}'"))).unwrap();

        Manifest::new(data, tu.capabilities())
            .run(&NameVer::parse("jq"), &os_args(&["."]))
            .unwrap();

        let bin = tu.data_dir().join("bin").join("jq--1.6");
        assert_eq!(tu.runner.history(), vec![format!("{} .", bin.display())]);
        assert_eq!(std::fs::read(&bin).unwrap(), b"jq binary");
    }

    #[test]
    fn test_later_template_error_does_not_mask_success() {
        let tu = TestUtils::new();
        let yaml = JQ.replace(
            "https://github.com/stedolan/jq/releases/download/jq-{{.Version}}/jq-{{.OSArchData.ext}}",
            "https://example.com/jq-{{.Nope}}",
        );
        let manifest = Manifest::new(ManifestData::from_yaml("jq", &yaml).unwrap(), tu.capabilities());

        manifest.run(&NameVer::parse("jq"), &os_args(&["."])).unwrap();
        assert_eq!(
            tu.runner.history(),
            vec!["docker run -i --volume /work:/work --rm jess/jq:1.6 ."]
        );

        tu.runner.fail_check("docker version");
        let err = manifest.run(&NameVer::parse("jq"), &[]).unwrap_err();
        assert!(matches!(err, Error::Template(_)));
        assert!(tu.downloader.downloads().is_empty());
    }

    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Runs the docker-to-binary fallback and returns what was logged at `level`.
    fn fallback_logs(level: tracing::Level) -> String {
        let tu = TestUtils::new();
        tu.runner.fail_check("docker version");
        let cached = tu.data_dir().join("bin").join("jq--1.6");
        std::fs::create_dir_all(cached.parent().unwrap()).unwrap();
        std::fs::write(&cached, "jq").unwrap();

        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            manifest(&tu).run(&NameVer::parse("jq"), &[]).unwrap();
        });
        let out = logs.0.lock().unwrap().clone();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_skip_is_logged_at_debug_only() {
        assert!(!fallback_logs(tracing::Level::INFO).contains("skipping strategy"));
        assert!(fallback_logs(tracing::Level::DEBUG).contains("skipping strategy"));
    }

    #[test]
    fn test_hard_failure_stops_dispatch() {
        let tu = TestUtils::new();
        tu.runner.fail_command("docker run -i --volume /work:/work --rm jess/jq:1.6 .", 2);
        let err = manifest(&tu)
            .run(&NameVer::parse("jq"), &os_args(&["."]))
            .unwrap_err();
        assert_eq!(err.child_exit_code(), Some(2));
        assert_eq!(tu.downloader.downloads().len(), 0);
    }
}
