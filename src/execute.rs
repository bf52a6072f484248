use std::ffi::OsString;
use std::path::PathBuf;
use anyhow::{bail, Context, Result};
use holen::capabilities::Capabilities;
use holen::config::{ConfigClient, ConfigGetter};
use holen::finder::ManifestFinder;
use holen::global::cache::{clean_cache, remove_cached_binaries};
use holen::global::utils::get_bin_dir;
use holen::manifest::NameVer;
use holen::shims::{link_all, link_manifests, AliasLinker, FileLinker, LinkKind, Linker, ScriptLinker};
use holen::source::SourceManager;
use holen::system::DefaultSystem;
use crate::cli::{HolenCommand, SourceCommand, CLI};

pub fn execute(cli: CLI) -> Result<()> {
    match cli.command {
        HolenCommand::Run { version, name, args } => {
            execute_run(&name, version, args)
        }
        HolenCommand::Inspect { manifest, version, name } => {
            execute_inspect(&name, version, manifest)
        }
        HolenCommand::List => {
            execute_list()
        }
        HolenCommand::Link { bin_path, manifest_path, all, holen_path, kind } => {
            execute_link(bin_path, manifest_path, all, holen_path, kind)
        }
        HolenCommand::Config { system, unset, list, key, value } => {
            execute_config(system, unset, list, key, value)
        }
        HolenCommand::Clean { name } => {
            execute_clean(name)
        }
        HolenCommand::Source { command } => {
            execute_source(command)
        }
    }
}

fn finder() -> Result<ManifestFinder> {
    let caps = Capabilities::for_host().context("Could not load configuration")?;
    let self_path = std::env::current_exe().context("Could not locate the holen executable")?;
    Ok(ManifestFinder::new(self_path, caps))
}

/// `name` may carry its version as `name--version`; `--ver` wins over that.
fn name_ver(name: &str, version: Option<String>) -> NameVer {
    let mut utility = NameVer::parse(name);
    if let Some(version) = version {
        utility.version = version;
    }
    utility
}

pub fn execute_run(name: &str, version: Option<String>, args: Vec<OsString>) -> Result<()> {
    let utility = name_ver(name, version);
    let finder = finder()?;
    let manifest = finder.find(&utility)?;
    manifest.run(&utility, &args)?;
    Ok(())
}

pub fn execute_inspect(name: &str, version: Option<String>, manifest: Option<PathBuf>) -> Result<()> {
    let utility = name_ver(name, version);
    let finder = finder()?;
    let manifest = match manifest {
        Some(path) => finder
            .load(&utility.name, &path)
            .with_context(|| format!("Could not load manifest {:?}", path))?,
        None => finder.find(&utility)?,
    };

    println!("{}", manifest.data.name);
    if !manifest.data.desc.is_empty() {
        println!("  {}", manifest.data.desc);
    }
    let order = manifest.strategy_order(&utility);
    println!(
        "order: {}",
        order.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
    );
    for strategy in manifest.load_all_strategies(&utility)? {
        print!("{}", strategy.inspect()?);
    }
    Ok(())
}

pub fn execute_list() -> Result<()> {
    for name in finder()?.list()? {
        println!("{name}");
    }
    Ok(())
}

pub fn execute_link(
    bin_path: PathBuf,
    manifest_path: Option<PathBuf>,
    all: bool,
    holen_path: Option<PathBuf>,
    kind: LinkKind,
) -> Result<()> {
    let finder = finder()?;
    let bin_path = std::path::absolute(&bin_path)
        .with_context(|| format!("Invalid bin path {:?}", bin_path))?;
    let target = match holen_path {
        Some(path) => std::path::absolute(path)?,
        None => finder.self_path().to_path_buf(),
    };
    if kind != LinkKind::Alias && !bin_path.is_dir() {
        bail!("bin path {:?} does not exist", bin_path);
    }

    let linker: Box<dyn Linker> = match kind {
        LinkKind::Symlink => Box::new(FileLinker { target, bin_path }),
        LinkKind::Script => Box::new(ScriptLinker { bin_path }),
        LinkKind::Alias => Box::new(AliasLinker::new(std::io::stdout())),
    };

    let linked = match (all, manifest_path) {
        (true, _) => link_all(&finder, linker.as_ref())?,
        (false, Some(dir)) => link_manifests(&finder, &dir, linker.as_ref())?,
        (false, None) => bail!("either --all or --manifest-path is required"),
    };
    tracing::debug!(count = linked.len(), "utilities linked");
    Ok(())
}

pub fn execute_config(
    system: bool,
    unset: bool,
    list: bool,
    key: Option<String>,
    value: Option<String>,
) -> Result<()> {
    let mut config = ConfigClient::for_host(&DefaultSystem).context("Could not load configuration")?;
    match (key, value) {
        (Some(key), _) if unset => {
            config.unset(system, &key)?;
        }
        (Some(key), Some(value)) => {
            config.set(system, &key, &value)?;
        }
        (Some(key), None) if !list => match config.get(&key) {
            Some(value) => println!("{value}"),
            None => bail!("config key {key} is not set"),
        },
        _ => {
            for (key, value) in config.get_all() {
                println!("{key} = {value}");
            }
        }
    }
    Ok(())
}

pub fn execute_clean(name: Option<String>) -> Result<()> {
    let caps = Capabilities::for_host().context("Could not load configuration")?;
    let bin_dir = get_bin_dir(caps.system.as_ref(), caps.config.as_ref())?;
    match name {
        Some(name) => {
            let removed = remove_cached_binaries(&bin_dir, &name)?;
            println!("Removed {removed} cached binaries for {name}");
        }
        None => {
            clean_cache(&bin_dir)?;
            println!("Cleaned {}", bin_dir.display());
        }
    }
    Ok(())
}

pub fn execute_source(command: SourceCommand) -> Result<()> {
    let caps = Capabilities::for_host().context("Could not load configuration")?;
    let config = ConfigClient::for_host(caps.system.as_ref()).context("Could not load configuration")?;
    let mut sources = SourceManager::new(config, caps);
    match command {
        SourceCommand::Add { system, name, spec } => {
            sources.add(system, &name, &spec)?;
        }
        SourceCommand::List => {
            for source in sources.list().values() {
                println!("{}: {} ({})", source.name, source.spec, source.info());
            }
        }
        SourceCommand::Update { name } => {
            sources
                .update(name.as_deref())
                .context("Could not update sources")?;
        }
        SourceCommand::Delete { system, name } => {
            sources.delete(system, &name)?;
        }
        SourceCommand::Show { path, spec, name } => {
            if path {
                println!("{}", sources.path(&name)?.display());
            } else if spec {
                println!("{}", sources.get(&name)?.spec);
            } else {
                bail!("please specify -p/--path or -s/--spec");
            }
        }
    }
    Ok(())
}
