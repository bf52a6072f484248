use std::rc::Rc;
use crate::config::{ConfigClient, ConfigGetter};
use crate::download::{DefaultDownloader, Downloader};
use crate::error::Result;
use crate::runner::{DefaultRunner, Runner};
use crate::system::{DefaultSystem, System};

/// Host services handed to the manifest finder and to every strategy.
#[derive(Clone)]
pub struct Capabilities {
    pub system: Rc<dyn System>,
    pub runner: Rc<dyn Runner>,
    pub downloader: Rc<dyn Downloader>,
    pub config: Rc<dyn ConfigGetter>,
}

impl Capabilities {
    /// Real system, real processes, HTTP downloads and on-disk configuration.
    pub fn for_host() -> Result<Self> {
        let system = DefaultSystem;
        let config = ConfigClient::for_host(&system)?;
        Ok(Self {
            system: Rc::new(system),
            runner: Rc::new(DefaultRunner),
            downloader: Rc::new(DefaultDownloader::default()),
            config: Rc::new(config),
        })
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("os", &self.system.os())
            .field("arch", &self.system.arch())
            .finish_non_exhaustive()
    }
}
