use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::Command;
use reqwest::blocking::Client;
use tracing::{debug, info};
use crate::error::{Error, Result};
use crate::runner::{display_command, os_args};

/// Fetches remote artifacts.
pub trait Downloader {
    /// Downloads `url` into the file `dest`.
    fn download_file(&self, url: &str, dest: &Path) -> Result<()>;

    /// Pulls a container image ahead of running it.
    fn pull_docker_image(&self, image: &str) -> Result<()>;
}

/// HTTP downloads through a blocking `reqwest` client.
#[derive(Debug, Default, Clone)]
pub struct DefaultDownloader {
    client: Client,
}

impl Downloader for DefaultDownloader {
    fn download_file(&self, url: &str, dest: &Path) -> Result<()> {
        info!("Downloading {url}");
        let wrap = |source| Error::Download {
            url: url.to_string(),
            source,
        };
        let mut resp = self
            .client
            .get(url)
            .header("User-Agent", "holen")
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(wrap)?;

        let mut out = BufWriter::new(File::create(dest)?);
        let bytes = resp.copy_to(&mut out).map_err(wrap)?;
        out.flush()?;
        debug!(%url, dest = %dest.display(), bytes, "download complete");
        Ok(())
    }

    fn pull_docker_image(&self, image: &str) -> Result<()> {
        info!("Pulling {image}");
        let args = os_args(&["pull", image]);
        let status = Command::new("docker")
            .args(&args)
            .status()
            .map_err(|source| Error::Spawn {
                command: "docker".to_string(),
                source,
            })?;
        if !status.success() {
            return Err(Error::CommandFailed {
                command: display_command("docker", &args),
                code: status.code(),
            });
        }
        Ok(())
    }
}
