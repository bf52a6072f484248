use std::ffi::OsString;
use std::path::Path;
use tracing::debug;
use crate::capabilities::Capabilities;
use crate::error::{Error, Result};
use crate::global::utils::get_tmp_dir;
use crate::runner::{display_command, os_args};
use crate::templater::Templater;
use super::{templater, Fields, OsArchMap};

const DOCKER: &str = "docker";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";
/// Environment variable carrying the resolved image to a bootstrap script.
pub const IMAGE_ENV: &str = "HLN_IMAGE";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DockerData {
    pub name: String,
    pub desc: String,
    pub version: String,
    pub image: String,
    pub mount_pwd: bool,
    pub mount_pwd_as: String,
    pub pwd_workdir: bool,
    pub docker_conn: bool,
    pub interactive: bool,
    pub pid_host: bool,
    pub run_as_user: bool,
    /// `always` allocates a TTY; anything else does not.
    pub terminal: String,
    /// Path of a script inside the image to run on the host instead.
    pub bootstrap_script: String,
    pub command: Vec<String>,
    /// Pull the image before running it.
    pub pull: bool,
    pub os_arch_data: OsArchMap,
}

impl DockerData {
    pub(crate) fn from_fields(name: &str, desc: &str, fields: &Fields<'_>) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            desc: desc.to_string(),
            version: fields.string("version")?,
            image: fields.required("image")?,
            mount_pwd: fields.bool_or("mount_pwd", false)?,
            mount_pwd_as: fields.string("mount_pwd_as")?,
            pwd_workdir: fields.bool_or("pwd_workdir", false)?,
            docker_conn: fields.bool_or("docker_conn", false)?,
            interactive: fields.bool_or("interactive", true)?,
            pid_host: fields.bool_or("pid_host", false)?,
            run_as_user: fields.bool_or("run_as_user", false)?,
            terminal: fields.string("terminal")?,
            bootstrap_script: fields.string("bootstrap_script")?,
            command: fields.words("command")?,
            pull: fields.bool_or("pull", false)?,
            os_arch_data: fields.os_arch_map()?,
        })
    }
}

/// Runs a utility inside a container image.
#[derive(Debug)]
pub struct DockerStrategy {
    pub data: DockerData,
    caps: Capabilities,
}

impl DockerStrategy {
    pub fn new(data: DockerData, caps: Capabilities) -> Self {
        Self { data, caps }
    }

    fn templater(&self) -> Templater {
        templater(self.caps.system.as_ref(), &self.data.version, &self.data.os_arch_data)
    }

    pub fn run(&self, args: &[OsString]) -> Result<()> {
        if !self.caps.runner.check_command(DOCKER, &os_args(&["version"])) {
            return Err(Error::Skip("docker not available".to_string()));
        }

        let templater = self.templater();
        let image = templater.resolve(&self.data.image)?;
        if self.data.pull {
            self.caps.downloader.pull_docker_image(&image)?;
        }

        if !self.data.bootstrap_script.is_empty() {
            return self.run_bootstrap(&image, args);
        }

        let argv = self.run_args(&templater, &image, args)?;
        self.caps.runner.run_command(DOCKER, &argv, &[])
    }

    pub fn inspect(&self) -> Result<String> {
        let templater = self.templater();
        let image = templater.resolve(&self.data.image)?;
        let mut out = format!("docker {}\n  image: {image}\n", self.data.version);
        if self.data.bootstrap_script.is_empty() {
            let argv = self.run_args(&templater, &image, &[])?;
            out.push_str(&format!("  command: {}\n", display_command(DOCKER, &argv)));
        } else {
            out.push_str(&format!("  bootstrap: {}\n", self.data.bootstrap_script));
        }
        Ok(out)
    }

    /// Full `docker` argument vector in its fixed order.
    fn run_args(&self, templater: &Templater, image: &str, args: &[OsString]) -> Result<Vec<OsString>> {
        let data = &self.data;
        let mut argv = vec!["run".to_string()];

        if data.interactive {
            argv.push("-i".to_string());
        }
        if data.docker_conn {
            argv.push("-v".to_string());
            argv.push(format!("{DOCKER_SOCKET}:{DOCKER_SOCKET}"));
        }
        if data.pid_host {
            argv.push("--pid".to_string());
            argv.push("host".to_string());
        }

        if !data.mount_pwd_as.is_empty() || data.mount_pwd {
            let pwd = self.caps.system.current_dir()?;
            let pwd = pwd.display();
            if !data.mount_pwd_as.is_empty() {
                let target = templater.resolve(&data.mount_pwd_as)?;
                argv.push("--volume".to_string());
                argv.push(format!("{pwd}:{target}"));
                if data.pwd_workdir {
                    argv.push("--workdir".to_string());
                    argv.push(target);
                }
            }
            if data.mount_pwd {
                argv.push("--volume".to_string());
                argv.push(format!("{pwd}:{pwd}"));
                if data.pwd_workdir {
                    argv.push("--workdir".to_string());
                    argv.push(pwd.to_string());
                }
            }
        }

        if data.run_as_user {
            argv.push("-u".to_string());
            argv.push(format!("{}:{}", self.caps.system.uid(), self.caps.system.gid()));
        }
        if data.terminal == "always" {
            argv.push("-t".to_string());
        }
        argv.push("--rm".to_string());
        argv.push(image.to_string());

        for token in &data.command {
            argv.push(templater.resolve(token)?);
        }
        let mut argv: Vec<OsString> = argv.into_iter().map(OsString::from).collect();
        argv.extend(args.iter().cloned());
        Ok(argv)
    }

    /// Copies the bootstrap script out of the image and runs it on the host
    /// with the image name in the environment.
    fn run_bootstrap(&self, image: &str, args: &[OsString]) -> Result<()> {
        let tmp_root = get_tmp_dir(self.caps.system.as_ref(), self.caps.config.as_ref())?;
        std::fs::create_dir_all(&tmp_root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}--bootstrap", self.data.name))
            .tempdir_in(&tmp_root)?;

        let script_name = Path::new(&self.data.bootstrap_script)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bootstrap".to_string());
        let script = dir.path().join(script_name);

        let cat = os_args(&[
            "run",
            "--rm",
            "--entrypoint",
            "cat",
            image,
            self.data.bootstrap_script.as_str(),
        ]);
        self.caps.runner.run_command_to_file(DOCKER, &cat, &script)?;
        self.caps.system.make_executable(&script)?;

        debug!(script = %script.display(), %image, "running bootstrap script");
        let env = [(IMAGE_ENV.to_string(), image.to_string())];
        self.caps
            .runner
            .run_command(&script.to_string_lossy(), args, &env)
    }
}
