use std::ffi::OsString;
use crate::capabilities::Capabilities;
use crate::error::Result;
use crate::runner::{display_command, os_args};
use super::{templater, Fields, OsArchMap};

/// Remote execution endpoint reached over ssh.
pub const CMDIO_HOST: &str = "alpha.cmd.io";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdioData {
    pub name: String,
    pub desc: String,
    pub version: String,
    pub command: String,
    pub os_arch_data: OsArchMap,
}

impl CmdioData {
    pub(crate) fn from_fields(name: &str, desc: &str, fields: &Fields<'_>) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            desc: desc.to_string(),
            version: fields.string("version")?,
            command: fields.required("command")?,
            os_arch_data: fields.os_arch_map()?,
        })
    }
}

/// Runs a utility on the remote command endpoint.
#[derive(Debug)]
pub struct CmdioStrategy {
    pub data: CmdioData,
    caps: Capabilities,
}

impl CmdioStrategy {
    pub fn new(data: CmdioData, caps: Capabilities) -> Self {
        Self { data, caps }
    }

    fn ssh_args(&self, args: &[OsString]) -> Result<Vec<OsString>> {
        let templater = templater(self.caps.system.as_ref(), &self.data.version, &self.data.os_arch_data);
        let command = templater.resolve(&self.data.command)?;

        let mut argv = os_args(&["-t", CMDIO_HOST]);
        argv.extend(command.split_whitespace().map(OsString::from));
        argv.extend(args.iter().cloned());
        Ok(argv)
    }

    pub fn run(&self, args: &[OsString]) -> Result<()> {
        let argv = self.ssh_args(args)?;
        self.caps.runner.run_command("ssh", &argv, &[])
    }

    pub fn inspect(&self) -> Result<String> {
        let argv = self.ssh_args(&[])?;
        Ok(format!(
            "cmdio {}\n  command: {}\n",
            self.data.version,
            display_command("ssh", &argv)
        ))
    }
}
