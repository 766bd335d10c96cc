//! SSH backend
//!
//! Drives the system `ssh` and `scp` binaries, so agent forwarding, known
//! hosts and `~/.ssh/config` behave exactly as they do for the operator.

use std::fmt;
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};

use super::{CommandOutput, Remote};
use crate::command::quote;
use crate::config::SshConfig;
use crate::{Error, Result};

/// Exit status ssh uses for its own (connection) errors
const SSH_CONNECTION_ERROR: i32 = 255;

/// A parsed `[user@]host[:port]` target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
}

impl SshTarget {
    /// `user@host` or `host`, as ssh expects it
    pub fn destination(&self) -> String {
        match self.user {
            Some(ref user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }
}

impl fmt::Display for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.destination())?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

/// Parse SSH target string into user, host and optional port
///
/// Supports formats:
/// - "host" -> (None, "host", None)
/// - "user@host" -> (Some("user"), "host", None)
/// - "user@host:port" -> (Some("user"), "host", Some(port))
///
/// A suffix that is not a valid port is kept as part of the host.
pub fn parse_ssh_target(target: &str) -> SshTarget {
    let (user, rest) = match target.split_once('@') {
        Some((user, rest)) if !user.is_empty() => (Some(user.to_string()), rest),
        _ => (None, target),
    };

    if let Some((host, port_str)) = rest.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return SshTarget {
                user,
                host: host.to_string(),
                port: Some(port),
            };
        }
    }

    SshTarget {
        user,
        host: rest.to_string(),
        port: None,
    }
}

/// Backend that reaches a host over ssh/scp
#[derive(Debug, Clone)]
pub struct SshRemote {
    target: SshTarget,
    identity_file: Option<Utf8PathBuf>,
    options: Vec<String>,
}

impl SshRemote {
    /// Create a backend for `host` with default settings
    pub fn new(host: &str) -> Self {
        Self::with_config(host, &SshConfig::default())
    }

    /// Create a backend for `host`, filling gaps from the `[ssh]` settings
    pub fn with_config(host: &str, config: &SshConfig) -> Self {
        let mut target = parse_ssh_target(host);
        if target.user.is_none() {
            target.user = config.user.clone();
        }
        if target.port.is_none() {
            target.port = config.port;
        }

        Self {
            target,
            identity_file: config.identity_file.clone(),
            options: config.options.clone(),
        }
    }

    /// The resolved target
    pub fn target(&self) -> &SshTarget {
        &self.target
    }

    /// Build the ssh invocation for a remote command
    pub fn ssh_command(&self, command: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.args(["-o", "BatchMode=yes"]);
        if let Some(port) = self.target.port {
            cmd.args(["-p", &port.to_string()]);
        }
        self.push_common_args(&mut cmd);
        cmd.arg(self.target.destination());
        cmd.arg(command);
        cmd
    }

    /// Build the scp invocation copying `from` to `to`
    pub fn scp_command(&self, from: &str, to: &str) -> Command {
        let mut cmd = Command::new("scp");
        cmd.args(["-B", "-q"]);
        if let Some(port) = self.target.port {
            cmd.args(["-P", &port.to_string()]);
        }
        self.push_common_args(&mut cmd);
        cmd.args([from, to]);
        cmd
    }

    fn push_common_args(&self, cmd: &mut Command) {
        if let Some(ref identity) = self.identity_file {
            cmd.args(["-i", identity.as_str()]);
        }
        for option in &self.options {
            cmd.args(["-o", option]);
        }
    }

    fn remote_spec(&self, path: &str) -> Result<String> {
        Ok(format!("{}:{}", self.target.destination(), quote(path)?))
    }

    fn run_scp(&self, mut cmd: Command, what: &str) -> Result<()> {
        tracing::debug!(host = %self.target, "Running: {:?}", cmd);

        let output = cmd.output().map_err(|e| {
            Error::transport(
                format!("Failed to start scp: {}", e),
                "Ensure OpenSSH is installed and scp is in PATH",
            )
        })?;

        if !output.status.success() {
            return Err(Error::transport(
                format!(
                    "{} on {} failed with exit code {:?}: {}",
                    what,
                    self.target,
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
                "Check SSH connectivity and remote permissions",
            ));
        }

        Ok(())
    }
}

impl Remote for SshRemote {
    fn execute(&self, command: &str) -> Result<CommandOutput> {
        let mut cmd = self.ssh_command(command);
        tracing::debug!(host = %self.target, "Running: {}", command);

        let output: CommandOutput = cmd
            .output()
            .map_err(|e| {
                Error::transport(
                    format!("Failed to start ssh: {}", e),
                    "Ensure OpenSSH is installed and ssh is in PATH",
                )
            })?
            .into();

        if output.code == Some(SSH_CONNECTION_ERROR) {
            return Err(Error::transport(
                format!("ssh to {} failed: {}", self.target, output.stderr.trim()),
                "Check SSH connectivity, keys and host key verification",
            ));
        }

        Ok(output)
    }

    fn upload(&self, local_path: &Utf8Path, remote_path: &str) -> Result<()> {
        let cmd = self.scp_command(local_path.as_str(), &self.remote_spec(remote_path)?);
        self.run_scp(cmd, &format!("Upload of {} to {}", local_path, remote_path))
    }

    fn download(&self, remote_path: &str, local_path: &Utf8Path) -> Result<()> {
        let cmd = self.scp_command(&self.remote_spec(remote_path)?, local_path.as_str());
        self.run_scp(cmd, &format!("Download of {} to {}", remote_path, local_path))
    }

    fn label(&self) -> String {
        self.target.to_string()
    }
}
