//! Remote execution backends
//!
//! This module provides:
//! - [`Remote`]: the primitives every operation is built from
//!   (execute a shell command, upload, download, existence check)
//! - [`SshRemote`]: runs against a host through the system `ssh` and `scp`
//! - [`LocalRemote`]: runs against the local machine
//! - [`RecordingRemote`]: records operations without touching any host

mod local;
mod recording;
mod ssh;

use camino::Utf8Path;

use crate::Result;
use crate::command::quote;

pub use local::LocalRemote;
pub use recording::{RecordingRemote, RemoteOp};
pub use ssh::{SshRemote, SshTarget, parse_ssh_target};

/// Captured result of a command that reached the target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if killed by a signal
    pub code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the command exited with status 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Remote execution primitives
///
/// Implementations report a command that ran but exited non-zero through
/// [`CommandOutput`]; `Err` is reserved for failures to reach the target.
pub trait Remote {
    /// Run a shell command on the target
    fn execute(&self, command: &str) -> Result<CommandOutput>;

    /// Copy a local file to `remote_path`, overwriting it
    fn upload(&self, local_path: &Utf8Path, remote_path: &str) -> Result<()>;

    /// Copy `remote_path` to a local file
    fn download(&self, remote_path: &str, local_path: &Utf8Path) -> Result<()>;

    /// Check whether a remote path exists
    fn exists(&self, path: &str) -> Result<bool> {
        let output = self.execute(&format!("test -e {}", quote(path)?))?;
        Ok(output.success())
    }

    /// Label used in log lines
    fn label(&self) -> String;
}
