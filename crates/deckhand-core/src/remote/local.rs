//! Local backend
//!
//! Runs commands with `bash -c` on this machine and copies files with the
//! filesystem. Used for the local half of tasks (git, packaging, the AWS
//! CLI) and for mirroring into a local directory.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};

use super::{CommandOutput, Remote};
use crate::{Error, Result};

/// Backend that executes on the local machine
#[derive(Debug, Clone, Default)]
pub struct LocalRemote {
    workdir: Option<Utf8PathBuf>,
}

impl LocalRemote {
    /// Run in the current working directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Run commands with `dir` as working directory
    pub fn in_dir(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            workdir: Some(dir.into()),
        }
    }

    fn resolve(&self, path: &str) -> Utf8PathBuf {
        match self.workdir {
            Some(ref dir) if !path.starts_with('/') => dir.join(path),
            _ => Utf8PathBuf::from(path),
        }
    }
}

impl Remote for LocalRemote {
    fn execute(&self, command: &str) -> Result<CommandOutput> {
        let mut cmd = Command::new("bash");
        cmd.args(["-c", command]);
        if let Some(ref dir) = self.workdir {
            cmd.current_dir(dir);
        }

        tracing::debug!("Running locally: {}", command);

        let output = cmd.output().map_err(|e| {
            Error::transport(
                format!("Failed to start bash: {}", e),
                "Ensure bash is installed and in PATH",
            )
        })?;
        Ok(output.into())
    }

    fn upload(&self, local_path: &Utf8Path, remote_path: &str) -> Result<()> {
        let target = self.resolve(remote_path);
        std::fs::copy(local_path, &target).map_err(|e| {
            Error::transport(
                format!("Failed to copy {} to {}: {}", local_path, target, e),
                "Check that the target directory exists and is writable",
            )
        })?;
        Ok(())
    }

    fn download(&self, remote_path: &str, local_path: &Utf8Path) -> Result<()> {
        let source = self.resolve(remote_path);
        std::fs::copy(&source, local_path).map_err(|e| {
            Error::transport(
                format!("Failed to copy {} to {}: {}", source, local_path, e),
                "Check that the source file exists and is readable",
            )
        })?;
        Ok(())
    }

    fn label(&self) -> String {
        "localhost".to_string()
    }
}
