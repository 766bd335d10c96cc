//! Recording backend
//!
//! Records every operation instead of touching a host. Used for `--dry-run`
//! and as the test double for everything built on [`Remote`].

use std::cell::RefCell;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};

use super::{CommandOutput, Remote};
use crate::{Error, Result};

/// One recorded operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOp {
    /// A shell command
    Execute(String),
    /// A file upload, with the bytes the local file held at upload time
    Upload {
        local: Utf8PathBuf,
        remote: String,
        content: Vec<u8>,
    },
    /// A file download
    Download { remote: String, local: Utf8PathBuf },
}

impl RemoteOp {
    fn mentions(&self, needle: &str) -> bool {
        match self {
            Self::Execute(cmd) => cmd.contains(needle),
            Self::Upload { local, remote, .. } => {
                local.as_str().contains(needle) || remote.contains(needle)
            }
            Self::Download { remote, local } => {
                remote.contains(needle) || local.as_str().contains(needle)
            }
        }
    }
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Execute(cmd) => write!(f, "run: {}", cmd),
            Self::Upload {
                local,
                remote,
                content,
            } => write!(f, "put: {} -> {} ({} bytes)", local, remote, content.len()),
            Self::Download { remote, local } => write!(f, "get: {} -> {}", remote, local),
        }
    }
}

/// Backend that records operations and answers with canned output
#[derive(Debug)]
pub struct RecordingRemote {
    label: String,
    ops: RefCell<Vec<RemoteOp>>,
    responses: RefCell<Vec<(String, CommandOutput)>>,
    failures: RefCell<Vec<String>>,
}

impl RecordingRemote {
    /// Create a recorder labelled `recording`
    pub fn new() -> Self {
        Self::labelled("recording")
    }

    /// Create a recorder with a host label
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ops: RefCell::new(Vec::new()),
            responses: RefCell::new(Vec::new()),
            failures: RefCell::new(Vec::new()),
        }
    }

    /// Answer commands containing `pattern` with `output`
    ///
    /// Earlier registrations win. Unmatched commands succeed with no output.
    pub fn respond(&self, pattern: impl Into<String>, output: CommandOutput) {
        self.responses.borrow_mut().push((pattern.into(), output));
    }

    /// Fail every operation mentioning `pattern` with a transport error
    ///
    /// The failed operation is still recorded.
    pub fn fail_on(&self, pattern: impl Into<String>) {
        self.failures.borrow_mut().push(pattern.into());
    }

    /// All recorded operations in order
    pub fn ops(&self) -> Vec<RemoteOp> {
        self.ops.borrow().clone()
    }

    /// Recorded shell commands in order
    pub fn commands(&self) -> Vec<String> {
        self.ops
            .borrow()
            .iter()
            .filter_map(|op| match op {
                RemoteOp::Execute(cmd) => Some(cmd.clone()),
                _ => None,
            })
            .collect()
    }

    /// Remote targets of recorded uploads in order
    pub fn uploaded_paths(&self) -> Vec<String> {
        self.ops
            .borrow()
            .iter()
            .filter_map(|op| match op {
                RemoteOp::Upload { remote, .. } => Some(remote.clone()),
                _ => None,
            })
            .collect()
    }

    /// Content of the last upload to `remote`, as text
    pub fn uploaded_text(&self, remote: &str) -> Option<String> {
        self.ops.borrow().iter().rev().find_map(|op| match op {
            RemoteOp::Upload {
                remote: r, content, ..
            } if r == remote => Some(String::from_utf8_lossy(content).into_owned()),
            _ => None,
        })
    }

    /// Forget recorded operations, keeping responses and failures
    pub fn clear(&self) {
        self.ops.borrow_mut().clear();
    }

    fn record(&self, op: RemoteOp) -> Result<()> {
        let failing = self
            .failures
            .borrow()
            .iter()
            .find(|pattern| op.mentions(pattern))
            .cloned();
        self.ops.borrow_mut().push(op);

        match failing {
            Some(pattern) => Err(Error::transport(
                format!("{}: simulated failure on '{}'", self.label, pattern),
                "Injected by RecordingRemote::fail_on",
            )),
            None => Ok(()),
        }
    }
}

impl Default for RecordingRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl Remote for RecordingRemote {
    fn execute(&self, command: &str) -> Result<CommandOutput> {
        self.record(RemoteOp::Execute(command.to_string()))?;

        let output = self
            .responses
            .borrow()
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::ok(""));
        Ok(output)
    }

    fn upload(&self, local_path: &Utf8Path, remote_path: &str) -> Result<()> {
        let content = std::fs::read(local_path)?;
        self.record(RemoteOp::Upload {
            local: local_path.to_path_buf(),
            remote: remote_path.to_string(),
            content,
        })
    }

    fn download(&self, remote_path: &str, local_path: &Utf8Path) -> Result<()> {
        self.record(RemoteOp::Download {
            remote: remote_path.to_string(),
            local: local_path.to_path_buf(),
        })
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}
