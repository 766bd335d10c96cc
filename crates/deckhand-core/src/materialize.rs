//! Uploading generated content
//!
//! The upload primitive needs a local file, so literal text and rendered
//! templates are written to a temporary file first. The temporary file is a
//! [`NamedTempFile`] and is removed when it goes out of scope, whether the
//! upload succeeded or not.

use std::io::Write;

use camino::Utf8Path;
use tempfile::NamedTempFile;

use crate::command::quote;
use crate::remote::Remote;
use crate::template::{self, Vars};
use crate::{Error, Result};

/// How a file is placed on the remote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Upload to a staging path and move into place as root
    pub use_sudo: bool,
    /// Octal mode applied after the upload, e.g. `"755"`
    pub mode: Option<String>,
}

impl UploadOptions {
    /// Upload as root
    pub fn sudo() -> Self {
        Self {
            use_sudo: true,
            mode: None,
        }
    }

    /// Set the file mode after upload
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }
}

/// Upload a local file to `target`, honouring `options`
pub fn put_file(
    remote: &dyn Remote,
    local_path: &Utf8Path,
    target: &str,
    options: &UploadOptions,
) -> Result<()> {
    tracing::debug!(host = %remote.label(), "Uploading {} to {}", local_path, target);

    if options.use_sudo {
        let staging = staging_path(target);
        remote.upload(local_path, &staging)?;
        let moved = check(
            remote,
            &format!("sudo mv {} {}", quote(&staging)?, quote(target)?),
        );
        if moved.is_err() {
            let cleanup = remote.execute(&format!("rm -f {}", quote(&staging)?));
            if !cleanup.map(|output| output.success()).unwrap_or(false) {
                tracing::warn!(host = %remote.label(), "Failed to remove staged upload {}", staging);
            }
        }
        moved?;
    } else {
        remote.upload(local_path, target)?;
    }

    if let Some(ref mode) = options.mode {
        let chmod = format!("chmod {} {}", quote(mode)?, quote(target)?);
        if options.use_sudo {
            check(remote, &format!("sudo {}", chmod))?;
        } else {
            check(remote, &chmod)?;
        }
    }

    Ok(())
}

/// Create remote file `target` holding exactly `text`
pub fn put_string(
    remote: &dyn Remote,
    text: &str,
    target: &str,
    options: &UploadOptions,
) -> Result<()> {
    let mut file = NamedTempFile::new()?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    file.as_file().sync_all()?;

    let local_path = Utf8Path::from_path(file.path()).ok_or_else(|| {
        Error::Io(std::io::Error::other(format!(
            "Temporary file path is not valid UTF-8: {:?}",
            file.path()
        )))
    })?;

    // `file` is dropped (and deleted) on every return path below
    put_file(remote, local_path, target, options)
}

/// Render the template file at `template_path` and upload the result
///
/// Nothing is uploaded if rendering fails.
pub fn put_template(
    remote: &dyn Remote,
    template_path: &Utf8Path,
    target: &str,
    vars: &impl Vars,
    options: &UploadOptions,
) -> Result<()> {
    let source = std::fs::read_to_string(template_path)?;
    let rendered = template::render(&source, vars)?;
    put_string(remote, &rendered, target, options)
}

fn check(remote: &dyn Remote, command: &str) -> Result<()> {
    let output = remote.execute(command)?;
    if !output.success() {
        return Err(Error::transport(
            format!(
                "'{}' on {} failed with exit code {:?}: {}",
                command,
                remote.label(),
                output.code,
                output.stderr.trim()
            ),
            "Check remote permissions",
        ));
    }
    Ok(())
}

/// Unique path under /tmp used for sudo uploads
fn staging_path(target: &str) -> String {
    let name = target.rsplit('/').next().filter(|n| !n.is_empty()).unwrap_or("upload");
    let stamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("/tmp/.deckhand-{}-{}-{}", std::process::id(), stamp, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{CommandOutput, RecordingRemote, RemoteOp};
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn uploaded_locals(remote: &RecordingRemote) -> Vec<camino::Utf8PathBuf> {
        remote
            .ops()
            .into_iter()
            .filter_map(|op| match op {
                RemoteOp::Upload { local, .. } => Some(local),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_put_string_uploads_exact_text() {
        let remote = RecordingRemote::new();
        let text = "line one\nline {two}\n";

        put_string(&remote, text, "/srv/app/tmp/crontab", &UploadOptions::default()).unwrap();

        assert_eq!(
            remote.uploaded_text("/srv/app/tmp/crontab").as_deref(),
            Some(text)
        );
        // Temp file is gone after the upload
        for local in uploaded_locals(&remote) {
            assert!(!local.exists());
        }
    }

    #[test]
    fn test_put_string_cleans_up_on_failure() {
        let remote = RecordingRemote::new();
        remote.fail_on("/forbidden");

        let err = put_string(&remote, "x", "/forbidden/f", &UploadOptions::default())
            .unwrap_err();

        assert!(matches!(err, Error::Transport { .. }));
        let locals = uploaded_locals(&remote);
        assert_eq!(locals.len(), 1);
        assert!(!locals[0].exists());
    }

    #[test]
    fn test_put_template_renders() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8Path::from_path(temp_dir.path()).unwrap().join("greeting.tmpl");
        fs::write(&path, "Hello {name}").unwrap();

        let mut vars = BTreeMap::new();
        vars.insert("name".to_string(), "Bo".to_string());

        let remote = RecordingRemote::new();
        put_template(&remote, &path, "/tmp/greeting", &vars, &UploadOptions::default())
            .unwrap();

        assert_eq!(remote.uploaded_text("/tmp/greeting").as_deref(), Some("Hello Bo"));
    }

    #[test]
    fn test_put_template_missing_key_uploads_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8Path::from_path(temp_dir.path()).unwrap().join("greeting.tmpl");
        fs::write(&path, "Hello {name}").unwrap();

        let remote = RecordingRemote::new();
        let err = put_template(
            &remote,
            &path,
            "/tmp/greeting",
            &BTreeMap::<String, String>::new(),
            &UploadOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(err, Error::MissingSubstitution { ref key } if key == "name"));
        assert!(remote.ops().is_empty());
    }

    #[test]
    fn test_sudo_upload_moves_into_place() {
        let remote = RecordingRemote::new();
        put_string(
            &remote,
            "#!/bin/sh\n",
            "/etc/service/app/run",
            &UploadOptions::sudo().with_mode("755"),
        )
        .unwrap();

        let staged = remote.uploaded_paths();
        assert_eq!(staged.len(), 1);
        assert!(staged[0].starts_with("/tmp/.deckhand-"));
        assert!(staged[0].ends_with("-run"));

        let commands = remote.commands();
        assert_eq!(commands.len(), 2);
        assert!(commands[0].starts_with("sudo mv /tmp/.deckhand-"));
        assert!(commands[0].ends_with(" /etc/service/app/run"));
        assert_eq!(commands[1], "sudo chmod 755 /etc/service/app/run");
    }

    #[test]
    fn test_failed_sudo_move_removes_staged_file() {
        let remote = RecordingRemote::new();
        remote.respond("sudo mv", CommandOutput::failed(1, "sudo: a password is required"));

        let err = put_string(&remote, "x", "/etc/x.conf", &UploadOptions::sudo()).unwrap_err();

        assert!(err.to_string().contains("a password is required"));
        let staged = remote.uploaded_paths();
        let commands = remote.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1], format!("rm -f {}", staged[0]));
    }

    #[test]
    fn test_failed_chmod_is_reported() {
        let remote = RecordingRemote::new();
        remote.respond("chmod", CommandOutput::failed(1, "Operation not permitted"));

        let err = put_string(
            &remote,
            "x",
            "/srv/x",
            &UploadOptions::default().with_mode("600"),
        )
        .unwrap_err();

        assert!(err.to_string().contains("Operation not permitted"));
    }
}
