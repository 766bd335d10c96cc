//! Virtual environment tasks

use camino::Utf8PathBuf;

use crate::command::{Arg, Pipeline, quote};
use crate::config::DEFAULT_VIRTUALENV_SOURCE;
use crate::materialize::UploadOptions;
use crate::session::Session;
use crate::{Error, Result};

/// Activation script of the environment rooted at `{env_root}`
const ENV_ROOT_ACTIVATE: &str = "{env_root}/bin/activate";

/// Run a command with the `{env_root}` environment activated
pub fn vrun(session: &Session<'_>, command: Arg) -> Result<String> {
    session.execute(&Pipeline::new(command).activate(Arg::template(ENV_ROOT_ACTIVATE)))
}

/// Settings for [`bootstrap_virtualenv`]
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Interpreter used to run `virtualenv.py`
    pub python: String,
    /// Local requirements file installed into the new environment
    pub requirements: Option<Utf8PathBuf>,
    /// URL `virtualenv.py` is fetched from
    pub source: String,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            python: "python".to_string(),
            requirements: None,
            source: DEFAULT_VIRTUALENV_SOURCE.to_string(),
        }
    }
}

/// Create a fresh environment at `{env_root}` and install requirements
///
/// Work happens in a staging directory under `/var/tmp`, which is removed
/// afterwards even when a step fails.
pub fn bootstrap_virtualenv(session: &mut Session<'_>, options: &BootstrapOptions) -> Result<()> {
    let env_root = session
        .context()
        .get("env_root")
        .map(str::to_string)
        .ok_or_else(|| Error::missing_substitution("env_root"))?;

    let staging = staging_dir();
    tracing::info!(host = %session.host(), "Bootstrapping virtualenv at {} (staging {})", env_root, staging);

    session.run(Arg::literal(format!("mkdir -p {}", quote(&staging)?)))?;

    let result = populate(session, options, &staging, &env_root);
    let cleanup = session.run(Arg::literal(format!("rm -r {}", quote(&staging)?)));
    result?;
    cleanup?;

    let root = quote(&env_root)?;
    session.run(Arg::literal(format!(
        "mkdir -p {root}/etc {root}/var {root}/tmp"
    )))?;
    Ok(())
}

fn populate(
    session: &mut Session<'_>,
    options: &BootstrapOptions,
    staging: &str,
    env_root: &str,
) -> Result<()> {
    session.cd(Arg::literal(staging), |s| {
        s.run(Arg::literal(format!(
            "curl -fsSL {} > virtualenv.py",
            quote(&options.source)?
        )))?;
        s.run(Arg::literal(format!(
            "{} virtualenv.py --clear --no-site-packages --distribute {}",
            quote(&options.python)?,
            quote(env_root)?
        )))?;
        Ok(())
    })?;

    if let Some(ref requirements) = options.requirements {
        let target = format!("{}/requirements.txt", staging);
        session.put(requirements, Arg::literal(target.as_str()), &UploadOptions::default())?;
        vrun(
            session,
            Arg::literal(format!("pip install -r {}", quote(&target)?)),
        )?;
    }

    Ok(())
}

fn staging_dir() -> String {
    let stamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("/var/tmp/deckhand-venv-{}-{}", std::process::id(), stamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DeployContext;
    use crate::remote::{CommandOutput, RecordingRemote};
    use camino::Utf8Path;
    use std::fs;
    use tempfile::TempDir;

    fn context() -> DeployContext {
        DeployContext::new().with([("env_root", "/srv/env")])
    }

    #[test]
    fn test_vrun_sources_env_root() {
        let remote = RecordingRemote::new();
        let session = Session::new(&remote, context());

        vrun(&session, Arg::literal("pip list")).unwrap();

        assert_eq!(
            remote.commands(),
            vec!["source \"/srv/env/bin/activate\" && pip list"]
        );
    }

    #[test]
    fn test_bootstrap_without_requirements() {
        let remote = RecordingRemote::new();
        let mut session = Session::new(&remote, context());

        bootstrap_virtualenv(&mut session, &BootstrapOptions::default()).unwrap();

        let commands = remote.commands();
        assert_eq!(commands.len(), 5);
        assert!(commands[0].starts_with("mkdir -p /var/tmp/deckhand-venv-"));
        assert!(commands[1].contains("&& curl -fsSL "));
        assert!(commands[1].contains(DEFAULT_VIRTUALENV_SOURCE));
        assert!(commands[1].ends_with(" > virtualenv.py"));
        assert!(commands[2].ends_with(
            "&& python virtualenv.py --clear --no-site-packages --distribute /srv/env"
        ));
        assert!(commands[3].starts_with("rm -r /var/tmp/deckhand-venv-"));
        assert_eq!(
            commands[4],
            "mkdir -p /srv/env/etc /srv/env/var /srv/env/tmp"
        );
    }

    #[test]
    fn test_bootstrap_installs_requirements() {
        let temp_dir = TempDir::new().unwrap();
        let requirements = Utf8Path::from_path(temp_dir.path())
            .unwrap()
            .join("requirements.txt");
        fs::write(&requirements, "redis\n").unwrap();

        let remote = RecordingRemote::new();
        let mut session = Session::new(&remote, context());
        let options = BootstrapOptions {
            python: "python3".to_string(),
            requirements: Some(requirements),
            ..Default::default()
        };

        bootstrap_virtualenv(&mut session, &options).unwrap();

        let uploads = remote.uploaded_paths();
        assert_eq!(uploads.len(), 1);
        assert!(uploads[0].ends_with("/requirements.txt"));
        assert_eq!(remote.uploaded_text(&uploads[0]).as_deref(), Some("redis\n"));

        let commands = remote.commands();
        assert!(commands[2].contains("python3 virtualenv.py"));
        assert!(commands[3].starts_with("source \"/srv/env/bin/activate\" && pip install -r "));
        assert!(commands[4].starts_with("rm -r "));
    }

    #[test]
    fn test_bootstrap_removes_staging_on_failure() {
        let remote = RecordingRemote::new();
        remote.respond("curl", CommandOutput::failed(22, "404"));
        let mut session = Session::new(&remote, context());

        let err = bootstrap_virtualenv(&mut session, &BootstrapOptions::default()).unwrap_err();

        assert!(err.to_string().contains("404"));
        let commands = remote.commands();
        assert_eq!(commands.len(), 3);
        assert!(commands[2].starts_with("rm -r /var/tmp/deckhand-venv-"));
    }

    #[test]
    fn test_bootstrap_requires_env_root() {
        let remote = RecordingRemote::new();
        let mut session = Session::new(&remote, DeployContext::new());

        let err = bootstrap_virtualenv(&mut session, &BootstrapOptions::default()).unwrap_err();

        assert!(matches!(err, Error::MissingSubstitution { ref key } if key == "env_root"));
        assert!(remote.ops().is_empty());
    }
}
