//! Shell command composition
//!
//! Commands are built by a small pipeline of pure functions:
//! render the [`Arg`] against the context, optionally source a virtualenv
//! activation script, optionally scope to a working directory, optionally
//! elevate with sudo. [`Pipeline`] strings these together; the session then
//! hands the resulting string to the remote.

use std::borrow::Cow;

use crate::template::Vars;
use crate::{Error, Result, template};

/// A command or path argument, either passed through or rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Used exactly as given
    Literal(String),
    /// Rendered against the deploy context before use
    Template(String),
}

impl Arg {
    /// A literal argument
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// A template argument
    pub fn template(value: impl Into<String>) -> Self {
        Self::Template(value.into())
    }

    /// Resolve to the final string
    pub fn render(&self, vars: &impl Vars) -> Result<String> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Template(value) => template::render(value, vars),
        }
    }
}

/// Quote a single word for a POSIX shell
pub fn quote(word: &str) -> Result<Cow<'_, str>> {
    shlex::try_quote(word).map_err(|e| {
        Error::template(
            format!("Cannot quote {:?} for the shell: {}", word, e),
            "Shell arguments must not contain NUL bytes",
        )
    })
}

/// Prefix `command` with sourcing of an activation script
pub fn activate(command: &str, script: &str) -> String {
    format!("source \"{}\" && {}", script, command)
}

/// Run `command` inside `dir`
pub fn within(command: &str, dir: &str) -> Result<String> {
    Ok(format!("cd {} && {}", quote(dir)?, command))
}

/// Run `command` as root through sudo
pub fn elevate(command: &str) -> Result<String> {
    Ok(format!("sudo -H bash -c {}", quote(command)?))
}

/// Resolve nested `cd` scopes into one directory
///
/// Absolute entries reset the path, relative ones are appended.
pub fn effective_dir(dirs: &[String]) -> Option<String> {
    dirs.iter().fold(None, |acc: Option<String>, dir| match acc {
        _ if dir.starts_with('/') => Some(dir.clone()),
        None => Some(dir.clone()),
        Some(base) => Some(format!("{}/{}", base.trim_end_matches('/'), dir)),
    })
}

/// Resolve a remote path against the current `cd` scope
pub fn resolve_remote_path(path: &str, dirs: &[String]) -> String {
    match effective_dir(dirs) {
        Some(dir) if !path.starts_with('/') && !path.starts_with('~') => {
            format!("{}/{}", dir.trim_end_matches('/'), path)
        }
        _ => path.to_string(),
    }
}

/// Full description of one command invocation
#[derive(Debug, Clone)]
pub struct Pipeline {
    command: Arg,
    activate: Option<Arg>,
    sudo: bool,
}

impl Pipeline {
    /// Start a pipeline for `command`
    pub fn new(command: Arg) -> Self {
        Self {
            command,
            activate: None,
            sudo: false,
        }
    }

    /// Source `script` before running
    pub fn activate(mut self, script: Arg) -> Self {
        self.activate = Some(script);
        self
    }

    /// Run through sudo
    pub fn sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    /// Whether this pipeline elevates
    pub fn is_sudo(&self) -> bool {
        self.sudo
    }

    /// Produce the final shell string
    pub fn build(&self, vars: &impl Vars, cwd: &[String]) -> Result<String> {
        let mut command = self.command.render(vars)?;

        if let Some(ref script) = self.activate {
            command = activate(&command, &script.render(vars)?);
        }

        if let Some(dir) = effective_dir(cwd) {
            command = within(&command, &dir)?;
        }

        if self.sudo {
            command = elevate(&command)?;
        }

        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn vars() -> BTreeMap<String, String> {
        [("home", "/srv/app"), ("base", "2024-abc")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_literal_is_not_rendered() {
        let arg = Arg::literal("echo {home}");
        assert_eq!(arg.render(&vars()).unwrap(), "echo {home}");
    }

    #[test]
    fn test_template_is_rendered() {
        let arg = Arg::template("ls {home}");
        assert_eq!(arg.render(&vars()).unwrap(), "ls /srv/app");
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("/r/src").unwrap(), "/r/src");
        assert_ne!(quote("a b").unwrap(), "a b");
        assert!(quote("a\0b").is_err());
    }

    #[test]
    fn test_effective_dir() {
        assert_eq!(effective_dir(&[]), None);
        assert_eq!(
            effective_dir(&["/srv".to_string(), "app".to_string()]),
            Some("/srv/app".to_string())
        );
        assert_eq!(
            effective_dir(&["/srv".to_string(), "/tmp".to_string()]),
            Some("/tmp".to_string())
        );
    }

    #[test]
    fn test_resolve_remote_path() {
        let cwd = vec!["/srv/app".to_string()];
        assert_eq!(resolve_remote_path("etc/x.conf", &cwd), "/srv/app/etc/x.conf");
        assert_eq!(resolve_remote_path("/etc/x.conf", &cwd), "/etc/x.conf");
        assert_eq!(resolve_remote_path("etc/x.conf", &[]), "etc/x.conf");
    }

    #[test]
    fn test_pipeline_plain() {
        let cmd = Pipeline::new(Arg::template("make PREFIX={home}"))
            .build(&vars(), &[])
            .unwrap();
        assert_eq!(cmd, "make PREFIX=/srv/app");
    }

    #[test]
    fn test_pipeline_virtualenv_and_cwd() {
        let cmd = Pipeline::new(Arg::literal("pip freeze"))
            .activate(Arg::template("{home}/releases/{base}/bin/activate"))
            .build(&vars(), &["/srv/app/src".to_string()])
            .unwrap();
        assert_eq!(
            cmd,
            "cd /srv/app/src && source \"/srv/app/releases/2024-abc/bin/activate\" && pip freeze"
        );
    }

    #[test]
    fn test_pipeline_sudo_wraps_everything() {
        let pipeline = Pipeline::new(Arg::literal("id")).sudo(true);
        assert!(pipeline.is_sudo());
        let cmd = pipeline.build(&vars(), &["/root".to_string()]).unwrap();
        assert!(cmd.starts_with("sudo -H bash -c "));
        assert!(cmd.contains("cd /root && id"));
    }

    #[test]
    fn test_pipeline_missing_variable() {
        let err = Pipeline::new(Arg::template("ls {acct}"))
            .build(&vars(), &[])
            .unwrap_err();
        assert!(matches!(err, Error::MissingSubstitution { .. }));
    }
}
