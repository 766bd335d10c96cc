//! Deployment session
//!
//! A [`Session`] binds one [`Remote`] to a [`DeployContext`] and a stack of
//! `cd` scopes. Every operation renders its arguments against the session's
//! context, so tasks never reach for shared global state.

use camino::Utf8Path;

use crate::command::{self, Arg, Pipeline};
use crate::context::DeployContext;
use crate::materialize::{self, UploadOptions};
use crate::remote::{CommandOutput, Remote};
use crate::sync::{self, ExclusionPolicy, SyncOptions, SyncReport};
use crate::{Error, Result};

/// One host, one context
pub struct Session<'r> {
    remote: &'r dyn Remote,
    context: DeployContext,
    cwd: Vec<String>,
    activate: Arg,
}

impl<'r> Session<'r> {
    /// Create a session with the default activation script template
    pub fn new(remote: &'r dyn Remote, context: DeployContext) -> Self {
        Self {
            remote,
            context,
            cwd: Vec::new(),
            activate: Arg::template("{home}/releases/{base}/bin/activate"),
        }
    }

    /// Use `template` as the activation script for virtualenv commands
    pub fn with_activation(mut self, template: impl Into<String>) -> Self {
        self.activate = Arg::template(template);
        self
    }

    /// The bound remote
    pub fn remote(&self) -> &'r dyn Remote {
        self.remote
    }

    /// The session's variables
    pub fn context(&self) -> &DeployContext {
        &self.context
    }

    /// Mutable access to the session's variables
    pub fn context_mut(&mut self) -> &mut DeployContext {
        &mut self.context
    }

    /// Label of the bound remote
    pub fn host(&self) -> String {
        self.remote.label()
    }

    /// A session on the same remote and scope with extra variables
    pub fn derive<K, V>(&self, vars: impl IntoIterator<Item = (K, V)>) -> Session<'r>
    where
        K: Into<String>,
        V: Into<String>,
    {
        Session {
            remote: self.remote,
            context: self.context.with(vars),
            cwd: self.cwd.clone(),
            activate: self.activate.clone(),
        }
    }

    /// Render an argument against the session's context
    pub fn render(&self, arg: &Arg) -> Result<String> {
        arg.render(&self.context)
    }

    /// Run a command
    pub fn run(&self, command: Arg) -> Result<String> {
        self.execute(&Pipeline::new(command))
    }

    /// Run a command with the virtualenv activated
    pub fn run_in_virtualenv(&self, command: Arg) -> Result<String> {
        self.execute(&Pipeline::new(command).activate(self.activate.clone()))
    }

    /// Run a command as root
    pub fn sudo(&self, command: Arg) -> Result<String> {
        self.execute(&Pipeline::new(command).sudo(true))
    }

    /// Run a command and return its raw output, whatever the exit status
    pub fn probe(&self, command: Arg) -> Result<CommandOutput> {
        let line = Pipeline::new(command).build(&self.context, &self.cwd)?;
        self.remote.execute(&line)
    }

    /// Build and run a pipeline, failing on a non-zero exit status
    pub fn execute(&self, pipeline: &Pipeline) -> Result<String> {
        let line = pipeline.build(&self.context, &self.cwd)?;
        let tag = if pipeline.is_sudo() { "sudo" } else { "run" };
        tracing::info!(host = %self.remote.label(), "[{}] {}", tag, line);

        let output = self.remote.execute(&line)?;
        if !output.success() {
            return Err(Error::transport(
                format!(
                    "Command failed on {} with exit code {:?}: {}\n{}",
                    self.remote.label(),
                    output.code,
                    line,
                    output.stderr.trim()
                ),
                "Inspect the remote output above and rerun once fixed",
            ));
        }
        Ok(output.stdout)
    }

    /// Run `f` with `dir` pushed onto the `cd` scope
    ///
    /// The scope is popped again whether `f` succeeds or not.
    pub fn cd<T>(&mut self, dir: Arg, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let dir = self.render(&dir)?;
        self.cwd.push(dir);
        let result = f(self);
        self.cwd.pop();
        result
    }

    /// Current effective remote directory, if any `cd` is active
    pub fn current_dir(&self) -> Option<String> {
        command::effective_dir(&self.cwd)
    }

    fn remote_path(&self, path: &Arg) -> Result<String> {
        Ok(command::resolve_remote_path(&self.render(path)?, &self.cwd))
    }

    /// Check whether a remote path exists
    pub fn exists(&self, path: Arg) -> Result<bool> {
        let path = self.remote_path(&path)?;
        self.remote.exists(&path)
    }

    /// Upload a local file
    pub fn put(&self, local_path: &Utf8Path, target: Arg, options: &UploadOptions) -> Result<()> {
        let target = self.remote_path(&target)?;
        tracing::info!(host = %self.remote.label(), "[put] {} -> {}", local_path, target);
        materialize::put_file(self.remote, local_path, &target, options)
    }

    /// Upload a local template file rendered against the session's context
    pub fn put_template(
        &self,
        template_path: &Utf8Path,
        target: Arg,
        options: &UploadOptions,
    ) -> Result<()> {
        let target = self.remote_path(&target)?;
        tracing::info!(host = %self.remote.label(), "[put] {} -> {} (template)", template_path, target);
        materialize::put_template(self.remote, template_path, &target, &self.context, options)
    }

    /// Create a remote file holding `content`
    ///
    /// A [`Arg::Template`] content is rendered first.
    pub fn put_string(&self, content: Arg, target: Arg, options: &UploadOptions) -> Result<()> {
        let text = self.render(&content)?;
        let target = self.remote_path(&target)?;
        tracing::info!(host = %self.remote.label(), "[put] {} bytes -> {}", text.len(), target);
        materialize::put_string(self.remote, &text, &target, options)
    }

    /// Download a remote file
    pub fn get(&self, remote_path: Arg, local_path: &Utf8Path) -> Result<()> {
        let remote_path = self.remote_path(&remote_path)?;
        tracing::info!(host = %self.remote.label(), "[get] {} -> {}", remote_path, local_path);
        self.remote.download(&remote_path, local_path)
    }

    /// Mirror a local tree under `dest_root`
    pub fn sync_tree(
        &self,
        source: &Utf8Path,
        dest_root: Arg,
        options: &SyncOptions,
        policy: &ExclusionPolicy<'_>,
    ) -> Result<SyncReport> {
        let dest_root = self.remote_path(&dest_root)?;
        sync::sync_tree(self.remote, source, &dest_root, options, policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RecordingRemote;

    fn context() -> DeployContext {
        let mut ctx = DeployContext::new();
        ctx.extend([("home", "/srv/app"), ("base", "20240101-abc")]);
        ctx
    }

    #[test]
    fn test_run_renders_templates_only() {
        let remote = RecordingRemote::new();
        let session = Session::new(&remote, context());

        session.run(Arg::template("ls {home}")).unwrap();
        session.run(Arg::literal("echo {home}")).unwrap();

        assert_eq!(remote.commands(), vec!["ls /srv/app", "echo {home}"]);
    }

    #[test]
    fn test_run_fails_on_nonzero_exit() {
        let remote = RecordingRemote::new();
        remote.respond("false", CommandOutput::failed(1, "nope"));
        let session = Session::new(&remote, context());

        let err = session.run(Arg::literal("false")).unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_run_in_virtualenv() {
        let remote = RecordingRemote::new();
        let session = Session::new(&remote, context());

        session.run_in_virtualenv(Arg::literal("pip freeze")).unwrap();

        assert_eq!(
            remote.commands(),
            vec!["source \"/srv/app/releases/20240101-abc/bin/activate\" && pip freeze"]
        );
    }

    #[test]
    fn test_custom_activation() {
        let remote = RecordingRemote::new();
        let session = Session::new(&remote, context().with([("env_root", "/srv/env")]))
            .with_activation("{env_root}/bin/activate");

        session.run_in_virtualenv(Arg::literal("python -V")).unwrap();

        assert_eq!(
            remote.commands(),
            vec!["source \"/srv/env/bin/activate\" && python -V"]
        );
    }

    #[test]
    fn test_cd_scopes_commands_and_paths() {
        let remote = RecordingRemote::new();
        let mut session = Session::new(&remote, context());

        session
            .cd(Arg::template("{home}/redis/src"), |s| {
                s.run(Arg::literal("make"))?;
                s.put_string(
                    Arg::literal("x"),
                    Arg::literal("notes.txt"),
                    &UploadOptions::default(),
                )
            })
            .unwrap();
        session.run(Arg::literal("pwd")).unwrap();

        assert_eq!(
            remote.commands(),
            vec!["cd /srv/app/redis/src && make", "pwd"]
        );
        assert_eq!(remote.uploaded_paths(), vec!["/srv/app/redis/src/notes.txt"]);
        assert!(session.current_dir().is_none());
    }

    #[test]
    fn test_cd_pops_on_error() {
        let remote = RecordingRemote::new();
        let mut session = Session::new(&remote, context());

        let result: Result<()> = session.cd(Arg::literal("/tmp"), |_| {
            Err(Error::task("boom", "test"))
        });

        assert!(result.is_err());
        assert!(session.current_dir().is_none());
    }

    #[test]
    fn test_derive_adds_variables() {
        let remote = RecordingRemote::new();
        let session = Session::new(&remote, context());
        let child = session.derive([("nginx_vhost_name", "site")]);

        child
            .sudo(Arg::template("ln -sf /a/{nginx_vhost_name} /b/{nginx_vhost_name}"))
            .unwrap();

        assert!(!session.context().contains("nginx_vhost_name"));
        assert_eq!(remote.commands().len(), 1);
        assert!(remote.commands()[0].starts_with("sudo -H bash -c "));
        assert!(remote.commands()[0].contains("/a/site /b/site"));
    }

    #[test]
    fn test_put_string_renders_template_content() {
        let remote = RecordingRemote::new();
        let session = Session::new(&remote, context());

        session
            .put_string(
                Arg::template("HOME={home}\n"),
                Arg::template("{home}/tmp/env"),
                &UploadOptions::default(),
            )
            .unwrap();

        assert_eq!(
            remote.uploaded_text("/srv/app/tmp/env").as_deref(),
            Some("HOME=/srv/app\n")
        );
    }

    #[test]
    fn test_exists_and_probe() {
        let remote = RecordingRemote::new();
        remote.respond("test -e /srv/app/pid", CommandOutput::failed(1, ""));
        let session = Session::new(&remote, context());

        assert!(!session.exists(Arg::template("{home}/pid")).unwrap());
        assert!(!session.probe(Arg::literal("test -e /srv/app/pid")).unwrap().success());
    }
}
