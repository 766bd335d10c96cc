//! CLI command implementations
//!
//! Every command receives the loaded [`App`]: configuration, selected hosts
//! and the deploy context shared by all hosts of this invocation.

pub mod files;
pub mod hosts;
pub mod packages;
pub mod services;
pub mod shell;
pub mod sync;
pub mod user;
pub mod virtualenv;

use camino::Utf8PathBuf;
use deckhand_core::config::Config;
use deckhand_core::context::DeployContext;
use deckhand_core::remote::{LocalRemote, RecordingRemote, Remote, SshRemote};
use deckhand_core::session::Session;
use miette::Result;

/// Parse a `KEY=VALUE` pair
pub fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("invalid KEY=VALUE: no `=` found in `{}`", s)),
    }
}

/// State shared by all commands of one invocation
#[derive(Debug)]
pub struct App {
    pub config_dir: Utf8PathBuf,
    pub config: Config,
    pub hosts: Vec<String>,
    pub context: DeployContext,
    pub dry_run: bool,
}

impl App {
    /// Load configuration and resolve the selected hosts
    pub fn load(
        config_dir: Utf8PathBuf,
        hosts: &[String],
        roles: &[String],
        vars: Vec<(String, String)>,
        dry_run: bool,
    ) -> Result<Self> {
        let config = Config::load(&config_dir)?;

        let mut selected: Vec<String> = Vec::new();
        for host in hosts {
            if !selected.contains(host) {
                selected.push(host.clone());
            }
        }
        for role in roles {
            for host in config.role_hosts(role)? {
                if !selected.contains(host) {
                    selected.push(host.clone());
                }
            }
        }

        let context = DeployContext::from_config_with(&config, vars);

        Ok(Self {
            config_dir,
            config,
            hosts: selected,
            context,
            dry_run,
        })
    }

    /// Deploy context with the source revision filled in
    ///
    /// `gitrev` comes from `git describe --dirty` in the configuration
    /// directory unless already set; `base` follows from it.
    pub fn deploy_context(&self) -> Result<DeployContext> {
        let mut context = self.context.clone();
        if let Some(gitrev) = context.get("gitrev").map(str::to_string) {
            context.set_revision(gitrev)?;
            return Ok(context);
        }

        let local = LocalRemote::in_dir(self.config_dir.clone());
        match local.execute("git describe --dirty") {
            Ok(output) if output.success() => {
                context.set_revision(output.stdout.trim())?;
            }
            Ok(output) => {
                tracing::warn!(
                    "git describe failed, {{base}} is unset: {}",
                    output.stderr.trim()
                );
            }
            Err(e) => tracing::warn!("git describe failed, {{base}} is unset: {}", e),
        }
        Ok(context)
    }

    /// Run `f` once per selected host, in order, stopping at the first error
    ///
    /// With `--dry-run` the operations are recorded and printed instead.
    pub fn for_each_host<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Session<'_>) -> deckhand_core::Result<()>,
    {
        if self.hosts.is_empty() {
            return Err(miette::miette!(
                help = "Pass -H/--host or -R/--role",
                "No target hosts selected"
            ));
        }

        let context = self.deploy_context()?;

        for host in &self.hosts {
            let span = tracing::info_span!("host", host = %host);
            let _enter = span.enter();

            if self.dry_run {
                let remote = RecordingRemote::labelled(host.clone());
                let result = {
                    let mut session = self.session(&remote, context.clone());
                    f(&mut session)
                };
                for op in remote.ops() {
                    println!("[{}] {}", host, op);
                }
                result?;
            } else {
                let remote = SshRemote::with_config(host, &self.config.ssh);
                let mut session = self.session(&remote, context.clone());
                f(&mut session)?;
            }
        }

        Ok(())
    }

    /// Run `f` against this machine
    ///
    /// With `--dry-run`, `f` gets a recorder primed by `prime` and the
    /// recorded operations are printed.
    pub fn with_local<T, F>(&self, prime: impl FnOnce(&RecordingRemote), f: F) -> Result<T>
    where
        F: FnOnce(&dyn Remote) -> deckhand_core::Result<T>,
    {
        if self.dry_run {
            let remote = RecordingRemote::labelled("localhost");
            prime(&remote);
            let result = f(&remote);
            for op in remote.ops() {
                println!("[localhost] {}", op);
            }
            Ok(result?)
        } else {
            Ok(f(&LocalRemote::new())?)
        }
    }

    fn session<'r>(&self, remote: &'r dyn Remote, context: DeployContext) -> Session<'r> {
        Session::new(remote, context).with_activation(self.config.virtualenv.activate.clone())
    }
}
