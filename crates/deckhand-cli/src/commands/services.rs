//! Service commands: nginx, crontab, runit services and Redis

use camino::Utf8PathBuf;
use clap::{Args, Subcommand};
use deckhand_core::command::Arg;
use deckhand_core::tasks::{self, RedisInstall};
use deckhand_core::tasks::services::{DEFAULT_REDIS_CONF, DEFAULT_REDIS_SOURCE};
use miette::{IntoDiagnostic, Result};

use super::App;

/// Arguments for the nginx command
#[derive(Debug, Args)]
pub struct NginxArgs {
    /// Local vhost template
    pub conf: Utf8PathBuf,

    /// Vhost name under sites-available
    pub name: String,
}

/// Arguments for the sv command
#[derive(Debug, Args)]
pub struct SvArgs {
    /// sv command, e.g. `restart`
    pub command: String,

    /// Service name under `{home}/service`
    pub service: String,
}

/// Arguments for the service command
#[derive(Debug, Args)]
pub struct ServiceArgs {
    /// Service name under `{home}/service`
    pub name: String,

    /// Local run script, rendered against the deploy variables
    pub runfile: Utf8PathBuf,
}

/// Redis subcommands
#[derive(Debug, Subcommand)]
pub enum RedisCommand {
    /// Build Redis from source and register it with runit
    Install {
        /// Local redis.conf template
        #[arg(long, default_value = DEFAULT_REDIS_CONF)]
        conf: Utf8PathBuf,

        /// Source tarball URL
        #[arg(long, default_value = DEFAULT_REDIS_SOURCE)]
        src: String,
    },

    /// Start the Redis service
    Start,

    /// Stop the Redis service
    Stop,
}

/// Run the nginx command
pub fn nginx(app: &App, args: NginxArgs) -> Result<()> {
    app.for_each_host(|session| tasks::configure_nginx(session, &args.conf, &args.name))
}

/// Run the crontab command
pub fn crontab(app: &App) -> Result<()> {
    app.for_each_host(|session| {
        tasks::deploy_crontab(session)?;
        Ok(())
    })
}

/// Run the sv command
pub fn sv(app: &App, args: SvArgs) -> Result<()> {
    app.for_each_host(|session| {
        print!("{}", tasks::sv(session, &args.command, &args.service)?);
        Ok(())
    })
}

/// Run the service command
pub fn service(app: &App, args: ServiceArgs) -> Result<()> {
    let runfile = std::fs::read_to_string(&args.runfile).into_diagnostic()?;
    app.for_each_host(|session| {
        tasks::install_service(session, &args.name, Arg::template(runfile.as_str()))
    })
}

/// Run a redis subcommand
pub fn redis(app: &App, command: RedisCommand) -> Result<()> {
    match command {
        RedisCommand::Install { conf, src } => {
            let options = RedisInstall {
                conf,
                source_url: src,
            };
            app.for_each_host(|session| tasks::install_redis(session, &options))
        }
        RedisCommand::Start => app.for_each_host(|session| {
            tasks::start_redis(session)?;
            Ok(())
        }),
        RedisCommand::Stop => app.for_each_host(|session| {
            tasks::stop_redis(session)?;
            Ok(())
        }),
    }
}
