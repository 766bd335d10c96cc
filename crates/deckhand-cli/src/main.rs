//! deckhand CLI - remote deployment helper

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;

use commands::App;

/// deckhand - push trees, templates and services to hosts over SSH
#[derive(Debug, Parser)]
#[command(name = "deckhand")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory containing deckhand.toml
    #[arg(short = 'C', long, global = true)]
    config_dir: Option<String>,

    /// Target host, `[user@]host[:port]` (repeatable, comma separated)
    #[arg(short = 'H', long = "host", global = true, value_delimiter = ',')]
    hosts: Vec<String>,

    /// Target every host of a role from deckhand.toml (repeatable)
    #[arg(short = 'R', long = "role", global = true, value_delimiter = ',')]
    roles: Vec<String>,

    /// Set a template variable, `KEY=VALUE` (repeatable)
    #[arg(long = "set", global = true, value_parser = commands::parse_key_val)]
    vars: Vec<(String, String)>,

    /// Print the operations instead of running them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Mirror a local directory tree onto the hosts
    Sync(commands::sync::SyncArgs),

    /// Upload a local file, optionally rendered as a template
    Put(commands::files::PutArgs),

    /// Create a remote file from a string
    PutString(commands::files::PutStringArgs),

    /// Download a remote file
    Get(commands::files::GetArgs),

    /// Render a local template to stdout
    Render(commands::files::RenderArgs),

    /// Run a shell command on the hosts
    Run(commands::shell::RunArgs),

    /// Run a command with SSH agent forwarding
    AgentRun(commands::shell::AgentRunArgs),

    /// Append helper aliases to a shell init file
    Aliases(commands::shell::AliasesArgs),

    /// Signal the process recorded in a pid file
    Kill(commands::shell::KillArgs),

    /// Apply a sed expression to a remote file in place
    Sed(commands::shell::SedArgs),

    /// List configured roles and their hosts
    Hosts,

    /// List the EC2 instances of an application group
    Ec2(commands::hosts::Ec2Args),

    /// Install and enable an nginx virtual host
    Nginx(commands::services::NginxArgs),

    /// Install the `crontab` variable as the user's crontab
    Crontab,

    /// Control a per-user runit service
    Sv(commands::services::SvArgs),

    /// Install a per-user runit service
    Service(commands::services::ServiceArgs),

    /// Redis management
    Redis {
        #[command(subcommand)]
        command: commands::services::RedisCommand,
    },

    /// Service account provisioning
    User {
        #[command(subcommand)]
        command: commands::user::UserCommand,
    },

    /// Virtual environment management
    Virtualenv {
        #[command(subcommand)]
        command: commands::virtualenv::VirtualenvCommand,
    },

    /// Build sdists for every setup.py below a directory
    BuildPackages(commands::packages::BuildPackagesArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with indicatif layer for progress bar support
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let indicatif_layer = IndicatifLayer::new();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(indicatif_layer)
        .with(filter)
        .init();

    // Determine configuration directory
    let config_dir = if let Some(ref path) = cli.config_dir {
        camino::Utf8PathBuf::from(path)
    } else {
        std::env::current_dir()
            .ok()
            .and_then(|p| camino::Utf8PathBuf::try_from(p).ok())
            .unwrap_or_else(|| camino::Utf8PathBuf::from("."))
    };

    let app = App::load(config_dir, &cli.hosts, &cli.roles, cli.vars, cli.dry_run)?;

    match cli.command {
        Commands::Sync(args) => commands::sync::run(&app, args),
        Commands::Put(args) => commands::files::put(&app, args),
        Commands::PutString(args) => commands::files::put_string(&app, args),
        Commands::Get(args) => commands::files::get(&app, args),
        Commands::Render(args) => commands::files::render(&app, args),
        Commands::Run(args) => commands::shell::run(&app, args),
        Commands::AgentRun(args) => commands::shell::agent_run(&app, args),
        Commands::Aliases(args) => commands::shell::aliases(&app, args),
        Commands::Kill(args) => commands::shell::kill(&app, args),
        Commands::Sed(args) => commands::shell::sed(&app, args),
        Commands::Hosts => commands::hosts::print_hosts(&app),
        Commands::Ec2(args) => commands::hosts::ec2(&app, args),
        Commands::Nginx(args) => commands::services::nginx(&app, args),
        Commands::Crontab => commands::services::crontab(&app),
        Commands::Sv(args) => commands::services::sv(&app, args),
        Commands::Service(args) => commands::services::service(&app, args),
        Commands::Redis { command } => commands::services::redis(&app, command),
        Commands::User { command } => commands::user::run(&app, command),
        Commands::Virtualenv { command } => commands::virtualenv::run(&app, command),
        Commands::BuildPackages(args) => commands::packages::run(&app, args),
    }
}
