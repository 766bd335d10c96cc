//! Shell commands: run, agent-run, aliases, kill, sed

use clap::Args;
use deckhand_core::command::{Arg, Pipeline};
use deckhand_core::tasks;
use miette::Result;

use super::App;

/// Arguments for the run command
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Shell command, rendered against the deploy variables
    pub command: String,

    /// Run through sudo
    #[arg(long)]
    pub sudo: bool,

    /// Source the release virtualenv first
    #[arg(long)]
    pub virtualenv: bool,

    /// Run inside this remote directory (template)
    #[arg(long)]
    pub cd: Option<String>,

    /// Pass the command through without rendering
    #[arg(long)]
    pub literal: bool,
}

/// Arguments for the agent-run command
#[derive(Debug, Args)]
pub struct AgentRunArgs {
    /// Shell command run on each host
    pub command: String,
}

/// Arguments for the aliases command
#[derive(Debug, Args)]
pub struct AliasesArgs {
    /// Shell init file, relative to the login directory
    #[arg(long, default_value = ".profile")]
    pub initfile: String,
}

/// Arguments for the kill command
#[derive(Debug, Args)]
pub struct KillArgs {
    /// Remote pid file (template)
    pub pidfile: String,

    /// Signal name or number, e.g. `HUP`
    #[arg(short, long)]
    pub signal: Option<String>,

    /// Leave the pid file in place
    #[arg(long)]
    pub keep_pidfile: bool,
}

/// Arguments for the sed command
#[derive(Debug, Args)]
pub struct SedArgs {
    /// Remote file (template)
    pub file: String,

    /// sed expression
    pub expr: String,
}

/// Run the run command
pub fn run(app: &App, args: RunArgs) -> Result<()> {
    let command = if args.literal {
        Arg::literal(args.command.as_str())
    } else {
        Arg::template(args.command.as_str())
    };
    let activate = Arg::template(app.config.virtualenv.activate.as_str());

    app.for_each_host(|session| {
        let mut pipeline = Pipeline::new(command.clone()).sudo(args.sudo);
        if args.virtualenv {
            pipeline = pipeline.activate(activate.clone());
        }

        let output = match args.cd {
            Some(ref dir) => session.cd(Arg::template(dir.as_str()), |s| s.execute(&pipeline))?,
            None => session.execute(&pipeline)?,
        };
        if !output.is_empty() {
            print!("{}", output);
        }
        Ok(())
    })
}

/// Run the agent-run command
pub fn agent_run(app: &App, args: AgentRunArgs) -> Result<()> {
    if app.hosts.is_empty() {
        return Err(miette::miette!(
            help = "Pass -H/--host or -R/--role",
            "No target hosts selected"
        ));
    }
    for host in &app.hosts {
        let output = app.with_local(|_| {}, |local| tasks::agent_run(local, host, &args.command))?;
        print!("{}", output);
    }
    Ok(())
}

/// Run the aliases command
pub fn aliases(app: &App, args: AliasesArgs) -> Result<()> {
    app.for_each_host(|session| tasks::install_bash_aliases(session, &args.initfile))
}

/// Run the kill command
pub fn kill(app: &App, args: KillArgs) -> Result<()> {
    app.for_each_host(|session| {
        tasks::kill(
            session,
            Arg::template(args.pidfile.as_str()),
            !args.keep_pidfile,
            args.signal.as_deref(),
        )?;
        Ok(())
    })
}

/// Run the sed command
pub fn sed(app: &App, args: SedArgs) -> Result<()> {
    app.for_each_host(|session| tasks::sed(session, Arg::template(args.file.as_str()), &args.expr))
}
