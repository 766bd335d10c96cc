//! Virtual environment commands

use camino::Utf8PathBuf;
use clap::Subcommand;
use deckhand_core::command::Arg;
use deckhand_core::tasks::{self, BootstrapOptions};
use miette::Result;

use super::App;

/// Virtualenv subcommands
#[derive(Debug, Subcommand)]
pub enum VirtualenvCommand {
    /// Create the environment at `{env_root}` and install requirements
    Bootstrap {
        /// Interpreter used to create the environment
        #[arg(long, default_value = "python")]
        python: String,

        /// Local requirements file to install
        #[arg(short, long)]
        requirements: Option<Utf8PathBuf>,
    },

    /// Run a command inside the `{env_root}` environment
    Run {
        /// Shell command, rendered against the deploy variables
        command: String,
    },
}

/// Run a virtualenv subcommand
pub fn run(app: &App, command: VirtualenvCommand) -> Result<()> {
    match command {
        VirtualenvCommand::Bootstrap {
            python,
            requirements,
        } => {
            let options = BootstrapOptions {
                python,
                requirements,
                source: app.config.virtualenv.source.clone(),
            };
            app.for_each_host(|session| tasks::bootstrap_virtualenv(session, &options))
        }
        VirtualenvCommand::Run { command } => app.for_each_host(|session| {
            print!("{}", tasks::vrun(session, Arg::template(command.as_str()))?);
            Ok(())
        }),
    }
}
