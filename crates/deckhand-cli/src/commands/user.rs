//! Service account commands

use clap::{Args, Subcommand};
use deckhand_core::tasks::{self, Account};
use miette::Result;

use super::App;

/// Account selection shared by the user subcommands
#[derive(Debug, Args)]
pub struct AccountArgs {
    /// Account name (defaults to the `acct` variable)
    #[arg(long)]
    pub acct: Option<String>,

    /// Home directory (defaults to the `home` variable, then /srv/<acct>)
    #[arg(long)]
    pub home: Option<String>,
}

/// User subcommands
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Create the account and its runit supervisor
    Setup(AccountArgs),

    /// Create the account, home and managed SSH keys
    Account(AccountArgs),

    /// Register the per-user runit supervisor
    Runit(AccountArgs),
}

/// Run a user subcommand
pub fn run(app: &App, command: UserCommand) -> Result<()> {
    let keys = app.config.account.authorized_keys.as_deref();

    app.for_each_host(|session| match command {
        UserCommand::Setup(ref args) => {
            let account = Account::resolve(session, args.acct.as_deref(), args.home.as_deref())?;
            tasks::setup_user(session, &account, keys)
        }
        UserCommand::Account(ref args) => {
            let account = Account::resolve(session, args.acct.as_deref(), args.home.as_deref())?;
            tasks::setup_user_account(session, &account, keys)
        }
        UserCommand::Runit(ref args) => {
            let account = Account::resolve(session, args.acct.as_deref(), args.home.as_deref())?;
            tasks::setup_user_runit(session, &account)
        }
    })
}
