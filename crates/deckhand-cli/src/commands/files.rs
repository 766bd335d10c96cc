//! File transfer commands: put, put-string, get and local rendering

use camino::Utf8PathBuf;
use clap::Args;
use deckhand_core::command::Arg;
use deckhand_core::materialize::UploadOptions;
use deckhand_core::template;
use miette::{IntoDiagnostic, Result};

use super::App;

/// How an uploaded file is placed
#[derive(Debug, Args)]
pub struct PlacementArgs {
    /// Upload to a staging path and move into place with sudo
    #[arg(long)]
    pub sudo: bool,

    /// Octal mode applied after the upload
    #[arg(long)]
    pub mode: Option<String>,
}

impl From<&PlacementArgs> for UploadOptions {
    fn from(args: &PlacementArgs) -> Self {
        UploadOptions {
            use_sudo: args.sudo,
            mode: args.mode.clone(),
        }
    }
}

/// Arguments for the put command
#[derive(Debug, Args)]
pub struct PutArgs {
    /// Local file
    pub local: Utf8PathBuf,

    /// Remote path (template)
    pub remote: String,

    /// Render the local file against the deploy variables first
    #[arg(short, long)]
    pub template: bool,

    #[command(flatten)]
    pub placement: PlacementArgs,
}

/// Arguments for the put-string command
#[derive(Debug, Args)]
pub struct PutStringArgs {
    /// File content, rendered against the deploy variables
    pub content: String,

    /// Remote path (template)
    pub remote: String,

    /// Upload the content exactly as given
    #[arg(long)]
    pub literal: bool,

    #[command(flatten)]
    pub placement: PlacementArgs,
}

/// Arguments for the get command
#[derive(Debug, Args)]
pub struct GetArgs {
    /// Remote path (template)
    pub remote: String,

    /// Local destination
    pub local: Utf8PathBuf,
}

/// Arguments for the render command
#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Template file
    pub template: Utf8PathBuf,
}

/// Run the put command
pub fn put(app: &App, args: PutArgs) -> Result<()> {
    let options = UploadOptions::from(&args.placement);
    app.for_each_host(|session| {
        let target = Arg::template(args.remote.as_str());
        if args.template {
            session.put_template(&args.local, target, &options)
        } else {
            session.put(&args.local, target, &options)
        }
    })
}

/// Run the put-string command
pub fn put_string(app: &App, args: PutStringArgs) -> Result<()> {
    let options = UploadOptions::from(&args.placement);
    app.for_each_host(|session| {
        let content = if args.literal {
            Arg::literal(args.content.as_str())
        } else {
            Arg::template(args.content.as_str())
        };
        session.put_string(content, Arg::template(args.remote.as_str()), &options)
    })
}

/// Run the get command
///
/// With several hosts, each file is stored as `<local>.<host>`.
pub fn get(app: &App, args: GetArgs) -> Result<()> {
    let several = app.hosts.len() > 1;
    app.for_each_host(|session| {
        let local = if several {
            Utf8PathBuf::from(format!("{}.{}", args.local, session.host()))
        } else {
            args.local.clone()
        };
        session.get(Arg::template(args.remote.as_str()), &local)
    })
}

/// Run the render command
pub fn render(app: &App, args: RenderArgs) -> Result<()> {
    let source = std::fs::read_to_string(&args.template).into_diagnostic()?;
    let context = app.deploy_context()?;

    let missing: Vec<String> = template::placeholders(&source)?
        .into_iter()
        .filter(|name| !context.contains(name))
        .collect();
    if !missing.is_empty() {
        return Err(miette::miette!(
            help = "Define them under [vars] in deckhand.toml or pass --set KEY=VALUE",
            "Template {} uses unset variables: {}",
            args.template,
            missing.join(", ")
        ));
    }

    print!("{}", context.render(&source)?);
    Ok(())
}
