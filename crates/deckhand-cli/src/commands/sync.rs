//! Sync command implementation

use camino::Utf8PathBuf;
use clap::Args;
use deckhand_core::command::Arg;
use deckhand_core::sync::{ExclusionPolicy, SyncOptions};
use miette::Result;

use super::App;

/// Arguments for the sync command
#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Local directory to mirror
    pub source: Utf8PathBuf,

    /// Remote root; files land at `<dest>/<source name>/...` (template)
    pub dest: String,

    /// Do not create the remote root first
    #[arg(long)]
    pub no_mkdir: bool,

    /// Source path to skip, as seen from the source's parent (repeatable)
    #[arg(short, long)]
    pub exclude: Vec<Utf8PathBuf>,

    /// Glob pattern of source paths to skip (repeatable)
    #[arg(short = 'g', long)]
    pub exclude_glob: Vec<String>,
}

/// Run the sync command
pub fn run(app: &App, args: SyncArgs) -> Result<()> {
    let options = SyncOptions {
        create_root: !args.no_mkdir,
    };

    let policy = ExclusionPolicy::new()
        .with_paths(app.config.sync.exclude.iter().cloned())
        .with_paths(args.exclude)
        .with_globs(
            app.config
                .sync
                .exclude_globs
                .iter()
                .chain(args.exclude_glob.iter()),
        )?;

    app.for_each_host(|session| {
        let report = session.sync_tree(
            &args.source,
            Arg::template(args.dest.as_str()),
            &options,
            &policy,
        )?;
        tracing::info!(
            "{}: {} files uploaded, {} skipped, {} directories created",
            session.host(),
            report.uploaded.len(),
            report.skipped.len(),
            report.directories_created
        );
        Ok(())
    })
}
