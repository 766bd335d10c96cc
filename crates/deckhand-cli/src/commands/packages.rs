//! Build-packages command implementation

use camino::Utf8PathBuf;
use clap::Args;
use deckhand_core::tasks;
use miette::Result;

use super::App;

/// Arguments for the build-packages command
#[derive(Debug, Args)]
pub struct BuildPackagesArgs {
    /// Directory searched for setup.py files
    #[arg(long, default_value = ".")]
    pub root: Utf8PathBuf,

    /// Python interpreter running setup.py
    #[arg(long, default_value = "python")]
    pub python: String,
}

/// Run the build-packages command
pub fn run(app: &App, args: BuildPackagesArgs) -> Result<()> {
    if app.dry_run {
        println!("Would build sdists below {} with {}", args.root, args.python);
        return Ok(());
    }

    let archives = tasks::build_packages(&args.root, &args.python)?;
    for archive in &archives {
        println!("{}", archive);
    }
    tracing::info!("Built {} archives", archives.len());
    Ok(())
}
