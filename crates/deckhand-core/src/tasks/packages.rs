//! Local source distribution builds
//!
//! Finds every directory with a `setup.py` below a root, builds an sdist in
//! each and collects the archives in `<root>/dist`.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

use crate::{Error, Result};

/// Build sdists for every `setup.py` below `root` with `python`
///
/// Stale `MANIFEST` files are removed first. Returns the archives found in
/// `<root>/dist` afterwards, sorted by name.
pub fn build_packages(root: &Utf8Path, python: &str) -> Result<Vec<Utf8PathBuf>> {
    if !root.is_dir() {
        return Err(Error::not_found(root));
    }

    let removed = remove_manifests(root)?;
    if removed > 0 {
        tracing::debug!("Removed {} stale MANIFEST files", removed);
    }

    let dist_dir = root.join("dist");
    std::fs::create_dir_all(&dist_dir)?;

    for base in find_setup_dirs(root)? {
        tracing::info!("Building sdist in {}", base);

        let output = Command::new(python)
            .args(["setup.py", "sdist"])
            .current_dir(&base)
            .output()
            .map_err(|e| {
                Error::task(
                    format!("Failed to run {}: {}", python, e),
                    "Ensure the Python interpreter is installed and in PATH",
                )
            })?;

        if !output.status.success() {
            return Err(Error::task(
                format!(
                    "sdist in {} failed with exit code {:?}: {}",
                    base,
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
                "Run `python setup.py sdist` in that directory to see the full output",
            ));
        }

        let base_dist = base.join("dist");
        if base_dist != dist_dir && base_dist.is_dir() {
            collect_archives(&base_dist, &dist_dir)?;
            std::fs::remove_dir(&base_dist)?;
        }
    }

    let mut archives = Vec::new();
    for entry in std::fs::read_dir(&dist_dir)? {
        let path = utf8(entry?.path())?;
        if path.is_file() {
            archives.push(path);
        }
    }
    archives.sort();
    Ok(archives)
}

fn utf8(path: std::path::PathBuf) -> Result<Utf8PathBuf> {
    Utf8PathBuf::try_from(path).map_err(|e| {
        Error::Io(std::io::Error::other(format!(
            "Path is not valid UTF-8: {:?}",
            e.into_path_buf()
        )))
    })
}

/// Delete every file named `MANIFEST` below `root`
fn remove_manifests(root: &Utf8Path) -> Result<usize> {
    let mut removed = 0;
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_file() && entry.file_name() == "MANIFEST" {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Directories below `root` (inclusive) that contain a `setup.py`
fn find_setup_dirs(root: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_dir() && entry.path().join("setup.py").is_file() {
            dirs.push(utf8(entry.into_path())?);
        }
    }
    Ok(dirs)
}

/// Move every entry of `from` into `to`
fn collect_archives(from: &Utf8Path, to: &Utf8Path) -> Result<()> {
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        std::fs::rename(entry.path(), to.as_std_path().join(entry.file_name()))?;
    }
    Ok(())
}
