//! Directory tree synchronization
//!
//! Mirrors a local directory onto a remote root. Each file lands at
//! `dest_root/<path relative to the source's parent>`, so syncing `src`
//! into `/r` produces `/r/src/...`. Remote directories are created on
//! demand, once per run, and only for directories that receive a file.

use std::collections::HashSet;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::command::quote;
use crate::remote::Remote;
use crate::{Error, Result};

/// Predicate over source paths
pub type ExcludeFn<'a> = Box<dyn Fn(&Utf8Path) -> bool + 'a>;

/// Decides which source files a sync skips
///
/// A file is skipped if its source path is in the literal set, matches one
/// of the glob patterns, or the predicate returns true for it.
#[derive(Default)]
pub struct ExclusionPolicy<'a> {
    paths: HashSet<Utf8PathBuf>,
    globs: Option<GlobSet>,
    predicate: Option<ExcludeFn<'a>>,
}

impl<'a> ExclusionPolicy<'a> {
    /// Exclude nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip these exact source paths
    pub fn with_paths<P>(mut self, paths: impl IntoIterator<Item = P>) -> Self
    where
        P: Into<Utf8PathBuf>,
    {
        self.paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Skip source paths matching any of the glob `patterns`
    ///
    /// Patterns are matched against the same relative source paths as the
    /// literal set, e.g. `src/**/*.pyc`.
    pub fn with_globs<S: AsRef<str>>(
        mut self,
        patterns: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        let mut count = 0;
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern).map_err(|e| {
                Error::config(
                    format!("Invalid exclude pattern '{}': {}", pattern, e),
                    "Use glob syntax such as `**/*.pyc` or `src/tmp/*`",
                )
            })?;
            builder.add(glob);
            count += 1;
        }
        if count > 0 {
            let set = builder.build().map_err(|e| {
                Error::config(
                    format!("Failed to compile exclude patterns: {}", e),
                    "Check the exclude_globs entries",
                )
            })?;
            self.globs = Some(set);
        }
        Ok(self)
    }

    /// Skip source paths for which `predicate` returns true
    ///
    /// Replaces any predicate set before.
    pub fn with_predicate(mut self, predicate: impl Fn(&Utf8Path) -> bool + 'a) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Whether `path` is excluded
    pub fn excludes(&self, path: &Utf8Path) -> bool {
        if self.paths.contains(path) {
            return true;
        }
        if self.globs.as_ref().is_some_and(|globs| globs.is_match(path)) {
            return true;
        }
        self.predicate.as_ref().is_some_and(|pred| pred(path))
    }
}

impl fmt::Debug for ExclusionPolicy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusionPolicy")
            .field("paths", &self.paths)
            .field("globs", &self.globs.as_ref().map(GlobSet::len))
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

/// Options for [`sync_tree`]
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Run `mkdir -p` on the destination root before transferring
    pub create_root: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { create_root: true }
    }
}

/// What a sync did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Remote paths written, in upload order
    pub uploaded: Vec<String>,
    /// Source paths skipped by the exclusion policy
    pub skipped: Vec<Utf8PathBuf>,
    /// Number of `mkdir` commands issued, including the root
    pub directories_created: usize,
}

/// Remote directories already created during one sync
#[derive(Debug, Default)]
struct DirectoryCache {
    created: HashSet<String>,
}

impl DirectoryCache {
    /// Create `dir` unless this run already did
    ///
    /// Returns whether a command was issued.
    fn ensure(&mut self, remote: &dyn Remote, dir: &str) -> Result<bool> {
        if self.created.contains(dir) {
            return Ok(false);
        }
        make_remote_dir(remote, dir)?;
        self.created.insert(dir.to_string());
        Ok(true)
    }
}

/// Join a remote root with a relative path using `/` separators
///
/// An empty root keeps the result relative to the login directory.
pub fn remote_join(root: &str, rel: &Utf8Path) -> String {
    let absolute = root.starts_with('/');
    let mut out = root.trim_end_matches('/').to_string();
    for component in rel.components() {
        let part = component.as_str();
        if part == "." || part.is_empty() {
            continue;
        }
        if absolute || !out.is_empty() {
            out.push('/');
        }
        out.push_str(part);
    }
    if out.is_empty() {
        out.push_str(if absolute { "/" } else { "." });
    }
    out
}

fn make_remote_dir(remote: &dyn Remote, dir: &str) -> Result<()> {
    let output = remote.execute(&format!("mkdir -p {}", quote(dir)?))?;
    if !output.success() {
        return Err(Error::transport(
            format!(
                "mkdir -p {} on {} failed with exit code {:?}: {}",
                dir,
                remote.label(),
                output.code,
                output.stderr.trim()
            ),
            "Check that the remote user may create this directory",
        ));
    }
    Ok(())
}

/// Mirror the tree at `source` under `dest_root` on `remote`
///
/// Files are visited depth-first in file-name order. Exclusion is decided
/// before any remote side effect for a file. The first failing remote
/// operation aborts the sync; what was transferred so far stays in place.
pub fn sync_tree(
    remote: &dyn Remote,
    source: &Utf8Path,
    dest_root: &str,
    options: &SyncOptions,
    policy: &ExclusionPolicy<'_>,
) -> Result<SyncReport> {
    if !source.is_dir() {
        return Err(Error::not_found(source));
    }
    std::fs::read_dir(source).map_err(|_| Error::not_found(source))?;

    // Paths are reported relative to the source's parent, so the source
    // directory's own name is part of every relative path.
    let prefix = source
        .file_name()
        .filter(|name| *name != "." && *name != "..")
        .map(Utf8PathBuf::from)
        .unwrap_or_default();

    let mut report = SyncReport::default();
    let mut cache = DirectoryCache::default();

    tracing::info!(host = %remote.label(), "Syncing {} to {}", source, dest_root);

    if options.create_root && cache.ensure(remote, &remote_join(dest_root, Utf8Path::new("")))? {
        report.directories_created += 1;
    }

    let walker = WalkDir::new(source)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "Failed to read directory entry: {}",
                e
            )))
        })?;

        let abs_path = Utf8Path::from_path(entry.path()).ok_or_else(|| {
            Error::Io(std::io::Error::other(format!(
                "Path is not valid UTF-8: {:?}",
                entry.path()
            )))
        })?;

        // Symlinks count as files when they point at one
        if !abs_path.is_file() {
            continue;
        }

        let rel_path = abs_path.strip_prefix(source).map_err(|_| {
            Error::Io(std::io::Error::other(format!(
                "Failed to strip source prefix from {}",
                abs_path
            )))
        })?;
        let src = prefix.join(rel_path);

        if policy.excludes(&src) {
            tracing::debug!(path = %src, "Excluded");
            report.skipped.push(src);
            continue;
        }

        let dir = src.parent().unwrap_or_else(|| Utf8Path::new(""));
        if cache.ensure(remote, &remote_join(dest_root, dir))? {
            report.directories_created += 1;
        }

        let target = remote_join(dest_root, &src);
        tracing::debug!(path = %src, target = %target, "Uploading");
        remote.upload(abs_path, &target)?;
        report.uploaded.push(target);
    }

    tracing::info!(
        host = %remote.label(),
        uploaded = report.uploaded.len(),
        skipped = report.skipped.len(),
        "Sync complete"
    );

    Ok(report)
}
