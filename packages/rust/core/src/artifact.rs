//! Per-record report artifacts: naming and guaranteed removal.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

const SLUG_MAX_CHARS: usize = 40;
const SLUG_FALLBACK: &str = "lead";

/// Filesystem-safe slug of a lead name.
///
/// Runs of characters outside `[A-Za-z0-9_-]` become `_`; the result is
/// capped at 40 characters and never empty.
pub fn artifact_slug(name: &str) -> String {
    static UNSAFE_RUN: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\-]+").expect("valid regex"));

    let slug: String = UNSAFE_RUN
        .replace_all(name, "_")
        .chars()
        .take(SLUG_MAX_CHARS)
        .collect();

    if slug.is_empty() {
        SLUG_FALLBACK.to_string()
    } else {
        slug
    }
}

/// `<dir>/<slug>_pagespeed_report.pdf`
pub fn artifact_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}_pagespeed_report.pdf", artifact_slug(name)))
}

/// Delete an artifact if present. Errors are swallowed.
pub fn remove_artifact(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "artifact removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!(path = %path.display(), error = %e, "artifact removal failed"),
    }
}

/// Owns one record's artifact path and removes the file when dropped.
#[derive(Debug)]
pub struct ArtifactGuard {
    path: PathBuf,
}

impl ArtifactGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Guard `path` after deleting whatever file already sits there, so a
    /// present file can only have been written by this record's render.
    pub fn claim(path: PathBuf) -> Self {
        remove_artifact(&path);
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the renderer left a regular file at the path.
    pub fn is_present(&self) -> bool {
        self.path.is_file()
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        remove_artifact(&self.path);
    }
}
