//! Recovery artifact sweep.
//!
//! The target application leaves autosave, lock and "recovered" files behind when it
//! crashes or is killed. Stale ones make the next launch open a recovery pane, so they
//! are swept before start and after quit. Files the caller produced on purpose are
//! registered in [`CopiedFiles`] and never touched.

use crate::config::RecoveryConfig;
use serde::Serialize;
use std::collections::HashSet;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Paths this automation session produced deliberately. Cloning shares the set.
#[derive(Debug, Clone, Default)]
pub struct CopiedFiles {
    paths: Arc<Mutex<HashSet<PathBuf>>>,
}

impl CopiedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.paths.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, path: impl AsRef<Path>) {
        let keys = keys_for(path.as_ref());
        self.guard().extend(keys);
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        let keys = keys_for(path.as_ref());
        let paths = self.guard();
        keys.iter().any(|key| paths.contains(key))
    }

    pub fn clear(&self) {
        self.guard().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

/// Every form a path may be compared under: absolute against the current directory,
/// and resolved through symlinks. A file that does not exist yet resolves through its
/// parent directory so registering before creating still matches later sweeps.
fn keys_for(path: &Path) -> Vec<PathBuf> {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let absolute: PathBuf = absolute
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let resolved = absolute.canonicalize().ok().or_else(|| {
        let parent = absolute.parent()?.canonicalize().ok()?;
        Some(parent.join(absolute.file_name()?))
    });

    let mut keys = vec![absolute];
    keys.extend(resolved);
    keys
}

/// What one sweep did. Informational only; a sweep never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Deletes one matched file. Defaults to `std::fs::remove_file`.
pub type RemoveFn = fn(&Path) -> io::Result<()>;

#[derive(Debug, Clone)]
pub struct RecoveryCleaner {
    directories: Vec<PathBuf>,
    patterns: Vec<String>,
    desktop: Option<PathBuf>,
    desktop_patterns: Vec<String>,
    remove: RemoveFn,
}

impl RecoveryCleaner {
    pub fn from_config(config: &RecoveryConfig) -> Self {
        Self {
            directories: config.resolved_directories(),
            patterns: config.patterns.clone(),
            desktop: dirs::desktop_dir(),
            desktop_patterns: config.desktop_patterns.clone(),
            remove: remove_file,
        }
    }

    pub fn new(directories: Vec<PathBuf>, patterns: Vec<String>) -> Self {
        Self {
            directories,
            patterns,
            desktop: None,
            desktop_patterns: vec![],
            remove: remove_file,
        }
    }

    /// Also sweep `desktop` with `patterns`.
    pub fn with_desktop(mut self, desktop: PathBuf, patterns: Vec<String>) -> Self {
        self.desktop = Some(desktop);
        self.desktop_patterns = patterns;
        self
    }

    pub fn with_remover(mut self, remove: RemoveFn) -> Self {
        self.remove = remove;
        self
    }

    /// Delete every matching file not in `exclusions`. Idempotent; per-file failures are
    /// logged and counted, never raised.
    pub fn cleanup(&self, exclusions: &CopiedFiles) -> CleanupReport {
        let mut report = CleanupReport::default();
        let mut seen = HashSet::new();

        let desktop_pass = self
            .desktop
            .iter()
            .map(|desktop| (desktop, &self.desktop_patterns));
        let recovery_pass = self.directories.iter().map(|dir| (dir, &self.patterns));

        for (dir, patterns) in desktop_pass.chain(recovery_pass) {
            if !dir.is_dir() {
                continue;
            }
            for pattern in patterns {
                for path in matches_in(dir, pattern) {
                    if !seen.insert(path.clone()) {
                        continue;
                    }
                    if exclusions.contains(&path) {
                        debug!("Keeping caller-managed file {}", path.display());
                        report.skipped.push(path);
                        continue;
                    }
                    match (self.remove)(&path) {
                        Ok(()) => {
                            debug!("Removed recovery file {}", path.display());
                            report.removed.push(path);
                        }
                        Err(e) => {
                            warn!("Failed to remove {}: {}", path.display(), e);
                            report.failed.push(path);
                        }
                    }
                }
            }
        }

        if !report.removed.is_empty() || !report.failed.is_empty() {
            info!(
                "Recovery cleanup: {} removed, {} skipped, {} failed",
                report.removed.len(),
                report.skipped.len(),
                report.failed.len()
            );
        }
        report
    }
}

fn remove_file(path: &Path) -> io::Result<()> {
    std::fs::remove_file(path)
}

fn matches_in(dir: &Path, pattern: &str) -> Vec<PathBuf> {
    let escaped_dir = glob::Pattern::escape(&dir.to_string_lossy());
    let full = Path::new(&escaped_dir).join(pattern);
    match glob::glob(&full.to_string_lossy()) {
        Ok(paths) => paths
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    debug!("Unreadable entry while globbing {}: {}", full.display(), e);
                    None
                }
            })
            .filter(|path| path.is_file())
            .collect(),
        Err(e) => {
            warn!("Invalid recovery pattern '{}': {}", pattern, e);
            vec![]
        }
    }
}
