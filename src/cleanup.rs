//! Removal of files dropped by an update
//!
//! Cleanup is best-effort: a file or directory that cannot be removed is
//! recorded in the [`CleanupReport`] and the run carries on with the next
//! entry. Directories left empty by a removal are collapsed bottom-up, but the
//! install root itself is never removed.

use crate::entry::FileEntry;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A file or directory that could not be removed
#[derive(Debug)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub error: io::Error,
}

/// Result of a cleanup pass
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Files deleted (or already absent)
    pub removed_files: Vec<PathBuf>,
    /// Directories collapsed because they became empty
    pub removed_dirs: Vec<PathBuf>,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Delete every `removed` entry below `root` and collapse emptied directories
pub fn cleanup(root: &Path, removed: &[FileEntry]) -> CleanupReport {
    let mut report = CleanupReport::default();

    for entry in removed {
        let file_path = entry.local_path(root);
        debug!(path = %file_path.display(), "removing");

        match fs::remove_file(&file_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %file_path.display(), "already absent");
            }
            Err(e) => {
                warn!(path = %file_path.display(), error = %e, "error occurred whilst removing file");
                report.failures.push(CleanupFailure {
                    path: file_path,
                    error: e,
                });
                continue;
            }
        }

        report.removed_files.push(file_path);
        collapse_empty_dirs(root, &entry.local_dir(root), &mut report);
    }

    report
}

/// Remove `dir` and its ancestors while they are empty, stopping below `root`
fn collapse_empty_dirs(root: &Path, dir: &Path, report: &mut CleanupReport) {
    let mut current = dir.to_path_buf();

    while current != root && current.starts_with(root) {
        match is_empty_dir(&current) {
            Ok(true) => {}
            Ok(false) => return,
            // Removed by an earlier entry in this pass
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %current.display(), error = %e, "cannot inspect directory");
                return;
            }
        }

        if current.exists() {
            debug!(path = %current.display(), "removing as is empty");
            if let Err(e) = fs::remove_dir(&current) {
                warn!(path = %current.display(), error = %e, "error occurred whilst removing folder");
                report.failures.push(CleanupFailure {
                    path: current,
                    error: e,
                });
                return;
            }
            report.removed_dirs.push(current.clone());
        }

        if !current.pop() {
            return;
        }
    }
}

fn is_empty_dir(path: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}
