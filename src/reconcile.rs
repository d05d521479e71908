//! Reconciliation of an installed file set against a requested one
//!
//! Given the entries recorded for the current installation and the entries
//! of the pack being installed, [`reconcile`] classifies every path as
//! unchanged, changed, new or removed. Paths whose installed copy no longer
//! matches its recorded digest are put to a [`DecisionOracle`] before they
//! may be overwritten.
//!
//! Both sets are stable-sorted by `full_path` and walked with two cursors,
//! so the result is independent of input order.
//!
//! # Examples
//!
//! ```no_run
//! use serverpack::{reconcile, DefaultsOracle, ReconcileOptions};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let (old, new) = (Vec::new(), Vec::new());
//! let options = ReconcileOptions { integrity: true, integrity_update: false };
//! let plan = reconcile(Path::new("server"), old, new, options, &DefaultsOracle)?;
//! println!("{} files to download", plan.downloads().len());
//! # Ok(())
//! # }
//! ```

use crate::entry::{ensure_unique, FileEntry};
use crate::integrity;
use crate::prompt::{DecisionOracle, DriftPrompt};
use crate::Result;
use std::cmp::Ordering;
use std::io;
use std::path::Path;
use tracing::{debug, info};

/// Integrity settings for one reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Verify files that the update leaves unchanged
    pub integrity: bool,
    /// Default to overwriting locally modified files when asked
    pub integrity_update: bool,
}

/// A path present in both sets whose content will be replaced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedEntry {
    pub old: FileEntry,
    pub new: FileEntry,
}

/// Outcome of [`reconcile`]
///
/// Every old path is in exactly one of `unchanged`, `changed` (old side) or
/// `removed`; every new path is in exactly one of `unchanged`, `changed`
/// (new side) or `new`. Each group is sorted by `full_path`.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Paths that need no download
    pub unchanged: Vec<FileEntry>,
    /// Paths to overwrite with the new entry
    pub changed: Vec<ChangedEntry>,
    /// Paths only in the new set
    pub new: Vec<FileEntry>,
    /// Paths only in the old set
    pub removed: Vec<FileEntry>,
    /// Old side of changed paths whose installed copy failed verification
    pub checksum_conflicts: Vec<FileEntry>,
    /// Unchanged paths whose installed copy failed verification
    pub integrity_failures: Vec<FileEntry>,
}

impl Reconciliation {
    /// Entries that must be fetched: the new side of every change, then new paths
    pub fn downloads(&self) -> Vec<FileEntry> {
        self.changed
            .iter()
            .map(|c| c.new.clone())
            .chain(self.new.iter().cloned())
            .collect()
    }

    /// Nothing to remove or download
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty() && self.new.is_empty() && self.removed.is_empty()
    }
}

/// Classify `old` against `new`, asking `oracle` about locally modified files
///
/// Installed copies are read from `root`. Fails with a validation error if
/// either set contains the same `full_path` twice; nothing is read from disk
/// in that case.
pub fn reconcile(
    root: &Path,
    mut old: Vec<FileEntry>,
    mut new: Vec<FileEntry>,
    options: ReconcileOptions,
    oracle: &dyn DecisionOracle,
) -> Result<Reconciliation> {
    ensure_unique(&old, "installed")?;
    ensure_unique(&new, "requested")?;

    old.sort_by(|a, b| a.full_path().cmp(b.full_path()));
    new.sort_by(|a, b| a.full_path().cmp(b.full_path()));

    let mut result = Reconciliation::default();
    let mut drifted: Vec<ChangedEntry> = Vec::new();

    let mut old_iter = old.into_iter().peekable();
    let mut new_iter = new.into_iter().peekable();

    loop {
        let ordering = match (old_iter.peek(), new_iter.peek()) {
            (Some(o), Some(n)) => o.full_path().cmp(n.full_path()),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => break,
        };

        match ordering {
            Ordering::Equal => {
                let (Some(o), Some(n)) = (old_iter.next(), new_iter.next()) else {
                    unreachable!("both cursors were peeked");
                };

                if !o.same_content(&n) {
                    debug!(path = %n.full_path(), "found changed file");
                    result.changed.push(ChangedEntry { old: o, new: n });
                } else if options.integrity && !integrity::verify(root, &o) {
                    debug!(path = %o.full_path(), "installed file drifted from its recorded checksum");
                    result.integrity_failures.push(o.clone());
                    drifted.push(ChangedEntry { old: o, new: n });
                } else {
                    result.unchanged.push(n);
                }
            }
            Ordering::Less => {
                if let Some(o) = old_iter.next() {
                    debug!(path = %o.full_path(), "found deleted file");
                    result.removed.push(o);
                }
            }
            Ordering::Greater => {
                if let Some(n) = new_iter.next() {
                    debug!(path = %n.full_path(), "found new file");
                    result.new.push(n);
                }
            }
        }
    }

    info!(
        changed = result.changed.len(),
        new = result.new.len(),
        removed = result.removed.len(),
        "this install has {} files changed, {} new files and {} deleted files",
        result.changed.len(),
        result.new.len(),
        result.removed.len()
    );

    resolve_checksum_conflicts(root, &mut result, options, oracle);
    resolve_drift(&mut result, drifted, oracle);

    result.unchanged.sort_by(|a, b| a.full_path().cmp(b.full_path()));
    result.changed.sort_by(|a, b| a.new.full_path().cmp(b.new.full_path()));

    Ok(result)
}

/// Changed paths whose installed copy was modified: overwrite, or keep the local file
fn resolve_checksum_conflicts(
    root: &Path,
    result: &mut Reconciliation,
    options: ReconcileOptions,
    oracle: &dyn DecisionOracle,
) {
    let (conflicts, clean): (Vec<ChangedEntry>, Vec<ChangedEntry>) = result
        .changed
        .drain(..)
        .partition(|c| is_modified(root, &c.old));

    result.changed = clean;

    if conflicts.is_empty() {
        return;
    }

    for c in &conflicts {
        debug!(path = %c.old.full_path(), "detected failed checksum");
    }

    result.checksum_conflicts = conflicts.iter().map(|c| c.old.clone()).collect();

    let default = options.integrity_update || options.integrity;
    if oracle.decide(
        DriftPrompt::OverwriteChanged,
        &result.checksum_conflicts,
        default,
    ) {
        result.changed.extend(conflicts);
    } else {
        info!(
            count = conflicts.len(),
            "keeping locally modified files instead of updating them"
        );
        result.unchanged.extend(conflicts.into_iter().map(|c| c.old));
    }
}

/// The installed copy exists but no longer matches its recorded digest
///
/// A missing copy has no local edit to protect, so it is not a conflict.
fn is_modified(root: &Path, entry: &FileEntry) -> bool {
    match integrity::file_digest(&entry.local_path(root), entry.hash_algorithm()) {
        Ok(digest) => !digest.eq_ignore_ascii_case(entry.hash_value()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %entry.full_path(), "installed copy missing, updating without asking");
            false
        }
        Err(e) => {
            debug!(path = %entry.full_path(), error = %e, "cannot read file for verification");
            true
        }
    }
}

/// Unchanged paths whose installed copy was modified: restore, or tolerate the drift
fn resolve_drift(
    result: &mut Reconciliation,
    drifted: Vec<ChangedEntry>,
    oracle: &dyn DecisionOracle,
) {
    if drifted.is_empty() {
        return;
    }

    if oracle.decide(
        DriftPrompt::OverwriteDrifted,
        &result.integrity_failures,
        true,
    ) {
        result.changed.extend(drifted);
    } else {
        result.unchanged.extend(drifted.into_iter().map(|c| c.new));
    }
}
