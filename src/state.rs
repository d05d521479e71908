//! Installed-state record for an install root
//!
//! After a successful install or update the exact manifest bytes are written
//! to `<root>/version.json`. The next update reads them back to reconstruct
//! the installed file set.
//!
//! # Examples
//!
//! ```no_run
//! use serverpack::InstalledState;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! match InstalledState::load(Path::new("server"))? {
//!     Some(state) => println!("installed: {} files", state.entries()?.len()),
//!     None => println!("fresh install"),
//! }
//! # Ok(())
//! # }
//! ```

use crate::entry::FileEntry;
use crate::manifest::PackManifest;
use crate::Result;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The state filename, relative to the install root
pub const STATE_FILE_NAME: &str = "version.json";

/// Manifest recorded by the last successful install
#[derive(Debug, Clone)]
pub struct InstalledState {
    raw: Vec<u8>,
}

impl InstalledState {
    /// Path of the state file for `root`
    pub fn path(root: &Path) -> PathBuf {
        root.join(STATE_FILE_NAME)
    }

    /// Whether `root` holds a previous install
    pub fn exists(root: &Path) -> bool {
        Self::path(root).exists()
    }

    /// Read the state file, `None` when nothing was installed yet
    ///
    /// The bytes are not parsed here; a corrupt record surfaces from
    /// [`InstalledState::manifest`].
    pub fn load(root: &Path) -> Result<Option<Self>> {
        match fs::read(Self::path(root)) {
            Ok(raw) => Ok(Some(Self { raw })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Record `raw` manifest bytes as the installed state, verbatim
    pub fn save(root: &Path, raw: &[u8]) -> Result<()> {
        fs::write(Self::path(root), raw)?;
        Ok(())
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn manifest(&self) -> Result<PackManifest> {
        PackManifest::parse(&self.raw)
    }

    /// Server-side file entries of the installed manifest
    pub fn entries(&self) -> Result<Vec<FileEntry>> {
        self.manifest()?.file_entries()
    }
}
