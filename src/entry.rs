//! File entries: the unit of work for reconciliation, cleanup and download
//!
//! A [`FileEntry`] describes one artifact of an installation: where it lives
//! relative to the install root, where to fetch it from, and the digest the
//! fetched content must have. Its `full_path` is the identity key used to
//! match entries between an installed set and a requested one.
//!
//! # Examples
//!
//! ```
//! use serverpack::{FileEntry, HashAlgorithm};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let entry = FileEntry::new(
//!     "./mods/",
//!     "https://example.com/a.jar".parse()?,
//!     "a.jar",
//!     HashAlgorithm::Sha1,
//!     "a8f125b9b1cbef1e3df61e363463e4d16823d92a",
//! )?;
//! assert_eq!(entry.full_path(), "mods/a.jar");
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

/// Digest algorithm recorded for a file entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            other => Err(Error::Validation(format!(
                "unsupported hash algorithm '{}'",
                other
            ))),
        }
    }
}

/// One fetchable artifact of an installation
///
/// Entries are immutable once built; `full_path` is derived from
/// `directory` and `file_name` at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    directory: String,
    url: Url,
    file_name: String,
    hash_algorithm: HashAlgorithm,
    hash_value: String,
    full_path: String,
}

impl FileEntry {
    /// Build an entry, normalizing the directory into a relative `/`-separated path
    ///
    /// Rejects absolute directories, `..` segments, and file names that contain
    /// path separators: an entry must never resolve outside the install root.
    pub fn new(
        directory: &str,
        url: Url,
        file_name: &str,
        hash_algorithm: HashAlgorithm,
        hash_value: &str,
    ) -> Result<Self> {
        if file_name.is_empty()
            || file_name == "."
            || file_name == ".."
            || file_name.contains('/')
            || file_name.contains('\\')
        {
            return Err(Error::Validation(format!(
                "invalid file name '{}' in directory '{}'",
                file_name, directory
            )));
        }

        if directory.starts_with('/') || directory.starts_with('\\') || has_drive_prefix(directory)
        {
            return Err(Error::Validation(format!(
                "directory '{}' must be relative to the install root",
                directory
            )));
        }

        let mut segments = Vec::new();
        for segment in directory.split(['/', '\\']) {
            match segment {
                "" | "." => continue,
                ".." => {
                    return Err(Error::Validation(format!(
                        "directory '{}' escapes the install root",
                        directory
                    )))
                }
                s => segments.push(s),
            }
        }

        let directory = segments.join("/");
        let full_path = if directory.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", directory, file_name)
        };

        Ok(Self {
            directory,
            url,
            file_name: file_name.to_string(),
            hash_algorithm,
            hash_value: hash_value.trim().to_string(),
            full_path,
        })
    }

    /// Relative directory, `/`-separated, empty for the install root itself
    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    pub fn hash_value(&self) -> &str {
        &self.hash_value
    }

    /// Identity key of the entry: `directory/file_name`
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Absolute location of this entry below `root`
    pub fn local_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in self.full_path.split('/') {
            path.push(segment);
        }
        path
    }

    /// Absolute location of this entry's directory below `root`
    pub fn local_dir(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in self.directory.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }

    /// Whether two entries for the same path describe the same content
    pub fn same_content(&self, other: &FileEntry) -> bool {
        self.hash_algorithm == other.hash_algorithm
            && self.hash_value.eq_ignore_ascii_case(&other.hash_value)
    }
}

impl fmt::Display for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path)
    }
}

fn has_drive_prefix(directory: &str) -> bool {
    let bytes = directory.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Reject sets in which two entries share a `full_path`
pub fn ensure_unique(entries: &[FileEntry], label: &str) -> Result<()> {
    let mut paths: Vec<&str> = entries.iter().map(FileEntry::full_path).collect();
    paths.sort_unstable();

    if let Some(pair) = paths.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(Error::Validation(format!(
            "duplicate path '{}' in {} file set",
            pair[0], label
        )));
    }

    Ok(())
}
