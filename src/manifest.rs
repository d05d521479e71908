//! Modpack manifests
//!
//! A manifest is the JSON document describing one version of a pack: the
//! files that make up the server, the game / mod loader / runtime targets it
//! runs on, and its memory requirements. Manifests come from a local file or
//! from the modpacks API; either way the raw bytes are kept so they can be
//! recorded verbatim as the installed state.
//!
//! # Examples
//!
//! ```no_run
//! use serverpack::{ManifestSource, PackManifest};
//! use std::path::PathBuf;
//!
//! # async fn example() -> serverpack::Result<()> {
//! let source = ManifestSource::Local(PathBuf::from("modpack.json"));
//! let client = reqwest::Client::new();
//! let loaded = source.load(&client, "https://api.modpacks.ch").await?;
//!
//! println!("{} {}", loaded.manifest.name, loaded.manifest.release_type);
//! for entry in loaded.manifest.file_entries()? {
//!     println!("  {}", entry.full_path());
//! }
//! # Ok(())
//! # }
//! ```

use crate::entry::{FileEntry, HashAlgorithm};
use crate::fetch;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use url::Url;

/// One version of a modpack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackManifest {
    /// Version name, e.g. "1.0.0"
    pub name: String,

    /// Release channel, e.g. "release" or "beta"
    #[serde(rename = "type", default)]
    pub release_type: String,

    #[serde(default)]
    pub files: Vec<ManifestFile>,

    #[serde(default)]
    pub targets: Vec<Target>,

    #[serde(default)]
    pub specs: Specs,
}

/// A file of the pack as listed in the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    /// Directory relative to the install root
    pub path: String,
    pub url: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,

    #[serde(rename = "hashType", default, skip_serializing_if = "Option::is_none")]
    pub hash_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    #[serde(default)]
    pub clientonly: bool,

    #[serde(default)]
    pub serveronly: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Game,
    Modloader,
    Runtime,
    #[serde(other)]
    Other,
}

/// Something the pack runs on: the game, a mod loader or a runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub kind: TargetKind,
}

/// Memory requirements in megabytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specs {
    #[serde(default = "default_minimum")]
    pub minimum: u64,
    #[serde(default = "default_recommended")]
    pub recommended: u64,
}

fn default_minimum() -> u64 {
    2048
}

fn default_recommended() -> u64 {
    4096
}

impl Default for Specs {
    fn default() -> Self {
        Self {
            minimum: default_minimum(),
            recommended: default_recommended(),
        }
    }
}

impl PackManifest {
    /// Parse manifest bytes
    pub fn parse(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(|e| Error::InvalidManifest(e.to_string()))
    }

    /// First target of the given kind
    pub fn target(&self, kind: TargetKind) -> Option<&Target> {
        self.targets.iter().find(|t| t.kind == kind)
    }

    /// Game version from the `game` target
    pub fn game_version(&self) -> Option<&str> {
        self.target(TargetKind::Game).map(|t| t.version.as_str())
    }

    /// Entries for every file the server needs (client-only files excluded)
    pub fn file_entries(&self) -> Result<Vec<FileEntry>> {
        self.files
            .iter()
            .filter(|f| !f.clientonly)
            .map(ManifestFile::to_entry)
            .collect()
    }
}

impl ManifestFile {
    /// Convert to a [`FileEntry`], preferring `sha1` over `hashType`/`hash`
    pub fn to_entry(&self) -> Result<FileEntry> {
        let (algorithm, digest) = match (&self.sha1, &self.hash_type, &self.hash) {
            (Some(sha1), _, _) if !sha1.trim().is_empty() => (HashAlgorithm::Sha1, sha1.as_str()),
            (_, Some(kind), Some(hash)) if !hash.trim().is_empty() => {
                (kind.parse::<HashAlgorithm>()?, hash.as_str())
            }
            _ => {
                return Err(Error::InvalidManifest(format!(
                    "file '{}' in '{}' has no checksum",
                    self.name, self.path
                )))
            }
        };

        let url = Url::parse(&self.url).map_err(|e| {
            Error::InvalidManifest(format!("file '{}' has invalid url '{}': {}", self.name, self.url, e))
        })?;

        FileEntry::new(&self.path, url, &self.name, algorithm, digest)
    }
}

/// Where a manifest comes from
#[derive(Debug, Clone)]
pub enum ManifestSource {
    /// A modpack JSON file on disk
    Local(PathBuf),
    /// A pack version published on the modpacks API
    Remote { pack: String, version: String },
}

/// Manifest bytes together with their parsed form
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub raw: Vec<u8>,
    pub manifest: PackManifest,
}

impl ManifestSource {
    /// Read and parse the manifest
    ///
    /// `api_url` is only used for [`ManifestSource::Remote`].
    pub async fn load(&self, client: &reqwest::Client, api_url: &str) -> Result<LoadedManifest> {
        let raw = match self {
            ManifestSource::Local(path) => fs::read(path).map_err(|e| {
                Error::InvalidManifest(format!("cannot read {}: {}", path.display(), e))
            })?,
            ManifestSource::Remote { .. } => {
                let url = self.remote_url(api_url)?;
                fetch::get_bytes(client, &url).await?
            }
        };

        let manifest = PackManifest::parse(&raw)?;
        Ok(LoadedManifest { raw, manifest })
    }

    fn remote_url(&self, api_url: &str) -> Result<Url> {
        match self {
            ManifestSource::Remote { pack, version } => Ok(Url::parse(&format!(
                "{}/public/modpack/{}/{}",
                api_url.trim_end_matches('/'),
                pack,
                version
            ))?),
            ManifestSource::Local(path) => Err(Error::Other(format!(
                "{} is a local manifest",
                path.display()
            ))),
        }
    }
}

impl fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestSource::Local(path) => write!(f, "{}", path.display()),
            ManifestSource::Remote { pack, version } => write!(f, "pack {} ({})", pack, version),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) const SAMPLE: &str = r#"{
        "files": [
            {
                "path": "./",
                "url": "https://raw.githubusercontent.com/renevo/ioc/main/README.md",
                "name": "README.md",
                "sha1": "a8f125b9b1cbef1e3df61e363463e4d16823d92a",
                "clientonly": false
            },
            {
                "path": "./mods/",
                "url": "https://files.example.com/client.jar",
                "name": "client.jar",
                "sha1": "bbbb",
                "clientonly": true
            },
            {
                "path": "./config/",
                "url": "https://files.example.com/server.toml",
                "name": "server.toml",
                "hashType": "sha256",
                "hash": "cccc",
                "serveronly": true
            }
        ],
        "targets": [
            {"version": "43.2.13", "name": "forge", "type": "modloader"},
            {"version": "1.19.2", "name": "minecraft", "type": "game"},
            {"version": "17.0.7+7", "name": "java", "type": "runtime"}
        ],
        "name": "1.0.0",
        "type": "beta"
    }"#;

    #[test]
    fn test_parse_sample() {
        let manifest = PackManifest::parse(SAMPLE.as_bytes()).unwrap();

        assert_eq!(manifest.name, "1.0.0");
        assert_eq!(manifest.release_type, "beta");
        assert_eq!(manifest.game_version(), Some("1.19.2"));
        assert_eq!(manifest.target(TargetKind::Modloader).unwrap().name, "forge");
        assert_eq!(manifest.target(TargetKind::Runtime).unwrap().version, "17.0.7+7");
        assert_eq!(manifest.specs, Specs::default());
    }

    #[test]
    fn test_file_entries_skip_client_only() {
        let manifest = PackManifest::parse(SAMPLE.as_bytes()).unwrap();
        let entries = manifest.file_entries().unwrap();

        let paths: Vec<_> = entries.iter().map(|e| e.full_path()).collect();
        assert_eq!(paths, vec!["README.md", "config/server.toml"]);
        assert_eq!(entries[1].hash_algorithm(), HashAlgorithm::Sha256);
        assert_eq!(entries[1].hash_value(), "cccc");
    }

    #[test]
    fn test_file_without_checksum_is_invalid() {
        let raw = r#"{"name": "1", "files": [{"path": "./", "url": "https://x.example/a", "name": "a"}]}"#;
        let manifest = PackManifest::parse(raw.as_bytes()).unwrap();
        assert!(matches!(manifest.file_entries(), Err(Error::InvalidManifest(_))));
    }

    #[test]
    fn test_unknown_target_kind_is_tolerated() {
        let raw = r#"{"name": "1", "targets": [{"name": "x", "version": "1", "type": "launcher"}]}"#;
        let manifest = PackManifest::parse(raw.as_bytes()).unwrap();
        assert_eq!(manifest.targets[0].kind, TargetKind::Other);
    }

    #[test]
    fn test_specs_parsed() {
        let raw = r#"{"name": "1", "specs": {"minimum": 4096, "recommended": 6144}}"#;
        let manifest = PackManifest::parse(raw.as_bytes()).unwrap();
        assert_eq!(manifest.specs.minimum, 4096);
        assert_eq!(manifest.specs.recommended, 6144);
    }

    #[test]
    fn test_garbage_is_invalid_manifest() {
        assert!(matches!(
            PackManifest::parse(b"not json"),
            Err(Error::InvalidManifest(_))
        ));
    }

    #[tokio::test]
    async fn test_load_local() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("modpack.json");
        fs::write(&path, SAMPLE).unwrap();

        let loaded = ManifestSource::Local(path)
            .load(&reqwest::Client::new(), "http://unused.invalid")
            .await
            .unwrap();

        assert_eq!(loaded.raw, SAMPLE.as_bytes());
        assert_eq!(loaded.manifest.name, "1.0.0");
    }

    #[tokio::test]
    async fn test_load_local_missing_file() {
        let result = ManifestSource::Local(PathBuf::from("/nonexistent/modpack.json"))
            .load(&reqwest::Client::new(), "http://unused.invalid")
            .await;
        assert!(matches!(result, Err(Error::InvalidManifest(_))));
    }

    #[tokio::test]
    async fn test_load_remote() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/public/modpack/35/2164")
            .with_header("content-type", "application/json")
            .with_body(SAMPLE)
            .create_async()
            .await;

        let source = ManifestSource::Remote {
            pack: "35".to_string(),
            version: "2164".to_string(),
        };
        let loaded = source
            .load(&reqwest::Client::new(), &format!("{}/", server.url()))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(loaded.manifest.targets.len(), 3);
    }
}
