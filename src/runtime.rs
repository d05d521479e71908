//! Java runtime provider
//!
//! [`Runtime::Java`] resolves an Eclipse Temurin JRE build from the Adoptium
//! assets API for the pack's `runtime` target (or the configured default
//! feature version). The archive is downloaded with the rest of the pack and
//! unpacked below `<root>/jre/` afterwards. [`Runtime::Disabled`] uses
//! whatever `java` is on the PATH.

use crate::entry::{FileEntry, HashAlgorithm};
use crate::fetch;
use crate::manifest::{PackManifest, TargetKind};
use crate::platform::{detect_arch, detect_os, java_executable};
use crate::{Error, Result};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, info};
use url::Url;

/// Directory below the install root that holds the runtime
pub const RUNTIME_DIR: &str = "jre";

/// Runtime used to run the mod loader installer and the server
#[derive(Debug, Clone)]
pub enum Runtime {
    Java(JavaRuntime),
    Disabled,
}

/// A resolved Temurin JRE build
#[derive(Debug, Clone)]
pub struct JavaRuntime {
    feature_version: u32,
    release_name: String,
    archive: FileEntry,
}

#[derive(Debug, Deserialize)]
struct AdoptiumAsset {
    binary: AdoptiumBinary,
    release_name: String,
}

#[derive(Debug, Deserialize)]
struct AdoptiumBinary {
    package: AdoptiumPackage,
}

#[derive(Debug, Deserialize)]
struct AdoptiumPackage {
    checksum: String,
    link: String,
    name: String,
}

impl Runtime {
    /// Pick the runtime for `manifest`
    ///
    /// Returns [`Runtime::Disabled`] without any network access when
    /// `enabled` is false.
    pub async fn resolve(
        manifest: &PackManifest,
        enabled: bool,
        default_version: &str,
        client: &reqwest::Client,
        adoptium_url: &str,
    ) -> Result<Self> {
        if !enabled {
            return Ok(Runtime::Disabled);
        }

        let requested = manifest
            .target(TargetKind::Runtime)
            .filter(|t| t.name.eq_ignore_ascii_case("java"))
            .map(|t| t.version.as_str())
            .unwrap_or(default_version);

        let java = JavaRuntime::resolve(client, adoptium_url, requested).await?;
        Ok(Runtime::Java(java))
    }

    /// Files to download for this runtime
    pub fn downloads(&self) -> Vec<FileEntry> {
        match self {
            Runtime::Java(java) => vec![java.archive.clone()],
            Runtime::Disabled => Vec::new(),
        }
    }

    /// Unpack the downloaded runtime
    pub fn install(&self, root: &Path) -> Result<()> {
        match self {
            Runtime::Java(java) => java.install(root),
            Runtime::Disabled => Ok(()),
        }
    }

    /// Command that launches java for this runtime, relative to `root` when local
    pub fn java_command(&self, root: &Path) -> PathBuf {
        match self {
            Runtime::Java(_) => find_java(&root.join(RUNTIME_DIR))
                .and_then(|p| p.strip_prefix(root).ok().map(Path::to_path_buf))
                .unwrap_or_else(|| PathBuf::from(java_executable())),
            Runtime::Disabled => PathBuf::from(java_executable()),
        }
    }

    /// Absolute java command for running tools from any working directory
    ///
    /// A relative `root` is resolved against the current directory, so the
    /// result stays valid when a child process runs with `root` as its cwd.
    pub fn java_path(&self, root: &Path) -> PathBuf {
        let command = self.java_command(root);
        if command.components().count() > 1 {
            let local = root.join(command);
            std::path::absolute(&local).unwrap_or(local)
        } else {
            command
        }
    }
}

impl JavaRuntime {
    /// Ask the Adoptium API for the newest JRE of `requested`'s feature version
    pub async fn resolve(
        client: &reqwest::Client,
        adoptium_url: &str,
        requested: &str,
    ) -> Result<Self> {
        let feature_version = feature_version(requested)?;
        let url = Url::parse(&format!(
            "{}/v3/assets/latest/{}/hotspot?architecture={}&image_type=jre&os={}&vendor=eclipse",
            adoptium_url.trim_end_matches('/'),
            feature_version,
            detect_arch(),
            detect_os()
        ))?;

        debug!(%url, "resolving java runtime");
        let assets: Vec<AdoptiumAsset> = fetch::get_json(client, &url).await?;
        let asset = assets.into_iter().next().ok_or_else(|| {
            Error::Other(format!(
                "No Java {} runtime available for {}/{}",
                feature_version,
                detect_os(),
                detect_arch()
            ))
        })?;

        let package = asset.binary.package;
        let archive = FileEntry::new(
            RUNTIME_DIR,
            Url::parse(&package.link)?,
            &package.name,
            HashAlgorithm::Sha256,
            &package.checksum,
        )?;

        info!(release = %asset.release_name, "selected java runtime");
        Ok(Self {
            feature_version,
            release_name: asset.release_name,
            archive,
        })
    }

    pub fn feature_version(&self) -> u32 {
        self.feature_version
    }

    pub fn release_name(&self) -> &str {
        &self.release_name
    }

    pub fn archive(&self) -> &FileEntry {
        &self.archive
    }

    /// Extract the downloaded archive into the runtime directory and delete it
    fn install(&self, root: &Path) -> Result<()> {
        let archive_path = self.archive.local_path(root);
        let runtime_dir = self.archive.local_dir(root);

        if !archive_path.exists() {
            return Err(Error::Other(format!(
                "Java runtime archive {} was not downloaded",
                archive_path.display()
            )));
        }

        if !self.archive.file_name().ends_with(".tar.gz") {
            return Err(Error::Other(format!(
                "Cannot unpack {}: only .tar.gz runtimes are supported. Install Java manually and use --no-java",
                self.archive.file_name()
            )));
        }

        // Replace any runtime left by a previous install
        if let Ok(entries) = fs::read_dir(&runtime_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    fs::remove_dir_all(&path)?;
                }
            }
        }

        info!(archive = %archive_path.display(), "extracting java runtime");
        let tar_gz = File::open(&archive_path)?;
        let mut archive = Archive::new(GzDecoder::new(tar_gz));
        archive.unpack(&runtime_dir)?;

        fs::remove_file(&archive_path)?;

        if find_java(&runtime_dir).is_none() {
            return Err(Error::Other(format!(
                "Extracted runtime in {} does not contain a java executable",
                runtime_dir.display()
            )));
        }

        Ok(())
    }
}

/// Parse the feature version out of "17", "17.0.7+7" or legacy "1.8.0_292"
fn feature_version(requested: &str) -> Result<u32> {
    let invalid = || Error::Validation(format!("invalid java version '{}'", requested));

    let mut parts = requested.trim().split(|c: char| !c.is_ascii_digit());
    let first: u32 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;

    if first == 1 {
        return parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid);
    }
    Ok(first)
}

/// Locate `bin/java` inside an unpacked runtime directory
fn find_java(runtime_dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(runtime_dir).ok()?;
    for entry in entries.flatten() {
        let base = entry.path();
        for candidate in [
            base.join("bin").join(java_executable()),
            base.join("Contents").join("Home").join("bin").join(java_executable()),
        ] {
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}
