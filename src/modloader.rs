//! Mod loader provider
//!
//! The loader is chosen from the manifest's targets: a `modloader` target
//! selects that loader (only Forge is supported), otherwise a `game` target
//! installs the plain vanilla server, otherwise nothing is installed.
//!
//! # Examples
//!
//! ```no_run
//! use serverpack::{ApiConfig, ModLoader, PackManifest};
//!
//! # async fn example(manifest: PackManifest) -> serverpack::Result<()> {
//! let client = reqwest::Client::new();
//! let loader = ModLoader::resolve(&manifest, &client, &ApiConfig::default()).await?;
//! for entry in loader.downloads() {
//!     println!("loader needs {}", entry.full_path());
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::ApiConfig;
use crate::entry::{FileEntry, HashAlgorithm};
use crate::fetch;
use crate::manifest::{PackManifest, TargetKind};
use crate::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info, warn};
use url::Url;

/// How the server is started once the loader is installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    /// `java -jar <jar>`
    Jar(String),
    /// `java @<args file>`, one argument file per platform
    ArgsFiles { unix: String, windows: String },
}

#[derive(Debug, Clone)]
pub enum ModLoader {
    Forge(Forge),
    Vanilla(Vanilla),
    None,
}

#[derive(Debug, Clone)]
pub struct Forge {
    game_version: String,
    version: String,
    installer: FileEntry,
}

#[derive(Debug, Clone)]
pub struct Vanilla {
    game_version: String,
    server: FileEntry,
}

impl ModLoader {
    /// Select and resolve the loader for `manifest`
    pub async fn resolve(
        manifest: &PackManifest,
        client: &reqwest::Client,
        api: &ApiConfig,
    ) -> Result<Self> {
        let game_version = manifest.game_version();

        if let Some(target) = manifest.target(TargetKind::Modloader) {
            return match target.name.to_ascii_lowercase().as_str() {
                "forge" => {
                    let game_version = game_version.ok_or_else(|| {
                        Error::InvalidManifest("forge target requires a game target".to_string())
                    })?;
                    let forge =
                        Forge::resolve(client, &api.forge_maven_url, game_version, &target.version)
                            .await?;
                    Ok(ModLoader::Forge(forge))
                }
                _ => Err(Error::UnsupportedModLoader(target.name.clone())),
            };
        }

        match game_version {
            Some(version) => {
                let vanilla = Vanilla::resolve(client, &api.mojang_manifest_url, version).await?;
                Ok(ModLoader::Vanilla(vanilla))
            }
            None => Ok(ModLoader::None),
        }
    }

    pub fn downloads(&self) -> Vec<FileEntry> {
        match self {
            ModLoader::Forge(forge) => vec![forge.installer.clone()],
            ModLoader::Vanilla(vanilla) => vec![vanilla.server.clone()],
            ModLoader::None => Vec::new(),
        }
    }

    /// Run post-download install steps with the given java command
    pub fn install(&self, root: &Path, java: &Path) -> Result<()> {
        match self {
            ModLoader::Forge(forge) => forge.install(root, java),
            ModLoader::Vanilla(_) | ModLoader::None => Ok(()),
        }
    }

    /// What the start scripts should run, if anything is installed
    pub fn launch_target(&self, root: &Path) -> Option<LaunchTarget> {
        match self {
            ModLoader::Forge(forge) => forge.launch_target(root),
            ModLoader::Vanilla(vanilla) => {
                Some(LaunchTarget::Jar(vanilla.server.file_name().to_string()))
            }
            ModLoader::None => None,
        }
    }
}

impl fmt::Display for ModLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModLoader::Forge(forge) => write!(f, "forge {}-{}", forge.game_version, forge.version),
            ModLoader::Vanilla(vanilla) => write!(f, "vanilla {}", vanilla.game_version),
            ModLoader::None => f.write_str("none"),
        }
    }
}

impl Forge {
    /// Locate the installer jar and its published sha1 on the Forge maven
    pub async fn resolve(
        client: &reqwest::Client,
        maven_url: &str,
        game_version: &str,
        version: &str,
    ) -> Result<Self> {
        let coordinate = format!("{}-{}", game_version, version);
        let file_name = format!("forge-{}-installer.jar", coordinate);
        let url = Url::parse(&format!(
            "{}/net/minecraftforge/forge/{}/{}",
            maven_url.trim_end_matches('/'),
            coordinate,
            file_name
        ))?;
        let sha1_url = Url::parse(&format!("{}.sha1", url))?;

        debug!(%sha1_url, "fetching forge installer checksum");
        let body = fetch::get_bytes(client, &sha1_url).await?;
        let sha1 = String::from_utf8_lossy(&body)
            .split_whitespace()
            .next()
            .map(str::to_string)
            .ok_or_else(|| Error::Fetch {
                url: sha1_url.to_string(),
                reason: "empty checksum file".to_string(),
            })?;

        let installer = FileEntry::new("", url, &file_name, HashAlgorithm::Sha1, &sha1)?;

        Ok(Self {
            game_version: game_version.to_string(),
            version: version.to_string(),
            installer,
        })
    }

    fn coordinate(&self) -> String {
        format!("{}-{}", self.game_version, self.version)
    }

    /// Run the installer headless, then remove it and its log
    fn install(&self, root: &Path, java: &Path) -> Result<()> {
        let installer = self.installer.local_path(root);

        println!("Invoking forge {} installer.", self.version);
        println!("================= FORGE INSTALL BEGINS =================");
        let status = Command::new(java)
            .arg("-jar")
            .arg(self.installer.file_name())
            .arg("--installServer")
            .current_dir(root)
            .status();
        println!("=================  FORGE INSTALL ENDS  =================");

        let status = status.map_err(|e| {
            Error::Other(format!("Failed to run {}: {}", java.display(), e))
        })?;
        if !status.success() {
            return Err(Error::Other(format!(
                "forge {} installer exited with {}",
                self.version, status
            )));
        }

        if self.launch_target(root).is_none() {
            return Err(Error::Other(format!(
                "forge {} installer finished but no server jar was produced",
                self.version
            )));
        }

        let mut log = installer.clone().into_os_string();
        log.push(".log");
        for path in [installer.as_path(), Path::new(&log)] {
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "cannot remove installer file"),
            }
        }

        info!(version = %self.version, "forge installed");
        Ok(())
    }

    fn launch_target(&self, root: &Path) -> Option<LaunchTarget> {
        let coordinate = self.coordinate();

        for jar in [
            format!("forge-{}.jar", coordinate),
            format!("forge-{}-universal.jar", coordinate),
        ] {
            if root.join(&jar).is_file() {
                return Some(LaunchTarget::Jar(jar));
            }
        }

        // Forge for 1.17+ launches through argument files
        let args_dir = format!("libraries/net/minecraftforge/forge/{}", coordinate);
        if root.join(&args_dir).join("unix_args.txt").is_file() {
            return Some(LaunchTarget::ArgsFiles {
                unix: format!("{}/unix_args.txt", args_dir),
                windows: format!("{}/win_args.txt", args_dir),
            });
        }

        None
    }
}

#[derive(Debug, Deserialize)]
struct VersionManifest {
    versions: Vec<VersionRef>,
}

#[derive(Debug, Deserialize)]
struct VersionRef {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct VersionDetails {
    downloads: VersionDownloads,
}

#[derive(Debug, Deserialize)]
struct VersionDownloads {
    server: Option<DownloadRef>,
}

#[derive(Debug, Deserialize)]
struct DownloadRef {
    sha1: String,
    url: String,
}

impl Vanilla {
    /// Find the server jar for `game_version` in the Mojang version manifest
    pub async fn resolve(
        client: &reqwest::Client,
        manifest_url: &str,
        game_version: &str,
    ) -> Result<Self> {
        let manifest: VersionManifest = fetch::get_json(client, &Url::parse(manifest_url)?).await?;

        let version = manifest
            .versions
            .into_iter()
            .find(|v| v.id == game_version)
            .ok_or_else(|| Error::Other(format!("Unknown game version '{}'", game_version)))?;

        let details: VersionDetails = fetch::get_json(client, &Url::parse(&version.url)?).await?;
        let server = details.downloads.server.ok_or_else(|| {
            Error::Other(format!("Game version '{}' has no server download", game_version))
        })?;

        let entry = FileEntry::new(
            "",
            Url::parse(&server.url)?,
            &format!("minecraft_server.{}.jar", game_version),
            HashAlgorithm::Sha1,
            &server.sha1,
        )?;

        Ok(Self {
            game_version: game_version.to_string(),
            server: entry,
        })
    }
}
