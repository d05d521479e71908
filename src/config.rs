//! User configuration management
//!
//! Configuration is stored in TOML format at `~/.serverpack/config.toml`.
//! Every section and key is optional; missing values fall back to defaults.
//!
//! # Examples
//!
//! ```no_run
//! use serverpack::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::load()?;
//! println!("Download threads: {}", config.download.threads);
//!
//! config.integrity.enabled = true;
//! config.save()?;
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// User configuration file (`~/.serverpack/config.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub integrity: IntegrityConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Remote endpoints
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub launch: LaunchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Maximum number of concurrent downloads
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Progress refresh interval in milliseconds
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Check each downloaded file against its manifest checksum
    #[serde(default = "default_true")]
    pub verify_downloads: bool,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_threads() -> usize {
    10
}

fn default_progress_interval_ms() -> u64 {
    200
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("serverpack/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            progress_interval_ms: default_progress_interval_ms(),
            verify_downloads: true,
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl DownloadConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Drift handling during updates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityConfig {
    /// Check unchanged files for local modification
    #[serde(default)]
    pub enabled: bool,

    /// Default to overwriting locally modified files that the update changes
    #[serde(default)]
    pub update_bias: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Download a Java runtime into the install root
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Java feature version used when the pack names no runtime
    #[serde(default = "default_java_version")]
    pub default_java_version: String,
}

fn default_java_version() -> String {
    "17".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_java_version: default_java_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_modpacks_url")]
    pub modpacks_url: String,

    #[serde(default = "default_adoptium_url")]
    pub adoptium_url: String,

    #[serde(default = "default_forge_maven_url")]
    pub forge_maven_url: String,

    #[serde(default = "default_mojang_manifest_url")]
    pub mojang_manifest_url: String,
}

fn default_modpacks_url() -> String {
    "https://api.modpacks.ch".to_string()
}

fn default_adoptium_url() -> String {
    "https://api.adoptium.net".to_string()
}

fn default_forge_maven_url() -> String {
    "https://maven.minecraftforge.net".to_string()
}

fn default_mojang_manifest_url() -> String {
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            modpacks_url: default_modpacks_url(),
            adoptium_url: default_adoptium_url(),
            forge_maven_url: default_forge_maven_url(),
            mojang_manifest_url: default_mojang_manifest_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Write start.sh / start.bat after installing
    #[serde(default = "default_true")]
    pub generate_start_script: bool,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            generate_start_script: true,
        }
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// Uses SERVERPACK_CONFIG_DIR if set, otherwise ~/.serverpack/config.toml
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(config_dir) = std::env::var("SERVERPACK_CONFIG_DIR") {
            return Ok(PathBuf::from(config_dir).join("config.toml"));
        }

        let home = dirs::home_dir()
            .ok_or_else(|| Error::Other("Could not find home directory".to_string()))?;

        Ok(home.join(".serverpack").join("config.toml"))
    }

    /// Load config from file, or the defaults if it doesn't exist
    ///
    /// Environment variable overrides:
    /// - `SERVERPACK_THREADS`: Overrides `download.threads`
    /// - `SERVERPACK_CONFIG_DIR`: Overrides the config directory location
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;

        let mut config = if !path.exists() {
            Self::default()
        } else {
            let content = fs::read_to_string(&path)?;
            toml::from_str(&content)?
        };

        if let Ok(threads) = std::env::var("SERVERPACK_THREADS") {
            config.download.threads = threads.trim().parse().map_err(|_| {
                Error::Other(format!("SERVERPACK_THREADS must be a number, got '{}'", threads))
            })?;
        }

        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Set a value by its dotted key, e.g. `download.threads`
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "download.threads" => self.download.threads = parse_value(key, value)?,
            "download.progress_interval_ms" => {
                self.download.progress_interval_ms = parse_value(key, value)?
            }
            "download.verify_downloads" => self.download.verify_downloads = parse_value(key, value)?,
            "download.connect_timeout_secs" => {
                self.download.connect_timeout_secs = parse_value(key, value)?
            }
            "download.user_agent" => self.download.user_agent = value.to_string(),
            "integrity.enabled" => self.integrity.enabled = parse_value(key, value)?,
            "integrity.update_bias" => self.integrity.update_bias = parse_value(key, value)?,
            "runtime.enabled" => self.runtime.enabled = parse_value(key, value)?,
            "runtime.default_java_version" => self.runtime.default_java_version = value.to_string(),
            "api.modpacks_url" => self.api.modpacks_url = value.to_string(),
            "api.adoptium_url" => self.api.adoptium_url = value.to_string(),
            "api.forge_maven_url" => self.api.forge_maven_url = value.to_string(),
            "api.mojang_manifest_url" => self.api.mojang_manifest_url = value.to_string(),
            "launch.generate_start_script" => {
                self.launch.generate_start_script = parse_value(key, value)?
            }
            _ => {
                return Err(Error::Other(format!(
                    "Unknown config key: {}\n\n\
                     Available keys:\n  \
                     download.threads, download.progress_interval_ms, download.verify_downloads,\n  \
                     download.connect_timeout_secs, download.user_agent,\n  \
                     integrity.enabled, integrity.update_bias,\n  \
                     runtime.enabled, runtime.default_java_version,\n  \
                     api.modpacks_url, api.adoptium_url, api.forge_maven_url, api.mojang_manifest_url,\n  \
                     launch.generate_start_script",
                    key
                )))
            }
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Other(format!("Invalid value '{}' for {}", value, key)))
}
