//! serverpack - install and upgrade modpack servers from declarative manifests
//!
//! A modpack manifest lists the files that make up a server together with the
//! game, mod loader and Java runtime it runs on. serverpack turns that
//! manifest into a working server directory, and on later runs upgrades the
//! directory in place:
//!
//! - Reconciles the installed file set against the new one by path and checksum
//! - Detects local modifications and asks before overwriting them
//! - Removes files dropped by the update and collapses emptied directories
//! - Downloads with bounded concurrency and live progress
//! - Installs a Temurin JRE and the Forge server, and writes start scripts
//!
//! # Examples
//!
//! ```no_run
//! use serverpack::{Config, DefaultsOracle, InstallOptions, Installer, ManifestSource};
//! use std::path::PathBuf;
//!
//! # async fn example() -> serverpack::Result<()> {
//! let config = Config::load()?;
//! let installer = Installer::new(&config, Box::new(DefaultsOracle))?;
//!
//! let options = InstallOptions::from_config(
//!     &config,
//!     PathBuf::from("server"),
//!     ManifestSource::Remote { pack: "35".into(), version: "2164".into() },
//! );
//! let summary = installer.install(&options).await?;
//! println!(
//!     "{} changed, {} new, {} removed",
//!     summary.reconciliation.changed.len(),
//!     summary.reconciliation.new.len(),
//!     summary.reconciliation.removed.len()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`entry`] - File entries, the unit of reconciliation and download
//! - [`integrity`] - Checksum verification of installed files
//! - [`reconcile`] - Classify installed vs requested files
//! - [`cleanup`] - Remove dropped files and empty directories
//! - [`download`] - Concurrent downloads with progress
//! - [`installer`] - Sequence a full install or update
//! - [`manifest`] - Parse modpack manifests from disk or the API
//! - [`runtime`] - Java runtime provider
//! - [`modloader`] - Mod loader provider
//! - [`config`] - User configuration management
//! - [`error`] - Error types and result handling

pub mod cleanup;
pub mod config;
pub mod download;
pub mod entry;
pub mod error;
pub mod fetch;
pub mod installer;
pub mod integrity;
pub mod launch;
pub mod manifest;
pub mod modloader;
pub mod platform;
pub mod prompt;
pub mod reconcile;
pub mod runtime;
pub mod state;

pub use cleanup::{cleanup, CleanupFailure, CleanupReport};
pub use config::{ApiConfig, Config};
pub use download::{
    DownloadEvent, DownloadHandle, DownloadOptions, DownloadReport, Downloader, EntryOutcome,
    EntryState, ProgressSnapshot,
};
pub use entry::{FileEntry, HashAlgorithm};
pub use error::{Error, Result};
pub use fetch::{Fetcher, HttpFetcher};
pub use installer::{
    verify_installation, InstallOptions, InstallSummary, Installer, ProgressCallback,
    VerifyReport,
};
pub use integrity::{file_digest, verify};
pub use launch::write_start_scripts;
pub use manifest::{LoadedManifest, ManifestSource, PackManifest, Specs, Target, TargetKind};
pub use modloader::{LaunchTarget, ModLoader};
pub use platform::{detect_arch, detect_os};
pub use prompt::{DecisionOracle, DefaultsOracle, DriftPrompt, FixedOracle, TerminalOracle};
pub use reconcile::{reconcile, ChangedEntry, ReconcileOptions, Reconciliation};
pub use runtime::{JavaRuntime, Runtime};
pub use state::{InstalledState, STATE_FILE_NAME};
