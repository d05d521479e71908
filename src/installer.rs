//! Install and update coordination
//!
//! [`Installer::install`] runs one install cycle against an install root:
//!
//! 1. read and parse the manifest, confirm with the operator
//! 2. resolve the runtime and mod loader providers
//! 3. reconcile the previously installed files against the new ones
//! 4. delete removed files
//! 5. download changed and new files plus the providers' artifacts
//! 6. run the providers' install steps
//! 7. record the manifest as the installed state and write start scripts
//!
//! The installed state is only written once downloads are done and any
//! failures were accepted, so an interrupted cycle is retried in full.
//!
//! # Examples
//!
//! ```no_run
//! use serverpack::{Config, InstallOptions, Installer, ManifestSource, TerminalOracle};
//! use std::path::PathBuf;
//!
//! # async fn example() -> serverpack::Result<()> {
//! let config = Config::load()?;
//! let installer = Installer::new(&config, Box::new(TerminalOracle::new(false)))?;
//!
//! let options = InstallOptions::from_config(
//!     &config,
//!     PathBuf::from("server"),
//!     ManifestSource::Local(PathBuf::from("modpack.json")),
//! );
//! let summary = installer.install(&options).await?;
//! println!("{} files downloaded", summary.downloads.succeeded());
//! # Ok(())
//! # }
//! ```

use crate::cleanup::{cleanup, CleanupReport};
use crate::config::{ApiConfig, Config};
use crate::download::{DownloadEvent, DownloadOptions, DownloadReport, Downloader};
use crate::entry::{ensure_unique, FileEntry};
use crate::fetch::HttpFetcher;
use crate::integrity;
use crate::launch;
use crate::manifest::{ManifestSource, PackManifest};
use crate::modloader::ModLoader;
use crate::prompt::DecisionOracle;
use crate::reconcile::{reconcile, ReconcileOptions, Reconciliation};
use crate::runtime::Runtime;
use crate::state::InstalledState;
use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Called for every download event of an install cycle
pub type ProgressCallback = Arc<dyn Fn(&DownloadEvent) + Send + Sync>;

/// Per-run install settings
#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub root: PathBuf,
    pub source: ManifestSource,
    pub reconcile: ReconcileOptions,
    pub download: DownloadOptions,
    /// Download a Java runtime instead of using `java` from the PATH
    pub runtime: bool,
    pub start_scripts: bool,
}

impl InstallOptions {
    /// Options with every setting taken from `config`
    pub fn from_config(config: &Config, root: PathBuf, source: ManifestSource) -> Self {
        Self {
            root,
            source,
            reconcile: ReconcileOptions {
                integrity: config.integrity.enabled,
                integrity_update: config.integrity.update_bias,
            },
            download: DownloadOptions {
                concurrency: config.download.threads,
                progress_interval: config.download.progress_interval(),
                verify: config.download.verify_downloads,
            },
            runtime: config.runtime.enabled,
            start_scripts: config.launch.generate_start_script,
        }
    }
}

/// What an install cycle did
#[derive(Debug)]
pub struct InstallSummary {
    pub manifest: PackManifest,
    /// A previous install was present
    pub upgrade: bool,
    pub reconciliation: Reconciliation,
    pub cleanup: CleanupReport,
    pub downloads: DownloadReport,
    /// Mod loader install failure, left for the operator to finish by hand
    pub loader_error: Option<String>,
    /// Start scripts written
    pub scripts: Vec<PathBuf>,
}

/// Result of checking an install root against its recorded state
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub valid: Vec<FileEntry>,
    pub drifted: Vec<FileEntry>,
    pub missing: Vec<FileEntry>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.drifted.is_empty() && self.missing.is_empty()
    }
}

/// Sequences manifest loading, reconciliation, cleanup, downloads and providers
pub struct Installer {
    fetcher: HttpFetcher,
    api: ApiConfig,
    default_java_version: String,
    oracle: Box<dyn DecisionOracle>,
    progress: Option<ProgressCallback>,
}

impl Installer {
    pub fn new(config: &Config, oracle: Box<dyn DecisionOracle>) -> Result<Self> {
        let fetcher = HttpFetcher::new(
            &config.download.user_agent,
            config.download.connect_timeout(),
        )?;

        Ok(Self {
            fetcher,
            api: config.api.clone(),
            default_java_version: config.runtime.default_java_version.clone(),
            oracle,
            progress: None,
        })
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    fn client(&self) -> &reqwest::Client {
        self.fetcher.client()
    }

    /// Run one install or update cycle
    pub async fn install(&self, options: &InstallOptions) -> Result<InstallSummary> {
        let root = options.root.as_path();
        fs::create_dir_all(root).map_err(|e| Error::fatal_io(root, e))?;

        let loaded = options
            .source
            .load(self.client(), &self.api.modpacks_url)
            .await?;
        let manifest = loaded.manifest;

        let upgrade = InstalledState::exists(root);
        let question = format!(
            "Continuing will install {} version {}{}. Do you wish to continue?",
            options.source,
            manifest.name,
            if upgrade { " as an update" } else { "" }
        );
        if !self.oracle.confirm(&question, true) {
            return Err(Error::Aborted("install declined".to_string()));
        }

        let files = manifest.file_entries()?;

        let runtime = Runtime::resolve(
            &manifest,
            options.runtime,
            &self.default_java_version,
            self.client(),
            &self.api.adoptium_url,
        )
        .await?;
        let loader = ModLoader::resolve(&manifest, self.client(), &self.api).await?;

        let provided: Vec<FileEntry> = loader
            .downloads()
            .into_iter()
            .chain(runtime.downloads())
            .collect();
        let requested: Vec<FileEntry> = files.iter().chain(&provided).cloned().collect();
        ensure_unique(&requested, "requested")?;

        let installed = if upgrade {
            self.installed_entries(root)?
        } else {
            Vec::new()
        };

        let reconciliation =
            reconcile(root, installed, files, options.reconcile, self.oracle.as_ref())?;

        let cleanup_report = cleanup(root, &reconciliation.removed);

        let mut downloads = reconciliation.downloads();
        downloads.extend(provided);
        let report = self.download(root, downloads, options.download).await?;

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            incomplete = report.incomplete(),
            "downloads finished"
        );

        let unfinished = report.failed() + report.incomplete();
        if unfinished > 0
            && !self.oracle.confirm(
                "Some downloads failed. Would you like to continue anyway?",
                true,
            )
        {
            return Err(Error::DownloadsFailed { failed: unfinished });
        }

        runtime.install(root)?;

        let loader_error = match loader.install(root, &runtime.java_path(root)) {
            Ok(()) => None,
            Err(e) => {
                warn!(loader = %loader, error = %e, "mod loader install failed");
                Some(e.to_string())
            }
        };

        InstalledState::save(root, &loaded.raw)?;

        let scripts = if options.start_scripts {
            match loader.launch_target(root) {
                Some(target) => launch::write_start_scripts(
                    root,
                    &manifest.specs,
                    &target,
                    &runtime.java_command(root),
                )?,
                None => {
                    warn!(loader = %loader, "nothing to launch, start scripts not written");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(InstallSummary {
            manifest,
            upgrade,
            reconciliation,
            cleanup: cleanup_report,
            downloads: report,
            loader_error,
            scripts,
        })
    }

    /// Reconcile without touching the install root
    ///
    /// Drift questions go to the oracle exactly as during an install.
    pub async fn plan(
        &self,
        root: &Path,
        source: &ManifestSource,
        options: ReconcileOptions,
    ) -> Result<Reconciliation> {
        let loaded = source.load(self.client(), &self.api.modpacks_url).await?;
        let files = loaded.manifest.file_entries()?;

        let installed = match InstalledState::load(root)? {
            Some(state) => state.entries()?,
            None => Vec::new(),
        };

        reconcile(root, installed, files, options, self.oracle.as_ref())
    }

    /// Entries of the previous install; a corrupt record may be treated as no install
    fn installed_entries(&self, root: &Path) -> Result<Vec<FileEntry>> {
        let parsed = match InstalledState::load(root) {
            Ok(Some(state)) => state.entries(),
            Ok(None) => return Ok(Vec::new()),
            Err(e) => Err(e),
        };

        match parsed {
            Ok(entries) => Ok(entries),
            Err(e) => {
                let question = format!(
                    "An error occurred whilst trying to read the previous installation at {}: {}\n\
                     Would you like to continue anyway? You should probably delete folders with mods and configs in it, first!",
                    root.display(),
                    e
                );
                if self.oracle.confirm(&question, true) {
                    warn!(root = %root.display(), error = %e, "continuing over a corrupt installation");
                    Ok(Vec::new())
                } else {
                    Err(Error::Aborted("corrupted previous installation".to_string()))
                }
            }
        }
    }

    async fn download(
        &self,
        root: &Path,
        entries: Vec<FileEntry>,
        options: DownloadOptions,
    ) -> Result<DownloadReport> {
        let downloader = Downloader::new(self.fetcher.clone(), root, options);
        let mut handle = downloader.start(entries)?;
        let mut interrupted = false;

        loop {
            tokio::select! {
                event = handle.next_event() => match event {
                    Some(event) => {
                        if let Some(progress) = &self.progress {
                            progress(&event);
                        }
                    }
                    None => break,
                },
                signal = tokio::signal::ctrl_c(), if !interrupted => {
                    // A failed handler registration only disables interruption
                    interrupted = true;
                    if signal.is_ok() {
                        warn!("interrupted, waiting for running downloads to finish");
                        handle.abort();
                    }
                }
            }
        }

        handle.wait().await
    }
}

/// Check every recorded file of the installation at `root`
pub fn verify_installation(root: &Path) -> Result<VerifyReport> {
    let state = InstalledState::load(root)?.ok_or_else(|| {
        Error::Other(format!("No installation found at {}", root.display()))
    })?;

    let mut report = VerifyReport::default();
    for entry in state.entries()? {
        match integrity::file_digest(&entry.local_path(root), entry.hash_algorithm()) {
            Ok(digest) if digest.eq_ignore_ascii_case(entry.hash_value()) => report.valid.push(entry),
            Ok(_) => report.drifted.push(entry),
            Err(e) if e.kind() == io::ErrorKind::NotFound => report.missing.push(entry),
            Err(_) => report.drifted.push(entry),
        }
    }

    Ok(report)
}
