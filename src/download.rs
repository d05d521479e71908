//! Concurrent download of a file set with live progress
//!
//! [`Downloader::start`] creates every destination directory, then hands the
//! entries to a control loop that keeps at most `concurrency` fetches in
//! flight. The loop wakes on either a finished fetch or the progress tick and
//! publishes [`DownloadEvent`]s until every entry has a terminal state (or the
//! run was aborted), then sends exactly one [`DownloadEvent::Finished`].
//!
//! # Examples
//!
//! ```no_run
//! use serverpack::{DownloadEvent, DownloadOptions, Downloader, HttpFetcher};
//! use std::time::Duration;
//!
//! # async fn example(entries: Vec<serverpack::FileEntry>) -> serverpack::Result<()> {
//! let fetcher = HttpFetcher::new("serverpack", Duration::from_secs(30))?;
//! let downloader = Downloader::new(fetcher, "server", DownloadOptions::default());
//!
//! let mut handle = downloader.start(entries)?;
//! while let Some(event) = handle.next_event().await {
//!     if let DownloadEvent::Progress(p) = event {
//!         println!("{}/{} done, {} failed", p.succeeded, p.total, p.failed);
//!     }
//! }
//! let report = handle.wait().await?;
//! println!("{} failed", report.failed());
//! # Ok(())
//! # }
//! ```

use crate::entry::FileEntry;
use crate::fetch::Fetcher;
use crate::{integrity, Error, Result};
use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Tuning for one download run
#[derive(Debug, Clone, Copy)]
pub struct DownloadOptions {
    /// Maximum number of fetches in flight (at least 1)
    pub concurrency: usize,
    /// Interval between progress samples
    pub progress_interval: Duration,
    /// Verify each fetched file against its entry's digest
    pub verify: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            concurrency: 10,
            progress_interval: Duration::from_millis(200),
            verify: true,
        }
    }
}

/// Point-in-time counts for a run
///
/// `succeeded + failed + in_progress == total` holds for every snapshot;
/// `in_progress` counts entries without a terminal state, queued or in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub in_progress: usize,
}

/// Counters owned by one run and shared with its handle
#[derive(Debug)]
pub struct ProgressCounters {
    total: usize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl ProgressCounters {
    fn new(total: usize) -> Self {
        Self {
            total,
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    fn record_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let succeeded = self.succeeded.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        ProgressSnapshot {
            total: self.total,
            succeeded,
            failed,
            in_progress: self.total - succeeded - failed,
        }
    }
}

/// Events published while a run is in progress
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// Periodic sample
    Progress(ProgressSnapshot),
    /// One entry failed; the run continues
    Failed { entry: FileEntry, error: String },
    /// Final sample; no events follow
    Finished(ProgressSnapshot),
}

/// Terminal state of one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    Succeeded { bytes: u64 },
    Failed(String),
    /// Never dispatched, or still in flight when the run ended
    Incomplete,
}

#[derive(Debug, Clone)]
pub struct EntryOutcome {
    pub entry: FileEntry,
    pub state: EntryState,
}

/// Aggregate result of a run, one outcome per submitted entry
#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    pub outcomes: Vec<EntryOutcome>,
    /// The run stopped dispatching because it was aborted
    pub aborted: bool,
}

impl DownloadReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, EntryState::Succeeded { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, EntryState::Failed(_)))
    }

    pub fn incomplete(&self) -> usize {
        self.count(|s| matches!(s, EntryState::Incomplete))
    }

    pub fn bytes(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|o| match o.state {
                EntryState::Succeeded { bytes } => bytes,
                _ => 0,
            })
            .sum()
    }

    /// Entries that failed, with the reason
    pub fn failures(&self) -> impl Iterator<Item = (&FileEntry, &str)> {
        self.outcomes.iter().filter_map(|o| match &o.state {
            EntryState::Failed(reason) => Some((&o.entry, reason.as_str())),
            _ => None,
        })
    }

    fn count(&self, predicate: impl Fn(&EntryState) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.state)).count()
    }
}

/// Fetches file sets below an install root
pub struct Downloader<F> {
    fetcher: Arc<F>,
    root: PathBuf,
    options: DownloadOptions,
}

impl<F: Fetcher> Downloader<F> {
    pub fn new(fetcher: F, root: impl Into<PathBuf>, options: DownloadOptions) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            root: root.into(),
            options,
        }
    }

    /// Create destination directories and start fetching `entries`
    ///
    /// Must be called from within a tokio runtime. Fails with
    /// [`Error::FatalIo`] before anything is fetched if a destination
    /// directory cannot be created.
    pub fn start(&self, entries: Vec<FileEntry>) -> Result<DownloadHandle> {
        prepare_directories(&self.root, &entries)?;

        let counters = Arc::new(ProgressCounters::new(entries.len()));
        let aborted = Arc::new(AtomicBool::new(false));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let run = Run {
            fetcher: Arc::clone(&self.fetcher),
            root: self.root.clone(),
            options: self.options,
            counters: Arc::clone(&counters),
            aborted: Arc::clone(&aborted),
            events: events_tx,
        };
        let task = tokio::spawn(run.execute(entries));

        Ok(DownloadHandle {
            events: events_rx,
            counters,
            aborted,
            task,
        })
    }
}

/// Handle to a running download
pub struct DownloadHandle {
    events: mpsc::UnboundedReceiver<DownloadEvent>,
    counters: Arc<ProgressCounters>,
    aborted: Arc<AtomicBool>,
    task: JoinHandle<DownloadReport>,
}

impl DownloadHandle {
    /// Next event, or `None` once [`DownloadEvent::Finished`] has been delivered
    pub async fn next_event(&mut self) -> Option<DownloadEvent> {
        self.events.recv().await
    }

    /// Current counts, independent of the event stream
    pub fn progress(&self) -> ProgressSnapshot {
        self.counters.snapshot()
    }

    /// Stop dispatching new fetches; fetches in flight run to completion
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// Wait for the run to end and return its report
    pub async fn wait(self) -> Result<DownloadReport> {
        self.task
            .await
            .map_err(|e| Error::Other(format!("download orchestrator failed: {}", e)))
    }
}

struct Run<F> {
    fetcher: Arc<F>,
    root: PathBuf,
    options: DownloadOptions,
    counters: Arc<ProgressCounters>,
    aborted: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<DownloadEvent>,
}

impl<F: Fetcher> Run<F> {
    async fn execute(self, entries: Vec<FileEntry>) -> DownloadReport {
        let concurrency = self.options.concurrency.max(1);
        let mut states = vec![EntryState::Incomplete; entries.len()];
        let mut queue: VecDeque<usize> = (0..entries.len()).collect();
        let mut in_flight: JoinSet<(usize, Result<u64>)> = JoinSet::new();

        let mut ticker = tokio::time::interval(self.options.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if !self.aborted.load(Ordering::SeqCst) {
                while in_flight.len() < concurrency {
                    let Some(index) = queue.pop_front() else {
                        break;
                    };
                    self.dispatch(&mut in_flight, index, entries[index].clone());
                }
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                Some(joined) = in_flight.join_next() => {
                    let (index, result) = match joined {
                        Ok(pair) => pair,
                        // Tasks catch their own panics, so a join error means the runtime is shutting down.
                        Err(e) => {
                            warn!(error = %e, "download task was cancelled");
                            break;
                        }
                    };
                    states[index] = self.settle(&entries[index], result);
                }
                _ = ticker.tick() => {
                    let _ = self.events.send(DownloadEvent::Progress(self.counters.snapshot()));
                }
            }
        }

        let final_snapshot = self.counters.snapshot();
        debug!(
            succeeded = final_snapshot.succeeded,
            failed = final_snapshot.failed,
            incomplete = final_snapshot.in_progress,
            "download run finished"
        );
        let _ = self.events.send(DownloadEvent::Finished(final_snapshot));

        DownloadReport {
            outcomes: entries
                .into_iter()
                .zip(states)
                .map(|(entry, state)| EntryOutcome { entry, state })
                .collect(),
            aborted: self.aborted.load(Ordering::SeqCst) && !queue.is_empty(),
        }
    }

    fn dispatch(
        &self,
        in_flight: &mut JoinSet<(usize, Result<u64>)>,
        index: usize,
        entry: FileEntry,
    ) {
        let fetcher = Arc::clone(&self.fetcher);
        let root = self.root.clone();
        let verify = self.options.verify;

        debug!(path = %entry.full_path(), url = %entry.url(), "starting download");

        let fetch = async move { fetch_entry(fetcher.as_ref(), &root, &entry, verify).await };

        in_flight.spawn(async move {
            let result = match tokio::spawn(fetch).await {
                Ok(result) => result,
                Err(e) => Err(Error::Other(format!("download task panicked: {}", e))),
            };
            (index, result)
        });
    }

    fn settle(&self, entry: &FileEntry, result: Result<u64>) -> EntryState {
        match result {
            Ok(bytes) => {
                debug!(path = %entry.full_path(), bytes, "download complete");
                self.counters.record_succeeded();
                EntryState::Succeeded { bytes }
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(path = %entry.full_path(), error = %reason, "download failed");
                self.counters.record_failed();
                let _ = self.events.send(DownloadEvent::Failed {
                    entry: entry.clone(),
                    error: reason.clone(),
                });
                EntryState::Failed(reason)
            }
        }
    }
}

async fn fetch_entry<F: Fetcher>(
    fetcher: &F,
    root: &Path,
    entry: &FileEntry,
    verify: bool,
) -> Result<u64> {
    let dest = entry.local_path(root);
    let bytes = fetcher.fetch(entry.url(), &dest).await?;

    if verify {
        let root = root.to_path_buf();
        let check = entry.clone();
        let valid = tokio::task::spawn_blocking(move || integrity::verify(&root, &check))
            .await
            .map_err(|e| Error::Other(format!("verification task failed: {}", e)))?;

        if !valid {
            return Err(Error::Fetch {
                url: entry.url().to_string(),
                reason: format!(
                    "{} checksum mismatch (expected {})",
                    entry.hash_algorithm(),
                    entry.hash_value()
                ),
            });
        }
    }

    Ok(bytes)
}

/// Create the install root and every destination directory up front
fn prepare_directories(root: &Path, entries: &[FileEntry]) -> Result<()> {
    fs::create_dir_all(root).map_err(|e| Error::fatal_io(root, e))?;

    let dirs: BTreeSet<PathBuf> = entries.iter().map(|e| e.local_dir(root)).collect();
    for dir in dirs {
        fs::create_dir_all(&dir).map_err(|e| Error::fatal_io(&dir, e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::bytes_digest;
    use crate::HashAlgorithm;
    use std::collections::HashMap;
    use std::future::Future;
    use tempfile::TempDir;
    use tokio::sync::Notify;
    use url::Url;

    /// In-memory fetcher: serves configured bodies, fails unknown URLs
    #[derive(Default)]
    struct FakeFetcher {
        bodies: HashMap<String, Vec<u8>>,
        delay: Duration,
        current: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        started: Arc<Notify>,
    }

    impl FakeFetcher {
        fn serve(mut self, name: &str, body: &[u8]) -> Self {
            self.bodies.insert(url_for(name).to_string(), body.to_vec());
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    impl Fetcher for FakeFetcher {
        fn fetch(&self, url: &Url, dest: &Path) -> impl Future<Output = Result<u64>> + Send {
            let body = self.bodies.get(url.as_str()).cloned();
            let url = url.to_string();
            let dest = dest.to_path_buf();
            async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                self.started.notify_one();

                tokio::time::sleep(self.delay).await;
                self.current.fetch_sub(1, Ordering::SeqCst);

                match body {
                    Some(body) => {
                        fs::write(&dest, &body)?;
                        Ok(body.len() as u64)
                    }
                    None => Err(Error::Fetch {
                        url,
                        reason: "HTTP 404".to_string(),
                    }),
                }
            }
        }
    }

    fn url_for(name: &str) -> Url {
        Url::parse(&format!("https://files.example.com/{}", name)).unwrap()
    }

    fn entry_with(directory: &str, name: &str, body: &[u8]) -> FileEntry {
        FileEntry::new(
            directory,
            url_for(name),
            name,
            HashAlgorithm::Sha1,
            &bytes_digest(body, HashAlgorithm::Sha1),
        )
        .unwrap()
    }

    fn options(concurrency: usize) -> DownloadOptions {
        DownloadOptions {
            concurrency,
            progress_interval: Duration::from_millis(5),
            verify: true,
        }
    }

    async fn drain(handle: &mut DownloadHandle) -> Vec<DownloadEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }
        events
    }

    fn assert_snapshots_consistent(events: &[DownloadEvent], total: usize) {
        let mut last = ProgressSnapshot {
            total,
            in_progress: total,
            ..Default::default()
        };
        for event in events {
            let snapshot = match event {
                DownloadEvent::Progress(s) | DownloadEvent::Finished(s) => *s,
                DownloadEvent::Failed { .. } => continue,
            };
            assert_eq!(snapshot.total, total);
            assert_eq!(snapshot.succeeded + snapshot.failed + snapshot.in_progress, total);
            assert!(snapshot.succeeded >= last.succeeded);
            assert!(snapshot.failed >= last.failed);
            assert!(snapshot.in_progress <= last.in_progress);
            last = snapshot;
        }
    }

    #[tokio::test]
    async fn test_downloads_all_entries() {
        let temp_dir = TempDir::new().unwrap();
        let entries = vec![
            entry_with("mods", "a.jar", b"aaa"),
            entry_with("mods", "b.jar", b"bbbb"),
            entry_with("config/sub", "c.toml", b"c = 1"),
        ];
        let fetcher = FakeFetcher::default()
            .serve("a.jar", b"aaa")
            .serve("b.jar", b"bbbb")
            .serve("c.toml", b"c = 1");

        let downloader = Downloader::new(fetcher, temp_dir.path(), options(2));
        let mut handle = downloader.start(entries).unwrap();
        let events = drain(&mut handle).await;
        let report = handle.wait().await.unwrap();

        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded(), 3);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.incomplete(), 0);
        assert_eq!(report.bytes(), 12);
        assert!(!report.aborted);
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("config/sub/c.toml")).unwrap(),
            "c = 1"
        );

        assert_snapshots_consistent(&events, 3);
        let finished: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                DownloadEvent::Finished(s) => Some(*s),
                _ => None,
            })
            .collect();
        assert_eq!(finished.len(), 1, "completion is signalled exactly once");
        assert_eq!(finished[0].in_progress, 0);
        assert!(matches!(events.last(), Some(DownloadEvent::Finished(_))));
    }

    #[tokio::test]
    async fn test_failure_does_not_block_queue() {
        let temp_dir = TempDir::new().unwrap();
        let entries = vec![
            entry_with("mods", "a.jar", b"aaa"),
            entry_with("mods", "missing.jar", b"?"),
            entry_with("mods", "c.jar", b"ccc"),
        ];
        let fetcher = FakeFetcher::default()
            .serve("a.jar", b"aaa")
            .serve("c.jar", b"ccc");

        let downloader = Downloader::new(fetcher, temp_dir.path(), options(1));
        let mut handle = downloader.start(entries).unwrap();
        let events = drain(&mut handle).await;
        let report = handle.wait().await.unwrap();

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures[0].0.full_path(), "mods/missing.jar");
        assert!(failures[0].1.contains("HTTP 404"));

        assert!(events
            .iter()
            .any(|e| matches!(e, DownloadEvent::Failed { entry, .. } if entry.file_name() == "missing.jar")));
        assert_snapshots_consistent(&events, 3);
    }

    #[tokio::test]
    async fn test_checksum_mismatch_marks_entry_failed() {
        let temp_dir = TempDir::new().unwrap();
        let entries = vec![entry_with("mods", "a.jar", b"expected")];
        let fetcher = FakeFetcher::default().serve("a.jar", b"tampered");

        let downloader = Downloader::new(fetcher, temp_dir.path(), options(1));
        let report = downloader.start(entries).unwrap().wait().await.unwrap();

        assert_eq!(report.failed(), 1);
        assert!(report.failures().next().unwrap().1.contains("checksum mismatch"));
    }

    #[tokio::test]
    async fn test_verification_can_be_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let entries = vec![entry_with("mods", "a.jar", b"expected")];
        let fetcher = FakeFetcher::default().serve("a.jar", b"tampered");

        let mut opts = options(1);
        opts.verify = false;
        let downloader = Downloader::new(fetcher, temp_dir.path(), opts);
        let report = downloader.start(entries).unwrap().wait().await.unwrap();

        assert_eq!(report.succeeded(), 1);
    }

    #[tokio::test]
    async fn test_concurrency_bound_is_respected() {
        let temp_dir = TempDir::new().unwrap();
        let mut fetcher = FakeFetcher::default().with_delay(Duration::from_millis(20));
        let mut entries = Vec::new();
        for i in 0..8 {
            let name = format!("f{}.jar", i);
            fetcher = fetcher.serve(&name, name.as_bytes());
            entries.push(entry_with("mods", &name, name.as_bytes()));
        }

        let downloader = Downloader::new(fetcher, temp_dir.path(), options(3));
        let report = downloader.start(entries).unwrap().wait().await.unwrap();

        assert_eq!(report.succeeded(), 8);
        let peak = downloader.fetcher.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "at most 3 fetches in flight, saw {}", peak);
        assert!(peak >= 2, "fetches should overlap, saw {}", peak);
    }

    #[tokio::test]
    async fn test_abort_lets_in_flight_finish() {
        let temp_dir = TempDir::new().unwrap();
        let mut fetcher = FakeFetcher::default().with_delay(Duration::from_millis(20));
        let mut entries = Vec::new();
        for i in 0..5 {
            let name = format!("f{}.jar", i);
            fetcher = fetcher.serve(&name, name.as_bytes());
            entries.push(entry_with("mods", &name, name.as_bytes()));
        }
        let started = Arc::clone(&fetcher.started);

        let downloader = Downloader::new(fetcher, temp_dir.path(), options(1));
        let mut handle = downloader.start(entries).unwrap();

        started.notified().await;
        handle.abort();

        let events = drain(&mut handle).await;
        let report = handle.wait().await.unwrap();

        assert!(report.aborted);
        assert_eq!(report.succeeded(), 1, "the fetch in flight completes");
        assert_eq!(report.incomplete(), 4);
        assert_eq!(downloader.fetcher.calls.load(Ordering::SeqCst), 1);
        assert_snapshots_consistent(&events, 5);

        match events.last() {
            Some(DownloadEvent::Finished(s)) => assert_eq!(s.in_progress, 4),
            other => panic!("expected final snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        // A file where the "mods" directory should be.
        fs::write(temp_dir.path().join("mods"), b"not a directory").unwrap();
        let fetcher = FakeFetcher::default().serve("a.jar", b"aaa");

        let downloader = Downloader::new(fetcher, temp_dir.path(), options(1));
        let result = downloader.start(vec![entry_with("mods", "a.jar", b"aaa")]);

        assert!(matches!(result, Err(Error::FatalIo { .. })));
        assert_eq!(downloader.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_run_finishes_immediately() {
        let temp_dir = TempDir::new().unwrap();
        let downloader = Downloader::new(FakeFetcher::default(), temp_dir.path(), options(4));

        let mut handle = downloader.start(Vec::new()).unwrap();
        let events = drain(&mut handle).await;
        let report = handle.wait().await.unwrap();

        assert_eq!(report.total(), 0);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DownloadEvent::Finished(s) if s == ProgressSnapshot::default()));
    }
}
