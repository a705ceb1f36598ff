//! Scan orchestration.
//!
//! One pass walks every configured root, streams the records through a
//! single batching stage into the engine and, only once every batch is
//! acknowledged, sweeps the documents the pass did not see.

use crate::{CoreError, IndexerConfig, RunSummary, ScanIdGenerator, ScanStats};
use fsindex_indexer::{ExclusionMatcher, FileRecord, ScanId, ScanOptions, Scanner};
use fsindex_sync::{BatchSyncClient, SyncWriter};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Records in flight between the scanner thread and the batching stage.
const CHANNEL_CAPACITY: usize = 1024;

/// Stage of the current pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Start,
    Scanning,
    Batching,
    Sweeping,
    Done,
    Error,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Start => "start",
            RunPhase::Scanning => "scanning",
            RunPhase::Batching => "batching",
            RunPhase::Sweeping => "sweeping",
            RunPhase::Done => "done",
            RunPhase::Error => "error",
        };
        f.write_str(name)
    }
}

/// Raises the walker's stop flag when the receiving side goes away, whether
/// by error or by the pass future being dropped.
struct StopOnDrop(Arc<AtomicBool>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone)]
struct ScanRoot {
    path: PathBuf,
    name: String,
}

/// Drives scan passes against one engine.
pub struct ScanOrchestrator {
    roots: Vec<ScanRoot>,
    root_names: Vec<String>,
    excludes: Arc<ExclusionMatcher>,
    stability_window: Duration,
    batch_size: usize,
    writer: SyncWriter,
    ids: ScanIdGenerator,
    phase: RunPhase,
}

impl ScanOrchestrator {
    /// Create an orchestrator without touching the engine.
    pub fn new(config: &IndexerConfig, excludes: ExclusionMatcher, writer: SyncWriter) -> Self {
        let roots = config
            .roots
            .iter()
            .map(|root| ScanRoot {
                path: root.path.clone(),
                name: config.root_name_of(root).to_string(),
            })
            .collect();

        Self {
            roots,
            root_names: config.root_names(),
            excludes: Arc::new(excludes),
            stability_window: config.stability_window(),
            batch_size: config.batch_size.max(1),
            writer,
            ids: ScanIdGenerator::new(),
            phase: RunPhase::Start,
        }
    }

    /// Load the exclusion file, build the writer and ensure the schema.
    ///
    /// A schema failure is logged and tolerated; the first batch will
    /// surface a persistent problem.
    pub async fn prepare(
        config: &IndexerConfig,
        client: Arc<dyn BatchSyncClient>,
    ) -> Result<Self, CoreError> {
        let excludes = ExclusionMatcher::from_file(&config.excludes_file)?;
        let writer = crate::writer_for(config, client);

        if let Err(e) = writer.ensure_schema().await {
            warn!(error = %e, backend = writer.client().backend(), "ensure_schema_failed");
        }

        Ok(Self::new(config, excludes, writer))
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn writer(&self) -> &SyncWriter {
        &self.writer
    }

    /// Run one complete pass.
    ///
    /// # Errors
    /// Returns error when a batch or sweep fails after retries. No sweep is
    /// issued after a failed batch.
    pub async fn run(&mut self) -> Result<RunSummary, CoreError> {
        self.transition(RunPhase::Start);
        let scan_id = self.ids.next_id();
        let mut stats = ScanStats::new();

        info!(
            scan_id,
            roots = self.roots.len(),
            batch_size = self.batch_size,
            stability_secs = self.stability_window.as_secs(),
            excludes = self.excludes.len(),
            "scan_started"
        );

        match self.run_pass(scan_id, &mut stats).await {
            Ok(()) => {
                self.transition(RunPhase::Done);
                let summary = stats.summary(scan_id);
                info!(
                    scan_id,
                    duration_secs = summary.duration_secs,
                    files_scanned = summary.files_scanned,
                    files_skipped = summary.files_skipped,
                    files_indexed = summary.files_indexed,
                    files_deleted = summary.files_deleted,
                    errors = summary.errors,
                    files_per_sec = summary.files_per_sec,
                    "scan_complete"
                );
                Ok(summary)
            }
            Err(e) => {
                self.transition(RunPhase::Error);
                error!(scan_id, error = %e, files_indexed = stats.files_indexed, "scan_failed");
                Err(e)
            }
        }
    }

    async fn run_pass(&mut self, scan_id: ScanId, stats: &mut ScanStats) -> Result<(), CoreError> {
        let mut batch = Vec::with_capacity(self.batch_size);

        for root in self.roots.clone() {
            self.transition(RunPhase::Scanning);
            self.scan_root(&root, scan_id, &mut batch, stats).await?;
        }

        self.transition(RunPhase::Batching);
        self.flush(&mut batch, stats).await?;

        self.transition(RunPhase::Sweeping);
        for name in &self.root_names {
            let deleted = self.writer.sweep(name, scan_id).await?;
            stats.record_deleted(deleted);
        }
        Ok(())
    }

    /// Walk one root on the blocking pool, flushing full batches as records
    /// arrive.
    async fn scan_root(
        &self,
        root: &ScanRoot,
        scan_id: ScanId,
        batch: &mut Vec<FileRecord>,
        stats: &mut ScanStats,
    ) -> Result<(), CoreError> {
        info!(root_path = %root.path.display(), root_name = %root.name, "scanning_root");

        let scanner = Scanner::with_options(
            ScanOptions {
                root_name: root.name.clone(),
                stability_window: self.stability_window,
            },
            self.excludes.clone(),
        );
        let path = root.path.clone();
        let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY.min(self.batch_size));
        let stop = Arc::new(AtomicBool::new(false));
        let _stop_guard = StopOnDrop(stop.clone());

        let walker = tokio::task::spawn_blocking(move || {
            let mut scan = scanner.scan(&path, scan_id).with_stop(stop);
            for record in scan.by_ref() {
                // Receiver gone: the pass failed downstream.
                if tx.blocking_send(record).is_err() {
                    break;
                }
            }
            scan.counters()
        });

        while let Some(record) = rx.recv().await {
            batch.push(record);
            if batch.len() >= self.batch_size {
                self.flush(batch, stats).await?;
            }
        }

        let counters = walker
            .await
            .map_err(|e| CoreError::ScannerTask(e.to_string()))?;
        debug!(
            root_name = %root.name,
            files_scanned = counters.files_scanned,
            files_skipped = counters.files_skipped,
            errors = counters.errors,
            "root_scanned"
        );
        stats.record_scan(&counters);
        Ok(())
    }

    async fn flush(&self, batch: &mut Vec<FileRecord>, stats: &mut ScanStats) -> Result<(), CoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.writer.upsert_batch(batch).await?;
        stats.record_batch(batch.len());
        batch.clear();
        Ok(())
    }

    fn transition(&mut self, next: RunPhase) {
        if self.phase != next {
            debug!(from = %self.phase, to = %next, "phase_transition");
            self.phase = next;
        }
    }
}
