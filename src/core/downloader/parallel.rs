use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{error, info, instrument, warn};

use super::artifact::ResolvedArtifact;
use super::client::ArtifactFetcher;
use crate::core::error::StarterError;
use crate::core::pack::PathFilter;

/// Outcome of a full two-pass download run.
///
/// Every input artifact lands in exactly one of the lists.
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Succeeded in the concurrent first pass.
    pub downloaded: Vec<ResolvedArtifact>,
    /// Failed once, succeeded in the sequential second pass.
    pub recovered: Vec<ResolvedArtifact>,
    /// Matched a file-name ignore rule and was never fetched.
    pub skipped: Vec<ResolvedArtifact>,
    /// Failed in both passes.
    pub failed: Vec<ResolvedArtifact>,
    /// No download URL; the user has to obtain these manually.
    pub manual: Vec<ResolvedArtifact>,
}

impl DownloadReport {
    pub fn total(&self) -> usize {
        self.downloaded.len()
            + self.recovered.len()
            + self.skipped.len()
            + self.failed.len()
            + self.manual.len()
    }
}

enum Outcome {
    Downloaded,
    Skipped,
    Failed(StarterError),
}

struct Progress {
    done: AtomicUsize,
    total: usize,
}

impl Progress {
    fn tick(&self) -> String {
        let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        format!("[{:>3}/{}]", n, self.total)
    }
}

/// Two-tier artifact downloader: a bounded concurrent pass followed by a
/// sequential retry of everything that failed.
pub struct ParallelDownloader {
    fetcher: Arc<dyn ArtifactFetcher>,
    /// Maximum number of downloads in flight during the first pass.
    concurrency: usize,
}

impl ParallelDownloader {
    pub fn new(fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        let concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            fetcher,
            concurrency,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Download `artifacts` into `target_dir`.
    ///
    /// Never fails as a whole: artifacts that fail both passes end up in
    /// [`DownloadReport::failed`].
    #[instrument(skip_all, fields(count = artifacts.len(), target = ?target_dir))]
    pub async fn download(
        &self,
        artifacts: Vec<ResolvedArtifact>,
        target_dir: &Path,
        ignore: &PathFilter,
    ) -> DownloadReport {
        let mut report = DownloadReport::default();

        let (attemptable, manual): (Vec<_>, Vec<_>) = artifacts
            .into_iter()
            .partition(|a| a.download_url.is_some());
        report.manual = manual;

        let progress = Progress {
            done: AtomicUsize::new(0),
            total: attemptable.len(),
        };

        info!(
            "Starting mod download: {} files, concurrency={}",
            attemptable.len(),
            self.concurrency
        );

        let first_pass: Vec<_> = stream::iter(attemptable)
            .map(|artifact| {
                let progress = &progress;
                async move {
                    let outcome = self
                        .process_single(&artifact, target_dir, ignore, progress)
                        .await;
                    (artifact, outcome)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut fallback = Vec::new();
        for (artifact, outcome) in first_pass {
            match outcome {
                Outcome::Downloaded => report.downloaded.push(artifact),
                Outcome::Skipped => report.skipped.push(artifact),
                Outcome::Failed(e) => {
                    error!("Failed to download mod {}: {}", artifact.display_name, e);
                    fallback.push(artifact);
                }
            }
        }

        if !fallback.is_empty() {
            info!("Retrying {} failed download(s) sequentially", fallback.len());
        }

        for artifact in fallback {
            match self
                .process_single(&artifact, target_dir, ignore, &progress)
                .await
            {
                Outcome::Downloaded => report.recovered.push(artifact),
                Outcome::Skipped => report.skipped.push(artifact),
                Outcome::Failed(e) => {
                    error!("Retry failed for {}: {}", artifact.display_name, e);
                    report.failed.push(artifact);
                }
            }
        }

        if !report.failed.is_empty() {
            warn!("Failed to download (a) mod(s):");
            for artifact in &report.failed {
                warn!("\t{}", artifact);
            }
        }

        for artifact in &report.manual {
            warn!(
                "Downloading {} is prohibited, please download it on your own.",
                artifact.display_name
            );
        }

        report
    }

    async fn process_single(
        &self,
        artifact: &ResolvedArtifact,
        target_dir: &Path,
        ignore: &PathFilter,
        progress: &Progress,
    ) -> Outcome {
        let Some(url) = artifact.download_url.as_deref() else {
            return Outcome::Skipped;
        };

        if let Some(glob) = ignore.matching_glob(&artifact.file_name) {
            info!(
                "{} Skipped ignored mod: {} (matches {})",
                progress.tick(),
                artifact.display_name,
                glob
            );
            return Outcome::Skipped;
        }

        let dest = target_dir.join(&artifact.file_name);
        match self.fetcher.fetch(url, &dest, artifact.hash.as_ref()).await {
            Ok(()) => {
                info!(
                    "{} Downloaded mod: {}",
                    progress.tick(),
                    artifact.display_name
                );
                Outcome::Downloaded
            }
            Err(e) => Outcome::Failed(e),
        }
    }
}
