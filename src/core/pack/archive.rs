use std::fs::File;
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use zip::ZipArchive;

use tracing::{debug, error, info, instrument, warn};

use super::filter::PathFilter;
use crate::core::downloader::ArtifactFetcher;
use crate::core::error::{StarterError, StarterResult};

/// Where superseded directories are moved instead of being deleted.
pub const STAGING_DIR: &str = "OLD_TO_DELETE";
/// Archive namespace whose content is copied verbatim into the install root.
pub const OVERRIDES_PREFIX: &str = "overrides/";
/// Temporary name of the downloaded pack archive.
pub const DOWNLOADED_ARCHIVE: &str = "modpack-download.zip";

/// What a single extraction pass did.
#[derive(Debug, Default)]
pub struct ExtractionSummary {
    pub files_written: usize,
    /// Override paths skipped by the ignore filter.
    pub ignored: Vec<String>,
    /// Staging locations of directories moved aside.
    pub moved_aside: Vec<PathBuf>,
    /// Metadata files copied to the install root.
    pub metadata: Vec<PathBuf>,
}

/// Streams a pack archive onto the install root.
#[derive(Debug, Clone)]
pub struct ArchiveInstaller {
    dest_root: PathBuf,
    /// Top-level archive entries copied to `dest_root` regardless of overrides.
    metadata_files: Vec<&'static str>,
    /// Directory fully replaced by the download phase (e.g. `mods`).
    artifact_dir: &'static str,
}

impl ArchiveInstaller {
    pub fn new(
        dest_root: impl Into<PathBuf>,
        metadata_files: Vec<&'static str>,
        artifact_dir: &'static str,
    ) -> Self {
        Self {
            dest_root: dest_root.into(),
            metadata_files,
            artifact_dir,
        }
    }

    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.dest_root.join(STAGING_DIR)
    }

    /// Download the archive from `url` into the install root, then extract it.
    #[instrument(skip(self, fetcher, filter))]
    pub async fn install_pack(
        &self,
        fetcher: &dyn ArtifactFetcher,
        url: &str,
        filter: &PathFilter,
    ) -> StarterResult<ExtractionSummary> {
        let archive = self.dest_root.join(DOWNLOADED_ARCHIVE);
        info!("Downloading pack from {}", url);
        fetcher.fetch(url, &archive, None).await?;
        self.extract_in_background(archive, filter).await
    }

    /// Run [`ArchiveInstaller::extract`] on the blocking pool.
    pub async fn extract_in_background(
        &self,
        archive: PathBuf,
        filter: &PathFilter,
    ) -> StarterResult<ExtractionSummary> {
        let installer = self.clone();
        let filter = filter.clone();
        tokio::task::spawn_blocking(move || installer.extract(&archive, &filter))
            .await
            .map_err(|e| StarterError::Other(format!("extraction task failed: {}", e)))?
    }

    /// Single forward pass over the archive; entries are processed in
    /// directory order and never buffered as a whole.
    pub fn extract(&self, archive: &Path, filter: &PathFilter) -> StarterResult<ExtractionSummary> {
        let mut summary = ExtractionSummary::default();

        self.prepare_staging(&mut summary)?;

        info!("Starting to unzip files.");
        if let Err(e) = self.extract_entries(archive, filter, &mut summary) {
            error!("Could not unzip files: {}", e);
            return Err(e);
        }
        info!(
            "Done unzipping the files: {} written, {} ignored, {} moved aside",
            summary.files_written,
            summary.ignored.len(),
            summary.moved_aside.len()
        );

        Ok(summary)
    }

    /// Clear what a previous install staged, then move the artifact
    /// directory aside before anything is extracted.
    fn prepare_staging(&self, summary: &mut ExtractionSummary) -> StarterResult<()> {
        let staging = self.staging_dir();
        if staging.exists() {
            std::fs::remove_dir_all(&staging).map_err(StarterError::io(&staging))?;
        }

        let artifact_dir = self.dest_root.join(self.artifact_dir);
        if artifact_dir.exists() {
            let moved = move_aside(&artifact_dir, &staging.join(self.artifact_dir))?;
            info!("Moved the {} folder to {:?}", self.artifact_dir, moved);
            summary.moved_aside.push(moved);
        }
        Ok(())
    }

    fn extract_entries(
        &self,
        archive: &Path,
        filter: &PathFilter,
        summary: &mut ExtractionSummary,
    ) -> StarterResult<()> {
        let file = File::open(archive).map_err(StarterError::io(archive))?;
        let mut zip = ZipArchive::new(BufReader::new(file))?;

        for index in 0..zip.len() {
            let mut entry = zip.by_index(index)?;
            let name = entry.name().to_string();
            debug!("Entry in archive: {}", name);

            if self.metadata_files.iter().any(|m| *m == name) {
                let target = self.dest_root.join(&name);
                write_entry(&mut entry, &target)?;
                summary.metadata.push(target);
                continue;
            }

            let Some(relative) = name.strip_prefix(OVERRIDES_PREFIX) else {
                continue;
            };
            if relative.is_empty() {
                continue;
            }

            if filter.matches(relative) {
                debug!("Skipping {} as it is on the ignore list.", relative);
                summary.ignored.push(relative.to_string());
                continue;
            }

            let Some(safe) = entry.enclosed_name().and_then(|p| override_target(&p)) else {
                warn!("Skipping {} as it escapes the install root", name);
                continue;
            };
            let target = self.dest_root.join(&safe);

            if entry.is_dir() {
                if target.exists() {
                    let moved = move_aside(&target, &self.staging_dir().join(&safe))?;
                    debug!("Folder moved: {:?} -> {:?}", target, moved);
                    summary.moved_aside.push(moved);
                }
            } else {
                debug!("Copying zip entry to {:?}", target);
                write_entry(&mut entry, &target)?;
                summary.files_written += 1;
            }
        }

        Ok(())
    }
}

/// Path of an enclosed `overrides/...` entry relative to the install root.
///
/// `enclosed_name` still allows `..` that stays inside the archive root, so
/// anything climbing back out of `overrides` is refused here.
fn override_target(enclosed: &Path) -> Option<PathBuf> {
    let relative = enclosed.strip_prefix(OVERRIDES_PREFIX.trim_end_matches('/')).ok()?;
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    let relative: PathBuf = relative.components().collect();
    (!relative.as_os_str().is_empty()).then_some(relative)
}

fn write_entry(entry: &mut impl std::io::Read, target: &Path) -> StarterResult<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(StarterError::io(parent))?;
    }
    let mut out = File::create(target).map_err(StarterError::io(target))?;
    std::io::copy(entry, &mut out).map_err(StarterError::io(target))?;
    Ok(())
}

/// Move `source` to `target`, picking a numbered sibling when `target` is taken.
fn move_aside(source: &Path, target: &Path) -> StarterResult<PathBuf> {
    let mut destination = target.to_path_buf();
    let mut n = 1;
    while destination.exists() {
        let mut name = target.as_os_str().to_os_string();
        name.push(format!(".{}", n));
        destination = PathBuf::from(name);
        n += 1;
    }

    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent).map_err(StarterError::io(parent))?;
    }
    std::fs::rename(source, &destination).map_err(StarterError::io(source))?;
    Ok(destination)
}
