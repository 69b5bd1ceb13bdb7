use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use super::archive::{ArchiveInstaller, ExtractionSummary};
use super::filter::PathFilter;
use super::manifest::{ManifestKind, PackManifest};
use super::resolver::{ArtifactResolver, CurseForgeResolver, ModrinthResolver};
use crate::core::config::InstallConfig;
use crate::core::downloader::{ArtifactFetcher, DownloadReport, ParallelDownloader};
use crate::core::error::{StarterError, StarterResult};

/// Directory the downloaded mod artifacts end up in.
pub const MODS_DIR: &str = "mods";

/// Minecraft and loader versions, pinned by configuration or read from the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackVersions {
    pub mc_version: String,
    pub loader_version: String,
}

impl PackVersions {
    fn pinned(config: &InstallConfig) -> Self {
        Self {
            mc_version: config.mc_version.trim().to_string(),
            loader_version: config.loader_version.trim().to_string(),
        }
    }

    /// Configuration wins; only empty values are taken from the manifest.
    fn fill_from(&mut self, manifest: &PackManifest) {
        if self.mc_version.is_empty() {
            if let Some(v) = &manifest.mc_version {
                self.mc_version = v.clone();
            }
        }
        if self.loader_version.is_empty() {
            if let Some(v) = &manifest.loader_version {
                self.loader_version = v.clone();
            }
        }
    }
}

/// Everything a pack type needs from the outside world.
pub struct PackContext {
    pub config: InstallConfig,
    pub base_path: PathBuf,
    pub fetcher: Arc<dyn ArtifactFetcher>,
    pub client: Client,
}

impl PackContext {
    pub fn new(config: InstallConfig, fetcher: Arc<dyn ArtifactFetcher>, client: Client) -> Self {
        let base_path = config.base_install_path.clone();
        Self {
            config,
            base_path,
            fetcher,
            client,
        }
    }
}

/// Lifecycle shared by every zip based pack format.
#[async_trait]
pub trait PackType: Send + Sync {
    fn context(&self) -> &PackContext;
    fn versions(&self) -> &PackVersions;
    fn versions_mut(&mut self) -> &mut PackVersions;

    /// Metadata files this format recognizes, in lookup order.
    fn manifest_kinds(&self) -> &'static [ManifestKind];

    fn resolver(&self) -> StarterResult<Box<dyn ArtifactResolver>>;

    /// Hook for formats whose pack urls need rewriting before download.
    fn clean_url(&self, url: &str) -> String {
        url.to_string()
    }

    fn loader_version(&self) -> &str {
        &self.versions().loader_version
    }

    fn mc_version(&self) -> &str {
        &self.versions().mc_version
    }

    fn archive_installer(&self) -> ArchiveInstaller {
        ArchiveInstaller::new(
            self.context().base_path.clone(),
            self.manifest_kinds().iter().map(|k| k.file_name()).collect(),
            MODS_DIR,
        )
    }

    /// Fetch the pack (or use the configured local archive), extract it,
    /// then run the format specific post processing.
    async fn install_pack(&mut self) -> StarterResult<DownloadReport> {
        let ctx = self.context();
        let filter = PathFilter::compile(&ctx.config.ignore_files)?;
        let url = ctx.config.modpack_url.trim();

        if !url.is_empty() {
            let url = self.clean_url(url);
            self.archive_installer()
                .install_pack(ctx.fetcher.as_ref(), &url, &filter)
                .await?;
        } else if let Some(local) = ctx.config.local_file() {
            info!("Using local pack archive {:?}", local);
            self.handle_zip(&local, &filter).await?;
        } else {
            return Err(StarterError::MissingPackSource);
        }

        self.post_processing().await
    }

    async fn handle_zip(&self, archive: &Path, filter: &PathFilter) -> StarterResult<ExtractionSummary> {
        self.archive_installer()
            .extract_in_background(archive.to_path_buf(), filter)
            .await
    }

    /// Read the extracted manifest, settle the versions and download the mods.
    async fn post_processing(&mut self) -> StarterResult<DownloadReport> {
        let base_path = self.context().base_path.clone();
        let found = self
            .manifest_kinds()
            .iter()
            .map(|kind| (*kind, base_path.join(kind.file_name())))
            .find(|(_, path)| path.exists());

        let Some((kind, path)) = found else {
            warn!("No manifest found in {:?}. Skipping mod downloads", base_path);
            return Ok(DownloadReport::default());
        };

        info!("Reading {:?}", path);
        let manifest = kind.parse_file(&path)?;
        self.versions_mut().fill_from(&manifest);
        info!(
            "Pack targets Minecraft {} with loader {}",
            self.mc_version(),
            self.loader_version()
        );

        let ctx = self.context();
        let artifacts = self
            .resolver()?
            .resolve(manifest.mods, &ctx.config.ignore_projects())
            .await?;

        let name_filter = PathFilter::for_file_names_in(&ctx.config.ignore_files, MODS_DIR)?;
        let report = ParallelDownloader::new(ctx.fetcher.clone())
            .download(artifacts, &base_path.join(MODS_DIR), &name_filter)
            .await;

        info!(
            "Mods: {} downloaded, {} recovered, {} skipped, {} failed, {} manual",
            report.downloaded.len(),
            report.recovered.len(),
            report.skipped.len(),
            report.failed.len(),
            report.manual.len()
        );
        Ok(report)
    }
}

// ── CurseForge ──────────────────────────────────────────

pub struct CurseForgePack {
    ctx: PackContext,
    versions: PackVersions,
}

impl CurseForgePack {
    pub fn new(ctx: PackContext) -> Self {
        let versions = PackVersions::pinned(&ctx.config);
        Self { ctx, versions }
    }
}

#[async_trait]
impl PackType for CurseForgePack {
    fn context(&self) -> &PackContext {
        &self.ctx
    }

    fn versions(&self) -> &PackVersions {
        &self.versions
    }

    fn versions_mut(&mut self) -> &mut PackVersions {
        &mut self.versions
    }

    fn manifest_kinds(&self) -> &'static [ManifestKind] {
        &[ManifestKind::CurseManifest, ManifestKind::CurseInstance]
    }

    fn resolver(&self) -> StarterResult<Box<dyn ArtifactResolver>> {
        Ok(Box::new(CurseForgeResolver::new(
            self.ctx.client.clone(),
            self.ctx.config.curse_forge_api_key.clone(),
        )))
    }

    fn clean_url(&self, url: &str) -> String {
        if url.contains("curseforge.com") && !url.ends_with("/download") {
            format!("{}/download", url)
        } else {
            url.to_string()
        }
    }
}

// ── Modrinth ────────────────────────────────────────────

pub struct ModrinthPack {
    ctx: PackContext,
    versions: PackVersions,
}

impl ModrinthPack {
    pub fn new(ctx: PackContext) -> Self {
        let versions = PackVersions::pinned(&ctx.config);
        Self { ctx, versions }
    }
}

#[async_trait]
impl PackType for ModrinthPack {
    fn context(&self) -> &PackContext {
        &self.ctx
    }

    fn versions(&self) -> &PackVersions {
        &self.versions
    }

    fn versions_mut(&mut self) -> &mut PackVersions {
        &mut self.versions
    }

    fn manifest_kinds(&self) -> &'static [ManifestKind] {
        &[ManifestKind::ModrinthIndex]
    }

    fn resolver(&self) -> StarterResult<Box<dyn ArtifactResolver>> {
        Ok(Box::new(ModrinthResolver))
    }
}

// ── Dispatch ────────────────────────────────────────────

/// Closed set of supported pack formats, selected by name.
pub enum Pack {
    CurseForge(CurseForgePack),
    Modrinth(ModrinthPack),
}

impl Pack {
    pub fn from_name(name: &str, ctx: PackContext) -> StarterResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "curse" | "curseforge" => Ok(Self::CurseForge(CurseForgePack::new(ctx))),
            "modrinth" => Ok(Self::Modrinth(ModrinthPack::new(ctx))),
            _ => Err(StarterError::UnknownPackType(name.to_string())),
        }
    }

    pub fn as_pack_type(&self) -> &dyn PackType {
        match self {
            Pack::CurseForge(p) => p,
            Pack::Modrinth(p) => p,
        }
    }

    pub async fn install_pack(&mut self) -> StarterResult<DownloadReport> {
        match self {
            Pack::CurseForge(p) => p.install_pack().await,
            Pack::Modrinth(p) => p.install_pack().await,
        }
    }

    pub fn loader_version(&self) -> &str {
        self.as_pack_type().loader_version()
    }

    pub fn mc_version(&self) -> &str {
        self.as_pack_type().mc_version()
    }
}
