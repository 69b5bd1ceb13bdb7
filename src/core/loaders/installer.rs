use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use tokio::process::Command;
use tracing::{error, info, instrument, warn};

use super::eula::{check_eula, LicensePrompt, StdinPrompt};
use crate::core::config::InstallConfig;
use crate::core::downloader::ArtifactFetcher;
use crate::core::error::{StarterError, StarterResult};
use crate::core::launch::{Placeholders, ProcessRegistry};
use crate::core::pack::resolver::file_name_from_url;
use crate::core::state::LockState;

/// Temporary name of the downloaded loader installer.
pub const INSTALLER_FILE: &str = "installer.jar";
const INSTALLER_LABEL: &str = "loader-installer";

/// Downloads and runs the mod loader installer.
pub struct LoaderInstaller {
    fetcher: Arc<dyn ArtifactFetcher>,
    /// Template with `{{@loaderversion@}}` / `{{@mcversion@}}`.
    installer_url: String,
    installer_arguments: Vec<String>,
    sponge_bootstrapper: String,
    java: String,
    prompt: Arc<dyn LicensePrompt>,
    registry: ProcessRegistry,
}

impl LoaderInstaller {
    pub fn new(config: &InstallConfig, java: impl Into<String>, fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        Self {
            fetcher,
            installer_url: config.installer_url.clone(),
            installer_arguments: config.installer_arguments.clone(),
            sponge_bootstrapper: config.sponge_bootstrapper.clone(),
            java: java.into(),
            prompt: Arc::new(StdinPrompt),
            registry: ProcessRegistry::new(),
        }
    }

    /// Track the installer process so a termination signal stops it too.
    pub fn with_registry(mut self, registry: ProcessRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn LicensePrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn installer_url(&self, loader_version: &str, mc_version: &str) -> String {
        Placeholders::new(loader_version, mc_version).apply(&self.installer_url)
    }

    /// Install the loader into `dest_root` and record it in the lock file.
    ///
    /// Any download, spawn or exit-status failure is returned as
    /// [`StarterError::LoaderInstall`] and leaves the lock untouched.
    #[instrument(skip(self))]
    pub async fn install_loader(
        &self,
        dest_root: &Path,
        loader_version: &str,
        mc_version: &str,
    ) -> StarterResult<bool> {
        let url = self.installer_url(loader_version, mc_version);

        let installed = async {
            self.run_installer(dest_root, &url).await?;

            let mut lock = LockState::load(dest_root);
            lock.loader_installed = true;
            lock.loader_version = loader_version.to_string();
            lock.mc_version = mc_version.to_string();
            lock.save(dest_root)
        }
        .await;

        if let Err(e) = installed {
            error!("Problem while installing Loader from {}: {}", url, e);
            return Err(StarterError::LoaderInstall {
                url,
                source: Box::new(e),
            });
        }

        let root = dest_root.to_path_buf();
        let prompt = self.prompt.clone();
        match tokio::task::spawn_blocking(move || check_eula(&root, prompt.as_ref())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Error while checking EULA: {}", e),
            Err(e) => error!("EULA check did not finish: {}", e),
        }

        Ok(true)
    }

    async fn run_installer(&self, dest_root: &Path, url: &str) -> StarterResult<()> {
        let installer = dest_root.join(INSTALLER_FILE);

        info!("Attempting to download installer from {}", url);
        self.fetcher.fetch(url, &installer, None).await?;

        info!("Starting installation of Loader, installer output incoming");
        let installer_abs = std::path::absolute(&installer).unwrap_or_else(|_| installer.clone());
        let status = self.run_java(&installer_abs, dest_root).await;

        info!("Done installing loader, deleting installer!");
        if let Err(e) = tokio::fs::remove_file(&installer).await {
            warn!("Could not delete {:?}: {}", installer, e);
        }

        let status = status?;
        if !status.success() {
            return Err(StarterError::InstallerExit {
                code: status.code(),
            });
        }
        Ok(())
    }

    async fn run_java(&self, installer: &Path, dest_root: &Path) -> StarterResult<ExitStatus> {
        if self.registry.is_shutting_down() {
            return Err(StarterError::Other(
                "shutdown requested, not starting the installer".into(),
            ));
        }

        let mut child = Command::new(&self.java)
            .arg("-jar")
            .arg(installer)
            .args(&self.installer_arguments)
            .current_dir(dest_root)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(StarterError::io(&self.java))?;

        let pid = child.id();
        if let Some(pid) = pid {
            self.registry.register(pid, INSTALLER_LABEL);
        }
        let status = child.wait().await;
        if let Some(pid) = pid {
            self.registry.mark_exited(pid);
        }
        status.map_err(StarterError::io(&self.java))
    }

    /// Download the configured Sponge bootstrapper into `base`; returns its file name.
    #[instrument(skip(self))]
    pub async fn install_sponge_bootstrapper(&self, base: &Path) -> StarterResult<String> {
        let url = self.sponge_bootstrapper.trim();
        if url.is_empty() {
            return Err(StarterError::Config(
                "spongefix is enabled but no spongeBootstrapper url is configured".into(),
            ));
        }

        let file_name = file_name_from_url(url).to_string();
        if let Err(e) = self.fetcher.fetch(url, &base.join(&file_name), None).await {
            error!("Error while downloading bootstrapper: {}", e);
            return Err(e);
        }
        Ok(file_name)
    }
}
