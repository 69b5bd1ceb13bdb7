pub mod core;

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::core::config::{ServerConfig, CONFIG_FILE};
use crate::core::downloader::{ArtifactFetcher, HttpFetcher};
use crate::core::error::{StarterError, StarterResult};
use crate::core::http::build_http_client;
use crate::core::java::resolve_java_executable;
use crate::core::launch::{LaunchSupervisor, Placeholders, ProcessRegistry};
use crate::core::loaders::LoaderInstaller;
use crate::core::pack::{Pack, PackContext};
use crate::core::state::LockState;

/// Install the pack and loader if needed, then supervise the server.
pub async fn run() -> StarterResult<()> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,serverstarter_lib=debug")),
        )
        .init();

    info!("ServerStarter {} starting...", env!("CARGO_PKG_VERSION"));

    let registry = ProcessRegistry::new();
    spawn_termination_handler(registry.clone());

    let config = ServerConfig::load(Path::new(CONFIG_FILE))?;
    let base = config.install.base_install_path.clone();
    std::fs::create_dir_all(&base).map_err(StarterError::io(&base))?;

    let mut lock = LockState::load(&base);
    if lock.satisfies(&config.install.loader_version, &config.install.mc_version) {
        info!(
            "Loader {} for Minecraft {} already installed, skipping installation",
            lock.loader_version, lock.mc_version
        );
    } else {
        lock = install(&config, &base, &registry).await?;
    }

    let supervisor = LaunchSupervisor::new(config.launch, base, lock, registry);
    let launches = supervisor.handle_server().await?;
    info!("Server supervision finished after {} launch(es)", launches);
    Ok(())
}

/// Pack, loader and optional Sponge bootstrapper; returns the resulting lock.
async fn install(
    config: &ServerConfig,
    base: &Path,
    registry: &ProcessRegistry,
) -> StarterResult<LockState> {
    let client = build_http_client()?;
    let fetcher: Arc<dyn ArtifactFetcher> = Arc::new(HttpFetcher::with_client(client.clone()));

    let ctx = PackContext::new(config.install.clone(), fetcher.clone(), client);
    let mut pack = Pack::from_name(&config.install.modpack_format, ctx)?;
    pack.install_pack().await?;

    let loader_version = pack.loader_version().to_string();
    let mc_version = pack.mc_version().to_string();
    let java = resolve_java_executable(
        &config.launch,
        &Placeholders::new(loader_version.as_str(), mc_version.as_str()),
    )
    .await;
    let installer =
        LoaderInstaller::new(&config.install, java, fetcher).with_registry(registry.clone());

    if config.install.install_loader {
        installer
            .install_loader(base, &loader_version, &mc_version)
            .await?;
    } else {
        info!("Loader installation disabled, skipping it");
    }

    let mut lock = LockState::load(base);
    if config.launch.spongefix {
        lock.sponge_bootstrapper = installer.install_sponge_bootstrapper(base).await?;
        lock.save(base)?;
    }

    if !lock.loader_installed {
        lock.loader_version = loader_version;
        lock.mc_version = mc_version;
    }
    Ok(lock)
}

/// Kill every registered child on Ctrl-C or SIGTERM, for every signal received.
fn spawn_termination_handler(registry: ProcessRegistry) {
    tokio::spawn(async move {
        loop {
            wait_for_termination().await;
            let registry = registry.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || registry.terminate_all()).await {
                error!("Termination handler failed: {}", e);
            }
        }
    });
}

async fn wait_for_termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(e) => warn!("Could not listen for SIGTERM: {}", e),
        }
    }

    ctrl_c().await;
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
