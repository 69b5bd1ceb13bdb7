// ─── Launch Supervisor ───
// Runs the server, waits for it to exit and restarts it until the crash
// window says stop or a shutdown is requested.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{error, info, instrument, warn};

use super::command::{build_launch_command, launch_artifact_path, launch_file_name, Placeholders};
use super::crash::{parse_crash_timer, CrashWindow};
use super::ramdisk::RamDiskSync;
use super::registry::ProcessRegistry;
use crate::core::config::LaunchConfig;
use crate::core::error::{StarterError, StarterResult};
use crate::core::java::resolve_java_executable;
use crate::core::state::LockState;

pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Starting,
    Running,
    Stopped,
    Restarting,
    Terminated,
}

pub struct LaunchSupervisor {
    config: LaunchConfig,
    base_path: PathBuf,
    lock: LockState,
    registry: ProcessRegistry,
    restart_delay: Duration,
    mirror_program: Vec<String>,
    state: Mutex<SupervisorState>,
}

impl LaunchSupervisor {
    pub fn new(
        config: LaunchConfig,
        base_path: impl Into<PathBuf>,
        lock: LockState,
        registry: ProcessRegistry,
    ) -> Self {
        Self {
            config,
            base_path: base_path.into(),
            lock,
            registry,
            restart_delay: DEFAULT_RESTART_DELAY,
            mirror_program: Vec::new(),
            state: Mutex::new(SupervisorState::Idle),
        }
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Replace `rsync` for the RAM disk mirrors.
    pub fn with_mirror_program(mut self, program: Vec<String>) -> Self {
        self.mirror_program = program;
        self
    }

    pub fn state(&self) -> SupervisorState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SupervisorState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Run the restart loop; returns the number of server launches.
    #[instrument(skip(self), fields(base = ?self.base_path))]
    pub async fn handle_server(&self) -> StarterResult<usize> {
        let crash_timer = parse_crash_timer(&self.config.crash_timer);
        let mut window = CrashWindow::new(crash_timer);
        let placeholders = Placeholders::from_lock(&self.lock);
        let java = resolve_java_executable(&self.config, &placeholders).await;
        let mut launches = 0;

        while !self.registry.is_shutting_down() {
            let now = Instant::now();
            window.prune(now);

            self.set_state(SupervisorState::Starting);
            if !self.start_server(&java, &placeholders).await {
                break;
            }
            launches += 1;
            window.record(now);
            self.set_state(SupervisorState::Stopped);

            info!(
                "Server has been stopped, it has started {} times in {}",
                window.len(),
                self.config.crash_timer
            );

            if self.registry.is_shutting_down()
                || !window.should_restart(self.config.auto_restart, self.config.crash_limit)
            {
                break;
            }

            self.set_state(SupervisorState::Restarting);
            info!(
                "Restarting server in {} seconds, press ctrl+c to stop",
                self.restart_delay.as_secs()
            );
            tokio::select! {
                _ = tokio::time::sleep(self.restart_delay) => {}
                _ = self.registry.wait_for_shutdown() => break,
            }
        }

        self.set_state(SupervisorState::Terminated);
        Ok(launches)
    }

    /// One server run, including the RAM disk mirrors around it.
    /// Failures are logged; the restart policy decides what happens next.
    /// Returns `false` when shutdown prevented the server from being started.
    async fn start_server(&self, java: &str, placeholders: &Placeholders) -> bool {
        let ram_disk = RamDiskSync::plan(&self.config, &self.base_path)
            .map(|sync| sync.with_program(self.mirror_program.clone()));

        let file_name = launch_file_name(&self.config, &self.lock, placeholders);
        let artifact = launch_artifact_path(&self.base_path, &file_name);
        let argv = build_launch_command(&self.config, java, placeholders, &artifact);

        if let Some(sync) = &ram_disk {
            if let Err(e) = self.run_to_completion(&sync.restore_command(), "ramdisk-restore", false).await {
                error!("RAM disk restore failed: {}", e);
            }
        }

        info!("Starting Loader, output incoming");
        let launched = match self.run_to_completion(&argv, "server", true).await {
            Ok(launched) => launched,
            Err(e) => {
                error!("Error while starting the server: {}", e);
                true
            }
        };
        if !launched {
            return false;
        }

        if let Some(sync) = &ram_disk {
            if let Err(e) = self.run_to_completion(&sync.backup_command(), "ramdisk-backup", false).await {
                error!("RAM disk backup failed: {}", e);
            }
        }
        true
    }

    /// Spawn `argv` and wait for it; `Ok(false)` when shutdown already started.
    async fn run_to_completion(&self, argv: &[String], label: &str, is_server: bool) -> StarterResult<bool> {
        let Some((program, args)) = argv.split_first() else {
            return Err(StarterError::Other(format!("empty command for {}", label)));
        };

        if self.registry.is_shutting_down() {
            info!("Shutdown requested, not starting {}", label);
            return Ok(false);
        }

        let mut child = Command::new(program)
            .args(args)
            .current_dir(&self.base_path)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(StarterError::io(program))?;

        let pid = child.id();
        if let Some(pid) = pid {
            if !self.registry.register(pid, label) {
                // killed by the registry, reap it
                let _ = child.wait().await;
                return Ok(false);
            }
        }
        if is_server {
            self.set_state(SupervisorState::Running);
        }

        let status = child.wait().await;
        if let Some(pid) = pid {
            self.registry.mark_exited(pid);
        }

        let status = status.map_err(StarterError::io(program))?;
        if !status.success() {
            warn!("{} exited with {}", label, status);
        }
        Ok(true)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::launch::ramdisk::SERVER_PROPERTIES;

    fn supervisor(config: LaunchConfig, registry: ProcessRegistry) -> LaunchSupervisor {
        let dir = std::env::temp_dir();
        LaunchSupervisor::new(config, dir, LockState::default(), registry)
    }

    fn labels(registry: &ProcessRegistry) -> Vec<String> {
        registry.snapshot().into_iter().map(|p| p.label).collect()
    }

    fn ram_disk_base() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SERVER_PROPERTIES), "level-name=world\n").unwrap();
        dir
    }

    fn exiting_immediately() -> LaunchConfig {
        LaunchConfig {
            forced_java_path: "true".into(),
            auto_restart: true,
            crash_limit: 3,
            crash_timer: "60s".into(),
            ..LaunchConfig::default()
        }
    }

    #[tokio::test]
    async fn crash_limit_bounds_the_restart_loop() {
        let sup = supervisor(exiting_immediately(), ProcessRegistry::new())
            .with_restart_delay(Duration::ZERO);

        let launches = sup.handle_server().await.unwrap();

        assert_eq!(launches, 4);
        assert_eq!(sup.state(), SupervisorState::Terminated);
    }

    #[tokio::test]
    async fn no_auto_restart_means_one_launch() {
        let mut config = exiting_immediately();
        config.auto_restart = false;
        let registry = ProcessRegistry::new();
        let sup = supervisor(config, registry.clone()).with_restart_delay(Duration::ZERO);

        assert_eq!(sup.handle_server().await.unwrap(), 1);
        assert_eq!(labels(&registry), vec!["server"]);
        assert!(registry.snapshot().iter().all(|p| p.finished));
    }

    #[tokio::test]
    async fn missing_executable_still_counts_as_a_launch() {
        let mut config = exiting_immediately();
        config.forced_java_path = "/nonexistent/serverstarter-java".into();
        config.crash_limit = 1;
        let sup = supervisor(config, ProcessRegistry::new()).with_restart_delay(Duration::ZERO);

        assert_eq!(sup.handle_server().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn shutdown_interrupts_the_restart_delay() {
        let registry = ProcessRegistry::new();
        let sup = Arc::new(
            supervisor(exiting_immediately(), registry.clone())
                .with_restart_delay(Duration::from_secs(300)),
        );

        let running = sup.clone();
        let handle = tokio::spawn(async move { running.handle_server().await });

        tokio::time::timeout(Duration::from_secs(10), async {
            while sup.state() != SupervisorState::Restarting {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        registry.terminate_all();

        let launches = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(launches, 1);
        assert_eq!(sup.state(), SupervisorState::Terminated);
    }

    #[tokio::test]
    async fn nothing_is_launched_after_shutdown() {
        let registry = ProcessRegistry::new();
        registry.terminate_all();
        let sup = supervisor(exiting_immediately(), registry);

        assert_eq!(sup.handle_server().await.unwrap(), 0);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn ram_disk_mirrors_wrap_the_server_run() {
        let dir = ram_disk_base();
        let registry = ProcessRegistry::new();
        let config = LaunchConfig {
            ram_disk: true,
            auto_restart: false,
            ..exiting_immediately()
        };
        let sup = LaunchSupervisor::new(config, dir.path(), LockState::default(), registry.clone())
            .with_mirror_program(vec!["true".into()]);

        assert_eq!(sup.handle_server().await.unwrap(), 1);
        assert_eq!(
            labels(&registry),
            vec!["ramdisk-restore", "server", "ramdisk-backup"]
        );
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn shutdown_during_restore_starts_nothing_else() {
        let dir = ram_disk_base();
        let registry = ProcessRegistry::new();
        let config = LaunchConfig {
            ram_disk: true,
            ..exiting_immediately()
        };
        let sup = Arc::new(
            LaunchSupervisor::new(config, dir.path(), LockState::default(), registry.clone())
                .with_mirror_program(vec![
                    "sh".into(),
                    "-c".into(),
                    "exec sleep 30".into(),
                    "mirror".into(),
                ])
                .with_restart_delay(Duration::ZERO),
        );

        let running = sup.clone();
        let handle = tokio::spawn(async move { running.handle_server().await });

        tokio::time::timeout(Duration::from_secs(10), async {
            while labels(&registry).is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let stopper = registry.clone();
        tokio::task::spawn_blocking(move || stopper.terminate_all())
            .await
            .unwrap();

        let launches = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(launches, 0);
        assert_eq!(labels(&registry), vec!["ramdisk-restore"]);
        assert_eq!(sup.state(), SupervisorState::Terminated);
    }
}
