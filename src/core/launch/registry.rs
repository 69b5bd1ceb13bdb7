// ─── Process Registry ───
// Every child the supervisor spawns, so a termination signal can take
// them down together with the starter.

use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::core::error::{StarterError, StarterResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredProcess {
    pub pid: u32,
    pub label: String,
    /// Exited on its own or already terminated.
    pub finished: bool,
}

#[derive(Default)]
struct RegistryInner {
    processes: Mutex<Vec<RegisteredProcess>>,
    shutting_down: AtomicBool,
    shutdown: Notify,
}

/// Shared, append-only list of spawned children. Cheap to clone.
#[derive(Clone, Default)]
pub struct ProcessRegistry {
    inner: Arc<RegistryInner>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn processes(&self) -> MutexGuard<'_, Vec<RegisteredProcess>> {
        self.inner
            .processes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Track a spawned child. Once shutdown has started the child is killed
    /// straight away instead; returns whether it was accepted.
    pub fn register(&self, pid: u32, label: impl Into<String>) -> bool {
        let label = label.into();
        {
            let mut processes = self.processes();
            // checked under the lock so terminate_all cannot slip in between
            let accepted = !self.is_shutting_down();
            processes.push(RegisteredProcess {
                pid,
                label: label.clone(),
                finished: !accepted,
            });
            if accepted {
                debug!("Registered process {} ({})", pid, label);
                return true;
            }
        }

        warn!("Shutdown in progress, stopping {} (pid {})", label, pid);
        if let Err(e) = kill_process(pid) {
            debug!("Could not stop pid {}: {}", pid, e);
        }
        false
    }

    pub fn mark_exited(&self, pid: u32) {
        for process in self.processes().iter_mut().filter(|p| p.pid == pid) {
            process.finished = true;
        }
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> Vec<RegisteredProcess> {
        self.processes().clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    /// Resolves once [`ProcessRegistry::terminate_all`] has been called.
    pub async fn wait_for_shutdown(&self) {
        loop {
            let notified = self.inner.shutdown.notified();
            if self.is_shutting_down() {
                return;
            }
            notified.await;
        }
    }

    /// Flag shutdown and kill every child that is still running.
    ///
    /// Safe to call repeatedly and concurrently with children exiting;
    /// returns how many kills were attempted.
    pub fn terminate_all(&self) -> usize {
        if !self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            warn!("Shutdown requested, trying to stop any running subprocess.");
        }
        self.inner.shutdown.notify_waiters();

        let targets: Vec<RegisteredProcess> = {
            let mut processes = self.processes();
            processes
                .iter_mut()
                .filter(|p| !p.finished)
                .map(|p| {
                    p.finished = true;
                    p.clone()
                })
                .collect()
        };

        for process in &targets {
            info!("Stopping {} (pid {})", process.label, process.pid);
            if let Err(e) = kill_process(process.pid) {
                debug!("Could not stop pid {}: {}", process.pid, e);
            }
        }
        targets.len()
    }
}

/// SIGTERM first, SIGKILL if the process is still around.
fn kill_process(pid: u32) -> StarterResult<()> {
    #[cfg(target_os = "windows")]
    {
        let status = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .status()
            .map_err(|e| StarterError::Other(format!("Could not stop process {pid}: {e}")))?;

        if !status.success() {
            return Err(StarterError::Other(format!(
                "taskkill for process {pid} exited with {:?}",
                status.code()
            )));
        }

        return Ok(());
    }

    #[cfg(not(target_os = "windows"))]
    {
        let graceful = Command::new("kill")
            .args(["-15", &pid.to_string()])
            .status()
            .map_err(|e| StarterError::Other(format!("Could not send SIGTERM to {pid}: {e}")))?;

        if graceful.success() {
            std::thread::sleep(std::time::Duration::from_millis(300));
            let check = Command::new("kill").args(["-0", &pid.to_string()]).status();
            if matches!(check, Ok(status) if !status.success()) {
                return Ok(());
            }
        }

        let force = Command::new("kill")
            .args(["-9", &pid.to_string()])
            .status()
            .map_err(|e| StarterError::Other(format!("Could not stop process {pid}: {e}")))?;

        if !force.success() {
            return Err(StarterError::Other(format!(
                "kill -9 for process {pid} exited with {:?}",
                force.code()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn exited_processes_are_not_killed() {
        let registry = ProcessRegistry::new();
        registry.register(u32::MAX - 1, "gone");
        registry.mark_exited(u32::MAX - 1);

        assert_eq!(registry.terminate_all(), 0);
        assert!(registry.is_shutting_down());
    }

    #[cfg(unix)]
    #[test]
    fn terminate_all_stops_running_children_once() {
        let registry = ProcessRegistry::new();
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        registry.register(child.id(), "sleep");

        assert_eq!(registry.terminate_all(), 1);
        let status = child.wait().unwrap();
        assert!(!status.success());

        assert_eq!(registry.terminate_all(), 0);
        assert!(registry.snapshot().iter().all(|p| p.finished));
    }

    #[cfg(unix)]
    #[test]
    fn registering_after_shutdown_kills_the_child() {
        let registry = ProcessRegistry::new();
        registry.terminate_all();

        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        assert!(!registry.register(child.id(), "late"));

        let status = child.wait().unwrap();
        assert!(!status.success());
        assert_eq!(registry.snapshot().len(), 1);
        assert_eq!(registry.terminate_all(), 0);
    }

    #[tokio::test]
    async fn waiters_wake_on_shutdown() {
        let registry = ProcessRegistry::new();
        let waiter = registry.clone();
        let handle = tokio::spawn(async move { waiter.wait_for_shutdown().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        registry.terminate_all();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn wait_after_shutdown_returns_immediately() {
        let registry = ProcessRegistry::new();
        registry.terminate_all();
        tokio::time::timeout(Duration::from_secs(1), registry.wait_for_shutdown())
            .await
            .unwrap();
    }
}
