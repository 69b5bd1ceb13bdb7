use std::path::Path;

use tracing::{debug, error, warn};

use crate::core::config::LaunchConfig;
use crate::core::platform::is_linux;

pub const SERVER_PROPERTIES: &str = "server.properties";
pub const RSYNC: &str = "rsync";
const LEVEL_NAME_KEY: &str = "level-name";

/// Mirror commands around one server run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RamDiskSync {
    pub level_name: String,
    /// Program (plus leading arguments) doing the copy.
    pub program: Vec<String>,
}

impl RamDiskSync {
    pub fn new(level_name: impl Into<String>) -> Self {
        Self {
            level_name: level_name.into(),
            program: vec![RSYNC.to_string()],
        }
    }

    pub fn with_program(mut self, program: Vec<String>) -> Self {
        if !program.is_empty() {
            self.program = program;
        }
        self
    }

    fn mirror(&self, from: String, to: String) -> Vec<String> {
        let mut argv = self.program.clone();
        argv.extend(["-aAXv".to_string(), from, to]);
        argv
    }

    /// Backup into the live world, before launch.
    pub fn restore_command(&self) -> Vec<String> {
        self.mirror(format!("{}_backup/", self.level_name), self.level_name.clone())
    }

    /// Live world back into the backup, after exit.
    pub fn backup_command(&self) -> Vec<String> {
        self.mirror(format!("{}/", self.level_name), format!("{}_backup", self.level_name))
    }

    /// `None` when RAM disk mode is off or cannot be used here.
    pub fn plan(config: &LaunchConfig, base_path: &Path) -> Option<Self> {
        if !config.ram_disk {
            return None;
        }

        let Some(level_name) = read_level_name(&base_path.join(SERVER_PROPERTIES)) else {
            error!("The level-name in the server.properties is empty, therefore we can't create a ramdisk");
            return None;
        };

        if !is_linux() {
            warn!("RAM disk mode is only supported on Linux, skipping it");
            return None;
        }

        Some(Self::new(level_name))
    }
}

/// Value of `level-name` in a java style properties file.
pub fn read_level_name(path: &Path) -> Option<String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("Could not read {:?}: {}", path, e);
            return None;
        }
    };
    property(&raw, LEVEL_NAME_KEY)
}

fn property(raw: &str, key: &str) -> Option<String> {
    raw.lines()
        .map(str::trim_start)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let split = line.find(['=', ':'])?;
            Some((line[..split].trim(), line[split + 1..].trim()))
        })
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_name_is_read_from_properties() {
        let raw = "#Minecraft server properties\n!comment\nmotd=A Server\nlevel-name = world\n";
        assert_eq!(property(raw, LEVEL_NAME_KEY).as_deref(), Some("world"));
        assert_eq!(property("level-name:other", LEVEL_NAME_KEY).as_deref(), Some("other"));
        assert_eq!(property("level-name=\n", LEVEL_NAME_KEY), None);
        assert_eq!(property("#level-name=world", LEVEL_NAME_KEY), None);
    }

    #[test]
    fn mirror_commands_run_in_opposite_directions() {
        let sync = RamDiskSync::new("world");
        assert_eq!(
            sync.restore_command(),
            vec!["rsync", "-aAXv", "world_backup/", "world"]
        );
        assert_eq!(
            sync.backup_command(),
            vec!["rsync", "-aAXv", "world/", "world_backup"]
        );
    }

    #[test]
    fn custom_program_keeps_the_mirror_arguments() {
        let sync = RamDiskSync::new("world").with_program(vec!["sh".into(), "-c".into(), "true".into()]);
        assert_eq!(
            sync.restore_command(),
            vec!["sh", "-c", "true", "-aAXv", "world_backup/", "world"]
        );
        assert_eq!(RamDiskSync::new("world").with_program(Vec::new()).program, vec![RSYNC]);
    }

    #[test]
    fn missing_level_name_skips_ram_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = LaunchConfig {
            ram_disk: true,
            ..LaunchConfig::default()
        };
        assert_eq!(RamDiskSync::plan(&config, dir.path()), None);
    }

    #[test]
    fn ram_disk_off_means_no_plan() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SERVER_PROPERTIES), "level-name=world\n").unwrap();
        assert_eq!(RamDiskSync::plan(&LaunchConfig::default(), dir.path()), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_plans_the_mirror() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SERVER_PROPERTIES), "level-name=world\n").unwrap();
        let config = LaunchConfig {
            ram_disk: true,
            ..LaunchConfig::default()
        };
        assert_eq!(
            RamDiskSync::plan(&config, dir.path()),
            Some(RamDiskSync::new("world"))
        );
    }
}
