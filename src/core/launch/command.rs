// ─── Launch Command ───
// Placeholder substitution and assembly of the server command line.

use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::core::config::LaunchConfig;
use crate::core::platform::os_placeholder;
use crate::core::state::LockState;

pub const LOADER_VERSION_TOKEN: &str = "{{@loaderversion@}}";
pub const MC_VERSION_TOKEN: &str = "{{@mcversion@}}";
pub const OS_TOKEN: &str = "{{@os@}}";
pub const START_FILE_TOKEN: &str = "{{@startFile@}}";

/// Values substituted into configured strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    pub loader_version: String,
    pub mc_version: String,
}

impl Placeholders {
    pub fn new(loader_version: impl Into<String>, mc_version: impl Into<String>) -> Self {
        Self {
            loader_version: loader_version.into(),
            mc_version: mc_version.into(),
        }
    }

    pub fn from_lock(lock: &LockState) -> Self {
        Self::new(lock.loader_version.clone(), lock.mc_version.clone())
    }

    pub fn apply(&self, input: &str) -> String {
        input
            .replace(LOADER_VERSION_TOKEN, &self.loader_version)
            .replace(MC_VERSION_TOKEN, &self.mc_version)
            .replace(OS_TOKEN, os_placeholder())
    }
}

/// Half of `max_ram`, at least 1, keeping the unit suffix ("4G" -> "2G").
pub fn derive_min_heap(max_ram: &str) -> Option<String> {
    let max_ram = max_ram.trim();
    let digits = max_ram.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let suffix = &max_ram[digits.len()..];
    let amount: u64 = digits.parse().ok()?;
    Some(format!("{}{}", (amount / 2).max(1), suffix))
}

/// `-Xmx` plus an explicit or derived `-Xms`, unless the java args set one.
pub fn heap_flags(config: &LaunchConfig) -> Vec<String> {
    let mut flags = vec![format!("-Xmx{}", config.max_ram.trim())];

    if !config.min_ram.trim().is_empty() {
        flags.push(format!("-Xms{}", config.min_ram.trim()));
    } else if !config.java_args.iter().any(|a| a.trim().starts_with("-Xms")) {
        match derive_min_heap(&config.max_ram) {
            Some(min) => flags.push(format!("-Xms{}", min)),
            None => error!("Problem while calculating Xms from maxRam {:?}", config.max_ram),
        }
    }

    flags
}

/// File the server is started from, relative to the install root.
pub fn launch_file_name(config: &LaunchConfig, lock: &LockState, placeholders: &Placeholders) -> String {
    if config.spongefix {
        lock.sponge_bootstrapper.clone()
    } else {
        placeholders.apply(&config.start_file)
    }
}

/// Absolute path of the launch artifact under `base_path`.
pub fn launch_artifact_path(base_path: &Path, file_name: &str) -> PathBuf {
    let joined = base_path.join(file_name);
    std::path::absolute(&joined).unwrap_or(joined)
}

/// Full argv: pre-java args, java, java args, heap flags, start command.
///
/// Works for both `-jar {{@startFile@}}` and `@libraries/.../{{@os@}}_args.txt`
/// style start commands.
pub fn build_launch_command(
    config: &LaunchConfig,
    java: &str,
    placeholders: &Placeholders,
    launch_artifact: &Path,
) -> Vec<String> {
    let mut argv: Vec<String> = config
        .pre_java_args
        .split_whitespace()
        .map(str::to_string)
        .collect();

    argv.push(java.to_string());
    argv.extend(config.java_args.iter().map(|a| placeholders.apply(a)));
    argv.extend(heap_flags(config));

    let artifact = launch_artifact.to_string_lossy();
    argv.extend(
        config
            .start_command
            .iter()
            .map(|token| placeholders.apply(token).replace(START_FILE_TOKEN, &artifact)),
    );

    debug!("Using arguments: {:?}", argv);
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LaunchConfig {
        LaunchConfig {
            max_ram: "4G".into(),
            ..LaunchConfig::default()
        }
    }

    #[test]
    fn min_heap_is_half_of_max() {
        assert_eq!(heap_flags(&config()), vec!["-Xmx4G", "-Xms2G"]);
        assert_eq!(derive_min_heap("1G").as_deref(), Some("1G"));
        assert_eq!(derive_min_heap("6144M").as_deref(), Some("3072M"));
        assert_eq!(derive_min_heap("lots"), None);
    }

    #[test]
    fn explicit_min_heap_wins() {
        let mut cfg = config();
        cfg.min_ram = "1G".into();
        assert_eq!(heap_flags(&cfg), vec!["-Xmx4G", "-Xms1G"]);
    }

    #[test]
    fn user_supplied_xms_suppresses_derivation() {
        let mut cfg = config();
        cfg.java_args = vec![" -Xms3G".into()];
        assert_eq!(heap_flags(&cfg), vec!["-Xmx4G"]);
    }

    #[test]
    fn unparseable_max_ram_skips_min_heap() {
        let mut cfg = config();
        cfg.max_ram = "G".into();
        assert_eq!(heap_flags(&cfg), vec!["-XmxG"]);
    }

    #[test]
    fn jar_style_command_is_assembled_in_order() {
        let mut cfg = config();
        cfg.pre_java_args = " nice  -n 5 ".into();
        cfg.java_args = vec!["-Dmc={{@mcversion@}}".into()];
        let placeholders = Placeholders::new("47.2.0", "1.20.1");

        let argv = build_launch_command(
            &cfg,
            "/usr/bin/java",
            &placeholders,
            Path::new("/srv/forge.jar"),
        );

        assert_eq!(
            argv,
            vec![
                "nice",
                "-n",
                "5",
                "/usr/bin/java",
                "-Dmc=1.20.1",
                "-Xmx4G",
                "-Xms2G",
                "-jar",
                "/srv/forge.jar",
                "nogui",
            ]
        );
    }

    #[test]
    fn classpath_style_command_substitutes_versions_and_os() {
        let mut cfg = config();
        cfg.start_command = vec![
            "@libraries/net/minecraftforge/forge/{{@mcversion@}}-{{@loaderversion@}}/{{@os@}}_args.txt".into(),
            "nogui".into(),
        ];
        let placeholders = Placeholders::new("47.2.0", "1.20.1");

        let argv = build_launch_command(&cfg, "java", &placeholders, Path::new("unused.jar"));

        let expected = format!(
            "@libraries/net/minecraftforge/forge/1.20.1-47.2.0/{}_args.txt",
            os_placeholder()
        );
        assert_eq!(argv[0], "java");
        assert_eq!(argv[argv.len() - 2], expected);
    }

    #[test]
    fn spongefix_launches_the_bootstrapper() {
        let mut cfg = config();
        let lock = LockState {
            sponge_bootstrapper: "spongebootstrap.jar".into(),
            ..LockState::default()
        };
        let placeholders = Placeholders::new("47.2.0", "1.20.1");

        assert_eq!(
            launch_file_name(&cfg, &lock, &placeholders),
            "forge-1.20.1-47.2.0.jar"
        );
        cfg.spongefix = true;
        assert_eq!(
            launch_file_name(&cfg, &lock, &placeholders),
            "spongebootstrap.jar"
        );
    }
}
