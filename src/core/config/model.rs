use std::collections::HashMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::{StarterError, StarterResult};

/// Name of the configuration document the binary reads from its working directory.
pub const CONFIG_FILE: &str = "server-setup-config.json";

/// Full server setup configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub install: InstallConfig,
    pub launch: LaunchConfig,
}

/// Everything needed to install the pack and the mod loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstallConfig {
    /// Pinned Minecraft version; empty means "take it from the manifest".
    pub mc_version: String,
    /// Pinned loader version; empty means "take it from the manifest".
    pub loader_version: String,
    /// Installer URL template with `{{@loaderversion@}}` / `{{@mcversion@}}`.
    pub installer_url: String,
    pub installer_arguments: Vec<String>,
    pub modpack_url: String,
    /// Pack-type name, e.g. `curseforge` or `modrinth`.
    pub modpack_format: String,
    pub format_specific: HashMap<String, serde_json::Value>,
    pub base_install_path: PathBuf,
    /// Glob patterns relative to the install root.
    pub ignore_files: Vec<String>,
    pub install_loader: bool,
    pub sponge_bootstrapper: String,
    pub curse_forge_api_key: String,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            mc_version: String::new(),
            loader_version: String::new(),
            installer_url: "https://maven.minecraftforge.net/net/minecraftforge/forge/{{@mcversion@}}-{{@loaderversion@}}/forge-{{@mcversion@}}-{{@loaderversion@}}-installer.jar".into(),
            installer_arguments: vec!["--installServer".into()],
            modpack_url: String::new(),
            modpack_format: "curseforge".into(),
            format_specific: HashMap::new(),
            base_install_path: PathBuf::from("."),
            ignore_files: Vec::new(),
            install_loader: true,
            sponge_bootstrapper: String::new(),
            curse_forge_api_key: String::new(),
        }
    }
}

impl InstallConfig {
    /// Project ids listed under `formatSpecific.ignoreProject`.
    ///
    /// The list may mix numbers and strings; both are normalized to strings.
    pub fn ignore_projects(&self) -> HashSet<String> {
        let Some(value) = self.format_specific.get("ignoreProject") else {
            return HashSet::new();
        };
        let Some(items) = value.as_array() else {
            warn!("formatSpecific.ignoreProject is not a list, ignoring it");
            return HashSet::new();
        };

        items
            .iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s.trim().to_string()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                other => {
                    warn!("Unsupported ignoreProject entry {}", other);
                    None
                }
            })
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Optional local pack archive under `formatSpecific.localFile`.
    pub fn local_file(&self) -> Option<PathBuf> {
        self.format_specific
            .get("localFile")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }
}

/// Launch and supervision settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LaunchConfig {
    pub spongefix: bool,
    pub ram_disk: bool,
    pub max_ram: String,
    pub min_ram: String,
    pub auto_restart: bool,
    pub crash_limit: usize,
    pub crash_timer: String,
    pub pre_java_args: String,
    pub start_file: String,
    pub forced_java_path: String,
    pub supported_java_versions: Vec<u32>,
    pub java_args: Vec<String>,
    /// Tokens after the heap flags. `{{@startFile@}}` becomes the absolute
    /// launch artifact path.
    pub start_command: Vec<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            spongefix: false,
            ram_disk: false,
            max_ram: "5G".into(),
            min_ram: String::new(),
            auto_restart: true,
            crash_limit: 10,
            crash_timer: "60min".into(),
            pre_java_args: String::new(),
            start_file: "forge-{{@mcversion@}}-{{@loaderversion@}}.jar".into(),
            forced_java_path: String::new(),
            supported_java_versions: Vec::new(),
            java_args: Vec::new(),
            start_command: vec!["-jar".into(), "{{@startFile@}}".into(), "nogui".into()],
        }
    }
}

impl ServerConfig {
    /// Load the configuration; a missing file yields the defaults.
    pub fn load(path: &Path) -> StarterResult<Self> {
        if !path.exists() {
            warn!("No config found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(StarterError::io(path))?;
        serde_json::from_str(&raw)
            .map_err(|e| StarterError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> StarterResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(StarterError::io(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_projects_normalizes_numbers_and_strings() {
        let raw = r#"{"install":{"formatSpecific":{"ignoreProject":[123, "456", " 789 ", true]}}}"#;
        let config: ServerConfig = serde_json::from_str(raw).unwrap();

        let ignored = config.install.ignore_projects();
        assert_eq!(ignored.len(), 3);
        assert!(ignored.contains("123"));
        assert!(ignored.contains("456"));
        assert!(ignored.contains("789"));
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let raw = r#"{"launch":{"maxRam":"4G","crashLimit":3}}"#;
        let config: ServerConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.launch.max_ram, "4G");
        assert_eq!(config.launch.crash_limit, 3);
        assert!(config.launch.auto_restart);
        assert_eq!(config.install.modpack_format, "curseforge");
        assert_eq!(config.launch.start_command[1], "{{@startFile@}}");
    }

    #[test]
    fn load_missing_file_yields_defaults_and_save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = ServerConfig::load(&path).unwrap();
        config.install.modpack_format = "modrinth".into();
        config.save(&path).unwrap();

        let reloaded = ServerConfig::load(&path).unwrap();
        assert_eq!(reloaded.install.modpack_format, "modrinth");
    }

    #[test]
    fn local_file_is_read_from_format_specific() {
        let mut install = InstallConfig::default();
        assert!(install.local_file().is_none());
        install
            .format_specific
            .insert("localFile".into(), serde_json::json!("pack.zip"));
        assert_eq!(install.local_file(), Some(PathBuf::from("pack.zip")));
    }
}
