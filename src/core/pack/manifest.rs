//! Manifest schemas of the supported pack formats, normalized into a
//! [`PackManifest`].

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::core::downloader::{ExpectedHash, HashAlgorithm};
use crate::core::error::{StarterError, StarterResult};

/// A raw mod reference as listed by a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModEntry {
    pub project_id: String,
    pub file_id: String,
    pub download_url: Option<String>,
    /// Hash published inline by the manifest, if any.
    pub hash: Option<ExpectedHash>,
}

/// Normalized `(mcVersion, loaderVersion, mods)` triple.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackManifest {
    pub mc_version: Option<String>,
    pub loader_version: Option<String>,
    pub mods: Vec<ModEntry>,
}

/// The metadata files the parsers understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// CurseForge export `manifest.json`.
    CurseManifest,
    /// CurseForge app `minecraftinstance.json`.
    CurseInstance,
    /// Modrinth `modrinth.index.json`.
    ModrinthIndex,
}

impl ManifestKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ManifestKind::CurseManifest => "manifest.json",
            ManifestKind::CurseInstance => "minecraftinstance.json",
            ManifestKind::ModrinthIndex => "modrinth.index.json",
        }
    }

    pub fn parse(self, raw: &str) -> Result<PackManifest, serde_json::Error> {
        match self {
            ManifestKind::CurseManifest => parse_curse_manifest(raw),
            ManifestKind::CurseInstance => parse_curse_instance(raw),
            ManifestKind::ModrinthIndex => parse_modrinth_index(raw),
        }
    }

    pub fn parse_file(self, path: &Path) -> StarterResult<PackManifest> {
        let raw = std::fs::read_to_string(path).map_err(StarterError::io(path))?;
        let manifest = self.parse(&raw).map_err(|e| StarterError::ManifestParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!(
            "Parsed {:?}: mc={:?} loader={:?} mods={}",
            path,
            manifest.mc_version,
            manifest.loader_version,
            manifest.mods.len()
        );
        Ok(manifest)
    }
}

/// Ids are numbers in some exports and strings in others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// ── CurseForge manifest.json ────────────────────────────

#[derive(Debug, Deserialize)]
struct CurseManifest {
    minecraft: CurseMinecraft,
    #[serde(default)]
    files: Vec<CurseManifestFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurseMinecraft {
    version: Option<String>,
    #[serde(default)]
    mod_loaders: Vec<CurseModLoader>,
}

#[derive(Debug, Deserialize)]
struct CurseModLoader {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurseManifestFile {
    #[serde(rename = "projectID", deserialize_with = "string_or_number")]
    project_id: String,
    #[serde(rename = "fileID", deserialize_with = "string_or_number")]
    file_id: String,
    #[serde(default)]
    download_url: Option<String>,
}

/// `forge-47.2.0` → `47.2.0`.
fn loader_version_from_id(id: &str) -> String {
    match id.split_once('-') {
        Some((_, version)) => version.to_string(),
        None => id.to_string(),
    }
}

fn parse_curse_manifest(raw: &str) -> Result<PackManifest, serde_json::Error> {
    let manifest: CurseManifest = serde_json::from_str(raw)?;

    Ok(PackManifest {
        mc_version: non_empty(manifest.minecraft.version),
        loader_version: manifest
            .minecraft
            .mod_loaders
            .first()
            .map(|l| loader_version_from_id(&l.id)),
        mods: manifest
            .files
            .into_iter()
            .map(|f| ModEntry {
                project_id: f.project_id,
                file_id: f.file_id,
                download_url: non_empty(f.download_url),
                hash: None,
            })
            .collect(),
    })
}

// ── CurseForge minecraftinstance.json ───────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurseInstance {
    base_mod_loader: CurseBaseModLoader,
    #[serde(default)]
    installed_addons: Vec<CurseAddon>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurseBaseModLoader {
    minecraft_version: Option<String>,
    forge_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurseAddon {
    #[serde(rename = "addonID", deserialize_with = "string_or_number")]
    addon_id: String,
    installed_file: CurseInstalledFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurseInstalledFile {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    download_url: Option<String>,
}

fn parse_curse_instance(raw: &str) -> Result<PackManifest, serde_json::Error> {
    let instance: CurseInstance = serde_json::from_str(raw)?;

    Ok(PackManifest {
        mc_version: non_empty(instance.base_mod_loader.minecraft_version),
        loader_version: non_empty(instance.base_mod_loader.forge_version),
        mods: instance
            .installed_addons
            .into_iter()
            .map(|a| ModEntry {
                project_id: a.addon_id,
                file_id: a.installed_file.id,
                download_url: non_empty(a.installed_file.download_url),
                hash: None,
            })
            .collect(),
    })
}

// ── Modrinth modrinth.index.json ────────────────────────

/// Loader keys in `dependencies`, in lookup order.
const MODRINTH_LOADER_KEYS: [&str; 4] = ["forge", "neoforge", "fabric-loader", "quilt-loader"];

#[derive(Debug, Deserialize)]
struct ModrinthIndex {
    #[serde(default)]
    dependencies: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    files: Vec<ModrinthFile>,
}

#[derive(Debug, Deserialize)]
struct ModrinthFile {
    #[serde(default)]
    env: Option<ModrinthEnv>,
    #[serde(default)]
    downloads: Vec<String>,
    #[serde(default)]
    hashes: ModrinthHashes,
}

#[derive(Debug, Deserialize)]
struct ModrinthEnv {
    server: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ModrinthHashes {
    sha1: Option<String>,
    sha512: Option<String>,
}

impl ModrinthHashes {
    fn preferred(&self) -> Option<ExpectedHash> {
        self.sha512
            .as_ref()
            .map(|v| ExpectedHash::new(HashAlgorithm::Sha512, v.as_str()))
            .or_else(|| {
                self.sha1
                    .as_ref()
                    .map(|v| ExpectedHash::new(HashAlgorithm::Sha1, v.as_str()))
            })
    }
}

static MODRINTH_PROJECT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://cdn\.modrinth\.com/data/([A-Za-z0-9]+)/").expect("static regex")
});

static MODRINTH_FILE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://cdn\.modrinth\.com/data/[A-Za-z0-9]+/versions/([A-Za-z0-9]+)/")
        .expect("static regex")
});

/// Project id segment of a Modrinth CDN url.
pub fn extract_project_id(url: &str) -> Option<&str> {
    MODRINTH_PROJECT_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Version (file) id segment of a Modrinth CDN url.
pub fn extract_file_id(url: &str) -> Option<&str> {
    MODRINTH_FILE_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn modrinth_loader_version(deps: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    MODRINTH_LOADER_KEYS
        .iter()
        .find_map(|key| deps.get(*key))
        .or_else(|| {
            deps.iter()
                .find(|(key, _)| key.as_str() != "minecraft")
                .map(|(_, v)| v)
        })
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn parse_modrinth_index(raw: &str) -> Result<PackManifest, serde_json::Error> {
    let index: ModrinthIndex = serde_json::from_str(raw)?;

    let mut mods = Vec::with_capacity(index.files.len());
    for file in index.files {
        let server_env = file.env.as_ref().and_then(|e| e.server.as_deref());
        if server_env == Some("unsupported") {
            continue;
        }

        let Some(url) = file.downloads.first() else {
            continue;
        };

        mods.push(ModEntry {
            project_id: extract_project_id(url).unwrap_or(url).to_string(),
            file_id: extract_file_id(url).unwrap_or(url).to_string(),
            download_url: Some(url.clone()),
            hash: file.hashes.preferred(),
        });
    }

    Ok(PackManifest {
        mc_version: index
            .dependencies
            .get("minecraft")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        loader_version: modrinth_loader_version(&index.dependencies),
        mods,
    })
}
