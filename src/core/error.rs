use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the installer and the launch supervisor.
/// Every module returns `Result<T, StarterError>`.
#[derive(Debug, Error)]
pub enum StarterError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Integrity ───────────────────────────────────────
    #[error("{algorithm} mismatch for {path:?}: expected {expected}, got {actual}")]
    HashMismatch {
        path: PathBuf,
        algorithm: &'static str,
        expected: String,
        actual: String,
    },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid ignore pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    // ── Pack ────────────────────────────────────────────
    #[error("Unknown pack type: {0}")]
    UnknownPackType(String),

    #[error("No modpack url or local file configured")]
    MissingPackSource,

    #[error("Could not parse manifest {path:?}: {reason}")]
    ManifestParse { path: PathBuf, reason: String },

    #[error("No CurseForge API key provided")]
    MissingApiKey,

    #[error("Artifact resolution failed: {0}")]
    ResolveFailed(String),

    // ── Loader ──────────────────────────────────────────
    #[error("Problem while installing loader from {url}: {source}")]
    LoaderInstall {
        url: String,
        source: Box<StarterError>,
    },

    #[error("Installer exited with code {code:?}")]
    InstallerExit { code: Option<i32> },

    // ── Generic ─────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type StarterResult<T> = Result<T, StarterError>;

impl From<std::io::Error> for StarterError {
    fn from(source: std::io::Error) -> Self {
        StarterError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl StarterError {
    /// Attach a path to an IO error; used with `map_err`.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> StarterError {
        let path = path.into();
        move |source| StarterError::Io { path, source }
    }
}
