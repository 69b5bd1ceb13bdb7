use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::artifact::ExpectedHash;
use crate::core::error::{StarterError, StarterResult};

/// Performs a single blocking GET of `url` into `dest`.
///
/// Implementations never retry; callers own the retry policy.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        expected: Option<&ExpectedHash>,
    ) -> StarterResult<()>;
}

/// `reqwest`-backed fetcher with optional hash validation.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    /// Creates parent directories as needed and drops the file handle
    /// right after writing.
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        expected: Option<&ExpectedHash>,
    ) -> StarterResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(StarterError::io(parent))?;
        }

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StarterError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;

        if let Some(expected) = expected {
            if let Err(actual) = expected.matches(&bytes) {
                return Err(StarterError::HashMismatch {
                    path: dest.to_path_buf(),
                    algorithm: expected.algorithm.name(),
                    expected: expected.value.clone(),
                    actual,
                });
            }
        }

        {
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(StarterError::io(dest))?;
            file.write_all(&bytes)
                .await
                .map_err(StarterError::io(dest))?;
            file.flush().await.map_err(StarterError::io(dest))?;
        }

        debug!("Downloaded: {} -> {:?} ({} bytes)", url, dest, bytes.len());
        Ok(())
    }
}
