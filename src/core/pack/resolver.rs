use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::manifest::ModEntry;
use crate::core::downloader::{ExpectedHash, HashAlgorithm, ResolvedArtifact};
use crate::core::error::{StarterError, StarterResult};

pub const CURSEFORGE_FILES_ENDPOINT: &str = "https://api.curseforge.com/v1/mods/files";

/// Turns raw manifest entries into downloadable artifacts.
#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    /// Entries whose project id is in `ignore` are dropped before resolution.
    async fn resolve(
        &self,
        entries: Vec<ModEntry>,
        ignore: &HashSet<String>,
    ) -> StarterResult<Vec<ResolvedArtifact>>;
}

/// Split off ignored entries, logging them.
fn drop_ignored(entries: Vec<ModEntry>, ignore: &HashSet<String>) -> Vec<ModEntry> {
    if ignore.is_empty() {
        return entries;
    }

    let (ignored, kept): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|e| ignore.contains(&e.project_id));

    if !ignored.is_empty() {
        let listing = ignored
            .iter()
            .map(|e| {
                let name = e
                    .download_url
                    .as_deref()
                    .map(file_name_from_url)
                    .unwrap_or(&e.file_id);
                format!("\t{} ({})", name, e.project_id)
            })
            .collect::<Vec<_>>()
            .join("\n");
        info!("Ignoring the following mods:\n{}", listing);
    }

    kept
}

/// Last path segment of a url, without query or fragment.
pub fn file_name_from_url(url: &str) -> &str {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .rsplit('/')
        .next()
        .unwrap_or(without_query)
}

// ── CurseForge ──────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetFilesRequest {
    file_ids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct GetFilesResponse {
    #[serde(default)]
    data: Vec<CurseFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurseFile {
    mod_id: u64,
    file_name: String,
    display_name: String,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    hashes: Vec<CurseFileHash>,
}

#[derive(Debug, Deserialize)]
struct CurseFileHash {
    value: String,
    algo: u32,
}

impl CurseFile {
    fn into_artifact(self) -> ResolvedArtifact {
        // algo 1 = SHA-1, algo 2 = MD5
        let hash = self
            .hashes
            .iter()
            .find(|h| h.algo == 1)
            .map(|h| ExpectedHash::new(HashAlgorithm::Sha1, h.value.as_str()))
            .or_else(|| {
                self.hashes
                    .iter()
                    .find(|h| h.algo == 2)
                    .map(|h| ExpectedHash::new(HashAlgorithm::Md5, h.value.as_str()))
            });

        ResolvedArtifact {
            id: self.mod_id.to_string(),
            display_name: self.display_name,
            file_name: self.file_name,
            download_url: self.download_url.filter(|u| !u.trim().is_empty()),
            hash,
        }
    }
}

/// Resolves CurseForge file ids with one batched API request.
pub struct CurseForgeResolver {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl CurseForgeResolver {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: CURSEFORGE_FILES_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

fn build_request(entries: &[ModEntry]) -> GetFilesRequest {
    let file_ids = entries
        .iter()
        .filter_map(|e| match e.file_id.trim().parse::<u64>() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!(
                    "Skipping non-numeric CurseForge file id {:?} (project {})",
                    e.file_id, e.project_id
                );
                None
            }
        })
        .collect();
    GetFilesRequest { file_ids }
}

fn convert_response(
    body: &str,
    ignore: &HashSet<String>,
) -> StarterResult<Vec<ResolvedArtifact>> {
    let response: GetFilesResponse = serde_json::from_str(body)?;
    Ok(response
        .data
        .into_iter()
        .filter(|f| !ignore.contains(&f.mod_id.to_string()))
        .map(CurseFile::into_artifact)
        .collect())
}

#[async_trait]
impl ArtifactResolver for CurseForgeResolver {
    #[instrument(skip_all, fields(entries = entries.len()))]
    async fn resolve(
        &self,
        entries: Vec<ModEntry>,
        ignore: &HashSet<String>,
    ) -> StarterResult<Vec<ResolvedArtifact>> {
        if self.api_key.trim().is_empty() {
            return Err(StarterError::MissingApiKey);
        }

        let entries = drop_ignored(entries, ignore);
        let request = build_request(&entries);
        if request.file_ids.is_empty() {
            return Ok(Vec::new());
        }

        info!("Requesting download links from the CurseForge API");
        debug!("Request body: {:?}", request);

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header("x-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StarterError::ResolveFailed(format!(
                "Request to {} was not successful. Error Code: {}",
                self.endpoint,
                status.as_u16()
            )));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(StarterError::ResolveFailed(format!(
                "Request to {} returned an empty body",
                self.endpoint
            )));
        }
        debug!("Response from file id query: {} bytes", body.len());

        convert_response(&body, ignore)
    }
}

// ── Modrinth ────────────────────────────────────────────

/// Modrinth entries already carry their url; resolution is local.
#[derive(Debug, Default)]
pub struct ModrinthResolver;

#[async_trait]
impl ArtifactResolver for ModrinthResolver {
    async fn resolve(
        &self,
        entries: Vec<ModEntry>,
        ignore: &HashSet<String>,
    ) -> StarterResult<Vec<ResolvedArtifact>> {
        Ok(drop_ignored(entries, ignore)
            .into_iter()
            .map(|entry| {
                let file_name = entry
                    .download_url
                    .as_deref()
                    .map(file_name_from_url)
                    .unwrap_or(&entry.file_id)
                    .to_string();
                ResolvedArtifact {
                    id: entry.project_id,
                    display_name: file_name.clone(),
                    file_name,
                    download_url: entry.download_url,
                    hash: entry.hash,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    fn entry(project: &str, file: &str, url: Option<&str>) -> ModEntry {
        ModEntry {
            project_id: project.into(),
            file_id: file.into(),
            download_url: url.map(str::to_string),
            hash: None,
        }
    }

    #[test]
    fn request_batches_every_numeric_file_id() {
        let entries = vec![
            entry("1", "100", None),
            entry("2", "200", None),
            entry("3", "abc", None),
        ];
        let request = build_request(&entries);
        assert_eq!(request.file_ids, vec![100, 200]);
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"fileIds":[100,200]}"#
        );
    }

    #[test]
    fn response_keeps_missing_urls_and_prefers_sha1() {
        let body = r#"{"data": [
            {"id": 100, "modId": 1, "fileName": "a.jar", "displayName": "A",
             "downloadUrl": "https://edge/a.jar",
             "hashes": [{"value": "MD5VALUE", "algo": 2}, {"value": "SHA1VALUE", "algo": 1}]},
            {"id": 200, "modId": 2, "fileName": "b.jar", "displayName": "B",
             "downloadUrl": null, "hashes": []},
            {"id": 300, "modId": 3, "fileName": "c.jar", "displayName": "C",
             "downloadUrl": "https://edge/c.jar", "hashes": []}
        ]}"#;
        let ignore = HashSet::from(["3".to_string()]);

        let artifacts = convert_response(body, &ignore).unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].id, "1");
        assert_eq!(
            artifacts[0].hash,
            Some(ExpectedHash::new(HashAlgorithm::Sha1, "sha1value"))
        );
        assert_eq!(artifacts[1].download_url, None);
    }

    #[tokio::test]
    async fn curseforge_without_api_key_is_fatal() {
        let resolver = CurseForgeResolver::new(Client::new(), "  ");
        let err = resolver
            .resolve(vec![entry("1", "100", None)], &HashSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StarterError::MissingApiKey));
    }

    #[tokio::test]
    async fn curseforge_with_only_ignored_entries_skips_the_request() {
        // endpoint is unroutable; reaching it would fail the test
        let resolver =
            CurseForgeResolver::new(Client::new(), "key").with_endpoint("http://127.0.0.1:9/");
        let ignore = HashSet::from(["1".to_string()]);
        let artifacts = resolver
            .resolve(vec![entry("1", "100", None)], &ignore)
            .await
            .unwrap();
        assert!(artifacts.is_empty());
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..end]
            .lines()
            .find_map(|line| {
                line.to_ascii_lowercase()
                    .strip_prefix("content-length:")
                    .map(|v| v.trim().parse::<usize>().unwrap_or(0))
            })
            .unwrap_or(0);
        request.len() >= end + 4 + length
    }

    /// Answer a single request with `response`; returns the endpoint url.
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request_complete(&request) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{}/v1/mods/files", addr)
    }

    fn local_resolver(endpoint: String) -> CurseForgeResolver {
        let client = Client::builder().no_proxy().build().unwrap();
        CurseForgeResolver::new(client, "key").with_endpoint(endpoint)
    }

    #[tokio::test]
    async fn curseforge_error_status_is_fatal() {
        let endpoint = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let err = local_resolver(endpoint)
            .resolve(vec![entry("1", "100", None)], &HashSet::new())
            .await
            .unwrap_err();

        match err {
            StarterError::ResolveFailed(message) => assert!(message.contains("500"), "{message}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn curseforge_empty_body_is_fatal() {
        let endpoint = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let err = local_resolver(endpoint)
            .resolve(vec![entry("1", "100", None)], &HashSet::new())
            .await
            .unwrap_err();

        assert!(matches!(err, StarterError::ResolveFailed(_)));
    }

    #[tokio::test]
    async fn curseforge_response_becomes_artifacts() {
        let endpoint = serve_once(concat!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 94\r\n",
            "Connection: close\r\n\r\n",
            r#"{"data":[{"modId":1,"fileName":"a.jar","displayName":"A","downloadUrl":"https://edge/a.jar"}]}"#
        ))
        .await;

        let artifacts = local_resolver(endpoint)
            .resolve(vec![entry("1", "100", None)], &HashSet::new())
            .await
            .unwrap();

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].file_name, "a.jar");
        assert_eq!(artifacts[0].download_url.as_deref(), Some("https://edge/a.jar"));
    }

    #[tokio::test]
    async fn modrinth_resolution_drops_ignored_projects() {
        let entries = vec![
            entry(
                "AABB",
                "1122",
                Some("https://cdn.modrinth.com/data/AABB/versions/1122/a.jar"),
            ),
            entry(
                "CCDD",
                "3344",
                Some("https://cdn.modrinth.com/data/CCDD/versions/3344/b%2B.jar?x=1"),
            ),
        ];
        let ignore = HashSet::from(["CCDD".to_string()]);

        let artifacts = ModrinthResolver.resolve(entries, &ignore).await.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].id, "AABB");
        assert_eq!(artifacts[0].file_name, "a.jar");
    }

    #[test]
    fn file_name_strips_query_and_fragment() {
        assert_eq!(file_name_from_url("https://x/y/z.jar?token=1#frag"), "z.jar");
        assert_eq!(file_name_from_url("plain.jar"), "plain.jar");
    }
}
