//! The download provider port and its Real-Debrid implementation. Mirrors
//! the original `realdebrid.py` adapter's endpoint set, trimmed to what
//! the Cached-Source Selector actually calls.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::downloader::rate_limiter::RateLimiter;
use crate::error::{EngineError, Result};

const RD_BASE_URL: &str = "https://api.real-debrid.com/rest/1.0";

/// One file inside a provider container, before or after selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerFile {
    pub id: String,
    pub path: String,
    pub bytes: i64,
}

/// The set of files a provider reports as instantly available for an
/// infohash, keyed by the provider's own container/"variant" id — a single
/// infohash can have more than one cached container (different rips of the
/// same release grouped under one torrent).
#[derive(Debug, Clone, Default)]
pub struct CachedContainer {
    pub variant_id: String,
    pub files: Vec<ContainerFile>,
}

#[derive(Debug, Clone)]
pub struct TorrentInfo {
    pub id: String,
    pub status: String,
    pub files: Vec<ContainerFile>,
    /// Populated once the provider has finished caching and generated
    /// direct links, one per selected file, in file order.
    pub links: Vec<String>,
    /// The provider's own name for the container, known only after the
    /// magnet is added — used as the item's `folder` once downloading
    /// finishes, per the original adapter's "folder = torrent filename"
    /// convention.
    pub filename: String,
    /// The provider's name for the underlying file itself, distinct from
    /// `filename` (the container/torrent name) — used as the item's
    /// `alternative_folder`, per the original adapter's
    /// `active_stream["alternative_name"] = info.original_filename`.
    pub original_filename: String,
}

/// One entry from the provider's torrent list, as needed by the
/// already-downloaded check: the infohash it was added under plus the
/// files currently selected on it.
#[derive(Debug, Clone)]
pub struct TorrentSummary {
    pub id: String,
    pub hash: String,
    pub selected_files: Vec<ContainerFile>,
}

#[async_trait]
pub trait DownloadProvider: Send + Sync {
    /// Checks cached availability for up to 5 infohashes at a time (the
    /// selector enforces the chunking; this trait just takes what it's
    /// given). Infohashes with no cached containers are absent from the
    /// returned map rather than present with an empty vec.
    async fn check_cached(
        &self,
        infohashes: &[String],
    ) -> Result<HashMap<String, Vec<CachedContainer>>>;

    /// Adds a magnet for `infohash` and returns the provider's torrent id.
    async fn add_magnet(&self, infohash: &str) -> Result<String>;

    async fn select_files(&self, torrent_id: &str, file_ids: &[String]) -> Result<()>;

    async fn get_torrent_info(&self, torrent_id: &str) -> Result<TorrentInfo>;

    async fn delete_torrent(&self, torrent_id: &str) -> Result<()>;

    /// Lists up to `limit` torrents already on the account, for the
    /// "already downloaded" check (§4.3): an item whose `active_stream.hash`
    /// already has a matching provider torrent skips re-selection entirely.
    async fn list_torrents(&self, limit: u32) -> Result<Vec<TorrentSummary>>;
}

/// `magnet:?xt=urn:btih:{hash}&dn=&tr=` — no trackers, no display name.
/// The provider resolves trackers itself; adding them here only risks the
/// provider treating a stale tracker list as authoritative.
pub fn magnet_uri(infohash: &str) -> String {
    format!("magnet:?xt=urn:btih:{infohash}&dn=&tr=")
}

pub struct RealDebridClient {
    http: Client,
    api_key: String,
    base_url: String,
    torrents_limiter: RateLimiter,
    overall_limiter: RateLimiter,
}

impl RealDebridClient {
    pub fn new(api_key: impl Into<String>, proxy_url: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(30));
        if let Some(proxy) = proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(Self {
            http: builder.build()?,
            api_key: api_key.into(),
            base_url: RD_BASE_URL.to_string(),
            torrents_limiter: RateLimiter::new(1, Duration::from_secs(1)),
            overall_limiter: RateLimiter::new(60, Duration::from_secs(60)),
        })
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.api_key)
    }

    async fn get(&self, path: &str, is_torrents_endpoint: bool) -> Result<reqwest::Response> {
        self.overall_limiter.acquire().await;
        if is_torrents_endpoint {
            self.torrents_limiter.acquire().await;
        }
        let response = self
            .authed(self.http.get(format!("{}{}", self.base_url, path)))
            .send()
            .await?;
        Self::check_status(response).await
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
        is_torrents_endpoint: bool,
    ) -> Result<reqwest::Response> {
        self.overall_limiter.acquire().await;
        if is_torrents_endpoint {
            self.torrents_limiter.acquire().await;
        }
        let response = self
            .authed(self.http.post(format!("{}{}", self.base_url, path)))
            .form(form)
            .send()
            .await?;
        Self::check_status(response).await
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(response),
            status => Err(EngineError::Provider(format!(
                "real-debrid responded {status}"
            ))),
        }
    }
}

#[derive(Deserialize)]
struct RdAvailabilityEntry {
    #[serde(default)]
    rd: Vec<HashMap<String, RdAvailabilityFile>>,
}

#[derive(Deserialize)]
struct RdAvailabilityFile {
    filename: String,
    filesize: i64,
}

#[derive(Deserialize)]
struct RdAddMagnetResponse {
    id: String,
}

#[derive(Deserialize)]
struct RdTorrentInfoFile {
    id: i64,
    path: String,
    bytes: i64,
}

#[derive(Deserialize)]
struct RdTorrentInfoResponse {
    id: String,
    status: String,
    #[serde(default)]
    files: Vec<RdTorrentInfoFile>,
    #[serde(default)]
    links: Vec<String>,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    original_filename: String,
}

#[derive(Deserialize)]
struct RdTorrentListEntry {
    id: String,
    hash: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    bytes: i64,
}

#[async_trait]
impl DownloadProvider for RealDebridClient {
    async fn check_cached(
        &self,
        infohashes: &[String],
    ) -> Result<HashMap<String, Vec<CachedContainer>>> {
        let joined = infohashes.join("/");
        let response = self
            .get(&format!("/torrents/instantAvailability/{joined}"), true)
            .await?;

        let body: HashMap<String, RdAvailabilityEntry> = response.json().await?;
        let mut result = HashMap::new();
        for (hash, entry) in body {
            let containers = entry
                .rd
                .into_iter()
                .enumerate()
                .map(|(idx, variant)| {
                    let files = variant
                        .into_iter()
                        .map(|(id, f)| ContainerFile {
                            id,
                            path: f.filename,
                            bytes: f.filesize,
                        })
                        .collect();
                    CachedContainer {
                        variant_id: idx.to_string(),
                        files,
                    }
                })
                .collect();
            result.insert(hash, containers);
        }
        Ok(result)
    }

    async fn add_magnet(&self, infohash: &str) -> Result<String> {
        let magnet = magnet_uri(infohash);
        let response = self
            .post_form("/torrents/addMagnet", &[("magnet", magnet.as_str())], true)
            .await?;
        let body: RdAddMagnetResponse = response.json().await?;
        Ok(body.id)
    }

    async fn select_files(&self, torrent_id: &str, file_ids: &[String]) -> Result<()> {
        let joined = file_ids.join(",");
        self.post_form(
            &format!("/torrents/selectFiles/{torrent_id}"),
            &[("files", joined.as_str())],
            true,
        )
        .await?;
        Ok(())
    }

    async fn get_torrent_info(&self, torrent_id: &str) -> Result<TorrentInfo> {
        let response = self
            .get(&format!("/torrents/info/{torrent_id}"), true)
            .await?;
        let body: RdTorrentInfoResponse = response.json().await?;
        Ok(TorrentInfo {
            id: body.id,
            status: body.status,
            files: body
                .files
                .into_iter()
                .map(|f| ContainerFile {
                    id: f.id.to_string(),
                    path: f.path,
                    bytes: f.bytes,
                })
                .collect(),
            links: body.links,
            filename: body.filename,
            original_filename: body.original_filename,
        })
    }

    async fn delete_torrent(&self, torrent_id: &str) -> Result<()> {
        self.overall_limiter.acquire().await;
        self.torrents_limiter.acquire().await;
        let response = self
            .authed(
                self.http
                    .delete(format!("{}/torrents/delete/{torrent_id}", self.base_url)),
            )
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// The list endpoint reports one aggregate `filename`/`bytes` pair per
    /// torrent rather than per selected file, so each entry is surfaced as a
    /// single synthetic `ContainerFile` — enough for the already-downloaded
    /// check's size/parse predicates, without an info call per torrent
    /// (which at up to 1000 torrents would itself blow the rate budget).
    async fn list_torrents(&self, limit: u32) -> Result<Vec<TorrentSummary>> {
        let response = self
            .get(&format!("/torrents?limit={limit}"), true)
            .await?;
        let entries: Vec<RdTorrentListEntry> = response.json().await?;
        Ok(entries
            .into_iter()
            .map(|e| TorrentSummary {
                selected_files: vec![ContainerFile {
                    id: e.id.clone(),
                    path: e.filename,
                    bytes: e.bytes,
                }],
                id: e.id,
                hash: e.hash.to_lowercase(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnet_uri_has_no_trackers_or_display_name() {
        assert_eq!(
            magnet_uri("abc123"),
            "magnet:?xt=urn:btih:abc123&dn=&tr="
        );
    }
}
