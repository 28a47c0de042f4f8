//! Concrete capability adapters wired by `main`. Only `Downloader` (via
//! `fetcharr_core::downloader::RealDebridDownloader`) and `Overseerr` (via
//! `OverseerrSource` below) talk to a real external system in this build;
//! everything else gets a `NotConfigured` stand-in so the registry always
//! has a trait object to hold, and a deployment that later grows a real
//! Trakt/scraper/symlinker/updater adapter can drop it in without touching
//! `fetcharr-core`.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use fetcharr_contracts::capability::EmitterKind;
use fetcharr_core::{
    Downloader, EngineError, LibraryScan, PostProcessing, RequestSource, Result, Scraping,
    Symlinker, TraktIndexer, Updater,
};
use fetcharr_model::media_item::MediaItemBase;
use fetcharr_model::{MediaItem, Movie};

/// A capability with no real backend in this build. `should_submit`/
/// `can_we_scrape` predicates default to `false` (never volunteer work for
/// a capability that can't do it); `run` fails fatally so a misconfigured
/// deployment finds out from a failed workflow run rather than silent
/// no-ops.
pub struct NotConfigured {
    name: &'static str,
}

impl NotConfigured {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl TraktIndexer for NotConfigured {
    async fn should_submit(&self, _existing: &MediaItem) -> bool {
        false
    }

    async fn run(&self, _item: MediaItem) -> Result<MediaItem> {
        Err(EngineError::NotConfigured(self.name))
    }
}

#[async_trait]
impl Scraping for NotConfigured {
    async fn can_we_scrape(&self, _item: &MediaItem) -> bool {
        false
    }

    async fn run(&self, _item: MediaItem) -> Result<MediaItem> {
        Err(EngineError::NotConfigured(self.name))
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[async_trait]
impl Symlinker for NotConfigured {
    async fn should_submit(&self, _item: &MediaItem) -> bool {
        false
    }

    async fn run(&self, _item: MediaItem) -> Result<MediaItem> {
        Err(EngineError::NotConfigured(self.name))
    }
}

#[async_trait]
impl Downloader for NotConfigured {
    async fn run(&self, _item: MediaItem) -> Result<MediaItem> {
        Err(EngineError::NotConfigured(self.name))
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[async_trait]
impl Updater for NotConfigured {
    async fn run(&self, _item: MediaItem) -> Result<MediaItem> {
        Err(EngineError::NotConfigured(self.name))
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[async_trait]
impl PostProcessing for NotConfigured {
    async fn should_submit(&self, _item: &MediaItem) -> bool {
        false
    }

    async fn run(&self, _item: MediaItem) -> Result<MediaItem> {
        Err(EngineError::NotConfigured(self.name))
    }

    fn enabled(&self) -> bool {
        false
    }
}

#[async_trait]
impl LibraryScan for NotConfigured {
    async fn incomplete_items(&self, _page_size: u32) -> Result<Vec<MediaItem>> {
        Ok(Vec::new())
    }
}

/// Polls Overseerr's pending-request list and turns each into a skeleton
/// `Movie` item — `requested_at`/`requested_by`/`overseerr_id` set, nothing
/// else resolved yet; the `TraktIndexer` capability fills in the rest on
/// the workflow's first pass, same as any other freshly requested item.
pub struct OverseerrSource {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OverseerrSource {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Deserialize)]
struct OverseerrRequestPage {
    results: Vec<OverseerrRequest>,
}

#[derive(Deserialize)]
struct OverseerrRequest {
    id: i64,
    #[serde(rename = "requestedBy")]
    requested_by: Option<OverseerrUser>,
    media: OverseerrMedia,
}

#[derive(Deserialize)]
struct OverseerrUser {
    username: Option<String>,
}

#[derive(Deserialize)]
struct OverseerrMedia {
    #[serde(rename = "imdbId")]
    imdb_id: Option<String>,
    title: Option<String>,
}

#[async_trait]
impl RequestSource for OverseerrSource {
    fn name(&self) -> EmitterKind {
        EmitterKind::Overseerr
    }

    async fn poll(&self) -> Result<Vec<MediaItem>> {
        let response = self
            .http
            .get(format!("{}/api/v1/request", self.base_url))
            .query(&[("filter", "unavailable"), ("take", "50")])
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;
        let page: OverseerrRequestPage = response.json().await?;

        Ok(page
            .results
            .into_iter()
            .filter_map(|req| {
                let imdb_id = req.media.imdb_id?;
                let title = req.media.title.unwrap_or_else(|| imdb_id.clone());
                let mut base = MediaItemBase::new(imdb_id.clone(), title);
                base.external_ids.imdb_id = Some(imdb_id);
                base.requested_at = Some(Utc::now());
                base.requested_by = req.requested_by.and_then(|u| u.username);
                base.overseerr_id = Some(req.id);
                Some(MediaItem::Movie(Movie { base }))
            })
            .collect())
    }
}
