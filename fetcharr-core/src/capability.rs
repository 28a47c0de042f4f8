//! Capability traits: the async collaborators the workflow engine drives
//! once `state_machine::transition` has decided what to call and with what.
//! One trait per capability named in the requirements doc's §6, plus the
//! two that originate work rather than react to it (`RequestSource`,
//! `LibraryScan`).

use std::sync::Arc;

use async_trait::async_trait;

use fetcharr_contracts::capability::EmitterKind;
use fetcharr_model::MediaItem;

use crate::error::{EngineError, Result};

#[async_trait]
pub trait TraktIndexer: Send + Sync {
    /// Whether a re-index of an already-indexed item is worth running.
    async fn should_submit(&self, existing: &MediaItem) -> bool;
    /// Resolves canonical metadata for `item` against the index, returning
    /// the indexed record (with `indexed_at` set).
    async fn run(&self, item: MediaItem) -> Result<MediaItem>;
}

#[async_trait]
pub trait Scraping: Send + Sync {
    async fn can_we_scrape(&self, item: &MediaItem) -> bool;
    /// Attaches candidate streams to `item` via the Cached-Source Selector.
    async fn run(&self, item: MediaItem) -> Result<MediaItem>;

    fn is_configured(&self) -> bool {
        true
    }
}

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Adds the item's active stream's magnet, waits for it to cache, and
    /// records the selected files.
    async fn run(&self, item: MediaItem) -> Result<MediaItem>;

    /// `false` for the `NotConfigured` stand-in; overridden by real adapters.
    /// Checked by `CapabilityRegistry::validate` per the Fatal Startup Error
    /// list in §7 ("no downloader" aborts startup).
    fn is_configured(&self) -> bool {
        true
    }
}

#[async_trait]
pub trait Symlinker: Send + Sync {
    async fn should_submit(&self, item: &MediaItem) -> bool;
    async fn run(&self, item: MediaItem) -> Result<MediaItem>;
}

#[async_trait]
pub trait Updater: Send + Sync {
    /// Notifies the downstream media server (Plex/Jellyfin/Emby) that a
    /// symlink now exists for this item.
    async fn run(&self, item: MediaItem) -> Result<MediaItem>;

    fn is_configured(&self) -> bool {
        true
    }
}

#[async_trait]
pub trait PostProcessing: Send + Sync {
    async fn should_submit(&self, item: &MediaItem) -> bool;
    async fn run(&self, item: MediaItem) -> Result<MediaItem>;
    fn enabled(&self) -> bool;
}

/// A source that originates new items (Overseerr, Plex Watchlist, Listrr,
/// Mdblist, a symlink library scan, Trakt lists). Driven by the content
/// poller scheduler on its own configured interval.
#[async_trait]
pub trait RequestSource: Send + Sync {
    fn name(&self) -> EmitterKind;
    async fn poll(&self) -> Result<Vec<MediaItem>>;
}

/// The library-scan source, kept distinct from `RequestSource` because the
/// retry sweeper drives it by incomplete-item count rather than by a plain
/// interval poll.
#[async_trait]
pub trait LibraryScan: Send + Sync {
    async fn incomplete_items(&self, page_size: u32) -> Result<Vec<MediaItem>>;
}

/// The assembled set of capabilities a running server has wired up.
/// Built once at startup and shared read-only behind `Arc`s; nothing here
/// is ever swapped at runtime.
pub struct CapabilityRegistry {
    pub trakt_indexer: Arc<dyn TraktIndexer>,
    pub scraping: Arc<dyn Scraping>,
    pub downloader: Arc<dyn Downloader>,
    pub symlinker: Arc<dyn Symlinker>,
    pub updater: Arc<dyn Updater>,
    pub post_processing: Arc<dyn PostProcessing>,
    pub request_sources: Vec<Arc<dyn RequestSource>>,
    pub library_scan: Option<Arc<dyn LibraryScan>>,
}

impl CapabilityRegistry {
    /// Fatal-startup validation per §7's required-capability list: no
    /// enabled request source AND no library scanner means nothing can ever
    /// enter the pipeline; no scraper, no downloader, or no updater means
    /// nothing already in the pipeline can ever finish it. Each aborts
    /// process startup with an explicit message rather than running a
    /// server that can only ever sit idle or dead-end every item.
    pub fn validate(&self) -> Result<()> {
        if self.request_sources.is_empty() && self.library_scan.is_none() {
            return Err(EngineError::FatalStartup(
                "CapabilityRegistry",
                "no request sources and no library scan configured; nothing could ever enter the pipeline".to_string(),
            ));
        }
        if !self.scraping.is_configured() {
            return Err(EngineError::FatalStartup(
                "CapabilityRegistry",
                "no scraper configured".to_string(),
            ));
        }
        if !self.downloader.is_configured() {
            return Err(EngineError::FatalStartup(
                "CapabilityRegistry",
                "no downloader configured".to_string(),
            ));
        }
        if !self.updater.is_configured() {
            return Err(EngineError::FatalStartup(
                "CapabilityRegistry",
                "no updater configured".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubTrakt;
    #[async_trait]
    impl TraktIndexer for StubTrakt {
        async fn should_submit(&self, _existing: &MediaItem) -> bool {
            true
        }
        async fn run(&self, item: MediaItem) -> Result<MediaItem> {
            Ok(item)
        }
    }

    struct Configured;
    #[async_trait]
    impl Scraping for Configured {
        async fn can_we_scrape(&self, _item: &MediaItem) -> bool {
            true
        }
        async fn run(&self, item: MediaItem) -> Result<MediaItem> {
            Ok(item)
        }
    }
    #[async_trait]
    impl Downloader for Configured {
        async fn run(&self, item: MediaItem) -> Result<MediaItem> {
            Ok(item)
        }
    }
    #[async_trait]
    impl Symlinker for Configured {
        async fn should_submit(&self, _item: &MediaItem) -> bool {
            true
        }
        async fn run(&self, item: MediaItem) -> Result<MediaItem> {
            Ok(item)
        }
    }
    #[async_trait]
    impl Updater for Configured {
        async fn run(&self, item: MediaItem) -> Result<MediaItem> {
            Ok(item)
        }
    }
    #[async_trait]
    impl PostProcessing for Configured {
        async fn should_submit(&self, _item: &MediaItem) -> bool {
            true
        }
        async fn run(&self, item: MediaItem) -> Result<MediaItem> {
            Ok(item)
        }
        fn enabled(&self) -> bool {
            true
        }
    }

    struct Unconfigured;
    #[async_trait]
    impl Scraping for Unconfigured {
        async fn can_we_scrape(&self, _item: &MediaItem) -> bool {
            false
        }
        async fn run(&self, _item: MediaItem) -> Result<MediaItem> {
            Err(EngineError::NotConfigured("Scraping"))
        }
        fn is_configured(&self) -> bool {
            false
        }
    }

    struct StubSource;
    #[async_trait]
    impl RequestSource for StubSource {
        fn name(&self) -> EmitterKind {
            EmitterKind::Overseerr
        }
        async fn poll(&self) -> Result<Vec<MediaItem>> {
            Ok(Vec::new())
        }
    }

    fn full_registry() -> CapabilityRegistry {
        CapabilityRegistry {
            trakt_indexer: Arc::new(StubTrakt),
            scraping: Arc::new(Configured),
            downloader: Arc::new(Configured),
            symlinker: Arc::new(Configured),
            updater: Arc::new(Configured),
            post_processing: Arc::new(Configured),
            request_sources: vec![Arc::new(StubSource)],
            library_scan: None,
        }
    }

    #[test]
    fn validate_passes_when_every_required_capability_is_configured() {
        assert!(full_registry().validate().is_ok());
    }

    #[test]
    fn validate_fails_with_no_request_source_and_no_library_scan() {
        let mut registry = full_registry();
        registry.request_sources.clear();
        assert!(registry.validate().is_err());
    }

    #[test]
    fn validate_fails_when_scraper_is_not_configured() {
        let mut registry = full_registry();
        registry.scraping = Arc::new(Unconfigured);
        assert!(registry.validate().is_err());
    }
}
