pub mod parser;
pub mod provider;
pub mod rate_limiter;
pub mod selector;

pub use provider::{DownloadProvider, RealDebridClient};
pub use rate_limiter::RateLimiter;
pub use selector::CachedSourceSelector;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use fetcharr_config::DownloaderSettings;
use fetcharr_model::MediaItem;

use crate::capability::Downloader as DownloaderCapability;
use crate::downloader::parser::parse_filename;
use crate::error::Result;

/// Wires the Cached-Source Selector and a `DownloadProvider` together into
/// the `Downloader` capability: select a cached container, add its magnet,
/// select its files, then poll the provider until the torrent finishes
/// caching (or the poll budget runs out, leaving the item un-downloaded
/// for the next workflow pass to retry).
pub struct RealDebridDownloader {
    provider: Arc<dyn DownloadProvider>,
    selector: CachedSourceSelector,
    poll_interval: Duration,
    max_polls: u32,
}

impl RealDebridDownloader {
    pub fn new(provider: Arc<dyn DownloadProvider>, settings: DownloaderSettings) -> Self {
        Self {
            selector: CachedSourceSelector::new(provider.clone(), settings),
            provider,
            poll_interval: Duration::from_secs(5),
            max_polls: 24,
        }
    }

    /// Records `file`/`folder`/`alternative_folder` per matched leaf and
    /// propagates `folder`/`alternative_folder` up to the Season/Show itself
    /// when it has none of its own yet — the container's name and the
    /// underlying file's own name both become known only once the torrent
    /// is added and refreshed, which is why this runs post-download rather
    /// than inside the selector. Mirrors the original adapter's
    /// `set_active_files`, which sets `alternative_folder` from
    /// `active_stream["alternative_name"]` (`info.original_filename`)
    /// alongside `folder` from `active_stream["name"]` (`info.filename`).
    fn apply_selection(
        item: &mut MediaItem,
        active: &fetcharr_model::ActiveStream,
        folder: &str,
        alternative_folder: &str,
    ) {
        match item {
            MediaItem::Movie(_) | MediaItem::Episode(_) => {
                if let Some(file) = active.files.values().next() {
                    item.base_mut().file = Some(file.filename.clone());
                    item.base_mut().folder = Some(folder.to_string());
                    item.base_mut().alternative_folder = Some(alternative_folder.to_string());
                }
            }
            MediaItem::Season(season) => {
                for file in active.files.values() {
                    let parsed = parse_filename(&file.filename);
                    if let Some(ep_number) = parsed.episode {
                        if let Some(ep) = season.episodes.iter_mut().find(|e| e.number == ep_number)
                        {
                            ep.base.file = Some(file.filename.clone());
                            ep.base.folder = Some(folder.to_string());
                            ep.base.alternative_folder = Some(alternative_folder.to_string());
                        }
                    }
                }
                if season.base.folder.is_none() {
                    season.base.folder = Some(folder.to_string());
                }
                if season.base.alternative_folder.is_none() {
                    season.base.alternative_folder = Some(alternative_folder.to_string());
                }
            }
            MediaItem::Show(show) => {
                for file in active.files.values() {
                    let parsed = parse_filename(&file.filename);
                    if let (Some(season_number), Some(ep_number)) = (parsed.season, parsed.episode)
                    {
                        if let Some(season) =
                            show.seasons.iter_mut().find(|s| s.number == season_number)
                        {
                            if let Some(ep) =
                                season.episodes.iter_mut().find(|e| e.number == ep_number)
                            {
                                ep.base.file = Some(file.filename.clone());
                                ep.base.folder = Some(folder.to_string());
                                ep.base.alternative_folder = Some(alternative_folder.to_string());
                            }
                            if season.base.folder.is_none() {
                                season.base.folder = Some(folder.to_string());
                            }
                            if season.base.alternative_folder.is_none() {
                                season.base.alternative_folder = Some(alternative_folder.to_string());
                            }
                        }
                    }
                }
                if show.base.folder.is_none() {
                    show.base.folder = Some(folder.to_string());
                }
                if show.base.alternative_folder.is_none() {
                    show.base.alternative_folder = Some(alternative_folder.to_string());
                }
            }
        }
    }
}

#[async_trait]
impl DownloaderCapability for RealDebridDownloader {
    async fn run(&self, mut item: MediaItem) -> Result<MediaItem> {
        let outcome = self.selector.select(&item, &[]).await?;
        for hash in &outcome.blacklisted_infohashes {
            item.base_mut().blacklist(hash);
        }

        let Some(mut active) = outcome.selected else {
            return Ok(item);
        };

        let torrent_id = self.provider.add_magnet(&active.hash).await?;
        let file_ids: Vec<String> = active.files.keys().cloned().collect();
        self.provider.select_files(&torrent_id, &file_ids).await?;

        let mut folder = active.hash.clone();
        let mut alternative_folder = active.hash.clone();
        for _ in 0..self.max_polls {
            let info = self.provider.get_torrent_info(&torrent_id).await?;
            if info.status == "downloaded" {
                folder = if info.filename.is_empty() {
                    active.hash.clone()
                } else {
                    info.filename.clone()
                };
                alternative_folder = if info.original_filename.is_empty() {
                    active.hash.clone()
                } else {
                    info.original_filename.clone()
                };
                active.id = Some(info.id);
                break;
            }
            sleep(self.poll_interval).await;
        }

        Self::apply_selection(&mut item, &active, &folder, &alternative_folder);
        item.base_mut().active_stream = Some(active);
        Ok(item)
    }
}
