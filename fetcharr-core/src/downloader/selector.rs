//! The Cached-Source Selector: turns an item's ranked, attached streams
//! into either a provider-cached container selected as the item's active
//! stream, or a set of infohashes to blacklist. Ports
//! `_process_providers`/`_evaluate_stream_response`/`_is_wanted_*` from the
//! original `realdebrid.py`.

use std::collections::{HashMap, HashSet};

use chrono::Utc;

use fetcharr_config::DownloaderSettings;
use fetcharr_model::media_item::{Episode, Season, Show};
use fetcharr_model::{ActiveStream, ActiveStreamFile, ItemState, MediaItem};

use crate::downloader::parser::parse_filename;
use crate::downloader::provider::{CachedContainer, ContainerFile, DownloadProvider};
use crate::error::Result;

/// Containers are probed 5 infohashes at a time — the provider's
/// `instantAvailability` endpoint takes the hash list in the URL path, and
/// chunking keeps that path under providers' practical length limits.
const CHUNK_SIZE: usize = 5;

const WANTED_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi"];

/// Minimum size a selected movie-shaped file must be for the
/// already-downloaded check to count it — the same floor the original
/// `realdebrid.py` used for "is this actually a movie file" when it had no
/// parsed title to lean on.
const ALREADY_DOWNLOADED_MOVIE_MIN_BYTES: i64 = 200 * 1024 * 1024;

/// The provider's own account-wide torrent list is capped here; scanning
/// more than this for a single already-downloaded check isn't worth the
/// extra request latency.
const ALREADY_DOWNLOADED_LIST_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Default)]
pub struct SelectionOutcome {
    /// Set when the item's existing `active_stream` already corresponds to
    /// a provider torrent whose selected files satisfy this item per kind —
    /// the run contract's step 1, which short-circuits everything else.
    pub already_downloaded: bool,
    pub selected: Option<ActiveStream>,
    /// Infohashes to move to the item's blacklist: either the provider
    /// reported zero cached containers for these, or (for Movie/Episode
    /// only) every returned container failed the wanted-files predicate.
    pub blacklisted_infohashes: Vec<String>,
    /// Set when the full scan completed without selecting anything for a
    /// terminal-kind item — distinguishes "nothing was cached" from "we
    /// never got to probe" for callers that want to log accordingly.
    pub no_wanted_cached_streams: bool,
}

pub struct CachedSourceSelector {
    provider: std::sync::Arc<dyn DownloadProvider>,
    settings: DownloaderSettings,
}

impl CachedSourceSelector {
    pub fn new(provider: std::sync::Arc<dyn DownloadProvider>, settings: DownloaderSettings) -> Self {
        Self { provider, settings }
    }

    /// Runs the full selection algorithm for `item`. `sibling_containers`
    /// carries `(infohash, files)` pairs already active on sibling seasons
    /// of the same show (the selector itself has no store access to look
    /// these up; the caller — the `Downloader` capability, which does have
    /// the full show tree in hand when operating at season granularity —
    /// passes whatever it already loaded). Pass `&[]` when there are none.
    pub async fn select(
        &self,
        item: &MediaItem,
        sibling_containers: &[(String, Vec<ContainerFile>)],
    ) -> Result<SelectionOutcome> {
        if let Some(active) = item.base().active_stream.clone() {
            if self.already_downloaded(item, &active).await? {
                return Ok(SelectionOutcome {
                    already_downloaded: true,
                    ..Default::default()
                });
            }
        }

        let base = item.base();
        if base.attached_streams.is_empty() {
            return Ok(SelectionOutcome::default());
        }

        for (hash, files) in sibling_containers {
            if let Some(files) = self.wanted_files(item, files) {
                return Ok(SelectionOutcome {
                    selected: Some(active_stream_from(hash.clone(), files)),
                    ..Default::default()
                });
            }
        }

        let is_terminal = matches!(item, MediaItem::Movie(_) | MediaItem::Episode(_));

        let mut unique_hashes = Vec::new();
        let mut seen = HashSet::new();
        for stream in &base.attached_streams {
            if seen.insert(stream.infohash.clone()) {
                unique_hashes.push(stream.infohash.clone());
            }
        }

        let mut blacklisted = Vec::new();
        let mut any_container_seen = false;

        for chunk in unique_hashes.chunks(CHUNK_SIZE) {
            let chunk_hashes = chunk.to_vec();
            let result = match self.provider.check_cached(&chunk_hashes).await {
                Ok(r) => r,
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        chunk_size = chunk_hashes.len(),
                        "cached-availability probe failed, skipping chunk"
                    );
                    continue;
                }
            };

            for hash in &chunk_hashes {
                let containers: &Vec<CachedContainer> = match result.get(hash) {
                    Some(c) if !c.is_empty() => c,
                    _ => {
                        blacklisted.push(hash.clone());
                        continue;
                    }
                };

                any_container_seen = true;
                let mut sorted = containers.clone();
                sorted.sort_by(|a, b| b.files.len().cmp(&a.files.len()));

                let matched = sorted
                    .iter()
                    .find_map(|container| self.wanted_files(item, &container.files));

                match matched {
                    Some(files) => {
                        return Ok(SelectionOutcome {
                            selected: Some(active_stream_from(hash.clone(), files)),
                            blacklisted_infohashes: blacklisted,
                            ..Default::default()
                        });
                    }
                    None if is_terminal => blacklisted.push(hash.clone()),
                    // Season/Show: an unsatisfying container here doesn't
                    // doom the stream — a later chunk or container may
                    // still cover the remaining needed episodes.
                    None => {}
                }
            }
        }

        if is_terminal {
            for hash in &unique_hashes {
                if !blacklisted.contains(hash) {
                    blacklisted.push(hash.clone());
                }
            }
            return Ok(SelectionOutcome {
                blacklisted_infohashes: blacklisted,
                no_wanted_cached_streams: true,
                ..Default::default()
            });
        }

        Ok(SelectionOutcome {
            blacklisted_infohashes: blacklisted,
            no_wanted_cached_streams: !any_container_seen,
            ..Default::default()
        })
    }

    async fn already_downloaded(&self, item: &MediaItem, active: &ActiveStream) -> Result<bool> {
        let torrents = self
            .provider
            .list_torrents(ALREADY_DOWNLOADED_LIST_LIMIT)
            .await?;
        let Some(torrent) = torrents
            .iter()
            .find(|t| t.hash.eq_ignore_ascii_case(&active.hash))
        else {
            return Ok(false);
        };
        Ok(self.selected_files_satisfy(item, &torrent.selected_files))
    }

    fn selected_files_satisfy(&self, item: &MediaItem, selected: &[ContainerFile]) -> bool {
        match item {
            MediaItem::Movie(_) => selected
                .iter()
                .any(|f| f.bytes >= ALREADY_DOWNLOADED_MOVIE_MIN_BYTES),
            MediaItem::Episode(e) => selected.iter().any(|f| {
                let parsed = parse_filename(&f.path);
                parsed.episode == Some(e.number)
                    && match e.season_number {
                        Some(season) => parsed.season == Some(season),
                        None => true,
                    }
            }),
            MediaItem::Season(season) => {
                let needed = needed_episode_numbers(season);
                if needed.is_empty() {
                    return true;
                }
                let covered = covered_episode_count(selected, season.number, false, &needed);
                covered * 2 >= needed.len()
            }
            MediaItem::Show(show) => {
                let single_season = show.seasons.len() == 1;
                let mut needed_total = 0usize;
                let mut covered_total = 0usize;
                for season in &show.seasons {
                    let needed = needed_episode_numbers(season);
                    needed_total += needed.len();
                    covered_total +=
                        covered_episode_count(selected, season.number, single_season, &needed);
                }
                if needed_total == 0 {
                    return true;
                }
                covered_total * 2 >= needed_total
            }
        }
    }

    fn wanted_files<'a>(
        &self,
        item: &MediaItem,
        files: &'a [ContainerFile],
    ) -> Option<Vec<&'a ContainerFile>> {
        let videos: Vec<&ContainerFile> = files
            .iter()
            .filter(|f| has_wanted_extension(&f.path))
            .collect();
        if videos.is_empty() {
            return None;
        }

        match item {
            MediaItem::Movie(_) => self.wanted_movie_files(videos),
            MediaItem::Episode(e) => self.wanted_episode_files(videos, e.number, e.season_number),
            MediaItem::Season(s) => self.wanted_season_files(videos, s, false),
            MediaItem::Show(s) => self.wanted_show_files(videos, s),
        }
    }

    /// Among recognized-extension, in-bounds files, sorted by descending
    /// size, the first one whose parsed title is non-empty and whose name
    /// doesn't look like a sample clip.
    fn wanted_movie_files<'a>(
        &self,
        videos: Vec<&'a ContainerFile>,
    ) -> Option<Vec<&'a ContainerFile>> {
        let mut in_bounds: Vec<&ContainerFile> = videos
            .into_iter()
            .filter(|f| {
                self.in_bounds(
                    f.bytes,
                    self.settings.movie_filesize_min_bytes,
                    self.settings.movie_filesize_max_bytes,
                )
            })
            .collect();
        in_bounds.sort_by(|a, b| b.bytes.cmp(&a.bytes));

        in_bounds
            .into_iter()
            .find(|f| {
                !is_sample(&f.path)
                    && parse_filename(&f.path)
                        .title
                        .is_some_and(|t| !t.is_empty())
            })
            .map(|f| vec![f])
    }

    /// Matches on episode number, constrained to `season_number` when it's
    /// known — mirroring `wanted_season_files`'s `single_season` escape
    /// hatch, a multi-season pack otherwise mis-attributes a same-numbered
    /// episode from the wrong season. `season_number` is only absent for an
    /// episode that never went through a `Season` (no season context to
    /// constrain on at all), in which case the old unconstrained behavior
    /// is the only option left.
    fn wanted_episode_files<'a>(
        &self,
        videos: Vec<&'a ContainerFile>,
        episode_number: u32,
        season_number: Option<u32>,
    ) -> Option<Vec<&'a ContainerFile>> {
        let mut in_bounds: Vec<&ContainerFile> = videos
            .into_iter()
            .filter(|f| {
                !is_sample(&f.path)
                    && self.in_bounds(
                        f.bytes,
                        self.settings.episode_filesize_min_bytes,
                        self.settings.episode_filesize_max_bytes,
                    )
            })
            .collect();
        in_bounds.sort_by(|a, b| b.bytes.cmp(&a.bytes));

        in_bounds
            .into_iter()
            .find(|f| {
                let parsed = parse_filename(&f.path);
                if parsed.episode != Some(episode_number) {
                    return false;
                }
                match season_number {
                    Some(season) => parsed.season == Some(season),
                    None => true,
                }
            })
            .map(|f| vec![f])
    }

    /// Accepts a container iff it covers at least one needed episode —
    /// partial coverage is fine (scenario: a container spanning episodes
    /// 1-5 of a 10-episode season still gets selected; the unmatched
    /// episodes stay unfulfilled for a later pass, not a failed selection).
    fn wanted_season_files<'a>(
        &self,
        videos: Vec<&'a ContainerFile>,
        season: &Season,
        single_season: bool,
    ) -> Option<Vec<&'a ContainerFile>> {
        let wanted_episodes = needed_episode_numbers(season);
        if wanted_episodes.is_empty() {
            return None;
        }

        let mut matched: HashMap<u32, &ContainerFile> = HashMap::new();
        for file in &videos {
            if is_sample(&file.path) {
                continue;
            }
            if !self.in_bounds(
                file.bytes,
                self.settings.episode_filesize_min_bytes,
                self.settings.episode_filesize_max_bytes,
            ) {
                continue;
            }
            let parsed = parse_filename(&file.path);
            if !single_season && parsed.season != Some(season.number) {
                continue;
            }
            if let Some(ep) = parsed.episode {
                if wanted_episodes.contains(&ep) {
                    matched.entry(ep).or_insert(file);
                }
            }
        }

        if matched.is_empty() {
            None
        } else {
            Some(matched.into_values().collect())
        }
    }

    /// Generalizes the season predicate across every season with one
    /// container set; accepted iff at least one season gets at least one
    /// needed episode matched.
    fn wanted_show_files<'a>(
        &self,
        videos: Vec<&'a ContainerFile>,
        show: &Show,
    ) -> Option<Vec<&'a ContainerFile>> {
        let single_season = show.seasons.len() == 1;
        let mut all_matched = Vec::new();
        let mut any = false;
        for season in &show.seasons {
            if let Some(files) = self.wanted_season_files(videos.clone(), season, single_season) {
                any = true;
                all_matched.extend(files);
            }
        }
        if any {
            Some(all_matched)
        } else {
            None
        }
    }

    fn in_bounds(&self, size: i64, min: i64, max: i64) -> bool {
        (min < 0 || size >= min) && (max < 0 || size <= max)
    }
}

fn active_stream_from(hash: String, files: Vec<&ContainerFile>) -> ActiveStream {
    let mut active = ActiveStream::new(hash);
    for file in files {
        active.files.insert(
            file.id.clone(),
            ActiveStreamFile {
                filename: file.path.clone(),
                size: file.bytes,
            },
        );
    }
    active
}

/// Episode numbers for a season whose state still needs a download and
/// which have already aired — the set the season/show wanted-files
/// predicates try to cover.
fn needed_episode_numbers(season: &Season) -> HashSet<u32> {
    let now = Utc::now();
    season
        .episodes
        .iter()
        .filter(|ep: &&Episode| {
            let state = MediaItem::Episode((*ep).clone()).state();
            matches!(
                state,
                ItemState::Indexed
                    | ItemState::Scraped
                    | ItemState::Unknown
                    | ItemState::Failed
                    | ItemState::PartiallyCompleted
            ) && ep.base.is_aired(now)
        })
        .map(|ep| ep.number)
        .collect()
}

fn covered_episode_count(
    selected: &[ContainerFile],
    season_number: u32,
    single_season: bool,
    needed: &HashSet<u32>,
) -> usize {
    let mut covered = HashSet::new();
    for file in selected {
        let parsed = parse_filename(&file.path);
        if !single_season && parsed.season != Some(season_number) {
            continue;
        }
        if let Some(ep) = parsed.episode {
            if needed.contains(&ep) {
                covered.insert(ep);
            }
        }
    }
    covered.len()
}

fn has_wanted_extension(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| WANTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_sample(path: &str) -> bool {
    path.to_ascii_lowercase().contains("sample")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::provider::TorrentSummary;
    use async_trait::async_trait;
    use fetcharr_model::media_item::MediaItemBase;
    use fetcharr_model::{Movie, Stream};

    #[derive(Default)]
    struct StaticProvider {
        containers: HashMap<String, Vec<CachedContainer>>,
        torrents: Vec<TorrentSummary>,
        fail_chunks_containing: Option<String>,
    }

    #[async_trait]
    impl DownloadProvider for StaticProvider {
        async fn check_cached(
            &self,
            infohashes: &[String],
        ) -> Result<HashMap<String, Vec<CachedContainer>>> {
            if let Some(poison) = &self.fail_chunks_containing {
                if infohashes.iter().any(|h| h == poison) {
                    return Err(crate::error::EngineError::Provider("boom".into()));
                }
            }
            Ok(infohashes
                .iter()
                .filter_map(|h| self.containers.get(h).map(|c| (h.clone(), c.clone())))
                .collect())
        }
        async fn add_magnet(&self, _infohash: &str) -> Result<String> {
            Ok("torrent-1".into())
        }
        async fn select_files(&self, _torrent_id: &str, _file_ids: &[String]) -> Result<()> {
            Ok(())
        }
        async fn get_torrent_info(
            &self,
            _torrent_id: &str,
        ) -> Result<crate::downloader::provider::TorrentInfo> {
            Err(crate::error::EngineError::Provider(
                "get_torrent_info not exercised by these tests".into(),
            ))
        }
        async fn delete_torrent(&self, _torrent_id: &str) -> Result<()> {
            Ok(())
        }
        async fn list_torrents(&self, _limit: u32) -> Result<Vec<TorrentSummary>> {
            Ok(self.torrents.clone())
        }
    }

    fn movie_with_stream(infohash: &str) -> MediaItem {
        let mut base = MediaItemBase::new("tt0133093", "The Matrix");
        base.attached_streams.push(Stream::new(infohash, "The.Matrix.1999"));
        MediaItem::Movie(Movie { base })
    }

    fn episode_with_stream(infohash: &str, number: u32, season_number: Option<u32>) -> MediaItem {
        let mut base = MediaItemBase::new("ep-1", "Episode 1");
        base.attached_streams.push(Stream::new(infohash, "Show"));
        MediaItem::Episode(Episode {
            base,
            parent_season_id: None,
            season_number,
            number,
        })
    }

    fn season_with_episodes(numbers: &[u32], infohash: &str) -> MediaItem {
        let mut base = MediaItemBase::new("season-1", "Season 1");
        base.attached_streams.push(Stream::new(infohash, "Show.S01"));
        let mut season = Season {
            base,
            parent_show_id: None,
            number: 1,
            episodes: Vec::new(),
        };
        for &n in numbers {
            season.insert_episode(Episode {
                base: MediaItemBase::new(format!("ep-{n}"), format!("Episode {n}")),
                parent_season_id: None,
                season_number: None,
                number: n,
            });
        }
        MediaItem::Season(season)
    }

    #[tokio::test]
    async fn selects_the_biggest_non_sample_video_for_a_movie() {
        let mut containers = HashMap::new();
        containers.insert(
            "hash1".to_string(),
            vec![CachedContainer {
                variant_id: "0".into(),
                files: vec![
                    ContainerFile {
                        id: "1".into(),
                        path: "The.Matrix.1999.mkv".into(),
                        bytes: 5_000_000_000,
                    },
                    ContainerFile {
                        id: "2".into(),
                        path: "The.Matrix.1999.Sample.mkv".into(),
                        bytes: 9_000_000_000,
                    },
                ],
            }],
        );
        let provider = std::sync::Arc::new(StaticProvider {
            containers,
            ..Default::default()
        });
        let selector = CachedSourceSelector::new(provider, DownloaderSettings::default());

        let outcome = selector
            .select(&movie_with_stream("hash1"), &[])
            .await
            .unwrap();
        let selected = outcome.selected.expect("should select a container");
        assert_eq!(selected.files.len(), 1);
        assert!(selected.files.contains_key("1"));
    }

    #[tokio::test]
    async fn episode_selection_rejects_a_same_numbered_episode_from_the_wrong_season() {
        let mut containers = HashMap::new();
        containers.insert(
            "hashA".to_string(),
            vec![CachedContainer {
                variant_id: "0".into(),
                files: vec![
                    ContainerFile {
                        id: "1".into(),
                        path: "Show.S01E01.mkv".into(),
                        bytes: 500_000_000,
                    },
                    ContainerFile {
                        id: "2".into(),
                        path: "Show.S02E01.mkv".into(),
                        bytes: 500_000_000,
                    },
                ],
            }],
        );
        let provider = std::sync::Arc::new(StaticProvider {
            containers,
            ..Default::default()
        });
        let selector = CachedSourceSelector::new(provider, DownloaderSettings::default());

        // Episode 1 of season 2 — a container with both a season-1 and a
        // season-2 E01 must only match the latter.
        let item = episode_with_stream("hashA", 1, Some(2));
        let outcome = selector.select(&item, &[]).await.unwrap();
        let selected = outcome.selected.expect("should select the season-2 container");
        assert_eq!(selected.files.len(), 1);
        assert!(selected.files.contains_key("2"));
    }

    #[tokio::test]
    async fn blacklists_hashes_with_no_cached_containers() {
        let provider = std::sync::Arc::new(StaticProvider::default());
        let selector = CachedSourceSelector::new(provider, DownloaderSettings::default());

        let outcome = selector
            .select(&movie_with_stream("hash1"), &[])
            .await
            .unwrap();
        assert!(outcome.selected.is_none());
        assert!(outcome.no_wanted_cached_streams);
        assert_eq!(outcome.blacklisted_infohashes, vec!["hash1".to_string()]);
    }

    #[tokio::test]
    async fn partial_season_container_is_accepted_with_episodes_unfulfilled() {
        // Episodes 1-7 are "needed" (8-10 default to Unknown/not aired and
        // are excluded); a container covering only 1-5 is still selected.
        let mut containers = HashMap::new();
        containers.insert(
            "hashA".to_string(),
            vec![CachedContainer {
                variant_id: "0".into(),
                files: (1..=5)
                    .map(|n| ContainerFile {
                        id: n.to_string(),
                        path: format!("Show.S01E{n:02}.mkv"),
                        bytes: 500_000_000,
                    })
                    .collect(),
            }],
        );
        let provider = std::sync::Arc::new(StaticProvider {
            containers,
            ..Default::default()
        });
        let selector = CachedSourceSelector::new(provider, DownloaderSettings::default());

        let mut item = season_with_episodes(&(1..=7).collect::<Vec<_>>(), "hashA");
        if let MediaItem::Season(s) = &mut item {
            for ep in &mut s.episodes {
                ep.base.requested_at = Some(Utc::now());
                ep.base.indexed_at = Some(Utc::now());
                ep.base.aired_at = Some(Utc::now() - chrono::Duration::days(1));
            }
        }

        let outcome = selector.select(&item, &[]).await.unwrap();
        let selected = outcome.selected.expect("should select the partial container");
        assert_eq!(selected.files.len(), 5);
    }

    #[tokio::test]
    async fn already_downloaded_movie_short_circuits_selection() {
        let mut item = movie_with_stream("hash1");
        item.base_mut().active_stream = Some(ActiveStream::new("hash1".to_string()));

        let provider = std::sync::Arc::new(StaticProvider {
            torrents: vec![TorrentSummary {
                id: "t1".into(),
                hash: "hash1".into(),
                selected_files: vec![ContainerFile {
                    id: "1".into(),
                    path: "The.Matrix.1999.mkv".into(),
                    bytes: 5_000_000_000,
                }],
            }],
            ..Default::default()
        });
        let selector = CachedSourceSelector::new(provider, DownloaderSettings::default());

        let outcome = selector.select(&item, &[]).await.unwrap();
        assert!(outcome.already_downloaded);
        assert!(outcome.selected.is_none());
    }

    #[tokio::test]
    async fn chunk_errors_are_skipped_and_scan_continues() {
        let mut containers = HashMap::new();
        containers.insert(
            "hash2".to_string(),
            vec![CachedContainer {
                variant_id: "0".into(),
                files: vec![ContainerFile {
                    id: "1".into(),
                    path: "The.Matrix.1999.mkv".into(),
                    bytes: 5_000_000_000,
                }],
            }],
        );
        let provider = std::sync::Arc::new(StaticProvider {
            containers,
            fail_chunks_containing: Some("hash1".to_string()),
            ..Default::default()
        });
        let selector = CachedSourceSelector::new(provider, DownloaderSettings::default());

        // Both streams land in the same 5-item chunk, so the simulated
        // provider error covers the whole chunk: the run degrades to no
        // selection rather than panicking or propagating the error.
        let mut item = movie_with_stream("hash1");
        item.base_mut()
            .attached_streams
            .push(Stream::new("hash2", "The.Matrix.1999"));

        let outcome = selector.select(&item, &[]).await.unwrap();
        assert!(outcome.selected.is_none());
    }

    #[test]
    fn movie_outside_size_bounds_is_rejected() {
        let settings = DownloaderSettings::default();
        let selector =
            CachedSourceSelector::new(std::sync::Arc::new(StaticProvider::default()), settings);
        let tiny = ContainerFile {
            id: "1".into(),
            path: "tiny.mkv".into(),
            bytes: 1_000,
        };
        assert!(selector.wanted_movie_files(vec![&tiny]).is_none());
    }
}
