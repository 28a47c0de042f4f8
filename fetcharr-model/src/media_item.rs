use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ExternalIds, InternalId, ItemId};
use crate::state::{derive_leaf_state, derive_parent_state, ItemState};
use crate::stream::{ActiveStream, Stream};
use crate::subtitle::Subtitle;

/// Discriminant for the `MediaItem` tagged union. Kept separate from the
/// enum itself so it can be stored as a plain column (`media_item.kind`)
/// without dragging the whole variant payload along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Movie,
    Show,
    Season,
    Episode,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Show => "show",
            MediaKind::Season => "season",
            MediaKind::Episode => "episode",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fields shared by every variant. Embedded by value in each concrete
/// struct rather than reached through inheritance, per the tagged-union
/// design this model follows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItemBase {
    pub id: Option<InternalId>,
    pub item_id: ItemId,
    pub external_ids: ExternalIds,

    pub title: String,
    pub year: Option<i32>,
    pub aired_at: Option<DateTime<Utc>>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub network: Option<String>,
    pub genres: Vec<String>,
    pub is_anime: bool,
    /// Runtime in minutes, when the indexer reports one. Not in the
    /// distilled spec's field list but present on the original model and
    /// free to carry since `TraktIndexer.run` already returns it.
    pub duration_minutes: Option<i32>,

    pub requested_at: Option<DateTime<Utc>>,
    pub requested_by: Option<String>,
    pub overseerr_id: Option<i64>,

    pub indexed_at: Option<DateTime<Utc>>,
    pub scraped_at: Option<DateTime<Utc>>,
    pub scraped_times: i32,

    pub active_stream: Option<ActiveStream>,
    pub file: Option<String>,
    pub folder: Option<String>,
    pub alternative_folder: Option<String>,

    pub symlinked: bool,
    pub symlinked_at: Option<DateTime<Utc>>,
    pub symlinked_times: i32,
    pub symlink_path: Option<String>,

    pub key: Option<String>,
    pub guid: Option<String>,
    pub update_folder: Option<String>,

    pub attached_streams: Vec<Stream>,
    pub blacklisted_streams: Vec<Stream>,
    pub subtitles: Vec<Subtitle>,

    /// Explicit override set by a capability that has determined an item
    /// can make no further progress. When present, it wins over the
    /// field-derived state. See `DESIGN.md` for why `Failed` is not
    /// auto-derived from fields.
    pub manual_state: Option<ItemState>,

    pub last_state: ItemState,
}

impl MediaItemBase {
    pub fn new(item_id: impl Into<ItemId>, title: impl Into<String>) -> Self {
        Self {
            id: None,
            item_id: item_id.into(),
            external_ids: ExternalIds::default(),
            title: title.into(),
            year: None,
            aired_at: None,
            language: None,
            country: None,
            network: None,
            genres: Vec::new(),
            is_anime: false,
            duration_minutes: None,
            requested_at: None,
            requested_by: None,
            overseerr_id: None,
            indexed_at: None,
            scraped_at: None,
            scraped_times: 0,
            active_stream: None,
            file: None,
            folder: None,
            alternative_folder: None,
            symlinked: false,
            symlinked_at: None,
            symlinked_times: 0,
            symlink_path: None,
            key: None,
            guid: None,
            update_folder: None,
            attached_streams: Vec::new(),
            blacklisted_streams: Vec::new(),
            subtitles: Vec::new(),
            manual_state: None,
            last_state: ItemState::Unknown,
        }
    }

    fn downloaded(&self) -> bool {
        self.active_stream.is_some()
            && self.file.as_deref().is_some_and(|f| !f.is_empty())
            && self.folder.as_deref().is_some_and(|f| !f.is_empty())
    }

    fn completed(&self) -> bool {
        self.update_folder.is_some() || self.key.is_some() || self.guid.is_some()
    }

    fn leaf_state(&self) -> ItemState {
        if let Some(s) = self.manual_state {
            return s;
        }
        derive_leaf_state(
            self.requested_at.is_some(),
            self.indexed_at.is_some(),
            !self.attached_streams.is_empty(),
            self.downloaded(),
            self.symlinked && self.symlink_path.is_some(),
            self.completed(),
        )
    }

    pub fn is_aired(&self, now: DateTime<Utc>) -> bool {
        self.aired_at.is_some_and(|at| at <= now)
    }

    pub fn blacklist(&mut self, infohash: &str) {
        if let Some(pos) = self
            .attached_streams
            .iter()
            .position(|s| s.infohash == infohash)
        {
            let stream = self.attached_streams.remove(pos);
            if !self
                .blacklisted_streams
                .iter()
                .any(|s| s.infohash == stream.infohash)
            {
                self.blacklisted_streams.push(stream);
            }
        }
    }

    pub fn is_blacklisted(&self, infohash: &str) -> bool {
        self.blacklisted_streams.iter().any(|s| s.infohash == infohash)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub base: MediaItemBase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub base: MediaItemBase,
    pub parent_season_id: Option<InternalId>,
    /// The parent season's own `number`, stamped by `Season::insert_episode`
    /// on every insertion — `parent_season_id` alone is an opaque internal
    /// id, useless for comparing against a parsed release filename's season.
    /// `None` only for an episode that has never gone through a `Season`
    /// (a standalone request with no season context), in which case the
    /// downloader's season constraint is skipped rather than guessed.
    pub season_number: Option<u32>,
    pub number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
    pub base: MediaItemBase,
    pub parent_show_id: Option<InternalId>,
    pub number: u32,
    /// Sorted by `number`, no duplicates — an invariant enforced by
    /// `Season::insert_episode`.
    pub episodes: Vec<Episode>,
}

impl Season {
    pub fn insert_episode(&mut self, mut episode: Episode) {
        episode.season_number = Some(self.number);
        match self.episodes.binary_search_by_key(&episode.number, |e| e.number) {
            Ok(pos) => self.episodes[pos] = episode,
            Err(pos) => self.episodes.insert(pos, episode),
        }
    }

    pub fn state(&self) -> ItemState {
        let child_states: Vec<ItemState> =
            self.episodes.iter().map(|e| e.base.leaf_state()).collect();
        derive_parent_state(self.base.leaf_state(), &child_states)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Show {
    pub base: MediaItemBase,
    /// Sorted by `number`, no duplicates — enforced by `Show::insert_season`.
    pub seasons: Vec<Season>,
}

impl Show {
    pub fn insert_season(&mut self, season: Season) {
        match self.seasons.binary_search_by_key(&season.number, |s| s.number) {
            Ok(pos) => self.seasons[pos] = season,
            Err(pos) => self.seasons.insert(pos, season),
        }
    }

    pub fn state(&self) -> ItemState {
        let child_states: Vec<ItemState> = self.seasons.iter().map(|s| s.state()).collect();
        derive_parent_state(self.base.leaf_state(), &child_states)
    }

    pub fn all_episodes(&self) -> impl Iterator<Item = &Episode> {
        self.seasons.iter().flat_map(|s| s.episodes.iter())
    }

    pub fn all_episodes_mut(&mut self) -> impl Iterator<Item = &mut Episode> {
        self.seasons.iter_mut().flat_map(|s| s.episodes.iter_mut())
    }
}

/// The polymorphic media item. Dispatches to the variant's own fields
/// rather than exposing an open inheritance hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "item")]
pub enum MediaItem {
    Movie(Movie),
    Show(Show),
    Season(Season),
    Episode(Episode),
}

impl MediaItem {
    pub fn kind(&self) -> MediaKind {
        match self {
            MediaItem::Movie(_) => MediaKind::Movie,
            MediaItem::Show(_) => MediaKind::Show,
            MediaItem::Season(_) => MediaKind::Season,
            MediaItem::Episode(_) => MediaKind::Episode,
        }
    }

    pub fn base(&self) -> &MediaItemBase {
        match self {
            MediaItem::Movie(m) => &m.base,
            MediaItem::Show(s) => &s.base,
            MediaItem::Season(s) => &s.base,
            MediaItem::Episode(e) => &e.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut MediaItemBase {
        match self {
            MediaItem::Movie(m) => &mut m.base,
            MediaItem::Show(s) => &mut s.base,
            MediaItem::Season(s) => &mut s.base,
            MediaItem::Episode(e) => &mut e.base,
        }
    }

    pub fn id(&self) -> Option<InternalId> {
        self.base().id
    }

    pub fn item_id(&self) -> &ItemId {
        &self.base().item_id
    }

    pub fn imdb_id(&self) -> Option<&str> {
        self.base().external_ids.imdb_id.as_deref()
    }

    /// The state rules from §4.2, applied to this item's current field
    /// values (and, for Show/Season, its children's derived states).
    pub fn state(&self) -> ItemState {
        match self {
            MediaItem::Movie(m) => m.base.leaf_state(),
            MediaItem::Episode(e) => e.base.leaf_state(),
            MediaItem::Season(s) => s.state(),
            MediaItem::Show(s) => s.state(),
        }
    }

    /// Recomputes and stores `last_state` on this item (and, recursively,
    /// every descendant) so that the invariant "`last_state` equals the
    /// state computed by the rules in §4.2" holds after every mutation the
    /// Item Store persists.
    pub fn refresh_last_state(&mut self) {
        match self {
            MediaItem::Movie(m) => m.base.last_state = m.base.leaf_state(),
            MediaItem::Episode(e) => e.base.last_state = e.base.leaf_state(),
            MediaItem::Season(s) => {
                for ep in s.episodes.iter_mut() {
                    ep.base.last_state = ep.base.leaf_state();
                }
                s.base.last_state = s.state();
            }
            MediaItem::Show(s) => {
                for season in s.seasons.iter_mut() {
                    for ep in season.episodes.iter_mut() {
                        ep.base.last_state = ep.base.leaf_state();
                    }
                    season.base.last_state = season.state();
                }
                s.base.last_state = s.state();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie() -> MediaItem {
        MediaItem::Movie(Movie {
            base: MediaItemBase::new("tt0133093", "The Matrix"),
        })
    }

    #[test]
    fn fresh_movie_is_unknown() {
        assert_eq!(movie().state(), ItemState::Unknown);
    }

    #[test]
    fn movie_becomes_requested_then_refreshes_last_state() {
        let mut item = movie();
        item.base_mut().requested_at = Some(Utc::now());
        item.refresh_last_state();
        assert_eq!(item.base().last_state, ItemState::Requested);
    }

    #[test]
    fn blacklisting_moves_stream_out_of_attached_set() {
        let mut base = MediaItemBase::new("tt0133093", "The Matrix");
        base.attached_streams.push(Stream::new("abc123", "The.Matrix.1999"));
        base.blacklist("abc123");
        assert!(base.attached_streams.is_empty());
        assert!(base.is_blacklisted("abc123"));
    }

    #[test]
    fn season_with_mixed_episode_states_is_partially_completed() {
        let mut season = Season {
            base: MediaItemBase::new("season-1", "Season 1"),
            parent_show_id: None,
            number: 1,
            episodes: Vec::new(),
        };

        let mut ep1 = Episode {
            base: MediaItemBase::new("ep-1", "Episode 1"),
            parent_season_id: None,
            season_number: None,
            number: 1,
        };
        ep1.base.update_folder = Some("/library/show/s01e01".into());

        let ep2 = Episode {
            base: MediaItemBase::new("ep-2", "Episode 2"),
            parent_season_id: None,
            season_number: None,
            number: 2,
        };

        season.insert_episode(ep1);
        season.insert_episode(ep2);

        assert_eq!(season.state(), ItemState::PartiallyCompleted);
    }

    #[test]
    fn episodes_insert_sorted_without_duplicates() {
        let mut season = Season {
            base: MediaItemBase::new("season-1", "Season 1"),
            parent_show_id: None,
            number: 1,
            episodes: Vec::new(),
        };
        for n in [3, 1, 2, 1] {
            season.insert_episode(Episode {
                base: MediaItemBase::new(format!("ep-{n}"), format!("Episode {n}")),
                parent_season_id: None,
                season_number: None,
                number: n,
            });
        }
        let numbers: Vec<u32> = season.episodes.iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }
}
