//! The Item Store port: persistence for `MediaItem` trees, independent of
//! the backing database. `postgres` is the only implementation shipped;
//! the trait exists so the workflow engine and its tests don't depend on
//! `sqlx` directly.

pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;

use fetcharr_model::{InternalId, ItemId, ItemState, MediaItem};

use crate::error::Result;

pub use self::postgres::PostgresItemStore;

#[derive(Debug, Clone, Default)]
pub struct ItemStoreStats {
    pub total: u64,
    pub by_state: HashMap<ItemState, u64>,
    pub by_kind: HashMap<fetcharr_model::MediaKind, u64>,
    pub symlinked: u64,
    pub not_symlinked: u64,
}

/// Persistence port for media item trees. A `Movie`/`Episode` round-trips
/// as a single row; a `Show`/`Season` round-trips with its children, since
/// parent-state derivation needs them loaded together.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn get_by_internal_id(&self, id: InternalId) -> Result<Option<MediaItem>>;

    /// Returns the most specific match for `imdb_id`: when `season_episode`
    /// names `(season, episode)`, the matching `Episode`; when it's absent,
    /// the top-level `Movie`/`Show`. Per §4.1, episode lookup requires both
    /// numbers — there is no season-only narrowing.
    async fn get_by_imdb(
        &self,
        imdb_id: &str,
        season_episode: Option<(u32, u32)>,
    ) -> Result<Option<MediaItem>>;

    async fn get_by_item_id(&self, item_id: &ItemId) -> Result<Option<MediaItem>>;

    /// Loads the parent `Show` of a `Season`, by the season's
    /// `parent_show_id`. Used to satisfy `TransitionStep::PromoteToParent`
    /// without the state machine itself touching the store.
    async fn get_show_for_season(&self, parent_show_id: InternalId) -> Result<Option<MediaItem>>;

    /// Items whose derived state is not `Completed`, most recently
    /// `requested_at` first, for the retry sweeper.
    async fn list_incomplete(&self, page_size: u32, offset: u32) -> Result<Vec<MediaItem>>;

    async fn count_incomplete(&self) -> Result<u64>;

    /// Inserts or updates `item` (matched by `item_id` within its kind),
    /// recursively upserting children, and returns the stored record with
    /// `id`/`last_state` populated.
    async fn upsert(&self, item: MediaItem) -> Result<MediaItem>;

    /// Cascades to every descendant, stream, and subtitle row. Returns
    /// `false` if no row matched `imdb_id`.
    async fn delete_by_imdb(&self, imdb_id: &str) -> Result<bool>;

    async fn stats(&self) -> Result<ItemStoreStats>;
}
