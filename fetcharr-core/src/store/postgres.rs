use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use fetcharr_model::media_item::{Episode, Season, Show};
use fetcharr_model::{
    ActiveStream, ActiveStreamFile, ExternalIds, InternalId, ItemId, ItemState, MediaItem,
    MediaItemBase, MediaKind, Movie, Stream, Subtitle,
};

use crate::error::{EngineError, Result};
use crate::store::{ItemStore, ItemStoreStats};

/// One row of `media_items`: leaf items (`Movie`, `Episode`) map to exactly
/// one row, `Season`/`Show` rows carry their own descriptive fields plus a
/// `parent_id` chain their children point back at.
#[derive(sqlx::FromRow)]
struct MediaItemRow {
    id: i64,
    kind: String,
    item_id: String,
    parent_id: Option<i64>,
    number: Option<i32>,
    imdb_id: Option<String>,
    tvdb_id: Option<i64>,
    tmdb_id: Option<i64>,
    title: String,
    year: Option<i32>,
    aired_at: Option<DateTime<Utc>>,
    language: Option<String>,
    country: Option<String>,
    network: Option<String>,
    genres: Vec<String>,
    is_anime: bool,
    duration_minutes: Option<i32>,
    requested_at: Option<DateTime<Utc>>,
    requested_by: Option<String>,
    overseerr_id: Option<i64>,
    indexed_at: Option<DateTime<Utc>>,
    scraped_at: Option<DateTime<Utc>>,
    scraped_times: i32,
    active_stream_hash: Option<String>,
    active_stream_id: Option<String>,
    active_stream_files: Option<serde_json::Value>,
    file: Option<String>,
    folder: Option<String>,
    alternative_folder: Option<String>,
    symlinked: bool,
    symlinked_at: Option<DateTime<Utc>>,
    symlinked_times: i32,
    symlink_path: Option<String>,
    key: Option<String>,
    guid: Option<String>,
    update_folder: Option<String>,
    manual_state: Option<String>,
    last_state: String,
}

#[derive(sqlx::FromRow)]
struct StreamRow {
    infohash: String,
    raw_title: String,
    parsed_title: String,
    rank: i64,
    similarity: f32,
    blacklisted: bool,
}

#[derive(sqlx::FromRow)]
struct SubtitleRow {
    language: String,
    file_path: String,
}

#[derive(Clone)]
pub struct PostgresItemStore {
    pool: PgPool,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS media_items (
    id BIGSERIAL PRIMARY KEY,
    kind TEXT NOT NULL,
    item_id TEXT NOT NULL,
    parent_id BIGINT REFERENCES media_items(id) ON DELETE CASCADE,
    number INT,
    imdb_id TEXT,
    tvdb_id BIGINT,
    tmdb_id BIGINT,
    title TEXT NOT NULL,
    year INT,
    aired_at TIMESTAMPTZ,
    language TEXT,
    country TEXT,
    network TEXT,
    genres TEXT[] NOT NULL DEFAULT '{}',
    is_anime BOOLEAN NOT NULL DEFAULT false,
    duration_minutes INT,
    requested_at TIMESTAMPTZ,
    requested_by TEXT,
    overseerr_id BIGINT,
    indexed_at TIMESTAMPTZ,
    scraped_at TIMESTAMPTZ,
    scraped_times INT NOT NULL DEFAULT 0,
    active_stream_hash TEXT,
    active_stream_id TEXT,
    active_stream_files JSONB,
    file TEXT,
    folder TEXT,
    alternative_folder TEXT,
    symlinked BOOLEAN NOT NULL DEFAULT false,
    symlinked_at TIMESTAMPTZ,
    symlinked_times INT NOT NULL DEFAULT 0,
    symlink_path TEXT,
    key TEXT,
    guid TEXT,
    update_folder TEXT,
    manual_state TEXT,
    last_state TEXT NOT NULL DEFAULT 'Unknown',
    UNIQUE (kind, item_id)
);
CREATE INDEX IF NOT EXISTS media_items_parent_id_idx ON media_items (parent_id);
CREATE INDEX IF NOT EXISTS media_items_imdb_id_idx ON media_items (imdb_id) WHERE parent_id IS NULL;
CREATE INDEX IF NOT EXISTS media_items_last_state_idx ON media_items (last_state) WHERE parent_id IS NULL;

CREATE TABLE IF NOT EXISTS media_streams (
    item_id BIGINT NOT NULL REFERENCES media_items(id) ON DELETE CASCADE,
    infohash TEXT NOT NULL,
    raw_title TEXT NOT NULL,
    parsed_title TEXT NOT NULL,
    rank BIGINT NOT NULL DEFAULT 0,
    similarity REAL NOT NULL DEFAULT 0,
    blacklisted BOOLEAN NOT NULL DEFAULT false,
    PRIMARY KEY (item_id, infohash)
);

CREATE TABLE IF NOT EXISTS media_subtitles (
    item_id BIGINT NOT NULL REFERENCES media_items(id) ON DELETE CASCADE,
    language TEXT NOT NULL,
    file_path TEXT NOT NULL,
    PRIMARY KEY (item_id, language)
);
"#;

impl PostgresItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the schema if it doesn't exist. When `hard_reset` is set
    /// (the `HARD_RESET` environment variable at startup), drops the three
    /// tables first — a deliberately destructive path gated behind an
    /// explicit operator opt-in, mirroring the Process Interface section.
    pub async fn ensure_schema(&self, hard_reset: bool) -> Result<()> {
        if hard_reset {
            tracing::warn!("HARD_RESET set: dropping media item tables before recreating schema");
            sqlx::raw_sql(
                "DROP TABLE IF EXISTS media_subtitles, media_streams, media_items CASCADE",
            )
            .execute(self.pool())
            .await?;
        }
        sqlx::raw_sql(SCHEMA).execute(self.pool()).await?;
        Ok(())
    }

    async fn load_base(&self, row: MediaItemRow) -> Result<(InternalId, u32, MediaItemBase)> {
        let id = InternalId::from(row.id);

        let stream_rows: Vec<StreamRow> =
            sqlx::query_as("SELECT infohash, raw_title, parsed_title, rank, similarity, blacklisted FROM media_streams WHERE item_id = $1")
                .bind(row.id)
                .fetch_all(self.pool())
                .await?;

        let mut attached_streams = Vec::new();
        let mut blacklisted_streams = Vec::new();
        for s in stream_rows {
            let stream = Stream {
                infohash: s.infohash,
                raw_title: s.raw_title,
                parsed_title: s.parsed_title,
                rank: s.rank,
                similarity: s.similarity,
            };
            if s.blacklisted {
                blacklisted_streams.push(stream);
            } else {
                attached_streams.push(stream);
            }
        }

        let subtitle_rows: Vec<SubtitleRow> =
            sqlx::query_as("SELECT language, file_path FROM media_subtitles WHERE item_id = $1")
                .bind(row.id)
                .fetch_all(self.pool())
                .await?;
        let subtitles = subtitle_rows
            .into_iter()
            .map(|s| Subtitle::new(s.language, s.file_path))
            .collect();

        let active_stream = row.active_stream_hash.map(|hash| {
            let files: HashMap<String, ActiveStreamFile> = row
                .active_stream_files
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default();
            ActiveStream {
                hash,
                files,
                id: row.active_stream_id,
            }
        });

        let manual_state = row
            .manual_state
            .and_then(|s| ItemState::from_str(&s).ok());
        let last_state = ItemState::from_str(&row.last_state).unwrap_or(ItemState::Unknown);

        let base = MediaItemBase {
            id: Some(id),
            item_id: ItemId::from(row.item_id),
            external_ids: ExternalIds {
                imdb_id: row.imdb_id,
                tvdb_id: row.tvdb_id,
                tmdb_id: row.tmdb_id,
            },
            title: row.title,
            year: row.year,
            aired_at: row.aired_at,
            language: row.language,
            country: row.country,
            network: row.network,
            genres: row.genres,
            is_anime: row.is_anime,
            duration_minutes: row.duration_minutes,
            requested_at: row.requested_at,
            requested_by: row.requested_by,
            overseerr_id: row.overseerr_id,
            indexed_at: row.indexed_at,
            scraped_at: row.scraped_at,
            scraped_times: row.scraped_times,
            active_stream,
            file: row.file,
            folder: row.folder,
            alternative_folder: row.alternative_folder,
            symlinked: row.symlinked,
            symlinked_at: row.symlinked_at,
            symlinked_times: row.symlinked_times,
            symlink_path: row.symlink_path,
            key: row.key,
            guid: row.guid,
            update_folder: row.update_folder,
            attached_streams,
            blacklisted_streams,
            subtitles,
            manual_state,
            last_state,
        };

        Ok((id, row.number.unwrap_or(0) as u32, base))
    }

    /// Loads the full tree rooted at `row`, recursing into children via
    /// `parent_id` for `Show`/`Season` kinds.
    async fn assemble(&self, row: MediaItemRow) -> Result<MediaItem> {
        let kind = row.kind.clone();
        let parent_id = row.parent_id.map(InternalId::from);
        let (id, number, base) = self.load_base(row).await?;

        match kind.as_str() {
            "movie" => Ok(MediaItem::Movie(Movie { base })),
            "episode" => {
                let season_number = match parent_id {
                    Some(pid) => sqlx::query_scalar::<_, Option<i32>>(
                        "SELECT number FROM media_items WHERE id = $1",
                    )
                    .bind(pid.as_i64())
                    .fetch_optional(self.pool())
                    .await?
                    .flatten()
                    .map(|n| n as u32),
                    None => None,
                };
                Ok(MediaItem::Episode(Episode {
                    base,
                    parent_season_id: parent_id,
                    season_number,
                    number,
                }))
            }
            "season" => {
                let child_rows: Vec<MediaItemRow> = sqlx::query_as(
                    "SELECT * FROM media_items WHERE parent_id = $1 ORDER BY number ASC",
                )
                .bind(id.as_i64())
                .fetch_all(self.pool())
                .await?;

                let mut episodes = Vec::with_capacity(child_rows.len());
                for child in child_rows {
                    let (_, ep_number, ep_base) = self.load_base(child).await?;
                    episodes.push(Episode {
                        base: ep_base,
                        parent_season_id: Some(id),
                        season_number: Some(number),
                        number: ep_number,
                    });
                }

                Ok(MediaItem::Season(Season {
                    base,
                    parent_show_id: parent_id,
                    number,
                    episodes,
                }))
            }
            "show" => {
                let season_rows: Vec<MediaItemRow> = sqlx::query_as(
                    "SELECT * FROM media_items WHERE parent_id = $1 ORDER BY number ASC",
                )
                .bind(id.as_i64())
                .fetch_all(self.pool())
                .await?;

                let mut seasons = Vec::with_capacity(season_rows.len());
                for season_row in season_rows {
                    let season_id = InternalId::from(season_row.id);
                    let season_number = season_row.number.unwrap_or(0) as u32;
                    let (_, _, season_base) = self.load_base(season_row).await?;

                    let episode_rows: Vec<MediaItemRow> = sqlx::query_as(
                        "SELECT * FROM media_items WHERE parent_id = $1 ORDER BY number ASC",
                    )
                    .bind(season_id.as_i64())
                    .fetch_all(self.pool())
                    .await?;

                    let mut episodes = Vec::with_capacity(episode_rows.len());
                    for ep_row in episode_rows {
                        let (_, ep_number, ep_base) = self.load_base(ep_row).await?;
                        episodes.push(Episode {
                            base: ep_base,
                            parent_season_id: Some(season_id),
                            season_number: Some(season_number),
                            number: ep_number,
                        });
                    }

                    seasons.push(Season {
                        base: season_base,
                        parent_show_id: Some(id),
                        number: season_number,
                        episodes,
                    });
                }

                Ok(MediaItem::Show(Show { base, seasons }))
            }
            other => Err(EngineError::Internal(format!(
                "unrecognized media_items.kind: {other}"
            ))),
        }
    }

    async fn find_row_by_internal_id(&self, id: InternalId) -> Result<Option<MediaItemRow>> {
        let row: Option<MediaItemRow> = sqlx::query_as("SELECT * FROM media_items WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    async fn upsert_row(
        tx: &mut Transaction<'_, Postgres>,
        kind: MediaKind,
        parent_id: Option<i64>,
        number: Option<i32>,
        base: &MediaItemBase,
    ) -> Result<i64> {
        let active_stream_hash = base.active_stream.as_ref().map(|s| s.hash.clone());
        let active_stream_id = base.active_stream.as_ref().and_then(|s| s.id.clone());
        let active_stream_files = base
            .active_stream
            .as_ref()
            .map(|s| serde_json::to_value(&s.files).unwrap_or(serde_json::Value::Null));
        let manual_state = base.manual_state.map(|s| s.as_str().to_string());

        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO media_items (
                kind, item_id, parent_id, number, imdb_id, tvdb_id, tmdb_id, title, year,
                aired_at, language, country, network, genres, is_anime, duration_minutes,
                requested_at, requested_by, overseerr_id, indexed_at, scraped_at, scraped_times,
                active_stream_hash, active_stream_id, active_stream_files, file, folder,
                alternative_folder, symlinked, symlinked_at, symlinked_times, symlink_path,
                key, guid, update_folder, manual_state, last_state
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
                $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32, $33, $34,
                $35, $36, $37
            )
            ON CONFLICT (kind, item_id) DO UPDATE SET
                parent_id = EXCLUDED.parent_id, number = EXCLUDED.number,
                imdb_id = EXCLUDED.imdb_id, tvdb_id = EXCLUDED.tvdb_id, tmdb_id = EXCLUDED.tmdb_id,
                title = EXCLUDED.title, year = EXCLUDED.year, aired_at = EXCLUDED.aired_at,
                language = EXCLUDED.language, country = EXCLUDED.country, network = EXCLUDED.network,
                genres = EXCLUDED.genres, is_anime = EXCLUDED.is_anime,
                duration_minutes = EXCLUDED.duration_minutes, requested_at = EXCLUDED.requested_at,
                requested_by = EXCLUDED.requested_by, overseerr_id = EXCLUDED.overseerr_id,
                indexed_at = EXCLUDED.indexed_at, scraped_at = EXCLUDED.scraped_at,
                scraped_times = EXCLUDED.scraped_times, active_stream_hash = EXCLUDED.active_stream_hash,
                active_stream_id = EXCLUDED.active_stream_id, active_stream_files = EXCLUDED.active_stream_files,
                file = EXCLUDED.file, folder = EXCLUDED.folder,
                alternative_folder = EXCLUDED.alternative_folder, symlinked = EXCLUDED.symlinked,
                symlinked_at = EXCLUDED.symlinked_at, symlinked_times = EXCLUDED.symlinked_times,
                symlink_path = EXCLUDED.symlink_path, key = EXCLUDED.key, guid = EXCLUDED.guid,
                update_folder = EXCLUDED.update_folder, manual_state = EXCLUDED.manual_state,
                last_state = EXCLUDED.last_state
            RETURNING id
            "#,
        )
        .bind(kind.as_str())
        .bind(base.item_id.as_str())
        .bind(parent_id)
        .bind(number)
        .bind(&base.external_ids.imdb_id)
        .bind(base.external_ids.tvdb_id)
        .bind(base.external_ids.tmdb_id)
        .bind(&base.title)
        .bind(base.year)
        .bind(base.aired_at)
        .bind(&base.language)
        .bind(&base.country)
        .bind(&base.network)
        .bind(&base.genres)
        .bind(base.is_anime)
        .bind(base.duration_minutes)
        .bind(base.requested_at)
        .bind(&base.requested_by)
        .bind(base.overseerr_id)
        .bind(base.indexed_at)
        .bind(base.scraped_at)
        .bind(base.scraped_times)
        .bind(active_stream_hash)
        .bind(active_stream_id)
        .bind(active_stream_files)
        .bind(&base.file)
        .bind(&base.folder)
        .bind(&base.alternative_folder)
        .bind(base.symlinked)
        .bind(base.symlinked_at)
        .bind(base.symlinked_times)
        .bind(&base.symlink_path)
        .bind(&base.key)
        .bind(&base.guid)
        .bind(&base.update_folder)
        .bind(manual_state)
        .bind(base.last_state.as_str())
        .fetch_one(&mut **tx)
        .await?;

        let id = row.0;

        sqlx::query("DELETE FROM media_streams WHERE item_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        for stream in base.attached_streams.iter().chain(base.blacklisted_streams.iter()) {
            let blacklisted = base
                .blacklisted_streams
                .iter()
                .any(|s| s.infohash == stream.infohash);
            sqlx::query(
                "INSERT INTO media_streams (item_id, infohash, raw_title, parsed_title, rank, similarity, blacklisted)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (item_id, infohash) DO UPDATE SET blacklisted = EXCLUDED.blacklisted",
            )
            .bind(id)
            .bind(&stream.infohash)
            .bind(&stream.raw_title)
            .bind(&stream.parsed_title)
            .bind(stream.rank)
            .bind(stream.similarity)
            .bind(blacklisted)
            .execute(&mut **tx)
            .await?;
        }

        sqlx::query("DELETE FROM media_subtitles WHERE item_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        for subtitle in &base.subtitles {
            sqlx::query(
                "INSERT INTO media_subtitles (item_id, language, file_path) VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(&subtitle.language)
            .bind(&subtitle.file_path)
            .execute(&mut **tx)
            .await?;
        }

        Ok(id)
    }
}

#[async_trait::async_trait]
impl ItemStore for PostgresItemStore {
    async fn get_by_internal_id(&self, id: InternalId) -> Result<Option<MediaItem>> {
        match self.find_row_by_internal_id(id).await? {
            Some(row) => Ok(Some(self.assemble(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_by_imdb(
        &self,
        imdb_id: &str,
        season_episode: Option<(u32, u32)>,
    ) -> Result<Option<MediaItem>> {
        let row: Option<MediaItemRow> = sqlx::query_as(
            "SELECT * FROM media_items WHERE imdb_id = $1 AND parent_id IS NULL LIMIT 1",
        )
        .bind(imdb_id)
        .fetch_optional(self.pool())
        .await?;
        let Some(row) = row else { return Ok(None) };
        let item = self.assemble(row).await?;

        let Some((season_no, episode_no)) = season_episode else {
            return Ok(Some(item));
        };

        let MediaItem::Show(show) = item else {
            return Ok(None);
        };
        Ok(show
            .seasons
            .into_iter()
            .find(|s| s.number == season_no)
            .and_then(|season| {
                season
                    .episodes
                    .into_iter()
                    .find(|e| e.number == episode_no)
            })
            .map(MediaItem::Episode))
    }

    async fn get_by_item_id(&self, item_id: &ItemId) -> Result<Option<MediaItem>> {
        let row: Option<MediaItemRow> = sqlx::query_as(
            "SELECT * FROM media_items WHERE item_id = $1 AND parent_id IS NULL LIMIT 1",
        )
        .bind(item_id.as_str())
        .fetch_optional(self.pool())
        .await?;
        match row {
            Some(row) => Ok(Some(self.assemble(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_show_for_season(&self, parent_show_id: InternalId) -> Result<Option<MediaItem>> {
        self.get_by_internal_id(parent_show_id).await
    }

    async fn list_incomplete(&self, page_size: u32, offset: u32) -> Result<Vec<MediaItem>> {
        let rows: Vec<MediaItemRow> = sqlx::query_as(
            "SELECT * FROM media_items WHERE parent_id IS NULL AND last_state != 'Completed'
             ORDER BY requested_at DESC NULLS LAST LIMIT $1 OFFSET $2",
        )
        .bind(page_size as i64)
        .bind(offset as i64)
        .fetch_all(self.pool())
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(self.assemble(row).await?);
        }
        Ok(items)
    }

    async fn count_incomplete(&self) -> Result<u64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM media_items WHERE parent_id IS NULL AND last_state != 'Completed'",
        )
        .fetch_one(self.pool())
        .await?;
        Ok(row.0 as u64)
    }

    async fn upsert(&self, mut item: MediaItem) -> Result<MediaItem> {
        item.refresh_last_state();
        let mut tx = self.pool().begin().await?;

        let root_kind = item.kind();
        let root_id = match &item {
            MediaItem::Movie(m) => {
                Self::upsert_row(&mut tx, root_kind, None, None, &m.base).await?
            }
            MediaItem::Episode(e) => {
                // A standalone `Episode` (submitted on its own by the state
                // machine's per-episode scraping/download paths rather than
                // nested under a freshly upserted `Show`) must keep pointing
                // at its existing parent season row, or the `ON CONFLICT`
                // update below would null out `parent_id` and orphan it.
                Self::upsert_row(
                    &mut tx,
                    root_kind,
                    e.parent_season_id.map(|id| id.as_i64()),
                    Some(e.number as i32),
                    &e.base,
                )
                .await?
            }
            MediaItem::Season(s) => {
                let season_id = Self::upsert_row(
                    &mut tx,
                    root_kind,
                    s.parent_show_id.map(|id| id.as_i64()),
                    Some(s.number as i32),
                    &s.base,
                )
                .await?;
                for ep in &s.episodes {
                    Self::upsert_row(
                        &mut tx,
                        MediaKind::Episode,
                        Some(season_id),
                        Some(ep.number as i32),
                        &ep.base,
                    )
                    .await?;
                }
                season_id
            }
            MediaItem::Show(s) => {
                let show_id =
                    Self::upsert_row(&mut tx, root_kind, None, None, &s.base).await?;
                for season in &s.seasons {
                    let season_id = Self::upsert_row(
                        &mut tx,
                        MediaKind::Season,
                        Some(show_id),
                        Some(season.number as i32),
                        &season.base,
                    )
                    .await?;
                    for ep in &season.episodes {
                        Self::upsert_row(
                            &mut tx,
                            MediaKind::Episode,
                            Some(season_id),
                            Some(ep.number as i32),
                            &ep.base,
                        )
                        .await?;
                    }
                }
                show_id
            }
        };

        tx.commit().await?;
        self.get_by_internal_id(InternalId::from(root_id))
            .await?
            .ok_or_else(|| EngineError::Internal("upserted item vanished before reload".into()))
    }

    async fn delete_by_imdb(&self, imdb_id: &str) -> Result<bool> {
        // The top-level row cascades to children via `ON DELETE CASCADE` on
        // `parent_id`, and to streams/subtitles via the same clause on
        // `item_id`, in one statement/transaction.
        let result =
            sqlx::query("DELETE FROM media_items WHERE imdb_id = $1 AND parent_id IS NULL")
                .bind(imdb_id)
                .execute(self.pool())
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn stats(&self) -> Result<ItemStoreStats> {
        let state_rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT last_state, COUNT(*) FROM media_items GROUP BY last_state")
                .fetch_all(self.pool())
                .await?;

        let mut by_state = HashMap::new();
        let mut total = 0u64;
        for (state, count) in state_rows {
            let state = ItemState::from_str(&state).unwrap_or(ItemState::Unknown);
            by_state.insert(state, count as u64);
            total += count as u64;
        }

        let kind_rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT kind, COUNT(*) FROM media_items GROUP BY kind")
                .fetch_all(self.pool())
                .await?;
        let mut by_kind = HashMap::new();
        for (kind, count) in kind_rows {
            let kind = match kind.as_str() {
                "movie" => MediaKind::Movie,
                "show" => MediaKind::Show,
                "season" => MediaKind::Season,
                "episode" => MediaKind::Episode,
                _ => continue,
            };
            by_kind.insert(kind, count as u64);
        }

        let (symlinked, not_symlinked): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*) FILTER (WHERE symlinked), COUNT(*) FILTER (WHERE NOT symlinked)
             FROM media_items",
        )
        .fetch_one(self.pool())
        .await?;

        Ok(ItemStoreStats {
            total,
            by_state,
            by_kind,
            symlinked: symlinked as u64,
            not_symlinked: not_symlinked as u64,
        })
    }
}
