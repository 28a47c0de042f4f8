//! The pure transition function, ported from the original `process_event`.
//!
//! `transition` never performs I/O itself: every yes/no decision that the
//! original implementation answered by calling into a live service
//! (`can_we_scrape`, `should_submit`, ...) is resolved here through
//! `TransitionPredicates`, an `async_trait` the workflow engine implements
//! against real capabilities. That keeps the branching logic deterministic
//! and mockable while still letting the predicates themselves be answered
//! by async collaborators. Running a capability to completion (`run()`) is
//! never one of those predicates — it always happens one layer up, in the
//! engine's loop, once `transition` has told it which capability to call
//! and with which items.

use async_trait::async_trait;

use fetcharr_contracts::capability::{CapabilityKey, TransitionEmitter};
use fetcharr_model::media_item::{MediaItemBase, Season, Show};
use fetcharr_model::{ItemState, MediaItem};

/// Boolean readiness checks the original services exposed alongside their
/// `run()` entry points. Implemented by the workflow engine against the
/// live `CapabilityRegistry`; implemented by a stub in tests.
#[async_trait]
pub trait TransitionPredicates: Send + Sync {
    /// `TraktIndexer.should_submit` — whether a re-index of an already
    /// indexed item is worth running again.
    async fn trakt_should_submit(&self, existing: &MediaItem) -> bool;

    /// `Scraping.can_we_scrape` — whether this item is eligible to be
    /// scraped right now (cooldown, already has usable streams, etc).
    async fn can_we_scrape(&self, item: &MediaItem) -> bool;

    /// `Symlinker.should_submit`.
    async fn symlinker_should_submit(&self, item: &MediaItem) -> bool;

    /// `Subliminal.should_submit`.
    async fn post_processing_should_submit(&self, item: &MediaItem) -> bool;

    /// Mirrors `settings.post_processing.subliminal.enabled`; checked
    /// before any per-item predicate so a disabled feature costs nothing.
    fn post_processing_enabled(&self) -> bool;
}

/// What `transition` decided should happen next.
#[derive(Debug, Clone)]
pub struct TransitionOutput {
    /// Set when the item's stored record itself changed (the indexer-merge
    /// case, or a no-op re-affirmation of an already-completed item).
    pub updated_item: Option<MediaItem>,
    pub next_capability: Option<CapabilityKey>,
    pub items_to_submit: Vec<MediaItem>,
}

impl TransitionOutput {
    fn none() -> Self {
        Self {
            updated_item: None,
            next_capability: None,
            items_to_submit: Vec::new(),
        }
    }
}

/// Outcome of one call to `transition`.
#[derive(Debug, Clone)]
pub enum TransitionStep {
    Output(TransitionOutput),
    /// A bare `Season` arrived at the top-level branch that always routes
    /// through `TraktIndexer`. The original promotes `item = item.parent`
    /// in place; our items carry a `parent_show_id` instead of an embedded
    /// parent, so the caller must load the parent `Show` (creating a bare
    /// shell if none exists yet) and call `transition` again with it.
    PromoteToParent(Season),
}

/// Ports the original `process_event(existing_item, started_by, item)`.
/// `started_by` is the emitter driving *this* pass — a source emitter only
/// on the first iteration of a run; every iteration after that, the engine
/// passes the capability it just invoked (see `TransitionEmitter`), so the
/// top-level source-emitter branch below only ever fires once per run.
pub async fn transition(
    existing_item: Option<MediaItem>,
    started_by: TransitionEmitter,
    item: MediaItem,
    predicates: &dyn TransitionPredicates,
) -> TransitionStep {
    let state = item.state();

    if started_by.is_source_emitter() || matches!(state, ItemState::Requested | ItemState::Unknown)
    {
        if let MediaItem::Season(season) = item {
            return TransitionStep::PromoteToParent(season);
        }
        if let Some(existing) = &existing_item {
            if !predicates.trakt_should_submit(existing).await {
                return TransitionStep::Output(TransitionOutput::none());
            }
        }
        return TransitionStep::Output(TransitionOutput {
            updated_item: None,
            next_capability: Some(CapabilityKey::TraktIndexer),
            items_to_submit: vec![item],
        });
    }

    match state {
        ItemState::Indexed | ItemState::PartiallyCompleted => {
            indexed_or_partial(existing_item, item, predicates).await
        }
        ItemState::Scraped => scraped(item),
        ItemState::Downloaded => downloaded(item, predicates).await,
        ItemState::Symlinked => TransitionStep::Output(TransitionOutput {
            updated_item: None,
            next_capability: Some(CapabilityKey::Updater),
            items_to_submit: vec![item],
        }),
        ItemState::Completed => completed(item, predicates).await,
        ItemState::Unknown | ItemState::Requested | ItemState::Failed => {
            TransitionStep::Output(TransitionOutput::none())
        }
    }
}

async fn indexed_or_partial(
    existing_item: Option<MediaItem>,
    item: MediaItem,
    predicates: &dyn TransitionPredicates,
) -> TransitionStep {
    let mut working_item = item;
    let mut updated_item: Option<MediaItem> = None;

    if let Some(existing) = existing_item {
        if existing.base().indexed_at.is_none() {
            let merged = merge_from_indexer(existing, working_item);
            working_item = merged.clone();
            updated_item = Some(merged);
        } else if existing.state() == ItemState::Completed {
            return TransitionStep::Output(TransitionOutput {
                updated_item: Some(existing),
                next_capability: None,
                items_to_submit: Vec::new(),
            });
        }
    }

    if let Some(merged) = &updated_item {
        if merged.state() == ItemState::Completed {
            return TransitionStep::Output(TransitionOutput {
                updated_item: Some(merged.clone()),
                next_capability: None,
                items_to_submit: Vec::new(),
            });
        }
    }

    let mut items_to_submit = Vec::new();
    let mut next_capability = Some(CapabilityKey::Scraping);

    match &working_item {
        MediaItem::Movie(_) | MediaItem::Episode(_) => {
            if predicates.can_we_scrape(&working_item).await {
                items_to_submit.push(working_item.clone());
            }
        }
        MediaItem::Show(show) => {
            if predicates.can_we_scrape(&working_item).await {
                items_to_submit.push(working_item.clone());
            } else {
                for season in &show.seasons {
                    let season_item = MediaItem::Season(season.clone());
                    match season_item.state() {
                        ItemState::Indexed | ItemState::PartiallyCompleted => {
                            if predicates.can_we_scrape(&season_item).await {
                                items_to_submit.push(season_item);
                            }
                        }
                        ItemState::Scraped => {
                            next_capability = Some(CapabilityKey::Downloader);
                            items_to_submit.push(season_item);
                        }
                        _ => {}
                    }
                }
            }
        }
        MediaItem::Season(season) => {
            if predicates.can_we_scrape(&working_item).await {
                items_to_submit.push(working_item.clone());
            } else {
                for episode in &season.episodes {
                    let ep_item = MediaItem::Episode(episode.clone());
                    match ep_item.state() {
                        ItemState::Indexed | ItemState::PartiallyCompleted => {
                            if predicates.can_we_scrape(&ep_item).await {
                                items_to_submit.push(ep_item);
                            }
                        }
                        ItemState::Scraped => {
                            next_capability = Some(CapabilityKey::Downloader);
                            items_to_submit.push(ep_item);
                        }
                        ItemState::Downloaded => {
                            next_capability = Some(CapabilityKey::Symlinker);
                            items_to_submit.push(ep_item);
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    TransitionStep::Output(TransitionOutput {
        updated_item,
        next_capability,
        items_to_submit,
    })
}

fn scraped(item: MediaItem) -> TransitionStep {
    let mut items_to_submit = Vec::new();

    match &item {
        MediaItem::Show(show) => {
            items_to_submit.extend(
                show.seasons
                    .iter()
                    .filter(|s| s.state() == ItemState::Downloaded)
                    .map(|s| MediaItem::Season(s.clone())),
            );
        }
        MediaItem::Season(season) => {
            items_to_submit.extend(
                season
                    .episodes
                    .iter()
                    .filter(|e| MediaItem::Episode((*e).clone()).state() == ItemState::Downloaded)
                    .map(|e| MediaItem::Episode(e.clone())),
            );
        }
        MediaItem::Movie(_) | MediaItem::Episode(_) => {}
    }

    items_to_submit.push(item);

    TransitionStep::Output(TransitionOutput {
        updated_item: None,
        next_capability: Some(CapabilityKey::Downloader),
        items_to_submit,
    })
}

async fn downloaded(item: MediaItem, predicates: &dyn TransitionPredicates) -> TransitionStep {
    let proposed: Vec<MediaItem> = match &item {
        MediaItem::Show(show) => {
            let all_found = show.seasons.iter().all(|season| {
                season
                    .episodes
                    .iter()
                    .filter(|e| !e.base.symlinked)
                    .all(|e| e.base.file.is_some() && e.base.folder.is_some())
            });
            if all_found {
                vec![item.clone()]
            } else {
                show.seasons
                    .iter()
                    .flat_map(|s| s.episodes.iter())
                    .filter(|e| !e.base.symlinked && e.base.file.is_some() && e.base.folder.is_some())
                    .map(|e| MediaItem::Episode(e.clone()))
                    .collect()
            }
        }
        MediaItem::Season(season) => {
            let all_found = season
                .episodes
                .iter()
                .filter(|e| !e.base.symlinked)
                .all(|e| e.base.file.is_some() && e.base.folder.is_some());
            if all_found {
                vec![item.clone()]
            } else {
                season
                    .episodes
                    .iter()
                    .filter(|e| !e.base.symlinked && e.base.file.is_some() && e.base.folder.is_some())
                    .map(|e| MediaItem::Episode(e.clone()))
                    .collect()
            }
        }
        MediaItem::Movie(_) | MediaItem::Episode(_) => vec![item.clone()],
    };

    let mut items_to_submit = Vec::new();
    for candidate in proposed {
        if predicates.symlinker_should_submit(&candidate).await {
            items_to_submit.push(candidate);
        }
    }

    TransitionStep::Output(TransitionOutput {
        updated_item: None,
        next_capability: Some(CapabilityKey::Symlinker),
        items_to_submit,
    })
}

async fn completed(item: MediaItem, predicates: &dyn TransitionPredicates) -> TransitionStep {
    if !predicates.post_processing_enabled() {
        return TransitionStep::Output(TransitionOutput::none());
    }

    let mut items_to_submit = Vec::new();

    match &item {
        MediaItem::Movie(_) | MediaItem::Episode(_) => {
            if predicates.post_processing_should_submit(&item).await {
                items_to_submit.push(item.clone());
            }
        }
        MediaItem::Show(show) => {
            for season in &show.seasons {
                for ep in &season.episodes {
                    let ep_item = MediaItem::Episode(ep.clone());
                    if ep_item.state() == ItemState::Completed
                        && predicates.post_processing_should_submit(&ep_item).await
                    {
                        items_to_submit.push(ep_item);
                    }
                }
            }
        }
        MediaItem::Season(season) => {
            for ep in &season.episodes {
                let ep_item = MediaItem::Episode(ep.clone());
                if ep_item.state() == ItemState::Completed
                    && predicates.post_processing_should_submit(&ep_item).await
                {
                    items_to_submit.push(ep_item);
                }
            }
        }
    }

    if items_to_submit.is_empty() {
        return TransitionStep::Output(TransitionOutput::none());
    }

    TransitionStep::Output(TransitionOutput {
        updated_item: None,
        next_capability: Some(CapabilityKey::PostProcessing),
        items_to_submit,
    })
}

/// `existing_item.fill_in_missing_children(item); existing_item.copy_other_media_attr(item);
/// existing_item.indexed_at = item.indexed_at`, consuming both sides and returning the merged
/// record in place of `existing`.
fn merge_from_indexer(mut existing: MediaItem, indexed: MediaItem) -> MediaItem {
    match (&mut existing, &indexed) {
        (MediaItem::Show(existing_show), MediaItem::Show(indexed_show)) => {
            fill_in_missing_seasons(existing_show, indexed_show);
        }
        (MediaItem::Season(existing_season), MediaItem::Season(indexed_season)) => {
            fill_in_missing_episodes(existing_season, indexed_season);
        }
        _ => {}
    }

    copy_other_media_attr(existing.base_mut(), indexed.base());
    existing.base_mut().indexed_at = indexed.base().indexed_at;
    existing
}

/// Adds seasons present on `indexed` but missing from `existing` by number;
/// recurses into seasons both sides already share so new episodes surface
/// too. Never overwrites a season `existing` already has.
fn fill_in_missing_seasons(existing: &mut Show, indexed: &Show) {
    for season in &indexed.seasons {
        match existing
            .seasons
            .binary_search_by_key(&season.number, |s| s.number)
        {
            Ok(pos) => {
                let mut merged = existing.seasons[pos].clone();
                fill_in_missing_episodes(&mut merged, season);
                existing.seasons[pos] = merged;
            }
            Err(_) => {
                let mut new_season = season.clone();
                new_season.base.is_anime = existing.base.is_anime;
                existing.insert_season(new_season);
            }
        }
    }
}

fn fill_in_missing_episodes(existing: &mut Season, indexed: &Season) {
    for episode in &indexed.episodes {
        if existing
            .episodes
            .binary_search_by_key(&episode.number, |e| e.number)
            .is_err()
        {
            existing.insert_episode(episode.clone());
        }
    }
}

fn copy_other_media_attr(existing: &mut MediaItemBase, indexed: &MediaItemBase) {
    existing.title = indexed.title.clone();
    existing.external_ids = indexed.external_ids.clone();
    existing.network = indexed.network.clone();
    existing.country = indexed.country.clone();
    existing.language = indexed.language.clone();
    existing.aired_at = indexed.aired_at;
    existing.genres = indexed.genres.clone();
    existing.is_anime = indexed.is_anime;
    existing.year = indexed.year;
    existing.duration_minutes = indexed.duration_minutes;
}

#[cfg(test)]
mod tests {
    use super::*;
    use fetcharr_contracts::capability::EmitterKind;
    use fetcharr_model::{Episode, MediaItemBase, Movie};

    struct AlwaysYes;

    #[async_trait]
    impl TransitionPredicates for AlwaysYes {
        async fn trakt_should_submit(&self, _existing: &MediaItem) -> bool {
            true
        }
        async fn can_we_scrape(&self, _item: &MediaItem) -> bool {
            true
        }
        async fn symlinker_should_submit(&self, _item: &MediaItem) -> bool {
            true
        }
        async fn post_processing_should_submit(&self, _item: &MediaItem) -> bool {
            true
        }
        fn post_processing_enabled(&self) -> bool {
            false
        }
    }

    fn movie(item_id: &str) -> MediaItem {
        MediaItem::Movie(Movie {
            base: MediaItemBase::new(item_id, "The Matrix"),
        })
    }

    #[tokio::test]
    async fn unknown_movie_routes_to_trakt_indexer() {
        let item = movie("tt0133093");
        let step = transition(None, TransitionEmitter::Source(EmitterKind::Overseerr), item, &AlwaysYes).await;
        match step {
            TransitionStep::Output(out) => {
                assert_eq!(out.next_capability, Some(CapabilityKey::TraktIndexer));
                assert_eq!(out.items_to_submit.len(), 1);
            }
            _ => panic!("expected Output"),
        }
    }

    #[tokio::test]
    async fn bare_season_at_top_branch_requests_promotion() {
        let season = Season {
            base: MediaItemBase::new("season-1", "Season 1"),
            parent_show_id: None,
            number: 1,
            episodes: Vec::new(),
        };
        let step = transition(
            None,
            TransitionEmitter::Source(EmitterKind::TraktContent),
            MediaItem::Season(season),
            &AlwaysYes,
        )
        .await;
        assert!(matches!(step, TransitionStep::PromoteToParent(_)));
    }

    #[tokio::test]
    async fn indexed_movie_that_can_scrape_submits_to_scraping() {
        let mut item = movie("tt0133093");
        item.base_mut().indexed_at = Some(chrono::Utc::now());
        let step = transition(None, TransitionEmitter::Source(EmitterKind::RetryLibrary), item, &AlwaysYes).await;
        match step {
            TransitionStep::Output(out) => {
                assert_eq!(out.next_capability, Some(CapabilityKey::Scraping));
                assert_eq!(out.items_to_submit.len(), 1);
            }
            _ => panic!("expected Output"),
        }
    }

    #[tokio::test]
    async fn completed_item_with_post_processing_disabled_has_no_further_work() {
        let mut item = movie("tt0133093");
        item.base_mut().update_folder = Some("updated".into());
        let step = transition(None, TransitionEmitter::Source(EmitterKind::RetryLibrary), item, &AlwaysYes).await;
        match step {
            TransitionStep::Output(out) => {
                assert!(out.next_capability.is_none());
                assert!(out.items_to_submit.is_empty());
            }
            _ => panic!("expected Output"),
        }
    }

    #[tokio::test]
    async fn existing_completed_item_short_circuits_indexed_branch() {
        let mut existing = movie("tt0133093");
        existing.base_mut().indexed_at = Some(chrono::Utc::now());
        existing.base_mut().update_folder = Some("updated".into());

        let mut incoming = movie("tt0133093");
        incoming.base_mut().indexed_at = Some(chrono::Utc::now());

        let step = transition(
            Some(existing),
            TransitionEmitter::Source(EmitterKind::RetryLibrary),
            incoming,
            &AlwaysYes,
        )
        .await;
        match step {
            TransitionStep::Output(out) => {
                assert!(out.updated_item.is_some());
                assert!(out.next_capability.is_none());
                assert!(out.items_to_submit.is_empty());
            }
            _ => panic!("expected Output"),
        }
    }

    #[tokio::test]
    async fn missing_seasons_are_filled_in_without_overwriting_existing_ones() {
        let mut existing_show = fetcharr_model::Show {
            base: MediaItemBase::new("tt999", "Some Show"),
            seasons: Vec::new(),
        };
        let mut s1 = Season {
            base: MediaItemBase::new("s1", "Season 1"),
            parent_show_id: None,
            number: 1,
            episodes: Vec::new(),
        };
        s1.base.title = "kept".into();
        existing_show.insert_season(s1);

        let mut indexed_show = fetcharr_model::Show {
            base: MediaItemBase::new("tt999", "Some Show"),
            seasons: Vec::new(),
        };
        indexed_show.insert_season(Season {
            base: MediaItemBase::new("s1", "Season 1 fresh"),
            parent_show_id: None,
            number: 1,
            episodes: Vec::new(),
        });
        indexed_show.insert_season(Season {
            base: MediaItemBase::new("s2", "Season 2"),
            parent_show_id: None,
            number: 2,
            episodes: Vec::new(),
        });

        let merged = merge_from_indexer(
            MediaItem::Show(existing_show),
            MediaItem::Show(indexed_show),
        );
        let MediaItem::Show(show) = merged else {
            panic!("expected show");
        };
        assert_eq!(show.seasons.len(), 2);
        assert_eq!(show.seasons[0].base.title, "kept");
        assert_eq!(show.seasons[1].number, 2);
    }
}
