use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A candidate source discovered by scraping, keyed by infohash. Attached to
/// a `MediaItem` and, independently, possibly blacklisted from it — never
/// both at once (see `ModelError::StreamDualMembership`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    pub infohash: String,
    pub raw_title: String,
    pub parsed_title: String,
    /// Scraper-assigned ranking score; higher sorts first when a scraper
    /// itself chooses among equally-matched streams (outside this crate's
    /// scope — carried for the `Scraping` capability's own use).
    pub rank: i64,
    /// Similarity ratio between `parsed_title` and the item's own title.
    pub similarity: f32,
}

impl Stream {
    pub fn new(infohash: impl Into<String>, raw_title: impl Into<String>) -> Self {
        Self {
            infohash: infohash.into(),
            raw_title: raw_title.into(),
            parsed_title: String::new(),
            rank: 0,
            similarity: 0.0,
        }
    }
}

/// A single file inside a provider's container, as reported after the
/// magnet has been added and file selection has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveStreamFile {
    pub filename: String,
    pub size: i64,
}

/// The stream currently selected as the item's active download, recorded by
/// the Cached-Source Selector once a container satisfies the item's
/// wanted-files predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveStream {
    pub hash: String,
    /// File index (provider-assigned) to file metadata, for the files
    /// selected as part of this item's download.
    pub files: HashMap<String, ActiveStreamFile>,
    /// Provider-assigned torrent id, set once the magnet has actually been
    /// added (absent between selection and `add_magnet`).
    pub id: Option<String>,
}

impl ActiveStream {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            files: HashMap::new(),
            id: None,
        }
    }
}
