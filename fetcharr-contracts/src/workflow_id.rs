use std::fmt;

use fetcharr_model::{InternalId, ItemId, MediaItem};

/// Identifies an Item Workflow run. Per §4.4: `item.item_id` if present,
/// else the internal id, else the imdb id — first present wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkflowId(String);

impl WorkflowId {
    pub fn from_item(item: &MediaItem) -> Option<Self> {
        let base = item.base();
        if !base.item_id.as_str().is_empty() {
            return Some(Self(base.item_id.as_str().to_string()));
        }
        if let Some(id) = base.id {
            return Some(Self(id.to_string()));
        }
        base.external_ids
            .imdb_id
            .clone()
            .map(Self)
    }

    pub fn from_item_id(item_id: &ItemId) -> Self {
        Self(item_id.as_str().to_string())
    }

    pub fn from_internal_id(id: InternalId) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
