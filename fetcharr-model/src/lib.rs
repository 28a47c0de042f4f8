//! Data model for the Fetcharr media acquisition engine: the `MediaItem`
//! tagged union, its `Stream`/`Subtitle` satellites, and the state
//! derivation rules that keep `last_state` consistent with stored fields.

pub mod error;
pub mod ids;
pub mod media_item;
pub mod state;
pub mod stream;
pub mod subtitle;

pub use error::{ModelError, Result};
pub use ids::{ExternalIds, InternalId, ItemId};
pub use media_item::{Episode, MediaItem, MediaItemBase, MediaKind, Movie, Season, Show};
pub use state::ItemState;
pub use stream::{ActiveStream, ActiveStreamFile, Stream};
pub use subtitle::Subtitle;
