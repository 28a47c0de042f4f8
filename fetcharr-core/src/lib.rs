//! The engine crate: the pure state machine, the capability ports it
//! drives, the durable `ItemWorkflow` that runs them to a fixed point, the
//! Postgres-backed `ItemStore`, the Real-Debrid `Downloader`, and the two
//! schedulers (content poller, retry sweeper) that feed items into the
//! workflow in the first place.

pub mod capability;
pub mod downloader;
pub mod error;
pub mod scheduler;
pub mod state_machine;
pub mod store;
pub mod workflow;

pub use capability::{
    CapabilityRegistry, Downloader, LibraryScan, PostProcessing, RequestSource, Scraping,
    Symlinker, TraktIndexer, Updater,
};
pub use error::{EngineError, Result};
pub use scheduler::{ContentPoller, RetrySweeper};
pub use state_machine::{transition, TransitionOutput, TransitionPredicates, TransitionStep};
pub use store::{ItemStore, ItemStoreStats, PostgresItemStore};
pub use workflow::ItemWorkflow;
