//! Shared identifiers and capability-key contracts used at the boundary
//! between `fetcharr-core`'s engine and its callers, kept in their own
//! crate so neither side needs to depend on the other's internals.

pub mod capability;
pub mod workflow_id;

/// Frequently used combinators for orchestration crates.
pub mod prelude {
    pub use super::capability::{CapabilityKey, EmitterKind, TransitionEmitter};
    pub use super::workflow_id::WorkflowId;
}
