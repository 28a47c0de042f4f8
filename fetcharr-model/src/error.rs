use thiserror::Error;

/// Errors raised while constructing or validating model types.
///
/// Kept deliberately small: the model crate never touches I/O, so every
/// variant here describes a data invariant violation, not an environment
/// failure (those live in `fetcharr-core::error::EngineError`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid media item: {0}")]
    InvalidMedia(String),

    #[error("stream {hash} is both attached and blacklisted on item {item}")]
    StreamDualMembership { item: String, hash: String },

    #[error("duplicate {kind} number {number} in sequence")]
    DuplicateSequenceNumber { kind: &'static str, number: u32 },
}

pub type Result<T> = std::result::Result<T, ModelError>;
