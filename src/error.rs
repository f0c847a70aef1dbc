use std::io;

/// Errors surfaced by training, queries, alignment, and persistence.
///
/// Query operations report these directly. Training tolerates per-token
/// lookup failures (unknown words are simply skipped) but propagates I/O
/// problems.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// A required query token is not in the vocabulary.
    #[error("out of vocabulary: {0:?}")]
    Oov(String),

    /// Every token pair was unknown, leaving nothing to aggregate.
    #[error("all word pairs are unknown (OOV)")]
    AllOov,

    /// Two sequences declared to be aligned have different lengths.
    #[error("input sequences don't have the same size ({left} vs {right})")]
    ShapeMismatch { left: usize, right: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    /// Internal corruption: an out-of-range index or a malformed coding tree.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type Result<T, E = ModelError> = std::result::Result<T, E>;
