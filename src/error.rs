//! Error taxonomy for the prolly tree core.
//!
//! Every fallible operation in this crate returns [`Result<T, Error>`](Error).
//! Variants line up with the taxonomy table in the specification: most are
//! fatal (the tree or a loaded bucket is corrupt, or the caller misused the
//! API in a way that cannot be recovered from automatically); a few are
//! caller bugs that a retry with corrected input can resolve.

use thiserror::Error;

/// Errors produced by prolly tree operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A block store `get` could not find the requested digest.
    #[error("block not found: {digest}")]
    NotFound {
        /// Hex-encoded digest of the missing block.
        digest: String,
    },

    /// A decoded bucket failed a structural, order, or boundary invariant.
    #[error("invalid bucket: {reason}")]
    InvalidBucket {
        /// Human-readable description of which invariant failed.
        reason: String,
    },

    /// A loaded bucket's `(average, level)` did not match what the caller expected.
    #[error(
        "prefix mismatch: expected average={expected_average} level={expected_level}, got average={actual_average} level={actual_level}"
    )]
    PrefixMismatch {
        expected_average: u32,
        expected_level: u32,
        actual_average: u32,
        actual_level: u32,
    },

    /// A loaded bucket's first or last key violated the range the caller expected.
    #[error("range mismatch: {reason}")]
    RangeMismatch {
        /// Human-readable description of the violated bound.
        reason: String,
    },

    /// A digest was shorter than the four bytes the boundary predicate and
    /// codec require. Unreachable with BLAKE3's fixed 32-byte output; kept as
    /// a defensive check against a hand-rolled hash substitution.
    #[error("insufficient hash bytes: need at least 4, found {found}")]
    InsufficientHash { found: usize },

    /// Update batches were not sorted and deduplicated by key, either within
    /// a batch or across a batch boundary.
    #[error("unsorted updates: {reason}")]
    UnsortedUpdates { reason: String },

    /// A mutating cursor operation was attempted while the cursor's lock was
    /// already held. Unreachable through the safe API, since mutating
    /// operations take `&mut self`; retained as a defensive re-entrancy
    /// guard.
    #[error("cursor is locked by an in-flight operation")]
    CursorLocked,

    /// A level-change operation targeted a level above the root or below 0.
    #[error("level {requested} out of range [0, {root_level}]")]
    LevelOutOfRange { requested: u32, root_level: u32 },

    /// The mutation engine failed to converge to a single root bucket within
    /// `MAX_LEVEL` levels.
    #[error("mutation did not converge to a root within {max_level} levels")]
    MaxLevelExceeded { max_level: u32 },

    /// The cursor is positioned on a bucket with no entries.
    #[error("cursor targets an empty bucket")]
    EmptyCursor,

    /// The `average` configuration value was zero or otherwise out of range.
    #[error("invalid average: {average} (must be in [1, u32::MAX])")]
    InvalidAverage { average: u32 },

    /// CBOR encode/decode failure from the underlying codec.
    #[error("codec error: {0}")]
    Codec(String),
}

impl Error {
    /// Whether this error reflects a caller bug that may be retried after
    /// correcting the input, as opposed to fatal data corruption.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::CursorLocked | Self::LevelOutOfRange { .. } | Self::EmptyCursor
        )
    }
}

impl From<ciborium::de::Error<std::io::Error>> for Error {
    fn from(err: ciborium::de::Error<std::io::Error>) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for Error {
    fn from(err: ciborium::ser::Error<std::io::Error>) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
