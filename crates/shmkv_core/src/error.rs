//! Error types for shmkv core.

use shmkv_segment::{SegmentError, SegmentKey};
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A caller supplied argument is unusable.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// `attach` was called on an attached store.
    #[error("already attached to segment {segment_id}")]
    AlreadyAttached {
        /// The segment the store is attached to.
        segment_id: SegmentKey,
    },

    /// The operation requires an attached store.
    #[error("not attached")]
    NotAttached,

    /// The facility could not create or attach the segment.
    #[error("attach to segment {segment_id} failed: {source}")]
    AttachFailure {
        /// The segment key.
        segment_id: SegmentKey,
        /// The underlying error.
        #[source]
        source: SegmentError,
    },

    /// The facility could not detach the segment.
    #[error("detach from segment {segment_id} failed: {source}")]
    DetachFailure {
        /// The segment key.
        segment_id: SegmentKey,
        /// The underlying error.
        #[source]
        source: SegmentError,
    },

    /// The facility could not mark the segment for destruction.
    #[error("removal of segment {segment_id} failed: {source}")]
    RemoveFailure {
        /// The segment key.
        segment_id: SegmentKey,
        /// The underlying error.
        #[source]
        source: SegmentError,
    },

    /// Reading or writing the variable table failed.
    #[error("store operation on {key:?} failed: {source}")]
    StoreFailure {
        /// The variable key.
        key: String,
        /// The underlying error.
        #[source]
        source: SegmentError,
    },

    /// The key is not present in the segment.
    #[error("key not found: {key:?}")]
    KeyNotFound {
        /// The variable key.
        key: String,
    },

    /// The value serializes to the reserved sentinel and cannot be stored.
    #[error("value for {key:?} is the reserved sentinel (false) and cannot be stored")]
    ReservedValue {
        /// The variable key.
        key: String,
    },

    /// Value serialization error.
    #[error("codec error: {0}")]
    Codec(#[from] shmkv_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a store failure error for `key`.
    pub fn store_failure(key: impl Into<String>, source: SegmentError) -> Self {
        Self::StoreFailure {
            key: key.into(),
            source,
        }
    }

    /// Creates a key not found error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Returns `true` for [`CoreError::KeyNotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }
}
