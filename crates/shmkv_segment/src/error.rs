//! Error types for segment operations.

use std::io;
use thiserror::Error;

/// Result type for segment operations.
pub type SegmentResult<T> = Result<T, SegmentError>;

/// Errors that can occur while attaching to or operating on a segment.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// A system call failed.
    #[error("{op} failed: {source}")]
    Os {
        /// The system call that failed.
        op: &'static str,
        /// The OS error reported by the call.
        #[source]
        source: io::Error,
    },

    /// The segment cannot hold the variable table header.
    #[error("segment too small: {size} bytes, need at least {min}")]
    TooSmall {
        /// Requested or actual segment size.
        size: usize,
        /// Minimum usable size.
        min: usize,
    },

    /// Not enough free space for the entry.
    #[error("segment full: entry needs {needed} bytes, {available} available")]
    Full {
        /// Bytes required by the new entry.
        needed: usize,
        /// Bytes that could be made available.
        available: usize,
    },

    /// The named variable is not present in the table.
    #[error("variable not found: {name}")]
    VarNotFound {
        /// The variable name.
        name: String,
    },

    /// A name or value exceeds the 32-bit length fields of the table.
    #[error("entry too large: {len} bytes")]
    EntryTooLarge {
        /// Offending length.
        len: usize,
    },

    /// The segment holds data that was not written by this table format.
    #[error("segment holds foreign data (magic {found:#010x})")]
    Foreign {
        /// The magic value found in the header.
        found: u32,
    },

    /// The variable table is internally inconsistent.
    #[error("variable table corrupted: {message}")]
    Corrupted {
        /// Description of the inconsistency.
        message: String,
    },
}

impl SegmentError {
    /// Creates an OS error for `op` from the calling thread's last `errno`.
    pub fn last_os_error(op: &'static str) -> Self {
        Self::Os {
            op,
            source: io::Error::last_os_error(),
        }
    }

    /// Creates a variable not found error.
    pub fn var_not_found(name: impl Into<String>) -> Self {
        Self::VarNotFound { name: name.into() }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Returns the raw OS error code, if this error came from a system call.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Os { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

/// A failed detach. The handle is handed back, still attached.
#[derive(Debug, Error)]
#[error("detach failed: {source}")]
pub struct DetachError<H> {
    /// The handle that could not be detached.
    pub handle: H,
    /// Why the detach failed.
    #[source]
    pub source: SegmentError,
}

impl<H> DetachError<H> {
    /// Wraps `source`, returning ownership of `handle` to the caller.
    pub fn new(handle: H, source: SegmentError) -> Self {
        Self { handle, source }
    }

    /// Splits into the still attached handle and the error.
    pub fn into_parts(self) -> (H, SegmentError) {
        (self.handle, self.source)
    }
}
