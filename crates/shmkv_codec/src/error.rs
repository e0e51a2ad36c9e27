//! Error types for value encoding.

use std::io;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while converting between variable values and their stored
/// CBOR bytes.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The value could not be serialized for the variable table.
    #[error("cannot encode variable value: {0}")]
    EncodingFailed(#[source] ciborium::ser::Error<io::Error>),

    /// Stored bytes are not CBOR, or do not match the requested type.
    #[error("cannot decode stored variable: {0}")]
    DecodingFailed(#[source] ciborium::de::Error<io::Error>),
}

impl CodecError {
    /// Returns `true` if the stored bytes were valid CBOR of another shape.
    ///
    /// Lets a reader tell a type mismatch from a torn or foreign write.
    #[must_use]
    pub fn is_type_mismatch(&self) -> bool {
        matches!(
            self,
            Self::DecodingFailed(ciborium::de::Error::Semantic(..))
        )
    }
}
