//! Segment key derivation.

use crate::error::{CoreError, CoreResult};
use md5::{Digest, Md5};
use shmkv_segment::SegmentKey;

/// Project id mixed into file derived keys.
pub const FILE_KEY_PROJ_ID: u8 = 4;

/// Derives a stable segment key from a name or a file path.
///
/// If `input` names an existing file, the key comes from the file's identity
/// (see [`shmkv_segment::file_key`]) with project id [`FILE_KEY_PROJ_ID`], so
/// every process that tokenizes the same file gets the same key. Any other
/// string is hashed with MD5 and the first four digest bytes are read as a
/// native endian `u32`.
///
/// Distinct names collide with probability around 2⁻³². This is not
/// hardened against deliberately colliding inputs.
///
/// # Errors
///
/// Returns [`CoreError::InvalidArgument`] for an empty string and
/// [`CoreError::Io`] if an existing file cannot be stat'ed.
///
/// # Example
///
/// ```rust
/// use shmkv_core::tokenize;
///
/// let key = tokenize("example-key").unwrap();
/// assert_eq!(key, tokenize("example-key").unwrap());
/// assert_ne!(key, tokenize("another-key").unwrap());
/// ```
pub fn tokenize(input: &str) -> CoreResult<SegmentKey> {
    if input.is_empty() {
        return Err(CoreError::invalid_argument("cannot tokenize an empty string"));
    }

    #[cfg(unix)]
    {
        let path = std::path::Path::new(input);
        if path.exists() {
            return Ok(shmkv_segment::file_key(path, FILE_KEY_PROJ_ID)?);
        }
    }

    Ok(digest_key(input))
}

/// Derives a key from the MD5 digest of `input`, ignoring the filesystem.
#[must_use]
pub fn digest_key(input: &str) -> SegmentKey {
    let digest = Md5::digest(input.as_bytes());
    let mut head = [0u8; 4];
    head.copy_from_slice(&digest[..4]);
    SegmentKey::new(u32::from_ne_bytes(head))
}
