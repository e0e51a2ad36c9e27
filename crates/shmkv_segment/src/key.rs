//! Segment keys.

use std::fmt;
#[cfg(unix)]
use std::io;
#[cfg(unix)]
use std::path::Path;

/// The integer key that locates a shared memory segment.
///
/// System V identifies segments by a `key_t`, which is a signed 32-bit
/// integer on every supported platform. Keys are kept as `u32` so that digest
/// derived keys can be stored without sign games; [`SegmentKey::as_raw`]
/// reinterprets the bits for the system call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentKey(u32);

impl SegmentKey {
    /// `IPC_PRIVATE`. Never names a shared segment.
    pub const PRIVATE: SegmentKey = SegmentKey(0);

    /// Creates a key from its integer value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the integer value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns the key as a platform `key_t`.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0 as i32
    }

    /// Returns `true` for `IPC_PRIVATE`.
    #[must_use]
    pub const fn is_private(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for SegmentKey {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<SegmentKey> for u32 {
    fn from(key: SegmentKey) -> Self {
        key.0
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Derives a segment key from a file's identity, like `ftok(3)`.
///
/// The key combines the low 8 bits of `proj_id`, the low 8 bits of the
/// device number and the low 16 bits of the inode number. This is the
/// layout used by glibc, musl and the BSD libcs, so the result matches what
/// other programs compute with `ftok` for the same file.
///
/// # Errors
///
/// Returns the `stat` error if the file's metadata cannot be read.
#[cfg(unix)]
pub fn file_key(path: impl AsRef<Path>, proj_id: u8) -> io::Result<SegmentKey> {
    use std::os::unix::fs::MetadataExt;

    let meta = std::fs::metadata(path)?;
    let key = (u32::from(proj_id) << 24)
        | (((meta.dev() & 0xff) as u32) << 16)
        | ((meta.ino() & 0xffff) as u32);
    Ok(SegmentKey(key))
}
