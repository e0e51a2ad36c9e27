//! Store configuration.

use crate::error::{CoreError, CoreResult};
use shmkv_segment::HEADER_LEN;

/// Default number of bytes reserved when a segment is created.
pub const DEFAULT_SEGMENT_SIZE: usize = 1024;

/// Default access mode for newly created segments.
pub const DEFAULT_PERMISSIONS: u32 = 0o666;

/// Configuration for attaching a store.
///
/// Both settings only apply when the attach creates the segment. Attaching
/// to an existing segment keeps its size and permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Bytes to reserve on first creation.
    pub size: usize,

    /// Access mode bits applied at creation time.
    pub permissions: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_SEGMENT_SIZE,
            permissions: DEFAULT_PERMISSIONS,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the segment size in bytes.
    #[must_use]
    pub const fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Sets the permission bits.
    #[must_use]
    pub const fn permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    /// Checks that the configuration can create a usable segment.
    ///
    /// Attaching only enforces the permission check up front. The size is
    /// checked by the facility when it actually creates the segment, so a
    /// small size still attaches to an existing one.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the size cannot hold the
    /// variable table header or the permissions have bits above `0o777`.
    pub fn validate(&self) -> CoreResult<()> {
        if self.size < HEADER_LEN {
            return Err(CoreError::invalid_argument(format!(
                "segment size {} is below the minimum of {HEADER_LEN} bytes",
                self.size
            )));
        }
        self.check_permissions()
    }

    pub(crate) fn check_permissions(&self) -> CoreResult<()> {
        if self.permissions & !0o777 != 0 {
            return Err(CoreError::invalid_argument(format!(
                "permissions {:#o} exceed 0o777",
                self.permissions
            )));
        }
        Ok(())
    }
}
