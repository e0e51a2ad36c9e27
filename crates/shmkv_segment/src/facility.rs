//! Segment facility trait definition.

use crate::error::{DetachError, SegmentResult};
use crate::key::SegmentKey;
use crate::table::TableStats;

/// An operating-system style shared memory facility.
///
/// A facility creates or attaches segments by key and exposes the keyed
/// variable table stored inside each attached segment. It knows nothing
/// about serialization: values are opaque byte strings.
///
/// # Contract
///
/// - `create_or_attach` attaches to a live segment with the same key if one
///   exists, ignoring `size` and `permissions`. Otherwise it creates a segment
///   of `size` bytes with an empty variable table.
/// - `remove_segment` marks the whole segment for destruction. Handles that
///   are still attached keep working until they detach; new attaches with
///   the same key get a fresh segment.
/// - `get_var` returns `Ok(None)` when the variable does not exist.
/// - `remove_var` fails with [`crate::SegmentError::VarNotFound`] when the
///   variable does not exist.
///
/// Facilities provide no synchronization between handles. All calls are
/// synchronous and cannot be cancelled.
///
/// # Implementors
///
/// - [`super::InMemoryFacility`] - Process-local, for tests
/// - [`super::SysvFacility`] - System V shared memory (unix)
pub trait SegmentFacility {
    /// The attached-segment handle produced by this facility.
    type Handle;

    /// Creates the segment for `key` if needed and attaches to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment cannot be created or attached, or if
    /// it holds data that is not a variable table.
    fn create_or_attach(
        &self,
        key: SegmentKey,
        size: usize,
        permissions: u32,
    ) -> SegmentResult<Self::Handle>;

    /// Releases this process's attachment. The segment itself persists.
    ///
    /// The handle is consumed, so it cannot reach the segment's memory after
    /// the mapping is gone:
    ///
    /// ```compile_fail
    /// use shmkv_segment::{InMemoryFacility, SegmentFacility, SegmentKey};
    ///
    /// let facility = InMemoryFacility::new();
    /// let handle = facility.create_or_attach(SegmentKey::new(9), 256, 0o600).unwrap();
    /// facility.detach(handle).unwrap();
    /// facility.get_var(&handle, "k").unwrap();
    /// ```
    ///
    /// # Errors
    ///
    /// If the underlying detach call fails, the handle is returned inside the
    /// [`DetachError`] and is still attached.
    fn detach(&self, handle: Self::Handle) -> Result<(), DetachError<Self::Handle>>;

    /// Marks the segment for destruction.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying removal call fails.
    fn remove_segment(&self, handle: &Self::Handle) -> SegmentResult<()>;

    /// Stores `value` under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is full or corrupted.
    fn put_var(&self, handle: &mut Self::Handle, name: &str, value: &[u8]) -> SegmentResult<()>;

    /// Reads the value stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is corrupted.
    fn get_var(&self, handle: &Self::Handle, name: &str) -> SegmentResult<Option<Vec<u8>>>;

    /// Removes the value stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable does not exist or the segment is
    /// corrupted.
    fn remove_var(&self, handle: &mut Self::Handle, name: &str) -> SegmentResult<()>;

    /// Returns variable table statistics for the attached segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is corrupted.
    fn stats(&self, handle: &Self::Handle) -> SegmentResult<TableStats>;
}
