//! In-memory segment facility for testing.

use crate::error::{DetachError, SegmentError, SegmentResult};
use crate::facility::SegmentFacility;
use crate::key::SegmentKey;
use crate::table::{TableStats, VarTable, HEADER_LEN};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct MemorySegment {
    permissions: u32,
    data: RwLock<Vec<u8>>,
    attached: AtomicUsize,
}

/// A process-local segment facility.
///
/// Segments live in a registry shared by every clone of the facility, so two
/// clones behave like two processes attaching the same System V key. This
/// backend is suitable for:
/// - Unit and integration tests
/// - Platforms without System V shared memory
///
/// Permissions are recorded but not enforced.
///
/// # Example
///
/// ```rust
/// use shmkv_segment::{InMemoryFacility, SegmentFacility, SegmentKey};
///
/// let facility = InMemoryFacility::new();
/// let mut handle = facility.create_or_attach(SegmentKey::new(7), 1024, 0o600).unwrap();
/// facility.put_var(&mut handle, "greeting", b"hello").unwrap();
/// assert_eq!(facility.get_var(&handle, "greeting").unwrap(), Some(b"hello".to_vec()));
/// facility.detach(handle).unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryFacility {
    segments: Arc<Mutex<HashMap<SegmentKey, Arc<MemorySegment>>>>,
}

/// Handle to a segment attached through [`InMemoryFacility`].
#[derive(Debug)]
pub struct MemoryHandle {
    key: SegmentKey,
    segment: Arc<MemorySegment>,
}

impl MemoryHandle {
    /// The key the segment was attached with.
    #[must_use]
    pub fn key(&self) -> SegmentKey {
        self.key
    }

    /// Size of the segment in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.segment.data.read().len()
    }

    /// Permission bits the segment was created with.
    #[must_use]
    pub fn permissions(&self) -> u32 {
        self.segment.permissions
    }
}

impl InMemoryFacility {
    /// Creates a facility with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (not removed) segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.lock().len()
    }

    /// Returns `true` if a live segment exists for `key`.
    #[must_use]
    pub fn contains(&self, key: SegmentKey) -> bool {
        self.segments.lock().contains_key(&key)
    }

    /// Number of handles currently attached to the live segment for `key`.
    #[must_use]
    pub fn attach_count(&self, key: SegmentKey) -> Option<usize> {
        self.segments
            .lock()
            .get(&key)
            .map(|segment| segment.attached.load(Ordering::Acquire))
    }

    fn create(size: usize, permissions: u32) -> SegmentResult<Arc<MemorySegment>> {
        if size < HEADER_LEN {
            return Err(SegmentError::TooSmall {
                size,
                min: HEADER_LEN,
            });
        }

        let mut data = vec![0u8; size];
        VarTable::format(data.as_mut_slice())?;

        Ok(Arc::new(MemorySegment {
            permissions,
            data: RwLock::new(data),
            attached: AtomicUsize::new(1),
        }))
    }
}

impl SegmentFacility for InMemoryFacility {
    type Handle = MemoryHandle;

    fn create_or_attach(
        &self,
        key: SegmentKey,
        size: usize,
        permissions: u32,
    ) -> SegmentResult<MemoryHandle> {
        // IPC_PRIVATE always yields a new, unnamed segment
        if key.is_private() {
            let segment = Self::create(size, permissions)?;
            return Ok(MemoryHandle { key, segment });
        }

        let mut segments = self.segments.lock();
        let segment = match segments.get(&key) {
            Some(existing) => {
                existing.attached.fetch_add(1, Ordering::AcqRel);
                Arc::clone(existing)
            }
            None => {
                let created = Self::create(size, permissions)?;
                segments.insert(key, Arc::clone(&created));
                created
            }
        };

        Ok(MemoryHandle { key, segment })
    }

    fn detach(&self, handle: MemoryHandle) -> Result<(), DetachError<MemoryHandle>> {
        // saturating: a failed update just means the count was already zero
        let _ = handle
            .segment
            .attached
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        Ok(())
    }

    fn remove_segment(&self, handle: &MemoryHandle) -> SegmentResult<()> {
        let mut segments = self.segments.lock();
        let is_live = segments
            .get(&handle.key)
            .is_some_and(|live| Arc::ptr_eq(live, &handle.segment));
        if is_live {
            segments.remove(&handle.key);
        }
        Ok(())
    }

    fn put_var(&self, handle: &mut MemoryHandle, name: &str, value: &[u8]) -> SegmentResult<()> {
        let mut data = handle.segment.data.write();
        let mut table = VarTable::open(data.as_mut_slice())?;
        table.put(name, value)
    }

    fn get_var(&self, handle: &MemoryHandle, name: &str) -> SegmentResult<Option<Vec<u8>>> {
        let data = handle.segment.data.read();
        let table = VarTable::open(data.as_slice())?;
        table.get(name)
    }

    fn remove_var(&self, handle: &mut MemoryHandle, name: &str) -> SegmentResult<()> {
        let mut data = handle.segment.data.write();
        let mut table = VarTable::open(data.as_mut_slice())?;
        table.remove(name)
    }

    fn stats(&self, handle: &MemoryHandle) -> SegmentResult<TableStats> {
        let data = handle.segment.data.read();
        let table = VarTable::open(data.as_slice())?;
        table.stats()
    }
}
