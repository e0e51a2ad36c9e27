//! The segment store: attach lifecycle and keyed accessors.

use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::map::MapView;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shmkv_segment::{SegmentError, SegmentFacility, SegmentKey, TableStats};
use tracing::{debug, info, trace, warn};

/// A keyed variable store over one shared memory segment.
///
/// A store is either *detached* or *attached*. It holds the only handle to
/// its attachment; dropping an attached store detaches it (the segment and
/// its variables stay alive for other processes until [`SegmentStore::remove`]
/// is called).
///
/// # State Machine
///
/// ```text
///              attach                      detach / remove
///  Detached ─────────────▶ Attached ──────────────────────▶ Detached
///     │                       │
///     └ accessors: NotAttached└ attach: AlreadyAttached
/// ```
///
/// # Concurrency
///
/// The store does no locking. Other processes attached to the same key can
/// change variables between any two calls, so a `get` followed by a `set`
/// is not atomic. Coordinate writers externally.
///
/// # Example
///
/// ```rust
/// use shmkv_core::{tokenize, InMemoryFacility, SegmentStore, StoreConfig};
///
/// let key = tokenize("example-key").unwrap();
/// let mut store = SegmentStore::open(InMemoryFacility::new(), key, &StoreConfig::default()).unwrap();
///
/// store.set("count", &42).unwrap();
/// assert_eq!(store.get::<i32>("count").unwrap(), 42);
///
/// store.delete("count").unwrap();
/// assert!(!store.exists("count").unwrap());
///
/// store.remove().unwrap();
/// assert!(!store.is_attached());
/// ```
pub struct SegmentStore<F: SegmentFacility> {
    facility: F,
    /// Key of the current (or last) attachment.
    segment_id: Option<SegmentKey>,
    /// Present iff attached.
    handle: Option<F::Handle>,
}

impl<F: SegmentFacility> SegmentStore<F> {
    /// Creates a detached store over `facility`.
    #[must_use]
    pub fn new(facility: F) -> Self {
        Self {
            facility,
            segment_id: None,
            handle: None,
        }
    }

    /// Creates a store and attaches it to `segment_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for an invalid key or config and
    /// [`CoreError::AttachFailure`] if the facility cannot attach.
    pub fn open(facility: F, segment_id: SegmentKey, config: &StoreConfig) -> CoreResult<Self> {
        let mut store = Self::new(facility);
        store.attach_with(segment_id, config)?;
        Ok(store)
    }

    /// Attaches to `segment_id` using the size and permissions in `config`.
    ///
    /// # Errors
    ///
    /// See [`SegmentStore::attach`]; also fails with
    /// [`CoreError::InvalidArgument`] if the permissions exceed `0o777`. A
    /// size below the table header only fails when the segment is created.
    pub fn attach_with(&mut self, segment_id: SegmentKey, config: &StoreConfig) -> CoreResult<()> {
        config.check_permissions()?;
        self.attach(segment_id, config.size, config.permissions)
    }

    /// Attaches to `segment_id`, creating the segment with `size` bytes and
    /// `permissions` if it does not exist yet.
    ///
    /// # Errors
    ///
    /// - [`CoreError::AlreadyAttached`] if the store is attached
    /// - [`CoreError::InvalidArgument`] for the private key `0`
    /// - [`CoreError::AttachFailure`] if the facility call fails
    pub fn attach(&mut self, segment_id: SegmentKey, size: usize, permissions: u32) -> CoreResult<()> {
        if self.handle.is_some() {
            return Err(CoreError::AlreadyAttached {
                segment_id: self.current_id(),
            });
        }
        if segment_id.is_private() {
            return Err(CoreError::invalid_argument(
                "segment key 0 is IPC_PRIVATE and cannot be shared",
            ));
        }

        let handle = self
            .facility
            .create_or_attach(segment_id, size, permissions)
            .map_err(|source| CoreError::AttachFailure { segment_id, source })?;

        debug!(%segment_id, size, permissions = format_args!("{permissions:#o}"), "attached segment");
        self.segment_id = Some(segment_id);
        self.handle = Some(handle);
        Ok(())
    }

    /// Releases the attachment. The segment and its variables persist.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotAttached`] if detached, or
    /// [`CoreError::DetachFailure`] (store stays attached) if the facility
    /// call fails.
    pub fn detach(&mut self) -> CoreResult<()> {
        let handle = self.handle.take().ok_or(CoreError::NotAttached)?;
        let segment_id = self.current_id();

        if let Err(failed) = self.facility.detach(handle) {
            let (handle, source) = failed.into_parts();
            self.handle = Some(handle);
            return Err(CoreError::DetachFailure { segment_id, source });
        }

        debug!(%segment_id, "detached segment");
        Ok(())
    }

    /// Marks the whole segment for destruction, then detaches.
    ///
    /// Removal affects every process attached to the segment: once they all
    /// detach the memory is freed, and the next attach with the same key
    /// starts from an empty segment.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotAttached`] if detached, or
    /// [`CoreError::RemoveFailure`] if the facility refuses.
    pub fn remove(&mut self) -> CoreResult<()> {
        let handle = self.handle.as_ref().ok_or(CoreError::NotAttached)?;
        let segment_id = self.current_id();

        self.facility
            .remove_segment(handle)
            .map_err(|source| CoreError::RemoveFailure { segment_id, source })?;

        info!(%segment_id, "segment marked for removal");
        self.detach()
    }

    /// Returns `true` if the store is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.handle.is_some()
    }

    /// Key of the current attachment, or of the last one after a detach.
    #[must_use]
    pub fn segment_id(&self) -> Option<SegmentKey> {
        self.segment_id
    }

    /// The facility this store attaches through.
    pub fn facility(&self) -> &F {
        &self.facility
    }

    /// Reads and deserializes the value stored under `key`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotAttached`] if detached
    /// - [`CoreError::KeyNotFound`] if nothing is stored under `key`
    /// - [`CoreError::StoreFailure`] if the variable table cannot be read
    /// - [`CoreError::Codec`] if the value does not deserialize as `T`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> CoreResult<T> {
        let bytes = self
            .get_encoded(key)?
            .ok_or_else(|| CoreError::key_not_found(key))?;
        Ok(shmkv_codec::decode(&bytes)?)
    }

    /// Serializes `value` and stores it under `key`, replacing any previous
    /// value.
    ///
    /// # Errors
    ///
    /// - [`CoreError::ReservedValue`] if `value` serializes to `false`
    /// - [`CoreError::NotAttached`] if detached
    /// - [`CoreError::StoreFailure`] if the write fails (e.g. segment full);
    ///   the previous value is left in place
    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> CoreResult<()> {
        let bytes = shmkv_codec::encode(value)?;
        if shmkv_codec::is_reserved(&bytes) {
            return Err(CoreError::ReservedValue { key: key.into() });
        }

        let handle = self.handle.as_mut().ok_or(CoreError::NotAttached)?;
        self.facility
            .put_var(handle, key, &bytes)
            .map_err(|source| CoreError::store_failure(key, source))?;

        trace!(key, len = bytes.len(), "stored variable");
        Ok(())
    }

    /// Returns `true` if a value is stored under `key`.
    ///
    /// Only "not found" maps to `false`; every other failure is returned.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotAttached`] if detached, or
    /// [`CoreError::StoreFailure`] if the variable table cannot be read.
    pub fn exists(&self, key: &str) -> CoreResult<bool> {
        Ok(self.get_encoded(key)?.is_some())
    }

    /// Removes the value stored under `key`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotAttached`] if detached
    /// - [`CoreError::KeyNotFound`] if nothing is stored under `key`
    /// - [`CoreError::StoreFailure`] for any other facility failure
    pub fn delete(&mut self, key: &str) -> CoreResult<()> {
        let handle = self.handle.as_mut().ok_or(CoreError::NotAttached)?;
        match self.facility.remove_var(handle, key) {
            Ok(()) => {
                trace!(key, "deleted variable");
                Ok(())
            }
            Err(SegmentError::VarNotFound { .. }) => Err(CoreError::key_not_found(key)),
            Err(source) => Err(CoreError::store_failure(key, source)),
        }
    }

    /// Returns variable table statistics for the attached segment.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotAttached`] if detached, or
    /// [`CoreError::StoreFailure`] if the table cannot be read.
    pub fn stats(&self) -> CoreResult<TableStats> {
        let handle = self.handle.as_ref().ok_or(CoreError::NotAttached)?;
        self.facility
            .stats(handle)
            .map_err(|source| CoreError::store_failure("", source))
    }

    /// Returns a map-style view with `get`/`insert`/`contains_key`/`remove`.
    pub fn map(&mut self) -> MapView<'_, F> {
        MapView::new(self)
    }

    fn get_encoded(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        let handle = self.handle.as_ref().ok_or(CoreError::NotAttached)?;
        self.facility
            .get_var(handle, key)
            .map_err(|source| CoreError::store_failure(key, source))
    }

    fn current_id(&self) -> SegmentKey {
        self.segment_id.unwrap_or(SegmentKey::PRIVATE)
    }
}

impl<F: SegmentFacility> std::fmt::Debug for SegmentStore<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentStore")
            .field("segment_id", &self.segment_id)
            .field("is_attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

impl<F: SegmentFacility> Drop for SegmentStore<F> {
    fn drop(&mut self) {
        if self.is_attached() {
            if let Err(e) = self.detach() {
                warn!(error = %e, "failed to detach segment on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use shmkv_segment::InMemoryFacility;

    const KEY: SegmentKey = SegmentKey::new(0x1234);

    fn create_store() -> SegmentStore<InMemoryFacility> {
        SegmentStore::open(InMemoryFacility::new(), KEY, &StoreConfig::default()).unwrap()
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Bar {
        asd: Vec<i32>,
    }

    #[test]
    fn open_attaches() {
        let store = create_store();
        assert!(store.is_attached());
        assert_eq!(store.segment_id(), Some(KEY));
    }

    #[test]
    fn new_is_detached() {
        let store = SegmentStore::new(InMemoryFacility::new());
        assert!(!store.is_attached());
        assert_eq!(store.segment_id(), None);
    }

    #[test]
    fn simple_set_get() {
        let mut store = create_store();
        store.set("count", &42).unwrap();
        assert_eq!(store.get::<i64>("count").unwrap(), 42);
    }

    #[test]
    fn struct_values_roundtrip() {
        let mut store = create_store();
        let bar = Bar { asd: vec![1, 2, 3] };
        store.set("bar", &bar).unwrap();
        assert_eq!(store.get::<Bar>("bar").unwrap(), bar);
    }

    #[test]
    fn unsized_values_can_be_set() {
        let mut store = create_store();
        store.set("name", "shmkv").unwrap();
        store.set("list", &[1u8, 2, 3][..]).unwrap();
        assert_eq!(store.get::<String>("name").unwrap(), "shmkv");
        assert_eq!(store.get::<Vec<u8>>("list").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn get_missing_is_key_not_found() {
        let store = create_store();
        let result = store.get::<i32>("never");
        assert!(matches!(result, Err(CoreError::KeyNotFound { key }) if key == "never"));
    }

    #[test]
    fn get_wrong_type_is_codec_error() {
        let mut store = create_store();
        store.set("k", "text").unwrap();
        assert!(matches!(store.get::<u32>("k"), Err(CoreError::Codec(_))));
    }

    #[test]
    fn set_false_is_reserved() {
        let mut store = create_store();
        store.set("flag", &true).unwrap();

        let result = store.set("flag", &false);
        assert!(matches!(result, Err(CoreError::ReservedValue { .. })));
        assert!(store.get::<bool>("flag").unwrap());
    }

    #[test]
    fn reserved_check_precedes_attach_check() {
        let mut store = SegmentStore::new(InMemoryFacility::new());
        let result = store.set("flag", &false);
        assert!(matches!(result, Err(CoreError::ReservedValue { .. })));
    }

    #[test]
    fn exists_follows_set_and_delete() {
        let mut store = create_store();
        assert!(!store.exists("k").unwrap());

        store.set("k", &1).unwrap();
        assert!(store.exists("k").unwrap());

        store.delete("k").unwrap();
        assert!(!store.exists("k").unwrap());
    }

    #[test]
    fn delete_missing_is_key_not_found() {
        let mut store = create_store();
        assert!(store.delete("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn accessors_require_attach() {
        let mut store = SegmentStore::new(InMemoryFacility::new());

        assert!(matches!(store.get::<i32>("k"), Err(CoreError::NotAttached)));
        assert!(matches!(store.set("k", &1), Err(CoreError::NotAttached)));
        assert!(matches!(store.exists("k"), Err(CoreError::NotAttached)));
        assert!(matches!(store.delete("k"), Err(CoreError::NotAttached)));
        assert!(matches!(store.stats(), Err(CoreError::NotAttached)));
    }

    #[test]
    fn exists_propagates_not_attached() {
        let mut store = create_store();
        store.detach().unwrap();
        assert!(matches!(store.exists("k"), Err(CoreError::NotAttached)));
    }

    #[test]
    fn attach_twice_fails() {
        let mut store = create_store();
        let result = store.attach(SegmentKey::new(99), 1024, 0o666);
        assert!(matches!(
            result,
            Err(CoreError::AlreadyAttached { segment_id }) if segment_id == KEY
        ));
        assert_eq!(store.segment_id(), Some(KEY));
    }

    #[test]
    fn detach_twice_fails() {
        let mut store = create_store();
        store.detach().unwrap();
        assert!(matches!(store.detach(), Err(CoreError::NotAttached)));
    }

    #[test]
    fn segment_id_survives_detach() {
        let mut store = create_store();
        store.detach().unwrap();
        assert_eq!(store.segment_id(), Some(KEY));
    }

    #[test]
    fn reattach_after_detach() {
        let mut store = create_store();
        store.set("k", &7).unwrap();
        store.detach().unwrap();

        store.attach(KEY, 1024, 0o666).unwrap();
        assert_eq!(store.get::<i32>("k").unwrap(), 7);
    }

    #[test]
    fn private_key_is_invalid() {
        let mut store = SegmentStore::new(InMemoryFacility::new());
        let result = store.attach(SegmentKey::PRIVATE, 1024, 0o666);
        assert!(matches!(result, Err(CoreError::InvalidArgument { .. })));
        assert!(!store.is_attached());
    }

    #[test]
    fn attach_failure_leaves_store_detached() {
        let mut store = SegmentStore::new(InMemoryFacility::new());
        let result = store.attach(KEY, 4, 0o666);
        assert!(matches!(
            result,
            Err(CoreError::AttachFailure {
                source: SegmentError::TooSmall { .. },
                ..
            })
        ));
        assert!(!store.is_attached());
        assert_eq!(store.segment_id(), None);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = StoreConfig::new().permissions(0o1777);
        let result = SegmentStore::open(InMemoryFacility::new(), KEY, &config);
        assert!(matches!(result, Err(CoreError::InvalidArgument { .. })));
    }

    #[test]
    fn small_size_only_matters_on_creation() {
        let facility = InMemoryFacility::new();
        let tiny = StoreConfig::new().size(4);

        let result = SegmentStore::open(facility.clone(), KEY, &tiny);
        assert!(matches!(
            result,
            Err(CoreError::AttachFailure {
                source: SegmentError::TooSmall { size: 4, .. },
                ..
            })
        ));

        let mut owner = SegmentStore::open(facility.clone(), KEY, &StoreConfig::default()).unwrap();
        owner.set("k", &1).unwrap();

        let sibling = SegmentStore::open(facility, KEY, &tiny).unwrap();
        assert_eq!(sibling.get::<i32>("k").unwrap(), 1);
    }

    #[test]
    fn remove_detaches_and_clears_segment() {
        let facility = InMemoryFacility::new();
        let mut store = SegmentStore::open(facility.clone(), KEY, &StoreConfig::default()).unwrap();
        store.set("k", &1).unwrap();

        store.remove().unwrap();
        assert!(!store.is_attached());
        assert!(!facility.contains(KEY));
        assert!(matches!(store.remove(), Err(CoreError::NotAttached)));

        store.attach_with(KEY, &StoreConfig::default()).unwrap();
        assert!(!store.exists("k").unwrap());
    }

    #[test]
    fn full_segment_is_store_failure() {
        let config = StoreConfig::new().size(64);
        let mut store = SegmentStore::open(InMemoryFacility::new(), KEY, &config).unwrap();
        store.set("small", &1).unwrap();

        let result = store.set("big", &vec![0u8; 256]);
        assert!(matches!(
            result,
            Err(CoreError::StoreFailure {
                source: SegmentError::Full { .. },
                ..
            })
        ));
        assert_eq!(store.get::<i32>("small").unwrap(), 1);
    }

    #[test]
    fn drop_detaches() {
        let facility = InMemoryFacility::new();
        {
            let _store = SegmentStore::open(facility.clone(), KEY, &StoreConfig::default()).unwrap();
            assert_eq!(facility.attach_count(KEY), Some(1));
        }
        assert_eq!(facility.attach_count(KEY), Some(0));
        assert!(facility.contains(KEY));
    }

    /// Wraps the in-memory facility with a detach that always fails.
    #[derive(Debug, Clone, Default)]
    struct StuckFacility {
        inner: InMemoryFacility,
    }

    impl SegmentFacility for StuckFacility {
        type Handle = <InMemoryFacility as SegmentFacility>::Handle;

        fn create_or_attach(
            &self,
            key: SegmentKey,
            size: usize,
            permissions: u32,
        ) -> shmkv_segment::SegmentResult<Self::Handle> {
            self.inner.create_or_attach(key, size, permissions)
        }

        fn detach(
            &self,
            handle: Self::Handle,
        ) -> Result<(), shmkv_segment::DetachError<Self::Handle>> {
            let source = SegmentError::Os {
                op: "shmdt",
                source: std::io::Error::from_raw_os_error(22),
            };
            Err(shmkv_segment::DetachError::new(handle, source))
        }

        fn remove_segment(&self, handle: &Self::Handle) -> shmkv_segment::SegmentResult<()> {
            self.inner.remove_segment(handle)
        }

        fn put_var(
            &self,
            handle: &mut Self::Handle,
            name: &str,
            value: &[u8],
        ) -> shmkv_segment::SegmentResult<()> {
            self.inner.put_var(handle, name, value)
        }

        fn get_var(
            &self,
            handle: &Self::Handle,
            name: &str,
        ) -> shmkv_segment::SegmentResult<Option<Vec<u8>>> {
            self.inner.get_var(handle, name)
        }

        fn remove_var(&self, handle: &mut Self::Handle, name: &str) -> shmkv_segment::SegmentResult<()> {
            self.inner.remove_var(handle, name)
        }

        fn stats(&self, handle: &Self::Handle) -> shmkv_segment::SegmentResult<TableStats> {
            self.inner.stats(handle)
        }
    }

    #[test]
    fn failed_detach_keeps_store_attached() {
        let mut store = SegmentStore::open(StuckFacility::default(), KEY, &StoreConfig::default()).unwrap();
        store.set("k", &5).unwrap();

        let result = store.detach();
        assert!(matches!(
            result,
            Err(CoreError::DetachFailure {
                segment_id: KEY,
                source: SegmentError::Os { op: "shmdt", .. },
            })
        ));
        assert!(store.is_attached());
        assert_eq!(store.get::<i32>("k").unwrap(), 5);
    }

    #[test]
    fn failed_remove_detach_keeps_store_attached() {
        let facility = StuckFacility::default();
        let mut store = SegmentStore::open(facility.clone(), KEY, &StoreConfig::default()).unwrap();

        assert!(matches!(store.remove(), Err(CoreError::DetachFailure { .. })));
        assert!(store.is_attached());
        assert!(!facility.inner.contains(KEY));
    }

    #[test]
    fn drop_with_failing_detach_does_not_panic() {
        let facility = StuckFacility::default();
        {
            let store = SegmentStore::open(facility.clone(), KEY, &StoreConfig::default()).unwrap();
            assert!(store.is_attached());
        }
        // the failed detach is only logged, so the attachment is still counted
        assert_eq!(facility.inner.attach_count(KEY), Some(1));
    }

    #[test]
    fn stats_count_entries() {
        let mut store = create_store();
        store.set("a", &1).unwrap();
        store.set("b", &2).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.capacity, 1024 - shmkv_segment::HEADER_LEN);
    }

    #[test]
    fn debug_shows_state() {
        let store = create_store();
        let text = format!("{store:?}");
        assert!(text.contains("is_attached: true"));
    }
}
