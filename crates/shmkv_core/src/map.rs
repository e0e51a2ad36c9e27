//! Map-style access to a segment store.

use crate::error::CoreResult;
use crate::store::SegmentStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shmkv_segment::SegmentFacility;

/// A borrowed, map-flavoured view of a [`SegmentStore`].
///
/// Each method forwards to the store accessor of the same meaning, so the
/// view has exactly the store's semantics and errors.
///
/// | View            | Store                      |
/// |-----------------|----------------------------|
/// | `get`           | [`SegmentStore::get`]      |
/// | `insert`        | [`SegmentStore::set`]      |
/// | `contains_key`  | [`SegmentStore::exists`]   |
/// | `remove`        | [`SegmentStore::delete`]   |
#[derive(Debug)]
pub struct MapView<'a, F: SegmentFacility> {
    store: &'a mut SegmentStore<F>,
}

impl<'a, F: SegmentFacility> MapView<'a, F> {
    pub(crate) fn new(store: &'a mut SegmentStore<F>) -> Self {
        Self { store }
    }

    /// Reads the value under `key`.
    ///
    /// # Errors
    ///
    /// See [`SegmentStore::get`].
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> CoreResult<T> {
        self.store.get(key)
    }

    /// Writes `value` under `key`.
    ///
    /// # Errors
    ///
    /// See [`SegmentStore::set`].
    pub fn insert<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> CoreResult<()> {
        self.store.set(key, value)
    }

    /// Tests whether `key` holds a value.
    ///
    /// # Errors
    ///
    /// See [`SegmentStore::exists`].
    pub fn contains_key(&self, key: &str) -> CoreResult<bool> {
        self.store.exists(key)
    }

    /// Removes the value under `key`.
    ///
    /// # Errors
    ///
    /// See [`SegmentStore::delete`].
    pub fn remove(&mut self, key: &str) -> CoreResult<()> {
        self.store.delete(key)
    }
}
