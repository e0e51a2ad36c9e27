//! Lifecycle and sharing tests over the in-memory facility.

use serde::{Deserialize, Serialize};
use shmkv_core::{
    tokenize, CoreError, InMemoryFacility, MemoryStore, SegmentStore, StoreConfig, HEADER_LEN,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Bar {
    asd: Vec<i32>,
}

fn open(facility: &InMemoryFacility, name: &str) -> MemoryStore {
    SegmentStore::open(facility.clone(), tokenize(name).unwrap(), &StoreConfig::default()).unwrap()
}

#[test]
fn end_to_end_scenario() {
    let facility = InMemoryFacility::new();
    let key = tokenize("example-key").unwrap();
    let config = StoreConfig::new().size(1024).permissions(0o666);
    let mut store = SegmentStore::open(facility.clone(), key, &config).unwrap();

    store.set("count", &42).unwrap();
    assert_eq!(store.get::<i32>("count").unwrap(), 42);
    store.delete("count").unwrap();
    assert!(!store.exists("count").unwrap());

    store.remove().unwrap();
    assert!(!store.is_attached());
    assert!(!facility.contains(key));
}

#[test]
fn siblings_share_variables() {
    let facility = InMemoryFacility::new();
    let mut writer = open(&facility, "shared-segment");
    let reader = open(&facility, "shared-segment");

    let bar = Bar { asd: vec![1, 2, 3] };
    writer.set("bar", &bar).unwrap();
    assert_eq!(reader.get::<Bar>("bar").unwrap(), bar);

    writer.delete("bar").unwrap();
    assert!(!reader.exists("bar").unwrap());
}

#[test]
fn detached_store_leaves_segment_for_others() {
    let facility = InMemoryFacility::new();
    let mut first = open(&facility, "persisting");
    first.set("k", "v").unwrap();
    drop(first);

    let second = open(&facility, "persisting");
    assert_eq!(second.get::<String>("k").unwrap(), "v");
}

#[test]
fn remove_is_visible_to_new_attachers_only() {
    let facility = InMemoryFacility::new();
    let mut remover = open(&facility, "doomed");
    let survivor = open(&facility, "doomed");
    remover.set("k", &1).unwrap();

    remover.remove().unwrap();

    // still mapped by the survivor
    assert_eq!(survivor.get::<i32>("k").unwrap(), 1);

    let newcomer = open(&facility, "doomed");
    assert!(matches!(
        newcomer.get::<i32>("k"),
        Err(CoreError::KeyNotFound { .. })
    ));
}

#[test]
fn existing_segment_ignores_new_size() {
    let facility = InMemoryFacility::new();
    let key = tokenize("sized").unwrap();
    let _small = SegmentStore::open(facility.clone(), key, &StoreConfig::new().size(128)).unwrap();
    let big = SegmentStore::open(facility.clone(), key, &StoreConfig::new().size(8192)).unwrap();

    assert_eq!(big.stats().unwrap().capacity, 128 - HEADER_LEN);
}

#[test]
fn dynamic_values_read_back() {
    let facility = InMemoryFacility::new();
    let mut store = open(&facility, "dynamic");
    store.set("bar", &Bar { asd: vec![4] }).unwrap();

    let value: shmkv_core::Value = store.get("bar").unwrap();
    assert!(value.is_map());
}
