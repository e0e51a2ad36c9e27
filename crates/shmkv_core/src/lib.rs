//! # shmkv Core
//!
//! A keyed variable store over a single shared memory segment.
//!
//! This crate provides:
//! - [`tokenize`] to derive a stable segment key from a name or file path
//! - [`SegmentStore`], the attach/detach lifecycle and get/set/exists/delete
//! - [`MapView`], map-style sugar over the same four operations
//! - [`StoreConfig`] for the size and permissions of new segments
//!
//! Values are any `serde` type, stored as CBOR. The store does no locking:
//! processes sharing a segment must coordinate writes themselves.
//!
//! ```rust,no_run
//! # #[cfg(unix)]
//! # fn main() -> shmkv_core::CoreResult<()> {
//! use shmkv_core::{tokenize, StoreConfig, SysvStore, SysvFacility};
//!
//! let key = tokenize("/etc/hostname")?;
//! let mut store = SysvStore::open(SysvFacility, key, &StoreConfig::default())?;
//! store.set("hits", &1u64)?;
//! # Ok(())
//! # }
//! # #[cfg(not(unix))]
//! # fn main() {}
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod map;
mod store;
mod token;

pub use config::{StoreConfig, DEFAULT_PERMISSIONS, DEFAULT_SEGMENT_SIZE};
pub use error::{CoreError, CoreResult};
pub use map::MapView;
pub use store::SegmentStore;
pub use token::{digest_key, tokenize, FILE_KEY_PROJ_ID};

pub use shmkv_codec::Value;
pub use shmkv_segment::{
    InMemoryFacility, SegmentError, SegmentFacility, SegmentKey, TableStats, HEADER_LEN,
};
#[cfg(unix)]
pub use shmkv_segment::SysvFacility;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A store over process-local segments.
pub type MemoryStore = SegmentStore<InMemoryFacility>;

/// A store over System V shared memory.
#[cfg(unix)]
pub type SysvStore = SegmentStore<SysvFacility>;
