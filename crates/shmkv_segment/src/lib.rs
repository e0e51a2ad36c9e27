//! # shmkv Segment
//!
//! Shared memory segment facility for shmkv.
//!
//! This crate is the lowest layer of shmkv. It attaches raw memory segments
//! by integer key and lays out a keyed variable table inside each one.
//! Values are **opaque byte strings**; serialization lives in `shmkv_codec`.
//!
//! ## Design Principles
//!
//! - Facilities create, attach, detach and remove segments by key
//! - The variable table format is shared by every facility
//! - No locking: processes attached to one segment are not synchronized
//! - All `unsafe` is confined to the System V facility
//!
//! ## Available Facilities
//!
//! - [`InMemoryFacility`] - Process-local segments for tests
//! - [`SysvFacility`] - System V shared memory (`shmget`/`shmat`), unix only
//!
//! ## Example
//!
//! ```rust
//! use shmkv_segment::{InMemoryFacility, SegmentFacility, SegmentKey};
//!
//! let facility = InMemoryFacility::new();
//! let mut handle = facility.create_or_attach(SegmentKey::new(42), 1024, 0o666).unwrap();
//! facility.put_var(&mut handle, "answer", &[42]).unwrap();
//! assert_eq!(facility.get_var(&handle, "answer").unwrap(), Some(vec![42]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod facility;
mod key;
mod memory;
mod table;

#[cfg(unix)]
#[allow(unsafe_code)]
mod sysv;

pub use error::{DetachError, SegmentError, SegmentResult};
pub use facility::SegmentFacility;
#[cfg(unix)]
pub use key::file_key;
pub use key::SegmentKey;
pub use memory::{InMemoryFacility, MemoryHandle};
#[cfg(unix)]
pub use sysv::{SysvFacility, SysvHandle};
pub use table::{TableStats, VarTable, ENTRY_HEADER_LEN, HEADER_LEN};
