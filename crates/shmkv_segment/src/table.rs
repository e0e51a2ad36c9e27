//! The variable table stored inside a segment.
//!
//! A segment starts with a fixed header followed by packed entries:
//!
//! ```text
//! header (32 bytes, little endian)
//!   0  magic     u32   "SKV1"
//!   4  version   u16
//!   6  reserved  u16
//!   8  count     u32   number of entries
//!   12 reserved  u32
//!   16 end       u64   bytes used after the header
//!   24 capacity  u64   bytes available after the header
//! entry
//!   name_len u32 | value_len u32 | name bytes | value bytes
//! ```
//!
//! Entries are kept in insertion order. Replacing or removing an entry
//! compacts everything after it, so the used region is always contiguous.
//!
//! The table performs no locking. Another process may rewrite the bytes at
//! any moment, so every offset read from the segment is bounds checked and
//! an inconsistent table is reported as [`SegmentError::Corrupted`].

use crate::error::{SegmentError, SegmentResult};
use std::ops::Range;

/// Magic number identifying a formatted segment ("SKV1").
pub const MAGIC: u32 = u32::from_le_bytes(*b"SKV1");

/// Current table format version.
pub const VERSION: u16 = 1;

/// Size of the table header in bytes; the smallest usable segment.
pub const HEADER_LEN: usize = 32;

/// Size of the per-entry length prefix.
pub const ENTRY_HEADER_LEN: usize = 8;

const COUNT_OFFSET: usize = 8;
const END_OFFSET: usize = 16;
const CAPACITY_OFFSET: usize = 24;

/// Usage statistics of a variable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    /// Number of stored variables.
    pub entries: u32,
    /// Bytes occupied by entries.
    pub used: usize,
    /// Bytes available for entries in total.
    pub capacity: usize,
}

impl TableStats {
    /// Bytes still free for new entries.
    #[must_use]
    pub fn free(&self) -> usize {
        self.capacity.saturating_sub(self.used)
    }
}

#[derive(Debug, Clone, Copy)]
struct Header {
    count: u32,
    end: usize,
    capacity: usize,
}

#[derive(Debug, Clone)]
struct Slot {
    start: usize,
    name: Range<usize>,
    value: Range<usize>,
}

impl Slot {
    fn end(&self) -> usize {
        self.value.end
    }

    fn len(&self) -> usize {
        self.value.end - self.start
    }
}

/// A keyed table of serialized values laid out in a byte buffer.
///
/// `B` is the segment memory: a `&[u8]` is enough for lookups, mutation
/// needs `&mut [u8]` (or any `AsMut<[u8]>`).
#[derive(Debug)]
pub struct VarTable<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> VarTable<B> {
    /// Opens a formatted table, validating its header.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::TooSmall`] if the buffer cannot hold a header,
    /// [`SegmentError::Foreign`] if the magic does not match, and
    /// [`SegmentError::Corrupted`] if the header is inconsistent.
    pub fn open(buf: B) -> SegmentResult<Self> {
        let table = Self { buf };
        table.header()?;
        Ok(table)
    }

    /// Returns the value stored under `name`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is corrupted.
    pub fn get(&self, name: &str) -> SegmentResult<Option<Vec<u8>>> {
        let header = self.header()?;
        let slot = self.find(&header, name)?;
        Ok(slot.map(|slot| self.buf.as_ref()[slot.value].to_vec()))
    }

    /// Returns `true` if `name` is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is corrupted.
    pub fn contains(&self, name: &str) -> SegmentResult<bool> {
        let header = self.header()?;
        Ok(self.find(&header, name)?.is_some())
    }

    /// Returns usage statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is invalid.
    pub fn stats(&self) -> SegmentResult<TableStats> {
        let header = self.header()?;
        Ok(TableStats {
            entries: header.count,
            used: header.end,
            capacity: header.capacity,
        })
    }

    /// Consumes the table and returns the underlying buffer.
    pub fn into_inner(self) -> B {
        self.buf
    }

    fn header(&self) -> SegmentResult<Header> {
        let buf = self.buf.as_ref();
        if buf.len() < HEADER_LEN {
            return Err(SegmentError::TooSmall {
                size: buf.len(),
                min: HEADER_LEN,
            });
        }

        let magic = read_u32(buf, 0)?;
        if magic != MAGIC {
            return Err(SegmentError::Foreign { found: magic });
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version != VERSION {
            return Err(SegmentError::corrupted(format!(
                "unsupported table version {version}"
            )));
        }

        let count = read_u32(buf, COUNT_OFFSET)?;
        let end = read_len(buf, END_OFFSET)?;
        let capacity = read_len(buf, CAPACITY_OFFSET)?;

        if capacity > buf.len() - HEADER_LEN {
            return Err(SegmentError::corrupted(format!(
                "capacity {capacity} exceeds segment size {}",
                buf.len()
            )));
        }
        if end > capacity {
            return Err(SegmentError::corrupted(format!(
                "used bytes {end} exceed capacity {capacity}"
            )));
        }

        Ok(Header {
            count,
            end,
            capacity,
        })
    }

    fn find(&self, header: &Header, name: &str) -> SegmentResult<Option<Slot>> {
        let buf = self.buf.as_ref();
        let limit = HEADER_LEN + header.end;
        let mut at = HEADER_LEN;

        for _ in 0..header.count {
            let slot = slot_at(buf, at, limit)?;
            if &buf[slot.name.clone()] == name.as_bytes() {
                return Ok(Some(slot));
            }
            at = slot.end();
        }

        if at != limit {
            return Err(SegmentError::corrupted(format!(
                "{} entries end at {}, header says {}",
                header.count,
                at - HEADER_LEN,
                header.end
            )));
        }
        Ok(None)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> VarTable<B> {
    /// Writes an empty table header over the start of `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::TooSmall`] if the buffer cannot hold a header.
    pub fn format(mut buf: B) -> SegmentResult<Self> {
        let bytes = buf.as_mut();
        if bytes.len() < HEADER_LEN {
            return Err(SegmentError::TooSmall {
                size: bytes.len(),
                min: HEADER_LEN,
            });
        }

        let capacity = (bytes.len() - HEADER_LEN) as u64;
        bytes[..HEADER_LEN].fill(0);
        bytes[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        bytes[4..6].copy_from_slice(&VERSION.to_le_bytes());
        bytes[CAPACITY_OFFSET..CAPACITY_OFFSET + 8].copy_from_slice(&capacity.to_le_bytes());

        Ok(Self { buf })
    }

    /// Opens the table, formatting it first if the header is all zeroes.
    ///
    /// Freshly created segments are zero filled, so this is the attach path.
    ///
    /// # Errors
    ///
    /// See [`VarTable::open`].
    pub fn open_or_format(buf: B) -> SegmentResult<Self> {
        let bytes = buf.as_ref();
        if bytes.len() >= HEADER_LEN && bytes[..HEADER_LEN].iter().all(|b| *b == 0) {
            Self::format(buf)
        } else {
            Self::open(buf)
        }
    }

    /// Stores `value` under `name`, replacing any previous value.
    ///
    /// If the new entry does not fit, the table is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::Full`] if there is not enough space,
    /// [`SegmentError::EntryTooLarge`] if a length does not fit the format,
    /// or a corruption error.
    pub fn put(&mut self, name: &str, value: &[u8]) -> SegmentResult<()> {
        let name_len = encode_len(name.len())?;
        let value_len = encode_len(value.len())?;
        let needed = ENTRY_HEADER_LEN
            .checked_add(name.len())
            .and_then(|n| n.checked_add(value.len()))
            .ok_or(SegmentError::EntryTooLarge { len: usize::MAX })?;

        let header = self.header()?;
        let existing = self.find(&header, name)?;
        let reclaimed = existing.as_ref().map_or(0, Slot::len);
        let available = header.capacity - header.end + reclaimed;
        if needed > available {
            return Err(SegmentError::Full { needed, available });
        }

        let mut count = header.count;
        let mut end = header.end;
        if let Some(slot) = existing {
            self.cut(&slot, HEADER_LEN + end);
            end -= slot.len();
            count -= 1;
        }

        let buf = self.buf.as_mut();
        let at = HEADER_LEN + end;
        buf[at..at + 4].copy_from_slice(&name_len.to_le_bytes());
        buf[at + 4..at + 8].copy_from_slice(&value_len.to_le_bytes());
        let name_at = at + ENTRY_HEADER_LEN;
        buf[name_at..name_at + name.len()].copy_from_slice(name.as_bytes());
        let value_at = name_at + name.len();
        buf[value_at..value_at + value.len()].copy_from_slice(value);

        self.write_header(count + 1, end + needed);
        Ok(())
    }

    /// Removes the entry stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::VarNotFound`] if there is no such entry.
    pub fn remove(&mut self, name: &str) -> SegmentResult<()> {
        let header = self.header()?;
        let slot = self
            .find(&header, name)?
            .ok_or_else(|| SegmentError::var_not_found(name))?;

        self.cut(&slot, HEADER_LEN + header.end);
        self.write_header(header.count - 1, header.end - slot.len());
        Ok(())
    }

    /// Shifts everything after `slot` down over it.
    fn cut(&mut self, slot: &Slot, data_end: usize) {
        self.buf
            .as_mut()
            .copy_within(slot.end()..data_end, slot.start);
    }

    fn write_header(&mut self, count: u32, end: usize) {
        let buf = self.buf.as_mut();
        buf[COUNT_OFFSET..COUNT_OFFSET + 4].copy_from_slice(&count.to_le_bytes());
        buf[END_OFFSET..END_OFFSET + 8].copy_from_slice(&(end as u64).to_le_bytes());
    }
}

fn slot_at(buf: &[u8], start: usize, limit: usize) -> SegmentResult<Slot> {
    if start + ENTRY_HEADER_LEN > limit {
        return Err(SegmentError::corrupted(format!(
            "entry header at {start} runs past used region"
        )));
    }

    let name_len = read_u32(buf, start)? as usize;
    let value_len = read_u32(buf, start + 4)? as usize;
    let name_start = start + ENTRY_HEADER_LEN;
    let value_start = name_start + name_len;
    let value_end = value_start
        .checked_add(value_len)
        .filter(|end| *end <= limit)
        .ok_or_else(|| {
            SegmentError::corrupted(format!("entry at {start} runs past used region"))
        })?;

    Ok(Slot {
        start,
        name: name_start..value_start,
        value: value_start..value_end,
    })
}

fn read_u32(buf: &[u8], at: usize) -> SegmentResult<u32> {
    buf.get(at..at + 4)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| SegmentError::corrupted(format!("truncated field at {at}")))
}

fn read_len(buf: &[u8], at: usize) -> SegmentResult<usize> {
    let raw = buf
        .get(at..at + 8)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| SegmentError::corrupted(format!("truncated field at {at}")))?;
    usize::try_from(raw).map_err(|_| SegmentError::corrupted(format!("length {raw} overflows")))
}

fn encode_len(len: usize) -> SegmentResult<u32> {
    u32::try_from(len).map_err(|_| SegmentError::EntryTooLarge { len })
}
