//! System V shared memory facility.
//!
//! ```text
//! create_or_attach    shmget(key, 0, 0)
//!                       └─ ENOENT → shmget(key, size, IPC_CREAT|IPC_EXCL|perm)
//!                                     └─ EEXIST → shmget(key, 0, 0)
//!                     shmctl(IPC_STAT)   real segment size
//!                     shmat              map into this process
//! detach              shmdt
//! remove_segment      shmctl(IPC_RMID)
//! ```
//!
//! The variable table is read and written in place. Nothing serializes
//! access between processes attached to the same key.

use crate::error::{DetachError, SegmentError, SegmentResult};
use crate::facility::SegmentFacility;
use crate::key::SegmentKey;
use crate::table::{TableStats, VarTable, HEADER_LEN};
use std::io;
use std::ptr::{self, NonNull};

/// Segment facility backed by `shmget`/`shmat`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysvFacility;

/// Handle to a segment mapped with `shmat`.
#[derive(Debug)]
pub struct SysvHandle {
    key: SegmentKey,
    shmid: libc::c_int,
    addr: NonNull<u8>,
    len: usize,
}

// SAFETY: the mapping belongs to the process, not to the attaching thread.
unsafe impl Send for SysvHandle {}

impl SysvHandle {
    /// The key the segment was attached with.
    #[must_use]
    pub fn key(&self) -> SegmentKey {
        self.key
    }

    /// The kernel segment identifier returned by `shmget`.
    #[must_use]
    pub fn shmid(&self) -> i32 {
        self.shmid
    }

    /// Size of the mapped segment in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.len
    }

    fn bytes(&self) -> &[u8] {
        // SAFETY: addr..addr+len is the live shmat mapping. shmdt only happens
        // in SegmentFacility::detach, which consumes the handle.
        unsafe { std::slice::from_raw_parts(self.addr.as_ptr(), self.len) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as in `bytes`; `&mut self` excludes other views from this
        // handle. Other processes may still write the same memory.
        unsafe { std::slice::from_raw_parts_mut(self.addr.as_ptr(), self.len) }
    }
}

impl SysvFacility {
    /// Creates the facility.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn lookup_or_create(key: SegmentKey, size: usize, permissions: u32) -> SegmentResult<libc::c_int> {
        let mode = (permissions & 0o777) as libc::c_int;

        if key.is_private() {
            check_size(size)?;
            return shmget(key, size, libc::IPC_CREAT | mode);
        }

        match shmget(key, 0, 0) {
            Err(e) if e.raw_os_error() == Some(libc::ENOENT) => {}
            found => return found,
        }

        check_size(size)?;
        match shmget(key, size, libc::IPC_CREAT | libc::IPC_EXCL | mode) {
            // another process created it between the two calls
            Err(e) if e.raw_os_error() == Some(libc::EEXIST) => shmget(key, 0, 0),
            created => created,
        }
    }

    fn segment_size(shmid: libc::c_int) -> SegmentResult<usize> {
        // SAFETY: shmid_ds is plain old data; IPC_STAT fills it in.
        let mut ds: libc::shmid_ds = unsafe { std::mem::zeroed() };
        // SAFETY: `ds` is a valid, writable shmid_ds.
        let rc = unsafe { libc::shmctl(shmid, libc::IPC_STAT, &mut ds) };
        if rc < 0 {
            return Err(SegmentError::last_os_error("shmctl(IPC_STAT)"));
        }
        Ok(ds.shm_segsz as usize)
    }
}

fn check_size(size: usize) -> SegmentResult<()> {
    if size < HEADER_LEN {
        return Err(SegmentError::TooSmall {
            size,
            min: HEADER_LEN,
        });
    }
    Ok(())
}

fn shmget(key: SegmentKey, size: usize, flags: libc::c_int) -> SegmentResult<libc::c_int> {
    // SAFETY: shmget takes no pointers.
    let shmid = unsafe { libc::shmget(key.as_raw(), size, flags) };
    if shmid < 0 {
        return Err(SegmentError::last_os_error("shmget"));
    }
    Ok(shmid)
}

impl SegmentFacility for SysvFacility {
    type Handle = SysvHandle;

    fn create_or_attach(
        &self,
        key: SegmentKey,
        size: usize,
        permissions: u32,
    ) -> SegmentResult<SysvHandle> {
        let shmid = Self::lookup_or_create(key, size, permissions)?;
        let len = Self::segment_size(shmid)?;

        // SAFETY: a null address lets the kernel pick the mapping location.
        let raw = unsafe { libc::shmat(shmid, ptr::null(), 0) };
        if raw as isize == -1 {
            return Err(SegmentError::last_os_error("shmat"));
        }
        let addr = NonNull::new(raw.cast::<u8>()).ok_or_else(|| SegmentError::Os {
            op: "shmat",
            source: io::Error::new(io::ErrorKind::Other, "null mapping address"),
        })?;

        let mut handle = SysvHandle {
            key,
            shmid,
            addr,
            len,
        };
        let formatted = VarTable::open_or_format(handle.bytes_mut()).map(drop);
        if let Err(e) = formatted {
            // a handle that fails to detach here stays mapped until exit
            let _ = self.detach(handle);
            return Err(e);
        }
        Ok(handle)
    }

    fn detach(&self, handle: SysvHandle) -> Result<(), DetachError<SysvHandle>> {
        // SAFETY: addr came from shmat, and owning the handle means no
        // earlier detach consumed it.
        let rc = unsafe { libc::shmdt(handle.addr.as_ptr().cast()) };
        if rc < 0 {
            return Err(DetachError::new(handle, SegmentError::last_os_error("shmdt")));
        }
        Ok(())
    }

    fn remove_segment(&self, handle: &SysvHandle) -> SegmentResult<()> {
        // SAFETY: IPC_RMID ignores the buffer argument.
        let rc = unsafe { libc::shmctl(handle.shmid, libc::IPC_RMID, ptr::null_mut()) };
        if rc < 0 {
            return Err(SegmentError::last_os_error("shmctl(IPC_RMID)"));
        }
        Ok(())
    }

    fn put_var(&self, handle: &mut SysvHandle, name: &str, value: &[u8]) -> SegmentResult<()> {
        VarTable::open(handle.bytes_mut())?.put(name, value)
    }

    fn get_var(&self, handle: &SysvHandle, name: &str) -> SegmentResult<Option<Vec<u8>>> {
        VarTable::open(handle.bytes())?.get(name)
    }

    fn remove_var(&self, handle: &mut SysvHandle, name: &str) -> SegmentResult<()> {
        VarTable::open(handle.bytes_mut())?.remove(name)
    }

    fn stats(&self, handle: &SysvHandle) -> SegmentResult<TableStats> {
        VarTable::open(handle.bytes())?.stats()
    }
}
