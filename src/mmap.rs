//! Core memory mapping functionality.
//!
//! Columns never map anonymous memory or partial windows of a file: a mapping
//! always covers a whole column file and is replaced as a unit on resize. This
//! module provides that primitive on top of the platform layer.

use std::fs::File;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use crate::platform::{self, Advice};

/// Statistics for memory mapping operations
static TOTAL_MAPPED_MEMORY: AtomicUsize = AtomicUsize::new(0);
static ACTIVE_MAPPINGS: AtomicUsize = AtomicUsize::new(0);

/// Configuration options for memory mapping a file.
#[derive(Debug, Clone, Default)]
pub struct MmapOptions {
    /// Whether the memory map should be writable (shared with the file).
    pub writable: bool,

    /// Whether to populate (prefault) the map.
    pub populate: bool,
}

impl MmapOptions {
    /// Create a new set of options for configuring memory maps.
    #[inline]
    pub fn new() -> MmapOptions {
        MmapOptions::default()
    }

    /// Configure the memory map to be writable.
    #[inline]
    pub fn write(mut self, writable: bool) -> MmapOptions {
        self.writable = writable;
        self
    }

    /// Configure the memory map to be pre-populated (prefaulted).
    #[inline]
    pub fn populate(mut self, populate: bool) -> MmapOptions {
        self.populate = populate;
        self
    }

    /// Map the first `len` bytes of `file`.
    ///
    /// `len` must be non-zero and must not exceed the file length.
    ///
    /// # Safety
    ///
    /// The mapping aliases the file. If another process truncates the file while
    /// it is mapped, touching the truncated region raises `SIGBUS`.
    pub unsafe fn map(&self, file: &File, len: usize) -> io::Result<MmapRaw> {
        if len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "memory map size cannot be zero",
            ));
        }

        let ptr = platform::map_file(file, len, self.writable, self.populate)?;

        TOTAL_MAPPED_MEMORY.fetch_add(len, Ordering::Relaxed);
        ACTIVE_MAPPINGS.fetch_add(1, Ordering::Relaxed);
        trace!(len, writable = self.writable, "mapped region");

        Ok(MmapRaw {
            ptr,
            len,
            writable: self.writable,
        })
    }
}

/// Raw memory map handle. Unmaps on drop.
#[derive(Debug)]
pub struct MmapRaw {
    /// Pointer to the mapped memory.
    pub(crate) ptr: *mut u8,

    /// Length of the mapped memory.
    pub(crate) len: usize,

    writable: bool,
}

// The region is plain shared memory; synchronisation of writes through it is
// the caller's responsibility, exactly as for the file itself.
unsafe impl Send for MmapRaw {}
unsafe impl Sync for MmapRaw {}

impl MmapRaw {
    /// Return the length of the memory map.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Return true if the memory map is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the region was mapped writable.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Return a pointer to the memory map.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    /// Return a mutable pointer to the memory map.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr
    }

    /// Flush the memory map to disk.
    ///
    /// This function will flush the entire memory map to disk, ensuring that all
    /// changes are persisted.
    #[inline]
    pub fn flush(&self) -> io::Result<()> {
        unsafe { platform::flush(self.ptr, self.len, false) }
    }

    /// Flush the memory map to disk asynchronously.
    #[inline]
    pub fn flush_async(&self) -> io::Result<()> {
        unsafe { platform::flush(self.ptr, self.len, true) }
    }

    /// Advise the kernel about how the memory map will be accessed.
    #[inline]
    pub fn advise(&self, advice: Advice) -> io::Result<()> {
        unsafe { platform::advise(self.ptr, self.len, advice) }
    }
}

impl Drop for MmapRaw {
    fn drop(&mut self) {
        if self.ptr.is_null() {
            return;
        }
        ACTIVE_MAPPINGS.fetch_sub(1, Ordering::Relaxed);
        TOTAL_MAPPED_MEMORY.fetch_sub(self.len, Ordering::Relaxed);
        trace!(len = self.len, "unmapping region");

        // Safety: the region was produced by `platform::map_file` with this length
        // and no borrow of it can outlive `self`.
        let _ = unsafe { platform::unmap(self.ptr, self.len) };
    }
}

/// Get the total amount of memory currently mapped.
#[inline]
pub fn total_mapped_memory() -> usize {
    TOTAL_MAPPED_MEMORY.load(Ordering::Relaxed)
}

/// Get the number of active memory mappings.
#[inline]
pub fn active_mappings() -> usize {
    ACTIVE_MAPPINGS.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn maps_file_contents() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"columnar").unwrap();
        file.sync_all().unwrap();

        let map = unsafe { MmapOptions::new().map(&file, 8).unwrap() };
        let bytes = unsafe { std::slice::from_raw_parts(map.as_ptr(), map.len()) };
        assert_eq!(bytes, b"columnar");
        assert!(!map.is_writable());
    }

    #[test]
    fn writable_map_reaches_file() {
        use std::io::{Read, Seek, SeekFrom};

        let mut file = tempfile::tempfile().unwrap();
        file.set_len(4).unwrap();

        {
            let mut map = unsafe { MmapOptions::new().write(true).map(&file, 4).unwrap() };
            let bytes = unsafe { std::slice::from_raw_parts_mut(map.as_mut_ptr(), 4) };
            bytes.copy_from_slice(b"abcd");
            map.flush().unwrap();
        }

        let mut contents = Vec::new();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"abcd");
    }

    #[test]
    fn zero_length_is_rejected() {
        let file = tempfile::tempfile().unwrap();
        let err = unsafe { MmapOptions::new().map(&file, 0) }.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
