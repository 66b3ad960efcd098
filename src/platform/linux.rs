//! Linux-specific memory mapping implementation.

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;
use std::ptr;

use libc::{
    c_void, mmap, munmap, msync, madvise, PROT_READ, PROT_WRITE, MAP_SHARED, MAP_POPULATE,
    MS_ASYNC, MS_SYNC, MADV_NORMAL, MADV_RANDOM, MADV_SEQUENTIAL, MADV_WILLNEED, MADV_DONTNEED,
};

use crate::platform::Advice;

/// Map a file into memory on Linux.
///
/// # Safety
///
/// This function is unsafe because it creates a memory map that can be accessed
/// and potentially modified, which might lead to undefined behavior if not used
/// correctly.
pub unsafe fn map_file(file: &File, len: usize, writable: bool, populate: bool) -> io::Result<*mut u8> {
    let mut prot = PROT_READ;
    if writable {
        prot |= PROT_WRITE;
    }

    // Writes must reach the file, so the mapping is always shared.
    let mut flags = MAP_SHARED;
    if populate {
        flags |= MAP_POPULATE;
    }

    let addr = mmap(ptr::null_mut(), len, prot, flags, file.as_raw_fd(), 0);
    if addr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }

    Ok(addr as *mut u8)
}

/// Flush memory map changes to disk on Linux.
///
/// # Safety
///
/// This function is unsafe because it operates on raw memory.
pub unsafe fn flush(addr: *mut u8, len: usize, async_flush: bool) -> io::Result<()> {
    let flags = if async_flush { MS_ASYNC } else { MS_SYNC };

    if msync(addr as *mut c_void, len, flags) == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Unmap memory on Linux.
///
/// # Safety
///
/// This function is unsafe because it unmaps memory that might still be in use.
pub unsafe fn unmap(addr: *mut u8, len: usize) -> io::Result<()> {
    if munmap(addr as *mut c_void, len) == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Advise the kernel about how the memory map will be accessed on Linux.
///
/// # Safety
///
/// This function is unsafe because it operates on raw memory.
pub unsafe fn advise(addr: *mut u8, len: usize, advice: Advice) -> io::Result<()> {
    let advice_flag = match advice {
        Advice::Normal => MADV_NORMAL,
        Advice::Random => MADV_RANDOM,
        Advice::Sequential => MADV_SEQUENTIAL,
        Advice::WillNeed => MADV_WILLNEED,
        Advice::DontNeed => MADV_DONTNEED,
    };

    if madvise(addr as *mut c_void, len, advice_flag) == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
