//! Windows-specific memory mapping implementation.

use std::fs::File;
use std::io;
use std::os::windows::io::AsRawHandle;
use std::ptr;

use winapi::shared::basetsd::SIZE_T;
use winapi::shared::minwindef::{DWORD, LPVOID};
use winapi::um::handleapi::CloseHandle;
use winapi::um::memoryapi::{
    CreateFileMappingW, FlushViewOfFile, MapViewOfFile, UnmapViewOfFile, FILE_MAP_READ,
    FILE_MAP_WRITE,
};
use winapi::um::winnt::{PAGE_READONLY, PAGE_READWRITE};

use crate::platform::Advice;
use crate::utils::alignment::page_size;

/// Map a file into memory on Windows.
///
/// # Safety
///
/// This function is unsafe because it creates a memory map that can be accessed
/// and potentially modified, which might lead to undefined behavior if not used
/// correctly.
pub unsafe fn map_file(file: &File, len: usize, writable: bool, populate: bool) -> io::Result<*mut u8> {
    let (page_protection, desired_access) = if writable {
        (PAGE_READWRITE, FILE_MAP_READ | FILE_MAP_WRITE)
    } else {
        (PAGE_READONLY, FILE_MAP_READ)
    };

    let maximum_size_high = ((len as u64) >> 32) as DWORD;
    let maximum_size_low = ((len as u64) & 0xFFFF_FFFF) as DWORD;

    let file_mapping = CreateFileMappingW(
        file.as_raw_handle() as _,
        ptr::null_mut(),
        page_protection,
        maximum_size_high,
        maximum_size_low,
        ptr::null(),
    );
    if file_mapping.is_null() {
        return Err(io::Error::last_os_error());
    }

    let addr = MapViewOfFile(file_mapping, desired_access, 0, 0, len as SIZE_T);

    // The view keeps the section alive on its own.
    CloseHandle(file_mapping);

    if addr.is_null() {
        return Err(io::Error::last_os_error());
    }

    // Touch each page to force it into memory.
    if populate {
        for i in (0..len).step_by(page_size()) {
            ptr::read_volatile((addr as usize + i) as *const u8);
        }
    }

    Ok(addr as *mut u8)
}

/// Flush memory map changes to disk on Windows.
///
/// # Safety
///
/// This function is unsafe because it operates on raw memory.
pub unsafe fn flush(addr: *mut u8, len: usize, _async_flush: bool) -> io::Result<()> {
    // FlushViewOfFile is always synchronous.
    if FlushViewOfFile(addr as LPVOID, len as SIZE_T) != 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Unmap memory on Windows.
///
/// # Safety
///
/// This function is unsafe because it unmaps memory that might still be in use.
pub unsafe fn unmap(addr: *mut u8, _len: usize) -> io::Result<()> {
    if UnmapViewOfFile(addr as LPVOID) != 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Advice is accepted and ignored on Windows.
///
/// # Safety
///
/// This function is unsafe because it operates on raw memory.
pub unsafe fn advise(_addr: *mut u8, _len: usize, _advice: Advice) -> io::Result<()> {
    Ok(())
}
