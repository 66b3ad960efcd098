//! Platform-specific memory mapping implementations.
//!
//! This module provides platform-specific implementations of memory mapping
//! operations for Linux, macOS, and Windows.

use std::fs::File;
use std::io;

/// Memory access advice for the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advice {
    /// Normal access pattern.
    Normal,

    /// Random access pattern.
    Random,

    /// Sequential access pattern.
    Sequential,

    /// Will need soon.
    WillNeed,

    /// Don't need anymore.
    DontNeed,
}

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(windows)]
mod windows;

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
mod unsupported;

// Platform-agnostic functions that delegate to platform-specific implementations

/// Map the first `len` bytes of a file into memory, shared with the file.
///
/// # Safety
///
/// The returned region aliases the file; the caller owns it and must release it
/// with [`unmap`] using the same length.
pub unsafe fn map_file(file: &File, len: usize, writable: bool, populate: bool) -> io::Result<*mut u8> {
    #[cfg(target_os = "linux")]
    return linux::map_file(file, len, writable, populate);

    #[cfg(target_os = "macos")]
    return macos::map_file(file, len, writable, populate);

    #[cfg(windows)]
    return windows::map_file(file, len, writable, populate);

    #[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
    return unsupported::map_file(file, len, writable, populate);
}

/// Flush memory map changes to disk.
///
/// # Safety
///
/// This function is unsafe because it operates on raw memory.
pub unsafe fn flush(addr: *mut u8, len: usize, async_flush: bool) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    return linux::flush(addr, len, async_flush);

    #[cfg(target_os = "macos")]
    return macos::flush(addr, len, async_flush);

    #[cfg(windows)]
    return windows::flush(addr, len, async_flush);

    #[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
    return unsupported::flush(addr, len, async_flush);
}

/// Unmap memory.
///
/// # Safety
///
/// This function is unsafe because it unmaps memory that might still be in use.
pub unsafe fn unmap(addr: *mut u8, len: usize) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    return linux::unmap(addr, len);

    #[cfg(target_os = "macos")]
    return macos::unmap(addr, len);

    #[cfg(windows)]
    return windows::unmap(addr, len);

    #[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
    return unsupported::unmap(addr, len);
}

/// Advise the kernel about how the memory map will be accessed.
///
/// # Safety
///
/// This function is unsafe because it operates on raw memory.
pub unsafe fn advise(addr: *mut u8, len: usize, advice: Advice) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    return linux::advise(addr, len, advice);

    #[cfg(target_os = "macos")]
    return macos::advise(addr, len, advice);

    #[cfg(windows)]
    return windows::advise(addr, len, advice);

    #[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
    return unsupported::advise(addr, len, advice);
}
