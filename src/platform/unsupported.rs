//! Fallback for platforms without a memory mapping implementation.

use std::fs::File;
use std::io;

use crate::platform::Advice;

fn unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "memory mapping is not supported on this platform",
    )
}

pub unsafe fn map_file(_file: &File, _len: usize, _writable: bool, _populate: bool) -> io::Result<*mut u8> {
    Err(unsupported())
}

pub unsafe fn flush(_addr: *mut u8, _len: usize, _async_flush: bool) -> io::Result<()> {
    Err(unsupported())
}

pub unsafe fn unmap(_addr: *mut u8, _len: usize) -> io::Result<()> {
    Err(unsupported())
}

pub unsafe fn advise(_addr: *mut u8, _len: usize, _advice: Advice) -> io::Result<()> {
    Ok(())
}
