//! Memory-mapped column files.
//!
//! A column file is a flat array of fixed-width elements in native byte order,
//! with no header. [`AnyColumn`] maps such a file knowing only its [`DataType`];
//! [`MappedColumn<T>`] is the same column seen through a concrete element type,
//! obtained after one compatibility check.
//!
//! Resizing unmaps and remaps the file. Every slice handed out by a column
//! borrows it, and `resize` takes `&mut self`, so stale views cannot survive a
//! resize within one process. Other processes mapping the same file must be
//! quiesced by the caller.

use std::fs::{File, OpenOptions};
use std::io;
use std::marker::PhantomData;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::slice;

use tracing::{debug, warn};

use crate::columnar::options::{AccessMode, DatasetOptions};
use crate::columnar::types::{DataType, Element, Value};
use crate::error::{Error, Result};
use crate::mmap::{MmapOptions, MmapRaw};
use crate::platform::Advice;
use crate::utils::alignment::{is_aligned, page_size};

/// A column file mapped into memory, typed at runtime.
#[derive(Debug)]
pub struct AnyColumn {
    /// Mapping of the whole file; `None` while the file is empty.
    map: Option<MmapRaw>,

    /// Open handle, kept for resizing.
    file: File,

    path: PathBuf,
    data_type: DataType,
    access: AccessMode,
    populate: bool,

    /// Element count, cached at open and resize.
    len: usize,

    /// Position within the owning dataset, used in error reports.
    position: usize,

    /// Incremented on every resize.
    generation: u64,
}

impl AnyColumn {
    /// Open and map a column file holding elements of `data_type`.
    pub fn open<P: AsRef<Path>>(path: P, data_type: DataType, access: AccessMode) -> Result<Self> {
        Self::open_with(path, data_type, &DatasetOptions::from(access))
    }

    /// Open and map a column file using dataset-level options.
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        data_type: DataType,
        options: &DatasetOptions,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if data_type.size() == 0 {
            return Err(Error::InvalidArgument(format!(
                "zero-width element type for {}",
                path.display()
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(options.access.is_writable())
            .open(&path)
            .map_err(|source| Error::OpenFailed {
                path: path.clone(),
                source,
            })?;
        let byte_len = file
            .metadata()
            .map_err(|source| Error::OpenFailed {
                path: path.clone(),
                source,
            })?
            .len();

        let mut column = AnyColumn {
            map: None,
            file,
            path,
            data_type,
            access: options.access,
            populate: options.populate,
            len: 0,
            position: 0,
            generation: 0,
        };
        column.map_file(byte_len)?;

        if let Some(advice) = options.advice {
            column.advise(advice)?;
        }
        Ok(column)
    }

    /// Map `byte_len` bytes of the open file, replacing any previous mapping.
    fn map_file(&mut self, byte_len: u64) -> Result<()> {
        let element_size = self.data_type.size();
        if byte_len % element_size as u64 != 0 {
            return Err(Error::FileSizeMismatch {
                path: self.path.clone(),
                len: byte_len,
                element_size,
            });
        }
        let byte_len = usize::try_from(byte_len).map_err(|_| Error::MapFailed {
            path: self.path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "file exceeds address space"),
        })?;

        self.map = None;
        self.len = 0;

        // Mapping zero bytes is invalid; an empty column simply has no mapping.
        if byte_len > 0 {
            let map = unsafe {
                MmapOptions::new()
                    .write(self.access.is_writable())
                    .populate(self.populate)
                    .map(&self.file, byte_len)
            }
            .map_err(|source| Error::MapFailed {
                path: self.path.clone(),
                source,
            })?;
            debug_assert!(is_aligned(map.as_ptr() as usize, page_size()));
            self.map = Some(map);
        }
        self.len = byte_len / element_size;
        Ok(())
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the column holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Element type of the column.
    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Path of the backing file.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How the column is mapped.
    #[inline]
    pub fn access_mode(&self) -> AccessMode {
        self.access
    }

    /// Position of the column in its dataset.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    /// Number of resizes performed since open. Raw pointers obtained under an
    /// older generation are dangling.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a mapping currently exists. Empty columns are never mapped.
    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.map.is_some()
    }

    /// Raw bytes of the column.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match &self.map {
            Some(map) => unsafe { slice::from_raw_parts(map.as_ptr(), map.len()) },
            None => &[],
        }
    }

    /// Raw bytes of the column, writable. Requires a read-write mapping.
    pub fn as_bytes_mut(&mut self) -> Result<&mut [u8]> {
        self.ensure_writable()?;
        Ok(match &mut self.map {
            Some(map) => unsafe { slice::from_raw_parts_mut(map.as_mut_ptr(), map.len()) },
            None => Default::default(),
        })
    }

    /// Copy element `index` out as a [`Value`].
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn value(&self, index: usize) -> Value {
        let size = self.data_type.size();
        let start = index * size;
        Value::from_ne_bytes(self.data_type, &self.as_bytes()[start..start + size])
    }

    /// Checked variant of [`AnyColumn::value`].
    pub fn get_value(&self, index: usize) -> Option<Value> {
        (index < self.len).then(|| self.value(index))
    }

    /// Truncate or extend the file to `new_len` elements and remap it.
    ///
    /// Growing the file leaves a hole on filesystems that support sparse files;
    /// the new region reads as zeroes. Requires a read-write mapping.
    pub fn resize(&mut self, new_len: usize) -> Result<()> {
        self.ensure_writable()?;
        let byte_len = new_len
            .checked_mul(self.data_type.size())
            .ok_or_else(|| Error::InvalidArgument(format!("{new_len} elements overflow usize")))?;

        debug!(path = %self.path.display(), from = self.len, to = new_len, "resizing column");

        self.map = None;
        self.len = 0;
        self.generation += 1;

        if let Err(source) = self.file.set_len(byte_len as u64) {
            // Keep the column usable at whatever length the file still has.
            let remapped = self
                .file
                .metadata()
                .map_err(|e| Error::io(&self.path, e))
                .and_then(|metadata| self.map_file(metadata.len()));
            if let Err(error) = remapped {
                warn!(path = %self.path.display(), %error, "failed to remap column after a failed resize");
            }
            return Err(Error::io(&self.path, source));
        }
        self.map_file(byte_len as u64)
    }

    /// Flush a writable mapping to disk. A no-op for read-only or empty columns.
    pub fn flush(&self) -> Result<()> {
        match &self.map {
            Some(map) if map.is_writable() => map.flush().map_err(|e| Error::io(&self.path, e)),
            _ => Ok(()),
        }
    }

    /// Start writing back a writable mapping without waiting for it.
    pub fn flush_async(&self) -> Result<()> {
        match &self.map {
            Some(map) if map.is_writable() => {
                map.flush_async().map_err(|e| Error::io(&self.path, e))
            }
            _ => Ok(()),
        }
    }

    /// Advise the kernel about how the column will be accessed.
    pub fn advise(&self, advice: Advice) -> Result<()> {
        match &self.map {
            Some(map) => map.advise(advice).map_err(|e| Error::io(&self.path, e)),
            None => Ok(()),
        }
    }

    /// View the column as `T`, checking width and kind once.
    pub fn downcast_ref<T: Element>(&self) -> Result<&MappedColumn<T>> {
        self.check_type::<T>()?;
        // Safety: `MappedColumn<T>` is `repr(transparent)` over `AnyColumn`.
        Ok(unsafe { &*(self as *const AnyColumn as *const MappedColumn<T>) })
    }

    /// Mutable variant of [`AnyColumn::downcast_ref`].
    pub fn downcast_mut<T: Element>(&mut self) -> Result<&mut MappedColumn<T>> {
        self.check_type::<T>()?;
        // Safety: `MappedColumn<T>` is `repr(transparent)` over `AnyColumn`.
        Ok(unsafe { &mut *(self as *mut AnyColumn as *mut MappedColumn<T>) })
    }

    /// Convert into a typed column.
    pub fn into_typed<T: Element>(self) -> Result<MappedColumn<T>> {
        self.check_type::<T>()?;
        Ok(MappedColumn {
            inner: self,
            _marker: PhantomData,
        })
    }

    fn check_type<T: Element>(&self) -> Result<()> {
        if T::DATA_TYPE.is_compatible(&self.data_type) {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                column: self.position,
                expected: T::DATA_TYPE.tag(),
                found: self.data_type.tag(),
            })
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.access.is_writable() {
            Ok(())
        } else {
            Err(Error::ReadOnly(self.path.clone()))
        }
    }
}

/// A mapped column with a statically known element type.
///
/// Dereferences to `[T]`, so `column[i]`, `column.get(i)`, `column.iter()` and
/// `unsafe { column.get_unchecked(i) }` all work on the mapped memory directly.
#[repr(transparent)]
#[derive(Debug)]
pub struct MappedColumn<T: Element> {
    inner: AnyColumn,
    _marker: PhantomData<T>,
}

impl<T: Element> MappedColumn<T> {
    /// Open and map a column file of `T`.
    pub fn open<P: AsRef<Path>>(path: P, access: AccessMode) -> Result<Self> {
        AnyColumn::open(path, T::DATA_TYPE, access)?.into_typed()
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len
    }

    /// Whether the column holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// The elements, borrowed from the mapping.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        match &self.inner.map {
            Some(map) => unsafe { slice::from_raw_parts(map.as_ptr() as *const T, self.inner.len) },
            None => &[],
        }
    }

    /// The elements, writable in place. Requires a read-write mapping.
    pub fn as_mut_slice(&mut self) -> Result<&mut [T]> {
        self.inner.ensure_writable()?;
        let len = self.inner.len;
        Ok(match &mut self.inner.map {
            Some(map) => unsafe { slice::from_raw_parts_mut(map.as_mut_ptr() as *mut T, len) },
            None => Default::default(),
        })
    }

    /// Pointer to the first element, dangling when the column is empty.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        match &self.inner.map {
            Some(map) => map.as_ptr() as *const T,
            None => NonNull::<T>::dangling().as_ptr(),
        }
    }

    /// Mutable pointer to the first element. Requires a read-write mapping.
    pub fn as_mut_ptr(&mut self) -> Result<*mut T> {
        self.as_mut_slice().map(|values| values.as_mut_ptr())
    }

    /// Truncate or extend the column to `new_len` elements.
    #[inline]
    pub fn resize(&mut self, new_len: usize) -> Result<()> {
        self.inner.resize(new_len)
    }

    /// Flush a writable mapping to disk.
    #[inline]
    pub fn flush(&self) -> Result<()> {
        self.inner.flush()
    }

    /// Advise the kernel about how the column will be accessed.
    #[inline]
    pub fn advise(&self, advice: Advice) -> Result<()> {
        self.inner.advise(advice)
    }

    /// Number of resizes performed since open.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.inner.generation
    }

    /// Path of the backing file.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// The untyped column.
    #[inline]
    pub fn as_any(&self) -> &AnyColumn {
        &self.inner
    }

    /// Give up the static type.
    #[inline]
    pub fn into_any(self) -> AnyColumn {
        self.inner
    }
}

impl<T: Element> Deref for MappedColumn<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Element> AsRef<[T]> for MappedColumn<T> {
    #[inline]
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn column_file(dir: &Path, values: &[u32]) -> PathBuf {
        let path = dir.join("0.bin");
        std::fs::write(&path, bytemuck::cast_slice::<u32, u8>(values)).unwrap();
        path
    }

    #[test]
    fn maps_existing_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = column_file(dir.path(), &[7, 8, 9]);

        let column = MappedColumn::<u32>::open(&path, AccessMode::ReadOnly).unwrap();
        assert_eq!(column.len(), 3);
        assert_eq!(column[1], 8);
        assert_eq!(column.get(3), None);
        assert_eq!(column.as_slice(), &[7, 8, 9]);
        assert_eq!(column.as_any().value(2), Value::UInt32(9));
    }

    #[test]
    fn empty_file_is_not_mapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = column_file(dir.path(), &[]);

        let column = AnyColumn::open(&path, DataType::Float64, AccessMode::ReadOnly).unwrap();
        assert!(column.is_empty());
        assert!(!column.is_mapped());
        assert!(column.as_bytes().is_empty());
        assert_eq!(column.get_value(0), None);

        let typed = column.into_typed::<f64>().unwrap();
        assert!(typed.as_slice().is_empty());
        assert!(!typed.as_ptr().is_null());
    }

    #[test]
    fn rejects_partial_elements() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.bin");
        std::fs::write(&path, [0u8; 6]).unwrap();

        let err = AnyColumn::open(&path, DataType::UInt32, AccessMode::ReadOnly).unwrap_err();
        assert!(matches!(err, Error::FileSizeMismatch { len: 6, element_size: 4, .. }));
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn missing_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let err = AnyColumn::open(dir.path().join("7.bin"), DataType::UInt8, AccessMode::ReadOnly)
            .unwrap_err();
        assert!(matches!(err, Error::OpenFailed { .. }));
    }

    #[test]
    fn resize_preserves_prefix_and_zero_fills() {
        let dir = tempfile::tempdir().unwrap();
        let path = column_file(dir.path(), &[1, 2, 3, 4]);

        let mut column = MappedColumn::<u32>::open(&path, AccessMode::ReadWrite).unwrap();
        column.resize(8).unwrap();
        assert_eq!(column.generation(), 1);
        assert_eq!(column.as_slice(), &[1, 2, 3, 4, 0, 0, 0, 0]);

        column.as_mut_slice().unwrap()[7] = 42;
        column.flush().unwrap();
        column.resize(2).unwrap();
        assert_eq!(column.as_slice(), &[1, 2]);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8);

        column.resize(0).unwrap();
        assert!(column.is_empty());
        assert!(!column.as_any().is_mapped());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn failed_resize_keeps_column_mapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.bin");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let mut column = MappedColumn::<u8>::open(&path, AccessMode::ReadWrite).unwrap();
        // Past the largest file offset the OS accepts.
        let err = column.resize(1 << 63).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(column.as_slice(), &[1, 2, 3]);
        assert!(column.as_any().is_mapped());
        assert_eq!(column.generation(), 1);
    }

    #[test]
    fn read_only_column_refuses_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = column_file(dir.path(), &[1, 2]);

        let mut column = MappedColumn::<u32>::open(&path, AccessMode::ReadOnly).unwrap();
        assert!(matches!(column.as_mut_slice(), Err(Error::ReadOnly(_))));
        assert!(matches!(column.resize(4), Err(Error::ReadOnly(_))));
        assert_eq!(column.len(), 2);
    }

    #[test]
    fn writes_reach_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = column_file(dir.path(), &[0, 0, 0]);

        {
            let mut column = MappedColumn::<u32>::open(&path, AccessMode::ReadWrite).unwrap();
            column.as_mut_slice().unwrap().copy_from_slice(&[10, 20, 30]);
        }

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytemuck::cast_slice::<u8, u32>(&bytes), &[10, 20, 30]);
    }

    #[test]
    fn downcast_checks_width_and_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.bin");
        std::fs::write(&path, bytemuck::cast_slice::<u64, u8>(&[5, 6])).unwrap();

        let mut column = AnyColumn::open(&path, DataType::UInt64, AccessMode::ReadOnly).unwrap();
        column.set_position(2);
        assert_eq!(column.downcast_ref::<u64>().unwrap()[1], 6);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(column.downcast_ref::<usize>().unwrap()[0], 5);

        let err = column.downcast_ref::<i64>().unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { column: 2, .. }));
        assert!(column.downcast_ref::<f64>().is_err());
        assert!(column.downcast_ref::<u32>().is_err());
    }
}
