//! # colmap
//!
//! `colmap` stores tables as directories of flat binary column files and maps
//! them straight into memory. Reads are zero-copy slices over the mapping;
//! read-write mappings allow in-place updates, and whole datasets can be grown
//! or shrunk by resizing their files.
//!
//! ## Layout
//!
//! - `<dir>/schema.txt` lists one `"<type_tag> <name>"` line per column.
//! - `<dir>/0.bin`, `<dir>/1.bin`, ... hold the raw native-endian elements.
//! - Indexed datasets add `<dir>/index/`, a one-column dataset of `uint64`
//!   group offsets.
//!
//! ## Example
//!
//! ```
//! use colmap::{AccessMode, Dataset, Schema};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempfile::tempdir()?;
//! let schema = Schema::of::<(u32, f64)>(&["id", "score"])?;
//!
//! let mut writer = schema.create_writer(dir.path())?;
//! for id in 0..10u32 {
//!     writer.write_record(&(id, f64::from(id) * 0.5))?;
//! }
//! writer.finish()?;
//!
//! let dataset = Dataset::open(dir.path(), &schema, AccessMode::ReadOnly)?;
//! let ids = dataset.column_as::<u32>(0)?;
//! assert_eq!(ids[3], 3);
//!
//! let records = dataset.records::<(u32, f64)>()?;
//! assert_eq!(records.row(4), (4, 2.0));
//! # Ok(())
//! # }
//! ```

pub mod columnar;
pub mod error;
pub mod mmap;
pub mod platform;
pub mod utils;

pub use columnar::{
    append_column, AccessMode, AnyColumn, ColumnSlices, DataType, Dataset, DatasetOptions,
    DatasetWriter, Element, Field, Group, IndexedDataset, IndexedWriter, MappedColumn, Record,
    Row, Schema, Value, WriteMode, WriterOptions,
};
pub use error::{Error, ErrorKind, Result};
pub use mmap::{active_mappings, total_mapped_memory, MmapOptions, MmapRaw};
pub use platform::Advice;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
