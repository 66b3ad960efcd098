//! Columnar datasets built on top of the memory mapping layer.
//!
//! A dataset is a directory holding a text descriptor and one flat binary file
//! per column. Columns are mapped whole and accessed as slices; writers append
//! to the files sequentially. Indexed datasets add an offsets column that splits
//! the rows into variable-length groups.

pub mod column;
pub mod dataset;
pub mod index;
pub mod options;
pub mod record;
pub mod schema;
pub mod types;
pub mod writer;

pub use column::{AnyColumn, MappedColumn};
pub use dataset::{Dataset, RecordIter, Records, Rows};
pub use index::{Group, Groups, IndexedDataset, IndexedWriter, OFFSETS_COLUMN, OFFSETS_DIR};
pub use options::{AccessMode, DatasetOptions, WriteMode, WriterOptions};
pub use record::{ColumnSlices, Record};
pub use schema::{parse_descriptor, Descriptor, DescriptorEntry, Field, Schema, DESCRIPTOR_FILE};
pub use types::{DataType, Element, ElementKind, Row, Value};
pub use writer::{append_column, ColumnSink, DatasetWriter};
