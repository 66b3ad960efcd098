//! Error handling for column mapping and dataset operations.

use std::io;
use std::path::PathBuf;
use std::result;

/// A specialized `Result` type for dataset operations.
pub type Result<T> = result::Result<T, Error>;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Opening, creating, mapping, writing or resizing a file failed.
    FileIo,

    /// A descriptor or column file is unreadable or malformed.
    Format,

    /// The on-disk descriptor disagrees with the caller's schema.
    SchemaMismatch,

    /// Columns disagree on row count, or the offsets column is inconsistent.
    SizeConsistency,

    /// A row or group index is out of bounds.
    Range,

    /// The caller passed an argument the operation cannot work with.
    InvalidArgument,
}

/// Errors that can occur while mapping columns or working with datasets.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The column file could not be opened.
    #[error("failed to open {path}: {source}")]
    OpenFailed { path: PathBuf, source: io::Error },

    /// The column file could not be mapped into memory.
    #[error("failed to map {path}: {source}")]
    MapFailed { path: PathBuf, source: io::Error },

    /// Any other I/O failure (create, write, truncate, flush).
    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    /// A write or resize was attempted through a read-only mapping.
    #[error("{0} is mapped read-only")]
    ReadOnly(PathBuf),

    /// The file length is not a whole number of elements.
    #[error("{path} is {len} bytes long, which is not a multiple of the {element_size}-byte element size")]
    FileSizeMismatch {
        path: PathBuf,
        len: u64,
        element_size: usize,
    },

    /// The descriptor file is missing or unreadable.
    #[error("failed to read descriptor {path}: {source}")]
    DescriptorRead { path: PathBuf, source: io::Error },

    /// The descriptor file contains a line that cannot be interpreted.
    #[error("malformed descriptor {path}, line {line}: {reason}")]
    MalformedDescriptor {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// The number of columns differs from what the caller expects.
    #[error("column count mismatch: expected {expected} columns, found {found}")]
    ColumnCountMismatch { expected: usize, found: usize },

    /// A column name differs from what the caller expects.
    #[error("column name mismatch at column {column}: expected '{expected}', found '{found}'")]
    ColumnNameMismatch {
        column: usize,
        expected: String,
        found: String,
    },

    /// A column type differs from what the caller expects.
    #[error("type mismatch for column {column}: expected {expected}, found {found}")]
    TypeMismatch {
        column: usize,
        expected: String,
        found: String,
    },

    /// Two adjacent columns hold a different number of rows.
    #[error("column size mismatch between column {left} ({left_rows} rows) and column {right} ({right_rows} rows)")]
    ColumnSizeMismatch {
        left: usize,
        right: usize,
        left_rows: usize,
        right_rows: usize,
    },

    /// The offsets column violates the group-boundary invariant.
    #[error("invalid group offsets: {0}")]
    InvalidOffsets(String),

    /// A checked row access was out of bounds.
    #[error("row {index} is out of range for a dataset of {rows} rows")]
    RowIndexOutOfRange { index: usize, rows: usize },

    /// A group access was out of bounds.
    #[error("group {index} is out of range for a dataset of {groups} groups")]
    GroupIndexOutOfRange { index: usize, groups: usize },

    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::OpenFailed { .. }
            | Error::MapFailed { .. }
            | Error::Io { .. }
            | Error::ReadOnly(_) => ErrorKind::FileIo,
            Error::FileSizeMismatch { .. }
            | Error::DescriptorRead { .. }
            | Error::MalformedDescriptor { .. } => ErrorKind::Format,
            Error::ColumnCountMismatch { .. }
            | Error::ColumnNameMismatch { .. }
            | Error::TypeMismatch { .. } => ErrorKind::SchemaMismatch,
            Error::ColumnSizeMismatch { .. } | Error::InvalidOffsets(_) => {
                ErrorKind::SizeConsistency
            }
            Error::RowIndexOutOfRange { .. } | Error::GroupIndexOutOfRange { .. } => {
                ErrorKind::Range
            }
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Error {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
