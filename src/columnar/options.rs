//! Options for opening and writing datasets.

use crate::platform::Advice;

/// Default capacity of the per-column write buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// How a column or dataset is mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Shared read-only mapping.
    #[default]
    ReadOnly,

    /// Shared read-write mapping; writes go straight to the file.
    ReadWrite,
}

impl AccessMode {
    /// Whether the mapping allows writes.
    #[inline]
    pub fn is_writable(&self) -> bool {
        matches!(self, AccessMode::ReadWrite)
    }
}

/// Options for opening a dataset.
#[derive(Debug, Clone, Default)]
pub struct DatasetOptions {
    /// Access mode of every column mapping.
    pub access: AccessMode,

    /// Prefault the mappings on open.
    pub populate: bool,

    /// Access pattern hint applied to every mapping on open.
    pub advice: Option<Advice>,
}

impl DatasetOptions {
    /// Read-only, no prefault, no advice.
    #[inline]
    pub fn new() -> DatasetOptions {
        DatasetOptions::default()
    }

    /// Set the access mode.
    #[inline]
    pub fn access(mut self, access: AccessMode) -> DatasetOptions {
        self.access = access;
        self
    }

    /// Prefault the mappings on open.
    #[inline]
    pub fn populate(mut self, populate: bool) -> DatasetOptions {
        self.populate = populate;
        self
    }

    /// Apply an access pattern hint to every mapping.
    #[inline]
    pub fn advice(mut self, advice: Advice) -> DatasetOptions {
        self.advice = Some(advice);
        self
    }
}

impl From<AccessMode> for DatasetOptions {
    fn from(access: AccessMode) -> Self {
        DatasetOptions::new().access(access)
    }
}

/// What a writer does with column files that already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Rewrite the descriptor and truncate every column file.
    #[default]
    Truncate,

    /// Keep existing rows and append after them. The on-disk descriptor must
    /// match the writer's schema.
    Append,
}

/// Options for creating a dataset writer.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Handling of pre-existing column files.
    pub mode: WriteMode,

    /// Capacity of each column's write buffer in bytes.
    pub buffer_capacity: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            mode: WriteMode::Truncate,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl WriterOptions {
    /// Truncating writer with the default buffer capacity.
    #[inline]
    pub fn new() -> WriterOptions {
        WriterOptions::default()
    }

    /// Set the write mode.
    #[inline]
    pub fn mode(mut self, mode: WriteMode) -> WriterOptions {
        self.mode = mode;
        self
    }

    /// Set the per-column buffer capacity.
    #[inline]
    pub fn buffer_capacity(mut self, capacity: usize) -> WriterOptions {
        self.buffer_capacity = capacity;
        self
    }
}
