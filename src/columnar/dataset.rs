//! Datasets: aligned columns opened from one directory.

use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::columnar::column::{AnyColumn, MappedColumn};
use crate::columnar::options::{AccessMode, DatasetOptions};
use crate::columnar::record::Record;
use crate::columnar::schema::{column_path, parse_descriptor, Schema, DESCRIPTOR_FILE};
use crate::columnar::types::{Element, Row};
use crate::columnar::writer::DatasetWriter;
use crate::error::{Error, Result};
use crate::platform::Advice;

/// A set of mapped columns sharing one row count.
///
/// Opening verifies the on-disk descriptor against the caller's schema and
/// checks that every column holds the same number of rows. Nothing is returned
/// on failure; columns mapped before the failing step are unmapped again.
#[derive(Debug)]
pub struct Dataset {
    path: PathBuf,
    schema: Schema,
    columns: Vec<AnyColumn>,
    access: AccessMode,
}

impl Dataset {
    /// Open the dataset in `dir`, checking it against `schema`.
    pub fn open<P: AsRef<Path>>(dir: P, schema: &Schema, access: AccessMode) -> Result<Self> {
        Self::open_with(dir, schema, &DatasetOptions::from(access))
    }

    /// Open the dataset in `dir` with explicit mapping options.
    pub fn open_with<P: AsRef<Path>>(
        dir: P,
        schema: &Schema,
        options: &DatasetOptions,
    ) -> Result<Self> {
        let path = dir.as_ref().to_path_buf();
        let descriptor = parse_descriptor(path.join(DESCRIPTOR_FILE))?;
        schema.verify(&descriptor)?;

        let columns = open_columns(&path, schema, options)?;
        check_row_counts(&columns)?;

        let dataset = Dataset {
            path,
            schema: schema.clone(),
            columns,
            access: options.access,
        };
        debug!(
            path = %dataset.path.display(),
            columns = dataset.column_count(),
            rows = dataset.row_count(),
            access = ?dataset.access,
            "opened dataset"
        );
        Ok(dataset)
    }

    /// Open the dataset in `dir` using its own descriptor as the schema.
    pub fn open_inferred<P: AsRef<Path>>(dir: P, access: AccessMode) -> Result<Self> {
        let schema = Schema::from_descriptor(dir.as_ref())?;
        Self::open(dir, &schema, access)
    }

    /// Create a dataset of `rows` zero-filled rows and map it read-write.
    ///
    /// Any existing dataset in `dir` is replaced.
    pub fn create<P: AsRef<Path>>(dir: P, schema: &Schema, rows: usize) -> Result<Self> {
        let dir = dir.as_ref();
        DatasetWriter::create(dir, schema)?.finish()?;
        let mut dataset = Self::open(dir, schema, AccessMode::ReadWrite)?;
        if rows > 0 {
            dataset.resize(rows)?;
        }
        Ok(dataset)
    }

    /// Number of rows, zero for a dataset without columns.
    #[inline]
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, AnyColumn::len)
    }

    /// Number of columns.
    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Dataset directory.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn access_mode(&self) -> AccessMode {
        self.access
    }

    /// The column at `position`.
    #[inline]
    pub fn column(&self, position: usize) -> Option<&AnyColumn> {
        self.columns.get(position)
    }

    /// The column named `name`.
    pub fn column_by_name(&self, name: &str) -> Option<&AnyColumn> {
        self.schema
            .position(name)
            .and_then(|position| self.columns.get(position))
    }

    /// All columns, in schema order.
    #[inline]
    pub fn columns(&self) -> &[AnyColumn] {
        &self.columns
    }

    /// The column at `position` as `T`.
    pub fn column_as<T: Element>(&self, position: usize) -> Result<&MappedColumn<T>> {
        let columns = self.columns.len();
        self.columns
            .get(position)
            .ok_or_else(|| no_such_column(position, columns))?
            .downcast_ref()
    }

    /// The elements of column `position` as `T`, writable in place.
    ///
    /// Only the values can change through this slice; the row count changes
    /// for all columns together through [`Dataset::resize`]. Requires a
    /// read-write mapping.
    pub fn column_as_mut<T: Element>(&mut self, position: usize) -> Result<&mut [T]> {
        let columns = self.columns.len();
        self.columns
            .get_mut(position)
            .ok_or_else(|| no_such_column(position, columns))?
            .downcast_mut::<T>()?
            .as_mut_slice()
    }

    /// Give up the dataset and keep its columns.
    pub fn take_columns(self) -> Vec<AnyColumn> {
        self.columns
    }

    /// Copy row `index` out of every column.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.row_count()`.
    pub fn row(&self, index: usize) -> Row {
        let rows = self.row_count();
        assert!(
            index < rows,
            "row {index} is out of range for a dataset of {rows} rows"
        );
        self.columns.iter().map(|column| column.value(index)).collect()
    }

    /// Checked variant of [`Dataset::row`].
    pub fn get_row(&self, index: usize) -> Result<Row> {
        let rows = self.row_count();
        if index >= rows {
            return Err(Error::RowIndexOutOfRange { index, rows });
        }
        Ok(self.row(index))
    }

    /// Iterate over rows in ascending order.
    pub fn iter(&self) -> Rows<'_> {
        Rows {
            dataset: self,
            front: 0,
            back: self.row_count(),
        }
    }

    /// Typed view of every row, e.g. `dataset.records::<(u32, f64)>()`.
    pub fn records<R: Record>(&self) -> Result<Records<'_, R>> {
        let len = self.row_count();
        Ok(Records {
            slices: R::slices(&self.columns, 0..len)?,
            len,
            _marker: PhantomData,
        })
    }

    /// Truncate or extend every column to `new_rows` rows.
    ///
    /// Columns are resized in order. If resizing column `k` fails, columns
    /// before it keep their new length.
    pub fn resize(&mut self, new_rows: usize) -> Result<()> {
        debug!(
            path = %self.path.display(),
            from = self.row_count(),
            to = new_rows,
            "resizing dataset"
        );
        self.columns
            .iter_mut()
            .try_for_each(|column| column.resize(new_rows))
    }

    /// Flush every writable mapping to disk.
    pub fn flush(&self) -> Result<()> {
        self.columns.iter().try_for_each(AnyColumn::flush)
    }

    /// Schedule write-back of every writable mapping and return immediately.
    pub fn flush_async(&self) -> Result<()> {
        self.columns.iter().try_for_each(AnyColumn::flush_async)
    }

    /// Advise the kernel about how every column will be accessed.
    pub fn advise(&self, advice: Advice) -> Result<()> {
        self.columns
            .iter()
            .try_for_each(|column| column.advise(advice))
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = Row;
    type IntoIter = Rows<'a>;

    fn into_iter(self) -> Rows<'a> {
        self.iter()
    }
}

fn no_such_column(position: usize, columns: usize) -> Error {
    Error::InvalidArgument(format!(
        "column {position} does not exist in a dataset of {columns} columns"
    ))
}

fn open_columns(dir: &Path, schema: &Schema, options: &DatasetOptions) -> Result<Vec<AnyColumn>> {
    schema
        .fields()
        .iter()
        .enumerate()
        .map(|(position, field)| {
            let mut column = AnyColumn::open_with(column_path(dir, position), field.data_type, options)?;
            column.set_position(position);
            Ok(column)
        })
        .collect()
}

fn check_row_counts(columns: &[AnyColumn]) -> Result<()> {
    for (left, pair) in columns.windows(2).enumerate() {
        if pair[0].len() != pair[1].len() {
            return Err(Error::ColumnSizeMismatch {
                left,
                right: left + 1,
                left_rows: pair[0].len(),
                right_rows: pair[1].len(),
            });
        }
    }
    Ok(())
}

/// Iterator over the rows of a [`Dataset`].
#[derive(Debug, Clone)]
pub struct Rows<'a> {
    dataset: &'a Dataset,
    front: usize,
    back: usize,
}

impl Iterator for Rows<'_> {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        if self.front == self.back {
            return None;
        }
        let row = self.dataset.row(self.front);
        self.front += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl DoubleEndedIterator for Rows<'_> {
    fn next_back(&mut self) -> Option<Row> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        Some(self.dataset.row(self.back))
    }
}

impl ExactSizeIterator for Rows<'_> {}

impl FusedIterator for Rows<'_> {}

/// Rows of a dataset read as tuples, after a single type check.
pub struct Records<'a, R: Record> {
    slices: R::Slices<'a>,
    len: usize,
    _marker: PhantomData<R>,
}

impl<'a, R: Record> Clone for Records<'a, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, R: Record> Copy for Records<'a, R> {}

impl<'a, R: Record> Records<'a, R> {
    /// Number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Row `index` as a tuple.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[inline]
    pub fn row(&self, index: usize) -> R {
        R::read(&self.slices, index)
    }

    /// Checked variant of [`Records::row`].
    #[inline]
    pub fn get(&self, index: usize) -> Option<R> {
        (index < self.len).then(|| self.row(index))
    }

    /// One slice per column.
    #[inline]
    pub fn columns(&self) -> R::Slices<'a> {
        self.slices
    }

    pub fn iter(&self) -> RecordIter<'a, R> {
        RecordIter {
            records: *self,
            index: 0,
        }
    }
}

impl<'a, R: Record> IntoIterator for Records<'a, R> {
    type Item = R;
    type IntoIter = RecordIter<'a, R>;

    fn into_iter(self) -> RecordIter<'a, R> {
        self.iter()
    }
}

/// Iterator over [`Records`].
pub struct RecordIter<'a, R: Record> {
    records: Records<'a, R>,
    index: usize,
}

impl<R: Record> Iterator for RecordIter<'_, R> {
    type Item = R;

    fn next(&mut self) -> Option<R> {
        let record = self.records.get(self.index)?;
        self.index += 1;
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.records.len - self.index;
        (remaining, Some(remaining))
    }
}

impl<R: Record> ExactSizeIterator for RecordIter<'_, R> {}

impl Schema {
    /// Open the dataset in `dir` against this schema.
    pub fn open_dataset<P: AsRef<Path>>(&self, dir: P, access: AccessMode) -> Result<Dataset> {
        Dataset::open(dir, self, access)
    }

    /// Open the dataset in `dir` and keep only its columns.
    pub fn open_columns<P: AsRef<Path>>(&self, dir: P, access: AccessMode) -> Result<Vec<AnyColumn>> {
        Ok(self.open_dataset(dir, access)?.take_columns())
    }
}
