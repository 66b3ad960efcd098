//! Grouped datasets.
//!
//! An indexed dataset is a base dataset plus a one-column `uint64` dataset of
//! group boundaries stored in its `index` subdirectory. Group `g` owns base rows
//! `offsets[g]..offsets[g + 1]`, so the offsets hold one more entry than there
//! are groups, start at zero and end at the base row count.

use std::ops::Range;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::columnar::column::{AnyColumn, MappedColumn};
use crate::columnar::dataset::Dataset;
use crate::columnar::options::{AccessMode, DatasetOptions, WriteMode, WriterOptions};
use crate::columnar::record::{ColumnSlices, Record};
use crate::columnar::schema::{column_path, Field, Schema};
use crate::columnar::types::{DataType, Element, Row};
use crate::columnar::writer::DatasetWriter;
use crate::error::{Error, Result};

/// Subdirectory holding the offsets dataset.
pub const OFFSETS_DIR: &str = "index";

/// Name of the single offsets column.
pub const OFFSETS_COLUMN: &str = "offset";

/// Schema of the offsets dataset.
pub fn offsets_schema() -> Schema {
    Schema::new(vec![Field::new(OFFSETS_COLUMN, DataType::UInt64)])
}

fn offsets_dir(dir: &Path) -> PathBuf {
    dir.join(OFFSETS_DIR)
}

/// Check the group-boundary invariant against a base of `rows` rows.
fn validate_offsets(offsets: &[u64], rows: usize) -> Result<()> {
    let Some((&first, &last)) = offsets.first().zip(offsets.last()) else {
        if rows == 0 {
            return Ok(());
        }
        return Err(Error::InvalidOffsets(format!(
            "no offsets for a base of {rows} rows"
        )));
    };
    if first != 0 {
        return Err(Error::InvalidOffsets(format!("first offset is {first}, not 0")));
    }
    if let Some(group) = offsets.windows(2).position(|pair| pair[1] < pair[0]) {
        return Err(Error::InvalidOffsets(format!(
            "offset {} decreases from {} to {}",
            group + 1,
            offsets[group],
            offsets[group + 1]
        )));
    }
    if last != rows as u64 {
        return Err(Error::InvalidOffsets(format!(
            "last offset is {last}, but the base holds {rows} rows"
        )));
    }
    Ok(())
}

/// A dataset read in variable-length row groups.
#[derive(Debug)]
pub struct IndexedDataset {
    base: Dataset,
    offsets: MappedColumn<u64>,
}

impl IndexedDataset {
    /// Open the base dataset with `access` and its offsets read-only.
    pub fn open<P: AsRef<Path>>(dir: P, schema: &Schema, access: AccessMode) -> Result<Self> {
        Self::open_with(dir, schema, &DatasetOptions::from(access))
    }

    /// Open with explicit mapping options for the base dataset.
    pub fn open_with<P: AsRef<Path>>(
        dir: P,
        schema: &Schema,
        options: &DatasetOptions,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        let base = Dataset::open_with(dir, schema, options)?;
        let offsets = Dataset::open(offsets_dir(dir), &offsets_schema(), AccessMode::ReadOnly)?
            .take_columns()
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidOffsets("offsets dataset has no column".to_string()))?
            .into_typed::<u64>()?;
        validate_offsets(offsets.as_slice(), base.row_count())?;

        let dataset = IndexedDataset { base, offsets };
        debug!(
            path = %dir.display(),
            groups = dataset.number_of_groups(),
            rows = dataset.base.row_count(),
            "opened indexed dataset"
        );
        Ok(dataset)
    }

    /// Number of groups.
    #[inline]
    pub fn number_of_groups(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Group boundaries, one more than the number of groups.
    #[inline]
    pub fn offsets(&self) -> &[u64] {
        self.offsets.as_slice()
    }

    /// Base rows owned by group `group`.
    pub fn group_range(&self, group: usize) -> Result<Range<usize>> {
        let groups = self.number_of_groups();
        if group >= groups {
            return Err(Error::GroupIndexOutOfRange {
                index: group,
                groups,
            });
        }
        // Offsets are bounded by the base row count, checked at open.
        let offsets = self.offsets.as_slice();
        Ok(offsets[group] as usize..offsets[group + 1] as usize)
    }

    /// Zero-copy view of group `group` across every base column.
    pub fn get_group(&self, group: usize) -> Result<Group<'_>> {
        Ok(Group {
            columns: self.base.columns(),
            range: self.group_range(group)?,
        })
    }

    /// Group `group` as a tuple of typed slices, e.g. `(&[u32], &[f64])`.
    pub fn get_group_as<R: Record>(&self, group: usize) -> Result<R::Slices<'_>> {
        R::slices(self.base.columns(), self.group_range(group)?)
    }

    /// Iterate over every group in order.
    pub fn groups(&self) -> Groups<'_> {
        Groups {
            dataset: self,
            next: 0,
        }
    }

    /// The underlying dataset holding every row.
    #[inline]
    pub fn base(&self) -> &Dataset {
        &self.base
    }

    /// Give up the group index and keep the base dataset.
    pub fn into_base(self) -> Dataset {
        self.base
    }
}

/// Rows of one group, borrowed from an [`IndexedDataset`].
#[derive(Debug, Clone)]
pub struct Group<'a> {
    columns: &'a [AnyColumn],
    range: Range<usize>,
}

impl<'a> Group<'a> {
    /// Number of rows in the group.
    #[inline]
    pub fn len(&self) -> usize {
        self.range.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Base rows covered by the group.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// The group's slice of column `position`, typed as `T`.
    pub fn column_as<T: Element>(&self, position: usize) -> Result<&'a [T]> {
        let columns: &'a [AnyColumn] = self.columns;
        let column = columns.get(position).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "column {position} does not exist in a dataset of {} columns",
                columns.len()
            ))
        })?;
        let values: &'a [T] = column.downcast_ref::<T>()?.as_slice();
        Ok(&values[self.range.clone()])
    }

    /// The whole group as a tuple of typed slices.
    pub fn records<R: Record>(&self) -> Result<R::Slices<'a>> {
        R::slices(self.columns, self.range.clone())
    }

    /// Copy row `index` of the group, counted from the group start.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn row(&self, index: usize) -> Row {
        assert!(
            index < self.len(),
            "row {index} is out of range for a group of {} rows",
            self.len()
        );
        let row = self.range.start + index;
        self.columns.iter().map(|column| column.value(row)).collect()
    }
}

/// Iterator over the groups of an [`IndexedDataset`].
#[derive(Debug, Clone)]
pub struct Groups<'a> {
    dataset: &'a IndexedDataset,
    next: usize,
}

impl<'a> Iterator for Groups<'a> {
    type Item = Group<'a>;

    fn next(&mut self) -> Option<Group<'a>> {
        let group = self.dataset.get_group(self.next).ok()?;
        self.next += 1;
        Some(group)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.dataset.number_of_groups().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Groups<'_> {}

/// Writes whole groups to a base dataset and records their boundaries.
#[derive(Debug)]
pub struct IndexedWriter {
    base: DatasetWriter,
    offsets: DatasetWriter,
}

impl IndexedWriter {
    /// Create a fresh indexed dataset in `dir`.
    pub fn create<P: AsRef<Path>>(dir: P, schema: &Schema) -> Result<Self> {
        Self::create_with(dir, schema, &WriterOptions::default())
    }

    /// Create a writer with explicit options. In append mode the last stored
    /// offset must equal the base row count.
    pub fn create_with<P: AsRef<Path>>(
        dir: P,
        schema: &Schema,
        options: &WriterOptions,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        let base = DatasetWriter::create_with(dir, schema, options)?;
        let mut offsets = DatasetWriter::create_with(offsets_dir(dir), &offsets_schema(), options)?;

        let last = match options.mode {
            WriteMode::Truncate => None,
            WriteMode::Append => last_offset(&offsets_dir(dir))?,
        };
        match last {
            None if base.row_count() == 0 => offsets.write_record(&(0u64,))?,
            Some(last) if last == base.row_count() as u64 => {}
            _ => {
                return Err(Error::InvalidOffsets(format!(
                    "last offset {last:?} does not match the {} rows of the base",
                    base.row_count()
                )))
            }
        }

        Ok(IndexedWriter { base, offsets })
    }

    /// Append one group; every slice must hold the same number of rows.
    ///
    /// Empty groups are allowed.
    pub fn write_group<S: ColumnSlices>(&mut self, group: S) -> Result<()> {
        let lens = group.lens();
        let count = lens.first().copied().unwrap_or(0);
        if let Some(column) = lens.iter().position(|len| *len != count) {
            return Err(Error::InvalidArgument(format!(
                "group column {column} holds {} rows, column 0 holds {count}",
                lens[column]
            )));
        }
        self.base.write_rows(count, group)?;
        self.offsets.write_record(&(self.base.row_count() as u64,))
    }

    /// Number of groups written, including groups present before an append.
    #[inline]
    pub fn number_of_groups(&self) -> usize {
        self.offsets.row_count().saturating_sub(1)
    }

    /// Total rows across every group.
    #[inline]
    pub fn row_count(&self) -> usize {
        self.base.row_count()
    }

    /// Flush the base columns, then the offsets.
    pub fn flush(&mut self) -> Result<()> {
        self.base.flush()?;
        self.offsets.flush()
    }

    /// Flush and close both writers, returning the number of groups.
    pub fn finish(self) -> Result<usize> {
        let groups = self.number_of_groups();
        self.base.finish()?;
        self.offsets.finish()?;
        Ok(groups)
    }
}

/// Last stored offset, `None` when the offsets column is empty.
fn last_offset(dir: &Path) -> Result<Option<u64>> {
    let offsets = MappedColumn::<u64>::open(column_path(dir, 0), AccessMode::ReadOnly)?;
    Ok(offsets.last().copied())
}

impl Schema {
    /// Open the indexed dataset in `dir` against this schema.
    pub fn open_indexed_dataset<P: AsRef<Path>>(
        &self,
        dir: P,
        access: AccessMode,
    ) -> Result<IndexedDataset> {
        IndexedDataset::open(dir, self, access)
    }

    /// Create a fresh indexed dataset writer in `dir` for this schema.
    pub fn create_indexed_writer<P: AsRef<Path>>(&self, dir: P) -> Result<IndexedWriter> {
        IndexedWriter::create(dir, self)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::columnar::types::Value;
    use crate::error::ErrorKind;

    fn schema() -> Schema {
        Schema::of::<(u32, f32)>(&["peak", "intensity"]).unwrap()
    }

    fn write_groups(dir: &Path, sizes: &[usize]) {
        let mut writer = schema().create_indexed_writer(dir).unwrap();
        let mut next = 0u32;
        for &size in sizes {
            let peaks: Vec<u32> = (next..next + size as u32).collect();
            let intensity: Vec<f32> = peaks.iter().map(|&p| p as f32 * 0.5).collect();
            writer.write_group((&peaks[..], &intensity[..])).unwrap();
            next += size as u32;
        }
        assert_eq!(writer.finish().unwrap(), sizes.len());
    }

    #[test]
    fn offsets_are_validated() {
        assert!(validate_offsets(&[], 0).is_ok());
        assert!(validate_offsets(&[0], 0).is_ok());
        assert!(validate_offsets(&[0, 2, 2, 5], 5).is_ok());
        assert!(validate_offsets(&[], 3).is_err());
        assert!(validate_offsets(&[1, 5], 5).is_err());
        assert!(validate_offsets(&[0, 3, 2, 5], 5).is_err());
        assert_eq!(
            validate_offsets(&[0, 4], 5).unwrap_err().kind(),
            ErrorKind::SizeConsistency
        );
    }

    #[test]
    fn groups_follow_offsets() {
        let dir = tempfile::tempdir().unwrap();
        write_groups(dir.path(), &[2, 0, 3]);

        let dataset = schema().open_indexed_dataset(dir.path(), AccessMode::ReadOnly).unwrap();
        assert_eq!(dataset.number_of_groups(), 3);
        assert_eq!(dataset.offsets(), &[0, 2, 2, 5]);
        assert!(dataset.get_group(1).unwrap().is_empty());

        let group = dataset.get_group(2).unwrap();
        assert_eq!(group.range(), 2..5);
        assert_eq!(group.column_as::<u32>(0).unwrap(), &[2, 3, 4]);
        assert_eq!(group.row(0), vec![Value::UInt32(2), Value::Float32(1.0)]);

        let (peaks, intensity) = dataset.get_group_as::<(u32, f32)>(0).unwrap();
        assert_eq!(peaks, &[0, 1]);
        assert_eq!(intensity, &[0.0, 0.5]);

        assert!(matches!(
            dataset.get_group(3),
            Err(Error::GroupIndexOutOfRange { index: 3, groups: 3 })
        ));
        assert_eq!(dataset.groups().map(|g| g.len()).collect::<Vec<_>>(), vec![2, 0, 3]);
    }

    #[test]
    fn unequal_group_slices_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = schema().create_indexed_writer(dir.path()).unwrap();
        let err = writer
            .write_group((&[1u32, 2][..], &[1.0f32][..]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(writer.number_of_groups(), 0);
        assert_eq!(writer.finish().unwrap(), 0);
    }

    #[test]
    fn corrupted_offsets_fail_to_open() {
        let dir = tempfile::tempdir().unwrap();
        write_groups(dir.path(), &[2, 3]);
        fs::write(
            column_path(&offsets_dir(dir.path()), 0),
            bytemuck::cast_slice::<u64, u8>(&[0, 4, 2]),
        )
        .unwrap();

        let err = IndexedDataset::open(dir.path(), &schema(), AccessMode::ReadOnly).unwrap_err();
        assert!(matches!(err, Error::InvalidOffsets(_)));
    }

    #[test]
    fn append_mode_continues_groups() {
        let dir = tempfile::tempdir().unwrap();
        write_groups(dir.path(), &[1, 2]);

        let options = WriterOptions::new().mode(WriteMode::Append);
        let mut writer = IndexedWriter::create_with(dir.path(), &schema(), &options).unwrap();
        assert_eq!(writer.number_of_groups(), 2);
        assert_eq!(writer.row_count(), 3);
        writer.write_group((&[9u32][..], &[9.0f32][..])).unwrap();
        assert_eq!(writer.finish().unwrap(), 3);

        let dataset = IndexedDataset::open(dir.path(), &schema(), AccessMode::ReadOnly).unwrap();
        assert_eq!(dataset.offsets(), &[0, 1, 3, 4]);
        assert_eq!(dataset.get_group_as::<(u32, f32)>(2).unwrap().0, &[9]);
    }
}
