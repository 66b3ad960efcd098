//! Sequential dataset writer.
//!
//! A writer owns one buffered append handle per column file. Rows are appended
//! element by element in schema order; the bulk path appends whole slices with a
//! single write per column. Every type check happens before the first byte of a
//! call is written, so a rejected row never leaves the columns misaligned. An
//! I/O failure part-way through a row can.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::columnar::options::{WriteMode, WriterOptions};
use crate::columnar::record::{ColumnSlices, Record};
use crate::columnar::schema::{column_path, parse_descriptor, Field, Schema, DESCRIPTOR_FILE};
use crate::columnar::types::{DataType, Element, Value};
use crate::error::{Error, Result};

/// Buffered append handle on one column file.
#[derive(Debug)]
pub struct ColumnSink {
    writer: BufWriter<File>,
    path: PathBuf,
    data_type: DataType,
}

impl ColumnSink {
    fn open(path: PathBuf, data_type: DataType, mode: WriteMode, capacity: usize) -> Result<Self> {
        let mut options = OpenOptions::new();
        match mode {
            WriteMode::Truncate => options.write(true).create(true).truncate(true),
            WriteMode::Append => options.append(true),
        };
        let file = options.open(&path).map_err(|source| Error::OpenFailed {
            path: path.clone(),
            source,
        })?;
        Ok(ColumnSink {
            writer: BufWriter::with_capacity(capacity, file),
            path,
            data_type,
        })
    }

    /// Path of the column file.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Element type written to this column.
    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub(crate) fn write_values<T: Element>(&mut self, values: &[T]) -> Result<()> {
        debug_assert!(T::DATA_TYPE.is_compatible(&self.data_type));
        self.write_bytes(bytemuck::cast_slice(values))
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer
            .write_all(bytes)
            .map_err(|e| Error::io(&self.path, e))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| Error::io(&self.path, e))
    }
}

/// Appends rows to the column files of a dataset directory.
///
/// Buffered bytes are flushed on drop; call [`DatasetWriter::finish`] to see
/// flush errors instead of having them logged.
#[derive(Debug)]
pub struct DatasetWriter {
    path: PathBuf,
    schema: Schema,
    sinks: Vec<ColumnSink>,
    rows: usize,
}

impl DatasetWriter {
    /// Create a fresh dataset in `dir`, replacing the descriptor and truncating
    /// any existing column files.
    pub fn create<P: AsRef<Path>>(dir: P, schema: &Schema) -> Result<Self> {
        Self::create_with(dir, schema, &WriterOptions::default())
    }

    /// Reopen an existing dataset in `dir` and append after its last row.
    pub fn open_append<P: AsRef<Path>>(dir: P, schema: &Schema) -> Result<Self> {
        Self::create_with(dir, schema, &WriterOptions::new().mode(WriteMode::Append))
    }

    /// Create a writer with explicit options.
    pub fn create_with<P: AsRef<Path>>(
        dir: P,
        schema: &Schema,
        options: &WriterOptions,
    ) -> Result<Self> {
        let path = dir.as_ref().to_path_buf();
        let rows = match options.mode {
            WriteMode::Truncate => {
                fs::create_dir_all(&path).map_err(|e| Error::io(&path, e))?;
                schema.write_descriptor(path.join(DESCRIPTOR_FILE))?;
                0
            }
            WriteMode::Append => {
                let descriptor = parse_descriptor(path.join(DESCRIPTOR_FILE))?;
                schema.verify(&descriptor)?;
                existing_rows(&path, schema)?
            }
        };

        let sinks = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(position, field)| {
                ColumnSink::open(
                    column_path(&path, position),
                    field.data_type,
                    options.mode,
                    options.buffer_capacity,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            path = %path.display(),
            columns = schema.len(),
            rows,
            mode = ?options.mode,
            "opened dataset writer"
        );
        Ok(DatasetWriter {
            path,
            schema: schema.clone(),
            sinks,
            rows,
        })
    }

    /// Append one runtime-typed row, one value per column in schema order.
    pub fn write_row(&mut self, row: &[Value]) -> Result<()> {
        let types: Vec<DataType> = row.iter().map(Value::data_type).collect();
        self.check_types(&types)?;
        for (sink, value) in self.sinks.iter_mut().zip(row) {
            sink.write_bytes(value.as_ne_bytes())?;
        }
        self.rows += 1;
        Ok(())
    }

    /// Append one typed row, e.g. `writer.write_record(&(7u32, 0.5f64))`.
    pub fn write_record<R: Record>(&mut self, record: &R) -> Result<()> {
        self.check_types(&R::data_types())?;
        record.write_to(&mut self.sinks)?;
        self.rows += 1;
        Ok(())
    }

    /// Append the first `count` elements of every slice.
    pub fn write_rows<S: ColumnSlices>(&mut self, count: usize, slices: S) -> Result<()> {
        self.check_types(&S::Record::data_types())?;
        if let Some((column, len)) = slices
            .lens()
            .into_iter()
            .enumerate()
            .find(|(_, len)| *len < count)
        {
            return Err(Error::InvalidArgument(format!(
                "column {column} holds {len} values, fewer than the {count} rows requested"
            )));
        }
        slices.write_to(count, &mut self.sinks)?;
        self.rows += count;
        Ok(())
    }

    fn check_types(&self, found: &[DataType]) -> Result<()> {
        if found.len() != self.schema.len() {
            return Err(Error::ColumnCountMismatch {
                expected: self.schema.len(),
                found: found.len(),
            });
        }
        for (column, (field, found)) in self.schema.fields().iter().zip(found).enumerate() {
            if !found.is_compatible(&field.data_type) {
                return Err(Error::TypeMismatch {
                    column,
                    expected: field.data_type.tag(),
                    found: found.tag(),
                });
            }
        }
        Ok(())
    }

    /// Rows in the dataset, including rows present before an append.
    #[inline]
    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Schema being written.
    #[inline]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Dataset directory.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Push buffered bytes of every column to the OS.
    pub fn flush(&mut self) -> Result<()> {
        self.sinks.iter_mut().try_for_each(ColumnSink::flush)
    }

    /// Flush and close the writer, returning the final row count.
    pub fn finish(mut self) -> Result<usize> {
        self.flush()?;
        debug!(path = %self.path.display(), rows = self.rows, "finished dataset writer");
        Ok(self.rows)
    }
}

impl Drop for DatasetWriter {
    fn drop(&mut self) {
        for sink in &mut self.sinks {
            if let Err(error) = sink.flush() {
                warn!(path = %sink.path.display(), %error, "failed to flush column on drop");
            }
        }
    }
}

/// Length of each existing column file, checked for equality.
fn existing_rows(dir: &Path, schema: &Schema) -> Result<usize> {
    let mut rows: Option<usize> = None;
    for (position, field) in schema.fields().iter().enumerate() {
        let column_rows = file_rows(&column_path(dir, position), field.data_type)?;
        if let Some(previous) = rows {
            if previous != column_rows {
                return Err(Error::ColumnSizeMismatch {
                    left: position - 1,
                    right: position,
                    left_rows: previous,
                    right_rows: column_rows,
                });
            }
        }
        rows = Some(column_rows);
    }
    Ok(rows.unwrap_or(0))
}

fn file_rows(path: &Path, data_type: DataType) -> Result<usize> {
    let len = fs::metadata(path)
        .map_err(|source| Error::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    let element_size = data_type.size();
    if len % element_size as u64 != 0 {
        return Err(Error::FileSizeMismatch {
            path: path.to_path_buf(),
            len,
            element_size,
        });
    }
    Ok((len / element_size as u64) as usize)
}

/// Add a column holding `values` to the dataset in `dir`.
///
/// The new column takes the next position and must hold exactly as many values
/// as the dataset has rows. The column file must not exist yet. The descriptor
/// is rewritten after the column file.
pub fn append_column<T: Element, P: AsRef<Path>>(dir: P, name: &str, values: &[T]) -> Result<()> {
    let dir = dir.as_ref();
    let schema = Schema::from_descriptor(dir)?;
    let position = schema.len();

    if let Some(first) = schema.field(0) {
        let rows = file_rows(&column_path(dir, 0), first.data_type)?;
        if rows != values.len() {
            return Err(Error::ColumnSizeMismatch {
                left: 0,
                right: position,
                left_rows: rows,
                right_rows: values.len(),
            });
        }
    }

    if name.contains(['\n', '\r']) {
        return Err(Error::InvalidArgument(format!(
            "column name {name:?} contains a line break"
        )));
    }
    let mut fields = schema.fields().to_vec();
    fields.push(Field::new(name, T::DATA_TYPE));
    let extended = Schema::new(fields);

    let path = column_path(dir, position);
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|source| Error::OpenFailed {
            path: path.clone(),
            source,
        })?;
    file.write_all(bytemuck::cast_slice::<T, u8>(values))
        .map_err(|e| Error::io(&path, e))?;
    extended.write_descriptor(dir.join(DESCRIPTOR_FILE))?;

    debug!(path = %dir.display(), column = name, position, "appended column");
    Ok(())
}

impl Schema {
    /// Create a fresh dataset writer in `dir` for this schema.
    pub fn create_writer<P: AsRef<Path>>(&self, dir: P) -> Result<DatasetWriter> {
        DatasetWriter::create(dir, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn read_column<T: Element>(dir: &Path, position: usize) -> Vec<T> {
        let bytes = fs::read(column_path(dir, position)).unwrap();
        bytes
            .chunks_exact(std::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    fn schema() -> Schema {
        Schema::of::<(u32, f64)>(&["id", "score"]).unwrap()
    }

    #[test]
    fn writes_descriptor_and_columns() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = schema().create_writer(dir.path()).unwrap();
        writer.write_record(&(1u32, 0.5f64)).unwrap();
        writer
            .write_row(&[Value::UInt32(2), Value::Float64(1.5)])
            .unwrap();
        writer.write_rows(2, (&[3u32, 4, 99][..], &[2.5f64, 3.5][..])).unwrap();
        assert_eq!(writer.finish().unwrap(), 4);

        assert_eq!(
            fs::read_to_string(dir.path().join(DESCRIPTOR_FILE)).unwrap(),
            "uint32 id\nfloat64 score\n"
        );
        assert_eq!(read_column::<u32>(dir.path(), 0), vec![1, 2, 3, 4]);
        assert_eq!(read_column::<f64>(dir.path(), 1), vec![0.5, 1.5, 2.5, 3.5]);
    }

    #[test]
    fn rejected_rows_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = schema().create_writer(dir.path()).unwrap();

        let err = writer
            .write_row(&[Value::UInt32(1), Value::Float32(1.0)])
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { column: 1, .. }));

        let err = writer.write_record(&(1u32,)).unwrap_err();
        assert!(matches!(err, Error::ColumnCountMismatch { expected: 2, found: 1 }));

        let err = writer
            .write_rows(3, (&[1u32, 2, 3][..], &[1.0f64][..]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        assert_eq!(writer.finish().unwrap(), 0);
        assert!(read_column::<u32>(dir.path(), 0).is_empty());
        assert!(read_column::<f64>(dir.path(), 1).is_empty());
    }

    #[test]
    fn drop_flushes_buffers() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut writer = schema().create_writer(dir.path()).unwrap();
            writer.write_record(&(9u32, 9.0f64)).unwrap();
        }
        assert_eq!(read_column::<u32>(dir.path(), 0), vec![9]);
    }

    #[test]
    fn append_continues_after_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = schema().create_writer(dir.path()).unwrap();
        writer.write_record(&(1u32, 1.0f64)).unwrap();
        writer.finish().unwrap();

        let mut writer = DatasetWriter::open_append(dir.path(), &schema()).unwrap();
        assert_eq!(writer.row_count(), 1);
        writer.write_record(&(2u32, 2.0f64)).unwrap();
        assert_eq!(writer.finish().unwrap(), 2);
        assert_eq!(read_column::<u32>(dir.path(), 0), vec![1, 2]);
    }

    #[test]
    fn append_checks_descriptor_and_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let err = DatasetWriter::open_append(dir.path(), &schema()).unwrap_err();
        assert!(matches!(err, Error::DescriptorRead { .. }));

        let mut writer = schema().create_writer(dir.path()).unwrap();
        writer.write_record(&(1u32, 1.0f64)).unwrap();
        writer.finish().unwrap();

        let other = Schema::of::<(u32, f32)>(&["id", "score"]).unwrap();
        let err = DatasetWriter::open_append(dir.path(), &other).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { column: 1, .. }));

        fs::write(column_path(dir.path(), 1), b"").unwrap();
        let err = DatasetWriter::open_append(dir.path(), &schema()).unwrap_err();
        assert!(matches!(
            err,
            Error::ColumnSizeMismatch { left: 0, right: 1, left_rows: 1, right_rows: 0 }
        ));
    }

    #[test]
    fn append_column_requires_matching_length() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = schema().create_writer(dir.path()).unwrap();
        writer.write_rows(3, (&[1u32, 2, 3][..], &[0.1f64, 0.2, 0.3][..])).unwrap();
        writer.finish().unwrap();

        let err = append_column(dir.path(), "flag", &[1u8, 0]).unwrap_err();
        assert!(matches!(err, Error::ColumnSizeMismatch { right: 2, right_rows: 2, .. }));

        append_column(dir.path(), "flag", &[1u8, 0, 1]).unwrap();
        let schema = Schema::from_descriptor(dir.path()).unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.field(2), Some(&Field::new("flag", DataType::UInt8)));
        assert_eq!(read_column::<u8>(dir.path(), 2), vec![1, 0, 1]);
    }

    #[test]
    fn append_column_keeps_leftover_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = schema().create_writer(dir.path()).unwrap();
        writer.write_record(&(1u32, 0.1f64)).unwrap();
        writer.finish().unwrap();
        fs::write(column_path(dir.path(), 2), [7u8, 7]).unwrap();

        let err = append_column(dir.path(), "flag", &[1u8]).unwrap_err();
        assert!(matches!(err, Error::OpenFailed { .. }));
        assert_eq!(fs::read(column_path(dir.path(), 2)).unwrap(), vec![7, 7]);
        assert_eq!(Schema::from_descriptor(dir.path()).unwrap(), schema());
    }
}
