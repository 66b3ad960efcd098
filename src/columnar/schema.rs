//! Schema definition and the on-disk descriptor.
//!
//! A dataset directory holds a text descriptor, `schema.txt`, with one
//! `"<type_tag> <column_name>"` line per column in column order, and one binary
//! file per column named by its zero-based position (`0.bin`, `1.bin`, ...).

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::columnar::record::Record;
use crate::columnar::types::DataType;
use crate::error::{Error, Result};

/// Name of the descriptor file inside a dataset directory.
pub const DESCRIPTOR_FILE: &str = "schema.txt";

/// File name of the column at `position`.
#[inline]
pub fn column_file_name(position: usize) -> String {
    format!("{position}.bin")
}

/// Path of the column at `position` inside `dir`.
#[inline]
pub fn column_path(dir: &Path, position: usize) -> PathBuf {
    dir.join(column_file_name(position))
}

/// Field definition in a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field name
    pub name: String,

    /// Field data type
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: &str, data_type: DataType) -> Self {
        Field {
            name: name.to_string(),
            data_type,
        }
    }
}

/// Ordered column definitions of a dataset.
///
/// Column order is significant: it is the order of the descriptor lines and
/// of the column files, and datasets are matched against a schema by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema.
    pub fn new(fields: Vec<Field>) -> Self {
        Schema { fields }
    }

    /// Pair a type list with a name list of the same length.
    pub fn from_types<S: AsRef<str>>(types: &[DataType], names: &[S]) -> Result<Self> {
        if types.len() != names.len() {
            return Err(Error::ColumnCountMismatch {
                expected: types.len(),
                found: names.len(),
            });
        }
        let fields = types
            .iter()
            .zip(names)
            .map(|(data_type, name)| Field::new(name.as_ref(), *data_type))
            .collect();
        Ok(Schema { fields })
    }

    /// Schema for a record type, e.g. `Schema::of::<(u32, f64)>(&["id", "score"])`.
    pub fn of<R: Record>(names: &[impl AsRef<str>]) -> Result<Self> {
        Self::from_types(&R::data_types(), names)
    }

    /// Read the schema stored in a dataset directory.
    pub fn from_descriptor<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(DESCRIPTOR_FILE);
        let descriptor = parse_descriptor(&path)?;
        let fields = descriptor
            .entries
            .iter()
            .map(|entry| {
                DataType::from_tag(&entry.tag)
                    .map(|data_type| Field::new(&entry.name, data_type))
                    .ok_or_else(|| Error::MalformedDescriptor {
                        path: path.clone(),
                        line: entry.line,
                        reason: format!("unknown type tag '{}'", entry.tag),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Schema { fields })
    }

    /// All fields, in column order.
    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Get a field by position.
    #[inline]
    pub fn field(&self, position: usize) -> Option<&Field> {
        self.fields.get(position)
    }

    /// Get the position of a field by name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Get the number of columns in the schema.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no columns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Column data types, in order.
    pub fn data_types(&self) -> Vec<DataType> {
        self.fields.iter().map(|field| field.data_type).collect()
    }

    /// Descriptor text for this schema.
    pub fn schema_string(&self) -> String {
        let mut out = String::new();
        for field in &self.fields {
            let _ = writeln!(out, "{} {}", field.data_type.tag(), field.name);
        }
        out
    }

    /// Write the descriptor to `path`, replacing any previous one.
    pub fn write_descriptor<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(field) = self
            .fields
            .iter()
            .find(|field| field.name.contains(['\n', '\r']))
        {
            return Err(Error::InvalidArgument(format!(
                "column name {:?} contains a line break",
                field.name
            )));
        }
        fs::write(path, self.schema_string()).map_err(|e| Error::io(path, e))
    }

    /// Check a parsed descriptor against this schema, position by position.
    ///
    /// Names are compared first across all columns, then types.
    pub fn verify(&self, descriptor: &Descriptor) -> Result<()> {
        if descriptor.entries.len() != self.fields.len() {
            return Err(Error::ColumnCountMismatch {
                expected: self.fields.len(),
                found: descriptor.entries.len(),
            });
        }

        for (column, (field, entry)) in self.fields.iter().zip(&descriptor.entries).enumerate() {
            if field.name != entry.name {
                return Err(Error::ColumnNameMismatch {
                    column,
                    expected: field.name.clone(),
                    found: entry.name.clone(),
                });
            }
        }

        for (column, (field, entry)) in self.fields.iter().zip(&descriptor.entries).enumerate() {
            let compatible = DataType::from_tag(&entry.tag)
                .map(|found| found.is_compatible(&field.data_type))
                .unwrap_or(false);
            if !compatible {
                return Err(Error::TypeMismatch {
                    column,
                    expected: field.data_type.tag(),
                    found: entry.tag.clone(),
                });
            }
        }
        Ok(())
    }
}

/// One parsed descriptor line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorEntry {
    /// Type tag as written, not yet interpreted.
    pub tag: String,

    /// Column name; empty when the line has no space.
    pub name: String,

    /// 1-based line number in the file.
    pub line: usize,
}

/// The parsed contents of a descriptor file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Entries in column order.
    pub entries: Vec<DescriptorEntry>,
}

impl Descriptor {
    /// Parse descriptor text. Empty lines are skipped; a line holding only
    /// whitespace is an entry with an empty tag.
    pub fn parse(text: &str) -> Descriptor {
        let entries = text
            .lines()
            .enumerate()
            .filter_map(|(index, line)| {
                let line_text = line.strip_suffix('\r').unwrap_or(line);
                if line_text.is_empty() {
                    return None;
                }
                let (tag, name) = line_text.split_once(' ').unwrap_or((line_text, ""));
                Some(DescriptorEntry {
                    tag: tag.to_string(),
                    name: name.to_string(),
                    line: index + 1,
                })
            })
            .collect();
        Descriptor { entries }
    }

    /// `(tag, name)` pairs in column order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|entry| (entry.tag.as_str(), entry.name.as_str()))
    }

    /// Number of columns declared.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no columns are declared.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read and parse the descriptor file at `path`.
pub fn parse_descriptor<P: AsRef<Path>>(path: P) -> Result<Descriptor> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| Error::DescriptorRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Descriptor::parse(&text))
}
