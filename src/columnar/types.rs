//! Element types and their on-disk type tags.
//!
//! Every column stores one fixed-width scalar type. The descriptor records the
//! type as a tag string (`uint32`, `float64`, ...). Two types are compatible when
//! they have the same width and the same numeric kind, which lets a `usize`
//! column written on a 64-bit platform be read back as `u64`.

use std::fmt;

use bytemuck::Pod;

/// Numeric kind of an element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Unsigned integer.
    UnsignedInt,

    /// Signed integer.
    SignedInt,

    /// IEEE 754 floating point.
    Float,

    /// Opaque fixed-size bytes.
    Bytes,
}

/// Data types storable in a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 8-bit unsigned integer
    UInt8,

    /// 8-bit signed integer
    Int8,

    /// 16-bit unsigned integer
    UInt16,

    /// 16-bit signed integer
    Int16,

    /// 32-bit unsigned integer
    UInt32,

    /// 32-bit signed integer
    Int32,

    /// 64-bit unsigned integer
    UInt64,

    /// 64-bit signed integer
    Int64,

    /// 32-bit floating point
    Float32,

    /// 64-bit floating point
    Float64,

    /// Fixed-size opaque bytes, tagged `bytesN`
    Bytes(usize),
}

impl DataType {
    /// Get the size of the data type in bytes.
    pub const fn size(&self) -> usize {
        match self {
            DataType::UInt8 | DataType::Int8 => 1,
            DataType::UInt16 | DataType::Int16 => 2,
            DataType::UInt32 | DataType::Int32 | DataType::Float32 => 4,
            DataType::UInt64 | DataType::Int64 | DataType::Float64 => 8,
            DataType::Bytes(size) => *size,
        }
    }

    /// Get the numeric kind of the data type.
    pub const fn kind(&self) -> ElementKind {
        match self {
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
                ElementKind::UnsignedInt
            }
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
                ElementKind::SignedInt
            }
            DataType::Float32 | DataType::Float64 => ElementKind::Float,
            DataType::Bytes(_) => ElementKind::Bytes,
        }
    }

    /// The canonical descriptor tag.
    pub fn tag(&self) -> String {
        match self {
            DataType::UInt8 => "uint8".to_string(),
            DataType::Int8 => "int8".to_string(),
            DataType::UInt16 => "uint16".to_string(),
            DataType::Int16 => "int16".to_string(),
            DataType::UInt32 => "uint32".to_string(),
            DataType::Int32 => "int32".to_string(),
            DataType::UInt64 => "uint64".to_string(),
            DataType::Int64 => "int64".to_string(),
            DataType::Float32 => "float32".to_string(),
            DataType::Float64 => "float64".to_string(),
            DataType::Bytes(size) => format!("bytes{size}"),
        }
    }

    /// Parse a descriptor tag. Returns `None` for unknown tags and for `bytes0`.
    pub fn from_tag(tag: &str) -> Option<DataType> {
        let data_type = match tag {
            "uint8" => DataType::UInt8,
            "int8" => DataType::Int8,
            "uint16" => DataType::UInt16,
            "int16" => DataType::Int16,
            "uint32" => DataType::UInt32,
            "int32" => DataType::Int32,
            "uint64" => DataType::UInt64,
            "int64" => DataType::Int64,
            "float32" => DataType::Float32,
            "float64" => DataType::Float64,
            other => {
                let size: usize = other.strip_prefix("bytes")?.parse().ok()?;
                if size == 0 {
                    return None;
                }
                DataType::Bytes(size)
            }
        };
        Some(data_type)
    }

    /// Same width and same kind.
    #[inline]
    pub fn is_compatible(&self, other: &DataType) -> bool {
        self.size() == other.size() && self.kind() == other.kind()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// A fixed-width scalar that can live in a mapped column.
///
/// `Pod` guarantees that every bit pattern read from a file is a valid value.
pub trait Element: Pod + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Type written to and checked against the descriptor.
    const DATA_TYPE: DataType;
}

macro_rules! impl_element {
    ($($ty:ty => $data_type:expr),+ $(,)?) => {
        $(
            impl Element for $ty {
                const DATA_TYPE: DataType = $data_type;
            }
        )+
    };
}

impl_element! {
    u8 => DataType::UInt8,
    i8 => DataType::Int8,
    u16 => DataType::UInt16,
    i16 => DataType::Int16,
    u32 => DataType::UInt32,
    i32 => DataType::Int32,
    u64 => DataType::UInt64,
    i64 => DataType::Int64,
    f32 => DataType::Float32,
    f64 => DataType::Float64,
}

#[cfg(target_pointer_width = "64")]
impl_element! {
    usize => DataType::UInt64,
    isize => DataType::Int64,
}

#[cfg(target_pointer_width = "32")]
impl_element! {
    usize => DataType::UInt32,
    isize => DataType::Int32,
}

impl<const N: usize> Element for [u8; N] {
    const DATA_TYPE: DataType = DataType::Bytes(N);
}

/// A single element copied out of a column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    UInt8(u8),
    Int8(i8),
    UInt16(u16),
    Int16(i16),
    UInt32(u32),
    Int32(i32),
    UInt64(u64),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bytes(Vec<u8>),
}

/// One row, one value per column in schema order.
pub type Row = Vec<Value>;

impl Value {
    /// The data type this value carries.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::UInt8(_) => DataType::UInt8,
            Value::Int8(_) => DataType::Int8,
            Value::UInt16(_) => DataType::UInt16,
            Value::Int16(_) => DataType::Int16,
            Value::UInt32(_) => DataType::UInt32,
            Value::Int32(_) => DataType::Int32,
            Value::UInt64(_) => DataType::UInt64,
            Value::Int64(_) => DataType::Int64,
            Value::Float32(_) => DataType::Float32,
            Value::Float64(_) => DataType::Float64,
            Value::Bytes(bytes) => DataType::Bytes(bytes.len()),
        }
    }

    /// Decode one element of `data_type` from native-endian bytes.
    ///
    /// `bytes` must be exactly `data_type.size()` long.
    pub(crate) fn from_ne_bytes(data_type: DataType, bytes: &[u8]) -> Value {
        debug_assert_eq!(bytes.len(), data_type.size());
        match data_type {
            DataType::UInt8 => Value::UInt8(bytes[0]),
            DataType::Int8 => Value::Int8(bytes[0] as i8),
            DataType::UInt16 => Value::UInt16(bytemuck::pod_read_unaligned(bytes)),
            DataType::Int16 => Value::Int16(bytemuck::pod_read_unaligned(bytes)),
            DataType::UInt32 => Value::UInt32(bytemuck::pod_read_unaligned(bytes)),
            DataType::Int32 => Value::Int32(bytemuck::pod_read_unaligned(bytes)),
            DataType::UInt64 => Value::UInt64(bytemuck::pod_read_unaligned(bytes)),
            DataType::Int64 => Value::Int64(bytemuck::pod_read_unaligned(bytes)),
            DataType::Float32 => Value::Float32(bytemuck::pod_read_unaligned(bytes)),
            DataType::Float64 => Value::Float64(bytemuck::pod_read_unaligned(bytes)),
            DataType::Bytes(_) => Value::Bytes(bytes.to_vec()),
        }
    }

    /// Native-endian encoding of the value.
    pub(crate) fn as_ne_bytes(&self) -> &[u8] {
        match self {
            Value::UInt8(v) => bytemuck::bytes_of(v),
            Value::Int8(v) => bytemuck::bytes_of(v),
            Value::UInt16(v) => bytemuck::bytes_of(v),
            Value::Int16(v) => bytemuck::bytes_of(v),
            Value::UInt32(v) => bytemuck::bytes_of(v),
            Value::Int32(v) => bytemuck::bytes_of(v),
            Value::UInt64(v) => bytemuck::bytes_of(v),
            Value::Int64(v) => bytemuck::bytes_of(v),
            Value::Float32(v) => bytemuck::bytes_of(v),
            Value::Float64(v) => bytemuck::bytes_of(v),
            Value::Bytes(bytes) => bytes.as_slice(),
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )+
    };
}

impl_value_from! {
    u8 => UInt8,
    i8 => Int8,
    u16 => UInt16,
    i16 => Int16,
    u32 => UInt32,
    i32 => Int32,
    u64 => UInt64,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
}
