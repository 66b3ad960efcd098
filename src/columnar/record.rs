//! Statically typed rows.
//!
//! Columns are typed at runtime, but callers usually know their schema at
//! compile time. A [`Record`] is a tuple of [`Element`]s, one per column; it is
//! checked against the columns once, after which rows and column slices are
//! handed out as plain Rust tuples with no further tag checks.

use std::ops::Range;

use crate::columnar::column::AnyColumn;
use crate::columnar::types::{DataType, Element};
use crate::columnar::writer::ColumnSink;
use crate::error::{Error, Result};

/// A tuple of elements forming one row, e.g. `(u32, f64)`.
pub trait Record: Copy + Sized {
    /// One borrowed slice per column, e.g. `(&[u32], &[f64])`.
    type Slices<'a>: Copy;

    /// Number of columns.
    const WIDTH: usize;

    /// Column data types, in order.
    fn data_types() -> Vec<DataType>;

    /// Typed views of `range` in every column.
    fn slices(columns: &[AnyColumn], range: Range<usize>) -> Result<Self::Slices<'_>>;

    /// Copy row `index` out of the slices.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range of any slice.
    fn read(slices: &Self::Slices<'_>, index: usize) -> Self;

    /// Append this row to the column sinks, one element per sink.
    fn write_to(&self, sinks: &mut [ColumnSink]) -> Result<()>;
}

/// A tuple of column slices written together, e.g. `(&[u32], &[f64])`.
pub trait ColumnSlices: Copy {
    /// The row type the slices hold.
    type Record: Record;

    /// Length of every slice, in column order.
    fn lens(&self) -> Vec<usize>;

    /// Append the first `count` elements of every slice to the matching sink.
    fn write_to(&self, count: usize, sinks: &mut [ColumnSink]) -> Result<()>;
}

fn check_width(found: usize, expected: usize) -> Result<()> {
    if found == expected {
        Ok(())
    } else {
        Err(Error::ColumnCountMismatch { expected, found })
    }
}

fn typed_slice<T: Element>(
    columns: &[AnyColumn],
    position: usize,
    range: Range<usize>,
) -> Result<&[T]> {
    let column = columns[position].downcast_ref::<T>()?;
    let rows = column.len();
    column
        .as_slice()
        .get(range.clone())
        .ok_or(Error::RowIndexOutOfRange {
            index: range.end,
            rows,
        })
}

macro_rules! impl_record {
    ($width:expr; $($T:ident : $idx:tt),+) => {
        impl<$($T: Element),+> Record for ($($T,)+) {
            type Slices<'a> = ($(&'a [$T],)+);

            const WIDTH: usize = $width;

            fn data_types() -> Vec<DataType> {
                vec![$($T::DATA_TYPE),+]
            }

            fn slices(columns: &[AnyColumn], range: Range<usize>) -> Result<Self::Slices<'_>> {
                check_width(columns.len(), $width)?;
                Ok(($(typed_slice::<$T>(columns, $idx, range.clone())?,)+))
            }

            #[inline]
            fn read(slices: &Self::Slices<'_>, index: usize) -> Self {
                ($(slices.$idx[index],)+)
            }

            fn write_to(&self, sinks: &mut [ColumnSink]) -> Result<()> {
                check_width(sinks.len(), $width)?;
                $(sinks[$idx].write_values(std::slice::from_ref(&self.$idx))?;)+
                Ok(())
            }
        }

        impl<'a, $($T: Element),+> ColumnSlices for ($(&'a [$T],)+) {
            type Record = ($($T,)+);

            fn lens(&self) -> Vec<usize> {
                vec![$(self.$idx.len()),+]
            }

            fn write_to(&self, count: usize, sinks: &mut [ColumnSink]) -> Result<()> {
                check_width(sinks.len(), $width)?;
                $(sinks[$idx].write_values(&self.$idx[..count])?;)+
                Ok(())
            }
        }
    };
}

impl_record!(1; A: 0);
impl_record!(2; A: 0, B: 1);
impl_record!(3; A: 0, B: 1, C: 2);
impl_record!(4; A: 0, B: 1, C: 2, D: 3);
impl_record!(5; A: 0, B: 1, C: 2, D: 3, E: 4);
impl_record!(6; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
impl_record!(7; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
impl_record!(8; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);
impl_record!(9; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7, I: 8);
impl_record!(10; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7, I: 8, J: 9);
impl_record!(11; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7, I: 8, J: 9, K: 10);
impl_record!(12; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7, I: 8, J: 9, K: 10, L: 11);
