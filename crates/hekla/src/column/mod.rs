//   Copyright (c) 2024-2026 Anton Kundenko <singaraiona@gmail.com>
//   All rights reserved.
//
//   Permission is hereby granted, free of charge, to any person obtaining a copy
//   of this software and associated documentation files (the "Software"), to deal
//   in the Software without restriction, including without limitation the rights
//   to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
//   copies of the Software, and to permit persons to whom the Software is
//   furnished to do so, subject to the following conditions:
//
//   The above copyright notice and this permission notice shall be included in all
//   copies or substantial portions of the Software.
//
//   THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
//   IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//   FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//   AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//   LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
//   OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
//   SOFTWARE.

//! Typed column storage.
//!
//! A [`Column`] owns exactly `len` logical elements in one of the engine's
//! storage layouts. Columns are immutable after construction: operations
//! yield new owned columns or zero-copy views over shared buffers. Mutation
//! happens only through the builders in [`builder`].

pub mod bitmap;
pub mod builder;
pub mod cast;
pub mod nested;
pub mod primitive;
pub mod string;

use std::sync::Arc;

pub use bitmap::{Bitmap, BitmapBuilder};
pub use nested::{ListArray, StructArray};
pub use primitive::{PrimKind, PrimType, PrimitiveArray};
pub use string::{CatArray, StrArray, NULL_CODE};

use crate::error::{Error, Result};
use crate::value::Scalar;

/// Hash assigned to null elements so they land in one key class.
pub const NULL_HASH: u64 = 0x2B1C_EE1D_9A8F_5D03;

// ---------------------------------------------------------------------------
// Logical types
// ---------------------------------------------------------------------------

/// Unit attached to `Datetime` and `Duration` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Seconds,
    Millis,
    Micros,
    Nanos,
}

impl TimeUnit {
    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Millis => "ms",
            TimeUnit::Micros => "us",
            TimeUnit::Nanos => "ns",
        }
    }
}

/// Named, typed column slot in a schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub dtype: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, dtype: DataType) -> Self {
        Field {
            name: name.into(),
            dtype,
        }
    }
}

/// Logical element type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    F64,
    F32,
    I64,
    I32,
    U64,
    U32,
    I8,
    U8,
    Bool,
    Str,
    Categorical,
    List(Box<DataType>),
    Struct(Vec<Field>),
    Datetime(TimeUnit),
    Duration(TimeUnit),
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::F64
                | DataType::F32
                | DataType::I64
                | DataType::I32
                | DataType::U64
                | DataType::U32
                | DataType::I8
                | DataType::U8
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::I64 | DataType::I32 | DataType::U64 | DataType::U32 | DataType::I8 | DataType::U8
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F64 | DataType::F32)
    }

    /// The physical primitive kind backing this logical type, when any.
    /// `Bool` is stored as `U8`, `Categorical` codes as `U32`,
    /// `Datetime`/`Duration` as `I64`.
    pub fn prim_kind(&self) -> Option<PrimKind> {
        match self {
            DataType::F64 => Some(PrimKind::F64),
            DataType::F32 => Some(PrimKind::F32),
            DataType::I64 | DataType::Datetime(_) | DataType::Duration(_) => Some(PrimKind::I64),
            DataType::I32 => Some(PrimKind::I32),
            DataType::U64 => Some(PrimKind::U64),
            DataType::U32 | DataType::Categorical => Some(PrimKind::U32),
            DataType::I8 => Some(PrimKind::I8),
            DataType::U8 | DataType::Bool => Some(PrimKind::U8),
            DataType::Str | DataType::List(_) | DataType::Struct(_) => None,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::F64 => f.write_str("f64"),
            DataType::F32 => f.write_str("f32"),
            DataType::I64 => f.write_str("i64"),
            DataType::I32 => f.write_str("i32"),
            DataType::U64 => f.write_str("u64"),
            DataType::U32 => f.write_str("u32"),
            DataType::I8 => f.write_str("i8"),
            DataType::U8 => f.write_str("u8"),
            DataType::Bool => f.write_str("bool"),
            DataType::Str => f.write_str("str"),
            DataType::Categorical => f.write_str("cat"),
            DataType::List(inner) => write!(f, "list[{inner}]"),
            DataType::Struct(fields) => {
                f.write_str("struct{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.dtype)?;
                }
                f.write_str("}")
            }
            DataType::Datetime(unit) => write!(f, "datetime[{}]", unit.suffix()),
            DataType::Duration(unit) => write!(f, "duration[{}]", unit.suffix()),
        }
    }
}

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// The owned unit of storage: one typed, immutable, optionally-nullable
/// vector of `len` elements.
#[derive(Clone, Debug)]
pub enum Column {
    F64(PrimitiveArray<f64>),
    F32(PrimitiveArray<f32>),
    I64(PrimitiveArray<i64>),
    I32(PrimitiveArray<i32>),
    U64(PrimitiveArray<u64>),
    U32(PrimitiveArray<u32>),
    I8(PrimitiveArray<i8>),
    U8(PrimitiveArray<u8>),
    /// Stored as `u8` with values 0/1, matching the kernels' mask layout.
    Bool(PrimitiveArray<u8>),
    Str(StrArray),
    Cat(CatArray),
    List(ListArray),
    Struct(StructArray),
    Datetime(PrimitiveArray<i64>, TimeUnit),
    Duration(PrimitiveArray<i64>, TimeUnit),
}

/// Apply `$f(arr, args..)` to the primitive payload of every primitive-backed
/// variant, rebuilding the same variant around the result.
macro_rules! map_prim {
    ($self:expr, $f:ident ( $($args:expr),* )) => {
        match $self {
            Column::F64(a) => Column::F64($f(a $(, $args)*)?),
            Column::F32(a) => Column::F32($f(a $(, $args)*)?),
            Column::I64(a) => Column::I64($f(a $(, $args)*)?),
            Column::I32(a) => Column::I32($f(a $(, $args)*)?),
            Column::U64(a) => Column::U64($f(a $(, $args)*)?),
            Column::U32(a) => Column::U32($f(a $(, $args)*)?),
            Column::I8(a) => Column::I8($f(a $(, $args)*)?),
            Column::U8(a) => Column::U8($f(a $(, $args)*)?),
            Column::Bool(a) => Column::Bool($f(a $(, $args)*)?),
            Column::Datetime(a, u) => Column::Datetime($f(a $(, $args)*)?, *u),
            Column::Duration(a, u) => Column::Duration($f(a $(, $args)*)?, *u),
            _ => unreachable!("map_prim on non-primitive column"),
        }
    };
}

/// Apply `$body` with `$arr` bound to the primitive payload, for read-only
/// operations whose result type does not depend on the element type.
macro_rules! with_prim_ref {
    ($self:expr, $arr:ident => $body:expr) => {
        match $self {
            Column::F64($arr) => $body,
            Column::F32($arr) => $body,
            Column::I64($arr) => $body,
            Column::I32($arr) => $body,
            Column::U64($arr) => $body,
            Column::U32($arr) => $body,
            Column::I8($arr) => $body,
            Column::U8($arr) => $body,
            Column::Bool($arr) => $body,
            Column::Datetime($arr, _) => $body,
            Column::Duration($arr, _) => $body,
            _ => unreachable!("with_prim_ref on non-primitive column"),
        }
    };
}

fn gather_prim<T: PrimType>(arr: &PrimitiveArray<T>, indices: &[u32]) -> Result<PrimitiveArray<T>> {
    let values = arr.values();
    let mut out = crate::mem::AlignedVec::with_capacity(indices.len())?;
    match arr.validity() {
        None => {
            let k = crate::simd::kernels::<T>();
            out.extend_with(indices.len(), T::zero())?;
            (k.gather)(values, indices, out.as_mut_slice());
            Ok(PrimitiveArray::new(out.freeze(), None))
        }
        Some(validity) => {
            let mut bits = BitmapBuilder::with_capacity(indices.len())?;
            for &i in indices {
                out.push(values[i as usize])?;
                bits.push(validity.get(i as usize))?;
            }
            Ok(PrimitiveArray::new(out.freeze(), Some(bits.finish()?)))
        }
    }
}

fn gather_opt_prim<T: PrimType>(
    arr: &PrimitiveArray<T>,
    indices: &[i32],
) -> Result<PrimitiveArray<T>> {
    let values = arr.values();
    let mut out = crate::mem::AlignedVec::with_capacity(indices.len())?;
    let mut bits = BitmapBuilder::with_capacity(indices.len())?;
    let mut any_null = false;
    for &i in indices {
        if i < 0 || !arr.is_valid(i as usize) {
            out.push(T::zero())?;
            bits.push(false)?;
            any_null = true;
        } else {
            out.push(values[i as usize])?;
            bits.push(true)?;
        }
    }
    Ok(PrimitiveArray::new(
        out.freeze(),
        if any_null { Some(bits.finish()?) } else { None },
    ))
}

impl Column {
    // ---- Constructors -----------------------------------------------------

    pub fn from_vec<T: PrimType>(values: Vec<T>) -> Result<Column> {
        Ok(T::wrap(PrimitiveArray::from_vec(values)?))
    }

    pub fn from_slice<T: PrimType>(values: &[T]) -> Result<Column> {
        Ok(T::wrap(PrimitiveArray::from_slice(values)?))
    }

    pub fn from_options<T: PrimType>(values: &[Option<T>]) -> Result<Column> {
        Ok(T::wrap(PrimitiveArray::from_options(values)?))
    }

    pub fn from_bools(values: &[bool]) -> Result<Column> {
        let raw: Vec<u8> = values.iter().map(|&b| b as u8).collect();
        Ok(Column::Bool(PrimitiveArray::from_vec(raw)?))
    }

    pub fn from_opt_bools(values: &[Option<bool>]) -> Result<Column> {
        let raw: Vec<Option<u8>> = values.iter().map(|v| v.map(|b| b as u8)).collect();
        Ok(Column::Bool(PrimitiveArray::from_options(&raw)?))
    }

    pub fn from_strs<S: AsRef<str>>(values: &[S]) -> Result<Column> {
        Ok(Column::Str(StrArray::from_strs(values)?))
    }

    pub fn from_opt_strs<S: AsRef<str>>(values: &[Option<S>]) -> Result<Column> {
        Ok(Column::Str(StrArray::from_opt_strs(values)?))
    }

    /// An empty column of the given type.
    pub fn empty(dtype: &DataType) -> Result<Column> {
        builder::ColumnBuilder::new(dtype)?.finish()
    }

    /// `len` copies of `value`, typed as `dtype`.
    pub fn full(value: &Scalar, len: usize, dtype: &DataType) -> Result<Column> {
        let mut b = builder::ColumnBuilder::new(dtype)?;
        for _ in 0..len {
            b.append_scalar(value)?;
        }
        b.finish()
    }

    // ---- Shape ------------------------------------------------------------

    pub fn len(&self) -> usize {
        match self {
            Column::Str(a) => a.len(),
            Column::Cat(a) => a.len(),
            Column::List(a) => a.len(),
            Column::Struct(a) => a.len(),
            other => with_prim_ref!(other, a => a.len()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DataType {
        match self {
            Column::F64(_) => DataType::F64,
            Column::F32(_) => DataType::F32,
            Column::I64(_) => DataType::I64,
            Column::I32(_) => DataType::I32,
            Column::U64(_) => DataType::U64,
            Column::U32(_) => DataType::U32,
            Column::I8(_) => DataType::I8,
            Column::U8(_) => DataType::U8,
            Column::Bool(_) => DataType::Bool,
            Column::Str(_) => DataType::Str,
            Column::Cat(_) => DataType::Categorical,
            Column::List(a) => DataType::List(Box::new(a.elem_dtype())),
            Column::Struct(a) => DataType::Struct(
                a.fields()
                    .iter()
                    .map(|(n, c)| Field::new(n.clone(), c.dtype()))
                    .collect(),
            ),
            Column::Datetime(_, u) => DataType::Datetime(*u),
            Column::Duration(_, u) => DataType::Duration(*u),
        }
    }

    pub fn null_count(&self) -> usize {
        match self {
            Column::Str(a) => a.null_count(),
            Column::Cat(a) => a.null_count(),
            Column::List(a) => a.null_count(),
            Column::Struct(a) => a.null_count(),
            other => with_prim_ref!(other, a => a.null_count()),
        }
    }

    pub fn is_valid(&self, i: usize) -> bool {
        match self {
            Column::Str(a) => a.is_valid(i),
            Column::Cat(a) => a.is_valid(i),
            Column::List(a) => a.is_valid(i),
            Column::Struct(a) => a.is_valid(i),
            other => with_prim_ref!(other, a => a.is_valid(i)),
        }
    }

    // ---- Element access ---------------------------------------------------

    pub fn get(&self, i: usize) -> Scalar {
        match self {
            Column::F64(a) => a.get(i).map_or(Scalar::Null, Scalar::F64),
            Column::F32(a) => a.get(i).map_or(Scalar::Null, Scalar::F32),
            Column::I64(a) => a.get(i).map_or(Scalar::Null, Scalar::I64),
            Column::I32(a) => a.get(i).map_or(Scalar::Null, Scalar::I32),
            Column::U64(a) => a.get(i).map_or(Scalar::Null, Scalar::U64),
            Column::U32(a) => a.get(i).map_or(Scalar::Null, Scalar::U32),
            Column::I8(a) => a.get(i).map_or(Scalar::Null, Scalar::I8),
            Column::U8(a) => a.get(i).map_or(Scalar::Null, Scalar::U8),
            Column::Bool(a) => a.get(i).map_or(Scalar::Null, |v| Scalar::Bool(v != 0)),
            Column::Str(a) => a.get(i).map_or(Scalar::Null, |s| Scalar::Str(Arc::from(s))),
            Column::Cat(a) => a.get(i).map_or(Scalar::Null, |s| Scalar::Str(Arc::from(s))),
            Column::List(_) | Column::Struct(_) => Scalar::Null,
            Column::Datetime(a, u) => a.get(i).map_or(Scalar::Null, |v| Scalar::Datetime(v, *u)),
            Column::Duration(a, u) => a.get(i).map_or(Scalar::Null, |v| Scalar::Duration(v, *u)),
        }
    }

    /// Typed access to the backing primitive array.
    pub fn prim<T: PrimType>(&self) -> Option<&PrimitiveArray<T>> {
        T::unwrap(self)
    }

    pub fn str_array(&self) -> Option<&StrArray> {
        match self {
            Column::Str(a) => Some(a),
            _ => None,
        }
    }

    pub fn list_array(&self) -> Option<&ListArray> {
        match self {
            Column::List(a) => Some(a),
            _ => None,
        }
    }

    pub fn struct_array(&self) -> Option<&StructArray> {
        match self {
            Column::Struct(a) => Some(a),
            _ => None,
        }
    }

    /// Bool column as a dense 0/1 mask; nulls count as 0 (filtered out).
    pub fn bool_mask(&self) -> Result<Vec<u8>> {
        match self {
            Column::Bool(a) => {
                let mut mask = a.values().to_vec();
                if let Some(validity) = a.validity() {
                    for (i, m) in mask.iter_mut().enumerate() {
                        if !validity.get(i) {
                            *m = 0;
                        }
                    }
                }
                Ok(mask)
            }
            other => Err(Error::type_err(format!(
                "expected bool mask, got {}",
                other.dtype()
            ))),
        }
    }

    // ---- Views ------------------------------------------------------------

    /// Zero-copy row window.
    pub fn slice(&self, offset: usize, len: usize) -> Column {
        match self {
            Column::F64(a) => Column::F64(a.slice(offset, len)),
            Column::F32(a) => Column::F32(a.slice(offset, len)),
            Column::I64(a) => Column::I64(a.slice(offset, len)),
            Column::I32(a) => Column::I32(a.slice(offset, len)),
            Column::U64(a) => Column::U64(a.slice(offset, len)),
            Column::U32(a) => Column::U32(a.slice(offset, len)),
            Column::I8(a) => Column::I8(a.slice(offset, len)),
            Column::U8(a) => Column::U8(a.slice(offset, len)),
            Column::Bool(a) => Column::Bool(a.slice(offset, len)),
            Column::Str(a) => Column::Str(a.slice(offset, len)),
            Column::Cat(a) => Column::Cat(a.slice(offset, len)),
            Column::List(a) => Column::List(a.slice(offset, len)),
            Column::Struct(a) => Column::Struct(a.slice(offset, len)),
            Column::Datetime(a, u) => Column::Datetime(a.slice(offset, len), *u),
            Column::Duration(a, u) => Column::Duration(a.slice(offset, len), *u),
        }
    }

    // ---- Bulk operations --------------------------------------------------

    /// Concatenate columns of one type into a new owned column.
    pub fn concat(cols: &[&Column]) -> Result<Column> {
        let first = cols
            .first()
            .ok_or_else(|| Error::shape("concat of zero columns"))?;
        let dtype = first.dtype();
        for c in cols {
            if c.dtype() != dtype {
                return Err(Error::type_err(format!(
                    "concat type mismatch: {} vs {}",
                    dtype,
                    c.dtype()
                )));
            }
        }
        let total: usize = cols.iter().map(|c| c.len()).sum();
        let mut b = builder::ColumnBuilder::with_capacity(&dtype, total)?;
        for c in cols {
            b.append_column(c)?;
        }
        b.finish()
    }

    /// Indexed copy: `out[k] = self[indices[k]]`.
    pub fn gather(&self, indices: &[u32]) -> Result<Column> {
        if let Some(&max) = indices.iter().max() {
            if max as usize >= self.len() {
                return Err(Error::internal(format!(
                    "gather index {max} out of bounds for column of {}",
                    self.len()
                )));
            }
        }
        match self {
            Column::Str(a) => {
                let mut b = builder::StrBuilder::with_capacity(indices.len())?;
                for &i in indices {
                    match a.get(i as usize) {
                        Some(s) => b.append_value(s)?,
                        None => b.append_null()?,
                    }
                }
                Ok(Column::Str(b.finish()?))
            }
            Column::Cat(a) => {
                let mut codes = crate::mem::AlignedVec::with_capacity(indices.len())?;
                for &i in indices {
                    codes.push(a.codes()[i as usize])?;
                }
                Ok(Column::Cat(CatArray::new(codes.freeze(), a.dict().clone())?))
            }
            Column::List(a) => {
                let rows: Vec<Option<Column>> =
                    indices.iter().map(|&i| a.list_at(i as usize)).collect();
                Ok(Column::List(ListArray::from_rows(&rows, &a.elem_dtype())?))
            }
            Column::Struct(a) => {
                let mut fields = Vec::with_capacity(a.fields().len());
                for (name, col) in a.fields() {
                    fields.push((name.clone(), col.gather(indices)?));
                }
                Ok(Column::Struct(StructArray::new(fields, None)?))
            }
            other => Ok(map_prim!(other, gather_prim(indices))),
        }
    }

    /// Indexed copy with a null sentinel: `-1` produces a null row.
    pub fn gather_opt(&self, indices: &[i32]) -> Result<Column> {
        match self {
            Column::Str(a) => {
                let mut b = builder::StrBuilder::with_capacity(indices.len())?;
                for &i in indices {
                    match if i < 0 { None } else { a.get(i as usize) } {
                        Some(s) => b.append_value(s)?,
                        None => b.append_null()?,
                    }
                }
                Ok(Column::Str(b.finish()?))
            }
            Column::Cat(a) => {
                let mut codes = crate::mem::AlignedVec::with_capacity(indices.len())?;
                for &i in indices {
                    codes.push(if i < 0 { NULL_CODE } else { a.codes()[i as usize] })?;
                }
                Ok(Column::Cat(CatArray::new(codes.freeze(), a.dict().clone())?))
            }
            Column::List(a) => {
                let rows: Vec<Option<Column>> = indices
                    .iter()
                    .map(|&i| if i < 0 { None } else { a.list_at(i as usize) })
                    .collect();
                Ok(Column::List(ListArray::from_rows(&rows, &a.elem_dtype())?))
            }
            Column::Struct(a) => {
                let mut fields = Vec::with_capacity(a.fields().len());
                for (name, col) in a.fields() {
                    fields.push((name.clone(), col.gather_opt(indices)?));
                }
                let mut bits = BitmapBuilder::with_capacity(indices.len())?;
                for &i in indices {
                    bits.push(i >= 0)?;
                }
                Ok(Column::Struct(StructArray::new(fields, Some(bits.finish()?))?))
            }
            other => Ok(map_prim!(other, gather_opt_prim(indices))),
        }
    }

    /// Select the rows where `mask[i] != 0`.
    pub fn filter(&self, mask: &[u8]) -> Result<Column> {
        if mask.len() != self.len() {
            return Err(Error::shape(format!(
                "filter mask length {} does not match column length {}",
                mask.len(),
                self.len()
            )));
        }
        let mut indices = crate::mem::scratch().take_indices(mask.len());
        (crate::simd::dispatch().filter_indices)(mask, &mut indices);
        let out = self.gather(&indices);
        crate::mem::scratch().recycle_indices(indices);
        out
    }

    // ---- Row equality and hashing ----------------------------------------

    /// Row-wise equality with null == null, used by grouping and joining.
    /// Both columns must share a dtype.
    pub fn eq_rows(&self, i: usize, other: &Column, j: usize) -> bool {
        match (self, other) {
            (Column::Str(a), Column::Str(b)) => a.get(i) == b.get(j),
            (Column::Cat(a), Column::Cat(b)) => a.get(i) == b.get(j),
            (Column::Bool(a), Column::Bool(b)) => a.get(i) == b.get(j),
            (Column::F64(a), Column::F64(b)) => match (a.get(i), b.get(j)) {
                (Some(x), Some(y)) => x.total_cmp(&y).is_eq(),
                (None, None) => true,
                _ => false,
            },
            (Column::F32(a), Column::F32(b)) => match (a.get(i), b.get(j)) {
                (Some(x), Some(y)) => x.total_cmp(&y).is_eq(),
                (None, None) => true,
                _ => false,
            },
            _ => self.get(i) == other.get(j),
        }
    }

    /// Write a 64-bit hash per element into `out`; nulls take [`NULL_HASH`].
    pub fn hash_into(&self, out: &mut [u64]) -> Result<()> {
        if out.len() != self.len() {
            return Err(Error::shape("hash output length mismatch"));
        }
        fn prim_hash<T: PrimType>(arr: &PrimitiveArray<T>, out: &mut [u64]) -> Result<()> {
            let k = crate::simd::kernels::<T>();
            (k.hash)(arr.values(), out);
            if let Some(validity) = arr.validity() {
                for (i, h) in out.iter_mut().enumerate() {
                    if !validity.get(i) {
                        *h = NULL_HASH;
                    }
                }
            }
            Ok(())
        }
        match self {
            Column::Str(a) => {
                for (i, h) in out.iter_mut().enumerate() {
                    *h = match a.get(i) {
                        Some(s) => crate::simd::hash::hash_bytes(s.as_bytes()),
                        None => NULL_HASH,
                    };
                }
                Ok(())
            }
            Column::Cat(a) => {
                // Hash dictionary values so arrays with different
                // dictionaries still agree.
                for (i, h) in out.iter_mut().enumerate() {
                    *h = match a.get(i) {
                        Some(s) => crate::simd::hash::hash_bytes(s.as_bytes()),
                        None => NULL_HASH,
                    };
                }
                Ok(())
            }
            Column::List(_) | Column::Struct(_) => Err(Error::type_err(
                "list and struct columns cannot be hashed as keys".to_string(),
            )),
            Column::F64(a) => prim_hash(a, out),
            Column::F32(a) => prim_hash(a, out),
            Column::I64(a) => prim_hash(a, out),
            Column::I32(a) => prim_hash(a, out),
            Column::U64(a) => prim_hash(a, out),
            Column::U32(a) => prim_hash(a, out),
            Column::I8(a) => prim_hash(a, out),
            Column::U8(a) => prim_hash(a, out),
            Column::Bool(a) => prim_hash(a, out),
            Column::Datetime(a, _) | Column::Duration(a, _) => prim_hash(a, out),
        }
    }
}
