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

//! Primitive element kinds and densely packed primitive arrays.

use std::cmp::Ordering;

use crate::column::bitmap::Bitmap;
use crate::column::{Column, DataType};
use crate::error::Result;
use crate::mem::{AlignedVec, Buffer};

/// Physical primitive element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimKind {
    F64,
    F32,
    I64,
    I32,
    U64,
    U32,
    I8,
    U8,
}

impl PrimKind {
    pub const ALL: [PrimKind; 8] = [
        PrimKind::F64,
        PrimKind::F32,
        PrimKind::I64,
        PrimKind::I32,
        PrimKind::U64,
        PrimKind::U32,
        PrimKind::I8,
        PrimKind::U8,
    ];

    pub fn is_float(self) -> bool {
        matches!(self, PrimKind::F64 | PrimKind::F32)
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PrimKind::F64 | PrimKind::F32 | PrimKind::I64 | PrimKind::I32 | PrimKind::I8
        )
    }

    pub fn width(self) -> usize {
        match self {
            PrimKind::F64 | PrimKind::I64 | PrimKind::U64 => 8,
            PrimKind::F32 | PrimKind::I32 | PrimKind::U32 => 4,
            PrimKind::I8 | PrimKind::U8 => 1,
        }
    }
}

/// Native element type of a primitive column. Sealed: implemented exactly for
/// the eight machine kinds the kernel tables cover.
pub trait PrimType:
    Copy + PartialEq + PartialOrd + Send + Sync + std::fmt::Debug + std::fmt::Display + 'static
{
    const KIND: PrimKind;
    const IS_FLOAT: bool;

    fn dtype() -> DataType;
    fn wrap(arr: PrimitiveArray<Self>) -> Column;
    fn unwrap(col: &Column) -> Option<&PrimitiveArray<Self>>;

    /// Dispatch-table entry for this element type.
    fn kernels(d: &crate::simd::Dispatch) -> &crate::simd::Kernels<Self>;

    fn zero() -> Self;
    fn one() -> Self;
    fn min_value() -> Self;
    fn max_value() -> Self;

    fn to_f64(self) -> f64;
    fn from_f64(v: f64) -> Self;

    /// Integer view for exact range-checked casts. Meaningful for the
    /// integer kinds; floats truncate.
    fn as_i128(self) -> i128;
    /// Exact conversion from an integer; `None` when out of range.
    fn from_i128(v: i128) -> Option<Self>;
    /// Conversion from an integer, saturating at the type bounds.
    fn from_i128_sat(v: i128) -> Self;

    /// Total order; float NaN sorts after every other value.
    fn total_cmp(&self, other: &Self) -> Ordering;

    /// Element hash. Integers use a golden-ratio multiply with an xor-shift
    /// finalizer; floats hash the canonical bit pattern.
    fn hash_one(self) -> u64;

    // Arithmetic with engine semantics: wrapping for integers, IEEE for
    // floats, integer division by zero yields zero (callers reject zero
    // divisors where that must be an error).
    fn add_v(self, o: Self) -> Self;
    fn sub_v(self, o: Self) -> Self;
    fn mul_v(self, o: Self) -> Self;
    fn div_v(self, o: Self) -> Self;
    fn rem_v(self, o: Self) -> Self;

    fn min_v(self, o: Self) -> Self {
        if matches!(self.total_cmp(&o), Ordering::Greater) {
            o
        } else {
            self
        }
    }

    fn max_v(self, o: Self) -> Self {
        if matches!(self.total_cmp(&o), Ordering::Less) {
            o
        } else {
            self
        }
    }
}

#[inline]
pub(crate) fn hash_u64(x: u64) -> u64 {
    // Golden-ratio multiply with an xor-shift finalizer.
    let mut h = x.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    h ^= h >> 32;
    h = h.wrapping_mul(0xD6E8_FEB8_6659_FD93);
    h ^= h >> 32;
    h
}

macro_rules! impl_prim_int {
    ($native:ty, $kind:ident, $dtype:expr, $variant:ident, $table:ident) => {
        impl PrimType for $native {
            const KIND: PrimKind = PrimKind::$kind;
            const IS_FLOAT: bool = false;

            fn dtype() -> DataType {
                $dtype
            }

            fn wrap(arr: PrimitiveArray<Self>) -> Column {
                Column::$variant(arr)
            }

            fn unwrap(col: &Column) -> Option<&PrimitiveArray<Self>> {
                match col {
                    Column::$variant(a) => Some(a),
                    _ => None,
                }
            }

            fn kernels(d: &crate::simd::Dispatch) -> &crate::simd::Kernels<Self> {
                &d.$table
            }

            fn zero() -> Self {
                0
            }

            fn one() -> Self {
                1
            }

            fn min_value() -> Self {
                <$native>::MIN
            }

            fn max_value() -> Self {
                <$native>::MAX
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(v: f64) -> Self {
                v as $native
            }

            fn as_i128(self) -> i128 {
                self as i128
            }

            fn from_i128(v: i128) -> Option<Self> {
                <$native>::try_from(v).ok()
            }

            fn from_i128_sat(v: i128) -> Self {
                if v < <$native>::MIN as i128 {
                    <$native>::MIN
                } else if v > <$native>::MAX as i128 {
                    <$native>::MAX
                } else {
                    v as $native
                }
            }

            fn total_cmp(&self, other: &Self) -> Ordering {
                Ord::cmp(self, other)
            }

            fn hash_one(self) -> u64 {
                hash_u64(self as i64 as u64)
            }

            fn add_v(self, o: Self) -> Self {
                self.wrapping_add(o)
            }

            fn sub_v(self, o: Self) -> Self {
                self.wrapping_sub(o)
            }

            fn mul_v(self, o: Self) -> Self {
                self.wrapping_mul(o)
            }

            fn div_v(self, o: Self) -> Self {
                if o == 0 {
                    0
                } else {
                    self.wrapping_div(o)
                }
            }

            fn rem_v(self, o: Self) -> Self {
                if o == 0 {
                    0
                } else {
                    self.wrapping_rem(o)
                }
            }
        }
    };
}

macro_rules! impl_prim_float {
    ($native:ty, $kind:ident, $dtype:expr, $variant:ident, $table:ident) => {
        impl PrimType for $native {
            const KIND: PrimKind = PrimKind::$kind;
            const IS_FLOAT: bool = true;

            fn dtype() -> DataType {
                $dtype
            }

            fn wrap(arr: PrimitiveArray<Self>) -> Column {
                Column::$variant(arr)
            }

            fn unwrap(col: &Column) -> Option<&PrimitiveArray<Self>> {
                match col {
                    Column::$variant(a) => Some(a),
                    _ => None,
                }
            }

            fn kernels(d: &crate::simd::Dispatch) -> &crate::simd::Kernels<Self> {
                &d.$table
            }

            fn zero() -> Self {
                0.0
            }

            fn one() -> Self {
                1.0
            }

            fn min_value() -> Self {
                <$native>::NEG_INFINITY
            }

            fn max_value() -> Self {
                <$native>::INFINITY
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(v: f64) -> Self {
                v as $native
            }

            fn as_i128(self) -> i128 {
                self as i128
            }

            fn from_i128(v: i128) -> Option<Self> {
                Some(v as $native)
            }

            fn from_i128_sat(v: i128) -> Self {
                v as $native
            }

            fn total_cmp(&self, other: &Self) -> Ordering {
                match self.partial_cmp(other) {
                    Some(ord) => ord,
                    // NaN sorts last.
                    None => {
                        if self.is_nan() && other.is_nan() {
                            Ordering::Equal
                        } else if self.is_nan() {
                            Ordering::Greater
                        } else {
                            Ordering::Less
                        }
                    }
                }
            }

            fn hash_one(self) -> u64 {
                // Canonicalize: -0.0 folds to 0.0, every NaN to one pattern.
                let canon = if self == 0.0 {
                    0.0
                } else if self.is_nan() {
                    <$native>::NAN
                } else {
                    self
                };
                hash_u64(canon.to_bits() as u64)
            }

            fn add_v(self, o: Self) -> Self {
                self + o
            }

            fn sub_v(self, o: Self) -> Self {
                self - o
            }

            fn mul_v(self, o: Self) -> Self {
                self * o
            }

            fn div_v(self, o: Self) -> Self {
                self / o
            }

            fn rem_v(self, o: Self) -> Self {
                self % o
            }
        }
    };
}

impl_prim_int!(i64, I64, DataType::I64, I64, ki64);
impl_prim_int!(i32, I32, DataType::I32, I32, ki32);
impl_prim_int!(u64, U64, DataType::U64, U64, ku64);
impl_prim_int!(u32, U32, DataType::U32, U32, ku32);
impl_prim_int!(i8, I8, DataType::I8, I8, ki8);
impl_prim_int!(u8, U8, DataType::U8, U8, ku8);
impl_prim_float!(f64, F64, DataType::F64, F64, kf64);
impl_prim_float!(f32, F32, DataType::F32, F32, kf32);

// ---------------------------------------------------------------------------
// PrimitiveArray
// ---------------------------------------------------------------------------

/// Densely packed values plus an optional validity mask. A missing mask means
/// the column is known all-valid.
#[derive(Clone, Debug)]
pub struct PrimitiveArray<T: Copy> {
    values: Buffer<T>,
    validity: Option<Bitmap>,
}

impl<T: PrimType> PrimitiveArray<T> {
    pub fn new(values: Buffer<T>, validity: Option<Bitmap>) -> Self {
        if let Some(v) = &validity {
            assert_eq!(v.len(), values.len(), "validity length mismatch");
        }
        PrimitiveArray { values, validity }
    }

    pub fn from_vec(values: Vec<T>) -> Result<Self> {
        Ok(PrimitiveArray {
            values: Buffer::from_slice(&values)?,
            validity: None,
        })
    }

    pub fn from_slice(values: &[T]) -> Result<Self> {
        Ok(PrimitiveArray {
            values: Buffer::from_slice(values)?,
            validity: None,
        })
    }

    pub fn from_options(values: &[Option<T>]) -> Result<Self> {
        let mut data = AlignedVec::with_capacity(values.len())?;
        let mut any_null = false;
        let mut bits = crate::column::bitmap::BitmapBuilder::with_capacity(values.len())?;
        for v in values {
            match v {
                Some(v) => {
                    data.push(*v)?;
                    bits.push(true)?;
                }
                None => {
                    data.push(T::zero())?;
                    bits.push(false)?;
                    any_null = true;
                }
            }
        }
        Ok(PrimitiveArray {
            values: data.freeze(),
            validity: if any_null { Some(bits.finish()?) } else { None },
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[T] {
        self.values.as_slice()
    }

    pub fn values_buffer(&self) -> &Buffer<T> {
        &self.values
    }

    pub fn validity(&self) -> Option<&Bitmap> {
        self.validity.as_ref()
    }

    #[inline]
    pub fn is_valid(&self, i: usize) -> bool {
        self.validity.as_ref().map_or(true, |b| b.get(i))
    }

    #[inline]
    pub fn get(&self, i: usize) -> Option<T> {
        if self.is_valid(i) {
            Some(self.values[i])
        } else {
            None
        }
    }

    pub fn null_count(&self) -> usize {
        self.validity.as_ref().map_or(0, |b| b.count_zeros())
    }

    pub fn slice(&self, offset: usize, len: usize) -> Self {
        PrimitiveArray {
            values: self.values.slice(offset, len),
            validity: self.validity.as_ref().map(|b| b.slice(offset, len)),
        }
    }

    /// Iterator of `Option<T>` in row order.
    pub fn iter(&self) -> impl Iterator<Item = Option<T>> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    /// Replace the validity mask. The new mask length must match.
    pub fn with_validity(&self, validity: Option<Bitmap>) -> Self {
        if let Some(v) = &validity {
            assert_eq!(v.len(), self.len());
        }
        PrimitiveArray {
            values: self.values.clone(),
            validity,
        }
    }
}
