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

//! Scalar values: the unit of row-wise access, literals and ingestion.

use std::sync::Arc;

use crate::column::{DataType, TimeUnit};

/// A single typed value, or null.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    F64(f64),
    F32(f32),
    I64(i64),
    I32(i32),
    U64(u64),
    U32(u32),
    I8(i8),
    U8(u8),
    Str(Arc<str>),
    Datetime(i64, TimeUnit),
    Duration(i64, TimeUnit),
}

impl Scalar {
    /// Logical type of this value. `Null` has no type and returns `None`.
    pub fn dtype(&self) -> Option<DataType> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(DataType::Bool),
            Scalar::F64(_) => Some(DataType::F64),
            Scalar::F32(_) => Some(DataType::F32),
            Scalar::I64(_) => Some(DataType::I64),
            Scalar::I32(_) => Some(DataType::I32),
            Scalar::U64(_) => Some(DataType::U64),
            Scalar::U32(_) => Some(DataType::U32),
            Scalar::I8(_) => Some(DataType::I8),
            Scalar::U8(_) => Some(DataType::U8),
            Scalar::Str(_) => Some(DataType::Str),
            Scalar::Datetime(_, unit) => Some(DataType::Datetime(*unit)),
            Scalar::Duration(_, unit) => Some(DataType::Duration(*unit)),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Numeric view as f64, when the value is numeric.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Scalar::F64(v) => Some(*v),
            Scalar::F32(v) => Some(*v as f64),
            Scalar::I64(v) => Some(*v as f64),
            Scalar::I32(v) => Some(*v as f64),
            Scalar::U64(v) => Some(*v as f64),
            Scalar::U32(v) => Some(*v as f64),
            Scalar::I8(v) => Some(*v as f64),
            Scalar::U8(v) => Some(*v as f64),
            Scalar::Bool(v) => Some(*v as u8 as f64),
            _ => None,
        }
    }

    /// Numeric view as i64, when the value is an integer kind.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Scalar::I64(v) => Some(*v),
            Scalar::I32(v) => Some(*v as i64),
            Scalar::U32(v) => Some(*v as i64),
            Scalar::I8(v) => Some(*v as i64),
            Scalar::U8(v) => Some(*v as i64),
            Scalar::U64(v) => i64::try_from(*v).ok(),
            Scalar::Bool(v) => Some(*v as i64),
            Scalar::Datetime(v, _) | Scalar::Duration(v, _) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl std::hash::Hash for Scalar {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Scalar::Null => {}
            Scalar::Bool(v) => v.hash(state),
            // Floats hash their canonical bit pattern: -0.0 folds to 0.0.
            Scalar::F64(v) => {
                let v = if *v == 0.0 { 0.0 } else { *v };
                v.to_bits().hash(state)
            }
            Scalar::F32(v) => {
                let v = if *v == 0.0 { 0.0 } else { *v };
                v.to_bits().hash(state)
            }
            Scalar::I64(v) => v.hash(state),
            Scalar::I32(v) => v.hash(state),
            Scalar::U64(v) => v.hash(state),
            Scalar::U32(v) => v.hash(state),
            Scalar::I8(v) => v.hash(state),
            Scalar::U8(v) => v.hash(state),
            Scalar::Str(s) => s.hash(state),
            Scalar::Datetime(v, unit) | Scalar::Duration(v, unit) => {
                v.hash(state);
                unit.hash(state);
            }
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::F64(v) => write!(f, "{v}"),
            Scalar::F32(v) => write!(f, "{v}"),
            Scalar::I64(v) => write!(f, "{v}"),
            Scalar::I32(v) => write!(f, "{v}"),
            Scalar::U64(v) => write!(f, "{v}"),
            Scalar::U32(v) => write!(f, "{v}"),
            Scalar::I8(v) => write!(f, "{v}"),
            Scalar::U8(v) => write!(f, "{v}"),
            Scalar::Str(s) => write!(f, "{s}"),
            Scalar::Datetime(v, unit) => write!(f, "{v}{}", unit.suffix()),
            Scalar::Duration(v, unit) => write!(f, "{v}{}", unit.suffix()),
        }
    }
}

macro_rules! impl_scalar_from {
    ($($native:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$native> for Scalar {
                fn from(v: $native) -> Self {
                    Scalar::$variant(v)
                }
            }
        )*
    };
}

impl_scalar_from!(
    bool => Bool,
    f64 => F64,
    f32 => F32,
    i64 => I64,
    i32 => I32,
    u64 => U64,
    u32 => U32,
    i8 => I8,
    u8 => U8,
);

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(Arc::from(s))
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Str(Arc::from(s.as_str()))
    }
}

impl<T> From<Option<T>> for Scalar
where
    T: Into<Scalar>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Scalar::Null,
        }
    }
}
