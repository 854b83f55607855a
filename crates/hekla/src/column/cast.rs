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

//! Explicit type conversion kernels.
//!
//! Semantics: float → integer truncates toward zero and maps out-of-range
//! (and NaN) to null; integer widening is exact; narrowing with loss is an
//! error unless `allow_lossy` is set, in which case values saturate at the
//! target bounds; integer → float rounds to nearest.

use crate::column::builder::{CatBuilder, PrimBuilder, StrBuilder};
use crate::column::primitive::{PrimType, PrimitiveArray};
use crate::column::{Column, DataType};
use crate::error::{Error, Result};

fn cast_prim<S: PrimType, U: PrimType>(
    arr: &PrimitiveArray<S>,
    allow_lossy: bool,
) -> Result<PrimitiveArray<U>> {
    let mut b = PrimBuilder::<U>::with_capacity(arr.len())?;
    for v in arr.iter() {
        let Some(v) = v else {
            b.append_null()?;
            continue;
        };
        if S::IS_FLOAT {
            if U::IS_FLOAT {
                b.append_value(U::from_f64(v.to_f64()))?;
            } else {
                let t = v.to_f64().trunc();
                if t.is_nan()
                    || t < U::min_value().as_i128() as f64
                    || t > U::max_value().as_i128() as f64
                {
                    b.append_null()?;
                } else {
                    b.append_value(U::from_f64(t))?;
                }
            }
        } else if U::IS_FLOAT {
            b.append_value(U::from_f64(v.to_f64()))?;
        } else {
            match U::from_i128(v.as_i128()) {
                Some(u) => b.append_value(u)?,
                None if allow_lossy => b.append_value(U::from_i128_sat(v.as_i128()))?,
                None => {
                    return Err(Error::arithmetic(format!(
                        "value {v} is out of range for cast {} -> {}",
                        S::dtype(),
                        U::dtype()
                    )))
                }
            }
        }
    }
    b.finish()
}

fn cast_prim_to<S: PrimType>(
    arr: &PrimitiveArray<S>,
    to: &DataType,
    allow_lossy: bool,
) -> Result<Column> {
    Ok(match to {
        DataType::F64 => Column::F64(cast_prim::<S, f64>(arr, allow_lossy)?),
        DataType::F32 => Column::F32(cast_prim::<S, f32>(arr, allow_lossy)?),
        DataType::I64 => Column::I64(cast_prim::<S, i64>(arr, allow_lossy)?),
        DataType::I32 => Column::I32(cast_prim::<S, i32>(arr, allow_lossy)?),
        DataType::U64 => Column::U64(cast_prim::<S, u64>(arr, allow_lossy)?),
        DataType::U32 => Column::U32(cast_prim::<S, u32>(arr, allow_lossy)?),
        DataType::I8 => Column::I8(cast_prim::<S, i8>(arr, allow_lossy)?),
        DataType::U8 => Column::U8(cast_prim::<S, u8>(arr, allow_lossy)?),
        DataType::Datetime(u) => Column::Datetime(cast_prim::<S, i64>(arr, allow_lossy)?, *u),
        DataType::Duration(u) => Column::Duration(cast_prim::<S, i64>(arr, allow_lossy)?, *u),
        DataType::Bool => {
            let mut b = PrimBuilder::<u8>::with_capacity(arr.len())?;
            for v in arr.iter() {
                match v {
                    None => b.append_null()?,
                    Some(v) => b.append_value((v.to_f64() != 0.0) as u8)?,
                }
            }
            Column::Bool(b.finish()?)
        }
        other => {
            return Err(Error::type_err(format!(
                "unsupported cast {} -> {}",
                S::dtype(),
                other
            )))
        }
    })
}

/// Render any column as strings.
fn cast_to_str(col: &Column) -> Result<Column> {
    let mut b = StrBuilder::with_capacity(col.len())?;
    for i in 0..col.len() {
        let v = col.get(i);
        if v.is_null() {
            b.append_null()?;
        } else {
            b.append_value(&v.to_string())?;
        }
    }
    Ok(Column::Str(b.finish()?))
}

/// Convert a column to `to`.
pub fn cast(col: &Column, to: &DataType, allow_lossy: bool) -> Result<Column> {
    if &col.dtype() == to {
        return Ok(col.clone());
    }
    match (col, to) {
        (_, DataType::Str) => cast_to_str(col),
        (Column::Str(a), DataType::Categorical) => {
            let mut b = CatBuilder::new();
            for s in a.iter() {
                match s {
                    Some(s) => b.append_value(s)?,
                    None => b.append_null()?,
                }
            }
            Ok(Column::Cat(b.finish()?))
        }
        (Column::F64(a), _) => cast_prim_to(a, to, allow_lossy),
        (Column::F32(a), _) => cast_prim_to(a, to, allow_lossy),
        (Column::I64(a), _) => cast_prim_to(a, to, allow_lossy),
        (Column::I32(a), _) => cast_prim_to(a, to, allow_lossy),
        (Column::U64(a), _) => cast_prim_to(a, to, allow_lossy),
        (Column::U32(a), _) => cast_prim_to(a, to, allow_lossy),
        (Column::I8(a), _) => cast_prim_to(a, to, allow_lossy),
        (Column::U8(a), _) => cast_prim_to(a, to, allow_lossy),
        (Column::Bool(a), _) if to.is_numeric() => cast_prim_to(a, to, allow_lossy),
        (Column::Datetime(a, _), _) | (Column::Duration(a, _), _)
            if to.is_numeric() || matches!(to, DataType::Datetime(_) | DataType::Duration(_)) =>
        {
            cast_prim_to(a, to, allow_lossy)
        }
        (_, _) => Err(Error::type_err(format!(
            "unsupported cast {} -> {}",
            col.dtype(),
            to
        ))),
    }
}

impl Column {
    /// Explicit conversion; see the module docs for semantics.
    pub fn cast(&self, to: &DataType, allow_lossy: bool) -> Result<Column> {
        cast(self, to, allow_lossy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_to_int_truncates_toward_zero() {
        let c = Column::from_vec(vec![1.9f64, -1.9, 0.5]).unwrap();
        let out = c.cast(&DataType::I64, false).unwrap();
        let a = out.prim::<i64>().unwrap();
        assert_eq!(a.values(), &[1, -1, 0]);
    }

    #[test]
    fn float_out_of_range_becomes_null() {
        let c = Column::from_vec(vec![1.0f64, 1e40, f64::NAN]).unwrap();
        let out = c.cast(&DataType::I32, false).unwrap();
        let a = out.prim::<i32>().unwrap();
        assert_eq!(a.get(0), Some(1));
        assert_eq!(a.get(1), None);
        assert_eq!(a.get(2), None);
    }

    #[test]
    fn lossy_narrowing_errors_without_flag() {
        let c = Column::from_vec(vec![1i64, 300]).unwrap();
        assert!(matches!(
            c.cast(&DataType::I8, false),
            Err(Error::Arithmetic(_))
        ));
        let out = c.cast(&DataType::I8, true).unwrap();
        assert_eq!(out.prim::<i8>().unwrap().values(), &[1, 127]);
    }

    #[test]
    fn widening_is_exact() {
        let c = Column::from_vec(vec![i32::MIN, -1, i32::MAX]).unwrap();
        let out = c.cast(&DataType::I64, false).unwrap();
        assert_eq!(
            out.prim::<i64>().unwrap().values(),
            &[i32::MIN as i64, -1, i32::MAX as i64]
        );
    }

    #[test]
    fn str_cat_round_trip() {
        let c = Column::from_opt_strs(&[Some("a"), None, Some("b"), Some("a")]).unwrap();
        let cat = c.cast(&DataType::Categorical, false).unwrap();
        assert_eq!(cat.dtype(), DataType::Categorical);
        let back = cat.cast(&DataType::Str, false).unwrap();
        assert_eq!(back.get(0), c.get(0));
        assert_eq!(back.get(1), crate::value::Scalar::Null);
        assert_eq!(back.get(3), c.get(3));
    }
}
