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

//! Column construction. Builders are the only mutable stage of a column's
//! life: `append_*` grows geometrically, `finish` shrinks to fit and freezes.

use std::sync::Arc;

use crate::column::bitmap::BitmapBuilder;
use crate::column::nested::{ListArray, StructArray};
use crate::column::primitive::{PrimType, PrimitiveArray};
use crate::column::string::{CatArray, StrArray, NULL_CODE};
use crate::column::{Column, DataType, TimeUnit};
use crate::error::{Error, Result};
use crate::mem::AlignedVec;
use crate::value::Scalar;

// ---------------------------------------------------------------------------
// PrimBuilder
// ---------------------------------------------------------------------------

pub struct PrimBuilder<T> {
    values: AlignedVec<T>,
    validity: Option<BitmapBuilder>,
    len: usize,
}

impl<T: PrimType> PrimBuilder<T> {
    pub fn new() -> Self {
        PrimBuilder {
            values: AlignedVec::new(),
            validity: None,
            len: 0,
        }
    }

    pub fn with_capacity(n: usize) -> Result<Self> {
        Ok(PrimBuilder {
            values: AlignedVec::with_capacity(n)?,
            validity: None,
            len: 0,
        })
    }

    pub fn append_value(&mut self, v: T) -> Result<()> {
        self.values.push(v)?;
        if let Some(bits) = &mut self.validity {
            bits.push(true)?;
        }
        self.len += 1;
        Ok(())
    }

    pub fn append_null(&mut self) -> Result<()> {
        // Materialize the mask lazily on the first null.
        if self.validity.is_none() {
            let mut bits = BitmapBuilder::with_capacity(self.len + 1)?;
            bits.extend_set(self.len)?;
            self.validity = Some(bits);
        }
        self.values.push(T::zero())?;
        if let Some(bits) = &mut self.validity {
            bits.push(false)?;
        }
        self.len += 1;
        Ok(())
    }

    pub fn append_option(&mut self, v: Option<T>) -> Result<()> {
        match v {
            Some(v) => self.append_value(v),
            None => self.append_null(),
        }
    }

    pub fn append_slice(&mut self, values: &[T]) -> Result<()> {
        self.values.extend_from_slice(values)?;
        if let Some(bits) = &mut self.validity {
            bits.extend_set(values.len())?;
        }
        self.len += values.len();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn finish(mut self) -> Result<PrimitiveArray<T>> {
        self.values.shrink_to_fit()?;
        let validity = match self.validity {
            Some(bits) => Some(bits.finish()?),
            None => None,
        };
        Ok(PrimitiveArray::new(self.values.freeze(), validity))
    }
}

impl<T: PrimType> Default for PrimBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// StrBuilder
// ---------------------------------------------------------------------------

pub struct StrBuilder {
    offsets: AlignedVec<i32>,
    bytes: AlignedVec<u8>,
    validity: Option<BitmapBuilder>,
    len: usize,
}

impl StrBuilder {
    pub fn new() -> Self {
        let mut offsets = AlignedVec::new();
        // Cannot fail at minimum capacity.
        let _ = offsets.push(0);
        StrBuilder {
            offsets,
            bytes: AlignedVec::new(),
            validity: None,
            len: 0,
        }
    }

    pub fn with_capacity(n: usize) -> Result<Self> {
        let mut offsets = AlignedVec::with_capacity(n + 1)?;
        offsets.push(0)?;
        Ok(StrBuilder {
            offsets,
            bytes: AlignedVec::new(),
            validity: None,
            len: 0,
        })
    }

    pub fn append_value(&mut self, s: &str) -> Result<()> {
        if self.bytes.len() + s.len() > i32::MAX as usize {
            return Err(Error::shape(
                "string column exceeds the 2 GiB arena bound".to_string(),
            ));
        }
        self.bytes.extend_from_slice(s.as_bytes())?;
        self.offsets.push(self.bytes.len() as i32)?;
        if let Some(bits) = &mut self.validity {
            bits.push(true)?;
        }
        self.len += 1;
        Ok(())
    }

    pub fn append_null(&mut self) -> Result<()> {
        if self.validity.is_none() {
            let mut bits = BitmapBuilder::with_capacity(self.len + 1)?;
            bits.extend_set(self.len)?;
            self.validity = Some(bits);
        }
        self.offsets.push(self.bytes.len() as i32)?;
        if let Some(bits) = &mut self.validity {
            bits.push(false)?;
        }
        self.len += 1;
        Ok(())
    }

    pub fn append_option(&mut self, s: Option<&str>) -> Result<()> {
        match s {
            Some(s) => self.append_value(s),
            None => self.append_null(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn finish(mut self) -> Result<StrArray> {
        self.offsets.shrink_to_fit()?;
        self.bytes.shrink_to_fit()?;
        let validity = match self.validity {
            Some(bits) => Some(bits.finish()?),
            None => None,
        };
        StrArray::new(self.offsets.freeze(), self.bytes.freeze(), validity)
    }
}

impl Default for StrBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// CatBuilder
// ---------------------------------------------------------------------------

pub struct CatBuilder {
    codes: AlignedVec<u32>,
    dict: StrBuilder,
    index: crate::swiss::Map<String, u32>,
}

impl CatBuilder {
    pub fn new() -> Self {
        CatBuilder {
            codes: AlignedVec::new(),
            dict: StrBuilder::new(),
            index: crate::swiss::Map::new(),
        }
    }

    pub fn append_value(&mut self, s: &str) -> Result<()> {
        let code = match self.index.get(s) {
            Some(&code) => code,
            None => {
                let code = self.dict.len() as u32;
                self.dict.append_value(s)?;
                self.index.insert(s.to_string(), code)?;
                code
            }
        };
        self.codes.push(code)?;
        Ok(())
    }

    pub fn append_null(&mut self) -> Result<()> {
        self.codes.push(NULL_CODE)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn finish(mut self) -> Result<CatArray> {
        self.codes.shrink_to_fit()?;
        CatArray::new(self.codes.freeze(), Arc::new(self.dict.finish()?))
    }
}

impl Default for CatBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ListBuilder / StructBuilder
// ---------------------------------------------------------------------------

pub struct ListBuilder {
    offsets: AlignedVec<i32>,
    child: Box<ColumnBuilder>,
    validity: Option<BitmapBuilder>,
    len: usize,
}

impl ListBuilder {
    pub fn new(elem: &DataType) -> Result<Self> {
        let mut offsets = AlignedVec::new();
        offsets.push(0)?;
        Ok(ListBuilder {
            offsets,
            child: Box::new(ColumnBuilder::new(elem)?),
            validity: None,
            len: 0,
        })
    }

    pub fn append_list(&mut self, elems: &Column) -> Result<()> {
        self.child.append_column(elems)?;
        self.offsets.push(self.child.len() as i32)?;
        if let Some(bits) = &mut self.validity {
            bits.push(true)?;
        }
        self.len += 1;
        Ok(())
    }

    pub fn append_null(&mut self) -> Result<()> {
        if self.validity.is_none() {
            let mut bits = BitmapBuilder::with_capacity(self.len + 1)?;
            bits.extend_set(self.len)?;
            self.validity = Some(bits);
        }
        self.offsets.push(self.child.len() as i32)?;
        if let Some(bits) = &mut self.validity {
            bits.push(false)?;
        }
        self.len += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn finish(mut self) -> Result<ListArray> {
        self.offsets.shrink_to_fit()?;
        let child = self.child.finish()?;
        let validity = match self.validity {
            Some(bits) => Some(bits.finish()?),
            None => None,
        };
        ListArray::new(self.offsets.freeze(), child, validity)
    }
}

pub struct StructBuilder {
    fields: Vec<(String, ColumnBuilder)>,
    validity: Option<BitmapBuilder>,
    len: usize,
}

impl StructBuilder {
    pub fn new(fields: &[crate::column::Field]) -> Result<Self> {
        let mut builders = Vec::with_capacity(fields.len());
        for f in fields {
            builders.push((f.name.clone(), ColumnBuilder::new(&f.dtype)?));
        }
        Ok(StructBuilder {
            fields: builders,
            validity: None,
            len: 0,
        })
    }

    /// Append one row of field values, in field order.
    pub fn append_row(&mut self, values: &[Scalar]) -> Result<()> {
        if values.len() != self.fields.len() {
            return Err(Error::shape(format!(
                "struct row has {} values, expected {}",
                values.len(),
                self.fields.len()
            )));
        }
        for ((_, b), v) in self.fields.iter_mut().zip(values) {
            b.append_scalar(v)?;
        }
        if let Some(bits) = &mut self.validity {
            bits.push(true)?;
        }
        self.len += 1;
        Ok(())
    }

    pub fn append_null(&mut self) -> Result<()> {
        if self.validity.is_none() {
            let mut bits = BitmapBuilder::with_capacity(self.len + 1)?;
            bits.extend_set(self.len)?;
            self.validity = Some(bits);
        }
        for (_, b) in &mut self.fields {
            b.append_scalar(&Scalar::Null)?;
        }
        if let Some(bits) = &mut self.validity {
            bits.push(false)?;
        }
        self.len += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<StructArray> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for (name, b) in self.fields {
            fields.push((name, b.finish()?));
        }
        let validity = match self.validity {
            Some(bits) => Some(bits.finish()?),
            None => None,
        };
        StructArray::new(fields, validity)
    }
}

// ---------------------------------------------------------------------------
// ColumnBuilder — dtype-directed dispatcher
// ---------------------------------------------------------------------------

/// Builder for any column type, selected by [`DataType`].
pub enum ColumnBuilder {
    F64(PrimBuilder<f64>),
    F32(PrimBuilder<f32>),
    I64(PrimBuilder<i64>),
    I32(PrimBuilder<i32>),
    U64(PrimBuilder<u64>),
    U32(PrimBuilder<u32>),
    I8(PrimBuilder<i8>),
    U8(PrimBuilder<u8>),
    Bool(PrimBuilder<u8>),
    Str(StrBuilder),
    Cat(CatBuilder),
    List(ListBuilder),
    Struct(StructBuilder),
    Datetime(PrimBuilder<i64>, TimeUnit),
    Duration(PrimBuilder<i64>, TimeUnit),
}

impl ColumnBuilder {
    pub fn new(dtype: &DataType) -> Result<Self> {
        Self::with_capacity(dtype, 0)
    }

    pub fn with_capacity(dtype: &DataType, n: usize) -> Result<Self> {
        Ok(match dtype {
            DataType::F64 => ColumnBuilder::F64(PrimBuilder::with_capacity(n)?),
            DataType::F32 => ColumnBuilder::F32(PrimBuilder::with_capacity(n)?),
            DataType::I64 => ColumnBuilder::I64(PrimBuilder::with_capacity(n)?),
            DataType::I32 => ColumnBuilder::I32(PrimBuilder::with_capacity(n)?),
            DataType::U64 => ColumnBuilder::U64(PrimBuilder::with_capacity(n)?),
            DataType::U32 => ColumnBuilder::U32(PrimBuilder::with_capacity(n)?),
            DataType::I8 => ColumnBuilder::I8(PrimBuilder::with_capacity(n)?),
            DataType::U8 => ColumnBuilder::U8(PrimBuilder::with_capacity(n)?),
            DataType::Bool => ColumnBuilder::Bool(PrimBuilder::with_capacity(n)?),
            DataType::Str => ColumnBuilder::Str(StrBuilder::with_capacity(n)?),
            DataType::Categorical => ColumnBuilder::Cat(CatBuilder::new()),
            DataType::List(elem) => ColumnBuilder::List(ListBuilder::new(elem)?),
            DataType::Struct(fields) => ColumnBuilder::Struct(StructBuilder::new(fields)?),
            DataType::Datetime(u) => ColumnBuilder::Datetime(PrimBuilder::with_capacity(n)?, *u),
            DataType::Duration(u) => ColumnBuilder::Duration(PrimBuilder::with_capacity(n)?, *u),
        })
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnBuilder::F64(b) => b.len(),
            ColumnBuilder::F32(b) => b.len(),
            ColumnBuilder::I64(b) => b.len(),
            ColumnBuilder::I32(b) => b.len(),
            ColumnBuilder::U64(b) => b.len(),
            ColumnBuilder::U32(b) => b.len(),
            ColumnBuilder::I8(b) => b.len(),
            ColumnBuilder::U8(b) => b.len(),
            ColumnBuilder::Bool(b) => b.len(),
            ColumnBuilder::Str(b) => b.len(),
            ColumnBuilder::Cat(b) => b.len(),
            ColumnBuilder::List(b) => b.len(),
            ColumnBuilder::Struct(b) => b.len,
            ColumnBuilder::Datetime(b, _) => b.len(),
            ColumnBuilder::Duration(b, _) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn append_null(&mut self) -> Result<()> {
        self.append_scalar(&Scalar::Null)
    }

    /// Append one scalar; numeric scalars coerce to the builder's kind.
    pub fn append_scalar(&mut self, v: &Scalar) -> Result<()> {
        macro_rules! num {
            ($b:expr, $v:expr, $conv:ident, $native:ty) => {
                match $v {
                    Scalar::Null => $b.append_null(),
                    other => match other.$conv() {
                        Some(x) => $b.append_value(x as $native),
                        None => Err(Error::type_err(format!(
                            "cannot append {other:?} to a numeric column"
                        ))),
                    },
                }
            };
        }
        match self {
            ColumnBuilder::F64(b) => num!(b, v, to_f64, f64),
            ColumnBuilder::F32(b) => num!(b, v, to_f64, f32),
            ColumnBuilder::I64(b) => num!(b, v, to_i64, i64),
            ColumnBuilder::I32(b) => num!(b, v, to_i64, i32),
            ColumnBuilder::U64(b) => match v {
                Scalar::Null => b.append_null(),
                Scalar::U64(x) => b.append_value(*x),
                other => match other.to_i64() {
                    Some(x) if x >= 0 => b.append_value(x as u64),
                    _ => Err(Error::type_err(format!(
                        "cannot append {other:?} to a u64 column"
                    ))),
                },
            },
            ColumnBuilder::U32(b) => num!(b, v, to_i64, u32),
            ColumnBuilder::I8(b) => num!(b, v, to_i64, i8),
            ColumnBuilder::U8(b) => num!(b, v, to_i64, u8),
            ColumnBuilder::Bool(b) => match v {
                Scalar::Null => b.append_null(),
                Scalar::Bool(x) => b.append_value(*x as u8),
                other => Err(Error::type_err(format!(
                    "cannot append {other:?} to a bool column"
                ))),
            },
            ColumnBuilder::Str(b) => match v {
                Scalar::Null => b.append_null(),
                Scalar::Str(s) => b.append_value(s),
                other => Err(Error::type_err(format!(
                    "cannot append {other:?} to a str column"
                ))),
            },
            ColumnBuilder::Cat(b) => match v {
                Scalar::Null => b.append_null(),
                Scalar::Str(s) => b.append_value(s),
                other => Err(Error::type_err(format!(
                    "cannot append {other:?} to a categorical column"
                ))),
            },
            ColumnBuilder::List(b) => match v {
                Scalar::Null => b.append_null(),
                other => Err(Error::type_err(format!(
                    "cannot append scalar {other:?} to a list column"
                ))),
            },
            ColumnBuilder::Struct(b) => match v {
                Scalar::Null => b.append_null(),
                other => Err(Error::type_err(format!(
                    "cannot append scalar {other:?} to a struct column"
                ))),
            },
            ColumnBuilder::Datetime(b, _) | ColumnBuilder::Duration(b, _) => match v {
                Scalar::Null => b.append_null(),
                Scalar::Datetime(x, _) | Scalar::Duration(x, _) => b.append_value(*x),
                other => match other.to_i64() {
                    Some(x) => b.append_value(x),
                    None => Err(Error::type_err(format!(
                        "cannot append {other:?} to a temporal column"
                    ))),
                },
            },
        }
    }

    /// Bulk-append every row of `col`. The column type must match.
    pub fn append_column(&mut self, col: &Column) -> Result<()> {
        macro_rules! bulk {
            ($b:expr, $a:expr) => {{
                if $a.validity().is_none() {
                    $b.append_slice($a.values())
                } else {
                    for v in $a.iter() {
                        $b.append_option(v)?;
                    }
                    Ok(())
                }
            }};
        }
        match (self, col) {
            (ColumnBuilder::F64(b), Column::F64(a)) => bulk!(b, a),
            (ColumnBuilder::F32(b), Column::F32(a)) => bulk!(b, a),
            (ColumnBuilder::I64(b), Column::I64(a)) => bulk!(b, a),
            (ColumnBuilder::I32(b), Column::I32(a)) => bulk!(b, a),
            (ColumnBuilder::U64(b), Column::U64(a)) => bulk!(b, a),
            (ColumnBuilder::U32(b), Column::U32(a)) => bulk!(b, a),
            (ColumnBuilder::I8(b), Column::I8(a)) => bulk!(b, a),
            (ColumnBuilder::U8(b), Column::U8(a)) => bulk!(b, a),
            (ColumnBuilder::Bool(b), Column::Bool(a)) => bulk!(b, a),
            (ColumnBuilder::Datetime(b, _), Column::Datetime(a, _)) => bulk!(b, a),
            (ColumnBuilder::Duration(b, _), Column::Duration(a, _)) => bulk!(b, a),
            (ColumnBuilder::Str(b), Column::Str(a)) => {
                for s in a.iter() {
                    b.append_option(s)?;
                }
                Ok(())
            }
            (ColumnBuilder::Cat(b), Column::Cat(a)) => {
                for s in a.iter() {
                    match s {
                        Some(s) => b.append_value(s)?,
                        None => b.append_null()?,
                    }
                }
                Ok(())
            }
            (ColumnBuilder::List(b), Column::List(a)) => {
                for i in 0..a.len() {
                    match a.list_at(i) {
                        Some(elems) => b.append_list(&elems)?,
                        None => b.append_null()?,
                    }
                }
                Ok(())
            }
            (ColumnBuilder::Struct(b), Column::Struct(a)) => {
                for i in 0..a.len() {
                    if a.is_valid(i) {
                        let row: Vec<Scalar> =
                            a.fields().iter().map(|(_, c)| c.get(i)).collect();
                        b.append_row(&row)?;
                    } else {
                        b.append_null()?;
                    }
                }
                Ok(())
            }
            (_, col) => Err(Error::type_err(format!(
                "cannot append a {} column to this builder",
                col.dtype()
            ))),
        }
    }

    pub fn finish(self) -> Result<Column> {
        Ok(match self {
            ColumnBuilder::F64(b) => Column::F64(b.finish()?),
            ColumnBuilder::F32(b) => Column::F32(b.finish()?),
            ColumnBuilder::I64(b) => Column::I64(b.finish()?),
            ColumnBuilder::I32(b) => Column::I32(b.finish()?),
            ColumnBuilder::U64(b) => Column::U64(b.finish()?),
            ColumnBuilder::U32(b) => Column::U32(b.finish()?),
            ColumnBuilder::I8(b) => Column::I8(b.finish()?),
            ColumnBuilder::U8(b) => Column::U8(b.finish()?),
            ColumnBuilder::Bool(b) => Column::Bool(b.finish()?),
            ColumnBuilder::Str(b) => Column::Str(b.finish()?),
            ColumnBuilder::Cat(b) => Column::Cat(b.finish()?),
            ColumnBuilder::List(b) => Column::List(b.finish()?),
            ColumnBuilder::Struct(b) => Column::Struct(b.finish()?),
            ColumnBuilder::Datetime(b, u) => Column::Datetime(b.finish()?, u),
            ColumnBuilder::Duration(b, u) => Column::Duration(b.finish()?, u),
        })
    }
}
