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

//! Nested columns: lists of a child column and structs of named fields.

use std::sync::Arc;

use crate::column::bitmap::Bitmap;
use crate::column::{Column, DataType};
use crate::error::{Error, Result};
use crate::mem::Buffer;

// ---------------------------------------------------------------------------
// ListArray
// ---------------------------------------------------------------------------

/// Variable-length lists: `len + 1` non-decreasing `i32` offsets into a
/// contiguous child column. `offsets[0] == 0` at construction; slices keep
/// absolute offsets into the shared child.
#[derive(Clone, Debug)]
pub struct ListArray {
    offsets: Buffer<i32>,
    child: Arc<Column>,
    validity: Option<Bitmap>,
}

impl ListArray {
    pub fn new(offsets: Buffer<i32>, child: Column, validity: Option<Bitmap>) -> Result<Self> {
        if offsets.is_empty() {
            return Err(Error::internal("list column requires len + 1 offsets"));
        }
        let last = offsets[offsets.len() - 1];
        if last as usize > child.len() {
            return Err(Error::shape(format!(
                "list offsets end at {last} but child column has {} elements",
                child.len()
            )));
        }
        if offsets.as_slice().windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::internal("list offsets must be non-decreasing"));
        }
        if let Some(v) = &validity {
            if v.len() != offsets.len() - 1 {
                return Err(Error::shape("list validity length mismatch".to_string()));
            }
        }
        Ok(ListArray {
            offsets,
            child: Arc::new(child),
            validity,
        })
    }

    /// Build from per-row element vectors of an already-typed child.
    pub fn from_rows(rows: &[Option<Column>], elem: &DataType) -> Result<Self> {
        let mut offsets = crate::mem::AlignedVec::with_capacity(rows.len() + 1)?;
        offsets.push(0i32)?;
        let mut parts: Vec<Column> = Vec::new();
        let mut bits = crate::column::bitmap::BitmapBuilder::with_capacity(rows.len())?;
        let mut any_null = false;
        let mut total: i32 = 0;
        for row in rows {
            match row {
                Some(col) => {
                    if &col.dtype() != elem {
                        return Err(Error::type_err(format!(
                            "list element type {:?} does not match {:?}",
                            col.dtype(),
                            elem
                        )));
                    }
                    total += col.len() as i32;
                    parts.push(col.clone());
                    bits.push(true)?;
                }
                None => {
                    any_null = true;
                    bits.push(false)?;
                }
            }
            offsets.push(total)?;
        }
        let child = if parts.is_empty() {
            Column::empty(elem)?
        } else {
            let refs: Vec<&Column> = parts.iter().collect();
            Column::concat(&refs)?
        };
        ListArray::new(
            offsets.freeze(),
            child,
            if any_null { Some(bits.finish()?) } else { None },
        )
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn offsets(&self) -> &[i32] {
        self.offsets.as_slice()
    }

    pub fn child(&self) -> &Column {
        &self.child
    }

    pub fn elem_dtype(&self) -> DataType {
        self.child.dtype()
    }

    pub fn validity(&self) -> Option<&Bitmap> {
        self.validity.as_ref()
    }

    #[inline]
    pub fn is_valid(&self, i: usize) -> bool {
        self.validity.as_ref().map_or(true, |b| b.get(i))
    }

    /// Length of the list at row `i` (0 for null rows).
    #[inline]
    pub fn list_len(&self, i: usize) -> usize {
        (self.offsets[i + 1] - self.offsets[i]) as usize
    }

    /// Zero-copy view of the elements at row `i`.
    pub fn list_at(&self, i: usize) -> Option<Column> {
        if !self.is_valid(i) {
            return None;
        }
        let start = self.offsets[i] as usize;
        let len = self.list_len(i);
        Some(self.child.slice(start, len))
    }

    pub fn null_count(&self) -> usize {
        self.validity.as_ref().map_or(0, |b| b.count_zeros())
    }

    pub fn slice(&self, offset: usize, len: usize) -> Self {
        ListArray {
            offsets: self.offsets.slice(offset, len + 1),
            child: self.child.clone(),
            validity: self.validity.as_ref().map(|b| b.slice(offset, len)),
        }
    }
}

// ---------------------------------------------------------------------------
// StructArray
// ---------------------------------------------------------------------------

/// Ordered named fields, each a column of the struct's length.
#[derive(Clone, Debug)]
pub struct StructArray {
    fields: Vec<(String, Column)>,
    len: usize,
    validity: Option<Bitmap>,
}

impl StructArray {
    pub fn new(fields: Vec<(String, Column)>, validity: Option<Bitmap>) -> Result<Self> {
        if fields.is_empty() {
            return Err(Error::schema("struct column requires at least one field"));
        }
        let len = fields[0].1.len();
        for (name, col) in &fields {
            if col.len() != len {
                return Err(Error::shape(format!(
                    "struct field '{name}' has length {} but expected {len}",
                    col.len()
                )));
            }
        }
        for (i, (name, _)) in fields.iter().enumerate() {
            if fields[..i].iter().any(|(n, _)| n == name) {
                return Err(Error::schema(format!("duplicate struct field '{name}'")));
            }
        }
        if let Some(v) = &validity {
            if v.len() != len {
                return Err(Error::shape("struct validity length mismatch".to_string()));
            }
        }
        Ok(StructArray {
            fields,
            len,
            validity,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn fields(&self) -> &[(String, Column)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Column> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    pub fn validity(&self) -> Option<&Bitmap> {
        self.validity.as_ref()
    }

    #[inline]
    pub fn is_valid(&self, i: usize) -> bool {
        self.validity.as_ref().map_or(true, |b| b.get(i))
    }

    pub fn null_count(&self) -> usize {
        self.validity.as_ref().map_or(0, |b| b.count_zeros())
    }

    pub fn slice(&self, offset: usize, len: usize) -> Self {
        StructArray {
            fields: self
                .fields
                .iter()
                .map(|(n, c)| (n.clone(), c.slice(offset, len)))
                .collect(),
            len,
            validity: self.validity.as_ref().map(|b| b.slice(offset, len)),
        }
    }
}
