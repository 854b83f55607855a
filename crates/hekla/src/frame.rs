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

//! Frames: ordered, uniquely named columns of one length.

use std::collections::HashMap;

use crate::column::builder::ColumnBuilder;
use crate::column::{Column, DataType, Field};
use crate::error::{Error, Result};
use crate::sort::SortKey;
use crate::value::Scalar;

/// Soft row target for one streaming batch.
pub const DEFAULT_BATCH_ROWS: usize = 64 * 1024;

/// Ordered `(name, type)` pairs of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema(pub Vec<Field>);

impl Schema {
    pub fn fields(&self) -> &[Field] {
        &self.0
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|f| f.name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|f| f.name == name)
    }

    pub fn dtype(&self, name: &str) -> Result<&DataType> {
        self.0
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.dtype)
            .ok_or_else(|| Error::schema(format!("column '{name}' not found")))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ordered list of named columns with identical length. Duplicate names are
/// rejected at construction; slices are zero-copy views.
#[derive(Debug, Clone)]
pub struct Frame {
    columns: Vec<(String, Column)>,
    nrows: usize,
}

impl Frame {
    /// Construct from `(name, column)` pairs.
    pub fn new(columns: Vec<(String, Column)>) -> Result<Frame> {
        let first = columns
            .first()
            .ok_or_else(|| Error::schema("cannot build a frame from zero columns"))?;
        let nrows = first.1.len();
        for (name, col) in &columns {
            if col.len() != nrows {
                return Err(Error::shape(format!(
                    "column '{name}' has length {} but expected {nrows}",
                    col.len()
                )));
            }
        }
        for (i, (name, _)) in columns.iter().enumerate() {
            if columns[..i].iter().any(|(n, _)| n == name) {
                return Err(Error::schema(format!("duplicate column '{name}'")));
            }
        }
        Ok(Frame { columns, nrows })
    }

    /// Convenience constructor from `(&str, Column)` pairs.
    pub fn from_columns(columns: Vec<(&str, Column)>) -> Result<Frame> {
        Frame::new(
            columns
                .into_iter()
                .map(|(n, c)| (n.to_string(), c))
                .collect(),
        )
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nrows == 0
    }

    pub fn schema(&self) -> Schema {
        Schema(
            self.columns
                .iter()
                .map(|(n, c)| Field::new(n.clone(), c.dtype()))
                .collect(),
        )
    }

    pub fn columns(&self) -> &[(String, Column)] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(n, _)| n == name)
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .ok_or_else(|| Error::schema(format!("column '{name}' not found")))
    }

    pub fn column_at(&self, idx: usize) -> &Column {
        &self.columns[idx].1
    }

    /// One row as scalars, in column order.
    pub fn row(&self, i: usize) -> Vec<Scalar> {
        self.columns.iter().map(|(_, c)| c.get(i)).collect()
    }

    // ---- Projection ------------------------------------------------------

    /// Pick columns by name, in the given order. Shares column buffers.
    pub fn select(&self, names: &[&str]) -> Result<Frame> {
        let mut out = Vec::with_capacity(names.len());
        for &name in names {
            out.push((name.to_string(), self.column(name)?.clone()));
        }
        Frame::new(out)
    }

    /// Drop columns by name; unknown names are an error.
    pub fn drop(&self, names: &[&str]) -> Result<Frame> {
        for &name in names {
            self.column(name)?;
        }
        let remaining: Vec<(String, Column)> = self
            .columns
            .iter()
            .filter(|(n, _)| !names.contains(&n.as_str()))
            .cloned()
            .collect();
        Frame::new(remaining)
    }

    /// Rename columns via `(old, new)` pairs.
    pub fn rename(&self, mapping: &[(&str, &str)]) -> Result<Frame> {
        let mut out = self.columns.clone();
        for &(old, new) in mapping {
            let idx = self
                .column_index(old)
                .ok_or_else(|| Error::schema(format!("column '{old}' not found")))?;
            out[idx].0 = new.to_string();
        }
        Frame::new(out)
    }

    /// Add or replace a column.
    pub fn with_column(&self, name: &str, col: Column) -> Result<Frame> {
        if col.len() != self.nrows {
            return Err(Error::shape(format!(
                "column '{name}' has length {} but the frame has {} rows",
                col.len(),
                self.nrows
            )));
        }
        let mut out = self.columns.clone();
        match self.column_index(name) {
            Some(idx) => out[idx].1 = col,
            None => out.push((name.to_string(), col)),
        }
        Frame::new(out)
    }

    // ---- Row windows -----------------------------------------------------

    /// Zero-copy row window `[offset, offset + len)`.
    pub fn slice(&self, offset: usize, len: usize) -> Frame {
        let offset = offset.min(self.nrows);
        let len = len.min(self.nrows - offset);
        Frame {
            columns: self
                .columns
                .iter()
                .map(|(n, c)| (n.clone(), c.slice(offset, len)))
                .collect(),
            nrows: len,
        }
    }

    pub fn head(&self, n: usize) -> Frame {
        self.slice(0, n)
    }

    pub fn tail(&self, n: usize) -> Frame {
        let n = n.min(self.nrows);
        self.slice(self.nrows - n, n)
    }

    // ---- Bulk row operations --------------------------------------------

    /// Select rows where `mask[i] != 0`. The index compaction runs once;
    /// every column gathers through the same index vector.
    pub fn filter_mask(&self, mask: &[u8]) -> Result<Frame> {
        if mask.len() != self.nrows {
            return Err(Error::shape(format!(
                "filter mask length {} does not match frame of {} rows",
                mask.len(),
                self.nrows
            )));
        }
        let mut indices = crate::mem::scratch().take_indices(mask.len());
        (crate::simd::dispatch().filter_indices)(mask, &mut indices);
        let mut out = Vec::with_capacity(self.columns.len());
        for (name, col) in &self.columns {
            out.push((name.clone(), col.gather(&indices)?));
        }
        crate::mem::scratch().recycle_indices(indices);
        Frame::new(out)
    }

    /// Row-indexed copy of every column.
    pub fn take(&self, indices: &[u32]) -> Result<Frame> {
        let mut out = Vec::with_capacity(self.columns.len());
        for (name, col) in &self.columns {
            out.push((name.clone(), col.gather(indices)?));
        }
        Frame::new(out)
    }

    /// Stack `other` below `self`; schemas must match exactly.
    pub fn vstack(&self, other: &Frame) -> Result<Frame> {
        if self.schema() != other.schema() {
            return Err(Error::schema(
                "vstack requires identical schemas".to_string(),
            ));
        }
        let mut out = Vec::with_capacity(self.columns.len());
        for ((name, a), (_, b)) in self.columns.iter().zip(other.columns.iter()) {
            out.push((name.clone(), Column::concat(&[a, b])?));
        }
        Frame::new(out)
    }

    /// Concatenate frames top to bottom.
    pub fn concat(frames: &[Frame]) -> Result<Frame> {
        let first = frames
            .first()
            .ok_or_else(|| Error::shape("concat of zero frames"))?;
        for f in frames {
            if f.schema() != first.schema() {
                return Err(Error::schema(
                    "concat requires identical schemas".to_string(),
                ));
            }
        }
        let mut out = Vec::with_capacity(first.columns.len());
        for i in 0..first.columns.len() {
            let parts: Vec<&Column> = frames.iter().map(|f| &f.columns[i].1).collect();
            out.push((first.columns[i].0.clone(), Column::concat(&parts)?));
        }
        Frame::new(out)
    }

    /// Stable sort by the named keys. A descending key reverses its whole
    /// comparison, nulls included; ties keep input order.
    pub fn sort(&self, by: &[&str], descending: &[bool]) -> Result<Frame> {
        if by.is_empty() {
            return Err(Error::schema("sort requires at least one key"));
        }
        let keys: Vec<SortKey<'_>> = by
            .iter()
            .enumerate()
            .map(|(i, name)| {
                Ok(SortKey {
                    column: self.column(name)?,
                    descending: descending.get(i).copied().unwrap_or(false),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let order = crate::sort::argsort_multi(&keys)?;
        self.take(&order)
    }

    /// Value equality across schema and rows.
    pub fn equals(&self, other: &Frame) -> bool {
        if self.schema() != other.schema() || self.nrows != other.nrows {
            return false;
        }
        for i in 0..self.columns.len() {
            let a = &self.columns[i].1;
            let b = &other.columns[i].1;
            for row in 0..self.nrows {
                if !a.eq_rows(row, b, row) {
                    return false;
                }
            }
        }
        true
    }

    // ---- Row ingestion ---------------------------------------------------

    /// Build a frame from name → value maps. Columns appear in first-seen
    /// order; missing keys become nulls. The first non-null value seeds each
    /// column's type; numeric values unify upward (any float means `f64`,
    /// integers unify to `i64`), anything else must match exactly.
    pub fn from_records(rows: &[HashMap<String, Scalar>]) -> Result<Frame> {
        let mut order: Vec<String> = Vec::new();
        for row in rows {
            // HashMap iteration order is arbitrary; sort new keys for a
            // stable schema.
            let mut new_keys: Vec<&String> =
                row.keys().filter(|k| !order.contains(*k)).collect();
            new_keys.sort();
            for k in new_keys {
                order.push(k.clone());
            }
        }
        if order.is_empty() {
            return Err(Error::schema("cannot infer a schema from empty records"));
        }

        let mut columns = Vec::with_capacity(order.len());
        for name in &order {
            let mut dtype: Option<DataType> = None;
            for row in rows {
                if let Some(v) = row.get(name) {
                    if let Some(vt) = v.dtype() {
                        dtype = Some(match dtype {
                            None => vt,
                            Some(cur) => unify_dtypes(&cur, &vt).ok_or_else(|| {
                                Error::schema(format!(
                                    "column '{name}' mixes incompatible types {cur} and {vt}"
                                ))
                            })?,
                        });
                    }
                }
            }
            // All-null columns default to f64.
            let dtype = dtype.unwrap_or(DataType::F64);
            let mut b = ColumnBuilder::with_capacity(&dtype, rows.len())?;
            for row in rows {
                match row.get(name) {
                    Some(v) => b.append_scalar(v)?,
                    None => b.append_null()?,
                }
            }
            columns.push((name.clone(), b.finish()?));
        }
        Frame::new(columns)
    }

    /// Build a frame from typed records.
    pub fn from_structs<T: Record>(rows: &[T]) -> Result<Frame> {
        let names = T::field_names();
        if names.is_empty() {
            return Err(Error::schema("record type declares no fields"));
        }
        let mut maps = Vec::with_capacity(rows.len());
        for row in rows {
            let values = row.values();
            if values.len() != names.len() {
                return Err(Error::shape(format!(
                    "record yields {} values but declares {} fields",
                    values.len(),
                    names.len()
                )));
            }
            let map: HashMap<String, Scalar> = names
                .iter()
                .map(|n| n.to_string())
                .zip(values)
                .collect();
            maps.push(map);
        }
        // Re-project into declared field order.
        let frame = Frame::from_records(&maps)?;
        frame.select(&names)
    }
}

/// Widening unification for record ingestion.
fn unify_dtypes(a: &DataType, b: &DataType) -> Option<DataType> {
    if a == b {
        return Some(a.clone());
    }
    if a.is_numeric() && b.is_numeric() {
        if a.is_float() || b.is_float() {
            return Some(DataType::F64);
        }
        return Some(DataType::I64);
    }
    None
}

/// Typed row source for [`Frame::from_structs`].
pub trait Record {
    fn field_names() -> Vec<&'static str>;
    fn values(&self) -> Vec<Scalar>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        Frame::from_columns(vec![
            ("id", Column::from_vec(vec![1i64, 2, 3, 4]).unwrap()),
            ("v", Column::from_vec(vec![1.5f64, 2.5, 3.5, 4.5]).unwrap()),
        ])
        .unwrap()
    }

    #[test]
    fn construction_invariants() {
        assert!(matches!(Frame::new(vec![]), Err(Error::Schema(_))));
        let bad = Frame::from_columns(vec![
            ("a", Column::from_vec(vec![1i64]).unwrap()),
            ("b", Column::from_vec(vec![1i64, 2]).unwrap()),
        ]);
        assert!(matches!(bad, Err(Error::Shape(_))));
        let dup = Frame::from_columns(vec![
            ("a", Column::from_vec(vec![1i64]).unwrap()),
            ("a", Column::from_vec(vec![2i64]).unwrap()),
        ]);
        assert!(matches!(dup, Err(Error::Schema(_))));
    }

    #[test]
    fn slicing_is_view() {
        let f = sample();
        let s = f.slice(1, 2);
        assert_eq!(s.nrows(), 2);
        assert_eq!(s.row(0), vec![Scalar::I64(2), Scalar::F64(2.5)]);
        assert_eq!(s.schema(), f.schema());
    }

    #[test]
    fn records_inference() {
        let mut r1 = HashMap::new();
        r1.insert("x".to_string(), Scalar::I64(1));
        r1.insert("y".to_string(), Scalar::from("a"));
        let mut r2 = HashMap::new();
        r2.insert("x".to_string(), Scalar::F64(2.5));
        let f = Frame::from_records(&[r1, r2]).unwrap();
        assert_eq!(f.schema().dtype("x").unwrap(), &DataType::F64);
        assert_eq!(f.schema().dtype("y").unwrap(), &DataType::Str);
        assert!(f.column("y").unwrap().get(1).is_null());
    }
}
