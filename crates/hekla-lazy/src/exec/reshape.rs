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

//! Long/wide reshaping: pivot and melt.

use hekla::column::builder::{ColumnBuilder, StrBuilder};
use hekla::groupby::{self, AggKind};
use hekla::{Column, DataType, Error, Frame, Result, Scalar};

/// Pivot long to wide: one output row per distinct `index` value, one output
/// column per distinct `column` value (first-seen order), cells aggregated
/// with `agg`; missing combinations are null.
pub fn pivot(
    frame: &Frame,
    index: &str,
    column: &str,
    values: &str,
    agg: &AggKind,
) -> Result<Frame> {
    let index_col = frame.column(index)?;
    let label_col = frame.column(column)?;
    let value_col = frame.column(values)?;

    // One row per (index, label) pair, in first-seen order.
    let pairs = groupby::group_by(
        &[index_col, label_col],
        &[(value_col, agg.clone())],
    )?;
    let pair_index = &pairs.keys[0];
    let pair_label = &pairs.keys[1];
    let pair_value = &pairs.aggs[0];

    // Dense positions for rows and columns of the wide output.
    let row_groups = groupby::compute_groups(&[pair_index])?;
    let col_groups = groupby::compute_groups(&[pair_label])?;
    let n_rows = row_groups.n_groups();
    let n_cols = col_groups.n_groups();

    let mut cells: Vec<Vec<Scalar>> = vec![vec![Scalar::Null; n_rows]; n_cols];
    for r in 0..pair_value.len() {
        let row = row_groups.ids[r] as usize;
        let col = col_groups.ids[r] as usize;
        cells[col][row] = pair_value.get(r);
    }

    let mut out: Vec<(String, Column)> = Vec::with_capacity(n_cols + 1);
    out.push((index.to_string(), pair_index.gather(&row_groups.first_rows)?));
    let value_dtype = agg.output_dtype(&value_col.dtype());
    for c in 0..n_cols {
        let label_row = col_groups.first_rows[c] as usize;
        let label = match pair_label.get(label_row) {
            Scalar::Null => "null".to_string(),
            other => other.to_string(),
        };
        let mut b = ColumnBuilder::with_capacity(&value_dtype, n_rows)?;
        for cell in &cells[c] {
            b.append_scalar(cell)?;
        }
        out.push((label, b.finish()?));
    }
    Frame::new(out)
}

/// Melt wide to long: id columns repeat per value column; `var_name` holds
/// the source column name, `value_name` the value (unified upward when the
/// value columns mix numeric types).
pub fn melt(
    frame: &Frame,
    id_vars: &[String],
    value_vars: &[String],
    var_name: &str,
    value_name: &str,
) -> Result<Frame> {
    if value_vars.is_empty() {
        return Err(Error::schema("melt requires at least one value column"));
    }
    for name in id_vars.iter().chain(value_vars) {
        frame.column(name)?;
    }

    // Unified value type.
    let mut value_dtype: Option<DataType> = None;
    for name in value_vars {
        let t = frame.column(name)?.dtype();
        value_dtype = Some(match value_dtype {
            None => t,
            Some(cur) => crate::expr::super_type(&cur, &t).ok_or_else(|| {
                Error::type_err(format!(
                    "melt value columns mix incompatible types {cur} and {t}"
                ))
            })?,
        });
    }
    let value_dtype = value_dtype.ok_or_else(|| Error::schema("melt requires value columns"))?;

    let n = frame.nrows();
    let mut id_cols: Vec<(String, ColumnBuilder)> = Vec::with_capacity(id_vars.len());
    for name in id_vars {
        let dtype = frame.column(name)?.dtype();
        id_cols.push((name.clone(), ColumnBuilder::with_capacity(&dtype, n * value_vars.len())?));
    }
    let mut variable = StrBuilder::with_capacity(n * value_vars.len())?;
    let mut value = ColumnBuilder::with_capacity(&value_dtype, n * value_vars.len())?;

    for var in value_vars {
        let source = frame.column(var)?.cast(&value_dtype, false)?;
        for (name, b) in id_cols.iter_mut() {
            b.append_column(frame.column(name)?)?;
        }
        for _ in 0..n {
            variable.append_value(var)?;
        }
        value.append_column(&source)?;
    }

    let mut out: Vec<(String, Column)> = Vec::with_capacity(id_vars.len() + 2);
    for (name, b) in id_cols {
        out.push((name, b.finish()?));
    }
    out.push((var_name.to_string(), Column::Str(variable.finish()?)));
    out.push((value_name.to_string(), value.finish()?));
    Frame::new(out)
}
