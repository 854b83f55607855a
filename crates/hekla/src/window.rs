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

//! Window, cumulative and ranking kernels over full columns.
//!
//! All kernels are null-aware: null inputs yield null outputs and are
//! skipped by running accumulators. `min_periods` gates how many valid
//! elements a window needs before emitting a value. `rolling_min`/`max` use
//! a monotonic deque and run in O(n); `rolling_sum`/`mean` use a running
//! sum.

use std::collections::VecDeque;

use crate::column::builder::PrimBuilder;
use crate::column::{Column, DataType, PrimType, PrimitiveArray};
use crate::error::{Error, Result};
use crate::value::Scalar;

macro_rules! per_numeric {
    ($col:expr, $f:ident ( $($args:expr),* )) => {
        match $col {
            Column::F64(a) => Column::F64($f(a $(, $args)*)?),
            Column::F32(a) => Column::F32($f(a $(, $args)*)?),
            Column::I64(a) => Column::I64($f(a $(, $args)*)?),
            Column::I32(a) => Column::I32($f(a $(, $args)*)?),
            Column::U64(a) => Column::U64($f(a $(, $args)*)?),
            Column::U32(a) => Column::U32($f(a $(, $args)*)?),
            Column::I8(a) => Column::I8($f(a $(, $args)*)?),
            Column::U8(a) => Column::U8($f(a $(, $args)*)?),
            other => {
                return Err(Error::type_err(format!(
                    "window kernel requires a numeric column, got {}",
                    other.dtype()
                )))
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Shift family
// ---------------------------------------------------------------------------

/// Shift rows by `offset` (positive = lag, negative = lead); vacated rows
/// take `default` (null when absent).
pub fn shift(col: &Column, offset: i64, default: Option<&Scalar>) -> Result<Column> {
    let n = col.len() as i64;
    let dtype = col.dtype();
    let mut b = crate::column::builder::ColumnBuilder::with_capacity(&dtype, col.len())?;
    for i in 0..n {
        let src = i - offset;
        if src < 0 || src >= n {
            match default {
                Some(v) => b.append_scalar(v)?,
                None => b.append_null()?,
            }
        } else {
            b.append_scalar(&col.get(src as usize))?;
        }
    }
    b.finish()
}

fn diff_prim<T: PrimType>(a: &PrimitiveArray<T>, n: i64) -> Result<PrimitiveArray<T>> {
    let len = a.len() as i64;
    let mut b = PrimBuilder::<T>::with_capacity(a.len())?;
    for i in 0..len {
        let src = i - n;
        let out = if src < 0 || src >= len {
            None
        } else {
            match (a.get(i as usize), a.get(src as usize)) {
                (Some(x), Some(y)) => Some(x.sub_v(y)),
                _ => None,
            }
        };
        b.append_option(out)?;
    }
    b.finish()
}

/// `out[i] = col[i] - col[i - n]`.
pub fn diff(col: &Column, n: i64) -> Result<Column> {
    Ok(per_numeric!(col, diff_prim(n)))
}

/// Fractional change against the value `n` rows back, as f64.
pub fn pct_change(col: &Column, n: i64) -> Result<Column> {
    let as_f64 = col.cast(&DataType::F64, false)?;
    let a = as_f64
        .prim::<f64>()
        .ok_or_else(|| Error::type_err("pct_change requires a numeric column"))?;
    let len = a.len() as i64;
    let mut b = PrimBuilder::<f64>::with_capacity(a.len())?;
    for i in 0..len {
        let src = i - n;
        let out = if src < 0 || src >= len {
            None
        } else {
            match (a.get(i as usize), a.get(src as usize)) {
                (Some(x), Some(y)) => Some((x - y) / y),
                _ => None,
            }
        };
        b.append_option(out)?;
    }
    Ok(Column::F64(b.finish()?))
}

// ---------------------------------------------------------------------------
// Cumulative family
// ---------------------------------------------------------------------------

fn cum_sum_prim<T: PrimType>(a: &PrimitiveArray<T>) -> Result<PrimitiveArray<T>> {
    let mut b = PrimBuilder::<T>::with_capacity(a.len())?;
    let mut acc = T::zero();
    for v in a.iter() {
        match v {
            Some(v) => {
                acc = acc.add_v(v);
                b.append_value(acc)?;
            }
            None => b.append_null()?,
        }
    }
    b.finish()
}

/// Running sum. 32-bit and narrower integers widen to their 64-bit kind
/// first; 64-bit integers wrap.
pub fn cum_sum(col: &Column) -> Result<Column> {
    let widened;
    let col = match col.dtype() {
        DataType::I32 | DataType::I8 => {
            widened = col.cast(&DataType::I64, false)?;
            &widened
        }
        DataType::U32 | DataType::U8 => {
            widened = col.cast(&DataType::U64, false)?;
            &widened
        }
        _ => col,
    };
    Ok(per_numeric!(col, cum_sum_prim()))
}

fn cum_extreme_prim<T: PrimType>(a: &PrimitiveArray<T>, is_min: bool) -> Result<PrimitiveArray<T>> {
    let mut b = PrimBuilder::<T>::with_capacity(a.len())?;
    let mut acc: Option<T> = None;
    for v in a.iter() {
        match v {
            Some(v) => {
                acc = Some(match acc {
                    None => v,
                    Some(best) => {
                        if is_min {
                            best.min_v(v)
                        } else {
                            best.max_v(v)
                        }
                    }
                });
                b.append_value(acc.unwrap_or(v))?;
            }
            None => b.append_null()?,
        }
    }
    b.finish()
}

pub fn cum_min(col: &Column) -> Result<Column> {
    Ok(per_numeric!(col, cum_extreme_prim(true)))
}

pub fn cum_max(col: &Column) -> Result<Column> {
    Ok(per_numeric!(col, cum_extreme_prim(false)))
}

// ---------------------------------------------------------------------------
// Rolling family
// ---------------------------------------------------------------------------

fn rolling_sum_prim<T: PrimType>(
    a: &PrimitiveArray<T>,
    window: usize,
    min_periods: usize,
) -> Result<PrimitiveArray<T>> {
    let mut b = PrimBuilder::<T>::with_capacity(a.len())?;
    let mut acc = T::zero();
    let mut count = 0usize;
    for i in 0..a.len() {
        if let Some(v) = a.get(i) {
            acc = acc.add_v(v);
            count += 1;
        }
        if i >= window {
            if let Some(v) = a.get(i - window) {
                acc = acc.sub_v(v);
                count -= 1;
            }
        }
        if count >= min_periods.max(1) {
            b.append_value(acc)?;
        } else {
            b.append_null()?;
        }
    }
    b.finish()
}

/// Running-sum rolling window; integers stay exact.
pub fn rolling_sum(col: &Column, window: usize, min_periods: usize) -> Result<Column> {
    if window == 0 {
        return Err(Error::schema("rolling window must be at least 1"));
    }
    Ok(per_numeric!(col, rolling_sum_prim(window, min_periods)))
}

/// Rolling mean as f64 via the running-sum formulation.
pub fn rolling_mean(col: &Column, window: usize, min_periods: usize) -> Result<Column> {
    if window == 0 {
        return Err(Error::schema("rolling window must be at least 1"));
    }
    let as_f64 = col.cast(&DataType::F64, false)?;
    let a = as_f64
        .prim::<f64>()
        .ok_or_else(|| Error::type_err("rolling_mean requires a numeric column"))?;
    let mut b = PrimBuilder::<f64>::with_capacity(a.len())?;
    let mut acc = 0.0f64;
    let mut count = 0usize;
    for i in 0..a.len() {
        if let Some(v) = a.get(i) {
            acc += v;
            count += 1;
        }
        if i >= window {
            if let Some(v) = a.get(i - window) {
                acc -= v;
                count -= 1;
            }
        }
        if count >= min_periods.max(1) {
            b.append_value(acc / count as f64)?;
        } else {
            b.append_null()?;
        }
    }
    Ok(Column::F64(b.finish()?))
}

fn rolling_extreme_prim<T: PrimType>(
    a: &PrimitiveArray<T>,
    window: usize,
    min_periods: usize,
    is_min: bool,
) -> Result<PrimitiveArray<T>> {
    let mut b = PrimBuilder::<T>::with_capacity(a.len())?;
    // Monotonic deque of candidate indices; front is the window extreme.
    let mut deque: VecDeque<usize> = VecDeque::new();
    let mut count = 0usize;
    for i in 0..a.len() {
        if let Some(v) = a.get(i) {
            while let Some(&back) = deque.back() {
                let worse = match a.get(back) {
                    Some(bv) => {
                        if is_min {
                            bv.total_cmp(&v).is_ge()
                        } else {
                            bv.total_cmp(&v).is_le()
                        }
                    }
                    None => true,
                };
                if worse {
                    deque.pop_back();
                } else {
                    break;
                }
            }
            deque.push_back(i);
            count += 1;
        }
        if i >= window {
            if a.get(i - window).is_some() {
                count -= 1;
            }
        }
        while let Some(&front) = deque.front() {
            if front + window <= i {
                deque.pop_front();
            } else {
                break;
            }
        }
        if count >= min_periods.max(1) {
            match deque.front().and_then(|&f| a.get(f)) {
                Some(v) => b.append_value(v)?,
                None => b.append_null()?,
            }
        } else {
            b.append_null()?;
        }
    }
    b.finish()
}

pub fn rolling_min(col: &Column, window: usize, min_periods: usize) -> Result<Column> {
    if window == 0 {
        return Err(Error::schema("rolling window must be at least 1"));
    }
    Ok(per_numeric!(col, rolling_extreme_prim(window, min_periods, true)))
}

pub fn rolling_max(col: &Column, window: usize, min_periods: usize) -> Result<Column> {
    if window == 0 {
        return Err(Error::schema("rolling window must be at least 1"));
    }
    Ok(per_numeric!(col, rolling_extreme_prim(window, min_periods, false)))
}

/// Rolling sample standard deviation (ddof = 1) from running sums.
pub fn rolling_std(col: &Column, window: usize, min_periods: usize) -> Result<Column> {
    if window == 0 {
        return Err(Error::schema("rolling window must be at least 1"));
    }
    let as_f64 = col.cast(&DataType::F64, false)?;
    let a = as_f64
        .prim::<f64>()
        .ok_or_else(|| Error::type_err("rolling_std requires a numeric column"))?;
    let mut b = PrimBuilder::<f64>::with_capacity(a.len())?;
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0usize;
    for i in 0..a.len() {
        if let Some(v) = a.get(i) {
            sum += v;
            sum_sq += v * v;
            count += 1;
        }
        if i >= window {
            if let Some(v) = a.get(i - window) {
                sum -= v;
                sum_sq -= v * v;
                count -= 1;
            }
        }
        if count >= min_periods.max(1) && count >= 2 {
            let n = count as f64;
            let var = ((sum_sq - sum * sum / n) / (n - 1.0)).max(0.0);
            b.append_value(var.sqrt())?;
        } else {
            b.append_null()?;
        }
    }
    Ok(Column::F64(b.finish()?))
}

// ---------------------------------------------------------------------------
// Rankings
// ---------------------------------------------------------------------------

/// 1-based row numbers.
pub fn row_number(len: usize) -> Result<Column> {
    let values: Vec<u32> = (1..=len as u32).collect();
    Column::from_vec(values)
}

/// 1-based "min" rank of each value ascending; nulls rank null.
pub fn rank(col: &Column) -> Result<Column> {
    rank_impl(col, false)
}

/// 1-based dense rank: consecutive group numbers without gaps.
pub fn dense_rank(col: &Column) -> Result<Column> {
    rank_impl(col, true)
}

fn rank_impl(col: &Column, dense: bool) -> Result<Column> {
    let n = col.len();
    let order = crate::sort::argsort_multi(&[crate::sort::SortKey {
        column: col,
        descending: false,
    }])?;
    let mut out: Vec<Option<u32>> = vec![None; n];
    let mut rank = 0u32;
    let mut emitted = 0u32;
    let mut prev: Option<usize> = None;
    for &idx in &order {
        let idx = idx as usize;
        if !col.is_valid(idx) {
            continue;
        }
        emitted += 1;
        let tied = match prev {
            Some(p) => crate::sort::cmp_rows(col, p, idx) == std::cmp::Ordering::Equal,
            None => false,
        };
        if !tied {
            rank = if dense { rank + 1 } else { emitted };
        }
        out[idx] = Some(rank);
        prev = Some(idx);
    }
    Column::from_options(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_mean_min_periods_one() {
        let c = Column::from_vec(vec![10i64, 20, 30, 40, 50]).unwrap();
        let out = rolling_mean(&c, 3, 1).unwrap();
        let a = out.prim::<f64>().unwrap();
        assert_eq!(a.values(), &[10.0, 15.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn rolling_min_monotonic_deque() {
        let c = Column::from_vec(vec![3i64, 1, 4, 1, 5, 9, 2, 6]).unwrap();
        let out = rolling_min(&c, 3, 3).unwrap();
        let a = out.prim::<i64>().unwrap();
        assert_eq!(a.get(0), None);
        assert_eq!(a.get(1), None);
        assert_eq!(a.get(2), Some(1));
        assert_eq!(a.get(3), Some(1));
        assert_eq!(a.get(4), Some(1));
        assert_eq!(a.get(5), Some(1));
        assert_eq!(a.get(6), Some(2));
        assert_eq!(a.get(7), Some(2));
    }

    #[test]
    fn cum_sum_skips_nulls() {
        let c = Column::from_options(&[Some(1i64), None, Some(2), Some(3)]).unwrap();
        let out = cum_sum(&c).unwrap();
        let a = out.prim::<i64>().unwrap();
        assert_eq!(a.get(0), Some(1));
        assert_eq!(a.get(1), None);
        assert_eq!(a.get(2), Some(3));
        assert_eq!(a.get(3), Some(6));
    }

    #[test]
    fn shift_and_diff() {
        let c = Column::from_vec(vec![1i64, 3, 6, 10]).unwrap();
        let lagged = shift(&c, 1, None).unwrap();
        assert!(lagged.get(0).is_null());
        assert_eq!(lagged.get(1), Scalar::I64(1));
        let d = diff(&c, 1).unwrap();
        let a = d.prim::<i64>().unwrap();
        assert_eq!(a.get(0), None);
        assert_eq!(a.get(1), Some(2));
        assert_eq!(a.get(3), Some(4));
    }

    #[test]
    fn ranks() {
        let c = Column::from_vec(vec![30i64, 10, 30, 20]).unwrap();
        let r = rank(&c).unwrap();
        let a = r.prim::<u32>().unwrap();
        assert_eq!(a.values(), &[3, 1, 3, 2]);
        let d = dense_rank(&c).unwrap();
        let a = d.prim::<u32>().unwrap();
        assert_eq!(a.values(), &[3, 1, 3, 2]);
    }
}
