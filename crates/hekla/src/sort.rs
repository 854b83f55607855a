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

//! Multi-key argsort and top-K selection.
//!
//! Every path is stable: rows with equal keys keep their input order. Nulls
//! sort first under an ascending key; a descending key reverses the whole
//! comparison, nulls included.

use std::cmp::Ordering;

use crate::column::{Column, PrimType, PrimitiveArray};
use crate::error::{Error, Result};

/// One sort key.
pub struct SortKey<'a> {
    pub column: &'a Column,
    pub descending: bool,
}

fn cmp_prim<T: PrimType>(a: &PrimitiveArray<T>, i: usize, j: usize) -> Ordering {
    match (a.get(i), a.get(j)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.total_cmp(&y),
    }
}

/// Row comparison within one column; null sorts before every value.
pub fn cmp_rows(col: &Column, i: usize, j: usize) -> Ordering {
    match col {
        Column::F64(a) => cmp_prim(a, i, j),
        Column::F32(a) => cmp_prim(a, i, j),
        Column::I64(a) => cmp_prim(a, i, j),
        Column::I32(a) => cmp_prim(a, i, j),
        Column::U64(a) => cmp_prim(a, i, j),
        Column::U32(a) => cmp_prim(a, i, j),
        Column::I8(a) => cmp_prim(a, i, j),
        Column::U8(a) => cmp_prim(a, i, j),
        Column::Bool(a) => cmp_prim(a, i, j),
        Column::Datetime(a, _) | Column::Duration(a, _) => cmp_prim(a, i, j),
        Column::Str(a) => match (a.get(i), a.get(j)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(y),
        },
        Column::Cat(a) => match (a.get(i), a.get(j)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(y),
        },
        Column::List(_) | Column::Struct(_) => Ordering::Equal,
    }
}

fn compare_keys(keys: &[SortKey<'_>], i: usize, j: usize) -> Ordering {
    for key in keys {
        let ord = cmp_rows(key.column, i, j);
        let ord = if key.descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Stable argsort over one or more keys.
pub fn argsort_multi(keys: &[SortKey<'_>]) -> Result<Vec<u32>> {
    let n = keys
        .first()
        .ok_or_else(|| Error::schema("sort requires at least one key"))?
        .column
        .len();
    for key in keys {
        if key.column.len() != n {
            return Err(Error::shape("sort keys differ in length"));
        }
    }

    // Single all-valid primitive key: use the dispatched argsort kernel.
    if keys.len() == 1 {
        let key = &keys[0];
        if key.column.null_count() == 0 {
            if let Some(idx) = argsort_kernel(key.column, key.descending) {
                return Ok(idx);
            }
        }
    }

    let mut idx: Vec<u32> = (0..n as u32).collect();
    idx.sort_by(|&i, &j| compare_keys(keys, i as usize, j as usize));
    Ok(idx)
}

fn argsort_kernel(col: &Column, descending: bool) -> Option<Vec<u32>> {
    macro_rules! run {
        ($a:expr, $t:ty) => {{
            let k = crate::simd::kernels::<$t>();
            Some((k.argsort)($a.values(), descending))
        }};
    }
    match col {
        Column::F64(a) => run!(a, f64),
        Column::F32(a) => run!(a, f32),
        Column::I64(a) => run!(a, i64),
        Column::I32(a) => run!(a, i32),
        Column::U64(a) => run!(a, u64),
        Column::U32(a) => run!(a, u32),
        Column::I8(a) => run!(a, i8),
        Column::U8(a) | Column::Bool(a) => run!(a, u8),
        Column::Datetime(a, _) | Column::Duration(a, _) => run!(a, i64),
        _ => None,
    }
}

/// Indices of the first `k` rows of the sorted order, themselves sorted.
/// Partial selection; the original index is the final comparator key, so
/// ties still resolve to input order.
pub fn top_k(keys: &[SortKey<'_>], k: usize) -> Result<Vec<u32>> {
    let n = keys
        .first()
        .ok_or_else(|| Error::schema("top-k requires at least one key"))?
        .column
        .len();
    if k >= n {
        return argsort_multi(keys);
    }
    let mut idx: Vec<u32> = (0..n as u32).collect();
    let cmp = |&i: &u32, &j: &u32| {
        compare_keys(keys, i as usize, j as usize).then_with(|| i.cmp(&j))
    };
    if k > 0 {
        idx.select_nth_unstable_by(k - 1, cmp);
    }
    idx.truncate(k);
    idx.sort_by(cmp);
    Ok(idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_on_ties() {
        let key = Column::from_vec(vec![2i64, 1, 2, 1, 2]).unwrap();
        let idx = argsort_multi(&[SortKey {
            column: &key,
            descending: false,
        }])
        .unwrap();
        assert_eq!(idx, vec![1, 3, 0, 2, 4]);
    }

    #[test]
    fn nulls_sort_first() {
        let key = Column::from_options(&[Some(3i64), None, Some(1), None]).unwrap();
        let idx = argsort_multi(&[SortKey {
            column: &key,
            descending: false,
        }])
        .unwrap();
        assert_eq!(idx, vec![1, 3, 2, 0]);
    }

    #[test]
    fn top_k_matches_full_sort() {
        let key = Column::from_vec(vec![5i64, 3, 9, 1, 7, 3]).unwrap();
        let keys = [SortKey {
            column: &key,
            descending: false,
        }];
        let full = argsort_multi(&keys).unwrap();
        let top = top_k(&keys, 3).unwrap();
        assert_eq!(top, full[..3].to_vec());
    }
}
