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

//! Grouped aggregation.
//!
//! Keys hash per row, fold left to right across key columns, and probe a
//! Swiss table that assigns dense `u32` group ids in insertion order. Null
//! keys compare equal, so nulls form one group. Above the serial threshold
//! rows route to `2 × workers` partitions by `hash_to_partition`; every
//! distinct key lands in exactly one partition, so the output is the
//! concatenation of per-partition results in partition order.

use std::sync::Mutex;

use crate::column::builder::PrimBuilder;
use crate::column::{Column, DataType, PrimType, PrimitiveArray};
use crate::error::{Error, Result};
use crate::pool::{self, TaskGroup};
use crate::simd::hash::hash_to_partition;
use crate::swiss::RawTable;

/// Aggregations understood by the grouped kernels.
#[derive(Debug, Clone, PartialEq)]
pub enum AggKind {
    Sum,
    Min,
    Max,
    Mean,
    Count,
    First,
    Last,
    Var,
    Std,
    Median,
    Quantile(f64),
    Skew,
    Kurtosis,
}

impl AggKind {
    /// Output type for an input of `dtype`.
    pub fn output_dtype(&self, dtype: &DataType) -> DataType {
        match self {
            AggKind::Sum | AggKind::Min | AggKind::Max | AggKind::First | AggKind::Last => {
                dtype.clone()
            }
            AggKind::Count => DataType::U32,
            _ => DataType::F64,
        }
    }
}

/// Dense group assignment for one key tuple set.
pub struct Groups {
    /// Group id per input row.
    pub ids: Vec<u32>,
    /// First input row of each group, in insertion order.
    pub first_rows: Vec<u32>,
    /// Row count per group.
    pub counts: Vec<u32>,
}

impl Groups {
    pub fn n_groups(&self) -> usize {
        self.first_rows.len()
    }
}

struct GroupEntry {
    hash: u64,
    first_row: u32,
    gid: u32,
}

/// Combined per-row key hash across all key columns, left to right.
pub fn combined_hash(keys: &[&Column], n: usize) -> Result<Vec<u64>> {
    let mut hashes = vec![0u64; n];
    let mut first = true;
    let mut scratch = vec![0u64; n];
    for key in keys {
        if key.len() != n {
            return Err(Error::shape("group keys differ in length"));
        }
        if first {
            key.hash_into(&mut hashes)?;
            first = false;
        } else {
            key.hash_into(&mut scratch)?;
            (crate::simd::dispatch().combine_hashes)(&mut hashes, &scratch);
        }
    }
    Ok(hashes)
}

fn keys_eq(keys: &[&Column], a: usize, b: usize) -> bool {
    keys.iter().all(|k| k.eq_rows(a, *k, b))
}

/// Build the group assignment for one or more equal-length key columns.
pub fn compute_groups(keys: &[&Column]) -> Result<Groups> {
    let n = keys
        .first()
        .ok_or_else(|| Error::schema("group-by requires at least one key"))?
        .len();
    let hashes = combined_hash(keys, n)?;

    let mut table: RawTable<GroupEntry> = RawTable::with_capacity(64)?;
    let mut ids = vec![0u32; n];
    let mut first_rows: Vec<u32> = Vec::new();
    let mut counts: Vec<u32> = Vec::new();
    for row in 0..n {
        let h = hashes[row];
        let found = table.find(h, |e| e.hash == h && keys_eq(keys, row, e.first_row as usize));
        match found {
            Some(idx) => {
                let gid = table.bucket(idx).gid;
                ids[row] = gid;
                counts[gid as usize] += 1;
            }
            None => {
                let gid = first_rows.len() as u32;
                table.insert_new(
                    h,
                    GroupEntry {
                        hash: h,
                        first_row: row as u32,
                        gid,
                    },
                    |e| e.hash,
                )?;
                first_rows.push(row as u32);
                counts.push(1);
                ids[row] = gid;
            }
        }
    }
    Ok(Groups {
        ids,
        first_rows,
        counts,
    })
}

// ---------------------------------------------------------------------------
// Grouped kernels
// ---------------------------------------------------------------------------

fn grouped_sum_prim<T: PrimType>(
    arr: &PrimitiveArray<T>,
    groups: &Groups,
) -> Result<PrimitiveArray<T>> {
    let n_groups = groups.n_groups();
    let mut out = vec![T::zero(); n_groups];
    match arr.validity() {
        None => {
            let k = crate::simd::kernels::<T>();
            (k.grouped_sum)(arr.values(), &groups.ids, &mut out);
            PrimitiveArray::from_vec(out)
        }
        Some(validity) => {
            let values = arr.values();
            for i in 0..values.len() {
                if validity.get(i) {
                    let g = groups.ids[i] as usize;
                    out[g] = out[g].add_v(values[i]);
                }
            }
            PrimitiveArray::from_vec(out)
        }
    }
}

fn grouped_extreme_prim<T: PrimType>(
    arr: &PrimitiveArray<T>,
    groups: &Groups,
    is_min: bool,
) -> Result<PrimitiveArray<T>> {
    let n_groups = groups.n_groups();
    let mut out = vec![T::zero(); n_groups];
    let mut seen = vec![0u8; n_groups];
    match arr.validity() {
        None => {
            let k = crate::simd::kernels::<T>();
            if is_min {
                (k.grouped_min)(arr.values(), &groups.ids, &mut out, &mut seen);
            } else {
                (k.grouped_max)(arr.values(), &groups.ids, &mut out, &mut seen);
            }
        }
        Some(validity) => {
            let values = arr.values();
            for i in 0..values.len() {
                if !validity.get(i) {
                    continue;
                }
                let g = groups.ids[i] as usize;
                if seen[g] == 0 {
                    out[g] = values[i];
                    seen[g] = 1;
                } else {
                    out[g] = if is_min {
                        out[g].min_v(values[i])
                    } else {
                        out[g].max_v(values[i])
                    };
                }
            }
        }
    }
    let opts: Vec<Option<T>> = out
        .iter()
        .zip(&seen)
        .map(|(&v, &s)| if s == 1 { Some(v) } else { None })
        .collect();
    PrimitiveArray::from_options(&opts)
}

macro_rules! per_prim_grouped {
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
            Column::Datetime(a, u) => Column::Datetime($f(a $(, $args)*)?, *u),
            Column::Duration(a, u) => Column::Duration($f(a $(, $args)*)?, *u),
            other => {
                return Err(Error::type_err(format!(
                    "aggregation requires a numeric column, got {}",
                    other.dtype()
                )))
            }
        }
    };
}

/// Per-group valid-element counts for `col`.
fn valid_counts(col: &Column, groups: &Groups) -> Vec<u32> {
    let mut counts = vec![0u32; groups.n_groups()];
    for i in 0..col.len() {
        if col.is_valid(i) {
            counts[groups.ids[i] as usize] += 1;
        }
    }
    counts
}

fn grouped_mean(col: &Column, groups: &Groups) -> Result<Column> {
    let as_f64 = col.cast(&DataType::F64, false)?;
    let sums = grouped_sum_prim(
        as_f64
            .prim::<f64>()
            .ok_or_else(|| Error::type_err("mean requires a numeric column"))?,
        groups,
    )?;
    let counts = valid_counts(col, groups);
    let mut b = PrimBuilder::<f64>::with_capacity(groups.n_groups())?;
    for (g, &c) in counts.iter().enumerate() {
        if c == 0 {
            b.append_null()?;
        } else {
            b.append_value(sums.values()[g] / c as f64)?;
        }
    }
    Ok(Column::F64(b.finish()?))
}

/// Single-pass Welford accumulation per group: `(count, mean, m2)`.
fn grouped_var(col: &Column, groups: &Groups) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>)> {
    let as_f64 = col.cast(&DataType::F64, false)?;
    let a = as_f64
        .prim::<f64>()
        .ok_or_else(|| Error::type_err("var requires a numeric column"))?;
    let n_groups = groups.n_groups();
    let mut count = vec![0.0f64; n_groups];
    let mut mean = vec![0.0f64; n_groups];
    let mut m2 = vec![0.0f64; n_groups];
    for i in 0..a.len() {
        let Some(v) = a.get(i) else { continue };
        let g = groups.ids[i] as usize;
        count[g] += 1.0;
        let d = v - mean[g];
        mean[g] += d / count[g];
        m2[g] += d * (v - mean[g]);
    }
    Ok((count, mean, m2))
}

fn grouped_moments(col: &Column, groups: &Groups, kurtosis: bool) -> Result<Column> {
    let as_f64 = col.cast(&DataType::F64, false)?;
    let a = as_f64
        .prim::<f64>()
        .ok_or_else(|| Error::type_err("moment aggregations require a numeric column"))?;
    let n_groups = groups.n_groups();
    let (count, mean, _) = grouped_var(col, groups)?;
    let mut m2 = vec![0.0f64; n_groups];
    let mut m3 = vec![0.0f64; n_groups];
    let mut m4 = vec![0.0f64; n_groups];
    for i in 0..a.len() {
        let Some(v) = a.get(i) else { continue };
        let g = groups.ids[i] as usize;
        let d = v - mean[g];
        m2[g] += d * d;
        m3[g] += d * d * d;
        m4[g] += d * d * d * d;
    }
    let mut b = PrimBuilder::<f64>::with_capacity(n_groups)?;
    for g in 0..n_groups {
        let n = count[g];
        if n < 2.0 {
            b.append_null()?;
            continue;
        }
        let var = m2[g] / n;
        if var == 0.0 {
            b.append_null()?;
            continue;
        }
        if kurtosis {
            // Excess kurtosis: fourth standardized moment minus 3.
            b.append_value((m4[g] / n) / (var * var) - 3.0)?;
        } else {
            // Third standardized moment.
            b.append_value((m3[g] / n) / var.powf(1.5))?;
        }
    }
    Ok(Column::F64(b.finish()?))
}

fn grouped_quantile(col: &Column, groups: &Groups, q: f64) -> Result<Column> {
    if !(0.0..=1.0).contains(&q) {
        return Err(Error::schema(format!("quantile {q} outside [0, 1]")));
    }
    let as_f64 = col.cast(&DataType::F64, false)?;
    let a = as_f64
        .prim::<f64>()
        .ok_or_else(|| Error::type_err("quantile requires a numeric column"))?;
    let n_groups = groups.n_groups();
    let mut per_group: Vec<Vec<f64>> = vec![Vec::new(); n_groups];
    for i in 0..a.len() {
        if let Some(v) = a.get(i) {
            per_group[groups.ids[i] as usize].push(v);
        }
    }
    let mut b = PrimBuilder::<f64>::with_capacity(n_groups)?;
    for values in per_group.iter_mut() {
        if values.is_empty() {
            b.append_null()?;
            continue;
        }
        // Nearest-rank selection via partial sort.
        let at = ((values.len() - 1) as f64 * q).round() as usize;
        let (_, v, _) = values.select_nth_unstable_by(at, |x, y| x.total_cmp(y));
        b.append_value(*v)?;
    }
    Ok(Column::F64(b.finish()?))
}

fn grouped_pick(col: &Column, groups: &Groups, last: bool) -> Result<Column> {
    let n_groups = groups.n_groups();
    let mut rows: Vec<i32> = vec![-1; n_groups];
    for i in 0..col.len() {
        let g = groups.ids[i] as usize;
        if last || rows[g] < 0 {
            rows[g] = i as i32;
        }
    }
    col.gather_opt(&rows)
}

/// Aggregate `col` into one value per group.
pub fn grouped_aggregate(col: &Column, groups: &Groups, kind: &AggKind) -> Result<Column> {
    if col.len() != groups.ids.len() {
        return Err(Error::shape(format!(
            "aggregation input length {} does not match group assignment {}",
            col.len(),
            groups.ids.len()
        )));
    }
    match kind {
        AggKind::Count => Column::from_vec(groups.counts.clone()),
        AggKind::Sum => Ok(per_prim_grouped!(col, grouped_sum_prim(groups))),
        AggKind::Min => Ok(per_prim_grouped!(col, grouped_extreme_prim(groups, true))),
        AggKind::Max => Ok(per_prim_grouped!(col, grouped_extreme_prim(groups, false))),
        AggKind::Mean => grouped_mean(col, groups),
        AggKind::First => grouped_pick(col, groups, false),
        AggKind::Last => grouped_pick(col, groups, true),
        AggKind::Var | AggKind::Std => {
            let (count, _, m2) = grouped_var(col, groups)?;
            let mut b = PrimBuilder::<f64>::with_capacity(groups.n_groups())?;
            for g in 0..groups.n_groups() {
                if count[g] < 2.0 {
                    b.append_null()?;
                } else {
                    let var = m2[g] / (count[g] - 1.0);
                    b.append_value(if matches!(kind, AggKind::Std) {
                        var.sqrt()
                    } else {
                        var
                    })?;
                }
            }
            Ok(Column::F64(b.finish()?))
        }
        AggKind::Median => grouped_quantile(col, groups, 0.5),
        AggKind::Quantile(q) => grouped_quantile(col, groups, *q),
        AggKind::Skew => grouped_moments(col, groups, false),
        AggKind::Kurtosis => grouped_moments(col, groups, true),
    }
}

// ---------------------------------------------------------------------------
// Frame-level group-by with the parallel partitioned path
// ---------------------------------------------------------------------------

/// Output of [`group_by`]: key columns (one row per group) and one column
/// per aggregation request, aligned.
pub struct GroupByResult {
    pub keys: Vec<Column>,
    pub aggs: Vec<Column>,
}

fn group_by_serial(keys: &[&Column], aggs: &[(&Column, AggKind)]) -> Result<GroupByResult> {
    let groups = compute_groups(keys)?;
    let key_cols = keys
        .iter()
        .map(|k| k.gather(&groups.first_rows))
        .collect::<Result<Vec<_>>>()?;
    let agg_cols = aggs
        .iter()
        .map(|(col, kind)| grouped_aggregate(col, &groups, kind))
        .collect::<Result<Vec<_>>>()?;
    Ok(GroupByResult {
        keys: key_cols,
        aggs: agg_cols,
    })
}

/// Group and aggregate, choosing the serial or hash-partitioned parallel
/// path by input size. Output order is deterministic for a fixed worker
/// count: partition order, then first-seen order within each partition.
pub fn group_by(keys: &[&Column], aggs: &[(&Column, AggKind)]) -> Result<GroupByResult> {
    let n = keys
        .first()
        .ok_or_else(|| Error::schema("group-by requires at least one key"))?
        .len();
    let workers = crate::pool::thread_count().0;
    if n < pool::SERIAL_THRESHOLD || workers <= 1 {
        return group_by_serial(keys, aggs);
    }

    // Route rows to partitions on the combined key hash.
    let n_parts = workers * 2;
    let hashes = combined_hash(keys, n)?;
    let mut part_rows: Vec<Vec<u32>> = vec![Vec::new(); n_parts];
    for (row, &h) in hashes.iter().enumerate() {
        part_rows[hash_to_partition(h, n_parts)].push(row as u32);
    }

    let slots: Vec<Mutex<Option<GroupByResult>>> =
        (0..n_parts).map(|_| Mutex::new(None)).collect();
    let group = TaskGroup::new();
    pool::parallel_for(n_parts, 1, &group, |start, end| {
        for p in start..end {
            let rows = &part_rows[p];
            if rows.is_empty() {
                continue;
            }
            let part_keys = keys
                .iter()
                .map(|k| k.gather(rows))
                .collect::<Result<Vec<_>>>()?;
            let part_aggs = aggs
                .iter()
                .map(|(col, kind)| Ok((col.gather(rows)?, kind.clone())))
                .collect::<Result<Vec<_>>>()?;
            let key_refs: Vec<&Column> = part_keys.iter().collect();
            let agg_refs: Vec<(&Column, AggKind)> = part_aggs
                .iter()
                .map(|(c, k)| (c, k.clone()))
                .collect();
            let result = group_by_serial(&key_refs, &agg_refs)?;
            *slots[p]
                .lock()
                .map_err(|_| Error::internal("group-by partition slot poisoned"))? = Some(result);
        }
        Ok(())
    })?;

    // Concatenate per-partition results in partition order.
    let mut key_parts: Vec<Vec<Column>> = vec![Vec::new(); keys.len()];
    let mut agg_parts: Vec<Vec<Column>> = vec![Vec::new(); aggs.len()];
    for slot in &slots {
        let taken = slot
            .lock()
            .map_err(|_| Error::internal("group-by partition slot poisoned"))?
            .take();
        if let Some(part) = taken {
            for (i, col) in part.keys.into_iter().enumerate() {
                key_parts[i].push(col);
            }
            for (i, col) in part.aggs.into_iter().enumerate() {
                agg_parts[i].push(col);
            }
        }
    }
    let keys_out = key_parts
        .into_iter()
        .map(|parts| {
            let refs: Vec<&Column> = parts.iter().collect();
            Column::concat(&refs)
        })
        .collect::<Result<Vec<_>>>()?;
    let aggs_out = agg_parts
        .into_iter()
        .map(|parts| {
            let refs: Vec<&Column> = parts.iter().collect();
            Column::concat(&refs)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(GroupByResult {
        keys: keys_out,
        aggs: aggs_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_group_ids() {
        let key = Column::from_strs(&["a", "b", "a", "c", "b"]).unwrap();
        let groups = compute_groups(&[&key]).unwrap();
        assert_eq!(groups.n_groups(), 3);
        assert_eq!(groups.ids, vec![0, 1, 0, 2, 1]);
        assert_eq!(groups.first_rows, vec![0, 1, 3]);
        assert_eq!(groups.counts, vec![2, 2, 1]);
    }

    #[test]
    fn nulls_form_one_group() {
        let key = Column::from_options(&[Some(1i64), None, Some(1), None]).unwrap();
        let groups = compute_groups(&[&key]).unwrap();
        assert_eq!(groups.n_groups(), 2);
        assert_eq!(groups.ids, vec![0, 1, 0, 1]);
    }

    #[test]
    fn sum_identity() {
        let key = Column::from_vec(vec![1i64, 2, 1, 2, 1]).unwrap();
        let vals = Column::from_vec(vec![10i64, 20, 30, 40, 50]).unwrap();
        let groups = compute_groups(&[&key]).unwrap();
        let sums = grouped_aggregate(&vals, &groups, &AggKind::Sum).unwrap();
        let total: i64 = sums.prim::<i64>().unwrap().values().iter().sum();
        assert_eq!(total, 150);
    }

    #[test]
    fn welford_matches_two_pass() {
        let key = Column::from_vec(vec![1i64; 6]).unwrap();
        let vals = Column::from_vec(vec![2.0f64, 4.0, 4.0, 4.0, 5.0, 5.0]).unwrap();
        let groups = compute_groups(&[&key]).unwrap();
        let var = grouped_aggregate(&vals, &groups, &AggKind::Var).unwrap();
        let v = var.prim::<f64>().unwrap().values()[0];
        let mean = 4.0;
        let expect: f64 = [2.0f64, 4.0, 4.0, 4.0, 5.0, 5.0]
            .iter()
            .map(|x| (x - mean) * (x - mean))
            .sum::<f64>()
            / 5.0;
        assert!((v - expect).abs() < 1e-12);
    }
}
