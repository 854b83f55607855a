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

//! Build/probe hash join.
//!
//! The build side's keys populate a Swiss table mapping each distinct key to
//! the head of a chain through a parallel `next` array, kept in build-row
//! order. Probing walks the chain emitting `(probe_row, build_row)` index
//! pairs; `-1` marks the missing side and gathers as null. Above the serial
//! threshold both sides range-partition on the combined key hash and each
//! partition joins independently.

use std::sync::Mutex;

use crate::column::Column;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::groupby::combined_hash;
use crate::pool::{self, TaskGroup};
use crate::simd::hash::hash_to_partition;
use crate::swiss::RawTable;

/// Join kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinHow {
    Inner,
    Left,
    Right,
}

struct ChainEntry {
    hash: u64,
    head: u32,
    tail: u32,
}

fn keys_eq(a: &[&Column], row_a: usize, b: &[&Column], row_b: usize) -> bool {
    a.iter().zip(b).all(|(ka, kb)| ka.eq_rows(row_a, kb, row_b))
}

/// One build/probe pass over explicit row subsets (`None` = all rows).
/// Emits pairs in probe order; unmatched probe rows emit `-1` on the build
/// side when `keep_unmatched` is set.
fn probe_join(
    build_keys: &[&Column],
    build_rows: Option<&[u32]>,
    build_hashes: &[u64],
    probe_keys: &[&Column],
    probe_rows: Option<&[u32]>,
    probe_hashes: &[u64],
    keep_unmatched: bool,
    out_probe: &mut Vec<i32>,
    out_build: &mut Vec<i32>,
) -> Result<()> {
    let n_build = build_rows.map_or(build_hashes.len(), |r| r.len());
    let build_row = |local: usize| -> usize {
        match build_rows {
            Some(rows) => rows[local] as usize,
            None => local,
        }
    };

    // Chains run through `next` in build-row order: head stays the first
    // occurrence, the tail pointer gives O(1) append.
    let mut table: RawTable<ChainEntry> = RawTable::with_capacity(n_build)?;
    let mut next: Vec<i32> = vec![-1; n_build];
    for local in 0..n_build {
        let row = build_row(local);
        let h = build_hashes[row];
        match table.find(h, |e| {
            e.hash == h && keys_eq(build_keys, build_row(e.head as usize), build_keys, row)
        }) {
            Some(idx) => {
                let entry = table.bucket_mut(idx);
                next[entry.tail as usize] = local as i32;
                entry.tail = local as u32;
            }
            None => {
                table.insert_new(
                    h,
                    ChainEntry {
                        hash: h,
                        head: local as u32,
                        tail: local as u32,
                    },
                    |e| e.hash,
                )?;
            }
        }
    }

    let n_probe = probe_rows.map_or(probe_hashes.len(), |r| r.len());
    for local in 0..n_probe {
        let row = match probe_rows {
            Some(rows) => rows[local] as usize,
            None => local,
        };
        let h = probe_hashes[row];
        let found = table.find(h, |e| {
            e.hash == h && keys_eq(build_keys, build_row(e.head as usize), probe_keys, row)
        });
        match found {
            Some(idx) => {
                let mut chain = table.bucket(idx).head as i32;
                while chain >= 0 {
                    out_probe.push(row as i32);
                    out_build.push(build_row(chain as usize) as i32);
                    chain = next[chain as usize];
                }
            }
            None if keep_unmatched => {
                out_probe.push(row as i32);
                out_build.push(-1);
            }
            None => {}
        }
    }
    Ok(())
}

/// Joined row-index pairs: `left[i]`/`right[i]` index the input frames, with
/// `-1` for the missing side.
pub struct JoinIndices {
    pub left: Vec<i32>,
    pub right: Vec<i32>,
}

/// Compute join indices. The build side is the right side for left joins,
/// the left side for right joins, and the smaller side for inner joins.
pub fn join_indices(
    left_keys: &[&Column],
    right_keys: &[&Column],
    how: JoinHow,
) -> Result<JoinIndices> {
    if left_keys.len() != right_keys.len() || left_keys.is_empty() {
        return Err(Error::schema(
            "join requires matching, non-empty key lists on both sides",
        ));
    }
    for (l, r) in left_keys.iter().zip(right_keys) {
        if l.dtype() != r.dtype() {
            return Err(Error::type_err(format!(
                "join key type mismatch: {} vs {}",
                l.dtype(),
                r.dtype()
            )));
        }
    }
    let n_left = left_keys[0].len();
    let n_right = right_keys[0].len();
    let left_hashes = combined_hash(left_keys, n_left)?;
    let right_hashes = combined_hash(right_keys, n_right)?;

    // Pick sides: probe drives output order.
    let (build_keys, build_hashes, probe_keys, probe_hashes, build_is_left, keep_unmatched) =
        match how {
            JoinHow::Left => (right_keys, &right_hashes, left_keys, &left_hashes, false, true),
            JoinHow::Right => (left_keys, &left_hashes, right_keys, &right_hashes, true, true),
            JoinHow::Inner => {
                if n_left <= n_right {
                    (left_keys, &left_hashes, right_keys, &right_hashes, true, false)
                } else {
                    (right_keys, &right_hashes, left_keys, &left_hashes, false, false)
                }
            }
        };

    let n_probe = probe_hashes.len();
    let workers = pool::thread_count().0;
    let (probe_idx, build_idx) = if n_probe < pool::SERIAL_THRESHOLD || workers <= 1 {
        let mut probe_idx = Vec::new();
        let mut build_idx = Vec::new();
        probe_join(
            build_keys,
            None,
            build_hashes,
            probe_keys,
            None,
            probe_hashes,
            keep_unmatched,
            &mut probe_idx,
            &mut build_idx,
        )?;
        (probe_idx, build_idx)
    } else {
        parallel_probe_join(
            build_keys,
            build_hashes,
            probe_keys,
            probe_hashes,
            keep_unmatched,
            workers,
        )?
    };

    Ok(if build_is_left {
        JoinIndices {
            left: build_idx,
            right: probe_idx,
        }
    } else {
        JoinIndices {
            left: probe_idx,
            right: build_idx,
        }
    })
}

/// Range-partition both sides on the key hash and join each partition
/// independently; outputs concatenate in partition order.
fn parallel_probe_join(
    build_keys: &[&Column],
    build_hashes: &[u64],
    probe_keys: &[&Column],
    probe_hashes: &[u64],
    keep_unmatched: bool,
    workers: usize,
) -> Result<(Vec<i32>, Vec<i32>)> {
    let n_parts = workers * 2;
    let mut build_parts: Vec<Vec<u32>> = vec![Vec::new(); n_parts];
    for (row, &h) in build_hashes.iter().enumerate() {
        build_parts[hash_to_partition(h, n_parts)].push(row as u32);
    }
    let mut probe_parts: Vec<Vec<u32>> = vec![Vec::new(); n_parts];
    for (row, &h) in probe_hashes.iter().enumerate() {
        probe_parts[hash_to_partition(h, n_parts)].push(row as u32);
    }

    let slots: Vec<Mutex<Option<(Vec<i32>, Vec<i32>)>>> =
        (0..n_parts).map(|_| Mutex::new(None)).collect();
    let group = TaskGroup::new();
    pool::parallel_for(n_parts, 1, &group, |start, end| {
        for p in start..end {
            if probe_parts[p].is_empty() {
                continue;
            }
            let mut probe_idx = Vec::new();
            let mut build_idx = Vec::new();
            probe_join(
                build_keys,
                Some(&build_parts[p]),
                build_hashes,
                probe_keys,
                Some(&probe_parts[p]),
                probe_hashes,
                keep_unmatched,
                &mut probe_idx,
                &mut build_idx,
            )?;
            *slots[p]
                .lock()
                .map_err(|_| Error::internal("join partition slot poisoned"))? =
                Some((probe_idx, build_idx));
        }
        Ok(())
    })?;

    let mut probe_all = Vec::new();
    let mut build_all = Vec::new();
    for slot in &slots {
        let taken = slot
            .lock()
            .map_err(|_| Error::internal("join partition slot poisoned"))?
            .take();
        if let Some((p, b)) = taken {
            probe_all.extend_from_slice(&p);
            build_all.extend_from_slice(&b);
        }
    }
    Ok((probe_all, build_all))
}

// ---------------------------------------------------------------------------
// Frame-level join
// ---------------------------------------------------------------------------

/// Hash-join two frames on equally-typed key columns.
///
/// The output carries the left frame's columns followed by the right frame's
/// non-key columns; right-side names that collide get `suffix` appended.
/// Key values come from the side guaranteed non-null (right for right
/// joins, left otherwise).
pub fn join_frames(
    left: &Frame,
    right: &Frame,
    left_on: &[&str],
    right_on: &[&str],
    how: JoinHow,
    suffix: &str,
) -> Result<Frame> {
    if left_on.len() != right_on.len() || left_on.is_empty() {
        return Err(Error::schema(
            "join requires matching, non-empty key name lists",
        ));
    }
    let left_keys = left_on
        .iter()
        .map(|name| left.column(name))
        .collect::<Result<Vec<_>>>()?;
    let right_keys = right_on
        .iter()
        .map(|name| right.column(name))
        .collect::<Result<Vec<_>>>()?;
    let idx = join_indices(&left_keys, &right_keys, how)?;

    let mut out: Vec<(String, Column)> = Vec::new();
    for (name, col) in left.columns() {
        if let Some(pos) = left_on.iter().position(|k| k == name) {
            // Key column: take values from the total side.
            let values = if matches!(how, JoinHow::Right) {
                right.column(right_on[pos])?.gather_opt(&idx.right)?
            } else {
                col.gather_opt(&idx.left)?
            };
            out.push((name.clone(), values));
        } else {
            out.push((name.clone(), col.gather_opt(&idx.left)?));
        }
    }
    for (name, col) in right.columns() {
        if right_on.contains(&name.as_str()) {
            continue;
        }
        let gathered = col.gather_opt(&idx.right)?;
        let final_name = if out.iter().any(|(n, _)| n == name) {
            format!("{name}{suffix}")
        } else {
            name.clone()
        };
        out.push((final_name, gathered));
    }
    Frame::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_join_pairs() {
        let l = Column::from_vec(vec![1i64, 2, 3, 4]).unwrap();
        let r = Column::from_vec(vec![2i64, 3, 5]).unwrap();
        let idx = join_indices(&[&l], &[&r], JoinHow::Inner).unwrap();
        // Right is smaller, so the left side probes and drives order.
        assert_eq!(idx.left, vec![1, 2]);
        assert_eq!(idx.right, vec![0, 1]);
    }

    #[test]
    fn left_join_totality() {
        let l = Column::from_vec(vec![1i64, 2, 2]).unwrap();
        let r = Column::from_vec(vec![2i64, 9]).unwrap();
        let idx = join_indices(&[&l], &[&r], JoinHow::Left).unwrap();
        assert_eq!(idx.left, vec![0, 1, 2]);
        assert_eq!(idx.right, vec![-1, 0, 0]);
    }

    #[test]
    fn duplicate_build_keys_chain_in_order() {
        let l = Column::from_vec(vec![7i64]).unwrap();
        let r = Column::from_vec(vec![7i64, 7, 7]).unwrap();
        let idx = join_indices(&[&l], &[&r], JoinHow::Left).unwrap();
        assert_eq!(idx.left, vec![0, 0, 0]);
        assert_eq!(idx.right, vec![0, 1, 2]);
    }
}
