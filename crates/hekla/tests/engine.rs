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

//! Group-by, join and sort properties over whole frames, including the
//! parallel paths above the serial threshold.

use hekla::groupby::{group_by, AggKind};
use hekla::join::{join_frames, join_indices, JoinHow};
use hekla::{Column, Frame, Scalar};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ---------------------------------------------------------------------------
// Group-by
// ---------------------------------------------------------------------------

#[test]
fn group_sum_identity_small() {
    let key = Column::from_strs(&["a", "b", "a", "b", "a"]).unwrap();
    let val = Column::from_vec(vec![10i64, 20, 30, 40, 50]).unwrap();
    let out = group_by(&[&key], &[(&val, AggKind::Sum)]).unwrap();
    let sums = out.aggs[0].prim::<i64>().unwrap();
    assert_eq!(sums.values().iter().sum::<i64>(), 150);
}

#[test]
fn group_sum_identity_parallel() {
    // Large enough to take the hash-partitioned path.
    let n = 300_000usize;
    let mut rng = StdRng::seed_from_u64(3);
    let keys: Vec<i64> = (0..n).map(|_| rng.gen_range(0..997)).collect();
    let vals: Vec<i64> = (0..n).map(|_| rng.gen_range(-50..50)).collect();
    let global: i64 = vals.iter().sum();

    let key = Column::from_vec(keys).unwrap();
    let val = Column::from_vec(vals).unwrap();
    let out = group_by(&[&key], &[(&val, AggKind::Sum), (&val, AggKind::Count)]).unwrap();
    assert_eq!(out.keys[0].len(), 997);
    let sums = out.aggs[0].prim::<i64>().unwrap();
    assert_eq!(sums.values().iter().sum::<i64>(), global);
    let counts = out.aggs[1].prim::<u32>().unwrap();
    assert_eq!(counts.values().iter().map(|&c| c as usize).sum::<usize>(), n);
}

#[test]
fn parallel_output_deterministic_at_fixed_workers() {
    let n = 200_000usize;
    let keys: Vec<i64> = (0..n as i64).map(|i| i % 101).collect();
    let key = Column::from_vec(keys.clone()).unwrap();
    let val = Column::from_vec(vec![1i64; n]).unwrap();
    let a = group_by(&[&key], &[(&val, AggKind::Sum)]).unwrap();
    let b = group_by(&[&key], &[(&val, AggKind::Sum)]).unwrap();
    assert_eq!(a.keys[0].len(), b.keys[0].len());
    for i in 0..a.keys[0].len() {
        assert!(a.keys[0].eq_rows(i, &b.keys[0], i));
        assert!(a.aggs[0].eq_rows(i, &b.aggs[0], i));
    }
}

#[test]
fn multi_key_grouping() {
    let k1 = Column::from_strs(&["x", "x", "y", "y", "x"]).unwrap();
    let k2 = Column::from_vec(vec![1i64, 2, 1, 1, 1]).unwrap();
    let val = Column::from_vec(vec![1i64, 1, 1, 1, 1]).unwrap();
    let out = group_by(&[&k1, &k2], &[(&val, AggKind::Count)]).unwrap();
    // Tuples: (x,1) twice, (x,2) once, (y,1) twice.
    assert_eq!(out.keys[0].len(), 3);
    let counts = out.aggs[0].prim::<u32>().unwrap();
    assert_eq!(counts.values().iter().sum::<u32>(), 5);
}

// ---------------------------------------------------------------------------
// Joins
// ---------------------------------------------------------------------------

fn frames() -> (Frame, Frame) {
    let left = Frame::from_columns(vec![
        ("id", Column::from_vec(vec![1i64, 2, 3, 4]).unwrap()),
        (
            "name",
            Column::from_strs(&["Alice", "Bob", "Charlie", "Diana"]).unwrap(),
        ),
    ])
    .unwrap();
    let right = Frame::from_columns(vec![
        ("id", Column::from_vec(vec![2i64, 3, 5]).unwrap()),
        ("score", Column::from_vec(vec![85i64, 92, 78]).unwrap()),
    ])
    .unwrap();
    (left, right)
}

#[test]
fn inner_join_symmetry() {
    let (left, right) = frames();
    let lk = left.column("id").unwrap();
    let rk = right.column("id").unwrap();
    let a = join_indices(&[lk], &[rk], JoinHow::Inner).unwrap();
    let b = join_indices(&[rk], &[lk], JoinHow::Inner).unwrap();
    assert_eq!(a.left.len(), b.left.len());
}

#[test]
fn left_join_totality() {
    let (left, right) = frames();
    let out = join_frames(&left, &right, &["id"], &["id"], JoinHow::Left, "_right").unwrap();
    assert!(out.nrows() >= left.nrows());
    // Every left row appears at least once.
    let ids = out.column("id").unwrap();
    for want in [1i64, 2, 3, 4] {
        assert!((0..out.nrows()).any(|i| ids.get(i) == Scalar::I64(want)));
    }
    // Unmatched rows carry null scores.
    let scores = out.column("score").unwrap();
    assert!(scores.get(0).is_null());
    assert!(scores.get(3).is_null());
    assert_eq!(scores.get(1), Scalar::I64(85));
}

#[test]
fn right_join_keeps_right_keys() {
    let (left, right) = frames();
    let out = join_frames(&left, &right, &["id"], &["id"], JoinHow::Right, "_right").unwrap();
    assert_eq!(out.nrows(), 3);
    let ids = out.column("id").unwrap();
    assert_eq!(ids.get(0), Scalar::I64(2));
    assert_eq!(ids.get(1), Scalar::I64(3));
    assert_eq!(ids.get(2), Scalar::I64(5));
    // id = 5 has no left match: name is null.
    assert!(out.column("name").unwrap().get(2).is_null());
}

#[test]
fn join_empty_side() {
    let (left, _) = frames();
    let empty = Frame::from_columns(vec![
        ("id", Column::from_vec(Vec::<i64>::new()).unwrap()),
        ("score", Column::from_vec(Vec::<i64>::new()).unwrap()),
    ])
    .unwrap();
    let inner = join_frames(&left, &empty, &["id"], &["id"], JoinHow::Inner, "_r").unwrap();
    assert_eq!(inner.nrows(), 0);
    let left_out = join_frames(&left, &empty, &["id"], &["id"], JoinHow::Left, "_r").unwrap();
    assert_eq!(left_out.nrows(), left.nrows());
    assert_eq!(left_out.column("score").unwrap().null_count(), 4);
}

#[test]
fn suffix_on_collision() {
    let left = Frame::from_columns(vec![
        ("id", Column::from_vec(vec![1i64, 2]).unwrap()),
        ("v", Column::from_vec(vec![10i64, 20]).unwrap()),
    ])
    .unwrap();
    let right = Frame::from_columns(vec![
        ("id", Column::from_vec(vec![1i64, 2]).unwrap()),
        ("v", Column::from_vec(vec![30i64, 40]).unwrap()),
    ])
    .unwrap();
    let out = join_frames(&left, &right, &["id"], &["id"], JoinHow::Inner, "_right").unwrap();
    assert_eq!(out.names(), vec!["id", "v", "v_right"]);
}

#[test]
fn parallel_join_matches_serial_counts() {
    let n = 250_000usize;
    let mut rng = StdRng::seed_from_u64(17);
    let lk: Vec<i64> = (0..n).map(|_| rng.gen_range(0..5_000)).collect();
    let rk: Vec<i64> = (0..1_000).map(|_| rng.gen_range(0..5_000)).collect();
    let left = Column::from_vec(lk.clone()).unwrap();
    let right = Column::from_vec(rk.clone()).unwrap();

    let idx = join_indices(&[&left], &[&right], JoinHow::Inner).unwrap();

    // Naive pair count.
    let mut right_counts = std::collections::HashMap::new();
    for &k in &rk {
        *right_counts.entry(k).or_insert(0usize) += 1;
    }
    let expect: usize = lk.iter().map(|k| right_counts.get(k).copied().unwrap_or(0)).sum();
    assert_eq!(idx.left.len(), expect);
}

// ---------------------------------------------------------------------------
// Frame sort
// ---------------------------------------------------------------------------

#[test]
fn sort_is_stable_across_columns() {
    let f = Frame::from_columns(vec![
        ("k", Column::from_vec(vec![2i64, 1, 2, 1]).unwrap()),
        ("tag", Column::from_strs(&["a", "b", "c", "d"]).unwrap()),
    ])
    .unwrap();
    let sorted = f.sort(&["k"], &[false]).unwrap();
    let tags = sorted.column("tag").unwrap();
    assert_eq!(tags.get(0), Scalar::from("b"));
    assert_eq!(tags.get(1), Scalar::from("d"));
    assert_eq!(tags.get(2), Scalar::from("a"));
    assert_eq!(tags.get(3), Scalar::from("c"));
}

#[test]
fn sort_all_ties_keeps_order() {
    let f = Frame::from_columns(vec![
        ("k", Column::from_vec(vec![5i64; 4]).unwrap()),
        ("pos", Column::from_vec(vec![0i64, 1, 2, 3]).unwrap()),
    ])
    .unwrap();
    let sorted = f.sort(&["k"], &[false]).unwrap();
    let pos = sorted.column("pos").unwrap();
    for i in 0..4 {
        assert_eq!(pos.get(i), Scalar::I64(i as i64));
    }
}
