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

//! Group-by and join throughput over a synthetic H2O-style table.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use hekla_lazy::{col, AggKind, Column, Frame, FrameExt, JoinHow};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn build_frame(n: usize, groups: i64) -> Frame {
    let mut rng = StdRng::seed_from_u64(42);
    let keys: Vec<i64> = (0..n).map(|_| rng.gen_range(0..groups)).collect();
    let values: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..100.0)).collect();
    Frame::from_columns(vec![
        ("id", Column::from_vec(keys).unwrap()),
        ("v", Column::from_vec(values).unwrap()),
    ])
    .unwrap()
}

fn bench_group_by(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_by_sum");
    for &n in &[100_000usize, 1_000_000] {
        let frame = build_frame(n, 1_000);
        group.bench_with_input(BenchmarkId::from_parameter(n), &frame, |b, frame| {
            b.iter(|| {
                frame
                    .group_by(&["id"])
                    .agg(vec![col("v").sum(), col("v").mean()])
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("inner_join");
    for &n in &[100_000usize, 1_000_000] {
        let left = build_frame(n, 100_000);
        let right = build_frame(10_000, 100_000);
        group.bench_with_input(
            BenchmarkId::from_parameter(n),
            &(left, right),
            |b, (left, right)| {
                b.iter(|| {
                    left.join_on(right, &["id"], &["id"], JoinHow::Inner, "_r")
                        .unwrap()
                })
            },
        );
    }
    group.finish();
}

fn bench_pivot(c: &mut Criterion) {
    let frame = {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 100_000;
        let dates: Vec<i64> = (0..n).map(|_| rng.gen_range(0..365)).collect();
        let metrics: Vec<&str> = (0..n)
            .map(|_| if rng.gen_bool(0.5) { "sales" } else { "cost" })
            .collect();
        let values: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..1000.0)).collect();
        Frame::from_columns(vec![
            ("date", Column::from_vec(dates).unwrap()),
            ("metric", Column::from_strs(&metrics).unwrap()),
            ("value", Column::from_vec(values).unwrap()),
        ])
        .unwrap()
    };
    c.bench_function("pivot_sum", |b| {
        b.iter(|| frame.pivot("date", "metric", "value", AggKind::Sum).unwrap())
    });
}

criterion_group!(benches, bench_group_by, bench_join, bench_pivot);
criterion_main!(benches);
