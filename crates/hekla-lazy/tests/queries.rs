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

//! End-to-end query scenarios over the lazy engine.

use std::collections::HashMap;

use hekla_lazy::{col, lit, when, AggKind, Column, DataType, Frame, FrameExt, JoinHow, Scalar};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Collect column 0 (string) -> column 1 (i64) into a map.
fn collect_str_i64(frame: &Frame) -> HashMap<String, i64> {
    let mut map = HashMap::new();
    for row in 0..frame.nrows() {
        let key = match frame.column_at(0).get(row) {
            Scalar::Str(s) => s.to_string(),
            other => other.to_string(),
        };
        let val = frame.column_at(1).get(row).to_i64().unwrap();
        map.insert(key, val);
    }
    map
}

fn sales() -> Frame {
    Frame::from_columns(vec![
        (
            "category",
            Column::from_strs(&["A", "B", "A", "B", "A"]).unwrap(),
        ),
        ("value", Column::from_vec(vec![10i64, 20, 30, 40, 50]).unwrap()),
    ])
    .unwrap()
}

fn people() -> (Frame, Frame) {
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

// ---------------------------------------------------------------------------
// Seed scenarios
// ---------------------------------------------------------------------------

#[test]
fn filter_group_sum() {
    let out = sales()
        .lazy()
        .filter(col("value").gt(lit(15)))
        .group_by(vec![col("category")])
        .agg(vec![col("value").sum()])
        .collect()
        .unwrap();
    assert_eq!(out.nrows(), 2);
    let map = collect_str_i64(&out);
    assert_eq!(map["A"], 80);
    assert_eq!(map["B"], 60);
}

#[test]
fn inner_join_probe_order() {
    let (left, right) = people();
    let out = left
        .lazy()
        .join(right.lazy(), &["id"], &["id"], JoinHow::Inner, "_right")
        .collect()
        .unwrap();
    assert_eq!(out.nrows(), 2);
    assert_eq!(out.names(), vec!["id", "name", "score"]);
    assert_eq!(out.row(0), vec![
        Scalar::I64(2),
        Scalar::from("Bob"),
        Scalar::I64(85)
    ]);
    assert_eq!(out.row(1), vec![
        Scalar::I64(3),
        Scalar::from("Charlie"),
        Scalar::I64(92)
    ]);
}

#[test]
fn left_join_unmatched_null() {
    let (left, right) = people();
    let out = left
        .lazy()
        .join(right.lazy(), &["id"], &["id"], JoinHow::Left, "_right")
        .collect()
        .unwrap();
    assert_eq!(out.nrows(), 4);
    let score = out.column("score").unwrap();
    assert!(score.get(0).is_null()); // id = 1
    assert_eq!(score.get(1), Scalar::I64(85));
    assert_eq!(score.get(2), Scalar::I64(92));
    assert!(score.get(3).is_null()); // id = 4
}

#[test]
fn rolling_mean_seed() {
    let f = Frame::from_columns(vec![(
        "v",
        Column::from_vec(vec![10i64, 20, 30, 40, 50]).unwrap(),
    )])
    .unwrap();
    let out = f
        .lazy()
        .select(vec![col("v").rolling_mean(3, 1)])
        .collect()
        .unwrap();
    let v = out.column("v").unwrap().prim::<f64>().unwrap();
    assert_eq!(v.values(), &[10.0, 15.0, 20.0, 30.0, 40.0]);
}

#[test]
fn pivot_long_to_wide() {
    let f = Frame::from_columns(vec![
        (
            "date",
            Column::from_strs(&["d1", "d1", "d2", "d2"]).unwrap(),
        ),
        (
            "metric",
            Column::from_strs(&["sales", "cost", "sales", "cost"]).unwrap(),
        ),
        ("value", Column::from_vec(vec![100i64, 60, 150, 80]).unwrap()),
    ])
    .unwrap();
    let out = f.pivot("date", "metric", "value", AggKind::Sum).unwrap();
    assert_eq!(out.names(), vec!["date", "sales", "cost"]);
    assert_eq!(out.nrows(), 2);
    assert_eq!(out.row(0), vec![
        Scalar::from("d1"),
        Scalar::I64(100),
        Scalar::I64(60)
    ]);
    assert_eq!(out.row(1), vec![
        Scalar::from("d2"),
        Scalar::I64(150),
        Scalar::I64(80)
    ]);
}

// ---------------------------------------------------------------------------
// Lazy / eager equivalence
// ---------------------------------------------------------------------------

#[test]
fn lazy_matches_eager() {
    let f = sales();
    let eager = f.filter(col("value").gt(lit(15))).unwrap();
    let lazy = f
        .lazy()
        .filter(col("value").gt(lit(15)))
        .collect()
        .unwrap();
    assert!(eager.equals(&lazy));

    let eager_g = f
        .group_by(&["category"])
        .agg(vec![col("value").sum()])
        .unwrap();
    let lazy_g = f
        .lazy()
        .group_by(vec![col("category")])
        .agg(vec![col("value").sum()])
        .collect()
        .unwrap();
    assert!(eager_g.equals(&lazy_g));
}

// ---------------------------------------------------------------------------
// Expression features
// ---------------------------------------------------------------------------

#[test]
fn with_column_arithmetic() {
    let out = sales()
        .lazy()
        .with_column("double", col("value") * lit(2))
        .with_column("ratio", col("double") / col("value"))
        .collect()
        .unwrap();
    assert_eq!(out.column("double").unwrap().get(0), Scalar::I64(20));
    // Integer division yields f64.
    assert_eq!(out.column("ratio").unwrap().get(0), Scalar::F64(2.0));
}

#[test]
fn when_then_otherwise() {
    let out = sales()
        .lazy()
        .select(vec![
            col("category"),
            when(col("value").gt_eq(lit(30)))
                .then(lit("big"))
                .otherwise(lit("small"))
                .alias("size"),
        ])
        .collect()
        .unwrap();
    assert_eq!(out.column("size").unwrap().get(0), Scalar::from("small"));
    assert_eq!(out.column("size").unwrap().get(2), Scalar::from("big"));
}

#[test]
fn string_namespace() {
    let f = Frame::from_columns(vec![(
        "s",
        Column::from_strs(&["  Foo ", "barbaz", "Quux"]).unwrap(),
    )])
    .unwrap();
    let out = f
        .lazy()
        .select(vec![
            col("s").str().trim().str().upper().alias("up"),
            col("s").str().contains("bar").alias("has_bar"),
            col("s").str().len().alias("chars"),
        ])
        .collect()
        .unwrap();
    assert_eq!(out.column("up").unwrap().get(0), Scalar::from("FOO"));
    assert_eq!(out.column("has_bar").unwrap().get(1), Scalar::Bool(true));
    assert_eq!(out.column("chars").unwrap().get(1), Scalar::U32(6));
}

#[test]
fn null_handling() {
    let f = Frame::from_columns(vec![
        (
            "a",
            Column::from_options(&[Some(1i64), None, Some(3)]).unwrap(),
        ),
        (
            "b",
            Column::from_options(&[None, Some(20i64), None]).unwrap(),
        ),
    ])
    .unwrap();
    let out = f
        .lazy()
        .select(vec![
            col("a").is_null().alias("a_null"),
            col("a").fill_null(0).alias("a_filled"),
            col("a").coalesce(vec![col("b"), lit(-1)]).alias("first"),
        ])
        .collect()
        .unwrap();
    assert_eq!(out.column("a_null").unwrap().get(1), Scalar::Bool(true));
    assert_eq!(out.column("a_filled").unwrap().get(1), Scalar::I64(0));
    assert_eq!(out.column("first").unwrap().get(0), Scalar::I64(1));
    assert_eq!(out.column("first").unwrap().get(1), Scalar::I64(20));
}

#[test]
fn cast_in_query() {
    let out = sales()
        .lazy()
        .select(vec![col("value").cast(DataType::F64).alias("f")])
        .collect()
        .unwrap();
    assert_eq!(out.schema().dtype("f").unwrap(), &DataType::F64);
}

#[test]
fn window_functions_in_select() {
    let f = Frame::from_columns(vec![(
        "v",
        Column::from_vec(vec![3i64, 1, 4, 1, 5]).unwrap(),
    )])
    .unwrap();
    let out = f
        .lazy()
        .select(vec![
            col("v").cum_sum().alias("running"),
            col("v").lag(1, None).alias("prev"),
            col("v").rank().alias("rank"),
        ])
        .collect()
        .unwrap();
    let running = out.column("running").unwrap();
    assert_eq!(running.get(4), Scalar::I64(14));
    assert!(out.column("prev").unwrap().get(0).is_null());
    assert_eq!(out.column("rank").unwrap().get(4), Scalar::U32(5));
}

#[test]
fn aggregations_in_select_broadcast() {
    let out = sales()
        .lazy()
        .select(vec![
            col("value"),
            col("value").mean().alias("mean"),
        ])
        .collect()
        .unwrap();
    assert_eq!(out.nrows(), 5);
    assert_eq!(out.column("mean").unwrap().get(0), Scalar::F64(30.0));
    assert_eq!(out.column("mean").unwrap().get(4), Scalar::F64(30.0));
}

#[test]
fn group_by_many_aggs() {
    let out = sales()
        .lazy()
        .group_by(vec![col("category")])
        .sorted()
        .agg(vec![
            col("value").sum().alias("sum"),
            col("value").mean().alias("mean"),
            col("value").min().alias("min"),
            col("value").max().alias("max"),
            col("value").count().alias("n"),
            col("value").std().alias("std"),
            col("value").median().alias("median"),
        ])
        .collect()
        .unwrap();
    assert_eq!(out.nrows(), 2);
    // Sorted keys: A first.
    assert_eq!(out.column("category").unwrap().get(0), Scalar::from("A"));
    assert_eq!(out.column("sum").unwrap().get(0), Scalar::I64(90));
    assert_eq!(out.column("mean").unwrap().get(0), Scalar::F64(30.0));
    assert_eq!(out.column("min").unwrap().get(0), Scalar::I64(10));
    assert_eq!(out.column("max").unwrap().get(0), Scalar::I64(50));
    assert_eq!(out.column("n").unwrap().get(0), Scalar::U32(3));
    assert_eq!(out.column("median").unwrap().get(0), Scalar::F64(30.0));
}

// ---------------------------------------------------------------------------
// Reshaping, cache, udf
// ---------------------------------------------------------------------------

#[test]
fn melt_round() {
    let f = Frame::from_columns(vec![
        ("id", Column::from_strs(&["x", "y"]).unwrap()),
        ("a", Column::from_vec(vec![1i64, 2]).unwrap()),
        ("b", Column::from_vec(vec![3i64, 4]).unwrap()),
    ])
    .unwrap();
    let out = f
        .melt(&["id"], &["a", "b"], "variable", "value")
        .unwrap();
    assert_eq!(out.nrows(), 4);
    assert_eq!(out.names(), vec!["id", "variable", "value"]);
    assert_eq!(out.row(0), vec![
        Scalar::from("x"),
        Scalar::from("a"),
        Scalar::I64(1)
    ]);
    assert_eq!(out.row(3), vec![
        Scalar::from("y"),
        Scalar::from("b"),
        Scalar::I64(4)
    ]);
}

#[test]
fn cache_reuses_materialization() {
    hekla_lazy::clear_cache();
    let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let c2 = counter.clone();
    let cached = sales()
        .lazy()
        .udf("value", move |col| {
            c2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(col.clone())
        })
        .cache();
    let a = cached.clone().filter(col("value").gt(lit(0))).collect().unwrap();
    let b = cached.clone().filter(col("value").gt(lit(100))).collect().unwrap();
    assert_eq!(a.nrows(), 5);
    assert_eq!(b.nrows(), 0);
    // The UDF ran once: the second consumer hit the cache.
    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    hekla_lazy::clear_cache();
}

#[test]
fn udf_replaces_column() {
    let out = sales()
        .lazy()
        .udf("value", |col| {
            col.cast(&DataType::F64, false)
        })
        .collect()
        .unwrap();
    assert_eq!(out.schema().dtype("value").unwrap(), &DataType::F64);
}

#[test]
fn udf_length_mismatch_errors() {
    let res = sales()
        .lazy()
        .udf("value", |col| Ok(col.slice(0, 1)))
        .collect();
    assert!(matches!(res, Err(hekla_lazy::Error::Shape(_))));
}

// ---------------------------------------------------------------------------
// Sort / limit / fetch
// ---------------------------------------------------------------------------

#[test]
fn sort_desc_and_fetch() {
    let out = sales()
        .lazy()
        .sort(&["value"], &[true])
        .fetch(2)
        .unwrap();
    assert_eq!(out.nrows(), 2);
    assert_eq!(out.column("value").unwrap().get(0), Scalar::I64(50));
    assert_eq!(out.column("value").unwrap().get(1), Scalar::I64(40));
}

#[test]
fn top_k_equals_sort_then_head() {
    let f = Frame::from_columns(vec![(
        "v",
        Column::from_vec(vec![5i64, 1, 4, 1, 3, 9, 2]).unwrap(),
    )])
    .unwrap();
    let full = f.lazy().sort(&["v"], &[false]).collect().unwrap().head(3);
    let topk = f.lazy().sort(&["v"], &[false]).limit(3).collect().unwrap();
    assert!(full.equals(&topk));
}

#[test]
fn explain_shows_plan() {
    let lf = sales()
        .lazy()
        .filter(col("value").gt(lit(15)))
        .select(vec![col("category")]);
    let raw = lf.explain(false);
    assert!(raw.contains("FILTER"));
    let optimized = lf.explain(true);
    assert!(optimized.contains("SCAN"));
    assert!(optimized.contains("predicate="));
}

// ---------------------------------------------------------------------------
// Boundary conditions
// ---------------------------------------------------------------------------

#[test]
fn empty_frame_through_query() {
    let f = Frame::from_columns(vec![
        ("k", Column::from_vec(Vec::<i64>::new()).unwrap()),
        ("v", Column::from_vec(Vec::<i64>::new()).unwrap()),
    ])
    .unwrap();
    let out = f
        .lazy()
        .filter(col("v").gt(lit(0)))
        .group_by(vec![col("k")])
        .agg(vec![col("v").sum()])
        .collect()
        .unwrap();
    assert_eq!(out.nrows(), 0);
}

#[test]
fn all_null_aggregation() {
    let f = Frame::from_columns(vec![
        ("k", Column::from_strs(&["a", "a"]).unwrap()),
        (
            "v",
            Column::from_options::<f64>(&[None, None]).unwrap(),
        ),
    ])
    .unwrap();
    let out = f
        .group_by(&["k"])
        .agg(vec![col("v").min().alias("min"), col("v").mean().alias("mean")])
        .unwrap();
    assert!(out.column("min").unwrap().get(0).is_null());
    assert!(out.column("mean").unwrap().get(0).is_null());
}
