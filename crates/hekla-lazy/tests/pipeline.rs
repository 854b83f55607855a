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

//! Streaming pipeline and batch-source behavior.

use std::sync::Arc;

use hekla_lazy::{
    col, lit, Column, Frame, FrameSource, LazyFrame, Pipeline, Scalar, VecSink, VecSource,
};

fn batch(values: std::ops::Range<i64>) -> Frame {
    Frame::from_columns(vec![(
        "v",
        Column::from_vec(values.collect::<Vec<i64>>()).unwrap(),
    )])
    .unwrap()
}

#[test]
fn frame_source_slices_batches() {
    let frame = Arc::new(batch(0..1000));
    let source = FrameSource::new(frame);
    let out = Pipeline::new(Box::new(source))
        .with_batch_rows(128)
        .collect()
        .unwrap();
    assert_eq!(out.nrows(), 1000);
    assert_eq!(out.column("v").unwrap().get(999), Scalar::I64(999));
}

#[test]
fn pipeline_filter_transform_limit() {
    let source = VecSource::new(vec![batch(0..100), batch(100..200), batch(200..300)]).unwrap();
    let out = Pipeline::new(Box::new(source))
        .filter(col("v").gt_eq(lit(50)))
        .transform(|f| {
            let doubled = hekla_lazy::FrameExt::with_column_expr(&f, "v2", col("v") * lit(2))?;
            Ok(doubled)
        })
        .limit(60)
        .collect()
        .unwrap();
    assert_eq!(out.nrows(), 60);
    assert_eq!(out.column("v").unwrap().get(0), Scalar::I64(50));
    assert_eq!(out.column("v2").unwrap().get(0), Scalar::I64(100));
    assert_eq!(out.column("v").unwrap().get(59), Scalar::I64(109));
}

#[test]
fn for_each_observes_every_batch() {
    let source = VecSource::new(vec![batch(0..10), batch(10..20)]).unwrap();
    let mut seen = 0usize;
    Pipeline::new(Box::new(source))
        .for_each(|f| {
            seen += f.nrows();
            Ok(())
        })
        .unwrap();
    assert_eq!(seen, 20);
}

#[test]
fn sink_collects_batches() {
    let source = VecSource::new(vec![batch(0..10), batch(10..20)]).unwrap();
    let mut sink = VecSink::default();
    Pipeline::new(Box::new(source))
        .filter(col("v").lt(lit(15)))
        .sink(&mut sink)
        .unwrap();
    let total: usize = sink.batches.iter().map(|b| b.nrows()).sum();
    assert_eq!(total, 15);
}

#[test]
fn limit_stops_pulling() {
    // A source that panics past the second batch proves the limit stops the
    // pull instead of draining the stream.
    struct Counting {
        inner: VecSource,
        pulls: usize,
    }
    impl hekla_lazy::BatchSource for Counting {
        fn schema(&self) -> hekla::frame::Schema {
            self.inner.schema()
        }

        fn next_batch(
            &mut self,
            ctx: &hekla_lazy::SourceCtx,
        ) -> hekla_lazy::Result<Option<Frame>> {
            self.pulls += 1;
            assert!(self.pulls <= 2, "limit kept pulling after it was satisfied");
            self.inner.next_batch(ctx)
        }
    }
    let source = Counting {
        inner: VecSource::new(vec![batch(0..10), batch(10..20), batch(20..30)]).unwrap(),
        pulls: 0,
    };
    let out = Pipeline::new(Box::new(source)).limit(12).collect().unwrap();
    assert_eq!(out.nrows(), 12);
}

#[test]
fn scan_source_into_lazy() {
    let source = VecSource::new(vec![batch(0..50), batch(50..100)]).unwrap();
    let out = LazyFrame::scan_source(Box::new(source))
        .filter(col("v").gt_eq(lit(90)))
        .collect()
        .unwrap();
    assert_eq!(out.nrows(), 10);
}
