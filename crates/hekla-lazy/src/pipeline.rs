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

//! Streaming batches: sources, sinks, and the pull-based pipeline.
//!
//! Backpressure falls out of the pull model: a batch is only produced when
//! the consumer asks for the next one, so at most one batch per stage is in
//! flight.

use std::collections::VecDeque;
use std::sync::Arc;

use hekla::frame::{Schema, DEFAULT_BATCH_ROWS};
use hekla::{Error, Frame, Result};

use crate::expr::Expr;

/// Context handed to a source on every pull.
#[derive(Debug, Clone)]
pub struct SourceCtx {
    /// Soft row target per batch.
    pub target_rows: usize,
}

impl Default for SourceCtx {
    fn default() -> Self {
        SourceCtx {
            target_rows: DEFAULT_BATCH_ROWS,
        }
    }
}

/// Pull-based batch producer. `next_batch` returns `None` at end of stream.
pub trait BatchSource {
    fn schema(&self) -> Schema;

    fn next_batch(&mut self, ctx: &SourceCtx) -> Result<Option<Frame>>;

    /// Sources that can evaluate predicates themselves opt in; the scan
    /// keeps a post-filter otherwise.
    fn supports_predicate_pushdown(&self) -> bool {
        false
    }

    /// Offer a pushed-down predicate; return true to take ownership of it.
    fn push_predicate(&mut self, _predicate: &Expr) -> bool {
        false
    }
}

/// Batch consumer.
pub trait BatchSink {
    fn write_batch(&mut self, batch: Frame) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Built-in sources and sinks
// ---------------------------------------------------------------------------

/// Streams an in-memory frame in zero-copy row windows.
pub struct FrameSource {
    frame: Arc<Frame>,
    offset: usize,
}

impl FrameSource {
    pub fn new(frame: Arc<Frame>) -> Self {
        FrameSource { frame, offset: 0 }
    }
}

impl BatchSource for FrameSource {
    fn schema(&self) -> Schema {
        self.frame.schema()
    }

    fn next_batch(&mut self, ctx: &SourceCtx) -> Result<Option<Frame>> {
        if self.offset >= self.frame.nrows() {
            return Ok(None);
        }
        let len = ctx.target_rows.max(1).min(self.frame.nrows() - self.offset);
        let batch = self.frame.slice(self.offset, len);
        self.offset += len;
        Ok(Some(batch))
    }
}

/// A queue of pre-built batches; test and adapter source.
pub struct VecSource {
    schema: Schema,
    batches: VecDeque<Frame>,
}

impl VecSource {
    pub fn new(batches: Vec<Frame>) -> Result<Self> {
        let schema = batches
            .first()
            .map(|f| f.schema())
            .ok_or_else(|| Error::schema("VecSource requires at least one batch"))?;
        for b in &batches {
            if b.schema() != schema {
                return Err(Error::schema("VecSource batches must share a schema"));
            }
        }
        Ok(VecSource {
            schema,
            batches: batches.into(),
        })
    }
}

impl BatchSource for VecSource {
    fn schema(&self) -> Schema {
        self.schema.clone()
    }

    fn next_batch(&mut self, _ctx: &SourceCtx) -> Result<Option<Frame>> {
        Ok(self.batches.pop_front())
    }
}

/// Collects batches into memory.
#[derive(Default)]
pub struct VecSink {
    pub batches: Vec<Frame>,
}

impl BatchSink for VecSink {
    fn write_batch(&mut self, batch: Frame) -> Result<()> {
        self.batches.push(batch);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

enum Stage {
    Filter(Expr),
    Transform(Arc<dyn Fn(Frame) -> Result<Frame> + Send + Sync>),
    Limit(usize),
}

/// Chainable batch pipeline over one source.
pub struct Pipeline {
    source: Box<dyn BatchSource + Send>,
    stages: Vec<Stage>,
    ctx: SourceCtx,
}

impl Pipeline {
    pub fn new(source: Box<dyn BatchSource + Send>) -> Self {
        Pipeline {
            source,
            stages: Vec::new(),
            ctx: SourceCtx::default(),
        }
    }

    pub fn with_batch_rows(mut self, rows: usize) -> Self {
        self.ctx.target_rows = rows.max(1);
        self
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.stages.push(Stage::Filter(predicate));
        self
    }

    pub fn transform(
        mut self,
        f: impl Fn(Frame) -> Result<Frame> + Send + Sync + 'static,
    ) -> Self {
        self.stages.push(Stage::Transform(Arc::new(f)));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.stages.push(Stage::Limit(n));
        self
    }

    /// Pull one transformed batch. `remaining` tracks limit budgets by
    /// stage index.
    fn pull(&mut self, remaining: &mut [usize]) -> Result<Option<Frame>> {
        'outer: loop {
            // A fully spent limit ends the stream without pulling more.
            for (i, stage) in self.stages.iter().enumerate() {
                if matches!(stage, Stage::Limit(_)) && remaining[i] == 0 {
                    return Ok(None);
                }
            }
            let Some(mut batch) = self.source.next_batch(&self.ctx)? else {
                return Ok(None);
            };
            for (i, stage) in self.stages.iter().enumerate() {
                match stage {
                    Stage::Filter(predicate) => {
                        let mask = crate::exec::eval::filter_mask(&batch, predicate)?;
                        batch = batch.filter_mask(&mask)?;
                    }
                    Stage::Transform(f) => {
                        batch = f(batch)?;
                    }
                    Stage::Limit(_) => {
                        let take = remaining[i].min(batch.nrows());
                        remaining[i] -= take;
                        if take < batch.nrows() {
                            batch = batch.slice(0, take);
                        }
                    }
                }
                if batch.is_empty() {
                    continue 'outer;
                }
            }
            return Ok(Some(batch));
        }
    }

    fn budgets(&self) -> Vec<usize> {
        self.stages
            .iter()
            .map(|s| match s {
                Stage::Limit(n) => *n,
                _ => usize::MAX,
            })
            .collect()
    }

    /// Concatenate every transformed batch into one frame.
    pub fn collect(mut self) -> Result<Frame> {
        let mut remaining = self.budgets();
        let mut batches = Vec::new();
        while let Some(batch) = self.pull(&mut remaining)? {
            batches.push(batch);
        }
        if batches.is_empty() {
            let schema = self.source.schema();
            let mut cols = Vec::with_capacity(schema.len());
            for f in schema.fields() {
                cols.push((f.name.clone(), hekla::Column::empty(&f.dtype)?));
            }
            return Frame::new(cols);
        }
        Frame::concat(&batches)
    }

    /// Invoke `f` per transformed batch.
    pub fn for_each(mut self, mut f: impl FnMut(&Frame) -> Result<()>) -> Result<()> {
        let mut remaining = self.budgets();
        while let Some(batch) = self.pull(&mut remaining)? {
            f(&batch)?;
        }
        Ok(())
    }

    /// Drain into a sink, then finish it.
    pub fn sink(mut self, sink: &mut dyn BatchSink) -> Result<()> {
        let mut remaining = self.budgets();
        while let Some(batch) = self.pull(&mut remaining)? {
            sink.write_batch(batch)?;
        }
        sink.finish()
    }
}
