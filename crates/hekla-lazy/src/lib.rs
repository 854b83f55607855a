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

//! Lazy query engine over the Hekla compute core: expression IR, logical
//! plan with optimizer passes, a batch-streaming physical executor, and the
//! pull-based pipeline surface.

pub mod exec;
pub mod expr;
pub mod lazy;
pub mod optimizer;
pub mod pipeline;
pub mod plan;

pub use exec::clear_cache;
pub use expr::{col, lit, when, Expr, Literal, Operator};
pub use lazy::{FrameExt, LazyFrame, LazyGroupBy};
pub use pipeline::{BatchSink, BatchSource, FrameSource, Pipeline, SourceCtx, VecSink, VecSource};
pub use plan::{LogicalPlan, ScanSource};

// The core's public types, re-exported for one-import use.
pub use hekla::groupby::AggKind;
pub use hekla::join::JoinHow;
pub use hekla::{Column, DataType, Error, Frame, Result, Scalar};
