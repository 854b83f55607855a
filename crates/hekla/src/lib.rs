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

//! Hekla core: columnar storage, SIMD kernels with runtime dispatch, a
//! work-stealing thread pool, the Swiss-table hash core, and the grouped
//! aggregation and hash-join engines.
//!
//! Columns are immutable after construction; all sharing is refcounted.
//! Kernels route through a process-wide dispatch table selected by CPU
//! feature detection (`HEKLA_SIMD` forces a lower level), and operators
//! switch between serial and morsel-parallel execution by input size
//! (`HEKLA_MAX_THREADS` caps the pool).

pub mod column;
pub mod error;
pub mod frame;
pub mod groupby;
pub mod join;
pub mod mem;
pub mod pool;
pub mod simd;
pub mod sort;
pub mod swiss;
pub mod value;
pub mod window;

pub use column::{Bitmap, Column, DataType, Field, PrimKind, PrimType, TimeUnit};
pub use error::{Error, Result};
pub use frame::{Frame, Record, Schema, DEFAULT_BATCH_ROWS};
pub use groupby::AggKind;
pub use join::JoinHow;
pub use pool::{set_thread_count, thread_count, TaskGroup};
pub use simd::{reinit_dispatch, set_simd_level, simd_level, SimdLevel};
pub use value::Scalar;
