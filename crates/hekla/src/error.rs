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

//! Error values returned by the engine.
//!
//! Every fallible API in the workspace returns [`Result`]. Errors carry a
//! human-readable description naming the offending column, operation and,
//! where available, the row or batch index. They propagate up the executor
//! unchanged; nothing in the core prints or retries.

/// Error kinds produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Column missing, duplicate name, type mismatch, unexpected null policy.
    Schema(String),
    /// Length mismatch between columns or between an expression result and
    /// its context.
    Shape(String),
    /// An operation invalid for its operand kinds.
    Type(String),
    /// Integer division by zero, out-of-range cast without `allow_lossy`.
    Arithmetic(String),
    /// Allocator failure. Fatal to the current operation, never poisons
    /// global state.
    OutOfMemory,
    /// Task group was cancelled or its deadline elapsed.
    Cancelled,
    /// Forwarded from an external batch source without interpretation.
    Io(String),
    /// An internal invariant was violated; indicates a bug.
    Internal(String),
}

impl Error {
    pub fn schema(msg: impl Into<String>) -> Self {
        Error::Schema(msg.into())
    }

    pub fn shape(msg: impl Into<String>) -> Self {
        Error::Shape(msg.into())
    }

    pub fn type_err(msg: impl Into<String>) -> Self {
        Error::Type(msg.into())
    }

    pub fn arithmetic(msg: impl Into<String>) -> Self {
        Error::Arithmetic(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Error::Io(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Schema(m) => write!(f, "schema error: {m}"),
            Error::Shape(m) => write!(f, "shape error: {m}"),
            Error::Type(m) => write!(f, "type error: {m}"),
            Error::Arithmetic(m) => write!(f, "arithmetic error: {m}"),
            Error::OutOfMemory => f.write_str("out of memory"),
            Error::Cancelled => f.write_str("cancelled"),
            Error::Io(m) => write!(f, "I/O error: {m}"),
            Error::Internal(m) => write!(f, "internal error: {m}"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
