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

//! Portable kernel implementations.
//!
//! Reductions run four independent accumulators so the dependency chain is
//! hidden and the association order is fixed: lane `k` folds elements
//! `k, k+4, k+8, …`, then the four partials fold left to right. The elementwise
//! loops are written for the auto-vectorizer; the 128-bit dispatch level maps
//! here.

use crate::column::primitive::PrimType;
use crate::simd::table::CmpOp;

// ---------------------------------------------------------------------------
// Reductions
// ---------------------------------------------------------------------------

pub fn sum<T: PrimType>(xs: &[T]) -> T {
    let mut acc = [T::zero(); 4];
    let mut chunks = xs.chunks_exact(4);
    for c in &mut chunks {
        acc[0] = acc[0].add_v(c[0]);
        acc[1] = acc[1].add_v(c[1]);
        acc[2] = acc[2].add_v(c[2]);
        acc[3] = acc[3].add_v(c[3]);
    }
    let mut total = acc[0].add_v(acc[1]).add_v(acc[2]).add_v(acc[3]);
    for &v in chunks.remainder() {
        total = total.add_v(v);
    }
    total
}

pub fn min<T: PrimType>(xs: &[T]) -> Option<T> {
    let mut it = xs.iter();
    let mut best = *it.next()?;
    for &v in it {
        best = best.min_v(v);
    }
    Some(best)
}

pub fn max<T: PrimType>(xs: &[T]) -> Option<T> {
    let mut it = xs.iter();
    let mut best = *it.next()?;
    for &v in it {
        best = best.max_v(v);
    }
    Some(best)
}

pub fn mean<T: PrimType>(xs: &[T]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    // Accumulate in f64 regardless of the element kind.
    let mut acc = [0.0f64; 4];
    let mut chunks = xs.chunks_exact(4);
    for c in &mut chunks {
        acc[0] += c[0].to_f64();
        acc[1] += c[1].to_f64();
        acc[2] += c[2].to_f64();
        acc[3] += c[3].to_f64();
    }
    let mut total = acc[0] + acc[1] + acc[2] + acc[3];
    for &v in chunks.remainder() {
        total += v.to_f64();
    }
    total / xs.len() as f64
}

/// Single-pass Welford variance with `ddof` delta degrees of freedom.
pub fn var<T: PrimType>(xs: &[T], ddof: u8) -> f64 {
    let n = xs.len();
    if n <= ddof as usize {
        return f64::NAN;
    }
    let mut count = 0.0f64;
    let mut mean = 0.0f64;
    let mut m2 = 0.0f64;
    for &v in xs {
        let v = v.to_f64();
        count += 1.0;
        let d = v - mean;
        mean += d / count;
        m2 += d * (v - mean);
    }
    m2 / (count - ddof as f64)
}

pub fn std<T: PrimType>(xs: &[T], ddof: u8) -> f64 {
    var(xs, ddof).sqrt()
}

// ---------------------------------------------------------------------------
// Elementwise arithmetic
// ---------------------------------------------------------------------------

macro_rules! binary_kernel {
    ($name:ident, $op:ident) => {
        pub fn $name<T: PrimType>(a: &[T], b: &[T], out: &mut [T]) {
            debug_assert!(a.len() == b.len() && a.len() == out.len());
            for i in 0..a.len() {
                out[i] = a[i].$op(b[i]);
            }
        }
    };
}

binary_kernel!(add, add_v);
binary_kernel!(sub, sub_v);
binary_kernel!(mul, mul_v);
binary_kernel!(div, div_v);
binary_kernel!(rem, rem_v);

macro_rules! scalar_kernel {
    ($name:ident, $op:ident) => {
        pub fn $name<T: PrimType>(a: &[T], s: T, out: &mut [T]) {
            debug_assert!(a.len() == out.len());
            for i in 0..a.len() {
                out[i] = a[i].$op(s);
            }
        }
    };
}

scalar_kernel!(add_scalar, add_v);
scalar_kernel!(sub_scalar, sub_v);
scalar_kernel!(mul_scalar, mul_v);
scalar_kernel!(div_scalar, div_v);

/// `out[i] = s - a[i]`.
pub fn rsub_scalar<T: PrimType>(s: T, a: &[T], out: &mut [T]) {
    debug_assert!(a.len() == out.len());
    for i in 0..a.len() {
        out[i] = s.sub_v(a[i]);
    }
}

/// `out[i] = s / a[i]`.
pub fn rdiv_scalar<T: PrimType>(s: T, a: &[T], out: &mut [T]) {
    debug_assert!(a.len() == out.len());
    for i in 0..a.len() {
        out[i] = s.div_v(a[i]);
    }
}

// ---------------------------------------------------------------------------
// Comparisons — one 0/1 byte per lane
// ---------------------------------------------------------------------------

pub fn cmp<T: PrimType>(op: CmpOp, a: &[T], b: &[T], out: &mut [u8]) {
    debug_assert!(a.len() == b.len() && a.len() == out.len());
    match op {
        CmpOp::Eq => {
            for i in 0..a.len() {
                out[i] = (a[i] == b[i]) as u8;
            }
        }
        CmpOp::Ne => {
            for i in 0..a.len() {
                out[i] = (a[i] != b[i]) as u8;
            }
        }
        CmpOp::Lt => {
            for i in 0..a.len() {
                out[i] = (a[i] < b[i]) as u8;
            }
        }
        CmpOp::Le => {
            for i in 0..a.len() {
                out[i] = (a[i] <= b[i]) as u8;
            }
        }
        CmpOp::Gt => {
            for i in 0..a.len() {
                out[i] = (a[i] > b[i]) as u8;
            }
        }
        CmpOp::Ge => {
            for i in 0..a.len() {
                out[i] = (a[i] >= b[i]) as u8;
            }
        }
    }
}

pub fn cmp_scalar<T: PrimType>(op: CmpOp, a: &[T], s: T, out: &mut [u8]) {
    debug_assert!(a.len() == out.len());
    match op {
        CmpOp::Eq => {
            for i in 0..a.len() {
                out[i] = (a[i] == s) as u8;
            }
        }
        CmpOp::Ne => {
            for i in 0..a.len() {
                out[i] = (a[i] != s) as u8;
            }
        }
        CmpOp::Lt => {
            for i in 0..a.len() {
                out[i] = (a[i] < s) as u8;
            }
        }
        CmpOp::Le => {
            for i in 0..a.len() {
                out[i] = (a[i] <= s) as u8;
            }
        }
        CmpOp::Gt => {
            for i in 0..a.len() {
                out[i] = (a[i] > s) as u8;
            }
        }
        CmpOp::Ge => {
            for i in 0..a.len() {
                out[i] = (a[i] >= s) as u8;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Compact the indices of non-zero mask lanes into `out`.
pub fn filter_indices(mask: &[u8], out: &mut Vec<u32>) {
    out.clear();
    out.reserve(mask.len());
    for (i, &m) in mask.iter().enumerate() {
        if m != 0 {
            out.push(i as u32);
        }
    }
}

/// Pack 0/1 lanes into 64-bit words, little-endian within each word.
pub fn filter_mask(mask: &[u8], out: &mut [u64]) {
    debug_assert!(out.len() >= mask.len().div_ceil(64));
    for w in out.iter_mut() {
        *w = 0;
    }
    for (i, &m) in mask.iter().enumerate() {
        if m != 0 {
            out[i / 64] |= 1u64 << (i % 64);
        }
    }
}

pub fn gather<T: PrimType>(xs: &[T], indices: &[u32], out: &mut [T]) {
    debug_assert!(indices.len() == out.len());
    for (o, &i) in out.iter_mut().zip(indices) {
        *o = xs[i as usize];
    }
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

/// Stable argsort: equal elements keep their input order.
pub fn argsort<T: PrimType>(xs: &[T], descending: bool) -> Vec<u32> {
    let mut idx: Vec<u32> = (0..xs.len() as u32).collect();
    if descending {
        idx.sort_by(|&i, &j| xs[j as usize].total_cmp(&xs[i as usize]));
    } else {
        idx.sort_by(|&i, &j| xs[i as usize].total_cmp(&xs[j as usize]));
    }
    idx
}

pub fn sort<T: PrimType>(xs: &mut [T]) {
    xs.sort_by(|a, b| a.total_cmp(b));
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

pub fn hash<T: PrimType>(xs: &[T], out: &mut [u64]) {
    debug_assert!(xs.len() == out.len());
    for (o, &v) in out.iter_mut().zip(xs) {
        *o = v.hash_one();
    }
}

/// Fold `rhs` into `acc` left to right.
pub fn combine_hashes(acc: &mut [u64], rhs: &[u64]) {
    debug_assert!(acc.len() == rhs.len());
    for (a, &b) in acc.iter_mut().zip(rhs) {
        *a = crate::simd::hash::combine(*a, b);
    }
}

// ---------------------------------------------------------------------------
// Grouped aggregation
// ---------------------------------------------------------------------------

pub fn grouped_sum<T: PrimType>(xs: &[T], group_ids: &[u32], out: &mut [T]) {
    debug_assert!(xs.len() == group_ids.len());
    for (&v, &g) in xs.iter().zip(group_ids) {
        out[g as usize] = out[g as usize].add_v(v);
    }
}

pub fn grouped_min<T: PrimType>(xs: &[T], group_ids: &[u32], out: &mut [T], seen: &mut [u8]) {
    debug_assert!(xs.len() == group_ids.len());
    for (&v, &g) in xs.iter().zip(group_ids) {
        let g = g as usize;
        if seen[g] == 0 {
            out[g] = v;
            seen[g] = 1;
        } else {
            out[g] = out[g].min_v(v);
        }
    }
}

pub fn grouped_max<T: PrimType>(xs: &[T], group_ids: &[u32], out: &mut [T], seen: &mut [u8]) {
    debug_assert!(xs.len() == group_ids.len());
    for (&v, &g) in xs.iter().zip(group_ids) {
        let g = g as usize;
        if seen[g] == 0 {
            out[g] = v;
            seen[g] = 1;
        } else {
            out[g] = out[g].max_v(v);
        }
    }
}
