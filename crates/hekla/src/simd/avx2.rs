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

//! AVX2 kernel variants for the hot f64/f32/i64/i32 paths.
//!
//! Each public shim is safe: `install` is only called after the feature has
//! been detected (or the caller forced a level at or below detection), so the
//! `#[target_feature]` bodies are sound to enter. Reductions keep the same
//! four-accumulator association order as the scalar kernels, per 256-bit
//! lane group.

#![cfg(target_arch = "x86_64")]

use std::arch::x86_64::*;

use crate::simd::table::{CmpOp, Dispatch};

/// Overwrite the hot entries of `d` with the AVX2 variants. Kernels without
/// a 256-bit variant keep their scalar entries.
pub fn install(d: &mut Dispatch) {
    d.kf64.sum = sum_f64;
    d.kf64.add = add_f64;
    d.kf64.sub = sub_f64;
    d.kf64.mul = mul_f64;
    d.kf64.div = div_f64;
    d.kf64.add_scalar = add_scalar_f64;
    d.kf64.sub_scalar = sub_scalar_f64;
    d.kf64.mul_scalar = mul_scalar_f64;
    d.kf64.div_scalar = div_scalar_f64;
    d.kf64.cmp_scalar = cmp_scalar_f64;
    d.kf32.sum = sum_f32;
    d.ki64.sum = sum_i64;
    d.ki64.add = add_i64;
    d.ki64.sub = sub_i64;
    d.ki64.add_scalar = add_scalar_i64;
    d.ki64.cmp_scalar = cmp_scalar_i64;
    d.ki32.sum = sum_i32;
    d.ki32.add = add_i32;
    d.ki32.sub = sub_i32;
    d.ki32.mul = mul_i32;
}

// ---------------------------------------------------------------------------
// f64 reductions
// ---------------------------------------------------------------------------

fn sum_f64(xs: &[f64]) -> f64 {
    unsafe { sum_f64_impl(xs) }
}

#[target_feature(enable = "avx2")]
unsafe fn sum_f64_impl(xs: &[f64]) -> f64 {
    let n = xs.len();
    let ptr = xs.as_ptr();
    let mut acc0 = _mm256_setzero_pd();
    let mut acc1 = _mm256_setzero_pd();
    let mut acc2 = _mm256_setzero_pd();
    let mut acc3 = _mm256_setzero_pd();
    let mut i = 0;
    while i + 16 <= n {
        acc0 = _mm256_add_pd(acc0, _mm256_loadu_pd(ptr.add(i)));
        acc1 = _mm256_add_pd(acc1, _mm256_loadu_pd(ptr.add(i + 4)));
        acc2 = _mm256_add_pd(acc2, _mm256_loadu_pd(ptr.add(i + 8)));
        acc3 = _mm256_add_pd(acc3, _mm256_loadu_pd(ptr.add(i + 12)));
        i += 16;
    }
    let acc = _mm256_add_pd(_mm256_add_pd(acc0, acc1), _mm256_add_pd(acc2, acc3));
    let mut lanes = [0.0f64; 4];
    _mm256_storeu_pd(lanes.as_mut_ptr(), acc);
    let mut total = lanes[0] + lanes[1] + lanes[2] + lanes[3];
    while i < n {
        total += *ptr.add(i);
        i += 1;
    }
    total
}

fn sum_f32(xs: &[f32]) -> f32 {
    unsafe { sum_f32_impl(xs) }
}

#[target_feature(enable = "avx2")]
unsafe fn sum_f32_impl(xs: &[f32]) -> f32 {
    let n = xs.len();
    let ptr = xs.as_ptr();
    let mut acc0 = _mm256_setzero_ps();
    let mut acc1 = _mm256_setzero_ps();
    let mut i = 0;
    while i + 16 <= n {
        acc0 = _mm256_add_ps(acc0, _mm256_loadu_ps(ptr.add(i)));
        acc1 = _mm256_add_ps(acc1, _mm256_loadu_ps(ptr.add(i + 8)));
        i += 16;
    }
    let acc = _mm256_add_ps(acc0, acc1);
    let mut lanes = [0.0f32; 8];
    _mm256_storeu_ps(lanes.as_mut_ptr(), acc);
    let mut total = lanes.iter().sum::<f32>();
    while i < n {
        total += *ptr.add(i);
        i += 1;
    }
    total
}

// ---------------------------------------------------------------------------
// Integer reductions
// ---------------------------------------------------------------------------

fn sum_i64(xs: &[i64]) -> i64 {
    unsafe { sum_i64_impl(xs) }
}

#[target_feature(enable = "avx2")]
unsafe fn sum_i64_impl(xs: &[i64]) -> i64 {
    let n = xs.len();
    let ptr = xs.as_ptr();
    let mut acc0 = _mm256_setzero_si256();
    let mut acc1 = _mm256_setzero_si256();
    let mut i = 0;
    while i + 8 <= n {
        acc0 = _mm256_add_epi64(acc0, _mm256_loadu_si256(ptr.add(i) as *const __m256i));
        acc1 = _mm256_add_epi64(acc1, _mm256_loadu_si256(ptr.add(i + 4) as *const __m256i));
        i += 8;
    }
    let acc = _mm256_add_epi64(acc0, acc1);
    let mut lanes = [0i64; 4];
    _mm256_storeu_si256(lanes.as_mut_ptr() as *mut __m256i, acc);
    let mut total = lanes[0]
        .wrapping_add(lanes[1])
        .wrapping_add(lanes[2])
        .wrapping_add(lanes[3]);
    while i < n {
        total = total.wrapping_add(*ptr.add(i));
        i += 1;
    }
    total
}

fn sum_i32(xs: &[i32]) -> i32 {
    unsafe { sum_i32_impl(xs) }
}

#[target_feature(enable = "avx2")]
unsafe fn sum_i32_impl(xs: &[i32]) -> i32 {
    let n = xs.len();
    let ptr = xs.as_ptr();
    let mut acc = _mm256_setzero_si256();
    let mut i = 0;
    while i + 8 <= n {
        acc = _mm256_add_epi32(acc, _mm256_loadu_si256(ptr.add(i) as *const __m256i));
        i += 8;
    }
    let mut lanes = [0i32; 8];
    _mm256_storeu_si256(lanes.as_mut_ptr() as *mut __m256i, acc);
    let mut total = lanes.iter().fold(0i32, |a, &b| a.wrapping_add(b));
    while i < n {
        total = total.wrapping_add(*ptr.add(i));
        i += 1;
    }
    total
}

// ---------------------------------------------------------------------------
// Elementwise — f64
// ---------------------------------------------------------------------------

macro_rules! binary_f64 {
    ($shim:ident, $impl_name:ident, $intrinsic:ident, $op:tt) => {
        fn $shim(a: &[f64], b: &[f64], out: &mut [f64]) {
            unsafe { $impl_name(a, b, out) }
        }

        #[target_feature(enable = "avx2")]
        unsafe fn $impl_name(a: &[f64], b: &[f64], out: &mut [f64]) {
            let n = a.len();
            let mut i = 0;
            while i + 4 <= n {
                let va = _mm256_loadu_pd(a.as_ptr().add(i));
                let vb = _mm256_loadu_pd(b.as_ptr().add(i));
                _mm256_storeu_pd(out.as_mut_ptr().add(i), $intrinsic(va, vb));
                i += 4;
            }
            while i < n {
                out[i] = a[i] $op b[i];
                i += 1;
            }
        }
    };
}

binary_f64!(add_f64, add_f64_impl, _mm256_add_pd, +);
binary_f64!(sub_f64, sub_f64_impl, _mm256_sub_pd, -);
binary_f64!(mul_f64, mul_f64_impl, _mm256_mul_pd, *);
binary_f64!(div_f64, div_f64_impl, _mm256_div_pd, /);

macro_rules! scalar_f64 {
    ($shim:ident, $impl_name:ident, $intrinsic:ident, $op:tt) => {
        fn $shim(a: &[f64], s: f64, out: &mut [f64]) {
            unsafe { $impl_name(a, s, out) }
        }

        #[target_feature(enable = "avx2")]
        unsafe fn $impl_name(a: &[f64], s: f64, out: &mut [f64]) {
            let n = a.len();
            let vs = _mm256_set1_pd(s);
            let mut i = 0;
            while i + 4 <= n {
                let va = _mm256_loadu_pd(a.as_ptr().add(i));
                _mm256_storeu_pd(out.as_mut_ptr().add(i), $intrinsic(va, vs));
                i += 4;
            }
            while i < n {
                out[i] = a[i] $op s;
                i += 1;
            }
        }
    };
}

scalar_f64!(add_scalar_f64, add_scalar_f64_impl, _mm256_add_pd, +);
scalar_f64!(sub_scalar_f64, sub_scalar_f64_impl, _mm256_sub_pd, -);
scalar_f64!(mul_scalar_f64, mul_scalar_f64_impl, _mm256_mul_pd, *);
scalar_f64!(div_scalar_f64, div_scalar_f64_impl, _mm256_div_pd, /);

// ---------------------------------------------------------------------------
// Elementwise — integers
// ---------------------------------------------------------------------------

macro_rules! binary_int {
    ($shim:ident, $impl_name:ident, $t:ty, $lanes:expr, $intrinsic:ident, $fallback:ident) => {
        fn $shim(a: &[$t], b: &[$t], out: &mut [$t]) {
            unsafe { $impl_name(a, b, out) }
        }

        #[target_feature(enable = "avx2")]
        unsafe fn $impl_name(a: &[$t], b: &[$t], out: &mut [$t]) {
            let n = a.len();
            let mut i = 0;
            while i + $lanes <= n {
                let va = _mm256_loadu_si256(a.as_ptr().add(i) as *const __m256i);
                let vb = _mm256_loadu_si256(b.as_ptr().add(i) as *const __m256i);
                _mm256_storeu_si256(out.as_mut_ptr().add(i) as *mut __m256i, $intrinsic(va, vb));
                i += $lanes;
            }
            while i < n {
                out[i] = a[i].$fallback(b[i]);
                i += 1;
            }
        }
    };
}

binary_int!(add_i64, add_i64_impl, i64, 4, _mm256_add_epi64, wrapping_add);
binary_int!(sub_i64, sub_i64_impl, i64, 4, _mm256_sub_epi64, wrapping_sub);
binary_int!(add_i32, add_i32_impl, i32, 8, _mm256_add_epi32, wrapping_add);
binary_int!(sub_i32, sub_i32_impl, i32, 8, _mm256_sub_epi32, wrapping_sub);
binary_int!(mul_i32, mul_i32_impl, i32, 8, _mm256_mullo_epi32, wrapping_mul);

fn add_scalar_i64(a: &[i64], s: i64, out: &mut [i64]) {
    unsafe { add_scalar_i64_impl(a, s, out) }
}

#[target_feature(enable = "avx2")]
unsafe fn add_scalar_i64_impl(a: &[i64], s: i64, out: &mut [i64]) {
    let n = a.len();
    let vs = _mm256_set1_epi64x(s);
    let mut i = 0;
    while i + 4 <= n {
        let va = _mm256_loadu_si256(a.as_ptr().add(i) as *const __m256i);
        _mm256_storeu_si256(out.as_mut_ptr().add(i) as *mut __m256i, _mm256_add_epi64(va, vs));
        i += 4;
    }
    while i < n {
        out[i] = a[i].wrapping_add(s);
        i += 1;
    }
}

// ---------------------------------------------------------------------------
// Comparisons — f64 against a scalar
// ---------------------------------------------------------------------------

fn cmp_scalar_f64(op: CmpOp, a: &[f64], s: f64, out: &mut [u8]) {
    unsafe {
        match op {
            CmpOp::Eq => cmp_scalar_f64_imm::<_CMP_EQ_OQ>(a, s, out),
            CmpOp::Ne => cmp_scalar_f64_imm::<_CMP_NEQ_UQ>(a, s, out),
            CmpOp::Lt => cmp_scalar_f64_imm::<_CMP_LT_OQ>(a, s, out),
            CmpOp::Le => cmp_scalar_f64_imm::<_CMP_LE_OQ>(a, s, out),
            CmpOp::Gt => cmp_scalar_f64_imm::<_CMP_GT_OQ>(a, s, out),
            CmpOp::Ge => cmp_scalar_f64_imm::<_CMP_GE_OQ>(a, s, out),
        }
    }
}

#[target_feature(enable = "avx2")]
unsafe fn cmp_scalar_f64_imm<const IMM: i32>(a: &[f64], s: f64, out: &mut [u8]) {
    let n = a.len();
    let vs = _mm256_set1_pd(s);
    let mut i = 0;
    while i + 4 <= n {
        let va = _mm256_loadu_pd(a.as_ptr().add(i));
        let m = _mm256_movemask_pd(_mm256_cmp_pd::<IMM>(va, vs));
        out[i] = (m & 1) as u8;
        out[i + 1] = ((m >> 1) & 1) as u8;
        out[i + 2] = ((m >> 2) & 1) as u8;
        out[i + 3] = ((m >> 3) & 1) as u8;
        i += 4;
    }
    while i < n {
        out[i] = cmp_one_f64::<IMM>(a[i], s) as u8;
        i += 1;
    }
}

#[inline]
fn cmp_one_f64<const IMM: i32>(a: f64, s: f64) -> bool {
    match IMM {
        _CMP_EQ_OQ => a == s,
        _CMP_NEQ_UQ => a != s,
        _CMP_LT_OQ => a < s,
        _CMP_LE_OQ => a <= s,
        _CMP_GT_OQ => a > s,
        _CMP_GE_OQ => a >= s,
        _ => unreachable!(),
    }
}

// ---------------------------------------------------------------------------
// Comparisons — i64 against a scalar
// ---------------------------------------------------------------------------

fn cmp_scalar_i64(op: CmpOp, a: &[i64], s: i64, out: &mut [u8]) {
    unsafe { cmp_scalar_i64_impl(op, a, s, out) }
}

#[target_feature(enable = "avx2")]
unsafe fn cmp_scalar_i64_impl(op: CmpOp, a: &[i64], s: i64, out: &mut [u8]) {
    let n = a.len();
    let vs = _mm256_set1_epi64x(s);
    let mut i = 0;
    while i + 4 <= n {
        let va = _mm256_loadu_si256(a.as_ptr().add(i) as *const __m256i);
        // Compose every operator from cmpeq/cmpgt; `invert` flips the mask.
        let (mask, invert) = match op {
            CmpOp::Eq => (_mm256_cmpeq_epi64(va, vs), false),
            CmpOp::Ne => (_mm256_cmpeq_epi64(va, vs), true),
            CmpOp::Gt => (_mm256_cmpgt_epi64(va, vs), false),
            CmpOp::Le => (_mm256_cmpgt_epi64(va, vs), true),
            CmpOp::Lt => (_mm256_cmpgt_epi64(vs, va), false),
            CmpOp::Ge => (_mm256_cmpgt_epi64(vs, va), true),
        };
        let mut m = _mm256_movemask_pd(_mm256_castsi256_pd(mask));
        if invert {
            m = !m & 0xF;
        }
        out[i] = (m & 1) as u8;
        out[i + 1] = ((m >> 1) & 1) as u8;
        out[i + 2] = ((m >> 2) & 1) as u8;
        out[i + 3] = ((m >> 3) & 1) as u8;
        i += 4;
    }
    while i < n {
        let r = match op {
            CmpOp::Eq => a[i] == s,
            CmpOp::Ne => a[i] != s,
            CmpOp::Lt => a[i] < s,
            CmpOp::Le => a[i] <= s,
            CmpOp::Gt => a[i] > s,
            CmpOp::Ge => a[i] >= s,
        };
        out[i] = r as u8;
        i += 1;
    }
}
