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

//! The dispatch table: one function pointer per kernel × primitive kind,
//! assigned once at initialization from the detected (or forced) CPU level.
//! Hot call sites read through this table and never branch on features.

use crate::column::primitive::PrimType;
use crate::simd::SimdLevel;

/// Lane-wise comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Per-type kernel entries. All kernels share one shape: read-only inputs,
/// an output slice, and (where relevant) a scalar operand.
pub struct Kernels<T: PrimType> {
    pub sum: fn(&[T]) -> T,
    pub min: fn(&[T]) -> Option<T>,
    pub max: fn(&[T]) -> Option<T>,
    pub mean: fn(&[T]) -> f64,
    pub var: fn(&[T], u8) -> f64,
    pub std: fn(&[T], u8) -> f64,
    pub add: fn(&[T], &[T], &mut [T]),
    pub sub: fn(&[T], &[T], &mut [T]),
    pub mul: fn(&[T], &[T], &mut [T]),
    pub div: fn(&[T], &[T], &mut [T]),
    pub rem: fn(&[T], &[T], &mut [T]),
    pub add_scalar: fn(&[T], T, &mut [T]),
    pub sub_scalar: fn(&[T], T, &mut [T]),
    pub rsub_scalar: fn(T, &[T], &mut [T]),
    pub mul_scalar: fn(&[T], T, &mut [T]),
    pub div_scalar: fn(&[T], T, &mut [T]),
    pub rdiv_scalar: fn(T, &[T], &mut [T]),
    pub cmp: fn(CmpOp, &[T], &[T], &mut [u8]),
    pub cmp_scalar: fn(CmpOp, &[T], T, &mut [u8]),
    pub gather: fn(&[T], &[u32], &mut [T]),
    pub argsort: fn(&[T], bool) -> Vec<u32>,
    pub sort: fn(&mut [T]),
    pub hash: fn(&[T], &mut [u64]),
    pub grouped_sum: fn(&[T], &[u32], &mut [T]),
    pub grouped_min: fn(&[T], &[u32], &mut [T], &mut [u8]),
    pub grouped_max: fn(&[T], &[u32], &mut [T], &mut [u8]),
}

// fn pointers are Copy regardless of T.
impl<T: PrimType> Clone for Kernels<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: PrimType> Copy for Kernels<T> {}

fn scalar_kernels<T: PrimType>() -> Kernels<T> {
    use crate::simd::scalar;
    Kernels {
        sum: scalar::sum::<T>,
        min: scalar::min::<T>,
        max: scalar::max::<T>,
        mean: scalar::mean::<T>,
        var: scalar::var::<T>,
        std: scalar::std::<T>,
        add: scalar::add::<T>,
        sub: scalar::sub::<T>,
        mul: scalar::mul::<T>,
        div: scalar::div::<T>,
        rem: scalar::rem::<T>,
        add_scalar: scalar::add_scalar::<T>,
        sub_scalar: scalar::sub_scalar::<T>,
        rsub_scalar: scalar::rsub_scalar::<T>,
        mul_scalar: scalar::mul_scalar::<T>,
        div_scalar: scalar::div_scalar::<T>,
        rdiv_scalar: scalar::rdiv_scalar::<T>,
        cmp: scalar::cmp::<T>,
        cmp_scalar: scalar::cmp_scalar::<T>,
        gather: scalar::gather::<T>,
        argsort: scalar::argsort::<T>,
        sort: scalar::sort::<T>,
        hash: scalar::hash::<T>,
        grouped_sum: scalar::grouped_sum::<T>,
        grouped_min: scalar::grouped_min::<T>,
        grouped_max: scalar::grouped_max::<T>,
    }
}

/// The process-wide kernel table. Populated once per initialization; every
/// hot path indexes into it by element kind and operation.
pub struct Dispatch {
    pub level: SimdLevel,
    pub kf64: Kernels<f64>,
    pub kf32: Kernels<f32>,
    pub ki64: Kernels<i64>,
    pub ki32: Kernels<i32>,
    pub ku64: Kernels<u64>,
    pub ku32: Kernels<u32>,
    pub ki8: Kernels<i8>,
    pub ku8: Kernels<u8>,
    pub filter_indices: fn(&[u8], &mut Vec<u32>),
    pub filter_mask: fn(&[u8], &mut [u64]),
    pub combine_hashes: fn(&mut [u64], &[u64]),
}

impl Dispatch {
    /// Build the table for `level`. Levels without a dedicated variant of a
    /// kernel reuse the nearest implemented width below them.
    pub fn build(level: SimdLevel) -> Dispatch {
        let mut d = Dispatch {
            level,
            kf64: scalar_kernels::<f64>(),
            kf32: scalar_kernels::<f32>(),
            ki64: scalar_kernels::<i64>(),
            ki32: scalar_kernels::<i32>(),
            ku64: scalar_kernels::<u64>(),
            ku32: scalar_kernels::<u32>(),
            ki8: scalar_kernels::<i8>(),
            ku8: scalar_kernels::<u8>(),
            filter_indices: crate::simd::scalar::filter_indices,
            filter_mask: crate::simd::scalar::filter_mask,
            combine_hashes: crate::simd::scalar::combine_hashes,
        };
        install_native(&mut d, level);
        d
    }

    pub fn kernels<T: PrimType>(&self) -> &Kernels<T> {
        T::kernels(self)
    }
}

/// Overlay the vector variants available on this architecture.
fn install_native(d: &mut Dispatch, level: SimdLevel) {
    #[cfg(target_arch = "x86_64")]
    if level >= SimdLevel::Simd256 {
        crate::simd::avx2::install(d);
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        let _ = (d, level);
    }
}
