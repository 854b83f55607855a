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

//! Runtime CPU-feature detection and the process-wide kernel dispatch table.
//!
//! The first kernel call detects the CPU, builds the table for the widest
//! supported level (or the forced one) and publishes it; afterwards the table
//! is read-only. `HEKLA_SIMD` or [`set_simd_level`] force a lower level for
//! testing and portable result comparison. [`reinit_dispatch`] swaps in a
//! fresh table; the caller must guarantee no kernel call is in flight.

pub mod avx2;
pub mod hash;
pub mod scalar;
pub mod table;

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

use log::debug;

use crate::column::primitive::PrimType;
use crate::error::{Error, Result};

pub use table::{CmpOp, Dispatch, Kernels};

/// Vector width tiers, widest last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SimdLevel {
    /// Plain scalar loops.
    Scalar = 0,
    /// 128-bit lanes: x86 SSE4 or the aarch64 NEON baseline.
    Simd128 = 1,
    /// 256-bit lanes: x86 AVX2.
    Simd256 = 2,
    /// 512-bit lanes: x86 AVX-512F.
    Simd512 = 3,
}

impl SimdLevel {
    pub fn name(self) -> &'static str {
        match self {
            SimdLevel::Scalar => "scalar",
            SimdLevel::Simd128 => "simd128",
            SimdLevel::Simd256 => "simd256",
            SimdLevel::Simd512 => "simd512",
        }
    }

    pub fn from_index(i: u8) -> Option<SimdLevel> {
        match i {
            0 => Some(SimdLevel::Scalar),
            1 => Some(SimdLevel::Simd128),
            2 => Some(SimdLevel::Simd256),
            3 => Some(SimdLevel::Simd512),
            _ => None,
        }
    }

    fn parse(s: &str) -> Option<SimdLevel> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "scalar" => Some(SimdLevel::Scalar),
            "1" | "sse" | "sse4" | "neon" | "simd128" => Some(SimdLevel::Simd128),
            "2" | "avx2" | "simd256" => Some(SimdLevel::Simd256),
            "3" | "avx512" | "simd512" => Some(SimdLevel::Simd512),
            _ => None,
        }
    }
}

/// Widest level the running CPU supports.
pub fn detect_level() -> SimdLevel {
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("avx512f") {
            return SimdLevel::Simd512;
        }
        if std::arch::is_x86_feature_detected!("avx2") {
            return SimdLevel::Simd256;
        }
        if std::arch::is_x86_feature_detected!("sse4.1") {
            return SimdLevel::Simd128;
        }
        SimdLevel::Scalar
    }
    #[cfg(target_arch = "aarch64")]
    {
        // NEON is baseline on aarch64.
        SimdLevel::Simd128
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        SimdLevel::Scalar
    }
}

// Published table; null until the first kernel call.
static TABLE: AtomicPtr<Dispatch> = AtomicPtr::new(ptr::null_mut());

// Requested override; REQ_UNSET means "detect".
const REQ_UNSET: u8 = u8::MAX;
static REQUESTED: AtomicU8 = AtomicU8::new(REQ_UNSET);

fn resolve_level() -> SimdLevel {
    let detected = detect_level();
    let requested = match REQUESTED.load(Ordering::Acquire) {
        REQ_UNSET => std::env::var("HEKLA_SIMD")
            .ok()
            .and_then(|s| SimdLevel::parse(&s)),
        i => SimdLevel::from_index(i),
    };
    match requested {
        // The override may only lower the level.
        Some(level) => level.min(detected),
        None => detected,
    }
}

fn publish_table() -> &'static Dispatch {
    let level = resolve_level();
    let table = Box::into_raw(Box::new(Dispatch::build(level)));
    match TABLE.compare_exchange(ptr::null_mut(), table, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => {
            debug!("simd dispatch initialized at level {}", level.name());
            unsafe { &*table }
        }
        Err(existing) => {
            // Another thread won the race.
            unsafe { drop(Box::from_raw(table)) };
            unsafe { &*existing }
        }
    }
}

/// The active dispatch table, initializing it on first use.
pub fn dispatch() -> &'static Dispatch {
    let p = TABLE.load(Ordering::Acquire);
    if p.is_null() {
        publish_table()
    } else {
        unsafe { &*p }
    }
}

/// Kernel entries for element type `T`.
pub fn kernels<T: PrimType>() -> &'static Kernels<T> {
    T::kernels(dispatch())
}

/// Active level and its name.
pub fn simd_level() -> (SimdLevel, &'static str) {
    let level = dispatch().level;
    (level, level.name())
}

/// Request a dispatch level (`0..=3`). Takes effect at initialization; once
/// the table is live, call [`reinit_dispatch`] to apply the change.
pub fn set_simd_level(level: u8) -> Result<()> {
    if SimdLevel::from_index(level).is_none() {
        return Err(Error::schema(format!(
            "invalid SIMD level {level}, expected 0..=3"
        )));
    }
    REQUESTED.store(level, Ordering::Release);
    Ok(())
}

/// Clear any requested override; detection applies at the next (re)init.
pub fn clear_simd_override() {
    REQUESTED.store(REQ_UNSET, Ordering::Release);
}

/// Rebuild and swap the dispatch table.
///
/// The caller must guarantee no kernel call is in flight. The previous table
/// is intentionally leaked: outstanding `&'static` references stay valid, and
/// reinitialization is a test-only path.
pub fn reinit_dispatch() {
    let level = resolve_level();
    let table = Box::into_raw(Box::new(Dispatch::build(level)));
    TABLE.swap(table, Ordering::AcqRel);
    debug!("simd dispatch reinitialized at level {}", level.name());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parse() {
        assert_eq!(SimdLevel::parse("avx2"), Some(SimdLevel::Simd256));
        assert_eq!(SimdLevel::parse("0"), Some(SimdLevel::Scalar));
        assert_eq!(SimdLevel::parse("bogus"), None);
    }

    #[test]
    fn dispatch_initializes() {
        let d = dispatch();
        assert!(d.level <= detect_level());
        let k = kernels::<i64>();
        assert_eq!((k.sum)(&[1, 2, 3]), 6);
    }
}
