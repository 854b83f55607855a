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

//! 64-bit hashing primitives.
//!
//! Integer elements hash with a golden-ratio multiply (see
//! `column::primitive::hash_u64`); byte ranges use the wide-multiply mixer
//! below. Hash combination across key columns runs left to right.

const SECRET0: u64 = 0xA076_1D64_78BD_642F;
const SECRET1: u64 = 0xE703_7ED1_A0B4_28DB;
const SECRET2: u64 = 0x8EBC_6AF0_9C88_C6E3;

/// 128-bit multiply folding both halves.
#[inline]
pub fn wymum(a: u64, b: u64) -> u64 {
    let r = (a as u128) * (b as u128);
    ((r >> 64) as u64) ^ (r as u64)
}

#[inline]
fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

#[inline]
fn read_u32(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf) as u64
}

/// Hash an arbitrary byte range. Used for string keys and any fixed-size
/// key wider than one machine word.
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let len = bytes.len();
    let mut h = SECRET0 ^ len as u64;
    let mut at = 0;
    while at + 16 <= len {
        h = wymum(
            read_u64(bytes, at) ^ SECRET1,
            read_u64(bytes, at + 8) ^ h,
        );
        at += 16;
    }
    let rest = len - at;
    let (a, b) = if rest >= 8 {
        (read_u64(bytes, at), read_u64(bytes, len - 8))
    } else if rest >= 4 {
        (read_u32(bytes, at), read_u32(bytes, len - 4))
    } else if rest > 0 {
        // 1..=3 bytes: first, middle, last.
        let a = (bytes[at] as u64) << 16
            | (bytes[at + rest / 2] as u64) << 8
            | bytes[len - 1] as u64;
        (a, 0)
    } else {
        (0, 0)
    };
    wymum(a ^ SECRET2, b ^ h)
}

/// Associative-order mix of two element hashes; the engine always folds
/// key columns left to right.
#[inline]
pub fn combine(a: u64, b: u64) -> u64 {
    wymum(a ^ SECRET1, b ^ SECRET2)
}

/// Map a hash to a partition index in `[0, n)` with a 128-bit multiply;
/// uniform without a modulo.
#[inline]
pub fn hash_to_partition(h: u64, n: usize) -> usize {
    (((h as u128) * (n as u128)) >> 64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_hash_varies() {
        let a = hash_bytes(b"alpha");
        let b = hash_bytes(b"alphb");
        let c = hash_bytes(b"");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, hash_bytes(b"alpha"));
    }

    #[test]
    fn partition_in_range() {
        for n in [1usize, 2, 3, 7, 64] {
            for h in [0u64, 1, u64::MAX, 0x1234_5678_9ABC_DEF0] {
                assert!(hash_to_partition(h, n) < n);
            }
        }
    }
}
