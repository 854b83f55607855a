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

//! Packed validity bitmap: bit set means the element is valid.

use crate::error::Result;
use crate::mem::{AlignedVec, Buffer};

/// Immutable packed bitmap of `len` bits over 64-bit words. Supports a bit
/// offset so column slices stay zero-copy.
#[derive(Clone, Debug)]
pub struct Bitmap {
    words: Buffer<u64>,
    offset: usize,
    len: usize,
}

impl Bitmap {
    /// All-set bitmap of `len` bits.
    pub fn all_valid(len: usize) -> Result<Self> {
        let words = AlignedVec::full(len.div_ceil(64), u64::MAX)?.freeze();
        Ok(Bitmap {
            words,
            offset: 0,
            len,
        })
    }

    pub fn from_bools(bits: &[bool]) -> Result<Self> {
        let mut b = BitmapBuilder::with_capacity(bits.len())?;
        for &bit in bits {
            b.push(bit)?;
        }
        b.finish()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, i: usize) -> bool {
        debug_assert!(i < self.len);
        let bit = self.offset + i;
        (self.words[bit / 64] >> (bit % 64)) & 1 == 1
    }

    /// Number of set (valid) bits.
    pub fn count_ones(&self) -> usize {
        if self.offset % 64 == 0 {
            let full = self.len / 64;
            let mut n: usize = self.words[self.offset / 64..self.offset / 64 + full]
                .iter()
                .map(|w| w.count_ones() as usize)
                .sum();
            for i in full * 64..self.len {
                n += self.get(i) as usize;
            }
            n
        } else {
            (0..self.len).filter(|&i| self.get(i)).count()
        }
    }

    pub fn count_zeros(&self) -> usize {
        self.len - self.count_ones()
    }

    pub fn all_set(&self) -> bool {
        self.count_ones() == self.len
    }

    /// Zero-copy window of `len` bits starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Bitmap {
        assert!(offset + len <= self.len, "bitmap slice out of bounds");
        Bitmap {
            words: self.words.clone(),
            offset: self.offset + offset,
            len,
        }
    }

    /// Bitwise AND of two equal-length bitmaps (intersection of validity).
    pub fn and(&self, other: &Bitmap) -> Result<Bitmap> {
        assert_eq!(self.len, other.len);
        let mut b = BitmapBuilder::with_capacity(self.len)?;
        for i in 0..self.len {
            b.push(self.get(i) && other.get(i))?;
        }
        b.finish()
    }

    /// Merge two optional validity masks: `None` means all-valid.
    pub fn merge(a: Option<&Bitmap>, b: Option<&Bitmap>) -> Result<Option<Bitmap>> {
        Ok(match (a, b) {
            (None, None) => None,
            (Some(m), None) | (None, Some(m)) => Some(m.clone()),
            (Some(x), Some(y)) => Some(x.and(y)?),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }
}

/// Mutable construction state for a [`Bitmap`].
pub struct BitmapBuilder {
    words: AlignedVec<u64>,
    len: usize,
}

impl BitmapBuilder {
    pub fn new() -> Self {
        BitmapBuilder {
            words: AlignedVec::new(),
            len: 0,
        }
    }

    pub fn with_capacity(bits: usize) -> Result<Self> {
        Ok(BitmapBuilder {
            words: AlignedVec::with_capacity(bits.div_ceil(64))?,
            len: 0,
        })
    }

    #[inline]
    pub fn push(&mut self, valid: bool) -> Result<()> {
        if self.len % 64 == 0 {
            self.words.push(0)?;
        }
        if valid {
            let w = self.words.len() - 1;
            self.words.as_mut_slice()[w] |= 1u64 << (self.len % 64);
        }
        self.len += 1;
        Ok(())
    }

    pub fn extend_set(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.push(true)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn finish(self) -> Result<Bitmap> {
        Ok(Bitmap {
            words: self.words.freeze(),
            offset: 0,
            len: self.len,
        })
    }
}

impl Default for BitmapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_count() {
        let bm = Bitmap::from_bools(&[true, false, true, true, false]).unwrap();
        assert_eq!(bm.len(), 5);
        assert_eq!(bm.count_ones(), 3);
        assert!(bm.get(0));
        assert!(!bm.get(1));
    }

    #[test]
    fn slice_offsets() {
        let bits: Vec<bool> = (0..130).map(|i| i % 3 == 0).collect();
        let bm = Bitmap::from_bools(&bits).unwrap();
        let s = bm.slice(65, 60);
        for i in 0..60 {
            assert_eq!(s.get(i), bits[65 + i]);
        }
        assert_eq!(s.count_ones(), bits[65..125].iter().filter(|&&b| b).count());
    }

    #[test]
    fn and_merge() {
        let a = Bitmap::from_bools(&[true, true, false, false]).unwrap();
        let b = Bitmap::from_bools(&[true, false, true, false]).unwrap();
        let c = a.and(&b).unwrap();
        assert_eq!(c.iter().collect::<Vec<_>>(), vec![true, false, false, false]);
        assert!(Bitmap::merge(None, None).unwrap().is_none());
    }
}
