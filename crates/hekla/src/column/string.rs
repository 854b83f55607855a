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

//! Variable-length UTF-8 columns and dictionary-encoded categoricals.

use std::sync::Arc;

use crate::column::bitmap::Bitmap;
use crate::error::{Error, Result};
use crate::mem::Buffer;

/// Null sentinel in categorical code buffers.
pub const NULL_CODE: u32 = 0xFFFF_FFFF;

// ---------------------------------------------------------------------------
// StrArray
// ---------------------------------------------------------------------------

/// Variable-length UTF-8 column: `len + 1` monotonic byte offsets into a
/// shared bytes arena. UTF-8 validity is a precondition on ingress; readers
/// assume it.
#[derive(Clone, Debug)]
pub struct StrArray {
    offsets: Buffer<i32>,
    bytes: Buffer<u8>,
    validity: Option<Bitmap>,
}

impl StrArray {
    /// Wrap raw parts. `offsets` must be monotonic non-decreasing with
    /// `offsets[0] >= 0` and `offsets[len]` within `bytes`.
    pub fn new(offsets: Buffer<i32>, bytes: Buffer<u8>, validity: Option<Bitmap>) -> Result<Self> {
        if offsets.is_empty() {
            return Err(Error::internal("string column requires len + 1 offsets"));
        }
        if let Some(v) = &validity {
            if v.len() != offsets.len() - 1 {
                return Err(Error::shape(format!(
                    "string validity length {} does not match column length {}",
                    v.len(),
                    offsets.len() - 1
                )));
            }
        }
        Ok(StrArray {
            offsets,
            bytes,
            validity,
        })
    }

    pub fn from_strs<S: AsRef<str>>(values: &[S]) -> Result<Self> {
        let mut b = crate::column::builder::StrBuilder::with_capacity(values.len())?;
        for v in values {
            b.append_value(v.as_ref())?;
        }
        b.finish()
    }

    pub fn from_opt_strs<S: AsRef<str>>(values: &[Option<S>]) -> Result<Self> {
        let mut b = crate::column::builder::StrBuilder::with_capacity(values.len())?;
        for v in values {
            match v {
                Some(v) => b.append_value(v.as_ref())?,
                None => b.append_null()?,
            }
        }
        b.finish()
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn offsets(&self) -> &[i32] {
        self.offsets.as_slice()
    }

    pub fn bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    pub fn validity(&self) -> Option<&Bitmap> {
        self.validity.as_ref()
    }

    #[inline]
    pub fn is_valid(&self, i: usize) -> bool {
        self.validity.as_ref().map_or(true, |b| b.get(i))
    }

    /// The string at row `i`, ignoring validity.
    #[inline]
    pub fn value(&self, i: usize) -> &str {
        let offsets = self.offsets.as_slice();
        let start = offsets[i] as usize;
        let end = offsets[i + 1] as usize;
        // UTF-8 validity is an ingress precondition.
        unsafe { std::str::from_utf8_unchecked(&self.bytes.as_slice()[start..end]) }
    }

    #[inline]
    pub fn get(&self, i: usize) -> Option<&str> {
        if self.is_valid(i) {
            Some(self.value(i))
        } else {
            None
        }
    }

    pub fn null_count(&self) -> usize {
        self.validity.as_ref().map_or(0, |b| b.count_zeros())
    }

    /// Zero-copy row window: offsets stay absolute into the shared arena.
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        StrArray {
            offsets: self.offsets.slice(offset, len + 1),
            bytes: self.bytes.clone(),
            validity: self.validity.as_ref().map(|b| b.slice(offset, len)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }
}

// ---------------------------------------------------------------------------
// CatArray
// ---------------------------------------------------------------------------

/// Dictionary-encoded strings: a `u32` code per row indexing a shared,
/// refcounted dictionary, with [`NULL_CODE`] marking null.
#[derive(Clone, Debug)]
pub struct CatArray {
    codes: Buffer<u32>,
    dict: Arc<StrArray>,
}

impl CatArray {
    pub fn new(codes: Buffer<u32>, dict: Arc<StrArray>) -> Result<Self> {
        let n_dict = dict.len() as u32;
        for &c in codes.as_slice() {
            if c != NULL_CODE && c >= n_dict {
                return Err(Error::internal(format!(
                    "categorical code {c} out of range for dictionary of {n_dict}"
                )));
            }
        }
        Ok(CatArray { codes, dict })
    }

    pub fn from_strs<S: AsRef<str>>(values: &[Option<S>]) -> Result<Self> {
        let mut b = crate::column::builder::CatBuilder::new();
        for v in values {
            match v {
                Some(v) => b.append_value(v.as_ref())?,
                None => b.append_null()?,
            }
        }
        b.finish()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn codes(&self) -> &[u32] {
        self.codes.as_slice()
    }

    pub fn dict(&self) -> &Arc<StrArray> {
        &self.dict
    }

    #[inline]
    pub fn is_valid(&self, i: usize) -> bool {
        self.codes[i] != NULL_CODE
    }

    #[inline]
    pub fn get(&self, i: usize) -> Option<&str> {
        let code = self.codes[i];
        if code == NULL_CODE {
            None
        } else {
            Some(self.dict.value(code as usize))
        }
    }

    pub fn null_count(&self) -> usize {
        self.codes.iter().filter(|&&c| c == NULL_CODE).count()
    }

    pub fn slice(&self, offset: usize, len: usize) -> Self {
        CatArray {
            codes: self.codes.slice(offset, len),
            dict: self.dict.clone(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_offsets_invariant() {
        let arr = StrArray::from_strs(&["alpha", "", "gamma"]).unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.offsets().len(), 4);
        assert_eq!(arr.value(0), "alpha");
        assert_eq!(arr.value(1), "");
        assert_eq!(arr.value(2), "gamma");
        assert!(arr.offsets().windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn str_slice_zero_copy() {
        let arr = StrArray::from_strs(&["a", "bb", "ccc", "dddd"]).unwrap();
        let s = arr.slice(1, 2);
        assert_eq!(s.len(), 2);
        assert_eq!(s.value(0), "bb");
        assert_eq!(s.value(1), "ccc");
    }

    #[test]
    fn cat_nulls_via_sentinel() {
        let arr = CatArray::from_strs(&[Some("x"), None, Some("y"), Some("x")]).unwrap();
        assert_eq!(arr.len(), 4);
        assert_eq!(arr.get(0), Some("x"));
        assert_eq!(arr.get(1), None);
        assert_eq!(arr.codes()[0], arr.codes()[3]);
        assert_eq!(arr.codes()[1], NULL_CODE);
        assert_eq!(arr.null_count(), 1);
    }
}
