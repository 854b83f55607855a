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

//! Aligned buffers and small-object reuse.
//!
//! All column values and validity words live in [`AlignedVec`] allocations
//! aligned to [`BUFFER_ALIGN`] bytes so every kernel may issue full-width
//! vector loads. [`Buffer`] is the immutable, refcounted view handed out
//! after construction; slicing is a window adjustment, never a copy.
//! Allocation failure maps to [`Error::OutOfMemory`] and aborts only the
//! current operation.

use std::alloc::{self, Layout};
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::{Error, Result};

/// Widest vector the kernels assume: one AVX-512 lane set.
pub const BUFFER_ALIGN: usize = 64;

const MIN_CAPACITY: usize = 8;

// ---------------------------------------------------------------------------
// AlignedVec — growable, 64-byte aligned storage
// ---------------------------------------------------------------------------

/// Growable buffer with 64-byte aligned storage. The mutable stage of a
/// column's life; frozen into a [`Buffer`] on `finish`.
pub struct AlignedVec<T> {
    ptr: NonNull<T>,
    cap: usize,
    len: usize,
    _marker: PhantomData<T>,
}

unsafe impl<T: Send> Send for AlignedVec<T> {}
unsafe impl<T: Sync> Sync for AlignedVec<T> {}

impl<T: Copy> AlignedVec<T> {
    pub fn new() -> Self {
        AlignedVec {
            ptr: NonNull::dangling(),
            cap: 0,
            len: 0,
            _marker: PhantomData,
        }
    }

    pub fn with_capacity(cap: usize) -> Result<Self> {
        let mut v = Self::new();
        if cap > 0 {
            v.grow_to(cap)?;
        }
        Ok(v)
    }

    /// A buffer of `n` copies of `value`.
    pub fn full(n: usize, value: T) -> Result<Self> {
        let mut v = Self::with_capacity(n)?;
        for _ in 0..n {
            // Capacity is reserved; push cannot fail.
            v.push(value)?;
        }
        Ok(v)
    }

    pub fn from_slice(values: &[T]) -> Result<Self> {
        let mut v = Self::with_capacity(values.len())?;
        v.extend_from_slice(values)?;
        Ok(v)
    }

    fn layout(cap: usize) -> Result<Layout> {
        let size = cap
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(Error::OutOfMemory)?;
        let align = BUFFER_ALIGN.max(std::mem::align_of::<T>());
        Layout::from_size_align(size, align).map_err(|_| Error::OutOfMemory)
    }

    fn grow_to(&mut self, new_cap: usize) -> Result<()> {
        debug_assert!(new_cap >= self.len);
        if new_cap <= self.cap {
            return Ok(());
        }
        let layout = Self::layout(new_cap)?;
        let new_ptr = unsafe { alloc::alloc(layout) } as *mut T;
        let new_ptr = NonNull::new(new_ptr).ok_or(Error::OutOfMemory)?;
        if self.cap > 0 {
            unsafe {
                std::ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), self.len);
                alloc::dealloc(self.ptr.as_ptr() as *mut u8, Self::layout(self.cap)?);
            }
        }
        self.ptr = new_ptr;
        self.cap = new_cap;
        Ok(())
    }

    /// Ensure room for `additional` more elements, growing geometrically.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let needed = self
            .len
            .checked_add(additional)
            .ok_or(Error::OutOfMemory)?;
        if needed <= self.cap {
            return Ok(());
        }
        let target = needed.max(self.cap * 2).max(MIN_CAPACITY);
        self.grow_to(target)
    }

    pub fn push(&mut self, value: T) -> Result<()> {
        if self.len == self.cap {
            self.reserve(1)?;
        }
        unsafe {
            self.ptr.as_ptr().add(self.len).write(value);
        }
        self.len += 1;
        Ok(())
    }

    pub fn extend_from_slice(&mut self, values: &[T]) -> Result<()> {
        self.reserve(values.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(
                values.as_ptr(),
                self.ptr.as_ptr().add(self.len),
                values.len(),
            );
        }
        self.len += values.len();
        Ok(())
    }

    /// Append `n` copies of `value`.
    pub fn extend_with(&mut self, n: usize, value: T) -> Result<()> {
        self.reserve(n)?;
        for _ in 0..n {
            unsafe {
                self.ptr.as_ptr().add(self.len).write(value);
            }
            self.len += 1;
        }
        Ok(())
    }

    /// Reallocate down to the exact length. Called by builders on `finish`.
    pub fn shrink_to_fit(&mut self) -> Result<()> {
        if self.cap == self.len || self.cap == 0 {
            return Ok(());
        }
        if self.len == 0 {
            unsafe {
                alloc::dealloc(self.ptr.as_ptr() as *mut u8, Self::layout(self.cap)?);
            }
            self.ptr = NonNull::dangling();
            self.cap = 0;
            return Ok(());
        }
        let layout = Self::layout(self.len)?;
        let new_ptr = unsafe { alloc::alloc(layout) } as *mut T;
        let new_ptr = NonNull::new(new_ptr).ok_or(Error::OutOfMemory)?;
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), self.len);
            alloc::dealloc(self.ptr.as_ptr() as *mut u8, Self::layout(self.cap)?);
        }
        self.ptr = new_ptr;
        self.cap = self.len;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn as_slice(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Truncate to `len` elements. No-op when `len >= self.len()`.
    pub fn truncate(&mut self, len: usize) {
        if len < self.len {
            self.len = len;
        }
    }

    /// Freeze into an immutable, shareable buffer.
    pub fn freeze(self) -> Buffer<T> {
        Buffer::new(self)
    }
}

impl<T: Copy> Default for AlignedVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AlignedVec<T> {
    fn drop(&mut self) {
        if self.cap > 0 {
            let size = self.cap * std::mem::size_of::<T>();
            let align = BUFFER_ALIGN.max(std::mem::align_of::<T>());
            // Layout was validated at allocation time.
            if let Ok(layout) = Layout::from_size_align(size, align) {
                unsafe {
                    alloc::dealloc(self.ptr.as_ptr() as *mut u8, layout);
                }
            }
        }
    }
}

impl<T: Copy + std::fmt::Debug> std::fmt::Debug for AlignedVec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

// ---------------------------------------------------------------------------
// Buffer — immutable refcounted view
// ---------------------------------------------------------------------------

/// Immutable, refcounted view over an [`AlignedVec`]. Cloning and slicing
/// share the allocation; the storage is freed when the last view drops.
#[derive(Clone)]
pub struct Buffer<T> {
    data: Arc<AlignedVec<T>>,
    offset: usize,
    len: usize,
}

impl<T: Copy> Buffer<T> {
    pub fn new(data: AlignedVec<T>) -> Self {
        let len = data.len();
        Buffer {
            data: Arc::new(data),
            offset: 0,
            len,
        }
    }

    pub fn from_slice(values: &[T]) -> Result<Self> {
        Ok(AlignedVec::from_slice(values)?.freeze())
    }

    pub fn empty() -> Self {
        Buffer::new(AlignedVec::new())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data.as_slice()[self.offset..self.offset + self.len]
    }

    /// Zero-copy sub-window. `offset + len` must not exceed `self.len()`.
    pub fn slice(&self, offset: usize, len: usize) -> Buffer<T> {
        assert!(offset + len <= self.len, "buffer slice out of bounds");
        Buffer {
            data: self.data.clone(),
            offset: self.offset + offset,
            len,
        }
    }

    /// Number of live references to the underlying allocation.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.data)
    }
}

impl<T: Copy> Deref for Buffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Copy + std::fmt::Debug> std::fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T: Copy + PartialEq> PartialEq for Buffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

// ---------------------------------------------------------------------------
// ScratchPool — reuse for masks and index vectors
// ---------------------------------------------------------------------------

/// Retained scratch vectors per class; beyond this, returns are dropped.
const SCRATCH_RETAIN: usize = 16;

/// Largest scratch vector worth keeping around (in elements).
const SCRATCH_MAX_LEN: usize = 1 << 22;

/// Free lists for the short-lived `u8` masks and `u32` index vectors the
/// filter and gather paths churn through.
pub struct ScratchPool {
    masks: Mutex<Vec<Vec<u8>>>,
    indices: Mutex<Vec<Vec<u32>>>,
}

impl ScratchPool {
    fn new() -> Self {
        ScratchPool {
            masks: Mutex::new(Vec::new()),
            indices: Mutex::new(Vec::new()),
        }
    }

    /// Take a zeroed mask of length `n`.
    pub fn take_mask(&self, n: usize) -> Vec<u8> {
        let mut v = self
            .masks
            .lock()
            .ok()
            .and_then(|mut pool| pool.pop())
            .unwrap_or_default();
        v.clear();
        v.resize(n, 0);
        v
    }

    pub fn recycle_mask(&self, v: Vec<u8>) {
        if v.capacity() == 0 || v.capacity() > SCRATCH_MAX_LEN {
            return;
        }
        if let Ok(mut pool) = self.masks.lock() {
            if pool.len() < SCRATCH_RETAIN {
                pool.push(v);
            }
        }
    }

    /// Take an empty index vector with room for `n` entries.
    pub fn take_indices(&self, n: usize) -> Vec<u32> {
        let mut v = self
            .indices
            .lock()
            .ok()
            .and_then(|mut pool| pool.pop())
            .unwrap_or_default();
        v.clear();
        v.reserve(n);
        v
    }

    pub fn recycle_indices(&self, v: Vec<u32>) {
        if v.capacity() == 0 || v.capacity() > SCRATCH_MAX_LEN {
            return;
        }
        if let Ok(mut pool) = self.indices.lock() {
            if pool.len() < SCRATCH_RETAIN {
                pool.push(v);
            }
        }
    }
}

/// Process-global scratch pool.
pub fn scratch() -> &'static ScratchPool {
    static POOL: OnceLock<ScratchPool> = OnceLock::new();
    POOL.get_or_init(ScratchPool::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_alloc() {
        let mut v: AlignedVec<i64> = AlignedVec::with_capacity(100).unwrap();
        for i in 0..100 {
            v.push(i).unwrap();
        }
        assert_eq!(v.len(), 100);
        assert_eq!(v.as_slice()[99], 99);
        assert_eq!(v.as_slice().as_ptr() as usize % BUFFER_ALIGN, 0);
    }

    #[test]
    fn buffer_slicing_shares() {
        let buf = Buffer::from_slice(&[1i64, 2, 3, 4, 5]).unwrap();
        let s = buf.slice(1, 3);
        assert_eq!(s.as_slice(), &[2, 3, 4]);
        assert_eq!(buf.ref_count(), 2);
        drop(s);
        assert_eq!(buf.ref_count(), 1);
    }

    #[test]
    fn scratch_reuse() {
        let pool = ScratchPool::new();
        let m = pool.take_mask(128);
        assert!(m.iter().all(|&b| b == 0));
        let cap = m.capacity();
        pool.recycle_mask(m);
        let m2 = pool.take_mask(64);
        assert!(m2.capacity() >= cap.min(64));
    }
}
