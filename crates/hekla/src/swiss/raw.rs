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

//! Open-addressing hash table with SIMD control-byte probing.
//!
//! Layout: `[ctrl: buckets + GROUP_WIDTH][entries: buckets]`. Each control
//! byte is `EMPTY`, `DELETED`, or the 7-bit H2 tag of the resident hash with
//! the high bit clear. The trailing `GROUP_WIDTH` control bytes mirror the
//! first group so group loads at the table edge never wrap. Probing is
//! triangular in group units, which visits every group exactly once on
//! power-of-two capacities. The load-factor ceiling is 7/8.

use std::mem::MaybeUninit;

use crate::error::{Error, Result};

/// Control bytes scanned per probe step.
#[cfg(target_arch = "x86_64")]
pub const GROUP_WIDTH: usize = 16;
#[cfg(not(target_arch = "x86_64"))]
pub const GROUP_WIDTH: usize = 8;

pub const EMPTY: u8 = 0xFF;
pub const DELETED: u8 = 0x80;

/// Top 7 bits of the hash: the tag stored in full control bytes.
#[inline]
fn h2(hash: u64) -> u8 {
    ((hash >> 57) & 0x7F) as u8
}

#[inline]
fn is_full(ctrl: u8) -> bool {
    ctrl & 0x80 == 0
}

// ---------------------------------------------------------------------------
// Group probing — SSE2 on x86_64, SWAR elsewhere
// ---------------------------------------------------------------------------

/// Bit set per matching byte within one group.
#[derive(Clone, Copy)]
pub struct BitMask(u32);

impl BitMask {
    #[inline]
    pub fn any(self) -> bool {
        self.0 != 0
    }

    #[inline]
    pub fn lowest(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }
}

impl Iterator for BitMask {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        let bit = self.lowest()?;
        self.0 &= self.0 - 1;
        Some(bit)
    }
}

#[cfg(target_arch = "x86_64")]
mod group {
    use super::{BitMask, DELETED, EMPTY};
    use std::arch::x86_64::*;

    #[derive(Clone, Copy)]
    pub struct Group(__m128i);

    impl Group {
        /// Unaligned load of 16 control bytes. Always in bounds thanks to
        /// the mirrored tail group.
        #[inline]
        pub unsafe fn load(ptr: *const u8) -> Group {
            Group(unsafe { _mm_loadu_si128(ptr as *const __m128i) })
        }

        #[inline]
        pub fn match_byte(self, byte: u8) -> BitMask {
            // SSE2 is baseline on x86_64.
            unsafe {
                let cmp = _mm_cmpeq_epi8(self.0, _mm_set1_epi8(byte as i8));
                BitMask(_mm_movemask_epi8(cmp) as u32)
            }
        }

        #[inline]
        pub fn match_empty(self) -> BitMask {
            self.match_byte(EMPTY)
        }

        #[inline]
        pub fn match_empty_or_deleted(self) -> BitMask {
            // EMPTY and DELETED are the only bytes with the high bit set.
            unsafe { BitMask(_mm_movemask_epi8(self.0) as u32) }
        }

        #[allow(dead_code)]
        pub fn match_deleted(self) -> BitMask {
            self.match_byte(DELETED)
        }
    }
}

#[cfg(not(target_arch = "x86_64"))]
mod group {
    use super::{BitMask, EMPTY};

    const LSB: u64 = 0x0101_0101_0101_0101;
    const MSB: u64 = 0x8080_8080_8080_8080;

    #[derive(Clone, Copy)]
    pub struct Group(u64);

    impl Group {
        #[inline]
        pub unsafe fn load(ptr: *const u8) -> Group {
            Group(unsafe { (ptr as *const u64).read_unaligned() }.to_le())
        }

        /// SWAR byte-equality: a byte is zero in `x ^ broadcast` exactly
        /// where it matches.
        #[inline]
        pub fn match_byte(self, byte: u8) -> BitMask {
            let x = self.0 ^ (LSB * byte as u64);
            let hits = x.wrapping_sub(LSB) & !x & MSB;
            BitMask(Self::compress(hits))
        }

        #[inline]
        pub fn match_empty(self) -> BitMask {
            self.match_byte(EMPTY)
        }

        #[inline]
        pub fn match_empty_or_deleted(self) -> BitMask {
            BitMask(Self::compress(self.0 & MSB))
        }

        /// One bit per byte from the per-byte high bits.
        #[inline]
        fn compress(hits: u64) -> u32 {
            let mut out = 0u32;
            let mut h = hits;
            while h != 0 {
                let byte = h.trailing_zeros() / 8;
                out |= 1 << byte;
                h &= h - 1;
            }
            out
        }
    }
}

use group::Group;

// ---------------------------------------------------------------------------
// Probe sequence
// ---------------------------------------------------------------------------

/// Triangular probing in group units: offsets 0, 1, 3, 6, 10, … groups.
struct ProbeSeq {
    pos: usize,
    stride: usize,
}

impl ProbeSeq {
    #[inline]
    fn new(hash: u64, bucket_mask: usize) -> ProbeSeq {
        ProbeSeq {
            pos: (hash as usize) & bucket_mask,
            stride: 0,
        }
    }

    #[inline]
    fn advance(&mut self, bucket_mask: usize) {
        self.stride += GROUP_WIDTH;
        self.pos = (self.pos + self.stride) & bucket_mask;
    }
}

// ---------------------------------------------------------------------------
// RawTable
// ---------------------------------------------------------------------------

/// The untyped core. Callers supply hashes and equality closures; the
/// typed `Map`/`Set` wrappers layer key semantics on top.
pub struct RawTable<T> {
    ctrl: Box<[u8]>,
    entries: Box<[MaybeUninit<T>]>,
    bucket_mask: usize,
    items: usize,
    growth_left: usize,
}

impl<T> RawTable<T> {
    pub fn new() -> Self {
        RawTable {
            ctrl: Box::new([]),
            entries: Box::new([]),
            bucket_mask: 0,
            items: 0,
            growth_left: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut t = Self::new();
        if capacity > 0 {
            t.resize(Self::buckets_for(capacity))?;
        }
        Ok(t)
    }

    fn buckets_for(capacity: usize) -> usize {
        // Smallest power of two whose 7/8 ceiling holds `capacity`.
        let needed = capacity * 8 / 7 + 1;
        needed.next_power_of_two().max(GROUP_WIDTH)
    }

    pub fn buckets(&self) -> usize {
        if self.ctrl.is_empty() {
            0
        } else {
            self.bucket_mask + 1
        }
    }

    /// Bucket count; the usable capacity is 7/8 of this.
    pub fn capacity(&self) -> usize {
        self.buckets()
    }

    pub fn len(&self) -> usize {
        self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    #[inline]
    unsafe fn entry_ref(&self, idx: usize) -> &T {
        unsafe { self.entries[idx].assume_init_ref() }
    }

    #[inline]
    unsafe fn entry_mut(&mut self, idx: usize) -> &mut T {
        unsafe { self.entries[idx].assume_init_mut() }
    }

    #[inline]
    fn set_ctrl(&mut self, idx: usize, value: u8) {
        self.ctrl[idx] = value;
        // Mirror the first group into the tail so edge loads see it.
        if idx < GROUP_WIDTH {
            let buckets = self.bucket_mask + 1;
            self.ctrl[idx + buckets] = value;
        }
    }

    /// Find the bucket holding a matching entry.
    pub fn find(&self, hash: u64, mut eq: impl FnMut(&T) -> bool) -> Option<usize> {
        if self.ctrl.is_empty() {
            return None;
        }
        let tag = h2(hash);
        let mut probe = ProbeSeq::new(hash, self.bucket_mask);
        loop {
            let group = unsafe { Group::load(self.ctrl.as_ptr().add(probe.pos)) };
            for bit in group.match_byte(tag) {
                let idx = (probe.pos + bit) & self.bucket_mask;
                if eq(unsafe { self.entry_ref(idx) }) {
                    return Some(idx);
                }
            }
            if group.match_empty().any() {
                return None;
            }
            probe.advance(self.bucket_mask);
        }
    }

    /// First EMPTY or DELETED bucket along the probe sequence.
    fn find_insert_slot(&self, hash: u64) -> usize {
        let mut probe = ProbeSeq::new(hash, self.bucket_mask);
        loop {
            let group = unsafe { Group::load(self.ctrl.as_ptr().add(probe.pos)) };
            if let Some(bit) = group.match_empty_or_deleted().lowest() {
                return (probe.pos + bit) & self.bucket_mask;
            }
            probe.advance(self.bucket_mask);
        }
    }

    pub fn get(&self, hash: u64, eq: impl FnMut(&T) -> bool) -> Option<&T> {
        self.find(hash, eq)
            .map(|idx| unsafe { self.entry_ref(idx) })
    }

    pub fn get_mut(&mut self, hash: u64, eq: impl FnMut(&T) -> bool) -> Option<&mut T> {
        self.find(hash, eq)
            .map(move |idx| unsafe { self.entry_mut(idx) })
    }

    pub fn contains(&self, hash: u64, eq: impl FnMut(&T) -> bool) -> bool {
        self.find(hash, eq).is_some()
    }

    fn ensure_growth(&mut self, hasher: &dyn Fn(&T) -> u64) -> Result<()> {
        if self.growth_left == 0 {
            let buckets = if self.ctrl.is_empty() {
                GROUP_WIDTH
            } else {
                (self.bucket_mask + 1) * 2
            };
            self.resize_with(buckets, hasher)?;
        }
        Ok(())
    }

    /// Insert or replace; returns the previous entry when the key existed.
    pub fn insert(
        &mut self,
        hash: u64,
        entry: T,
        mut eq: impl FnMut(&T) -> bool,
        hasher: impl Fn(&T) -> u64,
    ) -> Result<Option<T>> {
        if let Some(idx) = self.find(hash, &mut eq) {
            let old = std::mem::replace(unsafe { self.entry_mut(idx) }, entry);
            return Ok(Some(old));
        }
        self.insert_new(hash, entry, hasher)?;
        Ok(None)
    }

    /// Insert without an equality probe. Precondition: no matching key is
    /// resident.
    pub fn insert_new(&mut self, hash: u64, entry: T, hasher: impl Fn(&T) -> u64) -> Result<usize> {
        self.insert_new_dyn(hash, entry, &hasher)
    }

    // Non-generic core of `insert_new`. Keeping this as a `&dyn` fn (rather
    // than `impl Fn`) avoids the unbounded `&&&...` reference nesting that
    // results from `resize_with` calling back into an all-generic insert
    // path on every rehash.
    fn insert_new_dyn(&mut self, hash: u64, entry: T, hasher: &dyn Fn(&T) -> u64) -> Result<usize> {
        self.ensure_growth(hasher)?;
        let idx = self.find_insert_slot(hash);
        let was_empty = self.ctrl[idx] == EMPTY;
        self.entries[idx].write(entry);
        self.set_ctrl(idx, h2(hash));
        self.items += 1;
        if was_empty {
            self.growth_left -= 1;
        }
        Ok(idx)
    }

    /// Pointer-stable lookup-or-insert used by join build.
    pub fn get_or_insert_with(
        &mut self,
        hash: u64,
        mut eq: impl FnMut(&T) -> bool,
        default: impl FnOnce() -> T,
        hasher: impl Fn(&T) -> u64,
    ) -> Result<&mut T> {
        if let Some(idx) = self.find(hash, &mut eq) {
            return Ok(unsafe { self.entry_mut(idx) });
        }
        let idx = self.insert_new(hash, default(), hasher)?;
        Ok(unsafe { self.entry_mut(idx) })
    }

    /// Remove a matching entry, leaving a DELETED tombstone.
    pub fn remove(&mut self, hash: u64, eq: impl FnMut(&T) -> bool) -> Option<T> {
        let idx = self.find(hash, eq)?;
        Some(self.remove_at(idx))
    }

    fn remove_at(&mut self, idx: usize) -> T {
        debug_assert!(is_full(self.ctrl[idx]));
        self.set_ctrl(idx, DELETED);
        self.items -= 1;
        unsafe { self.entries[idx].assume_init_read() }
    }

    /// Rebuild at the smallest capacity that holds the live entries under
    /// the 7/8 ceiling.
    pub fn shrink_to_fit(&mut self, hasher: impl Fn(&T) -> u64) -> Result<()> {
        let buckets = Self::buckets_for(self.items);
        if buckets < self.buckets() {
            self.resize_with(buckets, &hasher)?;
        }
        Ok(())
    }

    pub fn reserve(&mut self, additional: usize, hasher: impl Fn(&T) -> u64) -> Result<()> {
        let needed = self.items + additional;
        if needed * 8 > self.buckets() * 7 {
            self.resize_with(Self::buckets_for(needed), &hasher)?;
        }
        Ok(())
    }

    fn resize(&mut self, buckets: usize) -> Result<()> {
        debug_assert!(self.items == 0);
        self.alloc_arrays(buckets)?;
        Ok(())
    }

    fn alloc_arrays(&mut self, buckets: usize) -> Result<()> {
        debug_assert!(buckets.is_power_of_two() && buckets >= GROUP_WIDTH);
        let mut ctrl = Vec::new();
        ctrl.try_reserve_exact(buckets + GROUP_WIDTH)
            .map_err(|_| Error::OutOfMemory)?;
        ctrl.resize(buckets + GROUP_WIDTH, EMPTY);
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(buckets)
            .map_err(|_| Error::OutOfMemory)?;
        entries.resize_with(buckets, MaybeUninit::uninit);
        self.ctrl = ctrl.into_boxed_slice();
        self.entries = entries.into_boxed_slice();
        self.bucket_mask = buckets - 1;
        self.growth_left = buckets / 8 * 7;
        Ok(())
    }

    fn resize_with(&mut self, buckets: usize, hasher: &dyn Fn(&T) -> u64) -> Result<()> {
        let old_ctrl = std::mem::replace(&mut self.ctrl, Box::new([]));
        let old_entries = std::mem::replace(&mut self.entries, Box::new([]));
        let old_buckets = if old_ctrl.is_empty() {
            0
        } else {
            self.bucket_mask + 1
        };
        self.alloc_arrays(buckets)?;
        self.items = 0;
        for idx in 0..old_buckets {
            if is_full(old_ctrl[idx]) {
                let entry = unsafe { old_entries[idx].assume_init_read() };
                let hash = hasher(&entry);
                // Entries are unique by construction; skip the equality probe.
                self.insert_new_dyn(hash, entry, hasher)?;
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        for idx in 0..self.buckets() {
            if is_full(self.ctrl[idx]) {
                unsafe {
                    self.entries[idx].assume_init_drop();
                }
            }
        }
        let buckets = self.buckets();
        if buckets > 0 {
            self.ctrl.fill(EMPTY);
            self.growth_left = buckets / 8 * 7;
        }
        self.items = 0;
    }

    pub fn iter(&self) -> RawIter<'_, T> {
        RawIter {
            table: self,
            idx: 0,
        }
    }

    /// Entry at a bucket index returned by [`RawTable::find`].
    pub fn bucket(&self, idx: usize) -> &T {
        debug_assert!(is_full(self.ctrl[idx]));
        unsafe { self.entry_ref(idx) }
    }

    pub fn bucket_mut(&mut self, idx: usize) -> &mut T {
        debug_assert!(is_full(self.ctrl[idx]));
        unsafe { self.entry_mut(idx) }
    }

    /// Remove by bucket index (for the entry API).
    pub fn remove_bucket(&mut self, idx: usize) -> T {
        self.remove_at(idx)
    }
}

impl<T> Default for RawTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for RawTable<T> {
    fn drop(&mut self) {
        if std::mem::needs_drop::<T>() {
            for idx in 0..self.buckets() {
                if is_full(self.ctrl[idx]) {
                    unsafe {
                        self.entries[idx].assume_init_drop();
                    }
                }
            }
        }
    }
}

impl<T: Clone> Clone for RawTable<T> {
    fn clone(&self) -> Self {
        let buckets = self.buckets();
        if buckets == 0 {
            return RawTable::new();
        }
        let mut entries = Vec::with_capacity(buckets);
        entries.resize_with(buckets, MaybeUninit::uninit);
        let mut entries = entries.into_boxed_slice();
        for idx in 0..buckets {
            if is_full(self.ctrl[idx]) {
                entries[idx].write(unsafe { self.entry_ref(idx) }.clone());
            }
        }
        RawTable {
            ctrl: self.ctrl.clone(),
            entries,
            bucket_mask: self.bucket_mask,
            items: self.items,
            growth_left: self.growth_left,
        }
    }
}

pub struct RawIter<'a, T> {
    table: &'a RawTable<T>,
    idx: usize,
}

impl<'a, T> Iterator for RawIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        while self.idx < self.table.buckets() {
            let idx = self.idx;
            self.idx += 1;
            if is_full(self.table.ctrl[idx]) {
                return Some(self.table.bucket(idx));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_hash(v: &i64) -> u64 {
        crate::column::primitive::hash_u64(*v as u64)
    }

    #[test]
    fn insert_find_remove() {
        let mut t: RawTable<i64> = RawTable::new();
        for v in 0..100i64 {
            t.insert(int_hash(&v), v, |&e| e == v, int_hash).unwrap();
        }
        assert_eq!(t.len(), 100);
        for v in 0..100i64 {
            assert_eq!(t.get(int_hash(&v), |&e| e == v), Some(&v));
        }
        for v in (0..100i64).step_by(2) {
            assert_eq!(t.remove(int_hash(&v), |&e| e == v), Some(v));
        }
        assert_eq!(t.len(), 50);
        for v in 0..100i64 {
            let present = t.contains(int_hash(&v), |&e| e == v);
            assert_eq!(present, v % 2 == 1, "key {v}");
        }
    }

    #[test]
    fn replace_returns_old() {
        let mut t: RawTable<(i64, i64)> = RawTable::new();
        let h = int_hash(&7);
        t.insert(h, (7, 1), |e| e.0 == 7, |e| int_hash(&e.0)).unwrap();
        let old = t
            .insert(h, (7, 2), |e| e.0 == 7, |e| int_hash(&e.0))
            .unwrap();
        assert_eq!(old, Some((7, 1)));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn grows_past_load_factor() {
        let mut t: RawTable<i64> = RawTable::with_capacity(8).unwrap();
        let initial = t.capacity();
        for v in 0..1000i64 {
            t.insert_new(int_hash(&v), v, int_hash).unwrap();
        }
        assert!(t.capacity() > initial);
        assert_eq!(t.len(), 1000);
        // 7/8 ceiling holds.
        assert!(t.len() * 8 <= t.capacity() * 7);
    }
}
