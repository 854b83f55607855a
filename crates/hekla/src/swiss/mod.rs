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

//! Typed map and set over the Swiss-table core.

pub mod raw;

use std::borrow::Borrow;

use crate::column::primitive::hash_u64;
use crate::error::Result;

pub use raw::{RawTable, GROUP_WIDTH};

// ---------------------------------------------------------------------------
// Key hashing
// ---------------------------------------------------------------------------

/// Key types with an engine-defined hash: integers use the golden-ratio
/// multiply, wider fixed-size keys mix per word, strings hash the byte range.
pub trait HashKey: Eq {
    fn key_hash(&self) -> u64;
}

macro_rules! impl_int_key {
    ($($t:ty),*) => {
        $(
            impl HashKey for $t {
                #[inline]
                fn key_hash(&self) -> u64 {
                    hash_u64(*self as i64 as u64)
                }
            }
        )*
    };
}

impl_int_key!(i64, i32, i16, i8, u64, u32, u16, u8, usize, isize);

impl HashKey for str {
    #[inline]
    fn key_hash(&self) -> u64 {
        crate::simd::hash::hash_bytes(self.as_bytes())
    }
}

impl HashKey for String {
    #[inline]
    fn key_hash(&self) -> u64 {
        self.as_str().key_hash()
    }
}

impl<A: HashKey, B: HashKey> HashKey for (A, B) {
    #[inline]
    fn key_hash(&self) -> u64 {
        crate::simd::hash::combine(self.0.key_hash(), self.1.key_hash())
    }
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

/// Hash map with Swiss-table group probing.
#[derive(Clone)]
pub struct Map<K, V> {
    raw: RawTable<(K, V)>,
}

impl<K: HashKey, V> Map<K, V> {
    pub fn new() -> Self {
        Map {
            raw: RawTable::new(),
        }
    }

    pub fn with_capacity(n: usize) -> Result<Self> {
        Ok(Map {
            raw: RawTable::with_capacity(n)?,
        })
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Bucket capacity; usable occupancy is 7/8 of this.
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: HashKey + ?Sized,
    {
        self.raw
            .get(key.key_hash(), |(k, _)| k.borrow() == key)
            .map(|(_, v)| v)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: HashKey + ?Sized,
    {
        self.raw
            .get_mut(key.key_hash(), |(k, _)| k.borrow() == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: HashKey + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Insert or replace; returns the previous value on replace.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        let hash = key.key_hash();
        if let Some(idx) = self.raw.find(hash, |(k, _)| *k == key) {
            let slot = self.raw.bucket_mut(idx);
            return Ok(Some(std::mem::replace(&mut slot.1, value)));
        }
        self.raw.insert_new(hash, (key, value), |e| e.0.key_hash())?;
        Ok(None)
    }

    /// Insert a key known to be absent; skips the equality probe.
    pub fn insert_new(&mut self, key: K, value: V) -> Result<()> {
        let hash = key.key_hash();
        self.raw.insert_new(hash, (key, value), |e| e.0.key_hash())?;
        Ok(())
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: HashKey + ?Sized,
    {
        self.raw
            .remove(key.key_hash(), |(k, _)| k.borrow() == key)
            .map(|(_, v)| v)
    }

    /// Pointer to the resident or newly inserted value.
    pub fn get_or_insert_with(&mut self, key: K, default: impl FnOnce() -> V) -> Result<&mut V> {
        let hash = key.key_hash();
        if let Some(idx) = self.raw.find(hash, |(k, _)| *k == key) {
            return Ok(&mut self.raw.bucket_mut(idx).1);
        }
        let idx = self
            .raw
            .insert_new(hash, (key, default()), |e| e.0.key_hash())?;
        Ok(&mut self.raw.bucket_mut(idx).1)
    }

    /// Entry-style access avoiding a second lookup on insert.
    pub fn entry(&mut self, key: K) -> Result<Entry<'_, K, V>> {
        let hash = key.key_hash();
        match self.raw.find(hash, |(k, _)| *k == key) {
            Some(index) => Ok(Entry::Occupied(OccupiedEntry {
                map: self,
                index,
            })),
            None => Ok(Entry::Vacant(VacantEntry {
                map: self,
                key,
                hash,
            })),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.raw.iter().map(|(k, v)| (k, v))
    }

    pub fn clear(&mut self) {
        self.raw.clear();
    }

    pub fn shrink_to_fit(&mut self) -> Result<()> {
        self.raw.shrink_to_fit(|e| e.0.key_hash())
    }

    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.raw.reserve(additional, |e| e.0.key_hash())
    }
}

impl<K: HashKey, V> Default for Map<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Entry API
// ---------------------------------------------------------------------------

pub enum Entry<'a, K: HashKey, V> {
    Occupied(OccupiedEntry<'a, K, V>),
    Vacant(VacantEntry<'a, K, V>),
}

impl<'a, K: HashKey, V> Entry<'a, K, V> {
    /// Insert `default` when vacant; return the value either way.
    pub fn or_insert(self, default: V) -> Result<&'a mut V> {
        match self {
            Entry::Occupied(o) => Ok(o.into_mut()),
            Entry::Vacant(v) => v.insert(default),
        }
    }

    pub fn or_insert_with(self, default: impl FnOnce() -> V) -> Result<&'a mut V> {
        match self {
            Entry::Occupied(o) => Ok(o.into_mut()),
            Entry::Vacant(v) => v.insert(default()),
        }
    }
}

pub struct OccupiedEntry<'a, K: HashKey, V> {
    map: &'a mut Map<K, V>,
    index: usize,
}

impl<'a, K: HashKey, V> OccupiedEntry<'a, K, V> {
    pub fn get(&self) -> &V {
        &self.map.raw.bucket(self.index).1
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.map.raw.bucket_mut(self.index).1
    }

    pub fn into_mut(self) -> &'a mut V {
        &mut self.map.raw.bucket_mut(self.index).1
    }

    pub fn remove(self) -> V {
        self.map.raw.remove_bucket(self.index).1
    }
}

pub struct VacantEntry<'a, K: HashKey, V> {
    map: &'a mut Map<K, V>,
    key: K,
    hash: u64,
}

impl<'a, K: HashKey, V> VacantEntry<'a, K, V> {
    pub fn insert(self, value: V) -> Result<&'a mut V> {
        let idx = self
            .map
            .raw
            .insert_new(self.hash, (self.key, value), |e| e.0.key_hash())?;
        Ok(&mut self.map.raw.bucket_mut(idx).1)
    }
}

// ---------------------------------------------------------------------------
// Set
// ---------------------------------------------------------------------------

/// Hash set: a map with a zero-sized value.
#[derive(Clone, Default)]
pub struct Set<K: HashKey> {
    map: Map<K, ()>,
}

impl<K: HashKey> Set<K> {
    pub fn new() -> Self {
        Set { map: Map::new() }
    }

    pub fn with_capacity(n: usize) -> Result<Self> {
        Ok(Set {
            map: Map::with_capacity(n)?,
        })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.map.capacity()
    }

    /// Returns true when the value was newly inserted.
    pub fn insert(&mut self, key: K) -> Result<bool> {
        Ok(self.map.insert(key, ())?.is_none())
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: HashKey + ?Sized,
    {
        self.map.contains_key(key)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: HashKey + ?Sized,
    {
        self.map.remove(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.map.iter().map(|(k, _)| k)
    }

    pub fn shrink_to_fit(&mut self) -> Result<()> {
        self.map.shrink_to_fit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_string_keys() {
        let mut m: Map<String, i64> = Map::new();
        m.insert("alpha".to_string(), 1).unwrap();
        m.insert("beta".to_string(), 2).unwrap();
        assert_eq!(m.get("alpha"), Some(&1));
        assert_eq!(m.insert("alpha".to_string(), 9).unwrap(), Some(1));
        assert_eq!(m.get("alpha"), Some(&9));
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn entry_api() {
        let mut m: Map<i64, Vec<i64>> = Map::new();
        match m.entry(5).unwrap() {
            Entry::Vacant(v) => {
                v.insert(vec![1]).unwrap();
            }
            Entry::Occupied(_) => unreachable!(),
        }
        match m.entry(5).unwrap() {
            Entry::Occupied(mut o) => o.get_mut().push(2),
            Entry::Vacant(_) => unreachable!(),
        }
        assert_eq!(m.get(&5), Some(&vec![1, 2]));
    }

    #[test]
    fn set_semantics() {
        let mut s: Set<i64> = Set::new();
        assert!(s.insert(1).unwrap());
        assert!(!s.insert(1).unwrap());
        assert!(s.contains(&1));
        assert!(s.remove(&1));
        assert!(!s.contains(&1));
    }
}
