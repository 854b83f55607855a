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

//! Hash table stress and invariants, including behavior at the 7/8 load
//! factor and `GROUP_WIDTH`-sized inputs.

use hekla::swiss::{Map, Set, GROUP_WIDTH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ---------------------------------------------------------------------------
// Mixed put/remove sequences
// ---------------------------------------------------------------------------

#[test]
fn stress_insert_remove_shrink() {
    let mut m: Map<i64, i64> = Map::new();
    for k in 0..10_000i64 {
        m.insert(k, k * 2).unwrap();
    }
    assert_eq!(m.len(), 10_000);
    for k in (0..10_000i64).step_by(2) {
        assert_eq!(m.remove(&k), Some(k * 2));
    }
    assert_eq!(m.len(), 5_000);
    for k in 0..10_000i64 {
        assert_eq!(m.contains_key(&k), k % 2 == 1, "key {k}");
    }
    let before = m.capacity();
    m.shrink_to_fit().unwrap();
    // 5000 live keys need at least the next power of two above 5000 * 8/7.
    let floor = (5_000usize * 8 / 7 + 1).next_power_of_two();
    assert!(m.capacity() >= floor);
    assert!(m.capacity() <= before);
    assert_eq!(m.capacity(), floor);
    for k in (1..10_000i64).step_by(2) {
        assert_eq!(m.get(&k), Some(&(k * 2)));
    }
}

#[test]
fn count_tracks_live_slots() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut m: Map<u64, u64> = Map::new();
    let mut shadow = std::collections::HashMap::new();
    for _ in 0..50_000 {
        let k = rng.gen_range(0..2_000u64);
        if rng.gen_bool(0.6) {
            m.insert(k, k).unwrap();
            shadow.insert(k, k);
        } else {
            assert_eq!(m.remove(&k).is_some(), shadow.remove(&k).is_some());
        }
        assert_eq!(m.len(), shadow.len());
    }
    for (k, v) in &shadow {
        assert_eq!(m.get(k), Some(v));
    }
}

// ---------------------------------------------------------------------------
// Boundary sizes
// ---------------------------------------------------------------------------

#[test]
fn exactly_group_width_keys() {
    let mut m: Map<i64, usize> = Map::new();
    for k in 0..GROUP_WIDTH as i64 {
        m.insert(k, k as usize).unwrap();
    }
    assert_eq!(m.len(), GROUP_WIDTH);
    for k in 0..GROUP_WIDTH as i64 {
        assert_eq!(m.get(&k), Some(&(k as usize)));
    }
}

#[test]
fn fill_to_load_factor_boundary() {
    let mut m: Map<i64, i64> = Map::with_capacity(64).unwrap();
    let buckets = m.capacity();
    let ceiling = buckets * 7 / 8;
    for k in 0..ceiling as i64 {
        m.insert_new(k, k).unwrap();
    }
    // At exactly 7/8 the table still answers lookups correctly.
    assert_eq!(m.capacity(), buckets);
    for k in 0..ceiling as i64 {
        assert_eq!(m.get(&k), Some(&k));
    }
    // One more insert crosses the ceiling and doubles.
    m.insert_new(ceiling as i64, 0).unwrap();
    assert!(m.capacity() > buckets);
}

#[test]
fn replace_returns_previous() {
    let mut m: Map<String, i64> = Map::new();
    assert_eq!(m.insert("k".to_string(), 1).unwrap(), None);
    assert_eq!(m.insert("k".to_string(), 2).unwrap(), Some(1));
    assert_eq!(m.len(), 1);
}

// ---------------------------------------------------------------------------
// Set semantics
// ---------------------------------------------------------------------------

#[test]
fn set_dedup() {
    let mut s: Set<String> = Set::new();
    for word in ["a", "b", "a", "c", "b", "a"] {
        s.insert(word.to_string()).unwrap();
    }
    assert_eq!(s.len(), 3);
    assert!(s.contains("a"));
    assert!(!s.contains("z"));
}

// ---------------------------------------------------------------------------
// Partition routing
// ---------------------------------------------------------------------------

#[test]
fn hash_to_partition_uniform() {
    let mut rng = StdRng::seed_from_u64(42);
    for &n in &[2usize, 4, 7, 16] {
        let mut counts = vec![0usize; n];
        for _ in 0..10_000 {
            let h: u64 = rng.gen();
            let p = hekla::simd::hash::hash_to_partition(h, n);
            assert!(p < n);
            counts[p] += 1;
        }
        let expect = 10_000 / n;
        for &c in &counts {
            // Within 20% of uniform.
            assert!(
                (c as f64 - expect as f64).abs() / expect as f64 <= 0.2,
                "partition count {c} deviates from {expect} (n = {n})"
            );
        }
    }
}
